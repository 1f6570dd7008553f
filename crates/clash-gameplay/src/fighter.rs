//! Per-fighter state machine.
//!
//! A [`Fighter`] owns its state, timers and bookkeeping. The simulation feeds
//! it input once per frame, asks it to carry out action requests and forces
//! transitions on hits and stage contacts.

use clash_common::{CharacterId, FighterId, Frame, GroupId};
use glam::Vec2;
use tracing::{debug, info, trace};

use crate::action::ActionRequest;
use crate::character::CharacterConstants;
use crate::config::{CombatConfig, MoonwalkPersistence};
use crate::fighter_state::{State, StateProps};
use crate::grab::GrabCooldowns;
use crate::input::{Button, ButtonSet, Cardinal, Facing, InputRecord};
use crate::moves::MoveKind;
use crate::shield;

/// Last wall touched while airborne.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallContact {
    /// Frame of the contact
    pub frame: Frame,
    /// Wall normal
    pub normal: Vec2,
}

/// Button edges for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonEdges {
    /// Pressed this frame
    pub pressed: ButtonSet,
    /// Released this frame
    pub released: ButtonSet,
}

/// A fighter taking part in a match.
#[derive(Debug, Clone)]
pub struct Fighter {
    pub(crate) id: FighterId,
    pub(crate) character: CharacterId,
    pub(crate) slot: usize,

    // === Kinematics ===
    pub(crate) position: Vec2,
    pub(crate) velocity: Vec2,
    pub(crate) facing: Facing,
    pub(crate) ground: Option<usize>,
    pub(crate) dropped_platform: Option<usize>,

    // === Match bookkeeping ===
    pub(crate) percent: f32,
    pub(crate) stocks: u8,
    pub(crate) in_play: bool,
    pub(crate) respawn_intangible: Frame,

    // === State ===
    pub(crate) state: State,
    pub(crate) state_entered: Frame,
    pub(crate) state_serial: u64,
    pub(crate) turn_flipped: bool,

    // === Air options ===
    pub(crate) jumps_used: u8,
    pub(crate) fast_falling: bool,
    pub(crate) airdodge_used: bool,
    pub(crate) short_hop: Option<bool>,
    pub(crate) wall_contact: Option<WallContact>,

    // === Combat timers ===
    pub(crate) hitlag: Frame,
    pub(crate) freeze: Frame,
    pub(crate) frozen: bool,
    pub(crate) sdi_ready: bool,
    pub(crate) pending_launch: Option<Vec2>,
    pub(crate) pending_reflect: Option<Vec2>,
    pub(crate) hitstun: Frame,
    pub(crate) shield_stun: Frame,
    pub(crate) spike: bool,
    pub(crate) tumble_ready: bool,
    pub(crate) charge: Frame,

    // === Shield and grabs ===
    pub(crate) shield_health: f32,
    pub(crate) last_shield_press: Option<Frame>,
    pub(crate) last_shield_release: Option<Frame>,
    pub(crate) grab_cooldowns: GrabCooldowns,

    // === Input ===
    pub(crate) previous_buttons: ButtonSet,

    // === Hitbox groups ===
    pub(crate) body_group: Option<GroupId>,
    pub(crate) shield_group: Option<GroupId>,
    pub(crate) move_groups: Vec<(usize, GroupId)>,
    pub(crate) opened_windows: u64,
    pub(crate) move_serial: u64,
    /// State serial of the last move that fired its projectile
    pub(crate) fired_serial: Option<u64>,
}

impl Fighter {
    /// Creates a fighter at `position`, standing on `ground` if given.
    #[must_use]
    pub fn new(
        id: FighterId,
        character: CharacterId,
        position: Vec2,
        ground: Option<usize>,
        stocks: u8,
        config: &CombatConfig,
    ) -> Self {
        Self {
            id,
            character,
            slot: 0,
            position,
            velocity: Vec2::ZERO,
            facing: if position.x > 0.0 { Facing::Left } else { Facing::Right },
            ground,
            dropped_platform: None,
            percent: 0.0,
            stocks,
            in_play: stocks > 0,
            respawn_intangible: 0,
            state: if ground.is_some() { State::Idle } else { State::IdleAirborne },
            state_entered: 0,
            state_serial: 0,
            turn_flipped: false,
            jumps_used: 0,
            fast_falling: false,
            airdodge_used: false,
            short_hop: None,
            wall_contact: None,
            hitlag: 0,
            freeze: 0,
            frozen: false,
            sdi_ready: false,
            pending_launch: None,
            pending_reflect: None,
            hitstun: 0,
            shield_stun: 0,
            spike: false,
            tumble_ready: false,
            charge: 0,
            shield_health: config.shield_max,
            last_shield_press: None,
            last_shield_release: None,
            grab_cooldowns: GrabCooldowns::new(),
            previous_buttons: ButtonSet::EMPTY,
            body_group: None,
            shield_group: None,
            move_groups: Vec::new(),
            opened_windows: 0,
            move_serial: 0,
            fired_serial: None,
        }
    }

    /// Sets the spawn slot used for respawning.
    #[must_use]
    pub fn with_slot(mut self, slot: usize) -> Self {
        self.slot = slot;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Fighter id.
    #[must_use]
    pub const fn id(&self) -> FighterId {
        self.id
    }

    /// Character id.
    #[must_use]
    pub const fn character(&self) -> CharacterId {
        self.character
    }

    /// Feet position.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    /// Velocity in units per frame.
    #[must_use]
    pub const fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Facing direction.
    #[must_use]
    pub const fn facing(&self) -> Facing {
        self.facing
    }

    /// Accumulated damage.
    #[must_use]
    pub const fn percent(&self) -> f32 {
        self.percent
    }

    /// Stocks left.
    #[must_use]
    pub const fn stocks(&self) -> u8 {
        self.stocks
    }

    /// Shield health.
    #[must_use]
    pub const fn shield_health(&self) -> f32 {
        self.shield_health
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Supporting segment index.
    #[must_use]
    pub const fn ground(&self) -> Option<usize> {
        self.ground
    }

    /// Standing on a surface.
    #[must_use]
    pub const fn is_grounded(&self) -> bool {
        self.ground.is_some()
    }

    /// Whether the fighter is on the stage.
    #[must_use]
    pub const fn in_play(&self) -> bool {
        self.in_play
    }

    /// Hitstun frames left.
    #[must_use]
    pub const fn hitstun(&self) -> Frame {
        self.hitstun
    }

    /// Hitlag frames left.
    #[must_use]
    pub const fn hitlag(&self) -> Frame {
        self.hitlag
    }

    /// Shield stun frames left.
    #[must_use]
    pub const fn shield_stun(&self) -> Frame {
        self.shield_stun
    }

    /// Midair jumps used.
    #[must_use]
    pub const fn jumps_used(&self) -> u8 {
        self.jumps_used
    }

    /// Fast-fall flag.
    #[must_use]
    pub const fn is_fast_falling(&self) -> bool {
        self.fast_falling
    }

    /// Air dodge spent this airborne phase.
    #[must_use]
    pub const fn airdodge_used(&self) -> bool {
        self.airdodge_used
    }

    /// Smash charge frames.
    #[must_use]
    pub const fn charge(&self) -> Frame {
        self.charge
    }

    /// Current launch is a spike.
    #[must_use]
    pub const fn is_spiked(&self) -> bool {
        self.spike
    }

    /// Re-grab cooldowns held by this fighter.
    #[must_use]
    pub const fn grab_cooldowns(&self) -> &GrabCooldowns {
        &self.grab_cooldowns
    }

    /// Frames since the current state was entered.
    #[must_use]
    pub fn elapsed(&self, now: Frame) -> Frame {
        now.saturating_sub(self.state_entered)
    }

    /// Frozen by hitlag or a stage spike.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.hitlag > 0 || self.freeze > 0
    }

    /// Immune to hits this frame.
    #[must_use]
    pub fn is_intangible(&self, now: Frame, constants: &CharacterConstants, config: &CombatConfig) -> bool {
        self.respawn_intangible > 0
            || self
                .state
                .props(constants, config)
                .is_intangible(self.elapsed(now))
    }

    /// Super armor is up this frame.
    #[must_use]
    pub fn has_armor(&self, now: Frame, constants: &CharacterConstants, config: &CombatConfig) -> Option<f32> {
        let props = self.state.props(constants, config);
        props
            .has_armor(self.elapsed(now))
            .then_some(props.armor_threshold)
    }

    /// Frames left in the current state, if it ends on its own.
    #[must_use]
    pub fn remaining(&self, now: Frame, constants: &CharacterConstants, config: &CombatConfig) -> Option<Frame> {
        match self.state {
            State::GroundedHitstun | State::AirborneHitstun => Some(self.hitstun),
            _ => self
                .state
                .props(constants, config)
                .remaining(self.elapsed(now)),
        }
    }

    /// Wall touched within the wall-jump window.
    #[must_use]
    pub fn recent_wall(&self, now: Frame, config: &CombatConfig) -> Option<Vec2> {
        self.wall_contact
            .filter(|c| now.saturating_sub(c.frame) <= config.wall_jump_window)
            .map(|c| c.normal)
    }

    /// Whether a shield press falls inside the tech window before `now`.
    #[must_use]
    pub fn tech_input(&self, now: Frame, config: &CombatConfig) -> bool {
        self.last_shield_press
            .is_some_and(|press| press <= now && now - press <= config.tech_window)
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Enters `state` at `now`, restarting its timer.
    pub fn set_state(&mut self, state: State, now: Frame) {
        if self.state != state {
            debug!(
                fighter = %self.id,
                from = self.state.name(),
                to = state.name(),
                frame = now,
                "state transition"
            );
        }
        self.state = state;
        self.state_entered = now;
        self.state_serial = self.state_serial.wrapping_add(1);
        self.turn_flipped = false;
        self.charge = 0;
        if state == State::JumpSquat {
            self.short_hop = None;
        }
    }

    /// Leaves the current action for the neutral state matching the ground.
    pub fn finish_action(&mut self, now: Frame) {
        let next = if self.is_grounded() {
            State::Idle
        } else {
            State::IdleAirborne
        };
        self.set_state(next, now);
    }

    /// Stands on segment `index`, resetting air options.
    pub fn land(&mut self, index: usize) {
        self.ground = Some(index);
        self.velocity.y = 0.0;
        self.jumps_used = 0;
        self.fast_falling = false;
        self.airdodge_used = false;
        self.spike = false;
        self.wall_contact = None;
        self.dropped_platform = None;
    }

    /// Leaves the supporting surface.
    pub fn leave_ground(&mut self) {
        self.ground = None;
    }

    /// Breaks the shield.
    ///
    /// Clears any freeze so the stun runs for exactly its configured length.
    pub fn break_shield(&mut self, now: Frame) {
        info!(fighter = %self.id, frame = now, "shield broken");
        self.shield_health = 0.0;
        self.shield_stun = 0;
        self.hitlag = 0;
        self.sdi_ready = false;
        self.velocity.x = 0.0;
        self.set_state(State::ShieldBroken, now);
    }

    /// Loses a stock and leaves play.
    pub fn knock_out(&mut self, now: Frame) {
        self.stocks = self.stocks.saturating_sub(1);
        info!(fighter = %self.id, frame = now, stocks = self.stocks, "KO");
        self.percent = 0.0;
        self.in_play = false;
        self.velocity = Vec2::ZERO;
        self.ground = None;
        self.clear_combat_timers();
        self.set_state(State::IdleAirborne, now);
    }

    /// Re-enters play at `position` with full shield and no damage.
    pub fn respawn(&mut self, position: Vec2, now: Frame, config: &CombatConfig) {
        info!(fighter = %self.id, frame = now, stocks = self.stocks, "respawn");
        debug_assert!(self.stocks > 0);
        self.position = position;
        self.velocity = Vec2::ZERO;
        self.percent = 0.0;
        self.shield_health = config.shield_max;
        self.ground = None;
        self.in_play = true;
        self.respawn_intangible = config.respawn_intangible_frames;
        self.jumps_used = 0;
        self.fast_falling = false;
        self.airdodge_used = false;
        self.wall_contact = None;
        self.clear_combat_timers();
        self.set_state(State::IdleAirborne, now);
    }

    fn clear_combat_timers(&mut self) {
        self.hitlag = 0;
        self.freeze = 0;
        self.frozen = false;
        self.sdi_ready = false;
        self.pending_launch = None;
        self.pending_reflect = None;
        self.hitstun = 0;
        self.shield_stun = 0;
        self.spike = false;
        self.tumble_ready = false;
    }

    // ========================================================================
    // Per-frame update
    // ========================================================================

    /// Records button edges and ticks input-independent counters.
    pub fn begin_frame(&mut self, now: Frame, input: &InputRecord) -> ButtonEdges {
        let edges = ButtonEdges {
            pressed: input.buttons.pressed_since(self.previous_buttons),
            released: input.buttons.released_since(self.previous_buttons),
        };
        if edges.pressed.contains(Button::Shield) {
            self.last_shield_press = Some(now);
        }
        self.previous_buttons = input.buttons;
        self.respawn_intangible = self.respawn_intangible.saturating_sub(1);
        self.grab_cooldowns.prune(now);
        edges
    }

    /// Counts down hitlag and stage-spike freeze; returns whether this frame is frozen.
    ///
    /// The state timer is held while frozen. A pending launch is applied when
    /// hitlag runs out, a pending reflection when the freeze does.
    pub fn tick_freeze(&mut self) -> bool {
        self.frozen = self.is_frozen();
        if !self.frozen {
            return false;
        }
        self.state_entered = self.state_entered.saturating_add(1);
        if self.hitlag > 0 {
            self.hitlag -= 1;
            if self.hitlag == 0 {
                self.sdi_ready = false;
                if let Some(launch) = self.pending_launch.take() {
                    self.velocity = launch;
                }
            }
        } else {
            self.freeze -= 1;
            if self.freeze == 0 {
                if let Some(normal) = self.pending_reflect.take() {
                    self.velocity = crate::physics::reflect(self.velocity, normal);
                }
            }
        }
        true
    }

    /// Advances timers and natural state ends. Returns `true` if the shield broke.
    pub fn update_state(
        &mut self,
        now: Frame,
        input: &InputRecord,
        constants: &CharacterConstants,
        config: &CombatConfig,
    ) -> bool {
        self.hitstun = self.hitstun.saturating_sub(1);
        self.shield_stun = self.shield_stun.saturating_sub(1);
        if self.velocity.y > 0.0 {
            self.fast_falling = false;
        }

        let mut broke = false;
        match self.state {
            State::Shield => {
                self.shield_health = shield::tick(self.shield_health, true, config);
                if self.shield_health <= 0.0 {
                    self.break_shield(now);
                    broke = true;
                }
            },
            State::ShieldBroken => {},
            _ => self.shield_health = shield::tick(self.shield_health, false, config),
        }
        debug_assert!((0.0..=config.shield_max).contains(&self.shield_health));

        if self.state.is_hitstun() && self.hitstun == 0 {
            let next = match self.state {
                _ if self.is_grounded() => State::Idle,
                State::AirborneHitstun if self.tumble_ready => State::Tumble,
                _ => State::IdleAirborne,
            };
            self.spike = false;
            self.tumble_ready = false;
            self.set_state(next, now);
            return broke;
        }

        let props = self.state.props(constants, config);
        let elapsed = self.elapsed(now);
        match self.state {
            State::JumpSquat => {
                if self.short_hop.is_none() && !input.held(Button::Jump) {
                    self.short_hop = Some(true);
                }
                if props.is_finished(elapsed) {
                    let speed = if self.short_hop == Some(true) {
                        constants.short_hop_speed()
                    } else {
                        constants.jump_speed
                    };
                    self.short_hop.get_or_insert(false);
                    self.velocity.y = speed;
                    self.leave_ground();
                    self.set_state(State::Airborne, now);
                }
            },
            State::Attack(kind) => self.update_attack(kind, props, now, input, constants, config),
            State::Turn { from_run } => {
                if !self.turn_flipped && elapsed >= config.turn_frames / 2 {
                    self.facing = self.facing.flipped();
                    self.turn_flipped = true;
                }
                if props.is_finished(elapsed) {
                    self.set_state(if from_run { State::Run } else { State::Idle }, now);
                }
            },
            State::Dash => {
                if props.is_finished(elapsed) {
                    self.set_state(State::Run, now);
                }
            },
            State::Run => {
                if input.stick_cardinal().and_then(Cardinal::facing).is_none() {
                    self.set_state(State::RunEnd, now);
                }
            },
            State::RunEnd => {
                if props.is_finished(elapsed) {
                    self.set_state(State::Idle, now);
                }
            },
            State::EnterCrouch => {
                if props.is_finished(elapsed) {
                    self.set_state(State::Crouch, now);
                }
            },
            State::Crouch => {
                if input.stick.y >= -config.crouch_threshold {
                    self.set_state(State::ExitCrouch, now);
                }
            },
            State::Walk => {
                if input.stick_cardinal().and_then(Cardinal::facing) != Some(self.facing) {
                    self.set_state(State::Idle, now);
                }
            },
            State::Moonwalk => {
                let backwards = input.stick_cardinal().and_then(Cardinal::facing)
                    == Some(self.facing.flipped());
                let released = config.moonwalk == MoonwalkPersistence::UntilRelease && !backwards;
                if props.is_finished(elapsed) || released {
                    self.set_state(State::Idle, now);
                }
            },
            State::Airdodge => {
                if props.is_finished(elapsed) {
                    self.velocity = Vec2::ZERO;
                    self.finish_action(now);
                }
            },
            State::ShieldBroken => {
                if props.is_finished(elapsed) {
                    self.shield_health = config.shield_max / 2.0;
                    self.finish_action(now);
                }
            },
            State::Spotdodge
            | State::Roll { .. }
            | State::Knockdown
            | State::LandingLag { .. }
            | State::ExitCrouch
            | State::LandCrouch => {
                if props.is_finished(elapsed) {
                    self.finish_action(now);
                }
            },
            State::Shield => {
                if !input.held(Button::Shield) && self.shield_stun == 0 {
                    self.last_shield_release = Some(now);
                    self.set_state(State::Idle, now);
                }
            },
            _ => {},
        }
        broke
    }

    fn update_attack(
        &mut self,
        kind: MoveKind,
        props: StateProps,
        now: Frame,
        input: &InputRecord,
        constants: &CharacterConstants,
        config: &CombatConfig,
    ) {
        let elapsed = self.elapsed(now);
        let charge_frame = constants.moves.get(kind).and_then(|def| def.charge_frame);
        if kind.is_smash()
            && charge_frame == Some(elapsed)
            && self.charge < config.smash_charge_max_frames
            && (input.held(Button::Attack) || input.stick_cardinal() == self.smash_direction(kind))
        {
            self.charge += 1;
            self.state_entered = self.state_entered.saturating_add(1);
            trace!(fighter = %self.id, charge = self.charge, "smash charge");
            return;
        }
        if props.is_finished(elapsed) {
            self.finish_action(now);
        }
    }

    fn smash_direction(&self, kind: MoveKind) -> Option<Cardinal> {
        match kind {
            MoveKind::UpSmash => Some(Cardinal::Up),
            MoveKind::DownSmash => Some(Cardinal::Down),
            _ => Some(match self.facing {
                Facing::Left => Cardinal::Left,
                Facing::Right => Cardinal::Right,
            }),
        }
    }

    // ========================================================================
    // Action requests
    // ========================================================================

    /// Carries out `request` if it is legal now. Illegal requests are dropped.
    pub fn request(
        &mut self,
        request: ActionRequest,
        now: Frame,
        constants: &CharacterConstants,
        config: &CombatConfig,
    ) -> bool {
        if !self.in_play || self.is_frozen() || !self.accepts(&request, now, constants, config) {
            trace!(fighter = %self.id, request = request.name(), state = self.state.name(), "request dropped");
            return false;
        }
        let applied = self.apply(request, now, constants, config);
        if !applied {
            trace!(fighter = %self.id, request = request.name(), state = self.state.name(), "request not applicable");
        }
        applied
    }

    fn accepts(
        &self,
        request: &ActionRequest,
        now: Frame,
        constants: &CharacterConstants,
        config: &CombatConfig,
    ) -> bool {
        if self.shield_stun > 0 || (self.state.is_hitstun() && self.hitstun > 0) {
            return false;
        }
        let elapsed = self.elapsed(now);
        let props = self.state.props(constants, config);
        match (self.state, request) {
            (State::JumpSquat, ActionRequest::Airdodge(_)) => true,
            (State::LandCrouch, ActionRequest::Crouch) => true,
            (State::Attack(current), ActionRequest::Attack { kind, .. })
                if current.next_jab() == Some(*kind) =>
            {
                let in_combo = constants
                    .moves
                    .get(current)
                    .and_then(|def| def.combo_window)
                    .is_some_and(|w| w.contains(elapsed));
                in_combo || props.is_actionable(elapsed)
            },
            (state, ActionRequest::FastFall) => {
                !self.is_grounded()
                    && !matches!(
                        state,
                        State::AirborneHitstun | State::Airdodge | State::Grabbed { .. }
                    )
            },
            _ => props.is_actionable(elapsed),
        }
    }

    fn apply(
        &mut self,
        request: ActionRequest,
        now: Frame,
        constants: &CharacterConstants,
        config: &CombatConfig,
    ) -> bool {
        let grounded = self.is_grounded();
        match request {
            ActionRequest::Jump => {
                if !grounded {
                    return false;
                }
                self.set_state(State::JumpSquat, now);
            },
            ActionRequest::DoubleJump => {
                if grounded || self.jumps_used >= constants.extra_jumps {
                    return false;
                }
                self.jumps_used += 1;
                self.fast_falling = false;
                self.velocity.y = constants.double_jump_speed;
                self.set_state(State::Airborne, now);
            },
            ActionRequest::WallJump { normal } => {
                if grounded || self.recent_wall(now, config).is_none() {
                    return false;
                }
                let away = Facing::from_x(normal.x).unwrap_or(self.facing);
                self.facing = away;
                self.velocity = Vec2::new(away.sign() * constants.max_air_speed, constants.wall_jump_speed);
                self.fast_falling = false;
                self.wall_contact = None;
                self.set_state(State::Airborne, now);
            },
            ActionRequest::Attack { kind, facing } => {
                let Some(def) = constants.moves.get(kind) else {
                    return false;
                };
                if kind.is_throw() || !def.allowed(grounded) {
                    return false;
                }
                if let Some(facing) = facing {
                    self.facing = facing;
                }
                if let Some(impulse) = def.impulse {
                    self.velocity = Vec2::new(impulse.x * self.facing.sign(), impulse.y);
                    if impulse.y > 0.0 {
                        self.leave_ground();
                    }
                }
                self.set_state(State::Attack(kind), now);
            },
            ActionRequest::Throw(_) => return false,
            ActionRequest::Shield => {
                if !grounded || self.shield_health <= 0.0 {
                    return false;
                }
                self.set_state(State::Shield, now);
            },
            ActionRequest::Airdodge(direction) => {
                let from_squat = self.state == State::JumpSquat;
                if !from_squat && (grounded || self.airdodge_used) {
                    return false;
                }
                self.leave_ground();
                self.airdodge_used = true;
                self.fast_falling = false;
                self.velocity = direction.normalize_or_zero() * config.airdodge_speed;
                self.set_state(State::Airdodge, now);
            },
            ActionRequest::Spotdodge => {
                if !grounded {
                    return false;
                }
                self.velocity.x = 0.0;
                self.set_state(State::Spotdodge, now);
            },
            ActionRequest::Roll(direction) => {
                if !grounded {
                    return false;
                }
                self.velocity.x = direction.sign() * config.roll_speed;
                self.set_state(State::Roll { direction }, now);
            },
            ActionRequest::Dash(facing) => {
                if !grounded || self.state == State::RunEnd {
                    return false;
                }
                self.facing = facing;
                self.velocity.x = facing.sign() * constants.dash_speed;
                self.set_state(State::Dash, now);
            },
            ActionRequest::Walk(facing) => {
                if !grounded {
                    return false;
                }
                self.facing = facing;
                self.set_state(State::Walk, now);
            },
            ActionRequest::Turn => {
                if !grounded {
                    return false;
                }
                let from_run = matches!(self.state, State::Run | State::RunEnd);
                self.set_state(State::Turn { from_run }, now);
            },
            ActionRequest::Crouch => {
                if !grounded {
                    return false;
                }
                let next = if matches!(self.state, State::Run | State::RunEnd) {
                    State::Crouch
                } else {
                    State::EnterCrouch
                };
                self.set_state(next, now);
            },
            ActionRequest::Moonwalk => {
                if self.state != State::Dash {
                    return false;
                }
                self.set_state(State::Moonwalk, now);
            },
            ActionRequest::FastFall => {
                if self.fast_falling || self.velocity.y >= 0.0 {
                    return false;
                }
                self.fast_falling = true;
                self.velocity.y = -constants.max_fall_speed * 2.0;
            },
            ActionRequest::DropThrough => {
                let Some(platform) = self.ground else {
                    return false;
                };
                self.dropped_platform = Some(platform);
                self.leave_ground();
                self.set_state(State::IdleAirborne, now);
            },
        }
        true
    }
}
