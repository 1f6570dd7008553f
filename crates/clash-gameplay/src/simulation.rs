//! Frame driver for a match.
//!
//! A [`Match`] owns the fighters, the hitbox registry and the event bus, and
//! advances them one fixed frame at a time:
//!
//! 1. input, timers and action requests
//! 2. kinematics, stage collision, the blast zone and projectile flight
//! 3. hitbox detection against the positions committed in phase 2
//! 4. hit, shield and grab effects, gathered for the whole frame first

use std::collections::BTreeMap;

use clash_common::{CharacterId, ClashError, ClashResult, DataError, FighterId, Frame, GroupId};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::action::{self, ActionContext, ActionRequest};
use crate::character::{CharacterConstants, CharacterTable};
use crate::config::CombatConfig;
use crate::events::{CombatEvent, EventBus, EventHandler};
use crate::fighter::Fighter;
use crate::fighter_state::State;
use crate::grab;
use crate::hitbox::{ContactKind, GroupContact, GroupRegistry, Hitbox, HitboxPurpose, Placement};
use crate::input::{Facing, InputRecord};
use crate::knockback::{self, HitInput, Knockback};
use crate::moves::{MoveDef, MoveKind};
use crate::physics::{self, PhysicsContext, StageEvent};
use crate::projectile::Projectile;
use crate::shield;
use crate::stage::{SegmentKind, Stage};

/// Height above its spawn point at which a fighter re-enters play.
pub const RESPAWN_HEIGHT: f32 = 30.0;

/// Stocks per fighter unless set with [`Match::with_stocks`].
pub const DEFAULT_STOCKS: u8 = 4;

/// Errors at the match API boundary.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// No fighter with this id
    #[error("unknown fighter {0}")]
    UnknownFighter(FighterId),

    /// A fighter with this id already joined
    #[error("fighter {0} already in the match")]
    DuplicateFighter(FighterId),

    /// Respawn requested for a fighter that has not been knocked out
    #[error("fighter {0} is still in play")]
    StillInPlay(FighterId),

    /// Respawn requested for a fighter without stocks
    #[error("fighter {0} has no stocks left")]
    NoStocks(FighterId),

    /// Invalid character or configuration data
    #[error(transparent)]
    Data(#[from] DataError),
}

/// Result type for match operations.
pub type SimulationResult<T> = Result<T, SimulationError>;

// ============================================================================
// Snapshots
// ============================================================================

/// Observable state of one fighter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FighterSnapshot {
    /// Fighter id
    pub id: FighterId,
    /// Character id
    pub character: CharacterId,
    /// Feet position
    pub position: Vec2,
    /// Velocity in units per frame
    pub velocity: Vec2,
    /// Facing
    pub facing: Facing,
    /// State name
    pub state: String,
    /// Frames left in the state, if it ends on its own
    pub remaining: Option<Frame>,
    /// Accumulated damage
    pub percent: f32,
    /// Stocks left
    pub stocks: u8,
    /// Shield health
    pub shield_health: f32,
    /// On the stage
    pub in_play: bool,
    /// World-space attack, grab and shield boxes
    pub hitboxes: Vec<Hitbox>,
    /// World-space hurtboxes
    pub hurtboxes: Vec<Hitbox>,
}

/// Observable state of a projectile in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    /// Fighter that fired it
    pub owner: FighterId,
    /// Centre position
    pub position: Vec2,
    /// Velocity in units per frame
    pub velocity: Vec2,
    /// World-space attack boxes
    pub hitboxes: Vec<Hitbox>,
}

/// Observable state of a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Next frame to be simulated
    pub frame: Frame,
    /// Fighters in id order
    pub fighters: Vec<FighterSnapshot>,
    /// Projectiles in launch order
    #[serde(default)]
    pub projectiles: Vec<ProjectileSnapshot>,
}

impl MatchSnapshot {
    /// Serializes the snapshot to JSON.
    pub fn to_json(&self) -> ClashResult<String> {
        serde_json::to_string(self).map_err(|e| ClashError::Serialization(e.to_string()))
    }
}

// ============================================================================
// Match
// ============================================================================

/// A running match.
#[derive(Debug)]
pub struct Match {
    config: CombatConfig,
    stage: Stage,
    roster: CharacterTable,
    fighters: BTreeMap<FighterId, Fighter>,
    inputs: BTreeMap<FighterId, InputRecord>,
    registry: GroupRegistry,
    projectiles: Vec<Projectile>,
    frame: Frame,
    events: EventBus,
    stocks: u8,
}

impl Match {
    /// Creates an empty match, rejecting an invalid configuration.
    pub fn new(stage: Stage, roster: CharacterTable, config: CombatConfig) -> SimulationResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stage,
            roster,
            fighters: BTreeMap::new(),
            inputs: BTreeMap::new(),
            registry: GroupRegistry::new(),
            projectiles: Vec::new(),
            frame: 0,
            events: EventBus::default(),
            stocks: DEFAULT_STOCKS,
        })
    }

    /// Sets the stocks given to fighters spawned afterwards.
    #[must_use]
    pub fn with_stocks(mut self, stocks: u8) -> Self {
        self.stocks = stocks;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Next frame to be simulated.
    #[must_use]
    pub const fn frame(&self) -> Frame {
        self.frame
    }

    /// Stage geometry.
    #[must_use]
    pub const fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Combat tuning.
    #[must_use]
    pub const fn config(&self) -> &CombatConfig {
        &self.config
    }

    /// Character table.
    #[must_use]
    pub const fn roster(&self) -> &CharacterTable {
        &self.roster
    }

    /// Looks up a fighter.
    #[must_use]
    pub fn fighter(&self, id: FighterId) -> Option<&Fighter> {
        self.fighters.get(&id)
    }

    /// Fighters in id order.
    pub fn fighters(&self) -> impl Iterator<Item = &Fighter> {
        self.fighters.values()
    }

    /// Live hitbox groups.
    #[must_use]
    pub const fn registry(&self) -> &GroupRegistry {
        &self.registry
    }

    /// Projectiles in flight, in launch order.
    #[must_use]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    fn projectile(&self, group: GroupId) -> Option<&Projectile> {
        self.projectiles.iter().find(|p| p.group == group)
    }

    /// Event bus; clone its sender to publish from outside.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Drains pending combat events.
    pub fn drain_events(&self) -> Vec<CombatEvent> {
        self.events.drain()
    }

    /// Forwards pending events to a handler, returning how many were handled.
    pub fn dispatch_events(&self, handler: &dyn EventHandler) -> usize {
        let events = self.events.drain();
        for event in &events {
            handler.handle(event);
        }
        events.len()
    }

    /// At most one fighter has stocks left.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.fighters.len() > 1 && self.fighters.values().filter(|f| f.stocks() > 0).count() <= 1
    }

    /// Last fighter standing once the match is finished.
    #[must_use]
    pub fn winner(&self) -> Option<FighterId> {
        if !self.is_finished() {
            return None;
        }
        self.fighters.values().find(|f| f.stocks() > 0).map(Fighter::id)
    }

    // ========================================================================
    // Setup and input
    // ========================================================================

    /// Adds a fighter at the next free spawn point.
    pub fn spawn(&mut self, id: FighterId, character: CharacterId) -> SimulationResult<()> {
        if self.fighters.contains_key(&id) {
            return Err(SimulationError::DuplicateFighter(id));
        }
        self.roster.get(character)?;
        let slot = self.fighters.len();
        let position = self.stage.spawn_point(slot);
        let ground = self.stage.ground_at(position);
        let fighter = Fighter::new(id, character, position, ground, self.stocks, &self.config).with_slot(slot);
        info!(fighter = %id, character = character.raw(), slot, "fighter spawned");
        self.fighters.insert(id, fighter);
        self.sync_groups(id, self.frame);
        Ok(())
    }

    /// Returns a knocked-out fighter to play above its spawn point.
    pub fn respawn(&mut self, id: FighterId) -> SimulationResult<()> {
        let now = self.frame;
        let fighter = self
            .fighters
            .get_mut(&id)
            .ok_or(SimulationError::UnknownFighter(id))?;
        if fighter.in_play() {
            return Err(SimulationError::StillInPlay(id));
        }
        if fighter.stocks() == 0 {
            return Err(SimulationError::NoStocks(id));
        }
        let position = self.stage.spawn_point(fighter.slot) + Vec2::new(0.0, RESPAWN_HEIGHT);
        fighter.respawn(position, now, &self.config);
        self.sync_groups(id, now);
        Ok(())
    }

    /// Sets a fighter's input.
    ///
    /// Stick and buttons stay in effect until replaced; the directional
    /// classification only applies to the next frame.
    pub fn set_input(&mut self, id: FighterId, input: InputRecord) -> SimulationResult<()> {
        if !self.fighters.contains_key(&id) {
            return Err(SimulationError::UnknownFighter(id));
        }
        self.inputs.insert(id, input);
        Ok(())
    }

    fn stick(&self, id: FighterId) -> Vec2 {
        self.inputs
            .get(&id)
            .map_or(Vec2::ZERO, InputRecord::stick_direction)
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Simulates one frame and returns its number.
    pub fn step(&mut self) -> Frame {
        let now = self.frame;
        let ids: Vec<FighterId> = self.fighters.keys().copied().collect();

        // Input, timers and requests
        for &id in &ids {
            if let Some(kind) = self.update_fighter(id, now) {
                self.throw(id, kind, now);
            }
        }
        self.expire_grabs(now);
        for &id in &ids {
            self.sync_groups(id, now);
            self.fire_projectile(id, now);
        }

        // Kinematics
        for &id in &ids {
            self.move_fighter(id, now);
        }
        self.carry_grabbed();
        for &id in &ids {
            self.check_blast_zone(id, now);
        }
        self.advance_projectiles(now);

        // Detection
        let contacts = self.detect(now);

        // Effects
        self.apply_contacts(&contacts, now);
        for &id in &ids {
            self.sync_groups(id, now);
        }
        self.despawn_spent(&contacts, now);

        for input in self.inputs.values_mut() {
            input.directional = None;
        }
        trace!(frame = now, contacts = contacts.len(), groups = self.registry.len(), "frame complete");
        self.frame = now.saturating_add(1);
        now
    }

    /// Phase 1 for one fighter. Returns a throw for the match to carry out.
    fn update_fighter(&mut self, id: FighterId, now: Frame) -> Option<MoveKind> {
        let input = self.inputs.get(&id).copied().unwrap_or_default();
        let config = &self.config;
        let fighter = self.fighters.get_mut(&id)?;
        let edges = fighter.begin_frame(now, &input);
        if !fighter.in_play() {
            return None;
        }
        let constants = match self.roster.get(fighter.character()) {
            Ok(constants) => constants,
            Err(err) => {
                warn!(fighter = %id, %err, "fighter has no character data");
                return None;
            },
        };

        let sdi = fighter.hitlag() > 0 && fighter.sdi_ready;
        if fighter.tick_freeze() {
            let direction = input.stick_direction();
            if sdi && direction != Vec2::ZERO {
                physics::nudge(fighter, &self.stage, direction * config.sdi_distance, now);
                trace!(fighter = %id, ?direction, "smash DI");
            }
            return None;
        }

        if fighter.update_state(now, &input, constants, config) {
            self.events.publish(CombatEvent::ShieldBreak { frame: now, fighter: id });
        }

        let on_platform = fighter
            .ground()
            .and_then(|index| self.stage.segment(index))
            .is_some_and(|s| s.kind == SegmentKind::Platform);
        let ctx = ActionContext {
            state: fighter.state(),
            grounded: fighter.is_grounded(),
            on_platform,
            facing: fighter.facing(),
            input: &input,
            pressed: edges.pressed,
            velocity: fighter.velocity(),
            has_jump: fighter.jumps_used() < constants.extra_jumps,
            can_airdodge: !fighter.airdodge_used(),
            wall: fighter.recent_wall(now, config),
            fast_falling: fighter.is_fast_falling(),
            drop_threshold: config.platform_drop_threshold,
            crouch_threshold: config.crouch_threshold,
            moves: &constants.moves,
        };
        match action::resolve(&ctx)? {
            ActionRequest::Throw(kind) => Some(kind),
            request => {
                fighter.request(request, now, constants, config);
                None
            },
        }
    }

    /// Phase 2 for one fighter.
    fn move_fighter(&mut self, id: FighterId, now: Frame) {
        let Some(fighter) = self.fighters.get_mut(&id) else {
            return;
        };
        if !fighter.in_play() || fighter.frozen || matches!(fighter.state(), State::Grabbed { .. }) {
            return;
        }
        let Ok(constants) = self.roster.get(fighter.character()) else {
            return;
        };
        let input = self.inputs.get(&id).copied().unwrap_or_default();
        let ctx = PhysicsContext {
            stage: &self.stage,
            constants,
            config: &self.config,
            input: &input,
            now,
            intangible: fighter.is_intangible(now, constants, &self.config),
        };
        for event in physics::step(fighter, &ctx) {
            match event {
                StageEvent::Tech { .. } => {
                    self.events.publish(CombatEvent::Tech { frame: now, fighter: id });
                },
                StageEvent::StageSpike { normal } => {
                    self.events.publish(CombatEvent::StageSpike {
                        frame: now,
                        fighter: id,
                        normal,
                    });
                },
                StageEvent::Knockdown => {
                    self.events.publish(CombatEvent::Knockdown { frame: now, fighter: id });
                },
                StageEvent::Landed { index } => trace!(fighter = %id, segment = index, "landed"),
                StageEvent::LeftGround | StageEvent::WallContact { .. } => {},
            }
        }
    }

    /// Holds grabbed fighters in front of their grabbers.
    fn carry_grabbed(&mut self) {
        let offset = self.config.grab_hold_offset;
        let holds: Vec<(FighterId, Vec2)> = self
            .fighters
            .values()
            .filter_map(|f| match f.state() {
                State::Grabbing { victim } if f.in_play() => {
                    Some((victim, grab::hold_position(f.position(), f.facing(), offset)))
                },
                _ => None,
            })
            .collect();
        for (victim, position) in holds {
            if let Some(fighter) = self.fighters.get_mut(&victim) {
                if matches!(fighter.state(), State::Grabbed { .. }) {
                    fighter.position = position;
                    fighter.velocity = Vec2::ZERO;
                    fighter.ground = self.stage.ground_at(position);
                }
            }
        }
    }

    fn check_blast_zone(&mut self, id: FighterId, now: Frame) {
        let Some(fighter) = self.fighters.get(&id) else {
            return;
        };
        if !fighter.in_play() || self.stage.blast_zone().contains(fighter.position()) {
            return;
        }
        self.release_grab(id, now);
        let Some(fighter) = self.fighters.get_mut(&id) else {
            return;
        };
        fighter.knock_out(now);
        clear_groups(fighter, &mut self.registry);
        debug_assert!(fighter.percent() >= 0.0);
        self.events.publish(CombatEvent::Ko {
            frame: now,
            fighter: id,
            stocks_left: fighter.stocks(),
        });
    }

    fn detect(&mut self, now: Frame) -> Vec<GroupContact> {
        let placements: BTreeMap<FighterId, Placement> = self
            .fighters
            .values()
            .filter(|f| f.in_play())
            .filter_map(|f| {
                let constants = self.roster.get(f.character()).ok()?;
                Some((
                    f.id(),
                    Placement {
                        origin: f.position(),
                        facing_sign: f.facing().sign(),
                        intangible: f.is_intangible(now, constants, &self.config),
                    },
                ))
            })
            .collect();
        self.registry.detect(|id| placements.get(&id).copied())
    }

    // ========================================================================
    // Hitbox groups
    // ========================================================================

    /// Brings a fighter's groups in line with its state.
    ///
    /// The body group lives while the fighter is in play, the shield group
    /// while it shields, and one group per active move window. A new state
    /// cancels the previous move's groups.
    fn sync_groups(&mut self, id: FighterId, now: Frame) {
        let Some(fighter) = self.fighters.get_mut(&id) else {
            return;
        };
        let registry = &mut self.registry;
        if !fighter.in_play() {
            clear_groups(fighter, registry);
            return;
        }
        let Ok(constants) = self.roster.get(fighter.character()) else {
            return;
        };

        if fighter.body_group.is_none() {
            fighter.body_group = Some(registry.spawn(id, constants.body_hitboxes()));
        }

        let shielding = fighter.state() == State::Shield;
        match fighter.shield_group {
            Some(group) if shielding => {
                let hitbox = shield::shield_hitbox(constants, fighter.shield_health(), &self.config);
                if let Err(err) = registry.replace_hitboxes(group, vec![hitbox]) {
                    warn!(fighter = %id, %err, "shield group missing");
                    fighter.shield_group = None;
                }
            },
            Some(group) => {
                registry.remove(group);
                fighter.shield_group = None;
            },
            None if shielding => {
                let hitbox = shield::shield_hitbox(constants, fighter.shield_health(), &self.config);
                fighter.shield_group = Some(registry.spawn(id, vec![hitbox]));
            },
            None => {},
        }

        if fighter.state_serial != fighter.move_serial {
            for (_, group) in fighter.move_groups.drain(..) {
                registry.remove(group);
            }
            fighter.opened_windows = 0;
            fighter.move_serial = fighter.state_serial;
        }
        let State::Attack(kind) = fighter.state() else {
            return;
        };
        if kind.is_throw() {
            return;
        }
        let Some(def) = constants.moves.get(kind) else {
            return;
        };
        let elapsed = fighter.elapsed(now);
        let multiplier = self.config.charge_multiplier(fighter.charge());
        for (index, window) in def.windows.iter().enumerate() {
            let bit = window_bit(index);
            let open = fighter.move_groups.iter().position(|(i, _)| *i == index);
            match (window.contains(elapsed), open) {
                (true, None) if fighter.opened_windows & bit == 0 => {
                    let group = registry.spawn(id, window.charged_hitboxes(multiplier));
                    fighter.move_groups.push((index, group));
                    fighter.opened_windows |= bit;
                },
                (false, Some(slot)) => {
                    let (_, group) = fighter.move_groups.swap_remove(slot);
                    registry.remove(group);
                },
                _ => {},
            }
        }
    }

    // ========================================================================
    // Projectiles
    // ========================================================================

    /// Launches the projectile of a fighter's current move, once per use.
    fn fire_projectile(&mut self, id: FighterId, now: Frame) {
        let Some(fighter) = self.fighters.get_mut(&id) else {
            return;
        };
        if !fighter.in_play() || fighter.is_frozen() || fighter.fired_serial == Some(fighter.state_serial) {
            return;
        }
        let State::Attack(kind) = fighter.state() else {
            return;
        };
        let Ok(constants) = self.roster.get(fighter.character()) else {
            return;
        };
        let Some(def) = constants.moves.get(kind).and_then(|m| m.projectile.as_ref()) else {
            return;
        };
        if fighter.elapsed(now) < def.spawn_frame {
            return;
        }
        fighter.fired_serial = Some(fighter.state_serial);

        let (origin, facing) = (fighter.position(), fighter.facing());
        let placement = Projectile::spawn_placement(def, origin, facing);
        let group = self.registry.spawn_transient(id, def.hitboxes.clone(), placement);
        let projectile = Projectile::launch(def, id, group, origin, facing, now);
        debug!(
            owner = %id,
            group = group.raw(),
            position = ?projectile.position,
            velocity = ?projectile.velocity,
            frame = now,
            "projectile fired"
        );
        self.projectiles.push(projectile);
    }

    /// Moves projectiles and removes those that left play.
    fn advance_projectiles(&mut self, now: Frame) {
        let stage = &self.stage;
        let registry = &mut self.registry;
        self.projectiles.retain_mut(|p| {
            if let Some(expiry) = p.advance(stage, now) {
                registry.remove(p.group);
                debug!(owner = %p.owner, group = p.group.raw(), reason = expiry.name(), frame = now, "projectile expired");
                return false;
            }
            match registry.place(p.group, p.placement()) {
                Ok(()) => true,
                Err(err) => {
                    warn!(owner = %p.owner, %err, "projectile lost its group");
                    false
                },
            }
        });
    }

    /// Drops projectiles whose group made contact this frame.
    fn despawn_spent(&mut self, contacts: &[GroupContact], now: Frame) {
        let spent = self.registry.remove_spent(contacts);
        if spent.is_empty() {
            return;
        }
        self.projectiles.retain(|p| !spent.contains(&p.group));
        debug!(count = spent.len(), frame = now, "projectiles spent");
    }

    // ========================================================================
    // Effects
    // ========================================================================

    fn apply_contacts(&mut self, contacts: &[GroupContact], now: Frame) {
        let mut hits: BTreeMap<FighterId, Vec<GroupContact>> = BTreeMap::new();
        let mut blocks: BTreeMap<FighterId, Vec<GroupContact>> = BTreeMap::new();
        for contact in contacts {
            match contact.kind {
                ContactKind::Hit => hits.entry(contact.defender).or_default().push(*contact),
                ContactKind::Shield => blocks.entry(contact.defender).or_default().push(*contact),
                ContactKind::Grab => {},
            }
        }
        for (defender, mut group) in blocks {
            group.sort_by_key(|c| c.attacker_group);
            self.apply_shield_hits(defender, &group, now);
        }
        for (defender, mut group) in hits {
            group.sort_by_key(|c| c.attacker_group);
            self.apply_hits(defender, &group, now);
        }
        for contact in contacts.iter().filter(|c| c.kind == ContactKind::Grab) {
            self.try_grab(contact.attacker, contact.defender, now);
        }
    }

    /// Applies every attack a shield absorbed this frame.
    ///
    /// Shield damage is summed before the break check, so the outcome does
    /// not depend on contact order. A broken shield gives the defender no
    /// hitlag; every attacker still freezes for its own damage.
    fn apply_shield_hits(&mut self, defender_id: FighterId, contacts: &[GroupContact], now: Frame) {
        let Some(defender) = self.fighters.get_mut(&defender_id) else {
            return;
        };
        if defender.state() != State::Shield {
            return;
        }

        let mut health = defender.shield_health();
        let mut stun: Frame = 0;
        let mut total = 0.0;
        let mut absorbed = Vec::with_capacity(contacts.len());
        for contact in contacts {
            let Some(attack) = contact.attack else {
                continue;
            };
            let impact = shield::impact(health, &attack, &self.config);
            health = impact.health;
            stun = stun.max(impact.stun);
            total += impact.damage;
            absorbed.push((*contact, impact.damage, health));
        }
        if absorbed.is_empty() {
            return;
        }
        let broken = health <= 0.0;

        defender.shield_health = health;
        defender.shield_stun = defender.shield_stun.max(stun);
        defender.sdi_ready = false;
        if broken {
            defender.break_shield(now);
        } else {
            defender.hitlag = defender.hitlag.max(knockback::hitlag_frames(total, &self.config));
        }
        debug_assert!((0.0..=self.config.shield_max).contains(&defender.shield_health));
        debug!(defender = %defender_id, damage = total, health, broken, frame = now, "shield hit");

        for (contact, damage, health) in absorbed {
            let thrown = self.projectile(contact.attacker_group).is_some();
            if let Some(attacker) = self.fighters.get_mut(&contact.attacker).filter(|_| !thrown) {
                attacker.hitlag = attacker
                    .hitlag
                    .max(knockback::hitlag_frames(damage, &self.config));
            }
            self.events.publish(CombatEvent::ShieldHit {
                frame: now,
                attacker: contact.attacker,
                defender: defender_id,
                damage,
                health,
            });
        }
        if broken {
            self.events.publish(CombatEvent::ShieldBreak {
                frame: now,
                fighter: defender_id,
            });
        }
    }

    /// Applies every hit a defender took this frame.
    ///
    /// Damage is summed and the strongest launch wins; `contacts` is sorted
    /// by attacker group so ties go to the lowest group id.
    fn apply_hits(&mut self, defender_id: FighterId, contacts: &[GroupContact], now: Frame) {
        let Some(defender) = self.fighters.get(&defender_id) else {
            return;
        };
        if !defender.in_play() {
            return;
        }
        let Ok(constants) = self.roster.get(defender.character()) else {
            return;
        };

        if shield::is_parry(defender.last_shield_release, now, self.config.parry_window) {
            for contact in contacts {
                let lag = contact
                    .attack
                    .map_or(0, |a| knockback::hitlag_frames(a.charged_damage(), &self.config));
                let thrown = self.projectile(contact.attacker_group).is_some();
                if let Some(attacker) = self.fighters.get_mut(&contact.attacker).filter(|_| !thrown) {
                    attacker.hitlag = attacker.hitlag.max(lag) + self.config.parry_attacker_lag;
                }
                debug!(attacker = %contact.attacker, defender = %defender_id, frame = now, "parry");
                self.events.publish(CombatEvent::Parry {
                    frame: now,
                    attacker: contact.attacker,
                    defender: defender_id,
                });
            }
            return;
        }

        let percent = defender.percent();
        let grounded = defender.is_grounded();
        let defender_center = body_center(defender, constants);
        let armor = defender.has_armor(now, constants, &self.config);
        let weight = constants.weight;

        let total: f32 = contacts
            .iter()
            .filter_map(|c| c.attack)
            .map(|a| a.charged_damage())
            .sum();
        let percent = percent + total;
        let di = self.stick(defender_id);

        let mut strongest: Option<Knockback> = None;
        for contact in contacts {
            let Some(attack) = contact.attack else {
                continue;
            };
            let attacker_facing = match self.projectile(contact.attacker_group) {
                Some(projectile) => projectile.facing,
                None => match self.fighters.get(&contact.attacker) {
                    Some(attacker) => attacker.facing(),
                    None => continue,
                },
            };
            let kb = knockback::compute(
                &HitInput {
                    attack,
                    attacker_facing,
                    attacker_center: contact.attacker_center,
                    defender_center,
                    percent,
                    weight,
                    grounded,
                    di,
                },
                &self.config,
            );
            if strongest.map_or(true, |best| kb.launch_speed > best.launch_speed) {
                strongest = Some(kb);
            }
        }
        let Some(kb) = strongest else {
            return;
        };
        let armored = armor.is_some_and(|threshold| kb.launch_speed < threshold);
        let hitlag = knockback::hitlag_frames(total, &self.config);

        if !armored {
            self.release_grab(defender_id, now);
        }
        if let Some(defender) = self.fighters.get_mut(&defender_id) {
            defender.percent = percent;
            debug_assert!(defender.percent >= 0.0);
            if armored {
                defender.hitlag = defender.hitlag.max(hitlag);
                defender.sdi_ready = false;
            } else {
                launch(defender, &kb, now, hitlag);
            }
        }
        debug!(
            defender = %defender_id,
            damage = total,
            launch = kb.launch_speed,
            angle = kb.angle,
            armored,
            frame = now,
            "hit"
        );

        for contact in contacts {
            let damage = contact.attack.map_or(0.0, |a| a.charged_damage());
            let thrown = self.projectile(contact.attacker_group).is_some();
            if let Some(attacker) = self.fighters.get_mut(&contact.attacker).filter(|_| !thrown) {
                attacker.hitlag = attacker
                    .hitlag
                    .max(knockback::hitlag_frames(damage, &self.config));
            }
            self.events.publish(CombatEvent::Hit {
                frame: now,
                attacker: contact.attacker,
                defender: defender_id,
                damage,
                angle: kb.angle,
                launch_speed: kb.launch_speed,
                spike: kb.spike,
                armored,
            });
        }
    }

    /// Starts a grab if the grabber is mid-grab and the victim is free.
    fn try_grab(&mut self, grabber_id: FighterId, victim_id: FighterId, now: Frame) -> bool {
        let (Some(grabber), Some(victim)) = (self.fighters.get(&grabber_id), self.fighters.get(&victim_id)) else {
            return false;
        };
        let ready = grabber.in_play()
            && victim.in_play()
            && grabber.state() == State::Attack(MoveKind::Grab)
            && !matches!(victim.state(), State::Grabbed { .. } | State::Grabbing { .. })
            && !victim.state().is_hitstun()
            && victim.hitlag() == 0;
        if !ready {
            return false;
        }
        if !grabber.grab_cooldowns().can_grab(victim_id, now) {
            debug!(grabber = %grabber_id, victim = %victim_id, frame = now, "re-grab blocked");
            return false;
        }

        if let Some(grabber) = self.fighters.get_mut(&grabber_id) {
            grabber.velocity = Vec2::ZERO;
            grabber.set_state(State::Grabbing { victim: victim_id }, now);
        }
        if let Some(victim) = self.fighters.get_mut(&victim_id) {
            victim.velocity = Vec2::ZERO;
            victim.fast_falling = false;
            victim.set_state(State::Grabbed { grabber: grabber_id }, now);
        }
        self.events.publish(CombatEvent::Grab {
            frame: now,
            grabber: grabber_id,
            victim: victim_id,
        });
        true
    }

    /// Throws the held fighter with the grabber's throw data.
    fn throw(&mut self, grabber_id: FighterId, kind: MoveKind, now: Frame) {
        let Some(grabber) = self.fighters.get(&grabber_id) else {
            return;
        };
        let State::Grabbing { victim: victim_id } = grabber.state() else {
            return;
        };
        if grabber.is_frozen() {
            return;
        }
        let Ok(constants) = self.roster.get(grabber.character()) else {
            return;
        };
        let Some(attack) = constants.moves.get(kind).and_then(MoveDef::throw_attack) else {
            trace!(fighter = %grabber_id, throw = kind.name(), "no throw data");
            return;
        };
        let attacker_center = body_center(grabber, constants);
        let attacker_facing = grabber.facing();
        let Some(victim) = self.fighters.get(&victim_id) else {
            return;
        };
        let Ok(victim_constants) = self.roster.get(victim.character()) else {
            return;
        };

        let damage = attack.charged_damage();
        let kb = knockback::compute(
            &HitInput {
                attack,
                attacker_facing,
                attacker_center,
                defender_center: body_center(victim, victim_constants),
                percent: victim.percent() + damage,
                weight: victim_constants.weight,
                grounded: false,
                di: self.stick(victim_id),
            },
            &self.config,
        );

        if let Some(victim) = self.fighters.get_mut(&victim_id) {
            victim.percent += damage;
            launch(victim, &kb, now, 0);
        }
        if let Some(grabber) = self.fighters.get_mut(&grabber_id) {
            grabber
                .grab_cooldowns
                .start(victim_id, now, self.config.grab_cooldown);
            grabber.set_state(State::Attack(kind), now);
        }
        debug!(grabber = %grabber_id, victim = %victim_id, throw = kind.name(), frame = now, "throw");
        self.events.publish(CombatEvent::Throw {
            frame: now,
            grabber: grabber_id,
            victim: victim_id,
            kind,
        });
        self.events.publish(CombatEvent::Hit {
            frame: now,
            attacker: grabber_id,
            defender: victim_id,
            damage,
            angle: kb.angle,
            launch_speed: kb.launch_speed,
            spike: kb.spike,
            armored: false,
        });
    }

    /// Releases grabs held past the hold limit. No cooldown starts.
    fn expire_grabs(&mut self, now: Frame) {
        let limit = self.config.grab_hold_frames;
        let expired: Vec<FighterId> = self
            .fighters
            .values()
            .filter(|f| matches!(f.state(), State::Grabbing { .. }) && f.elapsed(now) >= limit)
            .map(Fighter::id)
            .collect();
        for id in expired {
            debug!(grabber = %id, frame = now, "grab released");
            self.release_grab(id, now);
        }
    }

    /// Ends the grab `id` takes part in, on both sides.
    fn release_grab(&mut self, id: FighterId, now: Frame) {
        let partner = match self.fighters.get(&id).map(Fighter::state) {
            Some(State::Grabbing { victim }) => victim,
            Some(State::Grabbed { grabber }) => grabber,
            _ => return,
        };
        for fighter_id in [id, partner] {
            if let Some(fighter) = self.fighters.get_mut(&fighter_id) {
                if matches!(fighter.state(), State::Grabbing { .. } | State::Grabbed { .. }) {
                    fighter.finish_action(now);
                }
            }
        }
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// Captures the observable state of every fighter.
    #[must_use]
    pub fn snapshot(&self) -> MatchSnapshot {
        let now = self.frame;
        let fighters = self
            .fighters
            .values()
            .map(|f| {
                let (hurtboxes, hitboxes): (Vec<Hitbox>, Vec<Hitbox>) = if f.in_play() {
                    let placement = Placement {
                        origin: f.position(),
                        facing_sign: f.facing().sign(),
                        intangible: false,
                    };
                    self.registry
                        .world_hitboxes(f.id(), &placement)
                        .into_iter()
                        .partition(|h| h.purpose == HitboxPurpose::Hurt)
                } else {
                    (Vec::new(), Vec::new())
                };
                let remaining = self
                    .roster
                    .get(f.character())
                    .ok()
                    .and_then(|constants| f.remaining(now, constants, &self.config));
                FighterSnapshot {
                    id: f.id(),
                    character: f.character(),
                    position: f.position(),
                    velocity: f.velocity(),
                    facing: f.facing(),
                    state: f.state().name().to_string(),
                    remaining,
                    percent: f.percent(),
                    stocks: f.stocks(),
                    shield_health: f.shield_health(),
                    in_play: f.in_play(),
                    hitboxes,
                    hurtboxes,
                }
            })
            .collect();
        let projectiles = self
            .projectiles
            .iter()
            .map(|p| ProjectileSnapshot {
                owner: p.owner,
                position: p.position,
                velocity: p.velocity,
                hitboxes: self
                    .registry
                    .get(p.group)
                    .map(|g| g.hitboxes().iter().map(|h| h.placed(&p.placement())).collect())
                    .unwrap_or_default(),
            })
            .collect();
        MatchSnapshot {
            frame: now,
            fighters,
            projectiles,
        }
    }
}

/// Puts a hit fighter into hitstun. An airborne launch waits for hitlag to end.
fn launch(fighter: &mut Fighter, kb: &Knockback, now: Frame, hitlag: Frame) {
    fighter.fast_falling = false;
    fighter.airdodge_used = false;
    fighter.shield_stun = 0;
    fighter.hitstun = kb.hitstun;
    fighter.spike = kb.spike;
    fighter.tumble_ready = kb.tumble;
    fighter.hitlag = hitlag;
    fighter.sdi_ready = hitlag > 0;
    fighter.velocity = Vec2::ZERO;
    fighter.pending_launch = None;
    if kb.grounded {
        fighter.set_state(State::GroundedHitstun, now);
        return;
    }
    fighter.leave_ground();
    if hitlag > 0 {
        fighter.pending_launch = Some(kb.velocity);
    } else {
        fighter.velocity = kb.velocity;
    }
    fighter.set_state(State::AirborneHitstun, now);
}

/// World position of a fighter's body centre.
fn body_center(fighter: &Fighter, constants: &CharacterConstants) -> Vec2 {
    let local = constants.body_center();
    fighter.position() + Vec2::new(local.x * fighter.facing().sign(), local.y)
}

fn clear_groups(fighter: &mut Fighter, registry: &mut GroupRegistry) {
    if let Some(group) = fighter.body_group.take() {
        registry.remove(group);
    }
    if let Some(group) = fighter.shield_group.take() {
        registry.remove(group);
    }
    for (_, group) in fighter.move_groups.drain(..) {
        registry.remove(group);
    }
    fighter.opened_windows = 0;
}

fn window_bit(index: usize) -> u64 {
    u32::try_from(index)
        .ok()
        .and_then(|i| 1u64.checked_shl(i))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Button;
    use std::sync::Mutex;

    const P1: FighterId = FighterId::new(1);
    const P2: FighterId = FighterId::new(2);
    const P3: FighterId = FighterId::new(3);
    const BLAZE: CharacterId = CharacterId::new(0);

    /// Proving grounds with fighters spawning 7 units apart.
    fn close_stage() -> Stage {
        let base = Stage::proving_grounds();
        Stage::new(
            "close quarters",
            base.segments().to_vec(),
            *base.blast_zone(),
            vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(7.0, 0.0),
                Vec2::new(14.0, 0.0),
                Vec2::new(-20.0, 0.0),
            ],
        )
        .expect("valid stage")
    }

    fn duel_with_stocks(stocks: u8) -> Match {
        let mut m = Match::new(close_stage(), CharacterTable::builtin(), CombatConfig::default())
            .expect("valid config")
            .with_stocks(stocks);
        m.spawn(P1, BLAZE).expect("spawn P1");
        m.spawn(P2, BLAZE).expect("spawn P2");
        m
    }

    fn duel() -> Match {
        duel_with_stocks(DEFAULT_STOCKS)
    }

    /// Steps one frame; fighters not listed get neutral input.
    fn step_with(m: &mut Match, inputs: &[(FighterId, InputRecord)]) -> Frame {
        let ids: Vec<FighterId> = m.fighters.keys().copied().collect();
        for id in ids {
            m.set_input(id, InputRecord::neutral()).expect("known fighter");
        }
        for (id, input) in inputs {
            m.set_input(*id, *input).expect("known fighter");
        }
        m.step()
    }

    fn idle(m: &mut Match, frames: Frame) {
        for _ in 0..frames {
            step_with(m, &[]);
        }
    }

    fn count(events: &[CombatEvent], name: &str) -> usize {
        events.iter().filter(|e| e.name() == name).count()
    }

    fn percent(m: &Match, id: FighterId) -> f32 {
        m.fighter(id).map_or(-1.0, Fighter::percent)
    }

    #[test]
    fn test_spawn_errors() {
        let mut m = duel();
        assert!(matches!(
            m.spawn(P1, BLAZE),
            Err(SimulationError::DuplicateFighter(id)) if id == P1
        ));
        assert!(matches!(
            m.spawn(P3, CharacterId::new(42)),
            Err(SimulationError::Data(DataError::UnknownCharacter(42)))
        ));
        assert!(matches!(
            m.set_input(P3, InputRecord::neutral()),
            Err(SimulationError::UnknownFighter(_))
        ));
    }

    #[test]
    fn test_spawn_faces_the_centre() {
        let m = duel();
        assert_eq!(m.fighter(P1).map(Fighter::facing), Some(Facing::Right));
        assert_eq!(m.fighter(P2).map(Fighter::facing), Some(Facing::Left));
        assert_eq!(m.fighter(P2).map(Fighter::state), Some(State::Idle));
        // One body group each
        assert_eq!(m.registry().len(), 2);
    }

    #[test]
    fn test_jab_hits_once() {
        let mut m = duel();
        step_with(&mut m, &[(P1, InputRecord::button(Button::Attack))]);
        idle(&mut m, 40);

        let events = m.drain_events();
        assert_eq!(count(&events, "hit"), 1);
        assert_eq!(percent(&m, P2), 3.0);
        assert_eq!(percent(&m, P1), 0.0);
    }

    #[test]
    fn test_hitlag_freezes_both_fighters() {
        let mut m = duel();
        step_with(&mut m, &[(P1, InputRecord::button(Button::Attack))]);
        idle(&mut m, 2);

        let p1 = m.fighter(P1).expect("P1");
        let p2 = m.fighter(P2).expect("P2");
        assert_eq!(p1.hitlag(), 4);
        assert_eq!(p2.hitlag(), 4);
        assert_eq!(p2.state(), State::AirborneHitstun);
        assert_eq!(p2.velocity(), Vec2::ZERO);
        assert!(p2.pending_launch.is_some());

        idle(&mut m, 4);
        let p2 = m.fighter(P2).expect("P2");
        assert_eq!(p2.hitlag(), 0);
        assert!(p2.velocity().x > 0.0);
    }

    #[test]
    fn test_simultaneous_hits_sum_damage() {
        let mut m = duel();
        m.spawn(P3, BLAZE).expect("spawn P3");
        let attack = InputRecord::button(Button::Attack);
        step_with(&mut m, &[(P1, attack), (P3, attack)]);
        idle(&mut m, 5);

        let events = m.drain_events();
        assert_eq!(count(&events, "hit"), 2);
        assert_eq!(percent(&m, P2), 6.0);
        let frames: Vec<Frame> = events
            .iter()
            .filter(|e| e.name() == "hit")
            .map(CombatEvent::frame)
            .collect();
        assert_eq!(frames, vec![2, 2]);
    }

    #[test]
    fn test_shield_absorbs_attack() {
        let mut m = duel();
        let shield = InputRecord::button(Button::Shield);
        step_with(&mut m, &[(P1, InputRecord::button(Button::Attack)), (P2, shield)]);
        for _ in 0..6 {
            step_with(&mut m, &[(P2, shield)]);
        }

        let events = m.drain_events();
        assert_eq!(count(&events, "shield_hit"), 1);
        assert_eq!(count(&events, "hit"), 0);
        let p2 = m.fighter(P2).expect("P2");
        assert_eq!(p2.percent(), 0.0);
        assert_eq!(p2.state(), State::Shield);
        assert!(p2.shield_health() < 57.0);
        assert!(p2.shield_health() > 50.0);
    }

    #[test]
    fn test_shield_breaks_from_damage() {
        let mut m = duel();
        let shield = InputRecord::button(Button::Shield);
        step_with(&mut m, &[(P1, InputRecord::button(Button::Attack)), (P2, shield)]);
        if let Some(p2) = m.fighters.get_mut(&P2) {
            p2.shield_health = 2.0;
        }
        step_with(&mut m, &[(P2, shield)]);
        step_with(&mut m, &[(P2, shield)]);

        let events = m.drain_events();
        assert_eq!(count(&events, "shield_break"), 1);
        let p2 = m.fighter(P2).expect("P2");
        assert_eq!(p2.state(), State::ShieldBroken);
        assert_eq!(p2.shield_health(), 0.0);
    }

    #[test]
    fn test_shield_break_stun_ignores_hitlag() {
        let mut m = duel();
        let shield = InputRecord::button(Button::Shield);
        step_with(&mut m, &[(P1, InputRecord::button(Button::Attack)), (P2, shield)]);
        if let Some(p2) = m.fighters.get_mut(&P2) {
            p2.shield_health = 2.0;
        }
        let mut broke_at = None;
        for _ in 0..4 {
            let frame = step_with(&mut m, &[(P2, shield)]);
            if m.fighter(P2).map(Fighter::state) == Some(State::ShieldBroken) {
                broke_at = Some(frame);
                break;
            }
        }
        let broke_at = broke_at.expect("jab breaks the shield");
        let events = m.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, CombatEvent::ShieldHit { health, .. } if *health == 0.0)));
        assert_eq!(m.fighter(P2).map(Fighter::hitlag), Some(0));
        assert!(m.fighter(P1).map_or(0, Fighter::hitlag) > 0);

        let stun = m.config().shield_break_frames;
        let mut ended_at = None;
        for _ in 0..stun + 20 {
            let frame = step_with(&mut m, &[]);
            if m.fighter(P2).map(Fighter::state) != Some(State::ShieldBroken) {
                ended_at = Some(frame);
                break;
            }
        }
        assert_eq!(ended_at, Some(broke_at + stun));
        let p2 = m.fighter(P2).expect("P2");
        assert_eq!(p2.state(), State::Idle);
        assert_eq!(p2.shield_health(), m.config().shield_max / 2.0);
    }

    #[test]
    fn test_simultaneous_shield_hits_all_land() {
        let mut m = duel();
        m.spawn(P3, BLAZE).expect("spawn P3");
        let attack = InputRecord::button(Button::Attack);
        let shield = InputRecord::button(Button::Shield);
        step_with(&mut m, &[(P1, attack), (P2, shield), (P3, attack)]);
        // Either jab alone empties what is left
        if let Some(p2) = m.fighters.get_mut(&P2) {
            p2.shield_health = 2.0;
        }
        step_with(&mut m, &[(P2, shield)]);
        step_with(&mut m, &[(P2, shield)]);

        let events = m.drain_events();
        let attackers: Vec<FighterId> = events
            .iter()
            .filter_map(|e| match e {
                CombatEvent::ShieldHit { attacker, .. } => Some(*attacker),
                _ => None,
            })
            .collect();
        assert_eq!(attackers.len(), 2);
        assert!(attackers.contains(&P1) && attackers.contains(&P3));
        assert_eq!(count(&events, "shield_break"), 1);
        assert_eq!(count(&events, "hit"), 0);
        assert!(m.fighter(P1).map_or(0, Fighter::hitlag) > 0);
        assert!(m.fighter(P3).map_or(0, Fighter::hitlag) > 0);
        let p2 = m.fighter(P2).expect("P2");
        assert_eq!(p2.state(), State::ShieldBroken);
        assert_eq!(p2.hitlag(), 0);
        assert_eq!(p2.percent(), 0.0);
    }

    #[test]
    fn test_run_brake_blocks_immediate_dash() {
        let mut m = duel();
        if let Some(p1) = m.fighters.get_mut(&P1) {
            p1.set_state(State::Run, 0);
        }
        step_with(&mut m, &[]);
        assert_eq!(m.fighter(P1).map(Fighter::state), Some(State::RunEnd));
        step_with(&mut m, &[(P1, InputRecord::smash(Vec2::new(1.0, 0.0)))]);
        assert_eq!(m.fighter(P1).map(Fighter::state), Some(State::RunEnd));
    }

    #[test]
    fn test_projectile_hits_one_target_then_vanishes() {
        let mut m = duel();
        m.spawn(P3, BLAZE).expect("spawn P3");
        step_with(&mut m, &[(P1, InputRecord::button(Button::Special))]);
        idle(&mut m, 11);
        assert!(m.projectiles().is_empty());

        // Fired on frame 12 and already overlapping P2
        step_with(&mut m, &[]);
        let events = m.drain_events();
        assert_eq!(count(&events, "hit"), 1);
        assert_eq!(percent(&m, P2), 6.0);
        assert_eq!(m.fighter(P1).map_or(1, Fighter::hitlag), 0);
        assert!(m.projectiles().is_empty());
        assert!(m.registry().iter().all(|g| !g.is_transient()));

        idle(&mut m, 40);
        assert_eq!(count(&m.drain_events(), "hit"), 0);
        assert_eq!(percent(&m, P3), 0.0);
    }

    #[test]
    fn test_projectile_fizzles_after_lifetime() {
        let mut m = duel();
        if let Some(p1) = m.fighters.get_mut(&P1) {
            p1.facing = Facing::Left;
        }
        step_with(&mut m, &[(P1, InputRecord::button(Button::Special))]);
        idle(&mut m, 12);

        let snapshot = m.snapshot();
        assert_eq!(snapshot.projectiles.len(), 1);
        let shot = &snapshot.projectiles[0];
        assert_eq!(shot.owner, P1);
        assert!(shot.velocity.x < 0.0);
        assert!((shot.position - Vec2::new(-8.2, 6.0)).length() < 1e-4);
        assert_eq!(shot.hitboxes.len(), 1);

        // One projectile per use of the move
        idle(&mut m, 30);
        assert_eq!(m.projectiles().len(), 1);

        idle(&mut m, 40);
        assert!(m.projectiles().is_empty());
        assert!(m.registry().iter().all(|g| !g.is_transient()));
        assert_eq!(count(&m.drain_events(), "hit"), 0);
    }

    #[test]
    fn test_shield_absorbs_projectile() {
        let mut m = duel();
        let shield = InputRecord::button(Button::Shield);
        step_with(&mut m, &[(P1, InputRecord::button(Button::Special)), (P2, shield)]);
        for _ in 0..14 {
            step_with(&mut m, &[(P2, shield)]);
        }

        let events = m.drain_events();
        assert_eq!(count(&events, "shield_hit"), 1);
        assert_eq!(count(&events, "hit"), 0);
        assert_eq!(percent(&m, P2), 0.0);
        assert_eq!(m.fighter(P1).map_or(1, Fighter::hitlag), 0);
        assert!(m.projectiles().is_empty());
    }

    #[test]
    fn test_parry_after_shield_release() {
        let mut m = duel();
        step_with(&mut m, &[(P2, InputRecord::button(Button::Shield))]);
        // P2 lets go of shield as P1 starts a jab
        step_with(&mut m, &[(P1, InputRecord::button(Button::Attack))]);
        idle(&mut m, 2);

        let events = m.drain_events();
        assert_eq!(count(&events, "parry"), 1);
        assert_eq!(count(&events, "hit"), 0);
        assert_eq!(percent(&m, P2), 0.0);
        let p1 = m.fighter(P1).expect("P1");
        assert_eq!(p1.hitlag(), 4 + m.config().parry_attacker_lag);
    }

    #[test]
    fn test_grab_and_throw() {
        let mut m = duel();
        step_with(&mut m, &[(P1, InputRecord::button(Button::Grab))]);
        idle(&mut m, 7);
        assert_eq!(
            m.fighter(P2).map(Fighter::state),
            Some(State::Grabbed { grabber: P1 })
        );

        let thrown_at = step_with(&mut m, &[(P1, InputRecord::smash(Vec2::new(1.0, 0.0)))]);
        let events = m.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            CombatEvent::Throw { kind: MoveKind::ForwardThrow, .. }
        )));
        assert_eq!(percent(&m, P2), 8.0);
        assert_eq!(m.fighter(P2).map(Fighter::state), Some(State::AirborneHitstun));
        assert_eq!(
            m.fighter(P1).and_then(|f| f.grab_cooldowns().blocked_until(P2)),
            Some(thrown_at + 60)
        );
    }

    #[test]
    fn test_no_chaingrab_within_cooldown() {
        let mut m = duel();
        step_with(&mut m, &[(P1, InputRecord::button(Button::Grab))]);
        idle(&mut m, 7);
        let thrown_at = step_with(&mut m, &[(P1, InputRecord::smash(Vec2::new(1.0, 0.0)))]);

        let reset = |m: &mut Match| {
            if let Some(p1) = m.fighters.get_mut(&P1) {
                p1.set_state(State::Attack(MoveKind::Grab), thrown_at);
            }
            if let Some(p2) = m.fighters.get_mut(&P2) {
                p2.set_state(State::Idle, thrown_at);
                p2.hitstun = 0;
                p2.hitlag = 0;
            }
        };
        reset(&mut m);
        assert!(!m.try_grab(P1, P2, thrown_at + 60));
        reset(&mut m);
        assert!(m.try_grab(P1, P2, thrown_at + 61));
    }

    #[test]
    fn test_grab_hold_expires_without_cooldown() {
        let mut m = duel();
        step_with(&mut m, &[(P1, InputRecord::button(Button::Grab))]);
        idle(&mut m, 8);
        // Held in front of the grabber
        assert_eq!(
            m.fighter(P2).map(Fighter::position),
            Some(Vec2::new(m.config().grab_hold_offset, 0.0))
        );
        let hold = m.config().grab_hold_frames;
        idle(&mut m, hold);

        let p1 = m.fighter(P1).expect("P1");
        assert!(!matches!(p1.state(), State::Grabbing { .. }));
        assert!(p1.grab_cooldowns().is_empty());
        assert!(!matches!(
            m.fighter(P2).map(Fighter::state),
            Some(State::Grabbed { .. })
        ));
    }

    #[test]
    fn test_super_armor_absorbs_weak_hit() {
        let mut m = duel();
        let down_special = InputRecord::tilt(Vec2::new(0.0, -1.0)).with_button(Button::Special);
        step_with(&mut m, &[(P2, down_special)]);
        step_with(&mut m, &[]);
        step_with(&mut m, &[(P1, InputRecord::button(Button::Attack))]);
        idle(&mut m, 2);

        let events = m.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, CombatEvent::Hit { armored: true, .. })));
        assert_eq!(percent(&m, P2), 3.0);
        assert_eq!(
            m.fighter(P2).map(Fighter::state),
            Some(State::Attack(MoveKind::DownSpecial))
        );
    }

    #[test]
    fn test_smash_charge_scales_damage() {
        fn forward_smash(hold: bool) -> f32 {
            let mut m = duel();
            let start = InputRecord::smash(Vec2::new(1.0, 0.0)).with_button(Button::Attack);
            step_with(&mut m, &[(P1, start)]);
            for _ in 0..100 {
                let input = if hold {
                    InputRecord::button(Button::Attack)
                } else {
                    InputRecord::neutral()
                };
                step_with(&mut m, &[(P1, input)]);
            }
            percent(&m, P2)
        }
        assert!((forward_smash(false) - 16.0).abs() < 1e-4);
        assert!((forward_smash(true) - 24.0).abs() < 1e-4);
    }

    #[test]
    fn test_knock_out_and_respawn() {
        let mut m = duel_with_stocks(2);
        let drop_off = |m: &mut Match| {
            if let Some(p2) = m.fighters.get_mut(&P2) {
                p2.position = Vec2::new(0.0, -150.0);
                p2.ground = None;
                p2.set_state(State::IdleAirborne, 0);
            }
        };

        drop_off(&mut m);
        step_with(&mut m, &[]);
        let events = m.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, CombatEvent::Ko { stocks_left: 1, .. })));
        let p2 = m.fighter(P2).expect("P2");
        assert!(!p2.in_play());
        assert_eq!(p2.percent(), 0.0);
        assert!(m.registry().iter().all(|g| g.owner() != P2));

        m.respawn(P2).expect("stocks left");
        let p2 = m.fighter(P2).expect("P2");
        assert!(p2.in_play());
        assert_eq!(p2.position(), Vec2::new(7.0, RESPAWN_HEIGHT));
        assert_eq!(p2.state(), State::IdleAirborne);
        assert!(matches!(m.respawn(P2), Err(SimulationError::StillInPlay(_))));

        drop_off(&mut m);
        step_with(&mut m, &[]);
        assert_eq!(m.fighter(P2).map(Fighter::stocks), Some(0));
        assert!(matches!(m.respawn(P2), Err(SimulationError::NoStocks(_))));
        assert!(m.is_finished());
        assert_eq!(m.winner(), Some(P1));
    }

    #[test]
    fn test_respawn_is_intangible() {
        let mut m = duel();
        if let Some(p2) = m.fighters.get_mut(&P2) {
            p2.knock_out(0);
        }
        m.respawn(P2).expect("stocks left");
        idle(&mut m, 10);
        let p2 = m.fighter(P2).expect("P2");
        let constants = m.roster().get(BLAZE).expect("builtin");
        assert!(p2.is_intangible(m.frame(), constants, m.config()));
        // No gravity while intangible
        assert_eq!(p2.position().y, RESPAWN_HEIGHT);
    }

    #[test]
    fn test_identical_inputs_give_identical_matches() {
        fn play() -> String {
            let mut m = duel();
            m.spawn(P3, CharacterId::new(1)).expect("spawn P3");
            for frame in 0..180 {
                let p1 = match frame % 40 {
                    0 => InputRecord::smash(Vec2::new(1.0, 0.0)),
                    10 => InputRecord::button(Button::Attack),
                    25 => InputRecord::button(Button::Jump),
                    _ => InputRecord::neutral(),
                };
                let p3 = match frame % 30 {
                    0 => InputRecord::smash(Vec2::new(-1.0, 0.0)),
                    5 => InputRecord::button(Button::Grab),
                    _ => InputRecord::tilt(Vec2::new(-1.0, 0.0)),
                };
                step_with(&mut m, &[(P1, p1), (P3, p3)]);
            }
            m.snapshot().to_json().expect("serializable")
        }
        assert_eq!(play(), play());
    }

    #[test]
    fn test_snapshot_contents() {
        let mut m = duel();
        step_with(&mut m, &[(P1, InputRecord::button(Button::Attack))]);
        step_with(&mut m, &[]);
        step_with(&mut m, &[]);

        let snapshot = m.snapshot();
        assert_eq!(snapshot.frame, 3);
        assert_eq!(snapshot.fighters.len(), 2);
        let p1 = &snapshot.fighters[0];
        assert_eq!(p1.state, "Jab1");
        assert_eq!(p1.hurtboxes.len(), 1);
        assert_eq!(p1.hitboxes.len(), 1);
        assert!(snapshot.to_json().expect("json").contains("\"stocks\":4"));
    }

    #[test]
    fn test_dispatch_events_to_handler() {
        struct Collect(Mutex<Vec<String>>);
        impl EventHandler for Collect {
            fn handle(&self, event: &CombatEvent) {
                if let Ok(mut names) = self.0.lock() {
                    names.push(event.name().to_string());
                }
            }
        }

        let mut m = duel();
        step_with(&mut m, &[(P1, InputRecord::button(Button::Attack))]);
        idle(&mut m, 3);
        let handler = Collect(Mutex::new(Vec::new()));
        assert_eq!(m.dispatch_events(&handler), 1);
        assert_eq!(
            handler.0.lock().map(|names| names.clone()).unwrap_or_default(),
            vec!["hit".to_string()]
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CombatConfig {
            shield_max: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            Match::new(Stage::proving_grounds(), CharacterTable::builtin(), config),
            Err(SimulationError::Data(_))
        ));
    }
}
