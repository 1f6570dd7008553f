//! Maps a frame of input to an action request.
//!
//! The resolver only decides what the player asked for. Whether the fighter
//! can do it right now is checked by [`crate::fighter::Fighter::request`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::input::{Button, ButtonSet, Cardinal, DirectionalAction, Facing, InputRecord};
use crate::fighter_state::State;
use crate::moves::{MoveKind, MoveSet, Relative};

/// A transition asked of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActionRequest {
    /// Start a grounded jump
    Jump,
    /// Midair jump
    DoubleJump,
    /// Jump off a wall
    WallJump {
        /// Wall normal
        normal: Vec2,
    },
    /// Start a move, optionally turning first
    Attack {
        /// Move to start
        kind: MoveKind,
        /// New facing
        facing: Option<Facing>,
    },
    /// Throw the held fighter
    Throw(MoveKind),
    /// Raise shield
    Shield,
    /// Air dodge in a direction
    Airdodge(Vec2),
    /// Dodge in place
    Spotdodge,
    /// Roll toward a side
    Roll(Facing),
    /// Dash toward a side
    Dash(Facing),
    /// Walk toward a side
    Walk(Facing),
    /// Turn around
    Turn,
    /// Crouch down
    Crouch,
    /// Slide backwards out of a dash
    Moonwalk,
    /// Start fast falling
    FastFall,
    /// Drop through the platform underfoot
    DropThrough,
}

impl ActionRequest {
    /// Short name for traces.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Jump => "jump",
            Self::DoubleJump => "double_jump",
            Self::WallJump { .. } => "wall_jump",
            Self::Attack { .. } => "attack",
            Self::Throw(_) => "throw",
            Self::Shield => "shield",
            Self::Airdodge(_) => "airdodge",
            Self::Spotdodge => "spotdodge",
            Self::Roll(_) => "roll",
            Self::Dash(_) => "dash",
            Self::Walk(_) => "walk",
            Self::Turn => "turn",
            Self::Crouch => "crouch",
            Self::Moonwalk => "moonwalk",
            Self::FastFall => "fast_fall",
            Self::DropThrough => "drop_through",
        }
    }
}

/// Everything the resolver looks at.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    /// Current state
    pub state: State,
    /// Standing on a surface
    pub grounded: bool,
    /// The surface underfoot is a platform
    pub on_platform: bool,
    /// Current facing
    pub facing: Facing,
    /// This frame's input
    pub input: &'a InputRecord,
    /// Buttons pressed this frame
    pub pressed: ButtonSet,
    /// Current velocity
    pub velocity: Vec2,
    /// A midair jump is left
    pub has_jump: bool,
    /// The air dodge has not been used this airborne phase
    pub can_airdodge: bool,
    /// Normal of a wall touched within the wall jump window
    pub wall: Option<Vec2>,
    /// Already fast falling
    pub fast_falling: bool,
    /// Stick y at or below which the fighter drops through platforms
    pub drop_threshold: f32,
    /// Stick y below the negated value crouches
    pub crouch_threshold: f32,
    /// Move table, used to gate specials
    pub moves: &'a MoveSet,
}

impl ActionContext<'_> {
    fn pressed(&self, button: Button) -> bool {
        self.pressed.contains(button)
    }

    fn smash(&self) -> Option<Cardinal> {
        self.input.directional.and_then(|d| d.smash())
    }

    fn relative(&self, cardinal: Option<Cardinal>) -> Relative {
        Relative::from_cardinal(cardinal, self.facing)
    }

    fn crouching(&self) -> bool {
        self.input.stick_cardinal() == Some(Cardinal::Down)
            && self.input.stick.y < -self.crouch_threshold
    }

    fn allowed(&self, kind: MoveKind) -> bool {
        self.moves
            .get(kind)
            .is_some_and(|def| def.allowed(self.grounded))
    }
}

/// Picks the request for this frame, if any.
#[must_use]
pub fn resolve(ctx: &ActionContext<'_>) -> Option<ActionRequest> {
    match ctx.state {
        State::Grabbed { .. } => None,
        State::Grabbing { .. } => resolve_throw(ctx),
        State::Shield => resolve_shield(ctx),
        State::JumpSquat => ctx
            .pressed(Button::Shield)
            .then(|| ActionRequest::Airdodge(ctx.input.stick_direction())),
        _ if ctx.grounded => resolve_grounded(ctx),
        _ => resolve_airborne(ctx),
    }
}

fn resolve_throw(ctx: &ActionContext<'_>) -> Option<ActionRequest> {
    let cardinal = ctx
        .input
        .directional
        .and_then(|d| d.cardinal())
        .or_else(|| ctx.pressed(Button::Attack).then(|| ctx.input.stick_cardinal()).flatten());
    if cardinal.is_none() && !ctx.pressed(Button::Attack) {
        return None;
    }
    Some(ActionRequest::Throw(MoveKind::throw(ctx.relative(cardinal))))
}

fn resolve_shield(ctx: &ActionContext<'_>) -> Option<ActionRequest> {
    if ctx.pressed(Button::Jump) {
        return Some(ActionRequest::Jump);
    }
    if ctx.pressed(Button::Grab) || ctx.pressed(Button::Attack) {
        return Some(ActionRequest::Attack {
            kind: MoveKind::Grab,
            facing: None,
        });
    }
    shield_dodge(ctx)
}

/// Roll or spotdodge from a smash while shield is held.
fn shield_dodge(ctx: &ActionContext<'_>) -> Option<ActionRequest> {
    match ctx.smash()? {
        Cardinal::Down => Some(ActionRequest::Spotdodge),
        Cardinal::Up => None,
        side => side.facing().map(ActionRequest::Roll),
    }
}

fn resolve_grounded(ctx: &ActionContext<'_>) -> Option<ActionRequest> {
    let input = ctx.input;

    if ctx.pressed(Button::Jump) {
        return Some(ActionRequest::Jump);
    }
    if ctx.pressed(Button::Shield) {
        return shield_dodge(ctx).or(Some(ActionRequest::Shield));
    }
    if ctx.pressed(Button::Grab) {
        return Some(ActionRequest::Attack {
            kind: MoveKind::Grab,
            facing: None,
        });
    }
    if ctx.pressed(Button::Special) {
        return special(ctx);
    }
    if ctx.pressed(Button::Attack) {
        if let Some(direction) = ctx.smash() {
            return Some(ActionRequest::Attack {
                kind: MoveKind::smash(ctx.relative(Some(direction))),
                facing: direction.facing(),
            });
        }
        if let State::Attack(current) = ctx.state {
            if let Some(next) = current.next_jab() {
                return Some(ActionRequest::Attack {
                    kind: next,
                    facing: None,
                });
            }
        }
        let stick = input.stick_cardinal();
        return Some(ActionRequest::Attack {
            kind: MoveKind::tilt(ctx.relative(stick)),
            facing: stick.and_then(Cardinal::facing),
        });
    }

    if ctx.state == State::Dash
        && matches!(input.directional, Some(DirectionalAction::HalfCircle(_)))
    {
        return Some(ActionRequest::Moonwalk);
    }

    match ctx.state {
        State::Idle | State::Walk | State::Dash | State::Run | State::RunEnd | State::Crouch => {},
        State::LandCrouch => return ctx.crouching().then_some(ActionRequest::Crouch),
        _ => return None,
    }

    if ctx.on_platform && input.stick.y <= -ctx.drop_threshold {
        return Some(ActionRequest::DropThrough);
    }
    if ctx.state == State::Crouch {
        return None;
    }

    let running = matches!(ctx.state, State::Run | State::RunEnd);
    if let Some(side) = ctx.smash().and_then(Cardinal::facing) {
        return match ctx.state {
            _ if running && side != ctx.facing => Some(ActionRequest::Turn),
            // Braking out of a run never dashes forward
            State::RunEnd => None,
            _ => Some(ActionRequest::Dash(side)),
        };
    }

    if ctx.state != State::Dash && ctx.crouching() {
        return Some(ActionRequest::Crouch);
    }

    let side = input.stick_cardinal().and_then(Cardinal::facing)?;
    match ctx.state {
        State::Idle if side == ctx.facing => Some(ActionRequest::Walk(side)),
        State::Idle | State::Walk if side != ctx.facing => Some(ActionRequest::Turn),
        _ if running && side != ctx.facing => Some(ActionRequest::Turn),
        _ => None,
    }
}

fn resolve_airborne(ctx: &ActionContext<'_>) -> Option<ActionRequest> {
    let smash = ctx.smash();

    if let Some(normal) = ctx.wall {
        let away_smash = smash
            .and_then(Cardinal::facing)
            .is_some_and(|side| side.sign() * normal.x > 0.0);
        if ctx.pressed(Button::Jump) || away_smash {
            return Some(ActionRequest::WallJump { normal });
        }
    }
    if ctx.pressed(Button::Jump) && ctx.has_jump {
        return Some(ActionRequest::DoubleJump);
    }
    if ctx.pressed(Button::Shield) && ctx.can_airdodge {
        return Some(ActionRequest::Airdodge(ctx.input.stick_direction()));
    }
    if ctx.pressed(Button::Special) {
        return special(ctx);
    }
    if ctx.pressed(Button::Attack) {
        let direction = smash.or_else(|| ctx.input.stick_cardinal());
        return Some(ActionRequest::Attack {
            kind: MoveKind::aerial(ctx.relative(direction)),
            facing: None,
        });
    }
    if smash == Some(Cardinal::Down) && ctx.velocity.y < 0.0 && !ctx.fast_falling {
        return Some(ActionRequest::FastFall);
    }
    None
}

fn special(ctx: &ActionContext<'_>) -> Option<ActionRequest> {
    let stick = ctx
        .smash()
        .or_else(|| ctx.input.stick_cardinal());
    let kind = MoveKind::special(ctx.relative(stick));
    ctx.allowed(kind).then(|| ActionRequest::Attack {
        kind,
        facing: stick.and_then(Cardinal::facing),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::CharacterTable;
    use clash_common::CharacterId;

    struct Harness {
        moves: MoveSet,
    }

    impl Harness {
        fn new() -> Self {
            let moves = CharacterTable::builtin()
                .get(CharacterId::new(0))
                .map(|c| c.moves.clone())
                .expect("builtin");
            Self { moves }
        }

        fn resolve(&self, state: State, grounded: bool, input: InputRecord) -> Option<ActionRequest> {
            self.resolve_with(state, grounded, input, |_| {})
        }

        fn resolve_with(
            &self,
            state: State,
            grounded: bool,
            input: InputRecord,
            tweak: impl FnOnce(&mut ActionContext<'_>),
        ) -> Option<ActionRequest> {
            let mut ctx = ActionContext {
                state,
                grounded,
                on_platform: false,
                facing: Facing::Right,
                input: &input,
                pressed: input.buttons,
                velocity: Vec2::ZERO,
                has_jump: true,
                can_airdodge: true,
                wall: None,
                fast_falling: false,
                drop_threshold: 0.7,
                crouch_threshold: 0.4,
                moves: &self.moves,
            };
            tweak(&mut ctx);
            resolve(&ctx)
        }
    }

    #[test]
    fn test_grounded_attacks() {
        let h = Harness::new();
        assert_eq!(
            h.resolve(State::Idle, true, InputRecord::button(Button::Attack)),
            Some(ActionRequest::Attack { kind: MoveKind::Jab1, facing: None })
        );
        assert_eq!(
            h.resolve(
                State::Idle,
                true,
                InputRecord::smash(Vec2::new(-1.0, 0.0)).with_button(Button::Attack)
            ),
            Some(ActionRequest::Attack {
                kind: MoveKind::ForwardSmash,
                facing: Some(Facing::Left)
            })
        );
        assert_eq!(
            h.resolve(
                State::Idle,
                true,
                InputRecord::tilt(Vec2::new(0.0, 1.0)).with_button(Button::Attack)
            ),
            Some(ActionRequest::Attack { kind: MoveKind::UpTilt, facing: None })
        );
    }

    #[test]
    fn test_jab_chain() {
        let h = Harness::new();
        assert_eq!(
            h.resolve(State::Attack(MoveKind::Jab1), true, InputRecord::button(Button::Attack)),
            Some(ActionRequest::Attack { kind: MoveKind::Jab2, facing: None })
        );
        assert_eq!(
            h.resolve(State::Attack(MoveKind::Jab2), true, InputRecord::button(Button::Attack)),
            Some(ActionRequest::Attack { kind: MoveKind::Jab3, facing: None })
        );
    }

    #[test]
    fn test_aerials_relative_to_facing() {
        let h = Harness::new();
        let back = InputRecord::tilt(Vec2::new(-1.0, 0.0)).with_button(Button::Attack);
        assert_eq!(
            h.resolve(State::Airborne, false, back),
            Some(ActionRequest::Attack { kind: MoveKind::BackAir, facing: None })
        );
        assert_eq!(
            h.resolve(State::IdleAirborne, false, InputRecord::button(Button::Attack)),
            Some(ActionRequest::Attack { kind: MoveKind::NeutralAir, facing: None })
        );
    }

    #[test]
    fn test_specials_are_gated_by_context() {
        let h = Harness::new();
        let down_b = InputRecord::tilt(Vec2::new(0.0, -1.0)).with_button(Button::Special);
        assert_eq!(
            h.resolve(State::Idle, true, down_b),
            Some(ActionRequest::Attack { kind: MoveKind::DownSpecial, facing: None })
        );
        assert_eq!(h.resolve(State::IdleAirborne, false, down_b), None);

        let up_b = InputRecord::tilt(Vec2::new(0.0, 1.0)).with_button(Button::Special);
        assert!(h.resolve(State::IdleAirborne, false, up_b).is_some());
    }

    #[test]
    fn test_shield_options() {
        let h = Harness::new();
        let shield = InputRecord::button(Button::Shield);
        assert_eq!(h.resolve(State::Idle, true, shield), Some(ActionRequest::Shield));

        let roll = InputRecord::smash(Vec2::new(1.0, 0.0)).with_button(Button::Shield);
        assert_eq!(
            h.resolve_with(State::Shield, true, roll, |ctx| ctx.pressed = ButtonSet::EMPTY),
            Some(ActionRequest::Roll(Facing::Right))
        );

        let spot = InputRecord::smash(Vec2::new(0.0, -1.0)).with_button(Button::Shield);
        assert_eq!(
            h.resolve_with(State::Shield, true, spot, |ctx| ctx.pressed = ButtonSet::EMPTY),
            Some(ActionRequest::Spotdodge)
        );

        let grab = InputRecord::button(Button::Attack).with_button(Button::Shield);
        assert_eq!(
            h.resolve(State::Shield, true, grab),
            Some(ActionRequest::Attack { kind: MoveKind::Grab, facing: None })
        );
    }

    #[test]
    fn test_locomotion() {
        let h = Harness::new();
        let right = Vec2::new(1.0, 0.0);
        let left = Vec2::new(-1.0, 0.0);
        assert_eq!(
            h.resolve(State::Idle, true, InputRecord::smash(left)),
            Some(ActionRequest::Dash(Facing::Left))
        );
        assert_eq!(
            h.resolve(State::Idle, true, InputRecord::neutral().with_stick(right)),
            Some(ActionRequest::Walk(Facing::Right))
        );
        assert_eq!(
            h.resolve(State::Run, true, InputRecord::neutral().with_stick(left)),
            Some(ActionRequest::Turn)
        );
        assert_eq!(
            h.resolve(
                State::Dash,
                true,
                InputRecord::neutral()
                    .with_directional(DirectionalAction::HalfCircle(crate::input::Rotation::Clockwise))
            ),
            Some(ActionRequest::Moonwalk)
        );
    }

    #[test]
    fn test_drop_through_only_on_platforms() {
        let h = Harness::new();
        let down = InputRecord::neutral().with_stick(Vec2::new(0.0, -1.0));
        assert_eq!(h.resolve(State::Idle, true, down), Some(ActionRequest::Crouch));
        assert_eq!(
            h.resolve_with(State::Idle, true, down, |ctx| ctx.on_platform = true),
            Some(ActionRequest::DropThrough)
        );
        assert_eq!(
            h.resolve_with(State::Crouch, true, down, |ctx| ctx.on_platform = true),
            Some(ActionRequest::DropThrough)
        );
    }

    #[test]
    fn test_crouch_requests() {
        let h = Harness::new();
        let down = InputRecord::neutral().with_stick(Vec2::new(0.0, -1.0));
        let shallow = InputRecord::neutral().with_stick(Vec2::new(0.0, -0.35));
        assert_eq!(h.resolve(State::Idle, true, shallow), None);
        assert_eq!(h.resolve(State::Run, true, down), Some(ActionRequest::Crouch));
        assert_eq!(h.resolve(State::LandCrouch, true, down), Some(ActionRequest::Crouch));
        assert_eq!(h.resolve(State::Crouch, true, down), None);
        assert_eq!(h.resolve(State::Dash, true, down), None);
        assert_eq!(
            h.resolve(State::Crouch, true, InputRecord::button(Button::Jump)),
            Some(ActionRequest::Jump)
        );
        assert_eq!(
            h.resolve(State::Crouch, true, down.with_button(Button::Attack)),
            Some(ActionRequest::Attack { kind: MoveKind::DownTilt, facing: None })
        );
    }

    #[test]
    fn test_run_end_rejects_forward_dash() {
        let h = Harness::new();
        let forward = InputRecord::smash(Vec2::new(1.0, 0.0));
        let back = InputRecord::smash(Vec2::new(-1.0, 0.0));
        assert_eq!(h.resolve(State::RunEnd, true, forward), None);
        assert_eq!(h.resolve(State::RunEnd, true, back), Some(ActionRequest::Turn));
        assert_eq!(
            h.resolve(State::RunEnd, true, InputRecord::neutral().with_stick(Vec2::new(-1.0, 0.0))),
            Some(ActionRequest::Turn)
        );
        assert_eq!(
            h.resolve(State::Idle, true, forward),
            Some(ActionRequest::Dash(Facing::Right))
        );
    }

    #[test]
    fn test_jumps() {
        let h = Harness::new();
        let jump = InputRecord::button(Button::Jump);
        assert_eq!(h.resolve(State::Idle, true, jump), Some(ActionRequest::Jump));
        assert_eq!(h.resolve(State::Airborne, false, jump), Some(ActionRequest::DoubleJump));
        assert_eq!(
            h.resolve_with(State::Airborne, false, jump, |ctx| ctx.has_jump = false),
            None
        );
        let normal = Vec2::new(-1.0, 0.0);
        assert_eq!(
            h.resolve_with(State::Airborne, false, jump, |ctx| ctx.wall = Some(normal)),
            Some(ActionRequest::WallJump { normal })
        );
        let away = InputRecord::smash(Vec2::new(-1.0, 0.0));
        assert_eq!(
            h.resolve_with(State::Airborne, false, away, |ctx| ctx.wall = Some(normal)),
            Some(ActionRequest::WallJump { normal })
        );
    }

    #[test]
    fn test_airborne_defensive_options() {
        let h = Harness::new();
        let dodge = InputRecord::tilt(Vec2::new(1.0, -1.0).normalize()).with_button(Button::Shield);
        assert!(matches!(
            h.resolve(State::IdleAirborne, false, dodge),
            Some(ActionRequest::Airdodge(_))
        ));
        assert!(matches!(
            h.resolve(State::JumpSquat, true, dodge),
            Some(ActionRequest::Airdodge(_))
        ));

        let fast = InputRecord::smash(Vec2::new(0.0, -1.0));
        assert_eq!(
            h.resolve_with(State::Airborne, false, fast, |ctx| ctx.velocity = Vec2::new(0.0, -1.0)),
            Some(ActionRequest::FastFall)
        );
        assert_eq!(h.resolve(State::Airborne, false, fast), None);
    }

    #[test]
    fn test_throws() {
        let h = Harness::new();
        let state = State::Grabbing {
            victim: clash_common::FighterId::new(2),
        };
        assert_eq!(
            h.resolve(state, true, InputRecord::tilt(Vec2::new(0.0, 1.0))),
            Some(ActionRequest::Throw(MoveKind::UpThrow))
        );
        assert_eq!(
            h.resolve(state, true, InputRecord::button(Button::Attack)),
            Some(ActionRequest::Throw(MoveKind::ForwardThrow))
        );
        assert_eq!(h.resolve(state, true, InputRecord::neutral()), None);
    }
}
