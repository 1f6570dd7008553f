//! Move definitions: timing, hitbox windows and per-move state properties.

use std::collections::BTreeMap;

use clash_common::{DataError, Frame, FrameWindow};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::hitbox::{AttackData, Hitbox, HitboxPurpose};
use crate::input::{Cardinal, Facing};
use crate::projectile::ProjectileDef;

// ============================================================================
// Move kinds
// ============================================================================

/// Every move a character can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MoveKind {
    /// First jab
    Jab1,
    /// Second jab
    Jab2,
    /// Jab finisher
    Jab3,
    /// Forward tilt
    ForwardTilt,
    /// Up tilt
    UpTilt,
    /// Down tilt
    DownTilt,
    /// Forward smash
    ForwardSmash,
    /// Up smash
    UpSmash,
    /// Down smash
    DownSmash,
    /// Neutral aerial
    NeutralAir,
    /// Forward aerial
    ForwardAir,
    /// Back aerial
    BackAir,
    /// Up aerial
    UpAir,
    /// Down aerial
    DownAir,
    /// Neutral special
    NeutralSpecial,
    /// Side special
    SideSpecial,
    /// Up special
    UpSpecial,
    /// Down special
    DownSpecial,
    /// Standing grab
    Grab,
    /// Forward throw
    ForwardThrow,
    /// Back throw
    BackThrow,
    /// Up throw
    UpThrow,
    /// Down throw
    DownThrow,
}

impl MoveKind {
    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Jab1 => "Jab1",
            Self::Jab2 => "Jab2",
            Self::Jab3 => "Jab3",
            Self::ForwardTilt => "ForwardTilt",
            Self::UpTilt => "UpTilt",
            Self::DownTilt => "DownTilt",
            Self::ForwardSmash => "ForwardSmash",
            Self::UpSmash => "UpSmash",
            Self::DownSmash => "DownSmash",
            Self::NeutralAir => "NeutralAir",
            Self::ForwardAir => "ForwardAir",
            Self::BackAir => "BackAir",
            Self::UpAir => "UpAir",
            Self::DownAir => "DownAir",
            Self::NeutralSpecial => "NeutralSpecial",
            Self::SideSpecial => "SideSpecial",
            Self::UpSpecial => "UpSpecial",
            Self::DownSpecial => "DownSpecial",
            Self::Grab => "Grab",
            Self::ForwardThrow => "ForwardThrow",
            Self::BackThrow => "BackThrow",
            Self::UpThrow => "UpThrow",
            Self::DownThrow => "DownThrow",
        }
    }

    /// Whether this is a chargeable smash attack.
    #[must_use]
    pub const fn is_smash(self) -> bool {
        matches!(self, Self::ForwardSmash | Self::UpSmash | Self::DownSmash)
    }

    /// Whether this is an aerial.
    #[must_use]
    pub const fn is_aerial(self) -> bool {
        matches!(
            self,
            Self::NeutralAir | Self::ForwardAir | Self::BackAir | Self::UpAir | Self::DownAir
        )
    }

    /// Whether this is a special.
    #[must_use]
    pub const fn is_special(self) -> bool {
        matches!(
            self,
            Self::NeutralSpecial | Self::SideSpecial | Self::UpSpecial | Self::DownSpecial
        )
    }

    /// Whether this is a throw.
    #[must_use]
    pub const fn is_throw(self) -> bool {
        matches!(
            self,
            Self::ForwardThrow | Self::BackThrow | Self::UpThrow | Self::DownThrow
        )
    }

    /// The jab that chains from this one.
    #[must_use]
    pub const fn next_jab(self) -> Option<Self> {
        match self {
            Self::Jab1 => Some(Self::Jab2),
            Self::Jab2 => Some(Self::Jab3),
            _ => None,
        }
    }

    /// Smash attack for a direction.
    #[must_use]
    pub const fn smash(direction: Relative) -> Self {
        match direction {
            Relative::Up => Self::UpSmash,
            Relative::Down => Self::DownSmash,
            Relative::Neutral | Relative::Forward | Relative::Back => Self::ForwardSmash,
        }
    }

    /// Tilt attack for a direction; neutral is the first jab.
    #[must_use]
    pub const fn tilt(direction: Relative) -> Self {
        match direction {
            Relative::Neutral => Self::Jab1,
            Relative::Up => Self::UpTilt,
            Relative::Down => Self::DownTilt,
            Relative::Forward | Relative::Back => Self::ForwardTilt,
        }
    }

    /// Aerial for a direction.
    #[must_use]
    pub const fn aerial(direction: Relative) -> Self {
        match direction {
            Relative::Neutral => Self::NeutralAir,
            Relative::Forward => Self::ForwardAir,
            Relative::Back => Self::BackAir,
            Relative::Up => Self::UpAir,
            Relative::Down => Self::DownAir,
        }
    }

    /// Special for a direction.
    #[must_use]
    pub const fn special(direction: Relative) -> Self {
        match direction {
            Relative::Neutral => Self::NeutralSpecial,
            Relative::Forward | Relative::Back => Self::SideSpecial,
            Relative::Up => Self::UpSpecial,
            Relative::Down => Self::DownSpecial,
        }
    }

    /// Throw for a direction; neutral throws forward.
    #[must_use]
    pub const fn throw(direction: Relative) -> Self {
        match direction {
            Relative::Neutral | Relative::Forward => Self::ForwardThrow,
            Relative::Back => Self::BackThrow,
            Relative::Up => Self::UpThrow,
            Relative::Down => Self::DownThrow,
        }
    }
}

/// Stick direction relative to facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relative {
    /// No direction
    Neutral,
    /// Toward facing
    Forward,
    /// Away from facing
    Back,
    /// Up
    Up,
    /// Down
    Down,
}

impl Relative {
    /// Converts a stick direction for a fighter facing `facing`.
    #[must_use]
    pub fn from_cardinal(cardinal: Option<Cardinal>, facing: Facing) -> Self {
        match cardinal {
            None => Self::Neutral,
            Some(Cardinal::Up) => Self::Up,
            Some(Cardinal::Down) => Self::Down,
            Some(side) => {
                if side.facing() == Some(facing) {
                    Self::Forward
                } else {
                    Self::Back
                }
            },
        }
    }
}

// ============================================================================
// Move definitions
// ============================================================================

/// Where a move may be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MoveContext {
    /// Only on the ground
    Grounded,
    /// Only in the air
    Airborne,
    /// Anywhere
    #[default]
    Both,
}

/// Hitboxes active over an inclusive frame span of a move.
///
/// Each window spawns its own hitbox group, so a move with several windows
/// can hit the same target once per window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitboxWindow {
    /// First active frame
    pub start: Frame,
    /// Last active frame
    pub end: Frame,
    /// Hitboxes in fighter-local space
    pub hitboxes: Vec<Hitbox>,
}

impl HitboxWindow {
    /// Creates a window.
    #[must_use]
    pub fn new(start: Frame, end: Frame, hitboxes: Vec<Hitbox>) -> Self {
        Self {
            start,
            end,
            hitboxes,
        }
    }

    /// Whether the window is active `elapsed` frames into the move.
    #[must_use]
    pub const fn contains(&self, elapsed: Frame) -> bool {
        elapsed >= self.start && elapsed <= self.end
    }

    /// Hitboxes with a smash-charge multiplier applied to attack data.
    #[must_use]
    pub fn charged_hitboxes(&self, multiplier: f32) -> Vec<Hitbox> {
        self.hitboxes
            .iter()
            .map(|h| match h.purpose {
                HitboxPurpose::Attack(data) => Hitbox::attack(h.shape, data.with_charge(multiplier)),
                _ => *h,
            })
            .collect()
    }
}

/// Timing and hitboxes of one move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveDef {
    /// Frames until the move ends (first actionable frame)
    pub total_frames: Frame,
    /// Frame from which the move can be interrupted by any action
    #[serde(default)]
    pub iasa: Option<Frame>,
    /// Hitbox windows
    #[serde(default)]
    pub windows: Vec<HitboxWindow>,
    /// Intangible frames
    #[serde(default)]
    pub intangible: Option<FrameWindow>,
    /// Super-armor frames
    #[serde(default)]
    pub super_armor: Option<FrameWindow>,
    /// Launch speed below which super armor absorbs a hit
    #[serde(default)]
    pub armor_threshold: f32,
    /// Landing lag when an aerial touches the ground
    #[serde(default)]
    pub landing_lag: Frame,
    /// Frames during which pressing attack chains into the next jab
    #[serde(default)]
    pub combo_window: Option<FrameWindow>,
    /// Frame at which a held smash charges
    #[serde(default)]
    pub charge_frame: Option<Frame>,
    /// Where the move may be started
    #[serde(default)]
    pub context: MoveContext,
    /// Velocity set when the move starts, authored facing right
    #[serde(default)]
    pub impulse: Option<Vec2>,
    /// Projectile fired once per use of the move
    #[serde(default)]
    pub projectile: Option<ProjectileDef>,
}

impl MoveDef {
    /// Creates a move with no hitboxes.
    #[must_use]
    pub fn new(total_frames: Frame) -> Self {
        Self {
            total_frames,
            iasa: None,
            windows: Vec::new(),
            intangible: None,
            super_armor: None,
            armor_threshold: 0.0,
            landing_lag: 0,
            combo_window: None,
            charge_frame: None,
            context: MoveContext::Both,
            impulse: None,
            projectile: None,
        }
    }

    /// Adds a hitbox window.
    #[must_use]
    pub fn with_window(mut self, start: Frame, end: Frame, hitboxes: Vec<Hitbox>) -> Self {
        self.windows.push(HitboxWindow::new(start, end, hitboxes));
        self
    }

    /// Sets the interruptible frame.
    #[must_use]
    pub fn with_iasa(mut self, frame: Frame) -> Self {
        self.iasa = Some(frame);
        self
    }

    /// Sets intangible frames.
    #[must_use]
    pub fn with_intangible(mut self, window: FrameWindow) -> Self {
        self.intangible = Some(window);
        self
    }

    /// Sets super-armor frames and the absorb threshold.
    #[must_use]
    pub fn with_super_armor(mut self, window: FrameWindow, threshold: f32) -> Self {
        self.super_armor = Some(window);
        self.armor_threshold = threshold;
        self
    }

    /// Sets landing lag.
    #[must_use]
    pub fn with_landing_lag(mut self, frames: Frame) -> Self {
        self.landing_lag = frames;
        self
    }

    /// Sets the jab combo window.
    #[must_use]
    pub fn with_combo_window(mut self, window: FrameWindow) -> Self {
        self.combo_window = Some(window);
        self
    }

    /// Sets the charge frame.
    #[must_use]
    pub fn with_charge_frame(mut self, frame: Frame) -> Self {
        self.charge_frame = Some(frame);
        self
    }

    /// Sets where the move may start.
    #[must_use]
    pub fn with_context(mut self, context: MoveContext) -> Self {
        self.context = context;
        self
    }

    /// Sets the starting velocity.
    #[must_use]
    pub fn with_impulse(mut self, impulse: Vec2) -> Self {
        self.impulse = Some(impulse);
        self
    }

    /// Fires a projectile.
    #[must_use]
    pub fn with_projectile(mut self, projectile: ProjectileDef) -> Self {
        self.projectile = Some(projectile);
        self
    }

    /// First frame at which other actions are accepted.
    #[must_use]
    pub fn first_actionable(&self) -> Frame {
        self.iasa.unwrap_or(self.total_frames)
    }

    /// Whether the move may start in the given situation.
    #[must_use]
    pub const fn allowed(&self, grounded: bool) -> bool {
        match self.context {
            MoveContext::Both => true,
            MoveContext::Grounded => grounded,
            MoveContext::Airborne => !grounded,
        }
    }

    /// Attack data applied by a throw.
    #[must_use]
    pub fn throw_attack(&self) -> Option<AttackData> {
        self.windows
            .iter()
            .flat_map(|w| w.hitboxes.iter())
            .find_map(|h| h.attack_data().copied())
    }

    fn validate(&self, owner: &str, kind: MoveKind) -> Result<(), DataError> {
        if self.total_frames == 0 {
            return Err(DataError::ZeroDuration {
                owner: format!("{owner} {}", kind.name()),
                field: "total_frames",
            });
        }
        for window in &self.windows {
            for hitbox in &window.hitboxes {
                let radius = hitbox.shape.radius();
                if radius <= 0.0 {
                    return Err(DataError::NonPositive {
                        owner: format!("{owner} {}", kind.name()),
                        field: "hitbox radius",
                        value: radius,
                    });
                }
            }
        }
        if let Some(projectile) = &self.projectile {
            projectile.validate(&format!("{owner} {}", kind.name()))?;
        }
        Ok(())
    }
}

/// Move table of one character.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoveSet {
    moves: BTreeMap<MoveKind, MoveDef>,
}

impl MoveSet {
    /// Creates an empty move set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a move.
    #[must_use]
    pub fn with(mut self, kind: MoveKind, def: MoveDef) -> Self {
        self.moves.insert(kind, def);
        self
    }

    /// Inserts or replaces a move.
    pub fn insert(&mut self, kind: MoveKind, def: MoveDef) {
        self.moves.insert(kind, def);
    }

    /// Looks up a move.
    #[must_use]
    pub fn get(&self, kind: MoveKind) -> Option<&MoveDef> {
        self.moves.get(&kind)
    }

    /// Moves in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (MoveKind, &MoveDef)> {
        self.moves.iter().map(|(k, d)| (*k, d))
    }

    /// Number of moves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Rejects moves with zero duration or non-positive hitbox radii.
    pub fn validate(&self, owner: &str) -> Result<(), DataError> {
        self.moves
            .iter()
            .try_for_each(|(kind, def)| def.validate(owner, *kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hitbox::AngleSpec;
    use clash_common::Shape;

    fn data() -> AttackData {
        AttackData::new(10.0, 20.0, 60.0, AngleSpec::Fixed(45.0))
    }

    #[test]
    fn test_relative_direction() {
        assert_eq!(
            Relative::from_cardinal(Some(Cardinal::Left), Facing::Left),
            Relative::Forward
        );
        assert_eq!(
            Relative::from_cardinal(Some(Cardinal::Left), Facing::Right),
            Relative::Back
        );
        assert_eq!(Relative::from_cardinal(None, Facing::Right), Relative::Neutral);
    }

    #[test]
    fn test_move_lookup_tables() {
        assert_eq!(MoveKind::aerial(Relative::Back), MoveKind::BackAir);
        assert_eq!(MoveKind::tilt(Relative::Neutral), MoveKind::Jab1);
        assert_eq!(MoveKind::smash(Relative::Back), MoveKind::ForwardSmash);
        assert_eq!(MoveKind::special(Relative::Up), MoveKind::UpSpecial);
        assert_eq!(MoveKind::throw(Relative::Neutral), MoveKind::ForwardThrow);
        assert_eq!(MoveKind::Jab1.next_jab(), Some(MoveKind::Jab2));
        assert_eq!(MoveKind::Jab3.next_jab(), None);
        assert!(MoveKind::UpSmash.is_smash());
        assert!(MoveKind::BackThrow.is_throw());
    }

    #[test]
    fn test_context_gate() {
        let def = MoveDef::new(20).with_context(MoveContext::Airborne);
        assert!(def.allowed(false));
        assert!(!def.allowed(true));
        assert!(MoveDef::new(20).allowed(true));
    }

    #[test]
    fn test_first_actionable() {
        assert_eq!(MoveDef::new(30).first_actionable(), 30);
        assert_eq!(MoveDef::new(30).with_iasa(22).first_actionable(), 22);
    }

    #[test]
    fn test_charged_hitboxes_only_touch_attacks() {
        let window = HitboxWindow::new(
            2,
            4,
            vec![
                Hitbox::attack(Shape::circle(Vec2::ZERO, 1.0), data()),
                Hitbox::grab(Shape::circle(Vec2::ZERO, 1.0)),
            ],
        );
        let charged = window.charged_hitboxes(1.5);
        assert_eq!(charged[0].attack_data().map(|d| d.charge_multiplier), Some(1.5));
        assert_eq!(charged[1], window.hitboxes[1]);
        assert!(window.contains(2) && window.contains(4) && !window.contains(5));
    }

    #[test]
    fn test_throw_attack_is_first_attack_box() {
        let def = MoveDef::new(20).with_window(
            0,
            0,
            vec![Hitbox::attack(Shape::circle(Vec2::ZERO, 1.0), data())],
        );
        assert_eq!(def.throw_attack(), Some(data()));
        assert_eq!(MoveDef::new(20).throw_attack(), None);
    }

    #[test]
    fn test_validate_rejects_bad_moves() {
        let set = MoveSet::new().with(MoveKind::Jab1, MoveDef::new(0));
        assert!(matches!(
            set.validate("Blaze"),
            Err(DataError::ZeroDuration { field: "total_frames", .. })
        ));

        let set = MoveSet::new().with(
            MoveKind::Jab1,
            MoveDef::new(10).with_window(
                1,
                2,
                vec![Hitbox::attack(Shape::circle(Vec2::ZERO, 0.0), data())],
            ),
        );
        assert!(set.validate("Blaze").is_err());

        let bolt = ProjectileDef::new(
            4,
            Vec2::ZERO,
            Vec2::X,
            0,
            vec![Hitbox::attack(Shape::circle(Vec2::ZERO, 1.0), data())],
        );
        let set = MoveSet::new().with(MoveKind::NeutralSpecial, MoveDef::new(30).with_projectile(bolt));
        assert!(matches!(
            set.validate("Blaze"),
            Err(DataError::ZeroDuration { field: "projectile lifetime", .. })
        ));
    }
}
