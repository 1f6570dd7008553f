//! Per-character constants and the roster table.
//!
//! Characters differ only by data. Every shared rule reads the numbers from a
//! [`CharacterConstants`] looked up by [`CharacterId`].

use std::collections::BTreeMap;

use clash_common::{CharacterId, ClashError, ClashResult, DataError, Frame, FrameWindow, Shape};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::hitbox::{AngleSpec, AttackData, Hitbox};
use crate::moves::{MoveContext, MoveDef, MoveKind, MoveSet};
use crate::projectile::ProjectileDef;

/// Numbers that vary between characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterConstants {
    /// Display name
    pub name: String,
    /// Divides launch speed
    pub weight: f32,
    /// Top walking speed
    pub walk_speed: f32,
    /// Initial dash speed
    pub dash_speed: f32,
    /// Running speed
    pub run_speed: f32,
    /// Grounded horizontal deceleration per frame
    pub traction: f32,
    /// Airborne horizontal acceleration per frame
    pub air_acceleration: f32,
    /// Top airborne horizontal speed under control
    pub max_air_speed: f32,
    /// Downward acceleration per frame
    pub gravity: f32,
    /// Fall speed cap
    pub max_fall_speed: f32,
    /// Full hop initial speed
    pub jump_speed: f32,
    /// Midair jump initial speed
    pub double_jump_speed: f32,
    /// Wall jump initial speed
    pub wall_jump_speed: f32,
    /// Midair jumps available
    pub extra_jumps: u8,
    /// Dash duration
    pub dash_frames: Frame,
    /// Jump squat duration
    pub jumpsquat_frames: Frame,
    /// Body hurtboxes relative to the feet, facing right
    pub hurtboxes: Vec<Shape>,
    /// Shield radius at full health
    pub shield_radius: f32,
    /// Shield centre relative to the feet
    pub shield_center: Vec2,
    /// Move table
    pub moves: MoveSet,
}

impl CharacterConstants {
    /// Initial speed of a short hop, reaching half the height of a full hop.
    #[must_use]
    pub fn short_hop_speed(&self) -> f32 {
        self.jump_speed * std::f32::consts::FRAC_1_SQRT_2
    }

    /// Body hurtboxes as hitboxes.
    #[must_use]
    pub fn body_hitboxes(&self) -> Vec<Hitbox> {
        self.hurtboxes.iter().copied().map(Hitbox::hurt).collect()
    }

    /// Local centre of the body, used as the launch target.
    #[must_use]
    pub fn body_center(&self) -> Vec2 {
        if self.hurtboxes.is_empty() {
            return Vec2::ZERO;
        }
        let sum: Vec2 = self.hurtboxes.iter().map(Shape::center).sum();
        sum / self.hurtboxes.len() as f32
    }

    /// Rejects non-positive physical constants and zero durations.
    pub fn validate(&self) -> Result<(), DataError> {
        let positive = [
            ("weight", self.weight),
            ("walk_speed", self.walk_speed),
            ("dash_speed", self.dash_speed),
            ("run_speed", self.run_speed),
            ("traction", self.traction),
            ("gravity", self.gravity),
            ("max_fall_speed", self.max_fall_speed),
            ("jump_speed", self.jump_speed),
            ("shield_radius", self.shield_radius),
        ];
        for (field, value) in positive {
            if value <= 0.0 || !value.is_finite() {
                return Err(DataError::NonPositive {
                    owner: self.name.clone(),
                    field,
                    value,
                });
            }
        }
        for (field, value) in [
            ("dash_frames", self.dash_frames),
            ("jumpsquat_frames", self.jumpsquat_frames),
        ] {
            if value == 0 {
                return Err(DataError::ZeroDuration {
                    owner: self.name.clone(),
                    field,
                });
            }
        }
        if let Some(shape) = self.hurtboxes.iter().find(|s| s.radius() <= 0.0) {
            return Err(DataError::NonPositive {
                owner: self.name.clone(),
                field: "hurtbox radius",
                value: shape.radius(),
            });
        }
        self.moves.validate(&self.name)
    }
}

/// One serialized roster entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RosterEntry {
    id: CharacterId,
    character: CharacterConstants,
}

/// Validated lookup from character id to constants.
#[derive(Debug, Clone, Default)]
pub struct CharacterTable {
    characters: BTreeMap<CharacterId, CharacterConstants>,
}

impl CharacterTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in roster: Blaze (id 0) and Talon (id 1).
    #[must_use]
    pub fn builtin() -> Self {
        let mut characters = BTreeMap::new();
        characters.insert(CharacterId::new(0), blaze());
        characters.insert(CharacterId::new(1), talon());
        Self { characters }
    }

    /// Validates and adds a character.
    pub fn insert(&mut self, id: CharacterId, character: CharacterConstants) -> Result<(), DataError> {
        if self.characters.contains_key(&id) {
            return Err(DataError::DuplicateCharacter(id.raw()));
        }
        character.validate()?;
        self.characters.insert(id, character);
        Ok(())
    }

    /// Looks up a character.
    pub fn get(&self, id: CharacterId) -> Result<&CharacterConstants, DataError> {
        self.characters
            .get(&id)
            .ok_or(DataError::UnknownCharacter(id.raw()))
    }

    /// Character ids in order.
    pub fn ids(&self) -> impl Iterator<Item = CharacterId> + '_ {
        self.characters.keys().copied()
    }

    /// Number of characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.characters.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Parses and validates a roster from RON.
    pub fn from_ron(text: &str) -> ClashResult<Self> {
        let entries: Vec<RosterEntry> =
            ron::from_str(text).map_err(|e| ClashError::Serialization(e.to_string()))?;
        let mut table = Self::new();
        for entry in entries {
            table.insert(entry.id, entry.character)?;
        }
        Ok(table)
    }

    /// Serializes the roster to RON.
    pub fn to_ron(&self) -> ClashResult<String> {
        let entries: Vec<RosterEntry> = self
            .characters
            .iter()
            .map(|(id, character)| RosterEntry {
                id: *id,
                character: character.clone(),
            })
            .collect();
        ron::ser::to_string_pretty(&entries, ron::ser::PrettyConfig::default())
            .map_err(|e| ClashError::Serialization(e.to_string()))
    }
}

// ============================================================================
// Built-in roster
// ============================================================================

fn blaze() -> CharacterConstants {
    CharacterConstants {
        name: "Blaze".to_string(),
        weight: 1.0,
        walk_speed: 1.1,
        dash_speed: 1.7,
        run_speed: 1.6,
        traction: 0.08,
        air_acceleration: 0.06,
        max_air_speed: 1.0,
        gravity: 0.13,
        max_fall_speed: 2.3,
        jump_speed: 3.1,
        double_jump_speed: 2.9,
        wall_jump_speed: 2.8,
        extra_jumps: 1,
        dash_frames: 15,
        jumpsquat_frames: 6,
        hurtboxes: vec![Shape::pill(Vec2::new(0.0, 3.0), Vec2::new(0.0, 9.0), 3.0)],
        shield_radius: 7.0,
        shield_center: Vec2::new(0.0, 6.0),
        moves: standard_moves(1.0, 1.0),
    }
}

fn talon() -> CharacterConstants {
    CharacterConstants {
        name: "Talon".to_string(),
        weight: 0.85,
        walk_speed: 1.3,
        dash_speed: 2.1,
        run_speed: 2.0,
        traction: 0.1,
        air_acceleration: 0.08,
        max_air_speed: 1.1,
        gravity: 0.17,
        max_fall_speed: 2.8,
        jump_speed: 3.6,
        double_jump_speed: 3.2,
        wall_jump_speed: 3.0,
        extra_jumps: 1,
        dash_frames: 12,
        jumpsquat_frames: 4,
        hurtboxes: vec![Shape::pill(Vec2::new(0.0, 3.0), Vec2::new(0.0, 8.0), 2.6)],
        shield_radius: 6.0,
        shield_center: Vec2::new(0.0, 5.5),
        moves: standard_moves(0.9, 0.9),
    }
}

/// Shared move layout scaled by reach and power.
fn standard_moves(reach: f32, power: f32) -> MoveSet {
    let hit = |damage: f32, bkb: f32, skb: f32, angle: AngleSpec| {
        AttackData::new(damage * power, bkb, skb, angle)
    };
    let circle = |x: f32, y: f32, r: f32| Shape::circle(Vec2::new(x * reach, y), r);
    let pill = |ax: f32, ay: f32, bx: f32, by: f32, r: f32| {
        Shape::pill(Vec2::new(ax * reach, ay), Vec2::new(bx * reach, by), r)
    };
    let throw = |damage: f32, bkb: f32, skb: f32, angle: f32| {
        MoveDef::new(25).with_window(
            0,
            0,
            vec![Hitbox::attack(
                Shape::circle(Vec2::ZERO, 1.0),
                hit(damage, bkb, skb, AngleSpec::Fixed(angle)),
            )],
        )
    };

    MoveSet::new()
        // Jabs
        .with(
            MoveKind::Jab1,
            MoveDef::new(18)
                .with_iasa(14)
                .with_window(2, 3, vec![Hitbox::attack(circle(6.0, 7.0, 2.5), hit(3.0, 8.0, 10.0, AngleSpec::Fixed(30.0)))])
                .with_combo_window(FrameWindow::range(4, 17))
                .with_context(MoveContext::Grounded),
        )
        .with(
            MoveKind::Jab2,
            MoveDef::new(18)
                .with_iasa(14)
                .with_window(2, 3, vec![Hitbox::attack(circle(6.5, 7.0, 2.5), hit(2.0, 8.0, 10.0, AngleSpec::Fixed(30.0)))])
                .with_combo_window(FrameWindow::range(4, 17))
                .with_context(MoveContext::Grounded),
        )
        .with(
            MoveKind::Jab3,
            MoveDef::new(28)
                .with_window(4, 6, vec![Hitbox::attack(circle(7.0, 7.0, 3.0), hit(4.0, 25.0, 60.0, AngleSpec::Fixed(40.0)))])
                .with_context(MoveContext::Grounded),
        )
        // Tilts
        .with(
            MoveKind::ForwardTilt,
            MoveDef::new(28)
                .with_window(5, 8, vec![Hitbox::attack(pill(2.0, 6.0, 9.0, 6.0, 2.2), hit(9.0, 15.0, 100.0, AngleSpec::Fixed(40.0)))])
                .with_context(MoveContext::Grounded),
        )
        .with(
            MoveKind::UpTilt,
            MoveDef::new(30)
                .with_window(6, 10, vec![Hitbox::attack(circle(3.0, 13.0, 3.5), hit(8.0, 20.0, 90.0, AngleSpec::Fixed(90.0)).with_priority(1))])
                .with_context(MoveContext::Grounded),
        )
        .with(
            MoveKind::DownTilt,
            MoveDef::new(24)
                .with_window(5, 7, vec![Hitbox::attack(pill(2.0, 1.0, 10.0, 1.0, 1.8), hit(7.0, 20.0, 70.0, AngleSpec::Fixed(80.0)))])
                .with_context(MoveContext::Grounded),
        )
        // Smashes
        .with(
            MoveKind::ForwardSmash,
            MoveDef::new(48)
                .with_charge_frame(8)
                .with_window(12, 15, vec![Hitbox::attack(pill(3.0, 6.0, 12.0, 6.0, 3.0), hit(16.0, 30.0, 110.0, AngleSpec::Fixed(35.0)).with_priority(2))])
                .with_context(MoveContext::Grounded),
        )
        .with(
            MoveKind::UpSmash,
            MoveDef::new(45)
                .with_charge_frame(6)
                .with_window(10, 13, vec![Hitbox::attack(circle(2.0, 15.0, 4.0), hit(15.0, 30.0, 105.0, AngleSpec::Fixed(90.0)).with_priority(2))])
                .with_context(MoveContext::Grounded),
        )
        .with(
            MoveKind::DownSmash,
            MoveDef::new(50)
                .with_charge_frame(4)
                .with_window(8, 10, vec![Hitbox::attack(circle(7.0, 2.0, 3.0), hit(13.0, 25.0, 95.0, AngleSpec::Fixed(25.0)))])
                .with_window(16, 18, vec![Hitbox::attack(circle(-7.0, 2.0, 3.0), hit(13.0, 25.0, 95.0, AngleSpec::Fixed(155.0)))])
                .with_context(MoveContext::Grounded),
        )
        // Aerials
        .with(
            MoveKind::NeutralAir,
            MoveDef::new(40)
                .with_iasa(34)
                .with_window(3, 20, vec![Hitbox::attack(circle(0.0, 6.0, 6.0), hit(9.0, 10.0, 90.0, AngleSpec::Away))])
                .with_landing_lag(8)
                .with_context(MoveContext::Airborne),
        )
        .with(
            MoveKind::ForwardAir,
            MoveDef::new(45)
                .with_window(10, 14, vec![Hitbox::attack(circle(7.0, 6.0, 3.0), hit(14.0, 10.0, 100.0, AngleSpec::Fixed(45.0)))])
                .with_landing_lag(16)
                .with_context(MoveContext::Airborne),
        )
        .with(
            MoveKind::BackAir,
            MoveDef::new(35)
                .with_window(5, 9, vec![Hitbox::attack(circle(-7.0, 6.0, 3.0), hit(12.0, 15.0, 100.0, AngleSpec::Fixed(150.0)))])
                .with_landing_lag(10)
                .with_context(MoveContext::Airborne),
        )
        .with(
            MoveKind::UpAir,
            MoveDef::new(32)
                .with_window(4, 8, vec![Hitbox::attack(pill(-4.0, 14.0, 4.0, 14.0, 2.5), hit(10.0, 20.0, 95.0, AngleSpec::Fixed(90.0)))])
                .with_landing_lag(8)
                .with_context(MoveContext::Airborne),
        )
        .with(
            MoveKind::DownAir,
            MoveDef::new(44)
                .with_window(12, 16, vec![Hitbox::attack(circle(0.0, -1.0, 3.0), hit(13.0, 15.0, 90.0, AngleSpec::Fixed(270.0)))])
                .with_landing_lag(18)
                .with_context(MoveContext::Airborne),
        )
        // Specials
        .with(
            MoveKind::NeutralSpecial,
            MoveDef::new(40)
                .with_projectile(ProjectileDef::new(
                    12,
                    Vec2::new(6.0 * reach, 6.0),
                    Vec2::new(2.2, 0.0),
                    60,
                    vec![Hitbox::attack(Shape::circle(Vec2::ZERO, 1.8), hit(6.0, 20.0, 40.0, AngleSpec::Fixed(20.0)))],
                ))
                .with_landing_lag(10),
        )
        .with(
            MoveKind::SideSpecial,
            MoveDef::new(35)
                .with_impulse(Vec2::new(2.0, 0.0))
                .with_window(6, 14, vec![Hitbox::attack(circle(5.0, 6.0, 3.5), hit(7.0, 20.0, 70.0, AngleSpec::Fixed(45.0)))])
                .with_landing_lag(12),
        )
        .with(
            MoveKind::UpSpecial,
            MoveDef::new(38)
                .with_impulse(Vec2::new(0.5, 3.5))
                .with_intangible(FrameWindow::range(0, 4))
                .with_window(2, 12, vec![Hitbox::attack(circle(2.0, 8.0, 4.0), hit(10.0, 35.0, 70.0, AngleSpec::Fixed(80.0)))])
                .with_landing_lag(20),
        )
        .with(
            MoveKind::DownSpecial,
            MoveDef::new(42)
                .with_super_armor(FrameWindow::range(3, 20), 100.0)
                .with_window(10, 13, vec![Hitbox::attack(circle(0.0, 6.0, 7.0), hit(12.0, 40.0, 80.0, AngleSpec::UpAndAway(45.0)))])
                .with_context(MoveContext::Grounded),
        )
        // Grab and throws
        .with(
            MoveKind::Grab,
            MoveDef::new(30)
                .with_window(7, 8, vec![Hitbox::grab(circle(6.0, 6.0, 2.5))])
                .with_context(MoveContext::Grounded),
        )
        .with(MoveKind::ForwardThrow, throw(8.0, 45.0, 60.0, 45.0))
        .with(MoveKind::BackThrow, throw(10.0, 45.0, 65.0, 135.0))
        .with(MoveKind::UpThrow, throw(7.0, 50.0, 55.0, 90.0))
        .with(MoveKind::DownThrow, throw(6.0, 50.0, 40.0, 80.0))
}
