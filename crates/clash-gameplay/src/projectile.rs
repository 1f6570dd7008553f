//! Projectiles: hitbox groups that leave their owner and fly on their own.
//!
//! A projectile owns one transient group in the [`GroupRegistry`](crate::hitbox::GroupRegistry).
//! The group is placed at the projectile every frame and goes away after its
//! first contact, so a projectile resolves against at most one target.

use clash_common::{DataError, FighterId, Frame, GroupId};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::hitbox::{Hitbox, Placement};
use crate::input::Facing;
use crate::physics;
use crate::stage::{SegmentKind, Stage};

/// Projectile fired by a move, authored facing right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileDef {
    /// Move frame on which the projectile appears
    pub spawn_frame: Frame,
    /// Spawn point relative to the fighter's feet
    pub offset: Vec2,
    /// Velocity in units per frame
    pub velocity: Vec2,
    /// Frames before the projectile fizzles
    pub lifetime: Frame,
    /// Hitboxes relative to the projectile's centre
    pub hitboxes: Vec<Hitbox>,
}

impl ProjectileDef {
    /// Creates a projectile definition.
    #[must_use]
    pub fn new(spawn_frame: Frame, offset: Vec2, velocity: Vec2, lifetime: Frame, hitboxes: Vec<Hitbox>) -> Self {
        Self {
            spawn_frame,
            offset,
            velocity,
            lifetime,
            hitboxes,
        }
    }

    pub(crate) fn validate(&self, owner: &str) -> Result<(), DataError> {
        if self.lifetime == 0 {
            return Err(DataError::ZeroDuration {
                owner: owner.to_string(),
                field: "projectile lifetime",
            });
        }
        if let Some(radius) = self
            .hitboxes
            .iter()
            .map(|h| h.shape.radius())
            .find(|r| *r <= 0.0)
        {
            return Err(DataError::NonPositive {
                owner: owner.to_string(),
                field: "projectile hitbox radius",
                value: radius,
            });
        }
        Ok(())
    }
}

/// Why a projectile left play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expiry {
    /// Lifetime ran out
    Lifetime,
    /// Struck a wall or floor
    Stage,
    /// Left the blast zone
    BlastZone,
}

impl Expiry {
    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Lifetime => "lifetime",
            Self::Stage => "stage",
            Self::BlastZone => "blast_zone",
        }
    }
}

/// A projectile in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    /// Fighter credited with its hits
    pub owner: FighterId,
    /// Registry group carrying its hitboxes
    pub group: GroupId,
    /// Centre position
    pub position: Vec2,
    /// Velocity in units per frame
    pub velocity: Vec2,
    /// Direction the owner faced when firing
    pub facing: Facing,
    /// Frame on which the projectile fizzles
    pub expires: Frame,
}

impl Projectile {
    /// Launches `def` from a fighter standing at `origin`.
    #[must_use]
    pub fn launch(def: &ProjectileDef, owner: FighterId, group: GroupId, origin: Vec2, facing: Facing, now: Frame) -> Self {
        let sign = facing.sign();
        Self {
            owner,
            group,
            position: origin + Vec2::new(def.offset.x * sign, def.offset.y),
            velocity: Vec2::new(def.velocity.x * sign, def.velocity.y),
            facing,
            expires: now.saturating_add(def.lifetime),
        }
    }

    /// Spawn placement of `def` for a fighter at `origin`, before launch.
    #[must_use]
    pub fn spawn_placement(def: &ProjectileDef, origin: Vec2, facing: Facing) -> Placement {
        Placement {
            origin: origin + Vec2::new(def.offset.x * facing.sign(), def.offset.y),
            facing_sign: facing.sign(),
            intangible: false,
        }
    }

    /// Where the registry places the projectile's hitboxes.
    #[must_use]
    pub fn placement(&self) -> Placement {
        Placement {
            origin: self.position,
            facing_sign: self.facing.sign(),
            intangible: false,
        }
    }

    /// Moves one frame, reporting why the projectile left play if it did.
    ///
    /// Platforms are passed through; walls and floors stop it.
    pub fn advance(&mut self, stage: &Stage, now: Frame) -> Option<Expiry> {
        if now >= self.expires {
            return Some(Expiry::Lifetime);
        }
        let platform = |i: usize| stage.segment(i).is_some_and(|s| s.kind == SegmentKind::Platform);
        if let Some(hit) = physics::first_hit(stage, self.position, self.velocity, platform) {
            self.position = hit.contact;
            return Some(Expiry::Stage);
        }
        self.position += self.velocity;
        if !stage.blast_zone().contains(self.position) {
            return Some(Expiry::BlastZone);
        }
        None
    }
}
