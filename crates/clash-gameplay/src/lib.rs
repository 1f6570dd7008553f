//! # Clash Gameplay
//!
//! Deterministic combat core for Clash.
//!
//! This crate advances a match in fixed frames and owns every rule that
//! decides what a frame does:
//! - Stage geometry and continuous collision (walls, floors, one-way platforms)
//! - Fighter state machine and action resolution from input
//! - Hitbox groups with hit-once bookkeeping and shield/grab priority
//! - Knockback, DI, hitlag and shield behavior
//! - Grabs, throws and re-grab cooldowns
//! - Combat events for presentation and logging
//!
//! Rendering, audio, networking and raw input devices live elsewhere.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod action;
pub mod character;
pub mod config;
pub mod events;
pub mod fighter;
pub mod fighter_state;
pub mod grab;
pub mod hitbox;
pub mod input;
pub mod knockback;
pub mod moves;
pub mod physics;
pub mod projectile;
pub mod shield;
pub mod simulation;
pub mod stage;

/// Prelude for convenient imports
///
/// Free functions stay behind their modules (`physics::step`,
/// `knockback::compute`) since several modules share short names.
pub mod prelude {
    pub use crate::action::{ActionContext, ActionRequest};
    pub use crate::character::{CharacterConstants, CharacterTable};
    pub use crate::config::{CombatConfig, MoonwalkPersistence};
    pub use crate::events::{CombatEvent, EventBus, EventHandler};
    pub use crate::fighter::{ButtonEdges, Fighter, WallContact};
    pub use crate::fighter_state::{State, StateProps};
    pub use crate::grab::GrabCooldowns;
    pub use crate::hitbox::{
        AngleSpec, AttackData, ContactKind, GroupContact, GroupRegistry, Hitbox, HitboxError,
        HitboxGroup, HitboxPurpose, HitboxResult, Placement,
    };
    pub use crate::input::{
        Button, ButtonSet, Cardinal, DirectionalAction, Facing, InputRecord, Rotation,
    };
    pub use crate::knockback::{HitInput, Knockback};
    pub use crate::moves::{HitboxWindow, MoveContext, MoveDef, MoveKind, MoveSet, Relative};
    pub use crate::physics::{PhysicsContext, Response, SegmentHit, StageEvent, Sweep};
    pub use crate::projectile::{Expiry, Projectile, ProjectileDef};
    pub use crate::shield::ShieldImpact;
    pub use crate::simulation::{
        FighterSnapshot, Match, MatchSnapshot, ProjectileSnapshot, SimulationError,
        SimulationResult,
    };
    pub use crate::stage::{BlastZone, Segment, SegmentKind, Stage};
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use clash_common::{CharacterId, FighterId};

    #[test]
    fn test_prelude_builds_a_match() {
        let mut game = Match::new(
            Stage::proving_grounds(),
            CharacterTable::builtin(),
            CombatConfig::default(),
        )
        .expect("default config is valid");
        game.spawn(FighterId::new(1), CharacterId::new(0))
            .expect("builtin character");
        game.spawn(FighterId::new(2), CharacterId::new(1))
            .expect("builtin character");

        for _ in 0..60 {
            game.step();
        }
        assert_eq!(game.frame(), 60);
        // Idle fighters stay on the floor
        assert!(game.fighters().all(|f| f.is_grounded() && f.in_play()));
    }

    #[test]
    fn test_button_set_from_prelude() {
        let held = ButtonSet::new().with(Button::Attack);
        assert!(held.contains(Button::Attack));
        assert!(!held.contains(Button::Jump));
    }
}
