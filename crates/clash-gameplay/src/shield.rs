//! Shield health, shield hits and perfect parries.

use clash_common::{Frame, Shape};

use crate::character::CharacterConstants;
use crate::config::CombatConfig;
use crate::hitbox::{AttackData, Hitbox};
use crate::knockback::shield_stun_frames;

/// Smallest shield radius as a fraction of the full radius.
const MIN_RADIUS_FRACTION: f32 = 0.35;

/// Shield radius fraction for a health value.
#[must_use]
pub fn radius_fraction(health: f32, config: &CombatConfig) -> f32 {
    let ratio = (health / config.shield_max).clamp(0.0, 1.0);
    MIN_RADIUS_FRACTION + (1.0 - MIN_RADIUS_FRACTION) * ratio
}

/// Local shield hitbox sized by remaining health.
#[must_use]
pub fn shield_hitbox(constants: &CharacterConstants, health: f32, config: &CombatConfig) -> Hitbox {
    Hitbox::shield(Shape::circle(
        constants.shield_center,
        constants.shield_radius * radius_fraction(health, config),
    ))
}

/// Health after one frame: decays while held, regenerates otherwise.
#[must_use]
pub fn tick(health: f32, held: bool, config: &CombatConfig) -> f32 {
    let next = if held {
        health - config.shield_decay
    } else {
        health + config.shield_regen
    };
    next.clamp(0.0, config.shield_max)
}

/// Outcome of an attack landing on a shield.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShieldImpact {
    /// Shield damage dealt
    pub damage: f32,
    /// Remaining health
    pub health: f32,
    /// Shield stun frames
    pub stun: Frame,
    /// The shield broke
    pub broken: bool,
}

/// Applies an attack to a shield with `health` remaining.
#[must_use]
pub fn impact(health: f32, attack: &AttackData, config: &CombatConfig) -> ShieldImpact {
    let damage = attack.charged_damage();
    let remaining = (health - damage).clamp(0.0, config.shield_max);
    ShieldImpact {
        damage,
        health: remaining,
        stun: shield_stun_frames(damage, config),
        broken: remaining <= 0.0,
    }
}

/// Whether a release at `last_release` makes an impact at `now` a parry.
#[must_use]
pub fn is_parry(last_release: Option<Frame>, now: Frame, window: Frame) -> bool {
    last_release.is_some_and(|release| release <= now && now - release <= window)
}
