//! Knockback, hitstun and launch angle math.
//!
//! Angles are degrees counter-clockwise from +x in y-up world space, so
//! straight up is 90 and straight down is 270.

use clash_common::{cross, Frame};
use glam::Vec2;

use crate::config::CombatConfig;
use crate::hitbox::{AngleSpec, AttackData};
use crate::input::Facing;

/// Straight down.
pub const DOWN_DEGREES: f32 = 270.0;

const ANGLE_EPSILON: f32 = 1e-4;

// ============================================================================
// Angle helpers
// ============================================================================

/// Wraps an angle into `[0, 360)`.
#[must_use]
pub fn normalize_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Mirrors an angle authored for a right-facing attacker.
#[must_use]
pub fn mirror_degrees(angle: f32, facing: Facing) -> f32 {
    match facing {
        Facing::Right => normalize_degrees(angle),
        Facing::Left => normalize_degrees(180.0 - angle),
    }
}

/// Unit vector for an angle.
#[must_use]
pub fn direction(angle: f32) -> Vec2 {
    let radians = angle.to_radians();
    Vec2::new(radians.cos(), radians.sin())
}

/// Angle of a vector, `None` for the zero vector.
#[must_use]
pub fn degrees_of(v: Vec2) -> Option<f32> {
    if v.length_squared() <= f32::EPSILON {
        return None;
    }
    Some(normalize_degrees(v.y.atan2(v.x).to_degrees()))
}

/// Rotates a launch angle toward the held stick.
///
/// The rotation is `max_degrees * cross(L, s)`: zero for a neutral stick or
/// one parallel to the launch, full strength when perpendicular.
#[must_use]
pub fn apply_di(angle: f32, stick: Vec2, max_degrees: f32) -> f32 {
    let s = stick.normalize_or_zero();
    normalize_degrees(angle + max_degrees * cross(direction(angle), s))
}

/// Remaps an away vector so the launch rises at least `min_elevation`.
///
/// The angle on the defender's side, from straight down (-90) to straight up
/// (90), is squeezed into `[min_elevation, 90]` and mirrored back for the
/// left side. A vertical away vector launches straight up.
#[must_use]
pub fn up_and_away(away: Vec2, min_elevation: f32) -> f32 {
    if away.x == 0.0 {
        return 90.0;
    }
    let theta = away.y.atan2(away.x.abs()).to_degrees();
    let remapped = min_elevation + (theta + 90.0) / 180.0 * (90.0 - min_elevation);
    if away.x < 0.0 {
        normalize_degrees(180.0 - remapped)
    } else {
        normalize_degrees(remapped)
    }
}

/// Moves an exactly horizontal angle one degree upward.
#[must_use]
pub fn bump_horizontal(angle: f32) -> f32 {
    let angle = normalize_degrees(angle);
    if angle < ANGLE_EPSILON || angle > 360.0 - ANGLE_EPSILON {
        1.0
    } else if (angle - 180.0).abs() < ANGLE_EPSILON {
        179.0
    } else {
        angle
    }
}

/// Whether an angle lies within `half_cone` degrees of straight down, inclusive.
#[must_use]
pub fn is_spike(angle: f32, half_cone: f32) -> bool {
    (normalize_degrees(angle) - DOWN_DEGREES).abs() <= half_cone + ANGLE_EPSILON
}

/// Whether an angle points above the horizontal.
#[must_use]
pub fn is_upward(angle: f32) -> bool {
    let angle = normalize_degrees(angle);
    angle > 0.0 && angle < 180.0
}

// ============================================================================
// Scalars
// ============================================================================

/// Launch speed of a hit at `percent` (already including the hit's damage).
#[must_use]
pub fn launch_speed(attack: &AttackData, percent: f32, weight: f32) -> f32 {
    (attack.base_knockback + attack.scaling_knockback * percent / 100.0) * attack.charge_multiplier
        / weight
}

/// Hitstun for a launch speed.
#[must_use]
pub fn hitstun_frames(launch_speed: f32, config: &CombatConfig) -> Frame {
    (launch_speed * config.hitstun_multiplier).round().max(0.0) as Frame
}

/// Freeze frames applied to attacker and defender.
#[must_use]
pub fn hitlag_frames(damage: f32, config: &CombatConfig) -> Frame {
    let frames = (damage * config.hitlag_per_damage + config.hitlag_base).floor().max(0.0) as Frame;
    frames.min(config.hitlag_max)
}

/// Shield stun for a blocked hit.
#[must_use]
pub fn shield_stun_frames(damage: f32, config: &CombatConfig) -> Frame {
    (damage * config.shield_stun_multiplier).round().max(0.0) as Frame
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolves an angle spec to a world angle including DI.
#[must_use]
pub fn resolve_angle(
    spec: AngleSpec,
    facing: Facing,
    attacker_center: Vec2,
    defender_center: Vec2,
    di: Vec2,
    di_max: f32,
) -> f32 {
    let away = || {
        let v = defender_center - attacker_center;
        if v.length_squared() <= f32::EPSILON {
            Vec2::new(facing.sign(), 0.0)
        } else {
            v
        }
    };
    let base = match spec {
        AngleSpec::Fixed(angle) => mirror_degrees(angle, facing),
        AngleSpec::Away => degrees_of(away()).unwrap_or_else(|| mirror_degrees(0.0, facing)),
        AngleSpec::UpAndAway(min_elevation) => up_and_away(away(), min_elevation),
    };
    apply_di(base, di, di_max)
}

/// Everything about a hit needed to compute knockback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitInput {
    /// Attack data of the winning hitbox
    pub attack: AttackData,
    /// Attacker facing at contact
    pub attacker_facing: Facing,
    /// World centre of the attacking hitbox
    pub attacker_center: Vec2,
    /// World centre of the defender's body
    pub defender_center: Vec2,
    /// Defender percent after the hit's damage
    pub percent: f32,
    /// Defender weight
    pub weight: f32,
    /// Whether the defender stood on the ground
    pub grounded: bool,
    /// Defender stick, unit or zero
    pub di: Vec2,
}

/// Result of a knockback computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Knockback {
    /// Final launch angle
    pub angle: f32,
    /// Launch speed before any grounded halving
    pub launch_speed: f32,
    /// Effective launch speed
    pub speed: f32,
    /// Launch velocity in units per frame
    pub velocity: Vec2,
    /// Hitstun frames
    pub hitstun: Frame,
    /// Final angle is a spike
    pub spike: bool,
    /// Defender stays on the ground
    pub grounded: bool,
    /// Hitstun ends in tumble
    pub tumble: bool,
}

impl Knockback {
    /// The state the defender enters.
    #[must_use]
    pub const fn airborne(&self) -> bool {
        !self.grounded
    }
}

/// Computes the launch of a hit.
#[must_use]
pub fn compute(hit: &HitInput, config: &CombatConfig) -> Knockback {
    let launch = launch_speed(&hit.attack, hit.percent, hit.weight);
    let resolved = resolve_angle(
        hit.attack.angle,
        hit.attacker_facing,
        hit.attacker_center,
        hit.defender_center,
        hit.di,
        config.di_max_degrees,
    );
    let mut angle = bump_horizontal(resolved);
    let mut speed = launch;
    let mut grounded = false;

    if hit.grounded && !is_upward(angle) {
        if launch < config.grounded_launch_threshold {
            grounded = true;
            speed = 0.0;
        } else {
            angle = normalize_degrees(-angle);
            speed = launch * 0.5;
        }
    }

    let velocity = if grounded {
        Vec2::ZERO
    } else {
        direction(angle) * speed * config.launch_velocity_scale
    };

    Knockback {
        angle,
        launch_speed: launch,
        speed,
        velocity,
        hitstun: hitstun_frames(launch, config),
        spike: !grounded && is_spike(angle, config.spike_half_cone),
        grounded,
        tumble: !grounded && launch >= config.tumble_threshold,
    }
}
