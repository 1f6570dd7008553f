//! Fighter kinematics and stage collision.
//!
//! Motion is swept against stage segments every frame, so fast fighters
//! cannot tunnel through thin surfaces or corners.

use clash_common::Frame;
use glam::Vec2;
use tracing::{debug, trace};

use crate::character::CharacterConstants;
use crate::config::CombatConfig;
use crate::fighter::{Fighter, WallContact};
use crate::fighter_state::State;
use crate::input::InputRecord;
use crate::stage::{Segment, SegmentKind, Stage};

/// Collision passes per sweep before the remaining motion is dropped.
pub const MAX_SLIDES: usize = 3;

/// How far behind a surface a point may sit and still collide with it.
const CONTACT_EPSILON: f32 = 1e-3;

/// Approach speeds below this are treated as parallel.
const APPROACH_EPSILON: f32 = 1e-6;

// ============================================================================
// Segment tests
// ============================================================================

/// First contact of a swept point with a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentHit {
    /// Segment index in the stage
    pub index: usize,
    /// Fraction of the displacement travelled before contact
    pub t: f32,
    /// Contact point
    pub contact: Vec2,
    /// Segment normal
    pub normal: Vec2,
}

/// Tests a point moving from `p` by `v` against one segment.
///
/// Returns `(t, contact)` when the point approaches the playable side and
/// crosses the segment within this displacement.
#[must_use]
pub fn wall_test(segment: &Segment, p: Vec2, v: Vec2) -> Option<(f32, Vec2)> {
    let ab = segment.b - segment.a;
    let len_sq = ab.length_squared();
    if len_sq == 0.0 {
        return None;
    }
    let n = segment.normal();
    let approach = v.dot(n);
    if approach >= -APPROACH_EPSILON {
        return None;
    }
    let depth = (p - segment.a).dot(n);
    if depth < -CONTACT_EPSILON {
        return None;
    }
    let t = (-depth / approach).max(0.0);
    if t > 1.0 {
        return None;
    }
    let contact = p + v * t;
    let s = (contact - segment.a).dot(ab) / len_sq;
    if !(0.0..=1.0).contains(&s) {
        return None;
    }
    Some((t, contact))
}

/// Earliest contact among segments not skipped; ties go to the lower index.
pub fn first_hit<F>(stage: &Stage, p: Vec2, v: Vec2, skip: F) -> Option<SegmentHit>
where
    F: Fn(usize) -> bool,
{
    let mut best: Option<SegmentHit> = None;
    for (index, segment) in stage.segments().iter().enumerate() {
        if skip(index) {
            continue;
        }
        if let Some((t, contact)) = wall_test(segment, p, v) {
            if best.map_or(true, |b| t < b.t) {
                best = Some(SegmentHit {
                    index,
                    t,
                    contact,
                    normal: segment.normal(),
                });
            }
        }
    }
    best
}

/// Removes the into-surface component of `v`.
#[must_use]
pub fn slide_velocity(v: Vec2, normal: Vec2) -> Vec2 {
    let into = v.dot(normal);
    if into < 0.0 {
        v - normal * into
    } else {
        v
    }
}

/// Reflects `v` about a surface normal, keeping its magnitude.
#[must_use]
pub fn reflect(v: Vec2, normal: Vec2) -> Vec2 {
    v - normal * (2.0 * v.dot(normal))
}

/// Moves `current` toward `target` by at most `rate`.
#[must_use]
pub fn approach(current: f32, target: f32, rate: f32) -> f32 {
    if current < target {
        (current + rate).min(target)
    } else {
        (current - rate).max(target)
    }
}

/// Height of the segment's line at `x`, extended past its endpoints.
fn line_height(segment: &Segment, x: f32) -> Option<f32> {
    let dx = segment.b.x - segment.a.x;
    if dx == 0.0 {
        return None;
    }
    Some(segment.a.y + (x - segment.a.x) / dx * (segment.b.y - segment.a.y))
}

// ============================================================================
// Sweeps
// ============================================================================

/// What the mover does at a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Keep moving along the surface
    Slide,
    /// End the motion at the contact point
    Stop,
    /// Ignore this segment for the rest of the sweep
    PassThrough,
}

/// Outcome of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    /// Final position
    pub position: Vec2,
    /// Contact that ended the motion
    pub stopped: Option<SegmentHit>,
    /// Surfaces slid along, in order
    pub slid: Vec<SegmentHit>,
}

/// Moves a point by `displacement`, resolving each contact with `respond`.
pub fn sweep<F>(stage: &Stage, start: Vec2, displacement: Vec2, mut respond: F) -> Sweep
where
    F: FnMut(&SegmentHit) -> Response,
{
    let mut position = start;
    let mut remaining = displacement;
    let mut ignored: Vec<usize> = Vec::new();
    let mut slid = Vec::new();

    loop {
        let Some(hit) = first_hit(stage, position, remaining, |i| ignored.contains(&i)) else {
            return Sweep {
                position: position + remaining,
                stopped: None,
                slid,
            };
        };
        match respond(&hit) {
            Response::PassThrough => ignored.push(hit.index),
            Response::Stop => {
                return Sweep {
                    position: hit.contact,
                    stopped: Some(hit),
                    slid,
                };
            },
            Response::Slide => {
                let rest = remaining * (1.0 - hit.t);
                remaining = rest - hit.normal * rest.dot(hit.normal);
                position = hit.contact;
                slid.push(hit);
                if slid.len() >= MAX_SLIDES {
                    trace!(?position, "slide limit reached");
                    return Sweep {
                        position,
                        stopped: None,
                        slid,
                    };
                }
            },
        }
    }
}

// ============================================================================
// Fighter kinematics
// ============================================================================

/// Stage interaction produced by a fighter's motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StageEvent {
    /// Landed on a surface
    Landed {
        /// Segment landed on
        index: usize,
    },
    /// Walked or slid off the supporting surface
    LeftGround,
    /// Slid along a wall while airborne
    WallContact {
        /// Wall normal
        normal: Vec2,
    },
    /// Teched a stage contact
    Tech {
        /// Surface normal
        normal: Vec2,
    },
    /// Stopped hard by the stage while in hitstun
    StageSpike {
        /// Surface normal
        normal: Vec2,
    },
    /// Landed in hitstun without teching
    Knockdown,
}

/// Inputs to one frame of kinematics.
#[derive(Debug, Clone, Copy)]
pub struct PhysicsContext<'a> {
    /// Stage geometry
    pub stage: &'a Stage,
    /// Fighter's character
    pub constants: &'a CharacterConstants,
    /// Global tuning
    pub config: &'a CombatConfig,
    /// Fighter's input this frame
    pub input: &'a InputRecord,
    /// Current frame
    pub now: Frame,
    /// Fighter is intangible this frame
    pub intangible: bool,
}

/// Runs one frame of gravity, control and collision for a fighter.
pub fn step(fighter: &mut Fighter, ctx: &PhysicsContext<'_>) -> Vec<StageEvent> {
    apply_forces(fighter, ctx);
    let mut events = Vec::new();
    if fighter.is_grounded() {
        let dx = fighter.velocity.x;
        if let Some(event) = move_along_ground(fighter, ctx.stage, dx, ctx.now) {
            events.push(event);
        }
    } else {
        move_airborne(fighter, ctx, &mut events);
    }
    forget_dropped_platform(fighter, ctx.stage);
    events
}

fn apply_forces(fighter: &mut Fighter, ctx: &PhysicsContext<'_>) {
    let constants = ctx.constants;
    let config = ctx.config;
    let grounded = fighter.is_grounded();
    let state = fighter.state;
    let mut v = fighter.velocity;

    let weightless = ctx.intangible
        || matches!(state, State::Airdodge | State::Grabbed { .. });
    if !grounded && !weightless {
        v.y -= constants.gravity;
    }
    if v.y > 0.0 {
        fighter.fast_falling = false;
    }
    if !fighter.spike {
        let cap = if fighter.fast_falling {
            constants.max_fall_speed * 2.0
        } else {
            constants.max_fall_speed
        };
        v.y = v.y.max(-cap);
    }

    if grounded {
        v.x = approach(v.x, ground_target(fighter, ctx), constants.traction);
    } else {
        match state {
            State::AirborneHitstun | State::GroundedHitstun => {
                let speed = v.length();
                if speed > 0.0 {
                    v *= (speed - config.launch_decay).max(0.0) / speed;
                }
            },
            State::Airdodge => v *= config.airdodge_decay,
            State::Grabbed { .. } => {},
            _ => {
                let target = ctx.input.stick_direction().x * constants.max_air_speed;
                v.x = approach(v.x, target, constants.air_acceleration);
            },
        }
    }
    fighter.velocity = v;
}

/// Horizontal speed a grounded state settles toward.
fn ground_target(fighter: &Fighter, ctx: &PhysicsContext<'_>) -> f32 {
    let constants = ctx.constants;
    let sign = fighter.facing.sign();
    match fighter.state {
        State::Walk => ctx.input.stick.x.clamp(-1.0, 1.0) * constants.walk_speed,
        State::Dash => sign * constants.dash_speed,
        State::Run => sign * constants.run_speed,
        State::Moonwalk => -sign * constants.dash_speed,
        State::Roll { direction } => direction.sign() * ctx.config.roll_speed,
        _ => 0.0,
    }
}

/// Moves a grounded fighter `dx` along its surface; walls block the move.
///
/// Walking off the surface drops the fighter into the matching airborne state.
fn move_along_ground(fighter: &mut Fighter, stage: &Stage, dx: f32, now: Frame) -> Option<StageEvent> {
    let index = fighter.ground?;
    let Some(segment) = stage.segment(index).copied() else {
        fighter.leave_ground();
        return Some(StageEvent::LeftGround);
    };
    if dx == 0.0 {
        if let Some(y) = segment.height_at(fighter.position.x) {
            fighter.position.y = y;
        }
        return None;
    }

    let start = fighter.position;
    let x = start.x + dx;
    let target = Vec2::new(x, line_height(&segment, x).unwrap_or(start.y));
    let swept = sweep(stage, start, target - start, |hit| {
        if stage.segment(hit.index).is_some_and(Segment::is_landable) {
            Response::PassThrough
        } else {
            Response::Stop
        }
    });
    if swept.stopped.is_some() {
        fighter.velocity.x = 0.0;
    }

    let x = swept.position.x;
    if let Some(y) = segment.height_at(x) {
        fighter.position = Vec2::new(x, y);
        return None;
    }
    if let Some(next) = stage.continuation(index, x) {
        let y = stage
            .segment(next)
            .and_then(|s| s.height_at(x))
            .unwrap_or(swept.position.y);
        fighter.ground = Some(next);
        fighter.position = Vec2::new(x, y);
        return None;
    }

    fighter.position = swept.position;
    fighter.leave_ground();
    match fighter.state {
        State::GroundedHitstun => fighter.state = State::AirborneHitstun,
        state if state.requires_ground() => fighter.set_state(State::IdleAirborne, now),
        _ => {},
    }
    debug!(fighter = %fighter.id, "left ground");
    Some(StageEvent::LeftGround)
}

fn move_airborne(fighter: &mut Fighter, ctx: &PhysicsContext<'_>, events: &mut Vec<StageEvent>) {
    let config = ctx.config;
    let stage = ctx.stage;
    let v = fighter.velocity;
    let speed = v.length();
    let in_hitstun = fighter.state.is_hitstun();
    let launched = fighter.state.is_launched();
    let dropping = ctx.input.stick.y <= -config.platform_drop_threshold && !in_hitstun;
    let dropped = fighter.dropped_platform;

    let swept = sweep(stage, fighter.position, v, |hit| {
        let Some(segment) = stage.segment(hit.index) else {
            return Response::PassThrough;
        };
        match segment.kind {
            SegmentKind::Platform => {
                if !segment.is_landable() || dropping || dropped == Some(hit.index) {
                    Response::PassThrough
                } else {
                    Response::Stop
                }
            },
            _ if segment.is_landable() => Response::Stop,
            _ => {
                if in_hitstun && speed > config.stage_spike_speed {
                    Response::Stop
                } else {
                    Response::Slide
                }
            },
        }
    });

    fighter.position = swept.position;
    for hit in &swept.slid {
        fighter.velocity = slide_velocity(fighter.velocity, hit.normal);
        if !launched {
            fighter.wall_contact = Some(WallContact {
                frame: ctx.now,
                normal: hit.normal,
            });
            events.push(StageEvent::WallContact { normal: hit.normal });
        }
    }

    let Some(hit) = swept.stopped else {
        return;
    };
    let landable = stage.segment(hit.index).is_some_and(Segment::is_landable);
    let now = ctx.now;

    if landable && !launched {
        let next = landing_state(fighter.state, ctx.constants);
        fighter.land(hit.index);
        fighter.position = hit.contact;
        fighter.set_state(next, now);
        events.push(StageEvent::Landed { index: hit.index });
        return;
    }

    if fighter.tech_input(now, config) {
        fighter.velocity = Vec2::ZERO;
        fighter.hitstun = 0;
        fighter.tumble_ready = false;
        fighter.position = hit.contact;
        fighter.spike = false;
        if landable {
            fighter.land(hit.index);
            fighter.set_state(State::Idle, now);
        } else {
            fighter.set_state(State::IdleAirborne, now);
        }
        events.push(StageEvent::Tech { normal: hit.normal });
        return;
    }

    if speed > config.stage_spike_speed {
        fighter.position = hit.contact;
        if config.stage_spike_freeze == 0 {
            fighter.velocity = reflect(fighter.velocity, hit.normal);
        } else {
            fighter.freeze = config.stage_spike_freeze;
            fighter.pending_reflect = Some(hit.normal);
        }
        events.push(StageEvent::StageSpike { normal: hit.normal });
        return;
    }

    // Slow launched landing
    fighter.land(hit.index);
    fighter.position = hit.contact;
    fighter.velocity = Vec2::ZERO;
    fighter.hitstun = 0;
    fighter.tumble_ready = false;
    fighter.set_state(State::Knockdown, now);
    events.push(StageEvent::Knockdown);
}

/// State entered when touching down in `state`.
fn landing_state(state: State, constants: &CharacterConstants) -> State {
    match state {
        State::Attack(kind) => match constants.moves.get(kind) {
            Some(def) if def.landing_lag > 0 => State::LandingLag {
                frames: def.landing_lag,
            },
            _ => State::Idle,
        },
        State::IdleAirborne | State::Airdodge => State::LandCrouch,
        _ => State::Idle,
    }
}

fn forget_dropped_platform(fighter: &mut Fighter, stage: &Stage) {
    let Some(index) = fighter.dropped_platform else {
        return;
    };
    let below = stage
        .segment(index)
        .map_or(true, |s| fighter.position.y < s.a.y.min(s.b.y) - CONTACT_EPSILON);
    if below {
        fighter.dropped_platform = None;
    }
}

/// Smash directional influence: nudges a fighter frozen in hitlag.
///
/// Grounded fighters only move horizontally. The nudge is collision checked
/// but never lands or spikes the fighter.
pub fn nudge(fighter: &mut Fighter, stage: &Stage, displacement: Vec2, now: Frame) {
    if displacement == Vec2::ZERO {
        return;
    }
    if fighter.is_grounded() {
        let velocity = fighter.velocity;
        let _ = move_along_ground(fighter, stage, displacement.x, now);
        fighter.velocity = velocity;
        return;
    }
    let swept = sweep(stage, fighter.position, displacement, |hit| {
        match stage.segment(hit.index).map(|s| s.kind) {
            Some(SegmentKind::Platform) => Response::PassThrough,
            Some(SegmentKind::Wall) => Response::Slide,
            _ => Response::Stop,
        }
    });
    fighter.position = swept.position;
}
