//! Scripted inputs for the demo match.
//!
//! Each pilot closes distance on its opponent, then cycles through a jab,
//! a forward smash, a grab and a forward throw, and a jump. Inputs depend
//! only on the frame number and positions so runs are reproducible.

use clash_common::Frame;
use clash_gameplay::{Button, Fighter, InputRecord};
use glam::Vec2;

/// Horizontal gap beyond which a pilot moves in.
pub const APPROACH_DISTANCE: f32 = 12.0;

/// Length of the close-range routine in frames.
pub const ROUTINE_FRAMES: Frame = 48;

/// Input for `me` this frame, chasing `target`.
#[must_use]
pub fn pilot_input(frame: Frame, me: &Fighter, target: Option<&Fighter>) -> InputRecord {
    if !me.in_play() {
        return InputRecord::neutral();
    }

    // Off the bottom of the stage: jump back toward the middle
    if !me.is_grounded() && me.position().y < -5.0 {
        let home = Vec2::new(-me.position().x.signum(), 1.0).normalize_or_zero();
        return if frame % 12 == 0 {
            InputRecord::neutral().with_stick(home).with_button(Button::Jump)
        } else {
            InputRecord::tilt(home)
        };
    }

    let Some(target) = target else {
        return InputRecord::neutral();
    };
    let gap = target.position().x - me.position().x;
    let toward = Vec2::new(if gap < 0.0 { -1.0 } else { 1.0 }, 0.0);

    if gap.abs() > APPROACH_DISTANCE {
        return if frame % 30 == 0 {
            InputRecord::smash(toward)
        } else {
            InputRecord::tilt(toward)
        };
    }

    // Offset by id so both pilots are not in lockstep
    let phase = (frame + me.id().raw().wrapping_mul(7)) % ROUTINE_FRAMES;
    match phase {
        0 => InputRecord::button(Button::Attack),
        12 => InputRecord::smash(toward).with_button(Button::Attack),
        30 => InputRecord::button(Button::Grab),
        38 => InputRecord::smash(toward),
        44 => InputRecord::button(Button::Jump),
        _ => InputRecord::neutral(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clash_common::{CharacterId, FighterId};
    use clash_gameplay::{CombatConfig, DirectionalAction};

    fn fighter(id: u32, x: f32) -> Fighter {
        Fighter::new(
            FighterId::new(id),
            CharacterId::new(0),
            Vec2::new(x, 0.0),
            Some(0),
            4,
            &CombatConfig::default(),
        )
    }

    #[test]
    fn test_far_pilot_approaches() {
        let me = fighter(1, -30.0);
        let target = fighter(2, 30.0);
        let input = pilot_input(1, &me, Some(&target));
        assert_eq!(input.stick, Vec2::new(1.0, 0.0));
        assert!(matches!(input.directional, Some(DirectionalAction::Tilt(_))));
        let dash = pilot_input(30, &me, Some(&target));
        assert!(matches!(dash.directional, Some(DirectionalAction::Smash(_))));
    }

    #[test]
    fn test_close_pilot_runs_routine() {
        let me = fighter(1, 0.0);
        let target = fighter(2, -5.0);
        // Phase 0 for id 1 is frame 41
        let jab = pilot_input(41, &me, Some(&target));
        assert!(jab.held(Button::Attack));
        let smash = pilot_input(41 + 12, &me, Some(&target));
        assert_eq!(smash.stick, Vec2::new(-1.0, 0.0));
        assert!(smash.held(Button::Attack));
    }

    #[test]
    fn test_pilot_without_target_idles() {
        let me = fighter(1, 0.0);
        assert_eq!(pilot_input(5, &me, None), InputRecord::neutral());
    }
}
