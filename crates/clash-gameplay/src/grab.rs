//! Grab bookkeeping.

use ahash::AHashMap;
use clash_common::{FighterId, Frame};
use glam::Vec2;

use crate::input::Facing;

/// Per-grabber record of victims that may not be re-grabbed yet.
///
/// A throw at frame `F` with cooldown `c` blocks the victim through `F + c`
/// inclusive; the grab succeeds again from `F + c + 1`.
#[derive(Debug, Clone, Default)]
pub struct GrabCooldowns {
    until: AHashMap<FighterId, Frame>,
}

impl GrabCooldowns {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a cooldown for `victim` at `frame`.
    pub fn start(&mut self, victim: FighterId, frame: Frame, cooldown: Frame) {
        self.until.insert(victim, frame.saturating_add(cooldown));
    }

    /// Whether `victim` may be grabbed at `now`.
    #[must_use]
    pub fn can_grab(&self, victim: FighterId, now: Frame) -> bool {
        self.until.get(&victim).map_or(true, |until| now > *until)
    }

    /// Last blocked frame for `victim`.
    #[must_use]
    pub fn blocked_until(&self, victim: FighterId) -> Option<Frame> {
        self.until.get(&victim).copied()
    }

    /// Drops expired entries.
    pub fn prune(&mut self, now: Frame) {
        self.until.retain(|_, until| now <= *until);
    }

    /// Forgets every cooldown.
    pub fn clear(&mut self) {
        self.until.clear();
    }

    /// Number of active entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.until.len()
    }

    /// Whether no cooldown is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.until.is_empty()
    }
}

/// Where a grabbed fighter is held.
#[must_use]
pub fn hold_position(grabber: Vec2, facing: Facing, offset: f32) -> Vec2 {
    grabber + Vec2::new(offset * facing.sign(), 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_boundary() {
        let victim = FighterId::new(2);
        let mut cooldowns = GrabCooldowns::new();
        cooldowns.start(victim, 100, 60);
        assert!(!cooldowns.can_grab(victim, 100));
        assert!(!cooldowns.can_grab(victim, 160));
        assert!(cooldowns.can_grab(victim, 161));
        assert!(cooldowns.can_grab(FighterId::new(3), 100));
    }

    #[test]
    fn test_prune() {
        let mut cooldowns = GrabCooldowns::new();
        cooldowns.start(FighterId::new(1), 0, 60);
        cooldowns.start(FighterId::new(2), 50, 60);
        cooldowns.prune(61);
        assert_eq!(cooldowns.len(), 1);
        assert_eq!(cooldowns.blocked_until(FighterId::new(2)), Some(110));
        cooldowns.clear();
        assert!(cooldowns.is_empty());
    }

    #[test]
    fn test_hold_position() {
        assert_eq!(
            hold_position(Vec2::new(10.0, 0.0), Facing::Left, 6.0),
            Vec2::new(4.0, 0.0)
        );
    }
}
