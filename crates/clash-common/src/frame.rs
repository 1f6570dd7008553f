//! Frame counting and frame windows.

use serde::{Deserialize, Serialize};

/// Frame counter. One frame is 1/60 s.
pub type Frame = u32;

/// Simulation rate.
pub const FRAMES_PER_SECOND: Frame = 60;

/// A span of frames relative to the frame a state (or move) was entered.
///
/// Frame 0 is the entry frame. Ranges are inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameWindow {
    /// Active for the whole state.
    Always,
    /// Active from `start` through `end` inclusive.
    Range(Frame, Frame),
}

impl FrameWindow {
    /// Creates an inclusive range window.
    #[must_use]
    pub const fn range(start: Frame, end: Frame) -> Self {
        Self::Range(start, end)
    }

    /// Checks whether the window covers `elapsed` frames since entry.
    #[must_use]
    pub const fn contains(&self, elapsed: Frame) -> bool {
        match self {
            Self::Always => true,
            Self::Range(start, end) => elapsed >= *start && elapsed <= *end,
        }
    }

    /// Number of frames covered, `None` when unbounded.
    #[must_use]
    pub const fn duration(&self) -> Option<Frame> {
        match self {
            Self::Always => None,
            Self::Range(start, end) => {
                if *end >= *start {
                    Some(*end - *start + 1)
                } else {
                    Some(0)
                }
            },
        }
    }
}

/// Checks an optional window; `None` never covers anything.
#[must_use]
pub fn window_active(window: Option<FrameWindow>, elapsed: Frame) -> bool {
    window.is_some_and(|w| w.contains(elapsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_is_inclusive() {
        let window = FrameWindow::range(4, 15);
        assert!(!window.contains(3));
        assert!(window.contains(4));
        assert!(window.contains(15));
        assert!(!window.contains(16));
    }

    #[test]
    fn test_always_covers_everything() {
        assert!(FrameWindow::Always.contains(0));
        assert!(FrameWindow::Always.contains(Frame::MAX));
        assert_eq!(FrameWindow::Always.duration(), None);
    }

    #[test]
    fn test_duration() {
        assert_eq!(FrameWindow::range(4, 15).duration(), Some(12));
        assert_eq!(FrameWindow::range(5, 4).duration(), Some(0));
    }

    #[test]
    fn test_optional_window() {
        assert!(!window_active(None, 0));
        assert!(window_active(Some(FrameWindow::range(0, 0)), 0));
    }
}
