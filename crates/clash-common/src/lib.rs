//! # Clash Common
//!
//! Common types and shared abstractions for Project Clash.
//!
//! This crate provides the foundational pieces used by the combat core:
//! - ID types (FighterId, CharacterId, GroupId)
//! - Frame counting and inclusive frame windows
//! - Shape-pair distance primitives and segment math
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod frame;
pub mod geometry;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::frame::*;
    pub use crate::geometry::*;
    pub use crate::ids::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_exports() {
        let window = FrameWindow::range(0, 3);
        assert!(window.contains(2));

        let shape = Shape::circle(glam::Vec2::ZERO, 1.0);
        assert_eq!(shape.radius(), 1.0);

        let err: ClashError = DataError::NoSpawnPoints.into();
        assert!(err.to_string().contains("spawn"));
    }
}
