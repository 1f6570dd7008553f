//! Stage geometry: surface segments, blast zone and spawn points.

use clash_common::{rotate90_ccw, ClashError, ClashResult, DataError};
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Vertical tolerance for "standing on" a surface.
pub const GROUND_EPSILON: f32 = 1e-3;

/// How a segment interacts with fighters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    /// Solid from the playable side; fighters slide along it
    Wall,
    /// Solid ground that can be landed on
    Floor,
    /// One-way ground; can be dropped through
    Platform,
}

/// A stage surface.
///
/// Playable space lies to the left of `a -> b`, so a floor is authored
/// left to right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// First endpoint
    pub a: Vec2,
    /// Second endpoint
    pub b: Vec2,
    /// Surface type
    pub kind: SegmentKind,
}

impl Segment {
    /// Creates a segment.
    #[must_use]
    pub const fn new(a: Vec2, b: Vec2, kind: SegmentKind) -> Self {
        Self { a, b, kind }
    }

    /// Creates a wall.
    #[must_use]
    pub const fn wall(a: Vec2, b: Vec2) -> Self {
        Self::new(a, b, SegmentKind::Wall)
    }

    /// Creates a floor.
    #[must_use]
    pub const fn floor(a: Vec2, b: Vec2) -> Self {
        Self::new(a, b, SegmentKind::Floor)
    }

    /// Creates a one-way platform.
    #[must_use]
    pub const fn platform(a: Vec2, b: Vec2) -> Self {
        Self::new(a, b, SegmentKind::Platform)
    }

    /// Unit normal pointing into playable space.
    #[must_use]
    pub fn normal(&self) -> Vec2 {
        rotate90_ccw(self.b - self.a).normalize_or_zero()
    }

    /// Segment length.
    #[must_use]
    pub fn length(&self) -> f32 {
        (self.b - self.a).length()
    }

    /// Whether fighters can stand on this segment.
    #[must_use]
    pub fn is_landable(&self) -> bool {
        self.kind != SegmentKind::Wall && self.normal().y > 0.0
    }

    /// Whether `x` lies within the horizontal span of the segment.
    #[must_use]
    pub fn spans_x(&self, x: f32) -> bool {
        let (lo, hi) = if self.a.x <= self.b.x {
            (self.a.x, self.b.x)
        } else {
            (self.b.x, self.a.x)
        };
        x >= lo && x <= hi
    }

    /// Surface height at `x`, `None` outside the span or for vertical segments.
    #[must_use]
    pub fn height_at(&self, x: f32) -> Option<f32> {
        let dx = self.b.x - self.a.x;
        if dx == 0.0 || !self.spans_x(x) {
            return None;
        }
        Some(self.a.y + (x - self.a.x) / dx * (self.b.y - self.a.y))
    }
}

/// Axis-aligned box outside of which fighters lose a stock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlastZone {
    /// Lower-left corner
    pub min: Vec2,
    /// Upper-right corner
    pub max: Vec2,
}

impl BlastZone {
    /// Creates a blast zone.
    #[must_use]
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Whether `point` is inside the zone (boundary included).
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }
}

/// Validated stage geometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stage {
    /// Display name
    pub name: String,
    segments: Vec<Segment>,
    blast_zone: BlastZone,
    spawn_points: Vec<Vec2>,
}

/// Serialized form, validated on conversion.
#[derive(Deserialize)]
struct StageData {
    name: String,
    segments: Vec<Segment>,
    blast_zone: BlastZone,
    spawn_points: Vec<Vec2>,
}

impl Stage {
    /// Creates a stage, rejecting malformed geometry.
    pub fn new(
        name: impl Into<String>,
        segments: Vec<Segment>,
        blast_zone: BlastZone,
        spawn_points: Vec<Vec2>,
    ) -> Result<Self, DataError> {
        if let Some(index) = segments.iter().position(|s| s.length() == 0.0) {
            return Err(DataError::ZeroLengthSegment { index });
        }
        if blast_zone.max.x <= blast_zone.min.x || blast_zone.max.y <= blast_zone.min.y {
            return Err(DataError::EmptyBlastZone {
                min_x: blast_zone.min.x,
                min_y: blast_zone.min.y,
                max_x: blast_zone.max.x,
                max_y: blast_zone.max.y,
            });
        }
        if spawn_points.is_empty() {
            return Err(DataError::NoSpawnPoints);
        }
        Ok(Self {
            name: name.into(),
            segments,
            blast_zone,
            spawn_points,
        })
    }

    /// Parses and validates a stage from RON.
    pub fn from_ron(text: &str) -> ClashResult<Self> {
        let data: StageData =
            ron::from_str(text).map_err(|e| ClashError::Serialization(e.to_string()))?;
        Ok(Self::new(
            data.name,
            data.segments,
            data.blast_zone,
            data.spawn_points,
        )?)
    }

    /// Serializes the stage to RON.
    pub fn to_ron(&self) -> ClashResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ClashError::Serialization(e.to_string()))
    }

    /// Flat main floor with walled sides and three platforms.
    #[must_use]
    pub fn proving_grounds() -> Self {
        let segments = vec![
            Segment::floor(Vec2::new(-60.0, 0.0), Vec2::new(60.0, 0.0)),
            Segment::wall(Vec2::new(60.0, 0.0), Vec2::new(60.0, -40.0)),
            Segment::wall(Vec2::new(60.0, -40.0), Vec2::new(-60.0, -40.0)),
            Segment::wall(Vec2::new(-60.0, -40.0), Vec2::new(-60.0, 0.0)),
            Segment::platform(Vec2::new(-35.0, 25.0), Vec2::new(-15.0, 25.0)),
            Segment::platform(Vec2::new(15.0, 25.0), Vec2::new(35.0, 25.0)),
            Segment::platform(Vec2::new(-10.0, 45.0), Vec2::new(10.0, 45.0)),
        ];
        Self {
            name: "Proving Grounds".to_string(),
            segments,
            blast_zone: BlastZone::new(Vec2::new(-160.0, -100.0), Vec2::new(160.0, 150.0)),
            spawn_points: vec![
                Vec2::new(-30.0, 0.0),
                Vec2::new(30.0, 0.0),
                Vec2::new(-10.0, 0.0),
                Vec2::new(10.0, 0.0),
            ],
        }
    }

    /// Ordered segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment by index.
    #[must_use]
    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// Blast zone.
    #[must_use]
    pub const fn blast_zone(&self) -> &BlastZone {
        &self.blast_zone
    }

    /// Spawn points.
    #[must_use]
    pub fn spawn_points(&self) -> &[Vec2] {
        &self.spawn_points
    }

    /// Spawn point for a slot, wrapping around the list.
    #[must_use]
    pub fn spawn_point(&self, slot: usize) -> Vec2 {
        self.spawn_points
            .get(slot % self.spawn_points.len().max(1))
            .copied()
            .unwrap_or(Vec2::ZERO)
    }

    /// Landable segment `point` is standing on, lowest index first.
    #[must_use]
    pub fn ground_at(&self, point: Vec2) -> Option<usize> {
        self.segments.iter().position(|s| {
            s.is_landable()
                && s.height_at(point.x)
                    .is_some_and(|h| (h - point.y).abs() <= GROUND_EPSILON)
        })
    }

    /// Landable segment sharing the endpoint of `from` that `x` walked past.
    #[must_use]
    pub fn continuation(&self, from: usize, x: f32) -> Option<usize> {
        let seg = self.segments.get(from)?;
        let (left, right) = if seg.a.x <= seg.b.x {
            (seg.a, seg.b)
        } else {
            (seg.b, seg.a)
        };
        let edge = if x > right.x { right } else { left };
        self.segments.iter().enumerate().find_map(|(i, s)| {
            let joined = i != from
                && s.is_landable()
                && s.spans_x(x)
                && (s.a.distance(edge) <= GROUND_EPSILON || s.b.distance(edge) <= GROUND_EPSILON);
            joined.then_some(i)
        })
    }
}
