//! Shape-pair distance primitives and segment math.
//!
//! Distances are signed: a value `<= 0` means the shapes touch or overlap.
//! All shapes are circles or pills (a segment swept by a radius), which keeps
//! every pair test down to point/segment distances.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// 2D cross product (z component of the 3D cross product).
#[must_use]
pub fn cross(v: Vec2, w: Vec2) -> f32 {
    v.perp_dot(w)
}

/// Rotates a vector 90 degrees counter-clockwise.
#[must_use]
pub fn rotate90_ccw(v: Vec2) -> Vec2 {
    v.perp()
}

/// Closest point to `c` on the segment `a`-`b`.
#[must_use]
pub fn closest_point_on_segment(c: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq == 0.0 {
        return a;
    }
    let t = ((c - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Intersection point of segments `p1`-`p2` and `q1`-`q2`, if any.
///
/// Collinear overlapping segments report a point inside the overlap.
#[must_use]
pub fn segment_intersection(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> Option<Vec2> {
    let p = p1;
    let r = p2 - p1;
    let q = q1;
    let s = q2 - q1;

    let r_cross_s = cross(r, s);
    let q_minus_p = q - p;
    let q_minus_p_cross_r = cross(q_minus_p, r);

    if r_cross_s == 0.0 {
        if q_minus_p_cross_r != 0.0 {
            // Parallel and non-intersecting
            return None;
        }
        let rr = r.dot(r);
        if rr == 0.0 {
            // First segment is a point
            return (closest_point_on_segment(p, q1, q2) == p).then_some(p);
        }
        // Collinear: project the second segment onto the first
        let t0 = q_minus_p.dot(r) / rr;
        let t1 = t0 + s.dot(r) / rr;
        return if (0.0..=1.0).contains(&t0) {
            Some(p + r * t0)
        } else if (0.0..=1.0).contains(&t1) {
            Some(p + r * t1)
        } else if (t0 < 0.0 && t1 > 1.0) || (t1 < 0.0 && t0 > 1.0) {
            // First segment lies inside the second one
            Some(p)
        } else {
            None
        };
    }

    let t = cross(q_minus_p, s) / r_cross_s;
    let u = q_minus_p_cross_r / r_cross_s;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(p + r * t)
    } else {
        None
    }
}

/// Closest approach between two shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPass {
    /// Signed separation (negative = overlap depth).
    pub distance: f32,
    /// Point halfway between the nearest features.
    pub midpoint: Vec2,
}

impl NearestPass {
    /// Whether the shapes touch or overlap.
    #[must_use]
    pub fn is_collision(&self) -> bool {
        self.distance <= 0.0
    }
}

/// Collision shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Disc.
    Circle {
        /// Centre point.
        center: Vec2,
        /// Radius.
        radius: f32,
    },
    /// Segment `a`-`b` swept by `radius` (a capsule).
    Pill {
        /// First endpoint.
        a: Vec2,
        /// Second endpoint.
        b: Vec2,
        /// Radius.
        radius: f32,
    },
}

impl Shape {
    /// Creates a circle.
    #[must_use]
    pub const fn circle(center: Vec2, radius: f32) -> Self {
        Self::Circle { center, radius }
    }

    /// Creates a pill.
    #[must_use]
    pub const fn pill(a: Vec2, b: Vec2, radius: f32) -> Self {
        Self::Pill { a, b, radius }
    }

    /// Radius of the shape.
    #[must_use]
    pub const fn radius(&self) -> f32 {
        match self {
            Self::Circle { radius, .. } | Self::Pill { radius, .. } => *radius,
        }
    }

    /// Centre of the shape (midpoint of the core segment for pills).
    #[must_use]
    pub fn center(&self) -> Vec2 {
        match self {
            Self::Circle { center, .. } => *center,
            Self::Pill { a, b, .. } => (*a + *b) * 0.5,
        }
    }

    /// Returns the shape moved by `offset`.
    #[must_use]
    pub fn translated(self, offset: Vec2) -> Self {
        match self {
            Self::Circle { center, radius } => Self::Circle {
                center: center + offset,
                radius,
            },
            Self::Pill { a, b, radius } => Self::Pill {
                a: a + offset,
                b: b + offset,
                radius,
            },
        }
    }

    /// Returns the shape mirrored across the vertical axis through the origin.
    #[must_use]
    pub fn mirrored_x(self) -> Self {
        let flip = |v: Vec2| Vec2::new(-v.x, v.y);
        match self {
            Self::Circle { center, radius } => Self::Circle {
                center: flip(center),
                radius,
            },
            Self::Pill { a, b, radius } => Self::Pill {
                a: flip(a),
                b: flip(b),
                radius,
            },
        }
    }

    /// Places a local (right-facing) shape in world space.
    ///
    /// `facing_sign` is `1.0` for right, `-1.0` for left.
    #[must_use]
    pub fn placed(self, origin: Vec2, facing_sign: f32) -> Self {
        let local = if facing_sign < 0.0 {
            self.mirrored_x()
        } else {
            self
        };
        local.translated(origin)
    }

    /// Signed distance between two shapes.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f32 {
        Self::nearest_pass(self, other).distance
    }

    /// Whether two shapes touch or overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.distance(other) <= 0.0
    }

    /// Closest approach between two shapes.
    #[must_use]
    pub fn nearest_pass(s1: &Self, s2: &Self) -> NearestPass {
        match (*s1, *s2) {
            (
                Self::Circle {
                    center: c1,
                    radius: r1,
                },
                Self::Circle {
                    center: c2,
                    radius: r2,
                },
            ) => NearestPass {
                distance: circle_circle_distance(c1, r1, c2, r2),
                midpoint: (c1 + c2) * 0.5,
            },
            (Self::Circle { center, radius }, Self::Pill { a, b, radius: rp }) => {
                circle_pill_pass(center, radius, a, b, rp)
            },
            (Self::Pill { .. }, Self::Circle { .. }) => Self::nearest_pass(s2, s1),
            (
                Self::Pill {
                    a: a1,
                    b: b1,
                    radius: r1,
                },
                Self::Pill {
                    a: a2,
                    b: b2,
                    radius: r2,
                },
            ) => {
                if let Some(point) = segment_intersection(a1, b1, a2, b2) {
                    return NearestPass {
                        distance: -(r1 + r2),
                        midpoint: point,
                    };
                }
                [
                    circle_pill_pass(a1, r1, a2, b2, r2),
                    circle_pill_pass(b1, r1, a2, b2, r2),
                    circle_pill_pass(a2, r2, a1, b1, r1),
                    circle_pill_pass(b2, r2, a1, b1, r1),
                ]
                .into_iter()
                .reduce(|best, pass| {
                    if pass.distance < best.distance {
                        pass
                    } else {
                        best
                    }
                })
                .unwrap_or(NearestPass {
                    distance: f32::INFINITY,
                    midpoint: Vec2::ZERO,
                })
            },
        }
    }
}

/// Distance between two circles.
#[must_use]
pub fn circle_circle_distance(c1: Vec2, r1: f32, c2: Vec2, r2: f32) -> f32 {
    (c1 - c2).length() - r1 - r2
}

/// Distance between a circle and a pill.
#[must_use]
pub fn circle_pill_distance(c: Vec2, rc: f32, a: Vec2, b: Vec2, rp: f32) -> f32 {
    circle_pill_pass(c, rc, a, b, rp).distance
}

/// Distance between two pills.
#[must_use]
pub fn pill_pill_distance(a1: Vec2, b1: Vec2, r1: f32, a2: Vec2, b2: Vec2, r2: f32) -> f32 {
    Shape::pill(a1, b1, r1).distance(&Shape::pill(a2, b2, r2))
}

fn circle_pill_pass(c: Vec2, rc: f32, a: Vec2, b: Vec2, rp: f32) -> NearestPass {
    let ab = b - a;
    let len_sq = ab.length_squared();
    let d_a = (a - c).length();
    let d_b = (b - c).length();

    // Perpendicular distance only counts when the foot lies on the segment
    let (d_p, foot) = if len_sq > 0.0 {
        let t = (c - a).dot(ab) / len_sq;
        let foot = a + ab * t;
        if (0.0..=1.0).contains(&t) {
            ((c - foot).length(), foot)
        } else {
            (f32::INFINITY, foot)
        }
    } else {
        (f32::INFINITY, a)
    };

    let (nearest, point) = if d_p <= d_a && d_p <= d_b {
        (d_p, foot)
    } else if d_a <= d_b {
        (d_a, a)
    } else {
        (d_b, b)
    };

    NearestPass {
        distance: nearest - rp - rc,
        midpoint: (c + point) * 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_circle_circle_distance() {
        let a = Shape::circle(Vec2::new(0.0, 0.0), 1.0);
        let b = Shape::circle(Vec2::new(3.0, 0.0), 1.0);
        assert!((a.distance(&b) - 1.0).abs() < EPS);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_circle_pill_perpendicular() {
        let pill = Shape::pill(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), 1.0);
        let circle = Shape::circle(Vec2::new(5.0, 5.0), 1.0);
        assert!((pill.distance(&circle) - 3.0).abs() < EPS);
        assert!((circle.distance(&pill) - 3.0).abs() < EPS);
    }

    #[test]
    fn test_circle_pill_past_endpoint() {
        let pill = Shape::pill(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), 1.0);
        let circle = Shape::circle(Vec2::new(13.0, 4.0), 1.0);
        // Nearest feature is endpoint b at distance 5
        assert!((pill.distance(&circle) - 3.0).abs() < EPS);
    }

    #[test]
    fn test_degenerate_pill_is_circle() {
        let pill = Shape::pill(Vec2::new(1.0, 1.0), Vec2::new(1.0, 1.0), 1.0);
        let circle = Shape::circle(Vec2::new(4.0, 1.0), 1.0);
        assert!((pill.distance(&circle) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_touching_counts_as_collision() {
        let a = Shape::circle(Vec2::ZERO, 1.0);
        let b = Shape::circle(Vec2::new(2.0, 0.0), 1.0);
        assert!(a.overlaps(&b));
    }

    #[test]
    fn test_crossing_pills() {
        let a = Shape::pill(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0), 0.5);
        let b = Shape::pill(Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0), 0.25);
        let pass = Shape::nearest_pass(&a, &b);
        assert!((pass.distance + 0.75).abs() < EPS);
        assert!(pass.midpoint.length() < EPS);
    }

    #[test]
    fn test_parallel_pills() {
        let a = Shape::pill(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), 1.0);
        let b = Shape::pill(Vec2::new(0.0, 5.0), Vec2::new(10.0, 5.0), 1.0);
        assert!((a.distance(&b) - 3.0).abs() < EPS);
    }

    #[test]
    fn test_segment_intersection_divergent() {
        let hit = segment_intersection(
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(0.0, 2.0),
            Vec2::new(2.0, 0.0),
        );
        assert_eq!(hit, Some(Vec2::new(1.0, 1.0)));
    }

    #[test]
    fn test_segment_intersection_miss() {
        let hit = segment_intersection(
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, -1.0),
            Vec2::new(2.0, 1.0),
        );
        assert_eq!(hit, None);
    }

    #[test]
    fn test_segment_intersection_parallel() {
        let hit = segment_intersection(
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
        );
        assert_eq!(hit, None);
    }

    #[test]
    fn test_segment_intersection_collinear() {
        let overlap = segment_intersection(
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(6.0, 0.0),
        );
        assert_eq!(overlap, Some(Vec2::new(2.0, 0.0)));

        let contained = segment_intersection(
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(5.0, 0.0),
        );
        assert_eq!(contained, Some(Vec2::new(1.0, 0.0)));

        let disjoint = segment_intersection(
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(3.0, 0.0),
        );
        assert_eq!(disjoint, None);
    }

    #[test]
    fn test_rotate90_points_into_playable_side() {
        // A floor authored left-to-right has its normal pointing up
        let n = rotate90_ccw(Vec2::new(10.0, 0.0)).normalize();
        assert_eq!(n, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_placed_mirrors_for_left_facing() {
        let local = Shape::circle(Vec2::new(2.0, 1.0), 1.0);
        let world = local.placed(Vec2::new(10.0, 0.0), -1.0);
        assert_eq!(world.center(), Vec2::new(8.0, 1.0));
    }

    fn shape_strategy() -> impl Strategy<Value = Shape> {
        let coord = -50.0f32..50.0;
        let radius = 0.1f32..5.0;
        prop_oneof![
            (coord.clone(), coord.clone(), radius.clone())
                .prop_map(|(x, y, r)| Shape::circle(Vec2::new(x, y), r)),
            (coord.clone(), coord.clone(), coord.clone(), coord, radius).prop_map(
                |(ax, ay, bx, by, r)| Shape::pill(Vec2::new(ax, ay), Vec2::new(bx, by), r)
            ),
        ]
    }

    proptest! {
        #[test]
        fn prop_distance_is_symmetric(a in shape_strategy(), b in shape_strategy()) {
            let d1 = a.distance(&b);
            let d2 = b.distance(&a);
            prop_assert!((d1 - d2).abs() < 1e-3);
        }

        #[test]
        fn prop_distance_is_translation_invariant(
            a in shape_strategy(),
            b in shape_strategy(),
            dx in -20.0f32..20.0,
            dy in -20.0f32..20.0,
        ) {
            let offset = Vec2::new(dx, dy);
            let d1 = a.distance(&b);
            let d2 = a.translated(offset).distance(&b.translated(offset));
            prop_assert!((d1 - d2).abs() < 1e-2);
        }

        #[test]
        fn prop_shape_overlaps_itself(a in shape_strategy()) {
            prop_assert!(a.overlaps(&a));
        }
    }
}
