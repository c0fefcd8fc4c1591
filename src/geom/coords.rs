//! Coordinate-system conversion and the distance helpers shared by the primitives.
//!
//! Coordinates travel as plain `[f64; 3]` triples because their meaning depends on
//! the system they are expressed in: `(x, y, z)` for Cartesian, `(ρ, α, z)` for
//! cylindrical.

use std::f64::consts::PI;
use std::fmt;

use super::core::Point3;

/// Coordinate system of a coordinate triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoordSystem {
    #[default]
    Cartesian,
    Cylindrical,
    /// No system declared; consumers fall back to a context system.
    Undefined,
}

impl CoordSystem {
    /// Returns `self` unless undefined, in which case `fallback` is used.
    #[must_use]
    pub const fn or(self, fallback: Self) -> Self {
        match self {
            Self::Undefined => fallback,
            other => other,
        }
    }

    #[must_use]
    pub const fn is_defined(self) -> bool {
        !matches!(self, Self::Undefined)
    }

    /// Numeric form used in persisted documents.
    #[must_use]
    pub const fn as_index(self) -> i32 {
        match self {
            Self::Cartesian => 0,
            Self::Cylindrical => 1,
            Self::Undefined => -1,
        }
    }

    #[must_use]
    pub const fn from_index(index: i32) -> Self {
        match index {
            0 => Self::Cartesian,
            1 => Self::Cylindrical,
            _ => Self::Undefined,
        }
    }
}

impl fmt::Display for CoordSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cartesian => f.write_str("Cartesian"),
            Self::Cylindrical => f.write_str("Cylindrical"),
            Self::Undefined => f.write_str("Undefined"),
        }
    }
}

/// Convert a coordinate triple between systems.
///
/// Only Cartesian ↔ cylindrical is a real conversion; every other combination
/// returns the input unchanged.
#[must_use]
pub fn transform_coord_system(coord: [f64; 3], from: CoordSystem, to: CoordSystem) -> [f64; 3] {
    match (from, to) {
        (CoordSystem::Cartesian, CoordSystem::Cylindrical) => [
            coord[0].hypot(coord[1]),
            coord[1].atan2(coord[0]),
            coord[2],
        ],
        (CoordSystem::Cylindrical, CoordSystem::Cartesian) => [
            coord[0] * coord[1].cos(),
            coord[0] * coord[1].sin(),
            coord[2],
        ],
        _ => coord,
    }
}

/// Convert a triple in `from` to a Cartesian point.
#[must_use]
pub fn to_cartesian(coord: [f64; 3], from: CoordSystem) -> Point3 {
    Point3::from_array(transform_coord_system(coord, from, CoordSystem::Cartesian))
}

/// Projection of a point onto the line through `start` and `stop`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineDistance {
    /// Normalized foot position; `0..=1` lies between the two endpoints.
    pub foot: f64,
    /// Perpendicular distance from the point to the foot point.
    pub distance: f64,
}

/// Foot parameter and perpendicular distance of `p` with respect to the line
/// `start → stop`. All inputs are Cartesian.
///
/// A degenerate line (`start == stop`) yields a non-finite foot; callers that
/// range-check the foot treat that as "not on the segment".
#[must_use]
pub fn point_line_distance(p: Point3, start: Point3, stop: Point3) -> LineDistance {
    let dir = stop - start;
    let foot = (p - start).dot(dir) / dir.length_squared();
    let projected = start + dir * foot;
    LineDistance {
        foot,
        distance: p.distance_to(projected),
    }
}

/// Inclusive per-axis containment of `p` in the box spanned by `start`/`stop`.
///
/// The bounds may be given in either order. In the cylindrical system the angle is
/// unwrapped by whole turns until it falls inside the angular bounds (when it can).
#[must_use]
pub fn coord_in_range(p: [f64; 3], start: [f64; 3], stop: [f64; 3], system: CoordSystem) -> bool {
    let mut pos = p;
    if system == CoordSystem::Cylindrical {
        let lower = start[1].min(stop[1]);
        let upper = start[1].max(stop[1]);
        let turn = 2.0 * PI;
        if pos[1] < lower {
            pos[1] += ((lower - pos[1]) / turn).ceil() * turn;
        }
        if pos[1] > upper {
            pos[1] -= ((pos[1] - upper) / turn).ceil() * turn;
        }
    }

    (0..3).all(|axis| {
        let lower = start[axis].min(stop[axis]);
        let upper = start[axis].max(stop[axis]);
        pos[axis] >= lower && pos[axis] <= upper
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cartesian_cylindrical_round_trip() {
        let cart = [1.0, 1.0, 2.0];
        let cyl = transform_coord_system(cart, CoordSystem::Cartesian, CoordSystem::Cylindrical);
        assert!((cyl[0] - 2.0_f64.sqrt()).abs() < 1e-12);
        assert!((cyl[1] - PI / 4.0).abs() < 1e-12);
        assert!((cyl[2] - 2.0).abs() < 1e-12);

        let back = transform_coord_system(cyl, CoordSystem::Cylindrical, CoordSystem::Cartesian);
        for (a, b) in back.iter().zip(cart.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn undefined_system_is_identity() {
        let p = [3.0, -1.0, 7.0];
        assert_eq!(
            transform_coord_system(p, CoordSystem::Undefined, CoordSystem::Cylindrical),
            p
        );
        assert_eq!(
            transform_coord_system(p, CoordSystem::Cartesian, CoordSystem::Undefined),
            p
        );
    }

    #[test]
    fn foot_point_and_distance() {
        let d = point_line_distance(
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
        );
        assert!((d.foot - 0.25).abs() < 1e-12);
        assert!((d.distance - 2.0).abs() < 1e-12);

        let beyond = point_line_distance(
            Point3::new(6.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
        );
        assert!(beyond.foot > 1.0);
    }

    #[test]
    fn range_check_is_order_independent() {
        let p = [1.0, 1.0, 1.0];
        assert!(coord_in_range(p, [0.0; 3], [2.0; 3], CoordSystem::Cartesian));
        assert!(coord_in_range(p, [2.0; 3], [0.0; 3], CoordSystem::Cartesian));
        assert!(!coord_in_range([3.0, 1.0, 1.0], [2.0; 3], [0.0; 3], CoordSystem::Cartesian));
    }

    #[test]
    fn cylindrical_range_unwraps_angle() {
        // wedge from 350° to 370° expressed in radians
        let start = [0.0, 350f64.to_radians(), 0.0];
        let stop = [2.0, 370f64.to_radians(), 1.0];
        let inside = [1.0, 5f64.to_radians(), 0.5];
        let outside = [1.0, 20f64.to_radians(), 0.5];
        assert!(coord_in_range(inside, start, stop, CoordSystem::Cylindrical));
        assert!(!coord_in_range(outside, start, stop, CoordSystem::Cylindrical));
    }
}
