mod coords;
mod core;
mod transform;

pub use coords::{
    CoordSystem, LineDistance, coord_in_range, point_line_distance, to_cartesian,
    transform_coord_system,
};
pub use core::{BBox, Point3, Tolerance, Transform, Vec3};
pub use transform::{CsTransform, TransformError, TransformKind, TransformOp};

#[cfg(test)]
mod tests;
