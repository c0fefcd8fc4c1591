use crate::geom::{BBox, CoordSystem, Point3, point_line_distance};
use crate::params::{ParameterCoord, ParameterScalar, ParameterSet};

use super::{
    PrimitiveError, PrimitiveType, ShapeBounds, ShapeContext, ShapeGeometry, check_coord,
    check_scalar, parse_scalar,
};

/// Box around the segment `start → stop` widened by `rad`.
///
/// Only a segment parallel to a coordinate axis gets a tight box; its extent along
/// the axis is not widened.
#[allow(clippy::float_cmp)]
fn axis_bounds(start: Point3, stop: Point3, rad: f64) -> ShapeBounds {
    let a = start.to_array();
    let b = stop.to_array();
    let mut bbox = BBox::default();
    let mut flat_axes = 0_u8;
    for axis in 0..3 {
        bbox.set_axis(axis, a[axis].min(b[axis]) - rad, a[axis].max(b[axis]) + rad);
        if a[axis] == b[axis] {
            flat_axes |= 1 << axis;
        }
    }

    let along = match flat_axes {
        0b011 => Some(2),
        0b101 => Some(1),
        0b110 => Some(0),
        _ => None,
    };
    if let Some(axis) = along {
        let (lo, hi) = bbox.axis(axis);
        bbox.set_axis(axis, lo + rad, hi - rad);
    }

    let dimension = if rad > 0.0 {
        3
    } else if flat_axes == 0b111 {
        0
    } else {
        1
    };
    ShapeBounds {
        bbox,
        accurate: along.is_some(),
        system: CoordSystem::Cartesian,
        dimension,
    }
}

/// Distance from the axis when the point projects onto the segment, `None` otherwise.
fn axial_distance(p: Point3, start: Point3, stop: Point3, ctx: &ShapeContext<'_>) -> Option<f64> {
    if !ctx.bound_box.contains_point(p) {
        return None;
    }
    let line = point_line_distance(p, start, stop);
    (0.0..=1.0).contains(&line.foot).then_some(line.distance)
}

/// Solid cylinder around the segment `start → stop`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CylinderShape {
    pub start: ParameterCoord,
    pub stop: ParameterCoord,
    pub radius: ParameterScalar,
}

impl CylinderShape {
    #[must_use]
    pub fn new(start: [f64; 3], stop: [f64; 3], radius: f64) -> Self {
        Self {
            start: ParameterCoord::new(start),
            stop: ParameterCoord::new(stop),
            radius: ParameterScalar::new(radius),
        }
    }

    pub fn set_radius(&mut self, value: &str) -> Result<(), PrimitiveError> {
        self.radius = parse_scalar(value, "radius")?;
        Ok(())
    }
}

impl ShapeGeometry for CylinderShape {
    fn kind(&self) -> PrimitiveType {
        PrimitiveType::Cylinder
    }

    fn update(&mut self, params: &ParameterSet, ctx: &ShapeContext<'_>, errors: &mut Vec<String>) -> bool {
        let start = check_coord(&mut self.start, params, "Cylinder Coord", ctx, errors);
        let stop = check_coord(&mut self.stop, params, "Cylinder Coord", ctx, errors);
        let radius = check_scalar(&mut self.radius, params, "Cylinder Radius", ctx, errors);
        start && stop && radius
    }

    fn bounds(&self, _ctx: &ShapeContext<'_>) -> ShapeBounds {
        axis_bounds(self.start.to_point(), self.stop.to_point(), self.radius.value())
    }

    fn is_inside(&self, coord: [f64; 3], ctx: &ShapeContext<'_>, _tol: f64) -> bool {
        let p = ctx.local_cartesian(coord);
        axial_distance(p, self.start.to_point(), self.stop.to_point(), ctx)
            .is_some_and(|dist| dist < self.radius.value())
    }
}

/// Tube of thickness `width` centred on the cylinder of radius `radius`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CylindricalShellShape {
    pub start: ParameterCoord,
    pub stop: ParameterCoord,
    pub radius: ParameterScalar,
    pub width: ParameterScalar,
}

impl CylindricalShellShape {
    #[must_use]
    pub fn new(start: [f64; 3], stop: [f64; 3], radius: f64, width: f64) -> Self {
        Self {
            start: ParameterCoord::new(start),
            stop: ParameterCoord::new(stop),
            radius: ParameterScalar::new(radius),
            width: ParameterScalar::new(width),
        }
    }

    pub fn set_radius(&mut self, value: &str) -> Result<(), PrimitiveError> {
        self.radius = parse_scalar(value, "radius")?;
        Ok(())
    }

    pub fn set_width(&mut self, value: &str) -> Result<(), PrimitiveError> {
        self.width = parse_scalar(value, "shell width")?;
        Ok(())
    }
}

impl ShapeGeometry for CylindricalShellShape {
    fn kind(&self) -> PrimitiveType {
        PrimitiveType::CylindricalShell
    }

    fn update(&mut self, params: &ParameterSet, ctx: &ShapeContext<'_>, errors: &mut Vec<String>) -> bool {
        let start = check_coord(&mut self.start, params, "CylindricalShell Coord", ctx, errors);
        let stop = check_coord(&mut self.stop, params, "CylindricalShell Coord", ctx, errors);
        let radius = check_scalar(&mut self.radius, params, "CylindricalShell Radius", ctx, errors);
        let width = check_scalar(&mut self.width, params, "CylindricalShell shell-width", ctx, errors);
        start && stop && radius && width
    }

    fn bounds(&self, _ctx: &ShapeContext<'_>) -> ShapeBounds {
        let rad = self.radius.value() + self.width.value() / 2.0;
        axis_bounds(self.start.to_point(), self.stop.to_point(), rad)
    }

    fn is_inside(&self, coord: [f64; 3], ctx: &ShapeContext<'_>, _tol: f64) -> bool {
        let p = ctx.local_cartesian(coord);
        axial_distance(p, self.start.to_point(), self.stop.to_point(), ctx)
            .is_some_and(|dist| (dist - self.radius.value()).abs() < self.width.value() / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{Primitive, PrimitiveId};

    fn updated(shape: impl Into<crate::primitives::Shape>) -> Primitive {
        let mut prim = Primitive::new(PrimitiveId(1), shape);
        assert!(prim.update(&ParameterSet::new(), &mut Vec::new()));
        prim
    }

    #[test]
    fn midpoint_is_inside_only_with_a_radius() {
        let solid = updated(CylinderShape::new([0.0; 3], [0.0, 0.0, 10.0], 1.0));
        assert!(solid.is_inside([0.0, 0.0, 5.0], 0.0));
        assert!(solid.is_inside([0.5, 0.5, 0.0], 0.0));
        assert!(!solid.is_inside([0.0, 0.0, 10.5], 0.0));
        assert!(!solid.is_inside([0.0, 0.0, -0.5], 0.0));

        let line = updated(CylinderShape::new([0.0; 3], [0.0, 0.0, 10.0], 0.0));
        assert!(!line.is_inside([0.0, 0.0, 5.0], 0.0));
        assert_eq!(line.dimension(), 1);
    }

    #[test]
    fn axis_aligned_boxes_are_tight() {
        let along_z = updated(CylinderShape::new([1.0, 1.0, 0.0], [1.0, 1.0, 4.0], 0.5));
        assert!(along_z.is_bound_box_accurate());
        let b = along_z.bound_box().to_array6();
        assert_eq!(b, [0.5, 1.5, 0.5, 1.5, 0.0, 4.0]);

        let along_x = updated(CylinderShape::new([0.0, 1.0, 1.0], [4.0, 1.0, 1.0], 0.5));
        let b = along_x.bound_box().to_array6();
        assert_eq!(b, [0.0, 4.0, 0.5, 1.5, 0.5, 1.5]);

        let skew = updated(CylinderShape::new([0.0; 3], [1.0, 1.0, 1.0], 0.5));
        assert!(!skew.is_bound_box_accurate());
        assert!(skew.is_inside([0.5, 0.5, 0.5], 0.0));
    }

    #[test]
    fn shell_keeps_the_bore_empty() {
        let shell = updated(CylindricalShellShape::new([0.0; 3], [0.0, 0.0, 2.0], 1.0, 0.2));
        assert!(shell.is_inside([1.05, 0.0, 1.0], 0.0));
        assert!(!shell.is_inside([0.0, 0.0, 1.0], 0.0));
        assert!(!shell.is_inside([1.2, 0.0, 1.0], 0.0));
        assert!((shell.bound_box().max.x - 1.1).abs() < 1e-9);
    }
}
