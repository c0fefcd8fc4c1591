use crate::geom::{CoordSystem, Point3, point_line_distance};
use crate::params::{ParameterCoord, ParameterScalar, ParameterSet};

use super::{
    PrimitiveError, PrimitiveType, ShapeBounds, ShapeContext, ShapeGeometry, check_coord,
    check_scalar, parse_scalar, points_box,
};

/// Open polyline. It has no volume and contains no coordinate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurveShape {
    points: Vec<ParameterCoord>,
}

impl CurveShape {
    #[must_use]
    pub fn new(points: &[[f64; 3]]) -> Self {
        Self {
            points: points.iter().copied().map(ParameterCoord::new).collect(),
        }
    }

    pub fn add_point(&mut self, coord: ParameterCoord) -> usize {
        self.points.push(coord);
        self.points.len() - 1
    }

    /// Appends a point given as numbers or formulas.
    pub fn add_point_str(&mut self, values: [&str; 3]) -> Result<usize, PrimitiveError> {
        let coord = ParameterCoord::parse(values).map_err(PrimitiveError::field("curve point"))?;
        Ok(self.add_point(coord))
    }

    /// Cartesian position of point `index`.
    #[must_use]
    pub fn point(&self, index: usize) -> Option<Point3> {
        self.points.get(index).map(ParameterCoord::to_point)
    }

    #[must_use]
    pub fn coords(&self) -> &[ParameterCoord] {
        &self.points
    }

    #[must_use]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn clear_points(&mut self) {
        self.points.clear();
    }

    fn cartesian_points(&self) -> impl Iterator<Item = Point3> + '_ {
        self.points.iter().map(ParameterCoord::to_point)
    }

    fn update_points(&mut self, params: &ParameterSet, what: &str, ctx: &ShapeContext<'_>, errors: &mut Vec<String>) -> bool {
        let mut ok = true;
        for coord in &mut self.points {
            ok &= check_coord(coord, params, what, ctx, errors);
        }
        ok
    }
}

impl ShapeGeometry for CurveShape {
    fn kind(&self) -> PrimitiveType {
        PrimitiveType::Curve
    }

    fn update(&mut self, params: &ParameterSet, ctx: &ShapeContext<'_>, errors: &mut Vec<String>) -> bool {
        self.update_points(params, "Curve", ctx, errors)
    }

    fn bounds(&self, _ctx: &ShapeContext<'_>) -> ShapeBounds {
        ShapeBounds {
            bbox: points_box(self.cartesian_points()),
            accurate: false,
            system: CoordSystem::Cartesian,
            dimension: u8::from(self.points.len() > 1),
        }
    }

    fn is_inside(&self, _coord: [f64; 3], _ctx: &ShapeContext<'_>, _tol: f64) -> bool {
        false
    }
}

/// Polyline thickened to a tube of radius `radius`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireShape {
    pub curve: CurveShape,
    pub radius: ParameterScalar,
}

impl WireShape {
    #[must_use]
    pub fn new(points: &[[f64; 3]], radius: f64) -> Self {
        Self {
            curve: CurveShape::new(points),
            radius: ParameterScalar::new(radius),
        }
    }

    pub fn set_radius(&mut self, value: &str) -> Result<(), PrimitiveError> {
        self.radius = parse_scalar(value, "wire radius")?;
        Ok(())
    }
}

impl ShapeGeometry for WireShape {
    fn kind(&self) -> PrimitiveType {
        PrimitiveType::Wire
    }

    fn update(&mut self, params: &ParameterSet, ctx: &ShapeContext<'_>, errors: &mut Vec<String>) -> bool {
        let points = self.curve.update_points(params, "Wire", ctx, errors);
        let radius = check_scalar(&mut self.radius, params, "Wire", ctx, errors);
        points && radius
    }

    fn bounds(&self, ctx: &ShapeContext<'_>) -> ShapeBounds {
        let curve = self.curve.bounds(ctx);
        let rad = self.radius.value();
        ShapeBounds {
            bbox: curve.bbox.expand_by(rad),
            dimension: if rad > 0.0 { curve.dimension + 2 } else { curve.dimension },
            ..curve
        }
    }

    fn is_inside(&self, coord: [f64; 3], ctx: &ShapeContext<'_>, _tol: f64) -> bool {
        let pos = ctx.local_cartesian(coord);
        if !ctx.bound_box.contains_point(pos) {
            return false;
        }
        let rad = self.radius.value();
        let points: Vec<Point3> = self.curve.cartesian_points().collect();
        for (i, &p0) in points.iter().enumerate() {
            let dist = pos.distance_to(p0);
            if dist < rad {
                return true;
            }
            let Some(&p1) = points.get(i + 1) else {
                continue;
            };
            if dist < p0.distance_to(p1) + rad {
                let line = point_line_distance(pos, p0, p1);
                if line.foot > 0.0 && line.foot < 1.0 && line.distance < rad {
                    return true;
                }
            }
        }
        false
    }
}
