use crate::geom::{BBox, CoordSystem, Point3};
use crate::params::{ParameterCoord, ParameterScalar, ParameterSet};

use super::{
    PrimitiveError, PrimitiveType, ShapeBounds, ShapeContext, ShapeGeometry, check_coord,
    check_scalar, parse_scalar,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SphereShape {
    pub center: ParameterCoord,
    pub radius: ParameterScalar,
}

impl SphereShape {
    #[must_use]
    pub fn new(center: [f64; 3], radius: f64) -> Self {
        Self {
            center: ParameterCoord::new(center),
            radius: ParameterScalar::new(radius),
        }
    }

    pub fn set_radius(&mut self, value: &str) -> Result<(), PrimitiveError> {
        self.radius = parse_scalar(value, "radius")?;
        Ok(())
    }
}

fn sphere_box(center: Point3, radius: f64) -> BBox {
    BBox::at_point(center).expand_by(radius)
}

impl ShapeGeometry for SphereShape {
    fn kind(&self) -> PrimitiveType {
        PrimitiveType::Sphere
    }

    fn update(&mut self, params: &ParameterSet, ctx: &ShapeContext<'_>, errors: &mut Vec<String>) -> bool {
        let center = check_coord(&mut self.center, params, "Sphere Center Point", ctx, errors);
        let radius = check_scalar(&mut self.radius, params, "Sphere Radius", ctx, errors);
        center && radius
    }

    fn bounds(&self, _ctx: &ShapeContext<'_>) -> ShapeBounds {
        let radius = self.radius.value();
        ShapeBounds {
            bbox: sphere_box(self.center.to_point(), radius),
            accurate: true,
            system: CoordSystem::Cartesian,
            dimension: if radius > 0.0 { 3 } else { 0 },
        }
    }

    fn is_inside(&self, coord: [f64; 3], ctx: &ShapeContext<'_>, _tol: f64) -> bool {
        ctx.local_cartesian(coord).distance_to(self.center.to_point()) < self.radius.value()
    }
}

/// Shell of thickness `width` centred on the sphere of radius `radius`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SphericalShellShape {
    pub center: ParameterCoord,
    pub radius: ParameterScalar,
    pub width: ParameterScalar,
}

impl SphericalShellShape {
    #[must_use]
    pub fn new(center: [f64; 3], radius: f64, width: f64) -> Self {
        Self {
            center: ParameterCoord::new(center),
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

impl ShapeGeometry for SphericalShellShape {
    fn kind(&self) -> PrimitiveType {
        PrimitiveType::SphericalShell
    }

    fn update(&mut self, params: &ParameterSet, ctx: &ShapeContext<'_>, errors: &mut Vec<String>) -> bool {
        let center = check_coord(&mut self.center, params, "SphericalShell Center Point", ctx, errors);
        let radius = check_scalar(&mut self.radius, params, "SphericalShell Radius", ctx, errors);
        let width = check_scalar(&mut self.width, params, "SphericalShell shell-width", ctx, errors);
        center && radius && width
    }

    fn bounds(&self, _ctx: &ShapeContext<'_>) -> ShapeBounds {
        let radius = self.radius.value();
        let width = self.width.value();
        let dimension = if width > 0.0 {
            3
        } else if radius > 0.0 {
            1
        } else {
            0
        };
        ShapeBounds {
            bbox: sphere_box(self.center.to_point(), radius + width / 2.0),
            accurate: true,
            system: CoordSystem::Cartesian,
            dimension,
        }
    }

    fn is_inside(&self, coord: [f64; 3], ctx: &ShapeContext<'_>, _tol: f64) -> bool {
        let dist = ctx.local_cartesian(coord).distance_to(self.center.to_point());
        (dist - self.radius.value()).abs() < self.width.value() / 2.0
    }
}
