use crate::geom::BBox;
use crate::params::{ParameterCoord, ParameterSet};

use super::{PrimitiveType, ShapeBounds, ShapeContext, ShapeGeometry, check_coord};

/// A single location. It never contains any coordinate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointShape {
    pub coord: ParameterCoord,
}

impl PointShape {
    #[must_use]
    pub fn new(coord: [f64; 3]) -> Self {
        Self {
            coord: ParameterCoord::new(coord),
        }
    }
}

impl ShapeGeometry for PointShape {
    fn kind(&self) -> PrimitiveType {
        PrimitiveType::Point
    }

    fn update(&mut self, params: &ParameterSet, ctx: &ShapeContext<'_>, errors: &mut Vec<String>) -> bool {
        check_coord(&mut self.coord, params, "Point", ctx, errors)
    }

    fn bounds(&self, ctx: &ShapeContext<'_>) -> ShapeBounds {
        let c = self.coord.coords_in(ctx.mesh_type);
        ShapeBounds {
            bbox: BBox::from_array6([c[0], c[0], c[1], c[1], c[2], c[2]]),
            accurate: true,
            system: ctx.coord_system,
            dimension: 0,
        }
    }

    fn is_inside(&self, _coord: [f64; 3], _ctx: &ShapeContext<'_>, _tol: f64) -> bool {
        false
    }
}
