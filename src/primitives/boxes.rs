use crate::geom::{BBox, CoordSystem, coord_in_range, transform_coord_system};
use crate::params::{ParameterCoord, ParameterScalar, ParameterSet};

use super::{
    PrimitiveError, PrimitiveType, ShapeBounds, ShapeContext, ShapeGeometry, check_coord,
    parse_scalar,
};

/// Axis-aligned box between two corners, in the primitive's own system.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoxShape {
    pub start: ParameterCoord,
    pub stop: ParameterCoord,
}

impl BoxShape {
    #[must_use]
    pub fn new(start: [f64; 3], stop: [f64; 3]) -> Self {
        Self {
            start: ParameterCoord::new(start),
            stop: ParameterCoord::new(stop),
        }
    }

    /// Box with `start` kept on the lower side even where it is the larger value.
    #[must_use]
    pub fn oriented_box(&self, mesh_type: CoordSystem) -> BBox {
        let a = self.start.coords_in(mesh_type);
        let b = self.stop.coords_in(mesh_type);
        BBox::from_array6([a[0], b[0], a[1], b[1], a[2], b[2]])
    }
}

impl ShapeGeometry for BoxShape {
    fn kind(&self) -> PrimitiveType {
        PrimitiveType::Box
    }

    fn update(&mut self, params: &ParameterSet, ctx: &ShapeContext<'_>, errors: &mut Vec<String>) -> bool {
        let start = check_coord(&mut self.start, params, "Box", ctx, errors);
        let stop = check_coord(&mut self.stop, params, "Box", ctx, errors);
        start && stop
    }

    fn bounds(&self, ctx: &ShapeContext<'_>) -> ShapeBounds {
        let oriented = self.oriented_box(ctx.mesh_type);
        let accurate = !ctx.coord_system.is_defined() || ctx.coord_system == ctx.mesh_type;
        ShapeBounds {
            bbox: oriented.normalized(),
            accurate,
            system: ctx.mesh_type,
            dimension: oriented.dimension(),
        }
    }

    fn is_inside(&self, coord: [f64; 3], ctx: &ShapeContext<'_>, _tol: f64) -> bool {
        let system = ctx.coord_system;
        let pos = transform_coord_system(ctx.untransformed(coord), ctx.mesh_type, system);
        coord_in_range(
            pos,
            self.start.coords_in(system),
            self.stop.coords_in(system),
            system.or(ctx.mesh_type),
        )
    }
}

/// Bounds of one box of a [`MultiBoxShape`]: `[x0, x1, y0, y1, z0, z1]`.
pub type MultiBoxEntry = [ParameterScalar; 6];

/// Union of boxes given directly in the mesh system.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiBoxShape {
    boxes: Vec<MultiBoxEntry>,
}

impl MultiBoxShape {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a box; a valid `copy_of` index duplicates that box, otherwise all zero.
    pub fn add_box(&mut self, copy_of: Option<usize>) -> usize {
        let entry = copy_of
            .and_then(|index| self.boxes.get(index).cloned())
            .unwrap_or_default();
        self.boxes.push(entry);
        self.boxes.len() - 1
    }

    /// Appends a box spanning two literal corners.
    pub fn push_box(&mut self, start: [f64; 3], stop: [f64; 3]) -> usize {
        self.boxes.push([start[0], stop[0], start[1], stop[1], start[2], stop[2]].map(ParameterScalar::new));
        self.boxes.len() - 1
    }

    pub fn delete_box(&mut self, index: usize) -> Result<(), PrimitiveError> {
        if index >= self.boxes.len() {
            return Err(PrimitiveError::IndexOutOfRange {
                kind: PrimitiveType::MultiBox,
                index,
            });
        }
        self.boxes.remove(index);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.boxes.clear();
    }

    #[must_use]
    pub fn box_count(&self) -> usize {
        self.boxes.len()
    }

    #[must_use]
    pub fn boxes(&self) -> &[MultiBoxEntry] {
        &self.boxes
    }

    /// Sets bound `slot` (`0..6`, lower/upper per axis) of box `index` from text.
    pub fn set_bound(&mut self, index: usize, slot: usize, value: &str) -> Result<(), PrimitiveError> {
        let scalar = self
            .boxes
            .get_mut(index)
            .and_then(|entry| entry.get_mut(slot))
            .ok_or(PrimitiveError::IndexOutOfRange {
                kind: PrimitiveType::MultiBox,
                index,
            })?;
        *scalar = parse_scalar(value, "multi-box bound")?;
        Ok(())
    }

    fn entry_box(entry: &MultiBoxEntry) -> BBox {
        BBox::from_array6([
            entry[0].value(),
            entry[1].value(),
            entry[2].value(),
            entry[3].value(),
            entry[4].value(),
            entry[5].value(),
        ])
        .normalized()
    }
}

impl ShapeGeometry for MultiBoxShape {
    fn kind(&self) -> PrimitiveType {
        PrimitiveType::MultiBox
    }

    fn update(&mut self, params: &ParameterSet, ctx: &ShapeContext<'_>, errors: &mut Vec<String>) -> bool {
        let mut ok = true;
        for scalar in self.boxes.iter_mut().flatten() {
            if let Err(error) = scalar.evaluate(params) {
                ok = false;
                errors.push(format!("Error in MultiBox (ID: {}): {error}", ctx.id));
            }
        }
        ok
    }

    fn bounds(&self, ctx: &ShapeContext<'_>) -> ShapeBounds {
        let bbox = self
            .boxes
            .iter()
            .map(Self::entry_box)
            .reduce(BBox::union)
            .unwrap_or_default();
        ShapeBounds {
            bbox,
            accurate: false,
            system: ctx.mesh_type,
            dimension: bbox.dimension(),
        }
    }

    fn is_inside(&self, coord: [f64; 3], ctx: &ShapeContext<'_>, _tol: f64) -> bool {
        let pos = ctx.untransformed(coord);
        self.boxes.iter().any(|entry| {
            let bbox = Self::entry_box(entry);
            (0..3).all(|axis| {
                let (lo, hi) = bbox.axis(axis);
                pos[axis] >= lo && pos[axis] <= hi
            })
        })
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
    fn swapped_corners_give_the_same_membership() {
        let a = updated(BoxShape::new([0.0; 3], [2.0, 3.0, 4.0]));
        let b = updated(BoxShape::new([2.0, 3.0, 4.0], [0.0; 3]));
        for p in [[1.0, 1.0, 1.0], [2.0, 3.0, 4.0], [2.1, 1.0, 1.0], [-0.1, 0.0, 0.0]] {
            assert_eq!(a.is_inside(p, 0.0), b.is_inside(p, 0.0));
        }
        assert!(a.is_inside([0.0, 0.0, 0.0], 0.0));
        assert_eq!(a.bound_box(), b.bound_box());
        assert_eq!(a.dimension(), 3);
    }

    #[test]
    fn oriented_box_keeps_the_corner_order() {
        let shape = BoxShape::new([2.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let oriented = shape.oriented_box(CoordSystem::Cartesian);
        assert!((oriented.min.x - 2.0).abs() < 1e-9);
        assert!(oriented.max.x.abs() < 1e-9);

        let prim = updated(shape);
        assert_eq!(prim.dimension(), 2);
        assert!(prim.bound_box().min.x.abs() < 1e-9);
    }

    #[test]
    fn cylindrical_box_is_not_accurate_in_a_cartesian_mesh() {
        let mut prim = Primitive::new(
            PrimitiveId(2),
            BoxShape::new([0.0, 0.0, 0.0], [1.0, std::f64::consts::FRAC_PI_2, 1.0]),
        );
        prim.set_coord_system(CoordSystem::Cylindrical);
        prim.update(&ParameterSet::new(), &mut Vec::new());
        assert!(!prim.is_bound_box_accurate());
        assert!(prim.is_inside([0.5, 0.5, 0.5], 0.0));
        assert!(!prim.is_inside([-0.5, 0.5, 0.5], 0.0));
    }

    #[test]
    fn multi_box_is_the_union() {
        let mut shape = MultiBoxShape::new();
        shape.push_box([0.0; 3], [1.0; 3]);
        shape.push_box([5.0; 3], [4.0; 3]);
        let copy = shape.add_box(Some(0));
        assert_eq!(copy, 2);
        assert!(shape.delete_box(7).is_err());
        shape.delete_box(copy).expect("delete");
        assert_eq!(shape.box_count(), 2);

        let prim = updated(shape);
        assert!(prim.is_inside([0.5, 0.5, 0.5], 0.0));
        assert!(prim.is_inside([4.5, 4.5, 4.5], 0.0));
        assert!(!prim.is_inside([2.5, 2.5, 2.5], 0.0));
        assert!(!prim.is_bound_box_accurate());
        assert!((prim.bound_box().max.x - 5.0).abs() < 1e-9);
    }

    #[test]
    fn multi_box_reports_formula_errors() {
        let mut shape = MultiBoxShape::new();
        shape.add_box(None);
        shape.set_bound(0, 1, "missing+1").expect("formula stored");
        let mut prim = Primitive::new(PrimitiveId(9), shape);
        let mut errors = Vec::new();
        assert!(!prim.update(&ParameterSet::new(), &mut errors));
        assert!(errors[0].starts_with("Error in MultiBox (ID: 9)"));
    }
}
