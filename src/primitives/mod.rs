//! Primitive shapes and the record every shape is wrapped in.
//!
//! A [`Primitive`] carries the data shared by all shapes (ID, priority, coordinate
//! systems, optional transform, cached bounding box, owning property) and a closed
//! [`Shape`] enum with the shape-specific payload. Shape payloads implement
//! [`ShapeGeometry`] and receive a [`ShapeContext`] with the common data they need.

mod arena;
mod boxes;
mod curve;
mod cylinder;
mod point;
mod polygon;
mod sphere;
mod user_defined;

use std::fmt;

use crate::geom::{BBox, CoordSystem, CsTransform, Point3, to_cartesian, transform_coord_system};
use crate::params::{ParameterCoord, ParameterScalar, ParameterSet, ScalarError};

pub use arena::PrimitiveArena;
pub use boxes::{BoxShape, MultiBoxShape};
pub use curve::{CurveShape, WireShape};
pub use cylinder::{CylinderShape, CylindricalShellShape};
pub use point::PointShape;
pub use polygon::{LinPolyShape, PolygonShape, RotPolyShape};
pub use sphere::{SphereShape, SphericalShellShape};
pub use user_defined::{UserCoordSystem, UserDefinedShape};

/// Identifier of a primitive, unique within a scene.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Ord, PartialOrd)]
pub struct PrimitiveId(pub u32);

impl fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of a property.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Ord, PartialOrd)]
pub struct PropertyId(pub u32);

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PrimitiveType {
    Point,
    Box,
    MultiBox,
    Sphere,
    SphericalShell,
    Cylinder,
    CylindricalShell,
    Polygon,
    LinPoly,
    RotPoly,
    Curve,
    Wire,
    UserDefined,
}

impl PrimitiveType {
    pub const ALL: [Self; 13] = [
        Self::Point,
        Self::Box,
        Self::MultiBox,
        Self::Sphere,
        Self::SphericalShell,
        Self::Cylinder,
        Self::CylindricalShell,
        Self::Polygon,
        Self::LinPoly,
        Self::RotPoly,
        Self::Curve,
        Self::Wire,
        Self::UserDefined,
    ];

    /// Human readable type name used in messages and status dumps.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::Box => "Box",
            Self::MultiBox => "Multi Box",
            Self::Sphere => "Sphere",
            Self::SphericalShell => "SphericalShell",
            Self::Cylinder => "Cylinder",
            Self::CylindricalShell => "CylindricalShell",
            Self::Polygon => "Polygon",
            Self::LinPoly => "LinPoly",
            Self::RotPoly => "RotPoly",
            Self::Curve => "Curve",
            Self::Wire => "Wire",
            Self::UserDefined => "User-Defined",
        }
    }

    /// Element name in persisted documents.
    #[must_use]
    pub const fn element(self) -> &'static str {
        match self {
            Self::MultiBox => "MultiBox",
            Self::UserDefined => "UserDefined",
            other => other.name(),
        }
    }

    #[must_use]
    pub fn from_element(element: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.element() == element)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Relation between a primitive and a query box.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BoxRelation {
    /// The primitive lies completely outside the box.
    Outside,
    /// Overlap cannot be ruled out.
    Unknown,
}

#[derive(Debug, thiserror::Error)]
pub enum PrimitiveError {
    #[error("{kind} has no element at index {index}")]
    IndexOutOfRange { kind: PrimitiveType, index: usize },
    #[error("invalid {field}: {source}")]
    Field {
        field: &'static str,
        #[source]
        source: ScalarError,
    },
}

impl PrimitiveError {
    pub(crate) fn field(field: &'static str) -> impl FnOnce(ScalarError) -> Self {
        move |source| Self::Field { field, source }
    }
}

/// Bounding box of a shape plus the facts recorded alongside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeBounds {
    pub bbox: BBox,
    /// The box is tight, so an "outside" answer derived from it is exact.
    pub accurate: bool,
    /// System the box coordinates are expressed in.
    pub system: CoordSystem,
    pub dimension: u8,
}

impl Default for ShapeBounds {
    fn default() -> Self {
        Self {
            bbox: BBox::default(),
            accurate: false,
            system: CoordSystem::Undefined,
            dimension: 0,
        }
    }
}

/// Data of the owning primitive that a shape needs to evaluate or answer queries.
#[derive(Debug, Clone, Copy)]
pub struct ShapeContext<'a> {
    pub id: PrimitiveId,
    /// Declared system of the primitive, possibly undefined.
    pub coord_system: CoordSystem,
    /// System incoming query coordinates are expressed in.
    pub mesh_type: CoordSystem,
    pub transform: Option<&'a CsTransform>,
    /// Cached box from the last update.
    pub bound_box: BBox,
}

impl ShapeContext<'_> {
    /// Declared system, or the mesh system when none is declared.
    #[must_use]
    pub const fn primitive_system(&self) -> CoordSystem {
        self.coord_system.or(self.mesh_type)
    }

    /// Converts a mesh coordinate to Cartesian and undoes the transform.
    #[must_use]
    pub fn local_cartesian(&self, coord: [f64; 3]) -> Point3 {
        let p = to_cartesian(coord, self.mesh_type);
        match self.transform {
            Some(transform) => transform.invert_transform(p),
            None => p,
        }
    }

    /// Undoes the transform on a mesh coordinate and returns it in the mesh system.
    #[must_use]
    pub fn untransformed(&self, coord: [f64; 3]) -> [f64; 3] {
        match self.transform {
            Some(transform) => {
                let local = transform.invert_transform(to_cartesian(coord, self.mesh_type));
                transform_coord_system(local.to_array(), CoordSystem::Cartesian, self.mesh_type)
            }
            None => coord,
        }
    }

    #[must_use]
    pub fn has_transform(&self) -> bool {
        self.transform.is_some_and(CsTransform::has_transform)
    }
}

/// Operations every shape payload provides.
pub trait ShapeGeometry {
    fn kind(&self) -> PrimitiveType;

    /// Re-evaluates every scalar, appending one message per failing field.
    fn update(&mut self, params: &ParameterSet, ctx: &ShapeContext<'_>, errors: &mut Vec<String>) -> bool;

    fn bounds(&self, ctx: &ShapeContext<'_>) -> ShapeBounds;

    /// Membership of a coordinate given in the mesh system.
    fn is_inside(&self, coord: [f64; 3], ctx: &ShapeContext<'_>, tol: f64) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Point(PointShape),
    Box(BoxShape),
    MultiBox(MultiBoxShape),
    Sphere(SphereShape),
    SphericalShell(SphericalShellShape),
    Cylinder(CylinderShape),
    CylindricalShell(CylindricalShellShape),
    Polygon(PolygonShape),
    LinPoly(LinPolyShape),
    RotPoly(RotPolyShape),
    Curve(CurveShape),
    Wire(WireShape),
    UserDefined(UserDefinedShape),
}

impl Shape {
    #[must_use]
    pub fn geometry(&self) -> &dyn ShapeGeometry {
        match self {
            Self::Point(s) => s,
            Self::Box(s) => s,
            Self::MultiBox(s) => s,
            Self::Sphere(s) => s,
            Self::SphericalShell(s) => s,
            Self::Cylinder(s) => s,
            Self::CylindricalShell(s) => s,
            Self::Polygon(s) => s,
            Self::LinPoly(s) => s,
            Self::RotPoly(s) => s,
            Self::Curve(s) => s,
            Self::Wire(s) => s,
            Self::UserDefined(s) => s,
        }
    }

    pub fn geometry_mut(&mut self) -> &mut dyn ShapeGeometry {
        match self {
            Self::Point(s) => s,
            Self::Box(s) => s,
            Self::MultiBox(s) => s,
            Self::Sphere(s) => s,
            Self::SphericalShell(s) => s,
            Self::Cylinder(s) => s,
            Self::CylindricalShell(s) => s,
            Self::Polygon(s) => s,
            Self::LinPoly(s) => s,
            Self::RotPoly(s) => s,
            Self::Curve(s) => s,
            Self::Wire(s) => s,
            Self::UserDefined(s) => s,
        }
    }

    #[must_use]
    pub fn kind(&self) -> PrimitiveType {
        self.geometry().kind()
    }
}

macro_rules! shape_from {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(impl From<$ty> for Shape {
            fn from(shape: $ty) -> Self {
                Self::$variant(shape)
            }
        })*
    };
}

shape_from! {
    Point => PointShape,
    Box => BoxShape,
    MultiBox => MultiBoxShape,
    Sphere => SphereShape,
    SphericalShell => SphericalShellShape,
    Cylinder => CylinderShape,
    CylindricalShell => CylindricalShellShape,
    Polygon => PolygonShape,
    LinPoly => LinPolyShape,
    RotPoly => RotPolyShape,
    Curve => CurveShape,
    Wire => WireShape,
    UserDefined => UserDefinedShape,
}

/// A shape together with the data shared by all primitive types.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    id: PrimitiveId,
    priority: i32,
    coord_system: CoordSystem,
    mesh_type: CoordSystem,
    transform: Option<CsTransform>,
    bounds: ShapeBounds,
    property: Option<PropertyId>,
    used: bool,
    shape: Shape,
}

impl Primitive {
    #[must_use]
    pub fn new(id: PrimitiveId, shape: impl Into<Shape>) -> Self {
        let mut primitive = Self {
            id,
            priority: 0,
            coord_system: CoordSystem::Undefined,
            mesh_type: CoordSystem::Cartesian,
            transform: None,
            bounds: ShapeBounds::default(),
            property: None,
            used: false,
            shape: shape.into(),
        };
        primitive.refresh_bounds();
        primitive
    }

    #[must_use]
    pub const fn id(&self) -> PrimitiveId {
        self.id
    }

    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn coord_system(&self) -> CoordSystem {
        self.coord_system
    }

    pub fn set_coord_system(&mut self, system: CoordSystem) {
        self.coord_system = system;
    }

    #[must_use]
    pub const fn mesh_type(&self) -> CoordSystem {
        self.mesh_type
    }

    pub fn set_mesh_type(&mut self, mesh_type: CoordSystem) {
        self.mesh_type = mesh_type;
    }

    #[must_use]
    pub const fn transform(&self) -> Option<&CsTransform> {
        self.transform.as_ref()
    }

    /// The attached transform, created empty on first access.
    pub fn transform_mut(&mut self) -> &mut CsTransform {
        self.transform.get_or_insert_with(CsTransform::new)
    }

    pub fn set_transform(&mut self, transform: Option<CsTransform>) {
        self.transform = transform;
    }

    #[must_use]
    pub const fn property(&self) -> Option<PropertyId> {
        self.property
    }

    pub(crate) fn set_property(&mut self, property: Option<PropertyId>) {
        self.property = property;
    }

    #[must_use]
    pub const fn is_used(&self) -> bool {
        self.used
    }

    pub fn set_used(&mut self, used: bool) {
        self.used = used;
    }

    #[must_use]
    pub const fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn shape_mut(&mut self) -> &mut Shape {
        &mut self.shape
    }

    #[must_use]
    pub fn kind(&self) -> PrimitiveType {
        self.shape.kind()
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    #[must_use]
    pub const fn bound_box(&self) -> BBox {
        self.bounds.bbox
    }

    #[must_use]
    pub const fn is_bound_box_accurate(&self) -> bool {
        self.bounds.accurate
    }

    #[must_use]
    pub const fn bound_box_coord_system(&self) -> CoordSystem {
        self.bounds.system
    }

    #[must_use]
    pub const fn dimension(&self) -> u8 {
        self.bounds.dimension
    }

    #[must_use]
    pub const fn bounds(&self) -> ShapeBounds {
        self.bounds
    }

    /// Re-evaluates the transform and every shape scalar, then refreshes the box.
    ///
    /// Failures are appended to `errors`; evaluation continues past them.
    pub fn update(&mut self, params: &ParameterSet, errors: &mut Vec<String>) -> bool {
        let mut ok = true;
        if let Some(transform) = &mut self.transform {
            if let Err(error) = transform.replay(params) {
                ok = false;
                errors.push(format!(
                    "Error in {} Transformation (ID: {}): {error}",
                    self.shape.kind(),
                    self.id
                ));
            }
        }

        let ctx = ShapeContext {
            id: self.id,
            coord_system: self.coord_system,
            mesh_type: self.mesh_type,
            transform: self.transform.as_ref(),
            bound_box: self.bounds.bbox,
        };
        ok &= self.shape.geometry_mut().update(params, &ctx, errors);
        self.bounds = self.shape.geometry().bounds(&ctx);
        ok
    }

    /// Recomputes the cached box from the current scalar values.
    pub fn refresh_bounds(&mut self) {
        let ctx = self.context();
        self.bounds = self.shape.geometry().bounds(&ctx);
    }

    /// Membership of `coord`, given in the mesh system.
    #[must_use]
    pub fn is_inside(&self, coord: [f64; 3], tol: f64) -> bool {
        self.shape.geometry().is_inside(coord, &self.context(), tol)
    }

    /// Cheap rejection test against a query box in the mesh system.
    #[must_use]
    pub fn is_inside_box(&self, query: BBox) -> BoxRelation {
        if !self.bounds.accurate {
            return BoxRelation::Unknown;
        }
        if self.bounds.system.is_defined() && self.bounds.system != self.mesh_type {
            return BoxRelation::Unknown;
        }
        if self.transform.as_ref().is_some_and(CsTransform::has_transform) {
            return BoxRelation::Unknown;
        }

        let separated = (0..3).any(|axis| {
            let (q0, q1) = query.axis(axis);
            let (p0, p1) = self.bounds.bbox.axis(axis);
            let below = q0 < p0 && q0 < p1 && q1 < p0 && q1 < p1;
            let above = q0 > p0 && q0 > p1 && q1 > p0 && q1 > p1;
            below || above
        });
        if separated {
            BoxRelation::Outside
        } else {
            BoxRelation::Unknown
        }
    }

    /// Multi-line status dump of the common primitive data.
    #[must_use]
    pub fn status(&self) -> String {
        let b = self.bounds.bbox;
        let mut out = format!(
            "  Primitive #{} Type: \"{}\" Priority: {}\n",
            self.id,
            self.type_name(),
            self.priority
        );
        out.push_str(&format!(
            "  Primary Coord-System: {} Mesh Coord-System: {} Bound-Box Coord-System: {}\n",
            self.coord_system, self.mesh_type, self.bounds.system
        ));
        out.push_str(&format!(
            "  Bounding Box (Valid: {}): P1: ({},{},{}) P2: ({},{},{})\n",
            self.bounds.accurate, b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z
        ));
        match &self.transform {
            Some(transform) => {
                out.push_str("  Transform: \n");
                out.push_str(&transform.status("\t* "));
            }
            None => out.push_str("  Transform: None\n"),
        }
        out
    }

    fn context(&self) -> ShapeContext<'_> {
        ShapeContext {
            id: self.id,
            coord_system: self.coord_system,
            mesh_type: self.mesh_type,
            transform: self.transform.as_ref(),
            bound_box: self.bounds.bbox,
        }
    }
}

/// Evaluates a coordinate, reporting a failure under `what`.
pub(crate) fn check_coord(
    coord: &mut ParameterCoord,
    params: &ParameterSet,
    what: &str,
    ctx: &ShapeContext<'_>,
    errors: &mut Vec<String>,
) -> bool {
    let mut inner = Vec::new();
    let ok = coord.evaluate(params, &mut inner);
    coord.set_coord_system(ctx.coord_system, ctx.mesh_type);
    if !ok {
        errors.push(format!("Error in {what} (ID: {}): {}", ctx.id, inner.join("; ")));
    }
    ok
}

/// Evaluates a scalar, reporting a failure under `what`.
pub(crate) fn check_scalar(
    scalar: &mut ParameterScalar,
    params: &ParameterSet,
    what: &str,
    ctx: &ShapeContext<'_>,
    errors: &mut Vec<String>,
) -> bool {
    match scalar.evaluate(params) {
        Ok(_) => true,
        Err(error) => {
            errors.push(format!("Error in {what} (ID: {}): {error}", ctx.id));
            false
        }
    }
}

/// Box containing `points`, collapsed to the origin when there are none.
pub(crate) fn points_box(points: impl IntoIterator<Item = Point3>) -> BBox {
    let mut iter = points.into_iter();
    match iter.next() {
        Some(first) => iter.fold(BBox::at_point(first), BBox::expand_point),
        None => BBox::default(),
    }
}

/// Converts a formula or number string into a scalar, naming the field on failure.
pub(crate) fn parse_scalar(value: &str, field: &'static str) -> Result<ParameterScalar, PrimitiveError> {
    ParameterScalar::parse(value).map_err(PrimitiveError::field(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(id: u32, center: [f64; 3], radius: f64) -> Primitive {
        Primitive::new(PrimitiveId(id), SphereShape::new(center, radius))
    }

    #[test]
    fn element_names_round_trip() {
        for kind in PrimitiveType::ALL {
            assert_eq!(PrimitiveType::from_element(kind.element()), Some(kind));
        }
        assert_eq!(PrimitiveType::MultiBox.name(), "Multi Box");
        assert_eq!(PrimitiveType::from_element("Polyhedron"), None);
    }

    #[test]
    fn inside_box_rejects_separated_queries() {
        let params = ParameterSet::new();
        let mut prim = Primitive::new(PrimitiveId(1), BoxShape::new([0.0; 3], [1.0; 3]));
        let mut errors = Vec::new();
        assert!(prim.update(&params, &mut errors));

        let far = BBox::from_array6([2.0, 3.0, 0.0, 1.0, 0.0, 1.0]);
        let overlapping = BBox::from_array6([0.5, 3.0, 0.0, 1.0, 0.0, 1.0]);
        assert_eq!(prim.is_inside_box(far), BoxRelation::Outside);
        assert_eq!(prim.is_inside_box(overlapping), BoxRelation::Unknown);
    }

    #[test]
    fn inside_box_is_unknown_with_a_transform() {
        let params = ParameterSet::new();
        let mut prim = sphere(1, [0.0; 3], 1.0);
        prim.transform_mut().translate([0.0, 0.0, 0.0], true).expect("translate");
        prim.update(&params, &mut Vec::new());
        let far = BBox::from_array6([5.0, 6.0, 5.0, 6.0, 5.0, 6.0]);
        assert_eq!(prim.is_inside_box(far), BoxRelation::Unknown);

        prim.transform_mut().clear();
        assert_eq!(prim.is_inside_box(far), BoxRelation::Outside);
    }

    #[test]
    fn transform_moves_the_shape() {
        let params = ParameterSet::new();
        let mut prim = sphere(4, [0.0; 3], 1.0);
        prim.transform_mut().translate([10.0, 0.0, 0.0], false).expect("translate");
        prim.update(&params, &mut Vec::new());
        assert!(prim.is_inside([10.2, 0.0, 0.0], 0.0));
        assert!(!prim.is_inside([0.2, 0.0, 0.0], 0.0));
    }

    #[test]
    fn inverted_transform_survives_update() {
        let params = ParameterSet::new();
        let mut prim = sphere(5, [0.0; 3], 1.0);
        prim.transform_mut().translate([10.0, 0.0, 0.0], false).expect("translate");
        prim.transform_mut().invert();
        let mut errors = Vec::new();
        assert!(prim.update(&params, &mut errors), "{errors:?}");
        assert!(prim.is_inside([-10.0, 0.0, 0.0], 0.0));
        assert!(!prim.is_inside([10.0, 0.0, 0.0], 0.0));

        assert!(prim.update(&params, &mut errors), "{errors:?}");
        assert!(prim.is_inside([-10.0, 0.0, 0.0], 0.0));
    }

    #[test]
    fn status_lists_the_common_data() {
        let mut prim = sphere(7, [0.0; 3], 2.0).with_priority(3);
        prim.update(&ParameterSet::new(), &mut Vec::new());
        let status = prim.status();
        assert!(status.starts_with("  Primitive #7 Type: \"Sphere\" Priority: 3"));
        assert!(status.contains("Bounding Box (Valid: true): P1: (-2,-2,-2) P2: (2,2,2)"));
        assert!(status.ends_with("Transform: None\n"));
    }
}
