#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Parametric geometry kernel for electromagnetic structure descriptions.
//!
//! A [`Scene`] holds a [`ParameterSet`], a list of [`Property`] groups and the
//! primitives they own. After [`Scene::update`] every point query answers which
//! property wins at that coordinate, using primitive priorities.
//!
//! ```
//! use csx_engine::{BoxShape, Property, PropertyKind, PropertyType, Scene, SphereShape};
//!
//! let mut scene = Scene::new();
//! let metal = scene.add_property(Property::new(PropertyKind::Metal, "body"));
//! scene.add_primitive(metal, BoxShape::new([0.0; 3], [10.0; 3])).unwrap().set_priority(1);
//! scene.add_primitive(metal, SphereShape::new([5.0; 3], 3.0)).unwrap().set_priority(2);
//! assert!(scene.update().is_empty());
//!
//! let hit = scene.property_by_coord_priority([5.0; 3], PropertyType::ANY).unwrap();
//! assert_eq!(hit.priority, 2);
//! ```

pub mod expr;
pub mod geom;
pub mod params;
pub mod parse;
pub mod primitives;
pub mod scene;

pub use expr::{Evaluation, FunctionParser};
pub use geom::{BBox, CoordSystem, CsTransform, Point3, Tolerance, TransformKind};
pub use params::{Parameter, ParameterCoord, ParameterScalar, ParameterSet};
pub use primitives::{
    BoxRelation, BoxShape, CurveShape, CylinderShape, CylindricalShellShape, LinPolyShape,
    MultiBoxShape, PointShape, PolygonShape, Primitive, PrimitiveId, PrimitiveType, PropertyId,
    RotPolyShape, Shape, SphereShape, SphericalShellShape, UserCoordSystem, UserDefinedShape,
    WireShape,
};
pub use scene::{ErrorLog, Hit, Property, PropertyKind, PropertyType, RectGrid, Scene, SceneError};
