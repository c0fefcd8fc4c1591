//! The scene: parameters, properties, the primitive arena and the mesh grid.
//!
//! [`Scene`] owns every primitive and keeps the property back references in sync
//! with the property lists. After [`Scene::update`] the classification queries
//! (`property_by_coord_*`, [`Scene::classify_points`]) are pure reads.

mod grid;
mod property;

use std::fmt;

use crate::geom::{BBox, CoordSystem, Point3, Tolerance};
use crate::params::ParameterSet;
use crate::primitives::{
    BoxRelation, Primitive, PrimitiveArena, PrimitiveId, PrimitiveType, PropertyId, Shape,
};

pub use grid::{GridError, RectGrid};
pub use property::{Property, PropertyKind, PropertyType};

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("no property at index {0}")]
    PropertyIndex(usize),
    #[error("unknown primitive {0}")]
    UnknownPrimitive(PrimitiveId),
    #[error("primitive ID {0} is already in use")]
    DuplicatePrimitive(PrimitiveId),
    #[error("primitive {primitive} is already owned by property {property}")]
    AlreadyAssigned { primitive: PrimitiveId, property: usize },
}

/// Messages collected by a batch update. Failures never stop the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLog {
    messages: Vec<String>,
}

impl ErrorLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    #[must_use]
    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

impl Extend<String> for ErrorLog {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.messages.extend(iter);
    }
}

impl fmt::Display for ErrorLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for message in &self.messages {
            writeln!(f, "{message}")?;
        }
        Ok(())
    }
}

/// Winner of a classification query.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Hit {
    /// Index of the owning property in the scene.
    pub property: usize,
    pub primitive: PrimitiveId,
    pub priority: i32,
}

#[derive(Debug, Clone)]
pub struct Scene {
    params: ParameterSet,
    properties: Vec<Property>,
    primitives: PrimitiveArena,
    next_primitive_id: u32,
    next_property_id: u32,
    grid: RectGrid,
    mesh_type: CoordSystem,
    drawing_tolerance: Tolerance,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            params: ParameterSet::new(),
            properties: Vec::new(),
            primitives: PrimitiveArena::new(),
            next_primitive_id: 0,
            next_property_id: 0,
            grid: RectGrid::new(),
            mesh_type: CoordSystem::Cartesian,
            drawing_tolerance: Tolerance::EXACT,
        }
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParameterSet {
        &mut self.params
    }

    #[must_use]
    pub const fn grid(&self) -> &RectGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut RectGrid {
        &mut self.grid
    }

    #[must_use]
    pub const fn mesh_coord_system(&self) -> CoordSystem {
        self.mesh_type
    }

    /// Sets the system query coordinates are given in, for every property and primitive.
    ///
    /// Cached boxes are refreshed from the current values; call [`Scene::update`]
    /// to re-evaluate formulas.
    pub fn set_mesh_coord_system(&mut self, system: CoordSystem) {
        self.mesh_type = system;
        for property in &mut self.properties {
            property.set_coord_system(system);
        }
        for primitive in self.primitives.iter_mut() {
            primitive.set_mesh_type(system);
            primitive.refresh_bounds();
        }
    }

    #[must_use]
    pub const fn drawing_tolerance(&self) -> Tolerance {
        self.drawing_tolerance
    }

    /// Tolerance handed to every `is_inside` test of a classification query.
    pub fn set_drawing_tolerance(&mut self, tolerance: Tolerance) {
        self.drawing_tolerance = tolerance;
    }

    // ── properties ──────────────────────────────────────────────────────────

    /// Appends a property and returns its index.
    pub fn add_property(&mut self, mut property: Property) -> usize {
        property.set_coord_system(self.mesh_type);
        property.set_unique_id(self.allocate_property_id());
        self.properties.push(property);
        self.reindex();
        self.properties.len() - 1
    }

    /// Puts `property` in place of the property at `index`, moving all primitives over.
    ///
    /// Returns the replaced property, now without primitives.
    pub fn replace_property(&mut self, index: usize, mut property: Property) -> Result<Property, SceneError> {
        let unique_id = self.allocate_property_id();
        let old = self
            .properties
            .get_mut(index)
            .ok_or(SceneError::PropertyIndex(index))?;
        property.set_unique_id(unique_id);
        property.set_coord_system(self.mesh_type);
        for id in old.take_all_primitives() {
            property.push_primitive(id);
            if let Some(primitive) = self.primitives.get_mut(id) {
                primitive.set_property(Some(unique_id));
            }
        }
        let old = std::mem::replace(old, property);
        self.reindex();
        log::debug!("replaced property {:?} by {:?}", old.name(), self.properties[index].name());
        Ok(old)
    }

    /// Takes a property out of the scene together with its primitives.
    pub fn remove_property(&mut self, index: usize) -> Option<(Property, Vec<Primitive>)> {
        if index >= self.properties.len() {
            return None;
        }
        let mut property = self.properties.remove(index);
        self.reindex();
        let primitives = property
            .take_all_primitives()
            .into_iter()
            .filter_map(|id| self.primitives.remove(id))
            .map(|mut primitive| {
                primitive.set_property(None);
                primitive
            })
            .collect();
        Some((property, primitives))
    }

    /// Removes a property and drops its primitives.
    pub fn delete_property(&mut self, index: usize) -> bool {
        self.remove_property(index).is_some()
    }

    #[must_use]
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    #[must_use]
    pub fn property(&self, index: usize) -> Option<&Property> {
        self.properties.get(index)
    }

    pub fn property_mut(&mut self, index: usize) -> Option<&mut Property> {
        self.properties.get_mut(index)
    }

    #[must_use]
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    #[must_use]
    pub fn property_index(&self, id: PropertyId) -> Option<usize> {
        self.properties.iter().position(|p| p.unique_id() == id)
    }

    #[must_use]
    pub fn properties_by_type(&self, filter: PropertyType) -> Vec<&Property> {
        self.properties
            .iter()
            .filter(|p| p.type_flags().matches(filter))
            .collect()
    }

    #[must_use]
    pub fn properties_by_name(&self, name: &str) -> Vec<&Property> {
        self.properties.iter().filter(|p| p.name() == name).collect()
    }

    #[must_use]
    pub fn property_count_by_type(&self, filter: PropertyType) -> usize {
        self.properties
            .iter()
            .filter(|p| p.type_flags().matches(filter))
            .count()
    }

    // ── primitives ──────────────────────────────────────────────────────────

    /// Creates a primitive with a fresh ID in the property at `property`.
    pub fn add_primitive(&mut self, property: usize, shape: impl Into<Shape>) -> Result<&mut Primitive, SceneError> {
        let primitive = Primitive::new(PrimitiveId(self.next_primitive_id), shape);
        self.insert_primitive(property, primitive)
    }

    /// Adds a prebuilt primitive, keeping its ID.
    pub fn insert_primitive(&mut self, property: usize, mut primitive: Primitive) -> Result<&mut Primitive, SceneError> {
        let owner = self
            .properties
            .get_mut(property)
            .ok_or(SceneError::PropertyIndex(property))?;
        let id = primitive.id();
        if self.primitives.contains(id) {
            return Err(SceneError::DuplicatePrimitive(id));
        }
        primitive.set_mesh_type(self.mesh_type);
        primitive.set_property(Some(owner.unique_id()));
        primitive.refresh_bounds();
        owner.push_primitive(id);
        self.primitives.insert(primitive);
        self.next_primitive_id = self.next_primitive_id.max(id.0.saturating_add(1));
        self.primitives.get_mut(id).ok_or(SceneError::UnknownPrimitive(id))
    }

    /// Moves an existing primitive into the property at `property`.
    pub fn assign_primitive(&mut self, property: usize, id: PrimitiveId) -> Result<(), SceneError> {
        if property >= self.properties.len() {
            return Err(SceneError::PropertyIndex(property));
        }
        if !self.primitives.contains(id) {
            return Err(SceneError::UnknownPrimitive(id));
        }
        if self.properties[property].has_primitive(id) {
            return Err(SceneError::AlreadyAssigned { primitive: id, property });
        }
        self.remove_primitive(id);
        let owner = &mut self.properties[property];
        owner.push_primitive(id);
        if let Some(primitive) = self.primitives.get_mut(id) {
            primitive.set_property(Some(owner.unique_id()));
        }
        Ok(())
    }

    /// Detaches a primitive from its property; it stays in the scene unowned.
    pub fn remove_primitive(&mut self, id: PrimitiveId) -> bool {
        let Some(primitive) = self.primitives.get_mut(id) else {
            return false;
        };
        let Some(owner) = primitive.property() else {
            return false;
        };
        primitive.set_property(None);
        self.properties
            .iter_mut()
            .find(|p| p.unique_id() == owner)
            .is_some_and(|p| p.remove_primitive(id))
    }

    /// Removes a primitive from its property and from the scene.
    pub fn delete_primitive(&mut self, id: PrimitiveId) -> Option<Primitive> {
        self.remove_primitive(id);
        self.primitives.remove(id)
    }

    /// Takes the `index`-th primitive of a property out of the scene.
    pub fn take_primitive(&mut self, property: usize, index: usize) -> Option<Primitive> {
        let id = self.properties.get_mut(property)?.take_primitive(index)?;
        let mut primitive = self.primitives.remove(id)?;
        primitive.set_property(None);
        Some(primitive)
    }

    /// Number of primitives owned by a property.
    #[must_use]
    pub fn primitive_count(&self) -> usize {
        self.properties.iter().map(Property::primitive_count).sum()
    }

    #[must_use]
    pub fn primitive(&self, id: PrimitiveId) -> Option<&Primitive> {
        self.primitives.get(id)
    }

    pub fn primitive_mut(&mut self, id: PrimitiveId) -> Option<&mut Primitive> {
        self.primitives.get_mut(id)
    }

    #[must_use]
    pub fn property_of_primitive(&self, id: PrimitiveId) -> Option<&Property> {
        let owner = self.primitives.get(id)?.property()?;
        self.properties.iter().find(|p| p.unique_id() == owner)
    }

    /// Owned primitives of matching properties in property then list order.
    ///
    /// With `sorted` they are ordered by descending priority; equal priorities keep
    /// that order.
    #[must_use]
    pub fn all_primitives(&self, sorted: bool, filter: PropertyType) -> Vec<&Primitive> {
        let mut list: Vec<&Primitive> = self
            .properties
            .iter()
            .filter(|p| p.type_flags().matches(filter))
            .flat_map(|p| p.primitives().iter().filter_map(|&id| self.primitives.get(id)))
            .collect();
        if sorted {
            list.sort_by(|a, b| b.priority().cmp(&a.priority()));
        }
        list
    }

    #[must_use]
    pub fn primitives_by_type(&self, kind: PrimitiveType) -> Vec<&Primitive> {
        self.all_primitives(false, PropertyType::ANY)
            .into_iter()
            .filter(|p| p.kind() == kind)
            .collect()
    }

    /// Primitives that may intersect `bbox`, i.e. are not provably outside it.
    #[must_use]
    pub fn primitives_by_bound_box(&self, bbox: BBox, sorted: bool, filter: PropertyType) -> Vec<&Primitive> {
        self.all_primitives(sorted, filter)
            .into_iter()
            .filter(|p| p.is_inside_box(bbox) != BoxRelation::Outside)
            .collect()
    }

    // ── classification ──────────────────────────────────────────────────────

    /// Property governing `coord` among those matching `filter`.
    ///
    /// Each property contributes its own winner; a later property replaces the
    /// current one only with a strictly greater priority.
    #[must_use]
    pub fn property_by_coord_priority(&self, coord: [f64; 3], filter: PropertyType) -> Option<Hit> {
        let tol = self.drawing_tolerance.eps;
        let mut best: Option<Hit> = None;
        for (index, property) in self.properties.iter().enumerate() {
            if !property.type_flags().matches(filter) {
                continue;
            }
            let Some((primitive, priority)) = property.check_coord_in_primitive(&self.primitives, coord, tol) else {
                continue;
            };
            if best.is_none_or(|hit| priority > hit.priority) {
                best = Some(Hit {
                    property: index,
                    primitive,
                    priority,
                });
            }
        }
        best
    }

    /// As [`Scene::property_by_coord_priority`], flagging the winning primitive as used.
    pub fn property_by_coord_priority_marked(&mut self, coord: [f64; 3], filter: PropertyType) -> Option<Hit> {
        let hit = self.property_by_coord_priority(coord, filter)?;
        self.mark_used(hit.primitive);
        Some(hit)
    }

    /// First primitive of `list` containing `coord`; the list is expected in priority order.
    #[must_use]
    pub fn property_by_coord_in_list(&self, coord: [f64; 3], list: &[PrimitiveId]) -> Option<Hit> {
        let tol = self.drawing_tolerance.eps;
        list.iter()
            .filter_map(|&id| self.primitives.get(id))
            .filter(|p| p.is_inside(coord, tol))
            .find_map(|p| {
                let property = self.property_index(p.property()?)?;
                Some(Hit {
                    property,
                    primitive: p.id(),
                    priority: p.priority(),
                })
            })
    }

    pub fn mark_used(&mut self, id: PrimitiveId) -> bool {
        match self.primitives.get_mut(id) {
            Some(primitive) => {
                primitive.set_used(true);
                true
            }
            None => false,
        }
    }

    /// Classifies a batch of points against all properties.
    #[must_use]
    pub fn classify_points(&self, points: &[Point3]) -> Vec<Option<Hit>> {
        classify_batch(self, points)
    }

    // ── maintenance ─────────────────────────────────────────────────────────

    /// Re-evaluates every owned primitive and refreshes the cached boxes.
    pub fn update(&mut self) -> ErrorLog {
        let mut errors = Vec::new();
        for property in &self.properties {
            for &id in property.primitives() {
                if let Some(primitive) = self.primitives.get_mut(id) {
                    primitive.update(&self.params, &mut errors);
                }
            }
        }
        log::debug!(
            "scene update: {} primitives, {} messages",
            self.primitive_count(),
            errors.len()
        );
        let mut log = ErrorLog::new();
        log.extend(errors);
        log
    }

    /// Whether the scene can be handed to a solver.
    ///
    /// Requires properties, primitives, a grid with at least two lines in x and y
    /// and one in z, error-free primitive updates and a populated excitation.
    pub fn is_geometry_valid(&mut self) -> bool {
        if self.properties.is_empty() || self.primitive_count() == 0 {
            return false;
        }
        if self.grid.line_count(0) <= 1 || self.grid.line_count(1) <= 1 || self.grid.line_count(2) == 0 {
            return false;
        }
        if !self.update().is_empty() {
            return false;
        }
        self.properties
            .iter()
            .any(|p| p.kind() == PropertyKind::Excitation && p.primitive_count() > 0)
    }

    /// Union of the accurate bounding boxes of matching primitives.
    #[must_use]
    pub fn object_area(&self, filter: PropertyType) -> Option<BBox> {
        self.all_primitives(false, filter)
            .into_iter()
            .filter(|p| p.is_bound_box_accurate())
            .map(|p| p.bound_box().normalized())
            .reduce(BBox::union)
    }

    /// Adds the accurate box edges of every primitive as grid lines along `dir`.
    pub fn insert_edges_to_grid(&mut self, dir: usize) -> bool {
        if dir > 2 {
            return false;
        }
        let edges: Vec<(f64, f64)> = self
            .all_primitives(false, PropertyType::ANY)
            .into_iter()
            .filter(|p| p.is_bound_box_accurate())
            .map(|p| p.bound_box().axis(dir))
            .collect();
        for (lower, upper) in edges {
            self.grid.add_disc_line(dir, lower);
            self.grid.add_disc_line(dir, upper);
        }
        self.grid.sort(dir);
        true
    }

    /// Warnings for empty properties and primitives never marked as used.
    pub fn warn_unused_primitives(&self, filter: PropertyType) -> Vec<String> {
        let warnings: Vec<String> = self
            .properties
            .iter()
            .filter(|p| p.type_flags().matches(filter))
            .flat_map(|p| p.unused_primitive_warnings(&self.primitives))
            .collect();
        for warning in &warnings {
            log::warn!("{warning}");
        }
        warnings
    }

    #[must_use]
    pub fn status(&self, filter: PropertyType) -> String {
        let mut out = String::new();
        for property in self.properties.iter().filter(|p| p.type_flags().matches(filter)) {
            out.push_str("-----------------------------------------\n");
            out.push_str(&property.status(&self.primitives));
        }
        out
    }

    /// Drops everything and restores the defaults.
    pub fn clear(&mut self) {
        self.properties.clear();
        self.primitives.clear();
        self.next_primitive_id = 0;
        self.next_property_id = 0;
        self.drawing_tolerance = Tolerance::EXACT;
        self.mesh_type = CoordSystem::Cartesian;
        self.params.clear();
        self.grid.clear();
    }

    fn allocate_property_id(&mut self) -> PropertyId {
        let id = PropertyId(self.next_property_id);
        self.next_property_id += 1;
        id
    }

    fn reindex(&mut self) {
        for (index, property) in self.properties.iter_mut().enumerate() {
            property.set_index(index);
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        fn classify_batch(scene: &Scene, points: &[Point3]) -> Vec<Option<Hit>> {
            use rayon::prelude::*;
            points
                .par_iter()
                .map(|p| scene.property_by_coord_priority(p.to_array(), PropertyType::ANY))
                .collect()
        }
    } else {
        fn classify_batch(scene: &Scene, points: &[Point3]) -> Vec<Option<Hit>> {
            points
                .iter()
                .map(|p| scene.property_by_coord_priority(p.to_array(), PropertyType::ANY))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameter;
    use crate::primitives::{
        BoxShape, CylinderShape, PolygonShape, SphereShape, UserCoordSystem, UserDefinedShape,
    };

    fn assert_back_references(scene: &Scene) {
        for property in scene.properties() {
            for &id in property.primitives() {
                let primitive = scene.primitive(id).expect("listed primitive exists");
                assert_eq!(primitive.property(), Some(property.unique_id()));
            }
        }
        for property in scene.properties() {
            for primitive in scene.all_primitives(false, PropertyType::ANY) {
                if primitive.property() == Some(property.unique_id()) {
                    assert!(property.has_primitive(primitive.id()));
                }
            }
        }
    }

    fn box_and_sphere() -> (Scene, PrimitiveId, PrimitiveId) {
        let mut scene = Scene::new();
        let metal = scene.add_property(Property::new(PropertyKind::Metal, "body"));
        let cube = scene
            .add_primitive(metal, BoxShape::new([0.0; 3], [10.0; 3]))
            .expect("box")
            .with_priority_mut(1);
        let ball = scene
            .add_primitive(metal, SphereShape::new([5.0; 3], 3.0))
            .expect("sphere")
            .with_priority_mut(2);
        assert!(scene.update().is_empty());
        (scene, cube, ball)
    }

    trait PriorityExt {
        fn with_priority_mut(&mut self, priority: i32) -> PrimitiveId;
    }

    impl PriorityExt for Primitive {
        fn with_priority_mut(&mut self, priority: i32) -> PrimitiveId {
            self.set_priority(priority);
            self.id()
        }
    }

    #[test]
    fn sphere_overrides_box_by_priority() {
        let (scene, cube, ball) = box_and_sphere();
        let hit = scene.property_by_coord_priority([5.0; 3], PropertyType::ANY).expect("hit");
        assert_eq!(hit.primitive, ball);
        assert_eq!(hit.priority, 2);
        let hit = scene.property_by_coord_priority([1.0; 3], PropertyType::ANY).expect("hit");
        assert_eq!(hit.primitive, cube);
        assert_eq!(scene.property_by_coord_priority([20.0; 3], PropertyType::ANY), None);
    }

    #[test]
    fn drawing_tolerance_defaults_to_exact() {
        let mut scene = Scene::new();
        assert!(scene.drawing_tolerance().eps.abs() < 1e-30);
        let sheet = scene.add_property(Property::new(PropertyKind::Metal, "sheet"));
        let square = [[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]];
        scene
            .add_primitive(sheet, PolygonShape::new(2, 1.0).with_vertices(&square))
            .expect("polygon");
        assert!(scene.update().is_empty());

        let above = [2.0, 2.0, 1.0 + 1e-10];
        assert!(scene.property_by_coord_priority([2.0, 2.0, 1.0], PropertyType::ANY).is_some());
        assert_eq!(scene.property_by_coord_priority(above, PropertyType::ANY), None);

        scene.set_drawing_tolerance(Tolerance::DEFAULT);
        assert!(scene.property_by_coord_priority(above, PropertyType::ANY).is_some());
    }

    #[test]
    fn later_property_needs_a_strictly_greater_priority() {
        let mut scene = Scene::new();
        let first = scene.add_property(Property::new(PropertyKind::Material, "a"));
        let second = scene.add_property(Property::new(PropertyKind::Excitation, "b"));
        scene.add_primitive(first, BoxShape::new([0.0; 3], [1.0; 3])).expect("box").set_priority(4);
        let late = scene
            .add_primitive(second, BoxShape::new([0.0; 3], [1.0; 3]))
            .expect("box")
            .with_priority_mut(4);
        scene.update();
        let hit = scene.property_by_coord_priority([0.5; 3], PropertyType::ANY).expect("hit");
        assert_eq!(hit.property, first);

        scene.primitive_mut(late).expect("present").set_priority(5);
        let hit = scene.property_by_coord_priority([0.5; 3], PropertyType::ANY).expect("hit");
        assert_eq!(hit.property, second);

        let hit = scene.property_by_coord_priority([0.5; 3], PropertyType::MATERIAL).expect("hit");
        assert_eq!(hit.property, first);
        assert_eq!(scene.property_by_coord_priority([0.5; 3], PropertyType::METAL), None);
    }

    #[test]
    fn sorted_listing_is_stable() {
        let mut scene = Scene::new();
        let p = scene.add_property(Property::new(PropertyKind::Metal, "m"));
        let mut ids = Vec::new();
        for priority in [1, 3, 1, 3] {
            ids.push(
                scene
                    .add_primitive(p, SphereShape::new([0.0; 3], 1.0))
                    .expect("sphere")
                    .with_priority_mut(priority),
            );
        }
        let order: Vec<PrimitiveId> = scene
            .all_primitives(true, PropertyType::ANY)
            .iter()
            .map(|p| p.id())
            .collect();
        assert_eq!(order, vec![ids[1], ids[3], ids[0], ids[2]]);
    }

    #[test]
    fn in_list_query_takes_the_first_hit() {
        let (scene, cube, ball) = box_and_sphere();
        let hit = scene.property_by_coord_in_list([5.0; 3], &[cube, ball]).expect("hit");
        assert_eq!(hit.primitive, cube);
        let sorted: Vec<PrimitiveId> = scene
            .all_primitives(true, PropertyType::ANY)
            .iter()
            .map(|p| p.id())
            .collect();
        assert_eq!(scene.property_by_coord_in_list([5.0; 3], &sorted).expect("hit").primitive, ball);
    }

    #[test]
    fn membership_moves_keep_back_references() {
        let (mut scene, cube, ball) = box_and_sphere();
        let other = scene.add_property(Property::new(PropertyKind::Excitation, "port"));
        scene.assign_primitive(other, ball).expect("assign");
        assert!(matches!(
            scene.assign_primitive(other, ball),
            Err(SceneError::AlreadyAssigned { .. })
        ));
        assert_eq!(scene.property(0).expect("metal").primitive_count(), 1);
        assert_eq!(scene.property_of_primitive(ball).expect("owner").name(), "port");
        assert_back_references(&scene);

        assert!(scene.remove_primitive(cube));
        assert_eq!(scene.primitive(cube).expect("still stored").property(), None);
        assert_eq!(scene.primitive_count(), 1);
        assert_back_references(&scene);

        let taken = scene.take_primitive(other, 0).expect("taken");
        assert_eq!(taken.id(), ball);
        assert!(scene.primitive(ball).is_none());
        assert!(scene.delete_primitive(cube).is_some());
        assert!(scene.primitive(cube).is_none());
    }

    #[test]
    fn replace_property_moves_primitives() {
        let (mut scene, cube, _) = box_and_sphere();
        let old_id = scene.property(0).expect("present").unique_id();
        let old = scene
            .replace_property(0, Property::new(PropertyKind::Excitation, "feed"))
            .expect("replace");
        assert_eq!(old.primitive_count(), 0);
        let new = scene.property(0).expect("present");
        assert_ne!(new.unique_id(), old_id);
        assert_eq!(new.primitive_count(), 2);
        assert_eq!(scene.property_of_primitive(cube).expect("owner").name(), "feed");
        assert_back_references(&scene);
        assert!(matches!(
            scene.replace_property(4, Property::new(PropertyKind::Unknown, "x")),
            Err(SceneError::PropertyIndex(4))
        ));
    }

    #[test]
    fn removing_a_property_reindexes() {
        let mut scene = Scene::new();
        for name in ["a", "b", "c"] {
            let index = scene.add_property(Property::new(PropertyKind::Material, name));
            scene.add_primitive(index, SphereShape::new([0.0; 3], 1.0)).expect("sphere");
        }
        let (removed, primitives) = scene.remove_property(1).expect("removed");
        assert_eq!(removed.name(), "b");
        assert_eq!(primitives.len(), 1);
        assert_eq!(primitives[0].property(), None);
        assert_eq!(scene.property(1).expect("c").index(), 1);
        assert_eq!(scene.primitive_count(), 2);
        assert!(scene.delete_property(0));
        assert_eq!(scene.properties_by_name("c").len(), 1);
        assert_eq!(scene.property_count_by_type(PropertyType::MATERIAL), 1);
        assert_back_references(&scene);
    }

    #[test]
    fn duplicate_primitive_ids_are_rejected() {
        let mut scene = Scene::new();
        let p = scene.add_property(Property::new(PropertyKind::Metal, "m"));
        scene
            .insert_primitive(p, Primitive::new(PrimitiveId(7), SphereShape::new([0.0; 3], 1.0)))
            .expect("insert");
        assert!(matches!(
            scene.insert_primitive(p, Primitive::new(PrimitiveId(7), SphereShape::new([0.0; 3], 1.0))),
            Err(SceneError::DuplicatePrimitive(PrimitiveId(7)))
        ));
        let next = scene.add_primitive(p, SphereShape::new([0.0; 3], 1.0)).expect("add").id();
        assert_eq!(next, PrimitiveId(8));
        assert!(matches!(
            scene.add_primitive(3, SphereShape::new([0.0; 3], 1.0)),
            Err(SceneError::PropertyIndex(3))
        ));
    }

    #[test]
    fn update_collects_every_failure() {
        let mut scene = Scene::new();
        let p = scene.add_property(Property::new(PropertyKind::Metal, "m"));
        let mut sphere = SphereShape::new([0.0; 3], 1.0);
        sphere.set_radius("missing*2").expect("formula");
        scene.add_primitive(p, sphere).expect("sphere");
        scene
            .add_primitive(p, UserDefinedShape::new("x <", UserCoordSystem::Cartesian))
            .expect("user");
        scene.add_primitive(p, BoxShape::new([0.0; 3], [1.0; 3])).expect("box");
        let log = scene.update();
        assert_eq!(log.len(), 2);
        assert!(log.messages()[0].starts_with("Error in Sphere Radius (ID: 0)"));
        assert!(log.to_string().ends_with('\n'));
    }

    #[test]
    fn formulas_follow_parameter_changes() {
        let mut scene = Scene::new();
        scene.params_mut().link_parameter(Parameter::constant("r", 1.0));
        let p = scene.add_property(Property::new(PropertyKind::Metal, "m"));
        let mut sphere = SphereShape::new([0.0; 3], 0.0);
        sphere.set_radius("r").expect("formula");
        scene.add_primitive(p, sphere).expect("sphere");
        scene.update();
        assert!(scene.property_by_coord_priority([1.5, 0.0, 0.0], PropertyType::ANY).is_none());
        assert!(scene.params_mut().set_value("r", 2.0));
        scene.update();
        assert!(scene.property_by_coord_priority([1.5, 0.0, 0.0], PropertyType::ANY).is_some());
    }

    #[test]
    fn bounding_box_queries() {
        let (mut scene, cube, ball) = box_and_sphere();
        let near = scene.primitives_by_bound_box(BBox::from_array6([6.0, 7.0, 6.0, 7.0, 6.0, 7.0]), false, PropertyType::ANY);
        assert_eq!(near.len(), 2);
        let far = scene.primitives_by_bound_box(BBox::from_array6([8.5, 9.0, 8.5, 9.0, 8.5, 9.0]), false, PropertyType::ANY);
        assert_eq!(far.iter().map(|p| p.id()).collect::<Vec<_>>(), vec![cube]);

        let area = scene.object_area(PropertyType::ANY).expect("area");
        assert_eq!(area.to_array6(), [0.0, 10.0, 0.0, 10.0, 0.0, 10.0]);

        scene.insert_edges_to_grid(0);
        assert_eq!(scene.grid().lines(0), &[0.0, 2.0, 8.0, 10.0]);
        assert!(!scene.insert_edges_to_grid(3));
        assert_eq!(scene.primitives_by_type(PrimitiveType::Sphere)[0].id(), ball);
    }

    #[test]
    fn geometry_validity_needs_an_excitation() {
        let (mut scene, _, _) = box_and_sphere();
        scene.grid_mut().add_disc_lines(0, &[0.0, 1.0]);
        scene.grid_mut().add_disc_lines(1, &[0.0, 1.0]);
        scene.grid_mut().add_disc_line(2, 0.0);
        assert!(!scene.is_geometry_valid());
        let port = scene.add_property(Property::new(PropertyKind::Excitation, "port"));
        assert!(!scene.is_geometry_valid());
        scene
            .add_primitive(port, CylinderShape::new([0.0; 3], [0.0, 0.0, 1.0], 0.1))
            .expect("cylinder");
        assert!(scene.is_geometry_valid());
        scene.grid_mut().clear_lines(1);
        assert!(!scene.is_geometry_valid());
    }

    #[test]
    fn marked_queries_silence_unused_warnings() {
        let (mut scene, _, _) = box_and_sphere();
        assert_eq!(scene.warn_unused_primitives(PropertyType::ANY).len(), 2);
        scene.property_by_coord_priority_marked([5.0; 3], PropertyType::ANY);
        scene.property_by_coord_priority_marked([1.0; 3], PropertyType::ANY);
        assert!(scene.warn_unused_primitives(PropertyType::ANY).is_empty());
        assert!(scene.warn_unused_primitives(PropertyType::EXCITATION).is_empty());
    }

    #[test]
    fn batch_classification_matches_single_queries() {
        let (scene, cube, ball) = box_and_sphere();
        let points = [Point3::new(5.0, 5.0, 5.0), Point3::new(1.0, 1.0, 1.0), Point3::new(20.0, 0.0, 0.0)];
        let hits: Vec<Option<PrimitiveId>> = scene
            .classify_points(&points)
            .into_iter()
            .map(|hit| hit.map(|h| h.primitive))
            .collect();
        assert_eq!(hits, vec![Some(ball), Some(cube), None]);
    }

    #[test]
    fn mesh_system_propagates_and_clear_resets() {
        let (mut scene, cube, _) = box_and_sphere();
        scene.set_mesh_coord_system(CoordSystem::Cylindrical);
        assert_eq!(scene.property(0).expect("present").coord_system(), CoordSystem::Cylindrical);
        assert_eq!(scene.primitive(cube).expect("present").mesh_type(), CoordSystem::Cylindrical);
        let status = scene.status(PropertyType::ANY);
        assert!(status.starts_with("-----------------------------------------\n Property #0"));

        scene.set_drawing_tolerance(Tolerance::DEFAULT);
        scene.clear();
        assert_eq!(scene.property_count(), 0);
        assert_eq!(scene.mesh_coord_system(), CoordSystem::Cartesian);
        assert!((scene.drawing_tolerance().eps).abs() < 1e-12);
    }
}
