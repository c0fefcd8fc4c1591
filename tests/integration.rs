use csx_engine::parse::csx_xml;
use csx_engine::{
    BoxShape, CylinderShape, Parameter, ParameterScalar, ParameterSet, PolygonShape, Primitive,
    PrimitiveId, Property, PropertyKind, PropertyType, Scene, Shape, SphereShape,
    SphericalShellShape,
};

fn primitive(shape: impl Into<Shape>) -> Primitive {
    let mut primitive = Primitive::new(PrimitiveId(0), shape);
    let mut errors = Vec::new();
    assert!(primitive.update(&ParameterSet::new(), &mut errors), "{errors:?}");
    primitive
}

fn scenario() -> Scene {
    let mut scene = Scene::new();
    let metal = scene.add_property(Property::new(PropertyKind::Metal, "body"));
    scene
        .add_primitive(metal, BoxShape::new([0.0; 3], [10.0; 3]))
        .expect("box")
        .set_priority(1);
    scene
        .add_primitive(metal, SphereShape::new([5.0; 3], 3.0))
        .expect("sphere")
        .set_priority(2);
    assert!(scene.update().is_empty());
    scene
}

#[test]
fn box_corner_order_does_not_change_membership() {
    let forward = primitive(BoxShape::new([0.0, 0.0, 0.0], [2.0, 4.0, 6.0]));
    let swapped = primitive(BoxShape::new([2.0, 4.0, 6.0], [0.0, 0.0, 0.0]));
    for p in [[1.0, 1.0, 1.0], [2.0, 4.0, 6.0], [3.0, 1.0, 1.0], [1.0, -0.1, 1.0]] {
        assert_eq!(forward.is_inside(p, 0.0), swapped.is_inside(p, 0.0), "{p:?}");
    }
}

#[test]
fn sphere_surface_is_outside_but_inside_a_shell_with_width() {
    let surface = [8.0, 5.0, 5.0];
    assert!(!primitive(SphereShape::new([5.0; 3], 3.0)).is_inside(surface, 0.0));
    assert!(primitive(SphericalShellShape::new([5.0; 3], 3.0, 0.5)).is_inside(surface, 0.0));
    assert!(!primitive(SphericalShellShape::new([5.0; 3], 3.0, 0.0)).is_inside(surface, 0.0));
}

#[test]
fn cylinder_axis_and_end_caps() {
    let solid = primitive(CylinderShape::new([0.0; 3], [0.0, 0.0, 4.0], 1.0));
    let empty = primitive(CylinderShape::new([0.0; 3], [0.0, 0.0, 4.0], 0.0));
    assert!(solid.is_inside([0.0, 0.0, 2.0], 0.0));
    assert!(!empty.is_inside([0.0, 0.0, 2.0], 0.0));
    assert!(!solid.is_inside([0.0, 0.0, -0.5], 0.0));
    assert!(!solid.is_inside([0.0, 0.0, 4.5], 0.0));
}

#[test]
fn polygon_membership_ignores_vertex_order() {
    let square = [[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]];
    let mut reversed = square;
    reversed.reverse();
    let ccw = primitive(PolygonShape::new(2, 1.0).with_vertices(&square));
    let cw = primitive(PolygonShape::new(2, 1.0).with_vertices(&reversed));

    for p in [[2.0, 2.0, 1.0], [5.0, 2.0, 1.0], [2.0, 2.0, 1.5]] {
        assert_eq!(ccw.is_inside(p, 0.0), cw.is_inside(p, 0.0), "{p:?}");
    }
    assert!(ccw.is_inside([2.0, 2.0, 1.0], 0.0));
    assert!(ccw.is_inside([2.0, 0.0, 1.0], 0.0));
    assert!(ccw.is_inside([4.0, 3.0, 1.0], 0.0));
    assert!(!ccw.is_inside([2.0, 2.0, 1.5], 0.0));
}

#[test]
fn strict_priority_keeps_the_first_of_equal_maxima() {
    let mut scene = Scene::new();
    let index = scene.add_property(Property::new(PropertyKind::Material, "stack"));
    let mut ids = Vec::new();
    for priority in [3, 5, 5, 1] {
        let primitive = scene
            .add_primitive(index, BoxShape::new([0.0; 3], [1.0; 3]))
            .expect("box");
        primitive.set_priority(priority);
        ids.push(primitive.id());
    }
    assert!(scene.update().is_empty());

    let hit = scene
        .property_by_coord_priority([0.5; 3], PropertyType::ANY)
        .expect("hit");
    assert_eq!(hit.primitive, ids[1]);
    assert_eq!(hit.priority, 5);
}

#[test]
fn scalar_cache_follows_the_parameter_set() {
    let mut params = ParameterSet::new();
    params.link_parameter(Parameter::constant("a", 2.0));
    let mut scalar = ParameterScalar::parse("a*3").expect("formula");

    assert!((scalar.evaluate(&params).expect("eval") - 6.0).abs() < 1e-9);
    assert!((scalar.evaluate(&params).expect("eval") - 6.0).abs() < 1e-9);
    assert_eq!(scalar.evaluations(), 1);

    params.set_value("a", 4.0);
    params.set_modified(true);
    assert!((scalar.evaluate(&params).expect("eval") - 12.0).abs() < 1e-9);
    assert_eq!(scalar.evaluations(), 2);
    assert_eq!(scalar.value_string(), "a*3");
}

#[test]
fn linear_parameter_walks_its_steps() {
    let mut parameter = Parameter::linear("p", 4.0, 0.0, 10.0, 3.0);
    parameter.init_sweep();
    let mut seen = vec![parameter.value()];
    while parameter.increase_step() {
        seen.push(parameter.value());
    }
    assert_eq!(seen, vec![0.0, 3.0, 6.0, 9.0]);
    assert!(!parameter.increase_step());
    assert!((parameter.value() - 9.0).abs() < 1e-9);
    assert_eq!(parameter.step_count(), 4);
}

#[test]
fn box_and_sphere_scenario() {
    let scene = scenario();
    let at = |p| scene.property_by_coord_priority(p, PropertyType::ANY);

    let sphere = at([5.0, 5.0, 5.0]).expect("sphere hit");
    assert_eq!(sphere.priority, 2);
    assert_eq!(scene.primitive(sphere.primitive).expect("primitive").type_name(), "Sphere");

    let boxed = at([1.0, 1.0, 1.0]).expect("box hit");
    assert_eq!(scene.primitive(boxed.primitive).expect("primitive").type_name(), "Box");

    assert!(at([20.0, 20.0, 20.0]).is_none());
    assert!(scene.property_by_coord_priority([5.0; 3], PropertyType::EXCITATION).is_none());
}

#[test]
fn batch_classification_matches_single_queries() {
    let scene = scenario();
    let points: Vec<_> = [[5.0, 5.0, 5.0], [1.0, 1.0, 1.0], [20.0, 20.0, 20.0], [9.0, 5.0, 5.0]]
        .into_iter()
        .map(csx_engine::Point3::from_array)
        .collect();
    let hits = scene.classify_points(&points);
    for (point, hit) in points.iter().zip(hits) {
        assert_eq!(hit, scene.property_by_coord_priority(point.to_array(), PropertyType::ANY));
    }
}

#[test]
fn scene_survives_an_xml_round_trip() {
    let mut scene = scenario();
    scene.params_mut().link_parameter(Parameter::constant("r", 3.0));
    scene.grid_mut().add_disc_lines(0, &[0.0, 10.0]);
    scene.grid_mut().add_disc_lines(1, &[0.0, 10.0]);
    scene.grid_mut().add_disc_lines(2, &[0.0, 10.0]);

    let written = csx_xml::write_string(&scene).expect("write");
    let (again, log) = csx_xml::read_str(&written).expect("read");
    assert!(log.is_empty(), "{log}");
    assert_eq!(again.grid().lines(2), &[0.0, 10.0]);
    for p in [[5.0, 5.0, 5.0], [1.0, 1.0, 1.0], [20.0, 20.0, 20.0]] {
        assert_eq!(
            again.property_by_coord_priority(p, PropertyType::ANY),
            scene.property_by_coord_priority(p, PropertyType::ANY)
        );
    }
}
