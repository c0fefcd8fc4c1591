//! Reader and writer for `ContinuousStructure` XML documents.
//!
//! Scalar attributes hold either a number or `term:<formula>`. Reading rebuilds an
//! equivalent [`Scene`] and runs one update; problems with single parameters,
//! properties or primitives are reported in the returned [`ErrorLog`] and the
//! offending item is skipped.

use std::fs;
use std::num::ParseFloatError;
use std::path::Path;

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geom::{CoordSystem, CsTransform, TransformKind};
use crate::params::{Parameter, ParameterCoord, ParameterKind, ParameterScalar, ParameterSet, ScalarError};
use crate::primitives::{
    BoxShape, CurveShape, CylinderShape, CylindricalShellShape, LinPolyShape, MultiBoxShape,
    PointShape, PolygonShape, Primitive, PrimitiveError, PrimitiveId, PrimitiveType, RotPolyShape,
    Shape, SphereShape, SphericalShellShape, UserCoordSystem, UserDefinedShape, WireShape,
};
use crate::scene::{ErrorLog, Property, PropertyKind, RectGrid, Scene, SceneError};

/// Prefix marking a scalar attribute as formula.
pub const TERM_PREFIX: &str = "term:";

const DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("no RectilinearGrid found")]
    MissingGrid,
    #[error("invalid grid line: {0}")]
    Number(#[from] ParseFloatError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single primitive element was skipped.
#[derive(Debug, Error)]
enum InvalidPrimitive {
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("{0} primitives are not supported")]
    Unsupported(&'static str),
    #[error(transparent)]
    Shape(#[from] PrimitiveError),
    #[error(transparent)]
    Scalar(#[from] ScalarError),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Parses a document and returns the scene with the accumulated warnings and
/// update errors.
pub fn read_str(input: &str) -> ParseResult<(Scene, ErrorLog)> {
    log::debug!("start reading ContinuousStructure document");
    let document: DocumentXml = from_str(input)?;
    let mut scene = Scene::new();
    let mut log = ErrorLog::new();

    scene.set_mesh_coord_system(CoordSystem::from_index(document.coord_system).or(CoordSystem::Cartesian));
    let grid = document.grid.ok_or(ParseError::MissingGrid)?;
    read_grid(&grid, scene.grid_mut())?;

    if let Some(set) = &document.parameters {
        read_parameters(set, scene.params_mut(), &mut log);
    }

    let Some(properties) = document.properties else {
        log.push("Warning: Properties not found!!!");
        return Ok((scene, log));
    };
    for element in properties.items {
        let (kind, body) = element.into_parts();
        read_property(&mut scene, kind, body, &mut log);
    }

    log.extend(scene.update().into_messages());
    log::debug!(
        "read {} properties with {} primitives, {} messages",
        scene.property_count(),
        scene.primitive_count(),
        log.len()
    );
    Ok((scene, log))
}

pub fn read_file(path: impl AsRef<Path>) -> ParseResult<(Scene, ErrorLog)> {
    let input = fs::read_to_string(path)?;
    read_str(&input)
}

/// Serialises `scene`, formulas written as `term:<formula>`.
pub fn write_string(scene: &Scene) -> ParseResult<String> {
    let document = DocumentXml {
        coord_system: scene.mesh_coord_system().as_index(),
        grid: Some(grid_xml(scene.grid())),
        parameters: Some(parameters_xml(scene.params())),
        properties: Some(PropertiesXml {
            items: scene
                .properties()
                .iter()
                .map(|property| property_xml(scene, property))
                .collect(),
        }),
    };
    let body = to_string(&document)?;
    Ok(format!("{DECLARATION}{body}"))
}

pub fn write_file(scene: &Scene, path: impl AsRef<Path>) -> ParseResult<()> {
    fs::write(path, write_string(scene)?)?;
    Ok(())
}

/// Attribute text of a scalar: the number, or the prefixed formula.
#[must_use]
pub fn write_term(scalar: &ParameterScalar) -> String {
    match scalar.formula() {
        Some(formula) => format!("{TERM_PREFIX}{formula}"),
        None => scalar.value().to_string(),
    }
}

/// Strips the formula prefix; the remaining text is classified by the scalar itself.
fn term(value: &str) -> &str {
    value.strip_prefix(TERM_PREFIX).unwrap_or(value)
}

// ─────────────────────────────────────────────────────────────────────────────
// Reading
// ─────────────────────────────────────────────────────────────────────────────

fn read_grid(xml: &GridXml, grid: &mut RectGrid) -> ParseResult<()> {
    grid.set_delta_unit(xml.delta_unit);
    grid.set_mesh_type(CoordSystem::from_index(xml.coord_system).or(CoordSystem::Cartesian));
    for (dir, lines) in [&xml.x_lines, &xml.y_lines, &xml.z_lines].into_iter().enumerate() {
        for part in lines.text.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            grid.add_disc_line(dir, part.parse()?);
        }
        grid.sort(dir);
    }
    Ok(())
}

fn read_parameters(xml: &ParameterSetXml, params: &mut ParameterSet, log: &mut ErrorLog) {
    for entry in &xml.parameters {
        let mut parameter = match (entry.kind.as_str(), entry.min, entry.max, entry.step) {
            ("Const", ..) => Parameter::constant(entry.name.as_str(), entry.value),
            ("Linear", Some(min), Some(max), Some(step)) => {
                Parameter::linear(entry.name.as_str(), entry.value, min, max, step)
            }
            _ => {
                log.push(format!("Warning: Invalid parameter \"{}\" skipped!", entry.name));
                continue;
            }
        };
        parameter.set_sweep(entry.sweep.is_none_or(|sweep| sweep != 0));
        params.link_parameter(parameter);
    }
}

fn read_property(scene: &mut Scene, kind: PropertyKind, body: PropertyXml, log: &mut ErrorLog) {
    let mut property = Property::new(kind, body.name.as_str());
    if let Some(attributes) = &body.attributes {
        for entry in &attributes.entries {
            property.set_attribute(entry.name.as_str(), entry.value.as_str());
        }
    }
    let index = scene.add_property(property);

    let Some(primitives) = body.primitives else {
        log.push(format!("Warning: No primitives found in property: {}!", body.name));
        return;
    };
    for element in primitives.items {
        let (kind, xml) = element.into_parts();
        if let Err(error) = read_primitive(scene, index, kind, &xml, log) {
            log::warn!("skipping primitive in property {:?}: {error}", body.name);
            log.push(format!("Warning: Invalid primitive found in property: {}!", body.name));
        }
    }
}

fn read_primitive(
    scene: &mut Scene,
    property: usize,
    kind: Result<PrimitiveType, &'static str>,
    xml: &PrimitiveXml,
    log: &mut ErrorLog,
) -> Result<(), InvalidPrimitive> {
    let kind = kind.map_err(InvalidPrimitive::Unsupported)?;
    let shape = build_shape(kind, xml)?;
    let transform = xml
        .transformation
        .as_ref()
        .map(|ops| read_transform(ops, scene.params(), log));

    let primitive = match xml.id {
        Some(id) => scene.insert_primitive(property, Primitive::new(PrimitiveId(id), shape))?,
        None => scene.add_primitive(property, shape)?,
    };
    primitive.set_priority(xml.priority);
    if kind != PrimitiveType::UserDefined {
        if let Some(system) = xml.coord_system {
            primitive.set_coord_system(CoordSystem::from_index(system));
        }
    }
    primitive.set_transform(transform);
    Ok(())
}

fn read_transform(xml: &TransformationXml, params: &ParameterSet, log: &mut ErrorLog) -> CsTransform {
    let mut transform = CsTransform::new();
    for op in &xml.ops {
        let (kind, args) = op.parts();
        if let Err(error) = transform.transform_by_type_str(kind, args, true, params) {
            log.push(format!(
                "Warning: Reading of \"{kind}\" with arguments: \"{args}\" failed: {error}"
            ));
        }
    }
    transform
}

fn required<'a>(value: Option<&'a str>, what: &'static str) -> Result<&'a str, InvalidPrimitive> {
    value.map(term).ok_or(InvalidPrimitive::Missing(what))
}

fn build_shape(kind: PrimitiveType, xml: &PrimitiveXml) -> Result<Shape, InvalidPrimitive> {
    let shape = match kind {
        PrimitiveType::Point => {
            let coord = ParameterCoord::parse([
                required(xml.x.as_deref(), "X")?,
                required(xml.y.as_deref(), "Y")?,
                required(xml.z.as_deref(), "Z")?,
            ])?;
            Shape::Point(PointShape { coord })
        }
        PrimitiveType::Box => Shape::Box(BoxShape {
            start: coord_of(xml.p1.as_ref(), "P1")?,
            stop: coord_of(xml.p2.as_ref(), "P2")?,
        }),
        PrimitiveType::MultiBox => Shape::MultiBox(read_multi_box(xml)?),
        PrimitiveType::Sphere => {
            let mut sphere = SphereShape {
                center: coord_of(xml.center.as_ref(), "Center")?,
                ..SphereShape::default()
            };
            sphere.set_radius(required(xml.radius.as_deref(), "Radius")?)?;
            Shape::Sphere(sphere)
        }
        PrimitiveType::SphericalShell => {
            let mut shell = SphericalShellShape {
                center: coord_of(xml.center.as_ref(), "Center")?,
                ..SphericalShellShape::default()
            };
            shell.set_radius(required(xml.radius.as_deref(), "Radius")?)?;
            shell.set_width(required(xml.shell_width.as_deref(), "ShellWidth")?)?;
            Shape::SphericalShell(shell)
        }
        PrimitiveType::Cylinder => {
            let mut cylinder = CylinderShape {
                start: coord_of(xml.p1.as_ref(), "P1")?,
                stop: coord_of(xml.p2.as_ref(), "P2")?,
                ..CylinderShape::default()
            };
            cylinder.set_radius(required(xml.radius.as_deref(), "Radius")?)?;
            Shape::Cylinder(cylinder)
        }
        PrimitiveType::CylindricalShell => {
            let mut shell = CylindricalShellShape {
                start: coord_of(xml.p1.as_ref(), "P1")?,
                stop: coord_of(xml.p2.as_ref(), "P2")?,
                ..CylindricalShellShape::default()
            };
            shell.set_radius(required(xml.radius.as_deref(), "Radius")?)?;
            shell.set_width(required(xml.shell_width.as_deref(), "ShellWidth")?)?;
            Shape::CylindricalShell(shell)
        }
        PrimitiveType::Polygon => Shape::Polygon(read_polygon(xml)?),
        PrimitiveType::LinPoly => {
            let mut linpoly = LinPolyShape::new(read_polygon(xml)?, 0.0);
            linpoly.set_length(required(xml.length.as_deref(), "Length")?)?;
            Shape::LinPoly(linpoly)
        }
        PrimitiveType::RotPoly => {
            let angles = xml.angles.as_ref().ok_or(InvalidPrimitive::Missing("Angles"))?;
            let axis = xml.rot_axis.ok_or(InvalidPrimitive::Missing("RotAxisDir"))?;
            let mut rotpoly = RotPolyShape::new(read_polygon(xml)?, 0, 0.0, 0.0);
            rotpoly.set_rot_axis(axis)?;
            rotpoly.set_angles(
                required(angles.start.as_deref(), "Start")?,
                required(angles.stop.as_deref(), "Stop")?,
            )?;
            Shape::RotPoly(rotpoly)
        }
        PrimitiveType::Curve => Shape::Curve(read_curve(xml)?),
        PrimitiveType::Wire => {
            let mut wire = WireShape {
                curve: read_curve(xml)?,
                ..WireShape::default()
            };
            wire.set_radius(required(xml.wire_radius.as_deref(), "WireRadius")?)?;
            Shape::Wire(wire)
        }
        PrimitiveType::UserDefined => {
            let function = xml.function.as_ref().ok_or(InvalidPrimitive::Missing("Function"))?;
            let system = xml
                .coord_system
                .and_then(UserCoordSystem::from_index)
                .unwrap_or_default();
            let mut user = UserDefinedShape::new(function.text.trim(), system);
            if let Some(shift) = &xml.coord_shift {
                user.set_coord_shift([
                    required(shift.x.as_deref(), "CoordShift X")?,
                    required(shift.y.as_deref(), "CoordShift Y")?,
                    required(shift.z.as_deref(), "CoordShift Z")?,
                ])?;
            }
            Shape::UserDefined(user)
        }
    };
    Ok(shape)
}

fn coord_of(xml: Option<&CoordXml>, what: &'static str) -> Result<ParameterCoord, InvalidPrimitive> {
    let xml = xml.ok_or(InvalidPrimitive::Missing(what))?;
    let coord = ParameterCoord::parse([
        required(xml.x.as_deref(), what)?,
        required(xml.y.as_deref(), what)?,
        required(xml.z.as_deref(), what)?,
    ])?;
    Ok(coord)
}

fn read_multi_box(xml: &PrimitiveXml) -> Result<MultiBoxShape, InvalidPrimitive> {
    let mut multi = MultiBoxShape::new();
    for (start, stop) in xml.start_p.iter().zip(&xml.end_p) {
        let index = multi.add_box(None);
        let corners = [
            (0, start.x.as_deref()),
            (1, stop.x.as_deref()),
            (2, start.y.as_deref()),
            (3, stop.y.as_deref()),
            (4, start.z.as_deref()),
            (5, stop.z.as_deref()),
        ];
        for (slot, value) in corners {
            multi.set_bound(index, slot, required(value, "MultiBox corner")?)?;
        }
    }
    Ok(multi)
}

fn read_polygon(xml: &PrimitiveXml) -> Result<PolygonShape, InvalidPrimitive> {
    let normal = xml.norm_dir.ok_or(InvalidPrimitive::Missing("NormDir"))?;
    let mut polygon = PolygonShape::new(0, 0.0);
    polygon.set_normal_dir(normal)?;
    polygon.set_elevation(required(xml.elevation.as_deref(), "Elevation")?)?;
    for vertex in &xml.vertices {
        polygon.add_vertex_str(
            required(vertex.x1.as_deref(), "Vertex X1")?,
            required(vertex.x2.as_deref(), "Vertex X2")?,
        )?;
    }
    Ok(polygon)
}

fn read_curve(xml: &PrimitiveXml) -> Result<CurveShape, InvalidPrimitive> {
    let mut curve = CurveShape::default();
    for vertex in &xml.vertices {
        curve.add_point_str([
            required(vertex.x.as_deref(), "Vertex X")?,
            required(vertex.y.as_deref(), "Vertex Y")?,
            required(vertex.z.as_deref(), "Vertex Z")?,
        ])?;
    }
    Ok(curve)
}

// ─────────────────────────────────────────────────────────────────────────────
// Writing
// ─────────────────────────────────────────────────────────────────────────────

fn grid_xml(grid: &RectGrid) -> GridXml {
    let lines = |dir: usize| LinesXml {
        qty: grid.line_count(dir),
        text: grid
            .lines(dir)
            .iter()
            .map(f64::to_string)
            .collect::<Vec<_>>()
            .join(","),
    };
    GridXml {
        delta_unit: grid.delta_unit(),
        coord_system: grid.mesh_type().as_index(),
        x_lines: lines(0),
        y_lines: lines(1),
        z_lines: lines(2),
    }
}

fn parameters_xml(params: &ParameterSet) -> ParameterSetXml {
    let parameters = params
        .iter()
        .map(|parameter| {
            let (kind, min, max, step) = match parameter.kind() {
                ParameterKind::Constant => ("Const", None, None, None),
                ParameterKind::Linear { min, max, step } => ("Linear", Some(min), Some(max), Some(step)),
            };
            ParameterXml {
                kind: kind.to_owned(),
                name: parameter.name().to_owned(),
                sweep: Some(i32::from(parameter.sweep())),
                value: parameter.value(),
                min,
                max,
                step,
            }
        })
        .collect();
    ParameterSetXml { parameters }
}

fn property_xml(scene: &Scene, property: &Property) -> PropertyElement {
    let attributes = (!property.attributes().is_empty()).then(|| AttributesXml {
        entries: property
            .attributes()
            .iter()
            .map(|(name, value)| AttributeXml {
                name: name.clone(),
                value: value.clone(),
            })
            .collect(),
    });
    let items = property
        .primitives()
        .iter()
        .filter_map(|&id| scene.primitive(id))
        .map(primitive_xml)
        .collect();
    let body = PropertyXml {
        id: Some(property.index()),
        name: property.name().to_owned(),
        attributes,
        primitives: Some(PrimitivesXml { items }),
    };
    PropertyElement::new(property.kind(), body)
}

fn primitive_xml(primitive: &Primitive) -> PrimitiveElement {
    let system = primitive.coord_system();
    let mut xml = PrimitiveXml {
        id: Some(primitive.id().0),
        priority: primitive.priority(),
        coord_system: system.is_defined().then(|| system.as_index()),
        transformation: primitive
            .transform()
            .filter(|transform| !transform.operations().is_empty())
            .map(transformation_xml),
        ..PrimitiveXml::default()
    };

    match primitive.shape() {
        Shape::Point(point) => {
            let coord = CoordXml::from_coord(&point.coord);
            xml.x = coord.x;
            xml.y = coord.y;
            xml.z = coord.z;
        }
        Shape::Box(shape) => {
            xml.p1 = Some(CoordXml::from_coord(&shape.start));
            xml.p2 = Some(CoordXml::from_coord(&shape.stop));
        }
        Shape::MultiBox(multi) => {
            xml.qty_box = Some(multi.box_count());
            for entry in multi.boxes() {
                xml.start_p.push(CoordXml::from_scalars([&entry[0], &entry[2], &entry[4]]));
                xml.end_p.push(CoordXml::from_scalars([&entry[1], &entry[3], &entry[5]]));
            }
        }
        Shape::Sphere(sphere) => {
            xml.radius = Some(write_term(&sphere.radius));
            xml.center = Some(CoordXml::from_coord(&sphere.center));
        }
        Shape::SphericalShell(shell) => {
            xml.radius = Some(write_term(&shell.radius));
            xml.shell_width = Some(write_term(&shell.width));
            xml.center = Some(CoordXml::from_coord(&shell.center));
        }
        Shape::Cylinder(cylinder) => {
            xml.radius = Some(write_term(&cylinder.radius));
            xml.p1 = Some(CoordXml::from_coord(&cylinder.start));
            xml.p2 = Some(CoordXml::from_coord(&cylinder.stop));
        }
        Shape::CylindricalShell(shell) => {
            xml.radius = Some(write_term(&shell.radius));
            xml.shell_width = Some(write_term(&shell.width));
            xml.p1 = Some(CoordXml::from_coord(&shell.start));
            xml.p2 = Some(CoordXml::from_coord(&shell.stop));
        }
        Shape::Polygon(polygon) => write_polygon(&mut xml, polygon),
        Shape::LinPoly(linpoly) => {
            write_polygon(&mut xml, &linpoly.polygon);
            xml.length = Some(write_term(&linpoly.length));
        }
        Shape::RotPoly(rotpoly) => {
            write_polygon(&mut xml, &rotpoly.polygon);
            xml.rot_axis = Some(rotpoly.rot_axis());
            xml.angles = Some(AnglesXml {
                start: Some(write_term(&rotpoly.start_angle)),
                stop: Some(write_term(&rotpoly.stop_angle)),
            });
        }
        Shape::Curve(curve) => xml.vertices = curve_vertices(curve),
        Shape::Wire(wire) => {
            xml.vertices = curve_vertices(&wire.curve);
            xml.wire_radius = Some(write_term(&wire.radius));
        }
        Shape::UserDefined(user) => {
            let [x, y, z] = user.coord_shift();
            xml.coord_system = Some(user.coord_system().as_index());
            xml.coord_shift = Some(CoordXml::from_scalars([x, y, z]));
            xml.function = Some(FunctionXml {
                text: user.function().to_owned(),
            });
        }
    }
    PrimitiveElement::new(primitive.kind(), xml)
}

fn write_polygon(xml: &mut PrimitiveXml, polygon: &PolygonShape) {
    xml.elevation = Some(write_term(&polygon.elevation));
    xml.norm_dir = Some(polygon.normal_dir());
    xml.qty_vertices = Some(polygon.vertex_count());
    xml.vertices = polygon
        .vertices()
        .iter()
        .map(|[u, v]| VertexXml {
            x1: Some(write_term(u)),
            x2: Some(write_term(v)),
            ..VertexXml::default()
        })
        .collect();
}

fn curve_vertices(curve: &CurveShape) -> Vec<VertexXml> {
    curve
        .coords()
        .iter()
        .map(|coord| {
            let CoordXml { x, y, z } = CoordXml::from_coord(coord);
            VertexXml {
                x,
                y,
                z,
                ..VertexXml::default()
            }
        })
        .collect()
}

fn transformation_xml(transform: &CsTransform) -> TransformationXml {
    TransformationXml {
        ops: transform
            .operations()
            .iter()
            .map(|op| TransformOpXml::new(op.kind, op.argument_string()))
            .collect(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Document model
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename = "ContinuousStructure")]
struct DocumentXml {
    #[serde(rename = "@CoordSystem", default)]
    coord_system: i32,
    #[serde(rename = "RectilinearGrid", default, skip_serializing_if = "Option::is_none")]
    grid: Option<GridXml>,
    #[serde(rename = "ParameterSet", default, skip_serializing_if = "Option::is_none")]
    parameters: Option<ParameterSetXml>,
    #[serde(rename = "Properties", default, skip_serializing_if = "Option::is_none")]
    properties: Option<PropertiesXml>,
}

const fn one() -> f64 {
    1.0
}

#[derive(Debug, Deserialize, Serialize)]
struct GridXml {
    #[serde(rename = "@DeltaUnit", default = "one")]
    delta_unit: f64,
    #[serde(rename = "@CoordSystem", default)]
    coord_system: i32,
    #[serde(rename = "XLines", default)]
    x_lines: LinesXml,
    #[serde(rename = "YLines", default)]
    y_lines: LinesXml,
    #[serde(rename = "ZLines", default)]
    z_lines: LinesXml,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct LinesXml {
    #[serde(rename = "@Qty", default)]
    qty: usize,
    #[serde(rename = "$text", default)]
    text: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ParameterSetXml {
    #[serde(rename = "Parameter", default)]
    parameters: Vec<ParameterXml>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ParameterXml {
    #[serde(rename = "@Type")]
    kind: String,
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@Sweep", default, skip_serializing_if = "Option::is_none")]
    sweep: Option<i32>,
    #[serde(rename = "@value")]
    value: f64,
    #[serde(rename = "@min", default, skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(rename = "@max", default, skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
    #[serde(rename = "@step", default, skip_serializing_if = "Option::is_none")]
    step: Option<f64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct PropertiesXml {
    #[serde(rename = "$value", default)]
    items: Vec<PropertyElement>,
}

#[derive(Debug, Deserialize, Serialize)]
struct PropertyXml {
    #[serde(rename = "@ID", default, skip_serializing_if = "Option::is_none")]
    id: Option<usize>,
    #[serde(rename = "@Name", default)]
    name: String,
    #[serde(rename = "Attributes", default, skip_serializing_if = "Option::is_none")]
    attributes: Option<AttributesXml>,
    #[serde(rename = "Primitives", default, skip_serializing_if = "Option::is_none")]
    primitives: Option<PrimitivesXml>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct AttributesXml {
    #[serde(rename = "Attribute", default)]
    entries: Vec<AttributeXml>,
}

#[derive(Debug, Deserialize, Serialize)]
struct AttributeXml {
    #[serde(rename = "@Name")]
    name: String,
    #[serde(rename = "@Value", default)]
    value: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct PrimitivesXml {
    #[serde(rename = "$value", default)]
    items: Vec<PrimitiveElement>,
}

/// Union of the attributes and children of every primitive element.
#[derive(Debug, Default, Deserialize, Serialize)]
struct PrimitiveXml {
    #[serde(rename = "@ID", default, skip_serializing_if = "Option::is_none")]
    id: Option<u32>,
    #[serde(rename = "@Priority", default)]
    priority: i32,
    #[serde(rename = "@CoordSystem", default, skip_serializing_if = "Option::is_none")]
    coord_system: Option<i32>,
    #[serde(rename = "@X", default, skip_serializing_if = "Option::is_none")]
    x: Option<String>,
    #[serde(rename = "@Y", default, skip_serializing_if = "Option::is_none")]
    y: Option<String>,
    #[serde(rename = "@Z", default, skip_serializing_if = "Option::is_none")]
    z: Option<String>,
    #[serde(rename = "@Radius", default, skip_serializing_if = "Option::is_none")]
    radius: Option<String>,
    #[serde(rename = "@ShellWidth", default, skip_serializing_if = "Option::is_none")]
    shell_width: Option<String>,
    #[serde(rename = "@WireRadius", default, skip_serializing_if = "Option::is_none")]
    wire_radius: Option<String>,
    #[serde(rename = "@Elevation", default, skip_serializing_if = "Option::is_none")]
    elevation: Option<String>,
    #[serde(rename = "@NormDir", default, skip_serializing_if = "Option::is_none")]
    norm_dir: Option<usize>,
    #[serde(rename = "@QtyVertices", default, skip_serializing_if = "Option::is_none")]
    qty_vertices: Option<usize>,
    #[serde(rename = "@Length", default, skip_serializing_if = "Option::is_none")]
    length: Option<String>,
    #[serde(rename = "@RotAxisDir", default, skip_serializing_if = "Option::is_none")]
    rot_axis: Option<usize>,
    #[serde(rename = "@QtyBox", default, skip_serializing_if = "Option::is_none")]
    qty_box: Option<usize>,
    #[serde(rename = "P1", default, skip_serializing_if = "Option::is_none")]
    p1: Option<CoordXml>,
    #[serde(rename = "P2", default, skip_serializing_if = "Option::is_none")]
    p2: Option<CoordXml>,
    #[serde(rename = "Center", default, skip_serializing_if = "Option::is_none")]
    center: Option<CoordXml>,
    #[serde(rename = "StartP", default, skip_serializing_if = "Vec::is_empty")]
    start_p: Vec<CoordXml>,
    #[serde(rename = "EndP", default, skip_serializing_if = "Vec::is_empty")]
    end_p: Vec<CoordXml>,
    #[serde(rename = "Vertex", default, skip_serializing_if = "Vec::is_empty")]
    vertices: Vec<VertexXml>,
    #[serde(rename = "Angles", default, skip_serializing_if = "Option::is_none")]
    angles: Option<AnglesXml>,
    #[serde(rename = "CoordShift", default, skip_serializing_if = "Option::is_none")]
    coord_shift: Option<CoordXml>,
    #[serde(rename = "Function", default, skip_serializing_if = "Option::is_none")]
    function: Option<FunctionXml>,
    #[serde(rename = "Transformation", default, skip_serializing_if = "Option::is_none")]
    transformation: Option<TransformationXml>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct CoordXml {
    #[serde(rename = "@X", default, skip_serializing_if = "Option::is_none")]
    x: Option<String>,
    #[serde(rename = "@Y", default, skip_serializing_if = "Option::is_none")]
    y: Option<String>,
    #[serde(rename = "@Z", default, skip_serializing_if = "Option::is_none")]
    z: Option<String>,
}

impl CoordXml {
    fn from_coord(coord: &ParameterCoord) -> Self {
        let component = |index| coord.component(index).map(write_term);
        Self {
            x: component(0),
            y: component(1),
            z: component(2),
        }
    }

    fn from_scalars([x, y, z]: [&ParameterScalar; 3]) -> Self {
        Self {
            x: Some(write_term(x)),
            y: Some(write_term(y)),
            z: Some(write_term(z)),
        }
    }
}

/// Polygon vertices use `X1`/`X2`, curve vertices `X`/`Y`/`Z`.
#[derive(Debug, Default, Deserialize, Serialize)]
struct VertexXml {
    #[serde(rename = "@X1", default, skip_serializing_if = "Option::is_none")]
    x1: Option<String>,
    #[serde(rename = "@X2", default, skip_serializing_if = "Option::is_none")]
    x2: Option<String>,
    #[serde(rename = "@X", default, skip_serializing_if = "Option::is_none")]
    x: Option<String>,
    #[serde(rename = "@Y", default, skip_serializing_if = "Option::is_none")]
    y: Option<String>,
    #[serde(rename = "@Z", default, skip_serializing_if = "Option::is_none")]
    z: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct AnglesXml {
    #[serde(rename = "@Start", default, skip_serializing_if = "Option::is_none")]
    start: Option<String>,
    #[serde(rename = "@Stop", default, skip_serializing_if = "Option::is_none")]
    stop: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct FunctionXml {
    #[serde(rename = "$text", default)]
    text: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct TransformationXml {
    #[serde(rename = "$value", default)]
    ops: Vec<TransformOpXml>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ArgumentXml {
    #[serde(rename = "@Argument", default)]
    argument: String,
}

/// Element-name dispatch: each variant is one element name.
macro_rules! element_enum {
    ($name:ident, $body:ty, $key:ty, { $($variant:ident $(= $rename:literal)? => $value:expr),* $(,)? }) => {
        #[derive(Debug, Deserialize, Serialize)]
        enum $name {
            $(
                $(#[serde(rename = $rename)])?
                $variant($body),
            )*
        }

        impl $name {
            fn parts_ref(&self) -> ($key, &$body) {
                match self {
                    $(Self::$variant(body) => ($value, body),)*
                }
            }
        }
    };
}

element_enum!(TransformOpXml, ArgumentXml, TransformKind, {
    Scale => TransformKind::Scale,
    Scale3 => TransformKind::Scale3,
    Translate => TransformKind::Translate,
    RotateOrigin = "Rotate_Origin" => TransformKind::RotateOrigin,
    RotateX = "Rotate_X" => TransformKind::RotateX,
    RotateY = "Rotate_Y" => TransformKind::RotateY,
    RotateZ = "Rotate_Z" => TransformKind::RotateZ,
    Matrix => TransformKind::Matrix,
});

impl TransformOpXml {
    fn new(kind: TransformKind, argument: String) -> Self {
        let body = ArgumentXml { argument };
        match kind {
            TransformKind::Scale => Self::Scale(body),
            TransformKind::Scale3 => Self::Scale3(body),
            TransformKind::Translate => Self::Translate(body),
            TransformKind::RotateOrigin => Self::RotateOrigin(body),
            TransformKind::RotateX => Self::RotateX(body),
            TransformKind::RotateY => Self::RotateY(body),
            TransformKind::RotateZ => Self::RotateZ(body),
            TransformKind::Matrix => Self::Matrix(body),
        }
    }

    fn parts(&self) -> (TransformKind, &str) {
        let (kind, body) = self.parts_ref();
        (kind, body.argument.as_str())
    }
}

element_enum!(PropertyElement, PropertyXml, PropertyKind, {
    Unknown => PropertyKind::Unknown,
    Material => PropertyKind::Material,
    DiscMaterial => PropertyKind::DiscMaterial,
    LorentzMaterial => PropertyKind::LorentzMaterial,
    DebyeMaterial => PropertyKind::DebyeMaterial,
    LumpedElement => PropertyKind::LumpedElement,
    Metal => PropertyKind::Metal,
    ConductingSheet => PropertyKind::ConductingSheet,
    Excitation => PropertyKind::Excitation,
    ProbeBox => PropertyKind::ProbeBox,
    ChargeBox => PropertyKind::ProbeBox,
    ResBox => PropertyKind::ResBox,
    DumpBox => PropertyKind::DumpBox,
    AbsorbingBc = "AbsorbingBC" => PropertyKind::AbsorbingBc,
});

impl PropertyElement {
    fn new(kind: PropertyKind, body: PropertyXml) -> Self {
        match kind {
            PropertyKind::Unknown => Self::Unknown(body),
            PropertyKind::Material => Self::Material(body),
            PropertyKind::DiscMaterial => Self::DiscMaterial(body),
            PropertyKind::LorentzMaterial => Self::LorentzMaterial(body),
            PropertyKind::DebyeMaterial => Self::DebyeMaterial(body),
            PropertyKind::LumpedElement => Self::LumpedElement(body),
            PropertyKind::Metal => Self::Metal(body),
            PropertyKind::ConductingSheet => Self::ConductingSheet(body),
            PropertyKind::Excitation => Self::Excitation(body),
            PropertyKind::ProbeBox => Self::ProbeBox(body),
            PropertyKind::ResBox => Self::ResBox(body),
            PropertyKind::DumpBox => Self::DumpBox(body),
            PropertyKind::AbsorbingBc => Self::AbsorbingBc(body),
        }
    }

    fn into_parts(self) -> (PropertyKind, PropertyXml) {
        let (kind, _) = self.parts_ref();
        let body = match self {
            Self::Unknown(body)
            | Self::Material(body)
            | Self::DiscMaterial(body)
            | Self::LorentzMaterial(body)
            | Self::DebyeMaterial(body)
            | Self::LumpedElement(body)
            | Self::Metal(body)
            | Self::ConductingSheet(body)
            | Self::Excitation(body)
            | Self::ProbeBox(body)
            | Self::ChargeBox(body)
            | Self::ResBox(body)
            | Self::DumpBox(body)
            | Self::AbsorbingBc(body) => body,
        };
        (kind, body)
    }
}

element_enum!(PrimitiveElement, PrimitiveXml, Result<PrimitiveType, &'static str>, {
    Point => Ok(PrimitiveType::Point),
    Box => Ok(PrimitiveType::Box),
    MultiBox => Ok(PrimitiveType::MultiBox),
    Sphere => Ok(PrimitiveType::Sphere),
    SphericalShell => Ok(PrimitiveType::SphericalShell),
    Cylinder => Ok(PrimitiveType::Cylinder),
    CylindricalShell => Ok(PrimitiveType::CylindricalShell),
    Polygon => Ok(PrimitiveType::Polygon),
    LinPoly => Ok(PrimitiveType::LinPoly),
    RotPoly => Ok(PrimitiveType::RotPoly),
    Curve => Ok(PrimitiveType::Curve),
    Wire => Ok(PrimitiveType::Wire),
    UserDefined => Ok(PrimitiveType::UserDefined),
    Polyhedron => Err("Polyhedron"),
    PolyhedronReader => Err("PolyhedronReader"),
});

impl PrimitiveElement {
    fn new(kind: PrimitiveType, body: PrimitiveXml) -> Self {
        match kind {
            PrimitiveType::Point => Self::Point(body),
            PrimitiveType::Box => Self::Box(body),
            PrimitiveType::MultiBox => Self::MultiBox(body),
            PrimitiveType::Sphere => Self::Sphere(body),
            PrimitiveType::SphericalShell => Self::SphericalShell(body),
            PrimitiveType::Cylinder => Self::Cylinder(body),
            PrimitiveType::CylindricalShell => Self::CylindricalShell(body),
            PrimitiveType::Polygon => Self::Polygon(body),
            PrimitiveType::LinPoly => Self::LinPoly(body),
            PrimitiveType::RotPoly => Self::RotPoly(body),
            PrimitiveType::Curve => Self::Curve(body),
            PrimitiveType::Wire => Self::Wire(body),
            PrimitiveType::UserDefined => Self::UserDefined(body),
        }
    }

    fn into_parts(self) -> (Result<PrimitiveType, &'static str>, PrimitiveXml) {
        let (kind, _) = self.parts_ref();
        let body = match self {
            Self::Point(body)
            | Self::Box(body)
            | Self::MultiBox(body)
            | Self::Sphere(body)
            | Self::SphericalShell(body)
            | Self::Cylinder(body)
            | Self::CylindricalShell(body)
            | Self::Polygon(body)
            | Self::LinPoly(body)
            | Self::RotPoly(body)
            | Self::Curve(body)
            | Self::Wire(body)
            | Self::UserDefined(body)
            | Self::Polyhedron(body)
            | Self::PolyhedronReader(body) => body,
        };
        (kind, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::PropertyType;

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<ContinuousStructure CoordSystem="0">
  <RectilinearGrid DeltaUnit="0.001" CoordSystem="0">
    <XLines Qty="3">0,5,10</XLines>
    <YLines Qty="2">10, 0</YLines>
    <ZLines Qty="2">0,10</ZLines>
  </RectilinearGrid>
  <ParameterSet>
    <Parameter Type="Const" name="r" value="3" Sweep="1"/>
    <Parameter Type="Linear" name="h" value="4" min="0" max="10" step="2" Sweep="0"/>
    <Parameter Type="Bogus" name="q" value="1"/>
  </ParameterSet>
  <Properties>
    <Metal ID="0" Name="body">
      <Attributes>
        <Attribute Name="tag" Value="outer"/>
      </Attributes>
      <Primitives>
        <Box Priority="1">
          <P1 X="0" Y="0" Z="0"/>
          <P2 X="10" Y="10" Z="10"/>
        </Box>
        <Sphere Priority="2" Radius="term:r">
          <Center X="5" Y="5" Z="term:h+1"/>
        </Sphere>
        <Cylinder Priority="3" Radius="1">
          <P1 X="0" Y="0" Z="0"/>
        </Cylinder>
        <Polyhedron Priority="0"/>
      </Primitives>
    </Metal>
    <ChargeBox Name="probe">
      <Primitives>
        <Point X="1" Y="2" Z="3">
          <Transformation>
            <Translate Argument="1,1,1"/>
          </Transformation>
        </Point>
      </Primitives>
    </ChargeBox>
    <Excitation Name="empty"/>
  </Properties>
</ContinuousStructure>
"#;

    #[test]
    fn reads_grid_parameters_and_properties() {
        let (scene, log) = read_str(DOCUMENT).expect("document");
        assert_eq!(scene.grid().lines(1), &[0.0, 10.0]);
        assert!((scene.grid().delta_unit() - 0.001).abs() < 1e-12);
        assert_eq!(scene.params().len(), 2);
        assert!(!scene.params().find("h").expect("h").sweep());

        assert_eq!(scene.property_count(), 3);
        assert_eq!(scene.property(1).expect("probe").kind(), PropertyKind::ProbeBox);
        assert_eq!(scene.property(0).expect("body").attribute("tag"), Some("outer"));
        assert_eq!(scene.property(0).expect("body").primitive_count(), 2);

        let messages = log.messages();
        assert!(messages.iter().any(|m| m == "Warning: Invalid parameter \"q\" skipped!"));
        assert_eq!(
            messages
                .iter()
                .filter(|m| *m == "Warning: Invalid primitive found in property: body!")
                .count(),
            2
        );
        assert!(messages.iter().any(|m| m == "Warning: No primitives found in property: empty!"));
    }

    #[test]
    fn read_scene_classifies_like_the_source() {
        let (scene, _) = read_str(DOCUMENT).expect("document");
        let at = |p: [f64; 3]| scene.property_by_coord_priority(p, PropertyType::ANY).map(|hit| hit.priority);
        assert_eq!(at([5.0, 5.0, 5.0]), Some(2));
        assert_eq!(at([5.0, 5.0, 1.0]), Some(1));
        assert_eq!(at([20.0, 20.0, 20.0]), None);
    }

    #[test]
    fn formulas_round_trip_verbatim() {
        let (scene, _) = read_str(DOCUMENT).expect("document");
        let written = write_string(&scene).expect("write");
        assert!(written.contains("Radius=\"term:r\""));
        assert!(written.contains("Z=\"term:h+1\""));
        assert!(written.contains("<Translate Argument=\"1,1,1\"/>"));

        let (again, log) = read_str(&written).expect("reread");
        assert!(log.is_empty(), "{log}");
        assert_eq!(again.primitive_count(), scene.primitive_count());
        for p in [[5.0, 5.0, 5.0], [1.0, 1.0, 1.0], [5.0, 5.0, 8.9], [20.0, 0.0, 0.0]] {
            assert_eq!(
                again.property_by_coord_priority(p, PropertyType::ANY),
                scene.property_by_coord_priority(p, PropertyType::ANY)
            );
        }
        let point = again.primitives_by_type(PrimitiveType::Point)[0];
        assert!(point.transform().expect("transform").has_transform());
    }

    #[test]
    fn every_shape_survives_a_round_trip() {
        let mut scene = Scene::new();
        scene.params_mut().link_parameter(Parameter::constant("w", 0.5));
        scene.grid_mut().add_disc_lines(0, &[0.0, 1.0]);
        let p = scene.add_property(Property::new(PropertyKind::Material, "all"));
        let mut multi = MultiBoxShape::new();
        multi.push_box([0.0; 3], [1.0; 3]);
        multi.push_box([2.0; 3], [3.0; 3]);
        let polygon = PolygonShape::new(2, 0.0).with_vertices(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
        let mut shell = SphericalShellShape::new([0.0; 3], 1.0, 0.0);
        shell.set_width("w").expect("width");
        let mut user = UserDefinedShape::new("r < 1", UserCoordSystem::Cylindrical);
        user.set_coord_shift(["1", "0", "w"]).expect("shift");
        let shapes: Vec<Shape> = vec![
            PointShape::new([1.0, 2.0, 3.0]).into(),
            multi.into(),
            shell.into(),
            CylindricalShellShape::new([0.0; 3], [0.0, 0.0, 1.0], 1.0, 0.2).into(),
            LinPolyShape::new(polygon.clone(), 2.0).into(),
            RotPolyShape::new(polygon.clone(), 0, 0.0, 3.0).into(),
            polygon.into(),
            WireShape::new(&[[0.0; 3], [1.0, 0.0, 0.0]], 0.1).into(),
            CurveShape::new(&[[0.0; 3], [0.0, 1.0, 0.0]]).into(),
            user.into(),
        ];
        for shape in shapes {
            scene.add_primitive(p, shape).expect("primitive");
        }
        assert!(scene.update().is_empty());

        let written = write_string(&scene).expect("write");
        let (again, log) = read_str(&written).expect("reread");
        assert!(log.is_empty(), "{log}");
        for original in scene.all_primitives(false, PropertyType::ANY) {
            let copy = again.primitive(original.id()).expect("same id");
            assert_eq!(copy.kind(), original.kind());
            assert_eq!(copy.bound_box(), original.bound_box());
        }
        let Shape::SphericalShell(shell) = again.primitives_by_type(PrimitiveType::SphericalShell)[0].shape() else {
            panic!("shell expected");
        };
        assert_eq!(shell.width.formula(), Some("w"));
        let Shape::UserDefined(user) = again.primitives_by_type(PrimitiveType::UserDefined)[0].shape() else {
            panic!("user-defined expected");
        };
        assert_eq!(user.coord_system(), UserCoordSystem::Cylindrical);
        assert_eq!(user.coord_shift()[2].formula(), Some("w"));
    }

    #[test]
    fn missing_grid_is_an_error() {
        let result = read_str("<ContinuousStructure><Properties/></ContinuousStructure>");
        assert!(matches!(result, Err(ParseError::MissingGrid)));
        let result = read_str(
            "<ContinuousStructure><RectilinearGrid><XLines>1,x</XLines></RectilinearGrid></ContinuousStructure>",
        );
        assert!(matches!(result, Err(ParseError::Number(_))));
    }
}
