//! Planar polygons and the two solids built from them.
//!
//! Vertices are `(u, v)` pairs on the two axes following the normal axis, i.e.
//! `u` on `(normal + 1) % 3` and `v` on `(normal + 2) % 3`.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::geom::{BBox, CoordSystem, Point3, Vec3, point_line_distance};
use crate::params::{ParameterScalar, ParameterSet};

use super::{
    PrimitiveError, PrimitiveType, ShapeBounds, ShapeContext, ShapeGeometry, check_scalar,
    parse_scalar,
};

const NON_CARTESIAN_WARNING: &str =
    "Warning: Polygon can not be defined in non Cartesian coordinate systems! Result may be unexpected...";

/// Winding number test of `(u, v)` against a closed vertex loop.
///
/// Points exactly on an axis-parallel edge count as inside.
#[allow(clippy::float_cmp)]
fn winding_inside(vertices: &[(f64, f64)], u: f64, v: f64) -> bool {
    let Some(&(mut u1, mut v1)) = vertices.last() else {
        return false;
    };
    let mut start_over = v1 >= v;
    let mut winding = 0_i32;

    for &(u2, v2) in vertices {
        if u2 == u1 && u1 == u && ((v < v1 && v > v2) || (v > v1 && v < v2)) {
            return true;
        }
        if v2 == v1 && v1 == v && ((u < u1 && u > u2) || (u > u1 && u < u2)) {
            return true;
        }

        let end_over = v2 >= v;
        if start_over != end_over {
            if (v2 - v) * (u2 - u1) <= (v2 - v1) * (u2 - u) {
                if end_over {
                    winding += 1;
                }
            } else if !end_over {
                winding -= 1;
            }
        }
        start_over = end_over;
        u1 = u2;
        v1 = v2;
    }
    winding != 0
}

/// Planar polygon at `elevation` along the `normal` axis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonShape {
    vertices: Vec<[ParameterScalar; 2]>,
    pub elevation: ParameterScalar,
    normal: usize,
}

impl PolygonShape {
    #[must_use]
    pub fn new(normal: usize, elevation: f64) -> Self {
        Self {
            vertices: Vec::new(),
            elevation: ParameterScalar::new(elevation),
            normal: normal % 3,
        }
    }

    #[must_use]
    pub fn with_vertices(mut self, vertices: &[[f64; 2]]) -> Self {
        for &[u, v] in vertices {
            self.add_vertex(u, v);
        }
        self
    }

    pub fn add_vertex(&mut self, u: f64, v: f64) {
        self.vertices.push([ParameterScalar::new(u), ParameterScalar::new(v)]);
    }

    /// Appends a vertex given as numbers or formulas.
    pub fn add_vertex_str(&mut self, u: &str, v: &str) -> Result<(), PrimitiveError> {
        let u = parse_scalar(u, "vertex")?;
        let v = parse_scalar(v, "vertex")?;
        self.vertices.push([u, v]);
        Ok(())
    }

    pub fn clear_vertices(&mut self) {
        self.vertices.clear();
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn vertices(&self) -> &[[ParameterScalar; 2]] {
        &self.vertices
    }

    #[must_use]
    pub const fn normal_dir(&self) -> usize {
        self.normal
    }

    pub fn set_normal_dir(&mut self, normal: usize) -> Result<(), PrimitiveError> {
        if normal > 2 {
            return Err(PrimitiveError::IndexOutOfRange {
                kind: PrimitiveType::Polygon,
                index: normal,
            });
        }
        self.normal = normal;
        Ok(())
    }

    pub fn set_elevation(&mut self, value: &str) -> Result<(), PrimitiveError> {
        self.elevation = parse_scalar(value, "elevation")?;
        Ok(())
    }

    /// In-plane axes `(u, v)`.
    const fn plane_axes(&self) -> (usize, usize) {
        ((self.normal + 1) % 3, (self.normal + 2) % 3)
    }

    fn points(&self) -> Vec<(f64, f64)> {
        self.vertices.iter().map(|[u, v]| (u.value(), v.value())).collect()
    }

    /// Flat box of the vertex loop at the elevation.
    fn planar_box(&self) -> BBox {
        let (pu, pv) = self.plane_axes();
        let mut bbox = BBox::default();
        let mut points = self.points().into_iter();
        let Some((u0, v0)) = points.next() else {
            return bbox;
        };
        let (mut umin, mut umax, mut vmin, mut vmax) = (u0, u0, v0, v0);
        for (u, v) in points {
            umin = umin.min(u);
            umax = umax.max(u);
            vmin = vmin.min(v);
            vmax = vmax.max(v);
        }
        let elevation = self.elevation.value();
        bbox.set_axis(self.normal, elevation, elevation);
        bbox.set_axis(pu, umin, umax);
        bbox.set_axis(pv, vmin, vmax);
        bbox
    }

    /// Box precheck followed by the winding test. The normal axis gets `tol` of slack.
    fn contains(&self, p: [f64; 3], bbox: &BBox, tol: f64) -> bool {
        if self.vertices.is_empty() {
            return false;
        }
        let outside_box = (0..3).any(|axis| {
            let (lo, hi) = bbox.axis(axis);
            let slack = if axis == self.normal { tol } else { 0.0 };
            p[axis] < lo - slack || p[axis] > hi + slack
        });
        if outside_box {
            return false;
        }
        let (pu, pv) = self.plane_axes();
        winding_inside(&self.points(), p[pu], p[pv])
    }

    fn update_planar(&mut self, params: &ParameterSet, ctx: &ShapeContext<'_>, errors: &mut Vec<String>) -> bool {
        if ctx.primitive_system() != CoordSystem::Cartesian {
            log::warn!("primitive {}: {NON_CARTESIAN_WARNING}", ctx.id);
            errors.push(NON_CARTESIAN_WARNING.to_owned());
        }
        let mut ok = true;
        for scalar in self.vertices.iter_mut().flatten() {
            ok &= check_scalar(scalar, params, "Polygon", ctx, errors);
        }
        ok &= check_scalar(&mut self.elevation, params, "Polygon Elevation", ctx, errors);
        ok
    }
}

impl ShapeGeometry for PolygonShape {
    fn kind(&self) -> PrimitiveType {
        PrimitiveType::Polygon
    }

    fn update(&mut self, params: &ParameterSet, ctx: &ShapeContext<'_>, errors: &mut Vec<String>) -> bool {
        self.update_planar(params, ctx, errors)
    }

    fn bounds(&self, _ctx: &ShapeContext<'_>) -> ShapeBounds {
        let bbox = self.planar_box();
        ShapeBounds {
            bbox,
            accurate: true,
            system: CoordSystem::Cartesian,
            dimension: bbox.dimension(),
        }
    }

    fn is_inside(&self, coord: [f64; 3], ctx: &ShapeContext<'_>, tol: f64) -> bool {
        let p = ctx.local_cartesian(coord);
        self.contains(p.to_array(), &ctx.bound_box, tol)
    }
}

/// Polygon extruded along its normal from the elevation by `length`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinPolyShape {
    pub polygon: PolygonShape,
    pub length: ParameterScalar,
}

impl LinPolyShape {
    #[must_use]
    pub fn new(polygon: PolygonShape, length: f64) -> Self {
        Self {
            polygon,
            length: ParameterScalar::new(length),
        }
    }

    pub fn set_length(&mut self, value: &str) -> Result<(), PrimitiveError> {
        self.length = parse_scalar(value, "length")?;
        Ok(())
    }
}

impl ShapeGeometry for LinPolyShape {
    fn kind(&self) -> PrimitiveType {
        PrimitiveType::LinPoly
    }

    fn update(&mut self, params: &ParameterSet, ctx: &ShapeContext<'_>, errors: &mut Vec<String>) -> bool {
        let planar = self.polygon.update_planar(params, ctx, errors);
        let length = check_scalar(&mut self.length, params, "LinPoly Length", ctx, errors);
        planar && length
    }

    fn bounds(&self, _ctx: &ShapeContext<'_>) -> ShapeBounds {
        let mut bbox = self.polygon.planar_box();
        let elevation = self.polygon.elevation.value();
        let length = self.length.value();
        if length > 0.0 {
            bbox.set_axis(self.polygon.normal, elevation, elevation + length);
        } else {
            bbox.set_axis(self.polygon.normal, elevation + length, elevation);
        }
        ShapeBounds {
            bbox,
            accurate: true,
            system: CoordSystem::Cartesian,
            dimension: bbox.dimension(),
        }
    }

    fn is_inside(&self, coord: [f64; 3], ctx: &ShapeContext<'_>, tol: f64) -> bool {
        let p = ctx.local_cartesian(coord);
        self.polygon.contains(p.to_array(), &ctx.bound_box, tol)
    }
}

/// Polygon swept around a coordinate axis through the origin between two angles.
///
/// The polygon lies at elevation 0 and the rotation axis must be one of its
/// in-plane axes. Angles are measured from the in-plane radial axis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RotPolyShape {
    pub polygon: PolygonShape,
    rot_axis: usize,
    pub start_angle: ParameterScalar,
    pub stop_angle: ParameterScalar,
    angles: [f64; 2],
    planar: BBox,
}

impl RotPolyShape {
    #[must_use]
    pub fn new(polygon: PolygonShape, rot_axis: usize, start: f64, stop: f64) -> Self {
        let mut shape = Self {
            polygon,
            rot_axis: rot_axis % 3,
            start_angle: ParameterScalar::new(start),
            stop_angle: ParameterScalar::new(stop),
            angles: [0.0; 2],
            planar: BBox::default(),
        };
        shape.refresh();
        shape
    }

    #[must_use]
    pub const fn rot_axis(&self) -> usize {
        self.rot_axis
    }

    pub fn set_rot_axis(&mut self, axis: usize) -> Result<(), PrimitiveError> {
        if axis > 2 {
            return Err(PrimitiveError::IndexOutOfRange {
                kind: PrimitiveType::RotPoly,
                index: axis,
            });
        }
        self.rot_axis = axis;
        Ok(())
    }

    pub fn set_angles(&mut self, start: &str, stop: &str) -> Result<(), PrimitiveError> {
        self.start_angle = parse_scalar(start, "start angle")?;
        self.stop_angle = parse_scalar(stop, "stop angle")?;
        self.refresh();
        Ok(())
    }

    /// Normalised `[start, stop]` with `0 <= start < 2π` and `start <= stop`.
    #[must_use]
    pub const fn angle_range(&self) -> [f64; 2] {
        self.angles
    }

    fn refresh(&mut self) {
        let mut start = self.start_angle.value();
        let mut stop = self.stop_angle.value();
        if start > stop {
            stop += TAU;
        }
        if start > TAU {
            start -= TAU;
            stop -= TAU;
        }
        if start < 0.0 {
            start += TAU;
            stop += TAU;
        }
        self.angles = [start, stop];
        self.planar = self.polygon.planar_box();
    }

    /// Box of the full revolution around the rotation axis.
    fn revolution_box(&self) -> BBox {
        let (lo, hi) = self.planar.axis(self.rot_axis);
        let radial = 3 - self.rot_axis - self.polygon.normal;
        let (r0, r1) = self.planar.axis(radial);
        let reach = r0.abs().max(r1.abs());
        let mut bbox = BBox::default();
        for axis in 0..3 {
            if axis == self.rot_axis {
                bbox.set_axis(axis, lo, hi);
            } else {
                bbox.set_axis(axis, -reach, reach);
            }
        }
        bbox
    }

    fn section_point(&self, dist: f64, foot: f64) -> [f64; 3] {
        let mut p = [dist; 3];
        p[self.polygon.normal] = 0.0;
        p[self.rot_axis] = foot;
        p
    }
}

impl ShapeGeometry for RotPolyShape {
    fn kind(&self) -> PrimitiveType {
        PrimitiveType::RotPoly
    }

    #[allow(clippy::float_cmp)]
    fn update(&mut self, params: &ParameterSet, ctx: &ShapeContext<'_>, errors: &mut Vec<String>) -> bool {
        let mut ok = self.polygon.update_planar(params, ctx, errors);
        if self.polygon.elevation.value() != 0.0 {
            log::warn!("RotPoly {}: an elevation is not supported, using 0", ctx.id);
            self.polygon.elevation.set_value(0.0);
        }
        if self.rot_axis == self.polygon.normal {
            ok = false;
            errors.push(format!(
                "Error in RotPoly (ID: {}): rotation axis {} is the polygon normal",
                ctx.id, self.rot_axis
            ));
        }
        ok &= check_scalar(&mut self.start_angle, params, "RotPoly Start Angle", ctx, errors);
        ok &= check_scalar(&mut self.stop_angle, params, "RotPoly Stop Angle", ctx, errors);
        self.refresh();
        ok
    }

    fn bounds(&self, _ctx: &ShapeContext<'_>) -> ShapeBounds {
        let bbox = self.revolution_box();
        ShapeBounds {
            bbox,
            accurate: false,
            system: CoordSystem::Cartesian,
            dimension: bbox.dimension(),
        }
    }

    fn is_inside(&self, coord: [f64; 3], ctx: &ShapeContext<'_>, tol: f64) -> bool {
        if self.rot_axis == self.polygon.normal {
            return false;
        }
        let p = ctx.local_cartesian(coord);
        let c = p.to_array();
        let axis = Point3::ORIGIN + Vec3::axis(self.rot_axis);
        let line = point_line_distance(p, Point3::ORIGIN, axis);

        let ra_p = (self.rot_axis + 1) % 3;
        let ra_pp = (self.rot_axis + 2) % 3;
        let mut alpha = c[ra_pp].atan2(c[ra_p]);
        if ra_p == self.polygon.normal {
            alpha -= FRAC_PI_2;
        }
        if alpha < 0.0 {
            alpha += TAU;
        }
        let [start, stop] = self.angles;
        if alpha < start {
            alpha += TAU;
        }
        if alpha < stop
            && self
                .polygon
                .contains(self.section_point(line.distance, line.foot), &self.planar, tol)
        {
            return true;
        }

        alpha += PI;
        if alpha > TAU {
            alpha -= TAU;
        }
        if alpha < start {
            alpha += TAU;
        }
        if alpha > stop {
            return false;
        }
        self.polygon
            .contains(self.section_point(-line.distance, line.foot), &self.planar, tol)
    }
}
