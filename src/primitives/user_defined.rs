use std::f64::consts::FRAC_PI_2;

use crate::expr::FunctionParser;
use crate::geom::{BBox, CoordSystem};
use crate::params::{ParameterScalar, ParameterSet};

use super::{
    PrimitiveError, PrimitiveType, ShapeBounds, ShapeContext, ShapeGeometry, check_scalar,
    parse_scalar,
};

/// Variables a user-defined function sees besides the parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserCoordSystem {
    /// `x, y, z`
    #[default]
    Cartesian,
    /// `x, y, z, r, a`
    Cylindrical,
    /// `x, y, z, r, a, t`
    Spherical,
}

impl UserCoordSystem {
    #[must_use]
    pub const fn variables(self) -> &'static [&'static str] {
        match self {
            Self::Cartesian => &["x", "y", "z"],
            Self::Cylindrical => &["x", "y", "z", "r", "a"],
            Self::Spherical => &["x", "y", "z", "r", "a", "t"],
        }
    }

    #[must_use]
    pub const fn as_index(self) -> i32 {
        match self {
            Self::Cartesian => 0,
            Self::Cylindrical => 1,
            Self::Spherical => 2,
        }
    }

    #[must_use]
    pub const fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(Self::Cartesian),
            1 => Some(Self::Cylindrical),
            2 => Some(Self::Spherical),
            _ => None,
        }
    }
}

/// Implicit shape: a coordinate is inside where the function evaluates to exactly 1.
///
/// The function may reference every parameter of the set. Parameter values are
/// taken at update time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserDefinedShape {
    function: String,
    system: UserCoordSystem,
    shift: [ParameterScalar; 3],
    parser: Option<FunctionParser>,
    param_values: Vec<f64>,
}

impl UserDefinedShape {
    #[must_use]
    pub fn new(function: impl Into<String>, system: UserCoordSystem) -> Self {
        Self {
            function: function.into(),
            system,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Replaces the function; it is parsed on the next update.
    pub fn set_function(&mut self, function: impl Into<String>) {
        self.function = function.into();
        self.parser = None;
    }

    #[must_use]
    pub const fn coord_system(&self) -> UserCoordSystem {
        self.system
    }

    pub fn set_coord_system(&mut self, system: UserCoordSystem) {
        self.system = system;
        self.parser = None;
    }

    #[must_use]
    pub const fn coord_shift(&self) -> &[ParameterScalar; 3] {
        &self.shift
    }

    /// Origin of the function's coordinates, given as numbers or formulas.
    pub fn set_coord_shift(&mut self, shift: [&str; 3]) -> Result<(), PrimitiveError> {
        for (slot, value) in self.shift.iter_mut().zip(shift) {
            *slot = parse_scalar(value, "coordinate shift")?;
        }
        Ok(())
    }

    fn arguments(&self, x: f64, y: f64, z: f64) -> Vec<f64> {
        let mut values = Vec::with_capacity(self.param_values.len() + 6);
        values.extend_from_slice(&self.param_values);
        values.extend([x, y, z]);
        let rxy = x.hypot(y);
        match self.system {
            UserCoordSystem::Cartesian => {}
            UserCoordSystem::Cylindrical => values.extend([rxy, y.atan2(x)]),
            UserCoordSystem::Spherical => {
                let r = (x * x + y * y + z * z).sqrt();
                values.extend([r, y.atan2(x), FRAC_PI_2 - (z / rxy).atan()]);
            }
        }
        values
    }
}

impl ShapeGeometry for UserDefinedShape {
    fn kind(&self) -> PrimitiveType {
        PrimitiveType::UserDefined
    }

    fn update(&mut self, params: &ParameterSet, ctx: &ShapeContext<'_>, errors: &mut Vec<String>) -> bool {
        let mut names = params.names();
        names.extend_from_slice(self.system.variables());
        let mut ok = true;
        match FunctionParser::parse(&self.function, &names) {
            Ok(parser) => self.parser = Some(parser),
            Err(error) => {
                ok = false;
                self.parser = None;
                errors.push(format!(
                    "Error in User Defined Primitive Function (ID: {}): {error}",
                    ctx.id
                ));
            }
        }
        self.param_values = params.values();
        for scalar in &mut self.shift {
            ok &= check_scalar(scalar, params, "User Defined Primitive Coord", ctx, errors);
        }
        ok
    }

    fn bounds(&self, _ctx: &ShapeContext<'_>) -> ShapeBounds {
        ShapeBounds {
            bbox: BBox::unbounded(),
            accurate: false,
            system: CoordSystem::Cartesian,
            dimension: 3,
        }
    }

    #[allow(clippy::float_cmp)]
    fn is_inside(&self, coord: [f64; 3], ctx: &ShapeContext<'_>, _tol: f64) -> bool {
        let Some(parser) = &self.parser else {
            return false;
        };
        let p = ctx.local_cartesian(coord);
        let x = p.x - self.shift[0].value();
        let y = p.y - self.shift[1].value();
        let z = p.z - self.shift[2].value();
        parser.eval(&self.arguments(x, y, z)).value == 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameter;
    use crate::primitives::{Primitive, PrimitiveId};

    #[test]
    fn cartesian_function_selects_a_ball() {
        let mut params = ParameterSet::new();
        params.link_parameter(Parameter::constant("R", 2.0));
        let mut prim = Primitive::new(
            PrimitiveId(1),
            UserDefinedShape::new("x^2+y^2+z^2 < R^2", UserCoordSystem::Cartesian),
        );
        assert!(prim.update(&params, &mut Vec::new()));
        assert!(prim.is_inside([1.0, 1.0, 0.0], 0.0));
        assert!(!prim.is_inside([2.0, 1.0, 0.0], 0.0));
        assert!(!prim.is_bound_box_accurate());
    }

    #[test]
    fn cylindrical_variables_and_shift() {
        let mut shape = UserDefinedShape::new("(r < 1) && (a > 0)", UserCoordSystem::Cylindrical);
        shape.set_coord_shift(["5", "0", "0"]).expect("shift");
        let mut prim = Primitive::new(PrimitiveId(2), shape);
        assert!(prim.update(&ParameterSet::new(), &mut Vec::new()));
        assert!(prim.is_inside([5.5, 0.5, 0.0], 0.0));
        assert!(!prim.is_inside([5.5, -0.5, 0.0], 0.0));
        assert!(!prim.is_inside([0.5, 0.5, 0.0], 0.0));
    }

    #[test]
    fn spherical_polar_angle_is_measured_from_z() {
        let shape = UserDefinedShape::new("t < 0.5", UserCoordSystem::Spherical);
        let mut prim = Primitive::new(PrimitiveId(3), shape);
        assert!(prim.update(&ParameterSet::new(), &mut Vec::new()));
        assert!(prim.is_inside([0.1, 0.0, 1.0], 0.0));
        assert!(!prim.is_inside([1.0, 0.0, 0.1], 0.0));
    }

    #[test]
    fn parse_errors_are_reported() {
        let mut prim = Primitive::new(
            PrimitiveId(4),
            UserDefinedShape::new("x < q", UserCoordSystem::Cartesian),
        );
        let mut errors = Vec::new();
        assert!(!prim.update(&ParameterSet::new(), &mut errors));
        assert!(errors[0].starts_with("Error in User Defined Primitive Function (ID: 4)"));
        assert!(!prim.is_inside([0.0, 0.0, 0.0], 0.0));
    }
}
