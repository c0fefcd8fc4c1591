use crate::geom::{CoordSystem, Point3, transform_coord_system};

use super::{ParameterScalar, ParameterSet, ScalarError};

/// Three parameter scalars interpreted in a coordinate system.
///
/// Cartesian and cylindrical forms are recomputed whenever a component changes or
/// the coordinate is evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterCoord {
    components: [ParameterScalar; 3],
    system: CoordSystem,
    cartesian: [f64; 3],
    cylindrical: [f64; 3],
}

impl ParameterCoord {
    #[must_use]
    pub fn new(values: [f64; 3]) -> Self {
        let mut coord = Self {
            components: values.map(ParameterScalar::new),
            system: CoordSystem::Undefined,
            cartesian: [0.0; 3],
            cylindrical: [0.0; 3],
        };
        coord.refresh();
        coord
    }

    /// Builds a coordinate from three numeric or formula strings.
    pub fn parse(values: [&str; 3]) -> Result<Self, ScalarError> {
        let mut coord = Self::new([0.0; 3]);
        for (index, value) in values.iter().enumerate() {
            coord.components[index].set_value_str(value)?;
        }
        coord.refresh();
        Ok(coord)
    }

    #[must_use]
    pub const fn coord_system(&self) -> CoordSystem {
        self.system
    }

    /// Uses `system`, or `fallback` when `system` is undefined.
    pub fn set_coord_system(&mut self, system: CoordSystem, fallback: CoordSystem) {
        self.system = system.or(fallback);
        self.refresh();
    }

    #[must_use]
    pub fn component(&self, index: usize) -> Option<&ParameterScalar> {
        self.components.get(index)
    }

    pub fn set_value(&mut self, index: usize, value: f64) {
        if let Some(component) = self.components.get_mut(index) {
            component.set_value(value);
            self.refresh();
        }
    }

    pub fn set_value_str(&mut self, index: usize, value: &str) -> Result<(), ScalarError> {
        if let Some(component) = self.components.get_mut(index) {
            component.set_value_str(value)?;
            self.refresh();
        }
        Ok(())
    }

    /// Raw component values in the coordinate's own system.
    #[must_use]
    pub fn values(&self) -> [f64; 3] {
        [
            self.components[0].value(),
            self.components[1].value(),
            self.components[2].value(),
        ]
    }

    #[must_use]
    pub const fn cartesian(&self) -> [f64; 3] {
        self.cartesian
    }

    #[must_use]
    pub const fn cylindrical(&self) -> [f64; 3] {
        self.cylindrical
    }

    #[must_use]
    pub fn to_point(&self) -> Point3 {
        Point3::from_array(self.cartesian)
    }

    /// The coordinate expressed in `system`; an undefined system yields the native form.
    #[must_use]
    pub fn coords_in(&self, system: CoordSystem) -> [f64; 3] {
        match system {
            CoordSystem::Cartesian => self.cartesian,
            CoordSystem::Cylindrical => self.cylindrical,
            CoordSystem::Undefined => self.native(),
        }
    }

    #[must_use]
    pub fn native(&self) -> [f64; 3] {
        match self.system {
            CoordSystem::Cylindrical => self.cylindrical,
            _ => self.cartesian,
        }
    }

    /// Evaluates all three components, appending one message per failing component.
    pub fn evaluate(&mut self, params: &ParameterSet, errors: &mut Vec<String>) -> bool {
        let mut ok = true;
        for (index, component) in self.components.iter_mut().enumerate() {
            if let Err(error) = component.evaluate(params) {
                ok = false;
                errors.push(format!("Error in ParameterCoord (component: {index}): {error}"));
            }
        }
        self.refresh();
        ok
    }

    fn refresh(&mut self) {
        let values = self.values();
        self.cartesian = transform_coord_system(values, self.system, CoordSystem::Cartesian);
        self.cylindrical = transform_coord_system(values, self.system, CoordSystem::Cylindrical);
    }
}

impl Default for ParameterCoord {
    fn default() -> Self {
        Self::new([0.0; 3])
    }
}

impl From<[f64; 3]> for ParameterCoord {
    fn from(values: [f64; 3]) -> Self {
        Self::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameter;

    #[test]
    fn cylindrical_coordinate_converts() {
        let mut coord = ParameterCoord::new([2.0, std::f64::consts::FRAC_PI_2, 1.0]);
        coord.set_coord_system(CoordSystem::Cylindrical, CoordSystem::Cartesian);
        let cart = coord.cartesian();
        assert!(cart[0].abs() < 1e-12);
        assert!((cart[1] - 2.0).abs() < 1e-12);
        assert!((cart[2] - 1.0).abs() < 1e-12);
        assert_eq!(coord.native(), coord.cylindrical());
    }

    #[test]
    fn undefined_system_uses_fallback() {
        let mut coord = ParameterCoord::new([1.0, 0.0, 0.0]);
        coord.set_coord_system(CoordSystem::Undefined, CoordSystem::Cylindrical);
        assert_eq!(coord.coord_system(), CoordSystem::Cylindrical);
    }

    #[test]
    fn evaluation_reports_failing_components() {
        let mut set = ParameterSet::new();
        set.link_parameter(Parameter::constant("r", 3.0));
        let mut coord = ParameterCoord::parse(["r", "2*r", "q"]).expect("coord");
        let mut errors = Vec::new();
        assert!(!coord.evaluate(&set, &mut errors));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Error in ParameterCoord (component: 2)"));
        assert_eq!(coord.cartesian()[..2], [3.0, 6.0]);
    }
}
