//! Rectilinear mesh grid: three independent lists of disc lines.

use crate::expr::{EvalError, FunctionParser, SyntaxError};
use crate::geom::{BBox, CoordSystem};

const AXIS_VARIABLES: [&str; 3] = ["x", "y", "z"];

#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("unknown grid direction {0}")]
    Direction(usize),
    #[error("an error occurred parsing f({var}): {source}")]
    Parse {
        var: &'static str,
        #[source]
        source: SyntaxError,
    },
    #[error("an error occurred evaluating the grid function f({var}): {source}")]
    Eval {
        var: &'static str,
        #[source]
        source: EvalError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RectGrid {
    lines: [Vec<f64>; 3],
    delta_unit: f64,
    mesh_type: CoordSystem,
}

impl Default for RectGrid {
    fn default() -> Self {
        Self {
            lines: [Vec::new(), Vec::new(), Vec::new()],
            delta_unit: 1.0,
            mesh_type: CoordSystem::Cartesian,
        }
    }
}

impl RectGrid {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line; directions outside 0..3 are ignored.
    pub fn add_disc_line(&mut self, dir: usize, value: f64) {
        if let Some(lines) = self.lines.get_mut(dir) {
            lines.push(value);
        }
    }

    pub fn add_disc_lines(&mut self, dir: usize, values: &[f64]) {
        if let Some(lines) = self.lines.get_mut(dir) {
            lines.extend_from_slice(values);
        }
    }

    /// Appends `f(v)` for every value, where `f` is a formula in `x`, `y` or `z`.
    ///
    /// Lines whose evaluation fails are still added with the value the evaluator
    /// produced; the first failure is returned afterwards.
    pub fn add_disc_lines_fn(&mut self, dir: usize, values: &[f64], function: &str) -> Result<(), GridError> {
        let var = *AXIS_VARIABLES.get(dir).ok_or(GridError::Direction(dir))?;
        let parser = FunctionParser::parse(function, &[var]).map_err(|source| GridError::Parse { var, source })?;
        let mut failure = None;
        for &value in values {
            let eval = parser.eval(&[value]);
            if failure.is_none() {
                failure = eval.error;
            }
            self.lines[dir].push(eval.value);
        }
        match failure {
            Some(source) => Err(GridError::Eval { var, source }),
            None => Ok(()),
        }
    }

    pub fn remove_disc_line(&mut self, dir: usize, index: usize) -> bool {
        match self.lines.get_mut(dir) {
            Some(lines) if index < lines.len() => {
                lines.remove(index);
                true
            }
            _ => false,
        }
    }

    /// Removes the first line exactly equal to `value`.
    #[allow(clippy::float_cmp)]
    pub fn remove_disc_line_value(&mut self, dir: usize, value: f64) -> bool {
        let Some(index) = self.lines.get(dir).and_then(|lines| lines.iter().position(|&v| v == value)) else {
            return false;
        };
        self.remove_disc_line(dir, index)
    }

    /// Drops every line and resets the delta unit.
    pub fn clear(&mut self) {
        for lines in &mut self.lines {
            lines.clear();
        }
        self.delta_unit = 1.0;
    }

    pub fn clear_lines(&mut self, dir: usize) {
        if let Some(lines) = self.lines.get_mut(dir) {
            lines.clear();
        }
    }

    #[must_use]
    pub const fn delta_unit(&self) -> f64 {
        self.delta_unit
    }

    pub fn set_delta_unit(&mut self, delta_unit: f64) {
        self.delta_unit = delta_unit;
    }

    #[must_use]
    pub const fn mesh_type(&self) -> CoordSystem {
        self.mesh_type
    }

    pub fn set_mesh_type(&mut self, mesh_type: CoordSystem) {
        self.mesh_type = mesh_type;
    }

    pub fn set_line(&mut self, dir: usize, index: usize, value: f64) -> bool {
        match self.lines.get_mut(dir).and_then(|lines| lines.get_mut(index)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn line(&self, dir: usize, index: usize) -> Option<f64> {
        self.lines.get(dir)?.get(index).copied()
    }

    #[must_use]
    pub fn lines(&self, dir: usize) -> &[f64] {
        self.lines.get(dir).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn line_count(&self, dir: usize) -> usize {
        self.lines(dir).len()
    }

    #[must_use]
    pub fn lines_as_string(&self, dir: usize) -> String {
        self.lines(dir)
            .iter()
            .map(f64::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Sorts the lines of one direction and removes duplicates.
    pub fn sort(&mut self, dir: usize) {
        if let Some(lines) = self.lines.get_mut(dir) {
            lines.sort_by(f64::total_cmp);
            lines.dedup();
        }
    }

    pub fn sort_all(&mut self) {
        for dir in 0..3 {
            self.sort(dir);
        }
    }

    /// Inserts `factor - 1` evenly spaced lines between neighbours of `dir`.
    #[allow(clippy::cast_precision_loss)]
    pub fn increase_resolution(&mut self, dir: usize, factor: usize) {
        let Ok(dimension) = usize::try_from(self.dimension()) else {
            return;
        };
        if dir >= dimension || !(2..=9).contains(&factor) {
            return;
        }
        let existing = self.lines[dir].clone();
        for pair in existing.windows(2) {
            let delta = (pair[1] - pair[0]) / factor as f64;
            for n in 1..factor {
                self.lines[dir].push(pair[0] + n as f64 * delta);
            }
        }
        self.sort(dir);
    }

    /// Index of the line nearest to `value` and whether `value` lies within the grid.
    ///
    /// Values below the first or above the last line snap to that line and report
    /// `false`. `None` for an empty or unknown direction.
    #[must_use]
    pub fn snap_to_line_number(&self, dir: usize, value: f64) -> Option<(usize, bool)> {
        let lines = self.lines.get(dir)?;
        let (&first, &last) = (lines.first()?, lines.last()?);
        if value < first {
            return Some((0, false));
        }
        if value > last {
            return Some((lines.len() - 1, false));
        }
        let index = lines
            .windows(2)
            .position(|pair| value < 0.5 * (pair[0] + pair[1]))
            .unwrap_or(lines.len() - 1);
        Some((index, true))
    }

    /// Extent of the lines per axis; empty axes collapse to zero.
    #[must_use]
    pub fn sim_area(&self) -> BBox {
        let mut area = BBox::default();
        for (axis, lines) in self.lines.iter().enumerate() {
            let lower = lines.iter().copied().fold(f64::INFINITY, f64::min);
            let upper = lines.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if lines.is_empty() {
                area.set_axis(axis, 0.0, 0.0);
            } else {
                area.set_axis(axis, lower, upper);
            }
        }
        area
    }

    /// True when every direction has at least two lines.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lines.iter().all(|lines| lines.len() >= 2)
    }

    /// Number of directions with more than one line, or -1 if any direction is empty.
    #[must_use]
    pub fn dimension(&self) -> i32 {
        if self.lines.iter().any(Vec::is_empty) {
            return -1;
        }
        self.lines.iter().map(|lines| i32::from(lines.len() > 1)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> RectGrid {
        let mut grid = RectGrid::new();
        grid.add_disc_lines(0, &[0.0, 10.0, 5.0, 5.0]);
        grid.add_disc_lines(1, &[-1.0, 1.0]);
        grid.add_disc_line(2, 3.0);
        grid
    }

    #[test]
    fn sort_removes_duplicates() {
        let mut grid = grid();
        grid.sort(0);
        assert_eq!(grid.lines(0), &[0.0, 5.0, 10.0]);
        assert_eq!(grid.lines_as_string(0), "0, 5, 10");
    }

    #[test]
    fn snapping_reports_outside_values() {
        let mut grid = grid();
        grid.sort(0);
        assert_eq!(grid.snap_to_line_number(0, -3.0), Some((0, false)));
        assert_eq!(grid.snap_to_line_number(0, 11.0), Some((2, false)));
        assert_eq!(grid.snap_to_line_number(0, 2.4), Some((0, true)));
        assert_eq!(grid.snap_to_line_number(0, 2.6), Some((1, true)));
        assert_eq!(grid.snap_to_line_number(0, 10.0), Some((2, true)));
        assert_eq!(grid.snap_to_line_number(2, 3.0), Some((0, true)));
        assert_eq!(RectGrid::new().snap_to_line_number(0, 1.0), None);
        assert_eq!(grid.snap_to_line_number(5, 1.0), None);
    }

    #[test]
    fn dimension_and_validity() {
        let mut grid = grid();
        assert_eq!(grid.dimension(), 2);
        assert!(!grid.is_valid());
        grid.add_disc_line(2, 4.0);
        assert_eq!(grid.dimension(), 3);
        assert!(grid.is_valid());
        grid.clear_lines(1);
        assert_eq!(grid.dimension(), -1);
    }

    #[test]
    fn sim_area_spans_lines() {
        let area = grid().sim_area();
        assert_eq!(area.to_array6(), [0.0, 10.0, -1.0, 1.0, 3.0, 3.0]);
        assert_eq!(RectGrid::new().sim_area().to_array6(), [0.0; 6]);
    }

    #[test]
    fn function_lines_and_errors() {
        let mut grid = RectGrid::new();
        grid.add_disc_lines_fn(1, &[1.0, 2.0, 3.0], "y^2").expect("formula");
        assert_eq!(grid.lines(1), &[1.0, 4.0, 9.0]);
        assert!(matches!(
            grid.add_disc_lines_fn(0, &[1.0], "y"),
            Err(GridError::Parse { var: "x", .. })
        ));
        assert!(matches!(
            grid.add_disc_lines_fn(0, &[0.0], "1/x"),
            Err(GridError::Eval { .. })
        ));
        assert!(matches!(grid.add_disc_lines_fn(3, &[0.0], "x"), Err(GridError::Direction(3))));
    }

    #[test]
    fn remove_and_refine() {
        let mut grid = grid();
        grid.sort_all();
        assert!(grid.remove_disc_line_value(0, 5.0));
        assert!(!grid.remove_disc_line_value(0, 5.0));
        assert!(!grid.remove_disc_line(0, 9));
        grid.add_disc_line(2, 5.0);
        grid.increase_resolution(0, 4);
        assert_eq!(grid.lines(0), &[0.0, 2.5, 5.0, 7.5, 10.0]);
        grid.clear();
        assert!((grid.delta_unit() - 1.0).abs() < 1e-9);
        assert_eq!(grid.line_count(0), 0);
    }
}
