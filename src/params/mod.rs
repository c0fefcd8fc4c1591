//! Named parameters, the shared parameter set and parameter-driven scalars.
//!
//! A [`ParameterSet`] owns its parameters in insertion order; that order is also the
//! variable order handed to formulas. Every mutation that can change a formula
//! result bumps the set's generation. [`ParameterScalar`] caches are stamped with
//! the generation together with the identity of the set, so a value computed
//! against one set is never reused for another.

mod coord;
mod scalar;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub use coord::ParameterCoord;
pub use scalar::{Cached, ParameterScalar, ScalarError};

/// Variant data of a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterKind {
    Constant,
    /// Value restricted to `min + k * step` within `[min, max]`.
    Linear { min: f64, max: f64, step: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    value: f64,
    saved: f64,
    modified: bool,
    sweep: bool,
    kind: ParameterKind,
}

impl Parameter {
    #[must_use]
    pub fn constant(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            saved: value,
            modified: true,
            sweep: true,
            kind: ParameterKind::Constant,
        }
    }

    /// A swept parameter. `max` is raised to `min` and a negative `step` becomes 0
    /// before `value` is snapped onto the grid.
    #[must_use]
    pub fn linear(name: impl Into<String>, value: f64, min: f64, max: f64, step: f64) -> Self {
        let mut parameter = Self {
            name: name.into(),
            value,
            saved: value,
            modified: true,
            sweep: true,
            kind: ParameterKind::Linear {
                min,
                max: max.max(min),
                step: step.max(0.0),
            },
        };
        parameter.set_value(value);
        parameter.saved = parameter.value;
        parameter
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    #[must_use]
    pub const fn kind(&self) -> ParameterKind {
        self.kind
    }

    #[must_use]
    pub const fn is_linear(&self) -> bool {
        matches!(self.kind, ParameterKind::Linear { .. })
    }

    /// Sets the value; linear parameters clamp and snap onto their step grid.
    pub fn set_value(&mut self, value: f64) {
        self.value = match self.kind {
            ParameterKind::Constant => value,
            ParameterKind::Linear { min, max, step } => {
                let clamped = if value > max {
                    max
                } else if value < min {
                    min
                } else {
                    value
                };
                if step == 0.0 {
                    clamped
                } else {
                    let snapped = min + step * ((clamped - min) / step + 0.5).floor();
                    if snapped > max { snapped - step } else { snapped }
                }
            }
        };
        self.modified = true;
    }

    #[must_use]
    pub const fn modified(&self) -> bool {
        self.modified
    }

    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    /// Raw sweep flag as stored in documents.
    #[must_use]
    pub const fn sweep(&self) -> bool {
        self.sweep
    }

    pub fn set_sweep(&mut self, sweep: bool) {
        self.sweep = sweep;
    }

    /// Only linear parameters with the sweep flag take part in a sweep.
    #[must_use]
    pub const fn is_sweep_enabled(&self) -> bool {
        self.sweep && self.is_linear()
    }

    /// Number of grid positions, `floor((max - min) / step) + 1`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn step_count(&self) -> usize {
        match self.kind {
            ParameterKind::Linear { min, max, step } if step > 0.0 => {
                (((max - min) / step).floor() as usize).saturating_add(1)
            }
            _ => 1,
        }
    }

    /// Advances one step. Returns `false` without touching the value when the
    /// next step would pass `max`.
    pub fn increase_step(&mut self) -> bool {
        match self.kind {
            ParameterKind::Linear { max, step, .. } => {
                if self.value + step > max {
                    return false;
                }
                self.set_value(self.value + step);
                true
            }
            ParameterKind::Constant => false,
        }
    }

    /// Resets a linear parameter to its minimum.
    pub fn init_sweep(&mut self) {
        if let ParameterKind::Linear { min, .. } = self.kind {
            self.set_value(min);
        }
    }

    pub fn save(&mut self) {
        self.saved = self.value;
    }

    pub fn restore(&mut self) {
        self.set_value(self.saved);
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ParameterKind::Constant => write!(f, "Parameter: {}  Value: {}", self.name, self.value),
            ParameterKind::Linear { min, max, step } => write!(
                f,
                "Parameter: {}  Value: {} from {min} to {max}; Stepsize: {step}",
                self.name, self.value
            ),
        }
    }
}

/// How [`ParameterSet::next_sweep_pos`] walks the sweep-enabled parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    /// Every combination; the last parameter runs fastest.
    Product,
    /// One parameter after the other.
    Sequential,
}

impl SweepMode {
    #[must_use]
    pub const fn from_index(index: i32) -> Option<Self> {
        match index {
            1 => Some(Self::Product),
            2 => Some(Self::Sequential),
            _ => None,
        }
    }
}

static NEXT_SET_ID: AtomicU64 = AtomicU64::new(1);

fn next_set_id() -> u64 {
    NEXT_SET_ID.fetch_add(1, Ordering::Relaxed)
}

/// Set identity plus generation; what scalar caches are stamped with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetStamp {
    set: u64,
    generation: u64,
}

/// Ordered parameter registry shared by every scalar of a scene.
#[derive(Debug)]
pub struct ParameterSet {
    id: u64,
    parameters: Vec<Parameter>,
    modified: bool,
    generation: u64,
    sweep_cursor: usize,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::new()
    }
}

/// A clone is a new set: it gets its own identity.
impl Clone for ParameterSet {
    fn clone(&self) -> Self {
        Self {
            id: next_set_id(),
            parameters: self.parameters.clone(),
            modified: self.modified,
            generation: self.generation,
            sweep_cursor: self.sweep_cursor,
        }
    }
}

impl ParameterSet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: next_set_id(),
            parameters: Vec::new(),
            modified: true,
            generation: 1,
            sweep_cursor: 0,
        }
    }

    /// Appends `parameter`; duplicate names are not rejected. Returns the new count.
    pub fn link_parameter(&mut self, parameter: Parameter) -> usize {
        self.parameters.push(parameter);
        self.bump();
        self.parameters.len()
    }

    /// Removes the parameter at `index` if present. Returns the remaining count.
    pub fn delete_parameter(&mut self, index: usize) -> usize {
        if index < self.parameters.len() {
            self.parameters.remove(index);
            self.bump();
        }
        self.parameters.len()
    }

    pub fn clear(&mut self) {
        self.parameters.clear();
        self.bump();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    #[must_use]
    pub fn parameter(&self, index: usize) -> Option<&Parameter> {
        self.parameters.get(index)
    }

    /// Mutable access; counts as a modification of the set.
    pub fn parameter_mut(&mut self, index: usize) -> Option<&mut Parameter> {
        self.bump();
        self.parameters.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    /// First parameter called `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|parameter| parameter.name == name)
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|parameter| parameter.name == name)
    }

    /// Sets the value of the first parameter called `name`.
    pub fn set_value(&mut self, name: &str, value: f64) -> bool {
        let Some(index) = self.index_of(name) else {
            return false;
        };
        self.bump();
        self.parameters[index].set_value(value);
        true
    }

    /// Variable names in formula order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.parameters.iter().map(Parameter::name).collect()
    }

    /// Variable names joined by commas.
    #[must_use]
    pub fn parameter_names(&self) -> String {
        self.names().join(",")
    }

    /// Values in formula order.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.parameters.iter().map(Parameter::value).collect()
    }

    /// `name=value` pairs (or bare values) joined by `spacer`.
    #[must_use]
    pub fn value_string(&self, spacer: &str, values_only: bool) -> String {
        self.parameters
            .iter()
            .map(|parameter| {
                if values_only {
                    parameter.value.to_string()
                } else {
                    format!("{}={}", parameter.name, parameter.value)
                }
            })
            .collect::<Vec<_>>()
            .join(spacer)
    }

    /// True if the set flag or any parameter flag is set.
    #[must_use]
    pub fn modified(&self) -> bool {
        self.modified || self.parameters.iter().any(Parameter::modified)
    }

    /// `true` marks only the set; `false` clears the set and every parameter.
    pub fn set_modified(&mut self, modified: bool) {
        if modified {
            self.modified = true;
            self.bump();
            return;
        }
        self.modified = false;
        for parameter in &mut self.parameters {
            parameter.set_modified(false);
        }
    }

    /// Monotonic counter stamped into scalar caches.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn stamp(&self) -> SetStamp {
        SetStamp {
            set: self.id,
            generation: self.generation,
        }
    }

    // --- Sweep -----------------------------------------------------------------

    /// Product or sum of the step counts of every sweep-enabled parameter.
    #[must_use]
    pub fn count_sweep_steps(&self, mode: SweepMode) -> usize {
        let counts = self
            .parameters
            .iter()
            .filter(|parameter| parameter.is_sweep_enabled())
            .map(Parameter::step_count);
        match mode {
            SweepMode::Product => counts.reduce(usize::saturating_mul).unwrap_or(0),
            SweepMode::Sequential => counts.fold(0, usize::saturating_add),
        }
    }

    /// Saves every sweep-enabled parameter and moves it to its minimum.
    pub fn init_sweep(&mut self) {
        for parameter in self.parameters.iter_mut().filter(|p| p.is_sweep_enabled()) {
            parameter.save();
            parameter.init_sweep();
        }
        self.sweep_cursor = 0;
        self.bump();
        log::debug!("sweep initialised over {} parameter(s)", self.parameters.len());
    }

    /// Moves to the next sweep position; `false` once the sweep is exhausted.
    pub fn next_sweep_pos(&mut self, mode: SweepMode) -> bool {
        self.bump();
        match mode {
            SweepMode::Product => {
                for parameter in self.parameters.iter_mut().rev() {
                    if !parameter.is_sweep_enabled() {
                        continue;
                    }
                    if parameter.increase_step() {
                        return true;
                    }
                    parameter.init_sweep();
                }
                false
            }
            SweepMode::Sequential => {
                while let Some(parameter) = self.parameters.get_mut(self.sweep_cursor) {
                    if parameter.is_sweep_enabled() && parameter.increase_step() {
                        return true;
                    }
                    self.sweep_cursor += 1;
                }
                false
            }
        }
    }

    /// Restores the values saved by [`init_sweep`](Self::init_sweep).
    pub fn end_sweep(&mut self) {
        for parameter in self.parameters.iter_mut().filter(|p| p.is_sweep_enabled()) {
            parameter.restore();
        }
        self.bump();
    }

    /// Human readable listing of all parameters.
    #[must_use]
    pub fn status(&self) -> String {
        let mut out = format!(
            " Parameter-Set Printout, Qty of Parameter: {}\n",
            self.parameters.len()
        );
        for (index, parameter) in self.parameters.iter().enumerate() {
            out.push_str(&format!("----Nr. {index}----\n {parameter}\n"));
        }
        out
    }

    fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}
