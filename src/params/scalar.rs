use crate::expr::{ExprError, FunctionParser};

use super::{ParameterSet, SetStamp};

/// Value tagged with the set state it was computed at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cached<T> {
    value: T,
    stamp: Option<SetStamp>,
}

impl<T: Copy> Cached<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self { value, stamp: None }
    }

    #[must_use]
    pub const fn value(&self) -> T {
        self.value
    }

    #[must_use]
    pub fn is_fresh(&self, stamp: SetStamp) -> bool {
        self.stamp == Some(stamp)
    }

    pub fn store(&mut self, value: T, stamp: SetStamp) {
        self.value = value;
        self.stamp = Some(stamp);
    }

    /// Replaces the value and drops the stamp.
    pub fn reset(&mut self, value: T) {
        self.value = value;
        self.stamp = None;
    }

    pub fn invalidate(&mut self) {
        self.stamp = None;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScalarError {
    #[error("empty value")]
    Empty,
    #[error("formula `{formula}`: {source}")]
    Expr {
        formula: String,
        #[source]
        source: ExprError,
    },
}

impl ScalarError {
    /// Numeric code; `-1` for an empty value, otherwise the evaluator code.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::Empty => -1,
            Self::Expr { source, .. } => source.code(),
        }
    }
}

/// A literal number or a formula over the parameters of a [`ParameterSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterScalar {
    formula: Option<String>,
    cache: Cached<f64>,
    evaluations: u64,
}

impl Default for ParameterScalar {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl From<f64> for ParameterScalar {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl ParameterScalar {
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self {
            formula: None,
            cache: Cached::new(value),
            evaluations: 0,
        }
    }

    /// Builds a scalar from text; see [`set_value_str`](Self::set_value_str).
    pub fn parse(value: &str) -> Result<Self, ScalarError> {
        let mut scalar = Self::default();
        scalar.set_value_str(value)?;
        Ok(scalar)
    }

    /// Switches to a literal value.
    pub fn set_value(&mut self, value: f64) {
        self.formula = None;
        self.cache.reset(value);
    }

    /// Fully numeric text becomes a literal, anything else a formula.
    pub fn set_value_str(&mut self, value: &str) -> Result<(), ScalarError> {
        if value.is_empty() {
            return Err(ScalarError::Empty);
        }
        match value.trim().parse::<f64>() {
            Ok(number) => self.set_value(number),
            Err(_) => self.set_formula(value),
        }
        Ok(())
    }

    /// Stores `formula` verbatim; it is parsed on the next evaluation.
    pub fn set_formula(&mut self, formula: impl Into<String>) {
        self.formula = Some(formula.into());
        self.cache.reset(0.0);
    }

    #[must_use]
    pub const fn is_formula(&self) -> bool {
        self.formula.is_some()
    }

    #[must_use]
    pub fn formula(&self) -> Option<&str> {
        self.formula.as_deref()
    }

    /// The formula in formula mode, otherwise the number.
    #[must_use]
    pub fn value_string(&self) -> String {
        match &self.formula {
            Some(formula) => formula.clone(),
            None => self.cache.value().to_string(),
        }
    }

    /// Last evaluated (or literal) value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.cache.value()
    }

    #[must_use]
    pub fn is_dirty(&self, params: &ParameterSet) -> bool {
        self.formula.is_some() && !self.cache.is_fresh(params.stamp())
    }

    /// Number of parse/eval runs so far.
    #[must_use]
    pub const fn evaluations(&self) -> u64 {
        self.evaluations
    }

    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }

    /// Evaluates the formula against `params` unless the cached value is current.
    ///
    /// A runtime error still stores the computed value and counts as evaluated; a
    /// parse error leaves the scalar dirty with the value reset to 0.
    pub fn evaluate(&mut self, params: &ParameterSet) -> Result<f64, ScalarError> {
        let Some(formula) = &self.formula else {
            return Ok(self.cache.value());
        };
        let stamp = params.stamp();
        if self.cache.is_fresh(stamp) {
            return Ok(self.cache.value());
        }

        self.evaluations += 1;
        let parser = match FunctionParser::parse(formula, &params.names()) {
            Ok(parser) => parser,
            Err(error) => {
                self.cache.reset(0.0);
                return Err(ScalarError::Expr {
                    formula: formula.clone(),
                    source: error.into(),
                });
            }
        };

        let evaluation = parser.eval(&params.values());
        self.cache.store(evaluation.value, stamp);
        match evaluation.error {
            None => Ok(evaluation.value),
            Some(error) => Err(ScalarError::Expr {
                formula: formula.clone(),
                source: error.into(),
            }),
        }
    }
}
