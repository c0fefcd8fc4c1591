//! Replayable affine transform attached to primitives.
//!
//! A [`CsTransform`] keeps the forward matrix, its inverse and the ordered list of
//! operations that produced them. Operations may be given as numbers or as
//! comma-separated formula strings evaluated against a [`ParameterSet`]; the log
//! keeps the original scalars so the transform can be written back or replayed
//! after the parameters change.

use std::fmt;

use super::core::{Point3, Transform, Vec3};
use crate::params::{ParameterScalar, ParameterSet, ScalarError};

/// The operations a [`CsTransform`] understands, with their document names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    Scale,
    Scale3,
    Translate,
    RotateOrigin,
    RotateX,
    RotateY,
    RotateZ,
    Matrix,
}

impl TransformKind {
    pub const ALL: [Self; 8] = [
        Self::Scale,
        Self::Scale3,
        Self::Translate,
        Self::RotateOrigin,
        Self::RotateX,
        Self::RotateY,
        Self::RotateZ,
        Self::Matrix,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Scale => "Scale",
            Self::Scale3 => "Scale3",
            Self::Translate => "Translate",
            Self::RotateOrigin => "Rotate_Origin",
            Self::RotateX => "Rotate_X",
            Self::RotateY => "Rotate_Y",
            Self::RotateZ => "Rotate_Z",
            Self::Matrix => "Matrix",
        }
    }

    #[must_use]
    pub const fn arg_count(self) -> usize {
        match self {
            Self::Scale | Self::RotateX | Self::RotateY | Self::RotateZ => 1,
            Self::Scale3 | Self::Translate => 3,
            Self::RotateOrigin => 4,
            Self::Matrix => 16,
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("unknown transformation `{0}`")]
    UnknownOperation(String),
    #[error("{kind} expects {expected} argument(s), got {found}")]
    ArgumentCount {
        kind: TransformKind,
        expected: usize,
        found: usize,
    },
    #[error("rotation axis has zero length")]
    ZeroAxis,
    #[error("transformation matrix is singular")]
    Singular,
    #[error("argument {index} of {kind}: {source}")]
    Argument {
        kind: TransformKind,
        index: usize,
        #[source]
        source: ScalarError,
    },
}

/// One logged operation and the scalars it was built from.
///
/// The multiply order and angle unit in effect when the operation was applied are
/// kept with it, as is an inversion of the whole transform right after it.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOp {
    pub kind: TransformKind,
    pub args: Vec<ParameterScalar>,
    post_multiply: bool,
    degrees: bool,
    inverted: bool,
}

impl TransformOp {
    #[must_use]
    pub const fn post_multiplied(&self) -> bool {
        self.post_multiply
    }

    #[must_use]
    pub const fn angles_in_degrees(&self) -> bool {
        self.degrees
    }

    /// Whether the transform was inverted after this operation.
    #[must_use]
    pub const fn inverts(&self) -> bool {
        self.inverted
    }

    /// Arguments joined by commas, formulas verbatim.
    #[must_use]
    pub fn argument_string(&self) -> String {
        self.args
            .iter()
            .map(ParameterScalar::value_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for TransformOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.argument_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CsTransform {
    forward: Transform,
    inverse: Transform,
    ops: Vec<TransformOp>,
    post_multiply: bool,
    degrees: bool,
}

impl Default for CsTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl CsTransform {
    /// Identity, post-multiplying, angles in radians.
    #[must_use]
    pub fn new() -> Self {
        Self {
            forward: Transform::identity(),
            inverse: Transform::identity(),
            ops: Vec::new(),
            post_multiply: true,
            degrees: false,
        }
    }

    /// Back to the identity with default flags.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    #[must_use]
    pub const fn post_multiply(&self) -> bool {
        self.post_multiply
    }

    /// With post-multiplication a new operation is applied after the existing ones.
    pub fn set_post_multiply(&mut self, post_multiply: bool) {
        self.post_multiply = post_multiply;
    }

    #[must_use]
    pub const fn angles_in_degrees(&self) -> bool {
        self.degrees
    }

    pub fn set_angles_in_degrees(&mut self, degrees: bool) {
        self.degrees = degrees;
    }

    #[must_use]
    pub fn has_transform(&self) -> bool {
        !self.ops.is_empty()
    }

    #[must_use]
    pub fn operations(&self) -> &[TransformOp] {
        &self.ops
    }

    #[must_use]
    pub const fn matrix(&self) -> Transform {
        self.forward
    }

    #[must_use]
    pub const fn inverse_matrix(&self) -> Transform {
        self.inverse
    }

    #[must_use]
    pub fn transform(&self, p: Point3) -> Point3 {
        self.forward.apply_point(p)
    }

    #[must_use]
    pub fn invert_transform(&self, p: Point3) -> Point3 {
        self.inverse.apply_point(p)
    }

    /// Swaps forward and inverse. The inversion is logged on the last operation so
    /// a replay reproduces it.
    pub fn invert(&mut self) {
        std::mem::swap(&mut self.forward, &mut self.inverse);
        if let Some(last) = self.ops.last_mut() {
            last.inverted = !last.inverted;
        }
    }

    // --- Numeric operations ----------------------------------------------------

    pub fn scale(&mut self, factor: f64, concatenate: bool) -> Result<(), TransformError> {
        self.transform_by_type(TransformKind::Scale, &[factor], concatenate)
    }

    pub fn scale3(&mut self, factors: [f64; 3], concatenate: bool) -> Result<(), TransformError> {
        self.transform_by_type(TransformKind::Scale3, &factors, concatenate)
    }

    pub fn translate(&mut self, offset: [f64; 3], concatenate: bool) -> Result<(), TransformError> {
        self.transform_by_type(TransformKind::Translate, &offset, concatenate)
    }

    pub fn rotate_origin(
        &mut self,
        axis: [f64; 3],
        angle: f64,
        concatenate: bool,
    ) -> Result<(), TransformError> {
        let args = [axis[0], axis[1], axis[2], angle];
        self.transform_by_type(TransformKind::RotateOrigin, &args, concatenate)
    }

    pub fn rotate_x(&mut self, angle: f64, concatenate: bool) -> Result<(), TransformError> {
        self.transform_by_type(TransformKind::RotateX, &[angle], concatenate)
    }

    pub fn rotate_y(&mut self, angle: f64, concatenate: bool) -> Result<(), TransformError> {
        self.transform_by_type(TransformKind::RotateY, &[angle], concatenate)
    }

    pub fn rotate_z(&mut self, angle: f64, concatenate: bool) -> Result<(), TransformError> {
        self.transform_by_type(TransformKind::RotateZ, &[angle], concatenate)
    }

    /// Applies a raw row-major 4x4 matrix.
    pub fn set_matrix(&mut self, values: [f64; 16], concatenate: bool) -> Result<(), TransformError> {
        self.transform_by_type(TransformKind::Matrix, &values, concatenate)
    }

    /// Applies `kind` with literal arguments. Extra arguments are ignored.
    pub fn transform_by_type(
        &mut self,
        kind: TransformKind,
        args: &[f64],
        concatenate: bool,
    ) -> Result<(), TransformError> {
        let expected = kind.arg_count();
        if args.len() < expected {
            return Err(TransformError::ArgumentCount {
                kind,
                expected,
                found: args.len(),
            });
        }
        let args = &args[..expected];
        let matrix = build_matrix(kind, args, self.degrees)?;
        let scalars = args.iter().copied().map(ParameterScalar::new).collect();
        self.apply(matrix, self.logged(kind, scalars), concatenate)
    }

    // --- Formula operations ----------------------------------------------------

    /// Looks up the operation by its document name and applies the formula arguments.
    pub fn transform_by_string(
        &mut self,
        name: &str,
        args: &str,
        concatenate: bool,
        params: &ParameterSet,
    ) -> Result<(), TransformError> {
        let kind = TransformKind::from_name(name)
            .ok_or_else(|| TransformError::UnknownOperation(name.to_owned()))?;
        self.transform_by_type_str(kind, args, concatenate, params)
    }

    /// Applies `kind` with comma-separated formula arguments.
    ///
    /// `Scale` with three or more arguments becomes `Scale3`. Surplus arguments are
    /// dropped with a warning.
    pub fn transform_by_type_str(
        &mut self,
        kind: TransformKind,
        args: &str,
        concatenate: bool,
        params: &ParameterSet,
    ) -> Result<(), TransformError> {
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        let kind = match kind {
            TransformKind::Scale | TransformKind::Scale3 if parts.len() >= 3 => TransformKind::Scale3,
            TransformKind::Scale if parts.len() == 2 => {
                return Err(TransformError::ArgumentCount {
                    kind,
                    expected: 1,
                    found: 2,
                });
            }
            other => other,
        };

        let expected = kind.arg_count();
        if parts.len() < expected {
            return Err(TransformError::ArgumentCount {
                kind,
                expected,
                found: parts.len(),
            });
        }
        if parts.len() > expected {
            log::warn!(
                "{kind}: {} argument(s) given in \"{args}\", ignoring all after the first {expected}",
                parts.len()
            );
        }

        let mut scalars = Vec::with_capacity(expected);
        let mut values = Vec::with_capacity(expected);
        for (index, part) in parts.iter().take(expected).enumerate() {
            let argument = |source| TransformError::Argument {
                kind,
                index,
                source,
            };
            let mut scalar = ParameterScalar::parse(part).map_err(argument)?;
            values.push(scalar.evaluate(params).map_err(argument)?);
            scalars.push(scalar);
        }

        let matrix = build_matrix(kind, &values, self.degrees)?;
        self.apply(matrix, self.logged(kind, scalars), concatenate)
    }

    /// Rebuilds the matrices from the log with the current parameter values.
    ///
    /// Each operation is rebuilt with the multiply order and angle unit it was
    /// logged with; the current flags only affect later operations. Nothing changes
    /// if any logged operation fails to evaluate or build.
    pub fn replay(&mut self, params: &ParameterSet) -> Result<(), TransformError> {
        let mut forward = Transform::identity();
        let mut ops = self.ops.clone();
        for op in &mut ops {
            let mut values = Vec::with_capacity(op.args.len());
            for (index, scalar) in op.args.iter_mut().enumerate() {
                let value = scalar.evaluate(params).map_err(|source| TransformError::Argument {
                    kind: op.kind,
                    index,
                    source,
                })?;
                values.push(value);
            }
            let matrix = build_matrix(op.kind, &values, op.degrees)?;
            forward = concatenated(forward, matrix, op.post_multiply);
            if op.inverted {
                forward = forward.inverse().ok_or(TransformError::Singular)?;
            }
        }
        let inverse = forward.inverse().ok_or(TransformError::Singular)?;
        self.forward = forward;
        self.inverse = inverse;
        self.ops = ops;
        Ok(())
    }

    /// One line per logged operation, prefixed by `prefix`.
    #[must_use]
    pub fn status(&self, prefix: &str) -> String {
        self.ops
            .iter()
            .map(|op| format!("{prefix}{op}\n"))
            .collect()
    }

    fn logged(&self, kind: TransformKind, args: Vec<ParameterScalar>) -> TransformOp {
        TransformOp {
            kind,
            args,
            post_multiply: self.post_multiply,
            degrees: self.degrees,
            inverted: false,
        }
    }

    fn apply(&mut self, matrix: Transform, op: TransformOp, concatenate: bool) -> Result<(), TransformError> {
        let forward = if concatenate {
            concatenated(self.forward, matrix, self.post_multiply)
        } else {
            matrix
        };
        let inverse = forward.inverse().ok_or(TransformError::Singular)?;

        if !concatenate {
            log::debug!("transform replaced by {op}");
            self.ops.clear();
        }
        self.forward = forward;
        self.inverse = inverse;
        self.ops.push(op);
        Ok(())
    }
}

fn build_matrix(kind: TransformKind, args: &[f64], degrees: bool) -> Result<Transform, TransformError> {
    let angle = |value: f64| if degrees { value.to_radians() } else { value };
    let matrix = match kind {
        TransformKind::Scale => Transform::uniform_scale(args[0]),
        TransformKind::Scale3 => Transform::scale(args[0], args[1], args[2]),
        TransformKind::Translate => Transform::translate(Vec3::new(args[0], args[1], args[2])),
        TransformKind::RotateOrigin => {
            Transform::rotate_axis(Vec3::new(args[0], args[1], args[2]), angle(args[3]))
                .ok_or(TransformError::ZeroAxis)?
        }
        TransformKind::RotateX => Transform::rotate_x(angle(args[0])),
        TransformKind::RotateY => Transform::rotate_y(angle(args[0])),
        TransformKind::RotateZ => Transform::rotate_z(angle(args[0])),
        TransformKind::Matrix => {
            let mut values = [0.0; 16];
            values.copy_from_slice(&args[..16]);
            Transform::from_row_major(values)
        }
    };
    Ok(matrix)
}

/// Post-multiplication applies `matrix` after `current`.
fn concatenated(current: Transform, matrix: Transform, post_multiply: bool) -> Transform {
    if post_multiply {
        matrix.compose(current)
    } else {
        current.compose(matrix)
    }
}
