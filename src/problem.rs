//! Problem definitions consumed by the assembler: source term, Dirichlet and Neumann data.
use ndarray::{ArrayView2, ArrayViewMut2};
use serde_json::Value;
use thiserror::Error;

use crate::expression::ExpressionError;
use crate::mesh::{BoundaryPrimitive, BoundaryTag, TagResolver};

pub mod boundary;
pub mod scalar;
pub mod tensor;

pub use scalar::GenericScalarProblem;
pub use tensor::GenericTensorProblem;

/// Sources whose components are all below this magnitude are treated as zero.
pub const RHS_ZERO_TOLERANCE: f64 = 1e-10;

#[derive(Error, Debug)]
pub enum ProblemError {
    #[error("missing configuration key `{0}`")]
    MissingKey(String),
    #[error("malformed configuration key `{key}`: {reason}")]
    Malformed { key: String, reason: String },
    #[error("`{key}` expects {expected} component(s), got {found}")]
    Arity {
        key: String,
        expected: &'static str,
        found: usize,
    },
    #[error("boundary tag {tag} appears more than once in `{key}`")]
    DuplicateTag { key: String, tag: BoundaryTag },
    #[error("expression syntax error: {0}")]
    Expression(#[from] ExpressionError),
    #[error("source `{0}` depends on x, y, z or t, only constant sources are supported")]
    NonConstantSource(String),
    #[error(
        "boundary tag {tag} has no entry in `{table}`, mesh tagging and boundary configuration disagree"
    )]
    UnknownTag {
        table: &'static str,
        tag: BoundaryTag,
    },
    #[error("points must have 2 or 3 columns, got {0}")]
    PointDimension(usize),
    #[error("{what} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        what: &'static str,
        found: (usize, usize),
        expected: (usize, usize),
    },
    #[error("problem `{0}` evaluated before it was configured")]
    NotConfigured(String),
    #[error("unknown problem `{0}`")]
    UnknownProblem(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}
impl ProblemError {
    /// Errors raised while reading a configuration, including expression syntax errors.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ProblemError::MissingKey(_)
                | ProblemError::Malformed { .. }
                | ProblemError::Arity { .. }
                | ProblemError::DuplicateTag { .. }
                | ProblemError::Expression(_)
                | ProblemError::NonConstantSource(_)
                | ProblemError::UnknownProblem(_)
        )
    }
    pub fn is_lookup_error(&self) -> bool {
        matches!(self, ProblemError::UnknownTag { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProblemKind {
    Scalar,
    Tensor,
}

/// Capability interface shared by the scalar and tensor problems.
pub trait Problem: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;
    fn kind(&self) -> ProblemKind;
    /// On error the previous configuration is left untouched.
    fn configure(&mut self, params: &Value) -> Result<(), ProblemError>;
    fn is_configured(&self) -> bool;

    fn is_scalar(&self) -> bool {
        self.kind() == ProblemKind::Scalar
    }
    fn has_exact_solution(&self) -> bool {
        false
    }
    fn is_source_zero(&self) -> bool;
    fn value_columns(&self, point_dimension: usize) -> usize {
        match self.kind() {
            ProblemKind::Scalar => 1,
            ProblemKind::Tensor => point_dimension,
        }
    }

    fn source(
        &self,
        pts: ArrayView2<f64>,
        t: f64,
        val: ArrayViewMut2<f64>,
    ) -> Result<(), ProblemError>;
    fn dirichlet_value(
        &self,
        mesh: &dyn TagResolver,
        primitives: &[BoundaryPrimitive],
        uv: ArrayView2<f64>,
        pts: ArrayView2<f64>,
        t: f64,
        val: ArrayViewMut2<f64>,
    ) -> Result<(), ProblemError>;
    fn neumann_value(
        &self,
        mesh: &dyn TagResolver,
        primitives: &[BoundaryPrimitive],
        uv: ArrayView2<f64>,
        pts: ArrayView2<f64>,
        t: f64,
        val: ArrayViewMut2<f64>,
    ) -> Result<(), ProblemError>;

    fn is_dimension_dirichlet(&self, _tag: BoundaryTag, _dim: usize) -> bool {
        true
    }
    fn all_dimensions_dirichlet(&self) -> bool {
        true
    }
}

pub fn make(name: &str) -> Result<Box<dyn Problem>, ProblemError> {
    match name {
        "GenericScalar" => Ok(Box::new(GenericScalarProblem::new(name))),
        "GenericTensor" => Ok(Box::new(GenericTensorProblem::new(name))),
        _ => Err(ProblemError::UnknownProblem(name.to_string())),
    }
}
