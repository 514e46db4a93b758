use ndarray::{ArrayView2, ArrayViewMut2};
use serde_json::Value;

use super::boundary::{BoundaryTable, check_shapes, evaluate_boundary};
use super::{Problem, ProblemError, ProblemKind, RHS_ZERO_TOLERANCE};
use crate::expression::ExpressionValue;
use crate::io::param_parser::{BoundaryParam, ProblemParams, ValueParam};
use crate::mesh::{BoundaryPrimitive, TagResolver};

#[derive(Clone, Debug, Default)]
struct ScalarTables {
    rhs: f64,
    dirichlet: BoundaryTable<ExpressionValue>,
    neumann: BoundaryTable<ExpressionValue>,
}

#[derive(Clone, Debug)]
pub struct GenericScalarProblem {
    name: String,
    tables: Option<ScalarTables>,
}
impl GenericScalarProblem {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tables: None,
        }
    }
    pub fn with_params(name: &str, params: &Value) -> Result<Self, ProblemError> {
        let mut problem = Self::new(name);
        problem.configure(params)?;
        Ok(problem)
    }
    fn tables(&self) -> Result<&ScalarTables, ProblemError> {
        self.tables
            .as_ref()
            .ok_or_else(|| ProblemError::NotConfigured(self.name.clone()))
    }
}

fn scalar_rhs(param: &ValueParam) -> Result<f64, ProblemError> {
    let value = param.to_scalar("rhs")?;
    value.as_constant().ok_or_else(|| match param {
        ValueParam::Text(text) => ProblemError::NonConstantSource(text.clone()),
        _ => ProblemError::NonConstantSource(format!("{param:?}")),
    })
}

fn scalar_table(
    key: &str,
    param: Option<&BoundaryParam>,
) -> Result<BoundaryTable<ExpressionValue>, ProblemError> {
    let Some(param) = param else {
        return Ok(BoundaryTable::default());
    };
    if let BoundaryParam::PerTag(entries) = param {
        if let Some(i) = entries.iter().position(|entry| entry.dimension.is_some()) {
            return Err(ProblemError::Malformed {
                key: format!("{key}[{i}].dimension"),
                reason: "dimension masks only apply to tensor problems".to_string(),
            });
        }
    }
    BoundaryTable::from_param(key, param, |key, value| value.to_scalar(key))
}

impl Problem for GenericScalarProblem {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> ProblemKind {
        ProblemKind::Scalar
    }
    fn configure(&mut self, params: &Value) -> Result<(), ProblemError> {
        let params = ProblemParams::from_json(params)?;
        if params.all_dimensions_dirichlet.is_some() {
            return Err(ProblemError::Malformed {
                key: "all_dimensions_dirichlet".to_string(),
                reason: "dimension masks only apply to tensor problems".to_string(),
            });
        }
        let tables = ScalarTables {
            rhs: params.rhs.as_ref().map(scalar_rhs).transpose()?.unwrap_or(0.0),
            dirichlet: scalar_table("dirichlet_boundary", params.dirichlet_boundary.as_ref())?,
            neumann: scalar_table("neumann_boundary", params.neumann_boundary.as_ref())?,
        };
        if self.tables.is_some() {
            log::warn!("{}: replacing existing boundary configuration", self.name);
        }
        log::debug!(
            "{}: rhs {}, {} dirichlet entries (uniform: {}), {} neumann entries (uniform: {})",
            self.name,
            tables.rhs,
            tables.dirichlet.len(),
            tables.dirichlet.is_uniform(),
            tables.neumann.len(),
            tables.neumann.is_uniform(),
        );
        self.tables = Some(tables);
        Ok(())
    }
    fn is_configured(&self) -> bool {
        self.tables.is_some()
    }
    fn is_source_zero(&self) -> bool {
        self.tables
            .as_ref()
            .is_none_or(|tables| tables.rhs.abs() < RHS_ZERO_TOLERANCE)
    }
    fn source(
        &self,
        pts: ArrayView2<f64>,
        _t: f64,
        mut val: ArrayViewMut2<f64>,
    ) -> Result<(), ProblemError> {
        let tables = self.tables()?;
        check_shapes(pts.nrows(), &pts, &val, 1)?;
        val.fill(tables.rhs);
        Ok(())
    }
    fn dirichlet_value(
        &self,
        mesh: &dyn TagResolver,
        primitives: &[BoundaryPrimitive],
        _uv: ArrayView2<f64>,
        pts: ArrayView2<f64>,
        t: f64,
        val: ArrayViewMut2<f64>,
    ) -> Result<(), ProblemError> {
        let tables = self.tables()?;
        check_shapes(primitives.len(), &pts, &val, 1)?;
        log::trace!("{}: dirichlet batch of {} points at t = {t}", self.name, pts.nrows());
        evaluate_boundary(
            &tables.dirichlet,
            "dirichlet_boundary",
            mesh,
            primitives,
            pts,
            t,
            val,
        )
    }
    fn neumann_value(
        &self,
        mesh: &dyn TagResolver,
        primitives: &[BoundaryPrimitive],
        _uv: ArrayView2<f64>,
        pts: ArrayView2<f64>,
        t: f64,
        val: ArrayViewMut2<f64>,
    ) -> Result<(), ProblemError> {
        let tables = self.tables()?;
        check_shapes(primitives.len(), &pts, &val, 1)?;
        log::trace!("{}: neumann batch of {} points at t = {t}", self.name, pts.nrows());
        evaluate_boundary(
            &tables.neumann,
            "neumann_boundary",
            mesh,
            primitives,
            pts,
            t,
            val,
        )
    }
}
