use hashbrown::HashMap;
use ndarray::{ArrayView2, ArrayViewMut2};
use serde_json::Value;

use super::boundary::{BoundaryTable, DimensionMask, check_shapes, evaluate_boundary};
use super::{Problem, ProblemError, ProblemKind, RHS_ZERO_TOLERANCE};
use crate::expression::ExpressionValue;
use crate::io::param_parser::{BoundaryParam, ProblemParams, ValueParam};
use crate::mesh::{BoundaryPrimitive, BoundaryTag, TagResolver};

type VectorValue = [ExpressionValue; 3];

#[derive(Clone, Debug)]
struct TensorTables {
    rhs: [f64; 3],
    displacements: BoundaryTable<VectorValue>,
    forces: BoundaryTable<VectorValue>,
    dirichlet_dimensions: HashMap<BoundaryTag, DimensionMask>,
    all_dimensions_dirichlet: bool,
}

/// Vector field problem, e.g. elasticity.
#[derive(Clone, Debug)]
pub struct GenericTensorProblem {
    name: String,
    tables: Option<TensorTables>,
}
impl GenericTensorProblem {
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
    fn tables(&self) -> Result<&TensorTables, ProblemError> {
        self.tables
            .as_ref()
            .ok_or_else(|| ProblemError::NotConfigured(self.name.clone()))
    }
}

fn vector_rhs(param: &ValueParam) -> Result<[f64; 3], ProblemError> {
    let values = param.to_vector("rhs")?;
    let mut rhs = [0.0; 3];
    for (r, value) in rhs.iter_mut().zip(&values) {
        *r = match value {
            ExpressionValue::Constant(v) => *v,
            ExpressionValue::Expression(expression) => {
                return Err(ProblemError::NonConstantSource(expression.text().to_string()));
            }
        };
    }
    Ok(rhs)
}

fn vector_table(
    key: &str,
    param: Option<&BoundaryParam>,
) -> Result<BoundaryTable<VectorValue>, ProblemError> {
    match param {
        Some(param) => BoundaryTable::from_param(key, param, |key, value| value.to_vector(key)),
        None => Ok(BoundaryTable::default()),
    }
}

fn dirichlet_dimensions(
    param: Option<&BoundaryParam>,
) -> Result<(HashMap<BoundaryTag, DimensionMask>, bool), ProblemError> {
    let mut masks = HashMap::new();
    let mut any_mask = false;
    if let Some(BoundaryParam::PerTag(entries)) = param {
        for (i, entry) in entries.iter().enumerate() {
            let mask = match &entry.dimension {
                Some(flags) => {
                    any_mask = true;
                    DimensionMask::from_flags(&format!("dirichlet_boundary[{i}].dimension"), flags)?
                }
                None => DimensionMask::default(),
            };
            masks.insert(entry.id, mask);
        }
    }
    Ok((masks, any_mask))
}

impl Problem for GenericTensorProblem {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> ProblemKind {
        ProblemKind::Tensor
    }
    fn configure(&mut self, params: &Value) -> Result<(), ProblemError> {
        let params = ProblemParams::from_json(params)?;
        if let Some(BoundaryParam::PerTag(entries)) = &params.neumann_boundary {
            if let Some(i) = entries.iter().position(|entry| entry.dimension.is_some()) {
                return Err(ProblemError::Malformed {
                    key: format!("neumann_boundary[{i}].dimension"),
                    reason: "dimension masks only apply to Dirichlet entries".to_string(),
                });
            }
        }
        let displacements = vector_table("dirichlet_boundary", params.dirichlet_boundary.as_ref())?;
        let (dirichlet_dimensions, any_mask) = dirichlet_dimensions(params.dirichlet_boundary.as_ref())?;
        let tables = TensorTables {
            rhs: params.rhs.as_ref().map(vector_rhs).transpose()?.unwrap_or([0.0; 3]),
            displacements,
            forces: vector_table("neumann_boundary", params.neumann_boundary.as_ref())?,
            dirichlet_dimensions,
            all_dimensions_dirichlet: params.all_dimensions_dirichlet.unwrap_or(!any_mask),
        };
        if self.tables.is_some() {
            log::warn!("{}: replacing existing boundary configuration", self.name);
        }
        log::debug!(
            "{}: rhs {:?}, {} dirichlet entries (uniform: {}), {} neumann entries (uniform: {}), all dimensions dirichlet: {}",
            self.name,
            tables.rhs,
            tables.displacements.len(),
            tables.displacements.is_uniform(),
            tables.forces.len(),
            tables.forces.is_uniform(),
            tables.all_dimensions_dirichlet,
        );
        self.tables = Some(tables);
        Ok(())
    }
    fn is_configured(&self) -> bool {
        self.tables.is_some()
    }
    fn is_source_zero(&self) -> bool {
        self.tables.as_ref().is_none_or(|tables| {
            tables
                .rhs
                .iter()
                .all(|component| component.abs() < RHS_ZERO_TOLERANCE)
        })
    }
    fn source(
        &self,
        pts: ArrayView2<f64>,
        _t: f64,
        mut val: ArrayViewMut2<f64>,
    ) -> Result<(), ProblemError> {
        let tables = self.tables()?;
        check_shapes(pts.nrows(), &pts, &val, pts.ncols())?;
        for mut row in val.rows_mut() {
            for (v, r) in row.iter_mut().zip(&tables.rhs) {
                *v = *r;
            }
        }
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
        check_shapes(primitives.len(), &pts, &val, pts.ncols())?;
        log::trace!("{}: dirichlet batch of {} points at t = {t}", self.name, pts.nrows());
        evaluate_boundary(
            &tables.displacements,
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
        check_shapes(primitives.len(), &pts, &val, pts.ncols())?;
        log::trace!("{}: neumann batch of {} points at t = {t}", self.name, pts.nrows());
        evaluate_boundary(
            &tables.forces,
            "neumann_boundary",
            mesh,
            primitives,
            pts,
            t,
            val,
        )
    }
    fn is_dimension_dirichlet(&self, tag: BoundaryTag, dim: usize) -> bool {
        if self.all_dimensions_dirichlet() {
            return true;
        }
        let Some(tables) = &self.tables else {
            return true;
        };
        // masks are checked per tag; tags without one are fully constrained
        tables
            .dirichlet_dimensions
            .get(&tag)
            .is_none_or(|mask| mask.is_dirichlet(dim))
    }
    fn all_dimensions_dirichlet(&self) -> bool {
        self.tables
            .as_ref()
            .is_none_or(|tables| tables.all_dimensions_dirichlet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::FacetTags;
    use approx::assert_relative_eq;
    use ndarray::{Array2, array};
    use serde_json::json;

    fn tagged(tags: &[i32]) -> (FacetTags, Vec<BoundaryPrimitive>) {
        let mut resolver = FacetTags::new(0);
        let primitives: Vec<_> = (0..tags.len()).map(|i| BoundaryPrimitive::new(i, 0)).collect();
        for (primitive, tag) in primitives.iter().zip(tags) {
            resolver.insert(*primitive, *tag);
        }
        (resolver, primitives)
    }

    #[test]
    fn test_source_zero_is_per_component() {
        let zero = GenericTensorProblem::with_params("GenericTensor", &json!({ "rhs": [0, 0, 0] })).unwrap();
        assert!(zero.is_source_zero());
        let small = GenericTensorProblem::with_params("GenericTensor", &json!({ "rhs": [0, 0, 1e-5] })).unwrap();
        assert!(!small.is_source_zero());
        // each below tolerance even though the combined norm is not
        let tiny = GenericTensorProblem::with_params(
            "GenericTensor",
            &json!({ "rhs": [9e-11, 9e-11, 9e-11] }),
        )
        .unwrap();
        assert!(tiny.is_source_zero());
    }

    #[test]
    fn test_source_is_broadcast() {
        let problem =
            GenericTensorProblem::with_params("GenericTensor", &json!({ "rhs": [1, "-2", 3] })).unwrap();
        let pts = array![[0.0, 0.0, 0.0], [4.0, 5.0, 6.0]];
        let mut val = Array2::zeros((2, 3));
        problem.source(pts.view(), 0.0, val.view_mut()).unwrap();
        assert_eq!(val, array![[1.0, -2.0, 3.0], [1.0, -2.0, 3.0]]);

        let planar = array![[0.0, 0.0]];
        let mut val = Array2::zeros((1, 2));
        problem.source(planar.view(), 0.0, val.view_mut()).unwrap();
        assert_eq!(val, array![[1.0, -2.0]]);
    }

    #[test]
    fn test_uniform_dirichlet_components() {
        let params = json!({ "dirichlet_boundary": ["t", "x * y", "z"] });
        let problem = GenericTensorProblem::with_params("GenericTensor", &params).unwrap();
        let (resolver, primitives) = tagged(&[1, 2, 3]);
        let pts = array![[1.0, 2.0, 3.0], [2.0, 2.0, 0.5], [0.0, 7.0, -1.0]];
        let uv = Array2::zeros((3, 2));
        let mut val = Array2::zeros((3, 3));
        problem
            .dirichlet_value(&resolver, &primitives, uv.view(), pts.view(), 0.5, val.view_mut())
            .unwrap();
        assert_eq!(val, array![[0.5, 2.0, 3.0], [0.5, 4.0, 0.5], [0.5, 0.0, -1.0]]);
    }

    #[test]
    fn test_per_tag_neumann_unset_component_is_zero() {
        let params = json!({
            "neumann_boundary": [
                { "id": 1, "value": ["x", "y"] },
                { "id": 2, "value": [0, 0, "sin(t)"] }
            ]
        });
        let problem = GenericTensorProblem::with_params("GenericTensor", &params).unwrap();
        let (resolver, primitives) = tagged(&[1, 2]);
        let pts = array![[3.0, 4.0, 5.0], [0.0, 0.0, 0.0]];
        let uv = Array2::zeros((2, 2));
        let mut val = Array2::from_elem((2, 3), f64::NAN);
        let t = std::f64::consts::FRAC_PI_2;
        problem
            .neumann_value(&resolver, &primitives, uv.view(), pts.view(), t, val.view_mut())
            .unwrap();
        assert_eq!(val.row(0).to_vec(), vec![3.0, 4.0, 0.0]);
        assert_relative_eq!(val[[1, 2]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_tag_is_lookup_error() {
        let params = json!({ "dirichlet_boundary": [{ "id": 1, "value": [0, 0, 0] }] });
        let problem = GenericTensorProblem::with_params("GenericTensor", &params).unwrap();
        let (resolver, primitives) = tagged(&[2]);
        let pts = array![[0.0, 0.0, 0.0]];
        let uv = Array2::zeros((1, 2));
        let mut val = Array2::zeros((1, 3));
        let err = problem
            .dirichlet_value(&resolver, &primitives, uv.view(), pts.view(), 0.0, val.view_mut())
            .unwrap_err();
        assert!(matches!(
            err,
            ProblemError::UnknownTag {
                table: "dirichlet_boundary",
                tag: 2
            }
        ));
    }

    #[test]
    fn test_dimension_masks() {
        let params = json!({
            "dirichlet_boundary": [
                { "id": 1, "value": [0, 0, 0], "dimension": [true, false, true] },
                { "id": 2, "value": [0, 0, 0] }
            ]
        });
        let problem = GenericTensorProblem::with_params("GenericTensor", &params).unwrap();
        assert!(!problem.all_dimensions_dirichlet());
        assert!(problem.is_dimension_dirichlet(1, 0));
        assert!(!problem.is_dimension_dirichlet(1, 1));
        assert!(problem.is_dimension_dirichlet(1, 2));
        assert!((0..3).all(|dim| problem.is_dimension_dirichlet(2, dim)));
        // tags without an entry default to constrained
        assert!(problem.is_dimension_dirichlet(7, 1));
        assert!(!problem.is_dimension_dirichlet(1, 3));
    }

    #[test]
    fn test_global_flag_overrides_masks() {
        let params = json!({
            "all_dimensions_dirichlet": true,
            "dirichlet_boundary": [
                { "id": 1, "value": [0, 0, 0], "dimension": [false, false, false] },
                { "id": 2, "value": [0, 0], "dimension": [false, true] }
            ]
        });
        let problem = GenericTensorProblem::with_params("GenericTensor", &params).unwrap();
        assert!(problem.all_dimensions_dirichlet());
        for tag in [1, 2, 3] {
            for dim in 0..4 {
                assert!(problem.is_dimension_dirichlet(tag, dim));
            }
        }
    }

    #[test]
    fn test_global_flag_holds_for_any_dimension() {
        let derived = GenericTensorProblem::with_params(
            "GenericTensor",
            &json!({ "dirichlet_boundary": [{ "id": 1, "value": [0, 0, 0] }] }),
        )
        .unwrap();
        assert!(derived.all_dimensions_dirichlet());
        assert!(derived.is_dimension_dirichlet(1, 3));
        assert!(derived.is_dimension_dirichlet(9, 100));
        assert!(GenericTensorProblem::new("GenericTensor").is_dimension_dirichlet(1, 5));
    }

    #[test]
    fn test_global_flag_defaults_true_without_masks() {
        let uniform = GenericTensorProblem::with_params(
            "GenericTensor",
            &json!({ "dirichlet_boundary": [0, 0, 0] }),
        )
        .unwrap();
        assert!(uniform.all_dimensions_dirichlet());
        assert!(GenericTensorProblem::new("GenericTensor").all_dimensions_dirichlet());
    }

    #[test]
    fn test_configuration_errors() {
        let cases = [
            json!({ "rhs": 1.0 }),
            json!({ "rhs": [1, 2, 3, 4] }),
            json!({ "rhs": ["x", 0, 0] }),
            json!({ "dirichlet_boundary": "x" }),
            json!({ "dirichlet_boundary": [{ "id": 1, "value": [0, 0, 0], "dimension": [true] }] }),
            json!({ "dirichlet_boundary": [{ "id": 3, "value": [0, 0] }, { "id": 3, "value": [1, 1] }] }),
            json!({ "neumann_boundary": [{ "id": 1, "value": [0, 0], "dimension": [true, true] }] }),
            json!({ "neumann_boundary": [{ "id": 1, "value": ["sqrt(", 0] }] }),
            json!({ "all_dimensions_dirichlet": "yes" }),
            json!({ "dirichlet_boundary": [] }),
            json!({ "neumann_boundary": [] }),
        ];
        for params in cases {
            let err = GenericTensorProblem::with_params("GenericTensor", &params).unwrap_err();
            assert!(err.is_configuration_error(), "{params} gave {err}");
        }
    }

    #[test]
    fn test_empty_list_is_arity_error() {
        let err = GenericTensorProblem::with_params("GenericTensor", &json!({ "dirichlet_boundary": [] }))
            .unwrap_err();
        assert!(matches!(
            err,
            ProblemError::Arity {
                found: 0,
                expected: "2 or 3",
                ..
            }
        ));
    }

    #[test]
    fn test_output_columns_follow_points() {
        let problem =
            GenericTensorProblem::with_params("GenericTensor", &json!({ "rhs": [1, 1, 1] })).unwrap();
        let mut val = Array2::zeros((1, 3));
        let err = problem
            .source(array![[0.0, 0.0]].view(), 0.0, val.view_mut())
            .unwrap_err();
        assert!(matches!(err, ProblemError::ShapeMismatch { .. }));
    }
}
