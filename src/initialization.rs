use ndarray::Array2;

use crate::io::param_parser::{ProblemFileParser, Probe};
use crate::io::write_to_csv::SampledValues;
use crate::mesh::{BoundaryPrimitive, BoundaryTag, FacetTags};
use crate::problem::{self, Problem, ProblemError};

/// Probes sampled by the driver. Each probe becomes its own boundary facet.
pub struct ProbeSet {
    pub resolver: FacetTags,
    pub primitives: Vec<BoundaryPrimitive>,
    pub tags: Vec<BoundaryTag>,
    pub points: Array2<f64>,
}

pub fn initialize_problem(file: &ProblemFileParser) -> Result<Box<dyn Problem>, ProblemError> {
    let mut problem = problem::make(&file.problem)?;
    problem.configure(&file.params)?;
    Ok(problem)
}

pub fn initialize_probes(probes: &[Probe]) -> Result<ProbeSet, ProblemError> {
    let dim = probes.first().map_or(3, |probe| probe.point.len());
    if !(2..=3).contains(&dim) {
        return Err(ProblemError::PointDimension(dim));
    }
    let mut resolver = FacetTags::new(0);
    let mut primitives = Vec::with_capacity(probes.len());
    let mut tags = Vec::with_capacity(probes.len());
    let mut points = Array2::zeros((probes.len(), dim));
    for (i, probe) in probes.iter().enumerate() {
        if probe.point.len() != dim {
            return Err(ProblemError::ShapeMismatch {
                what: "probe point",
                found: (1, probe.point.len()),
                expected: (1, dim),
            });
        }
        let primitive = BoundaryPrimitive::new(i, 0);
        resolver.insert(primitive, probe.tag);
        primitives.push(primitive);
        tags.push(probe.tag);
        for (d, x) in probe.point.iter().enumerate() {
            points[[i, d]] = *x;
        }
    }
    Ok(ProbeSet {
        resolver,
        primitives,
        tags,
        points,
    })
}

/// Evaluates source, Dirichlet and Neumann data at every probe.
pub fn sample_problem(
    problem: &dyn Problem,
    probes: &ProbeSet,
    t: f64,
) -> Result<Vec<SampledValues>, ProblemError> {
    let (n, dim) = probes.points.dim();
    let columns = problem.value_columns(dim);
    let uv = Array2::<f64>::zeros((n, dim - 1));
    let mut samples = Vec::with_capacity(3);
    for quantity in ["source", "dirichlet", "neumann"] {
        let mut values = Array2::zeros((n, columns));
        match quantity {
            "source" => problem.source(probes.points.view(), t, values.view_mut())?,
            "dirichlet" => problem.dirichlet_value(
                &probes.resolver,
                &probes.primitives,
                uv.view(),
                probes.points.view(),
                t,
                values.view_mut(),
            )?,
            _ => problem.neumann_value(
                &probes.resolver,
                &probes.primitives,
                uv.view(),
                probes.points.view(),
                t,
                values.view_mut(),
            )?,
        }
        samples.push(SampledValues {
            quantity,
            tags: probes.tags.clone(),
            points: probes.points.clone(),
            values,
        });
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn probe(tag: BoundaryTag, point: &[f64]) -> Probe {
        Probe {
            tag,
            point: point.to_vec(),
        }
    }

    #[test]
    fn test_probe_dimensions_must_agree() {
        assert!(initialize_probes(&[probe(1, &[0.0, 0.0]), probe(2, &[0.0, 0.0, 0.0])]).is_err());
        assert!(initialize_probes(&[probe(1, &[0.0])]).is_err());
        let probes = initialize_probes(&[probe(4, &[1.0, 2.0])]).unwrap();
        assert_eq!(probes.points.dim(), (1, 2));
        assert_eq!(probes.tags, vec![4]);
    }

    #[test]
    fn test_sample_tensor_problem() {
        let file = ProblemFileParser {
            problem: "GenericTensor".to_string(),
            time: 2.0,
            params: json!({
                "rhs": [0, -9.81],
                "dirichlet_boundary": [{ "id": 1, "value": ["t", 0] }],
                "neumann_boundary": ["x", "y"]
            }),
            probes: vec![probe(1, &[0.5, 0.25])],
        };
        let problem = initialize_problem(&file).unwrap();
        let probes = initialize_probes(&file.probes).unwrap();
        let samples = sample_problem(problem.as_ref(), &probes, file.time).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].values.row(0).to_vec(), vec![0.0, -9.81]);
        assert_eq!(samples[1].values.row(0).to_vec(), vec![2.0, 0.0]);
        assert_eq!(samples[2].values.row(0).to_vec(), vec![0.5, 0.25]);
    }
}
