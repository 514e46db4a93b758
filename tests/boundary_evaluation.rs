use approx::assert_relative_eq;
use generic_problem::expression::Expression;
use generic_problem::mesh::{BoundaryPrimitive, FacetTags, TagResolver};
use generic_problem::problem::{self, GenericScalarProblem, GenericTensorProblem, Problem};
use ndarray::{Array2, s};
use serde_json::Value;

const SCALAR_CONFIG: &str = r#"{
    "rhs": "1e-11",
    "dirichlet_boundary": [
        { "id": 1, "value": "x+y" },
        { "id": 2, "value": "0" }
    ],
    "neumann_boundary": "sin(pi * x) * exp(-t)"
}"#;

/// Unit square facets along the boundary, tagged by side.
fn unit_square(n: usize) -> (FacetTags, Vec<BoundaryPrimitive>, Array2<f64>) {
    let mut facets = Vec::new();
    for i in 0..n {
        let s = (i as f64 + 0.5) / n as f64;
        facets.push((BoundaryPrimitive::new(i, 0), [0.0, s, 0.0]));
        facets.push((BoundaryPrimitive::new(i, 1), [s, 0.0, 0.0]));
        facets.push((BoundaryPrimitive::new(i, 2), [1.0, s, 0.0]));
        facets.push((BoundaryPrimitive::new(i, 3), [s, 1.0, 0.0]));
    }
    let mut tags = FacetTags::new(0);
    assert_eq!(tags.tag_bounding_box_sides(&facets, 1e-12), facets.len());
    let primitives = facets.iter().map(|(primitive, _)| *primitive).collect();
    let mut points = Array2::zeros((facets.len(), 2));
    for (i, (_, centroid)) in facets.iter().enumerate() {
        points[[i, 0]] = centroid[0];
        points[[i, 1]] = centroid[1];
    }
    (tags, primitives, points)
}

#[test]
fn scalar_problem_from_json_text() {
    let params: Value = serde_json::from_str(SCALAR_CONFIG).unwrap();
    let problem = GenericScalarProblem::with_params("GenericScalar", &params).unwrap();
    assert!(problem.is_scalar());
    assert!(problem.is_source_zero());

    let mut tags = FacetTags::new(0);
    tags.insert(BoundaryPrimitive::new(10, 2), 1);
    tags.insert(BoundaryPrimitive::new(11, 0), 2);
    let primitives = [BoundaryPrimitive::new(10, 2), BoundaryPrimitive::new(11, 0)];
    let pts = ndarray::array![[2.0, 3.0, 0.0], [1.0, 1.0, 1.0]];
    let uv = Array2::zeros((2, 2));
    let mut val = Array2::zeros((2, 1));
    problem
        .dirichlet_value(&tags, &primitives, uv.view(), pts.view(), 0.0, val.view_mut())
        .unwrap();
    assert_relative_eq!(val[[0, 0]], 5.0);
    assert_relative_eq!(val[[1, 0]], 0.0);

    problem
        .neumann_value(&tags, &primitives, uv.view(), pts.view(), 1.0, val.view_mut())
        .unwrap();
    let expected = (std::f64::consts::PI * 2.0).sin() * (-1.0f64).exp();
    assert_relative_eq!(val[[0, 0]], expected, epsilon = 1e-12);
}

#[test]
fn dirichlet_writes_only_into_caller_rows() {
    let params: Value = serde_json::from_str(SCALAR_CONFIG).unwrap();
    let problem = GenericScalarProblem::with_params("GenericScalar", &params).unwrap();
    let mut tags = FacetTags::new(2);
    tags.insert(BoundaryPrimitive::new(0, 0), 1);
    let primitives = [BoundaryPrimitive::new(0, 0)];
    let pts = ndarray::array![[1.0, 1.5]];
    let uv = Array2::zeros((1, 1));
    let mut buffer = Array2::from_elem((3, 1), -1.0);
    problem
        .dirichlet_value(
            &tags,
            &primitives,
            uv.view(),
            pts.view(),
            0.0,
            buffer.slice_mut(s![1..2, ..]),
        )
        .unwrap();
    assert_eq!(buffer.column(0).to_vec(), vec![-1.0, 2.5, -1.0]);
}

#[test]
fn tensor_problem_on_tagged_square() {
    let params: Value = serde_json::from_str(
        r#"{
            "rhs": [0, 0],
            "dirichlet_boundary": [
                { "id": 1, "value": [0, 0] },
                { "id": 3, "value": ["0.1 * t", 0], "dimension": [true, false] }
            ],
            "neumann_boundary": [
                { "id": 2, "value": [0, "-y"] },
                { "id": 4, "value": [0, "-1"] }
            ]
        }"#,
    )
    .unwrap();
    let mut problem = problem::make("GenericTensor").unwrap();
    problem.configure(&params).unwrap();
    assert!(!problem.is_scalar());
    assert!(problem.is_source_zero());
    assert!(!problem.all_dimensions_dirichlet());
    assert!(problem.is_dimension_dirichlet(1, 1));
    assert!(!problem.is_dimension_dirichlet(3, 1));

    let (tags, primitives, pts) = unit_square(4);
    let uv = Array2::zeros((pts.nrows(), 1));
    let mut val = Array2::zeros((pts.nrows(), 2));
    // sides 2 and 4 carry no Dirichlet entry
    let err = problem
        .dirichlet_value(&tags, &primitives, uv.view(), pts.view(), 1.0, val.view_mut())
        .unwrap_err();
    assert!(err.is_lookup_error());

    problem
        .neumann_value(
            &tags,
            &primitives[1..2],
            uv.slice(s![1..2, ..]),
            pts.slice(s![1..2, ..]),
            0.0,
            val.slice_mut(s![1..2, ..]),
        )
        .unwrap();
    assert_eq!(val.row(1).to_vec(), vec![0.0, 0.0]);

    let right: Vec<usize> = (0..primitives.len())
        .filter(|&i| tags.resolve_tag(primitives[i].element, primitives[i].local_index) == 3)
        .collect();
    assert_eq!(right.len(), 4);
    let right_pts = pts.select(ndarray::Axis(0), &right);
    let right_primitives: Vec<_> = right.iter().map(|&i| primitives[i]).collect();
    let mut right_val = Array2::zeros((right.len(), 2));
    problem
        .dirichlet_value(
            &tags,
            &right_primitives,
            Array2::zeros((right.len(), 1)).view(),
            right_pts.view(),
            2.0,
            right_val.view_mut(),
        )
        .unwrap();
    for row in right_val.rows() {
        assert_relative_eq!(row[0], 0.2, epsilon = 1e-15);
        assert_eq!(row[1], 0.0);
    }
}

#[test]
fn concurrent_evaluation_after_configuration() {
    let params: Value =
        serde_json::from_str(r#"{ "dirichlet_boundary": ["x * t", "y * t", "z * t"] }"#).unwrap();
    let problem = GenericTensorProblem::with_params("GenericTensor", &params).unwrap();
    let tags = FacetTags::new(0);
    let n = 64;
    let pts = Array2::from_shape_fn((n, 3), |(i, d)| (i * 3 + d) as f64);
    let primitives: Vec<_> = (0..n).map(|i| BoundaryPrimitive::new(i, 0)).collect();
    let mut val = Array2::zeros((n, 3));
    let chunk = n / 4;
    std::thread::scope(|scope| {
        for (k, out) in val.axis_chunks_iter_mut(ndarray::Axis(0), chunk).enumerate() {
            let problem = &problem;
            let tags = &tags;
            let pts = pts.slice(s![k * chunk..(k + 1) * chunk, ..]);
            let primitives = &primitives[k * chunk..(k + 1) * chunk];
            scope.spawn(move || {
                let uv = Array2::zeros((chunk, 2));
                problem
                    .dirichlet_value(tags, primitives, uv.view(), pts, 2.0, out)
                    .unwrap();
            });
        }
    });
    assert_eq!(val, &pts * 2.0);
}

#[test]
fn expression_engine_contract() {
    let expression = Expression::compile("x*x+y*y").unwrap();
    assert_relative_eq!(expression.evaluate(3.0, 4.0, 0.0, 0.0), 25.0);
    assert!(Expression::compile("x*").is_err());
}
