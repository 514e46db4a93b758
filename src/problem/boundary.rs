use hashbrown::HashMap;
use ndarray::{ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};

use crate::expression::ExpressionValue;
use crate::io::param_parser::{BoundaryParam, ValueParam};
use crate::mesh::{BoundaryPrimitive, BoundaryTag, TagResolver};
use crate::problem::ProblemError;

/// Boundary data either shared by every tag or looked up per tag.
#[derive(Clone, Debug, PartialEq)]
pub enum BoundaryTable<T> {
    Uniform(T),
    PerTag(HashMap<BoundaryTag, T>),
}
impl<T> Default for BoundaryTable<T> {
    fn default() -> Self {
        Self::PerTag(HashMap::new())
    }
}
impl<T> BoundaryTable<T> {
    pub fn from_param(
        key: &str,
        param: &BoundaryParam,
        convert: impl Fn(&str, &ValueParam) -> Result<T, ProblemError>,
    ) -> Result<Self, ProblemError> {
        match param {
            BoundaryParam::Uniform(value) => Ok(Self::Uniform(convert(key, value)?)),
            BoundaryParam::PerTag(entries) => {
                let mut table = HashMap::with_capacity(entries.len());
                for (i, entry) in entries.iter().enumerate() {
                    let value = convert(&format!("{key}[{i}].value"), &entry.value)?;
                    if table.insert(entry.id, value).is_some() {
                        return Err(ProblemError::DuplicateTag {
                            key: key.to_string(),
                            tag: entry.id,
                        });
                    }
                }
                Ok(Self::PerTag(table))
            }
        }
    }
    pub fn is_uniform(&self) -> bool {
        matches!(self, Self::Uniform(_))
    }
    pub fn len(&self) -> usize {
        match self {
            Self::Uniform(_) => 1,
            Self::PerTag(table) => table.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn get(&self, tag: BoundaryTag) -> Option<&T> {
        match self {
            Self::Uniform(value) => Some(value),
            Self::PerTag(table) => table.get(&tag),
        }
    }
    /// Value for the facet `primitive`. Uniform tables never consult `mesh`.
    pub fn select(
        &self,
        table_name: &'static str,
        mesh: &dyn TagResolver,
        primitive: &BoundaryPrimitive,
    ) -> Result<&T, ProblemError> {
        match self {
            Self::Uniform(value) => Ok(value),
            Self::PerTag(table) => {
                let tag = mesh.resolve_tag(primitive.element, primitive.local_index);
                table.get(&tag).ok_or(ProblemError::UnknownTag {
                    table: table_name,
                    tag,
                })
            }
        }
    }
}

/// Which spatial dimensions of a tensor Dirichlet entry are constrained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DimensionMask([bool; 3]);
impl Default for DimensionMask {
    fn default() -> Self {
        Self([true; 3])
    }
}
impl DimensionMask {
    /// Accepts 2 or 3 flags; a missing third flag stays constrained.
    pub fn from_flags(key: &str, flags: &[bool]) -> Result<Self, ProblemError> {
        if !(2..=3).contains(&flags.len()) {
            return Err(ProblemError::Arity {
                key: key.to_string(),
                expected: "2 or 3",
                found: flags.len(),
            });
        }
        let mut mask = [true; 3];
        mask[..flags.len()].copy_from_slice(flags);
        Ok(Self(mask))
    }
    pub fn is_dirichlet(&self, dim: usize) -> bool {
        self.0.get(dim).copied().unwrap_or(false)
    }
}

pub trait FieldValue {
    fn write(&self, x: f64, y: f64, z: f64, t: f64, out: ArrayViewMut1<f64>);
}
impl FieldValue for ExpressionValue {
    fn write(&self, x: f64, y: f64, z: f64, t: f64, mut out: ArrayViewMut1<f64>) {
        out[0] = self.evaluate(x, y, z, t);
    }
}
impl FieldValue for [ExpressionValue; 3] {
    fn write(&self, x: f64, y: f64, z: f64, t: f64, mut out: ArrayViewMut1<f64>) {
        for (o, component) in out.iter_mut().zip(self.iter()) {
            *o = component.evaluate(x, y, z, t);
        }
    }
}

pub fn point_coords(point: ArrayView1<f64>) -> (f64, f64, f64) {
    let z = if point.len() > 2 { point[2] } else { 0.0 };
    (point[0], point[1], z)
}

pub fn check_shapes(
    rows: usize,
    pts: &ArrayView2<f64>,
    val: &ArrayViewMut2<f64>,
    value_columns: usize,
) -> Result<(), ProblemError> {
    if !(2..=3).contains(&pts.ncols()) {
        return Err(ProblemError::PointDimension(pts.ncols()));
    }
    if pts.nrows() != rows {
        return Err(ProblemError::ShapeMismatch {
            what: "points",
            found: pts.dim(),
            expected: (rows, pts.ncols()),
        });
    }
    if val.dim() != (rows, value_columns) {
        return Err(ProblemError::ShapeMismatch {
            what: "output buffer",
            found: val.dim(),
            expected: (rows, value_columns),
        });
    }
    Ok(())
}

pub fn evaluate_boundary<T: FieldValue>(
    table: &BoundaryTable<T>,
    table_name: &'static str,
    mesh: &dyn TagResolver,
    primitives: &[BoundaryPrimitive],
    pts: ArrayView2<f64>,
    t: f64,
    mut val: ArrayViewMut2<f64>,
) -> Result<(), ProblemError> {
    for ((primitive, point), row) in primitives
        .iter()
        .zip(pts.rows())
        .zip(val.rows_mut())
    {
        let value = table.select(table_name, mesh, primitive)?;
        let (x, y, z) = point_coords(point);
        value.write(x, y, z, t, row);
    }
    Ok(())
}
