use csv::Writer;
use ndarray::{Array2, ArrayView1};
use serde::Serialize;

use crate::mesh::BoundaryTag;

/// One evaluated quantity over a batch of points.
#[derive(Debug, Clone)]
pub struct SampledValues {
    pub quantity: &'static str,
    pub tags: Vec<BoundaryTag>,
    pub points: Array2<f64>,
    pub values: Array2<f64>,
}

#[derive(Serialize)]
struct PointData {
    quantity: &'static str,
    tag: BoundaryTag,
    x: f64,
    y: f64,
    z: f64,
    v0: f64,
    v1: Option<f64>,
    v2: Option<f64>,
}
impl PointData {
    fn new(quantity: &'static str, tag: BoundaryTag, point: ArrayView1<f64>, value: ArrayView1<f64>) -> Self {
        Self {
            quantity,
            tag,
            x: point[0],
            y: point[1],
            z: point.get(2).copied().unwrap_or(0.0),
            v0: value[0],
            v1: value.get(1).copied(),
            v2: value.get(2).copied(),
        }
    }
}

pub fn write_samples<W: std::io::Write>(
    writer: &mut Writer<W>,
    samples: &[SampledValues],
) -> Result<(), csv::Error> {
    for sample in samples {
        for ((tag, point), value) in sample
            .tags
            .iter()
            .zip(sample.points.rows())
            .zip(sample.values.rows())
        {
            writer.serialize(PointData::new(sample.quantity, *tag, point, value))?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_to_csv(samples: &[SampledValues], filename: &str) -> Result<(), csv::Error> {
    let mut writer = Writer::from_path(filename)?;
    write_samples(&mut writer, samples)
}
