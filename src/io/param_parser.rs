use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;

use crate::expression::ExpressionValue;
use crate::mesh::BoundaryTag;
use crate::problem::ProblemError;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ComponentParam {
    Number(f64),
    Text(String),
}
impl ComponentParam {
    pub fn to_value(&self) -> Result<ExpressionValue, ProblemError> {
        match self {
            ComponentParam::Number(v) => Ok(ExpressionValue::Constant(*v)),
            ComponentParam::Text(text) => Ok(ExpressionValue::from_text(text)?),
        }
    }
}

/// A value as written in the configuration: a number, an expression string, or an array of
/// either (one per component).
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ValueParam {
    Number(f64),
    Text(String),
    Components(Vec<ComponentParam>),
}
impl ValueParam {
    pub fn len(&self) -> usize {
        match self {
            ValueParam::Number(_) | ValueParam::Text(_) => 1,
            ValueParam::Components(components) => components.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn to_scalar(&self, key: &str) -> Result<ExpressionValue, ProblemError> {
        match self {
            ValueParam::Number(v) => Ok(ExpressionValue::Constant(*v)),
            ValueParam::Text(text) => Ok(ExpressionValue::from_text(text)?),
            ValueParam::Components(components) if components.len() == 1 => components[0].to_value(),
            ValueParam::Components(components) => Err(ProblemError::Arity {
                key: key.to_string(),
                expected: "1",
                found: components.len(),
            }),
        }
    }
    /// Two or three components; an unset third component stays zero.
    pub fn to_vector(&self, key: &str) -> Result<[ExpressionValue; 3], ProblemError> {
        let ValueParam::Components(components) = self else {
            return Err(ProblemError::Arity {
                key: key.to_string(),
                expected: "2 or 3",
                found: 1,
            });
        };
        if !(2..=3).contains(&components.len()) {
            return Err(ProblemError::Arity {
                key: key.to_string(),
                expected: "2 or 3",
                found: components.len(),
            });
        }
        let mut values: [ExpressionValue; 3] = Default::default();
        for (value, component) in values.iter_mut().zip(components) {
            *value = component.to_value()?;
        }
        Ok(values)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct BoundaryEntryParam {
    pub id: BoundaryTag,
    pub value: ValueParam,
    #[serde(default)]
    pub dimension: Option<Vec<bool>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryParam {
    Uniform(ValueParam),
    PerTag(Vec<BoundaryEntryParam>),
}
impl BoundaryParam {
    /// A non-empty array of objects is a per-tag list, anything else a uniform value. An empty
    /// array is an empty component list, which fails the arity check of either problem.
    pub fn from_json(key: &str, value: &Value) -> Result<Self, ProblemError> {
        if let Value::Array(items) = value {
            if !items.is_empty() && items.iter().all(Value::is_object) {
                let mut entries = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    for required in ["id", "value"] {
                        if item.get(required).is_none() {
                            return Err(ProblemError::MissingKey(format!(
                                "{key}[{i}].{required}"
                            )));
                        }
                    }
                    let entry = BoundaryEntryParam::deserialize(item).map_err(|err| {
                        ProblemError::Malformed {
                            key: format!("{key}[{i}]"),
                            reason: err.to_string(),
                        }
                    })?;
                    entries.push(entry);
                }
                return Ok(BoundaryParam::PerTag(entries));
            }
        }
        Ok(BoundaryParam::Uniform(parse_key(key, value)?))
    }
}

/// The recognised keys of a problem configuration. All of them are optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProblemParams {
    pub rhs: Option<ValueParam>,
    pub dirichlet_boundary: Option<BoundaryParam>,
    pub neumann_boundary: Option<BoundaryParam>,
    pub all_dimensions_dirichlet: Option<bool>,
}
impl ProblemParams {
    pub fn from_json(params: &Value) -> Result<Self, ProblemError> {
        let Value::Object(map) = params else {
            return Err(ProblemError::Malformed {
                key: "params".to_string(),
                reason: "expected a JSON object".to_string(),
            });
        };
        Ok(Self {
            rhs: optional(map, "rhs", parse_key)?,
            dirichlet_boundary: optional(map, "dirichlet_boundary", BoundaryParam::from_json)?,
            neumann_boundary: optional(map, "neumann_boundary", BoundaryParam::from_json)?,
            all_dimensions_dirichlet: optional(map, "all_dimensions_dirichlet", parse_key)?,
        })
    }
}

fn optional<T>(
    map: &Map<String, Value>,
    key: &str,
    parse: impl Fn(&str, &Value) -> Result<T, ProblemError>,
) -> Result<Option<T>, ProblemError> {
    map.get(key).map(|value| parse(key, value)).transpose()
}

fn parse_key<T: DeserializeOwned>(key: &str, value: &Value) -> Result<T, ProblemError> {
    T::deserialize(value).map_err(|err| ProblemError::Malformed {
        key: key.to_string(),
        reason: err.to_string(),
    })
}

#[derive(Deserialize, Debug, Clone)]
pub struct Probe {
    pub tag: BoundaryTag,
    pub point: Vec<f64>,
}

/// Input file of the driver binary: which problem to build, its configuration, and the points
/// to sample.
#[derive(Deserialize, Debug)]
pub struct ProblemFileParser {
    pub problem: String,
    #[serde(default)]
    pub time: f64,
    pub params: Value,
    #[serde(default)]
    pub probes: Vec<Probe>,
}
impl ProblemFileParser {
    pub fn parse(file_path: &str) -> Result<Self, ProblemError> {
        let file_content = fs::read_to_string(file_path)?;
        let file: ProblemFileParser = serde_json::from_str(&file_content)?;
        Ok(file)
    }
}
