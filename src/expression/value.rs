use super::{Expression, ExpressionError};

/// A boundary or source value as it appears in a problem configuration: either a plain
/// number or an expression of `x`, `y`, `z`, `t`. Defaults to zero, which is also what an
/// unset vector component evaluates to.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionValue {
    Constant(f64),
    Expression(Expression),
}
impl Default for ExpressionValue {
    fn default() -> Self {
        Self::Constant(0.0)
    }
}
impl From<f64> for ExpressionValue {
    fn from(value: f64) -> Self {
        Self::Constant(value)
    }
}
impl ExpressionValue {
    /// Compiles `text`, folding it to a constant when it references no variable.
    pub fn from_text(text: &str) -> Result<Self, ExpressionError> {
        let expression = Expression::compile(text)?;
        if expression.is_constant() {
            Ok(Self::Constant(expression.evaluate(0.0, 0.0, 0.0, 0.0)))
        } else {
            Ok(Self::Expression(expression))
        }
    }
    pub fn evaluate(&self, x: f64, y: f64, z: f64, t: f64) -> f64 {
        match self {
            Self::Constant(value) => *value,
            Self::Expression(expression) => expression.evaluate(x, y, z, t),
        }
    }
    pub fn as_constant(&self) -> Option<f64> {
        match self {
            Self::Constant(value) => Some(*value),
            Self::Expression(_) => None,
        }
    }
}
