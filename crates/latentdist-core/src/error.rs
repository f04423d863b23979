//! Error taxonomy for the latent distribution test.
//!
//! Every error is either a *type* error (an argument of the wrong kind, e.g. a
//! string where an integer is expected) or a *value* error (right kind, invalid
//! content: out of range, wrong shape, non-finite, numerically degenerate).

use latentdist_stats::StatsError;
use thiserror::Error;

/// Coarse classification of an [`LdtError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Argument has the wrong type.
    Type,
    /// Argument has the right type but an invalid value.
    Value,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Type => write!(f, "TypeError"),
            Self::Value => write!(f, "ValueError"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LdtError {
    #[error("{param} must be {expected}, got {found}")]
    InvalidType {
        param: String,
        expected: String,
        found: String,
    },

    #[error("invalid {param}: {reason}")]
    InvalidValue { param: String, reason: String },

    #[error(
        "input graphs do not have the same directedness; consider symmetrizing the directed graph"
    )]
    DirectednessMismatch,

    #[error("embeddings have different numbers of components: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("{input} input must be 2-dimensional, got {ndim} dimension(s)")]
    NotTwoDimensional { input: &'static str, ndim: usize },

    #[error("{input} input contains NaN or infinite values")]
    NonFinite { input: &'static str },

    #[error("numerical failure in {stage}: {reason}")]
    Numerical { stage: &'static str, reason: String },

    #[error(transparent)]
    Stats(#[from] StatsError),
}

impl LdtError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidType { .. } => ErrorKind::Type,
            _ => ErrorKind::Value,
        }
    }

    pub fn is_type_error(&self) -> bool {
        self.kind() == ErrorKind::Type
    }

    pub fn is_value_error(&self) -> bool {
        self.kind() == ErrorKind::Value
    }

    pub(crate) fn invalid_type(
        param: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::InvalidType {
            param: param.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub(crate) fn invalid_value(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            param: param.into(),
            reason: reason.into(),
        }
    }
}

/// Short description of a JSON value's type, for error messages.
pub(crate) fn describe_json(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("bool ({b})"),
        Value::Number(n) if n.is_f64() => format!("float ({n})"),
        Value::Number(n) => format!("int ({n})"),
        Value::String(s) => format!("string ({s:?})"),
        Value::Array(a) => format!("array of length {}", a.len()),
        Value::Object(_) => "mapping".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            LdtError::invalid_type("test", "a string", "int (0)").kind(),
            ErrorKind::Type
        );
        assert!(LdtError::invalid_value("n_bootstraps", "must be positive").is_value_error());
        assert!(LdtError::DirectednessMismatch.is_value_error());
        assert!(LdtError::from(StatsError::NoReplicates).is_value_error());
    }

    #[test]
    fn test_messages() {
        let e = LdtError::DimensionMismatch { left: 2, right: 1 };
        assert_eq!(
            e.to_string(),
            "embeddings have different numbers of components: 2 vs 1"
        );
        assert_eq!(ErrorKind::Type.to_string(), "TypeError");
    }

    #[test]
    fn test_describe_json() {
        assert_eq!(describe_json(&serde_json::json!(0.5)), "float (0.5)");
        assert_eq!(describe_json(&serde_json::json!(-3)), "int (-3)");
        assert_eq!(describe_json(&serde_json::json!({"a": 1})), "mapping");
    }
}
