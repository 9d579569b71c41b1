use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Relations: what an explanation establishes
// ---------------------------------------------------------------------------

/// The logical relation an [`Explanation`](crate::explanation::Explanation)
/// establishes between its left and right factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Implies,
    Means,
    Contradicts,
    ConsistentWith,
}

impl Relation {
    /// The connective used when rendering an explanation.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Implies => "IMPLIES",
            Self::Means => "MEANS",
            Self::Contradicts => "CONTRADICTS",
            Self::ConsistentWith => "IS CONSISTENT WITH",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FactorError {
    /// Malformed predicate, statement, assertion or group.
    #[error("construction error: {0}")]
    Construction(String),

    /// Two quantity ranges of kinds with no defined relation.
    #[error("incompatible comparison: {0}")]
    IncompatibleComparison(String),

    #[error("unit conversion error: {0}")]
    UnitConversion(String),

    /// Caller-supplied context that cannot be turned into a register.
    #[error("context format error: {0}")]
    ContextFormat(String),

    #[error("fact file error: {0}")]
    FactFile(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, FactorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_labels() {
        assert_eq!(Relation::Implies.to_string(), "IMPLIES");
        assert_eq!(Relation::Means.to_string(), "MEANS");
        assert_eq!(Relation::Contradicts.to_string(), "CONTRADICTS");
        assert_eq!(Relation::ConsistentWith.to_string(), "IS CONSISTENT WITH");
    }

    #[test]
    fn test_error_display() {
        let err = FactorError::Construction("expected 2 terms, got 3".into());
        assert_eq!(err.to_string(), "construction error: expected 2 terms, got 3");
        let err = FactorError::ContextFormat("unknown term 'Zed'".into());
        assert!(err.to_string().starts_with("context format error"));
    }
}
