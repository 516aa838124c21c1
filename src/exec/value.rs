//! Runtime values flowing through tuple batches.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single runtime value.
///
/// Values appear in tuple rows, constant expressions, and variable
/// bindings. Comparison between mismatched numeric kinds promotes
/// integers to doubles.
#[derive(Debug, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum Value {
    /// Null/missing value.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit floating point number.
    Double(f64),
    /// UTF-8 string.
    String(String),
}

impl Value {
    /// Returns `true` if this is the null value.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the value as an integer row count, if it is one.
    ///
    /// Used for limit/offset expressions, which resolve to integers.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Compares two values for binding equality.
    ///
    /// Null never equals anything, including null; numeric kinds are
    /// promoted before comparison.
    #[must_use]
    pub fn equals(&self, other: &Self) -> Option<bool> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => None,
            #[allow(clippy::cast_precision_loss)]
            (Self::Integer(i), Self::Double(d)) | (Self::Double(d), Self::Integer(i)) => {
                Some((*i as f64 - d).abs() == 0.0)
            }
            (a, b) => Some(a == b),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::String(s) => write!(f, "'{s}'"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_never_equal() {
        assert_eq!(Value::Null.equals(&Value::Null), None);
        assert_eq!(Value::Null.equals(&Value::Integer(1)), None);
    }

    #[test]
    fn numeric_promotion() {
        assert_eq!(Value::Integer(5).equals(&Value::Double(5.0)), Some(true));
        assert_eq!(Value::Double(5.5).equals(&Value::Integer(5)), Some(false));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::from("x").to_string(), "'x'");
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Integer(42).to_string(), "42");
    }
}
