//! Dynamic parameter values
//!
//! Ember+ parameter values are a choice of integer, real, string, boolean
//! and octet string. Minimum and maximum fields carry the numeric subset.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A parameter value as carried on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Real(f64),
    String(String),
    Bool(bool),
    Octets(#[serde(with = "serde_bytes")] Vec<u8>),
}

impl Value {
    /// The numeric value as an `f64`, if this value is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Real(x) => Some(*x),
            _ => None,
        }
    }

    /// The integral value, if this value is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// The string value, if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Real(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Octets(o) => write!(f, "{} bytes", o.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Real(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// A parameter minimum or maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MinMax {
    Integer(i64),
    Real(f64),
}

impl MinMax {
    /// The numeric value as an `f64`.
    pub fn as_f64(&self) -> f64 {
        match self {
            MinMax::Integer(n) => *n as f64,
            MinMax::Real(x) => *x,
        }
    }

    /// Widen to a full `Value`.
    pub fn to_value(&self) -> Value {
        match self {
            MinMax::Integer(n) => Value::Integer(*n),
            MinMax::Real(x) => Value::Real(*x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_f64() {
        assert_eq!(Value::Integer(5).as_f64(), Some(5.0));
        assert_eq!(Value::Real(0.5).as_f64(), Some(0.5));
        assert_eq!(Value::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_min_max() {
        assert_eq!(MinMax::Integer(-3).to_value(), Value::Integer(-3));
        assert_eq!(MinMax::Real(1.5).as_f64(), 1.5);
    }
}
