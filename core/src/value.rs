//! The typed value union used throughout the capability schema.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A value attached to a parameter, choice, or job setting.
///
/// The tool's help text carries values in many spellings — plain integers,
/// floats, hex literals, rationals, named limits like `INT_MAX` — and the
/// introspection layer normalizes all of them into this closed union.
/// Untagged serde keeps the on-disk form a plain scalar, so `23`, `2.5` and
/// `"slow"` in a job file deserialize to [`Int`](ParamValue::Int),
/// [`Float`](ParamValue::Float) and [`Text`](ParamValue::Text) respectively.
///
/// # Examples
///
/// ```
/// use ffqueue_core::ParamValue;
///
/// let v: ParamValue = serde_json::from_str("23").unwrap();
/// assert_eq!(v, ParamValue::Int(23));
///
/// let v: ParamValue = serde_json::from_str("\"veryslow\"").unwrap();
/// assert_eq!(v, ParamValue::Text("veryslow".to_string()));
///
/// assert_eq!(ParamValue::Float(0.5).to_string(), "0.5");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Integer value (also the target for hex literals and named limits).
    Int(i64),
    /// Floating-point value (also the target for rationals).
    Float(f64),
    /// Anything that did not coerce to a number.
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_roundtrip_preserves_variant() {
        for value in [
            ParamValue::Int(-7),
            ParamValue::Float(2.5),
            ParamValue::Text("yuv420p".to_string()),
        ] {
            let json = serde_json::to_string(&value).unwrap();
            let back: ParamValue = serde_json::from_str(&json).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn display_renders_plain_scalars() {
        assert_eq!(ParamValue::Int(42).to_string(), "42");
        assert_eq!(ParamValue::Text("copy".into()).to_string(), "copy");
        assert_eq!(ParamValue::Float(29.97).to_string(), "29.97");
    }
}
