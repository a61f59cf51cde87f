//! Column values and the canonical key ordering used by every index.
//!
//! All comparisons in the engine go through `Ord for Value`, and every value
//! entering the engine (record cells, search arguments, imported fields) is
//! passed through [`Value::normalized`] first, so `"42"` and `42` always
//! compare equal no matter where they came from.

use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single cell value, also used as an index key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

fn int_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?[0-9]+$").expect("valid pattern"))
}

fn float_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?[0-9]+\.[0-9]+$").expect("valid pattern"))
}

impl Value {
    /// Parse a raw input string (shell argument, CSV field) into a value,
    /// converting numeric-looking text up front.
    pub fn from_input(raw: &str) -> Self {
        Value::Text(raw.to_string()).normalized()
    }

    /// Convert syntactically numeric text to its numeric form.
    ///
    /// `"42"` becomes `Int(42)`, `"3.5"` becomes `Float(3.5)`; anything else
    /// (including integer literals too large for i64) is left as-is. This is
    /// the single conversion point for the whole engine.
    pub fn normalized(self) -> Self {
        match self {
            Value::Text(s) => {
                if int_pattern().is_match(&s) {
                    match s.parse::<i64>() {
                        Ok(i) => Value::Int(i),
                        Err(_) => Value::Text(s),
                    }
                } else if float_pattern().is_match(&s) {
                    match s.parse::<f64>() {
                        Ok(f) if f.is_finite() => Value::Float(f),
                        _ => Value::Text(s),
                    }
                } else {
                    Value::Text(s)
                }
            }
            other => other,
        }
    }

    /// Check if this value is numeric (Int or Float)
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }
}

/// Total order over heterogeneous values: numbers compare numerically
/// (`Int(3) == Float(3.0)`), text compares lexicographically, and any
/// number sorts before any text.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Int(_) | Value::Float(_), Value::Text(_)) => Ordering::Less,
            (Value::Text(_), Value::Int(_) | Value::Float(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
        }
    }
}
