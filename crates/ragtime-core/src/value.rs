//! Dynamic values for terminals, attribute arguments, and attribute results.
//!
//! Attribute equations are supplied by the grammar author and may produce
//! any of a closed set of value shapes, including references to AST nodes
//! (as in a symbol-table lookup attribute). [`Value`] implements `Eq` and
//! `Hash` — floats compare by bit pattern — so argument tuples can key the
//! memoization cache.

use std::fmt;

use thiserror::Error;

/// Stable identity of an AST node within its tree's arena.
///
/// `NodeId` is an index, not a pointer: node storage is owned by the tree
/// and ids stay valid for the tree's lifetime, including across rewrites
/// that detach the node from its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Build an id from a raw arena index.
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// The raw arena index.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Mismatch between a value's runtime shape and the shape a caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected} value, found {found}")]
pub struct TypeError {
    /// Shape the accessor asked for.
    pub expected: &'static str,
    /// Shape the value actually has.
    pub found: &'static str,
}

/// A dynamically typed engine value.
///
/// Terminal slots, attribute arguments, and attribute results all carry
/// `Value`s. The set of shapes is closed; there is no user-extensible
/// payload.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Node(NodeId),
}

impl Value {
    /// Name of this value's shape, for error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Node(_) => "node",
        }
    }

    /// Read the value as a boolean.
    pub fn as_bool(&self) -> Result<bool, TypeError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(other.mismatch("bool")),
        }
    }

    /// Read the value as an integer.
    pub fn as_int(&self) -> Result<i64, TypeError> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(other.mismatch("int")),
        }
    }

    /// Read the value as a float. Integers widen losslessly enough for
    /// grammar terminals, so `Int` is accepted too.
    pub fn as_float(&self) -> Result<f64, TypeError> {
        match self {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            other => Err(other.mismatch("float")),
        }
    }

    /// Borrow the value as a string slice.
    pub fn as_str(&self) -> Result<&str, TypeError> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    /// Read the value as a node reference.
    pub fn as_node(&self) -> Result<NodeId, TypeError> {
        match self {
            Value::Node(n) => Ok(*n),
            other => Err(other.mismatch("node")),
        }
    }

    fn mismatch(&self, expected: &'static str) -> TypeError {
        TypeError {
            expected,
            found: self.shape(),
        }
    }
}

// Cache keys need `Eq + Hash`. Floats compare by bit pattern, which makes
// NaN equal to itself and distinguishes 0.0 from -0.0; both are the right
// behavior for a memoization key.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Str(s) => s.hash(state),
            Value::Node(n) => n.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Node(n) => write!(f, "{n}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<NodeId> for Value {
    fn from(n: NodeId) -> Self {
        Value::Node(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_check_shape() {
        let v = Value::from(2.5);
        assert_eq!(v.as_float().unwrap(), 2.5);
        let err = v.as_str().unwrap_err();
        assert_eq!(err.expected, "string");
        assert_eq!(err.found, "float");
    }

    #[test]
    fn int_widens_to_float() {
        assert_eq!(Value::from(3i64).as_float().unwrap(), 3.0);
    }

    #[test]
    fn float_equality_is_bitwise() {
        assert_eq!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert_ne!(Value::from(0.0), Value::from(-0.0));
    }

    #[test]
    fn node_ids_round_trip() {
        let id = NodeId::from_index(7);
        assert_eq!(Value::from(id).as_node().unwrap(), id);
        assert_eq!(id.index(), 7);
    }
}
