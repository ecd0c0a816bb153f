//! Value: the tagged union every rig attribute stores.
//!
//! Rig data is heterogeneous by nature (node names, blend scalars, matrices,
//! nested space-switch definitions), so the payload type stays dynamic. All
//! numeric data is f32.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Lightweight kind enum for pattern-matching and quick dispatch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Float,
    Bool,
    Text,
    NodeRef,
    Vec3,
    Quat,
    Matrix,
    List,
    Record,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    /// Unset / empty slot.
    Null,

    /// Scalar float
    Float(f32),

    /// Boolean
    Bool(bool),

    /// Text / string
    Text(String),

    /// Reference to a scene node by id.
    NodeRef(String),

    /// 3D vector
    Vec3([f32; 3]),

    /// Quaternion (x, y, z, w)
    Quat([f32; 4]),

    /// 4x4 matrix, column major
    Matrix([f32; 16]),

    /// Ordered heterogeneous list
    List(Vec<Value>),

    /// String-keyed nested mapping
    Record(HashMap<String, Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    /// Return the coarse kind of this value.
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Text(_) => ValueKind::Text,
            Value::NodeRef(_) => ValueKind::NodeRef,
            Value::Vec3(_) => ValueKind::Vec3,
            Value::Quat(_) => ValueKind::Quat,
            Value::Matrix(_) => ValueKind::Matrix,
            Value::List(_) => ValueKind::List,
            Value::Record(_) => ValueKind::Record,
        }
    }

    /// True when the value counts as "empty" for validation purposes.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::NodeRef(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Convenience constructors
    pub fn f(v: f32) -> Self {
        Value::Float(v)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn node(id: impl Into<String>) -> Self {
        Value::NodeRef(id.into())
    }

    pub fn vec3(x: f32, y: f32, z: f32) -> Self {
        Value::Vec3([x, y, z])
    }

    pub fn quat(x: f32, y: f32, z: f32, w: f32) -> Self {
        Value::Quat([x, y, z, w])
    }

    /// Checked accessors
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Float(v) => Some(*v != 0.0),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Node references accept plain text too: persisted stacks routinely
    /// store joint names typed in by the rigger.
    pub fn as_node(&self) -> Option<&str> {
        match self {
            Value::NodeRef(s) => Some(s),
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<[f32; 3]> {
        match self {
            Value::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_quat(&self) -> Option<[f32; 4]> {
        match self {
            Value::Quat(q) => Some(*q),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<[f32; 16]> {
        match self {
            Value::Matrix(m) => Some(*m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Record(map) => Some(map),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emptiness() {
        assert!(Value::Null.is_empty());
        assert!(Value::Text(String::new()).is_empty());
        assert!(Value::List(vec![]).is_empty());
        assert!(!Value::Float(0.0).is_empty());
        assert!(!Value::Bool(false).is_empty());
        assert!(!Value::text("joint1").is_empty());
    }

    #[test]
    fn serde_round_trip() {
        let mut map = HashMap::new();
        map.insert("pose".to_string(), Value::Matrix([0.0; 16]));
        let v = Value::List(vec![
            Value::f(1.5),
            Value::node("arm_ik_ctl"),
            Value::Record(map),
        ]);
        let raw = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn node_accessor_accepts_text() {
        assert_eq!(Value::text("upper").as_node(), Some("upper"));
        assert_eq!(Value::node("upper").as_node(), Some("upper"));
        assert_eq!(Value::f(1.0).as_node(), None);
    }
}
