//! The scene-backend capability the core is written against.
//!
//! Everything a component emits — joints, transforms, constraints, driven
//! attributes — goes through this trait. The core never assumes a specific
//! host's command names; a host adapter implements [`Scene`] over its own
//! API, and the fixtures crate ships an in-memory implementation for tests.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Scene node handle. Hosts map this onto whatever their native handle is;
/// ids are opaque to the core apart from equality.
pub type NodeId = String;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SceneError {
    #[error("node not found: {id}")]
    NodeNotFound { id: String },

    #[error("attribute not found: {attr} on {id}")]
    AttrNotFound { id: String, attr: String },

    #[error("invalid scene operation: {reason}")]
    InvalidOp { reason: String },

    #[error("scene backend error: {reason}")]
    Backend { reason: String },
}

impl SceneError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        SceneError::InvalidOp {
            reason: reason.into(),
        }
    }
}

/// Declaration data for a dynamic node attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttrSpec {
    pub default: Value,
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub keyable: bool,
}

impl AttrSpec {
    pub fn scalar(default: f32, min: Option<f32>, max: Option<f32>) -> Self {
        AttrSpec {
            default: Value::Float(default),
            min,
            max,
            keyable: true,
        }
    }

    pub fn bool(default: bool) -> Self {
        AttrSpec {
            default: Value::Bool(default),
            min: None,
            max: None,
            keyable: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintKind {
    Parent,
    Point,
    Orient,
    Scale,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConstraintOptions {
    /// Blend rotations along the shortest arc (avoids flips near 180°).
    pub interp_shortest: bool,
    /// Preserve the driven node's offset at constraint creation time.
    pub maintain_offset: bool,
}

impl ConstraintOptions {
    pub fn shortest() -> Self {
        ConstraintOptions {
            interp_shortest: true,
            maintain_offset: false,
        }
    }
}

/// Narrow capability set over the host scene graph (see DESIGN.md).
///
/// All mutating calls are globally ordered side effects: the host's main
/// thread owns the scene graph and components run strictly one at a time.
pub trait Scene {
    fn create_node(&mut self, kind: &str, name: &str) -> Result<NodeId, SceneError>;
    fn delete(&mut self, id: &NodeId) -> Result<(), SceneError>;
    fn exists(&self, id: &NodeId) -> bool;
    fn node_kind(&self, id: &NodeId) -> Result<String, SceneError>;

    fn set_parent(&mut self, id: &NodeId, parent: Option<&NodeId>) -> Result<(), SceneError>;
    fn parent(&self, id: &NodeId) -> Result<Option<NodeId>, SceneError>;

    fn world_matrix(&self, id: &NodeId) -> Result<[f32; 16], SceneError>;
    fn set_world_matrix(&mut self, id: &NodeId, m: [f32; 16]) -> Result<(), SceneError>;
    fn local_matrix(&self, id: &NodeId) -> Result<[f32; 16], SceneError>;
    fn set_local_matrix(&mut self, id: &NodeId, m: [f32; 16]) -> Result<(), SceneError>;

    fn add_attribute(&mut self, id: &NodeId, name: &str, spec: AttrSpec)
        -> Result<(), SceneError>;
    fn get_attr(&self, id: &NodeId, name: &str) -> Result<Value, SceneError>;
    fn set_attr(&mut self, id: &NodeId, name: &str, value: Value) -> Result<(), SceneError>;
    fn connect(
        &mut self,
        src: &NodeId,
        src_attr: &str,
        dst: &NodeId,
        dst_attr: &str,
    ) -> Result<(), SceneError>;

    fn create_constraint(
        &mut self,
        kind: ConstraintKind,
        drivers: &[NodeId],
        driven: &NodeId,
        options: ConstraintOptions,
    ) -> Result<NodeId, SceneError>;

    /// Weight attribute names on a constraint node, in driver order.
    fn constraint_weight_attrs(&self, id: &NodeId) -> Result<Vec<String>, SceneError>;
}
