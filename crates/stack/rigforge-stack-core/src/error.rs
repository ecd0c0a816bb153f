//! Error taxonomy for the stack engine.
//!
//! Validation, resolution, guide-state and scene failures are contained per
//! component inside a [`BuildReport`](crate::report::BuildReport); declaration
//! and unknown-identifier errors are returned eagerly from the mutating call.

use rigforge_api_core::SceneError;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum StackError {
    /// Duplicate attribute declaration, or declaring outside the sanctioned
    /// paths. Programmer error, never recoverable.
    #[error("duplicate attribute declaration '{attribute}' on {component}")]
    Declaration { component: String, attribute: String },

    /// A `validate` attribute is empty at build time, or `is_valid` failed.
    #[error("validation failed for {component}: {reason}")]
    Validation { component: String, reason: String },

    /// An addressed input could not be resolved to a live output.
    #[error("cannot resolve '{attribute}' on {component}: {reason}")]
    Resolution {
        component: String,
        attribute: String,
        reason: String,
    },

    /// Components whose addresses form a loop.
    #[error("dependency cycle between components: {}", members.join(", "))]
    Cycle { members: Vec<String> },

    #[error("unknown component identifier '{identifier}'")]
    UnknownComponent { identifier: String },

    /// Building while a guide is live, or an illegal guide transition.
    #[error("guide state error for {component}: {reason}")]
    GuideState { component: String, reason: String },

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error("serialization error: {reason}")]
    Serde { reason: String },
}

impl StackError {
    pub fn validation(component: impl Into<String>, reason: impl Into<String>) -> Self {
        StackError::Validation {
            component: component.into(),
            reason: reason.into(),
        }
    }

    pub fn resolution(
        component: impl Into<String>,
        attribute: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        StackError::Resolution {
            component: component.into(),
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    pub fn guide(component: impl Into<String>, reason: impl Into<String>) -> Self {
        StackError::GuideState {
            component: component.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for StackError {
    fn from(err: serde_json::Error) -> Self {
        StackError::Serde {
            reason: err.to_string(),
        }
    }
}
