//! rigforge-stack-core
//!
//! The component stack engine: typed attributes, a component trait with a
//! guide lifecycle, a string-identifier registry, and the build orchestrator
//! that resolves cross-component references and reports per-component
//! outcomes.

pub mod attribute;
pub mod component;
pub mod config;
pub mod error;
pub mod guide;
pub mod registry;
pub mod report;
pub mod serial;
pub mod stack;

pub use attribute::{AttrKind, Attribute, AttributeSet, Binding, DeclareOpts};
pub use component::{
    create_guide_for_targets, remove_guide_for_targets, BuildContext, Component, ComponentCore,
    UserFunction, BUILD_NODES_OPTION,
};
pub use config::{Classification, Config, Side};
pub use error::StackError;
pub use guide::{GuideData, GUIDE_OPTION};
pub use registry::Registry;
pub use report::{BuildReport, BuildStatus, ComponentReport};
pub use serial::{AttributeRepr, ComponentSpec, StackSpec};
pub use stack::Stack;
pub use rigforge_api_core::{Address, ComponentRef, Value, ValueKind};
