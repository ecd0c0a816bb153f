//! Persisted stack format.
//!
//! An ordered list of `{identifier, label, attributes}` records. Loads are
//! forward compatible: attribute names a component version does not declare
//! are preserved verbatim and re-serialized untouched; declared names that
//! are missing fall back to the declared defaults.

use indexmap::IndexMap;
use rigforge_api_core::{Address, Value};
use serde::{Deserialize, Serialize};

use crate::attribute::Binding;

/// One persisted attribute slot: a literal value or an address, never both.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl AttributeRepr {
    pub fn literal(value: Value) -> Self {
        AttributeRepr {
            value: Some(value),
            address: None,
        }
    }

    pub fn address(address: Address) -> Self {
        AttributeRepr {
            value: None,
            address: Some(address),
        }
    }

    /// Persisted form of a binding; `None` for unset slots (they fall back
    /// to declared defaults on load, so storing them would be noise).
    pub fn from_binding(binding: &Binding) -> Option<AttributeRepr> {
        match binding {
            Binding::Unset => None,
            Binding::Literal(v) => Some(AttributeRepr::literal(v.clone())),
            Binding::Address(a) => Some(AttributeRepr::address(a.clone())),
        }
    }

    pub fn into_binding(self) -> Binding {
        if let Some(address) = self.address {
            Binding::Address(address)
        } else if let Some(value) = self.value {
            Binding::Literal(value)
        } else {
            Binding::Unset
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub attributes: IndexMap<String, AttributeRepr>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StackSpec {
    pub components: Vec<ComponentSpec>,
}
