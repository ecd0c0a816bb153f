//! Attribute: a typed named slot on a component.
//!
//! An attribute holds either a literal [`Value`], an [`Address`] pointing at
//! another component's output, or nothing. Address resolution is lazy: the
//! stack fills the per-build resolution cache during `build`, so `value()`
//! stays transparent on the consuming side.

use indexmap::IndexMap;
use rigforge_api_core::{Address, Value};

use crate::error::StackError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AttrKind {
    /// Requirement supplied by the rigger or another component's output.
    Input,
    /// Configures behavior; never cross-referenced.
    Option,
    /// Result exposed for downstream consumption.
    Output,
}

impl AttrKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttrKind::Input => "input",
            AttrKind::Option => "option",
            AttrKind::Output => "output",
        }
    }
}

/// What an attribute currently stores.
#[derive(Clone, Debug, PartialEq)]
pub enum Binding {
    Unset,
    Literal(Value),
    Address(Address),
}

#[derive(Clone, Debug)]
pub struct Attribute {
    name: String,
    kind: AttrKind,
    binding: Binding,
    /// Per-build cache for address resolution and option inheritance.
    resolved: Option<Value>,
    revision: u64,
    pub validate: bool,
    pub hidden: bool,
    pub pre_expose: bool,
    pub should_inherit: bool,
    pub group: Option<String>,
}

/// Declaration flags, mirroring the declare call signature.
#[derive(Clone, Debug)]
pub struct DeclareOpts {
    pub value: Option<Value>,
    pub group: Option<String>,
    pub validate: bool,
    pub hidden: bool,
    pub pre_expose: bool,
    pub should_inherit: bool,
}

impl Default for DeclareOpts {
    fn default() -> Self {
        Self {
            value: None,
            group: None,
            validate: true,
            hidden: false,
            pre_expose: false,
            should_inherit: false,
        }
    }
}

impl DeclareOpts {
    pub fn with_value(value: Value) -> Self {
        DeclareOpts {
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn optional() -> Self {
        DeclareOpts {
            validate: false,
            ..Default::default()
        }
    }

    pub fn hidden() -> Self {
        DeclareOpts {
            validate: false,
            hidden: true,
            ..Default::default()
        }
    }

    pub fn inherited(value: Option<Value>) -> Self {
        DeclareOpts {
            value,
            validate: false,
            should_inherit: true,
            ..Default::default()
        }
    }
}

impl Attribute {
    fn new(name: String, kind: AttrKind, opts: DeclareOpts) -> Self {
        Attribute {
            name,
            kind,
            binding: match opts.value {
                Some(v) => Binding::Literal(v),
                None => Binding::Unset,
            },
            resolved: None,
            revision: 0,
            validate: opts.validate,
            hidden: opts.hidden,
            pre_expose: opts.pre_expose,
            should_inherit: opts.should_inherit,
            group: opts.group,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AttrKind {
        self.kind
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// Current effective value: the literal, or whatever the last build
    /// resolved for an address / inherited slot, else `Null`.
    pub fn value(&self) -> Value {
        match &self.binding {
            Binding::Literal(v) => v.clone(),
            _ => self.resolved.clone().unwrap_or(Value::Null),
        }
    }

    /// Store a literal value and fire change notification (revision bump).
    pub fn set(&mut self, value: Value) {
        self.binding = Binding::Literal(value);
        self.resolved = None;
        self.revision += 1;
    }

    /// Store an address instead of a literal; resolved at build time.
    pub fn set_address(&mut self, address: Address) {
        self.binding = Binding::Address(address);
        self.resolved = None;
        self.revision += 1;
    }

    pub fn clear(&mut self) {
        self.binding = Binding::Unset;
        self.resolved = None;
        self.revision += 1;
    }

    pub fn address(&self) -> Option<&Address> {
        match &self.binding {
            Binding::Address(addr) => Some(addr),
            _ => None,
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self.binding, Binding::Unset)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True iff `validate` is off or the slot holds something usable.
    /// Address bindings count as filled; resolution failures are reported
    /// separately so they stay attributable to this attribute.
    pub fn is_valid(&self) -> bool {
        if !self.validate {
            return true;
        }
        match &self.binding {
            Binding::Literal(v) => !v.is_empty(),
            Binding::Address(_) => true,
            Binding::Unset => self
                .resolved
                .as_ref()
                .map(|v| !v.is_empty())
                .unwrap_or(false),
        }
    }

    pub(crate) fn set_resolved(&mut self, value: Value) {
        self.resolved = Some(value);
    }

    pub(crate) fn clear_resolved(&mut self) {
        self.resolved = None;
    }
}

/// Ordered attribute collection; insertion order is declaration order.
#[derive(Clone, Debug, Default)]
pub struct AttributeSet {
    attrs: IndexMap<String, Attribute>,
    revision: u64,
}

impl AttributeSet {
    pub fn declare(
        &mut self,
        component: &str,
        name: &str,
        kind: AttrKind,
        opts: DeclareOpts,
    ) -> Result<(), StackError> {
        if self.attrs.contains_key(name) {
            return Err(StackError::Declaration {
                component: component.to_string(),
                attribute: name.to_string(),
            });
        }
        self.attrs
            .insert(name.to_string(), Attribute::new(name.to_string(), kind, opts));
        self.revision += 1;
        Ok(())
    }

    /// Drop a declared attribute. Only the variable-cardinality output path
    /// goes through here; regular attributes live as long as the component.
    pub fn undeclare(&mut self, name: &str) -> Option<Attribute> {
        let removed = self.attrs.shift_remove(name);
        if removed.is_some() {
            self.revision += 1;
        }
        removed
    }

    pub fn get(&self, name: &str, kind: AttrKind) -> Option<&Attribute> {
        self.attrs.get(name).filter(|a| a.kind() == kind)
    }

    pub fn get_mut(&mut self, name: &str, kind: AttrKind) -> Option<&mut Attribute> {
        self.attrs.get_mut(name).filter(|a| a.kind() == kind)
    }

    pub fn by_name(&self, name: &str) -> Option<&Attribute> {
        self.attrs.get(name)
    }

    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attrs.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attrs.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Attribute> {
        self.attrs.values_mut()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Sum of structural and per-attribute revisions; cheap dirty check.
    pub fn revision(&self) -> u64 {
        self.revision + self.attrs.values().map(|a| a.revision()).sum::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_declaration_errors() {
        let mut set = AttributeSet::default();
        set.declare("Arm", "Root Joint", AttrKind::Input, DeclareOpts::default())
            .unwrap();
        let err = set
            .declare("Arm", "Root Joint", AttrKind::Input, DeclareOpts::default())
            .unwrap_err();
        assert!(matches!(err, StackError::Declaration { .. }));
    }

    #[test]
    fn probing_lookup_is_kind_aware() {
        let mut set = AttributeSet::default();
        set.declare("Arm", "Hand", AttrKind::Output, DeclareOpts::optional())
            .unwrap();
        assert!(set.get("Hand", AttrKind::Output).is_some());
        assert!(set.get("Hand", AttrKind::Input).is_none());
        assert!(set.get("Missing", AttrKind::Output).is_none());
    }

    #[test]
    fn validation_gate() {
        let mut set = AttributeSet::default();
        set.declare("Arm", "Name", AttrKind::Input, DeclareOpts::default())
            .unwrap();
        let attr = set.by_name_mut("Name").unwrap();
        assert!(!attr.is_valid());
        attr.set(Value::text("TestArm"));
        assert!(attr.is_valid());
        attr.set(Value::text(""));
        assert!(!attr.is_valid());
    }

    #[test]
    fn address_counts_as_filled() {
        let mut set = AttributeSet::default();
        set.declare("Arm", "Parent", AttrKind::Input, DeclareOpts::default())
            .unwrap();
        let attr = set.by_name_mut("Parent").unwrap();
        attr.set_address(Address::parse("0.Root").unwrap());
        assert!(attr.is_valid());
        assert_eq!(attr.value(), Value::Null); // unresolved until build
    }

    #[test]
    fn revision_tracks_changes() {
        let mut set = AttributeSet::default();
        set.declare("Arm", "Name", AttrKind::Input, DeclareOpts::default())
            .unwrap();
        let before = set.revision();
        set.by_name_mut("Name").unwrap().set(Value::f(1.0));
        assert!(set.revision() > before);
    }
}
