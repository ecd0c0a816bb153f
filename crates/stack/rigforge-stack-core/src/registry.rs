//! String-identifier component registry, used for palette discovery and for
//! runtime instantiation of auxiliary sub-components.

use hashbrown::HashMap;

use crate::component::Component;
use crate::error::StackError;

type Factory = Box<dyn Fn() -> Result<Box<dyn Component>, StackError> + Send + Sync>;

#[derive(Default)]
pub struct Registry {
    factories: HashMap<String, Factory>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Register a factory under `identifier`. Re-registration overwrites,
    /// which supports live-reload during authoring. Factories are fallible:
    /// a constructor that declares a colliding attribute reports it here
    /// instead of losing the declaration.
    pub fn register<F>(&mut self, identifier: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Box<dyn Component>, StackError> + Send + Sync + 'static,
    {
        self.factories.insert(identifier.into(), Box::new(factory));
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.factories.contains_key(identifier)
    }

    /// Instantiate a component. Unknown identifiers are a deterministic
    /// error, never a silent default.
    pub fn create(&self, identifier: &str) -> Result<Box<dyn Component>, StackError> {
        match self.factories.get(identifier) {
            Some(factory) => factory(),
            None => Err(StackError::UnknownComponent {
                identifier: identifier.to_string(),
            }),
        }
    }

    /// Sorted identifier list for palette discovery.
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.factories.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("identifiers", &self.identifiers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::DeclareOpts;
    use crate::component::{BuildContext, ComponentCore};

    struct Probe {
        core: ComponentCore,
    }

    impl Component for Probe {
        fn core(&self) -> &ComponentCore {
            &self.core
        }
        fn core_mut(&mut self) -> &mut ComponentCore {
            &mut self.core
        }
        fn run(&mut self, _ctx: &mut BuildContext<'_>) -> Result<(), StackError> {
            Ok(())
        }
    }

    fn probe() -> Result<Box<dyn Component>, StackError> {
        Ok(Box::new(Probe {
            core: ComponentCore::new("Utility : Probe"),
        }))
    }

    #[test]
    fn create_known_identifier() {
        let mut reg = Registry::new();
        reg.register("Utility : Probe", probe);
        let c = reg.create("Utility : Probe").unwrap();
        assert_eq!(c.identifier(), "Utility : Probe");
    }

    #[test]
    fn unknown_identifier_is_an_error() {
        let reg = Registry::new();
        let err = reg.create("Standard : Missing").unwrap_err();
        assert!(matches!(err, StackError::UnknownComponent { .. }));
    }

    #[test]
    fn constructor_declaration_errors_surface_through_create() {
        let mut reg = Registry::new();
        reg.register("Utility : Probe", || {
            let mut core = ComponentCore::new("Utility : Probe");
            core.declare_input("Root Joint", DeclareOpts::default())?;
            core.declare_input("Root Joint", DeclareOpts::optional())?;
            Ok(Box::new(Probe { core }) as Box<dyn Component>)
        });
        let err = reg.create("Utility : Probe").unwrap_err();
        assert!(matches!(err, StackError::Declaration { .. }));
    }

    #[test]
    fn re_registration_overwrites() {
        let mut reg = Registry::new();
        reg.register("Utility : Probe", probe);
        reg.register("Utility : Probe", probe);
        assert_eq!(reg.identifiers(), vec!["Utility : Probe".to_string()]);
    }

    #[test]
    fn identifiers_are_sorted() {
        let mut reg = Registry::new();
        reg.register("Standard : Leg", probe);
        reg.register("Augment : Twister", probe);
        reg.register("Standard : Arm", probe);
        assert_eq!(
            reg.identifiers(),
            vec![
                "Augment : Twister".to_string(),
                "Standard : Arm".to_string(),
                "Standard : Leg".to_string(),
            ]
        );
    }
}
