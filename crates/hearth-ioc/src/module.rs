//! Modules: named units of type entries and embedded resources.
//!
//! A module is assembled explicitly with [`Module::builder`], or collected
//! from the static registry with [`Module::from_registry`]. Types join the
//! registry at compile time:
//!
//! ```rust,ignore
//! use hearth_ioc::{Marker, Module, ServiceImplementation, TypeDefinition, TypeRegistration};
//!
//! fn clock_type() -> Result<TypeDefinition, hearth_ioc::TypeLoadError> {
//!     Ok(TypeDefinition::concrete("example.SystemClock")
//!         .with_marker(Marker::declared::<ServiceImplementation>()))
//! }
//!
//! inventory::submit! {
//!     TypeRegistration { module: "example", resolve: clock_type }
//! }
//!
//! let module = Module::from_registry("example");
//! assert_eq!(module.type_count(), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::TypeLoadError;
use crate::types::TypeDefinition;

/// Produces one type definition of a module, or the reason it cannot load.
pub type TypeResolver = Arc<dyn Fn() -> Result<TypeDefinition, TypeLoadError> + Send + Sync>;

/// A type entry submitted to the static registry.
#[derive(Debug)]
pub struct TypeRegistration {
    /// Name of the module the type belongs to.
    pub module: &'static str,
    /// Resolves the definition when the module is scanned.
    pub resolve: fn() -> Result<TypeDefinition, TypeLoadError>,
}

inventory::collect!(TypeRegistration);

/// An embedded text resource submitted to the static registry.
#[derive(Debug)]
pub struct ResourceRegistration {
    /// Name of the module the resource belongs to.
    pub module: &'static str,
    /// Dotted resource name, `<module>.<segment>...`.
    pub name: &'static str,
    /// Resource content.
    pub content: &'static str,
}

inventory::collect!(ResourceRegistration);

/// An embedded text resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Dotted resource name, `<module>.<segment>...`.
    pub name: String,
    /// Resource content.
    pub content: String,
}

/// A named unit of code.
#[derive(Clone)]
pub struct Module {
    name: String,
    entries: Vec<TypeResolver>,
    resources: Vec<Resource>,
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("type_count", &self.entries.len())
            .field("resources", &self.resources.len())
            .finish()
    }
}

impl Module {
    /// Start assembling a module.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder {
            module: Self {
                name: name.into(),
                entries: Vec::new(),
                resources: Vec::new(),
            },
        }
    }

    /// Collect every type and resource registered for `name`.
    ///
    /// Types keep the registry's iteration order, which is fixed for a given
    /// binary, so repeated scans discover them in the same order.
    #[must_use]
    pub fn from_registry(name: &str) -> Self {
        let entries = inventory::iter::<TypeRegistration>
            .into_iter()
            .filter(|reg| reg.module == name)
            .map(|reg| Arc::new(reg.resolve) as TypeResolver)
            .collect();

        let mut resources: Vec<Resource> = inventory::iter::<ResourceRegistration>
            .into_iter()
            .filter(|reg| reg.module == name)
            .map(|reg| Resource {
                name: reg.name.to_owned(),
                content: reg.content.to_owned(),
            })
            .collect();
        resources.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            name: name.to_owned(),
            entries,
            resources,
        }
    }

    /// Module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of type entries, loadable or not.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.entries.len()
    }

    /// Type entries in declaration order.
    #[must_use]
    pub fn entries(&self) -> &[TypeResolver] {
        &self.entries
    }

    /// Embedded resources.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Content of the resource named `name`.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&str> {
        self.resources
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.content.as_str())
    }
}

/// Builder for [`Module`].
#[derive(Debug)]
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    /// Add a resolved type.
    #[must_use]
    pub fn with_type(self, definition: TypeDefinition) -> Self {
        self.with_resolver(move || Ok(definition.clone()))
    }

    /// Add a type entry that fails to load.
    #[must_use]
    pub fn with_unresolvable(self, type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        let error = TypeLoadError::new(type_name, reason);
        self.with_resolver(move || Err(error.clone()))
    }

    /// Add a type entry resolved by `resolve`.
    #[must_use]
    pub fn with_resolver<F>(mut self, resolve: F) -> Self
    where
        F: Fn() -> Result<TypeDefinition, TypeLoadError> + Send + Sync + 'static,
    {
        self.module.entries.push(Arc::new(resolve));
        self
    }

    /// Add an embedded resource.
    #[must_use]
    pub fn with_resource(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.module.resources.push(Resource {
            name: name.into(),
            content: content.into(),
        });
        self
    }

    /// Finish the module.
    #[must_use]
    pub fn build(self) -> Module {
        self.module
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered_type() -> Result<TypeDefinition, TypeLoadError> {
        Ok(TypeDefinition::concrete("module_tests.Registered"))
    }

    fn broken_type() -> Result<TypeDefinition, TypeLoadError> {
        Err(TypeLoadError::new("module_tests.Broken", "missing dependency"))
    }

    inventory::submit! {
        TypeRegistration { module: "module-tests", resolve: registered_type }
    }

    inventory::submit! {
        TypeRegistration { module: "module-tests", resolve: broken_type }
    }

    inventory::submit! {
        ResourceRegistration {
            module: "module-tests",
            name: "module-tests.config.yaml",
            content: "enabled: true\n",
        }
    }

    #[test]
    fn test_builder() {
        let module = Module::builder("sample")
            .with_type(TypeDefinition::concrete("sample.A"))
            .with_unresolvable("sample.B", "missing optional dependency")
            .with_resource("sample.readme.txt", "hello")
            .build();

        assert_eq!(module.name(), "sample");
        assert_eq!(module.type_count(), 2);
        assert!(module.entries()[0]().is_ok());
        assert!(module.entries()[1]().is_err());
        assert_eq!(module.resource("sample.readme.txt"), Some("hello"));
        assert_eq!(module.resource("sample.other"), None);
    }

    #[test]
    fn test_from_registry_filters_by_module() {
        let module = Module::from_registry("module-tests");
        assert_eq!(module.type_count(), 2);
        assert_eq!(module.resources().len(), 1);
        assert_eq!(
            module.resource("module-tests.config.yaml"),
            Some("enabled: true\n")
        );

        let empty = Module::from_registry("no-such-module");
        assert_eq!(empty.type_count(), 0);
    }

    #[test]
    fn test_from_registry_is_repeatable() {
        let names = |m: &Module| -> Vec<String> {
            m.entries()
                .iter()
                .map(|e| match e() {
                    Ok(def) => def.name().to_owned(),
                    Err(err) => err.type_name,
                })
                .collect()
        };
        let first = Module::from_registry("module-tests");
        let second = Module::from_registry("module-tests");
        assert_eq!(names(&first), names(&second));
    }
}
