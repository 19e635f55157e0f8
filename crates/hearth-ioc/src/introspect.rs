//! Best-effort type enumeration.

use crate::error::TypeLoadError;
use crate::module::Module;
use crate::types::TypeDefinition;

/// The loadable subset of a module's types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadableTypes {
    /// Resolved definitions, in declaration order.
    pub types: Vec<TypeDefinition>,
    /// Entries that failed to resolve.
    pub load_errors: Vec<TypeLoadError>,
}

impl LoadableTypes {
    /// Whether some entries failed to resolve.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.load_errors.is_empty()
    }
}

/// Resolve every type entry of `module`, keeping the ones that load.
///
/// Never fails as a whole: unresolvable entries are collected into
/// [`LoadableTypes::load_errors`].
#[must_use]
pub fn loadable_types(module: &Module) -> LoadableTypes {
    let mut loadable = LoadableTypes::default();
    for entry in module.entries() {
        match entry() {
            Ok(definition) => loadable.types.push(definition),
            Err(error) => loadable.load_errors.push(error),
        }
    }
    loadable
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_types_load() {
        let module = Module::builder("m")
            .with_type(TypeDefinition::concrete("m.A"))
            .with_type(TypeDefinition::concrete("m.B"))
            .build();
        let loadable = loadable_types(&module);
        assert!(!loadable.is_partial());
        let names: Vec<_> = loadable.types.iter().map(TypeDefinition::name).collect();
        assert_eq!(names, ["m.A", "m.B"]);
    }

    #[test]
    fn test_partial_load_keeps_the_rest() {
        let module = Module::builder("m")
            .with_type(TypeDefinition::concrete("m.A"))
            .with_unresolvable("m.Optional", "missing dependency: extra")
            .with_type(TypeDefinition::concrete("m.C"))
            .build();
        let loadable = loadable_types(&module);
        assert!(loadable.is_partial());
        assert_eq!(loadable.types.len(), 2);
        assert_eq!(loadable.load_errors[0].type_name, "m.Optional");
    }

    #[test]
    fn test_empty_module() {
        let module = Module::builder("empty").build();
        assert_eq!(loadable_types(&module), LoadableTypes::default());
    }

    #[test]
    fn test_idempotent() {
        let module = Module::builder("m")
            .with_type(TypeDefinition::concrete("m.A"))
            .with_unresolvable("m.B", "gone")
            .build();
        assert_eq!(loadable_types(&module), loadable_types(&module));
    }
}
