//! Service registration scanner.
//!
//! Walks the concrete types of a module and yields a
//! [`ServiceRegistration`] for every type that declares the requested
//! implementation marker and implements at least one service contract.
//! Problems with individual types are logged, recorded as
//! [`ScanDiagnostic`]s and skipped; they never abort the scan.

use std::marker::PhantomData;

use tracing::{trace, warn};

use crate::error::{IocError, TypeLoadError};
use crate::introspect::loadable_types;
use crate::module::Module;
use crate::types::{ImplementationMarker, MarkerOrigin, ServiceLifetime, TypeDefinition, TypeKind};

/// A discovered service implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRegistration {
    /// Module the implementation was found in.
    pub module: String,
    /// Fully-qualified implementation type name.
    pub implementation_type: String,
    /// Service contracts it satisfies. Never empty.
    pub service_contracts: Vec<String>,
    /// Lower values take precedence.
    pub priority: i32,
    /// Service lifetime.
    pub lifetime: ServiceLifetime,
}

/// Something noteworthy found while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanDiagnostic {
    /// Some type entries of the module could not be loaded.
    PartialLoad {
        /// Module name.
        module: String,
        /// The failed entries.
        errors: Vec<TypeLoadError>,
    },
    /// A marked type implements no service contract.
    NoServiceContract {
        /// Module name.
        module: String,
        /// The marked type.
        type_name: String,
        /// Marker kind searched for.
        marker: &'static str,
    },
    /// A type's metadata could not be inspected.
    InspectionFailed {
        /// Module name.
        module: String,
        /// The offending type.
        type_name: String,
        /// Marker kind searched for.
        marker: &'static str,
        /// What went wrong.
        reason: String,
    },
}

enum Inspection {
    Unmarked,
    NoServiceContract,
    Registration(ServiceRegistration),
}

/// Lazily scan `module` for implementations marked with `M`.
#[must_use]
pub fn find_registrations<M: ImplementationMarker>(module: &Module) -> Registrations<'_, M> {
    Registrations {
        module,
        candidates: None,
        diagnostics: Vec::new(),
        _marker: PhantomData,
    }
}

/// Iterator over the registrations of one module.
///
/// The module is enumerated on the first call to `next`. Diagnostics
/// accumulate as the iterator advances.
#[derive(Debug)]
pub struct Registrations<'m, M> {
    module: &'m Module,
    candidates: Option<std::vec::IntoIter<TypeDefinition>>,
    diagnostics: Vec<ScanDiagnostic>,
    _marker: PhantomData<fn() -> M>,
}

impl<M: ImplementationMarker> Registrations<'_, M> {
    /// Diagnostics recorded so far.
    #[must_use]
    pub fn diagnostics(&self) -> &[ScanDiagnostic] {
        &self.diagnostics
    }

    /// Consume the iterator, returning its diagnostics.
    #[must_use]
    pub fn into_diagnostics(self) -> Vec<ScanDiagnostic> {
        self.diagnostics
    }

    fn load_candidates(&mut self) -> std::vec::IntoIter<TypeDefinition> {
        let loadable = loadable_types(self.module);
        if loadable.is_partial() {
            trace!(
                module = %self.module.name(),
                failed = loadable.load_errors.len(),
                "Some optional dependencies are missing"
            );
            for error in &loadable.load_errors {
                trace!(module = %self.module.name(), error = %error, "Loader exception");
            }
            self.diagnostics.push(ScanDiagnostic::PartialLoad {
                module: self.module.name().to_owned(),
                errors: loadable.load_errors,
            });
        }

        loadable
            .types
            .into_iter()
            .filter(|def| def.kind() == TypeKind::Concrete)
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn inspect_type(&self, definition: &TypeDefinition) -> Result<Inspection, IocError> {
        let mut declared = definition
            .markers()
            .iter()
            .filter(|m| m.kind == M::NAME && m.origin == MarkerOrigin::Declared);
        let Some(marker) = declared.next() else {
            return Ok(Inspection::Unmarked);
        };
        if declared.next().is_some() {
            return Err(IocError::InvalidMetadata {
                type_name: definition.name().to_owned(),
                marker: M::NAME,
                message: "marker declared more than once".into(),
            });
        }

        let mut contracts: Vec<String> = Vec::new();
        for contract in definition.contracts() {
            if contract.name.trim().is_empty() {
                return Err(IocError::InvalidMetadata {
                    type_name: definition.name().to_owned(),
                    marker: M::NAME,
                    message: "contract with an empty name".into(),
                });
            }
            if contract.service && !contracts.contains(&contract.name) {
                contracts.push(contract.name.clone());
            }
        }
        if contracts.is_empty() {
            return Ok(Inspection::NoServiceContract);
        }

        Ok(Inspection::Registration(ServiceRegistration {
            module: self.module.name().to_owned(),
            implementation_type: definition.name().to_owned(),
            service_contracts: contracts,
            priority: marker.priority,
            lifetime: marker.lifetime,
        }))
    }
}

impl<M: ImplementationMarker> Iterator for Registrations<'_, M> {
    type Item = ServiceRegistration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.candidates.is_none() {
            self.candidates = Some(self.load_candidates());
        }

        loop {
            let definition = self.candidates.as_mut()?.next()?;
            match self.inspect_type(&definition) {
                Ok(Inspection::Unmarked) => {},
                Ok(Inspection::NoServiceContract) => {
                    warn!(
                        type_name = %definition.name(),
                        module = %self.module.name(),
                        marker = M::NAME,
                        "Type is marked as service implementation but exposes no service contract"
                    );
                    self.diagnostics.push(ScanDiagnostic::NoServiceContract {
                        module: self.module.name().to_owned(),
                        type_name: definition.name().to_owned(),
                        marker: M::NAME,
                    });
                },
                Ok(Inspection::Registration(registration)) => return Some(registration),
                Err(e) => {
                    warn!(
                        type_name = %definition.name(),
                        marker = M::NAME,
                        error = %e,
                        "Registration scan failed for type"
                    );
                    self.diagnostics.push(ScanDiagnostic::InspectionFailed {
                        module: self.module.name().to_owned(),
                        type_name: definition.name().to_owned(),
                        marker: M::NAME,
                        reason: e.to_string(),
                    });
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ContractRef, Marker, PluginServiceImplementation, ServiceContract, ServiceImplementation,
        TypeKind, priority,
    };

    struct Storage;
    impl ServiceContract for Storage {
        const NAME: &'static str = "test.Storage";
    }

    struct Clock;
    impl ServiceContract for Clock {
        const NAME: &'static str = "test.Clock";
    }

    fn marked(name: &str) -> TypeDefinition {
        TypeDefinition::concrete(name).with_marker(Marker::declared::<ServiceImplementation>())
    }

    fn scan(module: &Module) -> (Vec<ServiceRegistration>, Vec<ScanDiagnostic>) {
        let mut registrations = find_registrations::<ServiceImplementation>(module);
        let found: Vec<_> = registrations.by_ref().collect();
        (found, registrations.into_diagnostics())
    }

    #[test]
    fn test_finds_every_marked_implementation() {
        let module = Module::builder("m")
            .with_type(marked("m.FileStorage").implements::<Storage>())
            .with_type(
                marked("m.SystemClock")
                    .implements::<Clock>()
                    .implements::<Storage>(),
            )
            .with_type(TypeDefinition::concrete("m.Unmarked").implements::<Storage>())
            .build();

        let (found, diagnostics) = scan(&module);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].implementation_type, "m.FileStorage");
        assert_eq!(found[0].service_contracts, ["test.Storage"]);
        assert_eq!(found[1].service_contracts, ["test.Clock", "test.Storage"]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_marker_priority_and_lifetime_carried() {
        let module = Module::builder("m")
            .with_type(
                TypeDefinition::concrete("m.Default")
                    .with_marker(
                        Marker::declared::<ServiceImplementation>()
                            .with_priority(priority::LOWEST)
                            .with_lifetime(ServiceLifetime::Singleton),
                    )
                    .implements::<Storage>(),
            )
            .build();
        let (found, _) = scan(&module);
        assert_eq!(found[0].priority, priority::LOWEST);
        assert_eq!(found[0].lifetime, ServiceLifetime::Singleton);
        assert_eq!(found[0].module, "m");
    }

    #[test]
    fn test_non_concrete_and_inherited_are_ignored() {
        let module = Module::builder("m")
            .with_type(
                TypeDefinition::new("m.Base", TypeKind::Abstract)
                    .with_marker(Marker::declared::<ServiceImplementation>())
                    .implements::<Storage>(),
            )
            .with_type(
                TypeDefinition::new("m.IStorage", TypeKind::Interface)
                    .with_marker(Marker::declared::<ServiceImplementation>()),
            )
            .with_type(
                TypeDefinition::concrete("m.Derived")
                    .with_marker(Marker::inherited::<ServiceImplementation>())
                    .implements::<Storage>(),
            )
            .build();
        let (found, diagnostics) = scan(&module);
        assert!(found.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_other_marker_kind_not_matched() {
        let module = Module::builder("m")
            .with_type(marked("m.Core").implements::<Storage>())
            .with_type(
                TypeDefinition::concrete("m.Plugin")
                    .with_marker(Marker::declared::<PluginServiceImplementation>())
                    .implements::<Storage>(),
            )
            .build();

        let plugin: Vec<_> = find_registrations::<PluginServiceImplementation>(&module).collect();
        assert_eq!(plugin.len(), 1);
        assert_eq!(plugin[0].implementation_type, "m.Plugin");
    }

    #[test]
    fn test_partial_load_is_tolerated() {
        let module = Module::builder("m")
            .with_unresolvable("m.NeedsOptional", "missing dependency: extras")
            .with_type(marked("m.FileStorage").implements::<Storage>())
            .build();

        let (found, diagnostics) = scan(&module);
        assert_eq!(found.len(), 1);
        assert!(matches!(
            &diagnostics[..],
            [ScanDiagnostic::PartialLoad { errors, .. }] if errors.len() == 1
        ));
    }

    #[test]
    fn test_no_service_contract_warns_once_and_skips() {
        let module = Module::builder("m")
            .with_type(marked("m.Orphan").with_contract(ContractRef::plain("core.Display")))
            .with_type(marked("m.FileStorage").implements::<Storage>())
            .build();

        let (found, diagnostics) = scan(&module);
        assert_eq!(found.len(), 1);
        assert_eq!(
            diagnostics,
            [ScanDiagnostic::NoServiceContract {
                module: "m".into(),
                type_name: "m.Orphan".into(),
                marker: "ServiceImplementation",
            }]
        );
    }

    #[test]
    fn test_malformed_metadata_skips_only_that_type() {
        let module = Module::builder("m")
            .with_type(
                marked("m.Twice")
                    .with_marker(Marker::declared::<ServiceImplementation>())
                    .implements::<Storage>(),
            )
            .with_type(marked("m.Blank").with_contract(ContractRef::plain("")))
            .with_type(marked("m.Good").implements::<Storage>())
            .build();

        let (found, diagnostics) = scan(&module);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].implementation_type, "m.Good");
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| matches!(
            d,
            ScanDiagnostic::InspectionFailed { marker: "ServiceImplementation", .. }
        )));
    }

    #[test]
    fn test_lazy_until_first_next() {
        let module = Module::builder("m")
            .with_unresolvable("m.Broken", "gone")
            .build();
        let mut registrations = find_registrations::<ServiceImplementation>(&module);
        assert!(registrations.diagnostics().is_empty());
        assert!(registrations.next().is_none());
        assert_eq!(registrations.diagnostics().len(), 1);
    }
}
