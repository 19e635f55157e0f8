//! Priority resolution across modules.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::module::Module;
use crate::scanner::{ScanDiagnostic, ServiceRegistration, find_registrations};
use crate::types::{ImplementationMarker, ServiceContract};

/// Registrations from all modules, indexed by service contract.
///
/// For each contract, candidates are ordered by ascending priority. Equal
/// priorities keep discovery order, so the first discovered registration
/// wins a tie.
#[derive(Debug, Clone, Default)]
pub struct ServiceResolver {
    registrations: Vec<ServiceRegistration>,
    /// Contract name → indices into `registrations`, best first.
    by_contract: HashMap<String, Vec<usize>>,
    /// Contract names in first-seen order.
    contracts: Vec<String>,
    diagnostics: Vec<ScanDiagnostic>,
}

impl ServiceResolver {
    /// Build a resolver from registrations given in discovery order.
    #[must_use]
    pub fn from_registrations(registrations: impl IntoIterator<Item = ServiceRegistration>) -> Self {
        let registrations: Vec<ServiceRegistration> = registrations.into_iter().collect();
        let mut by_contract: HashMap<String, Vec<usize>> = HashMap::new();
        let mut contracts = Vec::new();

        for (index, registration) in registrations.iter().enumerate() {
            for contract in &registration.service_contracts {
                by_contract
                    .entry(contract.clone())
                    .or_insert_with(|| {
                        contracts.push(contract.clone());
                        Vec::new()
                    })
                    .push(index);
            }
        }

        // Stable: ties stay in discovery order.
        for candidates in by_contract.values_mut() {
            candidates.sort_by_key(|&i| registrations[i].priority);
        }

        Self {
            registrations,
            by_contract,
            contracts,
            diagnostics: Vec::new(),
        }
    }

    /// Scan `modules` in order for implementations marked with `M`.
    #[must_use]
    pub fn scan<M: ImplementationMarker>(modules: &[Module]) -> Self {
        let mut found = Vec::new();
        let mut diagnostics = Vec::new();
        for module in modules {
            let mut registrations = find_registrations::<M>(module);
            let before = found.len();
            found.extend(registrations.by_ref());
            debug!(
                module = %module.name(),
                registrations = found.len().saturating_sub(before),
                "Module scanned"
            );
            diagnostics.extend(registrations.into_diagnostics());
        }

        let mut resolver = Self::from_registrations(found);
        resolver.diagnostics = diagnostics;
        info!(
            modules = modules.len(),
            registrations = resolver.len(),
            contracts = resolver.contracts.len(),
            diagnostics = resolver.diagnostics.len(),
            marker = M::NAME,
            "Service registrations resolved"
        );
        resolver
    }

    /// The winning registration for `contract`.
    #[must_use]
    pub fn resolve(&self, contract: &str) -> Option<&ServiceRegistration> {
        self.resolve_all(contract).next()
    }

    /// The winning registration for the contract `C`.
    #[must_use]
    pub fn resolve_contract<C: ServiceContract + ?Sized>(&self) -> Option<&ServiceRegistration> {
        self.resolve(C::NAME)
    }

    /// Every registration for `contract`, best first.
    pub fn resolve_all<'a>(
        &'a self,
        contract: &str,
    ) -> impl Iterator<Item = &'a ServiceRegistration> + use<'a> {
        self.by_contract
            .get(contract)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|&i| &self.registrations[i])
    }

    /// Contracts with at least one registration, in first-seen order.
    pub fn contracts(&self) -> impl Iterator<Item = &str> {
        self.contracts.iter().map(String::as_str)
    }

    /// All registrations in discovery order.
    #[must_use]
    pub fn registrations(&self) -> &[ServiceRegistration] {
        &self.registrations
    }

    /// Diagnostics recorded while scanning.
    #[must_use]
    pub fn diagnostics(&self) -> &[ScanDiagnostic] {
        &self.diagnostics
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether no registration was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
