//! Scanning statically registered modules end to end.

use hearth_ioc::{
    ContractRef, Marker, Module, PluginServiceImplementation, ScanDiagnostic, ServiceContract,
    ServiceImplementation, ServiceLifetime, ServiceResolver, TypeDefinition, TypeLoadError,
    TypeRegistration, priority,
};

trait Greeter: Send + Sync {}

impl ServiceContract for dyn Greeter {
    const NAME: &'static str = "registry_scan.Greeter";
}

fn default_greeter() -> Result<TypeDefinition, TypeLoadError> {
    Ok(TypeDefinition::concrete("registry_scan.DefaultGreeter")
        .with_marker(
            Marker::declared::<ServiceImplementation>()
                .with_priority(priority::LOWEST)
                .with_lifetime(ServiceLifetime::Singleton),
        )
        .implements::<dyn Greeter>())
}

fn fancy_greeter() -> Result<TypeDefinition, TypeLoadError> {
    Ok(TypeDefinition::concrete("registry_scan.FancyGreeter")
        .with_marker(Marker::declared::<ServiceImplementation>().with_priority(priority::HIGH))
        .implements::<dyn Greeter>())
}

fn plugin_only() -> Result<TypeDefinition, TypeLoadError> {
    Ok(TypeDefinition::concrete("registry_scan.PluginGreeter")
        .with_marker(Marker::declared::<PluginServiceImplementation>())
        .implements::<dyn Greeter>())
}

fn needs_optional() -> Result<TypeDefinition, TypeLoadError> {
    Err(TypeLoadError::new(
        "registry_scan.VoiceGreeter",
        "missing optional dependency: audio",
    ))
}

fn forgot_contract() -> Result<TypeDefinition, TypeLoadError> {
    Ok(TypeDefinition::concrete("registry_scan.Forgetful")
        .with_marker(Marker::declared::<ServiceImplementation>())
        .with_contract(ContractRef::plain("core.Display")))
}

hearth_ioc::inventory::submit! {
    TypeRegistration { module: "registry-scan-core", resolve: default_greeter }
}
hearth_ioc::inventory::submit! {
    TypeRegistration { module: "registry-scan-plugin", resolve: fancy_greeter }
}
hearth_ioc::inventory::submit! {
    TypeRegistration { module: "registry-scan-plugin", resolve: plugin_only }
}
hearth_ioc::inventory::submit! {
    TypeRegistration { module: "registry-scan-plugin", resolve: needs_optional }
}
hearth_ioc::inventory::submit! {
    TypeRegistration { module: "registry-scan-plugin", resolve: forgot_contract }
}

fn modules() -> Vec<Module> {
    vec![
        Module::from_registry("registry-scan-core"),
        Module::from_registry("registry-scan-plugin"),
    ]
}

#[test]
fn test_plugin_replaces_lowest_priority_default() {
    let resolver = ServiceResolver::scan::<ServiceImplementation>(&modules());

    let winner = resolver.resolve_contract::<dyn Greeter>().unwrap();
    assert_eq!(winner.implementation_type, "registry_scan.FancyGreeter");
    assert_eq!(winner.module, "registry-scan-plugin");

    let all: Vec<_> = resolver
        .resolve_all(<dyn Greeter as ServiceContract>::NAME)
        .map(|r| r.implementation_type.as_str())
        .collect();
    assert_eq!(
        all,
        ["registry_scan.FancyGreeter", "registry_scan.DefaultGreeter"]
    );
}

#[test]
fn test_diagnostics_report_partial_load_and_missing_contract() {
    let resolver = ServiceResolver::scan::<ServiceImplementation>(&modules());
    let diagnostics = resolver.diagnostics();

    assert!(diagnostics.iter().any(|d| matches!(
        d,
        ScanDiagnostic::PartialLoad { module, .. } if module == "registry-scan-plugin"
    )));
    assert!(diagnostics.iter().any(|d| matches!(
        d,
        ScanDiagnostic::NoServiceContract { type_name, .. } if type_name == "registry_scan.Forgetful"
    )));
    assert_eq!(diagnostics.len(), 2);
}

#[test]
fn test_plugin_marker_scan_is_separate() {
    let resolver = ServiceResolver::scan::<PluginServiceImplementation>(&modules());
    assert_eq!(resolver.len(), 1);
    assert_eq!(
        resolver
            .resolve_contract::<dyn Greeter>()
            .unwrap()
            .implementation_type,
        "registry_scan.PluginGreeter"
    );
}
