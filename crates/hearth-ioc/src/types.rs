//! Type metadata: definitions, markers, contracts and priorities.

/// Registration priorities. Lower values take precedence.
pub mod priority {
    /// Wins over everything else.
    pub const HIGHEST: i32 = -200;
    /// Wins over `NORMAL`.
    pub const HIGH: i32 = -100;
    /// Default priority.
    pub const NORMAL: i32 = 0;
    /// Loses to `NORMAL`.
    pub const LOW: i32 = 100;
    /// Built-in defaults register here so plugins can replace them.
    pub const LOWEST: i32 = 200;
}

/// How long a resolved service instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServiceLifetime {
    /// One instance for the whole host.
    Singleton,
    /// A new instance for every resolution.
    #[default]
    Transient,
    /// One instance per scope.
    Scoped,
}

/// The shape of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// An instantiable type.
    Concrete,
    /// A type that cannot be instantiated on its own.
    Abstract,
    /// A contract.
    Interface,
}

/// Where a marker on a type comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerOrigin {
    /// Written on the type itself.
    Declared,
    /// Inherited from a parent type.
    Inherited,
}

/// A kind of implementation marker the scanner can search for.
pub trait ImplementationMarker {
    /// Marker name stored in [`Marker::kind`].
    const NAME: &'static str;
}

/// Marks a host service implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceImplementation;

impl ImplementationMarker for ServiceImplementation {
    const NAME: &'static str = "ServiceImplementation";
}

/// Marks a service implementation provided by a plugin module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginServiceImplementation;

impl ImplementationMarker for PluginServiceImplementation {
    const NAME: &'static str = "PluginServiceImplementation";
}

/// A capability contract that implementations can be registered for.
///
/// Usually implemented for `dyn Trait`:
///
/// ```rust
/// use hearth_ioc::ServiceContract;
///
/// pub trait Clock: Send + Sync {}
///
/// impl ServiceContract for dyn Clock {
///     const NAME: &'static str = "example.Clock";
/// }
/// ```
pub trait ServiceContract {
    /// Fully-qualified contract name.
    const NAME: &'static str;
}

/// An implementation marker attached to a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// Marker kind, matched against [`ImplementationMarker::NAME`].
    pub kind: String,
    /// Registration priority.
    pub priority: i32,
    /// Service lifetime.
    pub lifetime: ServiceLifetime,
    /// Declared or inherited.
    pub origin: MarkerOrigin,
}

impl Marker {
    /// A marker of kind `M` declared on the type, at `NORMAL` priority with
    /// a transient lifetime.
    #[must_use]
    pub fn declared<M: ImplementationMarker>() -> Self {
        Self {
            kind: M::NAME.to_owned(),
            priority: priority::NORMAL,
            lifetime: ServiceLifetime::default(),
            origin: MarkerOrigin::Declared,
        }
    }

    /// A marker of kind `M` inherited from a parent type.
    #[must_use]
    pub fn inherited<M: ImplementationMarker>() -> Self {
        Self {
            origin: MarkerOrigin::Inherited,
            ..Self::declared::<M>()
        }
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the lifetime.
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: ServiceLifetime) -> Self {
        self.lifetime = lifetime;
        self
    }
}

/// A contract implemented by a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContractRef {
    /// Fully-qualified contract name.
    pub name: String,
    /// Whether the contract is a service contract.
    pub service: bool,
}

impl ContractRef {
    /// Reference to the service contract `C`.
    #[must_use]
    pub fn of<C: ServiceContract + ?Sized>() -> Self {
        Self {
            name: C::NAME.to_owned(),
            service: true,
        }
    }

    /// Reference to a contract that is not a service contract.
    #[must_use]
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service: false,
        }
    }
}

/// Metadata of one type in a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    name: String,
    kind: TypeKind,
    markers: Vec<Marker>,
    contracts: Vec<ContractRef>,
}

impl TypeDefinition {
    /// Create a definition with no markers or contracts.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            markers: Vec::new(),
            contracts: Vec::new(),
        }
    }

    /// Shorthand for a [`TypeKind::Concrete`] definition.
    #[must_use]
    pub fn concrete(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Concrete)
    }

    /// Attach a marker.
    #[must_use]
    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    /// Declare that this type implements the service contract `C`.
    #[must_use]
    pub fn implements<C: ServiceContract + ?Sized>(self) -> Self {
        self.with_contract(ContractRef::of::<C>())
    }

    /// Attach a contract reference.
    #[must_use]
    pub fn with_contract(mut self, contract: ContractRef) -> Self {
        self.contracts.push(contract);
        self
    }

    /// Fully-qualified type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type kind.
    #[must_use]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// All attached markers.
    #[must_use]
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// All implemented contracts.
    #[must_use]
    pub fn contracts(&self) -> &[ContractRef] {
        &self.contracts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Greeter;

    impl ServiceContract for Greeter {
        const NAME: &'static str = "test.Greeter";
    }

    #[test]
    fn test_priority_order() {
        let ordered = [
            priority::HIGHEST,
            priority::HIGH,
            priority::NORMAL,
            priority::LOW,
            priority::LOWEST,
        ];
        assert!(ordered.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_marker_defaults() {
        let marker = Marker::declared::<ServiceImplementation>();
        assert_eq!(marker.kind, "ServiceImplementation");
        assert_eq!(marker.priority, priority::NORMAL);
        assert_eq!(marker.lifetime, ServiceLifetime::Transient);
        assert_eq!(marker.origin, MarkerOrigin::Declared);

        let inherited = Marker::inherited::<PluginServiceImplementation>()
            .with_priority(priority::LOW)
            .with_lifetime(ServiceLifetime::Scoped);
        assert_eq!(inherited.kind, "PluginServiceImplementation");
        assert_eq!(inherited.origin, MarkerOrigin::Inherited);
        assert_eq!(inherited.priority, priority::LOW);
    }

    #[test]
    fn test_definition_builder() {
        let def = TypeDefinition::concrete("test.EnglishGreeter")
            .with_marker(Marker::declared::<ServiceImplementation>())
            .implements::<Greeter>()
            .with_contract(ContractRef::plain("core.Display"));

        assert_eq!(def.name(), "test.EnglishGreeter");
        assert_eq!(def.kind(), TypeKind::Concrete);
        assert_eq!(def.markers().len(), 1);
        assert_eq!(def.contracts()[0], ContractRef::of::<Greeter>());
        assert!(!def.contracts()[1].service);
    }
}
