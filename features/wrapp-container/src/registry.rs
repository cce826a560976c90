use std::collections::HashMap;

use parking_lot::RwLock;

use crate::{
    address::{resolve, Address, Resolved},
    errors::ContainerError,
    module::{Module, Source, Template},
    resolver::Dependencies,
    services::{Capability, ServiceKind},
    types::{Instance, TypeInfo},
};

/// Whether an entry still needs to be built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// A function or struct template
    New,
    /// A concrete value
    Existing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    NotService,
    PendingStart,
    Started,
}

/// One registered module
#[derive(Clone)]
pub struct Entry {
    pub address: Address,
    pub relation: Relation,
    pub source: Source,
    pub(crate) template: Template,
    pub inputs: Vec<TypeInfo>,
    pub outputs: Vec<TypeInfo>,
    pub service: ServiceState,
    pub(crate) lifecycle: Option<ServiceKind>,
}

impl Entry {
    /// The held value of an Existing entry
    pub fn value(&self) -> Option<&Instance> {
        match &self.template {
            Template::Value(instance) => Some(instance),
            Template::Function { .. } | Template::Struct(_) => None,
        }
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("address", &self.address)
            .field("relation", &self.relation)
            .field("source", &self.source)
            .field("service", &self.service)
            .finish()
    }
}

/// All registered modules, one entry per address
#[derive(Default)]
pub struct ObjectRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    /// Kept in registration order
    entries: Vec<Entry>,
    index: HashMap<Address, usize>,
    /// Service shapes declared per address
    capabilities: HashMap<Address, Capability>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module under its address
    ///
    /// The error type is skipped silently. An address held by an Existing entry
    /// is never overwritten, a New entry is replaced in place.
    pub fn add(&self, module: Module, relation: Relation) -> Result<(), ContainerError> {
        let address = match module.address() {
            Resolved::Address(address) => address,
            Resolved::Error => return Ok(()),
            Resolved::Unsupported(address) => {
                return Err(ContainerError::UnsupportedDependency(address))
            }
        };

        let mut inner = self.inner.write();
        if let Some(&position) = inner.index.get(&address) {
            if inner.entries[position].relation == Relation::Existing {
                return Err(ContainerError::AlreadyInitiated(address));
            }
        }

        let source = module.source();
        let Module {
            template,
            inputs,
            outputs,
            capabilities,
            ..
        } = module;

        for (info, capability) in capabilities {
            if let Some(declared) = resolve(&info, None).ok() {
                inner.declare(declared, capability);
            }
        }

        let lifecycle = match &template {
            Template::Value(instance) => match inner.capabilities.get(&address) {
                Some(capability) => Some(capability.detect(instance)?),
                None => None,
            },
            Template::Function { .. } | Template::Struct(_) => None,
        };
        let service = match lifecycle {
            Some(_) => ServiceState::PendingStart,
            None => ServiceState::NotService,
        };

        tracing::debug!(%address, ?relation, ?source, ?service, "Registered");
        let entry = Entry {
            address: address.clone(),
            relation,
            source,
            template,
            inputs,
            outputs,
            service,
            lifecycle,
        };
        match inner.index.get(&address) {
            Some(&position) => inner.entries[position] = entry,
            None => {
                let position = inner.entries.len();
                inner.entries.push(entry);
                inner.index.insert(address, position);
            }
        }

        Ok(())
    }

    /// Records the service shapes declared for an address
    ///
    /// Shapes are merged with earlier declarations, a shape declared first is kept.
    /// Values added afterwards are probed against the merged declaration.
    pub fn declare_service(&self, address: Address, capability: Capability) {
        self.inner.write().declare(address, capability);
    }

    pub fn get_by_address(&self, address: &Address) -> Result<Entry, ContainerError> {
        let inner = self.inner.read();
        inner
            .index
            .get(address)
            .map(|&position| inner.entries[position].clone())
            .ok_or_else(|| ContainerError::NotInitiated(address.clone()))
    }

    /// Resolves the type, then looks it up
    ///
    /// The error type fails with [ContainerError::ErrorType] so callers can skip it.
    pub fn get_by_type(
        &self,
        info: &TypeInfo,
        value: Option<&Instance>,
    ) -> Result<Entry, ContainerError> {
        match resolve(info, value) {
            Resolved::Address(address) => self.get_by_address(&address),
            Resolved::Error => Err(ContainerError::ErrorType),
            Resolved::Unsupported(address) => Err(ContainerError::UnsupportedDependency(address)),
        }
    }

    /// Visits a snapshot of all entries in registration order
    pub fn each<E>(&self, mut visit: impl FnMut(&Entry) -> Result<(), E>) -> Result<(), E> {
        let snapshot = self.inner.read().entries.clone();
        for entry in &snapshot {
            visit(entry)?;
        }
        Ok(())
    }

    pub fn set_service_state(&self, address: &Address, state: ServiceState) {
        let mut inner = self.inner.write();
        if let Some(&position) = inner.index.get(address) {
            inner.entries[position].service = state;
        }
    }

    /// The service a value would be started as, if its type declared one
    pub fn service_of(&self, instance: &Instance) -> Result<Option<ServiceKind>, ContainerError> {
        let Some(address) = resolve(&instance.info, None).ok() else {
            return Ok(None);
        };
        match self.inner.read().capabilities.get(&address) {
            Some(capability) => capability.detect(instance).map(Some),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RegistryInner {
    fn declare(&mut self, address: Address, capability: Capability) {
        let merged = match self.capabilities.get(&address) {
            Some(existing) => existing.merge(capability),
            None => capability,
        };
        self.capabilities.insert(address, merged);
    }
}

impl Dependencies for ObjectRegistry {
    fn instance(&self, info: &TypeInfo) -> Result<Instance, ContainerError> {
        let entry = self.get_by_type(info, None)?;
        match (entry.relation, entry.value()) {
            (Relation::Existing, Some(instance)) => Ok(instance.clone()),
            _ => Err(ContainerError::NotInitiated(entry.address)),
        }
    }
}
