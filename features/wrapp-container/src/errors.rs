use thiserror::Error;

use crate::{address::Address, types::DynError};

/// Errors returned by the [Container](crate::container::Container) and its parts
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("dependencies are already running")]
    AlreadyRunning,
    #[error("dependencies are not running yet")]
    NotRunning,
    /// The container was stopped and can not be started again
    #[error("dependencies were stopped")]
    Stopped,
    /// An Existing entry already holds this address
    #[error("dependency [{0}] already initiated")]
    AlreadyInitiated(Address),
    /// Nothing Existing is registered under this address
    #[error("dependency [{0}] not initiated")]
    NotInitiated(Address),
    #[error("dependency [{0}] is not supported")]
    UnsupportedDependency(Address),
    /// The error type was requested - callers usually skip it
    #[error("the error type is not a dependency")]
    ErrorType,
    /// A declared service capability does not match the value
    #[error("unknown service [{0}]")]
    UnknownServiceType(&'static str),
    #[error("dependency graph calculation: {0}")]
    CycleDetected(#[from] CycleError),
    #[error("invalid breakpoint: {0}")]
    InvalidBreakPoint(&'static str),
    #[error("failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
    /// A constructor returned an error
    #[error("module [{address}] failed: {error}")]
    ModuleFailed { address: Address, error: DynError },
    #[error("service initialization error [{address}]: {error}")]
    ServiceStart { address: Address, error: DynError },
    #[error("initialize error [{address}]: {source}")]
    Initialize {
        address: Address,
        source: Box<ContainerError>,
    },
    #[error(transparent)]
    Stop(#[from] ServiceStopError),
}

impl ContainerError {
    pub(crate) fn initialize(address: &Address, source: ContainerError) -> Self {
        ContainerError::Initialize {
            address: address.clone(),
            source: Box::new(source),
        }
    }

    /// The error below all `initialize error` wrappers
    pub fn root_cause(&self) -> &ContainerError {
        match self {
            ContainerError::Initialize { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// No topological order exists
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("dependency cycle detected between {unresolved:?}")]
pub struct CycleError {
    /// Nodes left with unresolved dependencies
    pub unresolved: Vec<Address>,
}

/// All failures collected while stopping services
#[derive(Error, Debug)]
pub struct ServiceStopError {
    pub errors: Vec<(Address, DynError)>,
}

impl ServiceStopError {
    /// Addresses of the services which failed to stop, in stop order
    pub fn failed(&self) -> impl Iterator<Item = &Address> {
        self.errors.iter().map(|(address, _)| address)
    }
}

impl std::fmt::Display for ServiceStopError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("one or more services failed to stop:".to_string());
        for (address, error) in &self.errors {
            display.push(format!("- down [{address}] service error: {error}"));
        }
        f.write_str(&display.join("\n"))
    }
}
