//! Dependency container with service life-cycles
//!
//! Modules are registered as values, constructor functions or components.
//! On [Container::start] every function and component is built in dependency order,
//! its results become available to the modules depending on them, and every value
//! declared as a service is started. [Container::stop] stops the services in reverse.

pub mod address;
pub mod container;
pub mod context;
pub mod dependency_graph;
pub mod errors;
pub mod module;
pub mod registry;
pub mod resolver;
pub mod services;
pub mod types;

pub use address::Address;
pub use container::Container;
pub use context::{AppContext, Context};
pub use errors::{ContainerError, CycleError, ServiceStopError};
pub use module::{Component, Module, Modules, Provided};
pub use resolver::{Dependencies, Resolver};
pub use services::{AppContextService, ContextService, Service};
pub use types::{DynError, Injectable, Instance, TypeInfo};
