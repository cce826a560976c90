use std::{
    fmt::Debug,
    sync::atomic::{AtomicBool, Ordering},
};

use parking_lot::Mutex;

use crate::{
    address::{resolve, Address, Resolved},
    context::AppContext,
    dependency_graph::DependencyGraph,
    errors::ContainerError,
    module::{Module, Modules, Source, Template},
    registry::{Entry, ObjectRegistry, Relation, ServiceState},
    resolver::{Dependencies, Resolver},
    services::{ServiceManager, Switch},
    types::Instance,
};

/// Builds registered modules in dependency order and runs the services among them
///
/// ```ignore
/// let container = Container::new(AppContext::new());
/// container.register(
///     Modules::new()
///         .add(Module::value(Arc::new(config)))
///         .add(Module::try_constructor(Database::connect).service())
///         .add(Module::component::<Handler>()),
/// )?;
/// container.start()?;
/// // ...
/// container.stop()?;
/// ```
pub struct Container {
    registry: ObjectRegistry,
    services: ServiceManager,
    status: Switch,
    stopped: AtomicBool,
    break_point: Mutex<Option<Address>>,
}

impl Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        let _ = self.registry.each(|entry| {
            map.entry(&entry.address.as_str(), &entry.relation);
            Ok::<_, ()>(())
        });
        map.finish()
    }
}

impl Container {
    pub fn new(ctx: AppContext) -> Self {
        Container {
            registry: ObjectRegistry::new(),
            services: ServiceManager::new(ctx),
            status: Switch::default(),
            stopped: AtomicBool::new(false),
            break_point: Mutex::new(None),
        }
    }

    /// Registers modules, functions and structs are built on [Container::start]
    pub fn register(&self, modules: impl Into<Modules>) -> Result<(), ContainerError> {
        self.check_configurable()?;

        let modules: Modules = modules.into();
        for module in modules {
            let relation = match module.source() {
                Source::Function | Source::Struct => Relation::New,
                Source::Value => Relation::Existing,
            };
            self.registry.add(module, relation)?;
        }
        Ok(())
    }

    /// Builds only what the given function depends on
    ///
    /// The function itself has to be registered as well.
    pub fn break_point(&self, module: impl Into<Module>) -> Result<(), ContainerError> {
        self.check_configurable()?;

        let module = module.into();
        if module.source() != Source::Function {
            return Err(ContainerError::InvalidBreakPoint(
                "breakpoint can only be a function",
            ));
        }
        let address = module
            .address()
            .ok()
            .ok_or(ContainerError::InvalidBreakPoint("invalid breakpoint address"))?;

        tracing::debug!(%address, "Break point set");
        *self.break_point.lock() = Some(address);
        Ok(())
    }

    fn check_configurable(&self) -> Result<(), ContainerError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(ContainerError::Stopped);
        }
        if self.services.is_on() {
            return Err(ContainerError::AlreadyRunning);
        }
        Ok(())
    }

    /// Builds every module and starts the services, dependencies first
    ///
    /// On failure the services started so far keep running until [Container::stop].
    pub fn start(&self) -> Result<(), ContainerError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(ContainerError::Stopped);
        }
        if !self.status.on() {
            return Err(ContainerError::AlreadyRunning);
        }
        self.services.make_as_up()?;

        let mut graph = DependencyGraph::from_registry(&self.registry)?;
        if let Some(address) = self.break_point.lock().clone() {
            graph.break_point(address);
        }
        let order = graph.build()?;

        self.run(&order)
    }

    fn run(&self, order: &[Address]) -> Result<(), ContainerError> {
        for address in order {
            if address.is_root() || address.is_error() {
                continue;
            }

            let entry = self.registry.get_by_address(address)?;
            match entry.relation {
                Relation::Existing => self.start_pending(&entry)?,
                Relation::New => {
                    tracing::debug!(%address, source = ?entry.source, "Initializing");
                    let outputs = self
                        .call(&entry)
                        .map_err(|error| ContainerError::initialize(address, error))?;
                    for output in outputs {
                        self.promote(output)
                            .map_err(|error| ContainerError::initialize(address, error))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn call(&self, entry: &Entry) -> Result<Vec<Instance>, ContainerError> {
        match &entry.template {
            Template::Function { invoke, .. } | Template::Struct(invoke) => {
                invoke(&self.registry as &dyn Dependencies)
            }
            Template::Value(instance) => Ok(vec![instance.clone()]),
        }
    }

    /// Stores a produced value as Existing and starts it if it is a service
    fn promote(&self, output: Instance) -> Result<(), ContainerError> {
        self.registry
            .add(Module::instance(output.clone()), Relation::Existing)?;

        let entry = match self.registry.get_by_type(&output.info, None) {
            Ok(entry) => entry,
            Err(ContainerError::ErrorType) => return Ok(()),
            Err(error) => return Err(error),
        };
        tracing::debug!(address = %entry.address, "Promoted");
        self.start_pending(&entry)
    }

    fn start_pending(&self, entry: &Entry) -> Result<(), ContainerError> {
        if entry.service != ServiceState::PendingStart {
            return Ok(());
        }
        let Some(service) = entry.lifecycle.clone() else {
            return Ok(());
        };

        self.services.add_and_up(&entry.address, service)?;
        self.registry
            .set_service_state(&entry.address, ServiceState::Started);
        Ok(())
    }

    /// Calls a module against the running container
    ///
    /// Produced values are not stored, but declared services among them are started
    /// and stopped with the container.
    pub fn invoke(&self, module: impl Into<Module>) -> Result<(), ContainerError> {
        if self.services.is_off() {
            return Err(ContainerError::NotRunning);
        }

        let module = module.into();
        let address = match module.address() {
            Resolved::Address(address) => address,
            Resolved::Error => return Err(ContainerError::ErrorType),
            Resolved::Unsupported(address) => {
                return Err(ContainerError::UnsupportedDependency(address))
            }
        };
        self.registry.add(module, Relation::New)?;
        let entry = self.registry.get_by_address(&address)?;

        tracing::debug!(%address, "Invoking");
        for output in self.call(&entry)? {
            let Some(service) = self.registry.service_of(&output)? else {
                continue;
            };
            let address = resolve(&output.info, None).address().clone();
            self.services.add_and_up(&address, service)?;
        }
        Ok(())
    }

    /// Stops all started services in reverse order
    ///
    /// Stopping twice is a no-op. A stopped container can not be started again.
    pub fn stop(&self) -> Result<(), ContainerError> {
        if !self.status.off() {
            return Ok(());
        }
        self.stopped.store(true, Ordering::SeqCst);
        self.services.down()
    }

    /// Attempts to get an Existing instance
    pub fn require<T: Resolver>(&self) -> Result<T, ContainerError> {
        T::resolve(&self.registry)
    }

    pub fn is_running(&self) -> bool {
        self.status.is_on()
    }

    /// Addresses of the running services in start order
    pub fn started_services(&self) -> Vec<Address> {
        self.services.started()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tracing_test::traced_test;

    use super::*;
    use crate::types::DynError;

    struct Config;

    #[derive(Clone)]
    struct Report(u32);

    #[derive(Clone)]
    struct Marker;
    crate::component!(Marker {});

    #[test]
    fn values_are_available_after_start() {
        let container = Container::new(AppContext::new());
        container
            .register(Module::value(Arc::new(Config)))
            .unwrap();
        container
            .register(Module::constructor(|_config: Arc<Config>| Report(3)))
            .unwrap();

        assert!(matches!(
            container.require::<Report>(),
            Err(ContainerError::NotInitiated(_))
        ));
        container.start().unwrap();
        assert_eq!(container.require::<Report>().unwrap().0, 3);
        assert!(container.require::<Arc<Config>>().is_ok());
        container.stop().unwrap();
    }

    #[test]
    fn lifecycle_transitions() {
        let container = Container::new(AppContext::new());
        assert!(!container.is_running());
        container.stop().unwrap();

        container.start().unwrap();
        assert!(container.is_running());
        assert!(matches!(
            container.start(),
            Err(ContainerError::AlreadyRunning)
        ));
        assert!(matches!(
            container.register(Module::value(1_u8)),
            Err(ContainerError::AlreadyRunning)
        ));

        container.stop().unwrap();
        container.stop().unwrap();
        assert!(matches!(container.start(), Err(ContainerError::Stopped)));
        assert!(matches!(
            container.register(Module::value(1_u8)),
            Err(ContainerError::Stopped)
        ));
    }

    #[test]
    fn break_point_must_be_a_function() {
        let container = Container::new(AppContext::new());
        assert!(matches!(
            container.break_point(Module::value(1_u8)),
            Err(ContainerError::InvalidBreakPoint(_))
        ));
        assert!(matches!(
            container.break_point(Module::component::<Marker>()),
            Err(ContainerError::InvalidBreakPoint(_))
        ));
    }

    #[test]
    fn failing_constructor_is_wrapped_with_its_address() {
        let container = Container::new(AppContext::new());
        container
            .register(Module::try_constructor(|| -> Result<Report, DynError> {
                Err("no report".into())
            }))
            .unwrap();

        let error = container.start().unwrap_err();
        assert!(error.to_string().starts_with("initialize error ["));
        assert!(matches!(
            error.root_cause(),
            ContainerError::ModuleFailed { .. }
        ));
        assert!(container.require::<Report>().is_err());
    }

    #[traced_test]
    #[test]
    fn construction_is_logged() {
        let container = Container::new(AppContext::new());
        container.register(Module::value(Arc::new(Config))).unwrap();
        container
            .register(Module::constructor(|_config: Arc<Config>| Report(1)))
            .unwrap();
        container.start().unwrap();

        assert!(logs_contain("Dependency order"));
        assert!(logs_contain("Initializing"));
        assert!(logs_contain("Promoted"));
    }
}
