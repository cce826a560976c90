use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::Mutex;

use crate::{
    address::Address,
    context::{AppContext, Context},
    errors::{ContainerError, ServiceStopError},
    types::{DynError, Injectable, Instance},
};

/// A service without any context
pub trait Service: Send + Sync {
    fn up(&self) -> Result<(), DynError>;
    fn down(&self) -> Result<(), DynError>;
}

/// A service observing the application lifetime
pub trait ContextService: Send + Sync {
    fn up(&self, ctx: Context) -> Result<(), DynError>;
    fn down(&self) -> Result<(), DynError>;
}

/// A service which may also close the application context
pub trait AppContextService: Send + Sync {
    fn up(&self, ctx: &AppContext) -> Result<(), DynError>;
    fn down(&self) -> Result<(), DynError>;
}

impl<T: Service + ?Sized> Service for Arc<T> {
    fn up(&self) -> Result<(), DynError> {
        (**self).up()
    }
    fn down(&self) -> Result<(), DynError> {
        (**self).down()
    }
}
impl<T: ContextService + ?Sized> ContextService for Arc<T> {
    fn up(&self, ctx: Context) -> Result<(), DynError> {
        (**self).up(ctx)
    }
    fn down(&self) -> Result<(), DynError> {
        (**self).down()
    }
}
impl<T: AppContextService + ?Sized> AppContextService for Arc<T> {
    fn up(&self, ctx: &AppContext) -> Result<(), DynError> {
        (**self).up(ctx)
    }
    fn down(&self) -> Result<(), DynError> {
        (**self).down()
    }
}

/// The life-cycle capability a value exposes
#[derive(Clone)]
pub enum ServiceKind {
    AppContext(Arc<dyn AppContextService>),
    Context(Arc<dyn ContextService>),
    Plain(Arc<dyn Service>),
}

impl ServiceKind {
    fn up(&self, ctx: &AppContext) -> Result<(), DynError> {
        match self {
            ServiceKind::AppContext(service) => service.up(ctx),
            ServiceKind::Context(service) => service.up(ctx.context()),
            ServiceKind::Plain(service) => service.up(),
        }
    }

    fn down(&self) -> Result<(), DynError> {
        match self {
            ServiceKind::AppContext(service) => service.down(),
            ServiceKind::Context(service) => service.down(),
            ServiceKind::Plain(service) => service.down(),
        }
    }
}

/// Extracts one capability shape from a value
pub type ServiceProbe = fn(&Instance) -> Option<ServiceKind>;

fn probe_app_context<T: AppContextService + Injectable + Clone>(
    instance: &Instance,
) -> Option<ServiceKind> {
    let service = instance.downcast_ref::<T>().ok()?.clone();
    Some(ServiceKind::AppContext(Arc::new(service)))
}

fn probe_context<T: ContextService + Injectable + Clone>(
    instance: &Instance,
) -> Option<ServiceKind> {
    let service = instance.downcast_ref::<T>().ok()?.clone();
    Some(ServiceKind::Context(Arc::new(service)))
}

fn probe_plain<T: Service + Injectable + Clone>(instance: &Instance) -> Option<ServiceKind> {
    let service = instance.downcast_ref::<T>().ok()?.clone();
    Some(ServiceKind::Plain(Arc::new(service)))
}

/// Capability shapes declared for an address at registration
#[derive(Clone, Copy, Default)]
pub struct Capability {
    app_context: Option<ServiceProbe>,
    context: Option<ServiceProbe>,
    plain: Option<ServiceProbe>,
}

impl Capability {
    pub fn app_context<T: AppContextService + Injectable + Clone>() -> Self {
        Capability {
            app_context: Some(probe_app_context::<T>),
            ..Default::default()
        }
    }

    pub fn context<T: ContextService + Injectable + Clone>() -> Self {
        Capability {
            context: Some(probe_context::<T>),
            ..Default::default()
        }
    }

    pub fn plain<T: Service + Injectable + Clone>() -> Self {
        Capability {
            plain: Some(probe_plain::<T>),
            ..Default::default()
        }
    }

    /// Combines two declarations, shapes already set in `self` win
    pub fn merge(self, other: Capability) -> Self {
        Capability {
            app_context: self.app_context.or(other.app_context),
            context: self.context.or(other.context),
            plain: self.plain.or(other.plain),
        }
    }

    /// Probes the value, most specific shape first
    pub fn detect(&self, instance: &Instance) -> Result<ServiceKind, ContainerError> {
        [self.app_context, self.context, self.plain]
            .into_iter()
            .flatten()
            .find_map(|probe| probe(instance))
            .ok_or(ContainerError::UnknownServiceType(instance.info.type_name))
    }
}

/// On/off flag guarding life-cycle transitions
#[derive(Debug, Default)]
pub struct Switch(AtomicBool);

impl Switch {
    /// Turns the switch on, false if it already was
    pub fn on(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Turns the switch off, false if it already was
    pub fn off(&self) -> bool {
        self.0
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_on(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_off(&self) -> bool {
        !self.is_on()
    }
}

struct StartedService {
    address: Address,
    service: ServiceKind,
}

/// Starts services in the order they are added and stops them in reverse
pub struct ServiceManager {
    ctx: AppContext,
    status: Switch,
    started: Mutex<Vec<StartedService>>,
}

impl ServiceManager {
    pub fn new(ctx: AppContext) -> Self {
        ServiceManager {
            ctx,
            status: Switch::default(),
            started: Mutex::new(Vec::new()),
        }
    }

    pub fn is_on(&self) -> bool {
        self.status.is_on()
    }

    pub fn is_off(&self) -> bool {
        self.status.is_off()
    }

    pub fn make_as_up(&self) -> Result<(), ContainerError> {
        if !self.status.on() {
            return Err(ContainerError::AlreadyRunning);
        }
        Ok(())
    }

    /// Appends the service and starts it
    ///
    /// A service which fails to start stays in the sequence, so it is still stopped on [ServiceManager::down].
    pub fn add_and_up(&self, address: &Address, service: ServiceKind) -> Result<(), ContainerError> {
        if self.is_off() {
            return Err(ContainerError::NotRunning);
        }

        self.started.lock().push(StartedService {
            address: address.clone(),
            service: service.clone(),
        });

        tracing::debug!(%address, "Starting service");
        service.up(&self.ctx).map_err(|error| {
            tracing::error!(%address, %error, "Service failed to start");
            ContainerError::ServiceStart {
                address: address.clone(),
                error,
            }
        })
    }

    /// Stops every service, last started first
    ///
    /// Keeps going past failures and reports all of them together.
    pub fn down(&self) -> Result<(), ContainerError> {
        if !self.status.off() {
            return Err(ContainerError::NotRunning);
        }

        let started = std::mem::take(&mut *self.started.lock());
        let mut errors = Vec::new();
        for StartedService { address, service } in started.into_iter().rev() {
            tracing::debug!(%address, "Stopping service");
            if let Err(error) = service.down() {
                tracing::warn!(%address, %error, "Service failed to stop");
                errors.push((address, error));
            }
        }

        if errors.is_empty() {
            return Ok(());
        }
        Err(ServiceStopError { errors }.into())
    }

    /// Addresses of the started services in start order
    pub fn started(&self) -> Vec<Address> {
        self.started
            .lock()
            .iter()
            .map(|started| started.address.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::address::Resolved;

    type Journal = Arc<Mutex<Vec<String>>>;

    #[derive(Clone)]
    struct Recorder {
        name: &'static str,
        journal: Journal,
        fail_up: bool,
        fail_down: bool,
    }

    impl Recorder {
        fn new(name: &'static str, journal: &Journal) -> Self {
            Recorder {
                name,
                journal: journal.clone(),
                fail_up: false,
                fail_down: false,
            }
        }
    }

    impl Service for Recorder {
        fn up(&self) -> Result<(), DynError> {
            self.journal.lock().push(format!("up {}", self.name));
            if self.fail_up {
                return Err("up failed".into());
            }
            Ok(())
        }

        fn down(&self) -> Result<(), DynError> {
            self.journal.lock().push(format!("down {}", self.name));
            if self.fail_down {
                return Err("down failed".into());
            }
            Ok(())
        }
    }

    fn address(name: &'static str) -> Address {
        match name {
            "a" => Resolved::of::<u8>().ok().unwrap(),
            "b" => Resolved::of::<u16>().ok().unwrap(),
            _ => Resolved::of::<u32>().ok().unwrap(),
        }
    }

    fn plain(recorder: Recorder) -> ServiceKind {
        ServiceKind::Plain(Arc::new(recorder))
    }

    #[test]
    fn stops_in_reverse_start_order() {
        let journal = Journal::default();
        let manager = ServiceManager::new(AppContext::new());
        manager.make_as_up().unwrap();

        for name in ["a", "b", "c"] {
            manager
                .add_and_up(&address(name), plain(Recorder::new(name, &journal)))
                .unwrap();
        }
        manager.down().unwrap();

        assert_eq!(
            *journal.lock(),
            vec!["up a", "up b", "up c", "down c", "down b", "down a"]
        );
        assert!(manager.started().is_empty());
    }

    #[test]
    fn aggregates_stop_failures_and_keeps_going() {
        let journal = Journal::default();
        let manager = ServiceManager::new(AppContext::new());
        manager.make_as_up().unwrap();

        let mut b = Recorder::new("b", &journal);
        b.fail_down = true;
        let mut c = Recorder::new("c", &journal);
        c.fail_down = true;
        manager.add_and_up(&address("a"), plain(Recorder::new("a", &journal))).unwrap();
        manager.add_and_up(&address("b"), plain(b)).unwrap();
        manager.add_and_up(&address("c"), plain(c)).unwrap();

        let Err(ContainerError::Stop(error)) = manager.down() else {
            panic!("expected aggregated stop error");
        };
        assert_eq!(
            error.failed().cloned().collect::<Vec<_>>(),
            vec![address("c"), address("b")]
        );
        assert!(journal.lock().contains(&"down a".to_string()));
    }

    #[test]
    fn failed_start_is_still_stopped() {
        let journal = Journal::default();
        let manager = ServiceManager::new(AppContext::new());
        manager.make_as_up().unwrap();

        let mut a = Recorder::new("a", &journal);
        a.fail_up = true;
        let result = manager.add_and_up(&address("a"), plain(a));
        assert!(matches!(result, Err(ContainerError::ServiceStart { .. })));

        manager.down().unwrap();
        assert_eq!(*journal.lock(), vec!["up a", "down a"]);
    }

    #[test]
    fn requires_running_state() {
        let journal = Journal::default();
        let manager = ServiceManager::new(AppContext::new());

        let result = manager.add_and_up(&address("a"), plain(Recorder::new("a", &journal)));
        assert!(matches!(result, Err(ContainerError::NotRunning)));
        assert!(matches!(manager.down(), Err(ContainerError::NotRunning)));

        manager.make_as_up().unwrap();
        assert!(matches!(
            manager.make_as_up(),
            Err(ContainerError::AlreadyRunning)
        ));
        manager.down().unwrap();
        assert!(journal.lock().is_empty());
    }

    #[derive(Clone)]
    struct Both;
    impl Service for Both {
        fn up(&self) -> Result<(), DynError> {
            Err("plain shape used".into())
        }
        fn down(&self) -> Result<(), DynError> {
            Ok(())
        }
    }
    impl ContextService for Both {
        fn up(&self, _ctx: Context) -> Result<(), DynError> {
            Ok(())
        }
        fn down(&self) -> Result<(), DynError> {
            Ok(())
        }
    }

    #[test]
    fn detect_prefers_the_most_specific_shape() {
        let capability = Capability::plain::<Both>().merge(Capability::context::<Both>());
        let service = capability.detect(&Instance::new(Both)).unwrap();
        assert!(matches!(service, ServiceKind::Context(_)));
        assert!(service.up(&AppContext::new()).is_ok());
    }

    #[test]
    fn detect_fails_on_mismatched_value() {
        let capability = Capability::plain::<Both>();
        assert!(matches!(
            capability.detect(&Instance::new(42_u8)),
            Err(ContainerError::UnknownServiceType(_))
        ));
    }
}
