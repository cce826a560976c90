use std::{marker::PhantomData, sync::Arc};

use crate::{
    address::{resolve, Address, Resolved},
    errors::ContainerError,
    resolver::{Dependencies, Resolver},
    services::{AppContextService, Capability, ContextService, Service},
    types::{DynError, Injectable, Instance, TypeInfo},
};

/// What a module was registered from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Function,
    Struct,
    Value,
}

/// Type-erased body of a function or struct module
pub(crate) type Invoke =
    Arc<dyn Fn(&dyn Dependencies) -> Result<Vec<Instance>, ContainerError> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Template {
    Function { address: Address, invoke: Invoke },
    Struct(Invoke),
    Value(Instance),
}

/// Anything that can be registered with the container
///
/// - [Module::value] and [Module::instance] register Existing values.
/// - [Module::constructor], [Module::try_constructor] and [Module::function] register functions,
///   whose arguments are resolved from the container and whose results become Existing values.
/// - [Module::component] registers a struct whose fields are resolved from the container.
#[derive(Clone)]
pub struct Module {
    pub(crate) declared: TypeInfo,
    pub(crate) template: Template,
    pub(crate) inputs: Vec<TypeInfo>,
    pub(crate) outputs: Vec<TypeInfo>,
    pub(crate) capabilities: Vec<(TypeInfo, Capability)>,
}

impl Module {
    /// An already existing value
    pub fn value<T: Injectable>(value: T) -> Provided<T> {
        Provided::new(Module::instance(Instance::new(value)).declared_as::<T>())
    }

    /// An erased value, addressed by the concrete type it holds
    pub fn instance(instance: Instance) -> Module {
        Module {
            declared: TypeInfo::erased(),
            template: Template::Value(instance),
            inputs: Vec::new(),
            outputs: Vec::new(),
            capabilities: Vec::new(),
        }
    }

    /// A function producing a single value
    pub fn constructor<F, Args, T>(constructor: F) -> Provided<T>
    where
        F: Constructor<Args, T>,
        T: Injectable,
    {
        let module = Module::from_function(constructor, vec![TypeInfo::of::<T>()], |value: T| {
            Ok(vec![Instance::new(value)])
        });
        Provided::new(module)
    }

    /// A function producing a single value or an error
    pub fn try_constructor<F, Args, T, E>(constructor: F) -> Provided<T>
    where
        F: Constructor<Args, Result<T, E>>,
        T: Injectable,
        E: Into<DynError> + Send + 'static,
    {
        let outputs = vec![TypeInfo::of::<T>(), TypeInfo::of::<DynError>()];
        let module = Module::from_function(constructor, outputs, |result: Result<T, E>| {
            result.map(|value| vec![Instance::new(value)]).map_err(Into::into)
        });
        Provided::new(module)
    }

    /// A function producing any number of values, see [Outputs]
    pub fn function<F, Args, R>(function: F) -> Module
    where
        F: Constructor<Args, R>,
        R: Outputs,
    {
        Module::from_function(function, R::outputs(), R::into_instances)
    }

    /// A struct whose fields are resolved from the container
    pub fn component<S: Component>() -> Provided<S> {
        let invoke: Invoke = Arc::new(
            |deps: &dyn Dependencies| -> Result<Vec<Instance>, ContainerError> {
                Ok(vec![Instance::new(S::assemble(deps)?)])
            },
        );
        Provided::new(Module {
            declared: TypeInfo::of::<S>(),
            template: Template::Struct(invoke),
            inputs: S::fields(),
            outputs: Vec::new(),
            capabilities: Vec::new(),
        })
    }

    fn from_function<F, Args, R: 'static>(
        function: F,
        outputs: Vec<TypeInfo>,
        convert: fn(R) -> Result<Vec<Instance>, DynError>,
    ) -> Module
    where
        F: Constructor<Args, R>,
    {
        let address = Address::of_function::<F>();
        let failed = address.clone();
        let invoke: Invoke = Arc::new(
            move |deps: &dyn Dependencies| -> Result<Vec<Instance>, ContainerError> {
                let produced = function.call(deps)?;
                convert(produced).map_err(|error| ContainerError::ModuleFailed {
                    address: failed.clone(),
                    error,
                })
            },
        );

        Module {
            declared: TypeInfo::of::<F>(),
            template: Template::Function { address, invoke },
            inputs: <F as Constructor<Args, R>>::inputs(),
            outputs,
            capabilities: Vec::new(),
        }
    }

    fn declared_as<T: 'static>(mut self) -> Self {
        self.declared = TypeInfo::of::<T>();
        self
    }

    /// Declares that the produced `T` starts without a context
    pub fn with_service<T: Service + Injectable + Clone>(self) -> Self {
        self.with_capability::<T>(Capability::plain::<T>())
    }

    /// Declares that the produced `T` starts with a [Context](crate::context::Context)
    pub fn with_context_service<T: ContextService + Injectable + Clone>(self) -> Self {
        self.with_capability::<T>(Capability::context::<T>())
    }

    /// Declares that the produced `T` starts with the [AppContext](crate::context::AppContext)
    pub fn with_app_context_service<T: AppContextService + Injectable + Clone>(self) -> Self {
        self.with_capability::<T>(Capability::app_context::<T>())
    }

    fn with_capability<T: 'static>(mut self, capability: Capability) -> Self {
        self.capabilities.push((TypeInfo::of::<T>(), capability));
        self
    }

    pub fn source(&self) -> Source {
        match self.template {
            Template::Function { .. } => Source::Function,
            Template::Struct(_) => Source::Struct,
            Template::Value(_) => Source::Value,
        }
    }

    /// The address the module is registered under
    pub fn address(&self) -> Resolved {
        match &self.template {
            Template::Function { address, .. } => Resolved::Address(address.clone()),
            Template::Struct(_) => resolve(&self.declared, None),
            Template::Value(instance) => resolve(&self.declared, Some(instance)),
        }
    }

    /// Types the module depends on
    pub fn inputs(&self) -> &[TypeInfo] {
        &self.inputs
    }

    /// Types a function module produces
    pub fn outputs(&self) -> &[TypeInfo] {
        &self.outputs
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("address", self.address().address())
            .field("source", &self.source())
            .finish()
    }
}

/// A module producing a single `T`, which may be declared a service
pub struct Provided<T> {
    module: Module,
    _provides: PhantomData<fn() -> T>,
}

impl<T> Provided<T> {
    fn new(module: Module) -> Self {
        Provided {
            module,
            _provides: PhantomData,
        }
    }

    pub fn into_module(self) -> Module {
        self.module
    }
}

impl<T: Injectable + Clone> Provided<T> {
    /// `T` is started with [Service::up]
    ///
    /// The started service is a clone of the registered value. Register an `Arc<T>`
    /// so dependents and the lifecycle share one object.
    pub fn service(self) -> Self
    where
        T: Service,
    {
        Provided::new(self.module.with_service::<T>())
    }

    /// `T` is started with [ContextService::up], see [Provided::service] on sharing
    pub fn context_service(self) -> Self
    where
        T: ContextService,
    {
        Provided::new(self.module.with_context_service::<T>())
    }

    /// `T` is started with [AppContextService::up], see [Provided::service] on sharing
    pub fn app_context_service(self) -> Self
    where
        T: AppContextService,
    {
        Provided::new(self.module.with_app_context_service::<T>())
    }
}

impl<T> From<Provided<T>> for Module {
    fn from(provided: Provided<T>) -> Self {
        provided.module
    }
}

/// A function whose arguments are resolved from the container
///
/// Implemented for functions and closures taking up to eight [Resolver] arguments.
pub trait Constructor<Args, Out>: Send + Sync + 'static {
    fn inputs() -> Vec<TypeInfo>;

    fn call(&self, deps: &dyn Dependencies) -> Result<Out, ContainerError>;
}

macro_rules! impl_constructor {
    ($($arg:ident),*) => {
        impl<Func, Out, $($arg,)*> Constructor<($($arg,)*), Out> for Func
        where
            Func: Fn($($arg),*) -> Out + Send + Sync + 'static,
            $($arg: Resolver,)*
        {
            fn inputs() -> Vec<TypeInfo> {
                vec![$($arg::dependency_info()),*]
            }

            #[allow(non_snake_case, unused_variables)]
            fn call(&self, deps: &dyn Dependencies) -> Result<Out, ContainerError> {
                $(let $arg = $arg::resolve(deps)?;)*
                Ok((self)($($arg),*))
            }
        }
    };
}

impl_constructor!();
impl_constructor!(A1);
impl_constructor!(A1, A2);
impl_constructor!(A1, A2, A3);
impl_constructor!(A1, A2, A3, A4);
impl_constructor!(A1, A2, A3, A4, A5);
impl_constructor!(A1, A2, A3, A4, A5, A6);
impl_constructor!(A1, A2, A3, A4, A5, A6, A7);
impl_constructor!(A1, A2, A3, A4, A5, A6, A7, A8);

/// Values returned by a [Module::function]
///
/// `()` produces nothing, tuples produce each element, and a `Result` of either
/// additionally declares the error output.
pub trait Outputs: Send + 'static {
    fn outputs() -> Vec<TypeInfo>;

    fn into_instances(self) -> Result<Vec<Instance>, DynError>;
}

impl Outputs for () {
    fn outputs() -> Vec<TypeInfo> {
        Vec::new()
    }

    fn into_instances(self) -> Result<Vec<Instance>, DynError> {
        Ok(Vec::new())
    }
}

macro_rules! impl_outputs {
    ($($out:ident),+) => {
        impl<$($out: Injectable,)+> Outputs for ($($out,)+) {
            fn outputs() -> Vec<TypeInfo> {
                vec![$(TypeInfo::of::<$out>()),+]
            }

            #[allow(non_snake_case)]
            fn into_instances(self) -> Result<Vec<Instance>, DynError> {
                let ($($out,)+) = self;
                Ok(vec![$(Instance::new($out)),+])
            }
        }
    };
}

impl_outputs!(O1);
impl_outputs!(O1, O2);
impl_outputs!(O1, O2, O3);
impl_outputs!(O1, O2, O3, O4);

impl<O: Outputs, E: Into<DynError> + Send + 'static> Outputs for Result<O, E> {
    fn outputs() -> Vec<TypeInfo> {
        let mut outputs = O::outputs();
        outputs.push(TypeInfo::of::<DynError>());
        outputs
    }

    fn into_instances(self) -> Result<Vec<Instance>, DynError> {
        self.map_err(Into::into)?.into_instances()
    }
}

/// A struct built by resolving each of its fields
///
/// Usually implemented with the [component!](crate::component) macro.
pub trait Component: Injectable + Sized {
    /// Types of the fields filled from the container
    fn fields() -> Vec<TypeInfo>;

    fn assemble(deps: &dyn Dependencies) -> Result<Self, ContainerError>;
}

/// Implements [Component] for a struct whose fields are all injected
///
/// ```ignore
/// struct Handler {
///     db: Arc<Database>,
///     config: Arc<HttpConfig>,
/// }
/// component!(Handler { db: Arc<Database>, config: Arc<HttpConfig> });
/// ```
#[macro_export]
macro_rules! component {
    ($name:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        impl $crate::module::Component for $name {
            fn fields() -> Vec<$crate::types::TypeInfo> {
                vec![$(<$ty as $crate::resolver::Resolver>::dependency_info()),*]
            }

            #[allow(unused_variables)]
            fn assemble(
                deps: &dyn $crate::resolver::Dependencies,
            ) -> Result<Self, $crate::errors::ContainerError> {
                Ok($name {
                    $($field: <$ty as $crate::resolver::Resolver>::resolve(deps)?,)*
                })
            }
        }
    };
}

/// An ordered list of modules, nested lists are flattened
#[derive(Clone, Default, Debug)]
pub struct Modules(Vec<Module>);

impl Modules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, modules: impl Into<Modules>) -> Self {
        self.0.extend(modules.into().0);
        self
    }

    pub fn push(&mut self, modules: impl Into<Modules>) {
        self.0.extend(modules.into().0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.0.iter()
    }
}

impl From<Module> for Modules {
    fn from(module: Module) -> Self {
        Modules(vec![module])
    }
}

impl<T> From<Provided<T>> for Modules {
    fn from(provided: Provided<T>) -> Self {
        Modules(vec![provided.module])
    }
}

impl From<Vec<Module>> for Modules {
    fn from(modules: Vec<Module>) -> Self {
        Modules(modules)
    }
}

impl IntoIterator for Modules {
    type Item = Module;
    type IntoIter = std::vec::IntoIter<Module>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<M: Into<Modules>> FromIterator<M> for Modules {
    fn from_iter<I: IntoIterator<Item = M>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Modules::new(), |modules, module| modules.add(module))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;

    struct Database;
    struct Cache;

    fn new_cache(_db: Arc<Database>) -> Arc<Cache> {
        Arc::new(Cache)
    }

    fn address_of<F: 'static>(_: &F) -> Address {
        Address::of_function::<F>()
    }

    #[test]
    fn constructor_declares_inputs_and_output() {
        let module: Module = Module::constructor(new_cache).into();
        assert_eq!(module.source(), Source::Function);
        assert_eq!(module.inputs(), &[TypeInfo::of::<Arc<Database>>()]);
        assert_eq!(module.outputs(), &[TypeInfo::of::<Arc<Cache>>()]);
        assert_eq!(module.address(), Resolved::Address(address_of(&new_cache)));
    }

    #[test]
    fn fallible_function_declares_error_output() {
        let module = Module::function(|_db: Arc<Database>| -> Result<(Arc<Cache>, u32), DynError> {
            Ok((Arc::new(Cache), 1))
        });
        assert_eq!(
            module.outputs(),
            &[
                TypeInfo::of::<Arc<Cache>>(),
                TypeInfo::of::<u32>(),
                TypeInfo::of::<DynError>()
            ]
        );
    }

    #[test]
    fn value_is_addressed_by_its_type() {
        let module: Module = Module::value(Arc::new(Database)).into();
        assert_eq!(module.source(), Source::Value);
        assert_eq!(module.address(), Resolved::of::<Database>());
    }

    #[test]
    fn nested_modules_are_flattened() {
        let inner = Modules::new()
            .add(Module::value(1_u8))
            .add(Module::value(2_u16));
        let modules = Modules::new()
            .add(Module::value("a".to_string()))
            .add(inner)
            .add(Module::value(3_u32));

        let addresses: Vec<_> = modules
            .iter()
            .map(|module| module.address().address().to_string())
            .collect();
        assert_eq!(
            addresses,
            vec![
                Resolved::of::<String>().address().to_string(),
                Resolved::of::<u8>().address().to_string(),
                Resolved::of::<u16>().address().to_string(),
                Resolved::of::<u32>().address().to_string(),
            ]
        );
    }
}
