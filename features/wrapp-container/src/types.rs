use std::{
    any::{Any, TypeId},
    fmt::Debug,
    sync::Arc,
};

/// All errors raised by modules and services must be Send + Sync
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Anything handed to the container may be shared with other threads,
/// so it needs to be Send + Sync + 'static
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// The declared type of an erased value, see [TypeInfo::erased]
pub type Erased = dyn Any + Send + Sync + 'static;

/// A type-erased value held by the registry
#[derive(Clone)]
pub struct Instance {
    pub info: TypeInfo,
    pub instance: Arc<Erased>,
}

impl Instance {
    pub fn new<ExistingInstance: Injectable>(instance: ExistingInstance) -> Self {
        Instance {
            info: TypeInfo::of::<ExistingInstance>(),
            instance: Arc::new(instance),
        }
    }

    /// Borrows the held value as `T`
    ///
    /// Returns the actual type name if the value is not a `T`
    pub fn downcast_ref<T: Injectable>(&self) -> Result<&T, &'static str> {
        self.instance
            .downcast_ref::<T>()
            .ok_or(self.info.type_name)
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Instance").field(&self.info.type_name).finish()
    }
}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }

    /// Declaration used when only the value knows its concrete type
    pub fn erased() -> TypeInfo {
        TypeInfo::of::<Erased>()
    }

    pub fn is_erased(&self) -> bool {
        self.type_id == TypeId::of::<Erased>()
    }
}
