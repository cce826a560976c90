use std::any::type_name;

use crate::{
    errors::ContainerError,
    types::{Injectable, Instance, TypeInfo},
};

/// Read access to already existing instances while a module is being built
pub trait Dependencies {
    /// Returns the Existing instance stored for the declared type
    fn instance(&self, info: &TypeInfo) -> Result<Instance, ContainerError>;
}

/// Allows custom behaviour on injection
///
/// Implemented for every cloneable [Injectable], so function arguments and
/// component fields are plain types such as `Arc<Database>`.
pub trait Resolver: Sized {
    /// The type this argument is looked up by
    fn dependency_info() -> TypeInfo;

    fn resolve(deps: &dyn Dependencies) -> Result<Self, ContainerError>;
}

impl<T: Injectable + Clone> Resolver for T {
    fn dependency_info() -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn resolve(deps: &dyn Dependencies) -> Result<Self, ContainerError> {
        let instance = deps.instance(&Self::dependency_info())?;
        instance
            .downcast_ref::<T>()
            .cloned()
            .map_err(|actual_type| ContainerError::DowncastFailed {
                required_type: type_name::<T>(),
                actual_type,
            })
    }
}
