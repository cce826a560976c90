use std::{any::type_name, path::Path, str::FromStr, sync::Arc};

use serde::de::DeserializeOwned;
use serde_yaml::Value;
use wrapp_container::{
    types::{Injectable, Instance, TypeInfo},
    Module, Modules,
};

use crate::{
    errors::ConfigError,
    resolver::{resolve_document, Resolver},
};

/// A typed config decoded from the document
pub trait Model: DeserializeOwned + Injectable {}
impl<T: DeserializeOwned + Injectable> Model for T {}

/// A provider to register all configs.
///
/// Holds the parsed config document. Models are decoded from the whole document,
/// each picking the keys it declares, and can be retrieved based on type.
pub struct ConfigProvider {
    document: Value,
    /// In registration order
    configs: Vec<(TypeInfo, Instance)>,
}

impl Default for ConfigProvider {
    fn default() -> Self {
        Self {
            document: Value::Mapping(Default::default()),
            configs: Vec::new(),
        }
    }
}

impl FromStr for ConfigProvider {
    type Err = ConfigError;

    /// Parses a YAML document
    fn from_str(yaml: &str) -> Result<Self, Self::Err> {
        let document = match serde_yaml::from_str::<Value>(yaml).map_err(ConfigError::Parse)? {
            Value::Null => Value::Mapping(Default::default()),
            document => document,
        };
        Ok(Self {
            document,
            configs: Vec::new(),
        })
    }
}

impl ConfigProvider {
    /// Reads and parses a YAML config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Read config file");
        yaml.parse()
    }

    /// Fills in placeholders, each resolver in turn
    ///
    /// Call it before decoding any model.
    pub fn resolve(&mut self, resolvers: &[Box<dyn Resolver>]) -> Result<&mut Self, ConfigError> {
        if !resolvers.is_empty() {
            resolve_document(&mut self.document, resolvers)?;
        }
        Ok(self)
    }

    /// Decodes the document into `T` without registering it
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        serde_yaml::from_value(self.document.clone()).map_err(|source| ConfigError::Decode {
            model: type_name::<T>(),
            source,
        })
    }

    /// Decodes the document into `T` and registers it
    ///
    /// If the model type is already registered, it will return a [`ConfigError`] runtime error
    pub fn add_model<T: Model>(&mut self) -> Result<&mut Self, ConfigError> {
        let config = self.decode::<T>()?;
        self.add_config(config)
    }

    /// Add a config to the registry.
    ///
    /// If the config type is already registered, it will return a
    /// [`ConfigError`] runtime error
    pub fn add_config<T: Injectable>(&mut self, config: T) -> Result<&mut Self, ConfigError> {
        let info = TypeInfo::of::<T>();
        if self.configs.iter().any(|(registered, _)| *registered == info) {
            return Err(ConfigError::AlreadyRegistered(info));
        }

        tracing::debug!(model = info.type_name, "Config registered");
        self.configs.push((info, Instance::new(Arc::new(config))));
        Ok(self)
    }

    /// Can optionally add a config to the registry.
    ///
    /// If the config provided is `Some(T)`, it will be the same as calling [`ConfigProvider::add_config`]
    /// If the config provided is `None`, then the function just returns `Ok(self)` for chaining
    pub fn maybe_add_config<T: Injectable>(
        &mut self,
        config: Option<T>,
    ) -> Result<&mut Self, ConfigError> {
        match config {
            Some(c) => self.add_config(c),
            None => Ok(self),
        }
    }

    /// Retrieve a config with specified type.
    pub fn get_config<T: Injectable>(&self) -> Result<Arc<T>, ConfigError> {
        let info = TypeInfo::of::<T>();
        self.configs
            .iter()
            .find(|(registered, _)| *registered == info)
            .and_then(|(_, instance)| instance.downcast_ref::<Arc<T>>().ok())
            .cloned()
            .ok_or(ConfigError::Missing(info))
    }

    /// Every registered config as a value module
    ///
    /// Modules depend on a config `T` by taking an `Arc<T>`.
    pub fn into_modules(self) -> Modules {
        self.configs
            .into_iter()
            .map(|(_, instance)| Module::instance(instance))
            .collect()
    }
}
