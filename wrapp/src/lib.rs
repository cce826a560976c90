//! Bootstrap for applications built on [wrapp_container]
//!
//! An [Application] reads the config file, sets up logging, registers the modules
//! and runs them until its [AppContext](wrapp_container::AppContext) is closed.
//! [Application::invoke] and [Application::call] run a single function instead.

pub mod application;
pub mod errors;
pub mod logger;

pub use application::{write_pid_file, Application};
pub use errors::AppError;
pub use wrapp_config as config;
pub use wrapp_container as container;
