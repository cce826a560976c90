use std::path::{Path, PathBuf};

use wrapp_config::{AppConfig, ConfigError, ConfigProvider, Env, LogConfig, Model, Resolver};
use wrapp_container::{AppContext, Container, ContainerError, Module, Modules};

use crate::{errors::AppError, logger::setup_logger};

type AddModel = fn(&mut ConfigProvider) -> Result<(), ConfigError>;

fn add_model<T: Model>(provider: &mut ConfigProvider) -> Result<(), ConfigError> {
    provider.add_model::<T>().map(|_| ())
}

/// Entry point of an application
///
/// ```ignore
/// fn main() {
///     let code = Application::new()
///         .config_file("config.yaml")
///         .config_model::<HttpConfig>()
///         .modules(Module::try_constructor(HttpServer::new).context_service())
///         .run();
///     std::process::exit(code);
/// }
/// ```
pub struct Application {
    ctx: AppContext,
    container: Container,
    modules: Modules,
    config_file: Option<PathBuf>,
    config_models: Vec<AddModel>,
    config_resolvers: Vec<Box<dyn Resolver>>,
    pid_file: Option<PathBuf>,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    pub fn new() -> Self {
        let ctx = AppContext::new();
        Self {
            container: Container::new(ctx.clone()),
            ctx,
            modules: Modules::new(),
            config_file: None,
            config_models: Vec::new(),
            config_resolvers: Vec::new(),
            pid_file: None,
        }
    }

    /// Appends modules, nested lists are flattened
    pub fn modules(mut self, modules: impl Into<Modules>) -> Self {
        self.modules.push(modules);
        self
    }

    pub fn config_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Decodes `T` from the config file and registers it as `Arc<T>`
    pub fn config_model<T: Model>(mut self) -> Self {
        self.config_models.push(add_model::<T>);
        self
    }

    /// Fill in placeholders of the config file before anything is decoded
    ///
    /// ```ignore
    /// Application::new()
    ///     .config_file("config.yaml")
    ///     .config_resolvers([Box::new(EnvResolver) as Box<dyn Resolver>])
    /// ```
    pub fn config_resolvers(
        mut self,
        resolvers: impl IntoIterator<Item = Box<dyn Resolver>>,
    ) -> Self {
        self.config_resolvers.extend(resolvers);
        self
    }

    /// Written on [Application::run] once the config is read
    pub fn pid_file(mut self, path: impl AsRef<Path>) -> Self {
        self.pid_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// The application lifetime, closing it ends [Application::run]
    pub fn context(&self) -> AppContext {
        self.ctx.clone()
    }

    /// Starts every module and blocks until the context is closed
    ///
    /// Returns the exit code, 1 if any step failed.
    pub fn run(mut self) -> i32 {
        if let Err(error) = self.prepare(false) {
            eprintln!("failed to prepare application: {error}");
            return 1;
        }

        let modules = std::mem::take(&mut self.modules);
        let (container, ctx) = (&self.container, &self.ctx);
        let failed = steps(
            vec![
                Step::new("Registering dependencies", move || {
                    container.register(modules)
                }),
                Step::new("Running dependencies", || container.start()),
            ],
            |failed| {
                if failed {
                    ctx.close();
                    return;
                }
                ctx.wait();
            },
            vec![Step::new("Stop dependencies", || container.stop())],
        );
        exit_code(failed)
    }

    /// Starts every module, calls `call` once and stops again
    pub fn invoke(mut self, call: impl Into<Module>) -> i32 {
        if let Err(error) = self.prepare(true) {
            eprintln!("failed to prepare application: {error}");
            return 1;
        }

        let modules = std::mem::take(&mut self.modules);
        let call = call.into();
        let container = &self.container;
        let failed = steps(
            vec![
                Step::new("Registering dependencies", move || {
                    container.register(modules)
                }),
                Step::new("Running dependencies", || container.start()),
                Step::new("Invoking", move || container.invoke(call)),
            ],
            |_| {},
            vec![Step::new("Stop dependencies", || container.stop())],
        );
        exit_code(failed)
    }

    /// Builds only what `call` depends on, calls it and stops again
    pub fn call(mut self, call: impl Into<Module>) -> i32 {
        if let Err(error) = self.prepare(true) {
            eprintln!("failed to prepare application: {error}");
            return 1;
        }

        let modules = std::mem::take(&mut self.modules);
        let call = call.into();
        let break_point = call.clone();
        let container = &self.container;
        let failed = steps(
            vec![
                Step::new("Registering dependencies", move || {
                    container.register(modules)
                }),
                Step::new("Registering call", move || container.register(call)),
                Step::new("Setting break point", move || {
                    container.break_point(break_point)
                }),
                Step::new("Running dependencies", || container.start()),
            ],
            |_| {},
            vec![Step::new("Stop dependencies", || container.stop())],
        );
        exit_code(failed)
    }

    /// Sets up logging and turns the config file into modules
    ///
    /// Interactive runs log everything to stdout and never write a pid file.
    fn prepare(&mut self, interactive: bool) -> Result<(), AppError> {
        match self.config_file.clone() {
            None => setup_logger(&LogConfig::default())?,
            Some(path) => {
                let mut provider = ConfigProvider::from_file(&path)?;
                provider.resolve(&self.config_resolvers)?;
                let mut config: AppConfig = provider.decode()?;
                if interactive {
                    config.log = config.log.interactive();
                }
                setup_logger(&config.log)?;
                tracing::debug!(path = %path.display(), env = %config.env, "Config loaded");

                for model in &self.config_models {
                    model(&mut provider)?;
                }
                self.modules.push(Module::value(Env(config.env)));
                self.modules.push(provider.into_modules());
            }
        }

        if !interactive {
            if let Some(path) = &self.pid_file {
                write_pid_file(path)?;
            }
        }

        self.modules.push(Module::value(self.ctx.clone()));
        Ok(())
    }
}

/// Writes the id of the current process
pub fn write_pid_file(path: impl AsRef<Path>) -> Result<(), AppError> {
    let path = path.as_ref();
    std::fs::write(path, std::process::id().to_string()).map_err(|source| AppError::PidFile {
        path: path.to_path_buf(),
        source,
    })
}

struct Step<'a> {
    message: &'static str,
    call: Box<dyn FnOnce() -> Result<(), ContainerError> + 'a>,
}

impl<'a> Step<'a> {
    fn new(message: &'static str, call: impl FnOnce() -> Result<(), ContainerError> + 'a) -> Self {
        Step {
            message,
            call: Box::new(call),
        }
    }
}

/// Runs `up` until the first failure, then `wait`, then every `down` step
///
/// Returns whether any step failed.
fn steps(up: Vec<Step<'_>>, wait: impl FnOnce(bool), down: Vec<Step<'_>>) -> bool {
    let mut failures = 0;
    for Step { message, call } in up {
        tracing::info!("{message}");
        if let Err(error) = call() {
            tracing::error!(%error, "{message}");
            failures += 1;
            break;
        }
    }

    wait(failures > 0);

    for Step { message, call } in down {
        tracing::info!("{message}");
        if let Err(error) = call() {
            tracing::error!(%error, "{message}");
            failures += 1;
        }
    }

    failures > 0
}

fn exit_code(failed: bool) -> i32 {
    if failed {
        1
    } else {
        0
    }
}
