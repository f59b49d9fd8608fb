pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, toml_config::AppConfig};

#[cfg(feature = "lambda")]
pub use config::lambda::{LambdaConfig, S3Storage};

pub use adapters::client::IngressClient;
pub use adapters::stubs::ExternalClients;
pub use app::build_endpoint;
pub use core::{LocalRuntime, RetryPolicy, Target};
pub use utils::error::{DurableError, Result};
