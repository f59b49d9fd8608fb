pub mod cli;
pub mod lambda;
pub mod toml_config;

#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

/// `durable-patterns` 伺服器的命令列參數，會覆蓋 TOML 設定
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "durable-patterns")]
#[command(about = "Serves the durable execution examples over HTTP")]
pub struct CliConfig {
    #[arg(long, short, help = "Path to a TOML configuration file")]
    pub config: Option<String>,

    #[arg(long, help = "Address to listen on, e.g. 0.0.0.0:9080")]
    pub bind: Option<String>,

    #[arg(long, help = "Directory where generated images are written")]
    pub output_path: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 載入 TOML（若有指定）再套用命令列覆蓋值
    pub fn load(&self) -> crate::utils::error::Result<toml_config::AppConfig> {
        let mut config = match &self.config {
            Some(path) => toml_config::AppConfig::from_file(path)?,
            None => toml_config::AppConfig::default(),
        };

        if let Some(bind) = &self.bind {
            config.server.bind_address = bind.clone();
        }
        if let Some(output_path) = &self.output_path {
            config.storage.output_path = output_path.clone();
        }
        Ok(config)
    }
}
