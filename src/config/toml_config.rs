use crate::core::RetryPolicy;
use crate::utils::error::{DurableError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 服務設定，對應 `durable-patterns.toml`
///
/// 所有區段與欄位都有預設值，空檔案也是合法設定。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub runtime: RuntimeConfig,
    pub storage: StorageConfig,
    pub stubs: StubsConfig,
    pub services: ServicesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_coefficient: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let policy = RetryPolicy::exponential();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_interval.as_millis() as u64,
            max_backoff_ms: policy.max_interval.as_millis() as u64,
            backoff_coefficient: policy.backoff_coefficient,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub output_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_path: "./output".to_string(),
        }
    }
}

/// Mock 外部系統的行為（機率介於 0 與 1 之間）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StubsConfig {
    /// 暫時性失敗的機率，由 `run` 重試
    pub failure_rate: f64,
    /// `update_user_profile` 回傳 `NOT_READY` 的機率
    pub not_ready_rate: f64,
    /// 內容審核仍為 `PENDING` 的機率
    pub pending_rate: f64,
}

impl Default for StubsConfig {
    fn default() -> Self {
        Self {
            failure_rate: 0.3,
            not_ready_rate: 0.8,
            pending_rate: 0.8,
        }
    }
}

impl StubsConfig {
    /// 永不失敗、永遠就緒
    pub fn reliable() -> Self {
        Self {
            failure_rate: 0.0,
            not_ready_rate: 0.0,
            pending_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub poll_interval_ms: u64,
    pub reservation_ttl_secs: u64,
    pub payment_timeout_secs: u64,
    pub payment_expiry_secs: u64,
    pub image_output_dir: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            reservation_ttl_secs: 15 * 60,
            payment_timeout_secs: 30,
            payment_expiry_secs: 24 * 60 * 60,
            image_output_dir: "generated-images".to_string(),
        }
    }
}

impl ServicesConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reservation_ttl(&self) -> Duration {
        Duration::from_secs(self.reservation_ttl_secs)
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_secs(self.payment_timeout_secs)
    }

    pub fn payment_expiry(&self) -> Duration {
        Duration::from_secs(self.payment_expiry_secs)
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DurableError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| DurableError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${BIND_ADDRESS})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| DurableError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential()
            .with_max_attempts(self.runtime.max_attempts)
            .with_initial_interval(Duration::from_millis(self.runtime.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(self.runtime.max_backoff_ms))
            .with_backoff_coefficient(self.runtime.backoff_coefficient)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        use crate::utils::validation::*;

        validate_socket_addr("server.bind_address", &self.server.bind_address)?;

        validate_positive_number("runtime.max_attempts", self.runtime.max_attempts as u64, 1)?;
        validate_positive_number("runtime.initial_backoff_ms", self.runtime.initial_backoff_ms, 1)?;
        if self.runtime.max_backoff_ms < self.runtime.initial_backoff_ms {
            return Err(DurableError::ConfigValidationError {
                field: "runtime.max_backoff_ms".to_string(),
                message: "must not be smaller than runtime.initial_backoff_ms".to_string(),
            });
        }
        validate_range(
            "runtime.backoff_coefficient",
            self.runtime.backoff_coefficient,
            1.0,
            10.0,
        )?;

        validate_path("storage.output_path", &self.storage.output_path)?;

        validate_range("stubs.failure_rate", self.stubs.failure_rate, 0.0, 1.0)?;
        validate_range("stubs.not_ready_rate", self.stubs.not_ready_rate, 0.0, 1.0)?;
        validate_range("stubs.pending_rate", self.stubs.pending_rate, 0.0, 1.0)?;

        validate_positive_number("services.poll_interval_ms", self.services.poll_interval_ms, 1)?;
        validate_positive_number(
            "services.payment_timeout_secs",
            self.services.payment_timeout_secs,
            1,
        )?;
        validate_non_empty_string("services.image_output_dir", &self.services.image_output_dir)?;

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}
