use thiserror::Error;

#[derive(Error, Debug)]
pub enum DurableError {
    /// 不可重試的業務錯誤，直接回傳給呼叫端
    #[error("{message}")]
    Terminal { code: u16, message: String },

    #[error("Transient failure: {message}")]
    Transient { message: String },

    #[error("Action '{name}' failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        name: String,
        attempts: u32,
        message: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Service not found: {service}")]
    ServiceNotFound { service: String },

    #[error("Handler not found: {service}/{handler}")]
    HandlerNotFound { service: String, handler: String },

    #[error("A key is required to invoke {service}/{handler}")]
    MissingKey { service: String, handler: String },

    #[error("Awakeable not found: {id}")]
    AwakeableNotFound { id: String },

    #[error("Awakeable {id} was dropped before completion")]
    AwakeableDropped { id: String },

    #[error("Workflow {service}/{key} has already been started")]
    WorkflowAlreadyStarted { service: String, key: String },

    #[error("Workflow {service}/{key} not found")]
    WorkflowNotFound { service: String, key: String },

    #[error("Workflow {service}/{key} has not completed yet")]
    WorkflowNotCompleted { service: String, key: String },

    #[error("Promise '{name}' has already been completed")]
    PromiseAlreadyCompleted { name: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },
}

impl DurableError {
    pub fn terminal(message: impl Into<String>) -> Self {
        Self::Terminal {
            code: 500,
            message: message.into(),
        }
    }

    pub fn terminal_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Terminal {
            code,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// 只有暫時性錯誤會在 `run` 內被重試
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transient { .. } | Self::IoError(_) | Self::HttpError(_) | Self::StorageError { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_retryable()
    }

    /// HTTP ingress 使用的狀態碼
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Terminal { code, .. } => *code,
            Self::ServiceNotFound { .. }
            | Self::HandlerNotFound { .. }
            | Self::AwakeableNotFound { .. }
            | Self::WorkflowNotFound { .. } => 404,
            Self::WorkflowAlreadyStarted { .. }
            | Self::WorkflowNotCompleted { .. }
            | Self::PromiseAlreadyCompleted { .. } => 409,
            Self::MissingKey { .. } | Self::SerializationError(_) => 400,
            Self::Transient { .. } | Self::HttpError(_) => 503,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, DurableError>;
