use thiserror::Error;

/// Errors surfaced by the runner, executor, skills subsystem, secrets core,
/// and egress enforcer. Classification drives policy (§7): configuration
/// errors are fatal at startup, tool errors are captured as transcript
/// content, guardrail violations terminate the task, secret decryption
/// failures are distinguished from "not found".
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("skill catalog parse error: {0}")]
    SkillParse(String),

    #[error("skill policy violation: {0}")]
    PolicyViolation(String),

    #[error("skill signature verification failed: {0}")]
    SignatureVerification(String),

    #[error("secret not found: {0}")]
    SecretNotFound(String),

    #[error("secret decryption failed: {0}")]
    SecretDecryption(String),

    #[error("secrets provider error: {0}")]
    SecretProvider(String),

    #[error("egress blocked: {host}")]
    EgressBlocked { host: String },

    #[error("tool '{name}' failed: {message}")]
    ToolError { name: String, message: String },

    #[error("tool '{0}' not found in registry")]
    ToolNotFound(String),

    #[error("provider authentication failed: {0}")]
    Authentication(String),

    #[error("provider request was rejected: {0}")]
    InvalidRequest(String),

    #[error("provider refused the request on content-filter grounds: {0}")]
    ContentFilter(String),

    #[error("provider error (retriable): {0}")]
    Transient(String),

    #[error("all fallback candidates exhausted, last error: {0}")]
    FallbackExhausted(String),

    #[error("guardrail violation: {0}")]
    GuardrailViolation(String),

    #[error("schedule store parse error: {0}")]
    ScheduleParse(String),

    #[error("step limit of {0} exceeded")]
    StepLimitExceeded(usize),

    #[error("operation canceled")]
    Canceled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
