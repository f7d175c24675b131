use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid image reference: {0}")]
    InvalidImage(String),

    #[error("Registry authentication failed: {0}")]
    EngineAuth(String),

    #[error("Malformed engine output: {0}")]
    EngineOutput(String),

    #[error("Scan engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Rate limited: {0}")]
    RateLimit(String),

    #[error("Scan failed after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<GateError>,
    },

    #[error("Policy load error: {0}")]
    PolicyLoad(String),

    #[error("Schedule persistence error: {0}")]
    SchedulePersistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
