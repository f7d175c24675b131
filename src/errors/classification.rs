use super::types::GateError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl GateError {
    /// Classify this error to determine its type and whether another engine
    /// attempt could succeed. Transient infrastructure failures are
    /// retryable; bad input, auth failures and parse failures are not.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Retryable: the engine or its backing services may recover
            GateError::Network(_) => ErrorClassification {
                error_type: "NetworkError",
                retryable: true,
            },
            GateError::Timeout(_) => ErrorClassification {
                error_type: "TimeoutError",
                retryable: true,
            },
            GateError::RateLimit(_) => ErrorClassification {
                error_type: "RateLimitError",
                retryable: true,
            },
            GateError::EngineUnavailable(_) => ErrorClassification {
                error_type: "EngineUnavailableError",
                retryable: true,
            },

            // Non-retryable: retrying will not fix the input or the parse
            GateError::InvalidImage(_) => ErrorClassification {
                error_type: "InvalidImageError",
                retryable: false,
            },
            GateError::EngineAuth(_) => ErrorClassification {
                error_type: "AuthenticationError",
                retryable: false,
            },
            GateError::EngineOutput(_) => ErrorClassification {
                error_type: "EngineOutputError",
                retryable: false,
            },
            GateError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                retryable: false,
            },
            GateError::PolicyLoad(_) => ErrorClassification {
                error_type: "PolicyLoadError",
                retryable: false,
            },
            GateError::RetryExhausted { .. } => ErrorClassification {
                error_type: "RetryExhaustedError",
                retryable: false,
            },
            GateError::SchedulePersistence(_) => ErrorClassification {
                error_type: "SchedulePersistenceError",
                retryable: false,
            },
            GateError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                retryable: false,
            },
            GateError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                retryable: false,
            },

            GateError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: true,
            },
            GateError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: false,
            },
        }
    }

    /// Convenience for the scan executor: can another attempt help?
    pub fn is_transient(&self) -> bool {
        self.classify().retryable
    }
}
