use super::types::ReverieError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl ReverieError {
    /// Classify this error to determine its type and whether an oracle call
    /// that produced it may be retried.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Retryable errors
            ReverieError::RateLimit { .. } => ErrorClassification {
                error_type: "RateLimitError",
                retryable: true,
            },
            ReverieError::Network(_) => ErrorClassification {
                error_type: "NetworkError",
                retryable: true,
            },
            ReverieError::Timeout(_) => ErrorClassification {
                error_type: "TimeoutError",
                retryable: true,
            },
            ReverieError::OutputValidation(_) => ErrorClassification {
                error_type: "OutputValidationError",
                retryable: true,
            },
            ReverieError::LLMApi(_) => ErrorClassification {
                error_type: "LLMApiError",
                retryable: true,
            },
            ReverieError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                retryable: true,
            },
            ReverieError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: true,
            },
            ReverieError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: true,
            },

            // Non-retryable errors
            ReverieError::Authentication(_) => ErrorClassification {
                error_type: "AuthenticationError",
                retryable: false,
            },
            ReverieError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                retryable: false,
            },
            ReverieError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                retryable: false,
            },
            ReverieError::OracleExhausted { .. } => ErrorClassification {
                error_type: "OracleExhaustedError",
                retryable: false,
            },
            ReverieError::InvalidTarget(_) => ErrorClassification {
                error_type: "InvalidTargetError",
                retryable: false,
            },
            ReverieError::PayloadTooLarge { .. } => ErrorClassification {
                error_type: "PayloadTooLargeError",
                retryable: false,
            },
            ReverieError::SpawnFailure(_) => ErrorClassification {
                error_type: "SpawnFailureError",
                retryable: false,
            },
            ReverieError::UnsupportedTool(_) => ErrorClassification {
                error_type: "UnsupportedToolError",
                retryable: false,
            },
            ReverieError::Prompt(_) => ErrorClassification {
                error_type: "PromptError",
                retryable: false,
            },
            ReverieError::Planning(_) => ErrorClassification {
                error_type: "PlanningError",
                retryable: false,
            },
        }
    }
}
