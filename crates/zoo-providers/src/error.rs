use http::StatusCode;
use thiserror::Error;
use zoo_core::ProviderKind;

pub type Result<T> = std::result::Result<T, GenerationError>;

/// Failure of a single generation task
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Required credential or callback address missing
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No adapter registered for the model's provider
    #[error("Provider '{0}' is not configured")]
    ProviderNotConfigured(ProviderKind),

    /// Provider answered with a non-success status
    #[error("Provider API error ({status}): {detail}")]
    Provider { status: u16, detail: String },

    /// Provider response lacked an expected field
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Network or connection failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// The owning submission was cancelled
    #[error("Generation cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Protocol violations count as provider failures
    pub const fn is_provider_error(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::Protocol(_) | Self::Connection(_))
    }

    /// HTTP status an API handler should answer with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Provider { status, .. } => match *status {
                400 => StatusCode::BAD_REQUEST,
                422 => StatusCode::UNPROCESSABLE_ENTITY,
                429 => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::ProviderNotConfigured(_) => StatusCode::BAD_REQUEST,
            Self::Protocol(_) | Self::Connection(_) => StatusCode::BAD_GATEWAY,
            Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error type
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::ProviderNotConfigured(_) => "invalid_request_error",
            Self::Provider { .. } | Self::Connection(_) => "provider_error",
            Self::Protocol(_) => "protocol_error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Message shown to users
    ///
    /// Provider details are passed through verbatim.
    pub fn client_message(&self) -> String {
        match self {
            Self::Provider { detail, .. } => detail.clone(),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_detail_is_passed_through() {
        let err = GenerationError::Provider {
            status: 422,
            detail: "Invalid version or not permitted".to_owned(),
        };
        assert_eq!(err.client_message(), "Invalid version or not permitted");
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.is_provider_error());
    }

    #[test]
    fn protocol_errors_are_provider_errors() {
        assert!(GenerationError::Protocol("no artifact".to_owned()).is_provider_error());
        assert!(!GenerationError::Cancelled.is_provider_error());
        assert!(!GenerationError::Configuration("x".to_owned()).is_provider_error());
    }
}
