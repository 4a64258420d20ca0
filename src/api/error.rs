//! Error types for the rewards API gateway.
//!
//! [`GatewayError`] separates transport failures (retryable timeouts versus
//! everything else) from protocol failures (undecodable bodies, HTTP error
//! statuses, responses missing expected fields). Workers match on
//! [`GatewayError::is_unauthorized`] to decide when to re-authenticate.

use thiserror::Error;

/// Errors that can occur while talking to the rewards API.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Every attempt hit the transport timeout.
    #[error("request timed out after {attempts} attempts")]
    Timeout { attempts: u32 },

    /// Non-retryable transport failure (DNS, connection refused, TLS, body read).
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The response body was not a JSON object. Checked before the status code.
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    /// The API answered with a status >= 400.
    #[error("API returned status {status}")]
    Api { status: u16 },

    /// The body decoded but lacked a field the caller needs.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("failed to encode request payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("invalid proxy url [{url}]: {source}")]
    InvalidProxy {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A configured or caller-supplied value cannot be sent as a header.
    #[error("invalid {name} header value: {source}")]
    InvalidHeader {
        name: &'static str,
        #[source]
        source: reqwest::header::InvalidHeaderValue,
    },

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl GatewayError {
    /// The HTTP status carried by an [`GatewayError::Api`] error.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Api { status } => Some(*status),
            _ => None,
        }
    }

    /// True when the server rejected the bearer token.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_and_status() {
        let err = GatewayError::Api { status: 503 };
        assert_eq!(err.to_string(), "API returned status 503");
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn unauthorized_is_only_401() {
        assert!(GatewayError::Api { status: 401 }.is_unauthorized());
        assert!(!GatewayError::Api { status: 403 }.is_unauthorized());
        assert!(!GatewayError::Timeout { attempts: 3 }.is_unauthorized());
        assert!(!GatewayError::UnexpectedResponse("x".into()).is_unauthorized());
    }

    #[test]
    fn timeout_display() {
        let err = GatewayError::Timeout { attempts: 3 };
        assert_eq!(err.to_string(), "request timed out after 3 attempts");
    }

    #[test]
    fn decode_error_display() {
        let source = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = GatewayError::Decode(source);
        assert!(err.to_string().starts_with("failed to decode response body"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GatewayError>();
    }
}
