//! # parley-providers
//!
//! HTTP clients for the LLM backends that draft replies.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use parley_core::error::ParleyError;
use reqwest::StatusCode;
use std::time::Duration;

/// Build the HTTP client shared by every call of one provider.
pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client, ParleyError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ParleyError::Config(format!("failed to build HTTP client: {e}")))
}

/// Map a transport failure. Timeouts and refused connections are transient.
pub(crate) fn request_error(provider: &str, e: reqwest::Error) -> ParleyError {
    if e.is_timeout() || e.is_connect() {
        ParleyError::Timeout(format!("{provider} request failed: {e}"))
    } else {
        ParleyError::Provider(format!("{provider} request failed: {e}"))
    }
}

/// Map a non-success HTTP status. 5xx is transient, everything else is not.
pub(crate) fn status_error(provider: &str, status: StatusCode, body: &str) -> ParleyError {
    let body = truncate_body(body);
    if status.is_server_error() {
        ParleyError::Unavailable(format!("{provider} returned {status}: {body}"))
    } else {
        ParleyError::Provider(format!("{provider} returned {status}: {body}"))
    }
}

/// Reject a missing or blank completion.
pub(crate) fn require_text(provider: &str, text: Option<String>) -> Result<String, ParleyError> {
    match text {
        Some(t) if !t.trim().is_empty() => Ok(t),
        _ => Err(ParleyError::Provider(format!("{provider} returned no text"))),
    }
}

fn truncate_body(body: &str) -> &str {
    match body.char_indices().nth(300) {
        Some((i, _)) => &body[..i],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_transient() {
        let err = status_error("openai", StatusCode::SERVICE_UNAVAILABLE, "overloaded");
        assert!(err.is_transient());
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_client_errors_are_not_transient() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::BAD_REQUEST] {
            let err = status_error("gemini", status, "nope");
            assert!(matches!(err, ParleyError::Provider(_)));
        }
    }

    #[test]
    fn test_require_text_rejects_blank() {
        assert!(require_text("x", None).is_err());
        assert!(require_text("x", Some("  \n".into())).is_err());
        assert_eq!(require_text("x", Some("hi".into())).unwrap(), "hi");
    }

    #[test]
    fn test_error_body_is_bounded() {
        let long = "e".repeat(5000);
        let err = status_error("anthropic", StatusCode::BAD_REQUEST, &long);
        assert!(err.to_string().len() < 400);
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_timeout() {
        let client = build_client(2).unwrap();
        let err = client
            .get("http://127.0.0.1:1/unreachable")
            .send()
            .await
            .unwrap_err();
        assert!(request_error("openai", err).is_transient());
    }
}
