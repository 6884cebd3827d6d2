//! Deterministic classification of remote-call outcomes.
//!
//! Maps a transport failure or a raw HTTP exchange to a [`Classification`],
//! and each classification to the [`RetryAction`] the engine must take.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::types::{GenerateResponse, RawResponse};

/// Minimum spacing between successive remote calls.
pub const RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(2);
/// Pause after a transport failure before the next attempt.
pub const TRANSPORT_DELAY: Duration = Duration::from_secs(10);
/// Pause after a 5xx before re-issuing the same image.
pub const SERVER_DELAY: Duration = Duration::from_secs(5);
/// Pause after any other non-2xx status before the next attempt.
pub const UNEXPECTED_DELAY: Duration = Duration::from_secs(10);
/// Attempts per image before moving on.
pub const MAX_ATTEMPTS: u32 = 3;
/// Cumulative failed attempts that end the run.
pub const BREAKER_THRESHOLD: u32 = 3;

/// Interpreted outcome of one remote call.
#[derive(Debug, Clone)]
pub enum Classification {
    Success(GenerateResponse),
    /// No response: connect, timeout, or body read failure.
    Transport(String),
    /// 401: the credential was rejected.
    Unauthorized(Vec<String>),
    /// 429.
    RateLimited(Vec<String>),
    /// 5xx.
    ServerError { status: u16, messages: Vec<String> },
    /// Any other non-2xx status.
    Unexpected { status: u16, messages: Vec<String> },
    /// 2xx whose body is not a valid generation response.
    Malformed(String),
}

/// What the engine does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Hand the payload to validation and persistence.
    Proceed,
    /// Spend another attempt on this image after `delay`.
    NextAttempt { delay: Duration, counts_failure: bool },
    /// Leave the attempt loop and re-issue the same image after `delay`.
    RetrySameIndex { delay: Duration, counts_failure: bool },
    /// Stop the run.
    Abort,
}

impl Classification {
    pub fn action(&self) -> RetryAction {
        match self {
            Classification::Success(_) => RetryAction::Proceed,
            Classification::Transport(_) => RetryAction::NextAttempt {
                delay: TRANSPORT_DELAY,
                counts_failure: true,
            },
            Classification::Unauthorized(_) => RetryAction::Abort,
            Classification::RateLimited(_) => RetryAction::RetrySameIndex {
                delay: RATE_LIMIT_INTERVAL * 2,
                counts_failure: true,
            },
            Classification::ServerError { .. } => RetryAction::RetrySameIndex {
                delay: SERVER_DELAY,
                counts_failure: true,
            },
            Classification::Unexpected { .. } => RetryAction::NextAttempt {
                delay: UNEXPECTED_DELAY,
                counts_failure: true,
            },
            Classification::Malformed(_) => RetryAction::NextAttempt {
                delay: Duration::ZERO,
                counts_failure: false,
            },
        }
    }

    /// Human-readable lines for the progress view and run log.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Classification::Success(_) => Vec::new(),
            Classification::Transport(err) => vec![format!("HTTP request failed: {err}")],
            Classification::Unauthorized(messages) => with_trailer(
                messages,
                "Authentication failed - check your API key",
            ),
            Classification::RateLimited(messages) => with_trailer(
                messages,
                "Rate limit exceeded - waiting longer before retry",
            ),
            Classification::ServerError { messages, .. } => {
                with_trailer(messages, "Server error - will retry")
            }
            Classification::Unexpected { messages, .. } => {
                with_trailer(messages, "Unexpected error occurred")
            }
            Classification::Malformed(err) => vec![format!("Error parsing API response: {err}")],
        }
    }
}

fn with_trailer(messages: &[String], trailer: &str) -> Vec<String> {
    let mut out = messages.to_vec();
    out.push(trailer.to_string());
    out
}

/// Classify a completed HTTP exchange.
pub fn classify_response(raw: &RawResponse) -> Classification {
    if (200..300).contains(&raw.status) {
        return match serde_json::from_slice::<GenerateResponse>(&raw.body) {
            Ok(parsed) if parsed.images.is_empty() => {
                Classification::Malformed("response carried no images".to_string())
            }
            Ok(parsed) => Classification::Success(parsed),
            Err(err) => Classification::Malformed(err.to_string()),
        };
    }

    let messages = describe_api_error(raw.status, &raw.body);
    match raw.status {
        401 => Classification::Unauthorized(messages),
        429 => Classification::RateLimited(messages),
        500..=599 => Classification::ServerError {
            status: raw.status,
            messages,
        },
        status => Classification::Unexpected { status, messages },
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
    details: Option<Value>,
}

/// Surface `error`, `message`, and `details` independently; fall back to the
/// verbatim body with the status code when none can be read.
pub fn describe_api_error(status: u16, body: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    if let Ok(parsed) = serde_json::from_slice::<ApiErrorBody>(body) {
        if let Some(error) = parsed.error.filter(|text| !text.is_empty()) {
            out.push(format!("API Error: {error}"));
        }
        if let Some(message) = parsed.message.filter(|text| !text.is_empty()) {
            out.push(format!("API Message: {message}"));
        }
        if let Some(details) = parsed.details.filter(|value| !value.is_null()) {
            out.push(format!("API Details: {details}"));
        }
    }
    if out.is_empty() {
        out.push(format!(
            "API Error (Status {status}): {}",
            String::from_utf8_lossy(body)
        ));
    }
    out
}

/// Health probe: any 5xx means the service is down.
pub fn probe_is_healthy(raw: &RawResponse) -> bool {
    raw.status < 500
}
