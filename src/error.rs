use std::fmt::Display;

const BODY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChatError {
    #[error("Model settings are incomplete. Set the model name, base URL and API Key first.")]
    ConfigurationMissing,
    #[error("Invalid base URL \"{0}\": it must be an http:// or https:// address.")]
    InvalidEndpoint(String),
    #[error("{}", upstream_message(*status, body))]
    UpstreamError { status: u16, body: String },
    #[error("The server response has no readable body stream.")]
    StreamUnavailable,
    #[error("malformed stream frame: {0}")]
    MalformedFrame(String),
    #[error("{0}")]
    NetworkFailure(String),
    #[error("A request is already in progress.")]
    RequestInFlight,
}

impl ChatError {
    /// Wraps a transport failure, flagging the ones browsers report for blocked cross-origin calls.
    pub fn network(detail: impl Display) -> Self {
        let detail = detail.to_string();
        let lowered = detail.to_lowercase();
        let likely_cors = lowered.contains("failed to fetch")
            || lowered.contains("networkerror")
            || lowered.contains("cors");
        if likely_cors {
            ChatError::NetworkFailure(format!(
                "Network request failed ({detail}). The endpoint may be unreachable or blocking cross-origin (CORS) requests from this page."
            ))
        } else {
            ChatError::NetworkFailure(format!("Network request failed: {detail}"))
        }
    }
}

fn upstream_message(status: u16, body: &str) -> String {
    match status {
        400 => "Bad request (400): check the model name and request parameters.".to_string(),
        401 => "Unauthorized (401): the API Key is invalid or has expired.".to_string(),
        403 => "Forbidden (403): the API Key has no access to this model or endpoint.".to_string(),
        404 => "Not found (404): check the base URL and the model name.".to_string(),
        429 => "Too many requests (429): rate limit or quota exceeded, try again later.".to_string(),
        500..=599 => format!("Server error ({status}): the model service is unavailable, try again later."),
        _ => {
            let mut preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
            if body.chars().count() > BODY_PREVIEW_CHARS {
                preview.push_str("...");
            }
            format!("Request failed ({status}): {preview}")
        }
    }
}
