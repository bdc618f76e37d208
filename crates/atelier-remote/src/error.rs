//! Remote adapter errors.

use atelier_core::{ToolError, ToolId};

/// Failure talking to a remote service.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP client setup failed: {0}")]
    Client(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response missing field '{0}'")]
    MissingField(&'static str),
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

impl RemoteError {
    /// Map onto the tool-call taxonomy for `tool`.
    pub fn into_tool_error(self, tool: ToolId, timeout_ms: u64) -> ToolError {
        match self {
            RemoteError::Http(e) if e.is_timeout() => ToolError::Timeout {
                tool: tool.as_str().to_string(),
                timeout_ms,
            },
            RemoteError::Status { status, body } if (400..500).contains(&status) && status != 429 => {
                ToolError::InvalidInput {
                    tool: tool.as_str().to_string(),
                    reason: format!("HTTP {status}: {body}"),
                }
            }
            other => ToolError::unavailable(tool.as_str(), other.to_string()),
        }
    }
}

/// Turn a non-success response into [`RemoteError::Status`].
pub(crate) async fn check_status(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body: truncate(&body, 300),
    })
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_invalid_input() {
        let err = RemoteError::Status {
            status: 422,
            body: "bad image".to_string(),
        };
        assert!(matches!(
            err.into_tool_error(ToolId::SubmitRenderJob, 30_000),
            ToolError::InvalidInput { .. }
        ));
    }

    #[test]
    fn rate_limits_and_server_errors_are_unavailable() {
        for status in [429, 500, 503] {
            let err = RemoteError::Status {
                status,
                body: String::new(),
            };
            let tool_err = err.into_tool_error(ToolId::SearchCatalog, 30_000);
            assert_eq!(tool_err.tool(), "search_catalog");
            assert!(matches!(tool_err, ToolError::Unavailable { .. }));
        }
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(1_000);
        assert_eq!(truncate(&body, 300).len(), 303);
        assert_eq!(truncate("short", 300), "short");
    }
}
