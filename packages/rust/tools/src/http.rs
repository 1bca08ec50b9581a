//! HTTP plumbing shared by the adapters.

use proposalgen_shared::{ProposalError, Result};
use reqwest::{Client, StatusCode};

use crate::ToolError;

/// User-Agent string for tool requests. GitHub rejects requests without one.
const USER_AGENT: &str = concat!("Proposalgen/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 3;

pub(crate) fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .map_err(|e| ProposalError::Network(format!("failed to build HTTP client: {e}")))
}

/// Map a non-2xx status onto the tool error set.
pub(crate) fn classify_status(status: StatusCode) -> ToolError {
    match status {
        StatusCode::NOT_FOUND => ToolError::NoResults,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::FORBIDDEN => {
            ToolError::QuotaExceeded(format!("HTTP {status}"))
        }
        _ => ToolError::Unreachable(format!("HTTP {status}")),
    }
}

pub(crate) fn classify_transport_error(e: reqwest::Error) -> ToolError {
    ToolError::Unreachable(e.to_string())
}

/// Send a request and decode a JSON body, classifying every failure.
pub(crate) async fn send_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> std::result::Result<T, ToolError> {
    let response = request.send().await.map_err(classify_transport_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(classify_status(status));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| ToolError::Unreachable(format!("malformed response body: {e}")))
}

pub(crate) fn trim_base(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(classify_status(StatusCode::NOT_FOUND), ToolError::NoResults);
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            ToolError::QuotaExceeded(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN),
            ToolError::QuotaExceeded(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY),
            ToolError::Unreachable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED),
            ToolError::Unreachable(_)
        ));
    }

    #[test]
    fn base_url_trailing_slash_dropped() {
        assert_eq!(trim_base("https://api.github.com/"), "https://api.github.com");
    }
}
