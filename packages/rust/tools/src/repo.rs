//! Repository lookup via the GitHub search API.

use async_trait::async_trait;
use proposalgen_shared::{ResultItem, ToolKind};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::http::{build_client, send_json, trim_base};
use crate::{ToolAdapter, ToolError, ToolQuery};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Repository>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    full_name: String,
    html_url: String,
    #[serde(default)]
    description: Option<String>,
}

/// `GET {base}/search/repositories`, most-starred first.
#[derive(Debug, Clone)]
pub struct GithubRepos {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GithubRepos {
    pub fn new(base_url: &str, token: Option<String>) -> proposalgen_shared::Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: trim_base(base_url),
            token,
        })
    }
}

#[async_trait]
impl ToolAdapter for GithubRepos {
    fn kind(&self) -> ToolKind {
        ToolKind::Repo
    }

    #[instrument(skip_all, fields(query = %query.text))]
    async fn query(&self, query: &ToolQuery) -> Result<Vec<ResultItem>, ToolError> {
        let per_page = query.max_results.to_string();
        let mut request = self
            .client
            .get(format!("{}/search/repositories", self.base_url))
            .header("Accept", "application/vnd.github+json")
            .query(&[
                ("q", query.text.as_str()),
                ("sort", "stars"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
            ])
            .timeout(query.timeout);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response: SearchResponse = send_json(request).await?;

        let items: Vec<ResultItem> = response
            .items
            .into_iter()
            .map(|repo| ResultItem {
                title: repo.full_name,
                url: repo.html_url,
                snippet: repo.description.unwrap_or_default(),
            })
            .take(query.max_results)
            .collect();

        debug!(results = items.len(), "repo lookup complete");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn query(text: &str) -> ToolQuery {
        ToolQuery::new(text, 5, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn maps_repositories_to_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .and(query_param("q", "defect detection"))
            .and(query_param("sort", "stars"))
            .and(header("authorization", "Bearer gh-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_count": 1,
                "items": [{
                    "full_name": "org/defect-detector",
                    "html_url": "https://github.com/org/defect-detector",
                    "description": null
                }]
            })))
            .mount(&server)
            .await;

        let repos = GithubRepos::new(&server.uri(), Some("gh-token".into())).unwrap();
        let items = repos.query(&query("defect detection")).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "org/defect-detector");
        assert_eq!(items[0].url, "https://github.com/org/defect-detector");
    }

    #[tokio::test]
    async fn rate_limit_403_is_quota() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let repos = GithubRepos::new(&server.uri(), None).unwrap();
        let err = repos.query(&query("x")).await.unwrap_err();
        assert!(matches!(err, ToolError::QuotaExceeded(_)));
    }
}
