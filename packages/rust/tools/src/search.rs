//! Web search via the Serper API.

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
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    link: Option<String>,
    #[serde(default)]
    snippet: String,
}

/// `POST {base}/search` with `X-API-KEY`.
#[derive(Debug, Clone)]
pub struct SerperSearch {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SerperSearch {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> proposalgen_shared::Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: trim_base(base_url),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl ToolAdapter for SerperSearch {
    fn kind(&self) -> ToolKind {
        ToolKind::Search
    }

    #[instrument(skip_all, fields(query = %query.text))]
    async fn query(&self, query: &ToolQuery) -> Result<Vec<ResultItem>, ToolError> {
        let request = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("X-API-KEY", &self.api_key)
            .timeout(query.timeout)
            .json(&serde_json::json!({ "q": query.text, "num": query.max_results }));

        let response: SearchResponse = send_json(request).await?;

        let items: Vec<ResultItem> = response
            .organic
            .into_iter()
            .filter_map(|r| {
                let url = r.link.filter(|l| !l.is_empty())?;
                Some(ResultItem {
                    title: r.title,
                    url,
                    snippet: r.snippet,
                })
            })
            .take(query.max_results)
            .collect();

        debug!(results = items.len(), "search complete");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn query(text: &str) -> ToolQuery {
        ToolQuery::new(text, 3, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn parses_organic_results_in_rank_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("x-api-key", "serper-key"))
            .and(body_partial_json(serde_json::json!({ "q": "AI in retail", "num": 3 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "organic": [
                    { "title": "AI retail report", "link": "https://www.mckinsey.com/retail-ai", "snippet": "..." },
                    { "title": "No link here" },
                    { "title": "Gartner note", "link": "https://www.gartner.com/en/ai" }
                ]
            })))
            .mount(&server)
            .await;

        let search = SerperSearch::new(&server.uri(), "serper-key").unwrap();
        let items = search.query(&query("AI in retail")).await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://www.mckinsey.com/retail-ai");
        assert_eq!(items[1].title, "Gartner note");
        assert!(items[1].snippet.is_empty());
    }

    #[tokio::test]
    async fn quota_errors_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let search = SerperSearch::new(&server.uri(), "k").unwrap();
        let err = search.query(&query("x")).await.unwrap_err();
        assert!(matches!(err, ToolError::QuotaExceeded(_)));
    }

    #[tokio::test]
    async fn empty_answer_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let search = SerperSearch::new(&server.uri(), "k").unwrap();
        let items = search.query(&query("x")).await.unwrap();
        assert!(items.is_empty());
    }
}
