//! Dataset lookup via the Kaggle API.

use async_trait::async_trait;
use proposalgen_shared::{ResultItem, ToolKind};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::http::{build_client, send_json, trim_base};
use crate::{ToolAdapter, ToolError, ToolQuery};

/// Public page prefix for a dataset ref (`owner/slug`).
const DATASET_PAGE: &str = "https://www.kaggle.com/datasets/";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Dataset {
    #[serde(default)]
    r#ref: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    subtitle: String,
    #[serde(default)]
    url: Option<String>,
}

/// `GET {base}/datasets/list?search=...&pageSize=...` with basic auth.
#[derive(Debug, Clone)]
pub struct KaggleDatasets {
    client: Client,
    base_url: String,
    username: String,
    key: String,
}

impl KaggleDatasets {
    pub fn new(
        base_url: &str,
        username: impl Into<String>,
        key: impl Into<String>,
    ) -> proposalgen_shared::Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: trim_base(base_url),
            username: username.into(),
            key: key.into(),
        })
    }
}

fn dataset_url(dataset: &Dataset) -> Option<String> {
    if let Some(url) = dataset.url.as_ref().filter(|u| u.starts_with("http")) {
        return Some(url.clone());
    }
    (!dataset.r#ref.is_empty()).then(|| format!("{DATASET_PAGE}{}", dataset.r#ref))
}

#[async_trait]
impl ToolAdapter for KaggleDatasets {
    fn kind(&self) -> ToolKind {
        ToolKind::Dataset
    }

    #[instrument(skip_all, fields(query = %query.text))]
    async fn query(&self, query: &ToolQuery) -> Result<Vec<ResultItem>, ToolError> {
        let page_size = query.max_results.to_string();
        let request = self
            .client
            .get(format!("{}/datasets/list", self.base_url))
            .basic_auth(&self.username, Some(&self.key))
            .query(&[("search", query.text.as_str()), ("pageSize", page_size.as_str())])
            .timeout(query.timeout);

        let datasets: Vec<Dataset> = send_json(request).await?;

        let items: Vec<ResultItem> = datasets
            .iter()
            .filter_map(|d| {
                let url = dataset_url(d)?;
                let title = if d.title.is_empty() {
                    d.r#ref.clone()
                } else {
                    d.title.clone()
                };
                Some(ResultItem {
                    title,
                    url,
                    snippet: d.subtitle.clone(),
                })
            })
            .take(query.max_results)
            .collect();

        debug!(results = items.len(), "dataset lookup complete");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn query(text: &str) -> ToolQuery {
        ToolQuery::new(text, 2, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn builds_dataset_urls_from_refs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/datasets/list"))
            .and(query_param("search", "retail demand"))
            .and(query_param("pageSize", "2"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "ref": "acme/store-sales", "title": "Store Sales", "subtitle": "Daily sales" },
                { "ref": "", "title": "Broken entry" },
                { "ref": "other/demand", "title": "", "url": "https://www.kaggle.com/datasets/other/demand" }
            ])))
            .mount(&server)
            .await;

        let datasets = KaggleDatasets::new(&server.uri(), "user", "key").unwrap();
        let items = datasets.query(&query("retail demand")).await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://www.kaggle.com/datasets/acme/store-sales");
        assert_eq!(items[0].snippet, "Daily sales");
        assert_eq!(items[1].title, "other/demand");
    }

    #[tokio::test]
    async fn not_found_is_no_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let datasets = KaggleDatasets::new(&server.uri(), "user", "key").unwrap();
        let err = datasets.query(&query("x")).await.unwrap_err();
        assert_eq!(err, ToolError::NoResults);
    }

    #[tokio::test]
    async fn server_errors_are_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let datasets = KaggleDatasets::new(&server.uri(), "user", "key").unwrap();
        let err = datasets.query(&query("x")).await.unwrap_err();
        assert!(matches!(err, ToolError::Unreachable(_)));
    }
}
