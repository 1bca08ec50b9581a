//! Decoding model replies into per-stage reply shapes.
//!
//! Models are asked for JSON, but answers often arrive wrapped in a Markdown
//! fence or surrounded by prose. Anything that cannot be decoded into the
//! expected shape is an [`ModelError::InvalidResponse`].

use std::sync::LazyLock;

use proposalgen_model::ModelError;
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*\n(.*?)\n?\s*```").expect("valid fence regex")
});

// ---------------------------------------------------------------------------
// Reply shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceReply {
    #[serde(default)]
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResearchReply {
    pub summary: String,
    #[serde(default)]
    pub sources: Vec<SourceReply>,
    #[serde(default)]
    pub queries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UseCaseItemReply {
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub roi: String,
    #[serde(default)]
    pub complexity: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UseCaseReply {
    pub use_cases: Vec<UseCaseItemReply>,
    #[serde(default)]
    pub queries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResourceRequestReply {
    pub use_case: String,
    #[serde(default)]
    pub dataset_query: Option<String>,
    #[serde(default)]
    pub repo_query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResourceReply {
    #[serde(default)]
    pub requests: Vec<ResourceRequestReply>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SectionReply {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProposalReply {
    pub sections: Vec<SectionReply>,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Pull the JSON object out of a model reply.
pub fn json_payload(text: &str) -> Option<&str> {
    if let Some(caps) = FENCE_RE.captures(text) {
        if let Some(body) = caps.get(1) {
            let body = body.as_str().trim();
            if body.starts_with('{') {
                return Some(body);
            }
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Decode a reply into `T`.
pub fn parse_reply<T: DeserializeOwned>(text: &str) -> Result<T, ModelError> {
    let payload = json_payload(text)
        .ok_or_else(|| ModelError::InvalidResponse("reply contained no JSON object".into()))?;
    serde_json::from_str(payload)
        .map_err(|e| ModelError::InvalidResponse(format!("reply did not match the expected shape: {e}")))
}
