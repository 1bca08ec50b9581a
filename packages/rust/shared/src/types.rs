//! Core domain types shared by every Proposalgen crate.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Current schema version for persisted Run snapshots.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// StageName
// ---------------------------------------------------------------------------

/// One of the four sequential stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageName {
    Research,
    UseCase,
    Resource,
    Proposal,
}

impl StageName {
    /// All stages in the fixed execution order.
    pub const ALL: [StageName; 4] = [
        StageName::Research,
        StageName::UseCase,
        StageName::Resource,
        StageName::Proposal,
    ];

    /// Stable identifier used as the persistence key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "Research",
            Self::UseCase => "UseCase",
            Self::Resource => "Resource",
            Self::Proposal => "Proposal",
        }
    }

    /// Zero-based position in the stage sequence.
    pub fn index(&self) -> usize {
        match self {
            Self::Research => 0,
            Self::UseCase => 1,
            Self::Resource => 2,
            Self::Proposal => 3,
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StageName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        StageName::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown stage '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Tools and citations
// ---------------------------------------------------------------------------

/// The three external retrieval capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Search,
    Dataset,
    Repo,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Dataset => "dataset",
            Self::Repo => "repo",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much a cited source can be trusted. Ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    /// Not a resolvable web URL.
    Unverified,
    /// A resolvable URL on an arbitrary host.
    Secondary,
    /// Known research firm, publisher, government or academic host.
    Primary,
}

impl TrustTier {
    /// Classify a URL against the configured authoritative domains.
    ///
    /// A host matches a domain when it equals it or is a subdomain of it.
    pub fn classify(url: &str, authoritative_domains: &[String]) -> Self {
        let Ok(parsed) = Url::parse(url) else {
            return Self::Unverified;
        };
        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            return Self::Unverified;
        }
        let Some(host) = parsed.host_str() else {
            return Self::Unverified;
        };
        let host = host.trim_start_matches("www.").to_ascii_lowercase();

        let listed = authoritative_domains.iter().any(|domain| {
            let domain = domain.to_ascii_lowercase();
            host == domain || host.ends_with(&format!(".{domain}"))
        });

        if listed || host.ends_with(".gov") || host.ends_with(".edu") {
            Self::Primary
        } else {
            Self::Secondary
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::Secondary => "secondary",
            Self::Primary => "primary",
        }
    }
}

/// A cited source attached to a stage result and the final document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Source URL; the deduplication key.
    pub url: String,
    /// Human-readable title.
    pub title: String,
    /// Trust tier assigned when the citation was gathered.
    pub tier: TrustTier,
}

/// One ranked item returned by a tool adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultItem {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub snippet: String,
}

/// Audit record of one tool adapter call (after its own retries).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Which adapter was called.
    pub tool: ToolKind,
    /// The query sent.
    pub query: String,
    /// Items returned, in adapter rank order.
    pub items: Vec<ResultItem>,
    /// Wall-clock latency including retries.
    pub latency_ms: u64,
    /// Whether the call produced a usable answer (an empty answer counts).
    pub success: bool,
    /// Whether the call was given up after exhausting its retries.
    pub degraded: bool,
    /// Number of tries made.
    pub tries: u32,
    /// Last error seen, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Check that a URL parses and has a non-empty scheme and a host.
pub fn is_resolvable_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| !u.scheme().is_empty() && u.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Use case categories
// ---------------------------------------------------------------------------

/// The five fixed use case categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UseCaseCategory {
    #[serde(rename = "Generative AI & LLMs")]
    GenerativeAi,
    #[serde(rename = "Computer Vision")]
    ComputerVision,
    #[serde(rename = "Predictive Analytics & ML")]
    PredictiveAnalytics,
    #[serde(rename = "Natural Language Processing")]
    NaturalLanguage,
    #[serde(rename = "Automation & Optimization")]
    Automation,
}

impl UseCaseCategory {
    /// All categories in report order.
    pub const ALL: [UseCaseCategory; 5] = [
        UseCaseCategory::GenerativeAi,
        UseCaseCategory::ComputerVision,
        UseCaseCategory::PredictiveAnalytics,
        UseCaseCategory::NaturalLanguage,
        UseCaseCategory::Automation,
    ];

    /// The fixed display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::GenerativeAi => "Generative AI & LLMs",
            Self::ComputerVision => "Computer Vision",
            Self::PredictiveAnalytics => "Predictive Analytics & ML",
            Self::NaturalLanguage => "Natural Language Processing",
            Self::Automation => "Automation & Optimization",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::GenerativeAi => &[
                "generative ai",
                "llm",
                "large language model",
                "gpt",
                "chatbot",
                "content generation",
                "text generation",
                "conversational ai",
                "language model",
                "prompt engineering",
            ],
            Self::ComputerVision => &[
                "computer vision",
                "image recognition",
                "object detection",
                "facial recognition",
                "image analysis",
                "visual inspection",
                "ocr",
                "video analysis",
                "image classification",
            ],
            Self::PredictiveAnalytics => &[
                "predictive analytics",
                "machine learning",
                "forecasting",
                "prediction",
                "regression",
                "clustering",
                "anomaly detection",
                "time series",
                "predictive modeling",
            ],
            Self::NaturalLanguage => &[
                "natural language processing",
                "nlp",
                "sentiment analysis",
                "text mining",
                "text analysis",
                "text classification",
                "named entity recognition",
                "document processing",
            ],
            Self::Automation => &[
                "automation",
                "optimization",
                "workflow",
                "robotic process",
                "rpa",
                "operational efficiency",
                "scheduling",
                "business process",
            ],
        }
    }

    /// Resolve an exact label (case-insensitive, `and` accepted for `&`).
    pub fn from_label(label: &str) -> Option<Self> {
        let norm = normalize_label(label);
        Self::ALL
            .into_iter()
            .find(|c| normalize_label(c.label()) == norm)
    }

    /// Pick the category whose keywords best match `text`.
    ///
    /// Ties go to the earlier category; no match at all falls back to
    /// [`UseCaseCategory::Automation`].
    pub fn classify(text: &str) -> Self {
        let text = text.to_lowercase();
        let mut best = (0usize, Self::Automation);
        for category in Self::ALL {
            let hits = category
                .keywords()
                .iter()
                .filter(|k| text.contains(*k))
                .count();
            if hits > best.0 {
                best = (hits, category);
            }
        }
        best.1
    }
}

impl fmt::Display for UseCaseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn normalize_label(label: &str) -> String {
    label
        .to_lowercase()
        .replace(" and ", " & ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains() -> Vec<String> {
        vec!["mckinsey.com".into(), "deloitte.com".into()]
    }

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let parsed: RunId = id.to_string().parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn stage_order_is_fixed() {
        let names: Vec<&str> = StageName::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, ["Research", "UseCase", "Resource", "Proposal"]);
        assert!(StageName::Research < StageName::Proposal);
        assert_eq!("usecase".parse::<StageName>(), Ok(StageName::UseCase));
    }

    #[test]
    fn trust_tier_classification() {
        let d = domains();
        assert_eq!(
            TrustTier::classify("https://www.mckinsey.com/ai-report", &d),
            TrustTier::Primary
        );
        assert_eq!(
            TrustTier::classify("https://insights.deloitte.com/x", &d),
            TrustTier::Primary
        );
        assert_eq!(
            TrustTier::classify("https://data.census.gov/table", &d),
            TrustTier::Primary
        );
        assert_eq!(
            TrustTier::classify("https://someblog.io/post", &d),
            TrustTier::Secondary
        );
        assert_eq!(TrustTier::classify("not a url", &d), TrustTier::Unverified);
        assert_eq!(
            TrustTier::classify("ftp://files.example.com/a", &d),
            TrustTier::Unverified
        );
        // suffix match must be on a label boundary
        assert_eq!(
            TrustTier::classify("https://notmckinsey.com/", &d),
            TrustTier::Secondary
        );
    }

    #[test]
    fn resolvable_urls() {
        assert!(is_resolvable_url("https://github.com/org/repo"));
        assert!(!is_resolvable_url(""));
        assert!(!is_resolvable_url("github.com/org/repo"));
        assert!(!is_resolvable_url("mailto:someone@example.com"));
    }

    #[test]
    fn category_labels_resolve() {
        assert_eq!(
            UseCaseCategory::from_label("computer vision"),
            Some(UseCaseCategory::ComputerVision)
        );
        assert_eq!(
            UseCaseCategory::from_label("Automation and Optimization"),
            Some(UseCaseCategory::Automation)
        );
        assert_eq!(UseCaseCategory::from_label("Robotics"), None);
    }

    #[test]
    fn category_keyword_classification() {
        assert_eq!(
            UseCaseCategory::classify("Customer support chatbot built on an LLM"),
            UseCaseCategory::GenerativeAi
        );
        assert_eq!(
            UseCaseCategory::classify("Visual inspection of welds with object detection"),
            UseCaseCategory::ComputerVision
        );
        assert_eq!(
            UseCaseCategory::classify("Sentiment analysis on support tickets"),
            UseCaseCategory::NaturalLanguage
        );
        assert_eq!(
            UseCaseCategory::classify("Something entirely unrelated"),
            UseCaseCategory::Automation
        );
    }

    #[test]
    fn category_serializes_as_label() {
        let json = serde_json::to_string(&UseCaseCategory::PredictiveAnalytics).unwrap();
        assert_eq!(json, r#""Predictive Analytics & ML""#);
    }
}
