//! Stage payloads and the final proposal document.

use serde::{Deserialize, Serialize};

use crate::types::{Citation, StageName, UseCaseCategory};

// ---------------------------------------------------------------------------
// Stage payloads
// ---------------------------------------------------------------------------

/// Validated output of the Research stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchOutput {
    /// Industry and company findings.
    pub summary: String,
    /// Follow-up search queries the model asked for.
    #[serde(default)]
    pub queries: Vec<String>,
}

/// One proposed AI use case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseCase {
    pub title: String,
    pub category: UseCaseCategory,
    pub description: String,
    /// Free-form ROI estimate.
    #[serde(default)]
    pub roi: String,
    /// Implementation complexity (low / medium / high).
    #[serde(default)]
    pub complexity: String,
}

/// Validated output of the UseCase stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseCaseOutput {
    pub use_cases: Vec<UseCase>,
}

impl UseCaseOutput {
    /// Number of use cases in a category.
    pub fn count_in(&self, category: UseCaseCategory) -> usize {
        self.use_cases
            .iter()
            .filter(|u| u.category == category)
            .count()
    }
}

/// Resource links resolved for one use case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// Title of the use case this entry belongs to.
    pub use_case: String,
    /// Dataset and repository links, in lookup order.
    pub links: Vec<Citation>,
    /// No link resolved; shown as "resource pending".
    pub pending: bool,
}

/// Validated output of the Resource stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceOutput {
    pub entries: Vec<ResourceEntry>,
}

impl ResourceOutput {
    /// Titles of use cases still waiting on a resource.
    pub fn pending(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.pending)
            .map(|e| e.use_case.clone())
            .collect()
    }
}

/// The eight fixed proposal sections, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SectionKind {
    ExecutiveSummary,
    BusinessCase,
    AiUseCases,
    ImplementationRoadmap,
    BudgetAndRoi,
    ResourceAssets,
    RiskManagement,
    NextSteps,
}

impl SectionKind {
    pub const ALL: [SectionKind; 8] = [
        SectionKind::ExecutiveSummary,
        SectionKind::BusinessCase,
        SectionKind::AiUseCases,
        SectionKind::ImplementationRoadmap,
        SectionKind::BudgetAndRoi,
        SectionKind::ResourceAssets,
        SectionKind::RiskManagement,
        SectionKind::NextSteps,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Self::ExecutiveSummary => "Executive Summary",
            Self::BusinessCase => "Business Case",
            Self::AiUseCases => "AI Use Cases",
            Self::ImplementationRoadmap => "Implementation Roadmap",
            Self::BudgetAndRoi => "Budget and ROI",
            Self::ResourceAssets => "Resource Assets & Implementation Support",
            Self::RiskManagement => "Risk Management",
            Self::NextSteps => "Next Steps",
        }
    }

    /// Match a model-produced heading onto a fixed section.
    ///
    /// Leading numbering, case, punctuation and `&`/`and` are ignored.
    pub fn from_title(title: &str) -> Option<Self> {
        let wanted = normalize_title(title);
        if wanted.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|kind| normalize_title(kind.title()) == wanted)
            .or_else(|| {
                // "Resource Assets" alone is a common abbreviation.
                Self::ALL.into_iter().find(|kind| {
                    let full = normalize_title(kind.title());
                    full.starts_with(&wanted) && wanted.split(' ').count() >= 2
                })
            })
    }
}

fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase().replace('&', " and ");
    let words: Vec<String> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect();
    let start = words
        .iter()
        .position(|w| !w.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(words.len());
    words[start..].join(" ")
}

/// One section of the Proposal stage output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalSection {
    pub kind: SectionKind,
    pub body: String,
}

/// Validated output of the Proposal stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalOutput {
    pub sections: Vec<ProposalSection>,
}

impl ProposalOutput {
    /// Body of a section, if the model produced it.
    pub fn section(&self, kind: SectionKind) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| s.body.as_str())
    }
}

/// Payload of a stage result, tagged by stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutput {
    Research(ResearchOutput),
    UseCase(UseCaseOutput),
    Resource(ResourceOutput),
    Proposal(ProposalOutput),
}

impl StageOutput {
    /// The stage that produces this kind of payload.
    pub fn stage(&self) -> StageName {
        match self {
            Self::Research(_) => StageName::Research,
            Self::UseCase(_) => StageName::UseCase,
            Self::Resource(_) => StageName::Resource,
            Self::Proposal(_) => StageName::Proposal,
        }
    }

    pub fn as_research(&self) -> Option<&ResearchOutput> {
        match self {
            Self::Research(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_use_cases(&self) -> Option<&UseCaseOutput> {
        match self {
            Self::UseCase(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_resources(&self) -> Option<&ResourceOutput> {
        match self {
            Self::Resource(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_proposal(&self) -> Option<&ProposalOutput> {
        match self {
            Self::Proposal(o) => Some(o),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A titled section of the final document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSection {
    pub title: String,
    pub body: String,
}

/// The assembled proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub company: String,
    pub industry: String,
    /// Always the eight fixed sections, in template order.
    pub sections: Vec<DocumentSection>,
    pub use_cases: Vec<UseCase>,
    /// Deduplicated by URL, first-seen order.
    pub citations: Vec<Citation>,
    /// Use cases flagged "resource pending".
    pub pending_resources: Vec<String>,
}
