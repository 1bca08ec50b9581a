//! Fixtures and fakes shared by the unit tests in this crate.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use proposalgen_model::{GenerationConfig, ModelClient, ModelError, Prompt};
use proposalgen_shared::{
    Citation, FailureKind, FailureReason, PipelineConfig, ProposalError, ProposalOutput,
    ProposalSection, ResearchOutput, ResourceEntry, ResourceOutput, Result, ResultItem,
    RetryPolicy, Run, RunId, SectionKind, StageName, StageOutput, StageResult, ToolKind,
    TrustTier, UseCase, UseCaseCategory, UseCaseOutput,
};
use proposalgen_tools::{ToolAdapter, ToolError, ToolQuery};
use serde_json::json;

use crate::sink::PersistenceSink;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Default thresholds with millisecond backoff and two tries per tool call.
pub(crate) fn test_config() -> PipelineConfig {
    PipelineConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            multiplier: 2.0,
            max_delay: Duration::from_millis(5),
        },
        tool_attempts: 2,
        ..PipelineConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Stage outputs
// ---------------------------------------------------------------------------

const LISTED_DOMAINS: [&str; 6] = [
    "mckinsey.com",
    "bcg.com",
    "deloitte.com",
    "pwc.com",
    "gartner.com",
    "statista.com",
];

/// `n` distinct primary-tier citations on default authoritative domains.
pub(crate) fn research_citations(n: usize) -> Vec<Citation> {
    (1..=n)
        .map(|i| Citation {
            url: format!(
                "https://www.{}/insights/retail-ai-{i}",
                LISTED_DOMAINS[i % LISTED_DOMAINS.len()]
            ),
            title: format!("Industry report {i}"),
            tier: TrustTier::Primary,
        })
        .collect()
}

pub(crate) fn research_result(n_citations: usize) -> StageResult {
    let output = StageOutput::Research(ResearchOutput {
        summary: "Retail is investing heavily in AI.".into(),
        queries: vec!["retail ai adoption".into()],
    });
    let mut result = StageResult::pending(StageName::Research);
    result.begin_attempt();
    result.succeed(output, research_citations(n_citations), vec![], vec![])
}

/// Use cases per category, counts given in [`UseCaseCategory::ALL`] order.
/// Titles read "{label} use case {n}", numbered from 1 within a category.
pub(crate) fn use_case_output(counts: &[usize]) -> UseCaseOutput {
    let use_cases = UseCaseCategory::ALL
        .into_iter()
        .zip(counts)
        .flat_map(|(category, &count)| {
            (1..=count).map(move |i| UseCase {
                title: format!("{} use case {i}", category.label()),
                category,
                description: format!("Description of use case {i}."),
                roi: "15% cost reduction".into(),
                complexity: "medium".into(),
            })
        })
        .collect();
    UseCaseOutput { use_cases }
}

pub(crate) fn use_case_result(counts: &[usize]) -> StageResult {
    let mut result = StageResult::pending(StageName::UseCase);
    result.begin_attempt();
    result.succeed(
        StageOutput::UseCase(use_case_output(counts)),
        vec![],
        vec![],
        vec![],
    )
}

/// `total` entries of which the last `pending` have no link.
pub(crate) fn resource_output(total: usize, pending: usize) -> ResourceOutput {
    let entries = (1..=total)
        .map(|i| {
            let is_pending = i > total.saturating_sub(pending);
            ResourceEntry {
                use_case: format!("Use case {i}"),
                links: if is_pending {
                    vec![]
                } else {
                    vec![Citation {
                        url: format!("https://github.com/example/use-case-{i}"),
                        title: format!("example/use-case-{i}"),
                        tier: TrustTier::Secondary,
                    }]
                },
                pending: is_pending,
            }
        })
        .collect();
    ResourceOutput { entries }
}

pub(crate) fn resource_result(total: usize, pending: usize) -> StageResult {
    let output = resource_output(total, pending);
    let citations = output
        .entries
        .iter()
        .flat_map(|e| e.links.iter().cloned())
        .collect();
    let mut result = StageResult::pending(StageName::Resource);
    result.begin_attempt();
    result.succeed(StageOutput::Resource(output), citations, vec![], vec![])
}

pub(crate) fn proposal_output(kinds: &[SectionKind]) -> ProposalOutput {
    ProposalOutput {
        sections: kinds
            .iter()
            .map(|&kind| ProposalSection {
                kind,
                body: format!("Body of {}.", kind.title()),
            })
            .collect(),
    }
}

pub(crate) fn sealed_failure(stage: StageName) -> StageResult {
    let mut result = StageResult::pending(stage);
    result.begin_attempt();
    result.fail(FailureReason::new(
        stage,
        FailureKind::ModelUnavailable,
        "HTTP 503",
    ))
}

// ---------------------------------------------------------------------------
// Model replies
// ---------------------------------------------------------------------------

/// Research reply with `sources` primary-tier sources and no queries.
pub(crate) fn research_reply(sources: usize) -> String {
    let sources: Vec<_> = research_citations(sources)
        .into_iter()
        .map(|c| json!({ "title": c.title, "url": c.url }))
        .collect();
    json!({
        "summary": "Retail is investing heavily in AI.",
        "sources": sources,
        "queries": [],
    })
    .to_string()
}

pub(crate) fn use_case_reply(counts: &[usize]) -> String {
    let use_cases: Vec<_> = use_case_output(counts)
        .use_cases
        .into_iter()
        .map(|u| {
            json!({
                "title": u.title,
                "category": u.category.label(),
                "description": u.description,
                "roi": u.roi,
                "complexity": u.complexity,
            })
        })
        .collect();
    json!({ "use_cases": use_cases }).to_string()
}

/// One dataset and one repo query per title: "{title} dataset" / "{title} github".
pub(crate) fn resource_reply(titles: &[String]) -> String {
    let requests: Vec<_> = titles
        .iter()
        .map(|t| {
            json!({
                "use_case": t,
                "dataset_query": format!("{t} dataset"),
                "repo_query": format!("{t} github"),
            })
        })
        .collect();
    json!({ "requests": requests }).to_string()
}

pub(crate) fn proposal_reply(kinds: &[SectionKind]) -> String {
    let sections: Vec<_> = proposal_output(kinds)
        .sections
        .into_iter()
        .map(|s| json!({ "title": s.kind.title(), "body": s.body }))
        .collect();
    json!({ "sections": sections }).to_string()
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Model client that replays a fixed script, one entry per call.
pub(crate) struct ScriptedModel {
    replies: Mutex<VecDeque<std::result::Result<String, ModelError>>>,
    prompts: Mutex<Vec<Prompt>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub(crate) fn new(replies: Vec<std::result::Result<String, ModelError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub(crate) fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        _config: &GenerationConfig,
    ) -> std::result::Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Unavailable("script exhausted".into())))
    }
}

enum Behavior {
    Hits { per_query: usize, misses: HashSet<String> },
    Fails(ToolError),
}

/// Tool adapter with canned behavior.
pub(crate) struct FakeTool {
    kind: ToolKind,
    behavior: Behavior,
    delays: Vec<(String, Duration)>,
    calls: AtomicUsize,
}

impl FakeTool {
    fn build(kind: ToolKind, behavior: Behavior) -> Self {
        Self {
            kind,
            behavior,
            delays: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// `per_query` distinct hits for every query.
    pub(crate) fn hits(kind: ToolKind, per_query: usize) -> Self {
        Self::build(
            kind,
            Behavior::Hits {
                per_query,
                misses: HashSet::new(),
            },
        )
    }

    /// One hit per query, except queries about the named use cases.
    pub(crate) fn hits_except(kind: ToolKind, use_cases: &[String]) -> Self {
        Self::build(
            kind,
            Behavior::Hits {
                per_query: 1,
                misses: use_cases.iter().cloned().collect(),
            },
        )
    }

    pub(crate) fn failing(kind: ToolKind, error: ToolError) -> Self {
        Self::build(kind, Behavior::Fails(error))
    }

    pub(crate) fn with_delay(mut self, query: &str, delay: Duration) -> Self {
        self.delays.push((query.to_string(), delay));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolAdapter for FakeTool {
    fn kind(&self) -> ToolKind {
        self.kind
    }

    async fn query(&self, query: &ToolQuery) -> std::result::Result<Vec<ResultItem>, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((_, delay)) = self.delays.iter().find(|(q, _)| *q == query.text) {
            tokio::time::sleep(*delay).await;
        }

        match &self.behavior {
            Behavior::Fails(error) => Err(error.clone()),
            Behavior::Hits { per_query, misses } => {
                let missed = misses
                    .iter()
                    .any(|m| query.text == *m || query.text.starts_with(&format!("{m} ")));
                if missed {
                    return Err(ToolError::NoResults);
                }
                let slug: String = query
                    .text
                    .to_lowercase()
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
                    .collect();
                Ok((1..=*per_query)
                    .map(|i| ResultItem {
                        title: format!("{} result {i}", query.text),
                        url: format!("https://{}.example.org/{slug}/{i}", self.kind),
                        snippet: String::new(),
                    })
                    .collect())
            }
        }
    }
}

/// Sink that keeps every snapshot in memory.
#[derive(Default)]
pub(crate) struct MemorySink {
    pub(crate) runs: Mutex<Vec<Run>>,
    pub(crate) stages: Mutex<Vec<(RunId, StageResult)>>,
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn record_run(&self, run: &Run) -> Result<()> {
        self.runs.lock().unwrap().push(run.clone());
        Ok(())
    }

    async fn record_stage(&self, run_id: &RunId, result: &StageResult) -> Result<()> {
        self.stages
            .lock()
            .unwrap()
            .push((run_id.clone(), result.clone()));
        Ok(())
    }
}

/// Sink whose every write fails.
pub(crate) struct FailingSink;

#[async_trait]
impl PersistenceSink for FailingSink {
    async fn record_run(&self, _run: &Run) -> Result<()> {
        Err(ProposalError::Storage("disk full".into()))
    }

    async fn record_stage(&self, _run_id: &RunId, _result: &StageResult) -> Result<()> {
        Err(ProposalError::Storage("disk full".into()))
    }
}
