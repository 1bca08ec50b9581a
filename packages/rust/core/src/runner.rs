//! Executes one stage: prompt, model call, tool fan-out, validation, retry.

use std::collections::HashMap;
use std::sync::Arc;

use proposalgen_model::{GenerationConfig, ModelClient, ModelError};
use proposalgen_shared::{
    AttemptOutcome, Citation, FailureKind, FailureReason, PipelineConfig, ProposalOutput,
    ProposalSection, ResearchOutput, ResourceEntry, ResourceOutput, RetryPolicy, SectionKind,
    StageName, StageOutput, StageResult, ToolCallRecord, ToolKind, UseCase, UseCaseCategory,
    UseCaseOutput, Violation, is_resolvable_url,
};
use proposalgen_tools::{ToolAdapter, ToolError, ToolQuery, ToolSet};
use tokio::sync::Semaphore;
use tokio::time::{Instant, sleep, sleep_until, timeout_at};
use tracing::{debug, info, instrument, warn};

use crate::citations::{cite, cite_item, dedup};
use crate::context::SharedContext;
use crate::extract::{ProposalReply, ResearchReply, ResourceReply, UseCaseReply, parse_reply};
use crate::orchestrator::ProgressReporter;
use crate::prompts::build_prompt;
use crate::spec::{StageSpec, TemplateId};
use crate::validator::{self, Candidate, Validation, Validator};

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

/// One tool call the stage wants to make.
#[derive(Debug, Clone, PartialEq)]
struct ToolRequest {
    kind: ToolKind,
    query: String,
    /// Index of the use case this lookup is for (Resource stage).
    owner: Option<usize>,
}

/// A decoded reply, waiting for its tool results.
#[derive(Debug, Clone)]
enum Draft {
    Research {
        summary: String,
        queries: Vec<String>,
        sources: Vec<Citation>,
    },
    UseCase {
        use_cases: Vec<UseCase>,
    },
    Resource {
        titles: Vec<String>,
    },
    Proposal {
        sections: Vec<ProposalSection>,
    },
}

#[derive(Debug, Clone)]
struct Plan {
    draft: Draft,
    requests: Vec<ToolRequest>,
}

/// How a single attempt ended.
enum AttemptResult {
    Accepted {
        candidate: Candidate,
        tool_calls: Vec<ToolCallRecord>,
        validation: Validation,
    },
    ModelFailed(ModelError),
    Rejected {
        tool_calls: Vec<ToolCallRecord>,
        validation: Validation,
    },
    DeadlineExceeded,
}

// ---------------------------------------------------------------------------
// StageRunner
// ---------------------------------------------------------------------------

/// Runs stages against a model client and a tool set.
pub struct StageRunner {
    model: Arc<dyn ModelClient>,
    tools: ToolSet,
    config: Arc<PipelineConfig>,
    validator: Validator,
    generation: GenerationConfig,
}

impl StageRunner {
    pub fn new(config: Arc<PipelineConfig>, model: Arc<dyn ModelClient>, tools: ToolSet) -> Self {
        Self {
            validator: Validator::new(config.thresholds.clone()),
            generation: GenerationConfig::from(config.as_ref()),
            model,
            tools,
            config,
        }
    }

    /// Execute `spec` against the context snapshot.
    ///
    /// Always returns a sealed result: `success`, or `failed` with a reason.
    /// No call outlives `deadline`.
    #[instrument(skip_all, fields(stage = %spec.stage))]
    pub async fn execute(
        &self,
        spec: &StageSpec,
        context: &SharedContext,
        deadline: Instant,
        progress: &dyn ProgressReporter,
    ) -> StageResult {
        let mut result = StageResult::pending(spec.stage);

        if let Some(missing) = spec.requires.iter().find(|s| !context.contains(**s)) {
            warn!(%missing, "required context missing");
            return result.fail(FailureReason::new(
                spec.stage,
                FailureKind::MissingContext,
                format!("{missing} output is not available"),
            ));
        }

        let max_attempts = spec.retry.max_attempts.max(1);
        let mut feedback: Option<String> = None;

        loop {
            let attempt = result.begin_attempt();
            progress.stage_attempt(spec.stage, attempt, max_attempts);

            if Instant::now() >= deadline {
                result.log_attempt(AttemptOutcome::Timeout, "run deadline reached", vec![]);
                return result.fail(deadline_reason(spec.stage));
            }

            let (raw, outcome) = self
                .attempt(spec, context, feedback.as_deref(), deadline)
                .await;
            if raw.is_some() {
                result.raw_output = raw;
            }

            let last_failure = match outcome {
                AttemptResult::Accepted {
                    candidate,
                    tool_calls,
                    validation,
                } => {
                    let notes = validation.notes();
                    info!(attempt, notes = notes.len(), "stage accepted");
                    result.log_attempt(AttemptOutcome::Accepted, "", notes.clone());
                    return result.succeed(candidate.output, candidate.citations, tool_calls, notes);
                }
                AttemptResult::DeadlineExceeded => {
                    warn!(attempt, "run deadline reached mid-attempt");
                    result.log_attempt(AttemptOutcome::Timeout, "run deadline reached", vec![]);
                    return result.fail(deadline_reason(spec.stage));
                }
                AttemptResult::ModelFailed(error) => {
                    warn!(attempt, %error, "model call failed");
                    result.log_attempt(AttemptOutcome::ModelError, error.to_string(), vec![]);
                    let reason =
                        FailureReason::new(spec.stage, error.failure_kind(), error.to_string());
                    if !error.is_retryable() {
                        return result.fail(reason);
                    }
                    reason
                }
                AttemptResult::Rejected {
                    tool_calls,
                    validation,
                } => {
                    let blocking = validation.blocking();
                    warn!(attempt, violations = blocking.len(), "stage output rejected");
                    result.tool_calls = tool_calls;
                    result.log_attempt(AttemptOutcome::Rejected, "", blocking.clone());
                    let reason = FailureReason::new(
                        spec.stage,
                        FailureKind::ValidationFailed,
                        summarize(&blocking),
                    )
                    .with_violations(blocking.clone());
                    if validation.is_fatal() {
                        return result.fail(reason);
                    }
                    feedback = Some(validator::feedback(&blocking));
                    reason
                }
            };

            if attempt >= max_attempts {
                warn!(attempts = attempt, kind = %last_failure.kind, "retry budget exhausted");
                return result.fail(last_failure);
            }

            let delay = spec.retry.backoff(attempt + 1);
            debug!(?delay, "backing off before retry");
            if !sleep_within(delay, deadline).await {
                return result.fail(deadline_reason(spec.stage));
            }
        }
    }

    /// One attempt. Returns the raw model text (when there was one) and the outcome.
    async fn attempt(
        &self,
        spec: &StageSpec,
        context: &SharedContext,
        feedback: Option<&str>,
        deadline: Instant,
    ) -> (Option<String>, AttemptResult) {
        let prompt = build_prompt(spec, context, &self.config.thresholds, feedback);

        let reply = match timeout_at(deadline, self.model.generate(&prompt, &self.generation)).await
        {
            Err(_) => return (None, AttemptResult::DeadlineExceeded),
            Ok(Err(error)) => return (None, AttemptResult::ModelFailed(error)),
            Ok(Ok(text)) => text,
        };

        let plan = match self.plan(spec, context, &reply) {
            Ok(plan) => plan,
            Err(error) => return (Some(reply), AttemptResult::ModelFailed(error)),
        };

        let tool_calls = self.run_tools(spec, &plan.requests, deadline).await;
        if Instant::now() >= deadline {
            return (Some(reply), AttemptResult::DeadlineExceeded);
        }

        let candidate = self.finish(plan.draft, &plan.requests, &tool_calls);
        let validation = self.validator.validate_with(spec.validator, &candidate);

        let outcome = if validation.ok {
            AttemptResult::Accepted {
                candidate,
                tool_calls,
                validation,
            }
        } else {
            AttemptResult::Rejected {
                tool_calls,
                validation,
            }
        };
        (Some(reply), outcome)
    }

    // -----------------------------------------------------------------------
    // Planning: reply -> draft + tool requests
    // -----------------------------------------------------------------------

    fn plan(&self, spec: &StageSpec, context: &SharedContext, reply: &str) -> Result<Plan, ModelError> {
        let domains = &self.config.authoritative_domains;
        let input = context.input();

        let plan = match spec.template {
            TemplateId::IndustryResearch => {
                let reply: ResearchReply = parse_reply(reply)?;
                let mut queries = clean_queries(reply.queries);
                if queries.is_empty() {
                    queries = vec![
                        format!("{} industry AI adoption trends", input.industry),
                        format!("{} {} artificial intelligence", input.company, input.industry),
                    ];
                }
                let requests = search_requests(spec, &queries);
                let sources = reply
                    .sources
                    .iter()
                    .map(|s| cite(&s.url, &s.title, domains))
                    .collect();
                Plan {
                    draft: Draft::Research {
                        summary: reply.summary.trim().to_string(),
                        queries,
                        sources,
                    },
                    requests,
                }
            }
            TemplateId::UseCaseIdeation => {
                let reply: UseCaseReply = parse_reply(reply)?;
                let use_cases = reply
                    .use_cases
                    .into_iter()
                    .map(|u| {
                        let category = UseCaseCategory::from_label(&u.category).unwrap_or_else(|| {
                            UseCaseCategory::classify(&format!("{} {}", u.title, u.description))
                        });
                        UseCase {
                            title: u.title.trim().to_string(),
                            category,
                            description: u.description.trim().to_string(),
                            roi: u.roi.trim().to_string(),
                            complexity: u.complexity.trim().to_string(),
                        }
                    })
                    .collect();
                Plan {
                    draft: Draft::UseCase { use_cases },
                    requests: search_requests(spec, &clean_queries(reply.queries)),
                }
            }
            TemplateId::ResourceDiscovery => {
                let reply: ResourceReply = parse_reply(reply)?;
                let titles: Vec<String> = context
                    .use_cases()
                    .map(|out| out.use_cases.iter().map(|u| u.title.clone()).collect())
                    .unwrap_or_default();
                let requests = resource_requests(spec, &titles, &reply);
                Plan {
                    draft: Draft::Resource { titles },
                    requests,
                }
            }
            TemplateId::ProposalWriting => {
                let reply: ProposalReply = parse_reply(reply)?;
                let mut sections: Vec<ProposalSection> = Vec::new();
                for section in reply.sections {
                    match SectionKind::from_title(&section.title) {
                        Some(kind) if !sections.iter().any(|s| s.kind == kind) => {
                            sections.push(ProposalSection {
                                kind,
                                body: section.body.trim().to_string(),
                            });
                        }
                        Some(_) => debug!(title = %section.title, "duplicate section ignored"),
                        None => debug!(title = %section.title, "unrecognized section ignored"),
                    }
                }
                Plan {
                    draft: Draft::Proposal { sections },
                    requests: Vec::new(),
                }
            }
        };
        Ok(plan)
    }

    // -----------------------------------------------------------------------
    // Tool fan-out
    // -----------------------------------------------------------------------

    /// Run every request with bounded concurrency. Records come back in
    /// request order regardless of completion order.
    async fn run_tools(
        &self,
        spec: &StageSpec,
        requests: &[ToolRequest],
        deadline: Instant,
    ) -> Vec<ToolCallRecord> {
        if requests.is_empty() {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.config.tool_concurrency.max(1)));
        let retry = RetryPolicy {
            max_attempts: self.config.tool_attempts.max(1),
            ..spec.retry.clone()
        };

        let mut handles = Vec::with_capacity(requests.len());
        for request in requests {
            let adapter = self.tools.get(request.kind);
            let sem = Arc::clone(&semaphore);
            let query = ToolQuery::new(
                request.query.clone(),
                self.config.max_results,
                self.config.tool_timeout,
            );
            let retry = retry.clone();
            let kind = request.kind;

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return unavailable_record(kind, &query.text, "tool semaphore closed");
                };
                call_tool(kind, adapter, query, retry, deadline).await
            }));
        }

        let mut records = Vec::with_capacity(handles.len());
        for (request, handle) in requests.iter().zip(handles) {
            match handle.await {
                Ok(record) => records.push(record),
                Err(e) => records.push(unavailable_record(
                    request.kind,
                    &request.query,
                    &format!("tool task failed: {e}"),
                )),
            }
        }

        let degraded = records.iter().filter(|r| r.degraded).count();
        info!(calls = records.len(), degraded, "tool calls complete");
        records
    }

    // -----------------------------------------------------------------------
    // Candidate assembly
    // -----------------------------------------------------------------------

    fn finish(&self, draft: Draft, requests: &[ToolRequest], calls: &[ToolCallRecord]) -> Candidate {
        let domains = &self.config.authoritative_domains;
        let found = |call: &ToolCallRecord| -> Vec<Citation> {
            call.items
                .iter()
                .filter(|item| is_resolvable_url(&item.url))
                .map(|item| cite_item(item, domains))
                .collect()
        };

        match draft {
            Draft::Research {
                summary,
                queries,
                sources,
            } => {
                let searched = calls.iter().flat_map(|c| found(c));
                Candidate {
                    output: StageOutput::Research(ResearchOutput { summary, queries }),
                    citations: dedup(sources.into_iter().chain(searched)),
                }
            }
            Draft::UseCase { use_cases } => Candidate {
                output: StageOutput::UseCase(UseCaseOutput { use_cases }),
                citations: dedup(calls.iter().flat_map(|c| found(c))),
            },
            Draft::Resource { titles } => {
                let mut links: HashMap<usize, Vec<Citation>> = HashMap::new();
                for (request, call) in requests.iter().zip(calls) {
                    if let Some(owner) = request.owner {
                        links.entry(owner).or_default().extend(found(call));
                    }
                }
                let entries: Vec<ResourceEntry> = titles
                    .into_iter()
                    .enumerate()
                    .map(|(i, use_case)| {
                        let links = dedup(links.remove(&i).unwrap_or_default());
                        ResourceEntry {
                            use_case,
                            pending: links.is_empty(),
                            links,
                        }
                    })
                    .collect();
                let citations = dedup(entries.iter().flat_map(|e| e.links.iter().cloned()));
                Candidate {
                    output: StageOutput::Resource(ResourceOutput { entries }),
                    citations,
                }
            }
            Draft::Proposal { sections } => Candidate {
                output: StageOutput::Proposal(ProposalOutput { sections }),
                citations: Vec::new(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn clean_queries(queries: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for query in queries {
        let query = query.trim().to_string();
        if !query.is_empty() && !out.contains(&query) {
            out.push(query);
        }
    }
    out
}

fn search_requests(spec: &StageSpec, queries: &[String]) -> Vec<ToolRequest> {
    if !spec.allows(ToolKind::Search) {
        return Vec::new();
    }
    queries
        .iter()
        .take(spec.max_tool_calls)
        .map(|q| ToolRequest {
            kind: ToolKind::Search,
            query: q.clone(),
            owner: None,
        })
        .collect()
}

fn normalize(title: &str) -> String {
    title.trim().to_lowercase()
}

/// One dataset and one repo lookup per use case, in use case order.
fn resource_requests(spec: &StageSpec, titles: &[String], reply: &ResourceReply) -> Vec<ToolRequest> {
    let mut requests = Vec::new();
    for (i, title) in titles.iter().enumerate() {
        let asked = reply
            .requests
            .iter()
            .find(|r| normalize(&r.use_case) == normalize(title));
        let pick = |q: Option<&String>| {
            q.map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .unwrap_or(title.as_str())
                .to_string()
        };

        for kind in [ToolKind::Dataset, ToolKind::Repo] {
            if !spec.allows(kind) {
                continue;
            }
            let query = match kind {
                ToolKind::Dataset => pick(asked.and_then(|r| r.dataset_query.as_ref())),
                _ => pick(asked.and_then(|r| r.repo_query.as_ref())),
            };
            requests.push(ToolRequest {
                kind,
                query,
                owner: Some(i),
            });
        }
    }
    requests.truncate(spec.max_tool_calls);
    requests
}

/// Call one adapter with per-call retries. Never fails; failures end up
/// in the record.
async fn call_tool(
    kind: ToolKind,
    adapter: Option<Arc<dyn ToolAdapter>>,
    query: ToolQuery,
    retry: RetryPolicy,
    deadline: Instant,
) -> ToolCallRecord {
    let started = std::time::Instant::now();
    let mut record = ToolCallRecord {
        tool: kind,
        query: query.text.clone(),
        items: Vec::new(),
        latency_ms: 0,
        success: false,
        degraded: false,
        tries: 0,
        error: None,
    };

    let Some(adapter) = adapter else {
        record.degraded = true;
        record.error = Some(format!("no {kind} tool configured"));
        return record;
    };

    loop {
        record.tries += 1;
        let outcome = match timeout_at(deadline, adapter.query(&query)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                record.degraded = true;
                record.error = Some("run deadline reached".into());
                break;
            }
        };

        match outcome {
            Ok(items) => {
                record.items = items;
                record.success = true;
                record.error = None;
                break;
            }
            Err(ToolError::NoResults) => {
                record.success = true;
                record.error = None;
                break;
            }
            Err(error) => {
                record.error = Some(error.to_string());
                if record.tries >= retry.max_attempts {
                    warn!(tool = %kind, query = %query.text, %error, "tool call degraded");
                    record.degraded = true;
                    break;
                }
                debug!(tool = %kind, tries = record.tries, %error, "retrying tool call");
                if !sleep_within(retry.backoff(record.tries + 1), deadline).await {
                    record.degraded = true;
                    break;
                }
            }
        }
    }

    record.latency_ms = started.elapsed().as_millis() as u64;
    record
}

fn unavailable_record(kind: ToolKind, query: &str, error: &str) -> ToolCallRecord {
    ToolCallRecord {
        tool: kind,
        query: query.to_string(),
        items: Vec::new(),
        latency_ms: 0,
        success: false,
        degraded: true,
        tries: 0,
        error: Some(error.to_string()),
    }
}

/// Sleep for `delay` unless that would pass `deadline`; then sleep until
/// the deadline and return `false`.
async fn sleep_within(delay: std::time::Duration, deadline: Instant) -> bool {
    if Instant::now() + delay >= deadline {
        sleep_until(deadline).await;
        false
    } else {
        sleep(delay).await;
        true
    }
}

fn deadline_reason(stage: StageName) -> FailureReason {
    FailureReason::new(stage, FailureKind::Timeout, "run deadline reached")
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
