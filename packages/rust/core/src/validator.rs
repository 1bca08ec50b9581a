//! Stage-specific acceptance rules.
//!
//! Validation is pure: it looks only at the candidate and the configured
//! thresholds. Each rule yields a [`Violation`] whose severity decides
//! whether the stage is retried with feedback, failed outright, or accepted
//! in degraded mode.

use std::collections::HashSet;

use proposalgen_shared::{
    Citation, ProposalOutput, ResearchOutput, ResourceOutput, SectionKind, Severity, StageName,
    StageOutput, ThresholdsConfig, UseCaseCategory, UseCaseOutput, Violation,
    is_resolvable_url,
};

use crate::citations::count_authoritative;

/// A stage's proposed output, before acceptance.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub output: StageOutput,
    /// Citations gathered during the attempt, deduplicated.
    pub citations: Vec<Citation>,
}

/// Outcome of validating one candidate.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Validation {
    /// No blocking violation was found.
    pub ok: bool,
    pub violations: Vec<Violation>,
}

impl Validation {
    fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            ok: !violations.iter().any(Violation::blocks),
            violations,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.violations.iter().any(|v| v.severity == Severity::Fatal)
    }

    /// Violations that stop acceptance.
    pub fn blocking(&self) -> Vec<Violation> {
        self.violations.iter().filter(|v| v.blocks()).cloned().collect()
    }

    /// Non-blocking notes kept on an accepted result.
    pub fn notes(&self) -> Vec<Violation> {
        self.violations
            .iter()
            .filter(|v| !v.blocks())
            .cloned()
            .collect()
    }
}

/// Identifies which rule set a stage is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorId {
    Research,
    UseCase,
    Resource,
    Proposal,
}

impl From<StageName> for ValidatorId {
    fn from(stage: StageName) -> Self {
        match stage {
            StageName::Research => Self::Research,
            StageName::UseCase => Self::UseCase,
            StageName::Resource => Self::Resource,
            StageName::Proposal => Self::Proposal,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Validator {
    thresholds: ThresholdsConfig,
}

impl Validator {
    pub fn new(thresholds: ThresholdsConfig) -> Self {
        Self { thresholds }
    }

    /// Check `candidate` against the rules of `stage`.
    pub fn validate(&self, stage: StageName, candidate: &Candidate) -> Validation {
        self.validate_with(ValidatorId::from(stage), candidate)
    }

    /// Check `candidate` against an explicit rule set.
    pub fn validate_with(&self, id: ValidatorId, candidate: &Candidate) -> Validation {
        let violations = match (id, &candidate.output) {
            (ValidatorId::Research, StageOutput::Research(out)) => {
                self.research(out, &candidate.citations)
            }
            (ValidatorId::UseCase, StageOutput::UseCase(out)) => self.use_cases(out),
            (ValidatorId::Resource, StageOutput::Resource(out)) => self.resources(out),
            (ValidatorId::Proposal, StageOutput::Proposal(out)) => self.proposal(out),
            (id, output) => vec![Violation::new(
                "validator.stage_mismatch",
                format!("{id:?} rules cannot check {} output", output.stage()),
                Severity::Fatal,
            )],
        };
        Validation::from_violations(violations)
    }

    fn research(&self, out: &ResearchOutput, citations: &[Citation]) -> Vec<Violation> {
        let mut violations = Vec::new();

        if out.summary.trim().is_empty() {
            violations.push(Violation::new(
                "research.summary",
                "research summary is empty",
                Severity::Retry,
            ));
        }

        if citations.is_empty() {
            violations.push(Violation::new(
                "research.no_citations",
                "research produced no citations at all",
                Severity::Fatal,
            ));
            return violations;
        }

        let tier = self.thresholds.min_citation_tier;
        let found = count_authoritative(citations, tier);
        if found < self.thresholds.min_citations {
            violations.push(Violation::new(
                "research.min_citations",
                format!(
                    "need at least {} distinct {} or better citations, found {found}",
                    self.thresholds.min_citations,
                    tier.as_str()
                ),
                Severity::Retry,
            ));
        }
        violations
    }

    fn use_cases(&self, out: &UseCaseOutput) -> Vec<Violation> {
        let mut violations = Vec::new();
        let total = out.use_cases.len();
        let (min, max) = (self.thresholds.use_case_min, self.thresholds.use_case_max);

        if !(min..=max).contains(&total) {
            violations.push(Violation::new(
                "use_case.count",
                format!("expected between {min} and {max} use cases, got {total}"),
                Severity::Retry,
            ));
        }

        for category in UseCaseCategory::ALL {
            let count = out.count_in(category);
            if count < self.thresholds.min_per_category.max(1) {
                violations.push(Violation::new(
                    "use_case.category_coverage",
                    format!(
                        "category '{}' has {count} use case(s), need at least {}",
                        category.label(),
                        self.thresholds.min_per_category.max(1)
                    ),
                    Severity::Retry,
                ));
            }
        }

        let untitled = out
            .use_cases
            .iter()
            .filter(|u| u.title.trim().is_empty())
            .count();
        if untitled > 0 {
            violations.push(Violation::new(
                "use_case.title",
                format!("{untitled} use case(s) have no title"),
                Severity::Retry,
            ));
        }

        let mut seen = HashSet::new();
        let mut repeated: Vec<String> = Vec::new();
        for use_case in &out.use_cases {
            let key = title_key(&use_case.title);
            if key.is_empty() {
                continue;
            }
            if !seen.insert(key.clone()) && !repeated.contains(&key) {
                repeated.push(key);
            }
        }
        if !repeated.is_empty() {
            violations.push(Violation::new(
                "use_case.duplicate_title",
                format!(
                    "use case titles must be unique; repeated: {}",
                    repeated.join(", ")
                ),
                Severity::Retry,
            ));
        }
        violations
    }

    fn resources(&self, out: &ResourceOutput) -> Vec<Violation> {
        if out.entries.is_empty() {
            return vec![Violation::new(
                "resource.empty",
                "no resource entries were produced",
                Severity::Retry,
            )];
        }

        let mut violations = Vec::new();
        let mut resolved = 0usize;
        for entry in &out.entries {
            let has_link = entry.links.iter().any(|l| is_resolvable_url(&l.url));
            if has_link && !entry.pending {
                resolved += 1;
            } else {
                violations.push(Violation::new(
                    "resource.pending",
                    format!("resource pending: {}", entry.use_case),
                    Severity::Degrade,
                ));
            }
        }

        let coverage = resolved as f64 / out.entries.len() as f64;
        if coverage < self.thresholds.min_resource_coverage {
            violations.push(Violation::new(
                "resource.coverage",
                format!(
                    "only {resolved} of {} use cases resolved a resource (minimum share {:.0}%)",
                    out.entries.len(),
                    self.thresholds.min_resource_coverage * 100.0
                ),
                Severity::Retry,
            ));
        }
        violations
    }

    fn proposal(&self, out: &ProposalOutput) -> Vec<Violation> {
        SectionKind::ALL
            .into_iter()
            .filter_map(|kind| match out.section(kind) {
                Some(body) if !body.trim().is_empty() => None,
                Some(_) => Some(Violation::new(
                    "proposal.section",
                    format!("section '{}' is empty", kind.title()),
                    Severity::Retry,
                )),
                None => Some(Violation::new(
                    "proposal.section",
                    format!("section '{}' is missing", kind.title()),
                    Severity::Retry,
                )),
            })
            .collect()
    }
}

/// Render violations as re-prompt feedback for the next attempt.
pub fn feedback(violations: &[Violation]) -> String {
    let mut text = String::from(
        "Your previous answer was rejected by quality review. Fix every issue below \
         and answer again in the same JSON format:\n",
    );
    for violation in violations.iter().filter(|v| v.blocks()) {
        text.push_str(&format!("- {} ({})\n", violation.message, violation.rule));
    }
    text.push_str(
        "Keep everything that was already correct, add concrete figures and sources, \
         and make sure every required item is present.",
    );
    text
}

/// Case- and whitespace-insensitive form of a use case title.
fn title_key(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
