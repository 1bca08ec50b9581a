//! Append-only record of sealed stage results.

use std::sync::Arc;

use proposalgen_shared::{
    Citation, ProposalError, ProposalInput, ProposalOutput, ResearchOutput, ResourceOutput,
    Result, StageName, StageOutput, StageResult, UseCaseOutput,
};

/// Accumulated output of the stages that have succeeded so far.
///
/// Entries are written once, in stage order, and never removed or replaced.
/// Cloning is cheap: results are shared behind `Arc`, so a clone is an
/// immutable snapshot for a stage to read while the orchestrator keeps
/// appending to its own copy.
#[derive(Debug, Clone)]
pub struct SharedContext {
    input: ProposalInput,
    results: Vec<Arc<StageResult>>,
}

impl SharedContext {
    pub fn new(input: ProposalInput) -> Self {
        Self {
            input,
            results: Vec::new(),
        }
    }

    pub fn input(&self) -> &ProposalInput {
        &self.input
    }

    /// Append a successful result for the next stage in sequence.
    pub fn append(&mut self, result: StageResult) -> Result<Arc<StageResult>> {
        if !result.is_success() {
            return Err(ProposalError::validation(format!(
                "only successful results enter the context, {} is {}",
                result.stage,
                result.status.as_str()
            )));
        }
        if self.get(result.stage).is_some() {
            return Err(ProposalError::validation(format!(
                "context already holds a result for {}",
                result.stage
            )));
        }
        if result.stage.index() != self.results.len() {
            return Err(ProposalError::validation(format!(
                "{} cannot follow {} stage(s)",
                result.stage,
                self.results.len()
            )));
        }
        let shared = Arc::new(result);
        self.results.push(Arc::clone(&shared));
        Ok(shared)
    }

    pub fn get(&self, stage: StageName) -> Option<&Arc<StageResult>> {
        self.results.iter().find(|r| r.stage == stage)
    }

    pub fn contains(&self, stage: StageName) -> bool {
        self.get(stage).is_some()
    }

    /// Results in stage order.
    pub fn results(&self) -> &[Arc<StageResult>] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// The first stage that has not succeeded yet.
    pub fn next_stage(&self) -> Option<StageName> {
        StageName::ALL.get(self.results.len()).copied()
    }

    fn output(&self, stage: StageName) -> Option<&StageOutput> {
        self.get(stage).and_then(|r| r.output.as_ref())
    }

    pub fn research(&self) -> Option<&ResearchOutput> {
        self.output(StageName::Research)
            .and_then(StageOutput::as_research)
    }

    pub fn use_cases(&self) -> Option<&UseCaseOutput> {
        self.output(StageName::UseCase)
            .and_then(StageOutput::as_use_cases)
    }

    pub fn resources(&self) -> Option<&ResourceOutput> {
        self.output(StageName::Resource)
            .and_then(StageOutput::as_resources)
    }

    pub fn proposal(&self) -> Option<&ProposalOutput> {
        self.output(StageName::Proposal)
            .and_then(StageOutput::as_proposal)
    }

    /// Every citation gathered so far, in stage order (not deduplicated).
    pub fn citations(&self) -> impl Iterator<Item = &Citation> {
        self.results.iter().flat_map(|r| r.citations.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{research_result, sealed_failure};

    fn input() -> ProposalInput {
        ProposalInput::new("Acme", "Retail").expect("input")
    }

    #[test]
    fn appends_in_order_only() {
        let mut ctx = SharedContext::new(input());
        assert_eq!(ctx.next_stage(), Some(StageName::Research));

        ctx.append(research_result(3)).expect("research");
        assert_eq!(ctx.len(), 1);
        assert!(ctx.research().is_some());
        assert_eq!(ctx.citations().count(), 3);
        assert_eq!(ctx.next_stage(), Some(StageName::UseCase));

        let dup = ctx.append(research_result(1)).unwrap_err();
        assert!(dup.to_string().contains("already holds"));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn rejects_failed_results() {
        let mut ctx = SharedContext::new(input());
        let err = ctx.append(sealed_failure(StageName::Research)).unwrap_err();
        assert!(err.to_string().contains("only successful"));
        assert!(ctx.is_empty());
    }

    #[test]
    fn snapshot_is_unaffected_by_later_appends() {
        let mut ctx = SharedContext::new(input());
        let snapshot = ctx.clone();
        ctx.append(research_result(1)).expect("research");
        assert!(snapshot.is_empty());
        assert_eq!(ctx.len(), 1);
    }
}
