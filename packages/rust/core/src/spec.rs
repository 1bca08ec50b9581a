//! Declarative description of each stage.

use proposalgen_shared::{PipelineConfig, RetryPolicy, StageName, ToolKind};

use crate::validator::ValidatorId;

/// Which prompt template a stage renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateId {
    IndustryResearch,
    UseCaseIdeation,
    ResourceDiscovery,
    ProposalWriting,
}

/// Everything the stage runner needs to know about a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSpec {
    pub stage: StageName,
    pub template: TemplateId,
    /// Stages whose successful output must already be in the context.
    pub requires: Vec<StageName>,
    /// Tool adapters the stage may call.
    pub tools: Vec<ToolKind>,
    /// Upper bound on tool calls per attempt.
    pub max_tool_calls: usize,
    pub validator: ValidatorId,
    pub retry: RetryPolicy,
}

impl StageSpec {
    /// The default spec for `stage` under `config`.
    pub fn for_stage(stage: StageName, config: &PipelineConfig) -> Self {
        let (template, requires, tools) = match stage {
            StageName::Research => (TemplateId::IndustryResearch, vec![], vec![ToolKind::Search]),
            StageName::UseCase => (
                TemplateId::UseCaseIdeation,
                vec![StageName::Research],
                vec![ToolKind::Search],
            ),
            StageName::Resource => (
                TemplateId::ResourceDiscovery,
                vec![StageName::UseCase],
                vec![ToolKind::Dataset, ToolKind::Repo],
            ),
            StageName::Proposal => (
                TemplateId::ProposalWriting,
                vec![StageName::Research, StageName::UseCase, StageName::Resource],
                vec![],
            ),
        };
        Self {
            stage,
            template,
            requires,
            max_tool_calls: if tools.is_empty() {
                0
            } else {
                config.thresholds.max_tool_calls
            },
            tools,
            validator: ValidatorId::from(stage),
            retry: config.retry.clone(),
        }
    }

    /// The four stages in execution order.
    pub fn pipeline(config: &PipelineConfig) -> Vec<Self> {
        StageName::ALL
            .into_iter()
            .map(|stage| Self::for_stage(stage, config))
            .collect()
    }

    pub fn allows(&self, tool: ToolKind) -> bool {
        self.tools.contains(&tool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_is_in_stage_order() {
        let specs = StageSpec::pipeline(&PipelineConfig::default());
        let stages: Vec<StageName> = specs.iter().map(|s| s.stage).collect();
        assert_eq!(stages, StageName::ALL);
    }

    #[test]
    fn proposal_uses_no_tools() {
        let spec = StageSpec::for_stage(StageName::Proposal, &PipelineConfig::default());
        assert_eq!(spec.max_tool_calls, 0);
        assert!(!spec.allows(ToolKind::Search));
        assert_eq!(spec.requires.len(), 3);
    }

    #[test]
    fn resource_stage_uses_lookup_tools() {
        let spec = StageSpec::for_stage(StageName::Resource, &PipelineConfig::default());
        assert!(spec.allows(ToolKind::Dataset));
        assert!(spec.allows(ToolKind::Repo));
        assert_eq!(spec.retry.max_attempts, 3);
        assert_eq!(spec.validator, ValidatorId::Resource);
    }
}
