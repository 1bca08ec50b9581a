//! Prompt templates for the four stages.
//!
//! Every template ends with the JSON contract the reply must follow; the
//! decoding side lives in [`crate::extract`].

use std::fmt::Write as _;

use proposalgen_model::Prompt;
use proposalgen_shared::{SectionKind, ThresholdsConfig, UseCaseCategory};

use crate::context::SharedContext;
use crate::spec::{StageSpec, TemplateId};

const SYSTEM_BASE: &str = "You are a senior AI strategy consultant preparing an AI adoption \
proposal for a business client. Be specific to the client's industry, quantify impact where \
you can, and answer with a single JSON object only.";

/// Render the prompt for one attempt of `spec`.
///
/// `feedback` carries the previous attempt's violations, if any.
pub fn build_prompt(
    spec: &StageSpec,
    context: &SharedContext,
    thresholds: &ThresholdsConfig,
    feedback: Option<&str>,
) -> Prompt {
    let input = context.input();
    let (role, mut user) = match spec.template {
        TemplateId::IndustryResearch => ("You research industries and market trends.", research(context)),
        TemplateId::UseCaseIdeation => ("You design practical AI use cases.", use_cases(context, thresholds)),
        TemplateId::ResourceDiscovery => (
            "You find datasets and open-source code that accelerate delivery.",
            resources(context),
        ),
        TemplateId::ProposalWriting => ("You write executive-ready proposals.", proposal(context)),
    };

    if let Some(feedback) = feedback.filter(|f| !f.trim().is_empty()) {
        user.push_str("\n\n");
        user.push_str(feedback);
    }

    Prompt::new(
        format!(
            "{SYSTEM_BASE} {role}\nClient: {} ({} industry).",
            input.company, input.industry
        ),
        user,
    )
}

fn research(context: &SharedContext) -> String {
    let input = context.input();
    format!(
        "Research the {industry} industry and {company}'s position in it.\n\
         Cover market size and growth, AI adoption trends, leading competitors' AI \
         initiatives, and the main operational pain points AI could address.\n\
         Cite credible sources (research firms, industry bodies, government or academic \
         publications) with full URLs.\n\n\
         Reply with JSON:\n\
         {{\"summary\": \"multi-paragraph findings\",\n \
         \"sources\": [{{\"title\": \"...\", \"url\": \"https://...\"}}],\n \
         \"queries\": [\"web search queries that would find more evidence\"]}}",
        industry = input.industry,
        company = input.company,
    )
}

fn use_cases(context: &SharedContext, thresholds: &ThresholdsConfig) -> String {
    let input = context.input();
    let mut text = format!(
        "Propose {} to {} AI use cases for {}, with at least {} in every category below. \
         Every title must be unique.\n",
        thresholds.use_case_min,
        thresholds.use_case_max,
        input.company,
        thresholds.min_per_category.max(1)
    );
    for category in UseCaseCategory::ALL {
        let _ = writeln!(text, "- {}", category.label());
    }
    if let Some(research) = context.research() {
        let _ = write!(text, "\nIndustry research:\n{}\n", research.summary.trim());
    }
    text.push_str(
        "\nFor each use case give a title, its category (exactly one label from the list), \
         a description of the business problem and solution, an ROI estimate, and an \
         implementation complexity (low, medium or high).\n\n\
         Reply with JSON:\n\
         {\"use_cases\": [{\"title\": \"...\", \"category\": \"...\", \"description\": \"...\", \
         \"roi\": \"...\", \"complexity\": \"...\"}],\n \
         \"queries\": [\"optional web searches for industry benchmarks\"]}",
    );
    text
}

fn resources(context: &SharedContext) -> String {
    let mut text = String::from(
        "For each use case below, suggest one search query for a public dataset and one for \
         an open-source code repository that would help a team prototype it.\n\nUse cases:\n",
    );
    if let Some(out) = context.use_cases() {
        for use_case in &out.use_cases {
            let _ = writeln!(text, "- {} [{}]", use_case.title, use_case.category.label());
        }
    }
    text.push_str(
        "\nReply with JSON:\n\
         {\"requests\": [{\"use_case\": \"exact title from the list\", \
         \"dataset_query\": \"...\", \"repo_query\": \"...\"}]}",
    );
    text
}

fn proposal(context: &SharedContext) -> String {
    let input = context.input();
    let mut text = format!(
        "Write the final AI adoption proposal for {} ({}).\n",
        input.company, input.industry
    );

    if let Some(research) = context.research() {
        let _ = write!(text, "\nResearch findings:\n{}\n", research.summary.trim());
    }

    if let Some(out) = context.use_cases() {
        text.push_str("\nUse cases:\n");
        for use_case in &out.use_cases {
            let _ = writeln!(
                text,
                "- {} [{}] ROI: {} Complexity: {}",
                use_case.title,
                use_case.category.label(),
                or_dash(&use_case.roi),
                or_dash(&use_case.complexity)
            );
        }
    }

    if let Some(out) = context.resources() {
        text.push_str("\nResources:\n");
        for entry in &out.entries {
            if entry.pending {
                let _ = writeln!(text, "- {}: resource pending", entry.use_case);
            } else {
                let links: Vec<&str> = entry.links.iter().map(|l| l.url.as_str()).collect();
                let _ = writeln!(text, "- {}: {}", entry.use_case, links.join(", "));
            }
        }
    }

    text.push_str("\nWrite these sections, in this order:\n");
    for (i, kind) in SectionKind::ALL.iter().enumerate() {
        let _ = writeln!(text, "{}. {}", i + 1, kind.title());
    }
    text.push_str(
        "\nReply with JSON:\n\
         {\"sections\": [{\"title\": \"section title from the list\", \"body\": \"Markdown\"}]}",
    );
    text
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() { "-" } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{research_result, use_case_result};
    use proposalgen_shared::{PipelineConfig, ProposalInput, StageName};

    fn context() -> SharedContext {
        SharedContext::new(ProposalInput::new("Acme Foods", "Food & Beverage").unwrap())
    }

    #[test]
    fn research_prompt_names_the_client() {
        let spec = StageSpec::for_stage(StageName::Research, &PipelineConfig::default());
        let prompt = build_prompt(&spec, &context(), &ThresholdsConfig::default(), None);
        assert!(prompt.system.contains("Acme Foods"));
        assert!(prompt.user.contains("Food & Beverage"));
        assert!(prompt.user.contains("\"sources\""));
    }

    #[test]
    fn use_case_prompt_lists_categories_and_research() {
        let mut ctx = context();
        ctx.append(research_result(5)).unwrap();
        let spec = StageSpec::for_stage(StageName::UseCase, &PipelineConfig::default());
        let prompt = build_prompt(&spec, &ctx, &ThresholdsConfig::default(), None);
        for category in UseCaseCategory::ALL {
            assert!(prompt.user.contains(category.label()));
        }
        assert!(prompt.user.contains("Industry research:"));
    }

    #[test]
    fn use_case_prompt_follows_configured_bounds() {
        let mut ctx = context();
        ctx.append(research_result(5)).unwrap();
        let spec = StageSpec::for_stage(StageName::UseCase, &PipelineConfig::default());

        let defaults = build_prompt(&spec, &ctx, &ThresholdsConfig::default(), None);
        assert!(defaults.user.contains("Propose 15 to 20 AI use cases"));

        let thresholds = ThresholdsConfig {
            use_case_min: 8,
            use_case_max: 12,
            min_per_category: 2,
            ..ThresholdsConfig::default()
        };
        let prompt = build_prompt(&spec, &ctx, &thresholds, None);
        assert!(prompt.user.contains("Propose 8 to 12 AI use cases"));
        assert!(prompt.user.contains("at least 2 in every category"));
        assert!(!prompt.user.contains("15 to 20"));
    }

    #[test]
    fn resource_prompt_lists_use_cases() {
        let mut ctx = context();
        ctx.append(research_result(5)).unwrap();
        ctx.append(use_case_result(&[1, 1, 1, 1, 1])).unwrap();
        let spec = StageSpec::for_stage(StageName::Resource, &PipelineConfig::default());
        let prompt = build_prompt(&spec, &ctx, &ThresholdsConfig::default(), None);
        assert!(prompt.user.contains("- Computer Vision use case 1 [Computer Vision]"));
    }

    #[test]
    fn feedback_is_appended() {
        let spec = StageSpec::for_stage(StageName::Proposal, &PipelineConfig::default());
        let prompt = build_prompt(
            &spec,
            &context(),
            &ThresholdsConfig::default(),
            Some("- section 'Next Steps' is missing"),
        );
        assert!(prompt.user.ends_with("- section 'Next Steps' is missing"));
        assert!(prompt.user.contains("8. Next Steps"));
    }
}
