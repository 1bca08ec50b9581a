//! Document assembler.
//!
//! Merges the sealed stage results of a run into the final [`Document`].
//! Assembly reads the context only: the same context always yields the same
//! document.

use proposalgen_shared::{
    Document, DocumentSection, ProposalError, Result, SectionKind, StageName,
};
use tracing::{debug, instrument};

use crate::citations::dedup;
use crate::context::SharedContext;

/// Build the document from a context holding all four stages.
///
/// Sections follow the fixed template order regardless of the order the
/// model wrote them in. Citations come from every stage, deduplicated by
/// URL in first-seen order.
#[instrument(skip_all, fields(company = %context.input().company))]
pub fn assemble(context: &SharedContext) -> Result<Document> {
    let proposal = context
        .proposal()
        .ok_or_else(|| missing(StageName::Proposal))?;
    let use_cases = context
        .use_cases()
        .ok_or_else(|| missing(StageName::UseCase))?;
    let resources = context
        .resources()
        .ok_or_else(|| missing(StageName::Resource))?;

    let mut sections = Vec::with_capacity(SectionKind::ALL.len());
    for kind in SectionKind::ALL {
        let body = proposal
            .section(kind)
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| {
                ProposalError::Assembly(format!("section '{}' is missing or empty", kind.title()))
            })?;
        sections.push(DocumentSection {
            title: kind.title().to_string(),
            body: body.to_string(),
        });
    }

    let citations = dedup(context.citations().cloned());
    let input = context.input();

    debug!(
        sections = sections.len(),
        citations = citations.len(),
        use_cases = use_cases.use_cases.len(),
        "document assembled"
    );

    Ok(Document {
        company: input.company.clone(),
        industry: input.industry.clone(),
        sections,
        use_cases: use_cases.use_cases.clone(),
        citations,
        pending_resources: resources.pending(),
    })
}

fn missing(stage: StageName) -> ProposalError {
    ProposalError::Assembly(format!("{stage} output is not in the context"))
}

#[cfg(test)]
mod tests {
    use proposalgen_shared::{ProposalInput, StageOutput, StageResult};

    use super::*;
    use crate::testing::{
        proposal_output, research_result, resource_result, use_case_result,
    };

    fn full_context(sections: &[SectionKind]) -> SharedContext {
        let mut ctx = SharedContext::new(ProposalInput::new("Acme", "Retail").unwrap());
        ctx.append(research_result(6)).unwrap();
        ctx.append(use_case_result(&[5, 5, 4, 2, 1])).unwrap();
        ctx.append(resource_result(17, 2)).unwrap();
        let mut proposal = StageResult::pending(StageName::Proposal);
        proposal.begin_attempt();
        ctx.append(proposal.succeed(
            StageOutput::Proposal(proposal_output(sections)),
            vec![],
            vec![],
            vec![],
        ))
        .unwrap();
        ctx
    }

    #[test]
    fn sections_follow_the_template_order() {
        let mut shuffled = SectionKind::ALL.to_vec();
        shuffled.reverse();
        let doc = assemble(&full_context(&shuffled)).unwrap();

        let titles: Vec<&str> = doc.sections.iter().map(|s| s.title.as_str()).collect();
        let expected: Vec<&str> = SectionKind::ALL.iter().map(|k| k.title()).collect();
        assert_eq!(titles, expected);
        assert!(doc.sections.iter().all(|s| !s.body.is_empty()));
    }

    #[test]
    fn document_lists_use_cases_citations_and_pending() {
        let doc = assemble(&full_context(&SectionKind::ALL)).unwrap();
        assert_eq!(doc.company, "Acme");
        assert_eq!(doc.use_cases.len(), 17);
        // 6 research citations + 15 resolved resource links
        assert_eq!(doc.citations.len(), 21);
        assert_eq!(doc.pending_resources, ["Use case 16", "Use case 17"]);
    }

    #[test]
    fn citations_are_unique() {
        let doc = assemble(&full_context(&SectionKind::ALL)).unwrap();
        let mut urls: Vec<&str> = doc.citations.iter().map(|c| c.url.as_str()).collect();
        let before = urls.len();
        urls.sort_unstable();
        urls.dedup();
        assert_eq!(urls.len(), before);
    }

    #[test]
    fn assembly_is_pure() {
        let ctx = full_context(&SectionKind::ALL);
        let first = assemble(&ctx).unwrap();
        let second = assemble(&ctx).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn missing_stages_are_an_error() {
        let mut ctx = SharedContext::new(ProposalInput::new("Acme", "Retail").unwrap());
        ctx.append(research_result(6)).unwrap();
        let err = assemble(&ctx).unwrap_err();
        assert!(matches!(err, ProposalError::Assembly(_)));
    }

    #[test]
    fn missing_section_is_an_error() {
        let err = assemble(&full_context(&SectionKind::ALL[..7])).unwrap_err();
        assert!(err.to_string().contains("Next Steps"));
    }
}
