//! Feedback enrichment: optional, pluggable rewrite of the free-text sections.
//!
//! Default: `NoopEnricher` (returns the generated document untouched).
//! `LlmEnricher` personalises `summary` and `motivational_text` via the LLM.
//! Skill gaps, tips, courses and next steps are never touched, so the
//! 3+3 course and six-tip contracts hold regardless of the backend.
//!
//! The orchestrator holds an `Arc<dyn FeedbackEnricher>`, chosen at startup via config.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::generation::generator::FeedbackDocument;
use crate::generation::prompts::{ENRICH_PROMPT_TEMPLATE, ENRICH_SYSTEM};
use crate::llm_client::prompts::CANDIDATE_SAFETY_INSTRUCTION;
use crate::llm_client::LlmClient;
use crate::models::candidate::CandidateRow;

/// Longest paragraph accepted back from the model, in characters.
const MAX_PARAGRAPH_CHARS: usize = 900;

#[async_trait]
pub trait FeedbackEnricher: Send + Sync {
    /// Infallible by contract: on any internal failure, return `document` unchanged.
    async fn enrich(&self, candidate: &CandidateRow, document: FeedbackDocument)
        -> FeedbackDocument;

    fn backend(&self) -> &'static str;
}

pub struct NoopEnricher;

#[async_trait]
impl FeedbackEnricher for NoopEnricher {
    async fn enrich(
        &self,
        _candidate: &CandidateRow,
        document: FeedbackDocument,
    ) -> FeedbackDocument {
        document
    }

    fn backend(&self) -> &'static str {
        "none"
    }
}

pub struct LlmEnricher(pub LlmClient);

#[derive(Debug, Deserialize)]
struct EnrichedText {
    summary: String,
    motivational_text: String,
}

#[async_trait]
impl FeedbackEnricher for LlmEnricher {
    async fn enrich(
        &self,
        candidate: &CandidateRow,
        document: FeedbackDocument,
    ) -> FeedbackDocument {
        let prompt = build_enrich_prompt(candidate, &document);
        match self.0.call_json::<EnrichedText>(&prompt, ENRICH_SYSTEM).await {
            Ok(text) => apply_enrichment(document, text),
            Err(e) => {
                warn!(candidate_id = %candidate.id, error = %e, "Enrichment failed; using generated text");
                document
            }
        }
    }

    fn backend(&self) -> &'static str {
        "llm"
    }
}

fn build_enrich_prompt(candidate: &CandidateRow, document: &FeedbackDocument) -> String {
    ENRICH_PROMPT_TEMPLATE
        .replace("{safety_instruction}", CANDIDATE_SAFETY_INSTRUCTION)
        .replace("{candidate_name}", candidate.first_name())
        .replace("{position}", &document.position)
        .replace("{stage}", &document.rejection_stage)
        .replace(
            "{reason}",
            document.rejection_reason.as_deref().unwrap_or("not specified"),
        )
        .replace("{skill_gaps}", &document.skill_gaps.join(", "))
        .replace("{summary}", &document.summary)
        .replace("{motivational_text}", &document.motivational_text)
}

/// Accepts the model's paragraphs only when both are non-empty and bounded.
fn apply_enrichment(mut document: FeedbackDocument, text: EnrichedText) -> FeedbackDocument {
    let summary = text.summary.trim();
    let motivation = text.motivational_text.trim();
    let acceptable = |s: &str| !s.is_empty() && s.chars().count() <= MAX_PARAGRAPH_CHARS;

    if acceptable(summary) && acceptable(motivation) {
        document.summary = summary.to_string();
        document.motivational_text = motivation.to_string();
    } else {
        warn!(
            summary_chars = summary.chars().count(),
            motivation_chars = motivation.chars().count(),
            "Enrichment output rejected: empty or oversized paragraph"
        );
    }
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::generator::generate;
    use crate::testing::candidate_fixture;

    #[tokio::test]
    async fn test_noop_returns_document_unchanged() {
        let candidate = candidate_fixture("Alice", "Frontend Developer", "Technical Interview");
        let doc = generate("Frontend Developer", "Technical Interview", None);
        let enriched = NoopEnricher.enrich(&candidate, doc.clone()).await;
        assert_eq!(enriched, doc);
    }

    #[test]
    fn test_apply_enrichment_replaces_only_text_sections() {
        let doc = generate("Data Scientist", "Final Interview", None);
        let enriched = apply_enrichment(
            doc.clone(),
            EnrichedText {
                summary: " Alice, thank you. ".to_string(),
                motivational_text: "Keep going.".to_string(),
            },
        );
        assert_eq!(enriched.summary, "Alice, thank you.");
        assert_eq!(enriched.motivational_text, "Keep going.");
        assert_eq!(enriched.courses, doc.courses);
        assert_eq!(enriched.skill_gaps, doc.skill_gaps);
        assert_eq!(enriched.resume_tips, doc.resume_tips);
    }

    #[test]
    fn test_apply_enrichment_rejects_empty_or_oversized_text() {
        let doc = generate("Data Scientist", "Final Interview", None);
        let empty = apply_enrichment(
            doc.clone(),
            EnrichedText {
                summary: "   ".to_string(),
                motivational_text: "fine".to_string(),
            },
        );
        assert_eq!(empty, doc);

        let huge = apply_enrichment(
            doc.clone(),
            EnrichedText {
                summary: "x".repeat(MAX_PARAGRAPH_CHARS + 1),
                motivational_text: "fine".to_string(),
            },
        );
        assert_eq!(huge, doc);
    }

    #[test]
    fn test_prompt_carries_candidate_context() {
        let candidate = candidate_fixture("Alice Smith", "Frontend Developer", "Technical Interview");
        let doc = generate("Frontend Developer", "Technical Interview", Some("Needs depth"));
        let prompt = build_enrich_prompt(&candidate, &doc);
        assert!(prompt.contains("Candidate first name: Alice"));
        assert!(prompt.contains("Advanced React patterns"));
        assert!(prompt.contains("Needs depth"));
        assert!(!prompt.contains("{summary}"));
    }
}
