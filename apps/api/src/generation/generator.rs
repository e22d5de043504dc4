//! Feedback generation: turns a rejection into a structured `FeedbackDocument`.
//!
//! Flow: lookup_skill_gaps → recommend_courses → assemble text sections.
//!
//! Pure and deterministic: no I/O, no clock, no randomness. All persistence and
//! optional LLM enrichment happen in the delivery orchestrator.

use serde::{Deserialize, Serialize};

use crate::generation::courses::{recommend_courses, CourseRecommendations};
use crate::generation::skill_gaps::{lookup_skill_gaps, SkillGapMatch};
use crate::models::candidate::CandidateRow;

/// Stage-independent resume advice. Downstream rendering relies on there being six.
pub const RESUME_TIPS: [&str; 6] = [
    "Lead each bullet with a strong action verb and end it with a measurable result.",
    "Tailor your summary and skills section to the keywords in each job description.",
    "Keep the resume to one or two pages and cut roles older than 10-15 years.",
    "Link to a portfolio, GitHub profile or case studies that show your work.",
    "Use a clean single-column layout so applicant tracking systems can parse it.",
    "Quantify impact wherever you can: users served, time saved, revenue or cost moved.",
];

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillGapSource {
    Matched,
    Fallback,
}

/// Structured, unrendered feedback for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackDocument {
    /// Display label for the role (canonical when matched, trimmed input otherwise).
    pub position: String,
    pub rejection_stage: String,
    pub summary: String,
    pub rejection_reason: Option<String>,
    pub skill_gaps: Vec<String>,
    pub skill_gap_source: SkillGapSource,
    pub motivational_text: String,
    pub resume_tips: Vec<String>,
    pub courses: CourseRecommendations,
    pub next_steps: Vec<String>,
}

/// Request body for the generation preview endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub position: String,
    pub rejection_stage: String,
    pub rejection_reason: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Generation
// ────────────────────────────────────────────────────────────────────────────

/// Generates feedback for a rejection. Never fails: unknown roles or stages get
/// the generic skill-gap set.
pub fn generate(
    position: &str,
    rejection_stage: &str,
    rejection_reason: Option<&str>,
) -> FeedbackDocument {
    let lookup = lookup_skill_gaps(position, rejection_stage);

    let (position_label, stage_label, source) = match &lookup {
        SkillGapMatch::Matched { position, stage, .. } => (
            position.label().to_string(),
            stage.label().to_string(),
            SkillGapSource::Matched,
        ),
        SkillGapMatch::Fallback => (
            display_or(position, "this"),
            display_or(rejection_stage, "interview"),
            SkillGapSource::Fallback,
        ),
    };

    let skill_gaps: Vec<String> = lookup.gaps().iter().map(|s| s.to_string()).collect();
    let courses = recommend_courses(&skill_gaps);
    let rejection_reason = rejection_reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    FeedbackDocument {
        summary: build_summary(&position_label, &stage_label, rejection_reason.as_deref()),
        motivational_text: build_motivation(&stage_label),
        next_steps: build_next_steps(&skill_gaps),
        resume_tips: RESUME_TIPS.iter().map(|t| t.to_string()).collect(),
        position: position_label,
        rejection_stage: stage_label,
        rejection_reason,
        skill_gaps,
        skill_gap_source: source,
        courses,
    }
}

/// Convenience wrapper over `generate` for a stored candidate.
pub fn generate_for(candidate: &CandidateRow) -> FeedbackDocument {
    generate(
        &candidate.position,
        &candidate.rejection_stage,
        candidate.rejection_reason.as_deref(),
    )
}

fn display_or(raw: &str, default: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

fn build_summary(position: &str, stage: &str, reason: Option<&str>) -> String {
    let mut summary = format!(
        "Thank you for the time you invested in applying for the {position} role. \
        You progressed to the {stage} stage, and we want to share specific, practical \
        feedback to help with your next application."
    );
    if let Some(reason) = reason {
        let reason = reason.trim_end_matches('.');
        summary.push_str(&format!(" The main reason we did not move forward: {reason}."));
    }
    summary
}

fn build_motivation(stage: &str) -> String {
    format!(
        "Reaching the {stage} stage means your profile stood out among many applicants. \
        The gaps below are learnable, and candidates who close them often come back much \
        stronger. We would genuinely welcome a future application from you."
    )
}

fn build_next_steps(skill_gaps: &[String]) -> Vec<String> {
    let focus = skill_gaps
        .first()
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| "one skill gap".to_string());
    vec![
        format!("Start with {focus}: block out focused practice time over the next 4-6 weeks."),
        "Enroll in one of the free courses in this report and finish it before starting another."
            .to_string(),
        "Update your resume using the tips in this report, then ask a peer to review it."
            .to_string(),
        "Keep an eye on our careers page and reapply when you feel ready.".to_string(),
    ]
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
