// Prompts for the optional feedback enrichment step.

pub const ENRICH_SYSTEM: &str = "You are an empathetic recruiting coordinator who writes \
    constructive rejection feedback. You MUST respond with valid JSON only, with exactly \
    the keys \"summary\" and \"motivational_text\".";

/// Placeholders: {safety_instruction}, {candidate_name}, {position}, {stage},
/// {reason}, {skill_gaps}, {summary}, {motivational_text}
pub const ENRICH_PROMPT_TEMPLATE: &str = r#"
{safety_instruction}

Rewrite the two feedback paragraphs below so they read as personal to the candidate.
Keep each paragraph under 90 words. Keep every factual statement; add none.

Candidate first name: {candidate_name}
Role: {position}
Stage reached: {stage}
Reason for the decision: {reason}
Skills to strengthen: {skill_gaps}

Current summary:
{summary}

Current motivational message:
{motivational_text}

Respond with JSON: {"summary": "...", "motivational_text": "..."}
"#;
