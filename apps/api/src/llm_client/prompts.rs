// Cross-cutting prompt fragments. Feature-specific prompts live next to the
// feature (see generation/prompts.rs).

/// Guardrail appended to every candidate-facing prompt.
pub const CANDIDATE_SAFETY_INSTRUCTION: &str = "\
    CRITICAL: You are writing to a real job candidate who was not hired. \
    Be warm, specific and honest. Do NOT invent details about the candidate, the \
    interview, or the company that are not in the provided context. Do NOT promise \
    a future offer. Do NOT mention protected characteristics.";
