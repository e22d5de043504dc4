// Content generation: stage-aware skill gaps, tiered course picks, resume
// tips and next steps. Deterministic; the optional enrichment pass only
// rewrites the two free-text paragraphs.

pub mod courses;
pub mod enrich;
pub mod generator;
pub mod handlers;
pub mod prompts;
pub mod skill_gaps;
