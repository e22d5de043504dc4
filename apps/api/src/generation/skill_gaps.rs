//! Skill-gap lookup: maps (position, rejection stage) to the skills a candidate
//! should strengthen.
//!
//! Free-text inputs are normalised (case and punctuation-insensitive) and parsed
//! into `Position` / `RejectionStage`. A miss at either level is a first-class
//! `SkillGapMatch::Fallback`, never an error.

use serde::{Deserialize, Serialize};

/// Generic skill gaps used whenever the lookup misses.
pub const FALLBACK_SKILL_GAPS: [&str; 4] = [
    "communication",
    "technical knowledge",
    "problem-solving",
    "industry experience",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    FrontendDeveloper,
    BackendDeveloper,
    FullStackDeveloper,
    DataScientist,
    ProductManager,
    UxDesigner,
    DevOpsEngineer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionStage {
    ResumeScreening,
    PhoneScreen,
    TechnicalInterview,
    FinalInterview,
}

/// Lowercases and strips everything but ASCII alphanumerics.
/// "Front-end Developer" and "frontend developer" both become "frontenddeveloper".
fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl Position {
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "frontenddeveloper" | "frontendengineer" | "frontenddev" | "reactdeveloper" => {
                Some(Position::FrontendDeveloper)
            }
            "backenddeveloper" | "backendengineer" | "backenddev" => {
                Some(Position::BackendDeveloper)
            }
            "fullstackdeveloper" | "fullstackengineer" | "fullstackdev" => {
                Some(Position::FullStackDeveloper)
            }
            "datascientist" => Some(Position::DataScientist),
            "productmanager" => Some(Position::ProductManager),
            "uxdesigner" | "uiuxdesigner" | "productdesigner" => Some(Position::UxDesigner),
            "devopsengineer" | "sitereliabilityengineer" | "sre" => {
                Some(Position::DevOpsEngineer)
            }
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Position::FrontendDeveloper => "Frontend Developer",
            Position::BackendDeveloper => "Backend Developer",
            Position::FullStackDeveloper => "Full Stack Developer",
            Position::DataScientist => "Data Scientist",
            Position::ProductManager => "Product Manager",
            Position::UxDesigner => "UX Designer",
            Position::DevOpsEngineer => "DevOps Engineer",
        }
    }
}

impl RejectionStage {
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize(raw).as_str() {
            "resumescreening" | "resumereview" | "cvscreening" | "screening"
            | "applicationreview" => Some(RejectionStage::ResumeScreening),
            "phonescreen" | "phoneinterview" | "recruiterscreen" | "initialscreen" => {
                Some(RejectionStage::PhoneScreen)
            }
            "technicalinterview" | "technicalassessment" | "codinginterview"
            | "technicalround" => Some(RejectionStage::TechnicalInterview),
            "finalinterview" | "finalround" | "onsite" | "onsiteinterview" => {
                Some(RejectionStage::FinalInterview)
            }
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RejectionStage::ResumeScreening => "Resume Screening",
            RejectionStage::PhoneScreen => "Phone Screen",
            RejectionStage::TechnicalInterview => "Technical Interview",
            RejectionStage::FinalInterview => "Final Interview",
        }
    }
}

/// Outcome of the two-level lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillGapMatch {
    Matched {
        position: Position,
        stage: RejectionStage,
        gaps: &'static [&'static str],
    },
    Fallback,
}

impl SkillGapMatch {
    pub fn gaps(&self) -> &'static [&'static str] {
        match self {
            SkillGapMatch::Matched { gaps, .. } => gaps,
            SkillGapMatch::Fallback => &FALLBACK_SKILL_GAPS,
        }
    }
}

/// Looks up skill gaps for free-text position and stage.
pub fn lookup_skill_gaps(position: &str, stage: &str) -> SkillGapMatch {
    let (Some(position), Some(stage)) = (Position::parse(position), RejectionStage::parse(stage))
    else {
        return SkillGapMatch::Fallback;
    };
    SkillGapMatch::Matched {
        position,
        stage,
        gaps: skill_gap_table(position, stage),
    }
}

fn skill_gap_table(position: Position, stage: RejectionStage) -> &'static [&'static str] {
    use Position::*;
    use RejectionStage::*;

    match (position, stage) {
        (FrontendDeveloper, ResumeScreening) => &[
            "Portfolio presentation",
            "Modern framework experience",
            "Responsive design",
        ],
        (FrontendDeveloper, PhoneScreen) => &[
            "JavaScript fundamentals",
            "Communicating technical decisions",
            "Project impact storytelling",
        ],
        (FrontendDeveloper, TechnicalInterview) => &[
            "Advanced React patterns",
            "State management",
            "Web performance optimization",
            "Testing practices",
        ],
        (FrontendDeveloper, FinalInterview) => &[
            "Frontend system design",
            "Cross-team collaboration",
            "Product thinking",
        ],
        (BackendDeveloper, ResumeScreening) => &[
            "Production system experience",
            "Cloud platform exposure",
            "Quantified project outcomes",
        ],
        (BackendDeveloper, PhoneScreen) => &[
            "API design",
            "Explaining architecture trade-offs",
            "Core language depth",
        ],
        (BackendDeveloper, TechnicalInterview) => &[
            "System design",
            "Database optimization",
            "Concurrency",
            "API design",
        ],
        (BackendDeveloper, FinalInterview) => &[
            "Technical leadership",
            "Incident ownership",
            "Stakeholder communication",
        ],
        (FullStackDeveloper, ResumeScreening) => &[
            "End-to-end project showcase",
            "Modern framework experience",
            "Deployment experience",
        ],
        (FullStackDeveloper, PhoneScreen) => &[
            "Communicating technical decisions",
            "Breadth across the stack",
            "Project impact storytelling",
        ],
        (FullStackDeveloper, TechnicalInterview) => &[
            "System design",
            "State management",
            "Database optimization",
            "Testing practices",
        ],
        (FullStackDeveloper, FinalInterview) => &[
            "Product thinking",
            "Cross-team collaboration",
            "Technical leadership",
        ],
        (DataScientist, ResumeScreening) => &[
            "Applied machine learning projects",
            "SQL proficiency",
            "Quantified project outcomes",
        ],
        (DataScientist, PhoneScreen) => &[
            "Statistics fundamentals",
            "Explaining models to non-experts",
            "Business framing",
        ],
        (DataScientist, TechnicalInterview) => &[
            "Statistical modeling",
            "Machine learning fundamentals",
            "SQL proficiency",
            "Data visualization",
        ],
        (DataScientist, FinalInterview) => &[
            "Experiment design",
            "Business framing",
            "Stakeholder communication",
        ],
        (ProductManager, ResumeScreening) => &[
            "Quantified product outcomes",
            "Ownership of launches",
            "Domain experience",
        ],
        (ProductManager, PhoneScreen) => &[
            "Structured communication",
            "Customer empathy",
            "Prioritization",
        ],
        (ProductManager, TechnicalInterview) => &[
            "Product sense",
            "Metrics and analytics",
            "Prioritization",
            "Technical fluency",
        ],
        (ProductManager, FinalInterview) => &[
            "Strategic thinking",
            "Stakeholder communication",
            "Leadership presence",
        ],
        (UxDesigner, ResumeScreening) => &[
            "Portfolio presentation",
            "Case study depth",
            "Research methods",
        ],
        (UxDesigner, PhoneScreen) => &[
            "User research",
            "Design rationale communication",
            "Collaboration with engineering",
        ],
        (UxDesigner, TechnicalInterview) => &[
            "Interaction design",
            "Design systems",
            "Usability testing",
            "Prototyping",
        ],
        (UxDesigner, FinalInterview) => &[
            "Design leadership",
            "Stakeholder communication",
            "Product thinking",
        ],
        (DevOpsEngineer, ResumeScreening) => &[
            "Infrastructure as code",
            "Cloud platform exposure",
            "Quantified reliability outcomes",
        ],
        (DevOpsEngineer, PhoneScreen) => &[
            "Linux fundamentals",
            "Incident communication",
            "Automation mindset",
        ],
        (DevOpsEngineer, TechnicalInterview) => &[
            "Kubernetes operations",
            "CI/CD pipeline design",
            "Observability",
            "Infrastructure as code",
        ],
        (DevOpsEngineer, FinalInterview) => &[
            "Incident ownership",
            "Reliability strategy",
            "Cross-team collaboration",
        ],
    }
}
