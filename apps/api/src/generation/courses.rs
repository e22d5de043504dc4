//! Course catalog and recommendation.
//!
//! Recommendations are always exactly `COURSES_PER_TIER` free and
//! `COURSES_PER_TIER` paid: skill-matched courses first, padded from the generic
//! fallback lists, truncated if the matches overshoot.

use serde::{Deserialize, Serialize};

pub const COURSES_PER_TIER: usize = 3;
/// Only the first N skill gaps drive course matching.
const MATCHED_SKILLS: usize = 2;
/// Per matched skill, at most this many courses of each tier.
const COURSES_PER_SKILL: usize = 2;

/// Domains whose links count as course click-throughs. Matched by substring.
pub const COURSE_PROVIDER_DOMAINS: &[&str] = &[
    "coursera.org",
    "udemy.com",
    "edx.org",
    "linkedin.com/learning",
    "pluralsight.com",
    "khanacademy.org",
    "freecodecamp.org",
    "codecademy.com",
    "udacity.com",
    "frontendmasters.com",
];

/// Substring match against `COURSE_PROVIDER_DOMAINS`; deliberately not a URL parse.
pub fn is_course_provider_url(url: &str) -> bool {
    let lowered = url.to_ascii_lowercase();
    COURSE_PROVIDER_DOMAINS
        .iter()
        .any(|domain| lowered.contains(domain))
}

struct CatalogCourse {
    title: &'static str,
    provider: &'static str,
    url: &'static str,
    /// `None` for free courses.
    price: Option<&'static str>,
}

const fn free(title: &'static str, provider: &'static str, url: &'static str) -> CatalogCourse {
    CatalogCourse {
        title,
        provider,
        url,
        price: None,
    }
}

const fn paid(
    title: &'static str,
    provider: &'static str,
    url: &'static str,
    price: &'static str,
) -> CatalogCourse {
    CatalogCourse {
        title,
        provider,
        url,
        price: Some(price),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecommendation {
    pub title: String,
    pub provider: String,
    pub url: String,
    /// Skill gap this course addresses; `None` for generic fallback courses.
    pub skill: Option<String>,
    pub is_free: bool,
    pub price: Option<String>,
}

impl CourseRecommendation {
    fn from_catalog(course: &CatalogCourse, skill: Option<&str>) -> Self {
        Self {
            title: course.title.to_string(),
            provider: course.provider.to_string(),
            url: course.url.to_string(),
            skill: skill.map(str::to_string),
            is_free: course.price.is_none(),
            price: course.price.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecommendations {
    pub free: Vec<CourseRecommendation>,
    pub paid: Vec<CourseRecommendation>,
}

const FALLBACK_FREE: &[CatalogCourse] = &[
    free(
        "Learning How to Learn",
        "Coursera",
        "https://www.coursera.org/learn/learning-how-to-learn",
    ),
    free(
        "Career Essentials in Soft Skills",
        "LinkedIn Learning",
        "https://www.linkedin.com/learning/paths/career-essentials-in-soft-skills",
    ),
    free(
        "Computer Science for Everyone",
        "Khan Academy",
        "https://www.khanacademy.org/computing/computer-science",
    ),
];

const FALLBACK_PAID: &[CatalogCourse] = &[
    paid(
        "Successful Negotiation: Essential Strategies and Skills",
        "Coursera",
        "https://www.coursera.org/learn/negotiation-skills",
        "$49/month",
    ),
    paid(
        "The Complete Job Interview Masterclass",
        "Udemy",
        "https://www.udemy.com/course/job-interview-masterclass/",
        "$19.99",
    ),
    paid(
        "Professional Certificate in Career Development",
        "edX",
        "https://www.edx.org/certificates/professional-certificate/career-development",
        "$199",
    ),
];

const ADVANCED_REACT: &[CatalogCourse] = &[
    free(
        "React Docs: Thinking in React",
        "react.dev",
        "https://react.dev/learn/thinking-in-react",
    ),
    free(
        "Front End Development Libraries",
        "freeCodeCamp",
        "https://www.freecodecamp.org/learn/front-end-development-libraries/",
    ),
    paid(
        "Advanced React Patterns",
        "Frontend Masters",
        "https://frontendmasters.com/courses/advanced-react-patterns/",
        "$39/month",
    ),
    paid(
        "React - The Complete Guide",
        "Udemy",
        "https://www.udemy.com/course/react-the-complete-guide-incl-redux/",
        "$19.99",
    ),
];

const STATE_MANAGEMENT: &[CatalogCourse] = &[
    free(
        "Redux Essentials",
        "redux.js.org",
        "https://redux.js.org/tutorials/essentials/part-1-overview-concepts",
    ),
    paid(
        "State Management in Pure React",
        "Frontend Masters",
        "https://frontendmasters.com/courses/pure-react-state/",
        "$39/month",
    ),
];

const JAVASCRIPT: &[CatalogCourse] = &[
    free(
        "JavaScript Algorithms and Data Structures",
        "freeCodeCamp",
        "https://www.freecodecamp.org/learn/javascript-algorithms-and-data-structures-v8/",
    ),
    paid(
        "The Complete JavaScript Course",
        "Udemy",
        "https://www.udemy.com/course/the-complete-javascript-course/",
        "$19.99",
    ),
];

const SYSTEM_DESIGN: &[CatalogCourse] = &[
    free(
        "Grokking Modern System Design (Intro)",
        "Educative",
        "https://www.educative.io/courses/grokking-the-system-design-interview",
    ),
    free(
        "Distributed Systems Lecture Series",
        "MIT OpenCourseWare",
        "https://ocw.mit.edu/courses/6-824-distributed-computer-systems-engineering-spring-2006/",
    ),
    paid(
        "Software Architecture & Design of Modern Large Scale Systems",
        "Udemy",
        "https://www.udemy.com/course/software-architecture-design-of-modern-large-scale-systems/",
        "$19.99",
    ),
];

const SQL: &[CatalogCourse] = &[
    free(
        "Relational Databases",
        "freeCodeCamp",
        "https://www.freecodecamp.org/learn/relational-database/",
    ),
    free(
        "Intro to SQL",
        "Khan Academy",
        "https://www.khanacademy.org/computing/computer-programming/sql",
    ),
    paid(
        "SQL for Data Science",
        "Coursera",
        "https://www.coursera.org/learn/sql-for-data-science",
        "$49/month",
    ),
];

const API_DESIGN: &[CatalogCourse] = &[
    free(
        "APIs and Microservices",
        "freeCodeCamp",
        "https://www.freecodecamp.org/learn/back-end-development-and-apis/",
    ),
    paid(
        "API Design and Fundamentals of Google Cloud's Apigee",
        "Coursera",
        "https://www.coursera.org/learn/api-design-apigee-gcp",
        "$49/month",
    ),
];

const STATISTICS: &[CatalogCourse] = &[
    free(
        "Statistics and Probability",
        "Khan Academy",
        "https://www.khanacademy.org/math/statistics-probability",
    ),
    paid(
        "Statistics with Python Specialization",
        "Coursera",
        "https://www.coursera.org/specializations/statistics-with-python",
        "$49/month",
    ),
];

const MACHINE_LEARNING: &[CatalogCourse] = &[
    free(
        "Machine Learning Crash Course",
        "Google",
        "https://developers.google.com/machine-learning/crash-course",
    ),
    paid(
        "Machine Learning Specialization",
        "Coursera",
        "https://www.coursera.org/specializations/machine-learning-introduction",
        "$49/month",
    ),
];

const PRODUCT: &[CatalogCourse] = &[
    free(
        "Digital Product Management",
        "edX",
        "https://www.edx.org/learn/product-management",
    ),
    paid(
        "Digital Product Management Specialization",
        "Coursera",
        "https://www.coursera.org/specializations/uva-darden-digital-product-management",
        "$49/month",
    ),
];

const UX_DESIGN: &[CatalogCourse] = &[
    free(
        "Introduction to User Experience Design",
        "Coursera",
        "https://www.coursera.org/learn/user-experience-design",
    ),
    paid(
        "Google UX Design Professional Certificate",
        "Coursera",
        "https://www.coursera.org/professional-certificates/google-ux-design",
        "$49/month",
    ),
];

const PLATFORM: &[CatalogCourse] = &[
    free(
        "Introduction to Kubernetes",
        "edX",
        "https://www.edx.org/learn/kubernetes/the-linux-foundation-introduction-to-kubernetes",
    ),
    paid(
        "Certified Kubernetes Administrator with Practice Tests",
        "Udemy",
        "https://www.udemy.com/course/certified-kubernetes-administrator-with-practice-tests/",
        "$19.99",
    ),
];

const COMMUNICATION: &[CatalogCourse] = &[
    free(
        "Improving Communication Skills",
        "Coursera",
        "https://www.coursera.org/learn/wharton-communication-skills",
    ),
    paid(
        "Communication Foundations",
        "LinkedIn Learning",
        "https://www.linkedin.com/learning/communication-foundations-2018",
        "$39.99/month",
    ),
];

const FUNDAMENTALS: &[CatalogCourse] = &[
    free(
        "CS50's Introduction to Computer Science",
        "edX",
        "https://www.edx.org/learn/computer-science/harvard-university-cs50-s-introduction-to-computer-science",
    ),
    paid(
        "Algorithms Specialization",
        "Coursera",
        "https://www.coursera.org/specializations/algorithms",
        "$49/month",
    ),
];

fn catalog_for(skill: &str) -> &'static [CatalogCourse] {
    match skill {
        "Advanced React patterns" => ADVANCED_REACT,
        "State management" => STATE_MANAGEMENT,
        "JavaScript fundamentals" | "Modern framework experience" => JAVASCRIPT,
        "System design" | "Frontend system design" => SYSTEM_DESIGN,
        "Database optimization" | "SQL proficiency" => SQL,
        "API design" => API_DESIGN,
        "Statistical modeling" | "Statistics fundamentals" => STATISTICS,
        "Machine learning fundamentals" | "Applied machine learning projects" => {
            MACHINE_LEARNING
        }
        "Product sense" | "Metrics and analytics" | "Prioritization" => PRODUCT,
        "Interaction design" | "Design systems" | "Portfolio presentation" => UX_DESIGN,
        "Kubernetes operations" | "CI/CD pipeline design" | "Infrastructure as code" => {
            PLATFORM
        }
        "communication" | "Stakeholder communication" | "Communicating technical decisions" => {
            COMMUNICATION
        }
        "technical knowledge" | "problem-solving" => FUNDAMENTALS,
        _ => &[],
    }
}

/// Recommends exactly 3 free and 3 paid courses for the given skill gaps.
pub fn recommend_courses(skill_gaps: &[String]) -> CourseRecommendations {
    let mut free_courses = Vec::new();
    let mut paid_courses = Vec::new();

    for skill in skill_gaps.iter().take(MATCHED_SKILLS) {
        let catalog = catalog_for(skill);
        free_courses.extend(
            catalog
                .iter()
                .filter(|c| c.price.is_none())
                .take(COURSES_PER_SKILL)
                .map(|c| CourseRecommendation::from_catalog(c, Some(skill))),
        );
        paid_courses.extend(
            catalog
                .iter()
                .filter(|c| c.price.is_some())
                .take(COURSES_PER_SKILL)
                .map(|c| CourseRecommendation::from_catalog(c, Some(skill))),
        );
    }

    CourseRecommendations {
        free: settle_tier(free_courses, FALLBACK_FREE),
        paid: settle_tier(paid_courses, FALLBACK_PAID),
    }
}

/// Drops duplicate URLs, pads from `fallback`, and truncates to exactly
/// `COURSES_PER_TIER`.
fn settle_tier(
    matched: Vec<CourseRecommendation>,
    fallback: &[CatalogCourse],
) -> Vec<CourseRecommendation> {
    let mut tier: Vec<CourseRecommendation> = Vec::with_capacity(COURSES_PER_TIER);
    for course in matched {
        if !tier.iter().any(|c| c.url == course.url) {
            tier.push(course);
        }
    }
    tier.truncate(COURSES_PER_TIER);

    for course in fallback {
        if tier.len() >= COURSES_PER_TIER {
            break;
        }
        if !tier.iter().any(|c| c.url == course.url) {
            tier.push(CourseRecommendation::from_catalog(course, None));
        }
    }

    // Every fallback URL was already taken; repeat the first so the count holds.
    while tier.len() < COURSES_PER_TIER {
        tier.push(CourseRecommendation::from_catalog(&fallback[0], None));
    }
    tier
}
