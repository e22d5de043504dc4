pub mod branding;
pub mod html;
pub mod logo;
pub mod metrics;
pub mod pdf;

use bytes::Bytes;
use thiserror::Error;

use crate::generation::generator::FeedbackDocument;
use crate::models::candidate::CandidateRow;
use crate::render::branding::{BrandingContext, LogoAsset, Rgb};
use crate::render::logo::{inspect_logo, JpegInfo};
use crate::tracking::links::TrackingLinks;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid color: {0:?}")]
    InvalidColor(String),

    #[error("logo too large: {0}")]
    LogoTooLarge(String),

    #[error("unsupported logo: {0}")]
    UnsupportedLogo(String),

    #[error("pdf assembly failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("pdf write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Output of one render: email bodies plus the linked PDF.
#[derive(Debug, Clone)]
pub struct RenderedFeedback {
    pub subject: String,
    pub email_html: String,
    pub email_text: String,
    pub pdf_bytes: Bytes,
}

/// Where rendered links point. With tracking set, every outbound link goes
/// through the click redirect and the HTML carries an open pixel.
#[derive(Debug, Clone)]
pub struct DeliveryLinks {
    pub pdf_url: String,
    pub tracking: Option<TrackingLinks>,
}

impl DeliveryLinks {
    pub fn href(&self, target: &str) -> String {
        match &self.tracking {
            Some(tracking) => tracking.click_url(target),
            None => target.to_string(),
        }
    }
}

/// Every URL a rendered email or PDF links to, in first-seen order.
pub fn link_targets(branding: &BrandingContext, doc: &FeedbackDocument, pdf_url: &str) -> Vec<String> {
    let links = &branding.links;
    let ctas = [
        links.resume_fix_url.as_str(),
        links.learning_url.as_str(),
        links.reapply_url.as_str(),
        pdf_url,
    ];
    let courses = doc.courses.free.iter().chain(&doc.courses.paid).map(|c| c.url.as_str());

    let mut targets: Vec<String> = Vec::new();
    for url in ctas.into_iter().chain(courses) {
        if !targets.iter().any(|t| t == url) {
            targets.push(url.to_string());
        }
    }
    targets
}

/// Branding with colors parsed and the logo validated.
pub struct Theme<'a> {
    pub branding: &'a BrandingContext,
    pub primary: Rgb,
    pub secondary: Rgb,
    pub logo: Option<(&'a LogoAsset, JpegInfo)>,
}

impl<'a> Theme<'a> {
    pub fn resolve(branding: &'a BrandingContext) -> Result<Self, RenderError> {
        let logo = match &branding.logo {
            Some(asset) => Some((asset, inspect_logo(&asset.bytes)?)),
            None => None,
        };
        Ok(Self {
            branding,
            primary: Rgb::parse_hex(&branding.primary_color)?,
            secondary: Rgb::parse_hex(&branding.secondary_color)?,
            logo,
        })
    }
}

pub fn email_subject(branding: &BrandingContext, doc: &FeedbackDocument) -> String {
    format!(
        "Your feedback from {} on the {} role",
        branding.company_name, doc.position
    )
}

/// Renders the email bodies and the two-page PDF. CPU-bound; call from
/// `spawn_blocking` in async contexts.
pub fn render(
    candidate: &CandidateRow,
    branding: &BrandingContext,
    doc: &FeedbackDocument,
    links: &DeliveryLinks,
) -> Result<RenderedFeedback, RenderError> {
    let theme = Theme::resolve(branding)?;
    let pdf_bytes = pdf::render_pdf(&theme, candidate, doc, links)?;
    Ok(RenderedFeedback {
        subject: email_subject(branding, doc),
        email_html: html::render_email_html(&theme, candidate, doc, links),
        email_text: html::render_email_text(&theme, candidate, doc, links),
        pdf_bytes: Bytes::from(pdf_bytes),
    })
}
