//! Company branding as the renderer sees it.

use bytes::Bytes;
use serde::Serialize;

use crate::models::company::CompanyRow;
use crate::render::RenderError;

pub const DEFAULT_PRIMARY_COLOR: &str = "#4F46E5";
pub const DEFAULT_SECONDARY_COLOR: &str = "#10B981";
pub const DEFAULT_RESUME_FIX_URL: &str = "https://www.resumeworded.com";
pub const DEFAULT_LEARNING_URL: &str = "https://www.coursera.org";
pub const DEFAULT_REAPPLY_URL: &str = "https://www.linkedin.com/jobs";
pub const DEFAULT_FOOTER_MESSAGE: &str =
    "This feedback was prepared to help you grow. We wish you every success in your search.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 255,
    };
    pub const INK: Rgb = Rgb {
        r: 31,
        g: 41,
        b: 55,
    };
    pub const MUTED: Rgb = Rgb {
        r: 107,
        g: 114,
        b: 128,
    };

    /// Parses `#RGB` or `#RRGGBB` (leading `#` optional, case-insensitive).
    pub fn parse_hex(raw: &str) -> Result<Self, RenderError> {
        let invalid = || RenderError::InvalidColor(raw.to_string());
        let hex = raw.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let expand = |i: usize| channel(&hex[i..i + 1].repeat(2));
                Ok(Rgb {
                    r: expand(0)?,
                    g: expand(1)?,
                    b: expand(2)?,
                })
            }
            6 => Ok(Rgb {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
            }),
            _ => Err(invalid()),
        }
    }

    /// Mixes toward white; `amount` 0.0 keeps the color, 1.0 is white.
    pub fn tint(&self, amount: f32) -> Rgb {
        let amount = amount.clamp(0.0, 1.0);
        let mix = |c: u8| (c as f32 + (255.0 - c as f32) * amount).round() as u8;
        Rgb {
            r: mix(self.r),
            g: mix(self.g),
            b: mix(self.b),
        }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Components in 0.0–1.0 for PDF color operators.
    pub fn unit(&self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }
}

/// Company logo: public URL for email, raw bytes for the PDF.
#[derive(Debug, Clone)]
pub struct LogoAsset {
    pub url: String,
    pub bytes: Bytes,
}

/// The three call-to-action targets on page one and in the email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CtaLinks {
    pub resume_fix_url: String,
    pub learning_url: String,
    pub reapply_url: String,
}

impl Default for CtaLinks {
    fn default() -> Self {
        Self {
            resume_fix_url: DEFAULT_RESUME_FIX_URL.to_string(),
            learning_url: DEFAULT_LEARNING_URL.to_string(),
            reapply_url: DEFAULT_REAPPLY_URL.to_string(),
        }
    }
}

/// Everything the renderer needs from the company, passed explicitly.
/// Colors stay raw strings so bad settings surface as `RenderError` at render time.
#[derive(Debug, Clone)]
pub struct BrandingContext {
    pub company_name: String,
    pub primary_color: String,
    pub secondary_color: String,
    pub logo: Option<LogoAsset>,
    pub links: CtaLinks,
    pub footer_message: String,
}

fn configured(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

impl BrandingContext {
    pub fn from_company(company: &CompanyRow, logo: Option<LogoAsset>) -> Self {
        Self {
            company_name: company.name.clone(),
            primary_color: company.primary_color.clone(),
            secondary_color: company.secondary_color.clone(),
            logo,
            links: CtaLinks {
                resume_fix_url: configured(&company.resume_fix_url, DEFAULT_RESUME_FIX_URL),
                learning_url: configured(&company.learning_url, DEFAULT_LEARNING_URL),
                reapply_url: configured(&company.reapply_url, DEFAULT_REAPPLY_URL),
            },
            footer_message: configured(&company.footer_message, DEFAULT_FOOTER_MESSAGE),
        }
    }

    /// Safe branding for the retry after a `RenderError`: default colors, no logo.
    pub fn fallback(&self) -> Self {
        Self {
            company_name: self.company_name.clone(),
            primary_color: DEFAULT_PRIMARY_COLOR.to_string(),
            secondary_color: DEFAULT_SECONDARY_COLOR.to_string(),
            logo: None,
            links: self.links.clone(),
            footer_message: self.footer_message.clone(),
        }
    }
}
