//! Email body: inline-styled HTML plus a plain-text alternative.

use std::fmt::Write;

use crate::generation::generator::FeedbackDocument;
use crate::models::candidate::CandidateRow;
use crate::render::{DeliveryLinks, Theme};

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn cta_button(href: &str, label: &str, color: &str) -> String {
    format!(
        r#"<a href="{href}" style="display:inline-block;margin:4px 6px 4px 0;padding:10px 18px;background:{color};color:#ffffff;text-decoration:none;border-radius:6px;font-weight:bold;font-size:14px">{label}</a>"#,
        href = escape_html(href),
        label = escape_html(label),
    )
}

pub fn render_email_html(
    theme: &Theme<'_>,
    candidate: &CandidateRow,
    doc: &FeedbackDocument,
    links: &DeliveryLinks,
) -> String {
    let primary = theme.primary.to_hex();
    let secondary = theme.secondary.to_hex();
    let branding = theme.branding;
    let mut html = String::new();

    // write! into a String cannot fail
    let _ = write!(
        html,
        r#"<!DOCTYPE html><html><body style="margin:0;padding:0;background:#f3f4f6;font-family:Helvetica,Arial,sans-serif;color:#1f2937"><table role="presentation" width="100%" cellpadding="0" cellspacing="0"><tr><td align="center" style="padding:24px"><table role="presentation" width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:8px;overflow:hidden"><tr><td style="background:{primary};padding:20px 28px;color:#ffffff;font-size:20px;font-weight:bold">"#,
    );
    match &theme.logo {
        Some((logo, _)) => {
            let _ = write!(
                html,
                r#"<img src="{}" alt="{}" style="max-height:40px;vertical-align:middle">"#,
                escape_html(&logo.url),
                escape_html(&branding.company_name)
            );
        }
        None => html.push_str(&escape_html(&branding.company_name)),
    }
    html.push_str(r#"</td></tr><tr><td style="padding:28px">"#);

    let _ = write!(
        html,
        r#"<p style="font-size:16px;margin:0 0 16px">Hi {},</p><p style="font-size:14px;line-height:1.6;margin:0 0 16px">{}</p>"#,
        escape_html(candidate.first_name()),
        escape_html(&doc.summary)
    );
    let _ = write!(
        html,
        r#"<p style="font-size:14px;line-height:1.6;margin:0 0 20px;padding-left:12px;border-left:4px solid {secondary};font-style:italic">{}</p>"#,
        escape_html(&doc.motivational_text)
    );

    if !doc.skill_gaps.is_empty() {
        let _ = write!(
            html,
            r#"<p style="font-size:15px;font-weight:bold;color:{primary};margin:0 0 8px">Skills to strengthen</p><ul style="margin:0 0 20px;padding-left:20px;font-size:14px;line-height:1.6">"#
        );
        for gap in &doc.skill_gaps {
            let _ = write!(html, "<li>{}</li>", escape_html(gap));
        }
        html.push_str("</ul>");
    }

    html.push_str(r#"<div style="margin:0 0 20px">"#);
    html.push_str(&cta_button(
        &links.href(&branding.links.resume_fix_url),
        "Fix my resume",
        &primary,
    ));
    html.push_str(&cta_button(
        &links.href(&branding.links.learning_url),
        "Start learning",
        &secondary,
    ));
    html.push_str(&cta_button(
        &links.href(&branding.links.reapply_url),
        "Reapply",
        &primary,
    ));
    html.push_str("</div>");

    let _ = write!(
        html,
        r#"<p style="font-size:14px;margin:0 0 20px">Your full report, with course recommendations and next steps, is available at the link below.</p><p style="font-size:14px;margin:0 0 20px"><a href="{}" style="color:{primary}">View your full feedback report (PDF)</a></p>"#,
        escape_html(&links.href(&links.pdf_url))
    );
    let _ = write!(
        html,
        r#"<p style="font-size:12px;color:#6b7280;border-top:1px solid {secondary};padding-top:12px;margin:0">{}</p></td></tr></table></td></tr></table>"#,
        escape_html(&branding.footer_message)
    );
    if let Some(tracking) = &links.tracking {
        let _ = write!(
            html,
            r#"<img src="{}" width="1" height="1" alt="" style="display:block;border:0">"#,
            escape_html(&tracking.open_pixel_url())
        );
    }
    html.push_str("</body></html>");
    html
}

pub fn render_email_text(
    theme: &Theme<'_>,
    candidate: &CandidateRow,
    doc: &FeedbackDocument,
    links: &DeliveryLinks,
) -> String {
    let branding = theme.branding;
    let mut text = String::new();
    let _ = writeln!(text, "Hi {},\n", candidate.first_name());
    let _ = writeln!(text, "{}\n", doc.summary);
    let _ = writeln!(text, "{}\n", doc.motivational_text);
    if !doc.skill_gaps.is_empty() {
        text.push_str("Skills to strengthen:\n");
        for gap in &doc.skill_gaps {
            let _ = writeln!(text, "  - {gap}");
        }
        text.push('\n');
    }
    let _ = writeln!(text, "Fix my resume: {}", links.href(&branding.links.resume_fix_url));
    let _ = writeln!(text, "Start learning: {}", links.href(&branding.links.learning_url));
    let _ = writeln!(text, "Reapply: {}\n", links.href(&branding.links.reapply_url));
    let _ = writeln!(text, "Full report: {}\n", links.href(&links.pdf_url));
    let _ = writeln!(text, "-- \n{}\n{}", branding.company_name, branding.footer_message);
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::generator::generate;
    use crate::render::branding::BrandingContext;
    use crate::testing::{candidate_fixture, company_fixture};

    #[test]
    fn test_email_links_to_the_report_instead_of_attaching_it() {
        let candidate = candidate_fixture("Ada Lovelace", "Frontend Developer", "Technical Interview");
        let doc = generate("Frontend Developer", "Technical Interview", None);
        let branding = BrandingContext::from_company(&company_fixture(), None);
        let theme = Theme::resolve(&branding).unwrap();
        let links = DeliveryLinks {
            pdf_url: "https://cdn.example/feedback/report.pdf".to_string(),
            tracking: None,
        };

        let html = render_email_html(&theme, &candidate, &doc, &links);
        let text = render_email_text(&theme, &candidate, &doc, &links);

        assert!(!html.contains("attached"));
        assert!(!text.contains("attached"));
        assert!(html.contains(r#"href="https://cdn.example/feedback/report.pdf""#));
        assert!(text.contains("Full report: https://cdn.example/feedback/report.pdf"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }
}
