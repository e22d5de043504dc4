//! Two-page A4 feedback report built directly with lopdf.
//!
//! Page 1: branded header, summary, motivation, skill gaps, resume tips, CTAs.
//! Page 2: free and premium course cards, next steps, footer.
//!
//! Coordinates are PDF points with the origin bottom-left. A `Canvas` collects
//! content-stream operations and link annotations for one page.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::generation::courses::CourseRecommendation;
use crate::generation::generator::FeedbackDocument;
use crate::models::candidate::CandidateRow;
use crate::render::branding::Rgb;
use crate::render::metrics::{measure, wrap_clamped, FontFace};
use crate::render::{DeliveryLinks, RenderError, Theme};

pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 48.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

const SUMMARY_MAX_LINES: usize = 8;
const MOTIVATION_MAX_LINES: usize = 5;
const LOGO_BOX: (f32, f32) = (140.0, 56.0);
const LOGO_RESOURCE: &str = "Im1";

// ────────────────────────────────────────────────────────────────────────────
// Canvas
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Rect {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
}

#[derive(Default)]
struct Canvas {
    ops: Vec<Operation>,
    links: Vec<(Rect, String)>,
}

impl Canvas {
    fn fill_rect(&mut self, color: Rgb, rect: Rect) {
        let [r, g, b] = color.unit();
        self.ops
            .push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
        self.ops.push(Operation::new(
            "re",
            vec![rect.x.into(), rect.y.into(), rect.w.into(), rect.h.into()],
        ));
        self.ops.push(Operation::new("f", vec![]));
    }

    fn rule(&mut self, color: Rgb, x1: f32, x2: f32, y: f32, width: f32) {
        let [r, g, b] = color.unit();
        self.ops
            .push(Operation::new("RG", vec![r.into(), g.into(), b.into()]));
        self.ops.push(Operation::new("w", vec![width.into()]));
        self.ops.push(Operation::new("m", vec![x1.into(), y.into()]));
        self.ops.push(Operation::new("l", vec![x2.into(), y.into()]));
        self.ops.push(Operation::new("S", vec![]));
    }

    fn text(&mut self, face: FontFace, size: f32, color: Rgb, x: f32, y: f32, text: &str) {
        let [r, g, b] = color.unit();
        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new(
            "Tf",
            vec![face.resource_name().into(), size.into()],
        ));
        self.ops
            .push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
        self.ops.push(Operation::new("Td", vec![x.into(), y.into()]));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(win_ansi(text), StringFormat::Literal)],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn centered_text(&mut self, face: FontFace, size: f32, color: Rgb, cx: f32, y: f32, text: &str) {
        let x = cx - measure(text, face, size) / 2.0;
        self.text(face, size, color, x, y, text);
    }

    /// Draws `lines` top-down starting at baseline `y`; returns the baseline after the block.
    #[allow(clippy::too_many_arguments)]
    fn paragraph(
        &mut self,
        face: FontFace,
        size: f32,
        leading: f32,
        color: Rgb,
        x: f32,
        y: f32,
        lines: &[String],
    ) -> f32 {
        let mut baseline = y;
        for line in lines {
            self.text(face, size, color, x, baseline, line);
            baseline -= leading;
        }
        baseline
    }

    fn image(&mut self, name: &str, rect: Rect) {
        self.ops.push(Operation::new("q", vec![]));
        self.ops.push(Operation::new(
            "cm",
            vec![
                rect.w.into(),
                0.into(),
                0.into(),
                rect.h.into(),
                rect.x.into(),
                rect.y.into(),
            ],
        ));
        self.ops.push(Operation::new("Do", vec![name.into()]));
        self.ops.push(Operation::new("Q", vec![]));
    }

    fn link(&mut self, rect: Rect, uri: String) {
        self.links.push((rect, uri));
    }

    fn button(&mut self, fill: Rgb, rect: Rect, label: &str, uri: String) {
        self.fill_rect(fill, rect);
        let size = 11.0;
        self.centered_text(
            FontFace::Bold,
            size,
            Rgb::WHITE,
            rect.x + rect.w / 2.0,
            rect.y + (rect.h - size) / 2.0 + 2.0,
            label,
        );
        self.link(rect, uri);
    }
}

/// Encodes text for a WinAnsiEncoding base font. Unmappable characters become '?'.
pub fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7E}' => c as u8,
            '\u{A0}'..='\u{FF}' => c as u32 as u8,
            '\t' | '\n' | '\r' => b' ',
            '€' => 0x80,
            '‚' => 0x82,
            'ƒ' => 0x83,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            'ˆ' => 0x88,
            '‰' => 0x89,
            'Š' => 0x8A,
            '‹' => 0x8B,
            'Œ' => 0x8C,
            'Ž' => 0x8E,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '˜' => 0x98,
            '™' => 0x99,
            'š' => 0x9A,
            '›' => 0x9B,
            'œ' => 0x9C,
            'ž' => 0x9E,
            'Ÿ' => 0x9F,
            _ => b'?',
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Page 1
// ────────────────────────────────────────────────────────────────────────────

fn draw_summary_page(
    theme: &Theme<'_>,
    candidate: &CandidateRow,
    doc: &FeedbackDocument,
    links: &DeliveryLinks,
) -> Canvas {
    let mut c = Canvas::default();
    let header_h = 96.0;

    c.fill_rect(
        theme.primary,
        Rect {
            x: 0.0,
            y: PAGE_HEIGHT - header_h,
            w: PAGE_WIDTH,
            h: header_h,
        },
    );
    let name_width = if theme.logo.is_some() {
        CONTENT_WIDTH - LOGO_BOX.0 - 16.0
    } else {
        CONTENT_WIDTH
    };
    if let Some(name) = wrap_clamped(
        &theme.branding.company_name,
        FontFace::Bold,
        20.0,
        name_width,
        1,
    )
    .first()
    {
        c.text(FontFace::Bold, 20.0, Rgb::WHITE, MARGIN, PAGE_HEIGHT - 56.0, name);
    }
    if let Some((_, info)) = &theme.logo {
        let scale = (LOGO_BOX.0 / info.width as f32).min(LOGO_BOX.1 / info.height as f32);
        let (w, h) = (info.width as f32 * scale, info.height as f32 * scale);
        c.image(
            LOGO_RESOURCE,
            Rect {
                x: PAGE_WIDTH - MARGIN - w,
                y: PAGE_HEIGHT - header_h / 2.0 - h / 2.0,
                w,
                h,
            },
        );
    }

    let mut y = PAGE_HEIGHT - header_h - 44.0;
    c.text(FontFace::Bold, 22.0, Rgb::INK, MARGIN, y, "Your interview feedback");
    y -= 20.0;
    c.text(
        FontFace::Regular,
        11.0,
        Rgb::MUTED,
        MARGIN,
        y,
        &format!("{} \u{b7} {}", doc.position, doc.rejection_stage),
    );
    y -= 30.0;
    c.text(
        FontFace::Regular,
        12.0,
        Rgb::INK,
        MARGIN,
        y,
        &format!("Hi {},", candidate.first_name()),
    );
    y -= 22.0;

    let summary = wrap_clamped(&doc.summary, FontFace::Regular, 11.0, CONTENT_WIDTH, SUMMARY_MAX_LINES);
    y = c.paragraph(FontFace::Regular, 11.0, 15.0, Rgb::INK, MARGIN, y, &summary);
    y -= 10.0;

    let motivation = wrap_clamped(
        &doc.motivational_text,
        FontFace::Oblique,
        11.0,
        CONTENT_WIDTH - 14.0,
        MOTIVATION_MAX_LINES,
    );
    if !motivation.is_empty() {
        let block_h = motivation.len() as f32 * 15.0;
        c.fill_rect(
            theme.secondary,
            Rect {
                x: MARGIN,
                y: y - block_h + 11.0,
                w: 4.0,
                h: block_h + 2.0,
            },
        );
        y = c.paragraph(FontFace::Oblique, 11.0, 15.0, Rgb::INK, MARGIN + 14.0, y, &motivation);
    }
    y -= 18.0;

    c.text(FontFace::Bold, 14.0, theme.primary, MARGIN, y, "Skills to strengthen");
    y -= 30.0;
    y = draw_skill_tags(&mut c, theme, &doc.skill_gaps, y);
    y -= 16.0;

    c.text(FontFace::Bold, 14.0, theme.primary, MARGIN, y, "Resume tips");
    y -= 20.0;
    for (i, tip) in doc.resume_tips.iter().enumerate() {
        let label = format!("{}.", i + 1);
        c.text(FontFace::Bold, 10.0, theme.primary, MARGIN, y, &label);
        let lines = wrap_clamped(tip, FontFace::Regular, 10.0, CONTENT_WIDTH - 18.0, 2);
        y = c.paragraph(FontFace::Regular, 10.0, 13.0, Rgb::INK, MARGIN + 18.0, y, &lines);
        y -= 3.0;
    }

    let gap = 12.0;
    let button_w = (CONTENT_WIDTH - 2.0 * gap) / 3.0;
    let ctas = [
        ("Fix my resume", &theme.branding.links.resume_fix_url),
        ("Start learning", &theme.branding.links.learning_url),
        ("Reapply", &theme.branding.links.reapply_url),
    ];
    for (i, (label, target)) in ctas.into_iter().enumerate() {
        let fill = if i == 1 { theme.secondary } else { theme.primary };
        c.button(
            fill,
            Rect {
                x: MARGIN + i as f32 * (button_w + gap),
                y: 78.0,
                w: button_w,
                h: 30.0,
            },
            label,
            links.href(target),
        );
    }

    c.centered_text(FontFace::Regular, 9.0, Rgb::MUTED, PAGE_WIDTH / 2.0, 36.0, "Page 1 of 2");
    c
}

/// Flows skill gaps as tinted tags, wrapping rows. Returns the baseline below the last row.
fn draw_skill_tags(c: &mut Canvas, theme: &Theme<'_>, gaps: &[String], top: f32) -> f32 {
    let (size, pad, tag_h, gap) = (10.0, 8.0, 20.0, 8.0);
    let mut x = MARGIN;
    let mut row_y = top;
    for gap_label in gaps {
        let label = wrap_clamped(gap_label, FontFace::Bold, size, CONTENT_WIDTH - 2.0 * pad, 1)
            .into_iter()
            .next()
            .unwrap_or_default();
        let w = measure(&label, FontFace::Bold, size) + 2.0 * pad;
        if x > MARGIN && x + w > MARGIN + CONTENT_WIDTH {
            x = MARGIN;
            row_y -= tag_h + gap;
        }
        c.fill_rect(
            theme.primary.tint(0.85),
            Rect {
                x,
                y: row_y,
                w,
                h: tag_h,
            },
        );
        c.text(FontFace::Bold, size, theme.primary, x + pad, row_y + 6.5, &label);
        x += w + gap;
    }
    row_y - 14.0
}

// ────────────────────────────────────────────────────────────────────────────
// Page 2
// ────────────────────────────────────────────────────────────────────────────

fn draw_learning_page(theme: &Theme<'_>, doc: &FeedbackDocument, links: &DeliveryLinks) -> Canvas {
    let mut c = Canvas::default();
    let header_h = 72.0;
    c.fill_rect(
        theme.primary,
        Rect {
            x: 0.0,
            y: PAGE_HEIGHT - header_h,
            w: PAGE_WIDTH,
            h: header_h,
        },
    );
    c.text(FontFace::Bold, 20.0, Rgb::WHITE, MARGIN, PAGE_HEIGHT - 44.0, "Recommended learning");

    let mut y = PAGE_HEIGHT - header_h - 32.0;
    let intro = wrap_clamped(
        "Hand-picked courses for the skills above. Start with a free option, then go deeper.",
        FontFace::Regular,
        11.0,
        CONTENT_WIDTH,
        2,
    );
    y = c.paragraph(FontFace::Regular, 11.0, 15.0, Rgb::MUTED, MARGIN, y, &intro);
    y -= 14.0;

    let col_gap = 19.0;
    let col_w = (CONTENT_WIDTH - col_gap) / 2.0;
    let columns = [
        ("Free courses", theme.secondary, &doc.courses.free, MARGIN),
        ("Premium courses", theme.primary, &doc.courses.paid, MARGIN + col_w + col_gap),
    ];
    let mut lowest = y;
    for (title, color, courses, x) in columns {
        c.text(FontFace::Bold, 14.0, color, x, y, title);
        let mut card_top = y - 14.0;
        for course in courses.iter() {
            card_top = draw_course_card(&mut c, course, color, x, card_top, col_w, links);
            card_top -= 10.0;
        }
        lowest = lowest.min(card_top);
    }
    y = lowest - 16.0;

    c.text(FontFace::Bold, 14.0, theme.primary, MARGIN, y, "Next steps");
    y -= 20.0;
    for step in &doc.next_steps {
        c.text(FontFace::Bold, 10.0, theme.secondary, MARGIN, y, "\u{2022}");
        let lines = wrap_clamped(step, FontFace::Regular, 10.0, CONTENT_WIDTH - 14.0, 3);
        y = c.paragraph(FontFace::Regular, 10.0, 13.0, Rgb::INK, MARGIN + 14.0, y, &lines);
        y -= 4.0;
    }

    c.rule(theme.secondary, MARGIN, PAGE_WIDTH - MARGIN, 76.0, 1.5);
    let footer = wrap_clamped(&theme.branding.footer_message, FontFace::Regular, 9.0, CONTENT_WIDTH, 2);
    c.paragraph(FontFace::Regular, 9.0, 12.0, Rgb::MUTED, MARGIN, 62.0, &footer);
    c.centered_text(FontFace::Regular, 9.0, Rgb::MUTED, PAGE_WIDTH / 2.0, 36.0, "Page 2 of 2");
    c
}

/// Returns the bottom edge of the card.
fn draw_course_card(
    c: &mut Canvas,
    course: &CourseRecommendation,
    accent: Rgb,
    x: f32,
    top: f32,
    width: f32,
    links: &DeliveryLinks,
) -> f32 {
    let (pad, height) = (10.0, 80.0);
    let rect = Rect {
        x,
        y: top - height,
        w: width,
        h: height,
    };
    c.fill_rect(accent.tint(0.9), rect);
    c.fill_rect(
        accent,
        Rect {
            x,
            y: rect.y,
            w: 3.0,
            h: height,
        },
    );

    let mut y = top - pad - 10.0;
    let title = wrap_clamped(&course.title, FontFace::Bold, 11.0, width - 2.0 * pad, 2);
    y = c.paragraph(FontFace::Bold, 11.0, 13.0, Rgb::INK, x + pad, y, &title);
    let price = if course.is_free {
        "Free".to_string()
    } else {
        course.price.clone().unwrap_or_else(|| "Paid".to_string())
    };
    c.text(
        FontFace::Regular,
        9.0,
        Rgb::MUTED,
        x + pad,
        y - 1.0,
        &format!("{} \u{b7} {}", course.provider, price),
    );
    if let Some(skill) = &course.skill {
        let line = wrap_clamped(&format!("Builds: {skill}"), FontFace::Oblique, 9.0, width - 2.0 * pad, 1);
        c.paragraph(FontFace::Oblique, 9.0, 12.0, accent, x + pad, rect.y + pad, &line);
    }
    c.link(rect, links.href(&course.url));
    rect.y
}

// ────────────────────────────────────────────────────────────────────────────
// Document assembly
// ────────────────────────────────────────────────────────────────────────────

pub fn render_pdf(
    theme: &Theme<'_>,
    candidate: &CandidateRow,
    doc: &FeedbackDocument,
    links: &DeliveryLinks,
) -> Result<Vec<u8>, RenderError> {
    let mut pdf = Document::with_version("1.5");
    let pages_id = pdf.new_object_id();

    let mut fonts = Dictionary::new();
    for face in [FontFace::Regular, FontFace::Bold, FontFace::Oblique] {
        let font_id = pdf.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => face.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(face.resource_name(), font_id);
    }
    let mut resources = dictionary! { "Font" => fonts };
    if let Some((logo, info)) = &theme.logo {
        let mut image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => info.width as i64,
                "Height" => info.height as i64,
                "ColorSpace" => info.color_space(),
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            logo.bytes.to_vec(),
        );
        image.allows_compression = false;
        let image_id = pdf.add_object(image);
        resources.set("XObject", dictionary! { LOGO_RESOURCE => image_id });
    }
    let resources_id = pdf.add_object(resources);

    let canvases = [
        draw_summary_page(theme, candidate, doc, links),
        draw_learning_page(theme, doc, links),
    ];
    let mut kids: Vec<Object> = Vec::with_capacity(canvases.len());
    for canvas in canvases {
        let page_id = add_page(&mut pdf, pages_id, canvas)?;
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let info_id = pdf.add_object(dictionary! {
        "Title" => Object::string_literal(format!("Interview feedback for {}", candidate.name)),
        "Producer" => Object::string_literal(theme.branding.company_name.as_str()),
    });
    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    pdf.trailer.set("Root", catalog_id);
    pdf.trailer.set("Info", info_id);
    pdf.compress();

    let mut out = Vec::new();
    pdf.save_to(&mut out)?;
    Ok(out)
}

fn add_page(pdf: &mut Document, parent: ObjectId, canvas: Canvas) -> Result<ObjectId, RenderError> {
    let content = Content {
        operations: canvas.ops,
    };
    let content_id = pdf.add_object(Stream::new(dictionary! {}, content.encode()?));

    let mut annots: Vec<Object> = Vec::with_capacity(canvas.links.len());
    for (rect, uri) in canvas.links {
        let annot_id = pdf.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => vec![
                rect.x.into(),
                rect.y.into(),
                (rect.x + rect.w).into(),
                (rect.y + rect.h).into(),
            ],
            "Border" => vec![0.into(), 0.into(), 0.into()],
            "A" => dictionary! {
                "Type" => "Action",
                "S" => "URI",
                "URI" => Object::string_literal(uri),
            },
        });
        annots.push(annot_id.into());
    }

    Ok(pdf.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => parent,
        "Contents" => content_id,
        "Annots" => annots,
    }))
}
