//! PDF render backend built on `lopdf`.
//!
//! Lays the document's sections out top to bottom on A4 pages using the
//! standard Helvetica faces (no font embedding), and embeds the signature
//! losslessly: the encoded raster is decoded, split into an RGB image and
//! a DeviceGray soft mask, and every stream is Flate-compressed.

use crate::backend::{DownloadSink, RenderBackend, RenderOutput};
use lopdf::content::{Content, Operation};
use lopdf::{Document as PdfDocument, Object, ObjectId, Stream, dictionary};
use sigdoc_core::{
    Document, Error, Field, PageLayout, RasterImage, RenderMode, Result, Section, SignatureBlock,
    SignatureSlot, Span,
};

const REGULAR: &str = "F1";
const BOLD: &str = "F2";
const SIGNATURE_IMAGE: &str = "Im0";

/// Text grey levels.
const INK: f32 = 0.2;
const MUTED: f32 = 0.4;
const FAINT: f32 = 0.6;
const RULE_LIGHT: f32 = 0.8;
const PANEL: f32 = 0.976;

/// Renders documents to PDF; downloads go to `S`.
pub struct PdfBackend<S> {
    layout: PageLayout,
    sink: S,
}

impl<S: DownloadSink> PdfBackend<S> {
    pub fn new(sink: S) -> Self {
        Self::with_layout(sink, PageLayout::default())
    }

    pub fn with_layout(sink: S, layout: PageLayout) -> Self {
        Self { layout, sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: DownloadSink> RenderBackend for PdfBackend<S> {
    fn render(&mut self, document: &Document, mode: RenderMode) -> Result<RenderOutput> {
        let bytes = build_pdf(document, &self.layout)?;
        match mode {
            RenderMode::Preview => Ok(RenderOutput::Inline(bytes)),
            RenderMode::Download => {
                let filename = document.filename();
                self.sink.save(&filename, &bytes)?;
                Ok(RenderOutput::Saved { filename })
            }
        }
    }
}

/// Serialize `document` to PDF bytes.
pub fn build_pdf(document: &Document, layout: &PageLayout) -> Result<Vec<u8>> {
    let mut pdf = PdfDocument::with_version("1.5");
    let pages_id = pdf.new_object_id();

    let regular_id = pdf.add_object(font("Helvetica"));
    let bold_id = pdf.add_object(font("Helvetica-Bold"));
    let mut resources = dictionary! {
        "Font" => dictionary! {
            REGULAR => regular_id,
            BOLD => bold_id,
        },
    };

    let has_image = matches!(
        document.signature_block().map(|b| &b.slot),
        Some(SignatureSlot::Image { .. })
    );
    if has_image && let Some(image) = document.signature() {
        let image_id = embed_image(&mut pdf, image)?;
        resources.set("XObject", dictionary! { SIGNATURE_IMAGE => image_id });
    }
    let resources_id = pdf.add_object(resources);

    let mut pager = Pager::new(layout);
    for section in document.sections() {
        lay_out_section(&mut pager, section, has_image);
    }

    let media_box: Vec<Object> = vec![
        0.0.into(),
        0.0.into(),
        layout.page_width.into(),
        layout.page_height.into(),
    ];
    let mut kids: Vec<Object> = Vec::new();
    for operations in pager.pages {
        let content = Content { operations }
            .encode()
            .map_err(|e| Error::Render(format!("content stream encoding failed: {e}")))?;
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => media_box.clone(),
        });
        kids.push(page_id.into());
    }
    let page_count = kids.len() as i64;
    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );
    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = pdf.add_object(dictionary! {
        "Title" => Object::string_literal("Asset Assignment Agreement"),
        "Producer" => Object::string_literal("sigdoc"),
        "CreationDate" => Object::string_literal(
            format!("D:{}", document.generated_at().format("%Y%m%d")),
        ),
    });
    pdf.trailer.set("Root", catalog_id);
    pdf.trailer.set("Info", info_id);
    pdf.compress();

    let mut bytes = Vec::new();
    pdf.save_to(&mut bytes)
        .map_err(|e| Error::Render(format!("PDF serialization failed: {e}")))?;
    log::debug!(
        "built {} ({} pages, {} bytes)",
        document.filename(),
        page_count,
        bytes.len()
    );
    Ok(bytes)
}

fn font(base: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    }
}

fn embed_image(pdf: &mut PdfDocument, image: &RasterImage) -> Result<ObjectId> {
    let decoded = image::load_from_memory(&image.bytes)
        .map_err(|e| Error::Render(format!("signature image is unreadable: {e}")))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in decoded.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let smask_id = pdf.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        alpha,
    ));
    Ok(pdf.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "SMask" => smask_id,
        },
        rgb,
    )))
}

// ─── Layout ──────────────────────────────────────────────────────────────

/// Top-down cursor over one or more pages. `y` is measured from the top
/// edge of the page.
struct Pager<'a> {
    layout: &'a PageLayout,
    pages: Vec<Vec<Operation>>,
    y: f32,
}

impl<'a> Pager<'a> {
    fn new(layout: &'a PageLayout) -> Self {
        Self {
            layout,
            pages: vec![Vec::new()],
            y: layout.margin,
        }
    }

    fn left(&self) -> f32 {
        self.layout.margin
    }

    fn width(&self) -> f32 {
        self.layout.content_width()
    }

    /// Start a new page unless `height` more points fit on this one.
    fn reserve(&mut self, height: f32) {
        let bottom = self.layout.page_height - self.layout.margin;
        if self.y + height > bottom && self.y > self.layout.margin {
            self.pages.push(Vec::new());
            self.y = self.layout.margin;
        }
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        // `pages` is never empty.
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn pdf_y(&self, y: f32) -> f32 {
        self.layout.page_height - y
    }

    fn text(&mut self, x: f32, baseline: f32, bold: bool, size: f32, gray: f32, text: &str) {
        let y = self.pdf_y(baseline);
        let face = if bold { BOLD } else { REGULAR };
        self.ops().extend([
            Operation::new("BT", vec![]),
            Operation::new("g", vec![gray.into()]),
            Operation::new("Tf", vec![face.into(), size.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(win_ansi(text))]),
            Operation::new("ET", vec![]),
        ]);
    }

    fn rule(&mut self, x0: f32, x1: f32, y: f32, width: f32, gray: f32) {
        let y = self.pdf_y(y);
        self.ops().extend([
            Operation::new("G", vec![gray.into()]),
            Operation::new("w", vec![width.into()]),
            Operation::new("m", vec![x0.into(), y.into()]),
            Operation::new("l", vec![x1.into(), y.into()]),
            Operation::new("S", vec![]),
        ]);
    }

    fn panel(&mut self, x: f32, top: f32, width: f32, height: f32, gray: f32) {
        let y = self.pdf_y(top + height);
        self.ops().extend([
            Operation::new("g", vec![gray.into()]),
            Operation::new("re", vec![x.into(), y.into(), width.into(), height.into()]),
            Operation::new("f", vec![]),
        ]);
    }

    fn image(&mut self, x: f32, top: f32, width: f32, height: f32) {
        let y = self.pdf_y(top + height);
        self.ops().extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![width.into(), 0.0.into(), 0.0.into(), height.into(), x.into(), y.into()],
            ),
            Operation::new("Do", vec![SIGNATURE_IMAGE.into()]),
            Operation::new("Q", vec![]),
        ]);
    }

    /// Draw wrapped lines starting at the cursor and advance past them.
    fn lines(&mut self, x: f32, lines: &[Line], size: f32, gray: f32) {
        let line_height = size * self.layout.line_spacing;
        for line in lines {
            self.reserve(line_height);
            let baseline = self.y + size;
            for run in &line.runs {
                self.text(x + run.x, baseline, run.bold, size, gray, &run.text);
            }
            self.y += line_height;
        }
    }
}

fn lay_out_section(pager: &mut Pager<'_>, section: &Section, has_image: bool) {
    let layout = *pager.layout;
    let left = pager.left();
    let width = pager.width();
    match section {
        Section::Header { title, date_line } => {
            let title_w = text_width(title, layout.title_size, true);
            let date_w = text_width(date_line, layout.body_size, false);
            pager.reserve(layout.title_size * 3.0);
            let baseline = pager.y + layout.title_size;
            pager.text(left + (width - title_w) / 2.0, baseline, true, layout.title_size, INK, title);
            pager.y = baseline + layout.title_size * 0.8;
            let baseline = pager.y + layout.body_size;
            pager.text(left + (width - date_w) / 2.0, baseline, false, layout.body_size, MUTED, date_line);
            pager.y = baseline + 18.0;
            pager.rule(left, left + width, pager.y, 1.5, INK);
            pager.y += 36.0;
        }
        Section::Details { heading, fields } => {
            let padding = 18.0;
            let inner = width - 2.0 * padding;
            let rows: Vec<(String, Vec<Line>)> = fields
                .iter()
                .map(|Field { label, value }| {
                    let lines = wrap(&[Span::plain(value.as_str())], layout.body_size, inner - layout.label_width);
                    (label.clone(), lines)
                })
                .collect();
            let body_line = layout.body_size * layout.line_spacing;
            let rows_height: f32 = rows.iter().map(|(_, l)| l.len().max(1) as f32 * body_line).sum();
            let height = padding * 2.0 + layout.heading_size * 2.0 + rows_height;

            pager.reserve(height);
            pager.panel(left, pager.y, width, height, PANEL);
            pager.y += padding;
            let baseline = pager.y + layout.heading_size;
            pager.text(left + padding, baseline, true, layout.heading_size, INK, heading);
            pager.y += layout.heading_size * 2.0;
            for (label, lines) in &rows {
                let top = pager.y;
                pager.text(left + padding, top + layout.body_size, true, layout.body_size, INK, label);
                if lines.is_empty() {
                    pager.y += body_line;
                } else {
                    pager.lines(left + padding + layout.label_width, lines, layout.body_size, INK);
                }
            }
            pager.y += padding + 18.0;
        }
        Section::Body { paragraphs } => {
            for paragraph in paragraphs {
                let lines = wrap(paragraph, layout.body_size, width);
                pager.lines(left, &lines, layout.body_size, INK);
                pager.y += layout.body_size;
            }
            pager.y += 12.0;
        }
        Section::Signature(block) => lay_out_signature(pager, block, has_image),
        Section::Footer { text } => {
            pager.reserve(layout.footer_size * 3.0);
            pager.rule(left, left + width, pager.y, 0.75, RULE_LIGHT);
            pager.y += 12.0;
            let w = text_width(text, layout.footer_size, false);
            let baseline = pager.y + layout.footer_size;
            pager.text(left + (width - w) / 2.0, baseline, false, layout.footer_size, FAINT, text);
            pager.y = baseline + layout.footer_size;
        }
    }
}

fn lay_out_signature(pager: &mut Pager<'_>, block: &SignatureBlock, has_image: bool) {
    let layout = *pager.layout;
    let left = pager.left();
    let column = pager.width() * 0.48;
    let right = left + pager.width() - column;
    let slot_height = match block.slot {
        SignatureSlot::Image { height_pt, .. } => height_pt,
        SignatureSlot::Placeholder(_) => layout.body_size * layout.line_spacing,
    };
    pager.reserve(layout.body_size * 3.0 + slot_height + layout.caption_size * 3.0);

    let top = pager.y;
    let label_baseline = top + layout.body_size;
    pager.text(left, label_baseline, true, layout.body_size, MUTED, &block.label);
    let date_w = text_width(&block.date_label, layout.body_size, true);
    pager.text(right + (column - date_w) / 2.0, label_baseline, true, layout.body_size, MUTED, &block.date_label);

    pager.y = label_baseline + 18.0;
    match &block.slot {
        SignatureSlot::Image { width_pt, height_pt } if has_image => {
            pager.image(left, pager.y, *width_pt, *height_pt);
            pager.y += height_pt + 9.0;
        }
        SignatureSlot::Image { .. } => {}
        SignatureSlot::Placeholder(text) => {
            pager.text(left, pager.y + layout.body_size, false, layout.body_size, INK, text);
            pager.y += slot_height;
        }
    }
    pager.rule(left, left + layout.signature_max_width, pager.y, 0.75, INK);
    pager.y += 9.0;
    let baseline = pager.y + layout.caption_size;
    pager.text(left, baseline, false, layout.caption_size, MUTED, &block.signer);
    pager.y = baseline + 24.0;
}

// ─── Text measuring and wrapping ─────────────────────────────────────────

/// Approximate Helvetica advance widths (1/1000 em).
fn char_width(c: char) -> f32 {
    match c {
        ' ' | '.' | ',' | ':' | ';' | 'f' | 't' | 'I' | '!' | '/' => 278.0,
        'i' | 'j' | 'l' | '\'' => 222.0,
        'r' | '-' | '(' | ')' => 333.0,
        '"' => 355.0,
        'm' | 'M' => 833.0,
        'w' => 722.0,
        'W' => 944.0,
        'c' | 'k' | 's' | 'v' | 'x' | 'y' | 'z' => 500.0,
        'A'..='Z' => 667.0,
        _ => 556.0,
    }
}

fn text_width(text: &str, size: f32, bold: bool) -> f32 {
    let em: f32 = text.chars().map(char_width).sum();
    let factor = if bold { 1.06 } else { 1.0 };
    em * size / 1000.0 * factor
}

#[derive(Debug, Clone, PartialEq)]
struct Run {
    x: f32,
    bold: bool,
    text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Line {
    runs: Vec<Run>,
}

struct Word {
    text: String,
    bold: bool,
    space_before: bool,
}

fn words(spans: &[Span]) -> Vec<Word> {
    let mut out = Vec::new();
    let mut pending_space = false;
    for span in spans {
        let mut word = String::new();
        for ch in span.text.chars() {
            if ch.is_whitespace() {
                if !word.is_empty() {
                    out.push(Word {
                        text: std::mem::take(&mut word),
                        bold: span.bold,
                        space_before: pending_space,
                    });
                }
                pending_space = true;
            } else {
                if word.is_empty() && out.is_empty() {
                    pending_space = false;
                }
                word.push(ch);
            }
        }
        if !word.is_empty() {
            out.push(Word {
                text: word,
                bold: span.bold,
                space_before: pending_space,
            });
            pending_space = false;
        }
    }
    out
}

/// Greedy word wrap. Words longer than a line get a line of their own.
fn wrap(spans: &[Span], size: f32, max_width: f32) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut line = Line::default();
    let mut x = 0.0f32;
    for word in words(spans) {
        let space = if word.space_before { text_width(" ", size, word.bold) } else { 0.0 };
        let w = text_width(&word.text, size, word.bold);
        let starts_line = line.runs.is_empty();
        if !starts_line && x + space + w > max_width {
            lines.push(std::mem::take(&mut line));
            x = 0.0;
        }
        let lead = if line.runs.is_empty() { 0.0 } else { space };
        match line.runs.last_mut() {
            Some(run) if run.bold == word.bold => {
                if lead > 0.0 {
                    run.text.push(' ');
                }
                run.text.push_str(&word.text);
            }
            _ => line.runs.push(Run {
                x: x + lead,
                bold: word.bold,
                text: word.text,
            }),
        }
        x += lead + w;
    }
    if !line.runs.is_empty() {
        lines.push(line);
    }
    lines
}

/// Encode for the WinAnsi standard fonts; unmappable characters become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201c}' => 0x93,
            '\u{201d}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{20ac}' => 0x80,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn words_keep_span_boundaries() {
        let spans = vec![
            Span::plain("asset \""),
            Span::bold("Office Chair"),
            Span::plain("\" with"),
        ];
        let words: Vec<(String, bool, bool)> = words(&spans)
            .into_iter()
            .map(|w| (w.text, w.bold, w.space_before))
            .collect();
        assert_eq!(
            words,
            vec![
                ("asset".to_string(), false, false),
                ("\"".to_string(), false, true),
                ("Office".to_string(), true, false),
                ("Chair".to_string(), true, true),
                ("\"".to_string(), false, false),
                ("with".to_string(), false, true),
            ]
        );
    }

    #[test]
    fn wrap_breaks_between_words() {
        let spans = vec![Span::plain("aaaa bbbb cccc")];
        let size = 10.0;
        let max = text_width("aaaa bbbb", size, false) + 1.0;
        let lines = wrap(&spans, size, max);
        let text: Vec<&str> = lines.iter().map(|l| l.runs[0].text.as_str()).collect();
        assert_eq!(text, vec!["aaaa bbbb", "cccc"]);
    }

    #[test]
    fn wrap_places_bold_runs_after_plain() {
        let spans = vec![Span::plain("I, "), Span::bold("Jane")];
        let lines = wrap(&spans, 10.0, 500.0);
        assert_eq!(lines.len(), 1);
        let runs = &lines[0].runs;
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text, "I,");
        assert!(runs[1].bold);
        assert!((runs[1].x - text_width("I, ", 10.0, false)).abs() < 0.5);
    }

    #[test]
    fn win_ansi_maps_typographic_quotes() {
        assert_eq!(win_ansi("Jos\u{e9} \u{201c}A\u{201d} \u{4e2d}"), b"Jos\xe9 \x93A\x94 ?".to_vec());
    }
}
