//! Document assembly: record + optional signature → structured [`Document`].
//!
//! Pure; the only input that varies between calls with equal arguments is
//! the date. Renderers turn the resulting sections into bytes.

use crate::error::Result;
use crate::model::{
    Document, Field, Paragraph, RasterImage, Record, Section, SignatureBlock, SignatureSlot, Span,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// CSS pixels to PDF points.
pub const PX_TO_PT: f32 = 0.75;

pub const TITLE: &str = "ASSET ASSIGNMENT AGREEMENT";
pub const DETAILS_HEADING: &str = "Agreement Details";
pub const SIGNATURE_LABEL: &str = "Employee Signature:";
pub const NO_SIGNATURE: &str = "No signature provided";
pub const FOOTER: &str = "This agreement is legally binding and has been digitally signed.";

/// Page geometry and type sizes, all in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLayout {
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    pub title_size: f32,
    pub heading_size: f32,
    pub body_size: f32,
    pub caption_size: f32,
    pub footer_size: f32,
    /// Line height as a multiple of the font size.
    pub line_spacing: f32,
    /// Largest box the signature image may occupy.
    pub signature_max_width: f32,
    pub signature_max_height: f32,
    /// Horizontal offset of field values from the field label.
    pub label_width: f32,
}

impl Default for PageLayout {
    /// A4 portrait, 0.75 in margins, 14 px body text.
    fn default() -> Self {
        Self {
            page_width: 595.28,
            page_height: 841.89,
            margin: 54.0,
            title_size: 24.0 * PX_TO_PT,
            heading_size: 18.0 * PX_TO_PT,
            body_size: 14.0 * PX_TO_PT,
            caption_size: 13.0 * PX_TO_PT,
            footer_size: 12.0 * PX_TO_PT,
            line_spacing: 1.8,
            signature_max_width: 250.0 * PX_TO_PT,
            signature_max_height: 80.0 * PX_TO_PT,
            label_width: 140.0 * PX_TO_PT,
        }
    }
}

impl PageLayout {
    pub fn content_width(&self) -> f32 {
        self.page_width - 2.0 * self.margin
    }

    /// Display size for `image`: natural aspect ratio, scaled down to fit
    /// the signature box, never scaled up.
    pub fn fit_signature(&self, image: &RasterImage) -> (f32, f32) {
        let (w, h) = image.logical_size();
        let (w, h) = (w * PX_TO_PT, h * PX_TO_PT);
        if w <= 0.0 || h <= 0.0 {
            return (0.0, 0.0);
        }
        let scale = (self.signature_max_width / w)
            .min(self.signature_max_height / h)
            .min(1.0);
        (w * scale, h * scale)
    }
}

/// `October 18, 2026`.
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// Build the agreement for `record` with the default layout.
///
/// `extra_items` are merged after the record's own extra items; blanks
/// and repeats are dropped. A missing signature yields a placeholder in
/// the signature block instead of an image.
pub fn assemble(
    record: &Record,
    signature: Option<&RasterImage>,
    extra_items: &[String],
    now: NaiveDate,
) -> Result<Document> {
    assemble_with(&PageLayout::default(), record, signature, extra_items, now)
}

pub fn assemble_with(
    layout: &PageLayout,
    record: &Record,
    signature: Option<&RasterImage>,
    extra_items: &[String],
    now: NaiveDate,
) -> Result<Document> {
    record.ensure_complete()?;

    let mut record = record.clone();
    let mut merged: Vec<String> = Vec::with_capacity(record.extra_items.len() + extra_items.len());
    for item in record.extra_items.iter().chain(extra_items) {
        let item = item.trim();
        if !item.is_empty() && !merged.iter().any(|m| m == item) {
            merged.push(item.to_string());
        }
    }
    record.extra_items = merged.into_iter().collect();

    let date = format_long_date(now);
    let mut fields = vec![
        field("Employee Name:", &record.name),
        field("Asset Name:", &record.asset_name),
        field("Asset ID:", &record.asset_id),
    ];
    if !record.extra_items.is_empty() {
        fields.push(field("Additional Assets:", &record.extra_items.join(", ")));
    }

    let slot = match signature {
        Some(image) => {
            let (width_pt, height_pt) = layout.fit_signature(image);
            SignatureSlot::Image {
                width_pt,
                height_pt,
            }
        }
        None => SignatureSlot::Placeholder(NO_SIGNATURE.to_string()),
    };

    let sections = vec![
        Section::Header {
            title: TITLE.to_string(),
            date_line: format!("Date: {date}"),
        },
        Section::Details {
            heading: DETAILS_HEADING.to_string(),
            fields,
        },
        Section::Body {
            paragraphs: agreement_text(&record),
        },
        Section::Signature(SignatureBlock {
            label: SIGNATURE_LABEL.to_string(),
            slot,
            signer: record.name.clone(),
            date_label: format!("Date: {date}"),
        }),
        Section::Footer {
            text: FOOTER.to_string(),
        },
    ];

    log::debug!(
        "assembled agreement for {} / {} (signature: {})",
        record.name,
        record.asset_id,
        signature.is_some()
    );
    Ok(Document::new(record, signature.cloned(), now, sections))
}

fn field(label: &str, value: &str) -> Field {
    Field {
        label: label.to_string(),
        value: value.to_string(),
    }
}

fn agreement_text(record: &Record) -> Vec<Paragraph> {
    vec![
        vec![
            Span::plain("I, "),
            Span::bold(record.name.as_str()),
            Span::plain(", hereby acknowledge that I have received the company asset \""),
            Span::bold(record.asset_name.as_str()),
            Span::plain("\" with Asset ID "),
            Span::bold(record.asset_id.as_str()),
            Span::plain(
                " in good working condition. I understand and agree to the following terms and conditions:",
            ),
        ],
        vec![Span::plain(
            "I will use this asset solely for business purposes and will take reasonable care to \
             maintain it in good condition. I am responsible for any damage, loss, or theft that may \
             occur while the asset is in my possession, except for normal wear and tear. I agree to \
             return the asset immediately upon request or upon termination of my employment, in the \
             same condition as received.",
        )],
        vec![Span::plain(
            "I understand that failure to comply with these terms may result in disciplinary action \
             and/or financial responsibility for the replacement or repair of the asset. I acknowledge \
             that I have read, understood, and agree to be bound by the company's asset management \
             policies.",
        )],
        vec![Span::plain(
            "By signing below, I confirm that I have received the above-mentioned asset and agree to \
             all terms and conditions outlined in this agreement.",
        )],
    ]
}
