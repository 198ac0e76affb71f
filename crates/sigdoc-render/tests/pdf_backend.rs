//! Integration tests: assembled document → PDF bytes → sink.

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use sigdoc_core::{
    CanvasGeometry, Document, ImageFormat, Record, RenderMode, Stroke, StrokePoint, assemble,
};
use sigdoc_render::*;

// ─── Helpers ─────────────────────────────────────────────────────────────

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid date")
}

fn jane() -> Record {
    Record::new("Jane Smith", "Office Chair", "CH002")
}

fn five_point_stroke() -> Vec<Stroke> {
    vec![Stroke {
        points: vec![
            StrokePoint::new(40.0, 120.0, 0),
            StrokePoint::new(90.0, 80.0, 30),
            StrokePoint::new(150.0, 140.0, 60),
            StrokePoint::new(220.0, 90.0, 90),
            StrokePoint::new(300.0, 130.0, 120),
        ],
    }]
}

fn signed_document() -> Document {
    let geometry = CanvasGeometry::new(600.0, 256.0, 2.0).expect("geometry");
    let image = rasterize(
        &five_point_stroke(),
        &geometry,
        &InkStyle::default(),
        &CaptureConfig::default(),
        ImageFormat::Png,
    )
    .expect("raster");
    assemble(&jane(), Some(&image), &[], today()).expect("assembly")
}

fn page_text(bytes: &[u8]) -> String {
    let pdf = lopdf::Document::load_mem(bytes).expect("valid PDF");
    let pages = pdf.get_pages();
    let mut text = Vec::new();
    for (_, page_id) in pages {
        text.extend(pdf.get_page_content(page_id).expect("page content"));
    }
    String::from_utf8_lossy(&text).into_owned()
}

fn image_count(bytes: &[u8]) -> usize {
    let pdf = lopdf::Document::load_mem(bytes).expect("valid PDF");
    pdf.objects
        .values()
        .filter_map(|o| o.as_stream().ok())
        .filter(|s| {
            s.dict
                .get(b"Subtype")
                .and_then(|v| v.as_name())
                .map(|n| n == b"Image")
                .unwrap_or(false)
        })
        .count()
}

// ─── Tests ───────────────────────────────────────────────────────────────

#[test]
fn download_uses_agreement_filename() {
    let doc = signed_document();
    let mut backend = PdfBackend::new(MemorySink::new());

    let out = backend.render(&doc, RenderMode::Download).expect("render");
    let expected = "Asset_Agreement_Jane_Smith_CH002_2026-10-18.pdf".to_string();
    assert_eq!(out, RenderOutput::Saved { filename: expected.clone() });

    let files = &backend.sink().files;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].0, expected);
    assert!(files[0].1.starts_with(b"%PDF-1.5"));
}

#[test]
fn preview_never_touches_the_sink() {
    let doc = signed_document();
    let mut backend = PdfBackend::new(MemorySink::new());

    let out = backend.render(&doc, RenderMode::Preview).expect("render");
    assert!(matches!(out, RenderOutput::Inline(ref bytes) if bytes.starts_with(b"%PDF")));
    assert!(backend.sink().files.is_empty());
}

#[test]
fn signature_is_embedded_with_soft_mask() {
    let RenderOutput::Inline(bytes) = PdfBackend::new(MemorySink::new())
        .render(&signed_document(), RenderMode::Preview)
        .expect("render")
    else {
        panic!("expected inline output");
    };
    // Colour image plus its alpha mask.
    assert_eq!(image_count(&bytes), 2);
    let text = page_text(&bytes);
    assert!(text.contains("/Im0 Do"));
    assert!(text.contains("(Jane Smith)"));
}

#[test]
fn unsigned_document_shows_placeholder_and_no_image() {
    let doc = assemble(&jane(), None, &[], today()).expect("assembly");
    let bytes = build_pdf(&doc, &sigdoc_core::PageLayout::default()).expect("pdf");

    assert_eq!(image_count(&bytes), 0);
    let text = page_text(&bytes);
    assert!(text.contains("(No signature provided)"));
    assert!(!text.contains("/Im0 Do"));
    assert!(text.contains("(ASSET ASSIGNMENT AGREEMENT)"));
    assert!(text.contains("(Date: October 18, 2026)"));
}

#[test]
fn long_extra_item_list_still_renders() {
    let items: Vec<String> = (0..120).map(|i| format!("Peripheral #{i}")).collect();
    let doc = assemble(&jane(), None, &items, today()).expect("assembly");
    let bytes = build_pdf(&doc, &sigdoc_core::PageLayout::default()).expect("pdf");
    let pdf = lopdf::Document::load_mem(&bytes).expect("valid PDF");
    assert!(!pdf.get_pages().is_empty());
}
