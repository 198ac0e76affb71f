//! CPU rasterization of ink marks with tiny-skia, plus image encoding.

use crate::ink::{CaptureConfig, InkMark, InkStyle, Rgba, stroke_marks};
use sigdoc_core::{CanvasGeometry, Error, ImageFormat, RasterImage, Result, Stroke};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Transform};

/// Allocate a buffer of the geometry's physical size, cleared to the
/// background.
pub fn blank_pixmap(geometry: &CanvasGeometry, style: &InkStyle) -> Result<Pixmap> {
    let (w, h) = geometry.physical_size();
    let mut pixmap = Pixmap::new(w, h).ok_or(Error::GeometryInit {
        width: geometry.logical_width,
        height: geometry.logical_height,
        dpr: geometry.device_pixel_ratio,
    })?;
    if let Some(bg) = style.background {
        pixmap.fill(to_color(bg));
    }
    Ok(pixmap)
}

/// Fill `marks` (logical coordinates) into `pixmap` as one union.
pub fn fill_marks(pixmap: &mut Pixmap, marks: &[InkMark], dpr: f32, pen: Rgba) {
    let spacing = 1.0 / dpr.max(f32::EPSILON) as f64;
    let mut pb = PathBuilder::new();
    for mark in marks {
        for (center, radius) in mark.discs(spacing) {
            pb.push_circle(center.x as f32, center.y as f32, radius as f32);
        }
    }
    let Some(path) = pb.finish() else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color_rgba8(pen.r, pen.g, pen.b, pen.a);
    paint.anti_alias = true;
    pixmap.fill_path(
        &path,
        &paint,
        FillRule::Winding,
        Transform::from_scale(dpr, dpr),
        None,
    );
}

/// Draw every stroke onto a fresh buffer.
pub fn render_strokes(
    strokes: &[Stroke],
    geometry: &CanvasGeometry,
    style: &InkStyle,
    config: &CaptureConfig,
) -> Result<Pixmap> {
    let mut pixmap = blank_pixmap(geometry, style)?;
    for stroke in strokes {
        let marks = stroke_marks(stroke, config, true);
        fill_marks(&mut pixmap, &marks, geometry.device_pixel_ratio, style.pen);
    }
    Ok(pixmap)
}

/// Rasterize and encode. Fails with `EmptyCanvas` when there is no ink.
pub fn rasterize(
    strokes: &[Stroke],
    geometry: &CanvasGeometry,
    style: &InkStyle,
    config: &CaptureConfig,
    format: ImageFormat,
) -> Result<RasterImage> {
    if strokes.iter().all(Stroke::is_empty) {
        return Err(Error::EmptyCanvas);
    }
    let pixmap = render_strokes(strokes, geometry, style, config)?;
    encode(&pixmap, geometry.device_pixel_ratio, format)
}

pub fn encode(pixmap: &Pixmap, dpr: f32, format: ImageFormat) -> Result<RasterImage> {
    let bytes = match format {
        ImageFormat::Png => pixmap
            .encode_png()
            .map_err(|e| Error::Render(format!("PNG encoding failed: {e}")))?,
        ImageFormat::Jpeg { quality } => encode_jpeg(pixmap, quality)?,
    };
    log::debug!(
        "encoded {}x{} {} ({} bytes)",
        pixmap.width(),
        pixmap.height(),
        format.mime_type(),
        bytes.len()
    );
    Ok(RasterImage {
        format,
        width_px: pixmap.width(),
        height_px: pixmap.height(),
        device_pixel_ratio: dpr,
        bytes,
    })
}

/// JPEG has no alpha: composite over white first.
fn encode_jpeg(pixmap: &Pixmap, quality: f32) -> Result<Vec<u8>> {
    use image::codecs::jpeg::JpegEncoder;

    let rgb: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|px| {
            let cover = 255 - px.alpha();
            [px.red() + cover, px.green() + cover, px.blue() + cover]
        })
        .collect();
    let quality = (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8;
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(
            &rgb,
            pixmap.width(),
            pixmap.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| Error::Render(format!("JPEG encoding failed: {e}")))?;
    Ok(out)
}

/// Bounding box of pixels that differ from `background`, in physical px:
/// `(x0, y0, x1, y1)` with exclusive max. `None` for a blank buffer.
pub fn ink_pixel_bounds(pixmap: &Pixmap, background: Option<Rgba>) -> Option<(u32, u32, u32, u32)> {
    let bg = background.map(|c| to_color(c).premultiply().to_color_u8());
    let width = pixmap.width();
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (i, px) in pixmap.pixels().iter().enumerate() {
        let inked = match bg {
            Some(bg) => *px != bg,
            None => px.alpha() != 0,
        };
        if !inked {
            continue;
        }
        let x = i as u32 % width;
        let y = i as u32 / width;
        bounds = Some(match bounds {
            None => (x, y, x + 1, y + 1),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x + 1), y1.max(y + 1)),
        });
    }
    bounds
}

pub(crate) fn to_color(c: Rgba) -> Color {
    Color::from_rgba8(c.r, c.g, c.b, c.a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigdoc_core::StrokePoint;

    fn diagonal() -> Vec<Stroke> {
        vec![Stroke {
            points: (0..5)
                .map(|i| StrokePoint::new(20.0 + i as f32 * 20.0, 20.0 + i as f32 * 10.0, i * 20))
                .collect(),
        }]
    }

    #[test]
    fn raster_matches_physical_size() {
        let geometry = CanvasGeometry::new(600.0, 256.0, 2.0).unwrap();
        let image = rasterize(
            &diagonal(),
            &geometry,
            &InkStyle::default(),
            &CaptureConfig::default(),
            ImageFormat::Png,
        )
        .unwrap();
        assert_eq!((image.width_px, image.height_px), (1200, 512));
        assert_eq!(image.logical_size(), (600.0, 256.0));
        assert_eq!(&image.bytes[1..4], b"PNG");
    }

    #[test]
    fn empty_strokes_fail() {
        let geometry = CanvasGeometry::FALLBACK;
        let err = rasterize(
            &[Stroke::default()],
            &geometry,
            &InkStyle::default(),
            &CaptureConfig::default(),
            ImageFormat::Png,
        )
        .unwrap_err();
        assert_eq!(err, Error::EmptyCanvas);
    }

    #[test]
    fn jpeg_output_is_baseline_jpeg() {
        let geometry = CanvasGeometry::new(200.0, 100.0, 1.0).unwrap();
        let image = rasterize(
            &diagonal(),
            &geometry,
            &InkStyle {
                pen: Rgba::BLACK,
                background: None,
            },
            &CaptureConfig::default(),
            ImageFormat::Jpeg { quality: 0.9 },
        )
        .unwrap();
        assert_eq!(&image.bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn ink_lands_where_it_was_drawn() {
        let geometry = CanvasGeometry::new(200.0, 150.0, 1.0).unwrap();
        let style = InkStyle::default();
        let pixmap =
            render_strokes(&diagonal(), &geometry, &style, &CaptureConfig::default()).unwrap();
        let (x0, y0, x1, y1) = ink_pixel_bounds(&pixmap, style.background).unwrap();
        assert!((17..=20).contains(&x0) && (17..=20).contains(&y0));
        assert!((100..=104).contains(&x1) && (60..=64).contains(&y1));
    }

    #[test]
    fn blank_buffer_has_no_ink() {
        let style = InkStyle::default();
        let pixmap = blank_pixmap(&CanvasGeometry::FALLBACK, &style).unwrap();
        assert_eq!(ink_pixel_bounds(&pixmap, style.background), None);
    }
}
