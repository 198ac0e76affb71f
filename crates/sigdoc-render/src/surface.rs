//! Live backing buffer for the signing canvas.
//!
//! Holds a physical-resolution pixmap and draws ink incrementally while a
//! stroke is open: only marks that can no longer change are painted, the
//! trailing half-segment is painted when the stroke closes. A resize
//! reallocates the buffer and replays logical strokes.

use crate::ink::{CaptureConfig, InkStyle, stroke_marks};
use crate::raster::{self, blank_pixmap, fill_marks};
use sigdoc_core::{CanvasGeometry, Result, Stroke};
use tiny_skia::Pixmap;

pub struct InkSurface {
    geometry: CanvasGeometry,
    style: InkStyle,
    config: CaptureConfig,
    pixmap: Pixmap,
    /// Marks of the open stroke already on the buffer.
    painted: usize,
    dirty: bool,
}

impl InkSurface {
    pub fn new(geometry: CanvasGeometry, style: InkStyle, config: CaptureConfig) -> Result<Self> {
        let pixmap = blank_pixmap(&geometry, &style)?;
        log::debug!(
            "surface allocated at {}x{}",
            pixmap.width(),
            pixmap.height()
        );
        Ok(Self {
            geometry,
            style,
            config,
            pixmap,
            painted: 0,
            dirty: true,
        })
    }

    pub fn geometry(&self) -> CanvasGeometry {
        self.geometry
    }

    pub fn style(&self) -> &InkStyle {
        &self.style
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Straight (non-premultiplied) RGBA bytes, row-major, as canvas
    /// `ImageData` expects.
    pub fn to_rgba(&self) -> Vec<u8> {
        if self.style.background.is_some_and(|bg| bg.a == u8::MAX) {
            return self.pixmap.data().to_vec();
        }
        self.pixmap
            .pixels()
            .iter()
            .flat_map(|px| {
                let c = px.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect()
    }

    /// True once since the last call if pixels changed.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn clear(&mut self) {
        match self.style.background {
            Some(bg) => self.pixmap.fill(raster::to_color(bg)),
            None => self.pixmap.fill(tiny_skia::Color::TRANSPARENT),
        }
        self.painted = 0;
        self.dirty = true;
    }

    /// Paint whatever part of the open stroke became final.
    pub fn extend(&mut self, stroke: &Stroke) {
        let marks = stroke_marks(stroke, &self.config, false);
        self.paint_from(&marks);
    }

    /// Paint the remainder of a stroke that just closed.
    pub fn finish(&mut self, stroke: &Stroke) {
        let marks = stroke_marks(stroke, &self.config, true);
        self.paint_from(&marks);
        self.painted = 0;
    }

    /// Redraw from scratch.
    pub fn replay(&mut self, strokes: &[Stroke]) {
        self.clear();
        for stroke in strokes {
            self.finish(stroke);
        }
    }

    /// Reallocate at `geometry` and replay `strokes`. When `last_open` is
    /// set the final stroke is still being drawn and is replayed as such.
    /// On failure the old buffer is kept.
    pub fn resize(
        &mut self,
        geometry: CanvasGeometry,
        strokes: &[Stroke],
        last_open: bool,
    ) -> Result<()> {
        self.pixmap = blank_pixmap(&geometry, &self.style)?;
        self.geometry = geometry;
        self.painted = 0;
        self.dirty = true;
        let (open, closed) = match strokes.split_last() {
            Some((last, rest)) if last_open => (Some(last), rest),
            _ => (None, strokes),
        };
        for stroke in closed {
            self.finish(stroke);
        }
        if let Some(stroke) = open {
            self.extend(stroke);
        }
        Ok(())
    }

    fn paint_from(&mut self, marks: &[crate::ink::InkMark]) {
        if marks.len() <= self.painted {
            return;
        }
        fill_marks(
            &mut self.pixmap,
            &marks[self.painted..],
            self.geometry.device_pixel_ratio,
            self.style.pen,
        );
        self.painted = marks.len();
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::ink_pixel_bounds;
    use sigdoc_core::StrokePoint;

    fn surface(w: f32, h: f32, dpr: f32) -> InkSurface {
        InkSurface::new(
            CanvasGeometry::new(w, h, dpr).unwrap(),
            InkStyle::default(),
            CaptureConfig::default(),
        )
        .unwrap()
    }

    fn line() -> Stroke {
        Stroke {
            points: vec![
                StrokePoint::new(10.0, 10.0, 0),
                StrokePoint::new(30.0, 10.0, 20),
                StrokePoint::new(50.0, 10.0, 40),
            ],
        }
    }

    #[test]
    fn open_stroke_is_painted_up_to_its_last_midpoint() {
        let mut s = surface(100.0, 40.0, 1.0);
        s.extend(&line());
        let (_, _, x1, _) = ink_pixel_bounds(s.pixmap(), s.style().background).unwrap();
        assert!(x1 <= 43);
        s.finish(&line());
        let (_, _, x1, _) = ink_pixel_bounds(s.pixmap(), s.style().background).unwrap();
        assert!(x1 >= 50);
    }

    #[test]
    fn resize_reallocates_at_physical_size() {
        let mut s = surface(100.0, 40.0, 1.0);
        s.finish(&line());
        s.resize(CanvasGeometry::new(100.0, 40.0, 3.0).unwrap(), &[line()], false)
            .unwrap();
        assert_eq!((s.pixmap().width(), s.pixmap().height()), (300, 120));
        assert!(ink_pixel_bounds(s.pixmap(), s.style().background).is_some());
    }

    #[test]
    fn transparent_surface_exports_straight_alpha() {
        let mut s = InkSurface::new(
            CanvasGeometry::new(20.0, 20.0, 1.0).unwrap(),
            InkStyle {
                pen: crate::ink::Rgba::opaque(200, 0, 0),
                background: None,
            },
            CaptureConfig {
                dot_size: Some(8.0),
                ..CaptureConfig::default()
            },
        )
        .unwrap();
        s.finish(&Stroke::new(StrokePoint::new(10.0, 10.0, 0)));
        let rgba = s.to_rgba();
        assert_eq!(rgba.len(), 20 * 20 * 4);
        let center = (10 * 20 + 10) * 4;
        assert_eq!(&rgba[center..center + 4], &[200, 0, 0, 255]);
        assert_eq!(&rgba[..4], &[0, 0, 0, 0]);
    }

    #[test]
    fn clear_blanks_the_buffer() {
        let mut s = surface(100.0, 40.0, 2.0);
        s.finish(&line());
        assert!(s.take_dirty());
        assert!(!s.take_dirty());
        s.clear();
        assert!(s.take_dirty());
        assert!(ink_pixel_bounds(s.pixmap(), s.style().background).is_none());
    }
}
