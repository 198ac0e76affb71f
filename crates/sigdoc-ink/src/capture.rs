//! Stroke capture engine.
//!
//! Records strokes in logical units, throttles and sanitizes samples, and
//! produces (and caches) the encoded raster of the signature.

use sigdoc_core::{CanvasGeometry, ImageFormat, RasterImage, Result, SignatureState, Stroke, StrokePoint};
use sigdoc_render::{CaptureConfig, InkStyle, rasterize};

#[derive(Debug, Clone)]
struct CachedRaster {
    geometry: CanvasGeometry,
    format: ImageFormat,
    image: RasterImage,
}

#[derive(Debug, Clone, Default)]
pub struct StrokeCapture {
    config: CaptureConfig,
    style: InkStyle,
    strokes: Vec<Stroke>,
    open: bool,
    raster: Option<CachedRaster>,
}

impl StrokeCapture {
    pub fn new(config: CaptureConfig, style: InkStyle) -> Self {
        Self {
            config,
            style,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn style(&self) -> &InkStyle {
        &self.style
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    /// The stroke currently being drawn.
    pub fn open_stroke(&self) -> Option<&Stroke> {
        if self.open { self.strokes.last() } else { None }
    }

    pub fn is_drawing(&self) -> bool {
        self.open
    }

    /// True iff no stroke has a point.
    pub fn is_empty(&self) -> bool {
        self.strokes.iter().all(Stroke::is_empty)
    }

    pub fn state(&self) -> SignatureState {
        if self.is_empty() {
            SignatureState::Empty
        } else if self.raster.is_some() {
            SignatureState::Captured
        } else {
            SignatureState::InProgress
        }
    }

    /// Start a stroke. Ignored while one is open or for unusable points.
    pub fn begin_stroke(&mut self, point: StrokePoint) -> bool {
        if self.open {
            return false;
        }
        let Some(point) = sanitize(point, None) else {
            return false;
        };
        self.strokes.push(Stroke::new(point));
        self.open = true;
        self.raster = None;
        log::trace!("stroke {} begins at ({}, {})", self.strokes.len(), point.x, point.y);
        true
    }

    /// Append a sample to the open stroke.
    ///
    /// Accepted when the pointer moved at least `min_distance` or at least
    /// `throttle_ms` elapsed since the last accepted sample. Exact repeats
    /// of the last position are always dropped.
    pub fn extend_stroke(&mut self, point: StrokePoint) -> bool {
        if !self.open {
            return false;
        }
        let config = self.config;
        let Some(stroke) = self.strokes.last_mut() else {
            return false;
        };
        let last = stroke.last().copied();
        let Some(point) = sanitize(point, last.as_ref()) else {
            return false;
        };
        if let Some(last) = last {
            if point.x == last.x && point.y == last.y {
                return false;
            }
            let far_enough = point.distance_to(&last) >= config.min_distance;
            let late_enough = point.timestamp_ms - last.timestamp_ms >= config.throttle_ms;
            if !far_enough && !late_enough {
                return false;
            }
        }
        stroke.points.push(point);
        self.raster = None;
        true
    }

    /// Close the open stroke. No-op if none.
    pub fn end_stroke(&mut self) -> bool {
        if !self.open {
            return false;
        }
        self.open = false;
        self.raster = None;
        log::trace!(
            "stroke {} ends with {} points",
            self.strokes.len(),
            self.strokes.last().map_or(0, |s| s.points.len())
        );
        true
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
        self.open = false;
        self.raster = None;
    }

    /// Replace everything with previously captured strokes.
    pub fn load(&mut self, strokes: Vec<Stroke>) {
        self.strokes = strokes.into_iter().filter(|s| !s.is_empty()).collect();
        self.open = false;
        self.raster = None;
    }

    /// Encoded signature at `geometry`. Reused until the strokes change.
    pub fn to_raster(&mut self, geometry: CanvasGeometry, format: ImageFormat) -> Result<RasterImage> {
        if let Some(cached) = &self.raster
            && cached.geometry == geometry
            && cached.format == format
        {
            return Ok(cached.image.clone());
        }
        let image = rasterize(&self.strokes, &geometry, &self.style, &self.config, format)?;
        self.raster = Some(CachedRaster {
            geometry,
            format,
            image: image.clone(),
        });
        Ok(image)
    }
}

/// Drop non-finite positions, normalize pressure, keep time monotonic.
fn sanitize(mut point: StrokePoint, last: Option<&StrokePoint>) -> Option<StrokePoint> {
    if !point.is_finite() {
        log::trace!("dropping non-finite sample");
        return None;
    }
    point.pressure = if point.pressure.is_finite() && point.pressure > 0.0 {
        point.pressure.min(1.0)
    } else {
        1.0
    };
    if let Some(last) = last {
        point.timestamp_ms = point.timestamp_ms.max(last.timestamp_ms);
    }
    Some(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn engine() -> StrokeCapture {
        StrokeCapture::new(CaptureConfig::default(), InkStyle::default())
    }

    #[test]
    fn begin_while_open_is_ignored() {
        let mut c = engine();
        assert!(c.begin_stroke(StrokePoint::new(1.0, 1.0, 0)));
        assert!(!c.begin_stroke(StrokePoint::new(9.0, 9.0, 5)));
        assert_eq!(c.strokes().len(), 1);
    }

    #[test]
    fn throttle_accepts_on_distance_or_time() {
        let mut c = engine();
        c.begin_stroke(StrokePoint::new(0.0, 0.0, 0));
        // Too close, too soon.
        assert!(!c.extend_stroke(StrokePoint::new(1.0, 0.0, 4)));
        // Far enough.
        assert!(c.extend_stroke(StrokePoint::new(6.0, 0.0, 8)));
        // Close but late enough.
        assert!(c.extend_stroke(StrokePoint::new(7.0, 0.0, 30)));
        // Exact repeat, however late.
        assert!(!c.extend_stroke(StrokePoint::new(7.0, 0.0, 500)));
        assert_eq!(c.strokes()[0].points.len(), 3);
    }

    #[test]
    fn unusable_samples_are_dropped_or_normalized() {
        let mut c = engine();
        assert!(!c.begin_stroke(StrokePoint::new(f32::NAN, 0.0, 0)));
        assert!(c.begin_stroke(StrokePoint::new(0.0, 0.0, 10).with_pressure(0.0)));
        assert!(c.extend_stroke(StrokePoint::new(20.0, 0.0, 5).with_pressure(7.0)));
        let points = &c.strokes()[0].points;
        assert_eq!(points[0].pressure, 1.0);
        assert_eq!(points[1].pressure, 1.0);
        assert_eq!(points[1].timestamp_ms, 10);
    }

    #[test]
    fn end_without_open_stroke_is_noop() {
        let mut c = engine();
        assert!(!c.end_stroke());
        assert!(!c.extend_stroke(StrokePoint::new(1.0, 1.0, 0)));
        assert!(c.is_empty());
    }

    #[test]
    fn raster_is_cached_until_mutation() {
        let mut c = engine();
        let geometry = CanvasGeometry::new(200.0, 100.0, 1.0).unwrap();
        c.begin_stroke(StrokePoint::new(10.0, 10.0, 0));
        c.extend_stroke(StrokePoint::new(60.0, 40.0, 30));
        c.end_stroke();
        assert_eq!(c.state(), SignatureState::InProgress);

        let a = c.to_raster(geometry, ImageFormat::Png).unwrap();
        assert_eq!(c.state(), SignatureState::Captured);
        let b = c.to_raster(geometry, ImageFormat::Png).unwrap();
        assert_eq!(a, b);

        c.begin_stroke(StrokePoint::new(100.0, 50.0, 100));
        assert_eq!(c.state(), SignatureState::InProgress);
    }

    #[test]
    fn clear_empties_everything() {
        let mut c = engine();
        let geometry = CanvasGeometry::FALLBACK;
        c.begin_stroke(StrokePoint::new(10.0, 10.0, 0));
        c.end_stroke();
        c.to_raster(geometry, ImageFormat::Png).unwrap();
        c.clear();
        assert!(c.is_empty());
        assert_eq!(c.state(), SignatureState::Empty);
        assert_eq!(
            c.to_raster(geometry, ImageFormat::Png).unwrap_err(),
            sigdoc_core::Error::EmptyCanvas
        );
    }
}
