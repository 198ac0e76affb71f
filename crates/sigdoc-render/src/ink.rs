//! Variable-width ink geometry.
//!
//! Turns logical stroke points into marks: quadratic Bézier segments
//! through point midpoints with a width at each end, or a dot for a
//! single-point stroke. Every renderer (CPU raster, live surface, the
//! browser canvas) consumes the same marks so they agree pixel-for-pixel
//! up to anti-aliasing.

use kurbo::{ParamCurve, ParamCurveArclen, Point, QuadBez};
use serde::{Deserialize, Serialize};
use sigdoc_core::{Stroke, StrokePoint};

/// Capture tuning. Defaults reproduce a classic signature pad.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// Narrowest line, logical px.
    pub min_width: f32,
    /// Widest line, logical px.
    pub max_width: f32,
    /// A move is accepted once this much time has passed...
    pub throttle_ms: u64,
    /// ...or once the pointer travelled this far (logical px).
    pub min_distance: f32,
    /// Weight of the newest velocity sample in the low-pass filter.
    pub velocity_filter_weight: f32,
    /// Diameter of a single-point stroke. `None` = midway between widths.
    pub dot_size: Option<f32>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            min_width: 1.0,
            max_width: 3.0,
            throttle_ms: 16,
            min_distance: 5.0,
            velocity_filter_weight: 0.7,
            dot_size: None,
        }
    }
}

impl CaptureConfig {
    pub fn dot_diameter(&self) -> f32 {
        self.dot_size
            .unwrap_or((self.min_width + self.max_width) / 2.0)
    }

    fn clamp_width(&self, width: f32) -> f32 {
        width.clamp(self.min_width, self.max_width.max(self.min_width))
    }
}

/// Straight RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);
    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

/// Pen and paper colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InkStyle {
    pub pen: Rgba,
    /// `None` leaves the buffer transparent.
    pub background: Option<Rgba>,
}

impl Default for InkStyle {
    fn default() -> Self {
        Self {
            pen: Rgba::BLACK,
            background: Some(Rgba::WHITE),
        }
    }
}

/// A Bézier piece of a stroke with the line width at each end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InkSegment {
    pub curve: QuadBez,
    pub start_width: f64,
    pub end_width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InkMark {
    Dot { center: Point, diameter: f64 },
    Segment(InkSegment),
}

/// Upper bound on discs per mark.
pub const MAX_DISCS: usize = 1 << 16;

impl InkMark {
    /// Filled discs `(center, radius)` covering the mark, spaced at most
    /// `spacing` logical units apart. Never more than [`MAX_DISCS`].
    pub fn discs(&self, spacing: f64) -> Vec<(Point, f64)> {
        match *self {
            InkMark::Dot { center, diameter } => vec![(center, diameter / 2.0)],
            InkMark::Segment(seg) => {
                let spacing = if spacing > 0.0 { spacing } else { 1.0 };
                let len = seg.curve.arclen(0.01);
                let steps = (len / spacing).ceil().clamp(1.0, MAX_DISCS as f64) as usize;
                (0..=steps)
                    .map(|k| {
                        let t = k as f64 / steps as f64;
                        let width = seg.start_width + (seg.end_width - seg.start_width) * t;
                        (seg.curve.eval(t), width / 2.0)
                    })
                    .collect()
            }
        }
    }
}

/// Line width at every point from the filtered pointer velocity and
/// pressure.
pub fn point_widths(points: &[StrokePoint], config: &CaptureConfig) -> Vec<f32> {
    let weight = config.velocity_filter_weight.clamp(0.0, 1.0);
    let mut widths = Vec::with_capacity(points.len());
    let mut velocity = 0.0f32;
    for (i, point) in points.iter().enumerate() {
        let pressure = 0.5 + 0.5 * point.pressure.clamp(0.0, 1.0);
        if i == 0 {
            let start = (config.min_width + config.max_width) / 2.0;
            widths.push(config.clamp_width(start * pressure));
            continue;
        }
        let prev = &points[i - 1];
        let dt = point.timestamp_ms.saturating_sub(prev.timestamp_ms);
        if dt > 0 {
            let raw = point.distance_to(prev) / dt as f32;
            velocity = weight * raw + (1.0 - weight) * velocity;
        }
        widths.push(config.clamp_width(config.max_width / (1.0 + velocity) * pressure));
    }
    widths
}

/// Marks for one stroke.
///
/// An open stroke (pointer still down) omits the final half-segment,
/// whose shape depends on points not yet seen; every mark it does return
/// is final.
pub fn stroke_marks(stroke: &Stroke, config: &CaptureConfig, closed: bool) -> Vec<InkMark> {
    let points = &stroke.points;
    match points.len() {
        0 => return Vec::new(),
        1 => {
            return if closed {
                vec![InkMark::Dot {
                    center: to_point(&points[0]),
                    diameter: config.dot_diameter() as f64,
                }]
            } else {
                Vec::new()
            };
        }
        _ => {}
    }

    let widths: Vec<f64> = point_widths(points, config)
        .into_iter()
        .map(f64::from)
        .collect();
    let pts: Vec<Point> = points.iter().map(to_point).collect();
    let n = pts.len();
    let mid = |i: usize| pts[i].midpoint(pts[i + 1]);
    let mid_width = |i: usize| (widths[i] + widths[i + 1]) / 2.0;

    let mut marks = Vec::with_capacity(n + 1);
    marks.push(InkMark::Segment(InkSegment {
        curve: line(pts[0], mid(0)),
        start_width: widths[0],
        end_width: mid_width(0),
    }));
    for i in 1..n - 1 {
        marks.push(InkMark::Segment(InkSegment {
            curve: QuadBez::new(mid(i - 1), pts[i], mid(i)),
            start_width: mid_width(i - 1),
            end_width: mid_width(i),
        }));
    }
    if closed {
        marks.push(InkMark::Segment(InkSegment {
            curve: line(mid(n - 2), pts[n - 1]),
            start_width: mid_width(n - 2),
            end_width: widths[n - 1],
        }));
    }
    marks
}

fn to_point(p: &StrokePoint) -> Point {
    Point::new(p.x as f64, p.y as f64)
}

fn line(from: Point, to: Point) -> QuadBez {
    QuadBez::new(from, from.midpoint(to), to)
}
