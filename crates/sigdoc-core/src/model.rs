//! Core data model for signed agreements.
//!
//! Records come from the record source, strokes from the capture engine,
//! and a `Document` is the structured description handed to a renderer.
//! Stroke coordinates are always logical (device-independent) units; the
//! device pixel ratio only matters when a physical buffer is allocated.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ─── Records ─────────────────────────────────────────────────────────────

/// One employee/asset pairing eligible for an agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub name: String,
    pub asset_name: String,
    pub asset_id: String,
    /// Additional asset names listed on the agreement, in input order.
    #[serde(
        default,
        rename = "additionalAssets",
        skip_serializing_if = "SmallVec::is_empty"
    )]
    pub extra_items: SmallVec<[String; 2]>,
}

impl Record {
    pub fn new(name: &str, asset_name: &str, asset_id: &str) -> Self {
        Self {
            name: name.to_string(),
            asset_name: asset_name.to_string(),
            asset_id: asset_id.to_string(),
            extra_items: SmallVec::new(),
        }
    }

    pub fn with_extra_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_items.extend(items.into_iter().map(Into::into));
        self
    }

    /// First blank required field, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.name.trim().is_empty() {
            Some("name")
        } else if self.asset_name.trim().is_empty() {
            Some("assetName")
        } else if self.asset_id.trim().is_empty() {
            Some("assetId")
        } else {
            None
        }
    }

    pub fn ensure_complete(&self) -> Result<()> {
        match self.missing_field() {
            Some(field) => Err(Error::IncompleteRecord { field }),
            None => Ok(()),
        }
    }
}

// ─── Ink ─────────────────────────────────────────────────────────────────

/// A single sampled pointer position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokePoint {
    pub x: f32,
    pub y: f32,
    /// 0.0 ..= 1.0. Mouse input reports 1.0.
    #[serde(default = "default_pressure")]
    pub pressure: f32,
    pub timestamp_ms: u64,
}

fn default_pressure() -> f32 {
    1.0
}

impl StrokePoint {
    pub const fn new(x: f32, y: f32, timestamp_ms: u64) -> Self {
        Self {
            x,
            y,
            pressure: 1.0,
            timestamp_ms,
        }
    }

    pub const fn with_pressure(mut self, pressure: f32) -> Self {
        self.pressure = pressure;
        self
    }

    pub fn distance_to(&self, other: &StrokePoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One continuous pointer-down-to-up ink path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub points: Vec<StrokePoint>,
}

impl Stroke {
    pub fn new(first: StrokePoint) -> Self {
        Self {
            points: vec![first],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&StrokePoint> {
        self.points.last()
    }
}

/// Capture-engine state as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureState {
    Empty,
    InProgress,
    Captured,
}

// ─── Geometry ────────────────────────────────────────────────────────────

/// Logical canvas size plus the device pixel ratio used for its backing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasGeometry {
    pub logical_width: f32,
    pub logical_height: f32,
    pub device_pixel_ratio: f32,
}

impl CanvasGeometry {
    /// Minimum default used when a container cannot be measured.
    pub const FALLBACK: CanvasGeometry = CanvasGeometry {
        logical_width: 300.0,
        logical_height: 150.0,
        device_pixel_ratio: 1.0,
    };

    pub fn new(logical_width: f32, logical_height: f32, device_pixel_ratio: f32) -> Result<Self> {
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if !valid(logical_width) || !valid(logical_height) || !valid(device_pixel_ratio) {
            return Err(Error::GeometryInit {
                width: logical_width,
                height: logical_height,
                dpr: device_pixel_ratio,
            });
        }
        let geometry = Self {
            logical_width,
            logical_height,
            device_pixel_ratio,
        };
        let (w, h) = geometry.physical_size();
        if w == 0 || h == 0 {
            return Err(Error::GeometryInit {
                width: logical_width,
                height: logical_height,
                dpr: device_pixel_ratio,
            });
        }
        Ok(geometry)
    }

    /// Like [`CanvasGeometry::new`] but falls back to [`CanvasGeometry::FALLBACK`].
    pub fn or_fallback(logical_width: f32, logical_height: f32, device_pixel_ratio: f32) -> Self {
        match Self::new(logical_width, logical_height, device_pixel_ratio) {
            Ok(geometry) => geometry,
            Err(err) => {
                log::warn!("{err}; using {}x{} fallback", Self::FALLBACK.logical_width, Self::FALLBACK.logical_height);
                Self::FALLBACK
            }
        }
    }

    /// Backing-buffer size in device pixels.
    pub fn physical_size(&self) -> (u32, u32) {
        let w = (self.logical_width * self.device_pixel_ratio).round();
        let h = (self.logical_height * self.device_pixel_ratio).round();
        (w.max(0.0) as u32, h.max(0.0) as u32)
    }
}

// ─── Raster images ───────────────────────────────────────────────────────

/// Encoded still-image format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ImageFormat {
    /// Lossless; the interchange format for signatures.
    Png,
    /// Lossy; `quality` in 0.0 ..= 1.0.
    Jpeg { quality: f32 },
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg { .. } => "image/jpeg",
        }
    }
}

/// An encoded raster together with the pixel ratio it was produced at.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub format: ImageFormat,
    pub width_px: u32,
    pub height_px: u32,
    pub device_pixel_ratio: f32,
    pub bytes: Vec<u8>,
}

impl RasterImage {
    /// Natural size in logical (CSS) pixels.
    pub fn logical_size(&self) -> (f32, f32) {
        let dpr = if self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        };
        (self.width_px as f32 / dpr, self.height_px as f32 / dpr)
    }
}

// ─── Documents ───────────────────────────────────────────────────────────

/// How the rendered bytes are consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Inline display; must not persist anything.
    Preview,
    /// Persist the bytes to the user's device.
    Download,
}

/// A run of text with optional emphasis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
        }
    }
}

pub type Paragraph = Vec<Span>;

/// A labelled value in the details block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub label: String,
    pub value: String,
}

/// Where the signature goes in the signature block.
#[derive(Debug, Clone, PartialEq)]
pub enum SignatureSlot {
    /// Draw [`Document::signature`] at this display size (points).
    Image { width_pt: f32, height_pt: f32 },
    /// No signature; render the marker text instead.
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureBlock {
    pub label: String,
    pub slot: SignatureSlot,
    pub signer: String,
    pub date_label: String,
}

/// One block of the agreement, top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Header { title: String, date_line: String },
    Details { heading: String, fields: Vec<Field> },
    Body { paragraphs: Vec<Paragraph> },
    Signature(SignatureBlock),
    Footer { text: String },
}

/// A fully assembled agreement. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    record: Record,
    signature: Option<RasterImage>,
    generated_at: NaiveDate,
    sections: Vec<Section>,
}

impl Document {
    pub(crate) fn new(
        record: Record,
        signature: Option<RasterImage>,
        generated_at: NaiveDate,
        sections: Vec<Section>,
    ) -> Self {
        Self {
            record,
            signature,
            generated_at,
            sections,
        }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn signature(&self) -> Option<&RasterImage> {
        self.signature.as_ref()
    }

    pub fn generated_at(&self) -> NaiveDate {
        self.generated_at
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn signature_block(&self) -> Option<&SignatureBlock> {
        self.sections.iter().find_map(|s| match s {
            Section::Signature(block) => Some(block),
            _ => None,
        })
    }

    /// `Asset_Agreement_<name>_<assetId>_<YYYY-MM-DD>.pdf`, with every
    /// non-alphanumeric character of the name replaced by `_`. Path
    /// separators and characters no filesystem accepts are replaced in
    /// the asset id as well.
    pub fn filename(&self) -> String {
        let name: String = self
            .record
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let asset_id: String = self
            .record
            .asset_id
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        format!(
            "Asset_Agreement_{}_{}_{}.pdf",
            name,
            asset_id,
            self.generated_at.format("%Y-%m-%d")
        )
    }
}
