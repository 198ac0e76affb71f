//! Signing session controller.
//!
//! Owns the capture engine and the live backing buffer for one signing
//! modal. Phases: `Idle → Opened ⇄ Drawing → Finalized | Cancelled`.
//! The buffer exists only while the session is open and nothing else
//! writes to it.

use crate::capture::StrokeCapture;
use crate::input::InputEvent;
use sigdoc_core::{
    CanvasGeometry, Error, ImageFormat, RasterImage, Result, SessionId, SignatureState, Stroke,
    StrokePoint,
};
use sigdoc_render::{CaptureConfig, InkStyle, InkSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Open with no completed stroke.
    Opened,
    /// Open with at least one completed stroke. A stroke in progress does
    /// not change the phase.
    Drawing,
    Finalized,
    Cancelled,
}

impl Phase {
    pub fn is_open(self) -> bool {
        matches!(self, Phase::Opened | Phase::Drawing)
    }
}

/// A finalized signature. Strokes are kept so the signature can be
/// re-edited without loss.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedSignature {
    pub strokes: Vec<Stroke>,
    pub image: RasterImage,
    pub geometry: CanvasGeometry,
}

pub struct SigningSession {
    id: SessionId,
    phase: Phase,
    capture: StrokeCapture,
    geometry: CanvasGeometry,
    surface: Option<InkSurface>,
}

impl SigningSession {
    pub fn new(config: CaptureConfig, style: InkStyle) -> Self {
        Self {
            id: SessionId::next(),
            phase: Phase::Idle,
            capture: StrokeCapture::new(config, style),
            geometry: CanvasGeometry::FALLBACK,
            surface: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> SignatureState {
        self.capture.state()
    }

    pub fn geometry(&self) -> CanvasGeometry {
        self.geometry
    }

    pub fn capture(&self) -> &StrokeCapture {
        &self.capture
    }

    pub fn surface(&self) -> Option<&InkSurface> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut InkSurface> {
        self.surface.as_mut()
    }

    /// Open the modal at `geometry`, starting from `prior` when re-editing.
    ///
    /// Already-open sessions are left alone. Opening after a finalize or
    /// cancel starts a new session id. If the buffer cannot be allocated
    /// at `geometry`, the fallback size is used instead.
    pub fn open(&mut self, geometry: CanvasGeometry, prior: Option<&CommittedSignature>) {
        if self.phase.is_open() {
            return;
        }
        if matches!(self.phase, Phase::Finalized | Phase::Cancelled) {
            self.id = SessionId::next();
        }
        match prior {
            Some(sig) => self.capture.load(sig.strokes.clone()),
            None => self.capture.clear(),
        }
        self.surface = self.allocate(geometry);
        self.phase = if self.capture.is_empty() {
            Phase::Opened
        } else {
            Phase::Drawing
        };
        log::debug!("{} opened at {:?}", self.id, self.geometry);
    }

    /// Apply one input event. Returns whether anything changed.
    pub fn handle(&mut self, event: &InputEvent) -> bool {
        if !self.phase.is_open() {
            return false;
        }
        let drawing = self.capture.is_drawing();
        match event {
            InputEvent::PointerDown { .. } if !drawing => {
                let Some(point) = event.sample() else {
                    return false;
                };
                if !self.capture.begin_stroke(self.clamp(point)) {
                    return false;
                }
                self.paint_open_stroke();
                true
            }
            InputEvent::PointerMove { .. } if drawing => {
                let Some(point) = event.sample() else {
                    return false;
                };
                if !self.capture.extend_stroke(self.clamp(point)) {
                    return false;
                }
                self.paint_open_stroke();
                true
            }
            InputEvent::PointerUp { .. } if drawing => {
                if let Some(point) = event.sample() {
                    self.capture.extend_stroke(self.clamp(point));
                }
                self.close_stroke();
                true
            }
            InputEvent::PointerCancel if drawing => {
                self.close_stroke();
                true
            }
            InputEvent::Resize {
                width,
                height,
                device_pixel_ratio,
            } => {
                let geometry = CanvasGeometry::or_fallback(*width, *height, *device_pixel_ratio);
                self.resize(geometry)
            }
            _ => false,
        }
    }

    /// Wipe all ink; the modal stays open.
    pub fn clear(&mut self) {
        if !self.phase.is_open() {
            return;
        }
        self.capture.clear();
        if let Some(surface) = &mut self.surface {
            surface.clear();
        }
        self.phase = Phase::Opened;
    }

    /// Commit the drawing as a lossless raster.
    ///
    /// Fails with `EmptyCanvas` if nothing was drawn; the session stays
    /// open so the user can try again.
    pub fn finalize(&mut self) -> Result<CommittedSignature> {
        if !self.phase.is_open() {
            return Err(Error::EmptyCanvas);
        }
        if self.capture.is_empty() {
            log::debug!("{} finalize rejected: empty canvas", self.id);
            return Err(Error::EmptyCanvas);
        }
        if self.capture.is_drawing() {
            self.close_stroke();
        }
        let image = self.capture.to_raster(self.geometry, ImageFormat::Png)?;
        let committed = CommittedSignature {
            strokes: self.capture.strokes().to_vec(),
            image,
            geometry: self.geometry,
        };
        self.phase = Phase::Finalized;
        self.release();
        Ok(committed)
    }

    /// Abort the modal. Uncommitted strokes are discarded; the caller keeps
    /// whatever signature it already had.
    pub fn cancel(&mut self) {
        if !self.phase.is_open() {
            return;
        }
        self.capture.clear();
        self.phase = Phase::Cancelled;
        self.release();
    }

    fn allocate(&mut self, geometry: CanvasGeometry) -> Option<InkSurface> {
        let config = *self.capture.config();
        let style = *self.capture.style();
        let surface = match InkSurface::new(geometry, style, config) {
            Ok(surface) => {
                self.geometry = geometry;
                Ok(surface)
            }
            Err(err) => {
                log::warn!("{err}; using fallback canvas size");
                self.geometry = CanvasGeometry::FALLBACK;
                InkSurface::new(CanvasGeometry::FALLBACK, style, config)
            }
        };
        match surface {
            Ok(mut surface) => {
                surface.replay(self.capture.strokes());
                Some(surface)
            }
            Err(err) => {
                log::error!("cannot allocate canvas: {err}");
                None
            }
        }
    }

    fn resize(&mut self, geometry: CanvasGeometry) -> bool {
        if geometry == self.geometry {
            return false;
        }
        let drawing = self.capture.is_drawing();
        let Some(surface) = &mut self.surface else {
            return false;
        };
        match surface.resize(geometry, self.capture.strokes(), drawing) {
            Ok(()) => {
                log::debug!("{} resized to {:?}", self.id, geometry);
                self.geometry = geometry;
                true
            }
            Err(err) => {
                log::warn!("{err}; keeping {:?}", self.geometry);
                false
            }
        }
    }

    /// Pin a sample to the canvas plus one maximum line width on every
    /// side. Ink beyond that is never visible.
    fn clamp(&self, mut point: StrokePoint) -> StrokePoint {
        let max_width = self.capture.config().max_width;
        let margin = if max_width.is_finite() && max_width > 0.0 {
            max_width
        } else {
            0.0
        };
        point.x = point.x.clamp(-margin, self.geometry.logical_width + margin);
        point.y = point.y.clamp(-margin, self.geometry.logical_height + margin);
        point
    }

    fn paint_open_stroke(&mut self) {
        if let (Some(surface), Some(stroke)) = (&mut self.surface, self.capture.open_stroke()) {
            surface.extend(stroke);
        }
    }

    fn close_stroke(&mut self) {
        self.capture.end_stroke();
        if let (Some(surface), Some(stroke)) = (&mut self.surface, self.capture.strokes().last()) {
            surface.finish(stroke);
        }
        self.phase = if self.capture.is_empty() {
            Phase::Opened
        } else {
            Phase::Drawing
        };
    }

    fn release(&mut self) {
        if self.surface.take().is_some() {
            log::debug!("{} released its canvas", self.id);
        }
    }
}
