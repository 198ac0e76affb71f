//! Error taxonomy shared by every sigdoc crate.
//!
//! Capture and session errors are meant to be handled locally and turned
//! into UI state; render errors are surfaced with a retry affordance.

use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Finalize or raster requested while no stroke has been drawn.
    #[error("please provide a signature before saving")]
    EmptyCanvas,

    /// A required record field is blank.
    #[error("required field `{field}` is empty")]
    IncompleteRecord {
        /// Field name as shown to the user (`name`, `assetName`, `assetId`).
        field: &'static str,
    },

    /// The render backend failed; no partial output was produced.
    #[error("failed to generate document: {0}")]
    Render(String),

    /// The backing buffer could not be sized for the given container.
    #[error("cannot size canvas to {width}x{height} @ {dpr}x")]
    GeometryInit { width: f32, height: f32, dpr: f32 },

    /// A render request is already running; duplicates are rejected.
    #[error("a document is already being generated")]
    RenderInFlight,

    /// Output was requested before a signature was finalized.
    #[error("please add your signature before generating the agreement")]
    SignatureRequired,

    /// The uploaded record source could not be used.
    #[error("{0}")]
    RecordSource(String),
}

impl Error {
    /// Whether the user can retry the same action without redoing earlier steps.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Render(_) | Error::RenderInFlight)
    }
}
