pub mod backend;
pub mod gate;
pub mod ink;
pub mod pdf;
pub mod raster;
pub mod surface;

pub use backend::{DirectorySink, DownloadSink, MemorySink, RenderBackend, RenderOutput};
pub use gate::{RenderGate, RenderTicket};
pub use ink::{CaptureConfig, InkMark, InkSegment, InkStyle, Rgba, stroke_marks};
pub use pdf::{PdfBackend, build_pdf};
pub use raster::{ink_pixel_bounds, rasterize};
pub use surface::InkSurface;
