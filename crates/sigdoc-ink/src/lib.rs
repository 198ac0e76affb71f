pub mod capture;
pub mod flow;
pub mod input;
pub mod session;

pub use capture::StrokeCapture;
pub use flow::{AgreementFlow, PendingRender, Step};
pub use input::InputEvent;
pub use session::{CommittedSignature, Phase, SigningSession};
