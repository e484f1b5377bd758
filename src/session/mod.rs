//! One capture session: connectivity, the two-stage inference pipeline, the
//! customer journey and its history.

pub mod auto_capture;
pub mod controller;
pub mod error;
pub mod events;
pub mod state;

pub use controller::SessionController;
pub use error::SessionError;
pub use events::{EventBus, Notice, NoticeKind, SessionEvent};
pub use state::{Connectivity, SessionSnapshot, SessionState, HISTORY_LIMIT};
