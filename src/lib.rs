pub mod analytics;
pub mod backend;
mod cli;
pub mod frame;
pub mod models;
pub mod session;
pub mod settings;
pub mod utils;

pub use cli::run;
pub use session::{SessionController, SessionError, SessionEvent};
