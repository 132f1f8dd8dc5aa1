pub mod handlers;
pub mod render;
pub mod session;
pub mod types;

pub use handlers::*;
pub use session::Session;
pub use types::{ImageParams, SessionView, ShuffleForm};
