pub mod classify;
pub mod compose;
pub mod keys;
mod logging;
pub mod pty_session;
pub mod terminal_restore;

pub use logging::{debug_enabled, format_debug_bytes, init_logging, log_debug, log_panic};
