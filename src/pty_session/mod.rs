//! PTY wrapper that hosts the child program in a real terminal so its own
//! input layer behaves exactly as it would without the proxy in front.

mod io;
mod pty;

#[cfg(test)]
mod tests;

pub use io::write_all;
pub use pty::{ChildExit, PtyProxySession};
