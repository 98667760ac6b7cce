//! Debug trace sink for the proxy.
//!
//! All diagnostics go to stderr and only when `--debug` is on; stdout
//! belongs exclusively to the child program's output.

use std::{
    io::{self, Write},
    panic,
    sync::atomic::{AtomicBool, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

static LOG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Configure tracing based on the CLI flag or environment.
pub fn init_logging(enabled: bool) {
    LOG_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn debug_enabled() -> bool {
    LOG_ENABLED.load(Ordering::Relaxed)
}

/// Write a trace line to stderr without corrupting the child's stdout stream.
///
/// Lines are CRLF-terminated because the terminal is in raw mode while the
/// proxy runs.
pub fn log_debug(msg: &str) {
    if !LOG_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let mut stderr = io::stderr();
    let _ = write!(stderr, "[{timestamp}] {msg}\r\n");
    let _ = stderr.flush();
}

/// Log a panic location through the same gated sink.
pub fn log_panic(info: &panic::PanicHookInfo<'_>) {
    if !LOG_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let location = info
        .location()
        .map(|loc| format!("{}:{}", loc.file(), loc.line()))
        .unwrap_or_else(|| "unknown".to_string());
    log_debug(&format!("panic at {location} (v{})", env!("CARGO_PKG_VERSION")));
}

/// Render a short hex sample of a byte chunk for trace lines.
pub fn format_debug_bytes(bytes: &[u8]) -> String {
    const MAX_BYTES: usize = 64;
    let sample_len = bytes.len().min(MAX_BYTES);
    let mut out = String::new();
    for (idx, byte) in bytes.iter().take(sample_len).enumerate() {
        if idx > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{byte:02x}"));
    }
    if bytes.len() > sample_len {
        out.push_str(" ...");
    }
    out
}
