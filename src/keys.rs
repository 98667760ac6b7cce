//! Control-key recognition and per-chunk routing.
//!
//! Every special key that can change cursor context or submit input
//! flushes the composition first, so the child always receives completed
//! compositions before positional or semantic control events.

use anyhow::Result;

use crate::classify::classify;
use crate::compose::CompositionBuffer;
use crate::{debug_enabled, log_debug};

/// Control keys the router recognizes ahead of classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialKey {
    /// 0x03, Ctrl-C. Flushed then forwarded; the child decides how to react.
    Interrupt,
    /// 0x04, Ctrl-D.
    EndOfFile,
    /// 0x7F or 0x08.
    Backspace,
    /// 0x0D or 0x0A.
    Enter,
    /// Any chunk whose first byte is ESC: arrow keys, function keys, etc.
    EscapeIntroduced,
}

/// Inspect a raw chunk for a control key, before classification.
pub fn special_key(chunk: &[u8]) -> Option<SpecialKey> {
    match chunk {
        [0x03] => Some(SpecialKey::Interrupt),
        [0x04] => Some(SpecialKey::EndOfFile),
        [0x7F] | [0x08] => Some(SpecialKey::Backspace),
        [0x0D] | [0x0A] => Some(SpecialKey::Enter),
        [0x1B, ..] => Some(SpecialKey::EscapeIntroduced),
        _ => None,
    }
}

/// Route one terminal chunk through the special-key rules, the
/// classifier, and the composition buffer.
///
/// `forward` delivers bytes that bypass the buffer (control keys, escape
/// sequences, malformed tails) to the child.
pub fn route_chunk(
    buffer: &mut CompositionBuffer,
    chunk: &[u8],
    forward: &mut dyn FnMut(&[u8]) -> Result<()>,
) -> Result<()> {
    match special_key(chunk) {
        Some(key @ (SpecialKey::Interrupt | SpecialKey::EndOfFile | SpecialKey::Enter)) => {
            log_debug(&format!("special key {key:?}"));
            buffer.flush()?;
            forward(chunk)
        }
        Some(SpecialKey::Backspace) => {
            if buffer.backspace() {
                // Absorbed by the pending composition; the child sees nothing.
                Ok(())
            } else {
                log_debug("special key Backspace (forwarded)");
                forward(chunk)
            }
        }
        Some(SpecialKey::EscapeIntroduced) => {
            log_debug("escape sequence");
            buffer.flush()?;
            forward(chunk)
        }
        None => match std::str::from_utf8(chunk) {
            Ok(text) => {
                let classification = classify(text);
                if debug_enabled() {
                    log_debug(&format!("classified {classification:?}"));
                }
                buffer.process(text, classification.is_ime())
            }
            Err(_) => {
                // Fail open: opaque bytes go to the child unchanged, after
                // the pending composition so ordering is preserved.
                log_debug("malformed UTF-8 chunk forwarded verbatim");
                buffer.flush()?;
                forward(chunk)
            }
        },
    }
}
