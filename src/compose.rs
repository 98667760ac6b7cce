//! Single-slot composition buffer with an idle-timeout flush.
//!
//! POSIX TTYs expose no IME composition events, so the only settle signal
//! available at this layer is an idle gap after a burst of multi-byte
//! input. The buffer accumulates classified-IME text and re-arms a
//! deadline on every append; when the deadline expires (or a control key
//! forces it) the whole accumulation is emitted as one atomic write.
//!
//! The armed timer is modeled as an `Option<Instant>` deadline that the
//! supervisor polls between events. All transitions happen on the
//! supervisor task, so a deadline observed late is indistinguishable from
//! an external `flush()` at that instant.

use anyhow::Result;
use std::time::{Duration, Instant};

use crate::log_debug;

/// Default idle gap that marks a composition as settled. Human typing
/// bursts during IME settlement are under ~20 ms apart while the gap to
/// the next keystroke is typically 100 ms or more.
pub const DEFAULT_COMPOSITION_TIMEOUT: Duration = Duration::from_millis(50);

/// Destination for emitted text, supplied at construction.
pub type Sink = Box<dyn FnMut(&str) -> Result<()> + Send>;

pub struct CompositionBuffer {
    buffer: String,
    composing: bool,
    last_input_at: Option<Instant>,
    deadline: Option<Instant>,
    timeout: Duration,
    on_flush: Sink,
    on_regular: Sink,
}

impl CompositionBuffer {
    /// Build a buffer with distinct sinks for flushed compositions and
    /// pass-through regular input. The proxy points both at the PTY
    /// writer; they stay separate so a consumer can route them apart.
    pub fn new(timeout: Duration, on_flush: Sink, on_regular: Sink) -> Self {
        Self {
            buffer: String::new(),
            composing: false,
            last_input_at: None,
            deadline: None,
            timeout,
            on_flush,
            on_regular,
        }
    }

    /// Accept a chunk with its pre-computed classification.
    ///
    /// IME text is appended and the deadline re-armed. Regular text first
    /// flushes any composition in flight, then goes straight to the
    /// regular sink, so the child always sees events in causal order.
    pub fn process(&mut self, text: &str, is_ime: bool) -> Result<()> {
        if is_ime {
            let now = Instant::now();
            self.buffer.push_str(text);
            self.last_input_at = Some(now);
            self.composing = true;
            self.deadline = Some(now + self.timeout);
            log_debug(&format!(
                "buffer append ({} chars pending)",
                self.buffer.chars().count()
            ));
            return Ok(());
        }
        if self.composing {
            self.flush()?;
        }
        (self.on_regular)(text)
    }

    /// Emit the pending composition immediately and disarm the deadline.
    /// Safe and idempotent on an empty buffer.
    ///
    /// If the flush sink fails the buffered text is retained so nothing
    /// classified as IME is silently lost; the caller may retry.
    pub fn flush(&mut self) -> Result<()> {
        self.deadline = None;
        if !self.buffer.is_empty() {
            (self.on_flush)(&self.buffer)?;
            log_debug(&format!(
                "flush ({} chars emitted)",
                self.buffer.chars().count()
            ));
            self.buffer.clear();
        }
        self.composing = false;
        Ok(())
    }

    /// Remove the last code point of the pending composition.
    ///
    /// Returns true when the buffer absorbed the backspace; false when it
    /// was empty and the key should be forwarded to the child instead.
    pub fn backspace(&mut self) -> bool {
        if self.buffer.pop().is_none() {
            return false;
        }
        if self.buffer.is_empty() {
            self.composing = false;
            self.deadline = None;
        }
        log_debug("buffer backspace");
        true
    }

    /// Discard the pending composition without emitting.
    pub fn clear(&mut self) {
        if !self.buffer.is_empty() {
            log_debug(&format!(
                "buffer cleared ({} chars discarded)",
                self.buffer.chars().count()
            ));
        }
        self.buffer.clear();
        self.composing = false;
        self.deadline = None;
    }

    pub fn is_composing(&self) -> bool {
        self.composing
    }

    /// Instant of the most recent IME append, for consumers that want to
    /// measure settle gaps themselves.
    pub fn last_input_at(&self) -> Option<Instant> {
        self.last_input_at
    }

    pub fn peek(&self) -> &str {
        &self.buffer
    }

    /// Deadline of the armed composition timer, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Flush if the armed deadline has passed. Called by the supervisor
    /// between events; input arriving before the poll re-arms the
    /// deadline and wins, which preserves causal ordering.
    pub fn poll(&mut self, now: Instant) -> Result<()> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.flush(),
            _ => Ok(()),
        }
    }
}
