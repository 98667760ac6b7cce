//! Supervisor loop: the single task where every buffer transition happens.
//!
//! Selects over stdin chunks and PTY output with a timeout bounded by the
//! composition deadline. Pending input always wins over an expired
//! deadline, which re-arms the timer and preserves causal ordering.

use crossbeam_channel::{never, select, Receiver};
use std::io::{self, Write};
use std::time::{Duration, Instant};

use imeterm::compose::CompositionBuffer;
use imeterm::keys::route_chunk;
use imeterm::log_debug;
use imeterm::pty_session::{write_all, PtyProxySession};

use crate::terminal::{take_fatal_signal, take_sigwinch, terminal_geometry};

/// Upper bound on how long the loop sleeps between flag checks.
const EVENT_LOOP_IDLE: Duration = Duration::from_millis(50);

/// Why the supervisor loop ended.
pub(crate) enum LoopOutcome {
    /// The PTY output stream closed: the child is gone.
    ChildExited,
    /// A fatal signal reached the proxy itself.
    FatalSignal(i32),
}

pub(crate) fn run_event_loop(
    session: &mut PtyProxySession,
    buffer: &mut CompositionBuffer,
    input_rx: &Receiver<Vec<u8>>,
) -> LoopOutcome {
    let master_fd = session.master_fd();
    let mut stdin_open = true;
    loop {
        if let Some(signal) = take_fatal_signal() {
            log_debug(&format!("fatal signal {signal}, tearing down"));
            // The child is about to die with us; discard, never emit.
            buffer.clear();
            return LoopOutcome::FatalSignal(signal);
        }
        if take_sigwinch() {
            let (rows, cols) = terminal_geometry();
            log_debug(&format!("resize to {cols}x{rows}"));
            if let Err(err) = session.set_winsize(rows, cols) {
                log_debug(&format!("resize failed: {err:#}"));
            }
        }

        let timeout = select_timeout(buffer.deadline(), Instant::now());
        let input_guard = if stdin_open { None } else { Some(never()) };
        let input_rx = input_guard.as_ref().unwrap_or(input_rx);
        let output_rx = &session.output_rx;
        select! {
            recv(input_rx) -> chunk => {
                match chunk {
                    Ok(bytes) => {
                        let result = route_chunk(buffer, &bytes, &mut |data: &[u8]| {
                            write_all(master_fd, data)
                        });
                        if let Err(err) = result {
                            log_debug(&format!("PTY write failed: {err:#}"));
                            if !session.is_alive() {
                                return LoopOutcome::ChildExited;
                            }
                        }
                    }
                    Err(_) => {
                        // Stdin closed. Deliver what is pending, then keep
                        // piping child output until the child exits.
                        log_debug("stdin closed");
                        if buffer.flush().is_err() && !session.is_alive() {
                            return LoopOutcome::ChildExited;
                        }
                        stdin_open = false;
                    }
                }
            }
            recv(output_rx) -> chunk => {
                match chunk {
                    Ok(data) => {
                        if let Err(err) = write_stdout(&data) {
                            log_debug(&format!("stdout write failed: {err}"));
                        }
                    }
                    Err(_) => return LoopOutcome::ChildExited,
                }
            }
            default(timeout) => {}
        }

        if let Err(err) = buffer.poll(Instant::now()) {
            log_debug(&format!("deadline flush failed: {err:#}"));
            if !session.is_alive() {
                return LoopOutcome::ChildExited;
            }
        }
    }
}

/// Sleep no longer than the composition deadline, and never past the idle
/// tick that keeps signal flags fresh.
fn select_timeout(deadline: Option<Instant>, now: Instant) -> Duration {
    match deadline {
        Some(deadline) => deadline.saturating_duration_since(now).min(EVENT_LOOP_IDLE),
        None => EVENT_LOOP_IDLE,
    }
}

/// Child output goes to the user's terminal byte-for-byte; escape
/// sequences pass through untouched.
fn write_stdout(data: &[u8]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(data)?;
    handle.flush()
}
