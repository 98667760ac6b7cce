use anyhow::{anyhow, Result};
use crossterm::terminal::size as terminal_size;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use imeterm::log_debug;

/// Flag set by the SIGWINCH handler to trigger a PTY resize.
static SIGWINCH_RECEIVED: AtomicBool = AtomicBool::new(false);

/// Last fatal signal delivered to the proxy itself, or 0.
static FATAL_SIGNAL: AtomicI32 = AtomicI32::new(0);

/// Signal handler for terminal resize events.
///
/// Sets a flag that the supervisor loop checks to update PTY dimensions.
/// Only uses atomic operations (async-signal-safe).
extern "C" fn handle_sigwinch(_: libc::c_int) {
    SIGWINCH_RECEIVED.store(true, Ordering::SeqCst);
}

extern "C" fn handle_fatal(signal: libc::c_int) {
    FATAL_SIGNAL.store(signal, Ordering::SeqCst);
}

fn install_handler(signal: libc::c_int, handler: extern "C" fn(libc::c_int)) -> Result<()> {
    unsafe {
        // SAFETY: both handlers only flip atomics, which is
        // async-signal-safe.
        let handler = handler as *const () as libc::sighandler_t;
        if libc::signal(signal, handler) == libc::SIG_ERR {
            log_debug(&format!("failed to install handler for signal {signal}"));
            return Err(anyhow!("failed to install handler for signal {signal}"));
        }
    }
    Ok(())
}

/// Install SIGWINCH plus the fatal-signal handlers the supervisor polls.
///
/// SIGINT is fatal here only when delivered to the proxy process itself;
/// the user's Ctrl-C arrives as byte 0x03 in raw mode and is routed to
/// the child, not to this handler.
pub(crate) fn install_signal_handlers() -> Result<()> {
    install_handler(libc::SIGWINCH, handle_sigwinch)?;
    install_handler(libc::SIGINT, handle_fatal)?;
    install_handler(libc::SIGTERM, handle_fatal)?;
    install_handler(libc::SIGHUP, handle_fatal)?;
    Ok(())
}

pub(crate) fn take_sigwinch() -> bool {
    SIGWINCH_RECEIVED.swap(false, Ordering::SeqCst)
}

pub(crate) fn take_fatal_signal() -> Option<i32> {
    match FATAL_SIGNAL.swap(0, Ordering::SeqCst) {
        0 => None,
        signal => Some(signal),
    }
}

/// Current terminal geometry as (rows, cols), with the standard fallback.
pub(crate) fn terminal_geometry() -> (u16, u16) {
    match terminal_size() {
        Ok((cols, rows)) if cols > 0 && rows > 0 => (rows, cols),
        _ => (24, 80),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn sigwinch_handler_sets_flag() {
        SIGWINCH_RECEIVED.store(false, Ordering::SeqCst);
        handle_sigwinch(0);
        assert!(take_sigwinch());
    }

    #[test]
    fn fatal_handler_records_the_signal() {
        FATAL_SIGNAL.store(0, Ordering::SeqCst);
        handle_fatal(libc::SIGTERM);
        assert_eq!(take_fatal_signal(), Some(libc::SIGTERM));
        assert_eq!(take_fatal_signal(), None);
    }

    #[test]
    fn install_signal_handlers_receives_raised_sigwinch() {
        SIGWINCH_RECEIVED.store(false, Ordering::SeqCst);
        install_signal_handlers().expect("install handlers");
        unsafe {
            // SAFETY: raising SIGWINCH in-process is used for test
            // validation only.
            libc::raise(libc::SIGWINCH);
        }
        for _ in 0..20 {
            if take_sigwinch() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("SIGWINCH was not received");
    }

    #[test]
    fn terminal_geometry_never_reports_zero() {
        let (rows, cols) = terminal_geometry();
        assert!(rows > 0);
        assert!(cols > 0);
    }
}
