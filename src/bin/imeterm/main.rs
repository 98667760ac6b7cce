//! Proxy entrypoint: owns the user's terminal, runs the child under a PTY,
//! and repairs IME composition on the way through.
//!
//! # Architecture
//!
//! - Input thread: reads raw stdin chunks
//! - PTY reader: forwards child output to the supervisor
//! - Supervisor loop: routes keys, coalesces compositions, pipes output

mod config;
mod event_loop;
mod input;
mod terminal;

use clap::Parser;
use crossbeam_channel::bounded;
use crossterm::tty::IsTty;
use std::io;
use std::process;

use imeterm::compose::CompositionBuffer;
use imeterm::pty_session::{write_all, PtyProxySession};
use imeterm::terminal_restore::TerminalRestoreGuard;
use imeterm::{init_logging, log_debug};

use crate::config::ProxyConfig;
use crate::event_loop::{run_event_loop, LoopOutcome};
use crate::input::spawn_input_thread;
use crate::terminal::{install_signal_handlers, terminal_geometry};

/// Max pending stdin chunks before backpressure.
const INPUT_CHANNEL_CAPACITY: usize = 256;

fn main() {
    let config = match ProxyConfig::try_parse() {
        Ok(config) => config,
        Err(err) => {
            let _ = err.print();
            // Help and version are successful exits; bad arguments are not
            process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };
    init_logging(config.debug);
    log_debug("=== imeterm started ===");

    let timeout = config.composition_timeout();
    let working_dir = config.resolved_working_dir();
    let (command, args) = config
        .command
        .split_first()
        .expect("clap requires at least one trailing value");

    if let Err(err) = install_signal_handlers() {
        eprintln!("imeterm: {err:#}");
        process::exit(1);
    }

    let terminal_guard = TerminalRestoreGuard::new();
    if io::stdin().is_tty() {
        if let Err(err) = terminal_guard.enable_raw_mode() {
            eprintln!("imeterm: failed to enter raw mode: {err}");
            process::exit(1);
        }
    } else {
        // Scripted runs keep cooked stdio; interactive behavior needs a TTY
        log_debug("stdin is not a tty, raw mode skipped");
    }

    let (rows, cols) = terminal_geometry();
    let mut session = match PtyProxySession::new(
        command,
        args,
        &working_dir,
        &config.term_value,
        rows,
        cols,
    ) {
        Ok(session) => session,
        Err(err) => {
            terminal_guard.restore();
            eprintln!("imeterm: failed to start {command}: {err:#}");
            process::exit(1);
        }
    };

    let master_fd = session.master_fd();
    let mut buffer = CompositionBuffer::new(
        timeout,
        Box::new(move |text: &str| write_all(master_fd, text.as_bytes())),
        Box::new(move |text: &str| write_all(master_fd, text.as_bytes())),
    );

    let (input_tx, input_rx) = bounded(INPUT_CHANNEL_CAPACITY);
    let _input_handle = spawn_input_thread(input_tx);

    let outcome = run_event_loop(&mut session, &mut buffer, &input_rx);

    // Teardown: discard any unflushed composition, give the terminal back,
    // then settle the child. Must hold on every exit path.
    buffer.clear();
    terminal_guard.restore();

    let code = match outcome {
        LoopOutcome::ChildExited => session.wait_exit().process_exit_code(),
        LoopOutcome::FatalSignal(signal) => {
            session.kill();
            128 + signal
        }
    };
    log_debug(&format!("=== imeterm exiting with code {code} ==="));
    drop(session);
    process::exit(code);
}
