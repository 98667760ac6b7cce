//! Stdin-thread bootstrap so raw byte capture stays isolated from the
//! supervisor loop.

use crossbeam_channel::Sender;
use std::io::{self, Read};
use std::thread;

use imeterm::{debug_enabled, format_debug_bytes, log_debug};

/// Read raw-mode chunks from the controlling terminal and hand each one
/// to the supervisor. Chunks are delivered exactly as `read(2)` produced
/// them; splitting or merging here would move UTF-8 boundaries around.
/// EOF or a read error ends the thread, which the supervisor observes as
/// a channel disconnect.
pub(crate) fn spawn_input_thread(tx: Sender<Vec<u8>>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut stdin = io::stdin();
        let mut buf = [0u8; 1024];
        loop {
            let n = match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) => {
                    log_debug(&format!("stdin read error: {err}"));
                    break;
                }
            };
            if debug_enabled() {
                log_debug(&format!(
                    "input bytes ({}): {}",
                    n,
                    format_debug_bytes(&buf[..n])
                ));
            }
            if tx.send(buf[..n].to_vec()).is_err() {
                return;
            }
        }
    })
}
