use anyhow::{anyhow, Result};
use crossbeam_channel::Sender;
use std::io::{self, ErrorKind};
use std::os::unix::io::RawFd;
use std::thread;
use std::time::Duration;

use crate::log_debug;

pub(super) fn should_retry_read_error(err: &io::Error) -> bool {
    err.kind() == ErrorKind::Interrupted || err.kind() == ErrorKind::WouldBlock
}

/// Continuously read from the PTY master and forward raw chunks to the
/// supervisor. Chunks are handed off verbatim; the proxy never rewrites
/// child output. The channel disconnecting tells the supervisor the child
/// side is gone.
pub(super) fn spawn_reader_thread(master_fd: RawFd, tx: Sender<Vec<u8>>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut buffer = [0u8; 4096];
        loop {
            let n = unsafe {
                libc::read(
                    master_fd,
                    buffer.as_mut_ptr() as *mut libc::c_void,
                    buffer.len(),
                )
            };
            if n > 0 {
                let data = buffer.get(..n as usize).unwrap_or(&[]).to_vec();
                if tx.send(data).is_err() {
                    break;
                }
                continue;
            }
            if n == 0 {
                break;
            }
            let err = io::Error::last_os_error();
            if should_retry_read_error(&err) {
                thread::sleep(Duration::from_millis(10));
                continue;
            }
            // EIO is the normal "slave side closed" signal on Linux
            if err.raw_os_error() != Some(libc::EIO) {
                log_debug(&format!("PTY read error: {err}"));
            }
            break;
        }
    })
}

/// Write the entire buffer to a raw fd, retrying short writes and
/// EINTR/EAGAIN. A hard error here means the other side is gone.
pub fn write_all(fd: RawFd, mut data: &[u8]) -> Result<()> {
    while !data.is_empty() {
        let written = unsafe { libc::write(fd, data.as_ptr() as *const libc::c_void, data.len()) };
        if written < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted || err.kind() == ErrorKind::WouldBlock {
                thread::sleep(Duration::from_millis(1));
                continue;
            }
            return Err(anyhow!("write to fd {fd} failed: {err}"));
        }
        if written == 0 {
            return Err(anyhow!("write to fd {fd} returned 0"));
        }
        let written = written as usize;
        data = if written <= data.len() {
            &data[written..]
        } else {
            &[]
        };
    }
    Ok(())
}
