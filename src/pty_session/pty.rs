//! Pseudo-terminal session management.
//!
//! Spawns the wrapped program in a PTY so it behaves as if running in an
//! interactive terminal, forwards its output through a channel, handles
//! window-size changes, and reports the exit status exactly once.

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver};
use std::ffi::CString;
use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::ptr;
use std::thread;
use std::time::{Duration, Instant};

use super::io::{spawn_reader_thread, write_all};
use crate::log_debug;

const OUTPUT_CHANNEL_CAPACITY: usize = 100;
const TERMINATE_GRACE: Duration = Duration::from_millis(500);

/// How the child ended: a normal exit code or the terminating signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ChildExit {
    /// Exit code the proxy process should adopt: the child's own code,
    /// 128+signal when signalled, 1 when the status is unreadable.
    pub fn process_exit_code(&self) -> i32 {
        if let Some(code) = self.code {
            code
        } else if let Some(signal) = self.signal {
            128 + signal
        } else {
            1
        }
    }
}

/// Runs the wrapped program under a PTY, keeping the master end.
pub struct PtyProxySession {
    master_fd: RawFd,
    child_pid: i32,
    exit: Option<ChildExit>,
    pub output_rx: Receiver<Vec<u8>>,
    _output_thread: thread::JoinHandle<()>,
}

impl PtyProxySession {
    /// Start the program under a pseudo-terminal sized to the user's
    /// terminal so the child never notices the proxy in front of it.
    pub fn new(
        command: &str,
        args: &[String],
        working_dir: &str,
        term_value: &str,
        rows: u16,
        cols: u16,
    ) -> Result<Self> {
        let cwd = CString::new(working_dir)
            .with_context(|| format!("working directory contains NUL byte: {working_dir}"))?;
        let term_value_cstr = CString::new(term_value).unwrap_or_else(|_| {
            CString::new("xterm-256color").expect("static TERM fallback should be valid")
        });
        let mut argv: Vec<CString> = Vec::with_capacity(args.len() + 1);
        argv.push(
            CString::new(command)
                .with_context(|| format!("command contains NUL byte: {command}"))?,
        );
        for arg in args {
            argv.push(
                CString::new(arg.as_str())
                    .with_context(|| format!("argument contains NUL byte: {arg}"))?,
            );
        }

        unsafe {
            let (master_fd, child_pid) = spawn_child(&argv, &cwd, &term_value_cstr, rows, cols)?;
            set_nonblocking(master_fd)?;

            let (tx, rx) = bounded(OUTPUT_CHANNEL_CAPACITY);
            let output_thread = spawn_reader_thread(master_fd, tx);

            log_debug(&format!("spawned pid {child_pid} under PTY ({cols}x{rows})"));
            Ok(Self {
                master_fd,
                child_pid,
                exit: None,
                output_rx: rx,
                _output_thread: output_thread,
            })
        }
    }

    /// Raw master fd, for callers that write from captured closures.
    pub fn master_fd(&self) -> RawFd {
        self.master_fd
    }

    /// Write raw bytes to the PTY master.
    pub fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        write_all(self.master_fd, bytes)
    }

    /// Update the PTY window size and notify the child.
    pub fn set_winsize(&self, rows: u16, cols: u16) -> Result<()> {
        let mut ws: libc::winsize = unsafe { mem::zeroed() };
        ws.ws_row = rows.max(1);
        ws.ws_col = cols.max(1);
        ws.ws_xpixel = 0;
        ws.ws_ypixel = 0;
        let result = unsafe { libc::ioctl(self.master_fd, libc::TIOCSWINSZ, &ws) };
        if result != 0 {
            return Err(errno_error("ioctl(TIOCSWINSZ) failed"));
        }
        let _ = unsafe { libc::kill(self.child_pid, libc::SIGWINCH) };
        Ok(())
    }

    /// Peek whether the child is still running, without reaping it.
    pub fn is_alive(&self) -> bool {
        if self.exit.is_some() {
            return false;
        }
        unsafe {
            let mut status = 0;
            let ret = libc::waitpid(self.child_pid, &mut status, libc::WNOHANG);
            ret == 0 // 0 means still running
        }
    }

    /// Block until the child terminates and report how, exactly once.
    /// Subsequent calls return the recorded status.
    pub fn wait_exit(&mut self) -> ChildExit {
        if let Some(exit) = self.exit {
            return exit;
        }
        let mut status = 0;
        let ret = unsafe { libc::waitpid(self.child_pid, &mut status, 0) };
        let exit = if ret < 0 {
            log_debug(&format!(
                "waitpid({}) failed: {}",
                self.child_pid,
                io::Error::last_os_error()
            ));
            ChildExit {
                code: None,
                signal: None,
            }
        } else {
            decode_wait_status(status)
        };
        self.exit = Some(exit);
        log_debug(&format!("child exit {exit:?}"));
        exit
    }

    /// Send termination to the child, escalating to SIGKILL if it ignores
    /// the grace period.
    pub fn kill(&mut self) {
        if self.exit.is_some() {
            return;
        }
        unsafe {
            if libc::kill(self.child_pid, libc::SIGTERM) != 0 {
                log_debug(&format!(
                    "SIGTERM to child failed: {}",
                    io::Error::last_os_error()
                ));
            }
            if let Some(status) = wait_for_exit(self.child_pid, TERMINATE_GRACE) {
                self.exit = Some(decode_wait_status(status));
                return;
            }
            if libc::kill(self.child_pid, libc::SIGKILL) != 0 {
                log_debug(&format!(
                    "SIGKILL to child failed: {}",
                    io::Error::last_os_error()
                ));
            }
        }
        self.wait_exit();
    }
}

impl Drop for PtyProxySession {
    fn drop(&mut self) {
        if self.exit.is_none() {
            if let Some(status) = wait_for_exit(self.child_pid, Duration::ZERO) {
                self.exit = Some(decode_wait_status(status));
            } else {
                self.kill();
            }
        }
        unsafe {
            close_fd(self.master_fd);
        }
    }
}

fn decode_wait_status(status: i32) -> ChildExit {
    if libc::WIFEXITED(status) {
        ChildExit {
            code: Some(libc::WEXITSTATUS(status)),
            signal: None,
        }
    } else if libc::WIFSIGNALED(status) {
        ChildExit {
            code: None,
            signal: Some(libc::WTERMSIG(status)),
        }
    } else {
        ChildExit {
            code: None,
            signal: None,
        }
    }
}

/// Forks and execs the wrapped program under a new PTY.
///
/// # Safety
///
/// Performs low-level PTY allocation and process forking. The caller must
/// ensure `argv` holds valid C strings and must eventually close the
/// returned master fd. The child calls `_exit(1)` on any setup failure to
/// avoid returning after `fork()`.
unsafe fn spawn_child(
    argv: &[CString],
    working_dir: &CString,
    term_value: &CString,
    rows: u16,
    cols: u16,
) -> Result<(RawFd, i32)> {
    let mut master_fd: RawFd = -1;
    let mut slave_fd: RawFd = -1;

    let mut winsize: libc::winsize = mem::zeroed();
    winsize.ws_row = rows.max(1);
    winsize.ws_col = cols.max(1);
    winsize.ws_xpixel = 0;
    winsize.ws_ypixel = 0;

    #[allow(clippy::unnecessary_mut_passed)]
    if libc::openpty(
        &mut master_fd,
        &mut slave_fd,
        ptr::null_mut(),
        ptr::null_mut(),
        &mut winsize,
    ) != 0
    {
        return Err(errno_error("openpty failed"));
    }

    let pid = libc::fork();
    if pid < 0 {
        close_fd(master_fd);
        close_fd(slave_fd);
        return Err(errno_error("fork failed"));
    }

    if pid == 0 {
        child_exec(slave_fd, argv, working_dir, term_value);
    }

    close_fd(slave_fd);
    Ok((master_fd, pid))
}

/// Child process setup after fork: configures the PTY slave as the
/// controlling terminal and execs the target binary.
///
/// # Safety
///
/// Must only be called in the child process after `fork()`. Never returns:
/// it either replaces the process image via `execvp()` or `_exit(1)`s.
unsafe fn child_exec(
    slave_fd: RawFd,
    argv: &[CString],
    working_dir: &CString,
    term_value: &CString,
) -> ! {
    let fail = || -> ! {
        libc::_exit(1);
    };

    if libc::setsid() == -1 {
        fail();
    }
    if libc::ioctl(slave_fd, libc::TIOCSCTTY as libc::c_ulong, 0) == -1 {
        fail();
    }
    if libc::dup2(slave_fd, libc::STDIN_FILENO) < 0
        || libc::dup2(slave_fd, libc::STDOUT_FILENO) < 0
        || libc::dup2(slave_fd, libc::STDERR_FILENO) < 0
    {
        fail();
    }
    close_fd(slave_fd);

    if libc::chdir(working_dir.as_ptr()) != 0 {
        fail();
    }

    let term_key = CString::new("TERM").expect("TERM constant is valid");
    if libc::setenv(term_key.as_ptr(), term_value.as_ptr(), 1) != 0 {
        fail();
    }

    let mut argv_ptrs: Vec<*const libc::c_char> = argv.iter().map(|s| s.as_ptr()).collect();
    argv_ptrs.push(ptr::null());

    libc::execvp(argv_ptrs[0], argv_ptrs.as_ptr());
    fail();
}

/// Configure the PTY master for non-blocking reads.
pub(super) unsafe fn set_nonblocking(fd: RawFd) -> Result<()> {
    let flags = libc::fcntl(fd, libc::F_GETFL, 0);
    if flags < 0 {
        return Err(errno_error("fcntl(F_GETFL) failed"));
    }
    if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
        return Err(errno_error("fcntl(F_SETFL) failed"));
    }
    Ok(())
}

/// Helper that formats OS errors with additional context.
fn errno_error(context: &str) -> anyhow::Error {
    anyhow!("{context}: {}", io::Error::last_os_error())
}

/// Close a file descriptor while ignoring errors.
pub(super) unsafe fn close_fd(fd: RawFd) {
    if fd >= 0 {
        let _ = libc::close(fd);
    }
}

/// Poll for the child to terminate within `timeout`, returning the raw
/// wait status when it was reaped.
fn wait_for_exit(child_pid: i32, timeout: Duration) -> Option<i32> {
    let start = Instant::now();
    loop {
        let mut status = 0;
        let result = unsafe { libc::waitpid(child_pid, &mut status, libc::WNOHANG) };
        if result > 0 {
            return Some(status);
        }
        if result < 0 {
            log_debug(&format!(
                "waitpid({}) failed: {}",
                child_pid,
                io::Error::last_os_error()
            ));
            return None;
        }
        if start.elapsed() >= timeout {
            return None;
        }
        thread::sleep(Duration::from_millis(20));
    }
}
