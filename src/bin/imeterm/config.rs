use clap::Parser;
use std::time::Duration;

use imeterm::compose::DEFAULT_COMPOSITION_TIMEOUT;
use imeterm::log_debug;

/// Anything above this is a typo, not a composition window.
const MAX_TIMEOUT_MS: u64 = 5_000;

/// CLI options for the proxy. The wrapped command follows the flags.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "imeterm",
    about = "Terminal input proxy that repairs IME composition for PTY-hosted CLIs",
    author,
    version
)]
pub(crate) struct ProxyConfig {
    /// Trace classification, buffer, key, and PTY events to stderr
    #[arg(short = 'd', long = "debug", env = "IMETERM_DEBUG", default_value_t = false)]
    pub(crate) debug: bool,

    /// Composition idle timeout in milliseconds
    #[arg(short = 't', long = "timeout", value_name = "MS", default_value_t = 50)]
    pub(crate) timeout_ms: u64,

    /// TERM value exported to the child
    #[arg(long = "term", value_name = "TERM", default_value = "xterm-256color")]
    pub(crate) term_value: String,

    /// Working directory for the child (defaults to the current directory)
    #[arg(long = "cwd", value_name = "DIR")]
    pub(crate) working_dir: Option<String>,

    /// Command to run under the proxy, with its arguments
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        required = true,
        value_name = "COMMAND",
        num_args = 1..
    )]
    pub(crate) command: Vec<String>,
}

impl ProxyConfig {
    /// Composition timeout with the fall-back-to-default rule applied:
    /// zero and implausibly large values revert to 50 ms.
    pub(crate) fn composition_timeout(&self) -> Duration {
        if self.timeout_ms == 0 || self.timeout_ms > MAX_TIMEOUT_MS {
            log_debug(&format!(
                "--timeout {} out of range, using {} ms",
                self.timeout_ms,
                DEFAULT_COMPOSITION_TIMEOUT.as_millis()
            ));
            return DEFAULT_COMPOSITION_TIMEOUT;
        }
        Duration::from_millis(self.timeout_ms)
    }

    /// Working directory for the child, resolved against the environment.
    pub(crate) fn resolved_working_dir(&self) -> String {
        self.working_dir.clone().unwrap_or_else(|| {
            std::env::current_dir()
                .ok()
                .map(|dir| dir.to_string_lossy().to_string())
                .unwrap_or_else(|| ".".to_string())
        })
    }
}
