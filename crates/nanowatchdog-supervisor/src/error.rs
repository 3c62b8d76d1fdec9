//! Error kinds at the supervisor's two library seams: configuration
//! loading (logged and skipped on failure, leaving prior values in place)
//! and fatal startup failures (logged and aborted, converted to a process
//! exit code by `main`).

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed line {line_no} in {path}: {text:?}")]
    MalformedLine {
        path: PathBuf,
        line_no: usize,
        text: String,
    },
}

/// Fatal startup failures: serial open, listener bind, NOOP handshake
/// timeout. `main` maps any of these to exit code 1.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("failed to open serial device {device}: {source}")]
    SerialOpen {
        device: String,
        #[source]
        source: serialport::Error,
    },
    #[error("board did not answer NOOP within {timeout_secs}s")]
    HandshakeTimeout { timeout_secs: u64 },
    #[error("failed to bind listener on {addr}: {source}")]
    ListenerBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("another nanowatchdogd instance appears to be running (pid {pid})")]
    AlreadyRunning { pid: i32 },

    #[error("failed to open pid file {path}: {source}")]
    PidFileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
