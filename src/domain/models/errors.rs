use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::BackendKind;

/// Failures of the backend lifecycle. Each variant carries what is needed to
/// diagnose it without re-running: the backend, pid, port and log file.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{backend} is not installed")]
    NotInstalled { backend: BackendKind },

    #[error("Model path does not exist: {}", path.display())]
    ModelNotFound { path: PathBuf },

    #[error("Failed to launch {backend}: {reason}")]
    LaunchFailed { backend: BackendKind, reason: String },

    #[error(
        "{backend} (pid {pid}) did not answer on port {port} within {}ms. Check the logs at {}",
        timeout.as_millis(),
        log_path.display()
    )]
    StartTimeout {
        backend: BackendKind,
        pid: u32,
        port: u16,
        timeout: Duration,
        log_path: PathBuf,
    },

    #[error("{backend} (pid {pid}) exited while starting. Check the logs at {}", log_path.display())]
    ExitedEarly {
        backend: BackendKind,
        pid: u32,
        log_path: PathBuf,
    },

    #[error("Start of {backend} (pid {pid}) was cancelled")]
    StartCancelled { backend: BackendKind, pid: u32 },

    #[error("{backend} is not running")]
    NotRunning { backend: BackendKind },

    #[error("Failed to stop {backend} (pid {pid}): {reason}")]
    StopFailed {
        backend: BackendKind,
        pid: u32,
        reason: String,
    },

    #[error("No listening port found for pid {pid}: {reason}")]
    PortResolutionFailed { pid: u32, reason: String },

    #[error("{backend} (pid {pid}) is listening on port {port} but never answered a health check")]
    NotReachable {
        backend: BackendKind,
        pid: u32,
        port: u16,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("Timed out after {}ms", elapsed.as_millis())]
    Timeout { elapsed: Duration },

    #[error("Cancelled")]
    Cancelled,
}

/// Failures that end a chat session. None of them are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("Backend rejected the request (status {status}): {body}")]
    BackendError { status: u16, body: String },

    #[error("Failed to reach the backend: {0}")]
    TransportError(String),

    #[error("Console failed: {0}")]
    Console(String),
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to read {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },
}
