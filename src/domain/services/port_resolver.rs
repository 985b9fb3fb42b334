#[cfg(test)]
#[path = "port_resolver_test.rs"]
mod tests;

use crate::domain::models::BackendHandle;
use crate::domain::models::LifecycleError;
use crate::domain::models::ProcessHost;

/// Returns the port `pid` serves on. A port recorded when this program
/// launched the backend is authoritative, only backends found already
/// running pay for socket inspection.
pub async fn resolve_port(
    handle: &BackendHandle,
    pid: u32,
    host: &(dyn ProcessHost + Send + Sync),
) -> Result<u16, LifecycleError> {
    if handle.port != 0 {
        return Ok(handle.port);
    }

    let ports = host
        .listening_ports(pid)
        .await
        .map_err(|err| {
            return LifecycleError::PortResolutionFailed {
                pid,
                reason: err.to_string(),
            };
        })?;

    tracing::debug!(pid, ports = ?ports, "Listening ports");

    match ports.first() {
        Some(port) => return Ok(*port),
        None => {
            return Err(LifecycleError::PortResolutionFailed {
                pid,
                reason: "the process holds no listening TCP socket".to_string(),
            })
        }
    }
}
