#[cfg(test)]
#[path = "supervisor_test.rs"]
mod tests;

use std::path::PathBuf;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use super::health_prober;
use super::port_resolver;
use crate::domain::models::base_url;
use crate::domain::models::BackendHandle;
use crate::domain::models::BackendKind;
use crate::domain::models::LifecycleError;
use crate::domain::models::ProbeError;
use crate::domain::models::ProbeTiming;
use crate::domain::models::ProcessHostBox;

const MIN_CHECK_TIMEOUT: Duration = Duration::from_millis(250);

/// Where backends find their models and write their logs, and how they are
/// probed. `None` fields fall back to the backend kind's defaults.
#[derive(Clone, Debug)]
pub struct SupervisorSettings {
    pub models_dir: PathBuf,
    pub log_dir: PathBuf,
    pub port: Option<u16>,
    pub probe_interval: Option<Duration>,
    pub probe_timeout: Option<Duration>,
}

impl SupervisorSettings {
    pub fn timing(&self, kind: BackendKind) -> ProbeTiming {
        let defaults = kind.probe_timing();
        return ProbeTiming {
            interval: self.probe_interval.unwrap_or(defaults.interval),
            timeout: self.probe_timeout.unwrap_or(defaults.timeout),
        };
    }

    /// The same settings, but a port is probed exactly once.
    pub fn single_check(self) -> SupervisorSettings {
        return SupervisorSettings {
            probe_timeout: Some(Duration::ZERO),
            ..self
        };
    }

    pub fn model_path(&self, kind: BackendKind, model: &str) -> PathBuf {
        return self.models_dir.join(kind.to_string()).join(model);
    }
}

/// Drives the lifecycle of one backend: install check, start, readiness,
/// port discovery and stop. A process spawned through `start` is killed when
/// the supervisor is dropped.
pub struct Supervisor {
    handle: BackendHandle,
    host: ProcessHostBox,
    settings: SupervisorSettings,
    client: reqwest::Client,
}

impl Supervisor {
    pub fn new(handle: BackendHandle, host: ProcessHostBox, settings: SupervisorSettings) -> Supervisor {
        return Supervisor {
            handle,
            host,
            settings,
            client: reqwest::Client::new(),
        };
    }

    pub fn handle(&self) -> &BackendHandle {
        return &self.handle;
    }

    pub fn kind(&self) -> BackendKind {
        return self.handle.kind;
    }

    pub async fn is_available(&self) -> bool {
        return self.host.is_installed(&self.kind().install_probe()).await;
    }

    /// The pid of the running backend server, if any.
    pub fn is_running(&self) -> Option<u32> {
        let snapshot = self.host.snapshot();
        let candidates = self.kind().matching_processes(&snapshot);

        return self.handle.choose_pid(&candidates);
    }

    pub async fn start(&mut self, cancel: &CancellationToken) -> Result<(), LifecycleError> {
        let kind = self.kind();
        if !self.is_available().await {
            return Err(LifecycleError::NotInstalled { backend: kind });
        }

        let model_path = self.settings.model_path(kind, &self.handle.model);
        if !model_path.exists() {
            return Err(LifecycleError::ModelNotFound { path: model_path });
        }

        let port = self.settings.port.unwrap_or(kind.default_port());
        let log_path = self.settings.log_dir.join(kind.log_file_name());
        let spec = kind.launch_spec(&model_path, port, log_path.clone());

        let pid = self.host.spawn(&spec).map_err(|err| {
            return LifecycleError::LaunchFailed {
                backend: kind,
                reason: err.to_string(),
            };
        })?;
        self.handle.owned_pid = Some(pid);

        tracing::info!(
            backend = kind.to_string(),
            pid,
            port,
            command = spec.command_line(),
            log = %log_path.display(),
            "Started backend"
        );

        let timing = self.settings.timing(kind);
        let probed = tokio::select! {
            biased;
            _ = self.wait_for_exit(pid, timing.interval) => None,
            res = self.probe(port, timing, cancel) => Some(res),
        };

        // Another server may answer on the port after our child died.
        let probed = match probed {
            Some(Ok(())) if !self.is_alive(pid) => None,
            other => other,
        };

        match probed {
            Some(Ok(())) => {
                self.handle.port = port;
                return Ok(());
            }
            None => {
                tracing::error!(backend = kind.to_string(), pid, port, "Backend exited while starting");
                self.release_owned();
                return Err(LifecycleError::ExitedEarly {
                    backend: kind,
                    pid,
                    log_path,
                });
            }
            Some(Err(err)) => {
                tracing::error!(backend = kind.to_string(), pid, port, error = ?err, "Backend never became reachable");
                self.release_owned();

                match err {
                    ProbeError::Timeout { .. } => {
                        return Err(LifecycleError::StartTimeout {
                            backend: kind,
                            pid,
                            port,
                            timeout: timing.timeout,
                            log_path,
                        })
                    }
                    ProbeError::Cancelled => {
                        return Err(LifecycleError::StartCancelled { backend: kind, pid })
                    }
                }
            }
        }
    }

    pub fn stop(&mut self) -> Result<(), LifecycleError> {
        let kind = self.kind();
        let pid = self
            .is_running()
            .ok_or(LifecycleError::NotRunning { backend: kind })?;

        self.host.kill(pid).map_err(|err| {
            return LifecycleError::StopFailed {
                backend: kind,
                pid,
                reason: err.to_string(),
            };
        })?;

        tracing::info!(backend = kind.to_string(), pid, "Stopped backend");
        self.handle.port = 0;
        if self.handle.owned_pid == Some(pid) {
            self.handle.owned_pid = None;
        }

        return Ok(());
    }

    /// The port of the running backend. A port found through socket
    /// inspection must pass a health probe before it is recorded.
    pub async fn get_port(&mut self, cancel: &CancellationToken) -> Result<u16, LifecycleError> {
        let kind = self.kind();
        let pid = self
            .is_running()
            .ok_or(LifecycleError::NotRunning { backend: kind })?;

        let port = port_resolver::resolve_port(&self.handle, pid, self.host.as_ref()).await?;
        if self.handle.port == port {
            return Ok(port);
        }

        let timing = self.settings.timing(kind);
        if self.probe(port, timing, cancel).await.is_err() {
            return Err(LifecycleError::NotReachable {
                backend: kind,
                pid,
                port,
            });
        }

        self.handle.port = port;
        return Ok(port);
    }

    /// Kills the process this supervisor spawned, if it is still alive. Only
    /// the owned pid is signalled, never another instance of the backend.
    fn release_owned(&mut self) {
        let pid = match self.handle.owned_pid.take() {
            Some(pid) => pid,
            None => return,
        };
        self.handle.port = 0;

        if !self.is_alive(pid) {
            tracing::warn!(backend = self.kind().to_string(), pid, "Owned backend already exited");
            return;
        }

        match self.host.kill(pid) {
            Ok(()) => tracing::info!(backend = self.kind().to_string(), pid, "Released backend"),
            Err(err) => tracing::warn!(pid, error = ?err, "Failed to release backend"),
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        return self
            .host
            .snapshot()
            .iter()
            .any(|process| return process.pid == pid);
    }

    /// Resolves once `pid` is gone from the process table.
    async fn wait_for_exit(&self, pid: u32, interval: Duration) {
        let mut ticker = time::interval(interval.max(health_prober::MIN_INTERVAL));
        loop {
            ticker.tick().await;
            if !self.is_alive(pid) {
                return;
            }
        }
    }

    async fn probe(
        &self,
        port: u16,
        timing: ProbeTiming,
        cancel: &CancellationToken,
    ) -> Result<(), ProbeError> {
        let url = format!("{}{}", base_url(port), self.kind().liveness_path());
        let check_timeout = timing.interval.max(MIN_CHECK_TIMEOUT);

        return health_prober::wait_until_reachable(
            || {
                return health_prober::check_liveness(
                    self.client.clone(),
                    url.to_string(),
                    check_timeout,
                );
            },
            timing,
            cancel,
        )
        .await;
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.release_owned();
    }
}
