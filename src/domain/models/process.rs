use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;

/// One row of an OS process listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cmdline: String,
}

/// Everything needed to launch a backend server in the background.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    /// Receives both stdout and stderr of the server.
    pub log_path: PathBuf,
}

impl LaunchSpec {
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.to_string()];
        parts.extend(self.args.iter().cloned());
        return parts.join(" ");
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstallProbe {
    /// An executable reachable through `PATH`.
    Binary(&'static str),
    /// A module importable by `python3`.
    PythonModule(&'static str),
}

pub type ProcessHostBox = std::sync::Arc<dyn ProcessHost + Send + Sync>;

/// The OS facilities the lifecycle supervisor relies on.
#[async_trait]
pub trait ProcessHost {
    /// Whether the software behind a backend is installed.
    async fn is_installed(&self, probe: &InstallProbe) -> bool;

    /// A point in time listing of live processes.
    fn snapshot(&self) -> Vec<ProcessInfo>;

    /// Starts the process detached from the terminal and returns its pid.
    fn spawn(&self, spec: &LaunchSpec) -> Result<u32>;

    /// Sends a forceful termination signal.
    fn kill(&self, pid: u32) -> Result<()>;

    /// TCP ports the process is listening on, in the order the OS reports
    /// them.
    async fn listening_ports(&self, pid: u32) -> Result<Vec<u16>>;
}
