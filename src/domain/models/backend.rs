#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;

use super::InstallProbe;
use super::LaunchSpec;
use super::ProcessInfo;

pub const LOCALHOST: &str = "127.0.0.1";

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    EnumVariantNames,
    strum::Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum BackendKind {
    Ollama,
    MlxLm,
}

/// How often and for how long to poll a freshly started backend before giving
/// up on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeTiming {
    pub interval: Duration,
    pub timeout: Duration,
}

/// Identifies a backend server among the processes of the host. `executable`
/// is matched as a prefix of the process name so `python` also covers
/// `python3` and `python3.11`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessSignature {
    pub executable: &'static str,
    pub fragment: Option<&'static str>,
}

impl ProcessSignature {
    pub fn matches(&self, process: &ProcessInfo) -> bool {
        let name = process.name.to_lowercase();
        let first_arg = process
            .cmdline
            .split_whitespace()
            .next()
            .and_then(|arg| return Path::new(arg).file_name())
            .map(|arg| return arg.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if !name.starts_with(self.executable) && !first_arg.starts_with(self.executable) {
            return false;
        }

        if let Some(fragment) = self.fragment {
            return process.cmdline.contains(fragment);
        }

        return true;
    }
}

impl BackendKind {
    pub fn parse(text: &str) -> Option<BackendKind> {
        return BackendKind::iter().find(|e| return e.to_string() == text);
    }

    pub fn default_port(&self) -> u16 {
        match self {
            BackendKind::Ollama => return 11434,
            BackendKind::MlxLm => return 8080,
        }
    }

    pub fn install_probe(&self) -> InstallProbe {
        match self {
            BackendKind::Ollama => return InstallProbe::Binary("ollama"),
            BackendKind::MlxLm => return InstallProbe::PythonModule("mlx_lm"),
        }
    }

    pub fn signature(&self) -> ProcessSignature {
        match self {
            BackendKind::Ollama => {
                return ProcessSignature {
                    executable: "ollama",
                    fragment: Some("serve"),
                }
            }
            BackendKind::MlxLm => {
                return ProcessSignature {
                    executable: "python",
                    fragment: Some("mlx_lm.server"),
                }
            }
        }
    }

    /// Ollama answers within a second of launch, MLX has to load the weights
    /// into memory before it binds.
    pub fn probe_timing(&self) -> ProbeTiming {
        match self {
            BackendKind::Ollama => {
                return ProbeTiming {
                    interval: Duration::from_millis(500),
                    timeout: Duration::from_secs(30),
                }
            }
            BackendKind::MlxLm => {
                return ProbeTiming {
                    interval: Duration::from_secs(1),
                    timeout: Duration::from_secs(60),
                }
            }
        }
    }

    pub fn liveness_path(&self) -> &'static str {
        match self {
            BackendKind::Ollama => return "/api/tags",
            BackendKind::MlxLm => return "/v1/models",
        }
    }

    pub fn chat_path(&self) -> &'static str {
        match self {
            BackendKind::Ollama => return "/api/chat",
            BackendKind::MlxLm => return "/v1/chat/completions",
        }
    }

    pub fn log_file_name(&self) -> String {
        return format!("{self}_server.log");
    }

    pub fn launch_spec(&self, model_path: &Path, port: u16, log_path: PathBuf) -> LaunchSpec {
        match self {
            BackendKind::Ollama => {
                return LaunchSpec {
                    program: "ollama".to_string(),
                    args: vec!["serve".to_string()],
                    envs: vec![(
                        "OLLAMA_HOST".to_string(),
                        format!("{LOCALHOST}:{port}"),
                    )],
                    log_path,
                }
            }
            BackendKind::MlxLm => {
                return LaunchSpec {
                    program: "python3".to_string(),
                    args: vec![
                        "-m".to_string(),
                        "mlx_lm.server".to_string(),
                        "--model".to_string(),
                        model_path.to_string_lossy().to_string(),
                        "--host".to_string(),
                        LOCALHOST.to_string(),
                        "--port".to_string(),
                        port.to_string(),
                    ],
                    envs: vec![],
                    log_path,
                }
            }
        }
    }

    /// Every process in the snapshot that looks like this backend's server,
    /// in snapshot order.
    pub fn matching_processes(&self, snapshot: &[ProcessInfo]) -> Vec<u32> {
        let signature = self.signature();
        return snapshot
            .iter()
            .filter(|process| return signature.matches(process))
            .map(|process| return process.pid)
            .collect();
    }
}

pub fn base_url(port: u16) -> String {
    return format!("http://{LOCALHOST}:{port}");
}

/// Runtime record of one backend instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendHandle {
    pub kind: BackendKind,
    pub model: String,
    /// Zero until the backend has answered a health probe on this port.
    pub port: u16,
    /// Set only when this process spawned the backend.
    pub owned_pid: Option<u32>,
}

impl BackendHandle {
    pub fn new(kind: BackendKind, model: &str) -> BackendHandle {
        return BackendHandle {
            kind,
            model: model.to_string(),
            port: 0,
            owned_pid: None,
        };
    }

    /// Picks the pid to act on when several processes match the backend's
    /// signature: the one this handle spawned, otherwise the lowest pid.
    pub fn choose_pid(&self, candidates: &[u32]) -> Option<u32> {
        if candidates.len() > 1 {
            tracing::warn!(
                backend = self.kind.to_string(),
                pids = ?candidates,
                "Several processes match the backend signature"
            );
        }

        if let Some(owned) = self.owned_pid {
            if candidates.contains(&owned) {
                return Some(owned);
            }
        }

        return candidates.iter().min().copied();
    }
}
