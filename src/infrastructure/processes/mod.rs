#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

use std::collections::HashMap;
use std::fs::File;
use std::process::Child;
use std::process::Stdio;
use std::sync::Mutex;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use sysinfo::Pid;
use sysinfo::ProcessRefreshKind;
use sysinfo::ProcessStatus;
use sysinfo::ProcessesToUpdate;
use sysinfo::System;
use sysinfo::UpdateKind;
use tokio::process::Command;

use crate::domain::models::InstallProbe;
use crate::domain::models::LaunchSpec;
use crate::domain::models::ProcessHost;
use crate::domain::models::ProcessInfo;

/// Ports of the sockets in `lsof` output that are in LISTEN state, in the
/// order listed and without duplicates.
pub fn parse_listening_ports(output: &str) -> Vec<u16> {
    let mut ports: Vec<u16> = vec![];
    for line in output.lines() {
        let mut fields = line.split_whitespace().rev();
        if fields.next() != Some("(LISTEN)") {
            continue;
        }

        let port = fields
            .next()
            .and_then(|addr| return addr.rsplit(':').next())
            .and_then(|port| return port.parse::<u16>().ok());
        if let Some(port) = port {
            if !ports.contains(&port) {
                ports.push(port);
            }
        }
    }

    return ports;
}

/// Kills a spawned child and reaps it. On unix the child leads its own
/// process group, so workers it started are killed with it.
fn kill_owned(mut child: Child) -> Result<()> {
    #[cfg(unix)]
    {
        let group = child.id() as libc::pid_t;
        let res = unsafe { libc::kill(-group, libc::SIGKILL) };
        if res != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                return Err(err.into());
            }
        }
    }
    #[cfg(not(unix))]
    child.kill()?;

    child.wait()?;
    return Ok(());
}

/// The operating system as seen by the supervisor. Children spawned here are
/// tracked so killing them also reaps them.
#[derive(Default)]
pub struct LocalProcessHost {
    children: Mutex<HashMap<u32, Child>>,
}

impl LocalProcessHost {
    fn lock_children(&self) -> Result<std::sync::MutexGuard<'_, HashMap<u32, Child>>> {
        return self
            .children
            .lock()
            .map_err(|_| return anyhow!("Child process table is poisoned"));
    }
}

#[async_trait]
impl ProcessHost for LocalProcessHost {
    #[allow(clippy::implicit_return)]
    async fn is_installed(&self, probe: &InstallProbe) -> bool {
        match probe {
            InstallProbe::Binary(name) => return which::which(name).is_ok(),
            InstallProbe::PythonModule(module) => {
                let status = Command::new("python3")
                    .args(["-c", &format!("import {module}")])
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .await;

                return match status {
                    Ok(status) => status.success(),
                    Err(err) => {
                        tracing::debug!(error = ?err, "python3 is not available");
                        false
                    }
                };
            }
        }
    }

    fn snapshot(&self) -> Vec<ProcessInfo> {
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
        );

        let mut res: Vec<ProcessInfo> = system
            .processes()
            .iter()
            .filter(|(_, process)| {
                return process.thread_kind().is_none() && process.status() != ProcessStatus::Zombie;
            })
            .map(|(pid, process)| {
                let cmdline = process
                    .cmd()
                    .iter()
                    .map(|arg| return arg.to_string_lossy().to_string())
                    .collect::<Vec<String>>()
                    .join(" ");

                return ProcessInfo {
                    pid: pid.as_u32(),
                    name: process.name().to_string_lossy().to_string(),
                    cmdline,
                };
            })
            .collect();
        res.sort_by_key(|process| return process.pid);
        tracing::debug!(processes = res.len(), "Took process snapshot");

        return res;
    }

    fn spawn(&self, spec: &LaunchSpec) -> Result<u32> {
        if let Some(parent) = spec.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let log = File::create(&spec.log_path)?;

        let mut cmd = std::process::Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.envs.iter().map(|(key, val)| return (key, val)))
            .stdin(Stdio::null())
            .stdout(log.try_clone()?)
            .stderr(log);

        // Keep Ctrl-C in the terminal from reaching the backend directly.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd
            .spawn()
            .map_err(|err| return anyhow!("Failed to run {}: {err}", spec.program))?;
        let pid = child.id();
        self.lock_children()?.insert(pid, child);

        return Ok(pid);
    }

    fn kill(&self, pid: u32) -> Result<()> {
        let owned = self.lock_children()?.remove(&pid);
        if let Some(child) = owned {
            return kill_owned(child);
        }

        let mut system = System::new();
        let target = Pid::from_u32(pid);
        system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
        let process = match system.process(target) {
            Some(process) => process,
            None => bail!("Process {pid} does not exist"),
        };
        if !process.kill() {
            bail!("Failed to send kill signal to process {pid}");
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn listening_ports(&self, pid: u32) -> Result<Vec<u16>> {
        let output = Command::new("lsof")
            .args(["-Pan", "-p", &pid.to_string(), "-iTCP", "-sTCP:LISTEN"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| return anyhow!("Failed to run lsof: {err}"))?;
        let stdout = String::from_utf8(output.stdout)?;

        // lsof exits with 1 when no socket matches the filters.
        if !output.status.success() {
            if output.status.code() == Some(1) && stdout.trim().is_empty() {
                return Ok(vec![]);
            }
            bail!(
                "lsof exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        tracing::debug!(pid, output = stdout, "Inspected listening sockets");
        return Ok(parse_listening_ports(&stdout));
    }
}
