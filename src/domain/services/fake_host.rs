use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;

use crate::domain::models::InstallProbe;
use crate::domain::models::LaunchSpec;
use crate::domain::models::ProcessHost;
use crate::domain::models::ProcessInfo;

#[derive(Default)]
struct State {
    processes: Vec<ProcessInfo>,
    ports: HashMap<u32, Vec<u16>>,
    spawned: Vec<LaunchSpec>,
    killed: Vec<u32>,
    socket_inspections: usize,
    next_pid: u32,
}

/// An in-memory process table. Spawning adds a process whose command line
/// is the launch spec's, killing removes it.
pub struct FakeHost {
    installed: bool,
    fail_inspection: bool,
    children_exit: bool,
    state: Mutex<State>,
}

impl FakeHost {
    pub fn new(installed: bool) -> FakeHost {
        return FakeHost {
            installed,
            fail_inspection: false,
            children_exit: false,
            state: Mutex::new(State {
                next_pid: 1000,
                ..State::default()
            }),
        };
    }

    pub fn failing_inspection() -> FakeHost {
        let mut host = FakeHost::new(true);
        host.fail_inspection = true;
        return host;
    }

    /// Spawned processes exit right away and never show up in snapshots.
    pub fn exiting_children() -> FakeHost {
        let mut host = FakeHost::new(true);
        host.children_exit = true;
        return host;
    }

    pub fn with_process(self, pid: u32, name: &str, cmdline: &str, ports: Vec<u16>) -> FakeHost {
        {
            let mut state = self.state.lock().unwrap();
            state.processes.push(ProcessInfo {
                pid,
                name: name.to_string(),
                cmdline: cmdline.to_string(),
            });
            state.ports.insert(pid, ports);
        }
        return self;
    }

    pub fn spawned(&self) -> Vec<LaunchSpec> {
        return self.state.lock().unwrap().spawned.clone();
    }

    pub fn killed(&self) -> Vec<u32> {
        return self.state.lock().unwrap().killed.clone();
    }

    pub fn socket_inspections(&self) -> usize {
        return self.state.lock().unwrap().socket_inspections;
    }
}

#[async_trait]
impl ProcessHost for FakeHost {
    #[allow(clippy::implicit_return)]
    async fn is_installed(&self, _probe: &InstallProbe) -> bool {
        return self.installed;
    }

    fn snapshot(&self) -> Vec<ProcessInfo> {
        return self.state.lock().unwrap().processes.clone();
    }

    fn spawn(&self, spec: &LaunchSpec) -> Result<u32> {
        let mut state = self.state.lock().unwrap();
        let pid = state.next_pid;
        state.next_pid += 1;
        if !self.children_exit {
            state.processes.push(ProcessInfo {
                pid,
                name: spec.program.to_string(),
                cmdline: spec.command_line(),
            });
        }
        state.spawned.push(spec.clone());

        return Ok(pid);
    }

    fn kill(&self, pid: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.killed.push(pid);
        state.processes.retain(|process| return process.pid != pid);

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn listening_ports(&self, pid: u32) -> Result<Vec<u16>> {
        let mut state = self.state.lock().unwrap();
        state.socket_inspections += 1;
        if self.fail_inspection {
            bail!("lsof: command not found");
        }

        return Ok(state.ports.get(&pid).cloned().unwrap_or_default());
    }
}
