use std::time::Duration;

use anyhow::Result;
use test_utils::lsof_listen_fixture;

use super::parse_listening_ports;
use super::LocalProcessHost;
use crate::domain::models::InstallProbe;
use crate::domain::models::LaunchSpec;
use crate::domain::models::ProcessHost;

#[test]
fn it_parses_listening_ports_in_order() {
    assert_eq!(parse_listening_ports(lsof_listen_fixture()), vec![8080, 8081]);
}

#[test]
fn it_ignores_non_listening_and_duplicate_sockets() {
    let output = r#"
COMMAND   PID   USER   FD   TYPE DEVICE SIZE/OFF NODE NAME
ollama  9001 golem    3u  IPv4 0x1      0t0  TCP 127.0.0.1:11434 (LISTEN)
ollama  9001 golem    4u  IPv6 0x2      0t0  TCP [::1]:11434 (LISTEN)
ollama  9001 golem    9u  IPv4 0x3      0t0  TCP 127.0.0.1:11434->127.0.0.1:52311 (ESTABLISHED)
"#;

    assert_eq!(parse_listening_ports(output), vec![11434]);
}

#[test]
fn it_returns_nothing_for_empty_output() {
    assert!(parse_listening_ports("").is_empty());
}

#[test]
fn it_lists_the_current_process() {
    let host = LocalProcessHost::default();

    let snapshot = host.snapshot();

    assert!(snapshot
        .iter()
        .any(|process| return process.pid == std::process::id()));
}

#[tokio::test]
async fn it_reports_missing_binaries_as_not_installed() {
    let host = LocalProcessHost::default();

    let installed = host
        .is_installed(&InstallProbe::Binary("lmdeck-binary-that-does-not-exist"))
        .await;

    assert!(!installed);
}

#[cfg(unix)]
#[tokio::test]
async fn it_kills_the_whole_group_of_a_spawned_child() -> Result<()> {
    let dir = std::env::temp_dir().join(format!("lmdeck-processes-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let pid_file = dir.join("worker.pid");
    let _ = std::fs::remove_file(&pid_file);

    let host = LocalProcessHost::default();
    let pid = host.spawn(&LaunchSpec {
        program: "sh".to_string(),
        args: vec![
            "-c".to_string(),
            format!("sleep 300 & echo $! > {}; wait", pid_file.display()),
        ],
        envs: vec![],
        log_path: dir.join("worker.log"),
    })?;

    let mut worker = None;
    for _ in 0..100 {
        if let Ok(text) = std::fs::read_to_string(&pid_file) {
            if let Ok(val) = text.trim().parse::<u32>() {
                worker = Some(val);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let worker = worker.unwrap();

    host.kill(pid)?;

    let mut worker_alive = true;
    for _ in 0..100 {
        worker_alive = host.snapshot().iter().any(|process| return process.pid == worker);
        if !worker_alive {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!worker_alive);
    assert!(!host.snapshot().iter().any(|process| return process.pid == pid));

    return Ok(());
}
