use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use anyhow::Result;

use super::Discovery;
use crate::domain::models::BackendKind;
use crate::domain::services::fake_host::FakeHost;

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn scratch_dir() -> PathBuf {
    return std::env::temp_dir().join(format!(
        "lmdeck-discovery-{}-{}",
        process::id(),
        DIR_COUNTER.fetch_add(1, Ordering::SeqCst)
    ));
}

#[tokio::test]
async fn it_lists_models_per_backend_sorted() -> Result<()> {
    let root = scratch_dir();
    fs::create_dir_all(root.join("mlx_lm").join("qwen2.5-7b"))?;
    fs::create_dir_all(root.join("mlx_lm").join("llama-3.2-3b"))?;
    fs::create_dir_all(root.join("ollama").join("phi3"))?;
    fs::write(root.join("mlx_lm").join("README.md"), "not a model")?;

    let models = Discovery::new(root).list_models().await?;

    assert_eq!(models.len(), 2);
    assert_eq!(models[&BackendKind::MlxLm], vec!["llama-3.2-3b", "qwen2.5-7b"]);
    assert_eq!(models[&BackendKind::Ollama], vec!["phi3"]);

    return Ok(());
}

#[tokio::test]
async fn it_skips_directories_of_unknown_backends() -> Result<()> {
    let root = scratch_dir();
    fs::create_dir_all(root.join("llamacpp").join("tiny"))?;
    fs::create_dir_all(root.join("ollama"))?;

    let models = Discovery::new(root).list_models().await?;

    assert_eq!(models.len(), 1);
    assert!(models[&BackendKind::Ollama].is_empty());

    return Ok(());
}

#[tokio::test]
async fn it_treats_a_missing_models_directory_as_empty() -> Result<()> {
    let models = Discovery::new(scratch_dir()).list_models().await?;

    assert!(models.is_empty());

    return Ok(());
}

#[tokio::test]
async fn it_fails_when_the_root_is_not_a_directory() -> Result<()> {
    let root = scratch_dir();
    fs::create_dir_all(&root)?;
    let file = root.join("models");
    fs::write(&file, "")?;

    let res = Discovery::new(file.clone()).list_models().await;

    match res {
        Err(err) => assert!(err.to_string().contains(&file.display().to_string())),
        Ok(models) => panic!("unexpected models {:?}", models),
    }

    return Ok(());
}

#[tokio::test]
async fn it_reports_every_backend_when_installed() {
    let discovery = Discovery::new(scratch_dir());

    let installed = discovery.installed_backends(&FakeHost::new(true)).await;
    let missing = discovery.installed_backends(&FakeHost::new(false)).await;

    assert_eq!(installed, vec![BackendKind::Ollama, BackendKind::MlxLm]);
    assert!(missing.is_empty());
}
