#[cfg(test)]
#[path = "discovery_test.rs"]
mod tests;

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use strum::IntoEnumIterator;

use crate::domain::models::BackendKind;
use crate::domain::models::DiscoveryError;
use crate::domain::models::ProcessHost;

fn unreadable(path: &Path, err: std::io::Error) -> DiscoveryError {
    return DiscoveryError::Unreadable {
        path: path.to_path_buf(),
        reason: err.to_string(),
    };
}

/// Finds installed backends and the models stored for them under
/// `<root>/<backend>/<model>/`.
pub struct Discovery {
    root: PathBuf,
}

impl Discovery {
    pub fn new(root: PathBuf) -> Discovery {
        return Discovery { root };
    }

    pub fn root(&self) -> &Path {
        return &self.root;
    }

    pub async fn installed_backends(&self, host: &(dyn ProcessHost + Send + Sync)) -> Vec<BackendKind> {
        let mut res = vec![];
        for kind in BackendKind::iter() {
            if host.is_installed(&kind.install_probe()).await {
                res.push(kind);
            }
        }

        return res;
    }

    /// Model directories per backend, sorted by name. A missing models
    /// directory yields an empty map. Directories that don't name a backend
    /// are skipped.
    pub async fn list_models(&self) -> Result<BTreeMap<BackendKind, Vec<String>>, DiscoveryError> {
        let mut res = BTreeMap::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.root.display(), "Models directory does not exist");
                return Ok(res);
            }
            Err(err) => return Err(unreadable(&self.root, err)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| return unreadable(&self.root, err))?
        {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            let kind = match BackendKind::parse(&name) {
                Some(kind) => kind,
                None => {
                    tracing::warn!(path = %path.display(), "Skipping directory of unknown backend");
                    continue;
                }
            };

            res.insert(kind, list_dirs(&path).await?);
        }

        return Ok(res);
    }
}

async fn list_dirs(path: &Path) -> Result<Vec<String>, DiscoveryError> {
    let mut res = vec![];
    let mut entries = tokio::fs::read_dir(path)
        .await
        .map_err(|err| return unreadable(path, err))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| return unreadable(path, err))?
    {
        if entry.path().is_dir() {
            res.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    res.sort();

    return Ok(res);
}
