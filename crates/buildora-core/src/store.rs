//! Project persistence
//!
//! The store is an explicit collaborator handed to whoever needs it. Nothing in
//! Buildora reaches for ambient global storage.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{BuildoraError, Project, Result};

/// Get/put/delete access to persisted projects, keyed by project id
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Project>>;

    /// Insert or replace a project
    async fn put(&self, project: &Project) -> Result<()>;

    /// Returns true when a project was removed
    async fn delete(&self, id: &str) -> Result<bool>;

    /// All projects, most recently modified first
    async fn list(&self) -> Result<Vec<Project>>;
}

/// In-memory store, mainly for tests and short-lived sessions
#[derive(Default)]
pub struct MemoryStore {
    projects: RwLock<HashMap<String, Project>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Project>> {
        Ok(self.projects.read().await.get(id).cloned())
    }

    async fn put(&self, project: &Project) -> Result<()> {
        self.projects
            .write()
            .await
            .insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.projects.write().await.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<Project>> {
        let mut projects: Vec<_> = self.projects.read().await.values().cloned().collect();
        projects.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(projects)
    }
}

/// One JSON document per project inside a directory
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(BuildoraError::Store(format!("Invalid project id: {}", id)));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

#[async_trait]
impl ProjectStore for JsonDirStore {
    async fn get(&self, id: &str) -> Result<Option<Project>> {
        let path = self.path_for(id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, project: &Project) -> Result<()> {
        let path = self.path_for(&project.id)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        // Write to a sibling file, then rename over the target
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(project)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(id = %project.id, path = %path.display(), "Saved project");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<Project>> {
        let mut projects = Vec::new();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(projects),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<Project>(&content) {
                Ok(project) => projects.push(project),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Skipping unreadable project: {}", e)
                }
            }
        }

        projects.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(projects)
    }
}
