//! In-memory playbook repository.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{PlaybookMeta, PlaybookRepository};
use crate::error::{Error, Result};
use crate::playbook::{parse_playbook_file, Playbook};

/// Playbooks held in a map behind an async lock.
#[derive(Default)]
pub struct MemoryRepository {
    playbooks: RwLock<HashMap<String, Playbook>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository holding the given playbooks.
    pub fn with_playbooks(playbooks: impl IntoIterator<Item = Playbook>) -> Result<Self> {
        let mut map = HashMap::new();
        for playbook in playbooks {
            if map.contains_key(&playbook.id) {
                return Err(duplicate(&playbook.id));
            }
            map.insert(playbook.id.clone(), playbook);
        }
        Ok(Self {
            playbooks: RwLock::new(map),
        })
    }

    /// Load every `.json`, `.yaml` and `.yml` file in a directory.
    ///
    /// Returns the number of playbooks loaded. Files that fail to parse are
    /// skipped with a warning; duplicate ids are an error.
    pub async fn load_dir(&self, dir: &Path) -> Result<usize> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_playbook = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e, "json" | "yaml" | "yml"));
            if is_playbook && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            match parse_playbook_file(&path) {
                Ok(playbook) => {
                    debug!(path = %path.display(), playbook_id = %playbook.id, "Loaded playbook");
                    self.create(playbook).await?;
                    loaded += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping invalid playbook"),
            }
        }

        info!(dir = %dir.display(), loaded, "Loaded playbooks");
        Ok(loaded)
    }
}

fn duplicate(id: &str) -> Error {
    Error::Playbook(format!("playbook with id '{}' already exists", id))
}

fn not_found(id: &str) -> Error {
    Error::Playbook(format!("playbook with id '{}' not found", id))
}

#[async_trait]
impl PlaybookRepository for MemoryRepository {
    async fn create(&self, playbook: Playbook) -> Result<Playbook> {
        let mut playbooks = self.playbooks.write().await;
        if playbooks.contains_key(&playbook.id) {
            return Err(duplicate(&playbook.id));
        }
        playbooks.insert(playbook.id.clone(), playbook.clone());
        Ok(playbook)
    }

    async fn read(&self, id: &str) -> Result<Playbook> {
        self.playbooks
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn read_all(&self) -> Result<Vec<PlaybookMeta>> {
        let playbooks = self.playbooks.read().await;
        let mut metas: Vec<PlaybookMeta> = playbooks.values().map(PlaybookMeta::from).collect();
        metas.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(metas)
    }

    async fn update(&self, id: &str, mut playbook: Playbook) -> Result<Playbook> {
        let mut playbooks = self.playbooks.write().await;
        let slot = playbooks.get_mut(id).ok_or_else(|| not_found(id))?;
        playbook.id = id.to_string();
        *slot = playbook.clone();
        Ok(playbook)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.playbooks
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }
}
