//! Playbook storage.
//!
//! Sub-playbook steps load the playbooks they call through
//! [`PlaybookRepository`]. The crate ships an in-memory implementation;
//! persistent backends implement the same trait.

mod memory;

pub use memory::MemoryRepository;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::playbook::Playbook;

/// Summary of a stored playbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookMeta {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl From<&Playbook> for PlaybookMeta {
    fn from(playbook: &Playbook) -> Self {
        Self {
            id: playbook.id.clone(),
            name: playbook.name.clone(),
            description: playbook.description.clone(),
        }
    }
}

/// Playbook store keyed by playbook id.
#[async_trait]
pub trait PlaybookRepository: Send + Sync {
    /// Store a new playbook. Fails if the id is taken.
    async fn create(&self, playbook: Playbook) -> Result<Playbook>;

    async fn read(&self, id: &str) -> Result<Playbook>;

    /// Summaries of every stored playbook, sorted by id.
    async fn read_all(&self) -> Result<Vec<PlaybookMeta>>;

    /// Replace a stored playbook. Fails if the id is unknown.
    async fn update(&self, id: &str, playbook: Playbook) -> Result<Playbook>;

    async fn delete(&self, id: &str) -> Result<()>;
}
