//! Bounded in-memory execution ledger.
//!
//! Entries are kept in insertion order; once the cache holds `capacity`
//! executions, starting a new one evicts the oldest.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, warn};
use uuid::Uuid;

use super::models::{ExecutionEntry, Status, StepResult};
use super::DownstreamReporter;
use crate::error::{Error, Result};
use crate::playbook::{Playbook, Step, Variables};

/// Default number of executions kept.
pub const DEFAULT_MAX_EXECUTIONS: usize = 10;

const NOT_IN_CACHE: &str = "execution is not in cache";
const EXECUTION_FINISHED: &str =
    "trying to report on the execution of a step for an already reported completed or failed execution";
const STEP_FINISHED: &str =
    "trying to report on the execution of a step that was already reported completed or failed";

/// Execution status cache, usable as a downstream reporter.
pub struct ExecutionCache {
    capacity: usize,
    entries: Mutex<IndexMap<Uuid, ExecutionEntry>>,
}

impl ExecutionCache {
    /// Create a cache keeping at most `capacity` executions (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(IndexMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of every cached execution, oldest first.
    pub fn get_executions(&self) -> Vec<ExecutionEntry> {
        self.lock().values().cloned().collect()
    }

    /// Snapshot of one execution.
    pub fn get_execution_report(&self, execution_id: Uuid) -> Result<ExecutionEntry> {
        self.lock()
            .get(&execution_id)
            .cloned()
            .ok_or_else(|| not_in_cache(execution_id))
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<Uuid, ExecutionEntry>> {
        // A panic while holding the lock leaves the map itself consistent.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ExecutionCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EXECUTIONS)
    }
}

fn not_in_cache(execution_id: Uuid) -> Error {
    warn!(%execution_id, "Execution is not in cache, consider increasing cache size");
    Error::Cache(NOT_IN_CACHE.to_string())
}

impl DownstreamReporter for ExecutionCache {
    fn report_workflow_start(
        &self,
        execution_id: Uuid,
        playbook: &Playbook,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut entries = self.lock();
        if entries.contains_key(&execution_id) {
            return Err(Error::Cache(format!(
                "execution {} is already in cache",
                execution_id
            )));
        }

        while entries.len() >= self.capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                debug!(execution_id = %evicted, "Evicting oldest execution from cache");
            }
        }

        entries.insert(execution_id, ExecutionEntry::started(execution_id, playbook, at));
        Ok(())
    }

    fn report_workflow_end(
        &self,
        execution_id: Uuid,
        _playbook: &Playbook,
        error: Option<&Error>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut entries = self.lock();
        let entry = entries
            .get_mut(&execution_id)
            .ok_or_else(|| not_in_cache(execution_id))?;

        if entry.status != Status::Ongoing {
            return Err(Error::Cache(
                "trying to report the end of an already reported completed or failed execution"
                    .to_string(),
            ));
        }

        match error {
            Some(err) => {
                entry.status = Status::Failed;
                entry.error = Some(err.to_string());
            }
            None => entry.status = Status::SuccessfullyExecuted,
        }
        entry.ended = Some(at);
        Ok(())
    }

    fn report_step_start(
        &self,
        execution_id: Uuid,
        step: &Step,
        variables: &Variables,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut entries = self.lock();
        let entry = entries
            .get_mut(&execution_id)
            .ok_or_else(|| not_in_cache(execution_id))?;

        if entry.status != Status::Ongoing {
            return Err(Error::Cache(EXECUTION_FINISHED.to_string()));
        }

        if let Some(existing) = entry.step_results.get(&step.id) {
            if existing.status == Status::Ongoing {
                return Err(Error::Cache(format!(
                    "step {} is already ongoing in execution {}",
                    step.id, execution_id
                )));
            }
            debug!(step_id = %step.id, "Step executed again, replacing previous result");
        }

        entry.step_results.insert(
            step.id.clone(),
            StepResult::started(execution_id, step, variables, at),
        );
        Ok(())
    }

    fn report_step_end(
        &self,
        execution_id: Uuid,
        step: &Step,
        outputs: &Variables,
        error: Option<&Error>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut entries = self.lock();
        let entry = entries
            .get_mut(&execution_id)
            .ok_or_else(|| not_in_cache(execution_id))?;

        let result = entry
            .step_results
            .get_mut(&step.id)
            .ok_or_else(|| Error::Cache("execution step is not in cache".to_string()))?;

        if result.status != Status::Ongoing {
            return Err(Error::Cache(STEP_FINISHED.to_string()));
        }

        match error {
            Some(err) => {
                result.status = Status::ServerSideError;
                result.error = Some(err.to_string());
            }
            None => result.status = Status::SuccessfullyExecuted,
        }
        result.ended = Some(at);
        result.variables = outputs.clone();
        Ok(())
    }
}
