//! Execution reporting.
//!
//! The decomposer and step executors emit start/end events through the
//! [`WorkflowReporter`] and [`StepReporter`] traits. [`Reporter`] fans every
//! event out to the registered [`DownstreamReporter`]s, one of which is
//! usually the [`ExecutionCache`].

mod cache;
mod models;

pub use cache::{ExecutionCache, DEFAULT_MAX_EXECUTIONS};
pub use models::{ExecutionEntry, Status, StepResult};

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::playbook::{Playbook, Step, Variables};

/// Default number of downstream reporters.
pub const DEFAULT_MAX_REPORTERS: usize = 10;

/// Receives workflow-level events.
pub trait WorkflowReporter: Send + Sync {
    fn report_workflow_start(&self, execution_id: Uuid, playbook: &Playbook, at: DateTime<Utc>);

    fn report_workflow_end(
        &self,
        execution_id: Uuid,
        playbook: &Playbook,
        error: Option<&Error>,
        at: DateTime<Utc>,
    );
}

/// Receives step-level events.
pub trait StepReporter: Send + Sync {
    fn report_step_start(
        &self,
        execution_id: Uuid,
        step: &Step,
        variables: &Variables,
        at: DateTime<Utc>,
    );

    fn report_step_end(
        &self,
        execution_id: Uuid,
        step: &Step,
        outputs: &Variables,
        error: Option<&Error>,
        at: DateTime<Utc>,
    );
}

/// A reporting sink. Failures are logged by the [`Reporter`], never
/// propagated into the run.
pub trait DownstreamReporter: Send + Sync {
    fn report_workflow_start(
        &self,
        execution_id: Uuid,
        playbook: &Playbook,
        at: DateTime<Utc>,
    ) -> Result<()>;

    fn report_workflow_end(
        &self,
        execution_id: Uuid,
        playbook: &Playbook,
        error: Option<&Error>,
        at: DateTime<Utc>,
    ) -> Result<()>;

    fn report_step_start(
        &self,
        execution_id: Uuid,
        step: &Step,
        variables: &Variables,
        at: DateTime<Utc>,
    ) -> Result<()>;

    fn report_step_end(
        &self,
        execution_id: Uuid,
        step: &Step,
        outputs: &Variables,
        error: Option<&Error>,
        at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Fan-out reporter with a bounded set of downstream sinks.
pub struct Reporter {
    reporters: RwLock<Vec<Arc<dyn DownstreamReporter>>>,
    max_reporters: usize,
}

impl Reporter {
    pub fn new(max_reporters: usize) -> Self {
        Self {
            reporters: RwLock::new(Vec::new()),
            max_reporters,
        }
    }

    /// Create a reporter that feeds the given cache.
    pub fn with_cache(cache: Arc<ExecutionCache>) -> Self {
        let reporter = Self::default();
        reporter.reporters_mut().push(cache);
        reporter
    }

    /// Register downstream reporters; all or none are added.
    pub fn register(&self, reporters: Vec<Arc<dyn DownstreamReporter>>) -> Result<()> {
        if reporters.is_empty() {
            warn!("Reporters list is empty, no action taken");
            return Ok(());
        }

        let mut current = self.reporters_mut();
        if current.len() + reporters.len() > self.max_reporters {
            warn!(
                max = self.max_reporters,
                "Reporter not registered, too many reporters"
            );
            return Err(Error::Config(format!(
                "attempting to register too many reporters (max {})",
                self.max_reporters
            )));
        }
        current.extend(reporters);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<dyn DownstreamReporter>> {
        self.reporters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn reporters_mut(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<dyn DownstreamReporter>>> {
        self.reporters.write().unwrap_or_else(|e| e.into_inner())
    }

    fn each<F>(&self, event: &str, execution_id: Uuid, f: F)
    where
        F: Fn(&dyn DownstreamReporter) -> Result<()>,
    {
        for reporter in self.snapshot() {
            if let Err(e) = f(reporter.as_ref()) {
                warn!(%execution_id, event, error = %e, "Downstream reporter failed");
            }
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REPORTERS)
    }
}

impl WorkflowReporter for Reporter {
    fn report_workflow_start(&self, execution_id: Uuid, playbook: &Playbook, at: DateTime<Utc>) {
        debug!(%execution_id, playbook_id = %playbook.id, "Reporting workflow start");
        self.each("workflow_start", execution_id, |r| {
            r.report_workflow_start(execution_id, playbook, at)
        });
    }

    fn report_workflow_end(
        &self,
        execution_id: Uuid,
        playbook: &Playbook,
        error: Option<&Error>,
        at: DateTime<Utc>,
    ) {
        debug!(%execution_id, playbook_id = %playbook.id, failed = error.is_some(), "Reporting workflow end");
        self.each("workflow_end", execution_id, |r| {
            r.report_workflow_end(execution_id, playbook, error, at)
        });
    }
}

impl StepReporter for Reporter {
    fn report_step_start(
        &self,
        execution_id: Uuid,
        step: &Step,
        variables: &Variables,
        at: DateTime<Utc>,
    ) {
        debug!(%execution_id, step_id = %step.id, "Reporting step start");
        self.each("step_start", execution_id, |r| {
            r.report_step_start(execution_id, step, variables, at)
        });
    }

    fn report_step_end(
        &self,
        execution_id: Uuid,
        step: &Step,
        outputs: &Variables,
        error: Option<&Error>,
        at: DateTime<Utc>,
    ) {
        debug!(%execution_id, step_id = %step.id, failed = error.is_some(), "Reporting step end");
        self.each("step_end", execution_id, |r| {
            r.report_step_end(execution_id, step, outputs, error, at)
        });
    }
}
