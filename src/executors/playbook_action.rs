//! Playbook action executor - run another playbook as a step.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, instrument};

use super::{ExecutionMetadata, PlaybookStepExecutor, StepContext};
use crate::engine::{Clock, Decomposer, SystemClock};
use crate::error::{Error, Result};
use crate::playbook::{PlaybookActionStep, StepKind, Variables};
use crate::reporter::StepReporter;
use crate::storage::PlaybookRepository;

/// Builds a fresh decomposer for each sub-playbook run.
pub trait DecomposerFactory: Send + Sync {
    fn new_decomposer(&self) -> Decomposer;
}

/// Loads the referenced playbook, seeds it with the caller's scope and runs
/// it to completion on a new decomposer.
pub struct PlaybookActionExecutor {
    repository: Arc<dyn PlaybookRepository>,
    decomposers: Arc<dyn DecomposerFactory>,
    reporter: Arc<dyn StepReporter>,
    clock: Arc<dyn Clock>,
}

impl PlaybookActionExecutor {
    pub fn new(
        repository: Arc<dyn PlaybookRepository>,
        decomposers: Arc<dyn DecomposerFactory>,
        reporter: Arc<dyn StepReporter>,
    ) -> Self {
        Self {
            repository,
            decomposers,
            reporter,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    async fn run(
        &self,
        metadata: &ExecutionMetadata,
        action: &PlaybookActionStep,
        variables: &Variables,
    ) -> Result<Variables> {
        let mut playbook = self.repository.read(&action.playbook_id).await?;

        // Caller scope wins over the sub-playbook's own defaults.
        let mut seeded = variables.clone();
        seeded.merge(&playbook.playbook_variables);
        playbook.playbook_variables = seeded;

        info!(
            parent_execution_id = %metadata.execution_id,
            sub_playbook_id = %playbook.id,
            "Starting sub-playbook"
        );

        let details = self
            .decomposers
            .new_decomposer()
            .execute(&playbook)
            .await
            .map_err(|e| {
                error!(sub_playbook_id = %playbook.id, error = %e, "Sub-playbook failed");
                let (details, source) = e.into_execution_parts();
                if let Some(details) = details {
                    debug!(sub_execution_id = %details.execution_id, "Sub-playbook execution recorded");
                }
                Error::SubPlaybook {
                    playbook_id: playbook.id.clone(),
                    source: Box::new(source),
                }
            })?;

        Ok(details.variables)
    }
}

#[async_trait]
impl PlaybookStepExecutor for PlaybookActionExecutor {
    #[instrument(
        name = "step.playbook_action",
        skip_all,
        fields(execution_id = %metadata.execution_id, step_id = %metadata.step_id)
    )]
    async fn execute(
        &self,
        metadata: &ExecutionMetadata,
        context: StepContext<'_>,
    ) -> Result<Variables> {
        let step = context.step;
        let StepKind::PlaybookAction(action) = &step.kind else {
            let err = Error::Executor(format!(
                "step '{}' of type {} is not a playbook-action step",
                step.id,
                step.step_type()
            ));
            error!(error = %err, "Incompatible step type");
            return Err(err);
        };

        self.reporter.report_step_start(
            metadata.execution_id,
            step,
            context.variables,
            self.clock.now(),
        );

        let result = self.run(metadata, action, context.variables).await;

        match &result {
            Ok(outputs) => self.reporter.report_step_end(
                metadata.execution_id,
                step,
                outputs,
                None,
                self.clock.now(),
            ),
            Err(e) => self.reporter.report_step_end(
                metadata.execution_id,
                step,
                &Variables::new(),
                Some(e),
                self.clock.now(),
            ),
        }

        let outputs = result?;
        if action.out_args.is_empty() {
            Ok(outputs)
        } else {
            Ok(outputs.select(&action.out_args))
        }
    }
}
