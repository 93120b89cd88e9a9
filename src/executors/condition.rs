//! Condition step executor (if/while).

use std::sync::Arc;

use tracing::{debug, error, instrument};

use super::{ConditionStepExecutor, ExecutionMetadata, StepContext};
use crate::comparison::ConditionEvaluator;
use crate::engine::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::playbook::StepKind;
use crate::reporter::StepReporter;

/// Evaluates the condition of an if/while step and picks where to go next.
pub struct ConditionExecutor {
    evaluator: Arc<dyn ConditionEvaluator>,
    reporter: Arc<dyn StepReporter>,
    clock: Arc<dyn Clock>,
}

impl ConditionExecutor {
    pub fn new(evaluator: Arc<dyn ConditionEvaluator>, reporter: Arc<dyn StepReporter>) -> Self {
        Self {
            evaluator,
            reporter,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl ConditionStepExecutor for ConditionExecutor {
    #[instrument(
        name = "step.condition",
        skip_all,
        fields(execution_id = %metadata.execution_id, step_id = %metadata.step_id)
    )]
    fn execute(
        &self,
        metadata: &ExecutionMetadata,
        context: StepContext<'_>,
    ) -> Result<(String, bool)> {
        let step = context.step;
        let condition = match &step.kind {
            StepKind::IfCondition(c) | StepKind::WhileCondition(c) => c,
            _ => {
                let err = Error::Executor(format!(
                    "step '{}' of type {} is not a condition step",
                    step.id,
                    step.step_type()
                ));
                error!(error = %err, "Incompatible step type");
                return Err(err);
            }
        };

        self.reporter.report_step_start(
            metadata.execution_id,
            step,
            context.variables,
            self.clock.now(),
        );

        let result = self
            .evaluator
            .evaluate(&condition.condition, context.variables);

        // Reported before branching so the branch steps are not nested in it.
        self.reporter.report_step_end(
            metadata.execution_id,
            step,
            context.variables,
            result.as_ref().err(),
            self.clock.now(),
        );

        let result = result?;
        debug!(condition = %condition.condition, result, "Condition evaluated");

        let branch = if result {
            &condition.on_true
        } else {
            &condition.on_false
        };
        if !branch.is_empty() {
            return Ok((branch.clone(), true));
        }

        Ok((step.on_completion.clone(), false))
    }
}
