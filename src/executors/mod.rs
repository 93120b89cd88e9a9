//! Step executors.
//!
//! The decomposer hands each step to the executor for its kind:
//! - [`ActionStepExecutor`]: runs commands through capabilities
//! - [`ConditionStepExecutor`]: picks the branch of an if/while step
//! - [`PlaybookStepExecutor`]: runs another playbook as a sub-workflow
//!
//! Executors report step start/end themselves, so the reported variables
//! are what the executor actually saw and produced.

mod action;
mod capability;
mod condition;
mod debug;
mod playbook_action;

pub use action::ActionExecutor;
pub use capability::{Capability, CapabilityContext, CapabilityRegistry};
pub use condition::ConditionExecutor;
pub use debug::{DebugCapability, DEBUG_OUTPUT};
pub use playbook_action::{DecomposerFactory, PlaybookActionExecutor};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::playbook::{Playbook, Step, Variables};

/// Identifies the step being executed within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetadata {
    pub execution_id: Uuid,
    pub playbook_id: String,
    pub step_id: String,
}

/// The step to execute, the playbook it belongs to, and its scope.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub playbook: &'a Playbook,
    pub step: &'a Step,
    pub variables: &'a Variables,
}

/// Executes `action` steps.
#[async_trait]
pub trait ActionStepExecutor: Send + Sync {
    async fn execute(
        &self,
        metadata: &ExecutionMetadata,
        context: StepContext<'_>,
    ) -> Result<Variables>;
}

/// Evaluates `if-condition` and `while-condition` steps.
///
/// Returns the id of the step to continue with and whether that id starts
/// a branch (`on_true`/`on_false`) rather than the step's own completion.
pub trait ConditionStepExecutor: Send + Sync {
    fn execute(
        &self,
        metadata: &ExecutionMetadata,
        context: StepContext<'_>,
    ) -> Result<(String, bool)>;
}

/// Executes `playbook-action` steps.
#[async_trait]
pub trait PlaybookStepExecutor: Send + Sync {
    async fn execute(
        &self,
        metadata: &ExecutionMetadata,
        context: StepContext<'_>,
    ) -> Result<Variables>;
}
