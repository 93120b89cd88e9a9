//! Execution ledger records.

use std::collections::HashMap;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::playbook::{Playbook, Step, Variables};

/// Status of an execution or a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    SuccessfullyExecuted,
    Failed,
    Ongoing,
    ServerSideError,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SuccessfullyExecuted => "successfully_executed",
            Self::Failed => "failed",
            Self::Ongoing => "ongoing",
            Self::ServerSideError => "server_side_error",
        };
        write!(f, "{}", s)
    }
}

/// One run of a playbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEntry {
    pub execution_id: Uuid,
    pub playbook_id: String,
    pub name: String,
    pub description: String,
    pub started: DateTime<Utc>,
    pub ended: Option<DateTime<Utc>>,
    pub status: Status,
    pub error: Option<String>,
    pub step_results: HashMap<String, StepResult>,
}

impl ExecutionEntry {
    pub(crate) fn started(execution_id: Uuid, playbook: &Playbook, at: DateTime<Utc>) -> Self {
        Self {
            execution_id,
            playbook_id: playbook.id.clone(),
            name: playbook.name.clone(),
            description: playbook.description.clone(),
            started: at,
            ended: None,
            status: Status::Ongoing,
            error: None,
            step_results: HashMap::new(),
        }
    }

    pub fn step(&self, step_id: &str) -> Option<&StepResult> {
        self.step_results.get(step_id)
    }
}

/// Outcome of one step within an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub execution_id: Uuid,
    pub step_id: String,
    pub name: String,
    pub description: String,
    pub started: DateTime<Utc>,
    pub ended: Option<DateTime<Utc>>,
    /// Base64 of each command's text
    pub commands_b64: Vec<String>,
    /// Scope at step start, replaced by the outputs at step end
    pub variables: Variables,
    pub status: Status,
    pub error: Option<String>,
    pub is_automated: bool,
}

impl StepResult {
    pub(crate) fn started(
        execution_id: Uuid,
        step: &Step,
        variables: &Variables,
        at: DateTime<Utc>,
    ) -> Self {
        let commands = step.commands();
        Self {
            execution_id,
            step_id: step.id.clone(),
            name: step.name.clone(),
            description: step.description.clone(),
            started: at,
            ended: None,
            commands_b64: commands
                .iter()
                .map(|c| base64::engine::general_purpose::STANDARD.encode(&c.command))
                .collect(),
            variables: variables.clone(),
            status: Status::Ongoing,
            error: None,
            is_automated: !commands.iter().any(|c| c.is_manual()),
        }
    }
}
