//! Playbook type definitions.
//!
//! The shapes follow the CACAO playbook document: a map of steps keyed by
//! id, each step pointing at its successors by id, plus definition maps for
//! agents, targets and authentication records that steps refer to.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::variables::Variables;

/// Command type for steps that need a human in the loop.
pub const COMMAND_TYPE_MANUAL: &str = "manual";

/// A complete playbook definition.
///
/// # Example YAML
///
/// ```yaml
/// id: playbook--example
/// name: block-ip
/// workflow_start: start--1
/// workflow:
///   start--1:
///     type: start
///     on_completion: action--1
///   action--1:
///     type: action
///     agent: agent--ssh
///     targets: [target--fw]
///     commands:
///       - type: ssh
///         command: "block __ip__:value"
///     on_completion: end--1
///   end--1:
///     type: end
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playbook {
    /// Unique playbook id (used by playbook-action steps to refer to it)
    pub id: String,

    #[serde(rename = "type", default = "default_playbook_type")]
    pub playbook_type: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub spec_version: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Id of the first step to execute
    pub workflow_start: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub workflow_exception: String,

    /// Steps keyed by id
    pub workflow: HashMap<String, Step>,

    #[serde(default)]
    pub agent_definitions: HashMap<String, AgentTarget>,

    #[serde(default)]
    pub target_definitions: HashMap<String, AgentTarget>,

    #[serde(default)]
    pub authentication_info_definitions: HashMap<String, AuthenticationInformation>,

    /// Variables global to the playbook
    #[serde(default)]
    pub playbook_variables: Variables,
}

fn default_playbook_type() -> String {
    "playbook".to_string()
}

impl Playbook {
    /// Get a step by id.
    pub fn get_step(&self, id: &str) -> Option<&Step> {
        self.workflow.get(id)
    }

    pub fn has_step(&self, id: &str) -> bool {
        self.workflow.contains_key(id)
    }

    /// Step ids in sorted order.
    pub fn step_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.workflow.keys().map(|k| k.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Copy map keys into the id/name fields of the contained records.
    pub fn normalize(&mut self) {
        for (id, step) in self.workflow.iter_mut() {
            step.id = id.clone();
            step.step_variables.normalize_names();
        }
        for (id, agent) in self.agent_definitions.iter_mut() {
            agent.id = id.clone();
        }
        for (id, target) in self.target_definitions.iter_mut() {
            target.id = id.clone();
        }
        for (id, auth) in self.authentication_info_definitions.iter_mut() {
            auth.id = id.clone();
        }
        self.playbook_variables.normalize_names();
    }
}

/// A step in the workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Step id; filled from the workflow map key when parsed
    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Delay before execution in milliseconds
    #[serde(default)]
    pub delay: i64,

    #[serde(default, skip_serializing_if = "Variables::is_empty")]
    pub step_variables: Variables,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub on_completion: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub on_success: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub on_failure: String,

    /// Kind-specific fields, tagged by `type`
    #[serde(flatten)]
    pub kind: StepKind,
}

/// Step kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StepKind {
    Start,
    End,
    Action(ActionStep),
    IfCondition(ConditionStep),
    WhileCondition(ConditionStep),
    PlaybookAction(PlaybookActionStep),
    /// Reserved: parsed and validated, executed as a no-op
    Parallel(ParallelStep),
    /// Reserved: parsed and validated, executed as a no-op
    SwitchCondition(SwitchStep),
}

/// Fields of an `action` step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionStep {
    #[serde(default)]
    pub commands: Vec<Command>,

    /// Agent id; the agent's name selects the capability
    #[serde(default)]
    pub agent: String,

    /// Target ids; every command runs once per target
    #[serde(default)]
    pub targets: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authentication_info: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub in_args: Vec<String>,

    /// When set, only these output variables leave the step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub out_args: Vec<String>,
}

/// Fields of `if-condition` and `while-condition` steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionStep {
    #[serde(default)]
    pub condition: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub on_true: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub on_false: String,
}

/// Fields of a `playbook-action` step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaybookActionStep {
    #[serde(default)]
    pub playbook_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub playbook_version: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub in_args: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub out_args: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParallelStep {
    #[serde(default)]
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchStep {
    #[serde(default)]
    pub switch: String,

    /// Case value to step id
    #[serde(default)]
    pub cases: HashMap<String, String>,
}

impl Step {
    /// Create a step of the given kind.
    pub fn new(id: &str, kind: StepKind) -> Self {
        Self {
            id: id.to_string(),
            name: String::new(),
            description: String::new(),
            delay: 0,
            step_variables: Variables::new(),
            on_completion: String::new(),
            on_success: String::new(),
            on_failure: String::new(),
            kind,
        }
    }

    pub fn with_completion(mut self, next: &str) -> Self {
        self.on_completion = next.to_string();
        self
    }

    pub fn with_delay(mut self, delay_ms: i64) -> Self {
        self.delay = delay_ms;
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.step_variables = variables;
        self
    }

    /// The `type` tag of this step.
    pub fn step_type(&self) -> &'static str {
        match self.kind {
            StepKind::Start => "start",
            StepKind::End => "end",
            StepKind::Action(_) => "action",
            StepKind::IfCondition(_) => "if-condition",
            StepKind::WhileCondition(_) => "while-condition",
            StepKind::PlaybookAction(_) => "playbook-action",
            StepKind::Parallel(_) => "parallel",
            StepKind::SwitchCondition(_) => "switch-condition",
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, StepKind::End)
    }

    /// Forward edge used by the decomposer: on_completion, else on_success,
    /// else on_failure.
    pub fn next_step_id(&self) -> Option<&str> {
        [&self.on_completion, &self.on_success, &self.on_failure]
            .into_iter()
            .find(|id| !id.is_empty())
            .map(|id| id.as_str())
    }

    /// Every non-empty successor reference, without duplicates.
    pub fn successors(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = vec![
            self.on_completion.as_str(),
            self.on_success.as_str(),
            self.on_failure.as_str(),
        ];

        match &self.kind {
            StepKind::IfCondition(c) | StepKind::WhileCondition(c) => {
                ids.push(&c.on_true);
                ids.push(&c.on_false);
            }
            StepKind::Parallel(p) => ids.extend(p.next_steps.iter().map(|s| s.as_str())),
            StepKind::SwitchCondition(s) => {
                let mut cases: Vec<(&String, &String)> = s.cases.iter().collect();
                cases.sort();
                ids.extend(cases.into_iter().map(|(_, step)| step.as_str()));
            }
            _ => {}
        }

        let mut seen = std::collections::HashSet::new();
        ids.into_iter()
            .filter(|id| !id.is_empty() && seen.insert(*id))
            .collect()
    }

    /// Output allow-list, if the step kind has one.
    pub fn out_args(&self) -> &[String] {
        match &self.kind {
            StepKind::Action(a) => &a.out_args,
            StepKind::PlaybookAction(p) => &p.out_args,
            _ => &[],
        }
    }

    /// Commands of an action step; empty for other kinds.
    pub fn commands(&self) -> &[Command] {
        match &self.kind {
            StepKind::Action(a) => &a.commands,
            _ => &[],
        }
    }
}

/// A command dispatched to a capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "type")]
    pub command_type: String,

    #[serde(default)]
    pub command: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command_b64: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub playbook_activity: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, Vec<String>>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_b64: String,
}

impl Command {
    pub fn new(command_type: &str, command: &str) -> Self {
        Self {
            command_type: command_type.to_string(),
            command: command.to_string(),
            ..Default::default()
        }
    }

    pub fn is_manual(&self) -> bool {
        self.command_type == COMMAND_TYPE_MANUAL
    }
}

/// An agent or a target definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentTarget {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type", default)]
    pub target_type: String,

    /// For agents, the capability registry key
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Address type (ipv4, dname, url, ...) to addresses
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub address: HashMap<String, Vec<String>>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub port: String,

    /// Id of the authentication record used to reach this target
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authentication_info: String,
}

/// Credentials referenced by targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationInformation {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type", default)]
    pub auth_type: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub private_key: String,

    #[serde(default)]
    pub kms: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kms_key_identifier: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub oauth_header: String,
}
