//! Action step executor.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, instrument};

use super::capability::{CapabilityContext, CapabilityRegistry};
use super::{ActionStepExecutor, ExecutionMetadata, StepContext};
use crate::engine::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::playbook::{
    ActionStep, AgentTarget, AuthenticationInformation, Command, StepKind, Variables,
};
use crate::reporter::StepReporter;

/// Runs every command of an action step against every target through the
/// capability registered under the agent's name.
pub struct ActionExecutor {
    capabilities: Arc<CapabilityRegistry>,
    reporter: Arc<dyn StepReporter>,
    clock: Arc<dyn Clock>,
}

impl ActionExecutor {
    pub fn new(capabilities: Arc<CapabilityRegistry>, reporter: Arc<dyn StepReporter>) -> Self {
        Self {
            capabilities,
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
        context: StepContext<'_>,
        action: &ActionStep,
    ) -> Result<Variables> {
        let agent = context
            .playbook
            .agent_definitions
            .get(&action.agent)
            .ok_or_else(|| Error::CapabilityUnavailable(action.agent.clone()))?;

        let capability = self
            .capabilities
            .get(&agent.name)
            .ok_or_else(|| Error::CapabilityUnavailable(agent.name.clone()))?;

        let targets = resolve_targets(context, action)?;
        let variables = context.variables;

        let mut outputs = Variables::new();
        for command in &action.commands {
            for (target, step_auth) in &targets {
                let auth_id = if target.authentication_info.is_empty() {
                    step_auth.as_str()
                } else {
                    target.authentication_info.as_str()
                };
                let authentication = context
                    .playbook
                    .authentication_info_definitions
                    .get(auth_id)
                    .cloned()
                    .unwrap_or_default();

                let capability_context = CapabilityContext {
                    command: interpolate_command(command, variables),
                    target: interpolate_target(target, variables),
                    authentication: interpolate_authentication(&authentication, variables),
                    variables: variables.clone(),
                    in_args: action.in_args.clone(),
                    out_args: action.out_args.clone(),
                };

                debug!(
                    capability = %capability.capability_type(),
                    target_id = %target.id,
                    "Executing command"
                );

                let produced = capability
                    .execute(metadata, capability_context)
                    .await
                    .map_err(|e| {
                        error!(target_id = %target.id, error = %e, "Command failed");
                        e
                    })?;
                outputs.merge_replace(&produced);
            }
        }

        Ok(outputs)
    }
}

/// Targets of the step, each paired with the step-level authentication id
/// used when the target names none. A step without targets runs its
/// commands once against an empty target.
fn resolve_targets(
    context: StepContext<'_>,
    action: &ActionStep,
) -> Result<Vec<(AgentTarget, String)>> {
    if action.targets.is_empty() {
        return Ok(vec![(
            AgentTarget::default(),
            action.authentication_info.clone(),
        )]);
    }

    action
        .targets
        .iter()
        .map(|id| {
            context
                .playbook
                .target_definitions
                .get(id)
                .cloned()
                .map(|target| (target, action.authentication_info.clone()))
                .ok_or_else(|| Error::Executor(format!("target '{}' is not defined", id)))
        })
        .collect()
}

fn interpolate_command(command: &Command, variables: &Variables) -> Command {
    let mut command = command.clone();
    command.command = variables.interpolate(&command.command);
    command.content = variables.interpolate(&command.content);
    command.content_b64 = variables.interpolate(&command.content_b64);
    interpolate_lists(&mut command.headers, variables);
    command
}

fn interpolate_target(target: &AgentTarget, variables: &Variables) -> AgentTarget {
    let mut target = target.clone();
    interpolate_lists(&mut target.address, variables);
    target
}

fn interpolate_authentication(
    auth: &AuthenticationInformation,
    variables: &Variables,
) -> AuthenticationInformation {
    let mut auth = auth.clone();
    for field in [
        &mut auth.username,
        &mut auth.password,
        &mut auth.user_id,
        &mut auth.token,
        &mut auth.oauth_header,
        &mut auth.private_key,
    ] {
        *field = variables.interpolate(field);
    }
    auth
}

fn interpolate_lists(map: &mut HashMap<String, Vec<String>>, variables: &Variables) {
    for values in map.values_mut() {
        for value in values.iter_mut() {
            *value = variables.interpolate(value);
        }
    }
}

#[async_trait]
impl ActionStepExecutor for ActionExecutor {
    #[instrument(
        name = "step.action",
        skip_all,
        fields(execution_id = %metadata.execution_id, step_id = %metadata.step_id)
    )]
    async fn execute(
        &self,
        metadata: &ExecutionMetadata,
        context: StepContext<'_>,
    ) -> Result<Variables> {
        let step = context.step;
        self.reporter.report_step_start(
            metadata.execution_id,
            step,
            context.variables,
            self.clock.now(),
        );

        let StepKind::Action(action) = &step.kind else {
            let err = Error::Executor(format!(
                "step '{}' of type {} is not an action step",
                step.id,
                step.step_type()
            ));
            self.reporter.report_step_end(
                metadata.execution_id,
                step,
                &Variables::new(),
                Some(&err),
                self.clock.now(),
            );
            return Err(err);
        };

        match self.run(metadata, context, action).await {
            Ok(outputs) => {
                self.reporter.report_step_end(
                    metadata.execution_id,
                    step,
                    &outputs,
                    None,
                    self.clock.now(),
                );
                if action.out_args.is_empty() {
                    Ok(outputs)
                } else {
                    Ok(outputs.select(&action.out_args))
                }
            }
            Err(e) => {
                self.reporter.report_step_end(
                    metadata.execution_id,
                    step,
                    &Variables::new(),
                    Some(&e),
                    self.clock.now(),
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::{Capability, DebugCapability, DEBUG_OUTPUT};
    use crate::playbook::{parse_playbook, Playbook, Variable};
    use crate::reporter::{ExecutionCache, Reporter, Status};
    use crate::reporter::WorkflowReporter;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Records every context it receives and returns fixed outputs.
    struct Recording {
        name: String,
        seen: Mutex<Vec<CapabilityContext>>,
        outputs: Variables,
        fail: bool,
    }

    impl Recording {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                seen: Mutex::new(Vec::new()),
                outputs: Variables::new(),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl Capability for Recording {
        fn capability_type(&self) -> &str {
            &self.name
        }

        async fn execute(
            &self,
            _metadata: &ExecutionMetadata,
            context: CapabilityContext,
        ) -> Result<Variables> {
            self.seen.lock().unwrap().push(context);
            if self.fail {
                return Err(Error::Capability("connection refused".into()));
            }
            Ok(self.outputs.clone())
        }
    }

    const PLAYBOOK: &str = r#"
id: playbook--action
workflow_start: start
playbook_variables:
  __ip__:
    value: 10.0.0.5
  __user__:
    value: admin
  __secret__:
    value: s3cret
agent_definitions:
  agent--ssh:
    type: soarca
    name: soarca-ssh
target_definitions:
  target--a:
    type: linux
    name: host-a
    address:
      ipv4: ["__ip__:value"]
    authentication_info: auth--a
  target--b:
    type: linux
    name: host-b
    address:
      dname: ["b.example.com"]
authentication_info_definitions:
  auth--a:
    type: user-auth
    username: "__user__:value"
    password: "__secret__:value"
  auth--step:
    type: user-auth
    username: step-user
workflow:
  start:
    type: start
    on_completion: action
  action:
    type: action
    agent: agent--ssh
    targets: [target--a, target--b]
    authentication_info: auth--step
    commands:
      - type: ssh
        command: "block __ip__:value"
        headers:
          X-User: ["__user__:value"]
      - type: ssh
        command: "echo done"
    on_completion: end
  end:
    type: end
"#;

    fn playbook() -> Playbook {
        parse_playbook(PLAYBOOK).unwrap()
    }

    fn metadata(step_id: &str) -> ExecutionMetadata {
        ExecutionMetadata {
            execution_id: Uuid::new_v4(),
            playbook_id: "playbook--action".into(),
            step_id: step_id.into(),
        }
    }

    fn executor(capability: Arc<dyn Capability>, reporter: Arc<Reporter>) -> ActionExecutor {
        ActionExecutor::new(
            Arc::new(CapabilityRegistry::new().with(capability)),
            reporter,
        )
    }

    #[tokio::test]
    async fn test_commands_times_targets_interpolated() {
        let playbook = playbook();
        let capability = Arc::new(Recording::new("soarca-ssh"));
        let executor = executor(capability.clone(), Arc::new(Reporter::default()));
        let context = StepContext {
            playbook: &playbook,
            step: playbook.get_step("action").unwrap(),
            variables: &playbook.playbook_variables,
        };

        executor.execute(&metadata("action"), context).await.unwrap();

        let seen = capability.seen.lock().unwrap();
        assert_eq!(seen.len(), 4);

        let first = &seen[0];
        assert_eq!(first.command.command, "block 10.0.0.5");
        assert_eq!(first.command.headers["X-User"], vec!["admin"]);
        assert_eq!(first.target.address["ipv4"], vec!["10.0.0.5"]);
        assert_eq!(first.authentication.username, "admin");
        assert_eq!(first.authentication.password, "s3cret");

        // Target without its own credentials falls back to the step's.
        assert_eq!(seen[1].target.name, "host-b");
        assert_eq!(seen[1].authentication.username, "step-user");

        assert_eq!(seen[2].command.command, "echo done");
    }

    #[tokio::test]
    async fn test_out_args_filter_outputs() {
        let mut playbook = playbook();
        if let StepKind::Action(action) = &mut playbook.workflow.get_mut("action").unwrap().kind {
            action.out_args = vec!["__kept__".into()];
        }

        let mut recording = Recording::new("soarca-ssh");
        recording.outputs = [Variable::new("__kept__", "1"), Variable::new("__dropped__", "2")]
            .into_iter()
            .collect();
        let executor = executor(Arc::new(recording), Arc::new(Reporter::default()));
        let context = StepContext {
            playbook: &playbook,
            step: playbook.get_step("action").unwrap(),
            variables: &playbook.playbook_variables,
        };

        let outputs = executor.execute(&metadata("action"), context).await.unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs.value("__kept__"), Some("1"));
    }

    #[tokio::test]
    async fn test_missing_capability() {
        let playbook = playbook();
        let executor = executor(
            Arc::new(DebugCapability::named("soarca-http")),
            Arc::new(Reporter::default()),
        );
        let context = StepContext {
            playbook: &playbook,
            step: playbook.get_step("action").unwrap(),
            variables: &playbook.playbook_variables,
        };

        let err = executor
            .execute(&metadata("action"), context)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "capability: soarca-ssh is not available");
    }

    #[tokio::test]
    async fn test_failure_reported_to_cache() {
        let playbook = playbook();
        let cache = Arc::new(ExecutionCache::default());
        let reporter = Arc::new(Reporter::with_cache(cache.clone()));

        let mut recording = Recording::new("soarca-ssh");
        recording.fail = true;
        let executor = executor(Arc::new(recording), reporter.clone());

        let metadata = metadata("action");
        reporter.report_workflow_start(metadata.execution_id, &playbook, chrono::Utc::now());

        let context = StepContext {
            playbook: &playbook,
            step: playbook.get_step("action").unwrap(),
            variables: &playbook.playbook_variables,
        };
        assert!(executor.execute(&metadata, context).await.is_err());

        let report = cache.get_execution_report(metadata.execution_id).unwrap();
        let step = report.step("action").unwrap();
        assert_eq!(step.status, Status::ServerSideError);
        assert!(step.error.as_ref().unwrap().contains("connection refused"));
        assert_eq!(step.commands_b64.len(), 2);
    }

    #[tokio::test]
    async fn test_step_without_targets_runs_once() {
        let mut playbook = playbook();
        if let StepKind::Action(action) = &mut playbook.workflow.get_mut("action").unwrap().kind {
            action.targets.clear();
            action.commands.truncate(1);
        }

        let executor = executor(
            Arc::new(DebugCapability::named("soarca-ssh")),
            Arc::new(Reporter::default()),
        );
        let context = StepContext {
            playbook: &playbook,
            step: playbook.get_step("action").unwrap(),
            variables: &playbook.playbook_variables,
        };

        let outputs = executor.execute(&metadata("action"), context).await.unwrap();
        assert_eq!(outputs.value(DEBUG_OUTPUT), Some("block 10.0.0.5"));
    }

    #[tokio::test]
    async fn test_wrong_step_kind() {
        let playbook = playbook();
        let executor = executor(
            Arc::new(DebugCapability::named("soarca-ssh")),
            Arc::new(Reporter::default()),
        );
        let context = StepContext {
            playbook: &playbook,
            step: playbook.get_step("start").unwrap(),
            variables: &playbook.playbook_variables,
        };

        assert!(matches!(
            executor.execute(&metadata("start"), context).await,
            Err(Error::Executor(_))
        ));
    }
}
