//! The decomposer: walks a playbook's step graph and dispatches each step.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, warn, Span};
use uuid::Uuid;

use super::runtime::{Clock, IdGenerator, SystemClock, UuidGenerator};
use crate::error::{Error, Result};
use crate::executors::{
    ActionStepExecutor, ConditionStepExecutor, ExecutionMetadata, PlaybookStepExecutor,
    StepContext,
};
use crate::playbook::{Playbook, Step, StepKind, Variables};
use crate::reporter::WorkflowReporter;

/// Outcome of a playbook run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionDetails {
    pub execution_id: Uuid,
    pub playbook_id: String,
    /// Playbook variables overlaid with every output of the run
    pub variables: Variables,
}

/// Execution state machine for one playbook run at a time.
///
/// A decomposer is cheap to build; sub-playbooks get a fresh one.
pub struct Decomposer {
    actions: Arc<dyn ActionStepExecutor>,
    conditions: Arc<dyn ConditionStepExecutor>,
    playbooks: Arc<dyn PlaybookStepExecutor>,
    reporter: Arc<dyn WorkflowReporter>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

/// Per-run state shared by every branch of the walk.
struct Run<'a> {
    playbook: &'a Playbook,
    execution_id: Uuid,
}

impl Run<'_> {
    fn metadata(&self, step: &Step) -> ExecutionMetadata {
        ExecutionMetadata {
            execution_id: self.execution_id,
            playbook_id: self.playbook.id.clone(),
            step_id: step.id.clone(),
        }
    }
}

impl Decomposer {
    pub fn new(
        actions: Arc<dyn ActionStepExecutor>,
        conditions: Arc<dyn ConditionStepExecutor>,
        playbooks: Arc<dyn PlaybookStepExecutor>,
        reporter: Arc<dyn WorkflowReporter>,
    ) -> Self {
        Self {
            actions,
            conditions,
            playbooks,
            reporter,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Run a playbook to completion.
    ///
    /// On failure the error is [`Error::ExecutionFailed`], carrying the
    /// execution details next to the step error; the reporter has already
    /// recorded the partial run under that execution id.
    pub async fn execute(&self, playbook: &Playbook) -> Result<ExecutionDetails> {
        self.run(playbook, None).await
    }

    /// Run a playbook, publishing its execution details on `started` as soon
    /// as the execution id is known.
    ///
    /// Callers that only need the id can spawn this and await the receiver.
    pub async fn execute_async(
        &self,
        playbook: &Playbook,
        started: oneshot::Sender<ExecutionDetails>,
    ) -> Result<ExecutionDetails> {
        self.run(playbook, Some(started)).await
    }

    #[instrument(
        name = "playbook.execute",
        skip_all,
        fields(playbook_id = %playbook.id, execution_id = tracing::field::Empty)
    )]
    async fn run(
        &self,
        playbook: &Playbook,
        started: Option<oneshot::Sender<ExecutionDetails>>,
    ) -> Result<ExecutionDetails> {
        let execution_id = self.ids.new_id();
        Span::current().record("execution_id", tracing::field::display(execution_id));

        let mut details = ExecutionDetails {
            execution_id,
            playbook_id: playbook.id.clone(),
            variables: playbook.playbook_variables.clone(),
        };

        if let Some(sender) = started {
            if sender.send(details.clone()).is_err() {
                debug!("Execution details receiver dropped");
            }
        }

        info!("Starting execution {} of playbook '{}'", execution_id, playbook.id);
        self.reporter
            .report_workflow_start(execution_id, playbook, self.clock.now());

        let run = Run {
            playbook,
            execution_id,
        };
        let result = self
            .execute_branch(&run, &playbook.workflow_start, playbook.playbook_variables.clone())
            .await;

        match result {
            Ok(outputs) => {
                self.reporter
                    .report_workflow_end(execution_id, playbook, None, self.clock.now());
                details.variables.merge_replace(&outputs);
                info!("Execution {} completed", execution_id);
                Ok(details)
            }
            Err(e) => {
                self.reporter
                    .report_workflow_end(execution_id, playbook, Some(&e), self.clock.now());
                error!(error = %e, "Execution {} failed", execution_id);
                Err(Error::ExecutionFailed {
                    details: Box::new(details),
                    source: Box::new(e),
                })
            }
        }
    }

    /// Walk one branch from `step_id` until an `end` step, returning every
    /// output produced along the way.
    fn execute_branch<'a>(
        &'a self,
        run: &'a Run<'a>,
        step_id: &'a str,
        scope: Variables,
    ) -> BoxFuture<'a, Result<Variables>> {
        Box::pin(async move {
            let mut scope = scope;
            let mut outputs = Variables::new();
            let mut current = step_id;

            loop {
                let step = run
                    .playbook
                    .get_step(current)
                    .ok_or_else(|| Error::StepNotFound(current.to_string()))?;

                if step.is_end() {
                    debug!(step_id = %step.id, "Reached end step");
                    return Ok(outputs);
                }

                let next = step
                    .next_step_id()
                    .filter(|next| run.playbook.has_step(next))
                    .ok_or_else(|| Error::EmptyCompletion(step.id.clone()))?;

                if step.delay > 0 {
                    debug!(step_id = %step.id, delay_ms = step.delay, "Delaying step");
                    self.clock
                        .sleep(Duration::from_millis(step.delay.unsigned_abs()))
                        .await;
                }

                let mut step_scope = scope.clone();
                step_scope.merge_replace(&step.step_variables);

                let produced = self
                    .execute_step(run, step, &step_scope)
                    .await
                    .map_err(|e| Error::at_step(&step.id, e))?;

                outputs.merge_replace(&produced);
                scope.merge_replace(&produced);
                current = next;
            }
        })
    }

    async fn execute_step(
        &self,
        run: &Run<'_>,
        step: &Step,
        scope: &Variables,
    ) -> Result<Variables> {
        debug!(step_id = %step.id, step_type = step.step_type(), "Executing step");
        let metadata = run.metadata(step);
        let context = StepContext {
            playbook: run.playbook,
            step,
            variables: scope,
        };

        match &step.kind {
            StepKind::Start | StepKind::End => Ok(Variables::new()),
            StepKind::Action(_) => self.actions.execute(&metadata, context).await,
            StepKind::PlaybookAction(_) => self.playbooks.execute(&metadata, context).await,
            StepKind::IfCondition(_) => {
                let (next, branch) = self.conditions.execute(&metadata, context)?;
                if branch {
                    self.execute_branch(run, &next, scope.clone()).await
                } else {
                    Ok(Variables::new())
                }
            }
            StepKind::WhileCondition(condition) => {
                let mut loop_scope = scope.clone();
                let mut collected = Variables::new();
                loop {
                    let context = StepContext {
                        playbook: run.playbook,
                        step,
                        variables: &loop_scope,
                    };
                    let (next, branch) = self.conditions.execute(&metadata, context)?;
                    // A false condition ends the loop; on_false is not entered.
                    if !branch || next != condition.on_true {
                        break;
                    }

                    let produced = self.execute_branch(run, &next, loop_scope.clone()).await?;
                    loop_scope.merge_replace(&produced);
                    collected.merge_replace(&produced);
                }
                Ok(collected)
            }
            StepKind::Parallel(_) | StepKind::SwitchCondition(_) => {
                warn!(
                    step_id = %step.id,
                    step_type = step.step_type(),
                    "Step type is not executed, continuing with completion step"
                );
                Ok(Variables::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::{ComparisonEvaluator, ConditionEvaluator};
    use crate::executors::{
        ActionExecutor, Capability, CapabilityContext, CapabilityRegistry, ConditionExecutor,
    };
    use crate::playbook::{parse_playbook, Variable};
    use crate::reporter::{ExecutionCache, Reporter, Status};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Mutex;

    /// Records which action steps ran and returns fixed outputs.
    #[derive(Default)]
    struct StubActions {
        ran: Mutex<Vec<String>>,
        outputs: Variables,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl ActionStepExecutor for StubActions {
        async fn execute(
            &self,
            metadata: &ExecutionMetadata,
            context: StepContext<'_>,
        ) -> Result<Variables> {
            self.ran.lock().unwrap().push(metadata.step_id.clone());
            if self.fail_on.as_deref() == Some(metadata.step_id.as_str()) {
                return Err(Error::Capability("boom".into()));
            }
            let mut outputs = self.outputs.clone();
            // Echo the step scope so tests can observe scoping.
            if let Some(v) = context.variables.find("__echo__") {
                outputs.insert_or_replace(Variable::new("__seen__", &v.value));
            }
            Ok(outputs)
        }
    }

    struct NoPlaybooks;

    #[async_trait]
    impl PlaybookStepExecutor for NoPlaybooks {
        async fn execute(
            &self,
            _metadata: &ExecutionMetadata,
            _context: StepContext<'_>,
        ) -> Result<Variables> {
            Err(Error::Playbook("no repository".into()))
        }
    }

    /// Fixed time; records requested sleeps instead of waiting.
    #[derive(Default)]
    struct MockClock {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Clock for MockClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    struct FixedId(Uuid);

    impl IdGenerator for FixedId {
        fn new_id(&self) -> Uuid {
            self.0
        }
    }

    struct Harness {
        decomposer: Decomposer,
        cache: Arc<ExecutionCache>,
    }

    fn harness(actions: Arc<dyn ActionStepExecutor>) -> Harness {
        harness_with_clock(actions, Arc::new(MockClock::default()))
    }

    fn harness_with_clock(actions: Arc<dyn ActionStepExecutor>, clock: Arc<dyn Clock>) -> Harness {
        let cache = Arc::new(ExecutionCache::default());
        let reporter = Arc::new(Reporter::with_cache(cache.clone()));
        assemble(cache, reporter, actions, clock)
    }

    fn assemble(
        cache: Arc<ExecutionCache>,
        reporter: Arc<Reporter>,
        actions: Arc<dyn ActionStepExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Harness {
        let evaluator: Arc<dyn ConditionEvaluator> = Arc::new(ComparisonEvaluator);
        let conditions = ConditionExecutor::new(evaluator, reporter.clone()).with_clock(clock.clone());

        let decomposer = Decomposer::new(
            actions,
            Arc::new(conditions),
            Arc::new(NoPlaybooks),
            reporter,
        )
        .with_clock(clock);

        Harness { decomposer, cache }
    }

    const LINEAR: &str = r#"
id: playbook--linear
workflow_start: start
workflow:
  start:
    type: start
    on_completion: action
  action:
    type: action
    on_completion: end
  end:
    type: end
"#;

    #[tokio::test]
    async fn test_linear_playbook() {
        let actions = Arc::new(StubActions {
            outputs: [Variable::new("result", "value")].into_iter().collect(),
            ..Default::default()
        });
        let h = harness(actions.clone());
        let playbook = parse_playbook(LINEAR).unwrap();

        let details = h.decomposer.execute(&playbook).await.unwrap();

        assert_eq!(details.playbook_id, "playbook--linear");
        assert_eq!(details.variables.value("result"), Some("value"));
        assert_eq!(*actions.ran.lock().unwrap(), vec!["action"]);

        let report = h.cache.get_execution_report(details.execution_id).unwrap();
        assert_eq!(report.status, Status::SuccessfullyExecuted);
        assert!(report.ended.is_some());
    }

    #[tokio::test]
    async fn test_fixed_execution_id() {
        let id = Uuid::new_v4();
        let h = harness(Arc::new(StubActions::default()));
        let decomposer = h.decomposer.with_id_generator(Arc::new(FixedId(id)));

        let details = decomposer
            .execute(&parse_playbook(LINEAR).unwrap())
            .await
            .unwrap();
        assert_eq!(details.execution_id, id);
    }

    #[tokio::test]
    async fn test_execute_async_publishes_id_first() {
        let h = harness(Arc::new(StubActions::default()));
        let playbook = parse_playbook(LINEAR).unwrap();
        let (tx, rx) = oneshot::channel();

        let details = h.decomposer.execute_async(&playbook, tx).await.unwrap();
        let published = rx.await.unwrap();

        assert_eq!(published.execution_id, details.execution_id);
        assert_eq!(published.playbook_id, "playbook--linear");
    }

    #[tokio::test]
    async fn test_on_success_fallback() {
        let yaml = r#"
id: p
workflow_start: start
workflow:
  start:
    type: start
    on_success: a
  a:
    type: action
    on_failure: b
  b:
    type: action
    on_completion: end
  end:
    type: end
"#;
        let actions = Arc::new(StubActions::default());
        let h = harness(actions.clone());
        h.decomposer
            .execute(&parse_playbook(yaml).unwrap())
            .await
            .unwrap();

        assert_eq!(*actions.ran.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_step_not_found() {
        let mut playbook = parse_playbook(LINEAR).unwrap();
        playbook.workflow_start = "ghost".into();

        let h = harness(Arc::new(StubActions::default()));
        let (_, err) = h
            .decomposer
            .execute(&playbook)
            .await
            .unwrap_err()
            .into_execution_parts();
        assert_eq!(err.to_string(), "step with id ghost not found");
    }

    #[tokio::test]
    async fn test_empty_completion() {
        let mut playbook = parse_playbook(LINEAR).unwrap();
        playbook.workflow.get_mut("action").unwrap().on_completion.clear();

        let h = harness(Arc::new(StubActions::default()));
        let (_, err) = h
            .decomposer
            .execute(&playbook)
            .await
            .unwrap_err()
            .into_execution_parts();
        assert!(matches!(err, Error::EmptyCompletion(ref id) if id == "action"));
    }

    #[tokio::test]
    async fn test_completion_to_missing_step_is_empty_completion() {
        let mut playbook = parse_playbook(LINEAR).unwrap();
        playbook.workflow.get_mut("action").unwrap().on_completion = "ghost".into();

        let actions = Arc::new(StubActions::default());
        let h = harness(actions.clone());
        let (_, err) = h
            .decomposer
            .execute(&playbook)
            .await
            .unwrap_err()
            .into_execution_parts();

        assert!(matches!(err, Error::EmptyCompletion(ref id) if id == "action"));
        assert_eq!(err.code(), "EMPTY_COMPLETION_STEP");
        assert_eq!(err.to_string(), "empty completion step for step action");
        // The step is not run when it has nowhere to go.
        assert!(actions.ran.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_wraps_step_and_reports() {
        let actions = Arc::new(StubActions {
            fail_on: Some("action".into()),
            ..Default::default()
        });
        let id = Uuid::new_v4();
        let h = harness(actions);
        let decomposer = h.decomposer.with_id_generator(Arc::new(FixedId(id)));

        let err = decomposer
            .execute(&parse_playbook(LINEAR).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "STEP_FAILED");

        let (details, err) = err.into_execution_parts();
        let details = details.unwrap();
        assert_eq!(details.execution_id, id);
        assert_eq!(details.playbook_id, "playbook--linear");
        assert_eq!(
            err.to_string(),
            "playbook execution failed at step [ action ]: Capability error: boom"
        );

        // The failed run is found in the cache by the returned id.
        let report = h
            .cache
            .get_execution_report(details.execution_id)
            .unwrap();
        assert_eq!(report.status, Status::Failed);
        assert_eq!(h.cache.len(), 1);
    }

    #[tokio::test]
    async fn test_if_condition_runs_only_true_branch() {
        let yaml = r#"
id: playbook--if
workflow_start: start
playbook_variables:
  x:
    value: "yes"
workflow:
  start:
    type: start
    on_completion: if
  if:
    type: if-condition
    condition: "x:value = 'yes'"
    on_true: stepA
    on_false: stepB
    on_completion: end
  stepA:
    type: action
    on_completion: branch-end
  stepB:
    type: action
    on_completion: branch-end
  branch-end:
    type: end
  end:
    type: end
"#;
        let actions = Arc::new(StubActions {
            outputs: [Variable::new("__branch__", "taken")].into_iter().collect(),
            ..Default::default()
        });
        let h = harness(actions.clone());

        let details = h
            .decomposer
            .execute(&parse_playbook(yaml).unwrap())
            .await
            .unwrap();

        assert_eq!(*actions.ran.lock().unwrap(), vec!["stepA"]);
        assert_eq!(details.variables.value("__branch__"), Some("taken"));

        let report = h.cache.get_execution_report(details.execution_id).unwrap();
        assert!(report.step("stepB").is_none());
        assert_eq!(
            report.step("if").unwrap().status,
            Status::SuccessfullyExecuted
        );
    }

    #[tokio::test]
    async fn test_if_condition_false_falls_through() {
        let yaml = r#"
id: p
workflow_start: start
playbook_variables:
  __x__:
    value: "no"
workflow:
  start:
    type: start
    on_completion: if
  if:
    type: if-condition
    condition: "__x__:value = 'yes'"
    on_true: inner
    on_completion: after
  inner:
    type: action
    on_completion: inner-end
  inner-end:
    type: end
  after:
    type: action
    on_completion: end
  end:
    type: end
"#;
        let actions = Arc::new(StubActions::default());
        let h = harness(actions.clone());
        h.decomposer
            .execute(&parse_playbook(yaml).unwrap())
            .await
            .unwrap();

        assert_eq!(*actions.ran.lock().unwrap(), vec!["after"]);
    }

    #[tokio::test]
    async fn test_branch_failure_trail() {
        let yaml = r#"
id: p
workflow_start: start
workflow:
  start:
    type: start
    on_completion: if
  if:
    type: if-condition
    condition: "true"
    on_true: inner
    on_completion: end
  inner:
    type: action
    on_completion: inner-end
  inner-end:
    type: end
  end:
    type: end
"#;
        let actions = Arc::new(StubActions {
            fail_on: Some("inner".into()),
            ..Default::default()
        });
        let h = harness(actions);
        let err = h
            .decomposer
            .execute(&parse_playbook(yaml).unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.step_trail(), vec!["if", "inner"]);
    }

    /// Capability that increments `__n__`.
    struct Increment;

    #[async_trait]
    impl Capability for Increment {
        fn capability_type(&self) -> &str {
            "counter"
        }

        async fn execute(
            &self,
            _metadata: &ExecutionMetadata,
            context: CapabilityContext,
        ) -> Result<Variables> {
            let n: i64 = context
                .variables
                .value("__n__")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            Ok([Variable::new("__n__", &(n + 1).to_string())]
                .into_iter()
                .collect())
        }
    }

    const WHILE: &str = r#"
id: playbook--while
workflow_start: start
playbook_variables:
  __n__:
    type: integer
    value: "0"
agent_definitions:
  agent--counter:
    type: soarca
    name: counter
workflow:
  start:
    type: start
    on_completion: while
  while:
    type: while-condition
    condition: "__n__:value < 3"
    on_true: body
    on_false: exit
    on_completion: end
  body:
    type: action
    agent: agent--counter
    commands:
      - type: manual
        command: increment
    on_completion: body-end
  body-end:
    type: end
  exit:
    type: action
    agent: agent--counter
    commands:
      - type: manual
        command: increment
    on_completion: exit-end
  exit-end:
    type: end
  end:
    type: end
"#;

    fn counting_harness() -> Harness {
        let cache = Arc::new(ExecutionCache::default());
        let reporter = Arc::new(Reporter::with_cache(cache.clone()));
        let clock: Arc<dyn Clock> = Arc::new(MockClock::default());
        let capabilities = CapabilityRegistry::new().with(Arc::new(Increment));
        let actions = ActionExecutor::new(Arc::new(capabilities), reporter.clone())
            .with_clock(clock.clone());
        assemble(cache, reporter, Arc::new(actions), clock)
    }

    #[tokio::test]
    async fn test_while_loop() {
        let h = counting_harness();
        let details = h
            .decomposer
            .execute(&parse_playbook(WHILE).unwrap())
            .await
            .unwrap();

        assert_eq!(details.variables.value("__n__"), Some("3"));

        let report = h.cache.get_execution_report(details.execution_id).unwrap();
        assert_eq!(report.status, Status::SuccessfullyExecuted);
        // The body restarts on every pass; the ledger keeps the last one.
        assert_eq!(
            report.step("body").unwrap().status,
            Status::SuccessfullyExecuted
        );
        assert_eq!(
            report.step("while").unwrap().status,
            Status::SuccessfullyExecuted
        );
    }

    #[tokio::test]
    async fn test_while_false_does_not_enter_on_false() {
        let mut playbook = parse_playbook(WHILE).unwrap();
        playbook
            .playbook_variables
            .insert_or_replace(Variable::new("__n__", "5"));

        let h = counting_harness();
        let details = h.decomposer.execute(&playbook).await.unwrap();

        assert_eq!(details.variables.value("__n__"), Some("5"));
        let report = h.cache.get_execution_report(details.execution_id).unwrap();
        assert!(report.step("exit").is_none());
        assert!(report.step("body").is_none());
    }

    #[tokio::test]
    async fn test_step_variables_scoped_to_step() {
        let yaml = r#"
id: p
workflow_start: start
playbook_variables:
  __echo__:
    value: global
workflow:
  start:
    type: start
    on_completion: a
  a:
    type: action
    step_variables:
      __echo__:
        value: local
    on_completion: b
  b:
    type: action
    on_completion: end
  end:
    type: end
"#;
        let actions = Arc::new(StubActions::default());
        let h = harness(actions);
        let details = h
            .decomposer
            .execute(&parse_playbook(yaml).unwrap())
            .await
            .unwrap();

        // Step b saw the playbook value again, overriding a's output.
        assert_eq!(details.variables.value("__seen__"), Some("global"));
        assert_eq!(details.variables.value("__echo__"), Some("global"));
    }

    #[tokio::test]
    async fn test_outputs_flow_to_later_steps() {
        let yaml = r#"
id: p
workflow_start: start
workflow:
  start:
    type: start
    on_completion: a
  a:
    type: action
    on_completion: b
  b:
    type: action
    on_completion: end
  end:
    type: end
"#;
        let actions = Arc::new(StubActions {
            outputs: [Variable::new("__echo__", "from-a")].into_iter().collect(),
            ..Default::default()
        });
        let h = harness(actions);
        let details = h
            .decomposer
            .execute(&parse_playbook(yaml).unwrap())
            .await
            .unwrap();

        assert_eq!(details.variables.value("__seen__"), Some("from-a"));
    }

    #[tokio::test]
    async fn test_delay_uses_clock() {
        let mut playbook = parse_playbook(LINEAR).unwrap();
        playbook.workflow.get_mut("action").unwrap().delay = 250;
        playbook.workflow.get_mut("start").unwrap().delay = -5;

        let clock = Arc::new(MockClock::default());
        let h = harness_with_clock(Arc::new(StubActions::default()), clock.clone());
        h.decomposer.execute(&playbook).await.unwrap();

        assert_eq!(
            *clock.slept.lock().unwrap(),
            vec![Duration::from_millis(250)]
        );
    }

    #[tokio::test]
    async fn test_reserved_step_types_are_skipped() {
        let yaml = r#"
id: p
workflow_start: start
workflow:
  start:
    type: start
    on_completion: parallel
  parallel:
    type: parallel
    next_steps: [a]
    on_completion: a
  a:
    type: action
    on_completion: end
  end:
    type: end
"#;
        let actions = Arc::new(StubActions::default());
        let h = harness(actions.clone());
        h.decomposer
            .execute(&parse_playbook(yaml).unwrap())
            .await
            .unwrap();

        assert_eq!(*actions.ran.lock().unwrap(), vec!["a"]);
    }
}
