//! Error types for the playbook engine.
//!
//! Every variant carries a stable code so callers (CLI output, API adapters)
//! can branch on the failure class without parsing messages.

use thiserror::Error;

use crate::engine::ExecutionDetails;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error types.
#[derive(Error, Debug)]
pub enum Error {
    /// The playbook failed static validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A step id could not be resolved while walking a branch.
    #[error("step with id {0} not found")]
    StepNotFound(String),

    /// None of on_completion, on_success or on_failure resolves to a step.
    #[error("empty completion step for step {0}")]
    EmptyCompletion(String),

    /// No capability is registered under the agent's name.
    #[error("capability: {0} is not available")]
    CapabilityUnavailable(String),

    /// A capability backend reported a failure.
    #[error("Capability error: {0}")]
    Capability(String),

    /// The condition evaluator rejected or failed on an expression.
    #[error("Condition error: {0}")]
    Condition(String),

    /// A step executor was handed a step of the wrong kind.
    #[error("Executor error: {0}")]
    Executor(String),

    /// Playbook repository failures (not found, duplicates).
    #[error("Playbook error: {0}")]
    Playbook(String),

    /// A step failed; wraps the underlying cause with the step id.
    #[error("playbook execution failed at step [ {step_id} ]: {source}")]
    StepFailed {
        step_id: String,
        #[source]
        source: Box<Error>,
    },

    /// A playbook run ended in an error; carries the run's details so the
    /// caller can find it in the execution cache.
    #[error(
        "execution {} of playbook '{}' failed: {source}",
        .details.execution_id,
        .details.playbook_id
    )]
    ExecutionFailed {
        details: Box<ExecutionDetails>,
        #[source]
        source: Box<Error>,
    },

    /// A playbook-action step's sub-run failed.
    #[error("execution of playbook '{playbook_id}' failed: {source}")]
    SubPlaybook {
        playbook_id: String,
        #[source]
        source: Box<Error>,
    },

    /// The reporting contract was violated (double start, end without start...).
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an error with the id of the step it happened in.
    pub fn at_step(step_id: &str, source: Error) -> Self {
        Error::StepFailed {
            step_id: step_id.to_string(),
            source: Box::new(source),
        }
    }

    /// Get the error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::StepNotFound(_) => "STEP_NOT_FOUND",
            Error::EmptyCompletion(_) => "EMPTY_COMPLETION_STEP",
            Error::CapabilityUnavailable(_) => "CAPABILITY_UNAVAILABLE",
            Error::Capability(_) => "CAPABILITY_ERROR",
            Error::Condition(_) => "CONDITION_ERROR",
            Error::Executor(_) => "EXECUTOR_ERROR",
            Error::Playbook(_) => "PLAYBOOK_ERROR",
            Error::StepFailed { .. } => "STEP_FAILED",
            Error::ExecutionFailed { source, .. } => source.code(),
            Error::SubPlaybook { .. } => "SUB_PLAYBOOK_FAILED",
            Error::Cache(_) => "CACHE_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Parse(_) => "PARSE_ERROR",
            Error::Yaml(_) => "YAML_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }

    /// Split a failed run into its details and the error that ended it.
    ///
    /// Errors raised before a run started have no details.
    pub fn into_execution_parts(self) -> (Option<ExecutionDetails>, Error) {
        match self {
            Error::ExecutionFailed { details, source } => (Some(*details), *source),
            other => (None, other),
        }
    }

    /// Details of the failed run, if this error ended one.
    pub fn execution_details(&self) -> Option<&ExecutionDetails> {
        match self {
            Error::ExecutionFailed { details, .. } => Some(details.as_ref()),
            _ => None,
        }
    }

    fn nested(&self) -> Option<&Error> {
        match self {
            Error::StepFailed { source, .. }
            | Error::ExecutionFailed { source, .. }
            | Error::SubPlaybook { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }

    /// Innermost error of a step, run or sub-playbook chain.
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Some(inner) = current.nested() {
            current = inner;
        }
        current
    }

    /// Ids of the steps a failure travelled through, outermost first.
    ///
    /// Sub-playbook failures continue the trail into the called playbook.
    pub fn step_trail(&self) -> Vec<&str> {
        let mut trail = Vec::new();
        let mut current = Some(self);
        while let Some(err) = current {
            if let Error::StepFailed { step_id, .. } = err {
                trail.push(step_id.as_str());
            }
            current = err.nested();
        }
        trail
    }

    /// Convert to a structured JSON response.
    pub fn to_json(&self) -> serde_json::Value {
        let mut json = serde_json::json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "steps": self.step_trail(),
            }
        });
        if let Some(details) = self.execution_details() {
            json["execution_id"] = serde_json::json!(details.execution_id);
            json["playbook_id"] = serde_json::json!(details.playbook_id);
        }
        json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(Error::StepNotFound("x".into()).code(), "STEP_NOT_FOUND");
        assert_eq!(
            Error::CapabilityUnavailable("ssh".into()).code(),
            "CAPABILITY_UNAVAILABLE"
        );
        assert_eq!(Error::Cache("x".into()).code(), "CACHE_ERROR");
    }

    #[test]
    fn test_step_failed_chain() {
        let inner = Error::Capability("connection refused".into());
        let err = Error::at_step("if--1", Error::at_step("action--2", inner));

        assert_eq!(err.code(), "STEP_FAILED");
        assert_eq!(err.step_trail(), vec!["if--1", "action--2"]);
        assert_eq!(err.root_cause().code(), "CAPABILITY_ERROR");
        assert!(err.to_string().contains("if--1"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_to_json() {
        let err = Error::at_step("action--1", Error::Condition("bad".into()));
        let json = err.to_json();

        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "STEP_FAILED");
        assert_eq!(json["error"]["steps"][0], "action--1");
        assert!(json.get("execution_id").is_none());
    }

    fn failed_run(source: Error) -> Error {
        Error::ExecutionFailed {
            details: Box::new(ExecutionDetails {
                execution_id: uuid::Uuid::nil(),
                playbook_id: "playbook--1".into(),
                variables: Default::default(),
            }),
            source: Box::new(source),
        }
    }

    #[test]
    fn test_failed_run_carries_details() {
        let err = failed_run(Error::at_step("action--1", Error::Capability("down".into())));

        assert_eq!(err.code(), "STEP_FAILED");
        assert_eq!(err.step_trail(), vec!["action--1"]);
        assert_eq!(
            err.execution_details().unwrap().playbook_id,
            "playbook--1"
        );

        let json = err.to_json();
        assert_eq!(json["execution_id"], uuid::Uuid::nil().to_string());

        let (details, source) = err.into_execution_parts();
        assert!(details.is_some());
        assert!(matches!(source, Error::StepFailed { .. }));
    }

    #[test]
    fn test_sub_playbook_trail_continues_into_callee() {
        let inner = failed_run(Error::at_step("ping", Error::Capability("down".into())));
        let err = Error::at_step(
            "call",
            Error::SubPlaybook {
                playbook_id: "playbook--1".into(),
                source: Box::new(inner),
            },
        );

        assert_eq!(err.step_trail(), vec!["call", "ping"]);
        assert_eq!(err.root_cause().code(), "CAPABILITY_ERROR");
        assert!(err
            .to_string()
            .contains("execution of playbook 'playbook--1' failed"));
    }
}
