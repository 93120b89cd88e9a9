//! Debug capability - echo commands instead of running them.

use async_trait::async_trait;
use tracing::info;

use super::capability::{Capability, CapabilityContext};
use super::ExecutionMetadata;
use crate::error::Result;
use crate::playbook::{Variable, Variables};

/// Output variable holding the echoed command.
pub const DEBUG_OUTPUT: &str = "__debug_output__";

/// Capability that logs the interpolated command and returns it as
/// [`DEBUG_OUTPUT`]. Useful for dry runs: register it under an agent's name
/// to see what would be sent.
pub struct DebugCapability {
    name: String,
}

impl DebugCapability {
    pub fn new() -> Self {
        Self::named("debug")
    }

    /// A debug capability registered under the given agent name.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Default for DebugCapability {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for DebugCapability {
    fn capability_type(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Log commands and echo them back as output"
    }

    async fn execute(
        &self,
        metadata: &ExecutionMetadata,
        context: CapabilityContext,
    ) -> Result<Variables> {
        let target = if context.target.name.is_empty() {
            context.target.id.as_str()
        } else {
            context.target.name.as_str()
        };

        info!(
            execution_id = %metadata.execution_id,
            step_id = %metadata.step_id,
            capability = %self.name,
            command_type = %context.command.command_type,
            target_name = %target,
            "Debug: {}",
            context.command.command
        );

        let mut outputs = Variables::new();
        outputs.insert(Variable::new(DEBUG_OUTPUT, &context.command.command));
        Ok(outputs)
    }
}
