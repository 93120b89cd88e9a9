//! Capability trait and registry.
//!
//! A capability is the backend that actually carries out an action step's
//! command (ssh, http, a manual-step queue, ...). Action steps pick one by
//! the `name` of the agent they reference.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::ExecutionMetadata;
use crate::error::Result;
use crate::playbook::{AgentTarget, AuthenticationInformation, Command, Variables};

/// Everything a capability needs to run one command against one target.
///
/// The command, target addresses and credentials have already been
/// interpolated with the step scope.
#[derive(Debug, Clone)]
pub struct CapabilityContext {
    pub command: Command,
    pub target: AgentTarget,
    pub authentication: AuthenticationInformation,
    pub variables: Variables,
    pub in_args: Vec<String>,
    pub out_args: Vec<String>,
}

/// A command execution backend.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Registry key, matched against the agent's name.
    fn capability_type(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Run the command and return the variables it produced.
    async fn execute(
        &self,
        metadata: &ExecutionMetadata,
        context: CapabilityContext,
    ) -> Result<Variables>;
}

/// Capabilities available to action steps.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability, replacing any with the same type.
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        self.capabilities
            .insert(capability.capability_type().to_string(), capability);
    }

    pub fn with(mut self, capability: Arc<dyn Capability>) -> Self {
        self.register(capability);
        self
    }

    pub fn get(&self, capability_type: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(capability_type).cloned()
    }

    pub fn has(&self, capability_type: &str) -> bool {
        self.capabilities.contains_key(capability_type)
    }

    /// Registered types, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.capabilities.keys().map(|k| k.as_str()).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.list())
            .finish()
    }
}
