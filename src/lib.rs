//! playbook-engine - execute security playbooks as step graphs
//!
//! A playbook is a graph of steps: start, end, actions that run commands on
//! targets through capabilities, if/while conditions, and calls into other
//! playbooks. The engine walks the graph, carries a variable scope through
//! it, and reports every workflow and step transition to a bounded
//! execution cache.
//!
//! ## Example
//!
//! ```yaml
//! id: playbook--block-ip
//! workflow_start: start
//! playbook_variables:
//!   __ip__:
//!     value: 10.0.0.5
//! agent_definitions:
//!   agent--firewall:
//!     type: soarca
//!     name: debug
//! workflow:
//!   start:
//!     type: start
//!     on_completion: block
//!   block:
//!     type: action
//!     agent: agent--firewall
//!     commands:
//!       - type: manual
//!         command: "block __ip__:value"
//!     on_completion: end
//!   end:
//!     type: end
//! ```

pub mod comparison;
pub mod config;
pub mod engine;
pub mod error;
pub mod executors;
pub mod playbook;
pub mod reporter;
pub mod storage;
pub mod telemetry;

pub use engine::{Engine, ExecutionDetails};
pub use error::{Error, Result};
