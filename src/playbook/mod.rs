//! Playbook definition, parsing, variables and validation.
//!
//! A playbook is a graph of typed steps keyed by id:
//! - Start/End: entry point and branch terminators
//! - Action: commands dispatched to a capability for each target
//! - If/While conditions: branch on a boolean expression
//! - Playbook action: run another playbook as a sub-workflow

mod parser;
mod types;
mod validator;
pub mod variables;

pub use parser::{parse_playbook, parse_playbook_file};
pub use types::*;
pub use validator::validate_playbook;
pub use variables::{Variable, Variables, VALUE_SUFFIX};
