//! Static playbook validation.

use std::collections::HashSet;

use super::types::{Playbook, Step, StepKind};
use crate::error::{Error, Result};

/// Validate a playbook before execution.
///
/// Checks that every reference resolves and that every branch reachable
/// from the start step terminates in an `end` step without looping.
pub fn validate_playbook(playbook: &Playbook) -> Result<()> {
    if playbook.workflow_start.is_empty() {
        return Err(Error::Validation("workflow_start is required".into()));
    }
    if !playbook.has_step(&playbook.workflow_start) {
        return Err(Error::Validation(format!(
            "workflow_start '{}' is not a step in the workflow",
            playbook.workflow_start
        )));
    }
    if !playbook.workflow_exception.is_empty() && !playbook.has_step(&playbook.workflow_exception)
    {
        return Err(Error::Validation(format!(
            "workflow_exception '{}' is not a step in the workflow",
            playbook.workflow_exception
        )));
    }

    for id in playbook.step_ids() {
        let step = &playbook.workflow[id];
        for next in step.successors() {
            if !playbook.has_step(next) {
                return Err(Error::Validation(format!(
                    "Step '{}' has a dangling reference to '{}'",
                    id, next
                )));
            }
        }
        validate_definitions(playbook, id, step)?;
    }

    let mut branch = Vec::new();
    check_branch(playbook, &playbook.workflow_start, &mut branch, HashSet::new())
}

fn validate_definitions(playbook: &Playbook, id: &str, step: &Step) -> Result<()> {
    let StepKind::Action(action) = &step.kind else {
        return Ok(());
    };

    if !action.agent.is_empty() && !playbook.agent_definitions.contains_key(&action.agent) {
        return Err(Error::Validation(format!(
            "Step '{}' references unknown agent '{}'",
            id, action.agent
        )));
    }

    if !action.authentication_info.is_empty()
        && !playbook
            .authentication_info_definitions
            .contains_key(&action.authentication_info)
    {
        return Err(Error::Validation(format!(
            "Step '{}' references unknown authentication info '{}'",
            id, action.authentication_info
        )));
    }

    for target_id in &action.targets {
        let target = playbook.target_definitions.get(target_id).ok_or_else(|| {
            Error::Validation(format!(
                "Step '{}' references unknown target '{}'",
                id, target_id
            ))
        })?;

        if !target.authentication_info.is_empty()
            && !playbook
                .authentication_info_definitions
                .contains_key(&target.authentication_info)
        {
            return Err(Error::Validation(format!(
                "Target '{}' references unknown authentication info '{}'",
                target_id, target.authentication_info
            )));
        }
    }

    Ok(())
}

/// Depth-first walk of one branch.
///
/// `visited` holds the ancestors of `step_id` on this branch only; each
/// child gets its own copy so sibling branches may share descendants.
fn check_branch<'a>(
    playbook: &'a Playbook,
    step_id: &'a str,
    branch: &mut Vec<&'a str>,
    mut visited: HashSet<&'a str>,
) -> Result<()> {
    branch.push(step_id);

    if !visited.insert(step_id) {
        return Err(Error::Validation(format!(
            "Loop detected in branch: {}",
            branch.join(" -> ")
        )));
    }

    let step = playbook
        .get_step(step_id)
        .ok_or_else(|| Error::StepNotFound(step_id.to_string()))?;

    let successors = step.successors();
    if successors.is_empty() {
        if !step.is_end() {
            return Err(Error::Validation(format!(
                "Dead branch: step '{}' has no successors and is not an end step ({})",
                step_id,
                branch.join(" -> ")
            )));
        }
        branch.pop();
        return Ok(());
    }

    for next in successors {
        check_branch(playbook, next, branch, visited.clone())?;
    }

    branch.pop();
    Ok(())
}
