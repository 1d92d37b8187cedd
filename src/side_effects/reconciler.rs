use thiserror::Error;
use tracing::{debug, info};

use super::locator::EpicClassification;
use crate::clubhouse::{
    fetch_epic, set_epic_state, ClubhouseError, EpicId, EpicWorkflow, ResourceClient, StateId,
};

pub const TO_DO_STATE_NAME: &str = "to do";
pub const IN_PROGRESS_STATE_NAME: &str = "in progress";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("epic workflow has no state named '{state_name}'")]
pub struct MissingEpicState {
    pub state_name: String,
}

/// Workflow state ids the reconciliation policy moves epics between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpicStateIds {
    pub to_do: StateId,
    pub in_progress: StateId,
}

impl EpicStateIds {
    pub fn resolve(workflow: &EpicWorkflow) -> Result<Self, MissingEpicState> {
        let lookup = |name: &str| {
            workflow
                .state_named(name)
                .map(|state| state.id)
                .ok_or_else(|| MissingEpicState {
                    state_name: name.to_string(),
                })
        };

        Ok(Self {
            to_do: lookup(TO_DO_STATE_NAME)?,
            in_progress: lookup(IN_PROGRESS_STATE_NAME)?,
        })
    }
}

/// The role the locator assigned to an epic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpicRole {
    InProgress,
    ToDo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpicTransition {
    pub epic_id: EpicId,
    pub from: StateId,
    pub to: StateId,
}

impl EpicTransition {
    /// An in-progress epic still marked "to do" moves forward; a to-do epic
    /// marked "in progress" moves back. Any other current state is left alone.
    pub fn decide(
        epic_id: EpicId,
        role: EpicRole,
        current: StateId,
        ids: &EpicStateIds,
    ) -> Option<Self> {
        let (expected, target) = match role {
            EpicRole::InProgress => (ids.to_do, ids.in_progress),
            EpicRole::ToDo => (ids.in_progress, ids.to_do),
        };

        (current == expected).then_some(Self {
            epic_id,
            from: current,
            to: target,
        })
    }
}

/// Re-reads each classified epic and writes the transitions it needs.
/// Returns the transitions that were applied, in-progress epic first.
pub async fn reconcile<C>(
    client: &C,
    classification: &EpicClassification,
    ids: &EpicStateIds,
) -> Result<Vec<EpicTransition>, ClubhouseError>
where
    C: ResourceClient + ?Sized,
{
    let candidates = [
        classification.in_progress.map(|id| (id, EpicRole::InProgress)),
        classification.to_do.map(|id| (id, EpicRole::ToDo)),
    ];

    let mut applied = Vec::new();
    for (epic_id, role) in candidates.into_iter().flatten() {
        // fresh read; the bulk listing may be stale
        let epic = fetch_epic(client, epic_id).await?;

        match EpicTransition::decide(epic_id, role, epic.epic_state_id, ids) {
            Some(transition) => {
                info!(
                    epic.id = epic_id,
                    from = transition.from,
                    to = transition.to,
                    role = ?role,
                    "Transitioning epic"
                );
                set_epic_state(client, epic_id, transition.to).await?;
                applied.push(transition);
            }
            None => {
                debug!(epic.id = epic_id, state = epic.epic_state_id, role = ?role, "Epic already in sync");
            }
        }
    }

    Ok(applied)
}
