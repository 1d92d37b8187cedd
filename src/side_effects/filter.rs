use std::fmt;
use std::str::FromStr;

use crate::clubhouse::{Action, ActionKind, EntityType};

/// Reconciliation rules this service knows how to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SideEffect {
    /// A story moved between workflow states; epics may need to follow.
    UpdateEpicWhenStoryProgresses,
}

impl SideEffect {
    pub const ALL: [SideEffect; 1] = [SideEffect::UpdateEpicWhenStoryProgresses];

    pub fn name(self) -> &'static str {
        match self {
            SideEffect::UpdateEpicWhenStoryProgresses => "updateEpicWhenStoryProgresses",
        }
    }

    /// Whether `action` triggers this side effect.
    pub fn is_actionable(self, action: &Action) -> bool {
        match self {
            SideEffect::UpdateEpicWhenStoryProgresses => story_changed_workflow_state(action),
        }
    }
}

fn story_changed_workflow_state(action: &Action) -> bool {
    action.entity_type == EntityType::Story
        && action.action == ActionKind::Update
        && action
            .change("workflow_state_id")
            .is_some_and(|change| !change.is_empty())
}

impl fmt::Display for SideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown side effect '{0}'")]
pub struct UnknownSideEffect(pub String);

impl FromStr for SideEffect {
    type Err = UnknownSideEffect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SideEffect::ALL
            .into_iter()
            .find(|effect| effect.name() == s)
            .ok_or_else(|| UnknownSideEffect(s.to_string()))
    }
}

/// First action, in event order, that triggers `side_effect`.
pub fn find_actionable(actions: &[Action], side_effect: SideEffect) -> Option<&Action> {
    actions.iter().find(|action| side_effect.is_actionable(action))
}
