use crate::clubhouse::{Epic, EpicId};

/// Which epics should be in progress and which should still be to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpicClassification {
    pub in_progress: Option<EpicId>,
    pub to_do: Option<EpicId>,
}

impl EpicClassification {
    pub fn is_empty(&self) -> bool {
        self.in_progress.is_none() && self.to_do.is_none()
    }
}

/// Single pass over `epics` in listing order. The first epic with any
/// started or done story claims `in_progress`; the first epic with none
/// claims `to_do`. Later candidates are ignored.
pub fn classify(epics: &[Epic]) -> EpicClassification {
    epics
        .iter()
        .fold(EpicClassification::default(), |found, epic| {
            if epic.stats.has_progress() {
                EpicClassification {
                    in_progress: found.in_progress.or(Some(epic.id)),
                    ..found
                }
            } else if epic.stats.is_untouched() {
                EpicClassification {
                    to_do: found.to_do.or(Some(epic.id)),
                    ..found
                }
            } else {
                found
            }
        })
}
