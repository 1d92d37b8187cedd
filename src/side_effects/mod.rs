//! Side-effect rules and the epic reconciliation policy.
//!
//! `filter` decides whether an event is actionable, `locator` picks the epics
//! to look at, and `reconciler` brings their remote state in line.

pub mod filter;
pub mod locator;
pub mod reconciler;

pub use filter::{find_actionable, SideEffect, UnknownSideEffect};
pub use locator::{classify, EpicClassification};
pub use reconciler::{reconcile, EpicRole, EpicStateIds, EpicTransition, MissingEpicState};
