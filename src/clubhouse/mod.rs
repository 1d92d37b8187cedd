//! Clubhouse REST API access and wire types.

pub mod client;
pub mod errors;
pub mod types;

pub use client::{
    decode, fetch_epic, fetch_epic_workflow, fetch_epics, set_epic_state, ClubhouseClient,
    ResourceClient, ResourceKey,
};
pub use errors::ClubhouseError;
pub use types::{
    Action, ActionKind, Change, EntityType, Epic, EpicId, EpicState, EpicStats, EpicWorkflow,
    Event, Reference, StateId,
};
