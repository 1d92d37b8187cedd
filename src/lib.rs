// epic-sync library - Clubhouse webhook that keeps epic states in step with their stories
// This exposes the core components for the binary and for integration tests

pub mod clubhouse;
pub mod config;
pub mod handler;
pub mod server;
pub mod shutdown;
pub mod side_effects;
pub mod telemetry;

// Re-export key types for easy access
pub use clubhouse::{ClubhouseClient, ClubhouseError, Event, ResourceClient, ResourceKey};
pub use config::EpicSyncConfig;
pub use handler::{handle_event, handle_event_with_report, parse_event, HandlerError, InvocationReport};
pub use side_effects::{EpicClassification, EpicStateIds, EpicTransition, SideEffect};
pub use telemetry::{create_invocation_span, generate_correlation_id, init_telemetry};
