//! Webhook entry point: parse the event, decide, reconcile, acknowledge.

use thiserror::Error;
use tracing::{debug, info, Instrument};

use crate::clubhouse::{fetch_epic_workflow, fetch_epics, ClubhouseError, Event, ResourceClient};
use crate::side_effects::{
    classify, find_actionable, reconcile, EpicStateIds, EpicTransition, MissingEpicState,
    SideEffect,
};
use crate::telemetry::{create_invocation_span, generate_correlation_id};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("malformed event body")]
    MalformedEvent(#[source] serde_json::Error),
    #[error("transport failure")]
    Transport(#[source] ClubhouseError),
    #[error("unreadable Clubhouse response")]
    Parse(#[source] ClubhouseError),
    #[error("epic workflow misconfigured: no state named '{state_name}'")]
    Configuration { state_name: String },
}

impl From<ClubhouseError> for HandlerError {
    fn from(err: ClubhouseError) -> Self {
        if err.is_transport() {
            HandlerError::Transport(err)
        } else {
            HandlerError::Parse(err)
        }
    }
}

impl From<MissingEpicState> for HandlerError {
    fn from(err: MissingEpicState) -> Self {
        HandlerError::Configuration {
            state_name: err.state_name,
        }
    }
}

/// What one invocation did, beyond acknowledging the event.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationReport {
    pub event: Event,
    pub side_effect_fired: bool,
    pub transitions: Vec<EpicTransition>,
}

pub fn parse_event(raw_body: &str) -> Result<Event, HandlerError> {
    serde_json::from_str(raw_body).map_err(HandlerError::MalformedEvent)
}

/// Handle one webhook delivery and return the parsed event as acknowledgment.
pub async fn handle_event<C>(client: &C, raw_body: &str) -> Result<Event, HandlerError>
where
    C: ResourceClient + ?Sized,
{
    Ok(handle_event_with_report(client, raw_body).await?.event)
}

pub async fn handle_event_with_report<C>(
    client: &C,
    raw_body: &str,
) -> Result<InvocationReport, HandlerError>
where
    C: ResourceClient + ?Sized,
{
    let event = parse_event(raw_body)?;
    let span = create_invocation_span(
        event.id.as_deref().unwrap_or_default(),
        &generate_correlation_id(),
    );

    run_side_effects(client, event).instrument(span).await
}

async fn run_side_effects<C>(client: &C, event: Event) -> Result<InvocationReport, HandlerError>
where
    C: ResourceClient + ?Sized,
{
    let workflow = fetch_epic_workflow(client).await?;
    let epics = fetch_epics(client).await?;
    let state_ids = EpicStateIds::resolve(&workflow)?;

    let side_effect = SideEffect::UpdateEpicWhenStoryProgresses;
    let Some(action) = find_actionable(&event.actions, side_effect) else {
        debug!(actions = event.actions.len(), "No actionable side effect");
        return Ok(InvocationReport {
            event,
            side_effect_fired: false,
            transitions: Vec::new(),
        });
    };
    info!(side_effect = %side_effect, action.id = action.id, "Side effect triggered");

    let classification = classify(&epics);
    debug!(
        epics = epics.len(),
        in_progress = ?classification.in_progress,
        to_do = ?classification.to_do,
        "Classified epics"
    );

    let transitions = reconcile(client, &classification, &state_ids).await?;
    info!(transitions = transitions.len(), "Reconciliation finished");

    Ok(InvocationReport {
        event,
        side_effect_fired: true,
        transitions,
    })
}
