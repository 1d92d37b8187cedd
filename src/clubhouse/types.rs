use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

pub type EpicId = i64;
pub type StateId = i64;

/// One webhook notification as delivered by Clubhouse.
///
/// The typed fields are a read-only view; serializing an `Event` writes back
/// the exact payload it was parsed from, including fields this crate does not
/// model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Event {
    pub id: Option<String>,
    /// Kept as sent; see [`Event::changed_at_utc`].
    pub changed_at: Option<String>,
    pub primary_id: Option<i64>,
    pub version: Option<String>,
    pub member_id: Option<String>,
    pub actions: Vec<Action>,
    pub references: Vec<Reference>,
    payload: Map<String, Value>,
}

#[derive(Deserialize)]
struct EventFields {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    changed_at: Option<String>,
    #[serde(default)]
    primary_id: Option<i64>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    member_id: Option<String>,
    actions: Vec<Action>,
    #[serde(default)]
    references: Option<Vec<Reference>>,
}

impl TryFrom<Map<String, Value>> for Event {
    type Error = serde_json::Error;

    fn try_from(payload: Map<String, Value>) -> Result<Self, Self::Error> {
        let fields: EventFields = serde_json::from_value(Value::Object(payload.clone()))?;
        Ok(Self {
            id: fields.id,
            changed_at: fields.changed_at,
            primary_id: fields.primary_id,
            version: fields.version,
            member_id: fields.member_id,
            actions: fields.actions,
            references: fields.references.unwrap_or_default(),
            payload,
        })
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.payload.serialize(serializer)
    }
}

impl Event {
    /// `changed_at` as a UTC timestamp, when it is valid RFC 3339.
    pub fn changed_at_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.changed_at.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }

    /// The payload exactly as received.
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }
}

/// A single entity change inside an [`Event`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: i64,
    pub entity_type: EntityType,
    pub action: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_url: Option<String>,
    /// Only meaningful for [`ActionKind::Update`].
    #[serde(default)]
    pub changes: BTreeMap<String, Change>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Action {
    pub fn change(&self, field: &str) -> Option<&Change> {
        self.changes.get(field)
    }
}

/// One field's change. Array fields report `adds`/`removes` instead of
/// `old`/`new`; those land in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Change {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Keeps an explicit `null` as `Some(Value::Null)`; only an absent key is `None`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Change {
    /// A change carrying neither an old nor a new value (or only nulls).
    pub fn is_empty(&self) -> bool {
        let blank = |v: &Option<Value>| v.as_ref().map_or(true, Value::is_null);
        blank(&self.old) && blank(&self.new)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub id: i64,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Entity kinds Clubhouse reports in webhook actions. Unknown kinds keep
/// their original text so the event serializes back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityType {
    Story,
    Epic,
    Milestone,
    Project,
    WorkflowState,
    Other(String),
}

impl From<String> for EntityType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "story" => EntityType::Story,
            "epic" => EntityType::Epic,
            "milestone" => EntityType::Milestone,
            "project" => EntityType::Project,
            "workflow-state" => EntityType::WorkflowState,
            _ => EntityType::Other(value),
        }
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EntityType::Story => "story",
            EntityType::Epic => "epic",
            EntityType::Milestone => "milestone",
            EntityType::Project => "project",
            EntityType::WorkflowState => "workflow-state",
            EntityType::Other(other) => other,
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    Update,
    Create,
    Delete,
    Other(String),
}

impl From<String> for ActionKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "update" => ActionKind::Update,
            "create" => ActionKind::Create,
            "delete" => ActionKind::Delete,
            _ => ActionKind::Other(value),
        }
    }
}

impl From<ActionKind> for String {
    fn from(value: ActionKind) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ActionKind::Update => "update",
            ActionKind::Create => "create",
            ActionKind::Delete => "delete",
            ActionKind::Other(other) => other,
        };
        f.write_str(text)
    }
}

/// The ordered set of states an epic can occupy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicWorkflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_epic_state_id: Option<StateId>,
    pub epic_states: Vec<EpicState>,
}

impl EpicWorkflow {
    /// First state whose name matches exactly.
    pub fn state_named(&self, name: &str) -> Option<&EpicState> {
        self.epic_states.iter().find(|state| state.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicState {
    pub id: StateId,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epic {
    pub id: EpicId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub epic_state_id: StateId,
    #[serde(default)]
    pub stats: EpicStats,
}

/// Aggregate story counts Clubhouse maintains per epic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpicStats {
    #[serde(default)]
    pub num_stories_started: u64,
    #[serde(default)]
    pub num_stories_done: u64,
}

impl EpicStats {
    pub fn has_progress(&self) -> bool {
        self.num_stories_started > 0 || self.num_stories_done > 0
    }

    pub fn is_untouched(&self) -> bool {
        self.num_stories_started == 0 && self.num_stories_done == 0
    }
}
