use thiserror::Error;

/// Failures talking to the Clubhouse REST API.
#[derive(Debug, Error)]
pub enum ClubhouseError {
    #[error("request for '{resource}' failed")]
    Transport {
        resource: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Clubhouse returned HTTP {status} for '{resource}': {body}")]
    UnexpectedStatus {
        resource: String,
        status: u16,
        body: String,
    },
    #[error("malformed response for '{resource}'")]
    Parse {
        resource: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ClubhouseError {
    pub fn resource(&self) -> &str {
        match self {
            ClubhouseError::Transport { resource, .. }
            | ClubhouseError::UnexpectedStatus { resource, .. }
            | ClubhouseError::Parse { resource, .. } => resource,
        }
    }

    /// Whether the failure happened below the response body (network or HTTP status).
    pub fn is_transport(&self) -> bool {
        !matches!(self, ClubhouseError::Parse { .. })
    }
}
