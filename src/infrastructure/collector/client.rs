use crate::domain::entities::Submission;
use crate::shared::error::OfflineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire payload accepted by the collection API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorRequest {
    #[serde(rename = "type")]
    pub submission_type: String,
    #[serde(rename = "teamNumber")]
    pub team_number: u32,
    #[serde(rename = "eventKey")]
    pub event_key: String,
    #[serde(rename = "matchKey", skip_serializing_if = "Option::is_none")]
    pub match_key: Option<String>,
    pub data: Value,
}

impl CollectorRequest {
    pub fn from_submission(submission: &Submission) -> Self {
        Self {
            submission_type: submission.submission_type().as_str().to_string(),
            team_number: submission.team_number().value(),
            event_key: submission.event_key().as_str().to_string(),
            match_key: submission.match_key().map(|key| key.as_str().to_string()),
            data: submission.data().as_json().clone(),
        }
    }
}

/// Raw HTTP-level outcome of a submission attempt. Status codes are
/// classified by the coordinator, not here.
#[derive(Debug, Clone)]
pub struct CollectorResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl CollectorResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Human-readable rejection reason, preferring the body's own
    /// `message` field.
    pub fn message(&self) -> String {
        self.body
            .as_ref()
            .and_then(|body| body.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("collector returned status {}", self.status))
    }
}

/// Transport to the collection API. Implementations surface transport
/// faults (DNS, refused connections, dropped sockets) as
/// `NetworkRequestFailure`; HTTP error statuses come back as a normal
/// response for the coordinator to classify.
#[async_trait]
pub trait CollectorClient: Send + Sync {
    async fn submit(&self, request: CollectorRequest) -> Result<CollectorResponse, OfflineError>;
}
