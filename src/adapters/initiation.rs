//! # Call initiation collaborator.
//!
//! The dispatch engine asks an [`InitiationAdapter`] to place one outbound
//! call per target. [`HttpInitiator`] talks to the dialer service:
//!
//! ```text
//! POST {api_base}/calls/outbound        {"number": "+15550001"}
//!   200 {"Success": true,  "Call-sid": "CA123", "Message": "queued"}
//!   200 {"Success": false, "Message": "number unreachable"}
//!   5xx / 4xx                           → InitiationError::Status
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::InitiationError;

/// Result reported by the initiation service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiationOutcome {
    /// Whether the service accepted the call.
    #[serde(rename = "Success", default)]
    pub success: bool,
    /// Identifier the telephony provider assigned to the call.
    #[serde(rename = "Call-sid", default, skip_serializing_if = "Option::is_none")]
    pub external_call_id: Option<String>,
    /// Free-form service message.
    #[serde(rename = "Message", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl InitiationOutcome {
    /// Accepted call with the given id.
    pub fn accepted(call_id: impl Into<String>) -> Self {
        Self {
            success: true,
            external_call_id: Some(call_id.into()),
            message: None,
        }
    }

    /// Refused call with a reason.
    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            success: false,
            external_call_id: None,
            message: Some(message.into()),
        }
    }

    /// Call id if the call was accepted and the id is non-empty.
    ///
    /// A success without a call id counts as a failure for dispatch.
    pub fn call_id(&self) -> Option<&str> {
        match (self.success, self.external_call_id.as_deref()) {
            (true, Some(id)) if !id.is_empty() => Some(id),
            _ => None,
        }
    }

    /// Reason to record when [`call_id`](Self::call_id) is `None`.
    pub fn failure_reason(&self) -> String {
        match (&self.message, self.success) {
            (Some(m), false) if !m.is_empty() => m.clone(),
            (_, true) => "accepted without a call id".to_string(),
            _ => "initiation refused".to_string(),
        }
    }
}

/// Places one outbound call.
#[async_trait]
pub trait InitiationAdapter: Send + Sync + 'static {
    /// Asks the service to call `phone_number`.
    ///
    /// An `Err` is handled exactly like `Ok` with `success == false`.
    async fn initiate(&self, phone_number: &str) -> Result<InitiationOutcome, InitiationError>;
}

#[derive(Serialize)]
struct OutboundRequest<'a> {
    number: &'a str,
}

/// HTTP client for `POST /calls/outbound`.
#[derive(Clone, Debug)]
pub struct HttpInitiator {
    client: reqwest::Client,
    url: String,
}

impl HttpInitiator {
    /// Creates an initiator for the service at `api_base`.
    pub fn new(api_base: &str) -> Self {
        Self::with_client(reqwest::Client::new(), api_base)
    }

    /// Creates an initiator sharing an existing client.
    pub fn with_client(client: reqwest::Client, api_base: &str) -> Self {
        Self {
            client,
            url: format!("{}/calls/outbound", api_base.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl InitiationAdapter for HttpInitiator {
    async fn initiate(&self, phone_number: &str) -> Result<InitiationOutcome, InitiationError> {
        debug!(url = %self.url, phone_number, "initiating call");

        let resp = self
            .client
            .post(&self.url)
            .json(&OutboundRequest {
                number: phone_number,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(InitiationError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| InitiationError::Decode(e.to_string()))
    }
}
