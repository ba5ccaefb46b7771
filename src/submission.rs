// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Submission coordinator.
//!
//! One call to [`SubmissionCoordinator::submit`] validates the document,
//! takes a slot from the shared [`RateGate`], posts the document through the
//! [`Transport`] and interprets the registry's answer. The ticket is handed
//! back to the gate on every path once it has been acquired.

use crate::config::Config;
use crate::error::{self, ConfigError, SubmitError, TransportError};
use crate::limiter::RateGate;
use crate::transport::{Transport, TransportRequest};
use crate::validator::{Document, DocumentFormat, DocumentValidator, ValidatedPayload};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// JSON body posted to the registry.
#[derive(Debug, Serialize)]
pub struct DocumentRequest<'a> {
    pub document_format: DocumentFormat,
    pub product_document: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_group: Option<String>,
    pub signature: &'a str,
    #[serde(rename = "type")]
    pub submission_type: &'static str,
}

impl<'a> DocumentRequest<'a> {
    pub fn new(payload: &'a ValidatedPayload, signature: &'a str) -> Self {
        Self {
            document_format: payload.format,
            product_document: &payload.content,
            product_group: payload.group.map(|g| g.to_string()),
            signature,
            submission_type: payload.submission_type,
        }
    }
}

/// What the registry made of a submission that reached it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Document created
    Accepted { id: String },
    /// Registry refused the document
    Rejected {
        code: String,
        message: String,
        description: String,
    },
}

impl SubmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionOutcome::Accepted { .. })
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            SubmissionOutcome::Accepted { id } => Some(id),
            SubmissionOutcome::Rejected { .. } => None,
        }
    }

    /// Interpret a raw registry response body.
    pub fn from_response(body: &[u8]) -> Result<Self, TransportError> {
        RegistryResponse::decode(body)?.into_outcome()
    }
}

/// Registry answer: `value` on success, the error fields on rejection.
///
/// Fields are kept as raw JSON since the registry is loose about their types.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct RegistryResponse {
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub error_message: Option<Value>,
    #[serde(default)]
    pub description: Option<Value>,
}

impl RegistryResponse {
    /// Decode a response body, which must be a JSON object.
    pub fn decode(body: &[u8]) -> Result<Self, TransportError> {
        let json: Value = serde_json::from_slice(body)
            .map_err(|e| TransportError::MalformedResponse(e.to_string()))?;

        // serde would also accept an array for a struct.
        if !json.is_object() {
            return Err(TransportError::MalformedResponse(
                "expected a JSON object".to_string(),
            ));
        }

        serde_json::from_value(json).map_err(|e| TransportError::MalformedResponse(e.to_string()))
    }

    pub fn into_outcome(self) -> Result<SubmissionOutcome, TransportError> {
        if let Some(value) = self.value {
            return Ok(SubmissionOutcome::Accepted {
                id: json_text(&value),
            });
        }

        if self.code.is_none() && self.error_message.is_none() && self.description.is_none() {
            return Err(TransportError::MalformedResponse(
                "neither value nor error fields present".to_string(),
            ));
        }

        let text = |field: Option<Value>| field.as_ref().map(json_text).unwrap_or_default();
        Ok(SubmissionOutcome::Rejected {
            code: text(self.code),
            message: text(self.error_message),
            description: text(self.description),
        })
    }
}

impl fmt::Display for SubmissionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted { id } => write!(f, "accepted: {id}"),
            Self::Rejected {
                code,
                message,
                description,
            } => write!(f, "rejected [{code}]: {message} ({description})"),
        }
    }
}

/// Strings as-is, anything else as its JSON text.
fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Orchestrates document submissions against a shared rate gate.
pub struct SubmissionCoordinator<T> {
    validator: DocumentValidator,
    gate: RateGate,
    transport: T,
    endpoint: Url,
    token: String,
}

impl<T: Transport> SubmissionCoordinator<T> {
    /// Create a coordinator posting to `endpoint` with the given bearer token.
    pub fn new(gate: RateGate, transport: T, endpoint: Url, token: impl Into<String>) -> Self {
        Self {
            validator: DocumentValidator::new(),
            gate,
            transport,
            endpoint,
            token: token.into(),
        }
    }

    /// Build the gate and endpoint from configuration.
    pub fn from_config(config: &Config, transport: T) -> Result<Self, ConfigError> {
        config.validate()?;
        let gate = RateGate::from_config(&config.rate_limit)?;
        let endpoint = config.registry.endpoint()?;
        Ok(Self::new(gate, transport, endpoint, config.registry.token.clone()))
    }

    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Submit one document, waiting as long as needed for a rate slot.
    pub async fn submit(
        &self,
        document: &Document,
        signature: &str,
    ) -> error::Result<SubmissionOutcome> {
        self.submit_inner(document, signature, None).await
    }

    /// Submit one document, giving up if no rate slot frees within `wait`.
    pub async fn submit_timeout(
        &self,
        document: &Document,
        signature: &str,
        wait: Duration,
    ) -> error::Result<SubmissionOutcome> {
        self.submit_inner(document, signature, Some(wait)).await
    }

    async fn submit_inner(
        &self,
        document: &Document,
        signature: &str,
        wait: Option<Duration>,
    ) -> error::Result<SubmissionOutcome> {
        let payload = self.validator.validate(document).map_err(|err| {
            warn!(error = %err, "Document rejected before submission");
            err
        })?;

        let body = serde_json::to_vec(&DocumentRequest::new(&payload, signature))
            .map_err(|e| SubmitError::Encoding(e.to_string()))?;

        let ticket = match wait {
            Some(wait) => self.gate.acquire_timeout(wait).await?,
            None => self.gate.acquire().await?,
        };
        debug!(ticket = ticket.id(), format = %payload.format, "Submitting document");

        let result = self
            .transport
            .send(TransportRequest {
                url: self.endpoint.clone(),
                bearer_token: self.token.clone(),
                body,
            })
            .await
            .and_then(|response| SubmissionOutcome::from_response(&response));

        let ticket_id = ticket.id();
        self.gate.release(ticket);

        match result {
            Ok(outcome @ SubmissionOutcome::Accepted { .. }) => {
                info!(ticket = ticket_id, %outcome, "Document accepted");
                Ok(outcome)
            }
            Ok(outcome) => {
                warn!(ticket = ticket_id, %outcome, "Document rejected by registry");
                Ok(outcome)
            }
            Err(err) => {
                warn!(ticket = ticket_id, error = %err, "Submission failed");
                Err(err.into())
            }
        }
    }
}
