//! Helpers for the opaque ERP action descriptions exchanged with the outer layer.
//!
//! An *original action* is whatever the front end reported the user doing, e.g.
//! `{"type": "open_screen", "payload": {"screen": "SalesOrder"}}`. The core only
//! ever reads two things out of it: the action type and the screen. Everything
//! else is carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{CoreError, CoreResult};

/// Placeholder used in pattern keys when the action lacks a type or screen.
pub const UNKNOWN_COMPONENT: &str = "unknown";

/// The `type` field of an original action, if present.
pub fn action_type(action: &JsonValue) -> Option<&str> {
    action.get("type").and_then(JsonValue::as_str)
}

/// The `payload.screen` field of an original action, if present.
pub fn screen(action: &JsonValue) -> Option<&str> {
    action
        .get("payload")
        .and_then(|payload| payload.get("screen"))
        .and_then(JsonValue::as_str)
}

/// Coarse aggregation bucket: `{action_type}_{screen}`.
pub fn pattern_key(action: &JsonValue) -> String {
    format!(
        "{}_{}",
        action_type(action).unwrap_or(UNKNOWN_COMPONENT),
        screen(action).unwrap_or(UNKNOWN_COMPONENT)
    )
}

const HTTP_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

/// A concrete ERP call the copilot proposes on the user's behalf.
///
/// Parsing this out of generated text happens at the LLM boundary; by the time a
/// value of this type exists it has been validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedAction {
    pub method: String,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<JsonValue>,
}

impl SuggestedAction {
    pub fn new(method: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            endpoint: endpoint.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Build from an untrusted JSON object, validating method and endpoint.
    pub fn from_json(value: JsonValue) -> CoreResult<Self> {
        let mut action: SuggestedAction = serde_json::from_value(value)
            .map_err(|e| CoreError::validation(format!("malformed suggested action: {e}")))?;
        action.method = action.method.to_ascii_uppercase();
        action.validate()?;
        Ok(action)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if !HTTP_METHODS.contains(&self.method.as_str()) {
            return Err(CoreError::validation(format!(
                "unsupported method {:?} (expected one of {})",
                self.method,
                HTTP_METHODS.join(", ")
            )));
        }
        if !self.endpoint.starts_with('/') {
            return Err(CoreError::validation(format!(
                "endpoint {:?} must be an absolute path",
                self.endpoint
            )));
        }
        Ok(())
    }
}
