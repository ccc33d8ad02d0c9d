//! Feedback entries: what the user did with a suggestion.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use copilot_core::{FeedbackId, SuggestedAction, action_type, pattern_key, screen};

use crate::error::LearningError;

/// The user's decision on a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    Accepted,
    Rejected,
    Ignored,
}

impl UserAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserAction::Accepted => "accepted",
            UserAction::Rejected => "rejected",
            UserAction::Ignored => "ignored",
        }
    }
}

impl std::fmt::Display for UserAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserAction {
    type Err = LearningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accepted" => Ok(UserAction::Accepted),
            "rejected" => Ok(UserAction::Rejected),
            "ignored" => Ok(UserAction::Ignored),
            other => Err(LearningError::validation(format!(
                "user_action must be one of accepted, rejected, ignored (got {other:?})"
            ))),
        }
    }
}

/// Snapshot of the suggestion a feedback entry is about.
///
/// Copied into the entry at record time; later changes to the caller's data do
/// not affect the ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestionContext {
    /// What the user was doing, e.g. `{"type": "open_screen", "payload": {"screen": "SalesOrder"}}`.
    #[serde(default)]
    pub original_action: JsonValue,
    #[serde(default)]
    pub suggested_action: Option<SuggestedAction>,
    #[serde(default, alias = "business_suggestion")]
    pub suggestion_text: String,
    /// Session context from the front end (`most_common_screens`, `session_length`, ...).
    #[serde(default)]
    pub business_context: JsonValue,
}

impl SuggestionContext {
    pub fn new(original_action: JsonValue, suggestion_text: impl Into<String>) -> Self {
        Self {
            original_action,
            suggested_action: None,
            suggestion_text: suggestion_text.into(),
            business_context: JsonValue::Null,
        }
    }

    pub fn with_suggested_action(mut self, action: SuggestedAction) -> Self {
        self.suggested_action = Some(action);
        self
    }

    pub fn with_business_context(mut self, business_context: JsonValue) -> Self {
        self.business_context = business_context;
        self
    }
}

/// The `most_common_screens` set of a business context (empty if absent).
pub fn common_screens(business_context: &JsonValue) -> BTreeSet<String> {
    business_context
        .get("most_common_screens")
        .and_then(JsonValue::as_array)
        .map(|screens| {
            screens
                .iter()
                .filter_map(JsonValue::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Session behaviour captured alongside an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPattern {
    pub session_length: u64,
    pub action_frequency: JsonValue,
    pub common_screens: BTreeSet<String>,
    /// Hour of day the feedback was recorded, in UTC rather than server-local
    /// time. The same hour drives the report's time-of-day buckets.
    pub time_of_day: u32,
}

/// Features extracted from the context for matching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternFeatures {
    pub action_type: Option<String>,
    pub screen: Option<String>,
    pub suggested_method: Option<String>,
    pub suggested_endpoint: Option<String>,
    pub session: SessionPattern,
}

impl PatternFeatures {
    fn extract(context: &SuggestionContext, timestamp: DateTime<Utc>) -> Self {
        let business = &context.business_context;
        Self {
            action_type: action_type(&context.original_action).map(str::to_string),
            screen: screen(&context.original_action).map(str::to_string),
            suggested_method: context.suggested_action.as_ref().map(|a| a.method.clone()),
            suggested_endpoint: context.suggested_action.as_ref().map(|a| a.endpoint.clone()),
            session: SessionPattern {
                session_length: business
                    .get("session_length")
                    .and_then(JsonValue::as_u64)
                    .unwrap_or(0),
                action_frequency: business
                    .get("action_frequency")
                    .cloned()
                    .unwrap_or_else(|| JsonValue::Object(Default::default())),
                common_screens: common_screens(business),
                time_of_day: timestamp.hour(),
            },
        }
    }
}

/// One immutable ledger record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub id: FeedbackId,
    pub timestamp: DateTime<Utc>,
    pub suggestion_context: SuggestionContext,
    pub user_action: UserAction,
    pub feedback_reason: Option<String>,
    pub execution_result: Option<JsonValue>,
    /// Hex SHA-256 of the canonical matching subset of the context.
    pub context_hash: String,
    /// `{action_type}_{screen}` of the original action.
    pub pattern_key: String,
    pub pattern_features: PatternFeatures,
}

impl FeedbackEntry {
    pub fn new(
        suggestion_context: SuggestionContext,
        user_action: UserAction,
        feedback_reason: Option<String>,
        execution_result: Option<JsonValue>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let feedback_reason = feedback_reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        Self {
            id: FeedbackId::new(),
            timestamp,
            context_hash: context_hash(&suggestion_context),
            pattern_key: pattern_key(&suggestion_context.original_action),
            pattern_features: PatternFeatures::extract(&suggestion_context, timestamp),
            suggestion_context,
            user_action,
            feedback_reason,
            execution_result,
        }
    }
}

/// First `max_chars` characters of `text`.
pub(crate) fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Stable hash of the matching subset of a context.
///
/// The subset is serialized from an ordered map, so equal contexts hash equally
/// no matter how their JSON was laid out.
pub fn context_hash(context: &SuggestionContext) -> String {
    let mut canonical: BTreeMap<&str, JsonValue> = BTreeMap::new();
    canonical.insert(
        "action_type",
        action_type(&context.original_action).map_or(JsonValue::Null, JsonValue::from),
    );
    canonical.insert(
        "screen",
        screen(&context.original_action).map_or(JsonValue::Null, JsonValue::from),
    );
    canonical.insert(
        "suggestion_text",
        JsonValue::from(excerpt(&context.suggestion_text, 100)),
    );

    // Serializing a BTreeMap of plain JSON values cannot fail.
    let encoded = serde_json::to_vec(&canonical).unwrap_or_default();
    hex::encode(Sha256::digest(&encoded))
}

/// Raw feedback as submitted by the outer layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    #[serde(default)]
    pub action_id: Option<String>,
    #[serde(default)]
    pub user_action: Option<String>,
    #[serde(default)]
    pub suggestion_context: SuggestionContext,
    #[serde(default)]
    pub feedback_reason: Option<String>,
    #[serde(default)]
    pub execution_result: Option<JsonValue>,
}

impl FeedbackSubmission {
    /// Check required fields and parse the user action.
    pub fn validate(&self) -> Result<UserAction, LearningError> {
        let missing: Vec<&str> = [
            ("action_id", self.action_id.as_deref()),
            ("user_action", self.user_action.as_deref()),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none_or(|v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(LearningError::validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        self.user_action.as_deref().unwrap_or_default().parse()
    }
}
