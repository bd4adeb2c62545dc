use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::domain::QueryContext;
use crate::models::feedback::FeedbackKind;

/// Feedback submission body for `POST /ranking/feedback`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    #[serde(alias = "apartment_id")]
    pub apartment_id: Uuid,
    #[serde(alias = "user_id")]
    pub user_id: Uuid,
    pub feedback: FeedbackKind,
    #[validate(length(min = 1, max = 128))]
    #[serde(default, alias = "search_session_id")]
    pub search_session_id: Option<String>,
    #[validate(length(max = 500))]
    #[serde(default, alias = "search_query")]
    pub search_query: Option<String>,
    #[validate(custom(function = "validate_search_filters"))]
    #[serde(default, alias = "search_filters")]
    pub search_filters: Option<Value>,
    #[validate(range(min = 0))]
    #[serde(default, alias = "apartment_position")]
    pub apartment_position: Option<i32>,
    #[validate(range(min = 0.0, max = 100.0))]
    #[serde(default, alias = "apartment_score")]
    pub apartment_score: Option<f64>,
    #[validate(range(min = 0))]
    #[serde(default, alias = "response_time_ms")]
    pub response_time_ms: Option<i64>,
}

/// Per-field schema issues keyed by wire name
pub type FieldIssues = BTreeMap<String, Vec<String>>;

impl FeedbackRequest {
    /// Decode a raw JSON body, naming every missing or mistyped field
    ///
    /// Range and length checks still run through `Validate` afterwards.
    pub fn from_json(body: Value) -> Result<Self, FieldIssues> {
        let Value::Object(fields) = &body else {
            return Err(issue("body", "must be a JSON object".to_string()));
        };

        let mut issues = FieldIssues::new();
        check_field::<Uuid>(fields, "apartmentId", "apartment_id", true, &mut issues);
        check_field::<Uuid>(fields, "userId", "user_id", true, &mut issues);
        check_field::<FeedbackKind>(fields, "feedback", "feedback", true, &mut issues);
        check_field::<Option<String>>(fields, "searchSessionId", "search_session_id", false, &mut issues);
        check_field::<Option<String>>(fields, "searchQuery", "search_query", false, &mut issues);
        check_field::<Option<i32>>(fields, "apartmentPosition", "apartment_position", false, &mut issues);
        check_field::<Option<f64>>(fields, "apartmentScore", "apartment_score", false, &mut issues);
        check_field::<Option<i64>>(fields, "responseTimeMs", "response_time_ms", false, &mut issues);

        if !issues.is_empty() {
            return Err(issues);
        }

        serde_json::from_value(body).map_err(|e| issue("body", e.to_string()))
    }
}

fn check_field<T: DeserializeOwned>(
    fields: &Map<String, Value>,
    name: &str,
    alias: &str,
    required: bool,
    issues: &mut FieldIssues,
) {
    let message = match fields.get(name).or_else(|| fields.get(alias)) {
        None | Some(Value::Null) if required => "is required".to_string(),
        None => return,
        Some(value) => match T::deserialize(value) {
            Ok(_) => return,
            Err(e) => e.to_string(),
        },
    };
    issues.entry(name.to_string()).or_default().push(message);
}

fn issue(field: &str, message: String) -> FieldIssues {
    FieldIssues::from([(field.to_string(), vec![message])])
}

fn validate_search_filters(value: &Value) -> Result<(), ValidationError> {
    if value.is_object() {
        Ok(())
    } else {
        let mut error = ValidationError::new("object");
        error.message = Some("searchFilters must be a JSON object".into());
        Err(error)
    }
}

/// Score a single listing against a query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    #[serde(alias = "apartment_id")]
    pub apartment_id: Uuid,
    #[serde(default)]
    pub query: QueryContext,
}

/// Rank a batch of listings against a query
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RankRequest {
    #[validate(length(min = 1, max = 500))]
    #[serde(alias = "apartment_ids")]
    pub apartment_ids: Vec<Uuid>,
    #[serde(default)]
    pub query: QueryContext,
    #[serde(default = "default_limit")]
    pub limit: u16,
}

fn default_limit() -> u16 {
    20
}
