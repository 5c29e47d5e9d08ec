//! NATS message types

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Generic request wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub token: Option<String>,  // JWT access token
    pub payload: T,
}

#[cfg(test)]
impl<T> Request<T> {
    pub fn with_token(token: String, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            token: Some(token),
            payload,
        }
    }
}

/// Generic success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(request_id: Uuid, payload: T) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(request_id: Uuid, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_token_defaults_to_none() {
        let json = format!(
            r#"{{"id":"{}","timestamp":"2026-01-01T00:00:00Z","payload":{{}}}}"#,
            Uuid::nil()
        );
        let request: Request<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert!(request.token.is_none());
    }

    #[test]
    fn test_error_response_omits_empty_details() {
        let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", "bad");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("INVALID_REQUEST"));
        assert!(!json.contains("details"));
    }

    #[test]
    fn test_error_response_with_details() {
        let error = ErrorResponse::new(Uuid::nil(), "UNKNOWN_FIELD", "bad")
            .with_details(serde_json::json!({ "field": "bogus" }));
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["error"]["details"]["field"], "bogus");
    }
}
