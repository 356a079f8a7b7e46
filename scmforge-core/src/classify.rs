//! Classification of create responses.
//!
//! The config API reports duplicate objects, unresolved references and
//! throttling as HTTP 400 with free-text error bodies, so these are recognised
//! by substring. Every marker lives here; retry control flow only sees
//! [`ResponseClass`].

use crate::transport::ApiResponse;

/// Duplicate object. Terminal, not a failure.
const ALREADY_EXISTS_MARKER: &str = "object already exists";

/// A referenced object has not been created yet. Usually resolves once a
/// sibling create in the same batch completes.
const INVALID_REFERENCE_MARKER: &str = "is not a valid reference";

/// Upstream throttling.
const RATE_LIMIT_MARKERS: &[&str] = &["max retries exceeded"];

/// What a create response means for the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// HTTP 201.
    Created,
    /// The object is already present.
    AlreadyExists,
    /// Retryable: a referenced object does not exist (yet).
    InvalidReference,
    /// Retryable: the API is throttling.
    RateLimited,
    /// Anything else. Terminal failure.
    Fatal,
}

impl ResponseClass {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResponseClass::InvalidReference | ResponseClass::RateLimited)
    }
}

/// Classify a completed create response.
pub fn classify_response(response: &ApiResponse) -> ResponseClass {
    match response.status {
        201 => ResponseClass::Created,
        400 => classify_bad_request(&response.body.to_string()),
        _ => ResponseClass::Fatal,
    }
}

fn classify_bad_request(body: &str) -> ResponseClass {
    let body = body.to_lowercase();

    if body.contains(ALREADY_EXISTS_MARKER) {
        ResponseClass::AlreadyExists
    } else if body.contains(INVALID_REFERENCE_MARKER) {
        ResponseClass::InvalidReference
    } else if RATE_LIMIT_MARKERS.iter().any(|m| body.contains(m)) {
        ResponseClass::RateLimited
    } else {
        ResponseClass::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ResponseBody;
    use serde_json::json;

    fn bad_request(body: serde_json::Value) -> ApiResponse {
        ApiResponse::json(400, body)
    }

    #[test]
    fn test_created() {
        assert_eq!(
            classify_response(&ApiResponse::json(201, json!({"id": "x"}))),
            ResponseClass::Created
        );
    }

    #[test]
    fn test_already_exists_is_case_insensitive() {
        assert_eq!(
            classify_response(&bad_request(json!({"detail": "Object Already Exists"}))),
            ResponseClass::AlreadyExists
        );
        assert_eq!(
            classify_response(&bad_request(json!({
                "_errors": [{"code": "API_I00013", "message": "Your configuration is not valid.",
                             "details": {"errorType": "Object Already Exists"}}]
            }))),
            ResponseClass::AlreadyExists
        );
    }

    #[test]
    fn test_invalid_reference_is_retryable() {
        let class = classify_response(&bad_request(json!({
            "_errors": [{"details": {"message": ["'web-servers' is not a valid reference"]}}]
        })));
        assert_eq!(class, ResponseClass::InvalidReference);
        assert!(class.is_retryable());
    }

    #[test]
    fn test_rate_limited_is_retryable() {
        let class = classify_response(&bad_request(json!({"message": "Max retries exceeded with url"})));
        assert_eq!(class, ResponseClass::RateLimited);
        assert!(class.is_retryable());
    }

    #[test]
    fn test_other_bad_request_is_fatal() {
        let class = classify_response(&bad_request(json!({"detail": "Invalid value for ip_netmask"})));
        assert_eq!(class, ResponseClass::Fatal);
        assert!(!class.is_retryable());
    }

    #[test]
    fn test_non_400_errors_are_fatal_even_with_markers() {
        assert_eq!(
            classify_response(&ApiResponse::json(409, json!({"detail": "Object already exists"}))),
            ResponseClass::Fatal
        );
        assert_eq!(
            classify_response(&ApiResponse::new(
                500,
                ResponseBody::Text("is not a valid reference".to_string())
            )),
            ResponseClass::Fatal
        );
        assert_eq!(
            classify_response(&ApiResponse::json(200, json!({}))),
            ResponseClass::Fatal
        );
    }

    #[test]
    fn test_plain_text_body() {
        assert_eq!(
            classify_response(&ApiResponse::new(
                400,
                ResponseBody::Text("Object already exists".to_string())
            )),
            ResponseClass::AlreadyExists
        );
    }
}
