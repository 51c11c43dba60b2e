use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Uniform response body for every gateway endpoint, success or failure.
///
/// Errors are distinguished only by `status_code` (400, 404, 500) and the
/// free-text `message`; there is no per-error schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status_code: u16,
    pub message: String,
    #[serde(default = "empty_object")]
    pub data: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self {
            status_code: 200,
            message: message.into(),
            data,
        }
    }

    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            data: empty_object(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_envelope_has_empty_data_object() {
        let resp = ApiResponse::error(400, "ID is required");
        assert_eq!(resp.data, json!({}));
        assert_eq!(resp.status_code, 400);
    }

    #[test]
    fn missing_data_deserializes_to_empty_object() {
        let resp: ApiResponse =
            serde_json::from_str(r#"{"status_code": 500, "message": "boom"}"#).unwrap();
        assert_eq!(resp.status_code, 500);
        assert_eq!(resp.data, json!({}));
    }

    #[test]
    fn ok_envelope_serializes_all_keys() {
        let resp = ApiResponse::ok("Lead fetched successfully!", json!({"data": {"name": "L-1"}}));
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["status_code"], 200);
        assert_eq!(v["message"], "Lead fetched successfully!");
        assert_eq!(v["data"]["data"]["name"], "L-1");
    }
}
