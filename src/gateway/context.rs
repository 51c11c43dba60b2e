use chrono::Utc;
use uuid::Uuid;

/// Who is asking, passed explicitly into every gateway operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user: String,
    pub request_id: Uuid,
}

impl RequestContext {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            request_id: Uuid::new_v4(),
        }
    }
}

/// Store timestamp format, microsecond precision so consecutive writes order.
pub fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}
