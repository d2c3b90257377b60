//! Chat wire protocol definitions and framing.
//!
//! Every record on the wire is a UTF-8 JSON object carried in a single
//! peer recv — there is no length prefix, one recv is one frame. Legacy
//! clients wrap the record in an extra JSON string (the object is encoded
//! twice); [`decode_frame`] accepts both forms on input, while
//! [`Response::encode`] always emits the plain single-encoded object.
//!
//! Frame shapes:
//! - `Request`  — client → server: `action`, `time`, `data`
//! - `Response` — server → client: `action` echo, `timestamp`, `code`,
//!   `info`, plus verb-specific top-level fields

use std::time::{SystemTime, UNIX_EPOCH};

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
    thiserror::Error,
};

// ── Constants ────────────────────────────────────────────────────────────────

/// Largest frame a peer may send; reads beyond this are split and malformed.
pub const DEFAULT_BUFFER_SIZE: usize = 65_536;

/// Response status codes.
pub mod status {
    /// Request handled.
    pub const OK: u16 = 200;
    /// Application-level refusal; `info` says why.
    pub const REFUSED: u16 = 205;
    /// Malformed frame or failed request validation.
    pub const MALFORMED: u16 = 400;
    /// Reserved.
    pub const FORBIDDEN: u16 = 403;
    /// No handler for the requested action.
    pub const UNKNOWN_ACTION: u16 = 404;
    /// Handler failure.
    pub const INTERNAL: u16 = 500;
}

/// Action verbs understood by the server.
pub mod actions {
    pub const REGISTER: &str = "register";
    pub const LOGIN: &str = "login";
    pub const LOGOUT: &str = "logout";
    pub const GET_CONTACTS: &str = "get_contacts";
    pub const ADD_CONTACT: &str = "add_contact";
    pub const DELETE_CONTACT: &str = "delete_contact";
    pub const GET_CHAT: &str = "get_chat";
    pub const COMMON_CHAT: &str = "common_chat";
    pub const ADD_MESSAGE: &str = "add_message";
    pub const PROFILE: &str = "profile";
    pub const UPDATE_PROFILE: &str = "update_profile";
    pub const SEARCH_IN_CHAT: &str = "search_in_chat";
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,
}

// ── Request ──────────────────────────────────────────────────────────────────

/// A decoded client request.
///
/// `action` stays optional here so that a frame without one can still be
/// echoed back in a 400 response; dispatch refuses it before any handler
/// runs. Unknown envelope fields are dropped on decode.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Request {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.action.as_deref().is_some_and(|a| !a.is_empty())
    }

    /// String field from `data`, present and non-empty.
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Integer field from `data`.
    #[must_use]
    pub fn data_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(Value::as_i64)
    }
}

/// A decoded frame: the typed request plus the raw JSON it came from
/// (observers receive the raw form).
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub request: Request,
    pub raw: Value,
}

/// Decode one frame, tolerating the legacy double-encoded form.
pub fn decode_frame(bytes: &[u8]) -> Result<DecodedFrame, FrameError> {
    let text = std::str::from_utf8(bytes)?;
    let mut value: Value = serde_json::from_str(text)?;

    // Legacy clients send json_encode(json_encode(record)): the outer value
    // is a string holding the actual object.
    if let Value::String(inner) = &value {
        value = serde_json::from_str(inner)?;
    }

    if !value.is_object() {
        return Err(FrameError::NotAnObject);
    }

    let request: Request = serde_json::from_value(value.clone())?;
    Ok(DecodedFrame {
        request,
        raw: value,
    })
}

// ── Response ─────────────────────────────────────────────────────────────────

/// A server response. Extra verb-specific fields sit at the top level of
/// the serialized object, next to the envelope fields.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub action: Option<String>,
    pub timestamp: f64,
    pub code: u16,
    pub info: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Response {
    #[must_use]
    pub fn new(action: Option<String>, code: u16, info: impl Into<String>) -> Self {
        Self {
            action,
            timestamp: now_timestamp(),
            code,
            info: info.into(),
            fields: Map::new(),
        }
    }

    #[must_use]
    pub fn ok(action: impl Into<String>, info: impl Into<String>) -> Self {
        Self::new(Some(action.into()), status::OK, info)
    }

    #[must_use]
    pub fn refused(action: impl Into<String>, info: impl Into<String>) -> Self {
        Self::new(Some(action.into()), status::REFUSED, info)
    }

    #[must_use]
    pub fn malformed(action: Option<String>) -> Self {
        Self::new(action, status::MALFORMED, "Wrong request format")
    }

    #[must_use]
    pub fn forbidden(action: Option<String>) -> Self {
        Self::new(action, status::FORBIDDEN, "Access denied")
    }

    #[must_use]
    pub fn unknown_action(action: Option<String>) -> Self {
        Self::new(action, status::UNKNOWN_ACTION, "Action is not supported")
    }

    #[must_use]
    pub fn internal_error(action: Option<String>) -> Self {
        Self::new(action, status::INTERNAL, "Internal server error")
    }

    /// Attach a verb-specific top-level field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// The raw JSON observers receive.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Serialize for the wire: single-encoded, never the legacy double form.
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_value().to_string()
    }
}

/// Server time as float seconds since the epoch, the unit requests use.
#[must_use]
pub fn now_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, serde_json::json};

    #[test]
    fn decode_single_encoded() {
        let frame = r#"{"action":"login","time":2.0,"data":{"username":"alice","password":"x"}}"#;
        let decoded = decode_frame(frame.as_bytes()).unwrap();
        assert_eq!(decoded.request.action.as_deref(), Some("login"));
        assert_eq!(decoded.request.data_str("username"), Some("alice"));
        assert_eq!(decoded.raw["data"]["password"], "x");
    }

    #[test]
    fn decode_double_encoded() {
        let record = json!({"action": "register", "time": 1.0, "data": {"username": "bob"}});
        let legacy = serde_json::to_string(&serde_json::to_string(&record).unwrap()).unwrap();
        let decoded = decode_frame(legacy.as_bytes()).unwrap();
        assert_eq!(decoded.request.action.as_deref(), Some("register"));
        assert_eq!(decoded.request.data_str("username"), Some("bob"));
    }

    #[rstest]
    #[case(b"not json at all")]
    #[case(b"{\"action\":\"x\"")]
    #[case(b"\"{\\\"action\\\"")]
    fn decode_malformed(#[case] bytes: &[u8]) {
        assert!(matches!(
            decode_frame(bytes),
            Err(FrameError::Json(_) | FrameError::Encoding(_))
        ));
    }

    #[rstest]
    #[case(b"42")]
    #[case(b"[1,2,3]")]
    #[case(b"\"\\\"hello\\\"\"")]
    fn decode_non_object(#[case] bytes: &[u8]) {
        assert!(matches!(decode_frame(bytes), Err(FrameError::NotAnObject)));
    }

    #[test]
    fn missing_action_is_invalid() {
        let decoded = decode_frame(br#"{"time":1.0,"data":{}}"#).unwrap();
        assert!(!decoded.request.is_valid());
    }

    #[test]
    fn unknown_envelope_fields_ignored() {
        let decoded =
            decode_frame(br#"{"action":"profile","surprise":true,"data":{"username":"a"}}"#)
                .unwrap();
        assert!(decoded.request.is_valid());
    }

    #[test]
    fn response_echoes_action_and_flattens_fields() {
        let response = Response::ok("login", "Client logged in").with("user_id", 7);
        let value = response.to_value();
        assert_eq!(value["action"], "login");
        assert_eq!(value["code"], 200);
        assert_eq!(value["info"], "Client logged in");
        assert_eq!(value["user_id"], 7);
    }

    #[test]
    fn response_encode_is_single_encoded() {
        let encoded = Response::unknown_action(Some("frobnicate".into())).encode();
        // A double-encoded frame would parse to a string, not an object.
        let value: Value = serde_json::from_str(&encoded).unwrap();
        assert!(value.is_object());
        assert_eq!(value["code"], 404);
        assert_eq!(value["info"], "Action is not supported");
    }

    #[test]
    fn data_i64_rejects_strings() {
        let decoded =
            decode_frame(br#"{"action":"get_chat","data":{"user_id":"7","chat_id":7}}"#).unwrap();
        assert_eq!(decoded.request.data_i64("user_id"), None);
        assert_eq!(decoded.request.data_i64("chat_id"), Some(7));
    }
}
