//! JSON-RPC 2.0 envelope types.
//!
//! Three message shapes travel over the transport:
//! - request: `{jsonrpc, id, method, params?}` (expects exactly one response)
//! - notification: `{jsonrpc, method, params?}` with no id, or `id: null`
//! - response: `{jsonrpc, id, result}` or `{jsonrpc, id, error}`
//!
//! Batches (top-level arrays) are rejected; this transport serves one
//! message per POST.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

pub const JSONRPC_VERSION: &str = "2.0";

/// Method that may implicitly open a session.
pub const INITIALIZE_METHOD: &str = "initialize";

/// Error code used for every session-level failure (missing, unknown, expired).
pub const SESSION_ERROR_CODE: i64 = -32000;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;

/// JSON-RPC request identifier.
///
/// Numbers and strings are distinct ids: `1` and `"1"` never correlate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Number(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId::String(id.to_string())
    }
}

/// A call that expects a correlated response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A fire-and-forget message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Reply to a [`Request`]. Exactly one of `result` / `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

/// JSON-RPC error member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    /// `Some(Value::Null)` when the peer sent `"data": null`.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Value>,
}

/// Keeps an explicit `null` distinct from an absent key.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl ErrorObject {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }
}

/// Any message that crosses the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Message {
    Request(Request),
    Notification(Notification),
    Response(Response),
}

/// Why a body could not be turned into a [`Message`].
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Parse(String),
    #[error("invalid JSON-RPC envelope: {0}")]
    Invalid(&'static str),
}

impl DecodeError {
    /// JSON-RPC error code matching this failure.
    pub fn code(&self) -> i64 {
        match self {
            DecodeError::Parse(_) => PARSE_ERROR,
            DecodeError::Invalid(_) => INVALID_REQUEST,
        }
    }
}

impl Message {
    /// Decode a single JSON-RPC message from raw bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| DecodeError::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Classify an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        let mut obj = match value {
            Value::Object(obj) => obj,
            Value::Array(_) => return Err(DecodeError::Invalid("batch requests are not supported")),
            _ => return Err(DecodeError::Invalid("message must be a JSON object")),
        };

        match obj.get("jsonrpc") {
            Some(Value::String(v)) if v == JSONRPC_VERSION => {}
            _ => return Err(DecodeError::Invalid("jsonrpc must be \"2.0\"")),
        }

        let id = take_id(&mut obj)?;

        if let Some(method) = obj.remove("method") {
            let method = match method {
                Value::String(m) => m,
                _ => return Err(DecodeError::Invalid("method must be a string")),
            };
            let params = obj.remove("params");
            return Ok(match id {
                Some(id) => Message::Request(Request {
                    jsonrpc: JSONRPC_VERSION.to_string(),
                    id,
                    method,
                    params,
                }),
                None => Message::Notification(Notification {
                    jsonrpc: JSONRPC_VERSION.to_string(),
                    method,
                    params,
                }),
            });
        }

        let result = obj.remove("result");
        let error = match obj.remove("error") {
            Some(raw) => Some(
                serde_json::from_value::<ErrorObject>(raw)
                    .map_err(|_| DecodeError::Invalid("malformed error object"))?,
            ),
            None => None,
        };
        match (&result, &error) {
            (Some(_), None) | (None, Some(_)) => Ok(Message::Response(Response {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id,
                result,
                error,
            })),
            (Some(_), Some(_)) => Err(DecodeError::Invalid("response carries both result and error")),
            (None, None) => Err(DecodeError::Invalid("message has neither method nor result")),
        }
    }

    /// Serialize to the JSON wire form.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// The request identifier, if the message carries a non-null one.
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Message::Request(r) => Some(&r.id),
            Message::Response(r) => r.id.as_ref(),
            Message::Notification(_) => None,
        }
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            Message::Request(r) => Some(&r.method),
            Message::Notification(n) => Some(&n.method),
            Message::Response(_) => None,
        }
    }

    /// True for the protocol's initialization call, the only method allowed
    /// to open a session implicitly.
    pub fn is_initialize(&self) -> bool {
        matches!(self, Message::Request(r) if r.method == INITIALIZE_METHOD)
    }
}

fn take_id(obj: &mut Map<String, Value>) -> Result<Option<RequestId>, DecodeError> {
    match obj.remove("id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(RequestId::String(s))),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(|n| Some(RequestId::Number(n)))
            .ok_or(DecodeError::Invalid("numeric id must be an integer")),
        Some(_) => Err(DecodeError::Invalid("id must be a string, integer or null")),
    }
}

impl Request {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

impl Response {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<RequestId>, error: ErrorObject) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl From<Request> for Message {
    fn from(r: Request) -> Self {
        Message::Request(r)
    }
}

impl From<Notification> for Message {
    fn from(n: Notification) -> Self {
        Message::Notification(n)
    }
}

impl From<Response> for Message {
    fn from(r: Response) -> Self {
        Message::Response(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_request_notification_and_response() {
        let req = Message::decode(br#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#).unwrap();
        assert!(req.is_initialize());
        assert_eq!(req.id(), Some(&RequestId::Number(1)));

        let note = Message::decode(br#"{"jsonrpc":"2.0","method":"ping"}"#).unwrap();
        assert!(matches!(note, Message::Notification(_)));
        assert_eq!(note.id(), None);

        let resp = Message::decode(br#"{"jsonrpc":"2.0","id":"a","result":{}}"#).unwrap();
        assert!(matches!(resp, Message::Response(_)));
        assert_eq!(resp.id(), Some(&RequestId::String("a".into())));
    }

    #[test]
    fn null_id_with_method_is_a_notification() {
        let msg = Message::decode(br#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#).unwrap();
        assert!(matches!(msg, Message::Notification(_)));
    }

    #[test]
    fn number_and_string_ids_are_distinct() {
        assert_ne!(RequestId::Number(1), RequestId::String("1".into()));
    }

    #[test]
    fn rejects_malformed_envelopes() {
        assert!(matches!(Message::decode(b"{not json"), Err(DecodeError::Parse(_))));
        assert_eq!(
            Message::decode(br#"[{"jsonrpc":"2.0","method":"a"}]"#).unwrap_err().code(),
            INVALID_REQUEST
        );
        assert!(Message::decode(br#"{"jsonrpc":"1.0","method":"a"}"#).is_err());
        assert!(Message::decode(br#"{"jsonrpc":"2.0","id":1}"#).is_err());
        assert!(Message::decode(br#"{"jsonrpc":"2.0","id":1.5,"method":"a"}"#).is_err());
        assert!(Message::decode(br#"{"jsonrpc":"2.0","id":1,"result":1,"error":{"code":1,"message":"x"}}"#).is_err());
    }

    #[test]
    fn round_trip_preserves_observable_fields() {
        let messages: Vec<Message> = vec![
            Request::new("abc", "tools/call", Some(json!({"name": "x"}))).into(),
            Notification::new("notifications/progress", Some(json!([1, 2]))).into(),
            Response::success(RequestId::Number(7), Value::Null).into(),
            Response::error(None, ErrorObject::new(SESSION_ERROR_CODE, "gone")).into(),
        ];
        for msg in messages {
            let bytes = msg.encode().unwrap();
            assert_eq!(Message::decode(&bytes).unwrap(), msg);
        }
    }

    #[test]
    fn error_data_null_survives_decoding() {
        let mut error = ErrorObject::new(-32001, "tool failed");
        error.data = Some(Value::Null);
        let msg: Message = Response::error(Some(RequestId::Number(3)), error).into();

        let bytes = msg.encode().unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains(r#""data":null"#));
        assert_eq!(Message::decode(&bytes).unwrap(), msg);

        let bare = Message::decode(br#"{"jsonrpc":"2.0","id":3,"error":{"code":1,"message":"x"}}"#).unwrap();
        let Message::Response(bare) = bare else { panic!("expected a response") };
        assert_eq!(bare.error.unwrap().data, None);
    }

    #[test]
    fn error_response_serializes_null_id() {
        let resp = Response::error(None, ErrorObject::new(SESSION_ERROR_CODE, "no session"));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["error"]["code"], json!(-32000));
        assert!(value.get("result").is_none());
    }
}
