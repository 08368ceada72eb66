//! Wire protocol subsystem.
//!
//! # Data Flow
//! ```text
//! POST body (bytes)
//!     → jsonrpc.rs (validate envelope, classify request / notification / response)
//!     → Message handed to the session's Connection
//!
//! Engine reply or notification (Message)
//!     → jsonrpc.rs (encode)
//!     → HTTP response body or SSE `data:` frame
//! ```
//!
//! # Design Decisions
//! - Decoding goes through `serde_json::Value` so key presence is observable
//!   (`"result": null` is a valid result, not an absent one)
//! - Request ids keep their JSON type (number vs string) end to end

pub mod jsonrpc;

pub use jsonrpc::{
    DecodeError, ErrorObject, Message, Notification, Request, RequestId, Response,
    INITIALIZE_METHOD, JSONRPC_VERSION, SESSION_ERROR_CODE,
};
