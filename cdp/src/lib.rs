//! Chrome DevTools Protocol message model and JSON codec.
//!
//! This crate owns the wire representation spoken over the browser's
//! DevTools WebSocket. It knows nothing about sockets or tasks: callers
//! encode [`Command`]s, decode whatever text arrives into [`Incoming`], and
//! use the typed [`Method`] structs in the domain modules to build params and
//! parse results.
//!
//! Only the handful of methods the export pipeline issues are modelled.

pub mod browser;
pub mod emulation;
pub mod page;
pub mod runtime;
pub mod target;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error returned by [`decode_message`] and [`Method`] result parsing.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text was not valid JSON, or a payload did not match its schema.
    #[error("failed to decode protocol message: {0}")]
    Json(#[from] serde_json::Error),
    /// The message carried neither an `id` nor a `method`.
    #[error("protocol message is neither a response nor an event")]
    Unrecognized,
}

/// A typed protocol method: its params struct serializes to the `params`
/// object and `Returns` parses the `result` object.
pub trait Method: Serialize {
    /// Fully qualified method name, e.g. `"Page.navigate"`.
    const NAME: &'static str;
    /// Shape of the `result` object in a successful response.
    type Returns: DeserializeOwned;
}

/// Result type for methods that return an empty object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Empty {}

/// An outgoing command.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Caller-assigned id, echoed back on the matching response.
    pub id: u64,
    pub method: String,
    pub params: Value,
    /// Flattened target session the command is addressed to. `None` talks to
    /// the browser itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Command {
    /// Build a command from a typed method.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if the params fail to serialize.
    pub fn new<M: Method>(id: u64, params: &M, session_id: Option<&str>) -> Result<Self, CodecError> {
        Ok(Self {
            id,
            method: M::NAME.to_owned(),
            params: serde_json::to_value(params)?,
            session_id: session_id.map(ToOwned::to_owned),
        })
    }
}

/// Error object carried by a failed response.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ProtocolError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<String>,
}

/// Reply to a [`Command`], correlated by `id`.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub id: u64,
    pub session_id: Option<String>,
    pub result: Result<Value, ProtocolError>,
}

/// Unsolicited notification, e.g. `Page.lifecycleEvent`.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

impl Event {
    /// Parse the params as a typed event payload.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if the params do not match `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        Ok(T::deserialize(&self.params)?)
    }
}

/// Any message received from the browser.
#[derive(Clone, Debug, PartialEq)]
pub enum Incoming {
    Response(Response),
    Event(Event),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    id: Option<u64>,
    method: Option<String>,
    params: Option<Value>,
    result: Option<Value>,
    error: Option<ProtocolError>,
    session_id: Option<String>,
}

/// Encode a command as JSON text.
#[must_use]
pub fn encode_command(command: &Command) -> String {
    // A `Command` only holds strings, integers and `Value`s, none of which
    // can fail to serialize.
    serde_json::to_string(command).unwrap_or_default()
}

/// Decode one text message from the browser.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for malformed JSON and
/// [`CodecError::Unrecognized`] for objects with neither `id` nor `method`.
pub fn decode_message(text: &str) -> Result<Incoming, CodecError> {
    let raw: RawMessage = serde_json::from_str(text)?;

    if let Some(id) = raw.id {
        let result = match raw.error {
            Some(error) => Err(error),
            None => Ok(raw.result.unwrap_or(Value::Object(serde_json::Map::new()))),
        };
        return Ok(Incoming::Response(Response { id, session_id: raw.session_id, result }));
    }

    let Some(method) = raw.method else {
        return Err(CodecError::Unrecognized);
    };
    Ok(Incoming::Event(Event {
        method,
        params: raw.params.unwrap_or(Value::Object(serde_json::Map::new())),
        session_id: raw.session_id,
    }))
}

/// Parse a successful response's `result` as the method's return type.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the result does not match `M::Returns`.
pub fn parse_result<M: Method>(result: Value) -> Result<M::Returns, CodecError> {
    Ok(serde_json::from_value(result)?)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
