//! Frame codec for the gate envelope.
//!
//! Every websocket frame carries exactly one serialized [`GateMessage`]: a
//! [`Meta`] header plus an opaque, independently serialized body. Push frames
//! wrap their body once more in an [`EventMessage`] whose string
//! discriminator names the payload type.
//!
//! The codec is stateless. Sequence numbers are assigned by the caller.

use std::collections::HashMap;

use bytes::Bytes;
use prost::Message;

use crate::error::DecodeError;

/// Outer record of every frame.
#[derive(Clone, PartialEq, Message)]
pub struct GateMessage {
    #[prost(message, optional, tag = "1")]
    pub meta: Option<Meta>,
    #[prost(bytes = "bytes", tag = "2")]
    pub body: Bytes,
}

#[derive(Clone, PartialEq, Message)]
pub struct Meta {
    #[prost(string, tag = "1")]
    pub service_name: String,
    #[prost(string, tag = "2")]
    pub method_name: String,
    #[prost(int32, tag = "3")]
    pub message_type: i32,
    #[prost(int64, tag = "4")]
    pub client_seq: i64,
    #[prost(int64, tag = "5")]
    pub server_seq: i64,
    #[prost(int32, tag = "6")]
    pub error_code: i32,
    #[prost(string, tag = "7")]
    pub error_message: String,
    #[prost(map = "string, string", tag = "8")]
    pub metadata: HashMap<String, String>,
}

/// Body of a Notify frame.
#[derive(Clone, PartialEq, Message)]
pub struct EventMessage {
    #[prost(string, tag = "1")]
    pub message_type: String,
    #[prost(bytes = "bytes", tag = "2")]
    pub body: Bytes,
}

/// Frame kind carried in `Meta.message_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Request,
    Response,
    Notify,
    /// Any value outside the known taxonomy. Dropped by the receive loop.
    Other(i32),
}

impl MessageKind {
    pub fn from_wire(value: i32) -> Self {
        match value {
            1 => Self::Request,
            2 => Self::Response,
            3 => Self::Notify,
            other => Self::Other(other),
        }
    }

    pub fn to_wire(self) -> i32 {
        match self {
            Self::Request => 1,
            Self::Response => 2,
            Self::Notify => 3,
            Self::Other(value) => value,
        }
    }
}

/// Decoded view of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub service: String,
    pub method: String,
    pub kind: MessageKind,
    pub client_seq: i64,
    pub server_seq: i64,
    pub error_code: i32,
    pub error_message: String,
    pub body: Bytes,
}

impl Envelope {
    /// Builds a request envelope for `service.method`.
    pub fn request(
        service: impl Into<String>,
        method: impl Into<String>,
        client_seq: i64,
        server_seq: i64,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            kind: MessageKind::Request,
            client_seq,
            server_seq,
            error_code: 0,
            error_message: String::new(),
            body: body.into(),
        }
    }

    pub fn call_name(&self) -> String {
        format!("{}.{}", self.service, self.method)
    }
}

/// Serializes an envelope into frame bytes.
pub fn encode(envelope: &Envelope) -> Vec<u8> {
    GateMessage {
        meta: Some(Meta {
            service_name: envelope.service.clone(),
            method_name: envelope.method.clone(),
            message_type: envelope.kind.to_wire(),
            client_seq: envelope.client_seq,
            server_seq: envelope.server_seq,
            error_code: envelope.error_code,
            error_message: envelope.error_message.clone(),
            metadata: HashMap::new(),
        }),
        body: envelope.body.clone(),
    }
    .encode_to_vec()
}

/// Serializes a Request frame for `service.method` carrying `body`.
pub fn encode_request(
    service: &str,
    method: &str,
    client_seq: i64,
    server_seq: i64,
    body: Vec<u8>,
) -> Vec<u8> {
    encode(&Envelope::request(service, method, client_seq, server_seq, body))
}

/// Parses frame bytes into an [`Envelope`].
pub fn decode(frame: &[u8]) -> Result<Envelope, DecodeError> {
    let message = GateMessage::decode(frame)?;
    let meta = message.meta.ok_or(DecodeError::MissingMeta)?;

    Ok(Envelope {
        service: meta.service_name,
        method: meta.method_name,
        kind: MessageKind::from_wire(meta.message_type),
        client_seq: meta.client_seq,
        server_seq: meta.server_seq,
        error_code: meta.error_code,
        error_message: meta.error_message,
        body: message.body,
    })
}

/// Parses the body of a Notify frame.
pub fn decode_event(body: &[u8]) -> Result<EventMessage, DecodeError> {
    Ok(EventMessage::decode(body)?)
}

/// Serializes a push payload the way the server wraps it.
pub fn encode_event(message_type: &str, body: impl Into<Bytes>) -> Vec<u8> {
    EventMessage {
        message_type: message_type.to_string(),
        body: body.into(),
    }
    .encode_to_vec()
}
