//! Sample payload
//!
//! A sample is one unit of telemetry destined for viewers. The relay never
//! looks inside it; it only needs to turn it into one WebSocket message.

use bytes::Bytes;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Payload {
    Text(Utf8Bytes),
    Binary(Bytes),
}

/// One unit of telemetry
///
/// Cheap to clone: both text and binary payloads are reference counted, so
/// fanning a sample out to many viewers never copies its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    payload: Payload,
}

impl Sample {
    /// Create a text sample (sent as a text frame)
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            payload: Payload::Text(Utf8Bytes::from(text.into())),
        }
    }

    /// Create a binary sample (sent as a binary frame)
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self {
            payload: Payload::Binary(data.into()),
        }
    }

    /// Create a text sample from numeric fields separated by single spaces
    pub fn from_fields(fields: &[f64]) -> Self {
        let line = fields
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        Self::text(line)
    }

    /// Text content, if this is a text sample
    pub fn as_text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(text) => Some(text.as_str()),
            Payload::Binary(_) => None,
        }
    }

    /// Raw payload bytes
    pub fn as_bytes(&self) -> &[u8] {
        match &self.payload {
            Payload::Text(text) => text.as_str().as_bytes(),
            Payload::Binary(data) => data,
        }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// WebSocket message carrying this sample
    pub fn to_message(&self) -> Message {
        match &self.payload {
            Payload::Text(text) => Message::Text(text.clone()),
            Payload::Binary(data) => Message::Binary(data.clone()),
        }
    }
}

impl From<String> for Sample {
    fn from(text: String) -> Self {
        Sample::text(text)
    }
}

impl From<&str> for Sample {
    fn from(text: &str) -> Self {
        Sample::text(text)
    }
}

impl From<Bytes> for Sample {
    fn from(data: Bytes) -> Self {
        Sample::binary(data)
    }
}
