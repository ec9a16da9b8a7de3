// SPDX-License-Identifier: MIT OR Apache-2.0
//! Outgoing and received message types.
//!
//! Both carry a raw byte body and a map of application properties whose
//! values keep their original type, so a receiver can tell a string
//! `compression-method` apart from an integer one.

use chrono::{DateTime, Utc};
use sbc_compress::headers;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Application properties attached to a message.
pub type ApplicationProperties = BTreeMap<String, PropertyValue>;

/// A typed application-property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// UTF-8 string.
    String(String),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    Long(i64),
    /// 64-bit float.
    Double(f64),
    /// Boolean.
    Bool(bool),
    /// Opaque bytes.
    Binary(Vec<u8>),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
    /// UUID.
    Uuid(Uuid),
}

impl PropertyValue {
    /// Encode a byte length, as a 32-bit `Int` when it fits and a `Long`
    /// otherwise.
    #[must_use]
    pub fn from_len(len: usize) -> Self {
        match i32::try_from(len) {
            Ok(v) => Self::Int(v),
            Err(_) => Self::Long(i64::try_from(len).unwrap_or(i64::MAX)),
        }
    }

    /// Short type name used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Double(_) => "double",
            Self::Bool(_) => "bool",
            Self::Binary(_) => "binary",
            Self::Timestamp(_) => "timestamp",
            Self::Uuid(_) => "uuid",
        }
    }

    /// The string value, if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The integer value, if this is an `Int` or a `Long`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(i64::from(*v)),
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Binary(v) => write!(f, "<{} bytes>", v.len()),
            Self::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Uuid(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Binary(v)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Uuid> for PropertyValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

// ── OutgoingMessage ──────────────────────────────────────────────────

/// A message about to be sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingMessage {
    /// Payload bytes.
    pub body: Vec<u8>,
    /// Application properties.
    pub application_properties: ApplicationProperties,
    /// Caller-assigned message identifier.
    pub message_id: Option<String>,
    /// MIME content type of the payload.
    pub content_type: Option<String>,
    /// Application-specific label.
    pub subject: Option<String>,
    /// Correlation identifier.
    pub correlation_id: Option<String>,
    /// Session identifier for session-aware entities.
    pub session_id: Option<String>,
    /// Time after which the broker may drop the message.
    pub time_to_live: Option<Duration>,
}

impl OutgoingMessage {
    /// Create a message with the given body.
    #[must_use]
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    /// Set an application property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.application_properties.insert(key.into(), value.into());
        self
    }

    /// Set the message id.
    #[must_use]
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Set the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Set the session id.
    #[must_use]
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Set the time to live.
    #[must_use]
    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    /// Body as UTF-8, if it is valid UTF-8.
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// Forwarding copy of a received message.
///
/// When the compression layer already restored the body, the compression
/// keys no longer describe it and are dropped; otherwise they are kept so
/// the still-compressed body stays decodable downstream.
impl From<&ReceivedMessage> for OutgoingMessage {
    fn from(received: &ReceivedMessage) -> Self {
        let mut application_properties = received.application_properties.clone();
        if received.is_decompressed() {
            application_properties.retain(|k, _| !headers::is_compression_key(k));
        }
        Self {
            body: received.body.clone(),
            application_properties,
            message_id: received.message_id.clone(),
            content_type: received.content_type.clone(),
            subject: received.subject.clone(),
            correlation_id: received.correlation_id.clone(),
            session_id: received.session_id.clone(),
            time_to_live: received.time_to_live,
        }
    }
}

// ── ReceivedMessage ──────────────────────────────────────────────────

/// A message handed out by a receive or peek operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    /// Payload bytes.
    pub body: Vec<u8>,
    /// Application properties.
    pub application_properties: ApplicationProperties,
    /// Sender-assigned message identifier.
    pub message_id: Option<String>,
    /// MIME content type of the payload.
    pub content_type: Option<String>,
    /// Application-specific label.
    pub subject: Option<String>,
    /// Correlation identifier.
    pub correlation_id: Option<String>,
    /// Session identifier.
    pub session_id: Option<String>,
    /// Time to live set by the sender.
    pub time_to_live: Option<Duration>,
    /// Broker-assigned, per-entity sequence number.
    pub sequence_number: i64,
    /// When the broker accepted the message.
    pub enqueued_time: DateTime<Utc>,
    /// How many times the message has been delivered.
    pub delivery_count: u32,
    /// Enqueue time requested by a scheduled send.
    pub scheduled_enqueue_time: Option<DateTime<Utc>>,
    /// Lock token for peek-lock receives; `None` for peeked or
    /// receive-and-delete messages.
    pub lock_token: Option<Uuid>,
    decompressed: bool,
}

impl ReceivedMessage {
    /// Create a received message with the given body, as a test or replay
    /// fixture. Broker fields take neutral defaults.
    #[must_use]
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            application_properties: ApplicationProperties::new(),
            message_id: None,
            content_type: None,
            subject: None,
            correlation_id: None,
            session_id: None,
            time_to_live: None,
            sequence_number: 0,
            enqueued_time: Utc::now(),
            delivery_count: 0,
            scheduled_enqueue_time: None,
            lock_token: None,
            decompressed: false,
        }
    }

    /// Materialise an accepted outgoing message as the broker would hand it
    /// out.
    #[must_use]
    pub fn enqueued(
        message: OutgoingMessage,
        sequence_number: i64,
        enqueued_time: DateTime<Utc>,
    ) -> Self {
        Self {
            body: message.body,
            application_properties: message.application_properties,
            message_id: message.message_id,
            content_type: message.content_type,
            subject: message.subject,
            correlation_id: message.correlation_id,
            session_id: message.session_id,
            time_to_live: message.time_to_live,
            sequence_number,
            enqueued_time,
            delivery_count: 0,
            scheduled_enqueue_time: None,
            lock_token: None,
            decompressed: false,
        }
    }

    /// Set an application property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.application_properties.insert(key.into(), value.into());
        self
    }

    /// Replace all application properties.
    #[must_use]
    pub fn with_properties(mut self, properties: ApplicationProperties) -> Self {
        self.application_properties = properties;
        self
    }

    /// Set the sequence number.
    #[must_use]
    pub fn with_sequence_number(mut self, sequence_number: i64) -> Self {
        self.sequence_number = sequence_number;
        self
    }

    /// Body as UTF-8, if it is valid UTF-8.
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// `true` once the compression layer has replaced the body with its
    /// decompressed form.
    #[must_use]
    pub fn is_decompressed(&self) -> bool {
        self.decompressed
    }

    pub(crate) fn mark_decompressed(&mut self) {
        self.decompressed = true;
    }
}
