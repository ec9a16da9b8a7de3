// SPDX-License-Identifier: MIT OR Apache-2.0
//! Message file format and report rendering for the `sbc` CLI.

use sbc_core::{ApplicationProperties, OutgoingMessage, ReceivedMessage};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// A message as stored on disk: application properties plus a base64 body.
///
/// ```json
/// { "properties": { "compression-method": { "type": "string", "value": "gzip" } },
///   "body": "H4sIAAAAAAAA..." }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageFile {
    /// Application properties, including any compression metadata.
    #[serde(default)]
    pub properties: ApplicationProperties,
    /// Raw body bytes.
    #[serde(with = "base64_body")]
    pub body: Vec<u8>,
}

impl From<OutgoingMessage> for MessageFile {
    fn from(message: OutgoingMessage) -> Self {
        Self {
            properties: message.application_properties,
            body: message.body,
        }
    }
}

impl From<MessageFile> for ReceivedMessage {
    fn from(file: MessageFile) -> Self {
        ReceivedMessage::new(file.body).with_properties(file.properties)
    }
}

mod base64_body {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD
            .decode(text.trim())
            .map_err(serde::de::Error::custom)
    }
}

/// What `sbc inspect` found in a message file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inspection {
    /// Body length as stored.
    pub body_len: usize,
    /// Method named by `compression-method`, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Value of `compression-original-size`, if it is an integer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_size: Option<i64>,
    /// Value of `compression-compressed-size`, if it is an integer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_size: Option<i64>,
    /// Whether the active configuration has a decompressor for `method`.
    pub decodable: bool,
    /// Problem with the compression metadata, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    /// Number of application properties that are not compression metadata.
    pub other_properties: usize,
}

impl Inspection {
    /// Stored size divided by original size, when both are known.
    pub fn ratio(&self) -> Option<f64> {
        match self.original_size {
            Some(original) if original > 0 => Some(self.body_len as f64 / original as f64),
            _ => None,
        }
    }

    /// Multi-line human-readable report.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "body:        {} bytes", self.body_len);
        match &self.method {
            None => {
                let _ = writeln!(out, "compressed:  no");
            }
            Some(method) => {
                let _ = writeln!(out, "compressed:  yes ({method})");
                if let Some(size) = self.original_size {
                    let _ = writeln!(out, "original:    {size} bytes");
                }
                if let Some(ratio) = self.ratio() {
                    let _ = writeln!(out, "ratio:       {:.1}%", ratio * 100.0);
                }
                let _ = writeln!(
                    out,
                    "decodable:   {}",
                    if self.decodable { "yes" } else { "no" }
                );
            }
        }
        if let Some(problem) = &self.problem {
            let _ = writeln!(out, "problem:     {problem}");
        }
        let _ = write!(out, "properties:  {} other", self.other_properties);
        out
    }

    /// Single-line JSON report.
    pub fn to_json(&self) -> String {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let (Some(ratio), Some(map)) = (self.ratio(), value.as_object_mut()) {
            map.insert("ratio".into(), serde_json::json!(ratio));
        }
        value.to_string()
    }
}
