// SPDX-License-Identifier: MIT OR Apache-2.0
//! Message model and compression decisions for the compression shim.
//!
//! The outbound decision ([`prepare_for_send`]) compresses bodies at or above
//! the configured threshold and tags them with three metadata properties. The
//! inbound decision ([`process_received`]) reads those properties back,
//! restores the body, and checks it against the recorded original size.
//!
//! Both are free functions over a message and a shared
//! [`CompressionConfiguration`]; [`CompressionHandler`] bundles them for
//! callers that want a single service object.
//!
//! ```
//! use sbc_core::{CompressionConfiguration, OutgoingMessage, ReceivedMessage};
//! use sbc_core::{prepare_for_send, process_received};
//!
//! let config = CompressionConfiguration::gzip(256).unwrap();
//! let payload = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ".repeat(20);
//!
//! let mut out = OutgoingMessage::new(payload.clone());
//! assert!(prepare_for_send(&mut out, &config).unwrap().is_compressed());
//!
//! let mut rx = ReceivedMessage::enqueued(out, 1, chrono::Utc::now());
//! process_received(&mut rx, &config).unwrap();
//! assert_eq!(rx.body, payload);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod handler;
pub mod inbound;
pub mod message;
pub mod outbound;

pub use error::{CompressionError, RejectedMessage};
pub use handler::CompressionHandler;
pub use inbound::{
    InboundOutcome, decompress_and_apply, decompress_to_bytes, process_received,
    should_decompress,
};
pub use message::{ApplicationProperties, OutgoingMessage, PropertyValue, ReceivedMessage};
pub use outbound::{OutboundOutcome, compress_and_set_body, prepare_for_send, should_compress};
pub use sbc_compress::{CompressionConfiguration, headers};
