// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transparent payload compression for service bus clients.
//!
//! This crate re-exports the workspace members under one roof:
//!
//! - [`compress`]: codecs and [`CompressionConfiguration`].
//! - [`shim`]: messages and the outbound/inbound decisions.
//! - [`bus`]: bus traits and the compression-aware facades.
//! - [`memory`]: an in-memory bus for tests and demos.
//! - [`config`]: the TOML configuration file.
//! - [`error`]: stable error codes.
//!
//! ```
//! use service_bus_compression::{CompressionAwareClient, InMemoryBus};
//!
//! let bus = InMemoryBus::new();
//! bus.create_queue("orders").unwrap();
//! let client = CompressionAwareClient::with_threshold(bus, 256).unwrap();
//! assert_eq!(client.configuration().minimum_size(), 256);
//! ```
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub use sbc_bus as bus;
pub use sbc_bus_memory as memory;
pub use sbc_compress as compress;
pub use sbc_config as config;
pub use sbc_core as shim;
pub use sbc_error as error;

pub use sbc_bus::{
    BusClient, BusError, CompressionAwareClient, CompressionAwareReceiver, CompressionAwareSender,
    MessageReceiver, MessageSender,
};
pub use sbc_bus_memory::InMemoryBus;
pub use sbc_compress::{CompressionAlgorithm, CompressionConfiguration};
pub use sbc_config::ShimConfig;
pub use sbc_core::{CompressionError, CompressionHandler, OutgoingMessage, ReceivedMessage};
pub use sbc_error::{ErrorCode, ShimError};
