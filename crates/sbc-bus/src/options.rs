// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sender and receiver options.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long a receive call waits for a message when the caller does not say.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60);

/// How received messages are settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiveMode {
    /// The message stays locked on the entity until it is completed.
    #[default]
    PeekLock,
    /// The message is removed from the entity as it is received.
    ReceiveAndDelete,
}

/// Options for creating a sender.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderOptions {
    /// Identifier used in logs and diagnostics.
    pub identifier: Option<String>,
}

/// Options for creating a receiver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverOptions {
    /// Settlement mode.
    pub receive_mode: ReceiveMode,
    /// Messages fetched ahead of the caller. `0` disables prefetch.
    pub prefetch_count: u32,
    /// Identifier used in logs and diagnostics.
    pub identifier: Option<String>,
}

impl ReceiverOptions {
    /// Options with the given receive mode.
    #[must_use]
    pub fn with_receive_mode(mut self, receive_mode: ReceiveMode) -> Self {
        self.receive_mode = receive_mode;
        self
    }

    /// Options with the given prefetch count.
    #[must_use]
    pub fn with_prefetch_count(mut self, prefetch_count: u32) -> Self {
        self.prefetch_count = prefetch_count;
        self
    }

    /// Options with the given identifier.
    #[must_use]
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }
}
