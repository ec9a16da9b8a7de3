// SPDX-License-Identifier: MIT OR Apache-2.0
//! Application-property keys that make up the compression metadata contract.
//!
//! These strings must match byte-for-byte between every sender and receiver
//! that share a queue, including implementations in other languages.

/// Name of the method used to compress the body. Its presence is the only
/// signal that a message is compressed.
pub const COMPRESSION_METHOD: &str = "compression-method";

/// Uncompressed body length in bytes.
pub const ORIGINAL_SIZE: &str = "compression-original-size";

/// Compressed body length in bytes. Diagnostic only.
pub const COMPRESSED_SIZE: &str = "compression-compressed-size";

/// Reserved; never read or written by the decision logic.
pub const COMPRESSION_ORIGIN: &str = "compression-origin";

/// Every key owned by the compression layer.
pub const ALL: [&str; 4] = [
    COMPRESSION_METHOD,
    ORIGINAL_SIZE,
    COMPRESSED_SIZE,
    COMPRESSION_ORIGIN,
];

/// Returns `true` if `key` is one of the compression metadata keys.
#[must_use]
pub fn is_compression_key(key: &str) -> bool {
    ALL.contains(&key)
}
