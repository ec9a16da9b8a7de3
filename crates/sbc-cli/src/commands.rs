// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared command implementations for the `sbc` CLI.

use crate::format::{Inspection, MessageFile};
use anyhow::{Context, Result};
use sbc_compress::CompressionAlgorithm;
use sbc_config::{ShimConfig, VALID_LOG_LEVELS, load_config, validate_config};
use sbc_core::{
    CompressionConfiguration, InboundOutcome, OutboundOutcome, OutgoingMessage, ReceivedMessage,
    headers, prepare_for_send, process_received, should_decompress,
};
use std::path::Path;
use tracing::warn;

/// Command-line overrides layered on top of the configuration file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Replaces `compression.minimum_size`.
    pub threshold: Option<usize>,
    /// Replaces `compression.algorithm`.
    pub algorithm: Option<CompressionAlgorithm>,
}

/// Tracing filter directive for the CLI.
///
/// `--debug` wins. Otherwise the level comes from the configuration file and
/// `SBC_LOG_LEVEL`, falling back to `info` when the file cannot be loaded or
/// names an unknown level. Load errors are reported by the command itself.
pub fn log_directive(config_path: Option<&Path>, debug: bool) -> String {
    if debug {
        return "sbc=debug".into();
    }
    let level = load_config(config_path)
        .ok()
        .and_then(|config| config.log_level)
        .filter(|level| VALID_LOG_LEVELS.contains(&level.as_str()))
        .unwrap_or_else(|| "info".into());
    format!("sbc={level}")
}

/// Load the configuration file (or defaults), apply `overrides`, validate,
/// and build the compression configuration.
///
/// Advisory warnings are logged, not returned.
pub fn resolve_configuration(
    path: Option<&Path>,
    overrides: &Overrides,
) -> Result<CompressionConfiguration> {
    let mut config = load_config(path).context("load configuration")?;
    apply_overrides(&mut config, overrides);
    for warning in validate_config(&config).context("validate configuration")? {
        warn!(target: "sbc.cli", "{warning}");
    }
    config
        .compression_configuration()
        .context("build compression configuration")
}

fn apply_overrides(config: &mut ShimConfig, overrides: &Overrides) {
    if let Some(threshold) = overrides.threshold {
        config.compression.minimum_size = Some(threshold);
    }
    if let Some(algorithm) = overrides.algorithm {
        config.compression.algorithm = Some(algorithm);
    }
}

/// Wrap `payload` in a message and run the outbound decision on it.
pub fn compress_payload(
    payload: Vec<u8>,
    config: &CompressionConfiguration,
) -> Result<(MessageFile, OutboundOutcome)> {
    let mut message = OutgoingMessage::new(payload);
    let outcome = prepare_for_send(&mut message, config).context("compress payload")?;
    Ok((MessageFile::from(message), outcome))
}

/// Run the inbound decision on a message file and return the restored body.
pub fn decompress_message(
    file: MessageFile,
    config: &CompressionConfiguration,
) -> Result<(Vec<u8>, InboundOutcome)> {
    let mut message = ReceivedMessage::from(file);
    let outcome = process_received(&mut message, config).context("decompress message")?;
    Ok((message.body, outcome))
}

/// Describe the compression state of a message file without changing it.
pub fn inspect_message(file: &MessageFile, config: &CompressionConfiguration) -> Inspection {
    let message = ReceivedMessage::from(file.clone());
    let (method, problem) = match should_decompress(&message) {
        Ok(method) => (method, None),
        Err(err) => (None, Some(err.to_string())),
    };
    let int_property = |key: &str| {
        message
            .application_properties
            .get(key)
            .and_then(|value| value.as_i64())
    };
    Inspection {
        body_len: message.body.len(),
        decodable: method
            .as_deref()
            .is_some_and(|m| config.decompressor(m).is_some()),
        method,
        original_size: int_property(headers::ORIGINAL_SIZE),
        compressed_size: int_property(headers::COMPRESSED_SIZE),
        problem,
        other_properties: message
            .application_properties
            .keys()
            .filter(|k| !headers::is_compression_key(k))
            .count(),
    }
}

/// Read and parse a message file.
pub fn read_message_file(path: &Path) -> Result<MessageFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read message file '{}'", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("parse message file '{}'", path.display()))
}

/// Serialise a message file as pretty JSON.
pub fn message_file_json(file: &MessageFile) -> Result<String> {
    serde_json::to_string_pretty(file).context("serialize message file")
}

/// Load and validate a configuration file.
///
/// Returns a list of human-readable diagnostic lines. Lines starting with
/// `error:` mean the configuration is unusable.
pub fn config_check(path: Option<&Path>) -> Vec<String> {
    let mut diagnostics = Vec::new();

    let config = match load_config(path) {
        Ok(c) => c,
        Err(e) => {
            diagnostics.push(format!("error: {e}"));
            return diagnostics;
        }
    };

    match validate_config(&config) {
        Ok(warnings) => {
            for w in &warnings {
                diagnostics.push(format!("warning: {w}"));
            }
            match config.compression_configuration() {
                Ok(built) => diagnostics.push(format!(
                    "config: ok (method {}, minimum_size {}, accepts {})",
                    built.method_name(),
                    built.minimum_size(),
                    built.accepted_methods().collect::<Vec<_>>().join(", ")
                )),
                Err(e) => diagnostics.push(format!("error: {e}")),
            }
        }
        Err(e) => diagnostics.push(format!("error: {e}")),
    }

    diagnostics
}

/// Pretty JSON schema of the configuration file.
pub fn schema_json() -> Result<String> {
    serde_json::to_string_pretty(&sbc_config::config_schema()).context("serialize schema")
}
