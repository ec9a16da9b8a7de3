// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for the compression shim.
//!
//! This crate provides [`ShimConfig`], the TOML-backed settings for the
//! compression layer, together with helpers for loading from files,
//! applying `SBC_*` environment overrides, merging overlays, producing
//! advisory [`ConfigWarning`]s, and turning the result into a
//! [`CompressionConfiguration`].
#![deny(unsafe_code)]
#![warn(missing_docs)]

use sbc_compress::{
    CompressionAlgorithm, CompressionConfiguration, ConfigurationError, DEFAULT_MINIMUM_SIZE,
    GzipCodec, ZstdCodec,
};
use sbc_error::{ErrorCode, ShimError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// An environment override could not be interpreted.
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidOverride {
        /// Environment variable name.
        var: String,
        /// Raw value found.
        value: String,
        /// Why it was refused.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {}", .reasons.join("; "))]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },

    /// The settings could not be turned into a compression configuration.
    #[error(transparent)]
    Compression(#[from] ConfigurationError),
}

impl ConfigError {
    /// Stable error code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Compression(err) => err.code(),
            _ => ErrorCode::ConfigInvalid,
        }
    }
}

impl From<ConfigError> for ShimError {
    fn from(err: ConfigError) -> Self {
        let shim = ShimError::new(err.code(), err.to_string());
        match err {
            ConfigError::FileNotFound { path } => shim.with_context("path", path),
            ConfigError::ValidationError { reasons } => shim.with_context("reasons", reasons),
            ConfigError::InvalidOverride { var, .. } => shim.with_context("var", var),
            _ => shim,
        }
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The threshold is so small that framing overhead outweighs the gain.
    SmallThreshold {
        /// Configured threshold in bytes.
        minimum_size: usize,
    },
    /// Receivers built from this configuration cannot read what its own
    /// senders write.
    OwnAlgorithmNotAccepted {
        /// Algorithm used for sending.
        algorithm: CompressionAlgorithm,
    },
    /// The level is valid but very slow to compress.
    SlowLevel {
        /// Algorithm the level applies to.
        algorithm: CompressionAlgorithm,
        /// Configured level.
        level: i32,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::SmallThreshold { minimum_size } => write!(
                f,
                "minimum_size of {minimum_size} bytes is below {SMALL_THRESHOLD}; small bodies rarely shrink"
            ),
            ConfigWarning::OwnAlgorithmNotAccepted { algorithm } => write!(
                f,
                "algorithm '{algorithm}' is not listed in accept; receivers will not decompress it"
            ),
            ConfigWarning::SlowLevel { algorithm, level } => {
                write!(f, "{algorithm} level {level} is very slow to compress")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level configuration for the compression shim.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ShimConfig {
    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Compression settings.
    #[serde(default)]
    pub compression: CompressionSettings,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            log_level: Some("info".into()),
            compression: CompressionSettings::default(),
        }
    }
}

/// The `[compression]` table. Unset fields fall back to the defaults of the
/// accessor methods.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CompressionSettings {
    /// Algorithm used to compress outgoing bodies. Defaults to gzip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<CompressionAlgorithm>,

    /// Bodies at or above this many bytes are compressed. Defaults to 1024.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_size: Option<usize>,

    /// Codec level (gzip `0..=9`, zstd `0..=22`). Defaults to the codec's
    /// own default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i32>,

    /// Algorithms receivers decompress. Defaults to every built-in one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept: Option<Vec<CompressionAlgorithm>>,
}

impl CompressionSettings {
    /// Effective sending algorithm.
    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm.unwrap_or_default()
    }

    /// Effective threshold.
    pub fn minimum_size(&self) -> usize {
        self.minimum_size.unwrap_or(DEFAULT_MINIMUM_SIZE)
    }

    /// Effective list of accepted algorithms, sorted and deduplicated.
    pub fn accept(&self) -> Vec<CompressionAlgorithm> {
        let mut accept = self
            .accept
            .clone()
            .unwrap_or_else(|| CompressionAlgorithm::ALL.to_vec());
        accept.sort();
        accept.dedup();
        accept
    }
}

impl ShimConfig {
    /// Build the [`CompressionConfiguration`] these settings describe.
    pub fn compression_configuration(&self) -> Result<CompressionConfiguration, ConfigError> {
        let settings = &self.compression;
        let mut builder = CompressionConfiguration::builder()
            .minimum_size(settings.minimum_size())
            .algorithm(settings.algorithm(), settings.level)?;
        for algorithm in settings.accept() {
            builder = builder.accept(algorithm);
        }
        Ok(builder.build()?)
    }
}

/// JSON schema of the configuration file.
pub fn config_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(ShimConfig)).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Thresholds below this many bytes generate a warning.
const SMALL_THRESHOLD: usize = 256;

/// Zstd levels above this are valid but generate a warning.
const SLOW_ZSTD_LEVEL: i32 = 19;

/// Recognised log levels.
/// Log levels accepted by `log_level` and `SBC_LOG_LEVEL`.
pub const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Environment variable overriding `log_level`.
pub const ENV_LOG_LEVEL: &str = "SBC_LOG_LEVEL";
/// Environment variable overriding `compression.algorithm`.
pub const ENV_ALGORITHM: &str = "SBC_COMPRESSION_ALGORITHM";
/// Environment variable overriding `compression.minimum_size`.
pub const ENV_MINIMUM_SIZE: &str = "SBC_MINIMUM_SIZE";
/// Environment variable overriding `compression.level`.
pub const ENV_LEVEL: &str = "SBC_COMPRESSION_LEVEL";

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`ShimConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`ShimConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<ShimConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => ShimConfig::default(),
    };
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Parse a TOML string into a [`ShimConfig`].
pub fn parse_toml(content: &str) -> Result<ShimConfig, ConfigError> {
    toml::from_str::<ShimConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides from the process environment.
///
/// Recognised variables:
/// - `SBC_LOG_LEVEL`
/// - `SBC_COMPRESSION_ALGORITHM`
/// - `SBC_MINIMUM_SIZE`
/// - `SBC_COMPRESSION_LEVEL`
pub fn apply_env_overrides(config: &mut ShimConfig) -> Result<(), ConfigError> {
    apply_overrides_from(config, |var| std::env::var(var).ok())
}

/// Apply overrides using `lookup` in place of the process environment.
pub fn apply_overrides_from(
    config: &mut ShimConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(val) = lookup(ENV_LOG_LEVEL) {
        config.log_level = Some(val);
    }
    if let Some(val) = lookup(ENV_ALGORITHM) {
        let algorithm = val
            .parse::<CompressionAlgorithm>()
            .map_err(|e| invalid_override(ENV_ALGORITHM, &val, e))?;
        config.compression.algorithm = Some(algorithm);
    }
    if let Some(val) = lookup(ENV_MINIMUM_SIZE) {
        let size = val
            .trim()
            .parse::<usize>()
            .map_err(|e| invalid_override(ENV_MINIMUM_SIZE, &val, e))?;
        config.compression.minimum_size = Some(size);
    }
    if let Some(val) = lookup(ENV_LEVEL) {
        let level = val
            .trim()
            .parse::<i32>()
            .map_err(|e| invalid_override(ENV_LEVEL, &val, e))?;
        config.compression.level = Some(level);
    }
    Ok(())
}

fn invalid_override(var: &str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidOverride {
        var: var.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (zero threshold, out-of-range level, unknown log level) are
/// returned as a [`ConfigError::ValidationError`]; soft issues come back as
/// warnings.
pub fn validate_config(config: &ShimConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();
    let settings = &config.compression;

    if let Some(level) = config.log_level.as_deref() {
        if !VALID_LOG_LEVELS.contains(&level) {
            errors.push(format!("invalid log_level '{level}'"));
        }
    }

    let minimum_size = settings.minimum_size();
    if minimum_size == 0 {
        errors.push("compression.minimum_size must be greater than 0".into());
    } else if minimum_size < SMALL_THRESHOLD {
        warnings.push(ConfigWarning::SmallThreshold { minimum_size });
    }

    let algorithm = settings.algorithm();
    if let Some(level) = settings.level {
        match algorithm {
            CompressionAlgorithm::Gzip => {
                if !(0..=GzipCodec::MAX_LEVEL as i32).contains(&level) {
                    errors.push(format!(
                        "compression.level {level} out of range for gzip (0..={})",
                        GzipCodec::MAX_LEVEL
                    ));
                }
            }
            CompressionAlgorithm::Zstd => {
                if !ZstdCodec::LEVELS.contains(&level) {
                    errors.push(format!(
                        "compression.level {level} out of range for zstd ({}..={})",
                        ZstdCodec::LEVELS.start(),
                        ZstdCodec::LEVELS.end()
                    ));
                } else if level > SLOW_ZSTD_LEVEL {
                    warnings.push(ConfigWarning::SlowLevel { algorithm, level });
                }
            }
        }
    }

    if !settings.accept().contains(&algorithm) {
        warnings.push(ConfigWarning::OwnAlgorithmNotAccepted { algorithm });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Values set in `overlay` take precedence over
/// `base`; `accept` lists are replaced, not combined.
pub fn merge_configs(base: ShimConfig, overlay: ShimConfig) -> ShimConfig {
    let (b, o) = (base.compression, overlay.compression);
    ShimConfig {
        log_level: overlay.log_level.or(base.log_level),
        compression: CompressionSettings {
            algorithm: o.algorithm.or(b.algorithm),
            minimum_size: o.minimum_size.or(b.minimum_size),
            level: o.level.or(b.level),
            accept: o.accept.or(b.accept),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
