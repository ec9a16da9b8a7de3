// SPDX-License-Identifier: MIT OR Apache-2.0
//! Library half of the `sbc` binary.
//!
//! Command implementations live here so they can be tested without spawning
//! the binary.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod commands;
pub mod format;
