// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for spacehub-environment.

use thiserror::Error;

/// Environment errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// A core operation failed.
    #[error("Core error: {0}")]
    Core(#[from] spacehub_core::Error),
}

/// Result type using Environment Error.
pub type Result<T> = std::result::Result<T, Error>;
