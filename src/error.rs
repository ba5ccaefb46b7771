// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the submission client.

use thiserror::Error;

pub use crate::validator::ValidationError;

/// Errors raised by the rate gate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("Rate limit must be greater than zero")]
    InvalidLimit,

    #[error("Rate window must be longer than zero")]
    InvalidWindow,

    #[error("Acquire cancelled before admission")]
    Cancelled,
}

/// Failures of the network exchange itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Malformed registry response: {0}")]
    MalformedResponse(String),
}

/// Everything that can stop a submission from producing a registry outcome.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Invalid document: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("Failed to encode submission: {0}")]
    Encoding(String),

    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),
}

/// Invalid client configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("Invalid registry endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SubmitError>;
