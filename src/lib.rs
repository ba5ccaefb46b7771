// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Registry Submission Limiter
//!
//! Submits signed documents to the goods registry API while keeping every
//! caller, however many run concurrently, under one shared limit:
//!
//! - At most N submissions per sliding window of length T
//! - FIFO admission of callers blocked on a full window
//! - Document format and product group validated before any slot is used
//! - Rate slots freed by window expiry, never by request completion

pub mod config;
pub mod error;
pub mod limiter;
pub mod submission;
pub mod transport;
pub mod validator;

pub use config::Config;
pub use error::{ConfigError, GateError, SubmitError, TransportError, ValidationError};
pub use limiter::{AdmissionTicket, GateSnapshot, RateGate};
pub use submission::{RegistryResponse, SubmissionCoordinator, SubmissionOutcome};
pub use transport::{HttpTransport, Transport, TransportRequest};
pub use validator::{Document, DocumentFormat, DocumentValidator, ValidatedPayload};
