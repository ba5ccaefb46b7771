// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Document validator.
//!
//! Checks run before a submission is allowed to consume a rate-limit slot:
//! - Document format must be one of MANUAL, XML or CSV (exact, case-sensitive)
//! - Product group, when present, must be an integer in 1..=10
//!
//! Validation is pure; nothing here touches the rate gate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Submission type tag sent with every document.
pub const SUBMISSION_TYPE: &str = "LP_INTRODUCE_GOODS";

/// Inclusive bounds for the product group.
pub const PRODUCT_GROUP_RANGE: std::ops::RangeInclusive<i64> = 1..=10;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid document format {0:?}: expected one of MANUAL, XML, CSV")]
    InvalidFormat(String),

    #[error("Invalid product group {0:?}: expected an integer from 1 to 10")]
    InvalidGroup(String),
}

/// Declared format of the document body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentFormat {
    Manual,
    Xml,
    Csv,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "MANUAL",
            Self::Xml => "XML",
            Self::Csv => "CSV",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MANUAL" => Ok(Self::Manual),
            "XML" => Ok(Self::Xml),
            "CSV" => Ok(Self::Csv),
            other => Err(ValidationError::InvalidFormat(other.to_string())),
        }
    }
}

/// Product group number, guaranteed to lie in 1..=10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProductGroup(u8);

impl ProductGroup {
    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for ProductGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProductGroup {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<i64>() {
            Ok(n) if PRODUCT_GROUP_RANGE.contains(&n) => Ok(Self(n as u8)),
            _ => Err(ValidationError::InvalidGroup(s.to_string())),
        }
    }
}

/// A document as supplied by the caller. Fields are unchecked strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "document_format")]
    pub format: String,

    #[serde(rename = "product_document")]
    pub payload: String,

    #[serde(rename = "product_group", default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl Document {
    pub fn new(format: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            payload: payload.into(),
            group: None,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// Normalized document fields, ready for wire encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPayload {
    pub format: DocumentFormat,
    pub content: String,
    pub group: Option<ProductGroup>,
    pub submission_type: &'static str,
}

/// Document validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentValidator;

impl DocumentValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate the declared document format.
    pub fn validate_format(&self, format: &str) -> Result<DocumentFormat, ValidationError> {
        format.parse().map_err(|err| {
            debug!(format = %format, "Document format invalid");
            err
        })
    }

    /// Validate the optional product group.
    pub fn validate_group(
        &self,
        group: Option<&str>,
    ) -> Result<Option<ProductGroup>, ValidationError> {
        match group {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|err| {
                debug!(group = %raw, "Product group invalid");
                err
            }),
        }
    }

    /// Validate a complete document.
    pub fn validate(&self, document: &Document) -> Result<ValidatedPayload, ValidationError> {
        let format = self.validate_format(&document.format)?;
        let group = self.validate_group(document.group.as_deref())?;

        debug!(%format, group = ?group.map(ProductGroup::get), "Document valid");
        Ok(ValidatedPayload {
            format,
            content: document.payload.clone(),
            group,
            submission_type: SUBMISSION_TYPE,
        })
    }
}
