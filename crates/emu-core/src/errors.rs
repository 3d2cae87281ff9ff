//! Structured error types shared across EMU crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`EmuError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (ranks, iteration indices, sizes, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the operator resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the EMU engine. Every family is fatal; there is
/// no retry or partial recovery anywhere in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum EmuError {
    /// Invalid system or process counts handed to the work partitioner.
    #[error("partition error: {0}")]
    Partition(ErrorInfo),
    /// Process-to-process communication failures and protocol violations.
    #[error("communication error: {0}")]
    Comm(ErrorInfo),
    /// Failures inside the numerical kernel (singular systems, NaNs).
    #[error("numerical error: {0}")]
    Numerical(ErrorInfo),
    /// Invalid configuration or environment settings.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Failures raised by the model evaluator.
    #[error("model error: {0}")]
    Model(ErrorInfo),
    /// Serialization, persistence and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl EmuError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            EmuError::Partition(info)
            | EmuError::Comm(info)
            | EmuError::Numerical(info)
            | EmuError::Config(info)
            | EmuError::Model(info)
            | EmuError::Serde(info) => info,
        }
    }

    /// Returns the stable error code.
    pub fn code(&self) -> &str {
        &self.info().code
    }

    /// Returns the error with an additional context entry.
    pub fn with_context(self, key: impl Into<String>, value: impl ToString) -> Self {
        match self {
            EmuError::Partition(info) => EmuError::Partition(info.with_context(key, value)),
            EmuError::Comm(info) => EmuError::Comm(info.with_context(key, value)),
            EmuError::Numerical(info) => EmuError::Numerical(info.with_context(key, value)),
            EmuError::Config(info) => EmuError::Config(info.with_context(key, value)),
            EmuError::Model(info) => EmuError::Model(info.with_context(key, value)),
            EmuError::Serde(info) => EmuError::Serde(info.with_context(key, value)),
        }
    }
}
