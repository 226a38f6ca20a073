// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Typed failures of the analytics engine
//!
//! None of these are fatal: the operation that produced one returns it, the
//! caller logs it and the engine keeps accepting samples.

use thiserror::Error;

/// Errors produced by the streaming analytics engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A feature needed a field the sample does not carry
    #[error("Incomplete sample: missing {field}")]
    IncompleteSample { field: &'static str },

    /// Not enough points for a partitioning or baseline pass
    #[error("Insufficient data: need {needed}, have {available}")]
    InsufficientData { needed: usize, available: usize },

    /// Not enough history to fit a trend
    #[error("Insufficient history: need {needed}, have {available}")]
    InsufficientHistory { needed: usize, available: usize },

    /// Regression denominator collapsed to zero
    #[error("Degenerate regression: all x values identical")]
    DegenerateRegression,

    /// Rejected configuration value; the previous value is retained
    #[error("Configuration value out of range: {field} = {value}")]
    ConfigOutOfRange { field: &'static str, value: f64 },

    /// Cluster count must be at least one
    #[error("Invalid cluster count: {0}")]
    InvalidClusterCount(usize),
}

/// Result alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;
