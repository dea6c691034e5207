//! Error types for program synthesis, execution and the PoW protocol.

use thiserror::Error;

/// Errors raised while building or sampling a weighted table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    /// `choose` was called on a table with no eligible alternative.
    #[error("weighted table is empty")]
    EmptyTable,

    /// Weight was zero, negative, NaN or infinite.
    #[error("invalid weight {0}: weights must be finite and positive")]
    InvalidWeight(f64),

    /// Name does not belong to the table's enumerated domain.
    #[error("parse error: unknown alternative '{0}'")]
    Parse(String),

    /// Generation bounds rejected before any table is built.
    #[error(transparent)]
    Options(#[from] OptionsError),
}

/// Out-of-range synthesis options.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionsError {
    #[error("invalid {name} bounds: minimum {min} exceeds maximum {max}")]
    Bounds {
        name: &'static str,
        min: u32,
        max: u32,
    },

    #[error("{name} = {value} exceeds the limit of {limit}")]
    TooLarge {
        name: &'static str,
        value: u32,
        limit: u32,
    },

    #[error("integer literal range {0} is negative")]
    IntegerRange(i32),

    #[error("else probability {0} is outside [0, 1]")]
    Probability(f64),
}

/// Errors raised while validating a block template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// Hex representation has the wrong number of characters.
    #[error("invalid block template: expected {expected} hex characters, got {actual}")]
    HexLength { expected: usize, actual: usize },

    /// Hex representation contains a character outside `0-9a-f`.
    #[error("invalid block template: unexpected character {0:?}")]
    HexCharset(char),

    /// Nonce field does not fit inside the buffer.
    #[error("nonce field at offset {offset} does not fit in a {len}-byte template")]
    NonceOffset { offset: usize, len: usize },

    /// Template and protocol parameters place the nonce differently.
    #[error("template nonce offset {actual} does not match protocol offset {expected}")]
    OffsetMismatch { expected: usize, actual: usize },
}

/// Infrastructure failures of the interpreter adapter.
///
/// A generated program that crashes or times out is not an error; it is
/// reported through `RuntimeReport::success`.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The interpreter process could not be started.
    #[error("failed to spawn interpreter '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Communication with the interpreter failed.
    #[error("interpreter i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// Program text is not valid UTF-8.
    #[error("program text is not valid UTF-8")]
    Encoding,
}

/// Errors raised by the PoW engine.
#[derive(Debug, Error)]
pub enum PowError {
    /// Asymmetry exponent outside `1..=8`.
    #[error("invalid asymmetry exponent {0}: expected 1..=8")]
    InvalidAsymmetry(u8),

    /// Block template rejected.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Generator tables could not be built or sampled.
    #[error(transparent)]
    Table(#[from] TableError),

    /// Interpreter adapter failure.
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// Key could not initialise the keyed hash.
    #[error("invalid hash key length")]
    KeyLength,

    /// The nonce counter wrapped before a solution was accepted.
    #[error("nonce space exhausted after nonce {0}")]
    NonceExhausted(u32),

    /// A generated program failed under the abort policy.
    #[error("program execution failed. Nonce value: {nonce}. Seed: {key}, {output}")]
    ExecutionFailed {
        nonce: u32,
        key: String,
        output: String,
    },
}

/// Result type for PoW operations.
pub type PowResult<T> = Result<T, PowError>;
