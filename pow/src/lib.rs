//! RandomJS proof-of-work library
//!
//! Key-seeded program synthesis, interpreter adapter and the solve/verify
//! protocol shared by the miner binary and any embedding node.

pub mod randomjs;

// ============================================================
// PROTOCOL DEFAULTS
// ============================================================

/// Hashing blob size accepted on the command line
/// Monero-style blob: 76 bytes (152 hex characters)
pub use randomjs::template::BLOCK_TEMPLATE_SIZE;

/// Nonce position inside the hashing blob
pub use randomjs::template::NONCE_OFFSET;

/// Asymmetry exponent: solving costs 2^N verifications
pub use randomjs::pow::DEFAULT_ASYMMETRY;

// ============================================================

// Re-export commonly used items
pub use randomjs::blake2b::{blake2b_256, Blake2bHash, Digest, HashFunction, Key, KeyedHash};
pub use randomjs::pool::{mine_for, MiningSession};
pub use randomjs::program::{Program, ProgramFactory};
pub use randomjs::runner::{
    Execution, Interpreter, ProcessInterpreter, ProgramRunner, RunnerConfig, RuntimeReport,
};
pub use randomjs::stats::{collect_stats, EntropyCounter, ListStats, StatsRun};
pub use randomjs::template::BlockTemplate;
pub use randomjs::{
    FailurePolicy, Miner, OptionsError, PowError, PowParams, PowResult, ProgramOptions,
    RunnerError, Solution, TableError, TemplateError, Verification,
};
