//! RandomJS proof-of-work
//!
//! Deterministic synthesis of random JavaScript programs from a key, and the
//! asymmetric solve/verify protocol built on executing them.
//!
//! Reference: https://github.com/tevador/RandomJS

pub mod error;
pub mod blake2b;
pub mod table;
pub mod operators;
pub mod globals;
pub mod scope;
pub mod ast;
pub mod config;
pub mod generator;
pub mod metrics;
pub mod program;
pub mod runner;
pub mod template;
pub mod pow;
pub mod pool;
pub mod stats;

pub use config::{GrammarTables, ProgramOptions};
pub use error::{OptionsError, PowError, PowResult, RunnerError, TableError, TemplateError};
pub use pow::{FailurePolicy, Miner, PowParams, Solution, Verification};
