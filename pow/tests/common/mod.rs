//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::time::Duration;

use randomjs_pow::{
    blake2b_256, BlockTemplate, Execution, Miner, PowParams, ProgramFactory, ProgramOptions,
    RunnerError,
};

/// In-process stand-in for a JavaScript engine.
///
/// The output depends on every byte of the program text, like the output of
/// a real run would.
pub fn digest_interpreter(source: &str) -> Result<Execution, RunnerError> {
    let digest = blake2b_256(source.as_bytes());
    let output = format!("{}|{}|{}", digest[0], digest[1] as i8, source.len());
    Ok(Execution::success(output, Duration::from_micros(source.len() as u64)))
}

/// Fails every program containing a division helper
pub fn picky_interpreter(source: &str) -> Result<Execution, RunnerError> {
    if source.contains("__nonz(") {
        Ok(Execution::failure("RangeError", Duration::ZERO))
    } else {
        digest_interpreter(source)
    }
}

/// Fails every program
pub fn broken_interpreter(_source: &str) -> Result<Execution, RunnerError> {
    Ok(Execution::failure("boom", Duration::ZERO))
}

pub type TestInterpreter = fn(&str) -> Result<Execution, RunnerError>;

pub fn factory() -> ProgramFactory {
    ProgramFactory::new(ProgramOptions::default()).expect("default options are valid")
}

pub fn miner(params: PowParams, template: BlockTemplate) -> Miner<TestInterpreter> {
    Miner::new(params, factory(), digest_interpreter as TestInterpreter, template)
        .expect("valid parameters")
}

pub fn template_with_nonce(nonce: u32) -> BlockTemplate {
    BlockTemplate::default().with_nonce(nonce)
}
