//! RandomJS proof-of-work
//!
//! Solving grinds nonces until the keyed hash of the program output and the
//! keyed hash of the program itself agree on their top `N` bits. Verifying
//! repeats one trial, so solving costs about `2^N` verifications.
//!
//! For a nonce the pipeline is:
//!
//! 1. `key = H(template)`
//! 2. `program = synthesize(key)`
//! 3. `aux = H_key(program)`
//! 4. `raw = H_key(ASCII(run(program)))`
//! 5. accept when `raw[0] ^ aux[0] < 2^(8-N)`
//! 6. `result = (raw with raw[0] &= mask) ^ aux`, `proof = H_key(result)`

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::randomjs::blake2b::{Blake2bHash, Digest, HashFunction, Key, KeyedHash, HASH_SIZE};
use crate::randomjs::error::{PowError, PowResult, TemplateError};
use crate::randomjs::program::ProgramFactory;
use crate::randomjs::runner::{Interpreter, ProgramRunner};
use crate::randomjs::template::{BlockTemplate, NONCE_OFFSET};

/// Default asymmetry exponent
pub const DEFAULT_ASYMMETRY: u8 = 8;

/// What to do when a generated program fails to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Solver moves on to the next nonce, verifier rejects
    #[default]
    Skip,
    /// Both sides stop with [`PowError::ExecutionFailed`]
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "skip" => Ok(FailurePolicy::Skip),
            "abort" => Ok(FailurePolicy::Abort),
            other => Err(format!("unknown failure policy '{}'", other)),
        }
    }
}

/// Protocol parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowParams {
    /// `N`: solving takes `2^N` trials on average
    pub asymmetry: u8,
    pub nonce_offset: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for PowParams {
    fn default() -> Self {
        Self {
            asymmetry: DEFAULT_ASYMMETRY,
            nonce_offset: NONCE_OFFSET,
            failure_policy: FailurePolicy::Skip,
        }
    }
}

impl PowParams {
    pub fn new(asymmetry: u8) -> PowResult<Self> {
        let params = Self {
            asymmetry,
            ..Self::default()
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> PowResult<()> {
        if !(1..=8).contains(&self.asymmetry) {
            return Err(PowError::InvalidAsymmetry(self.asymmetry));
        }
        Ok(())
    }

    /// The template must carry its nonce where the protocol expects it
    pub fn check_template(&self, template: &BlockTemplate) -> Result<(), TemplateError> {
        if template.nonce_offset() != self.nonce_offset {
            return Err(TemplateError::OffsetMismatch {
                expected: self.nonce_offset,
                actual: template.nonce_offset(),
            });
        }
        Ok(())
    }

    /// Acceptance threshold `2^(8-N)`
    pub fn bound(&self) -> u8 {
        1u8 << (8 - self.asymmetry)
    }

    /// Low bits of the first byte that are not fixed by acceptance
    pub fn clear_mask(&self) -> u8 {
        self.bound() - 1
    }

    /// Acceptance relation on the first bytes
    pub fn accepts(&self, a: u8, b: u8) -> bool {
        (a ^ b) < self.bound()
    }

    /// Final result of an accepted trial
    pub fn commit(&self, raw: &Digest, auxiliary: &Digest) -> Digest {
        let mut raw = *raw;
        raw[0] &= self.clear_mask();
        xor(&raw, auxiliary)
    }

    /// Result rebuilt by a verifier
    pub fn candidate(&self, raw: &Digest, auxiliary: &Digest) -> Digest {
        let mut auxiliary = *auxiliary;
        auxiliary[0] &= self.clear_mask();
        xor(raw, &auxiliary)
    }
}

fn xor(a: &Digest, b: &Digest) -> Digest {
    let mut out = [0u8; HASH_SIZE];
    for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b.iter())) {
        *o = x ^ y;
    }
    out
}

/// Bytes hashed for a program output; non-ASCII characters become `?`
pub fn ascii_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect()
}

/// Accepted proof of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub nonce: u32,
    #[serde(with = "hex::serde")]
    pub result: Digest,
    #[serde(with = "hex::serde")]
    pub proof: Digest,
}

/// Detailed outcome of a verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid,
    InvalidProof,
    InvalidAuxiliary,
    InvalidResult,
    /// Program failed under [`FailurePolicy::Skip`]
    ExecutionFailed(String),
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid)
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verification::Valid => f.write_str("valid"),
            Verification::InvalidProof => f.write_str("invalid proof tag"),
            Verification::InvalidAuxiliary => f.write_str("invalid auxiliary"),
            Verification::InvalidResult => f.write_str("invalid result"),
            Verification::ExecutionFailed(output) => {
                write!(f, "program execution failed: {}", output)
            }
        }
    }
}

/// Trial counters of one miner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SolveStats {
    pub trials: u64,
    pub skipped: u64,
    pub solutions: u64,
}

/// Solver and verifier for one block template
pub struct Miner<I, H = Blake2bHash> {
    params: PowParams,
    hasher: H,
    factory: ProgramFactory,
    runner: ProgramRunner<I>,
    template: BlockTemplate,
    lane: u32,
    stride: u32,
    next_step: u32,
    stats: SolveStats,
}

impl<I: Interpreter> Miner<I, Blake2bHash> {
    pub fn new(
        params: PowParams,
        factory: ProgramFactory,
        interpreter: I,
        template: BlockTemplate,
    ) -> PowResult<Self> {
        Self::with_hasher(params, Blake2bHash, factory, interpreter, template)
    }
}

impl<I: Interpreter, H: HashFunction> Miner<I, H> {
    pub fn with_hasher(
        params: PowParams,
        hasher: H,
        factory: ProgramFactory,
        interpreter: I,
        template: BlockTemplate,
    ) -> PowResult<Self> {
        params.validate()?;
        params.check_template(&template)?;
        Ok(Self {
            params,
            hasher,
            factory,
            runner: ProgramRunner::new(interpreter),
            template,
            lane: 0,
            stride: 1,
            next_step: 1,
            stats: SolveStats::default(),
        })
    }

    /// Protocol parameters
    pub fn params(&self) -> &PowParams {
        &self.params
    }

    /// Block template as of the last trial
    pub fn template(&self) -> &BlockTemplate {
        &self.template
    }

    /// Trial counters since construction
    pub fn stats(&self) -> SolveStats {
        self.stats
    }

    /// Grind only nonces `start + lane + 1 + k * stride`, where `start` is
    /// the template's current nonce
    pub fn set_lane(&mut self, lane: u32, stride: u32) {
        self.lane = lane;
        self.stride = stride.max(1);
        self.next_step = lane.saturating_add(1);
    }

    /// Replace the block template, keeping the lane
    pub fn reset(&mut self, template: BlockTemplate) -> PowResult<()> {
        self.params.check_template(&template)?;
        self.template = template;
        self.next_step = self.lane.saturating_add(1);
        Ok(())
    }

    /// Grind until a nonce is accepted
    pub fn solve(&mut self) -> PowResult<Solution> {
        loop {
            if let Some(solution) = self.trial()? {
                return Ok(solution);
            }
        }
    }

    /// Grind until a nonce is accepted or `stop` returns true.
    ///
    /// `stop` is polled before every trial.
    pub fn solve_until<F>(&mut self, mut stop: F) -> PowResult<Option<Solution>>
    where
        F: FnMut() -> bool,
    {
        while !stop() {
            if let Some(solution) = self.trial()? {
                return Ok(Some(solution));
            }
        }
        Ok(None)
    }

    fn trial(&mut self) -> PowResult<Option<Solution>> {
        let current = self.template.nonce();
        let nonce = self
            .template
            .advance_nonce(self.next_step)
            .ok_or(PowError::NonceExhausted(current))?;
        self.next_step = self.stride;
        self.stats.trials += 1;

        let key = Key::from(self.hasher.hash(self.template.as_bytes()));
        let program = self.factory.generate(&key)?;
        let keyed = self.hasher.keyed(&key)?;
        self.runner.write_program(&program);
        let auxiliary = keyed.digest(self.runner.buffer());

        let report = self.runner.execute()?;
        if !report.success {
            match self.params.failure_policy {
                FailurePolicy::Skip => {
                    warn!(nonce, %key, output = %report.output, "program failed, skipping nonce");
                    self.stats.skipped += 1;
                    return Ok(None);
                }
                FailurePolicy::Abort => {
                    return Err(PowError::ExecutionFailed {
                        nonce,
                        key: key.to_string(),
                        output: report.output,
                    })
                }
            }
        }

        let raw = keyed.digest(&ascii_bytes(&report.output));
        debug!(nonce, aux = auxiliary[0], raw = raw[0], "trial");
        if !self.params.accepts(raw[0], auxiliary[0]) {
            return Ok(None);
        }

        let result = self.params.commit(&raw, &auxiliary);
        let proof = keyed.digest(&result);
        self.stats.solutions += 1;
        info!(
            nonce,
            aux = %hex::encode(auxiliary),
            raw = %hex::encode(raw),
            result = %hex::encode(result),
            "solution found"
        );
        Ok(Some(Solution {
            nonce,
            result,
            proof,
        }))
    }

    /// Verify `solution` against this miner's template
    pub fn check(&mut self, solution: &Solution) -> PowResult<Verification> {
        let block = self.template.with_nonce(solution.nonce);
        let key = Key::from(self.hasher.hash(block.as_bytes()));
        let keyed = self.hasher.keyed(&key)?;

        if keyed.digest(&solution.result) != solution.proof {
            warn!(nonce = solution.nonce, "invalid proof tag");
            return Ok(Verification::InvalidProof);
        }

        let program = self.factory.generate(&key)?;
        self.runner.write_program(&program);
        let mut auxiliary = keyed.digest(self.runner.buffer());
        if !self.params.accepts(auxiliary[0], solution.result[0]) {
            warn!(nonce = solution.nonce, "invalid auxiliary");
            return Ok(Verification::InvalidAuxiliary);
        }
        auxiliary[0] &= self.params.clear_mask();

        let report = self.runner.execute()?;
        if !report.success {
            return match self.params.failure_policy {
                FailurePolicy::Skip => {
                    warn!(nonce = solution.nonce, %key, output = %report.output, "program failed");
                    Ok(Verification::ExecutionFailed(report.output))
                }
                FailurePolicy::Abort => Err(PowError::ExecutionFailed {
                    nonce: solution.nonce,
                    key: key.to_string(),
                    output: report.output,
                }),
            };
        }

        let raw = keyed.digest(&ascii_bytes(&report.output));
        if xor(&raw, &auxiliary) != solution.result {
            warn!(nonce = solution.nonce, "invalid result");
            return Ok(Verification::InvalidResult);
        }
        Ok(Verification::Valid)
    }

    /// `true` when `solution` is valid
    pub fn verify(&mut self, solution: &Solution) -> PowResult<bool> {
        Ok(self.check(solution)?.is_valid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::randomjs::config::ProgramOptions;
    use crate::randomjs::error::RunnerError;
    use crate::randomjs::runner::Execution;
    use std::time::Duration;

    fn length_interpreter(source: &str) -> Result<Execution, RunnerError> {
        Ok(Execution::success(source.len().to_string(), Duration::ZERO))
    }

    fn miner(asymmetry: u8) -> Miner<fn(&str) -> Result<Execution, RunnerError>> {
        let factory = ProgramFactory::new(ProgramOptions::default()).unwrap();
        Miner::new(
            PowParams::new(asymmetry).unwrap(),
            factory,
            length_interpreter as fn(&str) -> Result<Execution, RunnerError>,
            BlockTemplate::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_bounds() {
        let p8 = PowParams::new(8).unwrap();
        assert_eq!((p8.bound(), p8.clear_mask()), (1, 0));
        let p4 = PowParams::new(4).unwrap();
        assert_eq!((p4.bound(), p4.clear_mask()), (16, 15));
        let p1 = PowParams::new(1).unwrap();
        assert_eq!((p1.bound(), p1.clear_mask()), (128, 127));
        assert!(matches!(PowParams::new(0), Err(PowError::InvalidAsymmetry(0))));
        assert!(matches!(PowParams::new(9), Err(PowError::InvalidAsymmetry(9))));
    }

    #[test]
    fn test_masking_worked_example() {
        let params = PowParams::new(4).unwrap();
        let mut raw = [0u8; HASH_SIZE];
        let mut aux = [0u8; HASH_SIZE];
        raw[0] = 0x32;
        aux[0] = 0x3D;
        raw[1] = 0xAA;
        aux[1] = 0x0F;

        assert!(params.accepts(raw[0], aux[0]));
        let result = params.commit(&raw, &aux);
        assert_eq!(result[0], 0x3F);
        assert_eq!(result[1], 0xA5);

        // Verifier side
        assert!(params.accepts(aux[0], result[0]));
        let mut masked = aux;
        masked[0] &= params.clear_mask();
        assert_eq!(masked[0], 0x0D);
        assert_eq!(params.candidate(&raw, &aux), result);
    }

    #[test]
    fn test_commit_matches_candidate_when_accepted() {
        let params = PowParams::new(3).unwrap();
        for a in 0..=255u8 {
            for r in 0..=255u8 {
                let mut raw = [0u8; HASH_SIZE];
                let mut aux = [0u8; HASH_SIZE];
                raw[0] = r;
                aux[0] = a;
                let same = params.commit(&raw, &aux) == params.candidate(&raw, &aux);
                assert_eq!(same, params.accepts(r, a));
            }
        }
    }

    #[test]
    fn test_ascii_bytes() {
        assert_eq!(ascii_bytes("a|1"), b"a|1".to_vec());
        assert_eq!(ascii_bytes("é|∞"), b"?|?".to_vec());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("skip".parse::<FailurePolicy>(), Ok(FailurePolicy::Skip));
        assert_eq!("abort".parse::<FailurePolicy>(), Ok(FailurePolicy::Abort));
        assert!("retry".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn test_solve_then_verify() {
        let mut miner = miner(2);
        let solution = miner.solve().unwrap();
        assert_eq!(miner.template().nonce(), solution.nonce);
        assert!(miner.verify(&solution).unwrap());
        assert!(miner.stats().trials >= 1);
    }

    #[test]
    fn test_lane_stride() {
        let mut miner = miner(8);
        miner.set_lane(2, 4);
        let mut calls = 0;
        let found = miner
            .solve_until(|| {
                calls += 1;
                calls > 3
            })
            .unwrap();
        let trials = miner.stats().trials as u32;
        assert!((1..=3).contains(&trials));
        assert_eq!(found.is_some(), miner.stats().solutions == 1);
        // start + 2 + 1, then + 4 each trial
        assert_eq!(miner.template().nonce(), 3 + 4 * (trials - 1));
        if let Some(solution) = found {
            assert_eq!(solution.nonce, miner.template().nonce());
        }

        // One trial per call: lane 1 of 5 visits 2, 7, 12, ...
        let mut miner = self::miner(8);
        miner.set_lane(1, 5);
        for k in 0..6u32 {
            let mut polls = 0;
            miner
                .solve_until(|| {
                    polls += 1;
                    polls > 1
                })
                .unwrap();
            assert_eq!(miner.template().nonce(), 2 + 5 * k);
            assert_eq!(miner.stats().trials, u64::from(k) + 1);
        }
    }

    #[test]
    fn test_nonce_exhausted() {
        let mut miner = miner(8);
        let template = BlockTemplate::default().with_nonce(u32::MAX);
        miner.reset(template).unwrap();
        assert!(matches!(miner.solve(), Err(PowError::NonceExhausted(u32::MAX))));
    }

    #[test]
    fn test_nonce_offset_mismatch_rejected() {
        let params = PowParams {
            nonce_offset: 0,
            ..PowParams::new(8).unwrap()
        };
        let factory = ProgramFactory::new(ProgramOptions::default()).unwrap();
        let result = Miner::new(
            params,
            factory,
            length_interpreter as fn(&str) -> Result<Execution, RunnerError>,
            BlockTemplate::default(),
        );
        assert!(matches!(
            result,
            Err(PowError::Template(TemplateError::OffsetMismatch {
                expected: 0,
                actual: NONCE_OFFSET
            }))
        ));

        let mut miner = miner(8);
        let shifted = BlockTemplate::new(BlockTemplate::default().as_bytes().to_vec(), 0).unwrap();
        assert!(matches!(
            miner.reset(shifted),
            Err(PowError::Template(TemplateError::OffsetMismatch { .. }))
        ));
        assert_eq!(miner.template(), &BlockTemplate::default());
    }

    #[test]
    fn test_solution_json() {
        let solution = Solution {
            nonce: 7,
            result: [0x11; HASH_SIZE],
            proof: [0xab; HASH_SIZE],
        };
        let json = serde_json::to_string(&solution).unwrap();
        assert!(json.contains(&"ab".repeat(32)));
        let back: Solution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, solution);
    }
}
