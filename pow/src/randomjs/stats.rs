//! Execution statistics
//!
//! Runs many programs from consecutive seeds and summarizes runtime and
//! complexity distributions. Nothing here affects the protocol.

use std::time::{Duration, Instant};

use tracing::warn;

use crate::randomjs::blake2b::Key;
use crate::randomjs::error::PowResult;
use crate::randomjs::program::ProgramFactory;
use crate::randomjs::runner::{Interpreter, ProgramRunner, RuntimeReport};

/// Summary of a list of samples
#[derive(Debug, Clone, PartialEq)]
pub struct ListStats {
    pub min: f64,
    pub max: f64,
    pub average: f64,
    /// Population standard deviation
    pub std_dev: f64,
    sorted: Vec<f64>,
}

impl ListStats {
    /// `None` for an empty sample
    pub fn new<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        let mut sorted: Vec<f64> = values.into_iter().collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len() as f64;
        let average = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|v| (v - average).powi(2)).sum::<f64>() / n;
        Some(Self {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            average,
            std_dev: variance.sqrt(),
            sorted,
        })
    }

    pub fn count(&self) -> usize {
        self.sorted.len()
    }

    /// Nearest-rank percentile, `p` in `[0, 1]`
    pub fn percentile(&self, p: f64) -> f64 {
        let n = self.sorted.len();
        let rank = (p.clamp(0.0, 1.0) * n as f64).ceil() as usize;
        self.sorted[rank.clamp(1, n) - 1]
    }

    /// Buckets of width `std_dev / 10` starting at `min`, as
    /// `(lower bound, count)`. A sample without spread is one bucket.
    pub fn histogram(&self) -> Vec<(f64, usize)> {
        if self.std_dev <= 0.0 {
            return vec![(self.min, self.sorted.len())];
        }
        let width = self.std_dev / 10.0;
        let buckets = (((self.max - self.min) / width).ceil() as usize).max(1);
        let mut counts = vec![0usize; buckets];
        for value in &self.sorted {
            let index = ((value - self.min) / width) as usize;
            counts[index.min(buckets - 1)] += 1;
        }
        counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| (self.min + i as f64 * width, count))
            .collect()
    }
}

/// Estimate of the information content of program outputs.
///
/// Byte-level Shannon entropy over all outputs, scaled by the mean output
/// length.
#[derive(Debug, Clone)]
pub struct EntropyCounter {
    counts: [u64; 256],
    bytes: u64,
    samples: u64,
}

impl Default for EntropyCounter {
    fn default() -> Self {
        Self {
            counts: [0; 256],
            bytes: 0,
            samples: 0,
        }
    }
}

impl EntropyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, output: &str) {
        for byte in output.bytes() {
            self.counts[byte as usize] += 1;
        }
        self.bytes += output.len() as u64;
        self.samples += 1;
    }

    /// Estimated bits per output
    pub fn entropy(&self) -> f64 {
        if self.bytes == 0 {
            return 0.0;
        }
        let total = self.bytes as f64;
        let per_byte: f64 = self
            .counts
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| {
                let p = c as f64 / total;
                -p * p.log2()
            })
            .sum();
        per_byte * total / self.samples as f64
    }
}

/// Reports of a statistics run
#[derive(Debug, Clone)]
pub struct StatsRun {
    /// Successful runs
    pub reports: Vec<RuntimeReport>,
    pub failures: Vec<RuntimeReport>,
    pub elapsed: Duration,
    pub entropy: f64,
}

impl StatsRun {
    /// Runtime in seconds
    pub fn runtime(&self) -> Option<ListStats> {
        ListStats::new(self.reports.iter().map(|r| r.elapsed.as_secs_f64()))
    }

    pub fn cyclomatic(&self) -> Option<ListStats> {
        ListStats::new(self.reports.iter().map(|r| r.cyclomatic_complexity as f64))
    }

    pub fn halstead(&self) -> Option<ListStats> {
        ListStats::new(self.reports.iter().map(|r| r.halstead_difficulty))
    }

    /// The `n` longest runs, slowest first
    pub fn slowest(&self, n: usize) -> Vec<&RuntimeReport> {
        let mut by_runtime: Vec<&RuntimeReport> = self.reports.iter().collect();
        by_runtime.sort_by(|a, b| b.elapsed.cmp(&a.elapsed));
        by_runtime.truncate(n);
        by_runtime
    }
}

/// Run `count` programs with keys derived from `seed, seed + 1, ...`.
///
/// One warm-up program runs first and is not counted. `progress` receives
/// the completed percentage in steps of five.
pub fn collect_stats<I, P>(
    factory: &ProgramFactory,
    runner: &mut ProgramRunner<I>,
    count: usize,
    seed: u64,
    mut progress: P,
) -> PowResult<StatsRun>
where
    I: Interpreter,
    P: FnMut(usize),
{
    let warmup = factory.generate(&Key::from_seed(!seed))?;
    runner.run(&warmup)?;

    let mut reports = Vec::with_capacity(count);
    let mut failures = Vec::new();
    let mut entropy = EntropyCounter::new();
    let step = count as f64 / 20.0;
    let mut next = step;

    let start = Instant::now();
    for i in 0..count {
        if step > 0.0 && i as f64 >= next {
            progress(i * 100 / count);
            next += step;
        }
        let key = Key::from_seed(seed.wrapping_add(i as u64));
        let program = factory.generate(&key)?;
        let report = runner.run(&program)?;
        if report.success {
            entropy.add(&report.output);
            reports.push(report);
        } else {
            warn!(%key, output = %report.output, "program failed");
            failures.push(report);
        }
    }

    Ok(StatsRun {
        reports,
        failures,
        elapsed: start.elapsed(),
        entropy: entropy.entropy(),
    })
}
