//! Parallel nonce grinding
//!
//! Each worker owns a miner (template copy, synthesizer, interpreter) and
//! grinds its own lane of nonces. Solutions flow back through a channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::randomjs::error::PowResult;
use crate::randomjs::pow::{Miner, Solution};
use crate::randomjs::runner::Interpreter;
use crate::randomjs::template::BlockTemplate;

/// Outcome of a bounded mining session
#[derive(Debug, Clone, Default)]
pub struct MiningSession {
    /// Solutions in the order they were received
    pub solutions: Vec<Solution>,
    pub trials: u64,
    pub skipped: u64,
    pub elapsed: Duration,
}

impl MiningSession {
    pub fn solutions_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.solutions.len() as f64 / secs
        } else {
            0.0
        }
    }
}

/// Grind `template` with `workers` threads for `duration`.
///
/// `build` creates the miner of one worker from its template copy; it runs
/// on the worker thread, so the interpreter does not need to be `Send`.
/// Worker `i` tries nonces `start + i + 1 + k * workers`. The first worker
/// error stops every worker and is returned.
pub fn mine_for<I, F>(
    template: &BlockTemplate,
    workers: usize,
    duration: Duration,
    build: F,
) -> PowResult<MiningSession>
where
    I: Interpreter,
    F: Fn(usize, BlockTemplate) -> PowResult<Miner<I>> + Sync,
{
    let workers = workers.max(1);
    let stride = u32::try_from(workers).unwrap_or(u32::MAX);
    let stop = AtomicBool::new(false);
    let start = Instant::now();
    let (tx, rx) = mpsc::channel::<Solution>();

    let outcomes = thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|index| {
                let tx = tx.clone();
                let stop = &stop;
                let build = &build;
                let template = template.clone();
                s.spawn(move || -> PowResult<(u64, u64)> {
                    let run = || -> PowResult<(u64, u64)> {
                        let mut miner = build(index, template)?;
                        miner.set_lane(index as u32, stride);
                        let should_stop =
                            || stop.load(Ordering::Relaxed) || start.elapsed() >= duration;
                        while let Some(solution) = miner.solve_until(&should_stop)? {
                            debug!(worker = index, nonce = solution.nonce, "worker found solution");
                            if tx.send(solution).is_err() {
                                break;
                            }
                        }
                        let stats = miner.stats();
                        Ok((stats.trials, stats.skipped))
                    };
                    let outcome = run();
                    if let Err(err) = &outcome {
                        error!(worker = index, "worker failed: {}", err);
                        stop.store(true, Ordering::Relaxed);
                    }
                    outcome
                })
            })
            .collect();
        drop(tx);

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(outcome) => outcome,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect::<Vec<_>>()
    });

    let mut session = MiningSession {
        solutions: rx.into_iter().collect(),
        elapsed: start.elapsed(),
        ..MiningSession::default()
    };
    for outcome in outcomes {
        let (trials, skipped) = outcome?;
        session.trials += trials;
        session.skipped += skipped;
    }
    Ok(session)
}
