//! Batch sizing policies.
//!
//! The orchestrator asks a [`BatchPolicy`] how many queued directories to
//! expand in the next round. Whatever a policy wants, the result is clamped
//! so it never exceeds the queue depth or the worker capacity and never
//! drops below one while work remains.

use std::time::Duration;

use crate::traversal::RoundSummary;

/// Batch size used when none is configured
pub const DEFAULT_BATCH_SIZE: usize = 10;

pub trait BatchPolicy: Send {
    /// Size of the next batch given the previous size, the number of queued
    /// directories and the number of workers.
    fn next_batch_size(&self, current: usize, queue_depth: usize, worker_capacity: usize)
    -> usize;

    /// Feedback after each round. Policies that do not adapt ignore it.
    fn observe(&mut self, _round: &RoundSummary) {}
}

/// Clamp a desired batch size into the valid range
pub fn clamp_batch(desired: usize, queue_depth: usize, worker_capacity: usize) -> usize {
    if queue_depth == 0 {
        return 0;
    }
    let upper = queue_depth.min(worker_capacity.max(1));
    desired.clamp(1, upper)
}

/// Which policy a traversal uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStrategy {
    Fixed(usize),
    Saturate,
    Adaptive { target_round: Duration },
}

impl Default for BatchStrategy {
    fn default() -> Self {
        BatchStrategy::Fixed(DEFAULT_BATCH_SIZE)
    }
}

impl BatchStrategy {
    pub fn into_policy(self) -> Box<dyn BatchPolicy> {
        match self {
            BatchStrategy::Fixed(size) => Box::new(FixedBatch::new(size)),
            BatchStrategy::Saturate => Box::new(SaturateWorkers),
            BatchStrategy::Adaptive { target_round } => Box::new(AdaptiveBatch::new(target_round)),
        }
    }

    /// Batch size handed to the policy before the first round
    pub fn initial_size(&self, worker_capacity: usize) -> usize {
        match self {
            BatchStrategy::Fixed(size) => *size,
            BatchStrategy::Saturate | BatchStrategy::Adaptive { .. } => worker_capacity,
        }
    }
}

/// Always the same batch size
#[derive(Debug, Clone, Copy)]
pub struct FixedBatch {
    size: usize,
}

impl FixedBatch {
    pub fn new(size: usize) -> Self {
        Self { size }
    }
}

impl BatchPolicy for FixedBatch {
    fn next_batch_size(&self, _current: usize, queue_depth: usize, worker_capacity: usize) -> usize {
        clamp_batch(self.size, queue_depth, worker_capacity)
    }
}

/// One directory per available worker
#[derive(Debug, Clone, Copy, Default)]
pub struct SaturateWorkers;

impl BatchPolicy for SaturateWorkers {
    fn next_batch_size(&self, _current: usize, queue_depth: usize, worker_capacity: usize) -> usize {
        clamp_batch(worker_capacity, queue_depth, worker_capacity)
    }
}

/// Grows the batch while rounds finish well under the target duration,
/// shrinks it when a round overruns.
#[derive(Debug, Clone)]
pub struct AdaptiveBatch {
    target_round: Duration,
    desired: Option<usize>,
}

impl AdaptiveBatch {
    pub fn new(target_round: Duration) -> Self {
        Self {
            target_round,
            desired: None,
        }
    }
}

impl BatchPolicy for AdaptiveBatch {
    fn next_batch_size(&self, current: usize, queue_depth: usize, worker_capacity: usize) -> usize {
        clamp_batch(self.desired.unwrap_or(current), queue_depth, worker_capacity)
    }

    fn observe(&mut self, round: &RoundSummary) {
        let last = round.batch.len().max(1);
        let next = if round.duration > self.target_round {
            (last / 2).max(1)
        } else if round.duration < self.target_round / 2 {
            last.saturating_mul(2)
        } else {
            last
        };
        self.desired = Some(next);
    }
}
