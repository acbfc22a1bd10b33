//! Isolated units of work
//!
//! Each parent object is processed as one unit. A unit returns
//! `Ok(Some(value))` when it produced something, `Ok(None)` when it had
//! nothing to do, or an error. Units never affect each other: a panic or
//! error in one unit is recorded in its outcome and the others keep running.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use histotile_core::{CancellationToken, Result};
use tracing::{debug, warn};

use crate::strategy::{ParallelStrategy, ProcessingMode};

/// Result of one unit of work
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome<T> {
    Completed(T),
    /// Nothing to process, e.g. a tile smaller than one pixel
    Skipped,
    /// Interrupted before or during processing; nothing was committed
    Cancelled,
    Failed(String),
}

impl<T> UnitOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, UnitOutcome::Completed(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            UnitOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    fn from_result(result: Result<Option<T>>) -> Self {
        match result {
            Ok(Some(value)) => UnitOutcome::Completed(value),
            Ok(None) => UnitOutcome::Skipped,
            Err(e) if e.is_cancelled() => UnitOutcome::Cancelled,
            Err(e) => UnitOutcome::Failed(e.to_string()),
        }
    }
}

/// Counts of unit outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub skipped: usize,
    pub cancelled: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_outcomes<T>(outcomes: &[UnitOutcome<T>]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome {
                UnitOutcome::Completed(_) => summary.completed += 1,
                UnitOutcome::Skipped => summary.skipped += 1,
                UnitOutcome::Cancelled => summary.cancelled += 1,
                UnitOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.cancelled + self.failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} completed, {} skipped, {} cancelled, {} failed",
            self.completed, self.skipped, self.cancelled, self.failed
        )
    }
}

/// Run `unit` once per item under `mode`.
///
/// Outcomes are returned in item order. Items not yet started when
/// `cancel` fires are reported as cancelled without running.
pub fn run_units<I, T, F>(
    mode: ProcessingMode,
    items: &[I],
    cancel: &CancellationToken,
    unit: F,
) -> Vec<UnitOutcome<T>>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> Result<Option<T>> + Sync + Send,
{
    let outcomes = mode.par_map(0..items.len(), |index| run_unit(index, &items[index], cancel, &unit));
    debug!("Ran {} units: {}", outcomes.len(), RunSummary::from_outcomes(&outcomes));
    outcomes
}

fn run_unit<I, T, F>(index: usize, item: &I, cancel: &CancellationToken, unit: &F) -> UnitOutcome<T>
where
    F: Fn(&I) -> Result<Option<T>>,
{
    if cancel.is_cancelled() {
        return UnitOutcome::Cancelled;
    }
    match panic::catch_unwind(AssertUnwindSafe(|| unit(item))) {
        Ok(result) => {
            let outcome = UnitOutcome::from_result(result);
            match &outcome {
                UnitOutcome::Failed(reason) => warn!("Unit {} failed: {}", index, reason),
                UnitOutcome::Cancelled => debug!("Unit {} cancelled", index),
                _ => {}
            }
            outcome
        }
        Err(payload) => {
            let reason = format!("panicked: {}", panic_message(payload.as_ref()));
            warn!("Unit {} {}", index, reason);
            UnitOutcome::Failed(reason)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
