//! Thread-density decomposition of unhalted cycles.
//!
//! `cpu_clk_unhalted_thread_any` counts cycles in which at least one
//! sibling is unhalted, whatever the density. Summing
//! `cpu_clk_unhalted_thread` over the siblings counts the cycles in which
//! both are unhalted twice, so the excess over `thread_any` is the
//! thread-density-2 time:
//!
//! ```text
//! td2 = Σ thread - thread_any
//! td1 = thread_any - td2
//! ```
//!
//! `td1 + td2 == thread_any` holds for every interval by construction.
//! Noisy counters can make `td2` negative; such samples are passed through
//! unchanged and left for the regression to absorb.

use htmodel_schemas::{Counter, TimeSeries};
use tracing::warn;

use crate::aggregate::CoreView;
use crate::error::EstimateError;

/// Unhalted cycles of one physical core split by thread density.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    /// Cycles with exactly one thread active.
    pub td1: TimeSeries,
    /// Cycles with both threads active; `None` when SMT is inactive.
    pub td2: Option<TimeSeries>,
    /// Total unhalted cycles of the core (`thread_any` of its first logical
    /// core).
    pub thread_any: TimeSeries,
}

/// Thread-density-2 cycles of `core`.
///
/// # Errors
///
/// Fails when a counter column is missing or misaligned.
pub fn compute_td2(core: &CoreView<'_>) -> Result<TimeSeries, EstimateError> {
    let thread = core.sum(Counter::UnhaltedThread)?;
    let any = core.first(Counter::UnhaltedThreadAny)?;
    thread.try_sub(any).map_err(|mismatch| {
        EstimateError::length_mismatch(
            Counter::UnhaltedThreadAny.column(core.first_logical()),
            mismatch,
        )
    })
}

/// Thread-density-1 cycles of `core`: `thread_any - td2`, or `thread_any`
/// itself when there is no density-2 regime.
///
/// # Errors
///
/// Fails when a counter column is missing or misaligned.
pub fn compute_td1(
    core: &CoreView<'_>,
    td2: Option<&TimeSeries>,
) -> Result<TimeSeries, EstimateError> {
    let any = core.first(Counter::UnhaltedThreadAny)?;
    match td2 {
        None => Ok(any.clone()),
        Some(td2) => any.try_sub(td2).map_err(|mismatch| {
            EstimateError::length_mismatch(format!("{}_td2", core.key()), mismatch)
        }),
    }
}

/// Decomposes the unhalted cycles of `core`. The density-2 series is only
/// computed when `ht_active`.
///
/// # Errors
///
/// Fails when a counter column is missing or misaligned.
pub fn decompose(
    core: &CoreView<'_>,
    ht_active: bool,
) -> Result<Decomposition, EstimateError> {
    let td2 = if ht_active {
        let td2 = compute_td2(core)?;
        let negative = td2.iter().filter(|&&x| x < 0.0).count();
        if negative > 0 {
            warn!(
                core = %core.key(),
                intervals = negative,
                "negative thread-density-2 cycles passed through uncorrected"
            );
        }
        Some(td2)
    } else {
        None
    };
    let td1 = compute_td1(core, td2.as_ref())?;
    let thread_any = core.first(Counter::UnhaltedThreadAny)?.clone();
    Ok(Decomposition {
        td1,
        td2,
        thread_any,
    })
}
