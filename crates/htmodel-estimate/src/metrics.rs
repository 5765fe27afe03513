//! Derived per-core metrics.
//!
//! Every function here takes inputs that were already aggregated or
//! decomposed for one physical core and returns a fresh series. Ratios
//! follow IEEE-754 semantics: zero denominators produce `inf` or `NaN`,
//! which are carried into the report unchanged.

use htmodel_schemas::{Counter, IpcModel, LengthMismatch, TimeSeries, Topology};

use crate::aggregate::CoreView;
use crate::density::Decomposition;
use crate::error::{EstimateError, EstimateErrorKind};

/// Maximum instructions per interval at the regime matching the SMT state.
pub fn instr_max(model: &IpcModel, topology: &Topology) -> f64 {
    topology.actual_max_frequency() * model.peak_ipc()
}

/// Retired instructions relative to `instr_max`, per interval.
pub fn productivity(instructions: &TimeSeries, instr_max: f64) -> TimeSeries {
    instructions.map(|instr| instr / instr_max)
}

/// Average number of active hardware threads while the core is unhalted.
///
/// `td1 / any + 2 * td2 / any`; the second term is only present when the
/// decomposition has a density-2 series.
///
/// # Errors
///
/// Fails when the density series are misaligned.
pub fn average_thread_density(
    density: &Decomposition,
) -> Result<TimeSeries, EstimateError> {
    let any = &density.thread_any;
    let mut atd = density
        .td1
        .try_div(any)
        .map_err(|mismatch| EstimateError::length_mismatch("td1", mismatch))?;
    if let Some(td2) = &density.td2 {
        let weighted = td2
            .zip_map(any, |td2, any| 2.0 * td2 / any)
            .map_err(|mismatch| EstimateError::length_mismatch("td2", mismatch))?;
        atd = atd
            .try_add(&weighted)
            .map_err(|mismatch| EstimateError::length_mismatch("td2", mismatch))?;
    }
    Ok(atd)
}

/// C0 residency of the core in nominal-clock units:
/// `Σ ref_tsc / threads_per_core / nominal_frequency`.
///
/// # Errors
///
/// Fails when a reference-cycle column is missing or misaligned.
pub fn core_busy_time(
    core: &CoreView<'_>,
    topology: &Topology,
) -> Result<TimeSeries, EstimateError> {
    #[expect(
        clippy::cast_precision_loss,
        reason = "threads per core is a small integer"
    )]
    let threads = topology.threads_per_core() as f64;
    let ref_tsc = core.sum(Counter::UnhaltedRefTsc)?;
    let nominal = topology.nominal_frequency();
    Ok(ref_tsc.map(|cycles| cycles / threads / nominal))
}

/// Measured IPC at maximum thread density.
///
/// At each interval in `positions`, divides the core's summed instructions
/// by the first logical core's unhalted cycles. All other intervals are 0.
///
/// # Errors
///
/// Fails when a position lies past the end of the series, or when the
/// unhalted-cycle column is missing or misaligned.
pub fn real_ipc_at_max_td(
    core: &CoreView<'_>,
    instructions: &TimeSeries,
    positions: &[usize],
) -> Result<TimeSeries, EstimateError> {
    let thread = core.first(Counter::UnhaltedThread)?;
    if thread.len() != instructions.len() {
        return Err(EstimateError::length_mismatch(
            Counter::UnhaltedThread.column(core.first_logical()),
            LengthMismatch {
                expected: instructions.len(),
                found: thread.len(),
            },
        ));
    }

    let intervals = instructions.len();
    let mut samples = vec![0.0; intervals];
    for &interval in positions {
        if interval >= intervals {
            return Err(EstimateError::new(EstimateErrorKind::WindowOutOfRange {
                interval,
                intervals,
            }));
        }
        samples[interval] = instructions[interval] / thread[interval];
    }
    Ok(TimeSeries::new(samples))
}

/// Operating frequency of the core:
/// `Σ thread / Σ ref_tsc * nominal_frequency`.
///
/// Equal to the ratio of the per-logical-core means, since both sums run
/// over the same logical cores.
///
/// # Errors
///
/// Fails when a cycle column is missing or misaligned.
pub fn mean_frequency(
    core: &CoreView<'_>,
    topology: &Topology,
) -> Result<TimeSeries, EstimateError> {
    let thread = core.sum(Counter::UnhaltedThread)?;
    let ref_tsc = core.sum(Counter::UnhaltedRefTsc)?;
    let nominal = topology.nominal_frequency();
    thread
        .zip_map(&ref_tsc, |thread, ref_tsc| thread / ref_tsc * nominal)
        .map_err(|mismatch| {
            EstimateError::length_mismatch(
                Counter::UnhaltedRefTsc.column(core.first_logical()),
                mismatch,
            )
        })
}
