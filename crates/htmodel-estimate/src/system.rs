//! System-wide means across physical cores.

use htmodel_schemas::{LengthMismatch, TimeSeries};

/// Element-wise mean of per-core series: the sum of all series divided by
/// `core_count`.
///
/// `core_count` is the topology's physical core count, not the number of
/// series yielded. An empty iterator gives an empty series.
///
/// # Errors
///
/// Returns [`LengthMismatch`] when the series differ in length.
pub fn system_mean<'a>(
    series: impl IntoIterator<Item = &'a TimeSeries>,
    core_count: usize,
) -> Result<TimeSeries, LengthMismatch> {
    let mut series = series.into_iter();
    let Some(first) = series.next() else {
        return Ok(TimeSeries::default());
    };
    let total = series.try_fold(first.clone(), |total, next| total.try_add(next))?;
    #[expect(
        clippy::cast_precision_loss,
        reason = "physical core counts are far below 2^52"
    )]
    let n = core_count as f64;
    Ok(total.map(|sum| sum / n))
}

/// Mean of one scalar per physical core.
pub fn scalar_mean(values: impl IntoIterator<Item = f64>, core_count: usize) -> f64 {
    #[expect(
        clippy::cast_precision_loss,
        reason = "physical core counts are far below 2^52"
    )]
    let n = core_count as f64;
    values.into_iter().sum::<f64>() / n
}
