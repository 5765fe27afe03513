//! Per-core IPC regression.
//!
//! Fits retired instructions against the thread-density cycle series with
//! the intercept forced to zero. The regime of the resulting [`IpcModel`]
//! follows the decomposition: one regressor without a density-2 series,
//! two with one.

use htmodel_regress::{fit_one_var, fit_two_var};
use htmodel_schemas::{CoreFit, IpcModel, TimeSeries};

use crate::density::Decomposition;

/// Fits the IPC model of one physical core.
///
/// Rows are intervals. Fewer intervals than regressors, or collinear
/// regressors, are not rejected; see [`htmodel_regress`] for how they
/// resolve. Series are zipped, so callers must pass aligned series.
pub fn fit(instructions: &TimeSeries, density: &Decomposition) -> CoreFit {
    match &density.td2 {
        None => {
            let data: Vec<(f64, f64)> = density
                .td1
                .iter()
                .zip(instructions)
                .map(|(&td1, &instr)| (td1, instr))
                .collect();
            let fit = fit_one_var(&data);
            CoreFit {
                model: IpcModel::SingleRegime {
                    ipc_td1: fit.model.a,
                },
                r_squared: fit.r_squared,
                rank_deficient: fit.rank_deficient,
            }
        }
        Some(td2) => {
            let data: Vec<(f64, f64, f64)> = density
                .td1
                .iter()
                .zip(td2)
                .zip(instructions)
                .map(|((&td1, &td2), &instr)| (td1, td2, instr))
                .collect();
            let fit = fit_two_var(&data);
            CoreFit {
                model: IpcModel::DualRegime {
                    ipc_td1: fit.model.a,
                    ipc_td2: fit.model.b,
                },
                r_squared: fit.r_squared,
                rank_deficient: fit.rank_deficient,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn single_regime_without_td2() {
        let td1 = TimeSeries::new(vec![1.0e9, 2.0e9, 1.5e9, 0.0]);
        let instructions = td1.scale(2.0);
        let density = Decomposition {
            td1: td1.clone(),
            td2: None,
            thread_any: td1,
        };
        let fit = fit(&instructions, &density);
        let IpcModel::SingleRegime { ipc_td1 } = fit.model else {
            panic!("expected a single-regime model, got {:?}", fit.model);
        };
        assert!(close(ipc_td1, 2.0));
        assert_eq!(fit.model.coefficients().len(), 1);
        assert_eq!(fit.model.predict(0.0, 0.0), 0.0);
    }

    #[test]
    fn dual_regime_with_td2() {
        let td1 = TimeSeries::new(vec![4.0e8, 1.0e9, 2.0e8, 7.5e8, 3.3e8]);
        let td2 = TimeSeries::new(vec![1.0e9, 2.0e8, 8.0e8, 5.0e8, 1.2e9]);
        let instructions = td1.zip_map(&td2, |a, b| 3.0 * a + 5.0 * b).unwrap();
        let density = Decomposition {
            thread_any: td1.try_add(&td2).unwrap(),
            td1,
            td2: Some(td2),
        };
        let fit = fit(&instructions, &density);
        assert!(close(fit.model.ipc_td1(), 3.0));
        assert!(close(fit.model.ipc_td2().unwrap(), 5.0));
        assert!(!fit.rank_deficient);
        assert!(close(fit.r_squared, 1.0));
    }

    #[test]
    fn idle_smt_sibling_reduces_to_td1_slope() {
        let td1 = TimeSeries::new(vec![1.0, 2.0, 3.0]);
        let td2 = TimeSeries::zeros(3);
        let instructions = td1.scale(1.25);
        let density = Decomposition {
            thread_any: td1.clone(),
            td1,
            td2: Some(td2),
        };
        let fit = fit(&instructions, &density);
        assert!(fit.rank_deficient);
        assert!(close(fit.model.ipc_td1(), 1.25));
        assert_eq!(fit.model.ipc_td2(), Some(0.0));
    }
}
