//! Regression-based IPC estimation for SMT processors.
//!
//! This crate maps per-logical-core performance counters onto per-physical-
//! core IPC models and derives productivity metrics from them. It is the
//! core of the htmodel pipeline; reading configuration and datasets lives in
//! `htmodel_schemas`.
//!
//! ## Pipeline
//!
//! For every physical core of the [`Topology`](htmodel_schemas::Topology):
//!
//! 1. **Aggregate** instructions across the core's logical cores
//!    ([`aggregate`])
//! 2. **Decompose** unhalted cycles into thread-density 1 and 2 time
//!    ([`density`])
//! 3. **Fit** `instructions ≈ ipc_td1 · td1 + ipc_td2 · td2` without an
//!    intercept ([`regression`])
//! 4. **Derive** instr_max, productivity, average thread density, core busy
//!    time, real IPC at maximum density and frequency ([`metrics`])
//!
//! The per-core series are then averaged over all physical cores
//! ([`system`]) and written to `LRModel.csv` ([`Report`]).
//!
//! ## Usage
//!
//! ```no_run
//! use htmodel_estimate::Estimator;
//! use htmodel_schemas::{load_config, load_dataset};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sut.toml")).unwrap();
//! let dataset = load_dataset(Path::new("experiment.json")).unwrap();
//! let estimate = Estimator::new(&config).estimate(&dataset, "baseline").unwrap();
//! estimate.write_summary(std::io::stdout().lock()).unwrap();
//! ```

pub mod aggregate;
pub mod density;
mod error;
pub mod metrics;
pub mod regression;
mod report;
pub mod system;

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use htmodel_schemas::{
    CoreFit, Counter, Dataset, IpcModels, LengthMismatch, PhysicalCoreKey,
    SutConfig, Table, TimeSeries,
};
use tracing::{debug, debug_span, warn};

use crate::aggregate::CoreView;
use crate::density::Decomposition;
#[doc(inline)]
pub use crate::error::EstimateError;
use crate::error::EstimateErrorKind;
#[doc(inline)]
pub use crate::report::{Column, REPORT_FILE_NAME, Report};

/// Runs the estimation pipeline for one system under test.
///
/// Holds nothing but the configuration; every call recomputes from the
/// dataset it is given.
#[derive(Debug, Clone, Copy)]
pub struct Estimator<'a> {
    config: &'a SutConfig,
}

/// Everything derived for one physical core.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreEstimate {
    /// Retired instructions summed over the core's logical cores.
    pub instructions: TimeSeries,
    pub density: Decomposition,
    pub fit: CoreFit,
    pub instr_max: f64,
    pub productivity: TimeSeries,
    /// Average thread density.
    pub atd: TimeSeries,
    /// Core busy time.
    pub cbt: TimeSeries,
    /// Measured IPC at maximum thread density inside the run window.
    pub real_ipc: TimeSeries,
    pub frequency: TimeSeries,
}

/// Per-interval means over all physical cores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemMeans {
    pub productivity: TimeSeries,
    pub atd: TimeSeries,
    pub cbt: TimeSeries,
    pub frequency: TimeSeries,
    pub real_ipc: TimeSeries,
    /// Mean of every core's peak-regime IPC coefficient.
    pub estimated_ipc: f64,
}

/// The result of one [`Estimator::estimate`] invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub test_name: String,
    pub ht_active: bool,
    pub per_core: BTreeMap<PhysicalCoreKey, CoreEstimate>,
    pub system: SystemMeans,
}

impl<'a> Estimator<'a> {
    pub fn new(config: &'a SutConfig) -> Self {
        Self { config }
    }

    /// Computes every per-core and system-wide metric without writing
    /// anything.
    ///
    /// # Errors
    ///
    /// Fails on a missing or misaligned counter column, or when the run
    /// window reaches past the last interval.
    pub fn compute(
        &self,
        dataset: &Dataset,
        test_name: &str,
    ) -> Result<Estimate, EstimateError> {
        let _span = debug_span!("estimate", test_name).entered();

        let topology = &self.config.topology;
        let ht_active = topology.ht_active();
        let positions = self.config.run_window.positions();

        let mut per_core = BTreeMap::new();
        for core in CoreView::all(dataset, topology) {
            let _span = debug_span!("core", core = %core.key()).entered();

            let instructions = {
                let _span = debug_span!("aggregate").entered();
                core.sum(Counter::Instructions)?
            };

            let density = {
                let _span = debug_span!("decompose").entered();
                density::decompose(&core, ht_active)?
            };
            check_aligned(&core, &instructions, &density)?;

            let fit = {
                let _span = debug_span!("fit").entered();
                regression::fit(&instructions, &density)
            };
            debug!(
                core = %core.key(),
                coefficients = ?fit.model.coefficients(),
                r_squared = fit.r_squared,
                "fitted IPC model"
            );
            if fit.rank_deficient {
                warn!(
                    core = %core.key(),
                    "rank-deficient fit; using the minimum-norm solution"
                );
            }

            let estimate = {
                let _span = debug_span!("derive").entered();
                let instr_max = metrics::instr_max(&fit.model, topology);
                CoreEstimate {
                    productivity: metrics::productivity(&instructions, instr_max),
                    atd: metrics::average_thread_density(&density)?,
                    cbt: metrics::core_busy_time(&core, topology)?,
                    real_ipc: metrics::real_ipc_at_max_td(
                        &core,
                        &instructions,
                        &positions,
                    )?,
                    frequency: metrics::mean_frequency(&core, topology)?,
                    instr_max,
                    fit,
                    density,
                    instructions,
                }
            };
            per_core.insert(core.key(), estimate);
        }

        let system = {
            let _span = debug_span!("system").entered();
            system_means(&per_core, topology.physical_core_count())?
        };

        Ok(Estimate {
            test_name: test_name.to_owned(),
            ht_active,
            per_core,
            system,
        })
    }

    /// Computes the estimate and exports its report to
    /// `<output_dir>/<test_name>/LRModel.csv`.
    ///
    /// # Errors
    ///
    /// See [`Estimator::compute`] and [`Estimate::export`].
    pub fn estimate(
        &self,
        dataset: &Dataset,
        test_name: &str,
    ) -> Result<Estimate, EstimateError> {
        let estimate = self.compute(dataset, test_name)?;
        estimate.export(&self.config.output_dir, &dataset.runs)?;
        Ok(estimate)
    }
}

impl Estimate {
    /// The highest thread density modelled: 2 with SMT, 1 without.
    pub fn max_density(&self) -> u8 {
        if self.ht_active { 2 } else { 1 }
    }

    /// The fitted models, in a form that can be persisted.
    pub fn models(&self) -> IpcModels {
        IpcModels {
            test_name: self.test_name.clone(),
            cores: self
                .per_core
                .iter()
                .map(|(&key, core)| (key, core.fit))
                .collect(),
        }
    }

    /// Builds the `LRModel.csv` table.
    ///
    /// # Errors
    ///
    /// See [`Report::from_estimate`].
    pub fn report(&self, runs: &Table) -> Result<Report, EstimateError> {
        Report::from_estimate(self, runs)
    }

    /// Writes the report under `output_dir` and returns its path.
    ///
    /// # Errors
    ///
    /// Fails when a run column is missing or the report cannot be written.
    pub fn export(
        &self,
        output_dir: &Path,
        runs: &Table,
    ) -> Result<PathBuf, EstimateError> {
        self.report(runs)?.export(output_dir, &self.test_name)
    }

    /// Writes a human-readable summary of the fitted models and the overall
    /// means of the system series.
    pub fn write_summary(&self, mut w: impl Write) -> std::io::Result<()> {
        let density = self.max_density();
        writeln!(w, "Test:            {}", self.test_name)?;
        writeln!(
            w,
            "SMT:             {}",
            if self.ht_active { "active" } else { "inactive" }
        )?;
        writeln!(w, "Physical cores:  {}", self.per_core.len())?;

        let header = format!(
            "{:<10}  {:>10}  {:>10}  {:>8}  {:>14}",
            "Core", "IPC TD1", "IPC TD2", "R²", "instr_max"
        );
        writeln!(w, "\n{header}")?;
        writeln!(w, "{}", "-".repeat(header.chars().count()))?;
        for (key, core) in &self.per_core {
            let model = &core.fit.model;
            let td2 = model
                .ipc_td2()
                .map_or_else(|| "-".to_owned(), |ipc| format!("{ipc:.4}"));
            writeln!(
                w,
                "{:<10}  {:>10.4}  {:>10}  {:>8.4}  {:>14.4e}",
                key.to_string(),
                model.ipc_td1(),
                td2,
                core.fit.r_squared,
                core.instr_max,
            )?;
        }

        let system = &self.system;
        writeln!(w, "\nSystem means:")?;
        writeln!(w, "  productivity:          {:.4}", system.productivity.mean())?;
        writeln!(w, "  avg thread density:    {:.4}", system.atd.mean())?;
        writeln!(w, "  core busy time:        {:.4}", system.cbt.mean())?;
        writeln!(w, "  frequency:             {:.4e}", system.frequency.mean())?;
        writeln!(w, "  real IPC TD{density}:          {:.4}", system.real_ipc.mean())?;
        writeln!(w, "  estimated IPC TD{density}:     {:.4}", system.estimated_ipc)?;
        Ok(())
    }
}

/// Reads a JSON dataset from `input` and computes its estimate, without
/// exporting.
///
/// # Errors
///
/// Returns [`EstimateError`] if:
/// - Reading from input fails ([`EstimateError::is_io`])
/// - The input is not a valid dataset ([`EstimateError::is_deserialization`])
/// - The computation fails (see [`Estimator::compute`])
pub fn run(
    mut input: impl Read,
    config: &SutConfig,
    test_name: &str,
) -> Result<Estimate, EstimateError> {
    let _span = debug_span!("run").entered();

    let mut json = String::new();
    input.read_to_string(&mut json)?;
    let dataset: Dataset = serde_json::from_str(&json)
        .map_err(|e| EstimateError::new(EstimateErrorKind::Deserialization(e)))?;

    Estimator::new(config).compute(&dataset, test_name)
}

/// Writes `models` as pretty JSON followed by a newline.
///
/// # Errors
///
/// Fails when serialization or the write fails.
pub fn write_models(
    models: &IpcModels,
    mut output: impl Write,
) -> Result<(), EstimateError> {
    serde_json::to_writer_pretty(&mut output, models)
        .map_err(|e| EstimateError::new(EstimateErrorKind::Serialization(e)))?;
    writeln!(output)?;
    Ok(())
}

/// Instructions and cycle series of one core must cover the same intervals.
fn check_aligned(
    core: &CoreView<'_>,
    instructions: &TimeSeries,
    density: &Decomposition,
) -> Result<(), EstimateError> {
    let expected = density.thread_any.len();
    let found = instructions.len();
    if found == expected {
        return Ok(());
    }
    Err(EstimateError::length_mismatch(
        Counter::Instructions.column(core.first_logical()),
        LengthMismatch { expected, found },
    ))
}

fn system_means(
    per_core: &BTreeMap<PhysicalCoreKey, CoreEstimate>,
    core_count: usize,
) -> Result<SystemMeans, EstimateError> {
    let mean = |name: &str, pick: fn(&CoreEstimate) -> &TimeSeries| {
        system::system_mean(per_core.values().map(pick), core_count)
            .map_err(|mismatch| EstimateError::length_mismatch(name, mismatch))
    };
    Ok(SystemMeans {
        productivity: mean("Sys_mean_productivity", |c| &c.productivity)?,
        atd: mean("Sys_mean_atd", |c| &c.atd)?,
        cbt: mean("Sys_mean_cbt", |c| &c.cbt)?,
        frequency: mean("Sys_mean_FREQ", |c| &c.frequency)?,
        real_ipc: mean("Sys_mean_IPC", |c| &c.real_ipc)?,
        estimated_ipc: system::scalar_mean(
            per_core.values().map(|c| c.fit.model.peak_ipc()),
            core_count,
        ),
    })
}
