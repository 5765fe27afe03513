//! The `LRModel.csv` report.
//!
//! One row per interval, one column per metric. Run-level results come
//! first, then the system means, then the per-core estimated and measured
//! IPC. Scalar columns are repeated on every row; cells past the end of a
//! shorter series are left empty.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use htmodel_schemas::{RUN_COLUMNS, Table, TimeSeries};
use indexmap::IndexMap;
use itertools::Itertools;
use tracing::{debug_span, info};

use crate::Estimate;
use crate::error::EstimateError;

/// File name of the exported report inside `<output_dir>/<test_name>/`.
pub const REPORT_FILE_NAME: &str = "LRModel.csv";

const SEPARATOR: &str = ";";

/// A report column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// One value per row.
    Series(TimeSeries),
    /// The same value on every row.
    Scalar(f64),
}

impl Column {
    fn len(&self) -> usize {
        match self {
            Column::Series(series) => series.len(),
            Column::Scalar(_) => 0,
        }
    }

    fn cell(&self, row: usize) -> Option<f64> {
        match self {
            Column::Series(series) => series.get(row),
            Column::Scalar(value) => Some(*value),
        }
    }
}

/// An ordered set of named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    columns: IndexMap<String, Column>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the report of `estimate`, joining the run-level columns of
    /// `runs` by row position.
    ///
    /// # Errors
    ///
    /// Fails when `runs` lacks one of [`RUN_COLUMNS`].
    pub fn from_estimate(
        estimate: &Estimate,
        runs: &Table,
    ) -> Result<Self, EstimateError> {
        let mut report = Self::new();

        for name in RUN_COLUMNS {
            let series = runs
                .column(name)
                .ok_or_else(|| EstimateError::missing_column(name))?;
            report.push(name, Column::Series(series.clone()));
        }

        let density = estimate.max_density();
        let system = &estimate.system;
        report.push("Sys_mean_productivity", system.productivity.clone().into());
        report.push("Sys_mean_atd", system.atd.clone().into());
        report.push("Sys_mean_cbt", system.cbt.clone().into());
        report.push("Sys_mean_FREQ", system.frequency.clone().into());
        report.push("Sys_mean_IPC", system.real_ipc.clone().into());
        report.push(
            format!("Sys_mean_estimated_IPC_TD{density}"),
            Column::Scalar(system.estimated_ipc),
        );

        for (key, core) in &estimate.per_core {
            let model = &core.fit.model;
            report.push(
                format!("{key}-EST-IPC-TD1"),
                Column::Scalar(model.ipc_td1()),
            );
            if let Some(ipc_td2) = model.ipc_td2() {
                report.push(format!("{key}-EST-IPC-TD2"), Column::Scalar(ipc_td2));
            }
            report.push(
                format!("{key}-REAL-IPC-TD{density}"),
                core.real_ipc.clone().into(),
            );
        }

        Ok(report)
    }

    /// Appends a column, replacing any earlier column of the same name in
    /// place.
    pub fn push(&mut self, name: impl Into<String>, column: Column) {
        self.columns.insert(name.into(), column);
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Number of rows: the longest series column.
    pub fn row_count(&self) -> usize {
        self.columns.values().map(Column::len).max().unwrap_or(0)
    }

    /// Writes the report as `;`-separated text with a leading index column.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub fn write_csv(&self, mut w: impl Write) -> std::io::Result<()> {
        let header = std::iter::once("").chain(self.column_names()).join(SEPARATOR);
        writeln!(w, "{header}")?;

        for row in 0..self.row_count() {
            let cells = self
                .columns
                .values()
                .map(|column| column.cell(row).map(format_cell).unwrap_or_default())
                .join(SEPARATOR);
            writeln!(w, "{row}{SEPARATOR}{cells}")?;
        }
        Ok(())
    }

    /// Writes the report to `<output_dir>/<test_name>/LRModel.csv`, creating
    /// the directory if needed, and returns the file path.
    ///
    /// # Errors
    ///
    /// Fails when the directory cannot be created or the file written.
    pub fn export(
        &self,
        output_dir: &Path,
        test_name: &str,
    ) -> Result<PathBuf, EstimateError> {
        let _span = debug_span!("export", test_name).entered();

        let dir = output_dir.join(test_name);
        fs::create_dir_all(&dir)?;
        let path = dir.join(REPORT_FILE_NAME);

        let mut w = BufWriter::new(File::create(&path)?);
        self.write_csv(&mut w)?;
        w.flush()?;

        info!(path = %path.display(), rows = self.row_count(), "wrote report");
        Ok(path)
    }
}

impl From<TimeSeries> for Column {
    fn from(series: TimeSeries) -> Self {
        Column::Series(series)
    }
}

/// Shortest round-trip formatting; non-finite values print as `NaN`, `inf`
/// and `-inf`.
fn format_cell(value: f64) -> String {
    value.to_string()
}
