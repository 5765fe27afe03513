//! Input dataset: per-interval performance counters and per-run results.
//!
//! The JSON shape is
//!
//! ```json
//! {
//!   "perf-stats": { "mean": { "CPU0_instructions": [..], ... } },
//!   "runs": { "TotClients": [..], "XavgTot": [..], ... }
//! }
//! ```
//!
//! Tables are column-oriented. Perf-stats columns are interval-aligned; the
//! runs table is coarser and only joined positionally at export time.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::TimeSeries;

/// Hardware performance counters consumed by the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// `instructions`: instructions retired.
    Instructions,
    /// `cpu_clk_unhalted_thread`: cycles this hardware thread was unhalted.
    UnhaltedThread,
    /// `cpu_clk_unhalted_thread_any`: cycles any thread of the physical core
    /// was unhalted.
    UnhaltedThreadAny,
    /// `cpu_clk_unhalted_ref_tsc`: unhalted cycles at the reference (TSC)
    /// rate.
    UnhaltedRefTsc,
}

impl Counter {
    pub const ALL: [Self; 4] = [
        Self::Instructions,
        Self::UnhaltedThread,
        Self::UnhaltedThreadAny,
        Self::UnhaltedRefTsc,
    ];

    /// Counter suffix as it appears in column names.
    pub fn name(self) -> &'static str {
        match self {
            Self::Instructions => "instructions",
            Self::UnhaltedThread => "cpu_clk_unhalted_thread",
            Self::UnhaltedThreadAny => "cpu_clk_unhalted_thread_any",
            Self::UnhaltedRefTsc => "cpu_clk_unhalted_ref_tsc",
        }
    }

    /// Column name of this counter for logical core `logical`, e.g.
    /// `CPU3_instructions`.
    pub fn column(self, logical: usize) -> String {
        format!("CPU{logical}_{}", self.name())
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run-level result columns carried into the report, in export order.
pub const RUN_COLUMNS: [&str; 4] = ["TotClients", "XavgTot", "UavgTot", "RavgTot"];

/// A column-oriented table of named series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    columns: BTreeMap<String, TimeSeries>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, series: TimeSeries) {
        self.columns.insert(name.into(), series);
    }

    pub fn column(&self, name: &str) -> Option<&TimeSeries> {
        self.columns.get(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Number of rows, taken as the longest column.
    pub fn row_count(&self) -> usize {
        self.columns.values().map(TimeSeries::len).max().unwrap_or(0)
    }
}

impl<S: Into<String>> FromIterator<(S, TimeSeries)> for Table {
    fn from_iter<I: IntoIterator<Item = (S, TimeSeries)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Aggregated per-interval counter statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerfStats {
    /// Mean counter value per interval.
    pub mean: Table,
}

/// A complete, already-aggregated experiment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(rename = "perf-stats")]
    pub perf_stats: PerfStats,
    #[serde(default)]
    pub runs: Table,
}

impl Dataset {
    /// Per-interval counter table.
    pub fn counters(&self) -> &Table {
        &self.perf_stats.mean
    }

    /// Number of measurement intervals.
    pub fn interval_count(&self) -> usize {
        self.perf_stats.mean.row_count()
    }
}

/// Reads a `Dataset` from JSON.
///
/// # Errors
///
/// Returns the underlying I/O error, or `InvalidData` for malformed JSON.
pub fn read_dataset(mut input: impl Read) -> std::io::Result<Dataset> {
    let mut json = String::new();
    input.read_to_string(&mut json)?;
    serde_json::from_str(&json)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Loads a `Dataset` from a JSON file.
///
/// # Errors
///
/// See [`read_dataset`].
pub fn load_dataset(path: &Path) -> std::io::Result<Dataset> {
    let file = std::fs::File::open(path)?;
    read_dataset(std::io::BufReader::new(file))
}
