//! System-under-test configuration loaded from TOML.
//!
//! ```toml
//! output_dir = "results"
//!
//! [topology]
//! sockets = 1
//! physical_cores_per_socket = 2
//! threads_per_core = 2
//! ht_active = true
//! nominal_frequency = 2.4e9
//! actual_max_frequency = 3.1e9
//!
//! [[topology.cores]]
//! socket = 0
//! core = 0
//! logical = [0, 2]
//!
//! [[topology.cores]]
//! socket = 0
//! core = 1
//! logical = [1, 3]
//!
//! [run_window]
//! start_run = 1
//! end_run = 3
//! num_test_blocks = 2
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Topology;

/// Default distance, in intervals, between repeated test blocks.
pub const DEFAULT_BLOCK_STRIDE: usize = 10;

/// Selects the intervals at which real IPC at maximum thread density is
/// measured.
///
/// Runs are 1-based and `end_run` is exclusive: the selected intervals are
/// `r + block_stride * k` for `r in start_run-1 .. end_run-1` and
/// `k in 0 .. num_test_blocks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunWindow {
    pub start_run: usize,
    pub end_run: usize,
    pub num_test_blocks: usize,
    #[serde(default = "default_block_stride")]
    pub block_stride: usize,
}

fn default_block_stride() -> usize {
    DEFAULT_BLOCK_STRIDE
}

impl RunWindow {
    pub fn new(start_run: usize, end_run: usize, num_test_blocks: usize) -> Self {
        Self {
            start_run,
            end_run,
            num_test_blocks,
            block_stride: DEFAULT_BLOCK_STRIDE,
        }
    }

    /// Absolute interval indices covered by the window, sorted ascending.
    ///
    /// `start_run = 0` is treated like `1`. An empty range yields no
    /// positions.
    pub fn positions(&self) -> Vec<usize> {
        let first = self.start_run.saturating_sub(1);
        let last = self.end_run.saturating_sub(1);
        let mut positions: Vec<usize> = (first..last)
            .flat_map(|run| {
                (0..self.num_test_blocks)
                    .map(move |block| run + self.block_stride * block)
            })
            .collect();
        positions.sort_unstable();
        positions
    }
}

/// Everything the estimator needs to know about the system under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SutConfig {
    /// Root directory for reports; each test writes to
    /// `<output_dir>/<test_name>/`.
    pub output_dir: PathBuf,
    pub topology: Topology,
    pub run_window: RunWindow,
}

/// Parses a `SutConfig` from TOML text.
///
/// # Errors
///
/// Returns `InvalidData` for malformed TOML or a topology that violates its
/// invariants.
pub fn parse_config(text: &str) -> std::io::Result<SutConfig> {
    toml::from_str(text)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Loads a `SutConfig` from a TOML file.
///
/// # Errors
///
/// Returns the underlying I/O error if the file cannot be read, or
/// `InvalidData` as described in [`parse_config`].
pub fn load_config(path: &Path) -> std::io::Result<SutConfig> {
    let text = std::fs::read_to_string(path)?;
    parse_config(&text)
}
