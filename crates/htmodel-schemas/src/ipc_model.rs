//! Fitted per-core IPC models.
//!
//! An `IpcModel` stores the no-intercept regression coefficients relating
//! retired instructions to unhalted cycles spent at each thread density:
//!
//! ```text
//! instructions = ipc_td1 * td1                     (SMT inactive)
//! instructions = ipc_td1 * td1 + ipc_td2 * td2     (SMT active)
//! ```
//!
//! The regime is part of the type, so consumers match on it instead of
//! indexing a coefficient array by the SMT flag.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::PhysicalCoreKey;

/// Thread-density regime of a physical core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    /// One hardware thread active.
    Td1,
    /// Two hardware threads active.
    Td2,
}

impl Regime {
    /// Number of active threads in this regime.
    pub fn density(self) -> u8 {
        match self {
            Self::Td1 => 1,
            Self::Td2 => 2,
        }
    }
}

/// Regression model of one physical core.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "regime", rename_all = "snake_case")]
pub enum IpcModel {
    /// SMT inactive: only the single-thread regime exists.
    SingleRegime {
        /// Instructions per unhalted cycle at thread density 1.
        ipc_td1: f64,
    },
    /// SMT active: one coefficient per thread density.
    DualRegime {
        /// Instructions per cycle spent with exactly one thread active.
        ipc_td1: f64,
        /// Instructions per cycle spent with both threads active.
        ipc_td2: f64,
    },
}

impl IpcModel {
    /// The highest thread density this model covers.
    pub fn max_regime(&self) -> Regime {
        match self {
            Self::SingleRegime { .. } => Regime::Td1,
            Self::DualRegime { .. } => Regime::Td2,
        }
    }

    /// Coefficient of the regime matching the SMT state: `ipc_td2` for a
    /// dual-regime model, `ipc_td1` otherwise.
    pub fn peak_ipc(&self) -> f64 {
        match *self {
            Self::SingleRegime { ipc_td1 } => ipc_td1,
            Self::DualRegime { ipc_td2, .. } => ipc_td2,
        }
    }

    pub fn ipc_td1(&self) -> f64 {
        match *self {
            Self::SingleRegime { ipc_td1 } | Self::DualRegime { ipc_td1, .. } => {
                ipc_td1
            }
        }
    }

    /// `None` for a single-regime model.
    pub fn ipc_td2(&self) -> Option<f64> {
        match *self {
            Self::SingleRegime { .. } => None,
            Self::DualRegime { ipc_td2, .. } => Some(ipc_td2),
        }
    }

    /// Coefficients in regime order (`td1`, then `td2` if present).
    pub fn coefficients(&self) -> Vec<f64> {
        match *self {
            Self::SingleRegime { ipc_td1 } => vec![ipc_td1],
            Self::DualRegime { ipc_td1, ipc_td2 } => vec![ipc_td1, ipc_td2],
        }
    }

    /// Predicted instructions for the given cycle counts. `td2` is ignored
    /// by a single-regime model.
    pub fn predict(&self, td1: f64, td2: f64) -> f64 {
        match *self {
            Self::SingleRegime { ipc_td1 } => ipc_td1 * td1,
            Self::DualRegime { ipc_td1, ipc_td2 } => ipc_td1 * td1 + ipc_td2 * td2,
        }
    }
}

/// A fitted model plus its goodness of fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoreFit {
    pub model: IpcModel,
    /// No-intercept R² (`1 - SS_res / Σy²`).
    pub r_squared: f64,
    /// Whether the design matrix was singular and the minimum-norm
    /// solution was used.
    pub rank_deficient: bool,
}

/// Persisted models of a whole machine, keyed by physical core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpcModels {
    pub test_name: String,
    #[serde(with = "core_entries")]
    pub cores: BTreeMap<PhysicalCoreKey, CoreFit>,
}

/// JSON objects need string keys, so the map is stored as a list of
/// `{ socket, core, fit }` entries.
mod core_entries {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::{CoreFit, PhysicalCoreKey};

    #[derive(Serialize, Deserialize)]
    struct Entry {
        #[serde(flatten)]
        key: PhysicalCoreKey,
        fit: CoreFit,
    }

    pub fn serialize<S: Serializer>(
        cores: &BTreeMap<PhysicalCoreKey, CoreFit>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let entries: Vec<Entry> = cores
            .iter()
            .map(|(&key, &fit)| Entry { key, fit })
            .collect();
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<PhysicalCoreKey, CoreFit>, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        Ok(entries.into_iter().map(|e| (e.key, e.fit)).collect())
    }
}

/// Loads persisted `IpcModels` from a JSON file.
///
/// # Errors
///
/// Returns the underlying I/O error, or `InvalidData` for malformed JSON.
pub fn load_ipc_models(path: &Path) -> std::io::Result<IpcModels> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::testutil::arb_ipc_model;

    #[test]
    fn peak_ipc_matches_regime() {
        let single = IpcModel::SingleRegime { ipc_td1: 1.5 };
        let dual = IpcModel::DualRegime {
            ipc_td1: 1.5,
            ipc_td2: 2.5,
        };
        assert_eq!(single.peak_ipc(), 1.5);
        assert_eq!(dual.peak_ipc(), 2.5);
        assert_eq!(single.max_regime().density(), 1);
        assert_eq!(dual.max_regime().density(), 2);
        assert_eq!(single.ipc_td2(), None);
        assert_eq!(dual.coefficients(), vec![1.5, 2.5]);
    }

    #[test]
    fn predict_through_origin() {
        let dual = IpcModel::DualRegime {
            ipc_td1: 3.0,
            ipc_td2: 5.0,
        };
        assert_eq!(dual.predict(0.0, 0.0), 0.0);
        assert_eq!(dual.predict(2.0, 1.0), 11.0);
        let single = IpcModel::SingleRegime { ipc_td1: 2.0 };
        assert_eq!(single.predict(4.0, 100.0), 8.0);
    }

    #[test]
    fn model_json_is_tagged() {
        let json =
            serde_json::to_string(&IpcModel::SingleRegime { ipc_td1: 1.0 })
                .unwrap();
        assert_eq!(json, r#"{"regime":"single_regime","ipc_td1":1.0}"#);
    }

    #[test]
    fn load_ipc_models_from_file() {
        let mut models = IpcModels {
            test_name: "t".into(),
            ..IpcModels::default()
        };
        models.cores.insert(
            PhysicalCoreKey::new(1, 0),
            CoreFit {
                model: IpcModel::DualRegime {
                    ipc_td1: 1.0,
                    ipc_td2: 0.75,
                },
                r_squared: 0.99,
                rank_deficient: false,
            },
        );
        let file = tempfile::NamedTempFile::new().unwrap();
        serde_json::to_writer(file.as_file(), &models).unwrap();
        assert_eq!(load_ipc_models(file.path()).unwrap(), models);
    }

    proptest! {
        #[test]
        fn models_survive_json(model in arb_ipc_model()) {
            let json = serde_json::to_string(&model).unwrap();
            let parsed: IpcModel = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(parsed, model);
        }
    }
}
