//! System-under-test topology: sockets, physical cores, logical cores.
//!
//! The hierarchy is strictly rectangular: every socket has the same number
//! of physical cores and every physical core exposes the same number of
//! hardware threads. Logical-core membership is resolved per
//! [`PhysicalCoreKey`], so two sockets never share a mapping by accident.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one physical core as `(socket, core)`.
///
/// Ordering is lexicographic on `(socket, core)`, which is the iteration
/// order of every per-core map in the pipeline and the column order of the
/// exported report.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
pub struct PhysicalCoreKey {
    /// Socket index, zero-based.
    pub socket: usize,
    /// Core index within the socket, zero-based.
    pub core: usize,
}

impl PhysicalCoreKey {
    pub fn new(socket: usize, core: usize) -> Self {
        Self { socket, core }
    }
}

impl fmt::Display for PhysicalCoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}-C{}", self.socket, self.core)
    }
}

/// Logical cores of one physical core, as listed in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreMapping {
    pub socket: usize,
    pub core: usize,
    /// Logical core ids (the `N` in `CPU<N>_<counter>` columns). The first
    /// entry is the one whose `thread_any` counter represents the core.
    pub logical: Vec<usize>,
}

/// Immutable description of the machine the counters were collected on.
///
/// Deserialized from the `[topology]` table of the configuration file. When
/// the `cores` list is omitted the Linux-style enumeration from
/// [`Topology::uniform`] is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTopology", into = "RawTopology")]
pub struct Topology {
    sockets: usize,
    physical_cores_per_socket: usize,
    threads_per_core: usize,
    ht_active: bool,
    nominal_frequency: f64,
    actual_max_frequency: f64,
    logical: BTreeMap<PhysicalCoreKey, Vec<usize>>,
}

impl Topology {
    /// Builds a topology with the usual Linux enumeration: logical id
    /// `thread * total_physical + socket * cores_per_socket + core`.
    ///
    /// With 1 socket, 2 cores and 2 threads this yields `S0-C0 = [0, 2]`
    /// and `S0-C1 = [1, 3]`.
    ///
    /// # Errors
    ///
    /// Returns a description of the violated invariant (see
    /// [`Topology::with_mapping`]).
    pub fn uniform(
        sockets: usize,
        physical_cores_per_socket: usize,
        threads_per_core: usize,
        ht_active: bool,
        nominal_frequency: f64,
        actual_max_frequency: f64,
    ) -> Result<Self, String> {
        let total = sockets * physical_cores_per_socket;
        let cores = (0..sockets)
            .flat_map(|socket| {
                (0..physical_cores_per_socket).map(move |core| CoreMapping {
                    socket,
                    core,
                    logical: (0..threads_per_core)
                        .map(|thread| {
                            thread * total
                                + socket * physical_cores_per_socket
                                + core
                        })
                        .collect(),
                })
            })
            .collect();
        Self::with_mapping(
            sockets,
            physical_cores_per_socket,
            threads_per_core,
            ht_active,
            nominal_frequency,
            actual_max_frequency,
            cores,
        )
    }

    /// Builds a topology from an explicit physical-to-logical mapping.
    ///
    /// # Errors
    ///
    /// Fails when a socket/core is missing, duplicated or out of range, when
    /// a core does not list exactly `threads_per_core` logical cores, when a
    /// logical core belongs to two physical cores, when SMT is active with
    /// anything other than two threads per core, or when a frequency is not
    /// a positive finite number.
    #[expect(
        clippy::too_many_arguments,
        reason = "mirrors the flat configuration table one-to-one"
    )]
    pub fn with_mapping(
        sockets: usize,
        physical_cores_per_socket: usize,
        threads_per_core: usize,
        ht_active: bool,
        nominal_frequency: f64,
        actual_max_frequency: f64,
        cores: Vec<CoreMapping>,
    ) -> Result<Self, String> {
        if sockets == 0 || physical_cores_per_socket == 0 {
            return Err("topology must have at least one physical core".into());
        }
        if threads_per_core == 0 {
            return Err("threads_per_core must be at least 1".into());
        }
        if ht_active && threads_per_core != 2 {
            return Err(format!(
                "ht_active requires threads_per_core = 2, got {threads_per_core}"
            ));
        }
        for (name, value) in [
            ("nominal_frequency", nominal_frequency),
            ("actual_max_frequency", actual_max_frequency),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("{name} must be positive, got {value}"));
            }
        }

        let mut logical = BTreeMap::new();
        let mut seen = HashSet::new();
        for mapping in cores {
            let key = PhysicalCoreKey::new(mapping.socket, mapping.core);
            if mapping.socket >= sockets
                || mapping.core >= physical_cores_per_socket
            {
                return Err(format!("{key} is outside the topology"));
            }
            if mapping.logical.len() != threads_per_core {
                return Err(format!(
                    "{key} lists {} logical cores, expected {threads_per_core}",
                    mapping.logical.len()
                ));
            }
            if let Some(dup) = mapping.logical.iter().find(|&&l| !seen.insert(l))
            {
                return Err(format!(
                    "logical core {dup} is assigned to more than one physical core"
                ));
            }
            if logical.insert(key, mapping.logical).is_some() {
                return Err(format!("{key} is listed more than once"));
            }
        }
        if logical.len() != sockets * physical_cores_per_socket {
            let missing = (0..sockets)
                .flat_map(|s| {
                    (0..physical_cores_per_socket)
                        .map(move |c| PhysicalCoreKey::new(s, c))
                })
                .find(|key| !logical.contains_key(key));
            if let Some(key) = missing {
                return Err(format!("no logical cores listed for {key}"));
            }
        }

        Ok(Self {
            sockets,
            physical_cores_per_socket,
            threads_per_core,
            ht_active,
            nominal_frequency,
            actual_max_frequency,
            logical,
        })
    }

    pub fn sockets(&self) -> usize {
        self.sockets
    }

    pub fn physical_cores_per_socket(&self) -> usize {
        self.physical_cores_per_socket
    }

    /// Total number of physical cores across all sockets.
    pub fn physical_core_count(&self) -> usize {
        self.sockets * self.physical_cores_per_socket
    }

    pub fn threads_per_core(&self) -> usize {
        self.threads_per_core
    }

    /// Whether SMT is enabled, i.e. whether the thread-density-2 regime
    /// exists.
    pub fn ht_active(&self) -> bool {
        self.ht_active
    }

    /// Nominal (TSC) frequency, in cycles per measurement interval unit.
    pub fn nominal_frequency(&self) -> f64 {
        self.nominal_frequency
    }

    /// Highest sustained frequency observed on the machine.
    pub fn actual_max_frequency(&self) -> f64 {
        self.actual_max_frequency
    }

    /// Physical cores in `(socket, core)` order.
    pub fn physical_cores(&self) -> impl Iterator<Item = PhysicalCoreKey> + '_ {
        self.logical.keys().copied()
    }

    /// Physical cores paired with their logical cores, in `(socket, core)`
    /// order.
    pub fn cores(&self) -> impl Iterator<Item = (PhysicalCoreKey, &[usize])> {
        self.logical.iter().map(|(&key, logical)| (key, logical.as_slice()))
    }

    /// Logical cores of `key`, or `None` if the key is not part of this
    /// topology.
    pub fn logical_cores_of(&self, key: PhysicalCoreKey) -> Option<&[usize]> {
        self.logical.get(&key).map(Vec::as_slice)
    }
}

/// Wire shape of [`Topology`]; validated on conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawTopology {
    sockets: usize,
    physical_cores_per_socket: usize,
    threads_per_core: usize,
    ht_active: bool,
    nominal_frequency: f64,
    actual_max_frequency: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    cores: Vec<CoreMapping>,
}

impl TryFrom<RawTopology> for Topology {
    type Error = String;

    fn try_from(raw: RawTopology) -> Result<Self, Self::Error> {
        if raw.cores.is_empty() {
            Self::uniform(
                raw.sockets,
                raw.physical_cores_per_socket,
                raw.threads_per_core,
                raw.ht_active,
                raw.nominal_frequency,
                raw.actual_max_frequency,
            )
        } else {
            Self::with_mapping(
                raw.sockets,
                raw.physical_cores_per_socket,
                raw.threads_per_core,
                raw.ht_active,
                raw.nominal_frequency,
                raw.actual_max_frequency,
                raw.cores,
            )
        }
    }
}

impl From<Topology> for RawTopology {
    fn from(topology: Topology) -> Self {
        Self {
            sockets: topology.sockets,
            physical_cores_per_socket: topology.physical_cores_per_socket,
            threads_per_core: topology.threads_per_core,
            ht_active: topology.ht_active,
            nominal_frequency: topology.nominal_frequency,
            actual_max_frequency: topology.actual_max_frequency,
            cores: topology
                .logical
                .into_iter()
                .map(|(key, logical)| CoreMapping {
                    socket: key.socket,
                    core: key.core,
                    logical,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(socket: usize, core: usize, logical: &[usize]) -> CoreMapping {
        CoreMapping {
            socket,
            core,
            logical: logical.to_vec(),
        }
    }

    #[test]
    fn key_display_and_order() {
        let mut keys = vec![
            PhysicalCoreKey::new(1, 0),
            PhysicalCoreKey::new(0, 1),
            PhysicalCoreKey::new(0, 0),
        ];
        keys.sort();
        let labels: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(labels, ["S0-C0", "S0-C1", "S1-C0"]);
    }

    #[test]
    fn uniform_uses_linux_enumeration() {
        let topo = Topology::uniform(2, 2, 2, true, 2.0e9, 3.0e9).unwrap();
        assert_eq!(topo.physical_core_count(), 4);
        assert_eq!(
            topo.logical_cores_of(PhysicalCoreKey::new(0, 0)),
            Some(&[0, 4][..])
        );
        assert_eq!(
            topo.logical_cores_of(PhysicalCoreKey::new(1, 1)),
            Some(&[3, 7][..])
        );
        let keys: Vec<_> = topo.physical_cores().collect();
        assert_eq!(keys.len(), 4);
        assert_eq!(keys[2], PhysicalCoreKey::new(1, 0));
    }

    #[test]
    fn rejects_wrong_thread_count() {
        let err = Topology::with_mapping(
            1,
            1,
            2,
            true,
            1.0,
            1.0,
            vec![mapping(0, 0, &[0])],
        )
        .unwrap_err();
        assert!(err.contains("expected 2"), "{err}");
    }

    #[test]
    fn rejects_shared_logical_core() {
        let err = Topology::with_mapping(
            1,
            2,
            2,
            true,
            1.0,
            1.0,
            vec![mapping(0, 0, &[0, 2]), mapping(0, 1, &[1, 2])],
        )
        .unwrap_err();
        assert!(err.contains("logical core 2"), "{err}");
    }

    #[test]
    fn rejects_missing_core() {
        let err = Topology::with_mapping(
            2,
            1,
            1,
            false,
            1.0,
            1.0,
            vec![mapping(0, 0, &[0])],
        )
        .unwrap_err();
        assert!(err.contains("S1-C0"), "{err}");
    }

    #[test]
    fn rejects_smt_without_two_threads() {
        assert!(Topology::uniform(1, 1, 1, true, 1.0, 1.0).is_err());
        assert!(Topology::uniform(1, 1, 4, true, 1.0, 1.0).is_err());
        assert!(Topology::uniform(1, 1, 2, false, 1.0, 1.0).is_ok());
    }

    #[test]
    fn rejects_non_positive_frequency() {
        let err = Topology::uniform(1, 1, 1, false, 0.0, 1.0).unwrap_err();
        assert!(err.contains("nominal_frequency"), "{err}");
    }
}
