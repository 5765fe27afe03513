//! Counter aggregation: per-logical-core columns to per-physical-core series.

use htmodel_schemas::{Counter, Dataset, PhysicalCoreKey, Table, TimeSeries, Topology};

use crate::error::EstimateError;

/// The counter columns belonging to one physical core.
#[derive(Debug, Clone, Copy)]
pub struct CoreView<'a> {
    key: PhysicalCoreKey,
    first: usize,
    logical: &'a [usize],
    counters: &'a Table,
}

impl<'a> CoreView<'a> {
    /// Returns `None` when `logical` is empty.
    pub fn new(
        key: PhysicalCoreKey,
        logical: &'a [usize],
        counters: &'a Table,
    ) -> Option<Self> {
        let &first = logical.first()?;
        Some(Self {
            key,
            first,
            logical,
            counters,
        })
    }

    /// One view per physical core of `topology`, in `(socket, core)` order.
    pub fn all(
        dataset: &'a Dataset,
        topology: &'a Topology,
    ) -> impl Iterator<Item = CoreView<'a>> {
        topology.cores().filter_map(|(key, logical)| {
            CoreView::new(key, logical, dataset.counters())
        })
    }

    pub fn key(&self) -> PhysicalCoreKey {
        self.key
    }

    pub fn logical(&self) -> &'a [usize] {
        self.logical
    }

    /// The logical core that represents this physical core.
    pub fn first_logical(&self) -> usize {
        self.first
    }

    /// `counter` of a single logical core.
    ///
    /// # Errors
    ///
    /// Fails with a missing-column error when the dataset lacks the column.
    pub fn column(
        &self,
        counter: Counter,
        logical: usize,
    ) -> Result<&'a TimeSeries, EstimateError> {
        let name = counter.column(logical);
        self.counters
            .column(&name)
            .ok_or_else(|| EstimateError::missing_column(name))
    }

    /// `counter` of the core's first logical core. Core-scoped counters such
    /// as `thread_any` are read from here.
    ///
    /// # Errors
    ///
    /// See [`CoreView::column`].
    pub fn first(&self, counter: Counter) -> Result<&'a TimeSeries, EstimateError> {
        self.column(counter, self.first)
    }

    /// Sums `counter` across all logical cores of this physical core,
    /// interval by interval.
    ///
    /// # Errors
    ///
    /// Fails when a column is missing or its length differs from the first
    /// logical core's column.
    pub fn sum(&self, counter: Counter) -> Result<TimeSeries, EstimateError> {
        let mut total = self.first(counter)?.clone();
        for &logical in &self.logical[1..] {
            let series = self.column(counter, logical)?;
            total = total.try_add(series).map_err(|mismatch| {
                EstimateError::length_mismatch(counter.column(logical), mismatch)
            })?;
        }
        Ok(total)
    }
}

/// Sums `counter` across the logical cores of `key`.
///
/// A key outside the topology has no columns and fails as a missing column.
///
/// # Errors
///
/// See [`CoreView::sum`].
pub fn sum_counter(
    dataset: &Dataset,
    topology: &Topology,
    counter: Counter,
    key: PhysicalCoreKey,
) -> Result<TimeSeries, EstimateError> {
    topology
        .logical_cores_of(key)
        .and_then(|logical| CoreView::new(key, logical, dataset.counters()))
        .ok_or_else(|| {
            EstimateError::missing_column(format!("{key}_{}", counter.name()))
        })?
        .sum(counter)
}
