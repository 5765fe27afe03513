//! Schema definitions shared by the htmodel pipeline.
//!
//! This crate holds the data that flows between phases: the system-under-test
//! [`Topology`] and [`SutConfig`], the input [`Dataset`] of per-interval
//! counters, the [`TimeSeries`] every computation step operates on, and the
//! fitted [`IpcModel`]s. Configuration is TOML; datasets and models are JSON.

mod config;
mod dataset;
mod ipc_model;
mod series;
#[cfg(test)]
mod testutil;
mod topology;

#[doc(inline)]
pub use config::*;
#[doc(inline)]
pub use dataset::*;
#[doc(inline)]
pub use ipc_model::*;
#[doc(inline)]
pub use series::*;
#[doc(inline)]
pub use topology::*;
