#![doc = include_str!("../README.md")]

pub mod api;
pub mod checks;
pub mod client;
pub mod driver;
pub mod error;
pub mod random;
pub mod recorder;
pub mod scenario;
pub mod setup;
pub mod vu;

pub(crate) mod timer;
pub(crate) mod transaction;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiResponse, TaskApi};
pub use client::HttpTaskApi;
pub use driver::LoadDriver;
pub use error::DriverError;
pub use recorder::Recorder;

pub mod prelude {
    pub use crate::{DriverError, HttpTaskApi, LoadDriver, TaskApi};
    pub use taskload_core::{RampKind, RunConfig, RunStatistics, SetupFailurePolicy, Stage};
}
