#![allow(clippy::result_large_err)]

pub mod app;
pub mod app_state;
pub mod backpressure;
pub mod config;
pub mod domain;
pub mod error;
pub mod evaluate;
pub mod logging;
pub mod management;
pub mod metrics;
pub mod notify;
pub mod probe;
pub mod resurrect;
pub mod store;
pub mod sweep;
pub mod telemetry;
pub mod transport;
pub mod uptime;

pub use error::{BeaconError, Result};
