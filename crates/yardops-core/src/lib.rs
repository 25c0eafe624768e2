//! `yardops-core`: configuration and error types shared by the yardops crates.

pub mod config;
pub mod error;

pub use config::{RecurrenceConfig, SweepConfig, YardopsConfig};
pub use error::{Result, YardopsError};
