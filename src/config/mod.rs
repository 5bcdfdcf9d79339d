//! Configuration management.
//!
//! [`HistConfig`] carries the bin budget, thread count and block granularity
//! every parallel phase reads. It can be built in code through
//! [`HistConfigBuilder`] or parsed from TOML.

pub mod core;

pub use self::core::{HistConfig, HistConfigBuilder};
