//! Core infrastructure shared by the binning and histogram modules.
//!
//! - [`types`]: gradient pairs, histogram entries and index aliases
//! - [`constants`]: sketch parameters and configuration defaults
//! - [`error`]: the crate error type
//! - [`utils::threading`]: worker pool and 2-D work partitioning
//!
//! ```rust
//! use gbdt_hist::core::{
//!     types::{GradStats, GradientPair},
//!     constants::DEFAULT_MAX_BIN,
//!     error::{HistError, Result},
//! };
//!
//! let mut entry = GradStats::default();
//! entry.add_pair(GradientPair::new(0.5, 1.0));
//! assert_eq!(entry.hess(), 1.0);
//! assert!(DEFAULT_MAX_BIN >= 2);
//! # Ok::<(), HistError>(())
//! ```

pub mod constants;
pub mod error;
pub mod types;
pub mod utils;

pub use constants::*;
pub use error::{HistError, Result};
pub use types::*;

/// Version information for the core module
pub const CORE_MODULE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initializes the `env_logger` backend for the `log` facade.
///
/// Defaults to the `info` level when `RUST_LOG` is unset. Calling it more than
/// once, or after another logger was installed, is harmless.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
        log::debug!("logging initialized twice without error");
    }

    #[test]
    fn test_version_is_set() {
        assert!(!CORE_MODULE_VERSION.is_empty());
    }
}
