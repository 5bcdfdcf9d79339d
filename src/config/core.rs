//! Configuration for cut building, bin matrix construction and histogram
//! accumulation.

use crate::core::constants::*;
use crate::core::error::{HistError, Result};
use crate::core::types::CutStrategy;
use crate::core::utils::threading::WorkerPool;

use serde::{Deserialize, Serialize};

/// Tunables shared by every parallel phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistConfig {
    /// Maximum number of bins per feature
    pub max_bins: usize,
    /// Number of worker threads (0 = all logical cores)
    pub n_threads: usize,
    /// Rows per work block; trades load balance against dispatch overhead
    pub block_size: usize,
    /// Bins per block when reducing histograms in parallel
    pub reduce_block_size: usize,
    /// Cut-building strategy
    pub cut_strategy: CutStrategy,
    /// Density below which `CutStrategy::Auto` picks the sparse strategy
    pub sparse_threshold: f64,
}

impl Default for HistConfig {
    fn default() -> Self {
        HistConfig {
            max_bins: DEFAULT_MAX_BIN,
            n_threads: 0,
            block_size: DEFAULT_BLOCK_SIZE,
            reduce_block_size: DEFAULT_REDUCE_BLOCK_SIZE,
            cut_strategy: CutStrategy::Auto,
            sparse_threshold: DEFAULT_SPARSE_THRESHOLD,
        }
    }
}

impl HistConfig {
    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.max_bins == 0 || self.max_bins > MAX_BIN_LIMIT {
            return Err(HistError::invalid_parameter(
                "max_bins",
                self.max_bins.to_string(),
                format!("must be in range [1, {}]", MAX_BIN_LIMIT),
            ));
        }

        if self.block_size == 0 {
            return Err(HistError::invalid_parameter(
                "block_size",
                "0",
                "must be positive",
            ));
        }

        if self.reduce_block_size == 0 {
            return Err(HistError::invalid_parameter(
                "reduce_block_size",
                "0",
                "must be positive",
            ));
        }

        if !(0.0..=1.0).contains(&self.sparse_threshold) {
            return Err(HistError::invalid_parameter(
                "sparse_threshold",
                self.sparse_threshold.to_string(),
                "must be in range [0.0, 1.0]",
            ));
        }

        if self.n_threads > num_cpus::get() * 2 {
            log::warn!(
                "n_threads ({}) is much larger than available cores ({})",
                self.n_threads,
                num_cpus::get()
            );
        }

        Ok(())
    }

    /// Get the effective number of threads (0 means use all available cores)
    pub fn effective_num_threads(&self) -> usize {
        if self.n_threads == 0 {
            num_cpus::get()
        } else {
            self.n_threads
        }
    }

    /// Validates the configuration and builds a pool of the configured size.
    pub fn worker_pool(&self) -> Result<WorkerPool> {
        self.validate()?;
        WorkerPool::new(self.effective_num_threads())
    }

    /// Parses a TOML document; missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: HistConfig = toml::from_str(content).map_err(|e| {
            HistError::serialization(format!("Failed to parse TOML config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| HistError::serialization(format!("Failed to serialize to TOML: {}", e)))
    }
}

/// Builder for [`HistConfig`] with deferred validation.
#[derive(Debug, Default)]
pub struct HistConfigBuilder {
    config: HistConfig,
}

impl HistConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        HistConfigBuilder {
            config: HistConfig::default(),
        }
    }

    /// Set the maximum number of bins per feature
    pub fn max_bins(mut self, max_bins: usize) -> Self {
        self.config.max_bins = max_bins;
        self
    }

    /// Set the number of worker threads
    pub fn n_threads(mut self, n_threads: usize) -> Self {
        self.config.n_threads = n_threads;
        self
    }

    /// Set the number of rows per work block
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.config.block_size = block_size;
        self
    }

    /// Set the number of bins per reduction block
    pub fn reduce_block_size(mut self, reduce_block_size: usize) -> Self {
        self.config.reduce_block_size = reduce_block_size;
        self
    }

    /// Force a cut-building strategy
    pub fn cut_strategy(mut self, strategy: CutStrategy) -> Self {
        self.config.cut_strategy = strategy;
        self
    }

    /// Set the density threshold for automatic strategy selection
    pub fn sparse_threshold(mut self, threshold: f64) -> Self {
        self.config.sparse_threshold = threshold;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<HistConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
