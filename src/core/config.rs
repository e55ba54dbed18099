use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::core::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeConfig {
    /// Load every n-th sampled term of the term index into memory
    pub term_index_divisor: usize,
    /// Terms cached per term dictionary reader
    pub term_cache_size: usize,
    /// How many of the top skip levels are copied into owned buffers
    pub skip_levels_to_buffer: usize,
    /// Levels longer than this are read through cursors instead of buffered
    pub max_buffered_skip_bytes: usize,
    /// Warn once a pending deletion has been retried this many times
    pub delete_retry_warn_threshold: usize,
    pub merge_policy: MergePolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergePolicyConfig {
    pub max_merge_at_once: usize,
    pub max_merge_at_once_explicit: usize,
    pub segments_per_tier: f64,
    pub floor_segment_bytes: u64,
    pub max_merged_segment_bytes: u64,
    pub reclaim_deletes_weight: f64,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        UpgradeConfig {
            term_index_divisor: 1,
            term_cache_size: 1024,
            skip_levels_to_buffer: 1,
            max_buffered_skip_bytes: 64 * 1024,   // 64KB per buffered level
            delete_retry_warn_threshold: 10,
            merge_policy: MergePolicyConfig::default(),
        }
    }
}

impl Default for MergePolicyConfig {
    fn default() -> Self {
        MergePolicyConfig {
            max_merge_at_once: 10,
            max_merge_at_once_explicit: 30,
            segments_per_tier: 10.0,
            floor_segment_bytes: 2 * 1024 * 1024,            // 2MB
            max_merged_segment_bytes: 5 * 1024 * 1024 * 1024, // 5GB
            reclaim_deletes_weight: 2.0,
        }
    }
}

impl UpgradeConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        let config: UpgradeConfig = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        use crate::core::error::Error;

        if self.term_index_divisor == 0 {
            return Err(Error::invalid_argument("term_index_divisor must be >= 1"));
        }
        if self.merge_policy.max_merge_at_once < 2 || self.merge_policy.max_merge_at_once_explicit < 2 {
            return Err(Error::invalid_argument("merge policy must merge at least 2 segments at once"));
        }
        if self.merge_policy.segments_per_tier < 2.0 {
            return Err(Error::invalid_argument("segments_per_tier must be >= 2.0"));
        }
        Ok(())
    }
}
