//! Configuration types for the IPAM engine
//!
//! Bucket sizing is fixed per engine at construction; there is no
//! process-wide knob.

use serde::{Deserialize, Serialize};

use crate::storage::LabelMap;

/// Default number of used addresses a single bucket may hold
pub const DEFAULT_ADDR_NUM_PER_BUCKET: usize = 4096;

/// Default size ceiling (bytes) for one serialized bucket
pub const DEFAULT_BUCKET_SIZE: usize = (512 + 1024) * 1024;

/// Main IPAM configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpamConfig {
    /// Namespace for bucket identifiers (`<prefix>/<literal>/<index>`)
    pub prefix: String,

    /// Initial instance-level labels
    #[serde(default)]
    pub labels: LabelMap,

    /// Bucket sizing
    #[serde(default)]
    pub buckets: BucketConfig,
}

impl IpamConfig {
    /// Create a configuration with the given prefix and default bucket sizing
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            labels: LabelMap::new(),
            buckets: BucketConfig::default(),
        }
    }

    /// Set the initial instance labels
    pub fn with_labels(mut self, labels: LabelMap) -> Self {
        self.labels = labels;
        self
    }

    /// Set the number of used addresses per bucket
    pub fn with_addr_num_per_bucket(mut self, addr_num_per_bucket: usize) -> Self {
        self.buckets.addr_num_per_bucket = addr_num_per_bucket;
        self
    }

    /// Set the serialized bucket size ceiling
    pub fn with_bucket_size(mut self, bucket_size: usize) -> Self {
        self.buckets.bucket_size = bucket_size;
        self
    }

    /// Parse a configuration from JSON
    pub fn from_json_str(raw: &str) -> Result<Self, crate::Error> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.prefix.is_empty() {
            return Err(crate::Error::config("IPAM prefix cannot be empty"));
        }
        // bucket keys are split on '/'
        if self.prefix.contains('/') {
            return Err(crate::Error::config(format!(
                "IPAM prefix {} cannot contain '/'",
                self.prefix
            )));
        }
        self.buckets.validate()
    }
}

/// Bucket sizing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Maximum number of used addresses stored in one bucket
    #[serde(default = "default_addr_num_per_bucket")]
    pub addr_num_per_bucket: usize,

    /// Size ceiling (bytes) a serialized bucket is expected to stay under
    ///
    /// Exceeding it is not an error; it is reported when buckets are dumped.
    #[serde(default = "default_bucket_size")]
    pub bucket_size: usize,
}

impl BucketConfig {
    /// Validate the bucket sizing
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.addr_num_per_bucket == 0 {
            return Err(crate::Error::config("addr_num_per_bucket must be > 0"));
        }
        if self.bucket_size == 0 {
            return Err(crate::Error::config("bucket_size must be > 0"));
        }
        Ok(())
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            addr_num_per_bucket: default_addr_num_per_bucket(),
            bucket_size: default_bucket_size(),
        }
    }
}

fn default_addr_num_per_bucket() -> usize {
    DEFAULT_ADDR_NUM_PER_BUCKET
}

fn default_bucket_size() -> usize {
    DEFAULT_BUCKET_SIZE
}
