//! Binary codec for blocks and buckets
//!
//! `bincode` over the serde derives of the storage model. Maps are
//! `BTreeMap`s, so equal models always encode to equal bytes, and `Option`
//! keeps a placeholder bucket distinct from an empty one.

use super::{Block, Bucket};
use crate::error::Result;

/// Encode a block
pub fn encode_block(block: &Block) -> Result<Vec<u8>> {
    Ok(bincode::serialize(block)?)
}

/// Decode a block
pub fn decode_block(raw: &[u8]) -> Result<Block> {
    Ok(bincode::deserialize(raw)?)
}

/// Encode a single bucket
pub fn encode_bucket(bucket: &Bucket) -> Result<Vec<u8>> {
    Ok(bincode::serialize(bucket)?)
}

/// Decode a single bucket
pub fn decode_bucket(raw: &[u8]) -> Result<Bucket> {
    Ok(bincode::deserialize(raw)?)
}
