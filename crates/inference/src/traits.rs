//! Core trait for grouped reduction.
//!
//! A `GroupReducer` sees every record of one base key at once, in
//! secondary-key order, and nothing else. Each call starts from fresh
//! local state, so groups can run in any order and in parallel.

use crate::error::Result;
use std::ops::AddAssign;

pub trait GroupReducer: Send + Sync {
    /// Base key the records are grouped by
    type Key: Ord + Send + Sync;
    /// Record delivered inside a group
    type Input: Send + Sync;
    /// Record emitted by the reduction
    type Output: Send;
    /// Per-stage counters, summed over all groups
    type Counters: Default + AddAssign + Send;

    /// Returns the name of this reducer (for logging)
    fn name(&self) -> &str;

    /// Reduce one complete group.
    ///
    /// # Arguments
    /// * `key` - The group's base key
    /// * `records` - All records with that key, ascending secondary key
    /// * `counters` - Counters of this group, starting at zero
    fn reduce(
        &self,
        key: &Self::Key,
        records: &[Self::Input],
        counters: &mut Self::Counters,
    ) -> Result<Vec<Self::Output>>;
}
