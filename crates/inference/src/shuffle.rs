//! In-process grouped stream provider.
//!
//! Collects `(base key, secondary key, value)` triples, stable-sorts them,
//! and hands each base key's records to a `GroupReducer` as one contiguous
//! slice in ascending secondary-key order. Groups are reduced in parallel
//! with rayon; outputs come back in base-key order.

use crate::error::Result;
use crate::traits::GroupReducer;
use rayon::prelude::*;
use tracing::{debug, info, instrument};

/// Everything a stage produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport<O, C> {
    pub outputs: Vec<O>,
    pub counters: C,
    /// Number of groups reduced
    pub groups: usize,
}

/// Sort-and-group buffer for one stage
#[derive(Debug)]
pub struct LocalShuffle<K, V> {
    entries: Vec<(K, u8, V)>,
}

impl<K, V> LocalShuffle<K, V>
where
    K: Ord + Send + Sync,
    V: Send + Sync,
{
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add one record under its base and secondary key.
    pub fn push(&mut self, key: K, secondary: u8, value: V) {
        self.entries.push((key, secondary, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sort and split into groups.
    ///
    /// The sort is stable, so records with equal keys keep insertion order.
    pub fn into_groups(self) -> Vec<(K, Vec<V>)> {
        let mut entries = self.entries;
        entries.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut groups: Vec<(K, Vec<V>)> = Vec::new();
        for (key, _, value) in entries {
            match groups.last_mut() {
                Some((last, values)) if *last == key => values.push(value),
                _ => groups.push((key, vec![value])),
            }
        }
        groups
    }

    /// Reduce every group on the current rayon pool.
    ///
    /// The first failing group fails the stage.
    #[instrument(skip_all, fields(reducer = reducer.name(), records = self.entries.len()))]
    pub fn run<R>(self, reducer: &R) -> Result<StageReport<R::Output, R::Counters>>
    where
        R: GroupReducer<Key = K, Input = V>,
    {
        let groups = self.into_groups();
        debug!("Reducing {} groups", groups.len());

        let reduced: Vec<(Vec<R::Output>, R::Counters)> = groups
            .par_iter()
            .map(|(key, values)| -> Result<(Vec<R::Output>, R::Counters)> {
                let mut counters = R::Counters::default();
                let outputs = reducer.reduce(key, values, &mut counters)?;
                Ok((outputs, counters))
            })
            .collect::<Result<_>>()?;

        let mut report = StageReport {
            outputs: Vec::new(),
            counters: R::Counters::default(),
            groups: groups.len(),
        };
        for (outputs, counters) in reduced {
            report.outputs.extend(outputs);
            report.counters += counters;
        }
        info!(
            "{}: {} groups -> {} records",
            reducer.name(),
            report.groups,
            report.outputs.len()
        );
        Ok(report)
    }

    /// Reduce every group on a dedicated pool of `threads` workers.
    pub fn run_with_threads<R>(
        self,
        reducer: &R,
        threads: usize,
    ) -> Result<StageReport<R::Output, R::Counters>>
    where
        R: GroupReducer<Key = K, Input = V>,
    {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
        pool.install(|| self.run(reducer))
    }
}

impl<K, V> Default for LocalShuffle<K, V>
where
    K: Ord + Send + Sync,
    V: Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}
