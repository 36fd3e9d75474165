//! Weighted bin packing of work items into buckets.
//!
//! Used to spread top-level files over independent host sessions. Items are
//! sorted by descending weight and each goes to the currently lightest
//! bucket.

use serde::Serialize;

/// A group of items and their accumulated weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadBucket<T> {
    pub items: Vec<T>,
    pub weight: u64,
}

impl<T> Default for WorkloadBucket<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            weight: 0,
        }
    }
}

/// Distribute `items` over `bucket_count` buckets (at least one).
///
/// Ties between equally light buckets go to the lowest index, and items of
/// equal weight keep their input order.
pub fn distribute_workload<T, F>(bucket_count: usize, items: Vec<T>, weight: F) -> Vec<WorkloadBucket<T>>
where
    F: Fn(&T) -> u64,
{
    let mut buckets: Vec<WorkloadBucket<T>> = (0..bucket_count.max(1))
        .map(|_| WorkloadBucket::default())
        .collect();

    let mut weighted: Vec<(u64, T)> = items.into_iter().map(|item| (weight(&item), item)).collect();
    weighted.sort_by(|a, b| b.0.cmp(&a.0));

    for (w, item) in weighted {
        let lightest = buckets
            .iter()
            .enumerate()
            .min_by_key(|(i, b)| (b.weight, *i))
            .map(|(i, _)| i)
            .unwrap_or(0);
        buckets[lightest].weight += w;
        buckets[lightest].items.push(item);
    }
    buckets
}
