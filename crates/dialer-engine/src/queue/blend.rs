//! Smooth weighted round-robin across data lists
//!
//! Every pick adds each non-empty lane's weight to its credit, takes the lane
//! with the largest credit (first lane wins ties) and charges it the sum of
//! the non-empty weights. For any prefix of the output, a lane's share stays
//! within one slot of `weight / Σweights`. A lane that runs dry drops out and
//! the remaining lanes fill the rest of the batch.

use std::collections::VecDeque;

/// One list's candidates in dial order
#[derive(Debug, Clone)]
pub struct BlendLane<K, T> {
    pub key: K,
    pub weight: u32,
    pub items: VecDeque<T>,
}

impl<K, T> BlendLane<K, T> {
    pub fn new(key: K, weight: u32, items: impl IntoIterator<Item = T>) -> Self {
        Self {
            key,
            weight,
            items: items.into_iter().collect(),
        }
    }
}

/// Interleave lanes by weight until `limit` picks or every lane is empty
pub fn blend<K: Clone, T>(mut lanes: Vec<BlendLane<K, T>>, limit: usize) -> Vec<(K, T)> {
    let available: usize = lanes.iter().map(|lane| lane.items.len()).sum();
    let mut picked = Vec::with_capacity(limit.min(available));
    let mut credit = vec![0i64; lanes.len()];

    while picked.len() < limit {
        let total: i64 = lanes
            .iter()
            .filter(|lane| !lane.items.is_empty())
            .map(|lane| i64::from(lane.weight.max(1)))
            .sum();
        if total == 0 {
            break;
        }

        let mut best: Option<usize> = None;
        for (index, lane) in lanes.iter().enumerate() {
            if lane.items.is_empty() {
                continue;
            }
            credit[index] += i64::from(lane.weight.max(1));
            if best.map_or(true, |b| credit[index] > credit[b]) {
                best = Some(index);
            }
        }

        let Some(index) = best else { break };
        credit[index] -= total;
        let lane = &mut lanes[index];
        if let Some(item) = lane.items.pop_front() {
            picked.push((lane.key.clone(), item));
        }
    }

    picked
}
