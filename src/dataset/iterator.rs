// src/dataset/iterator.rs

//! Lazy epoch iterators over a dataset.
//!
//! Both iterators make a single pass and are not restartable; re-supplying
//! the key lists starts a new epoch.

use crate::error::{FeedError, Result};
use crate::item::Key;

use super::batch::Batch;
use super::chunks::ChunkSplitter;
use super::traits::Dataset;

/// Yields one batch per fixed-size chunk of the key list.
pub struct Batches<'a, D: ?Sized> {
    dataset: &'a D,
    chunks: ChunkSplitter<Key>,
}

impl<'a, D: Dataset + ?Sized> Batches<'a, D> {
    pub(crate) fn new(dataset: &'a D, keys: Vec<Key>, batch_size: usize) -> Self {
        Self {
            dataset,
            chunks: ChunkSplitter::new(keys, batch_size),
        }
    }
}

impl<D: Dataset + ?Sized> Iterator for Batches<'_, D> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.chunks.next()?;
        Some(self.dataset.query(&chunk))
    }
}

/// Yields batches drawn group-synchronously from several key groups.
///
/// Each iteration takes one chunk of `batch_size / groups` keys from every
/// group and concatenates them in group order. Iteration stops as soon as
/// any group runs out of chunks; when the chunks of one iteration disagree
/// in length, every chunk is truncated to the shortest one for that
/// iteration only, so a few keys may be dropped near the end of an epoch.
pub struct BalancedBatches<'a, D: ?Sized> {
    dataset: &'a D,
    groups: Vec<ChunkSplitter<Key>>,
}

impl<D: ?Sized> std::fmt::Debug for BalancedBatches<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalancedBatches")
            .field("groups", &self.groups)
            .finish()
    }
}

impl<'a, D: Dataset + ?Sized> BalancedBatches<'a, D> {
    pub(crate) fn new(
        dataset: &'a D,
        key_groups: Vec<Vec<Key>>,
        batch_size: usize,
    ) -> Result<Self> {
        let groups = key_groups.len();
        let share = if groups == 0 { 0 } else { batch_size / groups };
        if share == 0 || share * groups != batch_size {
            return Err(FeedError::EvenSplitRequired { batch_size, groups });
        }
        Ok(Self {
            dataset,
            groups: key_groups
                .into_iter()
                .map(|keys| ChunkSplitter::new(keys, share))
                .collect(),
        })
    }
}

impl<D: Dataset + ?Sized> Iterator for BalancedBatches<'_, D> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut chunks = Vec::with_capacity(self.groups.len());
        for group in &mut self.groups {
            chunks.push(group.next()?);
        }
        let shortest = chunks.iter().map(Vec::len).min().unwrap_or(0);
        let mut combined = Vec::with_capacity(shortest * chunks.len());
        for mut chunk in chunks {
            chunk.truncate(shortest);
            combined.append(&mut chunk);
        }
        Some(self.dataset.query(&combined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MapDataset;
    use crate::item::Payload;

    fn numbered(n: i64) -> MapDataset {
        MapDataset::new((0..n).map(|i| {
            (
                Key::from(i),
                vec![Payload::Int(i), Payload::Int(i * 10)],
            )
        }))
    }

    fn keys(range: std::ops::Range<i64>) -> Vec<Key> {
        range.map(Key::from).collect()
    }

    #[test]
    fn test_batches_cover_one_epoch() {
        let dataset = numbered(10);
        let batches: Vec<Batch> = dataset
            .batches(keys(0..10), 4)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 4);
        assert_eq!(batches[1].len(), 4);
        assert_eq!(batches[2].len(), 2);

        // Row order follows the supplied key order.
        assert_eq!(
            batches[0].column(0).unwrap().as_array().unwrap().as_i64().unwrap(),
            [0, 1, 2, 3]
        );
    }

    #[test]
    fn test_batches_single_pass() {
        let dataset = numbered(4);
        let mut iter = dataset.batches(keys(0..4), 2);
        assert!(iter.next().is_some());
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_balanced_batches_group_layout() {
        let dataset = numbered(8);
        let groups = vec![keys(0..4), keys(4..8)];
        let batches: Vec<Batch> = dataset
            .balanced_batches(groups, 4)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(batches.len(), 2);
        for batch in &batches {
            assert_eq!(batch.len(), 4);
        }
        // Two keys from each group, group order preserved.
        assert_eq!(
            batches[0].column(0).unwrap().as_array().unwrap().as_i64().unwrap(),
            [0, 1, 4, 5]
        );
        assert_eq!(
            batches[1].column(0).unwrap().as_array().unwrap().as_i64().unwrap(),
            [2, 3, 6, 7]
        );
    }

    #[test]
    fn test_balanced_batches_rejects_uneven_split() {
        let dataset = numbered(8);
        let err = dataset
            .balanced_batches(vec![keys(0..4), keys(4..8)], 3)
            .unwrap_err();
        assert!(matches!(
            err,
            FeedError::EvenSplitRequired {
                batch_size: 3,
                groups: 2
            }
        ));
    }

    #[test]
    fn test_balanced_batches_rejects_empty_groups_list() {
        let dataset = numbered(2);
        assert!(dataset.balanced_batches(vec![], 4).is_err());
    }

    #[test]
    fn test_balanced_batches_truncates_to_shortest_chunk() {
        // Group sizes 5 and 4, share 2: the third iteration pairs a 1-key
        // chunk with a 2-key chunk and stops after the shorter group anyway.
        let dataset = numbered(9);
        let groups = vec![keys(0..5), keys(5..9)];
        let batches: Vec<Batch> = dataset
            .balanced_batches(groups, 4)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(
            batches[1].column(0).unwrap().as_array().unwrap().as_i64().unwrap(),
            [2, 3, 7, 8]
        );
    }

    #[test]
    fn test_balanced_batches_uneven_tail_is_truncated_per_iteration() {
        // Group sizes 3 and 4, share 2: second iteration has chunks of
        // length 1 and 2, truncated to 1 key per group.
        let dataset = numbered(7);
        let groups = vec![keys(0..3), keys(3..7)];
        let batches: Vec<Batch> = dataset
            .balanced_batches(groups, 4)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 4);
        assert_eq!(
            batches[1].column(0).unwrap().as_array().unwrap().as_i64().unwrap(),
            [2, 5]
        );
    }
}
