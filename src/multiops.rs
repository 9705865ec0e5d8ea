//! Operations over many bitmaps at once

use tracing::trace;

use crate::RoaringBitmap;
use crate::container::{bitset_ops, BitsetContainer, Container};
use crate::container::bitset_ops::BITSET_SIZE_IN_WORDS;
use crate::roaring_array::RoaringArray;

/// Compute the union of every bitmap in `bitmaps`.
///
/// # Remarks
/// Containers are grouped by key across all inputs and each group is accumulated into a single bitset,
/// the cardinality and final representation are only computed once per key.
/// Unions of two bitmaps or less fall back to `RoaringBitmap::or`
pub fn fast_or(bitmaps: &[&RoaringBitmap]) -> RoaringBitmap {
    match bitmaps {
        [] => return RoaringBitmap::new(),
        [single] => return (*single).clone(),
        [a, b] => return a.or(b),
        _ => ()
    }

    // Gather every container tagged by its key, the sort is stable so input order is kept per key
    let mut entries: Vec<(u16, &Container)> = bitmaps.iter()
        .flat_map(|bitmap| bitmap.chunks.iter())
        .collect();

    entries.sort_by_key(|(key, _)| *key);

    let mut result = RoaringArray::with_capacity(entries.len());
    let mut count = 0;

    for group in groups(&entries) {
        let key = group[0].0;

        let container = match group {
            [(_, container)] => (*container).clone(),
            _ => union_group(group.iter().map(|(_, container)| *container))
        };

        result.append(key, container);
        count += 1;
    }

    trace!(inputs = bitmaps.len(), containers = count, "fast union");

    RoaringBitmap {
        chunks: result
    }
}

/// Union a group of containers sharing a key without maintaining the cardinality along the way
fn union_group<'a, I>(containers: I) -> Container
    where I: Iterator<Item = &'a Container>
{
    let mut words = vec![0_u64; BITSET_SIZE_IN_WORDS];

    for container in containers {
        match container {
            Container::Array(c) => {
                for value in c.iter() {
                    words[(*value >> 6) as usize] |= 1_u64 << (*value & 0x3F);
                }
            },
            Container::Bitset(c) => {
                let other: &[u64] = c;
                for (word, other) in words.iter_mut().zip(other.iter()) {
                    *word |= *other;
                }
            },
            Container::Run(c) => {
                if c.is_full() {
                    return container.clone();
                }

                for run in c.iter() {
                    bitset_ops::set_range(&mut words, u32::from(run.value), run.end());
                }
            }
        }
    }

    let cardinality = bitset_ops::cardinality(&words);
    BitsetContainer::from_raw(words, cardinality).into_union_container()
}

/// Split a key sorted slice into groups of equal keys
fn groups<T>(slice: &[(u16, T)]) -> GroupBy<'_, T> {
    GroupBy {
        slice
    }
}

struct GroupBy<'a, T> {
    slice: &'a [(u16, T)]
}

impl<'a, T> Iterator for GroupBy<'a, T> {
    type Item = &'a [(u16, T)];

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.slice.first()?.0;
        let len = self.slice.iter()
            .take_while(|(k, _)| *k == key)
            .count();

        let (group, rest) = self.slice.split_at(len);
        self.slice = rest;

        Some(group)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::*;

    #[test]
    fn scenario() {
        let mut a = RoaringBitmap::from_slice(&[1, 2, 3, 4, 5, 100, 1000]);
        let b = RoaringBitmap::from_slice(&[3, 4, 1000]);
        let c = RoaringBitmap::from_slice(&[5]);

        a.inplace_and(&b);
        assert_eq!(a.to_vec(), vec![3, 4, 1000]);

        let result = fast_or(&[&a, &b, &c]);
        assert_eq!(result.to_vec(), vec![3, 4, 5, 1000]);
    }

    #[test]
    fn matches_pairwise_union() {
        let mut bitmaps: Vec<RoaringBitmap> = (0..6_u8)
            .map(|stream| RoaringBitmap::from_slice(&generate_seeded(0..3_000_000_u32, 60_000, stream)))
            .collect();

        // Mix in run and full containers
        bitmaps[2].add_range(1_000_000..1_200_000);
        bitmaps[2].run_optimize();
        bitmaps[4].add_range(2_000_000..2_100_000);

        let refs: Vec<&RoaringBitmap> = bitmaps.iter().collect();
        let expected = bitmaps.iter().fold(RoaringBitmap::new(), |acc, bitmap| acc.or(bitmap));

        let result = fast_or(&refs);
        assert_eq!(result, expected);
        assert_eq!(result.cardinality(), expected.cardinality());
        assert!(result.chunks.is_valid());
    }

    #[test]
    fn small_inputs() {
        let a = RoaringBitmap::from_slice(&[1, 2]);
        let b = RoaringBitmap::from_slice(&[2, 3]);

        assert!(fast_or(&[]).is_empty());
        assert_eq!(fast_or(&[&a]), a);
        assert_eq!(fast_or(&[&a, &b]).to_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn full_chunk_becomes_run() {
        let a = RoaringBitmap::from_range(0..30_000);
        let b = RoaringBitmap::from_range(30_000..60_000);
        let c = RoaringBitmap::from_range(60_000..65_536);

        let result = fast_or(&[&a, &b, &c]);

        assert_eq!(result.cardinality(), 65_536);
        assert_eq!(result.statistics().run_containers, 1);
    }
}
