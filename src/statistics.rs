#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::RoaringBitmap;
use crate::container::{Container, RunContainer};

/// RoaringStatistics can be used to collect detailed statistics about the composition of a roaring bitmap
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoaringStatistics {
    /// Number of containers
    pub containers: u32,

    /// Number of array containers
    pub array_containers: u32,

    ///  Number of run containers
    pub run_containers: u32,

    /// Number of bitset containers
    pub bitset_containers: u32,

    /// Number of values in array containers
    pub values_array_containers: u64,

    /// Number of values in run containers
    pub values_run_containers: u64,

    /// Number of values in bitset containers
    pub values_bitset_containers: u64,

    /// Number of bytes used by the payloads of array containers
    pub bytes_array_containers: u64,

    /// Number of bytes used by the payloads of run containers
    pub bytes_run_containers: u64,

    /// Number of bytes used by the payloads of bitset containers
    pub bytes_bitset_containers: u64,

    /// Maximal value. Zero if cardinality is zero
    pub max_value: u32,

    /// Minimal value. Zero if cardinality is zero
    pub min_value: u32,

    /// The sum of all values (could be used to compute average)
    pub sum_value: u64,

    /// Total number of values in the bitmap
    pub cardinality: u64
}

impl RoaringStatistics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoaringBitmap {
    /// Collect statistics about the containers of the bitmap
    pub fn statistics(&self) -> RoaringStatistics {
        let mut stats = RoaringStatistics::new();

        for (key, container) in self.chunks.iter() {
            let cardinality = container.cardinality() as u64;
            let bytes = container.size_in_bytes() as u64;

            stats.containers += 1;
            stats.cardinality += cardinality;

            match container {
                Container::Array(_) => {
                    stats.array_containers += 1;
                    stats.values_array_containers += cardinality;
                    stats.bytes_array_containers += bytes;
                },
                Container::Bitset(_) => {
                    stats.bitset_containers += 1;
                    stats.values_bitset_containers += cardinality;
                    stats.bytes_bitset_containers += bytes;
                },
                Container::Run(_) => {
                    stats.run_containers += 1;
                    stats.values_run_containers += cardinality;
                    stats.bytes_run_containers += bytes;
                }
            }

            let base = u64::from(key) << 16;
            let low_sum = match container {
                Container::Run(c) => run_sum(c),
                c => c.iter().map(u64::from).sum::<u64>()
            };

            stats.sum_value += base * cardinality + low_sum;
        }

        stats.min_value = self.min().unwrap_or(0);
        stats.max_value = self.max().unwrap_or(0);

        stats
    }
}

/// Sum of the low bits covered by every run
fn run_sum(container: &RunContainer) -> u64 {
    container.iter()
        .map(|run| {
            let first = u64::from(run.value);
            let last = first + u64::from(run.length);

            (last - first + 1) * (first + last) / 2
        })
        .sum()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty() {
        assert_eq!(RoaringBitmap::new().statistics(), RoaringStatistics::new());
    }

    #[test]
    fn counts_by_kind() {
        let mut bitmap = RoaringBitmap::from_slice(&[1, 3, 5]);
        bitmap.add_range(65_536..75_536);
        bitmap.add_range(131_072..131_172);
        bitmap.add(131_500);
        bitmap.run_optimize();

        let stats = bitmap.statistics();

        assert_eq!(stats.containers, 3);
        assert_eq!(stats.run_containers, 2);
        assert_eq!(stats.array_containers, 1);
        assert_eq!(stats.bitset_containers, 0);

        assert_eq!(stats.values_array_containers, 3);
        assert_eq!(stats.values_run_containers, 10_000 + 101);
        assert_eq!(stats.bytes_array_containers, 6);
        assert_eq!(stats.bytes_run_containers, 4 + 8);

        assert_eq!(stats.cardinality, bitmap.cardinality() as u64);
        assert_eq!(stats.min_value, 1);
        assert_eq!(stats.max_value, 131_500);
        assert_eq!(stats.sum_value, bitmap.iter().map(u64::from).sum::<u64>());
    }

    #[test]
    fn full_universe() {
        let mut bitmap = RoaringBitmap::new();
        for key in 0..=u16::MAX {
            bitmap.chunks.append(key, Container::Run(RunContainer::full()));
        }

        assert_eq!(bitmap.cardinality(), 1 << 32);

        let stats = bitmap.statistics();

        assert_eq!(stats.containers, 1 << 16);
        assert_eq!(stats.run_containers, 1 << 16);
        assert_eq!(stats.values_run_containers, 1 << 32);
        assert_eq!(stats.bytes_run_containers, 4 << 16);
        assert_eq!(stats.cardinality, 1 << 32);
        assert_eq!(stats.min_value, 0);
        assert_eq!(stats.max_value, u32::MAX);
        assert_eq!(stats.sum_value, (1_u64 << 32) * u64::from(u32::MAX) / 2);
    }

    #[test]
    fn run_sums() {
        let mut bitmap = RoaringBitmap::from_range(70_000..80_000);
        bitmap.add_range(100..200);
        bitmap.add(u32::MAX);
        bitmap.run_optimize();

        let expected: u64 = bitmap.iter().map(u64::from).sum();
        assert_eq!(bitmap.statistics().sum_value, expected);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip() {
        let stats = RoaringBitmap::from_range(0..10_000).statistics();

        let json = serde_json::to_string(&stats).unwrap();
        let decoded: RoaringStatistics = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, stats);
    }
}
