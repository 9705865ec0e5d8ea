#![deny(bare_trait_objects)]

//! Rusting Bitmaps is a loose port of CRoaring: compressed sets of 32 bit integers
//!
//! - An idiomatic and safe Rust API
//! - Array, bitset and run containers chosen by size
//! - The portable serialization format shared with the other Roaring implementations
//! - Zero copy frozen views over CRoaring's frozen layout (little endian hosts)

use std::ops::{Bound, RangeBounds};

mod container;
mod error;
mod multiops;
mod ops;
mod roaring;
mod roaring_array;
mod serialization;
mod statistics;

#[cfg(target_endian = "little")]
mod frozen;


#[cfg(test)]
mod test;

pub use crate::error::{DeserializeError, SerializeError};
pub use crate::multiops::fast_or;
pub use crate::roaring::{Iter, RoaringBitmap};
pub use crate::statistics::RoaringStatistics;

#[cfg(target_endian = "little")]
pub use crate::frozen::FrozenBitmap;

/// Conversion of a range of values into its inclusive bounds
pub(crate) trait IntoBound {
    /// Get the smallest and largest value in the range, or `None` if it is empty
    fn into_bound(self) -> Option<(u32, u32)>;
}

impl<R: RangeBounds<u32>> IntoBound for R {
    fn into_bound(self) -> Option<(u32, u32)> {
        let min = match self.start_bound() {
            Bound::Included(value) => *value,
            Bound::Excluded(value) => value.checked_add(1)?,
            Bound::Unbounded => 0
        };

        let max = match self.end_bound() {
            Bound::Included(value) => *value,
            Bound::Excluded(value) => value.checked_sub(1)?,
            Bound::Unbounded => u32::MAX
        };

        if min > max {
            return None;
        }

        Some((min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::IntoBound;

    #[test]
    fn into_bound() {
        assert_eq!((1..5).into_bound(), Some((1, 4)));
        assert_eq!((1..=5).into_bound(), Some((1, 5)));
        assert_eq!((..).into_bound(), Some((0, u32::MAX)));
        assert_eq!((5..5).into_bound(), None);
        assert_eq!((0..0).into_bound(), None);
        assert_eq!((u32::MAX..=u32::MAX).into_bound(), Some((u32::MAX, u32::MAX)));
    }
}
