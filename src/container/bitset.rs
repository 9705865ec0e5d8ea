use std::fmt;
use std::mem;
use std::ops::Deref;

use crate::container::*;
use crate::container::bitset_ops::{self, BITSET_SIZE_IN_WORDS};

/// A bitset container used in a roaring bitmap.
///
/// # Structure
/// Contains a fixed length array of 1024 words (65536 bits). Each bit represents the presence of a value
/// in the chunk. The cardinality is maintained on every mutation so it can be read without a scan
#[derive(Clone)]
pub struct BitsetContainer {
    bitset: Vec<u64>,
    cardinality: usize
}

impl BitsetContainer {
    /// Create a new bitset with every bit cleared
    pub fn new() -> Self {
        Self {
            bitset: vec![0; BITSET_SIZE_IN_WORDS],
            cardinality: 0
        }
    }

    /// Copy a bitset out of raw words with a known cardinality
    pub fn from_words(words: &[u64], cardinality: usize) -> Self {
        debug_assert_eq!(words.len(), BITSET_SIZE_IN_WORDS);
        debug_assert_eq!(bitset_ops::cardinality(words), cardinality);

        Self {
            bitset: words.to_vec(),
            cardinality
        }
    }

    /// Take ownership of raw words with a known cardinality
    pub(crate) fn from_raw(bitset: Vec<u64>, cardinality: usize) -> Self {
        debug_assert_eq!(bitset.len(), BITSET_SIZE_IN_WORDS);

        Self {
            bitset,
            cardinality
        }
    }

    /// Set the bit for `value`. Returns true if it was previously clear
    #[inline]
    pub fn add(&mut self, value: u16) -> bool {
        let (index, mask) = Self::locate(value);
        let word = self.bitset[index];
        let added = word & mask == 0;

        self.bitset[index] = word | mask;
        self.cardinality += added as usize;

        added
    }

    /// Clear the bit for `value`. Returns true if it was previously set
    #[inline]
    pub fn remove(&mut self, value: u16) -> bool {
        let (index, mask) = Self::locate(value);
        let word = self.bitset[index];
        let removed = word & mask != 0;

        self.bitset[index] = word & !mask;
        self.cardinality -= removed as usize;

        removed
    }

    #[inline]
    fn locate(value: u16) -> (usize, u64) {
        ((value >> 6) as usize, 1 << (value & 0x3F))
    }

    /// Check if the bit for `value` is set
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        bitset_ops::contains(&self.bitset, value)
    }

    /// Set every bit in `[start, end)`
    pub fn add_range(&mut self, start: u32, end: u32) {
        let before = self.cardinality_range(start, end);
        bitset_ops::set_range(&mut self.bitset, start, end);

        self.cardinality += end.saturating_sub(start) as usize - before;
    }

    /// Clear every bit in `[start, end)`
    pub fn remove_range(&mut self, start: u32, end: u32) {
        let before = self.cardinality_range(start, end);
        bitset_ops::clear_range(&mut self.bitset, start, end);

        self.cardinality -= before;
    }

    /// Flip every bit in `[start, end)`
    pub fn flip_range(&mut self, start: u32, end: u32) {
        let before = self.cardinality_range(start, end);
        bitset_ops::flip_range(&mut self.bitset, start, end);

        self.cardinality = self.cardinality - before + (end.saturating_sub(start) as usize - before);
    }

    /// Count the set bits in `[start, end)`
    #[inline]
    pub fn cardinality_range(&self, start: u32, end: u32) -> usize {
        bitset_ops::cardinality_range(&self.bitset, start, end)
    }

    /// Set the bit of every value in `list`
    pub fn add_list(&mut self, list: &[u16]) {
        self.cardinality += bitset_ops::set_list(&mut self.bitset, list);
    }

    /// Clear the bit of every value in `list`
    pub fn remove_list(&mut self, list: &[u16]) {
        self.cardinality -= bitset_ops::clear_list(&mut self.bitset, list);
    }

    /// Flip the bit of every value in `list`
    pub fn flip_list(&mut self, list: &[u16]) {
        let change = bitset_ops::flip_list(&mut self.bitset, list);

        self.cardinality = (self.cardinality as isize + change) as usize;
    }

    /// Get the cardinality of the bitset
    #[inline]
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    /// Check whether every bit is set
    #[inline]
    pub fn is_full(&self) -> bool {
        self.cardinality == 1 << 16
    }

    /// Compute the number of runs in the bitset
    pub fn num_runs(&self) -> usize {
        bitset_ops::num_runs(&self.bitset)
    }

    /// Get an iterator over the set bits
    pub fn iter(&self) -> bitset_ops::Iter<'_> {
        bitset_ops::Iter::new(&self.bitset, self.cardinality)
    }

    /// Convert to an array if the cardinality fits in one, otherwise keep the bitset
    pub fn into_efficient_container(self) -> Container {
        if self.cardinality <= DEFAULT_MAX_SIZE {
            Container::Array(ArrayContainer::from(&self))
        }
        else {
            Container::Bitset(self)
        }
    }

    /// Same as `into_efficient_container`, except that a full chunk becomes a single run
    pub fn into_union_container(self) -> Container {
        if self.is_full() {
            Container::Run(RunContainer::full())
        }
        else {
            self.into_efficient_container()
        }
    }

    /// Run a word level operation against `other` in place and refresh the cardinality
    fn apply<F>(mut self, other: &BitsetContainer, op: F) -> Container
        where F: Fn(&mut [u64], &[u64]) -> usize
    {
        self.cardinality = op(&mut self.bitset, &other.bitset);
        self.into_efficient_container()
    }

    /// Run a word level operation between `self` and `other` into a new bitset
    fn compute<F>(&self, other: &BitsetContainer, op: F) -> Container
        where F: Fn(&[u64], &[u64], &mut [u64]) -> usize
    {
        let mut result = BitsetContainer::new();
        result.cardinality = op(&self.bitset, &other.bitset, &mut result.bitset);
        result.into_efficient_container()
    }
}

impl BitsetContainer {
    /// Get the size in bytes of the payload of a bitset container
    pub fn size_in_bytes() -> usize {
        BITSET_SIZE_IN_WORDS * mem::size_of::<u64>()
    }
}

impl Default for BitsetContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BitsetContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitsetContainer")
            .field("cardinality", &self.cardinality)
            .finish()
    }
}

impl Deref for BitsetContainer {
    type Target = [u64];

    fn deref(&self) -> &[u64] {
        &self.bitset
    }
}

impl PartialEq for BitsetContainer {
    fn eq(&self, other: &Self) -> bool {
        self.cardinality == other.cardinality && self.bitset == other.bitset
    }
}

impl Eq for BitsetContainer {}

impl<'a> From<&'a ArrayContainer> for BitsetContainer {
    fn from(container: &'a ArrayContainer) -> Self {
        let mut bitset = Self::new();
        bitset.add_list(container);

        bitset
    }
}

impl<'a> From<&'a RunContainer> for BitsetContainer {
    fn from(container: &'a RunContainer) -> Self {
        let mut bitset = Self::new();
        for run in container.iter() {
            bitset_ops::set_range(&mut bitset.bitset, u32::from(run.value), run.end());
        }

        bitset.cardinality = container.cardinality();
        bitset
    }
}

impl Union<ArrayContainer> for BitsetContainer {
    fn union_with(&self, other: &ArrayContainer) -> Container {
        self.clone().inplace_union_with(other)
    }

    fn inplace_union_with(mut self, other: &ArrayContainer) -> Container {
        self.add_list(other);
        self.into_union_container()
    }
}

impl Union<Self> for BitsetContainer {
    fn union_with(&self, other: &Self) -> Container {
        let mut result = BitsetContainer::new();
        result.cardinality = bitset_ops::or(&self.bitset, &other.bitset, &mut result.bitset);
        result.into_union_container()
    }

    fn inplace_union_with(mut self, other: &Self) -> Container {
        self.cardinality = bitset_ops::inplace_or(&mut self.bitset, &other.bitset);
        self.into_union_container()
    }
}

impl Union<RunContainer> for BitsetContainer {
    fn union_with(&self, other: &RunContainer) -> Container {
        if other.is_full() {
            return Container::Run(other.clone());
        }

        self.clone().inplace_union_with(other)
    }

    fn inplace_union_with(mut self, other: &RunContainer) -> Container {
        if other.is_full() {
            return Container::Run(other.clone());
        }

        for run in other.iter() {
            self.add_range(u32::from(run.value), run.end());
        }

        self.into_union_container()
    }
}

impl Intersection<ArrayContainer> for BitsetContainer {
    fn intersect_with(&self, other: &ArrayContainer) -> Container {
        other.intersect_with(self)
    }

    fn intersection_cardinality(&self, other: &ArrayContainer) -> usize {
        other.intersection_cardinality(self)
    }

    fn intersects(&self, other: &ArrayContainer) -> bool {
        other.intersects(self)
    }
}

impl Intersection<Self> for BitsetContainer {
    fn intersect_with(&self, other: &Self) -> Container {
        self.compute(other, bitset_ops::and)
    }

    fn intersection_cardinality(&self, other: &Self) -> usize {
        bitset_ops::and_cardinality(&self.bitset, &other.bitset)
    }

    fn intersects(&self, other: &Self) -> bool {
        bitset_ops::intersects(&self.bitset, &other.bitset)
    }

    fn inplace_intersect_with(self, other: &Self) -> Container {
        self.apply(other, bitset_ops::inplace_and)
    }
}

impl Intersection<RunContainer> for BitsetContainer {
    fn intersect_with(&self, other: &RunContainer) -> Container {
        self.clone().inplace_intersect_with(other)
    }

    fn intersection_cardinality(&self, other: &RunContainer) -> usize {
        other.iter()
            .map(|run| self.cardinality_range(u32::from(run.value), run.end()))
            .sum()
    }

    fn intersects(&self, other: &RunContainer) -> bool {
        other.iter()
            .any(|run| self.cardinality_range(u32::from(run.value), run.end()) > 0)
    }

    fn inplace_intersect_with(mut self, other: &RunContainer) -> Container {
        // Clear the gaps between runs
        let mut start = 0;
        for run in other.iter() {
            self.remove_range(start, u32::from(run.value));
            start = run.end();
        }

        self.remove_range(start, CONTAINER_CAPACITY);
        self.into_efficient_container()
    }
}

impl Difference<ArrayContainer> for BitsetContainer {
    fn difference_with(&self, other: &ArrayContainer) -> Container {
        self.clone().inplace_difference_with(other)
    }

    fn inplace_difference_with(mut self, other: &ArrayContainer) -> Container {
        self.remove_list(other);
        self.into_efficient_container()
    }
}

impl Difference<Self> for BitsetContainer {
    fn difference_with(&self, other: &Self) -> Container {
        self.compute(other, bitset_ops::and_not)
    }

    fn inplace_difference_with(self, other: &Self) -> Container {
        self.apply(other, bitset_ops::inplace_and_not)
    }
}

impl Difference<RunContainer> for BitsetContainer {
    fn difference_with(&self, other: &RunContainer) -> Container {
        self.clone().inplace_difference_with(other)
    }

    fn inplace_difference_with(mut self, other: &RunContainer) -> Container {
        for run in other.iter() {
            self.remove_range(u32::from(run.value), run.end());
        }

        self.into_efficient_container()
    }
}

impl SymmetricDifference<ArrayContainer> for BitsetContainer {
    fn symmetric_difference_with(&self, other: &ArrayContainer) -> Container {
        self.clone().inplace_symmetric_difference_with(other)
    }

    fn inplace_symmetric_difference_with(mut self, other: &ArrayContainer) -> Container {
        self.flip_list(other);
        self.into_efficient_container()
    }
}

impl SymmetricDifference<Self> for BitsetContainer {
    fn symmetric_difference_with(&self, other: &Self) -> Container {
        self.compute(other, bitset_ops::xor)
    }

    fn inplace_symmetric_difference_with(self, other: &Self) -> Container {
        self.apply(other, bitset_ops::inplace_xor)
    }
}

impl SymmetricDifference<RunContainer> for BitsetContainer {
    fn symmetric_difference_with(&self, other: &RunContainer) -> Container {
        self.clone().inplace_symmetric_difference_with(other)
    }

    fn inplace_symmetric_difference_with(mut self, other: &RunContainer) -> Container {
        for run in other.iter() {
            self.flip_range(u32::from(run.value), run.end());
        }

        self.into_efficient_container()
    }
}
