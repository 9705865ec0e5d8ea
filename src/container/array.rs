use std::mem;
use std::ops::Deref;

use crate::container::*;
use crate::container::array_ops;

/// An array container. Elements are sorted numerically and represented as individual values in the array
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArrayContainer {
    array: Vec<u16>
}

impl ArrayContainer {
    /// Create a new, empty array container
    pub fn new() -> Self {
        Self {
            array: Vec::new()
        }
    }

    /// Create a new array container with every value in `[start, end)`
    pub fn from_range(start: u32, end: u32) -> Self {
        debug_assert!(start <= end && end <= CONTAINER_CAPACITY);

        Self {
            array: (start..end).map(|value| value as u16).collect()
        }
    }

    /// Convert the array container into it's raw representation
    #[cfg(test)]
    pub fn into_raw(self) -> Vec<u16> {
        self.array
    }

    /// The cardinality of the array container
    #[inline]
    pub fn cardinality(&self) -> usize {
        // Len is the same as the cardinality for raw sets of integers
        self.array.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// Shrink the capacity of the array container to match the cardinality
    #[inline]
    pub fn shrink_to_fit(&mut self) {
        self.array.shrink_to_fit();
    }

    /// Add a value to the array. Returns true if the value was not already present
    ///
    /// # Remarks
    /// The array may grow past `DEFAULT_MAX_SIZE`, keeping it below is up to the caller
    pub fn add(&mut self, value: u16) -> bool {
        // Appending in order is the common case
        let can_append = match self.array.last() {
            Some(max) => *max < value,
            None => true
        };

        if can_append {
            self.array.push(value);
            return true;
        }

        match self.array.binary_search(&value) {
            Ok(_index) => false,
            Err(index) => {
                self.array.insert(index, value);
                true
            }
        }
    }

    /// Remove a specified value from the array. Returns true if the value was present
    pub fn remove(&mut self, value: u16) -> bool {
        match self.array.binary_search(&value) {
            Ok(index) => {
                self.array.remove(index);
                true
            },
            Err(_index) => false
        }
    }

    /// Bounds of the slice of values within `[start, end)`
    fn range_bounds(&self, start: u32, end: u32) -> (usize, usize) {
        let lower = self.array.partition_point(|v| u32::from(*v) < start);
        let upper = lower + self.array[lower..].partition_point(|v| u32::from(*v) < end);

        (lower, upper)
    }

    /// Count the values within `[start, end)`
    pub fn cardinality_range(&self, start: u32, end: u32) -> usize {
        let (lower, upper) = self.range_bounds(start, end);

        upper - lower
    }

    /// Add every value in `[start, end)`
    pub fn add_range(&mut self, start: u32, end: u32) {
        if start >= end {
            return;
        }

        let (lower, upper) = self.range_bounds(start, end);
        self.array.splice(lower..upper, (start..end).map(|value| value as u16));
    }

    /// Remove every value in `[start, end)`
    pub fn remove_range(&mut self, start: u32, end: u32) {
        if start >= end {
            return;
        }

        let (lower, upper) = self.range_bounds(start, end);
        self.array.drain(lower..upper);
    }

    /// Flip every value in `[start, end)`
    pub fn flip_range(&mut self, start: u32, end: u32) {
        if start >= end {
            return;
        }

        let (lower, upper) = self.range_bounds(start, end);

        let mut flipped = Vec::with_capacity((end - start) as usize - (upper - lower));
        let mut present = self.array[lower..upper].iter().peekable();
        for value in start..end {
            let value = value as u16;

            if present.peek() == Some(&&value) {
                present.next();
            }
            else {
                flipped.push(value);
            }
        }

        self.array.splice(lower..upper, flipped);
    }

    /// Check if the array contains a specified value
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        self.array.binary_search(&value).is_ok()
    }

    /// The smallest element in the array. Returns `None` if `cardinality` is 0
    #[inline]
    pub fn min(&self) -> Option<u16> {
        self.array.first().copied()
    }

    /// The largest element in the array. Returns `None` if the cardinality is 0
    #[inline]
    pub fn max(&self) -> Option<u16> {
        self.array.last().copied()
    }

    /// Return the number of values equal to or smaller than `value`
    #[inline]
    pub fn rank(&self, value: u16) -> usize {
        array_ops::rank(&self.array, value)
    }

    /// Return the value at index `rank`
    #[inline]
    pub fn select(&self, rank: usize) -> Option<u16> {
        self.array.get(rank).copied()
    }

    /// Compute the number of runs in the array
    pub fn num_runs(&self) -> usize {
        array_ops::num_runs(&self.array)
    }
}

impl ArrayContainer {
    /// Get the size in bytes of the payload of an array container with `cardinality`
    pub fn size_in_bytes(cardinality: usize) -> usize {
        cardinality * mem::size_of::<u16>()
    }
}

impl Deref for ArrayContainer {
    type Target = [u16];

    fn deref(&self) -> &[u16] {
        &self.array
    }
}

impl From<Vec<u16>> for ArrayContainer {
    /// Wrap a strictly ascending list of values
    fn from(array: Vec<u16>) -> Self {
        debug_assert!(array_ops::is_strictly_sorted(&array));

        Self {
            array
        }
    }
}

impl<'a> From<&'a BitsetContainer> for ArrayContainer {
    fn from(container: &'a BitsetContainer) -> Self {
        let mut array = Vec::with_capacity(container.cardinality());
        array.extend(container.iter());

        Self {
            array
        }
    }
}

impl<'a> From<&'a RunContainer> for ArrayContainer {
    fn from(container: &'a RunContainer) -> Self {
        let mut array = Vec::with_capacity(container.cardinality());
        for run in container.iter() {
            array.extend(run.value..=run.sum());
        }

        Self {
            array
        }
    }
}

impl Union<Self> for ArrayContainer {
    fn union_with(&self, other: &Self) -> Container {
        if self.cardinality() + other.cardinality() <= DEFAULT_MAX_SIZE {
            let mut result = Vec::new();
            array_ops::union(&self.array, &other.array, &mut result);

            return Container::Array(ArrayContainer::from(result));
        }

        let mut bitset = BitsetContainer::from(self);
        bitset.add_list(&other.array);
        bitset.into_efficient_container()
    }
}

impl Union<BitsetContainer> for ArrayContainer {
    fn union_with(&self, other: &BitsetContainer) -> Container {
        other.union_with(self)
    }
}

impl Union<RunContainer> for ArrayContainer {
    fn union_with(&self, other: &RunContainer) -> Container {
        other.union_with(self)
    }
}

impl Intersection<Self> for ArrayContainer {
    fn intersect_with(&self, other: &Self) -> Container {
        let mut result = Vec::new();
        array_ops::intersect(&self.array, &other.array, &mut result);

        Container::Array(ArrayContainer::from(result))
    }

    fn intersection_cardinality(&self, other: &Self) -> usize {
        array_ops::and_cardinality(&self.array, &other.array)
    }

    fn intersects(&self, other: &Self) -> bool {
        array_ops::intersects(&self.array, &other.array)
    }
}

impl Intersection<BitsetContainer> for ArrayContainer {
    fn intersect_with(&self, other: &BitsetContainer) -> Container {
        self.clone().inplace_intersect_with(other)
    }

    fn intersection_cardinality(&self, other: &BitsetContainer) -> usize {
        self.array.iter()
            .filter(|value| other.contains(**value))
            .count()
    }

    fn intersects(&self, other: &BitsetContainer) -> bool {
        self.array.iter().any(|value| other.contains(*value))
    }

    fn inplace_intersect_with(mut self, other: &BitsetContainer) -> Container {
        self.array.retain(|value| other.contains(*value));

        Container::Array(self)
    }
}

impl Intersection<RunContainer> for ArrayContainer {
    fn intersect_with(&self, other: &RunContainer) -> Container {
        if other.is_full() {
            return Container::Array(self.clone());
        }

        self.clone().inplace_intersect_with(other)
    }

    fn intersection_cardinality(&self, other: &RunContainer) -> usize {
        self.array.iter()
            .filter(|value| other.contains(**value))
            .count()
    }

    fn intersects(&self, other: &RunContainer) -> bool {
        self.array.iter().any(|value| other.contains(*value))
    }

    fn inplace_intersect_with(mut self, other: &RunContainer) -> Container {
        self.array.retain(|value| other.contains(*value));

        Container::Array(self)
    }
}

impl Difference<Self> for ArrayContainer {
    fn difference_with(&self, other: &Self) -> Container {
        let mut result = Vec::new();
        array_ops::difference(&self.array, &other.array, &mut result);

        Container::Array(ArrayContainer::from(result))
    }
}

impl Difference<BitsetContainer> for ArrayContainer {
    fn difference_with(&self, other: &BitsetContainer) -> Container {
        self.clone().inplace_difference_with(other)
    }

    fn inplace_difference_with(mut self, other: &BitsetContainer) -> Container {
        self.array.retain(|value| !other.contains(*value));

        Container::Array(self)
    }
}

impl Difference<RunContainer> for ArrayContainer {
    fn difference_with(&self, other: &RunContainer) -> Container {
        self.clone().inplace_difference_with(other)
    }

    fn inplace_difference_with(mut self, other: &RunContainer) -> Container {
        self.array.retain(|value| !other.contains(*value));

        Container::Array(self)
    }
}

impl SymmetricDifference<Self> for ArrayContainer {
    fn symmetric_difference_with(&self, other: &Self) -> Container {
        if self.cardinality() + other.cardinality() <= DEFAULT_MAX_SIZE {
            let mut result = Vec::new();
            array_ops::symmetric_difference(&self.array, &other.array, &mut result);

            return Container::Array(ArrayContainer::from(result));
        }

        let mut bitset = BitsetContainer::from(self);
        bitset.flip_list(&other.array);
        bitset.into_efficient_container()
    }
}

impl SymmetricDifference<BitsetContainer> for ArrayContainer {
    fn symmetric_difference_with(&self, other: &BitsetContainer) -> Container {
        other.symmetric_difference_with(self)
    }
}

impl SymmetricDifference<RunContainer> for ArrayContainer {
    fn symmetric_difference_with(&self, other: &RunContainer) -> Container {
        other.symmetric_difference_with(self)
    }
}
