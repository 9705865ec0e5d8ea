use std::mem;
use std::ops::Deref;

use crate::container::*;
use crate::container::run_ops;

/// A container of runs of consecutive values.
///
/// Runs are kept sorted and are never allowed to overlap or touch, so each run is maximal
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunContainer {
    runs: Vec<Rle16>
}

impl RunContainer {
    /// Create a run container holding every value of the chunk
    pub fn full() -> Self {
        Self {
            runs: vec![Rle16::new(0, u16::MAX)]
        }
    }

    /// Shrink the capacity of the container to match its content
    #[inline]
    pub fn shrink_to_fit(&mut self) {
        self.runs.shrink_to_fit();
    }

    /// The number of values covered by the runs
    #[inline]
    pub fn cardinality(&self) -> usize {
        run_ops::cardinality(&self.runs)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Check if the container covers the whole chunk
    #[inline]
    pub fn is_full(&self) -> bool {
        self.runs.len() == 1 && self.runs[0] == Rle16::new(0, u16::MAX)
    }

    /// The number of runs in the container
    #[inline]
    pub fn num_runs(&self) -> usize {
        self.runs.len()
    }

    /// Check if `value` is covered by a run
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        run_ops::contains(&self.runs, value)
    }

    /// Add a value to the container. Returns true if it was not present
    pub fn add(&mut self, value: u16) -> bool {
        // Index of the first run starting after `value`
        let index = self.runs.partition_point(|run| run.value <= value);

        let merge_prev = index > 0 && {
            let prev = self.runs[index - 1];

            if u32::from(value) < prev.end() {
                return false;
            }

            prev.end() == u32::from(value)
        };

        let merge_next = index < self.runs.len() && u32::from(self.runs[index].value) == u32::from(value) + 1;

        match (merge_prev, merge_next) {
            (true, true) => {
                let next = self.runs.remove(index);
                let prev = &mut self.runs[index - 1];
                prev.length = next.sum() - prev.value;
            },
            (true, false) => {
                self.runs[index - 1].length += 1;
            },
            (false, true) => {
                let next = &mut self.runs[index];
                next.value -= 1;
                next.length += 1;
            },
            (false, false) => {
                self.runs.insert(index, Rle16::new(value, 0));
            }
        }

        true
    }

    /// Remove a value from the container. Returns true if it was present
    pub fn remove(&mut self, value: u16) -> bool {
        let index = self.runs.partition_point(|run| run.value <= value);
        if index == 0 {
            return false;
        }

        let index = index - 1;
        let run = self.runs[index];

        if u32::from(value) >= run.end() {
            return false;
        }

        if run.length == 0 {
            self.runs.remove(index);
        }
        else if value == run.value {
            self.runs[index] = Rle16::new(value + 1, run.length - 1);
        }
        else if value == run.sum() {
            self.runs[index].length -= 1;
        }
        else {
            // Split the run around the value
            self.runs[index].length = value - run.value - 1;
            self.runs.insert(index + 1, Rle16::new(value + 1, run.sum() - value - 1));
        }

        true
    }

    /// Replace the runs with the result of combining them with the single range `[start, end)`
    fn combine_range<F>(&mut self, start: u32, end: u32, op: F)
        where F: Fn(&[Rle16], &[Rle16], &mut Vec<Rle16>)
    {
        if start >= end {
            return;
        }

        let mut result = Vec::with_capacity(self.runs.len() + 1);
        op(&self.runs, &[Rle16::from_range(start, end)], &mut result);

        self.runs = result;
    }

    /// Add every value in `[start, end)`
    pub fn add_range(&mut self, start: u32, end: u32) {
        self.combine_range(start, end, run_ops::union);
    }

    /// Remove every value in `[start, end)`
    pub fn remove_range(&mut self, start: u32, end: u32) {
        self.combine_range(start, end, run_ops::difference);
    }

    /// Flip every value in `[start, end)`
    pub fn flip_range(&mut self, start: u32, end: u32) {
        self.combine_range(start, end, run_ops::symmetric_difference);
    }

    /// Convert to an array if the cardinality fits in one, otherwise to a bitset
    pub fn to_array_or_bitset(&self) -> Container {
        if self.cardinality() <= DEFAULT_MAX_SIZE {
            Container::Array(ArrayContainer::from(self))
        }
        else {
            Container::Bitset(BitsetContainer::from(self))
        }
    }

    /// Convert to whichever representation is smallest for the content.
    /// The run form is only kept if it is strictly smaller than the alternatives
    pub fn to_efficient_container(&self) -> Container {
        if Self::prefer_runs(self.runs.len(), self.cardinality()) {
            Container::Run(self.clone())
        }
        else {
            self.to_array_or_bitset()
        }
    }

    /// Wrap freshly computed runs in the smallest container for them
    pub(crate) fn into_efficient_container(self) -> Container {
        if Self::prefer_runs(self.runs.len(), self.cardinality()) {
            Container::Run(self)
        }
        else {
            self.to_array_or_bitset()
        }
    }

    fn prefer_runs(num_runs: usize, cardinality: usize) -> bool {
        let other = if cardinality <= DEFAULT_MAX_SIZE {
            ArrayContainer::size_in_bytes(cardinality)
        }
        else {
            BitsetContainer::size_in_bytes()
        };

        Self::size_in_bytes(num_runs) < other
    }

    /// Combine the runs with those of `other` using a run kernel
    fn combine<F>(&self, other: &[Rle16], op: F) -> Container
        where F: Fn(&[Rle16], &[Rle16], &mut Vec<Rle16>)
    {
        let mut result = Vec::new();
        op(&self.runs, other, &mut result);

        RunContainer::from(result).into_efficient_container()
    }
}

impl RunContainer {
    /// Get the size in bytes of the payload of a run container with `num_runs`
    pub fn size_in_bytes(num_runs: usize) -> usize {
        num_runs * mem::size_of::<Rle16>()
    }
}

impl Deref for RunContainer {
    type Target = [Rle16];

    fn deref(&self) -> &[Rle16] {
        &self.runs
    }
}

impl From<Vec<Rle16>> for RunContainer {
    /// Wrap a list of sorted, non overlapping and non adjacent runs
    fn from(runs: Vec<Rle16>) -> Self {
        debug_assert!(run_ops::is_well_formed(&runs));

        Self {
            runs
        }
    }
}

impl<'a> From<&'a ArrayContainer> for RunContainer {
    fn from(container: &'a ArrayContainer) -> Self {
        let mut runs = Vec::with_capacity(container.num_runs());
        run_ops::from_sorted(container, &mut runs);

        Self {
            runs
        }
    }
}

impl<'a> From<&'a BitsetContainer> for RunContainer {
    fn from(container: &'a BitsetContainer) -> Self {
        let mut runs = Vec::with_capacity(container.num_runs());
        run_ops::from_words(container, &mut runs);

        Self {
            runs
        }
    }
}

/// Build the runs of a sorted array
fn runs_of(array: &ArrayContainer) -> Vec<Rle16> {
    let mut runs = Vec::new();
    run_ops::from_sorted(array, &mut runs);

    runs
}

impl Union<ArrayContainer> for RunContainer {
    fn union_with(&self, other: &ArrayContainer) -> Container {
        if self.is_full() {
            return Container::Run(self.clone());
        }

        self.combine(&runs_of(other), run_ops::union)
    }
}

impl Union<BitsetContainer> for RunContainer {
    fn union_with(&self, other: &BitsetContainer) -> Container {
        other.union_with(self)
    }
}

impl Union<Self> for RunContainer {
    fn union_with(&self, other: &Self) -> Container {
        if self.is_full() {
            return Container::Run(self.clone());
        }

        if other.is_full() {
            return Container::Run(other.clone());
        }

        self.combine(&other.runs, run_ops::union)
    }
}

impl Intersection<ArrayContainer> for RunContainer {
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

impl Intersection<BitsetContainer> for RunContainer {
    fn intersect_with(&self, other: &BitsetContainer) -> Container {
        other.intersect_with(self)
    }

    fn intersection_cardinality(&self, other: &BitsetContainer) -> usize {
        other.intersection_cardinality(self)
    }

    fn intersects(&self, other: &BitsetContainer) -> bool {
        other.intersects(self)
    }
}

impl Intersection<Self> for RunContainer {
    fn intersect_with(&self, other: &Self) -> Container {
        self.combine(&other.runs, run_ops::intersect)
    }

    fn intersection_cardinality(&self, other: &Self) -> usize {
        run_ops::and_cardinality(&self.runs, &other.runs)
    }

    fn intersects(&self, other: &Self) -> bool {
        run_ops::intersects(&self.runs, &other.runs)
    }
}

impl Difference<ArrayContainer> for RunContainer {
    fn difference_with(&self, other: &ArrayContainer) -> Container {
        self.combine(&runs_of(other), run_ops::difference)
    }
}

impl Difference<BitsetContainer> for RunContainer {
    fn difference_with(&self, other: &BitsetContainer) -> Container {
        if self.cardinality() <= DEFAULT_MAX_SIZE {
            let array = ArrayContainer::from(self);
            return array.inplace_difference_with(other);
        }

        BitsetContainer::from(self).inplace_difference_with(other)
    }
}

impl Difference<Self> for RunContainer {
    fn difference_with(&self, other: &Self) -> Container {
        self.combine(&other.runs, run_ops::difference)
    }
}

impl SymmetricDifference<ArrayContainer> for RunContainer {
    fn symmetric_difference_with(&self, other: &ArrayContainer) -> Container {
        self.combine(&runs_of(other), run_ops::symmetric_difference)
    }
}

impl SymmetricDifference<BitsetContainer> for RunContainer {
    fn symmetric_difference_with(&self, other: &BitsetContainer) -> Container {
        other.symmetric_difference_with(self)
    }
}

impl SymmetricDifference<Self> for RunContainer {
    fn symmetric_difference_with(&self, other: &Self) -> Container {
        self.combine(&other.runs, run_ops::symmetric_difference)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn values(container: &RunContainer) -> Vec<u16> {
        ArrayContainer::from(container).into_raw()
    }

    #[test]
    fn add_merges_neighbours() {
        let mut container = RunContainer::default();

        assert!(container.add(5));
        assert!(container.add(7));
        assert_eq!(container.num_runs(), 2);

        // Bridging the gap joins both runs
        assert!(container.add(6));
        assert_eq!(&*container, &[Rle16::new(5, 2)]);

        assert!(container.add(4));
        assert!(container.add(8));
        assert!(!container.add(6));
        assert_eq!(&*container, &[Rle16::new(4, 4)]);

        assert!(container.add(65535));
        assert!(container.add(0));
        assert_eq!(container.num_runs(), 3);
        assert_eq!(container.cardinality(), 7);
    }

    #[test]
    fn remove_splits_runs() {
        let mut container = RunContainer::from(vec![Rle16::new(10, 10)]);

        assert!(container.remove(15));
        assert_eq!(&*container, &[Rle16::new(10, 4), Rle16::new(16, 4)]);

        assert!(container.remove(10));
        assert!(container.remove(20));
        assert!(!container.remove(20));
        assert_eq!(&*container, &[Rle16::new(11, 3), Rle16::new(16, 3)]);

        let mut single = RunContainer::from(vec![Rle16::new(3, 0)]);
        assert!(single.remove(3));
        assert!(single.is_empty());
    }

    #[test]
    fn ranges() {
        let mut container = RunContainer::from(vec![Rle16::new(10, 9), Rle16::new(40, 9)]);

        container.add_range(20, 40);
        assert_eq!(&*container, &[Rle16::new(10, 39)]);

        container.remove_range(15, 45);
        assert_eq!(values(&container), vec![10, 11, 12, 13, 14, 45, 46, 47, 48, 49]);

        container.flip_range(12, 47);
        assert_eq!(container.cardinality(), 2 + (45 - 15) + 3);
        assert!(container.contains(20));
        assert!(!container.contains(46));

        container.add_range(0, 1 << 16);
        assert!(container.is_full());
    }

    #[test]
    fn efficient_container() {
        let single = RunContainer::from(vec![Rle16::new(0, 9999)]);
        assert!(matches!(single.to_efficient_container(), Container::Run(_)));
        assert!(matches!(single.to_array_or_bitset(), Container::Bitset(_)));

        // Single values cost 4 bytes as runs and 2 bytes as an array
        let scattered: Vec<Rle16> = (0..100).map(|i| Rle16::new(i * 10, 0)).collect();
        let scattered = RunContainer::from(scattered);
        assert!(matches!(scattered.to_efficient_container(), Container::Array(_)));
    }
}
