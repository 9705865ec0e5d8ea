mod array;
mod bitset;
mod run;
mod view;

pub(crate) mod array_ops;
pub(crate) mod bitset_ops;
pub(crate) mod run_ops;

use std::mem;

pub use self::array::ArrayContainer;
pub use self::bitset::BitsetContainer;
pub use self::run::RunContainer;
pub use self::run_ops::Rle16;
pub use self::view::{ContainerRef, Iter};

/// Default maximum size of an array container before it is converted to another type
pub const DEFAULT_MAX_SIZE: usize = 4096;

/// Number of values a single container can hold
pub const CONTAINER_CAPACITY: u32 = 1 << 16;

/// The union between two containers
pub trait Union<T> {
    fn union_with(&self, other: &T) -> Container;

    /// Same as `union_with` but may reuse the storage of `self`
    fn inplace_union_with(self, other: &T) -> Container
        where Self: Sized
    {
        self.union_with(other)
    }
}

/// The intersection between two containers
pub trait Intersection<T> {
    fn intersect_with(&self, other: &T) -> Container;

    /// Compute the cardinality of the intersection without materializing it
    fn intersection_cardinality(&self, other: &T) -> usize;

    /// Check whether the intersection is non empty
    fn intersects(&self, other: &T) -> bool;

    /// Same as `intersect_with` but may reuse the storage of `self`
    fn inplace_intersect_with(self, other: &T) -> Container
        where Self: Sized
    {
        self.intersect_with(other)
    }
}

/// The difference between two containers
pub trait Difference<T> {
    fn difference_with(&self, other: &T) -> Container;

    /// Same as `difference_with` but may reuse the storage of `self`
    fn inplace_difference_with(self, other: &T) -> Container
        where Self: Sized
    {
        self.difference_with(other)
    }
}

/// The symmetric difference between two containers
pub trait SymmetricDifference<T> {
    fn symmetric_difference_with(&self, other: &T) -> Container;

    /// Same as `symmetric_difference_with` but may reuse the storage of `self`
    fn inplace_symmetric_difference_with(self, other: &T) -> Container
        where Self: Sized
    {
        self.symmetric_difference_with(other)
    }
}

/// Enum representing a container of any type
#[derive(Clone, Debug)]
pub enum Container {
    /// Array container
    Array(ArrayContainer),

    /// Bitset container
    Bitset(BitsetContainer),

    /// Run container
    Run(RunContainer)
}

/// Dispatch a binary operation over every pair of container types
macro_rules! dispatch_pair {
    ($a:expr, $b:expr, |$x:ident, $y:ident| $body:expr) => {
        match ($a, $b) {
            (Container::Array($x), Container::Array($y)) => $body,
            (Container::Array($x), Container::Bitset($y)) => $body,
            (Container::Array($x), Container::Run($y)) => $body,
            (Container::Bitset($x), Container::Array($y)) => $body,
            (Container::Bitset($x), Container::Bitset($y)) => $body,
            (Container::Bitset($x), Container::Run($y)) => $body,
            (Container::Run($x), Container::Array($y)) => $body,
            (Container::Run($x), Container::Bitset($y)) => $body,
            (Container::Run($x), Container::Run($y)) => $body
        }
    };
}

/// Dispatch an in place binary operation, moving `self` out of its slot for the duration
macro_rules! dispatch_inplace {
    ($self:ident, $other:expr, $op:ident) => {{
        let current = mem::take($self);

        *$self = match current {
            Container::Array(x) => match $other {
                Container::Array(y) => x.$op(y),
                Container::Bitset(y) => x.$op(y),
                Container::Run(y) => x.$op(y)
            },
            Container::Bitset(x) => match $other {
                Container::Array(y) => x.$op(y),
                Container::Bitset(y) => x.$op(y),
                Container::Run(y) => x.$op(y)
            },
            Container::Run(x) => match $other {
                Container::Array(y) => x.$op(y),
                Container::Bitset(y) => x.$op(y),
                Container::Run(y) => x.$op(y)
            }
        };
    }};
}

impl Default for Container {
    fn default() -> Self {
        Container::Array(ArrayContainer::new())
    }
}

impl Container {
    /// Create a container with all values in the half open range `[start, end)`
    ///
    /// # Remarks
    /// Ranges of at most `DEFAULT_MAX_SIZE` values become arrays, larger ones bitsets
    pub fn from_range(start: u32, end: u32) -> Self {
        debug_assert!(start < end && end <= CONTAINER_CAPACITY);

        let size = (end - start) as usize;

        if size <= DEFAULT_MAX_SIZE {
            Container::Array(ArrayContainer::from_range(start, end))
        }
        else {
            let mut container = BitsetContainer::new();
            container.add_range(start, end);

            Container::Bitset(container)
        }
    }

    /// Borrow the container as a read only view
    #[inline]
    pub fn view(&self) -> ContainerRef<'_> {
        match self {
            Container::Array(c) => ContainerRef::Array(c),
            Container::Bitset(c) => ContainerRef::Bitset(c, c.cardinality()),
            Container::Run(c) => ContainerRef::Run(c)
        }
    }

    /// Shrink the container to fit its content
    pub fn shrink_to_fit(&mut self) {
        match self {
            Container::Array(c) => c.shrink_to_fit(),
            Container::Bitset(_c) => (),            // Bitsets are fixed in size
            Container::Run(c) => c.shrink_to_fit()
        }
    }

    /// Add a value to the underlying container. Returns true if the value was not present
    pub fn add(&mut self, value: u16) -> bool {
        match self {
            Container::Array(c) => {
                if c.cardinality() < DEFAULT_MAX_SIZE {
                    return c.add(value);
                }

                if c.contains(value) {
                    return false;
                }

                // The array is full, promote it before inserting
                let mut bitset = BitsetContainer::from(&*c);
                bitset.add(value);
                *self = Container::Bitset(bitset);

                true
            },
            Container::Bitset(c) => c.add(value),
            Container::Run(c) => c.add(value)
        }
    }

    /// Remove a value from the underlying container. Returns true if the value was present
    ///
    /// # Remarks
    /// Bitsets are never demoted to arrays here, only by explicit conversion passes
    pub fn remove(&mut self, value: u16) -> bool {
        match self {
            Container::Array(c) => c.remove(value),
            Container::Bitset(c) => c.remove(value),
            Container::Run(c) => c.remove(value)
        }
    }

    /// Add every value in `[start, end)`
    pub fn add_range(&mut self, start: u32, end: u32) {
        match self {
            Container::Array(c) => {
                let missing = (end - start) as usize - c.cardinality_range(start, end);

                if c.cardinality() + missing <= DEFAULT_MAX_SIZE {
                    c.add_range(start, end);
                }
                else {
                    let mut bitset = BitsetContainer::from(&*c);
                    bitset.add_range(start, end);
                    *self = Container::Bitset(bitset);
                }
            },
            Container::Bitset(c) => c.add_range(start, end),
            Container::Run(c) => c.add_range(start, end)
        }
    }

    /// Remove every value in `[start, end)`
    pub fn remove_range(&mut self, start: u32, end: u32) {
        match self {
            Container::Array(c) => c.remove_range(start, end),
            Container::Bitset(c) => c.remove_range(start, end),
            Container::Run(c) => c.remove_range(start, end)
        }
    }

    /// Flip every value in `[start, end)`
    pub fn flip_range(&mut self, start: u32, end: u32) {
        match self {
            Container::Array(c) => {
                let present = c.cardinality_range(start, end);
                let added = (end - start) as usize - present;

                if c.cardinality() - present + added <= DEFAULT_MAX_SIZE {
                    c.flip_range(start, end);
                }
                else {
                    let mut bitset = BitsetContainer::from(&*c);
                    bitset.flip_range(start, end);
                    *self = Container::Bitset(bitset);
                }
            },
            Container::Bitset(c) => c.flip_range(start, end),
            Container::Run(c) => c.flip_range(start, end)
        }
    }

    /// Check if the container contains `value`
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        match self {
            Container::Array(c) => c.contains(value),
            Container::Bitset(c) => c.contains(value),
            Container::Run(c) => c.contains(value)
        }
    }

    /// Check if the container contains every value in `[start, end)`
    pub fn contains_range(&self, start: u32, end: u32) -> bool {
        match self {
            Container::Array(c) => c.cardinality_range(start, end) == (end - start) as usize,
            Container::Bitset(c) => c.cardinality_range(start, end) == (end - start) as usize,
            Container::Run(c) => run_ops::contains_range(c, start, end)
        }
    }

    /// Get the cardinality of the container
    #[inline]
    pub fn cardinality(&self) -> usize {
        match self {
            Container::Array(c) => c.cardinality(),
            Container::Bitset(c) => c.cardinality(),
            Container::Run(c) => c.cardinality()
        }
    }

    /// Check if the container holds no values
    #[inline]
    pub fn is_empty(&self) -> bool {
        match self {
            Container::Array(c) => c.is_empty(),
            Container::Bitset(c) => c.cardinality() == 0,
            Container::Run(c) => c.is_empty()
        }
    }

    /// Check if this is a run container
    #[inline]
    pub fn is_run(&self) -> bool {
        matches!(self, Container::Run(_))
    }

    /// Get the minimum value in the container
    pub fn min(&self) -> Option<u16> {
        self.view().min()
    }

    /// Get the maximum value in the container
    pub fn max(&self) -> Option<u16> {
        self.view().max()
    }

    /// Find the number of values smaller or equal to `value`
    pub fn rank(&self, value: u16) -> usize {
        self.view().rank(value)
    }

    /// Find the value with the given zero based rank within the container
    pub fn select(&self, rank: usize) -> Option<u16> {
        self.view().select(rank)
    }

    /// Get an iterator over the values of the container
    pub fn iter(&self) -> Iter<'_> {
        self.view().iter()
    }

    /// The number of runs of consecutive values in the container
    pub fn num_runs(&self) -> usize {
        match self {
            Container::Array(c) => c.num_runs(),
            Container::Bitset(c) => c.num_runs(),
            Container::Run(c) => c.num_runs()
        }
    }

    /// The number of bytes used by the payload of the container
    pub fn size_in_bytes(&self) -> usize {
        match self {
            Container::Array(c) => ArrayContainer::size_in_bytes(c.cardinality()),
            Container::Bitset(_c) => BitsetContainer::size_in_bytes(),
            Container::Run(c) => RunContainer::size_in_bytes(c.num_runs())
        }
    }

    /// Convert to the run representation if it is strictly smaller than the current one.
    /// An existing run container is converted away from runs if another form is strictly smaller.
    /// Returns true if the container changed
    pub fn run_optimize(&mut self) -> bool {
        let current = self.size_in_bytes();

        match self {
            Container::Array(_) | Container::Bitset(_) => {
                let runs = self.num_runs();

                if RunContainer::size_in_bytes(runs) < current {
                    let run = match self {
                        Container::Array(c) => RunContainer::from(&*c),
                        Container::Bitset(c) => RunContainer::from(&*c),
                        Container::Run(_) => return false
                    };

                    *self = Container::Run(run);
                    return true;
                }

                false
            },
            Container::Run(c) => {
                let converted = c.to_efficient_container();

                if converted.size_in_bytes() < current {
                    *self = converted;
                    return true;
                }

                false
            }
        }
    }

    /// Convert a run container to an array or bitset. Returns true if the container changed
    pub fn remove_run_compression(&mut self) -> bool {
        if let Container::Run(c) = self {
            *self = c.to_array_or_bitset();
            return true;
        }

        false
    }

    pub fn or(&self, other: &Self) -> Self {
        dispatch_pair!(self, other, |a, b| a.union_with(b))
    }

    pub fn and(&self, other: &Self) -> Self {
        dispatch_pair!(self, other, |a, b| a.intersect_with(b))
    }

    pub fn and_not(&self, other: &Self) -> Self {
        dispatch_pair!(self, other, |a, b| a.difference_with(b))
    }

    pub fn xor(&self, other: &Self) -> Self {
        dispatch_pair!(self, other, |a, b| a.symmetric_difference_with(b))
    }

    pub fn inplace_or(&mut self, other: &Self) {
        dispatch_inplace!(self, other, inplace_union_with);
    }

    pub fn inplace_and(&mut self, other: &Self) {
        dispatch_inplace!(self, other, inplace_intersect_with);
    }

    pub fn inplace_and_not(&mut self, other: &Self) {
        dispatch_inplace!(self, other, inplace_difference_with);
    }

    pub fn inplace_xor(&mut self, other: &Self) {
        dispatch_inplace!(self, other, inplace_symmetric_difference_with);
    }

    /// Compute the cardinality of the intersection without materializing it
    pub fn and_cardinality(&self, other: &Self) -> usize {
        dispatch_pair!(self, other, |a, b| a.intersection_cardinality(b))
    }

    /// Check whether the two containers share any value
    pub fn intersects(&self, other: &Self) -> bool {
        dispatch_pair!(self, other, |a, b| a.intersects(b))
    }

    /// Check whether every value of `self` is in `other`
    pub fn is_subset(&self, other: &Self) -> bool {
        if self.cardinality() > other.cardinality() {
            return false;
        }

        match (self, other) {
            (Container::Array(a), Container::Array(b)) => array_ops::is_subset(a, b),
            (Container::Bitset(a), Container::Bitset(b)) => bitset_ops::is_subset(a, b),
            (Container::Run(a), Container::Run(b)) => run_ops::is_subset(a, b),
            (Container::Run(a), _) => a.iter().all(|run| other.contains_range(u32::from(run.value), run.end())),
            _ => self.iter().all(|value| other.contains(value))
        }
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        self.view().same_values(&other.view())
    }
}

impl Eq for Container {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::*;

    fn containers(data: &[u16]) -> Vec<Container> {
        let array = {
            let mut c = ArrayContainer::new();
            for value in data.iter().take(DEFAULT_MAX_SIZE) {
                c.add(*value);
            }
            c
        };

        let mut all = vec![Container::Bitset(BitsetContainer::from(&array))];

        if data.len() <= DEFAULT_MAX_SIZE {
            all.push(Container::Array(array.clone()));
        }

        all.push(Container::Run(RunContainer::from(&array)));
        all
    }

    fn data_sets() -> Vec<Vec<u16>> {
        let sparse = generate_data(0..u16::MAX, 1_500);
        let dense = generate_data(0..u16::MAX, 4_000);
        let runs: Vec<u16> = (0..3_000).chain(10_000..11_000).chain(30_000..30_050).collect();

        vec![sparse, dense, runs]
    }

    fn check_all_pairs<F, G>(op: OpType, f: F, g: G)
        where F: Fn(&Container, &Container) -> Container,
              G: Fn(&mut Container, &Container)
    {
        for data_a in data_sets().iter() {
            for data_b in data_sets().iter().rev() {
                let expected = compute_result(&data_a, &data_b, op.clone());

                for a in containers(data_a).iter() {
                    for b in containers(data_b).iter() {
                        let result = f(a, b);
                        let values: Vec<u16> = result.iter().collect();

                        assert_eq!(result.cardinality(), expected.len());
                        assert_eq!(values, expected);

                        let mut inplace = a.clone();
                        g(&mut inplace, b);
                        let values: Vec<u16> = inplace.iter().collect();

                        assert_eq!(values, expected);

                        if let Container::Array(c) = &result {
                            assert!(c.cardinality() <= DEFAULT_MAX_SIZE);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn or() {
        check_all_pairs(OpType::Or, |a, b| a.or(b), |a, b| a.inplace_or(b));
    }

    #[test]
    fn and() {
        check_all_pairs(OpType::And, |a, b| a.and(b), |a, b| a.inplace_and(b));
    }

    #[test]
    fn and_not() {
        check_all_pairs(OpType::AndNot, |a, b| a.and_not(b), |a, b| a.inplace_and_not(b));
    }

    #[test]
    fn xor() {
        check_all_pairs(OpType::Xor, |a, b| a.xor(b), |a, b| a.inplace_xor(b));
    }

    #[test]
    fn cardinality_only() {
        for data_a in data_sets().iter() {
            for data_b in data_sets().iter() {
                let expected = compute_result(&data_a, &data_b, OpType::And);

                for a in containers(data_a).iter() {
                    for b in containers(data_b).iter() {
                        assert_eq!(a.and_cardinality(b), expected.len());
                        assert_eq!(a.intersects(b), !expected.is_empty());
                    }
                }
            }
        }
    }

    #[test]
    fn subset() {
        let data = generate_data(0..u16::MAX, 3_000);
        let half = &data[..data.len() / 2];

        for a in containers(half).iter() {
            for b in containers(&data).iter() {
                assert!(a.is_subset(b));
                assert!(!b.is_subset(a));
            }
        }
    }

    #[test]
    fn array_promotes_past_threshold() {
        let mut container = Container::default();
        for value in 0..(DEFAULT_MAX_SIZE as u16) {
            assert!(container.add(value * 2));
        }

        assert!(matches!(container, Container::Array(_)));
        assert!(!container.add(0));
        assert!(matches!(container, Container::Array(_)));

        assert!(container.add(1));
        assert!(matches!(container, Container::Bitset(_)));
        assert_eq!(container.cardinality(), DEFAULT_MAX_SIZE + 1);

        // Removing does not demote the bitset
        assert!(container.remove(1));
        assert!(matches!(container, Container::Bitset(_)));
        assert_eq!(container.cardinality(), DEFAULT_MAX_SIZE);
    }

    #[test]
    fn ranges() {
        let mut container = Container::from_range(10, 20);
        assert!(matches!(container, Container::Array(_)));

        container.add_range(15, 6000);
        assert!(matches!(container, Container::Bitset(_)));
        assert_eq!(container.cardinality(), 5990);
        assert!(container.contains_range(10, 6000));
        assert!(!container.contains_range(9, 6000));

        container.remove_range(100, 6000);
        assert_eq!(container.cardinality(), 90);

        container.flip_range(0, 1 << 16);
        assert_eq!(container.cardinality(), (1 << 16) - 90);
        assert!(!container.contains(50));
        assert!(container.contains(5));
    }

    #[test]
    fn run_optimize_policy() {
        // 3000 consecutive values: a single run beats the array
        let mut container = Container::from_range(0, 3000);
        assert!(container.run_optimize());
        assert!(container.is_run());
        assert_eq!(container.cardinality(), 3000);
        assert!(!container.run_optimize());

        assert!(container.remove_run_compression());
        assert!(matches!(container, Container::Array(_)));
        assert_eq!(container.cardinality(), 3000);

        // Scattered values gain nothing from runs
        let mut sparse = Container::default();
        for value in (0..1000).map(|v| v * 3) {
            sparse.add(value);
        }

        assert!(!sparse.run_optimize());
        assert!(matches!(sparse, Container::Array(_)));
    }

    #[test]
    fn run_container_converts_away_when_larger() {
        let runs: Vec<Rle16> = (0..1000).map(|i| Rle16::new(i * 4, 0)).collect();
        let mut container = Container::Run(RunContainer::from(runs));

        assert!(container.run_optimize());
        assert!(matches!(container, Container::Array(_)));
        assert_eq!(container.cardinality(), 1000);
    }

    #[test]
    fn equality_ignores_representation() {
        let data: Vec<u16> = (100..200).collect();

        let all = containers(&data);
        for a in all.iter() {
            for b in all.iter() {
                assert_eq!(a, b);
            }
        }
    }
}
