use std::iter::FusedIterator;
use std::slice;

use crate::container::*;
use crate::container::{array_ops, bitset_ops, run_ops};

/// A read only view over the payload of a container.
///
/// Owned containers lend one out via [`Container::view`]; frozen bitmaps build them
/// directly over the bytes of the caller's buffer
#[derive(Clone, Copy, Debug)]
pub enum ContainerRef<'a> {
    /// Sorted values
    Array(&'a [u16]),

    /// 1024 words with their cardinality
    Bitset(&'a [u64], usize),

    /// Sorted runs
    Run(&'a [Rle16])
}

impl<'a> ContainerRef<'a> {
    /// Check if the container contains `value`
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        match self {
            ContainerRef::Array(values) => values.binary_search(&value).is_ok(),
            ContainerRef::Bitset(words, _) => bitset_ops::contains(words, value),
            ContainerRef::Run(runs) => run_ops::contains(runs, value)
        }
    }

    /// The number of values in the container
    #[inline]
    pub fn cardinality(&self) -> usize {
        match self {
            ContainerRef::Array(values) => values.len(),
            ContainerRef::Bitset(_, cardinality) => *cardinality,
            ContainerRef::Run(runs) => run_ops::cardinality(runs)
        }
    }

    pub fn min(&self) -> Option<u16> {
        match self {
            ContainerRef::Array(values) => values.first().copied(),
            ContainerRef::Bitset(words, _) => bitset_ops::min(words),
            ContainerRef::Run(runs) => runs.first().map(|run| run.value)
        }
    }

    pub fn max(&self) -> Option<u16> {
        match self {
            ContainerRef::Array(values) => values.last().copied(),
            ContainerRef::Bitset(words, _) => bitset_ops::max(words),
            ContainerRef::Run(runs) => runs.last().map(|run| run.sum())
        }
    }

    /// Find the number of values smaller or equal to `value`
    pub fn rank(&self, value: u16) -> usize {
        match self {
            ContainerRef::Array(values) => array_ops::rank(values, value),
            ContainerRef::Bitset(words, _) => bitset_ops::rank(words, value),
            ContainerRef::Run(runs) => run_ops::rank(runs, value)
        }
    }

    /// Find the value with the given zero based rank within the container
    pub fn select(&self, rank: usize) -> Option<u16> {
        match self {
            ContainerRef::Array(values) => values.get(rank).copied(),
            ContainerRef::Bitset(words, _) => bitset_ops::select(words, rank),
            ContainerRef::Run(runs) => run_ops::select(runs, rank)
        }
    }

    /// Get an iterator over the values of the container
    pub fn iter(&self) -> Iter<'a> {
        match *self {
            ContainerRef::Array(values) => Iter::Array(values.iter()),
            ContainerRef::Bitset(words, cardinality) => Iter::Bitset(bitset_ops::Iter::new(words, cardinality)),
            ContainerRef::Run(runs) => Iter::Run(run_ops::Iter::new(runs))
        }
    }

    /// Copy the payload into an owned container of the same kind
    pub fn to_container(&self) -> Container {
        match self {
            ContainerRef::Array(values) => Container::Array(ArrayContainer::from(values.to_vec())),
            ContainerRef::Bitset(words, cardinality) => {
                Container::Bitset(BitsetContainer::from_words(words, *cardinality))
            },
            ContainerRef::Run(runs) => Container::Run(RunContainer::from(runs.to_vec()))
        }
    }

    /// Check whether both views hold the same set of values, whatever their representation
    pub fn same_values(&self, other: &ContainerRef) -> bool {
        match (self, other) {
            (ContainerRef::Array(a), ContainerRef::Array(b)) => a == b,
            (ContainerRef::Bitset(a, _), ContainerRef::Bitset(b, _)) => a == b,
            (ContainerRef::Run(a), ContainerRef::Run(b)) => a == b,
            _ => self.cardinality() == other.cardinality() && self.iter().eq(other.iter())
        }
    }
}

/// An iterator over the values of a container
#[derive(Clone)]
pub enum Iter<'a> {
    Array(slice::Iter<'a, u16>),
    Bitset(bitset_ops::Iter<'a>),
    Run(run_ops::Iter<'a>),
    Empty
}

impl<'a> Iter<'a> {
    /// An iterator which yields nothing
    pub fn empty() -> Self {
        Iter::Empty
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = u16;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Iter::Array(iter) => iter.next().copied(),
            Iter::Bitset(iter) => iter.next(),
            Iter::Run(iter) => iter.next(),
            Iter::Empty => None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Iter::Array(iter) => iter.size_hint(),
            Iter::Bitset(iter) => iter.size_hint(),
            Iter::Run(iter) => iter.size_hint(),
            Iter::Empty => (0, Some(0))
        }
    }
}

impl<'a> ExactSizeIterator for Iter<'a> {}

impl<'a> FusedIterator for Iter<'a> {}
