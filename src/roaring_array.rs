use std::iter::Zip;
use std::slice;

use crate::container::*;

/// The chunk index of a roaring bitmap.
///
/// Maps the upper 16 bits of a value (the key) to the container holding its lower 16 bits.
/// Keys are kept strictly increasing and empty containers are never retained.
#[derive(Clone, Debug, Default)]
pub struct RoaringArray {
    /// Keys corresponding to the containers
    pub(crate) keys: Vec<u16>,

    /// Containers, one per key
    pub(crate) containers: Vec<Container>
}

impl RoaringArray {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: Vec::with_capacity(capacity),
            containers: Vec::with_capacity(capacity)
        }
    }

    /// The number of containers
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.containers.clear();
    }

    pub fn shrink_to_fit(&mut self) {
        self.keys.shrink_to_fit();
        self.containers.shrink_to_fit();

        for container in self.containers.iter_mut() {
            container.shrink_to_fit();
        }
    }

    /// Overwrite the contents of `self` with a copy of `other`
    pub fn copy_from(&mut self, other: &RoaringArray) {
        self.keys.clear();
        self.keys.extend_from_slice(&other.keys);

        self.containers.clear();
        self.containers.extend_from_slice(&other.containers);
    }

    /// Find the index of `key`. Returns the insertion point if it is absent
    #[inline]
    pub fn get_index(&self, key: u16) -> Result<usize, usize> {
        // Appending at the end is the common case when building in order
        match self.keys.last() {
            Some(last) if *last < key => Err(self.keys.len()),
            Some(last) if *last == key => Ok(self.keys.len() - 1),
            _ => self.keys.binary_search(&key)
        }
    }

    /// Get the container for `key`, if there is one
    #[inline]
    pub fn get(&self, key: u16) -> Option<&Container> {
        self.get_index(key)
            .ok()
            .map(|index| &self.containers[index])
    }

    /// Get the index of the container for `key`, inserting an empty array container if there isn't one
    ///
    /// # Remarks
    /// The caller must fill the container or call `remove_if_empty`
    pub fn insert_or_get(&mut self, key: u16) -> usize {
        match self.get_index(key) {
            Ok(index) => index,
            Err(index) => {
                self.keys.insert(index, key);
                self.containers.insert(index, Container::default());

                index
            }
        }
    }

    /// Insert `container` under `key` at `index`
    pub fn insert_at(&mut self, index: usize, key: u16, container: Container) {
        debug_assert!(index == 0 || self.keys[index - 1] < key);
        debug_assert!(index == self.keys.len() || key < self.keys[index]);

        self.keys.insert(index, key);
        self.containers.insert(index, container);
    }

    /// Remove the container at `index`
    pub fn remove_at(&mut self, index: usize) -> (u16, Container) {
        (self.keys.remove(index), self.containers.remove(index))
    }

    /// Drop the container at `index` if it holds no values. Returns true if it was removed
    #[inline]
    pub fn remove_if_empty(&mut self, index: usize) -> bool {
        if self.containers[index].is_empty() {
            self.remove_at(index);
            return true;
        }

        false
    }

    /// Append a container with a key larger than any already present. Empty containers are skipped
    #[inline]
    pub fn append(&mut self, key: u16, container: Container) {
        debug_assert!(self.keys.last().map_or(true, |last| *last < key));

        if container.is_empty() {
            return;
        }

        self.keys.push(key);
        self.containers.push(container);
    }

    /// Append copies of the containers of `other` in `[start, end)`
    pub fn append_copy_range(&mut self, other: &RoaringArray, start: usize, end: usize) {
        debug_assert!(start <= end && end <= other.len());
        debug_assert!(start == end || self.keys.last().map_or(true, |last| *last < other.keys[start]));

        self.keys.extend_from_slice(&other.keys[start..end]);
        self.containers.extend_from_slice(&other.containers[start..end]);
    }

    #[inline]
    pub fn key_at(&self, index: usize) -> u16 {
        self.keys[index]
    }

    #[inline]
    pub fn container_at(&self, index: usize) -> &Container {
        &self.containers[index]
    }

    #[inline]
    pub fn container_at_mut(&mut self, index: usize) -> &mut Container {
        &mut self.containers[index]
    }

    /// Get an iterator over the `(key, container)` pairs in ascending key order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.keys.iter().zip(self.containers.iter())
        }
    }

    /// Check the structural invariants of the chunk index
    #[cfg(test)]
    pub fn is_valid(&self) -> bool {
        self.keys.len() == self.containers.len()
            && self.keys.windows(2).all(|pair| pair[0] < pair[1])
            && self.containers.iter().all(|container| !container.is_empty())
    }
}

/// An iterator over the `(key, container)` pairs of a chunk index
#[derive(Clone)]
pub struct Iter<'a> {
    inner: Zip<slice::Iter<'a, u16>, slice::Iter<'a, Container>>
}

impl<'a> Iterator for Iter<'a> {
    type Item = (u16, &'a Container);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, container)| (*key, container))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> DoubleEndedIterator for Iter<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(key, container)| (*key, container))
    }
}

impl<'a> ExactSizeIterator for Iter<'a> {}
