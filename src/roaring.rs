use std::fmt;
use std::iter::{FromIterator, FusedIterator};
use std::mem;
use std::ops::RangeBounds;

use tracing::trace;

use crate::IntoBound;
use crate::container::{self, array_ops, Container};
use crate::roaring_array::{self, RoaringArray};

/// A Roaring Bitmap
///
/// Roaring bitmaps are an optimized bitmap implementation for 32 bit integer sets
/// that support high performance queries and a compact memory representation.
///
/// # How it works
/// Internally data is split into a 16 bit key consisting of the upper 16 bits of the value, and a 16 bit
/// value that contains the lower 16 bits. Only the lower 16 bits are stored and the value is reconstructed
/// from the key on demand. The storage method used changes dynamically based on the number of values
/// contained within each chunk.
///
/// Generallly the representation selected is as follows
///  - At most 4096 elements : Array
///  - More than 4096 elements : Bitset
///  - Long runs of consecutive values : RLE encoded, only after calling `run_optimize`
///
/// # Performance Remarks
/// Once a bitmap is built queries done via the `inplace_<op>` variants reuse the storage of `self`.
/// Queries using the normal ops will create a new bitmap for every operation.
///
/// Containers never shrink back to an array on removal, call `run_optimize` or rebuild the bitmap
/// after heavy removals to reclaim memory.
#[derive(Clone, Default)]
pub struct RoaringBitmap {
    /// Containers of the bitmap indexed by the upper 16 bits of their values
    pub(crate) chunks: RoaringArray
}

#[inline]
fn split(value: u32) -> (u16, u16) {
    ((value >> 16) as u16, value as u16)
}

#[inline]
fn join(key: u16, low: u16) -> u32 {
    (u32::from(key) << 16) | u32::from(low)
}

/// The part of the inclusive range `[min, max]` that falls in the chunk `key`, as a half open range
#[inline]
fn chunk_range(key: u16, min: u32, max: u32) -> (u32, u32) {
    let (min_key, min_low) = split(min);
    let (max_key, max_low) = split(max);

    let start = if key == min_key { u32::from(min_low) } else { 0 };
    let end = if key == max_key { u32::from(max_low) + 1 } else { container::CONTAINER_CAPACITY };

    (start, end)
}

impl RoaringBitmap {
    /// Create a new empty roaring bitmap
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a new roaring bitmap with the specified capacity for storing containers
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            chunks: RoaringArray::with_capacity(capacity)
        }
    }

    /// Create a new roaring bitmap with every value in `range`
    pub fn from_range<R: RangeBounds<u32>>(range: R) -> Self {
        let mut bitmap = Self::new();
        bitmap.add_range(range);

        bitmap
    }

    /// Create a new roaring bitmap from a set of elements
    pub fn from_slice(slice: &[u32]) -> Self {
        let mut bitmap = Self::new();
        bitmap.add_slice(slice);

        bitmap
    }

    /// Copy the contents of `other` into self overwriting any existing values
    pub fn copy_from(&mut self, other: &RoaringBitmap) {
        self.chunks.copy_from(&other.chunks);
    }

    /// Add a value to the bitmap. Returns true if the value was not already present
    pub fn add(&mut self, value: u32) -> bool {
        let (key, low) = split(value);
        let index = self.chunks.insert_or_get(key);

        self.chunks.container_at_mut(index).add(low)
    }

    /// Add every value in `range` to the bitmap
    pub fn add_range<R: RangeBounds<u32>>(&mut self, range: R) {
        let (min, max) = match range.into_bound() {
            Some(bounds) => bounds,
            None => return
        };

        for key in split(min).0..=split(max).0 {
            let (start, end) = chunk_range(key, min, max);

            match self.chunks.get_index(key) {
                Ok(index) => self.chunks.container_at_mut(index).add_range(start, end),
                Err(index) => self.chunks.insert_at(index, key, Container::from_range(start, end))
            }
        }
    }

    /// Add a list of values to the bitmap
    ///
    /// # Remarks
    /// Consecutive values sharing a chunk skip the chunk lookup, so sorted input is fastest
    pub fn add_slice(&mut self, slice: &[u32]) {
        let mut cached: Option<(u16, usize)> = None;

        for value in slice.iter() {
            let (key, low) = split(*value);

            let index = match cached {
                Some((cached_key, index)) if cached_key == key => index,
                _ => {
                    let index = self.chunks.insert_or_get(key);
                    cached = Some((key, index));

                    index
                }
            };

            self.chunks.container_at_mut(index).add(low);
        }
    }

    /// Remove a value from the bitmap. Returns true if the value was present
    pub fn remove(&mut self, value: u32) -> bool {
        let (key, low) = split(value);

        match self.chunks.get_index(key) {
            Ok(index) => {
                let removed = self.chunks.container_at_mut(index).remove(low);
                self.chunks.remove_if_empty(index);

                removed
            },
            Err(_index) => false
        }
    }

    /// Remove every value in `range` from the bitmap
    pub fn remove_range<R: RangeBounds<u32>>(&mut self, range: R) {
        let (min, max) = match range.into_bound() {
            Some(bounds) => bounds,
            None => return
        };

        let max_key = split(max).0;
        let mut index = self.chunks.get_index(split(min).0).unwrap_or_else(|index| index);

        while index < self.chunks.len() && self.chunks.key_at(index) <= max_key {
            let (start, end) = chunk_range(self.chunks.key_at(index), min, max);
            self.chunks.container_at_mut(index).remove_range(start, end);

            if !self.chunks.remove_if_empty(index) {
                index += 1;
            }
        }
    }

    /// Remove a list of values from the bitmap
    pub fn remove_slice(&mut self, slice: &[u32]) {
        let mut cached: Option<(u16, usize)> = None;

        for value in slice.iter() {
            let (key, low) = split(*value);

            let index = match cached {
                Some((cached_key, index)) if cached_key == key => index,
                _ => match self.chunks.get_index(key) {
                    Ok(index) => {
                        cached = Some((key, index));
                        index
                    },
                    Err(_index) => continue
                }
            };

            self.chunks.container_at_mut(index).remove(low);

            if self.chunks.remove_if_empty(index) {
                cached = None;
            }
        }
    }

    /// Remove every value from the bitmap
    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    /// Flip every value in `range`: values in the bitmap are removed, the others are added
    pub fn inplace_flip<R: RangeBounds<u32>>(&mut self, range: R) {
        let (min, max) = match range.into_bound() {
            Some(bounds) => bounds,
            None => return
        };

        for key in split(min).0..=split(max).0 {
            let (start, end) = chunk_range(key, min, max);

            match self.chunks.get_index(key) {
                Ok(index) => {
                    self.chunks.container_at_mut(index).flip_range(start, end);
                    self.chunks.remove_if_empty(index);
                },
                Err(index) => self.chunks.insert_at(index, key, Container::from_range(start, end))
            }
        }
    }

    /// Same as `inplace_flip` but returns the result as a new bitmap
    pub fn flip<R: RangeBounds<u32>>(&self, range: R) -> Self {
        let mut result = self.clone();
        result.inplace_flip(range);

        result
    }

    /// Check if the bitmap contains a value
    pub fn contains(&self, value: u32) -> bool {
        let (key, low) = split(value);

        match self.chunks.get(key) {
            Some(container) => container.contains(low),
            None => false
        }
    }

    /// Check if the bitmap contains every value in `range`. An empty range is always contained
    pub fn contains_range<R: RangeBounds<u32>>(&self, range: R) -> bool {
        let (min, max) = match range.into_bound() {
            Some(bounds) => bounds,
            None => return true
        };

        for key in split(min).0..=split(max).0 {
            let (start, end) = chunk_range(key, min, max);

            match self.chunks.get(key) {
                Some(container) if container.contains_range(start, end) => (),
                _ => return false
            }
        }

        true
    }

    /// Alias for cardinality
    #[inline]
    pub fn len(&self) -> usize {
        self.cardinality()
    }

    /// Get the cardinality of the bitmap
    pub fn cardinality(&self) -> usize {
        self.chunks.iter()
            .map(|(_key, container)| container.cardinality())
            .sum()
    }

    /// Check whether the bitmap is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Release any excess memory held by the bitmap
    pub fn shrink_to_fit(&mut self) {
        self.chunks.shrink_to_fit();
    }

    /// Find the value with the given zero based rank. Returns `None` if `rank >= cardinality`
    pub fn select(&self, rank: usize) -> Option<u32> {
        let mut remaining = rank;

        for (key, container) in self.chunks.iter() {
            let cardinality = container.cardinality();

            if remaining < cardinality {
                return container.select(remaining).map(|low| join(key, low));
            }

            remaining -= cardinality;
        }

        None
    }

    /// Find the number of values smaller or equal to `value`
    pub fn rank(&self, value: u32) -> usize {
        let (high, low) = split(value);
        let mut rank = 0;

        for (key, container) in self.chunks.iter() {
            if key < high {
                rank += container.cardinality();
            }
            else {
                if key == high {
                    rank += container.rank(low);
                }

                break;
            }
        }

        rank
    }

    /// Get the smallest value in the bitmap. Returns `None` if the bitmap is empty
    pub fn min(&self) -> Option<u32> {
        let (key, container) = self.chunks.iter().next()?;

        container.min().map(|low| join(key, low))
    }

    /// Get the largest value in the bitmap. Returns `None` if the bitmap is empty
    pub fn max(&self) -> Option<u32> {
        let (key, container) = self.chunks.iter().next_back()?;

        container.max().map(|low| join(key, low))
    }

    /// Check whether every value of `self` is in `other`
    pub fn is_subset(&self, other: &Self) -> bool {
        let a = &self.chunks;
        let b = &other.chunks;

        if a.len() > b.len() {
            return false;
        }

        let mut i1 = 0;
        for (key, container) in a.iter() {
            i1 = array_ops::advance_until(&b.keys, i1, key);

            if i1 >= b.len() || b.key_at(i1) != key {
                return false;
            }

            if !container.is_subset(b.container_at(i1)) {
                return false;
            }

            i1 += 1;
        }

        true
    }

    /// Check whether the two bitmaps share any value
    pub fn intersects(&self, other: &Self) -> bool {
        let a = &self.chunks;
        let b = &other.chunks;

        let mut i0 = 0;
        let mut i1 = 0;
        while i0 < a.len() && i1 < b.len() {
            let k0 = a.key_at(i0);
            let k1 = b.key_at(i1);

            if k0 < k1 {
                i0 = array_ops::advance_until(&a.keys, i0, k1);
            }
            else if k1 < k0 {
                i1 = array_ops::advance_until(&b.keys, i1, k0);
            }
            else {
                if a.container_at(i0).intersects(b.container_at(i1)) {
                    return true;
                }

                i0 += 1;
                i1 += 1;
            }
        }

        false
    }

    /// Compute the Jaccard index between two bitmaps, `|A ∩ B| / |A ∪ B|`. Two empty bitmaps have an index of 0
    pub fn jaccard_index(&self, other: &Self) -> f64 {
        let intersection = self.and_cardinality(other);
        let union = self.cardinality() + other.cardinality() - intersection;

        if union == 0 {
            return 0.0;
        }

        intersection as f64 / union as f64
    }

    /// Merge the chunks of two bitmaps into a new one.
    /// Chunks present on one side only are copied if `keep_left` or `keep_right` is set,
    /// shared chunks are combined with `op`
    fn merge<F>(&self, other: &Self, keep_left: bool, keep_right: bool, op: F) -> Self
        where F: Fn(&Container, &Container) -> Container
    {
        let a = &self.chunks;
        let b = &other.chunks;
        let mut result = RoaringArray::with_capacity(a.len().max(b.len()));

        let mut i0 = 0;
        let mut i1 = 0;
        while i0 < a.len() && i1 < b.len() {
            let k0 = a.key_at(i0);
            let k1 = b.key_at(i1);

            if k0 < k1 {
                if keep_left {
                    result.append(k0, a.container_at(i0).clone());
                    i0 += 1;
                }
                else {
                    i0 = array_ops::advance_until(&a.keys, i0, k1);
                }
            }
            else if k1 < k0 {
                if keep_right {
                    result.append(k1, b.container_at(i1).clone());
                    i1 += 1;
                }
                else {
                    i1 = array_ops::advance_until(&b.keys, i1, k0);
                }
            }
            else {
                result.append(k0, op(a.container_at(i0), b.container_at(i1)));
                i0 += 1;
                i1 += 1;
            }
        }

        if keep_left {
            result.append_copy_range(a, i0, a.len());
        }

        if keep_right {
            result.append_copy_range(b, i1, b.len());
        }

        Self {
            chunks: result
        }
    }

    /// Same as `merge` but reuses the containers of `self`
    fn inplace_merge<F>(&mut self, other: &Self, keep_left: bool, keep_right: bool, op: F)
        where F: Fn(&mut Container, &Container)
    {
        let left = mem::take(&mut self.chunks);
        let b = &other.chunks;
        let mut result = RoaringArray::with_capacity(left.len().max(b.len()));

        let mut lhs = left.keys.into_iter()
            .zip(left.containers.into_iter())
            .peekable();

        let mut i1 = 0;
        while let Some((k0, _)) = lhs.peek() {
            let k0 = *k0;
            if i1 >= b.len() {
                break;
            }

            let k1 = b.key_at(i1);

            if k0 < k1 {
                if let Some((key, container)) = lhs.next() {
                    if keep_left {
                        result.append(key, container);
                    }
                }
            }
            else if k1 < k0 {
                if keep_right {
                    result.append(k1, b.container_at(i1).clone());
                }

                i1 += 1;
            }
            else {
                if let Some((key, mut container)) = lhs.next() {
                    op(&mut container, b.container_at(i1));
                    result.append(key, container);
                }

                i1 += 1;
            }
        }

        if keep_left {
            for (key, container) in lhs {
                result.append(key, container);
            }
        }

        if keep_right {
            result.append_copy_range(b, i1, b.len());
        }

        self.chunks = result;
    }

    /// Compute the union of `self` and `other`
    pub fn or(&self, other: &Self) -> Self {
        self.merge(other, true, true, |a, b| a.or(b))
    }

    /// Compute the intersection of `self` and `other`
    pub fn and(&self, other: &Self) -> Self {
        self.merge(other, false, false, |a, b| a.and(b))
    }

    /// Compute the difference between `self` and `other`
    pub fn and_not(&self, other: &Self) -> Self {
        self.merge(other, true, false, |a, b| a.and_not(b))
    }

    /// Compute the symmetric difference between `self` and `other`
    pub fn xor(&self, other: &Self) -> Self {
        self.merge(other, true, true, |a, b| a.xor(b))
    }

    /// Compute the union of `self` and `other` storing the result in `self`
    pub fn inplace_or(&mut self, other: &Self) {
        self.inplace_merge(other, true, true, |a, b| a.inplace_or(b));
    }

    /// Compute the intersection of `self` and `other` storing the result in `self`
    pub fn inplace_and(&mut self, other: &Self) {
        self.inplace_merge(other, false, false, |a, b| a.inplace_and(b));
    }

    /// Compute the difference between `self` and `other` storing the result in `self`
    pub fn inplace_and_not(&mut self, other: &Self) {
        self.inplace_merge(other, true, false, |a, b| a.inplace_and_not(b));
    }

    /// Compute the symmetric difference between `self` and `other` storing the result in `self`
    pub fn inplace_xor(&mut self, other: &Self) {
        self.inplace_merge(other, true, true, |a, b| a.inplace_xor(b));
    }

    /// Compute the cardinality of the union without materializing it
    pub fn or_cardinality(&self, other: &Self) -> usize {
        self.cardinality() + other.cardinality() - self.and_cardinality(other)
    }

    /// Compute the cardinality of the intersection without materializing it
    pub fn and_cardinality(&self, other: &Self) -> usize {
        let a = &self.chunks;
        let b = &other.chunks;

        let mut cardinality = 0;
        let mut i0 = 0;
        let mut i1 = 0;
        while i0 < a.len() && i1 < b.len() {
            let k0 = a.key_at(i0);
            let k1 = b.key_at(i1);

            if k0 < k1 {
                i0 = array_ops::advance_until(&a.keys, i0, k1);
            }
            else if k1 < k0 {
                i1 = array_ops::advance_until(&b.keys, i1, k0);
            }
            else {
                cardinality += a.container_at(i0).and_cardinality(b.container_at(i1));
                i0 += 1;
                i1 += 1;
            }
        }

        cardinality
    }

    /// Compute the cardinality of the difference without materializing it
    pub fn and_not_cardinality(&self, other: &Self) -> usize {
        self.cardinality() - self.and_cardinality(other)
    }

    /// Compute the cardinality of the symmetric difference without materializing it
    pub fn xor_cardinality(&self, other: &Self) -> usize {
        self.cardinality() + other.cardinality() - 2 * self.and_cardinality(other)
    }

    /// Convert containers to runs wherever that is smaller. Returns true if any container changed
    pub fn run_optimize(&mut self) -> bool {
        let mut changed = 0;
        for container in self.chunks.containers.iter_mut() {
            changed += container.run_optimize() as usize;
        }

        trace!(containers = self.chunks.len(), changed, "run optimized bitmap");

        changed > 0
    }

    /// Convert every run container to an array or a bitset. Returns true if any container changed
    pub fn remove_run_compression(&mut self) -> bool {
        let mut changed = 0;
        for container in self.chunks.containers.iter_mut() {
            changed += container.remove_run_compression() as usize;
        }

        trace!(containers = self.chunks.len(), changed, "removed run compression");

        changed > 0
    }

    /// Copy the values of the bitmap into a vector in ascending order
    pub fn to_vec(&self) -> Vec<u32> {
        let mut result = Vec::with_capacity(self.cardinality());
        result.extend(self.iter());

        result
    }

    /// Get an iterator over the values of the bitmap in ascending order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            chunks: self.chunks.iter(),
            key: 0,
            inner: container::Iter::empty(),
            remaining: self.cardinality()
        }
    }
}

impl PartialEq for RoaringBitmap {
    fn eq(&self, other: &Self) -> bool {
        self.chunks.keys == other.chunks.keys && self.chunks.containers == other.chunks.containers
    }
}

impl Eq for RoaringBitmap {}

impl FromIterator<u32> for RoaringBitmap {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut bitmap = Self::new();
        bitmap.extend(iter);

        bitmap
    }
}

impl Extend<u32> for RoaringBitmap {
    fn extend<I: IntoIterator<Item = u32>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl<'a> IntoIterator for &'a RoaringBitmap {
    type Item = u32;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for RoaringBitmap {
    /// Formats the bitmap as `{1,2,3}`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;

        for (i, value) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }

            write!(f, "{}", value)?;
        }

        f.write_str("}")
    }
}

impl fmt::Debug for RoaringBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min(), self.max()) {
            (Some(min), Some(max)) => write!(
                f,
                "RoaringBitmap<{} values between {} and {} in {} containers>",
                self.cardinality(),
                min,
                max,
                self.chunks.len()
            ),
            _ => f.write_str("RoaringBitmap<empty>")
        }
    }
}

/// An iterator over the values of a roaring bitmap in ascending order
#[derive(Clone)]
pub struct Iter<'a> {
    /// Remaining chunks of the bitmap
    chunks: roaring_array::Iter<'a>,

    /// Upper 16 bits of the chunk being iterated
    key: u32,

    /// Iterator over the chunk being iterated
    inner: container::Iter<'a>,

    /// Number of values left to yield
    remaining: usize
}

impl<'a> Iterator for Iter<'a> {
    type Item = u32;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(low) = self.inner.next() {
                self.remaining -= 1;
                return Some(self.key | u32::from(low));
            }

            let (key, container) = self.chunks.next()?;
            self.key = u32::from(key) << 16;
            self.inner = container.iter();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a> ExactSizeIterator for Iter<'a> {}

impl<'a> FusedIterator for Iter<'a> {}
