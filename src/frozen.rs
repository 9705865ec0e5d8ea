//! Zero copy views over bitmaps in CRoaring's frozen layout
//!
//! # Layout
//! Payloads are grouped by kind, followed by the metadata and a trailing header:
//!  - every bitset payload, 1024 words each
//!  - every run payload, `(start, length - 1)` pairs
//!  - every array payload
//!  - `n` keys, `n` counts and `n` type codes
//!  - `u32` header `(n << 15) | 13766`
//!
//! Counts hold `cardinality - 1` for arrays and bitsets and the number of runs for run containers.

use std::io::Write;
use std::mem;

use tracing::debug;

use crate::{DeserializeError, RoaringBitmap, SerializeError};
use crate::container::{array_ops, bitset_ops, run_ops, Container, ContainerRef, Rle16};
use crate::container::bitset_ops::BITSET_SIZE_IN_WORDS;
use crate::container::DEFAULT_MAX_SIZE;
use crate::roaring_array::RoaringArray;

const FROZEN_COOKIE: u32 = 13766;
const TYPECODE_BITSET: u8 = 1;
const TYPECODE_ARRAY: u8 = 2;
const TYPECODE_RUN: u8 = 3;

/// Alignment required of frozen buffers so bitset payloads can be viewed as words
const FROZEN_ALIGNMENT: usize = mem::align_of::<u64>();

const BITSET_BYTES: usize = BITSET_SIZE_IN_WORDS * mem::size_of::<u64>();

impl RoaringBitmap {
    /// Get the exact number of bytes `serialize_frozen_into` will write
    pub fn frozen_size(&self) -> usize {
        let payloads: usize = self.chunks.containers.iter()
            .map(Container::size_in_bytes)
            .sum();

        payloads + Self::frozen_metadata_size(self.chunks.len())
    }

    /// Serialize the bitmap in the frozen layout into the front of `buf`
    ///
    /// # Returns
    /// The number of bytes written, or `InsufficientBuffer` if `buf` is shorter than `frozen_size`.
    /// Nothing is written to `buf` on failure.
    ///
    /// # Remarks
    /// The result can only be viewed with `FrozenBitmap::view` from an 8 byte aligned address
    pub fn serialize_frozen_into(&self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        let required = self.frozen_size();
        if buf.len() < required {
            return Err(SerializeError::InsufficientBuffer {
                required,
                available: buf.len()
            });
        }

        let mut out = &mut buf[..required];
        let containers = &self.chunks.containers;

        for container in containers.iter() {
            if let Container::Bitset(c) = container {
                out.write_all(bytemuck::cast_slice(c))?;
            }
        }

        for container in containers.iter() {
            if let Container::Run(c) = container {
                let runs: &[Rle16] = c;
                out.write_all(bytemuck::cast_slice(runs))?;
            }
        }

        for container in containers.iter() {
            if let Container::Array(c) = container {
                let values: &[u16] = c;
                out.write_all(bytemuck::cast_slice(values))?;
            }
        }

        out.write_all(bytemuck::cast_slice(&self.chunks.keys))?;

        for container in containers.iter() {
            let count = match container {
                Container::Run(c) => c.num_runs(),
                c => c.cardinality() - 1
            };

            out.write_all(&(count as u16).to_le_bytes())?;
        }

        for container in containers.iter() {
            let typecode = match container {
                Container::Bitset(_) => TYPECODE_BITSET,
                Container::Array(_) => TYPECODE_ARRAY,
                Container::Run(_) => TYPECODE_RUN
            };

            out.write_all(&[typecode])?;
        }

        let header = ((self.chunks.len() as u32) << 15) | FROZEN_COOKIE;
        out.write_all(&header.to_le_bytes())?;

        Ok(required)
    }

    /// Size of the keys, counts, type codes and header
    fn frozen_metadata_size(len: usize) -> usize {
        len * (2 * mem::size_of::<u16>() + mem::size_of::<u8>()) + mem::size_of::<u32>()
    }
}

/// A read only bitmap borrowing its payloads from a frozen buffer
///
/// # Remarks
/// Views are validated once when created and never copy container payloads. Use `to_bitmap`
/// to get an owned, mutable copy
#[derive(Clone, Debug)]
pub struct FrozenBitmap<'a> {
    keys: &'a [u16],
    containers: Vec<ContainerRef<'a>>
}

impl<'a> FrozenBitmap<'a> {
    /// Create a view over a buffer written by `serialize_frozen_into`
    ///
    /// # Remarks
    /// `buf` must start at an 8 byte aligned address and span exactly the frozen bitmap
    pub fn view(buf: &'a [u8]) -> Result<Self, DeserializeError> {
        Self::parse(buf)
            .map_err(|error| {
                debug!(%error, len = buf.len(), "rejected frozen bitmap");

                error
            })
    }

    fn parse(buf: &'a [u8]) -> Result<Self, DeserializeError> {
        let header_size = mem::size_of::<u32>();
        if buf.len() < header_size {
            return Err(DeserializeError::UnexpectedEof {
                needed: header_size,
                remaining: buf.len()
            });
        }

        if buf.as_ptr() as usize % FROZEN_ALIGNMENT != 0 {
            return Err(DeserializeError::Misaligned);
        }

        // The header is at the very end of the buffer
        let (body, header) = buf.split_at(buf.len() - header_size);
        let header = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);

        if header & 0x7FFF != FROZEN_COOKIE {
            return Err(DeserializeError::InvalidCookie(header));
        }

        let count = header >> 15;
        if count > 1 << 16 {
            return Err(DeserializeError::InvalidContainerCount(count));
        }

        let count = count as usize;
        let metadata = count * (2 * mem::size_of::<u16>() + mem::size_of::<u8>());
        if body.len() < metadata {
            return Err(DeserializeError::UnexpectedEof {
                needed: metadata,
                remaining: body.len()
            });
        }

        let (zones, metadata) = body.split_at(body.len() - metadata);
        let (keys, rest) = metadata.split_at(count * mem::size_of::<u16>());
        let (counts, typecodes) = rest.split_at(count * mem::size_of::<u16>());

        // Every zone ends on an even offset, so keys and counts stay aligned for u16
        let keys: &[u16] = cast(keys)?;
        let counts: &[u16] = cast(counts)?;

        if keys.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(DeserializeError::UnsortedKeys);
        }

        // Size every zone before slicing into any of them
        let mut bitset_zone = 0;
        let mut run_zone = 0;
        let mut array_zone = 0;

        for (typecode, count) in typecodes.iter().zip(counts.iter()) {
            let count = usize::from(*count);

            match *typecode {
                TYPECODE_BITSET => bitset_zone += BITSET_BYTES,
                TYPECODE_RUN => run_zone += count * mem::size_of::<Rle16>(),
                TYPECODE_ARRAY => array_zone += (count + 1) * mem::size_of::<u16>(),
                other => return Err(DeserializeError::InvalidTypeCode(other))
            }
        }

        let expected = bitset_zone + run_zone + array_zone + metadata.len() + header_size;
        if zones.len() != bitset_zone + run_zone + array_zone {
            return Err(DeserializeError::LengthMismatch {
                expected,
                found: buf.len()
            });
        }

        let (bitsets, rest) = zones.split_at(bitset_zone);
        let (runs, arrays) = rest.split_at(run_zone);

        let mut bitsets: &[u64] = cast(bitsets)?;
        let mut runs: &[Rle16] = cast(runs)?;
        let mut arrays: &[u16] = cast(arrays)?;

        let mut containers = Vec::with_capacity(count);

        for ((key, typecode), count) in keys.iter().zip(typecodes.iter()).zip(counts.iter()) {
            let (key, count) = (*key, usize::from(*count));

            let container = match *typecode {
                TYPECODE_BITSET => {
                    let (words, rest) = bitsets.split_at(BITSET_SIZE_IN_WORDS);
                    bitsets = rest;

                    if bitset_ops::cardinality(words) != count + 1 {
                        return Err(invalid(key, "bitset cardinality disagrees with its count"));
                    }

                    ContainerRef::Bitset(words, count + 1)
                },
                TYPECODE_RUN => {
                    let (container, rest) = runs.split_at(count);
                    runs = rest;

                    if container.is_empty() || !run_ops::is_well_formed(container) {
                        return Err(invalid(key, "malformed runs"));
                    }

                    ContainerRef::Run(container)
                },
                _ => {
                    let (values, rest) = arrays.split_at(count + 1);
                    arrays = rest;

                    if values.len() > DEFAULT_MAX_SIZE {
                        return Err(invalid(key, "array holds more values than an array container allows"));
                    }

                    if !array_ops::is_strictly_sorted(values) {
                        return Err(invalid(key, "array values are not strictly increasing"));
                    }

                    ContainerRef::Array(values)
                }
            };

            containers.push(container);
        }

        Ok(Self {
            keys,
            containers
        })
    }

    /// Check if the bitmap contains `value`
    pub fn contains(&self, value: u32) -> bool {
        let (key, low) = ((value >> 16) as u16, value as u16);

        match self.keys.binary_search(&key) {
            Ok(index) => self.containers[index].contains(low),
            Err(_index) => false
        }
    }

    /// Get the number of values in the bitmap
    pub fn cardinality(&self) -> usize {
        self.containers.iter()
            .map(ContainerRef::cardinality)
            .sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub fn min(&self) -> Option<u32> {
        let key = *self.keys.first()?;
        let low = self.containers.first()?.min()?;

        Some(join(key, low))
    }

    pub fn max(&self) -> Option<u32> {
        let key = *self.keys.last()?;
        let low = self.containers.last()?.max()?;

        Some(join(key, low))
    }

    /// Find the number of values smaller or equal to `value`
    pub fn rank(&self, value: u32) -> usize {
        let (high, low) = ((value >> 16) as u16, value as u16);
        let mut rank = 0;

        for (key, container) in self.keys.iter().zip(self.containers.iter()) {
            if *key < high {
                rank += container.cardinality();
            }
            else {
                if *key == high {
                    rank += container.rank(low);
                }

                break;
            }
        }

        rank
    }

    /// Find the value with the given zero based rank. Returns `None` if `rank >= cardinality`
    pub fn select(&self, rank: usize) -> Option<u32> {
        let mut remaining = rank;

        for (key, container) in self.keys.iter().zip(self.containers.iter()) {
            let cardinality = container.cardinality();

            if remaining < cardinality {
                return container.select(remaining).map(|low| join(*key, low));
            }

            remaining -= cardinality;
        }

        None
    }

    /// Get an iterator over the values of the bitmap in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.keys.iter()
            .zip(self.containers.iter())
            .flat_map(|(key, container)| {
                let key = *key;
                container.iter().map(move |low| join(key, low))
            })
    }

    pub fn to_vec(&self) -> Vec<u32> {
        let mut values = Vec::with_capacity(self.cardinality());
        values.extend(self.iter());

        values
    }

    /// Copy the view into an owned bitmap that can be mutated
    pub fn to_bitmap(&self) -> RoaringBitmap {
        let mut chunks = RoaringArray::with_capacity(self.keys.len());

        for (key, container) in self.keys.iter().zip(self.containers.iter()) {
            chunks.append(*key, container.to_container());
        }

        RoaringBitmap {
            chunks
        }
    }
}

impl<'a> PartialEq<RoaringBitmap> for FrozenBitmap<'a> {
    fn eq(&self, other: &RoaringBitmap) -> bool {
        self.keys == &other.chunks.keys[..]
            && self.containers.iter()
                .zip(other.chunks.containers.iter())
                .all(|(a, b)| a.same_values(&b.view()))
    }
}

impl<'a> PartialEq<FrozenBitmap<'a>> for RoaringBitmap {
    fn eq(&self, other: &FrozenBitmap<'a>) -> bool {
        other == self
    }
}

#[inline]
fn join(key: u16, low: u16) -> u32 {
    (u32::from(key) << 16) | u32::from(low)
}

fn invalid(key: u16, reason: &'static str) -> DeserializeError {
    DeserializeError::InvalidContainer {
        key,
        reason
    }
}

/// Reinterpret a zone of the buffer in place
fn cast<T: bytemuck::Pod>(bytes: &[u8]) -> Result<&[T], DeserializeError> {
    bytemuck::try_cast_slice(bytes).map_err(|_| DeserializeError::Misaligned)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::*;

    /// Freeze `bitmap` into word aligned storage
    fn freeze(bitmap: &RoaringBitmap) -> Vec<u64> {
        let size = bitmap.frozen_size();
        let mut words = vec![0_u64; (size + 7) / 8];

        let written = bitmap.serialize_frozen_into(bytemuck::cast_slice_mut(&mut words)).unwrap();
        assert_eq!(written, size);

        words
    }

    fn bytes_of(words: &[u64], size: usize) -> &[u8] {
        &bytemuck::cast_slice(words)[..size]
    }

    fn mixed() -> RoaringBitmap {
        let mut bitmap = RoaringBitmap::from_slice(&generate_data(0..300_000, 2_000));
        bitmap.add_range(400_000..500_000);
        bitmap.add_slice(&generate_data(600_000..700_000, 30_000));
        bitmap.add(u32::MAX);
        bitmap.run_optimize();

        bitmap
    }

    #[test]
    fn view_matches_source() {
        let bitmap = mixed();

        let stats = bitmap.statistics();
        assert!(stats.array_containers > 0 && stats.bitset_containers > 0 && stats.run_containers > 0);

        let words = freeze(&bitmap);
        let frozen = FrozenBitmap::view(bytes_of(&words, bitmap.frozen_size())).unwrap();

        assert!(frozen == bitmap);
        assert!(bitmap == frozen);
        assert_eq!(frozen.cardinality(), bitmap.cardinality());
        assert_eq!(frozen.min(), bitmap.min());
        assert_eq!(frozen.max(), Some(u32::MAX));
        assert_eq!(frozen.to_vec(), bitmap.to_vec());

        for value in [0, 1, 299_999, 400_000, 450_000, 499_999, 500_000, 650_000, u32::MAX].iter() {
            assert_eq!(frozen.contains(*value), bitmap.contains(*value));
            assert_eq!(frozen.rank(*value), bitmap.rank(*value));
        }

        for rank in [0, 1, 2_000, 50_000, bitmap.cardinality() - 1, bitmap.cardinality()].iter() {
            assert_eq!(frozen.select(*rank), bitmap.select(*rank));
        }
    }

    #[test]
    fn to_bitmap() {
        let bitmap = mixed();
        let words = freeze(&bitmap);
        let frozen = FrozenBitmap::view(bytes_of(&words, bitmap.frozen_size())).unwrap();

        let mut copy = frozen.to_bitmap();
        assert_eq!(copy, bitmap);
        assert_eq!(copy.statistics(), bitmap.statistics());

        copy.add(42);
        copy.remove(u32::MAX);
        assert!(copy.contains(42));
        assert!(frozen.contains(u32::MAX));
    }

    #[test]
    fn empty() {
        let bitmap = RoaringBitmap::new();
        assert_eq!(bitmap.frozen_size(), 4);

        let words = freeze(&bitmap);
        let frozen = FrozenBitmap::view(bytes_of(&words, 4)).unwrap();

        assert!(frozen.is_empty());
        assert_eq!(frozen.cardinality(), 0);
        assert_eq!(frozen.min(), None);
        assert_eq!(frozen.select(0), None);
        assert!(frozen == bitmap);
    }

    #[test]
    fn layout() {
        let mut bitmap = RoaringBitmap::from_slice(&[1, 2, 5]);
        bitmap.add_range(65_536..65_636);
        bitmap.run_optimize();

        let words = freeze(&bitmap);
        let bytes = bytes_of(&words, bitmap.frozen_size());

        let expected: Vec<u8> = vec![
            0, 0, 99, 0,                // runs
            1, 0, 2, 0, 5, 0,           // arrays
            0, 0, 1, 0,                 // keys
            2, 0, 1, 0,                 // counts
            TYPECODE_ARRAY, TYPECODE_RUN
        ];

        assert_eq!(&bytes[..bytes.len() - 4], &expected[..]);
        assert_eq!(&bytes[bytes.len() - 4..], &((2 << 15) | FROZEN_COOKIE).to_le_bytes());
    }

    #[test]
    fn serialize_short_buffer() {
        let bitmap = mixed();
        let mut buf = vec![0xAA; bitmap.frozen_size() - 1];

        assert!(matches!(
            bitmap.serialize_frozen_into(&mut buf),
            Err(SerializeError::InsufficientBuffer { .. })
        ));
        assert!(buf.iter().all(|byte| *byte == 0xAA));
    }

    #[test]
    fn view_misaligned() {
        let bitmap = RoaringBitmap::from_range(0..10_000);
        let size = bitmap.frozen_size();
        let words = freeze(&bitmap);

        let mut shifted = vec![0_u64; words.len() + 1];
        let shifted_bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut shifted);
        shifted_bytes[1..size + 1].copy_from_slice(bytes_of(&words, size));

        assert!(matches!(
            FrozenBitmap::view(&shifted_bytes[1..size + 1]),
            Err(DeserializeError::Misaligned)
        ));
    }

    #[test]
    fn view_invalid_input() {
        let bitmap = RoaringBitmap::from_range(0..10_000);
        let size = bitmap.frozen_size();
        let mut words = freeze(&bitmap);

        assert!(matches!(FrozenBitmap::view(&[]), Err(DeserializeError::UnexpectedEof { .. })));
        assert!(matches!(
            FrozenBitmap::view(&bytes_of(&[0], 8)[..4]),
            Err(DeserializeError::InvalidCookie(0))
        ));

        // Dropping the front of the bitset zone keeps the header readable
        assert!(matches!(
            FrozenBitmap::view(&bytes_of(&words, size)[8..]),
            Err(DeserializeError::LengthMismatch { .. })
        ));

        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut words);
        bytes[size - 5] = 7;

        assert!(matches!(
            FrozenBitmap::view(&bytes[..size]),
            Err(DeserializeError::InvalidTypeCode(7))
        ));
    }

    #[test]
    fn view_bitset_count_mismatch() {
        let bitmap = RoaringBitmap::from_range(0..10_000);
        let size = bitmap.frozen_size();
        let mut words = freeze(&bitmap);

        // Clear one member of the bitset payload
        words[0] &= !1;

        assert!(matches!(
            FrozenBitmap::view(bytes_of(&words, size)),
            Err(DeserializeError::InvalidContainer { key: 0, .. })
        ));
    }

    /// Assemble a frozen buffer from raw zones and metadata into word aligned storage
    fn assemble(zones: &[u16], keys: &[u16], counts: &[u16], typecodes: &[u8]) -> (Vec<u64>, usize) {
        let mut bytes: Vec<u8> = Vec::new();
        for value in zones.iter().chain(keys.iter()).chain(counts.iter()) {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        bytes.extend_from_slice(typecodes);
        bytes.extend_from_slice(&(((keys.len() as u32) << 15) | FROZEN_COOKIE).to_le_bytes());

        let mut words = vec![0_u64; (bytes.len() + 7) / 8];
        bytemuck::cast_slice_mut::<u64, u8>(&mut words)[..bytes.len()].copy_from_slice(&bytes);

        (words, bytes.len())
    }

    #[test]
    fn view_unsorted_keys() {
        let (words, size) = assemble(&[5, 6], &[1, 0], &[0, 0], &[TYPECODE_ARRAY, TYPECODE_ARRAY]);

        assert!(matches!(FrozenBitmap::view(bytes_of(&words, size)), Err(DeserializeError::UnsortedKeys)));
    }

    #[test]
    fn view_unsorted_array() {
        let (words, size) = assemble(&[5, 3], &[0], &[1], &[TYPECODE_ARRAY]);

        assert!(matches!(
            FrozenBitmap::view(bytes_of(&words, size)),
            Err(DeserializeError::InvalidContainer { key: 0, .. })
        ));
    }

    #[test]
    fn view_oversized_array() {
        let values: Vec<u16> = (0..5_000).collect();
        let (words, size) = assemble(&values, &[2], &[4_999], &[TYPECODE_ARRAY]);

        assert!(matches!(
            FrozenBitmap::view(bytes_of(&words, size)),
            Err(DeserializeError::InvalidContainer { key: 2, .. })
        ));

        let values: Vec<u16> = (0..4_096).collect();
        let (words, size) = assemble(&values, &[2], &[4_095], &[TYPECODE_ARRAY]);
        let frozen = FrozenBitmap::view(bytes_of(&words, size)).unwrap();

        assert_eq!(frozen.cardinality(), 4_096);
        assert_eq!(frozen.to_bitmap().statistics().array_containers, 1);
    }

    #[test]
    fn view_malformed_runs() {
        // Second run starts inside the first
        let (words, size) = assemble(&[0, 9, 5, 9], &[0], &[2], &[TYPECODE_RUN]);
        assert!(matches!(
            FrozenBitmap::view(bytes_of(&words, size)),
            Err(DeserializeError::InvalidContainer { key: 0, .. })
        ));

        // Run extends past the end of the chunk
        let (words, size) = assemble(&[65_530, 9], &[1], &[1], &[TYPECODE_RUN]);
        assert!(matches!(
            FrozenBitmap::view(bytes_of(&words, size)),
            Err(DeserializeError::InvalidContainer { key: 1, .. })
        ));

        // A run container without runs
        let (words, size) = assemble(&[], &[0], &[0], &[TYPECODE_RUN]);
        assert!(matches!(
            FrozenBitmap::view(bytes_of(&words, size)),
            Err(DeserializeError::InvalidContainer { key: 0, .. })
        ));
    }
}
