//! The portable serialization format shared with the other Roaring implementations.
//!
//! See https://github.com/RoaringBitmap/RoaringFormatSpec for details

use std::io::{self, Read, Write};
use std::mem;

use bytemuck::Zeroable;
use tracing::debug;

use crate::{DeserializeError, RoaringBitmap, SerializeError};
use crate::container::{ArrayContainer, BitsetContainer, Container, Rle16, RunContainer, DEFAULT_MAX_SIZE};
use crate::container::{array_ops, bitset_ops};
use crate::container::bitset_ops::BITSET_SIZE_IN_WORDS;
use crate::roaring_array::RoaringArray;

const SERIAL_COOKIE_NO_RUNCONTAINER: u32 = 12346;
const SERIAL_COOKIE: u32 = 12347;
const NO_OFFSET_THRESHOLD: usize = 4;
const MAX_CONTAINERS: u32 = 1 << 16;

impl RoaringBitmap {
    /// Get the exact number of bytes `serialize` will produce
    pub fn serialized_size(&self) -> usize {
        let payloads: usize = self.chunks.containers.iter()
            .map(payload_size)
            .sum();

        self.header_size() + payloads
    }

    /// Serialize the bitmap into the front of `buf`
    ///
    /// # Returns
    /// The number of bytes written, or `InsufficientBuffer` if `buf` is shorter than `serialized_size`.
    /// Nothing is written to `buf` on failure
    pub fn serialize_into(&self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        let required = self.serialized_size();
        if buf.len() < required {
            return Err(SerializeError::InsufficientBuffer {
                required,
                available: buf.len()
            });
        }

        let mut out = &mut buf[..required];
        self.serialize(&mut out)
    }

    /// Serialize the bitmap to a stream. The serialized bitmap is little endian encoded.
    ///
    /// # Returns
    /// The number of bytes written to the stream
    pub fn serialize<W: Write>(&self, buf: &mut W) -> Result<usize, SerializeError> {
        let len = self.chunks.len();
        let has_run = self.has_run();
        let mut bytes_written = 0;

        // Write the header
        if has_run {
            let cookie = SERIAL_COOKIE | (((len - 1) as u32) << 16);
            bytes_written += write_u32(buf, cookie)?;

            let mut flags = vec![0_u8; (len + 7) / 8];
            for (i, container) in self.chunks.containers.iter().enumerate() {
                if container.is_run() {
                    flags[i / 8] |= 1 << (i % 8);
                }
            }

            buf.write_all(&flags)?;
            bytes_written += flags.len();
        }
        else {
            bytes_written += write_u32(buf, SERIAL_COOKIE_NO_RUNCONTAINER)?;
            bytes_written += write_u32(buf, len as u32)?;
        }

        // Write the keys and cardinalities
        for (key, container) in self.chunks.iter() {
            let cardinality = (container.cardinality() - 1) as u16;
            bytes_written += write_u16s(buf, &[key, cardinality])?;
        }

        // Write the payload offsets if there's no run containers or we're above the no offset threshold
        if !has_run || len >= NO_OFFSET_THRESHOLD {
            let mut offset = self.header_size();

            for container in self.chunks.containers.iter() {
                bytes_written += write_u32(buf, offset as u32)?;
                offset += payload_size(container);
            }
        }

        for container in self.chunks.containers.iter() {
            bytes_written += write_payload(buf, container)?;
        }

        Ok(bytes_written)
    }

    /// Deserialize a bitmap from the front of `buf`. Trailing bytes are ignored
    ///
    /// # Remarks
    /// Every length, key and payload is validated before it is used, malformed input is rejected
    /// as a whole and never yields a partial bitmap
    pub fn deserialize(buf: &[u8]) -> Result<Self, DeserializeError> {
        let mut source = SliceSource {
            bytes: buf
        };

        decode(&mut source)
            .map_err(|error| {
                let offset = buf.len() - source.bytes.len();
                debug!(%error, offset, len = buf.len(), "rejected serialized bitmap");

                error
            })
    }

    /// Deserialize a bitmap from a stream, applying the same validation as `deserialize`
    pub fn deserialize_from<R: Read>(reader: R) -> Result<Self, DeserializeError> {
        let mut source = ReaderSource {
            reader
        };

        decode(&mut source)
            .map_err(|error| {
                debug!(%error, "rejected serialized bitmap stream");

                error
            })
    }

    /// Calculate the size of the serialized header for the bitmap
    fn header_size(&self) -> usize {
        let len = self.chunks.len();

        if self.has_run() {
            if len < NO_OFFSET_THRESHOLD {
                4 + (len + 7) / 8 + 4 * len
            }
            else {
                4 + (len + 7) / 8 + 8 * len
            }
        }
        else {
            4 + 4 + 8 * len
        }
    }

    /// Check if the bitmap contains any run containers
    fn has_run(&self) -> bool {
        self.chunks.containers.iter().any(Container::is_run)
    }
}

/// The size of the serialized payload of a container
fn payload_size(container: &Container) -> usize {
    match container {
        Container::Run(c) => mem::size_of::<u16>() + RunContainer::size_in_bytes(c.num_runs()),
        c if c.cardinality() > DEFAULT_MAX_SIZE => BitsetContainer::size_in_bytes(),
        c => ArrayContainer::size_in_bytes(c.cardinality())
    }
}

/// Write the payload of a container, non run containers are stored by cardinality rather than by kind
fn write_payload<W: Write>(buf: &mut W, container: &Container) -> io::Result<usize> {
    match container {
        Container::Run(c) => {
            let runs: &[Rle16] = c;
            let header = write_u16s(buf, &[runs.len() as u16])?;

            Ok(header + write_u16s(buf, bytemuck::cast_slice(runs))?)
        },
        Container::Array(c) if c.cardinality() <= DEFAULT_MAX_SIZE => write_u16s(buf, c),
        Container::Bitset(c) if c.cardinality() > DEFAULT_MAX_SIZE => write_u64s(buf, c),
        Container::Array(c) => write_u64s(buf, &BitsetContainer::from(c)),
        Container::Bitset(c) => write_u16s(buf, &ArrayContainer::from(c))
    }
}

fn write_u32<W: Write>(buf: &mut W, value: u32) -> io::Result<usize> {
    buf.write_all(&value.to_le_bytes())?;

    Ok(mem::size_of::<u32>())
}

fn write_u16s<W: Write>(buf: &mut W, values: &[u16]) -> io::Result<usize> {
    if cfg!(target_endian = "little") {
        buf.write_all(bytemuck::cast_slice(values))?;
    }
    else {
        for value in values.iter() {
            buf.write_all(&value.to_le_bytes())?;
        }
    }

    Ok(values.len() * mem::size_of::<u16>())
}

fn write_u64s<W: Write>(buf: &mut W, values: &[u64]) -> io::Result<usize> {
    if cfg!(target_endian = "little") {
        buf.write_all(bytemuck::cast_slice(values))?;
    }
    else {
        for value in values.iter() {
            buf.write_all(&value.to_le_bytes())?;
        }
    }

    Ok(values.len() * mem::size_of::<u64>())
}

/// A source of serialized bytes
trait Source {
    /// Fill `buf` entirely or fail
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), DeserializeError>;

    fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, DeserializeError> {
        let mut bytes = vec![0; count];
        self.fill(&mut bytes)?;

        Ok(bytes)
    }

    fn read_u32(&mut self) -> Result<u32, DeserializeError> {
        let mut bytes = [0; mem::size_of::<u32>()];
        self.fill(&mut bytes)?;

        Ok(u32::from_le_bytes(bytes))
    }

    fn read_u16(&mut self) -> Result<u16, DeserializeError> {
        let mut bytes = [0; mem::size_of::<u16>()];
        self.fill(&mut bytes)?;

        Ok(u16::from_le_bytes(bytes))
    }

    fn read_u16s(&mut self, count: usize) -> Result<Vec<u16>, DeserializeError> {
        let mut values = vec![0_u16; count];
        self.fill(bytemuck::cast_slice_mut(&mut values))?;

        for value in values.iter_mut() {
            *value = u16::from_le(*value);
        }

        Ok(values)
    }

    fn read_u64s(&mut self, count: usize) -> Result<Vec<u64>, DeserializeError> {
        let mut values = vec![0_u64; count];
        self.fill(bytemuck::cast_slice_mut(&mut values))?;

        for value in values.iter_mut() {
            *value = u64::from_le(*value);
        }

        Ok(values)
    }

    fn read_runs(&mut self, count: usize) -> Result<Vec<Rle16>, DeserializeError> {
        let mut runs = vec![Rle16::zeroed(); count];
        self.fill(bytemuck::cast_slice_mut(&mut runs))?;

        for run in runs.iter_mut() {
            run.value = u16::from_le(run.value);
            run.length = u16::from_le(run.length);
        }

        Ok(runs)
    }
}

/// Bounds checked reads out of a byte slice
struct SliceSource<'a> {
    bytes: &'a [u8]
}

impl<'a> Source for SliceSource<'a> {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), DeserializeError> {
        if buf.len() > self.bytes.len() {
            return Err(DeserializeError::UnexpectedEof {
                needed: buf.len(),
                remaining: self.bytes.len()
            });
        }

        let (head, tail) = self.bytes.split_at(buf.len());
        buf.copy_from_slice(head);
        self.bytes = tail;

        Ok(())
    }
}

struct ReaderSource<R> {
    reader: R
}

impl<R: Read> Source for ReaderSource<R> {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), DeserializeError> {
        self.reader.read_exact(buf)?;

        Ok(())
    }
}

fn decode<S: Source>(source: &mut S) -> Result<RoaringBitmap, DeserializeError> {
    // Read out the cookie and number of containers
    let cookie = source.read_u32()?;
    let (count, has_run) = {
        if cookie & 0xFFFF == SERIAL_COOKIE {
            ((cookie >> 16) + 1, true)
        }
        else if cookie == SERIAL_COOKIE_NO_RUNCONTAINER {
            (source.read_u32()?, false)
        }
        else {
            return Err(DeserializeError::InvalidCookie(cookie));
        }
    };

    if count > MAX_CONTAINERS {
        return Err(DeserializeError::InvalidContainerCount(count));
    }

    let count = count as usize;
    let run_flags = if has_run {
        source.read_bytes((count + 7) / 8)?
    }
    else {
        Vec::new()
    };

    // Keys and cardinalities are interleaved
    let descriptors = source.read_u16s(2 * count)?;
    let keys: Vec<u16> = descriptors.iter()
        .step_by(2)
        .copied()
        .collect();

    if keys.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(DeserializeError::UnsortedKeys);
    }

    // Payloads are read in order, the offset header is skipped
    if !has_run || count >= NO_OFFSET_THRESHOLD {
        source.read_bytes(count * mem::size_of::<u32>())?;
    }

    let mut chunks = RoaringArray::with_capacity(count);

    for (i, descriptor) in descriptors.chunks_exact(2).enumerate() {
        let key = descriptor[0];
        let cardinality = usize::from(descriptor[1]) + 1;
        let is_run = has_run && run_flags[i / 8] & (1 << (i % 8)) != 0;

        let container = if is_run {
            read_run(source, key, cardinality)?
        }
        else if cardinality > DEFAULT_MAX_SIZE {
            read_bitset(source, key, cardinality)?
        }
        else {
            read_array(source, key, cardinality)?
        };

        chunks.append(key, container);
    }

    Ok(RoaringBitmap {
        chunks
    })
}

fn invalid(key: u16, reason: &'static str) -> DeserializeError {
    DeserializeError::InvalidContainer {
        key,
        reason
    }
}

fn read_array<S: Source>(source: &mut S, key: u16, cardinality: usize) -> Result<Container, DeserializeError> {
    let values = source.read_u16s(cardinality)?;

    if !array_ops::is_strictly_sorted(&values) {
        return Err(invalid(key, "array values are not strictly increasing"));
    }

    Ok(Container::Array(ArrayContainer::from(values)))
}

fn read_bitset<S: Source>(source: &mut S, key: u16, cardinality: usize) -> Result<Container, DeserializeError> {
    let words = source.read_u64s(BITSET_SIZE_IN_WORDS)?;

    if bitset_ops::cardinality(&words) != cardinality {
        return Err(invalid(key, "bitset cardinality disagrees with its descriptor"));
    }

    Ok(Container::Bitset(BitsetContainer::from_raw(words, cardinality)))
}

fn read_run<S: Source>(source: &mut S, key: u16, cardinality: usize) -> Result<Container, DeserializeError> {
    let num_runs = usize::from(source.read_u16()?);
    let runs = source.read_runs(num_runs)?;

    if runs.is_empty() {
        return Err(invalid(key, "run container without runs"));
    }

    // Touching runs are coalesced so every run stays maximal
    let mut merged: Vec<Rle16> = Vec::with_capacity(runs.len());
    for run in runs {
        if u32::from(run.value) + u32::from(run.length) > u32::from(u16::MAX) {
            return Err(invalid(key, "run extends past the end of the chunk"));
        }

        match merged.last_mut() {
            Some(last) if u32::from(run.value) < last.end() => {
                return Err(invalid(key, "runs overlap or are out of order"));
            },
            Some(last) if u32::from(run.value) == last.end() => {
                last.length += run.length + 1;
            },
            _ => merged.push(run)
        }
    }

    let container = RunContainer::from(merged);
    if container.cardinality() != cardinality {
        return Err(invalid(key, "run cardinality disagrees with its descriptor"));
    }

    Ok(Container::Run(container))
}

#[cfg(feature = "serde")]
mod serde_impl {
    use std::fmt;

    use serde::de::{self, SeqAccess, Visitor};
    use serde::ser;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::RoaringBitmap;

    /// Bitmaps are serialized as the bytes of their portable encoding
    impl Serialize for RoaringBitmap {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut bytes = Vec::with_capacity(self.serialized_size());
            RoaringBitmap::serialize(self, &mut bytes)
                .map_err(ser::Error::custom)?;

            serializer.serialize_bytes(&bytes)
        }
    }

    impl<'de> Deserialize<'de> for RoaringBitmap {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_bytes(BitmapVisitor)
        }
    }

    struct BitmapVisitor;

    impl<'de> Visitor<'de> for BitmapVisitor {
        type Value = RoaringBitmap;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a roaring bitmap in the portable format")
        }

        fn visit_bytes<E: de::Error>(self, bytes: &[u8]) -> Result<RoaringBitmap, E> {
            RoaringBitmap::deserialize(bytes).map_err(E::custom)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RoaringBitmap, A::Error> {
            let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(byte) = seq.next_element::<u8>()? {
                bytes.push(byte);
            }

            RoaringBitmap::deserialize(&bytes).map_err(de::Error::custom)
        }
    }
}
