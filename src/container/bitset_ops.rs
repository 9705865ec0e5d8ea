//! Word level kernels for 65536 bit sets stored as `u64` words.
//!
//! Bit `i` of the set lives in word `i / 64` at position `i % 64`. Ranges are half open
//! and expressed as `u32` so that the end of a full chunk (`1 << 16`) is representable.

use std::iter::FusedIterator;

/// The size of a bitset in 64bit words
pub const BITSET_SIZE_IN_WORDS: usize = 1024;

macro_rules! bitset_op {
    ($name: ident, $inplace: ident, $($op:tt)*) => {
        /// Perform the operation between `a` and `b` and write the result into `out`.
        /// Returns the cardinality of the result
        pub fn $name(a: &[u64], b: &[u64], out: &mut [u64]) -> usize {
            debug_assert!(a.len() == b.len() && a.len() == out.len());

            let mut count = 0;
            let pass = a.iter()
                .zip(b.iter())
                .zip(out.iter_mut());

            for ((wa, wb), wo) in pass {
                *wo = *wa $($op)* *wb;
                count += wo.count_ones();
            }

            count as usize
        }

        /// Perform the operation between `a` and `b` storing the result in `a`.
        /// Returns the cardinality of the result
        pub fn $inplace(a: &mut [u64], b: &[u64]) -> usize {
            debug_assert!(a.len() == b.len());

            let mut count = 0;
            for (wa, wb) in a.iter_mut().zip(b.iter()) {
                *wa = *wa $($op)* *wb;
                count += wa.count_ones();
            }

            count as usize
        }
    };
}

bitset_op!(or, inplace_or, |);

bitset_op!(and, inplace_and, &);

bitset_op!(and_not, inplace_and_not, &!);

bitset_op!(xor, inplace_xor, ^);

/// Compute the cardinality of the bitset
pub fn cardinality(bitset: &[u64]) -> usize {
    let mut count = 0;
    for word in bitset.iter() {
        count += word.count_ones();
    }

    count as usize
}

/// Compute the cardinality of the intersection of two bitsets
pub fn and_cardinality(a: &[u64], b: &[u64]) -> usize {
    let mut count = 0;
    let pass = a.iter()
        .zip(b.iter());

    for (a, b) in pass {
        count += (a & b).count_ones();
    }

    count as usize
}

/// Check whether two bitsets share any set bit
pub fn intersects(a: &[u64], b: &[u64]) -> bool {
    a.iter()
        .zip(b.iter())
        .any(|(a, b)| a & b != 0)
}

/// Check whether every bit set in `a` is also set in `b`
pub fn is_subset(a: &[u64], b: &[u64]) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(a, b)| a & !b == 0)
}

/// Test the bit for `value`
#[inline]
pub fn contains(bitset: &[u64], value: u16) -> bool {
    let word = bitset[(value >> 6) as usize];

    (word >> (value & 0x3F)) & 1 == 1
}

/// Apply `f(word, mask)` to every word touched by `[start, end)`
#[inline]
fn for_range<F>(bitset: &mut [u64], start: u32, end: u32, mut f: F)
    where F: FnMut(&mut u64, u64)
{
    if start >= end {
        return;
    }

    debug_assert!(end as usize <= BITSET_SIZE_IN_WORDS * 64);

    let first_word = (start >> 6) as usize;
    let last_word = ((end - 1) >> 6) as usize;

    let first_mask = !0_u64 << (start & 0x3F);
    let last_mask = !0_u64 >> (63 - ((end - 1) & 0x3F));

    if first_word == last_word {
        f(&mut bitset[first_word], first_mask & last_mask);
        return;
    }

    f(&mut bitset[first_word], first_mask);

    for word in bitset[(first_word + 1)..last_word].iter_mut() {
        f(word, !0);
    }

    f(&mut bitset[last_word], last_mask);
}

/// Set all bits in `[start, end)`
pub fn set_range(bitset: &mut [u64], start: u32, end: u32) {
    for_range(bitset, start, end, |word, mask| *word |= mask);
}

/// Clear all bits in `[start, end)`
pub fn clear_range(bitset: &mut [u64], start: u32, end: u32) {
    for_range(bitset, start, end, |word, mask| *word &= !mask);
}

/// Flip all bits in `[start, end)`
pub fn flip_range(bitset: &mut [u64], start: u32, end: u32) {
    for_range(bitset, start, end, |word, mask| *word ^= mask);
}

/// Count the set bits in `[start, end)`
pub fn cardinality_range(bitset: &[u64], start: u32, end: u32) -> usize {
    if start >= end {
        return 0;
    }

    let first_word = (start >> 6) as usize;
    let last_word = ((end - 1) >> 6) as usize;

    let first_mask = !0_u64 << (start & 0x3F);
    let last_mask = !0_u64 >> (63 - ((end - 1) & 0x3F));

    if first_word == last_word {
        return (bitset[first_word] & first_mask & last_mask).count_ones() as usize;
    }

    let mut count = (bitset[first_word] & first_mask).count_ones();
    for word in bitset[(first_word + 1)..last_word].iter() {
        count += word.count_ones();
    }
    count += (bitset[last_word] & last_mask).count_ones();

    count as usize
}

/// Set the bits for every element in `list`. Returns the number of bits that changed
pub fn set_list(bitset: &mut [u64], list: &[u16]) -> usize {
    let mut changed = 0;
    for value in list.iter() {
        let word = &mut bitset[(*value >> 6) as usize];
        let mask = 1_u64 << (*value & 0x3F);

        changed += (*word & mask == 0) as usize;
        *word |= mask;
    }

    changed
}

/// Clear the bits for every element in `list`. Returns the number of bits that changed
pub fn clear_list(bitset: &mut [u64], list: &[u16]) -> usize {
    let mut changed = 0;
    for value in list.iter() {
        let word = &mut bitset[(*value >> 6) as usize];
        let mask = 1_u64 << (*value & 0x3F);

        changed += (*word & mask != 0) as usize;
        *word &= !mask;
    }

    changed
}

/// Flip the bits for every element in `list`. Returns the change in cardinality
pub fn flip_list(bitset: &mut [u64], list: &[u16]) -> isize {
    let mut change = 0;
    for value in list.iter() {
        let word = &mut bitset[(*value >> 6) as usize];
        let mask = 1_u64 << (*value & 0x3F);

        // +1 if the bit was clear, -1 if it was set
        change += if *word & mask == 0 { 1 } else { -1 };
        *word ^= mask;
    }

    change
}

/// Find the number of set bits at positions smaller or equal to `value`
pub fn rank(bitset: &[u64], value: u16) -> usize {
    let end = (value >> 6) as usize;

    let mut sum = 0;
    for word in bitset[..end].iter() {
        sum += word.count_ones();
    }

    let shift = 63 - (value & 0x3F);
    sum += (bitset[end] << shift).count_ones();

    sum as usize
}

/// Find the position of the set bit with the given zero based `rank`
pub fn select(bitset: &[u64], rank: usize) -> Option<u16> {
    let mut remaining = rank;

    for (i, word) in bitset.iter().enumerate() {
        let count = word.count_ones() as usize;

        if remaining < count {
            let mut w = *word;

            // Drop the lowest set bits until the requested one is the lowest
            for _ in 0..remaining {
                w &= w - 1;
            }

            return Some((i * 64) as u16 + w.trailing_zeros() as u16);
        }

        remaining -= count;
    }

    None
}

/// Get the smallest set bit
pub fn min(bitset: &[u64]) -> Option<u16> {
    for (i, word) in bitset.iter().enumerate() {
        if *word != 0 {
            return Some((i * 64) as u16 + word.trailing_zeros() as u16);
        }
    }

    None
}

/// Get the largest set bit
pub fn max(bitset: &[u64]) -> Option<u16> {
    for (i, word) in bitset.iter().enumerate().rev() {
        if *word != 0 {
            return Some((i * 64) as u16 + 63 - word.leading_zeros() as u16);
        }
    }

    None
}

/// Count the number of maximal runs of set bits
pub fn num_runs(bitset: &[u64]) -> usize {
    let mut num_runs = 0;
    let mut carry = 0;

    // A run starts wherever a set bit is preceded by a clear bit
    for word in bitset.iter() {
        let starts = *word & !((*word << 1) | carry);
        num_runs += starts.count_ones();
        carry = *word >> 63;
    }

    num_runs as usize
}

/// An iterator over the set bits of a bitset
#[derive(Clone)]
pub struct Iter<'a> {
    /// The words of the bitset
    words: &'a [u64],

    /// The index of the word being processed
    word_index: usize,

    /// The remaining bits of the current word
    word: u64,

    /// The number of set bits not yet yielded
    remaining: usize
}

impl<'a> Iter<'a> {
    /// Create an iterator over `words` which has `cardinality` set bits
    pub fn new(words: &'a [u64], cardinality: usize) -> Self {
        Self {
            words,
            word_index: 0,
            word: words.first().copied().unwrap_or(0),
            remaining: cardinality
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = u16;

    fn next(&mut self) -> Option<Self::Item> {
        while self.word == 0 {
            self.word_index += 1;

            if self.word_index >= self.words.len() {
                return None;
            }

            self.word = self.words[self.word_index];
        }

        let bit = self.word.trailing_zeros() as usize;
        self.word &= self.word - 1;
        self.remaining = self.remaining.saturating_sub(1);

        Some((self.word_index * 64 + bit) as u16)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a> ExactSizeIterator for Iter<'a> {}

impl<'a> FusedIterator for Iter<'a> {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::*;

    fn make_bitset(data: &[u16]) -> Vec<u64> {
        let mut bitset = vec![0; BITSET_SIZE_IN_WORDS];
        set_list(&mut bitset, data);

        bitset
    }

    fn run_test<F>(op: OpType, f: F)
        where F: Fn(&[u64], &[u64], &mut [u64]) -> usize
    {
        let data_a = generate_data(0..u16::MAX, 20_000);
        let data_b = generate_data(0..u16::MAX, 20_000);
        let a = make_bitset(&data_a);
        let b = make_bitset(&data_b);
        let expected = compute_result(&data_a, &data_b, op);

        let mut result = vec![0; BITSET_SIZE_IN_WORDS];
        let card = (f)(&a, &b, &mut result);

        assert_eq!(card, expected.len());

        let found: Vec<u16> = Iter::new(&result, card).collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn or() {
        run_test(OpType::Or, super::or);
    }

    #[test]
    fn and() {
        run_test(OpType::And, super::and);
    }

    #[test]
    fn and_not() {
        run_test(OpType::AndNot, super::and_not);
    }

    #[test]
    fn xor() {
        run_test(OpType::Xor, super::xor);
    }

    #[test]
    fn ranges() {
        let mut bitset = vec![0; BITSET_SIZE_IN_WORDS];

        set_range(&mut bitset, 10, 200);
        assert_eq!(cardinality(&bitset), 190);
        assert_eq!(cardinality_range(&bitset, 0, 100), 90);

        clear_range(&mut bitset, 64, 128);
        assert_eq!(cardinality(&bitset), 126);
        assert!(!contains(&bitset, 64));
        assert!(contains(&bitset, 63));

        flip_range(&mut bitset, 0, 1 << 16);
        assert_eq!(cardinality(&bitset), (1 << 16) - 126);

        set_range(&mut bitset, 0, 1 << 16);
        assert!(bitset.iter().all(|word| *word == !0));
        assert_eq!(num_runs(&bitset), 1);
    }

    #[test]
    fn rank_select() {
        let data = generate_data(0..u16::MAX, 5_000);
        let bitset = make_bitset(&data);

        for (i, value) in data.iter().enumerate() {
            assert_eq!(rank(&bitset, *value), i + 1);
            assert_eq!(select(&bitset, i), Some(*value));
        }

        assert_eq!(select(&bitset, data.len()), None);
        assert_eq!(min(&bitset), data.first().copied());
        assert_eq!(max(&bitset), data.last().copied());
    }

    #[test]
    fn num_runs_across_words() {
        let bitset = make_bitset(&[1, 2, 3, 62, 63, 64, 65, 200, 65535]);

        assert_eq!(num_runs(&bitset), 4);
    }

    #[test]
    fn list_ops() {
        let mut bitset = vec![0; BITSET_SIZE_IN_WORDS];

        assert_eq!(set_list(&mut bitset, &[1, 2, 3]), 3);
        assert_eq!(set_list(&mut bitset, &[3, 4]), 1);
        assert_eq!(clear_list(&mut bitset, &[1, 9]), 1);
        assert_eq!(flip_list(&mut bitset, &[2, 10]), 0);
        assert_eq!(cardinality(&bitset), 3);
    }
}
