//! Kernels over sorted slices of runs.
//!
//! A slice of runs is well formed when every run fits in the chunk and each run starts
//! at least two past the end of the previous one (runs neither overlap nor touch).

use std::iter::FusedIterator;

use bytemuck::{Pod, Zeroable};

/// A run of consecutive values `value ..= value + length`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Rle16 {
    pub value: u16,
    pub length: u16
}

impl Rle16 {
    pub fn new(value: u16, length: u16) -> Self {
        Self {
            value,
            length
        }
    }

    /// Create a run covering the half open range `[start, end)`
    #[inline]
    pub fn from_range(start: u32, end: u32) -> Self {
        debug_assert!(start < end && end <= 1 << 16);

        Self::new(start as u16, (end - start - 1) as u16)
    }

    /// The last value in the run
    #[inline]
    pub fn sum(&self) -> u16 {
        self.value + self.length
    }

    /// The exclusive end of the run
    #[inline]
    pub fn end(&self) -> u32 {
        u32::from(self.value) + u32::from(self.length) + 1
    }

    /// The number of values in the run
    #[inline]
    pub fn len(&self) -> usize {
        self.length as usize + 1
    }
}

/// Compute the number of values covered by the runs
pub fn cardinality(runs: &[Rle16]) -> usize {
    runs.iter()
        .map(|run| run.len())
        .sum()
}

/// Find the index of the run that may contain `value` (the last run starting at or before it)
#[inline]
fn candidate(runs: &[Rle16], value: u16) -> Option<usize> {
    let index = runs.partition_point(|run| run.value <= value);

    if index == 0 {
        None
    }
    else {
        Some(index - 1)
    }
}

/// Check if `value` is covered by a run
pub fn contains(runs: &[Rle16], value: u16) -> bool {
    match candidate(runs, value) {
        Some(index) => u32::from(value) < runs[index].end(),
        None => false
    }
}

/// Check if every value in `[start, end)` is covered
pub fn contains_range(runs: &[Rle16], start: u32, end: u32) -> bool {
    if start >= end {
        return true;
    }

    match candidate(runs, start as u16) {
        Some(index) => end <= runs[index].end(),
        None => false
    }
}

/// Find the number of values smaller or equal to `value`
pub fn rank(runs: &[Rle16], value: u16) -> usize {
    let value = u32::from(value);

    let mut sum = 0;
    for run in runs.iter() {
        let start = u32::from(run.value);

        if value < start {
            break;
        }

        if value < run.end() {
            return sum + (value - start) as usize + 1;
        }

        sum += run.len();
    }

    sum
}

/// Find the value with the given zero based `rank`
pub fn select(runs: &[Rle16], rank: usize) -> Option<u16> {
    let mut remaining = rank;

    for run in runs.iter() {
        if remaining < run.len() {
            return Some(run.value + remaining as u16);
        }

        remaining -= run.len();
    }

    None
}

/// Append `[start, end)` to `out`, merging with the last run if they overlap or touch
#[inline]
pub fn append(out: &mut Vec<Rle16>, start: u32, end: u32) {
    if let Some(last) = out.last_mut() {
        let last_end = last.end();

        if start <= last_end {
            if end > last_end {
                *last = Rle16::from_range(u32::from(last.value), end);
            }

            return;
        }
    }

    out.push(Rle16::from_range(start, end));
}

/// Compute the union of two run slices and append it to `out`
pub fn union(a: &[Rle16], b: &[Rle16], out: &mut Vec<Rle16>) {
    out.reserve(a.len() + b.len());

    let mut i_a = 0;
    let mut i_b = 0;

    while i_a < a.len() && i_b < b.len() {
        let run = if a[i_a].value <= b[i_b].value {
            i_a += 1;
            a[i_a - 1]
        }
        else {
            i_b += 1;
            b[i_b - 1]
        };

        append(out, u32::from(run.value), run.end());
    }

    for run in a[i_a..].iter().chain(b[i_b..].iter()) {
        append(out, u32::from(run.value), run.end());
    }
}

/// Compute the intersection of two run slices and append it to `out`
pub fn intersect(a: &[Rle16], b: &[Rle16], out: &mut Vec<Rle16>) {
    let mut i_a = 0;
    let mut i_b = 0;

    while i_a < a.len() && i_b < b.len() {
        let start = a[i_a].value.max(b[i_b].value) as u32;
        let end = a[i_a].end().min(b[i_b].end());

        if start < end {
            out.push(Rle16::from_range(start, end));
        }

        // Advance whichever run finishes first
        if a[i_a].end() < b[i_b].end() {
            i_a += 1;
        }
        else if b[i_b].end() < a[i_a].end() {
            i_b += 1;
        }
        else {
            i_a += 1;
            i_b += 1;
        }
    }
}

/// Compute the difference `a \ b` and append it to `out`
pub fn difference(a: &[Rle16], b: &[Rle16], out: &mut Vec<Rle16>) {
    let mut i_b = 0;

    for run in a.iter() {
        let mut start = u32::from(run.value);
        let end = run.end();

        // Skip runs in `b` which end before this run starts
        while i_b < b.len() && b[i_b].end() <= start {
            i_b += 1;
        }

        let mut j = i_b;
        while j < b.len() && u32::from(b[j].value) < end {
            let cut_start = u32::from(b[j].value);

            if cut_start > start {
                out.push(Rle16::from_range(start, cut_start));
            }

            start = start.max(b[j].end());

            if start >= end {
                break;
            }

            j += 1;
        }

        if start < end {
            out.push(Rle16::from_range(start, end));
        }
    }
}

/// Compute the symmetric difference of two run slices and append it to `out`
///
/// # Remarks
/// The boundaries of `A ⊕ B` are exactly the boundaries that appear in only one of the inputs,
/// so the result is produced by merging both boundary sequences and cancelling duplicates
pub fn symmetric_difference(a: &[Rle16], b: &[Rle16], out: &mut Vec<Rle16>) {
    let bounds_a = a.iter().flat_map(|run| [u32::from(run.value), run.end()]);
    let mut bounds_b = b.iter().flat_map(|run| [u32::from(run.value), run.end()]).peekable();
    let mut bounds_a = bounds_a.peekable();

    let mut open: Option<u32> = None;
    let mut toggle = |point: u32, out: &mut Vec<Rle16>| {
        match open.take() {
            Some(start) => out.push(Rle16::from_range(start, point)),
            None => open = Some(point)
        }
    };

    loop {
        match (bounds_a.peek().copied(), bounds_b.peek().copied()) {
            (Some(p_a), Some(p_b)) => {
                if p_a < p_b {
                    bounds_a.next();
                    toggle(p_a, out);
                }
                else if p_b < p_a {
                    bounds_b.next();
                    toggle(p_b, out);
                }
                else {
                    bounds_a.next();
                    bounds_b.next();
                }
            },
            (Some(p_a), None) => {
                bounds_a.next();
                toggle(p_a, out);
            },
            (None, Some(p_b)) => {
                bounds_b.next();
                toggle(p_b, out);
            },
            (None, None) => break
        }
    }
}

/// Find the cardinality of the intersection of two run slices
pub fn and_cardinality(a: &[Rle16], b: &[Rle16]) -> usize {
    let mut count = 0;
    let mut i_a = 0;
    let mut i_b = 0;

    while i_a < a.len() && i_b < b.len() {
        let start = a[i_a].value.max(b[i_b].value) as u32;
        let end = a[i_a].end().min(b[i_b].end());

        if start < end {
            count += (end - start) as usize;
        }

        if a[i_a].end() <= b[i_b].end() {
            i_a += 1;
        }
        else {
            i_b += 1;
        }
    }

    count
}

/// Check whether two run slices overlap anywhere
pub fn intersects(a: &[Rle16], b: &[Rle16]) -> bool {
    let mut i_a = 0;
    let mut i_b = 0;

    while i_a < a.len() && i_b < b.len() {
        if a[i_a].end() <= u32::from(b[i_b].value) {
            i_a += 1;
        }
        else if b[i_b].end() <= u32::from(a[i_a].value) {
            i_b += 1;
        }
        else {
            return true;
        }
    }

    false
}

/// Check whether every run of `a` is covered by a run of `b`
pub fn is_subset(a: &[Rle16], b: &[Rle16]) -> bool {
    let mut i_b = 0;

    for run in a.iter() {
        while i_b < b.len() && b[i_b].end() <= u32::from(run.value) {
            i_b += 1;
        }

        if i_b >= b.len() || b[i_b].value > run.value || b[i_b].end() < run.end() {
            return false;
        }
    }

    true
}

/// Count the runs of consecutive values in a sorted slice and build them
pub fn from_sorted(values: &[u16], out: &mut Vec<Rle16>) {
    for value in values.iter() {
        let value = u32::from(*value);
        append(out, value, value + 1);
    }
}

/// Build the runs of set bits from a bitset
pub fn from_words(words: &[u64], out: &mut Vec<Rle16>) {
    let mut start: Option<u32> = None;

    for (i, word) in words.iter().enumerate() {
        let base = (i * 64) as u32;
        let mut w = *word;
        let mut offset = 0;

        // Alternate between scanning for the next set and clear bit inside the word
        while offset < 64 {
            match start {
                None => {
                    if w == 0 {
                        break;
                    }

                    let skip = w.trailing_zeros();
                    offset += skip;
                    w >>= skip;
                    start = Some(base + offset);
                },
                Some(s) => {
                    let ones = (!w).trailing_zeros();
                    if offset + ones >= 64 {
                        break;
                    }

                    offset += ones;
                    w >>= ones;
                    out.push(Rle16::from_range(s, base + offset));
                    start = None;
                }
            }
        }
    }

    if let Some(s) = start {
        out.push(Rle16::from_range(s, 1 << 16));
    }
}

/// Check that every run is in bounds, sorted and separated from its predecessor
pub fn is_well_formed(runs: &[Rle16]) -> bool {
    let mut previous_end: Option<u32> = None;

    for run in runs.iter() {
        if run.end() > 1 << 16 {
            return false;
        }

        if let Some(end) = previous_end {
            if u32::from(run.value) <= end {
                return false;
            }
        }

        previous_end = Some(run.end());
    }

    true
}

/// An iterator over the values covered by a slice of runs
#[derive(Clone)]
pub struct Iter<'a> {
    runs: &'a [Rle16],

    /// Index of the run being expanded
    index: usize,

    /// Next value to yield from the current run
    next: u32,

    /// The number of values not yet yielded
    remaining: usize
}

impl<'a> Iter<'a> {
    pub fn new(runs: &'a [Rle16]) -> Self {
        Self {
            runs,
            index: 0,
            next: runs.first().map(|run| u32::from(run.value)).unwrap_or(0),
            remaining: cardinality(runs)
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = u16;

    fn next(&mut self) -> Option<Self::Item> {
        let run = self.runs.get(self.index)?;
        let value = self.next as u16;

        self.next += 1;
        self.remaining -= 1;

        if self.next >= run.end() {
            self.index += 1;

            if let Some(next_run) = self.runs.get(self.index) {
                self.next = u32::from(next_run.value);
            }
        }

        Some(value)
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

    fn make_runs(data: &[u16]) -> Vec<Rle16> {
        let mut runs = Vec::new();
        from_sorted(data, &mut runs);

        runs
    }

    /// Generate data that clusters into runs
    fn run_data(seed_offset: u16) -> Vec<u16> {
        let starts = generate_data(0..u16::MAX, 400);
        let mut data: Vec<u16> = starts.iter()
            .flat_map(|start| {
                let end = start.saturating_add(5 + seed_offset % 7);
                *start..end
            })
            .collect();

        data.sort();
        data.dedup();
        data
    }

    fn run_test<F>(op: OpType, f: F)
        where F: Fn(&[Rle16], &[Rle16], &mut Vec<Rle16>)
    {
        let data_a = run_data(1);
        let mut data_b: Vec<u16> = run_data(4).iter()
            .map(|v| v.wrapping_add(3))
            .filter(|v| *v > 10)
            .collect();
        data_b.sort();
        data_b.dedup();

        let expected = compute_result(&data_a, &data_b, op);

        let mut result = Vec::new();
        (f)(&make_runs(&data_a), &make_runs(&data_b), &mut result);

        assert!(is_well_formed(&result));

        let found: Vec<u16> = Iter::new(&result).collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn union() {
        run_test(OpType::Or, super::union);
    }

    #[test]
    fn intersect() {
        run_test(OpType::And, super::intersect);
    }

    #[test]
    fn difference() {
        run_test(OpType::AndNot, super::difference);
    }

    #[test]
    fn symmetric_difference() {
        run_test(OpType::Xor, super::symmetric_difference);
    }

    #[test]
    fn rank_select() {
        let runs = make_runs(&[1, 2, 3, 10, 11, 500]);

        assert_eq!(cardinality(&runs), 6);
        assert_eq!(rank(&runs, 0), 0);
        assert_eq!(rank(&runs, 2), 2);
        assert_eq!(rank(&runs, 9), 3);
        assert_eq!(rank(&runs, 11), 5);
        assert_eq!(rank(&runs, 65535), 6);

        assert_eq!(select(&runs, 0), Some(1));
        assert_eq!(select(&runs, 4), Some(11));
        assert_eq!(select(&runs, 5), Some(500));
        assert_eq!(select(&runs, 6), None);
    }

    #[test]
    fn contains_values() {
        let runs = make_runs(&[1, 2, 3, 10, 11, 500]);

        assert!(contains(&runs, 2));
        assert!(!contains(&runs, 4));
        assert!(!contains(&runs, 0));
        assert!(contains(&runs, 500));
        assert!(contains_range(&runs, 1, 4));
        assert!(!contains_range(&runs, 1, 5));
    }

    #[test]
    fn from_words_matches_from_sorted() {
        let data = run_data(2);
        let mut words = vec![0_u64; 1024];
        crate::container::bitset_ops::set_list(&mut words, &data);

        let mut runs = Vec::new();
        from_words(&words, &mut runs);

        assert_eq!(runs, make_runs(&data));
    }

    #[test]
    fn full_chunk() {
        let mut words = vec![!0_u64; 1024];
        let mut runs = Vec::new();
        from_words(&words, &mut runs);

        assert_eq!(runs, vec![Rle16::new(0, 65535)]);

        words[1023] = 0;
        runs.clear();
        from_words(&words, &mut runs);

        assert_eq!(runs, vec![Rle16::new(0, 65535 - 64)]);
    }

    #[test]
    fn well_formed() {
        assert!(is_well_formed(&[Rle16::new(0, 3), Rle16::new(5, 0)]));
        assert!(!is_well_formed(&[Rle16::new(0, 3), Rle16::new(4, 0)]));
        assert!(!is_well_formed(&[Rle16::new(5, 0), Rle16::new(1, 0)]));
        assert!(!is_well_formed(&[Rle16::new(65535, 1)]));
    }
}
