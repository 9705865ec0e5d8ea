//! Scalar kernels over sorted `u16` slices.
//!
//! These back the array container and are shared with borrowed (frozen) array payloads.
//! Every function assumes its inputs are sorted and free of duplicates; results are
//! undefined otherwise.

/// Compute the union of `a` and `b` and append the result to `out`
pub fn union(a: &[u16], b: &[u16], out: &mut Vec<u16>) {
    out.reserve(a.len() + b.len());

    let mut i_a = 0;
    let mut i_b = 0;

    while i_a < a.len() && i_b < b.len() {
        let v_a = a[i_a];
        let v_b = b[i_b];

        if v_a < v_b {
            out.push(v_a);
            i_a += 1;
        }
        else if v_b < v_a {
            out.push(v_b);
            i_b += 1;
        }
        else {
            out.push(v_a);
            i_a += 1;
            i_b += 1;
        }
    }

    out.extend_from_slice(&a[i_a..]);
    out.extend_from_slice(&b[i_b..]);
}

/// Compute the intersection of `a` and `b` and append the result to `out`
pub fn intersect(a: &[u16], b: &[u16], out: &mut Vec<u16>) {
    // Gallop through the larger input when the sizes are badly skewed
    if a.len() * 64 < b.len() {
        return intersect_skewed(a, b, out);
    }

    if b.len() * 64 < a.len() {
        return intersect_skewed(b, a, out);
    }

    out.reserve(a.len().min(b.len()));

    let mut i_a = 0;
    let mut i_b = 0;

    while i_a < a.len() && i_b < b.len() {
        let v_a = a[i_a];
        let v_b = b[i_b];

        if v_a < v_b {
            i_a += 1;
        }
        else if v_b < v_a {
            i_b += 1;
        }
        else {
            out.push(v_a);
            i_a += 1;
            i_b += 1;
        }
    }
}

/// Intersection where `small` is much shorter than `large`
fn intersect_skewed(small: &[u16], large: &[u16], out: &mut Vec<u16>) {
    out.reserve(small.len());

    let mut index = 0;
    for value in small.iter() {
        index = advance_until(large, index, *value);

        if index >= large.len() {
            break;
        }

        if large[index] == *value {
            out.push(*value);
        }
    }
}

/// Compute the difference `a \ b` and append the result to `out`
pub fn difference(a: &[u16], b: &[u16], out: &mut Vec<u16>) {
    out.reserve(a.len());

    let mut i_a = 0;
    let mut i_b = 0;

    while i_a < a.len() && i_b < b.len() {
        let v_a = a[i_a];
        let v_b = b[i_b];

        if v_a < v_b {
            out.push(v_a);
            i_a += 1;
        }
        else if v_b < v_a {
            i_b += 1;
        }
        else {
            i_a += 1;
            i_b += 1;
        }
    }

    out.extend_from_slice(&a[i_a..]);
}

/// Compute the symmetric difference `(A \ B) ∪ (B \ A)` and append the result to `out`
pub fn symmetric_difference(a: &[u16], b: &[u16], out: &mut Vec<u16>) {
    out.reserve(a.len() + b.len());

    let mut i_a = 0;
    let mut i_b = 0;

    while i_a < a.len() && i_b < b.len() {
        let v_a = a[i_a];
        let v_b = b[i_b];

        if v_a < v_b {
            out.push(v_a);
            i_a += 1;
        }
        else if v_b < v_a {
            out.push(v_b);
            i_b += 1;
        }
        else {
            i_a += 1;
            i_b += 1;
        }
    }

    out.extend_from_slice(&a[i_a..]);
    out.extend_from_slice(&b[i_b..]);
}

/// Find the cardinality of the intersection of two slices without storing it
pub fn and_cardinality(a: &[u16], b: &[u16]) -> usize {
    let mut count = 0;
    let mut i_a = 0;
    let mut i_b = 0;

    while i_a < a.len() && i_b < b.len() {
        let v_a = a[i_a];
        let v_b = b[i_b];

        if v_a < v_b {
            i_a += 1;
        }
        else if v_b < v_a {
            i_b += 1;
        }
        else {
            count += 1;
            i_a += 1;
            i_b += 1;
        }
    }

    count
}

/// Check whether two slices share at least one element
pub fn intersects(a: &[u16], b: &[u16]) -> bool {
    let mut i_a = 0;
    let mut i_b = 0;

    while i_a < a.len() && i_b < b.len() {
        let v_a = a[i_a];
        let v_b = b[i_b];

        if v_a < v_b {
            i_a = advance_until(a, i_a, v_b);
        }
        else if v_b < v_a {
            i_b = advance_until(b, i_b, v_a);
        }
        else {
            return true;
        }
    }

    false
}

/// Check whether every element of `a` is present in `b`
pub fn is_subset(a: &[u16], b: &[u16]) -> bool {
    if a.len() > b.len() {
        return false;
    }

    let mut i_b = 0;
    for value in a.iter() {
        i_b = advance_until(b, i_b, *value);

        if i_b >= b.len() || b[i_b] != *value {
            return false;
        }

        i_b += 1;
    }

    true
}

/// Find the number of elements smaller or equal to `value`
#[inline]
pub fn rank(slice: &[u16], value: u16) -> usize {
    match slice.binary_search(&value) {
        Ok(index) => index + 1,
        Err(index) => index
    }
}

/// Find the first index at or after `index` whose element is not smaller than `min`.
/// Returns `slice.len()` if there is no such element
///
/// # Remarks
/// Gallops from `index` so repeated calls with increasing `min` are cheap
pub fn advance_until(slice: &[u16], index: usize, min: u16) -> usize {
    let mut lower = index;
    if lower >= slice.len() || slice[lower] >= min {
        return lower;
    }

    let mut span = 1;
    while lower + span < slice.len() && slice[lower + span] < min {
        lower += span;
        span <<= 1;
    }

    let upper = (lower + span).min(slice.len());
    lower + 1 + slice[(lower + 1)..upper].partition_point(|v| *v < min)
}

/// Count the number of maximal runs of consecutive values in the slice
pub fn num_runs(slice: &[u16]) -> usize {
    if slice.is_empty() {
        return 0;
    }

    let mut num_runs = 1;
    for pair in slice.windows(2) {
        if u32::from(pair[1]) != u32::from(pair[0]) + 1 {
            num_runs += 1;
        }
    }

    num_runs
}

/// Check that the slice is strictly ascending
pub fn is_strictly_sorted(slice: &[u16]) -> bool {
    slice.windows(2).all(|pair| pair[0] < pair[1])
}

#[cfg(test)]
mod test {
    use crate::test::*;

    fn run_test<F>(op: OpType, f: F)
        where F: Fn(&[u16], &[u16], &mut Vec<u16>)
    {
        let data_a = generate_data(0..u16::MAX, 3000);
        let data_b = generate_data(0..u16::MAX, 2000);
        let expected = compute_result(&data_a, &data_b, op);

        let mut result = Vec::new();
        (f)(&data_a, &data_b, &mut result);

        assert_eq!(result, expected);
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
    fn intersect_skewed() {
        let small = [3, 900, 40_000];
        let large: Vec<u16> = (0..60_000).step_by(3).collect();

        let mut out = Vec::new();
        super::intersect(&small, &large, &mut out);

        assert_eq!(out, vec![3, 900]);
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
    fn and_cardinality() {
        let data_a = generate_data(0..u16::MAX, 3000);
        let data_b = generate_data(0..u16::MAX, 2000);
        let expected = compute_result(&data_a, &data_b, OpType::And);

        assert_eq!(super::and_cardinality(&data_a, &data_b), expected.len());
        assert_eq!(super::intersects(&data_a, &data_b), !expected.is_empty());
    }

    #[test]
    fn advance_until() {
        let slice = [1, 4, 9, 16, 25, 36, 49];

        assert_eq!(super::advance_until(&slice, 0, 0), 0);
        assert_eq!(super::advance_until(&slice, 0, 10), 3);
        assert_eq!(super::advance_until(&slice, 2, 36), 5);
        assert_eq!(super::advance_until(&slice, 0, 50), slice.len());
    }

    #[test]
    fn rank() {
        let slice = [2, 4, 6];

        assert_eq!(super::rank(&slice, 4), 2);
        assert_eq!(super::rank(&slice, 1), 0);
    }

    #[test]
    fn num_runs() {
        assert_eq!(super::num_runs(&[]), 0);
        assert_eq!(super::num_runs(&[1, 2, 3, 5, 6, 9]), 3);
        assert_eq!(super::num_runs(&[65534, 65535]), 1);
    }
}
