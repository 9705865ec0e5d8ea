#![cfg(test)]

use std::fmt::Debug;
use std::ops::Range;

use rand::prelude::*;
use rand::distributions::uniform::SampleUniform;

use num_traits::Unsigned;
use num_traits::cast::ToPrimitive;

/// An internal trait for automating test setup
pub(crate) trait TestShim<T> {
    fn from_data(data: &[T]) -> Self;

    fn iter<'a>(&'a self) -> Box<dyn Iterator<Item=T> + 'a>;

    fn card(&self) -> usize;
}

/// The type of operation to perform
#[derive(Clone, Copy, Debug)]
pub(crate) enum OpType {
    /// Performs a union of the two input sets
    Or,

    /// Performs an intersection of the two input sets
    And,

    /// Peforms a difference between the two input sets
    AndNot,

    /// Performs a symmetric difference between the two input sets
    Xor
}

const SEED: [u8; 16] = [
    3, 4, 1, 6, 3, 8, 6, 0,
    9, 5, 4, 7, 6, 8, 1, 2
];

/// Generates `count` random values in `range`. Values are then deduplicated and sorted
pub(crate) fn generate_data<T>(range: Range<T>, count: usize) -> Vec<T>
    where T: Copy + Ord + Unsigned + ToPrimitive + SampleUniform
{
    generate_seeded(range, count, 0)
}

/// Same as `generate_data` with a distinct random stream per `stream`
pub(crate) fn generate_seeded<T>(range: Range<T>, count: usize, stream: u8) -> Vec<T>
    where T: Copy + Ord + Unsigned + ToPrimitive + SampleUniform
{
    let (min, max) = (range.start, range.end);

    let mut seed = SEED;
    seed[0] = seed[0].wrapping_add(stream);
    let mut rng = rand::rngs::SmallRng::from_seed(seed);

    let mut result: Vec<T> = Vec::with_capacity(count);

    while result.len() < count {
        result.push(rng.gen_range(min, max));
    }

    result.sort();
    result.dedup();

    result
}

/// Compute the result of an operation on two input sets using a known correct algorithm
///
/// # Remarks
/// Assumes the inputs are sorted
pub(crate) fn compute_result<T>(a: &[T], b: &[T], op: OpType) -> Vec<T>
    where T: Ord + Copy
{
    let mut result = Vec::with_capacity(a.len() + b.len());

    let mut i0 = 0;
    let mut i1 = 0;
    while i0 < a.len() && i1 < b.len() {
        // Element only in A
        if a[i0] < b[i1] {
            match op {
                OpType::Or | OpType::AndNot | OpType::Xor => result.push(a[i0]),
                OpType::And => ()
            }

            i0 += 1;
        }
        // Element only in B
        else if b[i1] < a[i0] {
            match op {
                OpType::Or | OpType::Xor => result.push(b[i1]),
                OpType::And | OpType::AndNot => ()
            }

            i1 += 1;
        }
        // Element shared
        else {
            match op {
                OpType::Or | OpType::And => result.push(a[i0]),
                OpType::AndNot | OpType::Xor => ()
            }

            i0 += 1;
            i1 += 1;
        }
    }

    match op {
        OpType::Or | OpType::Xor => {
            result.extend_from_slice(&a[i0..]);
            result.extend_from_slice(&b[i1..]);
        },
        OpType::AndNot => result.extend_from_slice(&a[i0..]),
        OpType::And => ()
    }

    result
}

/// Two inputs which share chunks in every density: sparse, dense and clustered into runs
pub(crate) fn op_inputs() -> (Vec<u32>, Vec<u32>) {
    let mut a = generate_seeded(0..4_000_000, 200_000, 1);
    let mut b = generate_seeded(2_000_000..6_000_000, 50_000, 2);

    // Clustered values so run containers are exercised once optimized
    a.extend((6_000_000..6_100_000).filter(|v| v % 1000 < 700));
    b.extend((6_050_000..6_150_000).filter(|v| v % 1000 > 300));

    (a, b)
}

/// Check `f` against the reference result of `op`
pub(crate) fn op_test<C, F, R>(op: OpType, f: F)
    where C: TestShim<u32>,
          R: TestShim<u32>,
          F: FnOnce(C, C) -> R
{
    let (data_a, data_b) = op_inputs();
    let data_res = compute_result(&data_a, &data_b, op);

    let a = C::from_data(&data_a);
    let b = C::from_data(&data_b);

    let r = (f)(a, b);

    // Check that the cardinality matches the precomputed result
    assert_eq!(
        r.card(),
        data_res.len(),
        "Unequal cardinality; found {}, expected {}",
        r.card(),
        data_res.len()
    );

    // Check that the output matches the precomputed result
    for (found, expected) in r.iter().zip(data_res.iter()) {
        assert_eq!(found, *expected, "Sets are not equivalent. Found {:?}, expected {:?}", found, *expected);
    }
}

/// Check the cardinality returned by `f` against the reference result of `op`
pub(crate) fn op_card_test<C, F, T>(op: OpType, f: F)
    where C: TestShim<u32>,
          F: FnOnce(C, C) -> T,
          T: ToPrimitive + Debug
{
    let (data_a, data_b) = op_inputs();
    let data_res = compute_result(&data_a, &data_b, op);

    let a = C::from_data(&data_a);
    let b = C::from_data(&data_b);

    let r = (f)(a, b);

    assert_eq!(
        r.to_usize(),
        Some(data_res.len()),
        "Unequal cardinality; found {:?}, expected {}",
        r,
        data_res.len()
    );
}
