//! Operator overloads for the set algebra of roaring bitmaps

use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Sub, SubAssign};

use crate::RoaringBitmap;

macro_rules! bitmap_op {
    ($op_trait:ident, $op:ident, $assign_trait:ident, $assign:ident, $method:ident, $inplace:ident) => {
        impl<'a, 'b> $op_trait<&'b RoaringBitmap> for &'a RoaringBitmap {
            type Output = RoaringBitmap;

            #[inline]
            fn $op(self, other: &'b RoaringBitmap) -> RoaringBitmap {
                self.$method(other)
            }
        }

        impl<'b> $op_trait<&'b RoaringBitmap> for RoaringBitmap {
            type Output = RoaringBitmap;

            #[inline]
            fn $op(mut self, other: &'b RoaringBitmap) -> RoaringBitmap {
                self.$inplace(other);
                self
            }
        }

        impl $op_trait<RoaringBitmap> for RoaringBitmap {
            type Output = RoaringBitmap;

            #[inline]
            fn $op(mut self, other: RoaringBitmap) -> RoaringBitmap {
                self.$inplace(&other);
                self
            }
        }

        impl<'b> $assign_trait<&'b RoaringBitmap> for RoaringBitmap {
            #[inline]
            fn $assign(&mut self, other: &'b RoaringBitmap) {
                self.$inplace(other);
            }
        }

        impl $assign_trait<RoaringBitmap> for RoaringBitmap {
            #[inline]
            fn $assign(&mut self, other: RoaringBitmap) {
                self.$inplace(&other);
            }
        }
    };
}

bitmap_op!(BitOr, bitor, BitOrAssign, bitor_assign, or, inplace_or);

bitmap_op!(BitAnd, bitand, BitAndAssign, bitand_assign, and, inplace_and);

bitmap_op!(BitXor, bitxor, BitXorAssign, bitxor_assign, xor, inplace_xor);

bitmap_op!(Sub, sub, SubAssign, sub_assign, and_not, inplace_and_not);

#[cfg(test)]
mod test {
    use crate::RoaringBitmap;

    fn inputs() -> (RoaringBitmap, RoaringBitmap) {
        (
            RoaringBitmap::from_slice(&[1, 2, 3, 70_000]),
            RoaringBitmap::from_slice(&[3, 4, 70_000, 200_000])
        )
    }

    #[test]
    fn by_reference() {
        let (a, b) = inputs();

        assert_eq!((&a | &b).to_vec(), vec![1, 2, 3, 4, 70_000, 200_000]);
        assert_eq!((&a & &b).to_vec(), vec![3, 70_000]);
        assert_eq!((&a ^ &b).to_vec(), vec![1, 2, 4, 200_000]);
        assert_eq!((&a - &b).to_vec(), vec![1, 2]);
    }

    #[test]
    fn by_value() {
        let (a, b) = inputs();

        assert_eq!(a.clone() | &b, a.or(&b));
        assert_eq!(a.clone() & b.clone(), a.and(&b));
        assert_eq!(a.clone() ^ &b, a.xor(&b));
        assert_eq!(a.clone() - b.clone(), a.and_not(&b));
    }

    #[test]
    fn assign() {
        let (a, b) = inputs();

        let mut c = a.clone();
        c |= &b;
        assert_eq!(c, a.or(&b));

        let mut c = a.clone();
        c &= b.clone();
        assert_eq!(c, a.and(&b));

        let mut c = a.clone();
        c ^= &b;
        assert_eq!(c, a.xor(&b));

        let mut c = a.clone();
        c -= &b;
        assert_eq!(c, a.and_not(&b));
    }
}
