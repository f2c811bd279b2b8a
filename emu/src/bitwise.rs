use std::ops::RangeInclusive;

/// Contains some helper methods to manipulate bits,
/// the index (`bit_idx`) is supposed to be from lsb to msb (right to left)
pub trait Bits: Copy {
    fn get_bit(self, bit_idx: u8) -> bool;

    fn set_bit(&mut self, bit_idx: u8, value: bool);

    /// Extracts the inclusive bit range and moves it to position 0.
    fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self;

    /// Returns a sign-extended copy of the value.
    /// `number_of_bits` is the width of the two's complement value we want
    /// to sign-extend.
    fn sign_extended(self, number_of_bits: u8) -> Self;
}

macro_rules! impl_bits {
    ($($unsigned:ty => $signed:ty),* $(,)?) => {
        $(
            impl Bits for $unsigned {
                fn get_bit(self, bit_idx: u8) -> bool {
                    debug_assert!(u32::from(bit_idx) < <$unsigned>::BITS);
                    (self >> bit_idx) & 1 == 1
                }

                fn set_bit(&mut self, bit_idx: u8, value: bool) {
                    debug_assert!(u32::from(bit_idx) < <$unsigned>::BITS);
                    let mask: $unsigned = 1 << bit_idx;
                    if value {
                        *self |= mask;
                    } else {
                        *self &= !mask;
                    }
                }

                fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self {
                    let start = *bits_range.start();
                    let length = u32::from(*bits_range.end() - start) + 1;
                    debug_assert!(u32::from(start) + length <= <$unsigned>::BITS);

                    // `length` ones, moved back to bit 0 after the shift.
                    let mask = <$unsigned>::MAX >> (<$unsigned>::BITS - length);
                    (self >> start) & mask
                }

                fn sign_extended(self, number_of_bits: u8) -> Self {
                    debug_assert!(number_of_bits > 0);
                    let unused = <$unsigned>::BITS - u32::from(number_of_bits);

                    // Park the sign bit in the msb, then let the arithmetic shift copy it back down.
                    (((self << unused) as $signed) >> unused) as $unsigned
                }
            }
        )*
    };
}

impl_bits!(u32 => i32, u64 => i64);
