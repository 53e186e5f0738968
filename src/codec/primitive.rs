//! Text and fixed-width scalar encodings.
//!
//! As keys, scalars are laid out so that [`IntegerOrder`] sorts them
//! numerically: types narrower than four bytes widen to `u32`, signed types
//! flip their sign bit, floats go through the sortable bit mapping. As values
//! they are stored as their plain native-endian bytes.

use super::{Category, IntegerOrder, KeyCodec, LexicalOrder, Scratch, ValueCodec, fixed};
use crate::error::CodecError;

const SIGN32: u32 = 1 << 31;
const SIGN64: u64 = 1 << 63;

impl ValueCodec for String {
    const CATEGORY: Category = Category::Text;

    fn encode_value<'a>(&'a self, scratch: &'a mut Scratch) -> Result<&'a [u8], CodecError> {
        Ok(scratch.view(self.as_bytes()))
    }

    fn decode_value(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

impl KeyCodec for String {
    const CATEGORY: Category = Category::Text;
    type Order = LexicalOrder;

    fn encode_key<'a>(&'a self, scratch: &'a mut Scratch) -> &'a [u8] {
        scratch.view(self.as_bytes())
    }

    fn decode_key(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

fn widened(bytes: &[u8]) -> Result<u32, CodecError> {
    Ok(u32::from_ne_bytes(fixed::<4>(bytes)?))
}

fn out_of_range(value: u64, target: &'static str) -> CodecError {
    CodecError::OutOfRange { value, target }
}

macro_rules! widened_unsigned_key {
    ($($ty:ty),*) => {
        $(
            impl KeyCodec for $ty {
                const CATEGORY: Category = Category::WidenedInteger;
                type Order = IntegerOrder;

                fn encode_key<'a>(&'a self, scratch: &'a mut Scratch) -> &'a [u8] {
                    scratch.view_small_copy(&u32::from(*self).to_ne_bytes())
                }

                fn decode_key(bytes: &[u8]) -> Result<Self, CodecError> {
                    let wide = widened(bytes)?;
                    <$ty>::try_from(wide).map_err(|_| out_of_range(wide.into(), stringify!($ty)))
                }
            }
        )*
    };
}

macro_rules! widened_signed_key {
    ($($ty:ty),*) => {
        $(
            impl KeyCodec for $ty {
                const CATEGORY: Category = Category::WidenedInteger;
                type Order = IntegerOrder;

                fn encode_key<'a>(&'a self, scratch: &'a mut Scratch) -> &'a [u8] {
                    let biased = (i32::from(*self) as u32) ^ SIGN32;
                    scratch.view_small_copy(&biased.to_ne_bytes())
                }

                fn decode_key(bytes: &[u8]) -> Result<Self, CodecError> {
                    let wide = widened(bytes)?;
                    let value = (wide ^ SIGN32) as i32;
                    <$ty>::try_from(value).map_err(|_| out_of_range(wide.into(), stringify!($ty)))
                }
            }
        )*
    };
}

widened_unsigned_key!(u8, u16);
widened_signed_key!(i8, i16);

impl KeyCodec for bool {
    const CATEGORY: Category = Category::WidenedInteger;
    type Order = IntegerOrder;

    fn encode_key<'a>(&'a self, scratch: &'a mut Scratch) -> &'a [u8] {
        scratch.view_small_copy(&u32::from(*self).to_ne_bytes())
    }

    fn decode_key(bytes: &[u8]) -> Result<Self, CodecError> {
        match widened(bytes)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(out_of_range(other.into(), "bool")),
        }
    }
}

// 4- and 8-byte keys are copied into the scratch buffer, never borrowed.
macro_rules! unsigned_key {
    ($($ty:ty => $width:literal),*) => {
        $(
            impl KeyCodec for $ty {
                const CATEGORY: Category = Category::Integer;
                type Order = IntegerOrder;

                fn encode_key<'a>(&'a self, scratch: &'a mut Scratch) -> &'a [u8] {
                    scratch.view_small_copy(&self.to_ne_bytes())
                }

                fn decode_key(bytes: &[u8]) -> Result<Self, CodecError> {
                    Ok(<$ty>::from_ne_bytes(fixed::<$width>(bytes)?))
                }
            }
        )*
    };
}

macro_rules! signed_key {
    ($($ty:ty => $bits:ty, $sign:expr, $width:literal);* $(;)?) => {
        $(
            impl KeyCodec for $ty {
                const CATEGORY: Category = Category::Integer;
                type Order = IntegerOrder;

                fn encode_key<'a>(&'a self, scratch: &'a mut Scratch) -> &'a [u8] {
                    let ordered = (*self as $bits) ^ $sign;
                    scratch.view_small_copy(&ordered.to_ne_bytes())
                }

                fn decode_key(bytes: &[u8]) -> Result<Self, CodecError> {
                    let ordered = <$bits>::from_ne_bytes(fixed::<$width>(bytes)?);
                    Ok((ordered ^ $sign) as $ty)
                }
            }
        )*
    };
}

unsigned_key!(u32 => 4, u64 => 8);
signed_key!(
    i32 => u32, SIGN32, 4;
    i64 => u64, SIGN64, 8;
);

macro_rules! sortable_float_key {
    ($($ty:ty => $bits:ty, $sign:expr, $width:literal);* $(;)?) => {
        $(
            impl KeyCodec for $ty {
                const CATEGORY: Category = Category::SortableFloat;
                type Order = IntegerOrder;

                fn encode_key<'a>(&'a self, scratch: &'a mut Scratch) -> &'a [u8] {
                    let bits = self.to_bits();
                    let ordered = if bits & $sign != 0 { !bits } else { bits | $sign };
                    scratch.view_small_copy(&ordered.to_ne_bytes())
                }

                fn decode_key(bytes: &[u8]) -> Result<Self, CodecError> {
                    let ordered = <$bits>::from_ne_bytes(fixed::<$width>(bytes)?);
                    let bits = if ordered & $sign != 0 { ordered & !$sign } else { !ordered };
                    Ok(<$ty>::from_bits(bits))
                }
            }
        )*
    };
}

sortable_float_key!(
    f32 => u32, SIGN32, 4;
    f64 => u64, SIGN64, 8;
);

macro_rules! raw_scalar_value {
    ($($ty:ty => $width:literal),*) => {
        $(
            impl ValueCodec for $ty {
                const CATEGORY: Category = Category::Raw;

                fn encode_value<'a>(&'a self, scratch: &'a mut Scratch) -> Result<&'a [u8], CodecError> {
                    Ok(scratch.view_small_copy(&self.to_ne_bytes()))
                }

                fn decode_value(bytes: &[u8]) -> Result<Self, CodecError> {
                    Ok(<$ty>::from_ne_bytes(fixed::<$width>(bytes)?))
                }
            }
        )*
    };
}

raw_scalar_value!(
    u8 => 1, i8 => 1, u16 => 2, i16 => 2,
    u32 => 4, i32 => 4, u64 => 8, i64 => 8,
    u128 => 16, i128 => 16, f32 => 4, f64 => 8
);

impl ValueCodec for bool {
    const CATEGORY: Category = Category::Raw;

    fn encode_value<'a>(&'a self, scratch: &'a mut Scratch) -> Result<&'a [u8], CodecError> {
        Ok(scratch.view_small_copy(&[u8::from(*self)]))
    }

    fn decode_value(bytes: &[u8]) -> Result<Self, CodecError> {
        match fixed::<1>(bytes)? {
            [0] => Ok(false),
            [1] => Ok(true),
            [other] => Err(out_of_range(other.into(), "bool")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redb::Key;
    use std::cmp::Ordering;

    fn key_order<K: KeyCodec>(a: &K, b: &K) -> Ordering {
        let mut sa = Scratch::new();
        let mut sb = Scratch::new();
        <K::Order as Key>::compare(a.encode_key(&mut sa), b.encode_key(&mut sb))
    }

    #[test]
    fn test_small_keys_widen_to_four_bytes() {
        let mut scratch = Scratch::new();
        assert_eq!(7u8.encode_key(&mut scratch), &7u32.to_ne_bytes());
        assert_eq!(true.encode_key(&mut scratch).len(), 4);
        assert_eq!((-3i16).encode_key(&mut scratch).len(), 4);
    }

    #[test]
    fn test_full_width_keys_are_copied_as_native_bytes() {
        let mut scratch = Scratch::new();
        let key = 0x0102_0304_0506_0708u64;
        assert_eq!(key.encode_key(&mut scratch), &key.to_ne_bytes());
        assert_eq!(70_000u32.encode_key(&mut scratch), &70_000u32.to_ne_bytes());
        assert_eq!(
            (-1i32).encode_key(&mut scratch),
            &(u32::MAX ^ SIGN32).to_ne_bytes()
        );
    }

    #[test]
    fn test_signed_keys_order_numerically() {
        assert_eq!(key_order(&-1i32, &0i32), Ordering::Less);
        assert_eq!(key_order(&i64::MIN, &i64::MAX), Ordering::Less);
        assert_eq!(key_order(&-100i8, &-5i8), Ordering::Less);
    }

    #[test]
    fn test_float_keys_order_across_sign() {
        assert_eq!(key_order(&-2.5f64, &-1.0f64), Ordering::Less);
        assert_eq!(key_order(&-1.0f64, &0.0f64), Ordering::Less);
        assert_eq!(key_order(&0.0f32, &1.5f32), Ordering::Less);
        assert_eq!(key_order(&f32::NEG_INFINITY, &f32::MIN), Ordering::Less);
    }

    #[test]
    fn test_float_key_mapping_is_reversible() {
        let mut scratch = Scratch::new();
        for value in [-1e300f64, -0.5, -0.0, 0.0, 3.25, f64::MAX] {
            let decoded = f64::decode_key(value.encode_key(&mut scratch)).unwrap();
            assert_eq!(decoded.to_bits(), value.to_bits());
        }
    }

    #[test]
    fn test_out_of_range_widened_key() {
        let mut scratch = Scratch::new();
        let bytes = 70_000u32.encode_key(&mut scratch).to_vec();
        assert!(matches!(
            u16::decode_key(&bytes),
            Err(CodecError::OutOfRange { target: "u16", .. })
        ));
    }

    #[test]
    fn test_scalar_value_length_is_checked() {
        assert!(matches!(
            u64::decode_value(&[1, 2, 3]),
            Err(CodecError::SizeMismatch { expected: 8, actual: 3 })
        ));
        assert!(bool::decode_value(&[2]).is_err());
    }

    #[test]
    fn test_invalid_utf8_is_a_format_error() {
        assert!(matches!(
            String::decode_value(&[0xff, 0xfe]),
            Err(CodecError::InvalidUtf8(_))
        ));
    }
}
