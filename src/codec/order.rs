//! redb key types selecting a table's native key order.
//!
//! Tables always store raw byte strings; the key type only decides how redb
//! compares them. [`LexicalOrder`] compares bytes, [`IntegerOrder`] compares
//! 4- or 8-byte native-endian unsigned integers.

use redb::{Key, TypeName, Value};
use std::cmp::Ordering;
use std::fmt::Debug;

/// A redb key type over raw bytes, chosen per key codec.
pub trait KeyOrder: for<'a> Key<SelfType<'a> = &'a [u8]> + Debug + 'static {
    /// True when keys are compared as integers.
    const INTEGER: bool;
}

/// Byte-lexicographic ordering.
#[derive(Debug)]
pub enum LexicalOrder {}

/// Integer ordering for 4- and 8-byte native-endian unsigned keys.
#[derive(Debug)]
pub enum IntegerOrder {}

macro_rules! raw_bytes_value {
    ($ty:ty, $name:literal) => {
        impl Value for $ty {
            type SelfType<'a>
                = &'a [u8]
            where
                Self: 'a;
            type AsBytes<'a>
                = &'a [u8]
            where
                Self: 'a;

            fn fixed_width() -> Option<usize> {
                None
            }

            fn from_bytes<'a>(data: &'a [u8]) -> Self::SelfType<'a>
            where
                Self: 'a,
            {
                data
            }

            fn as_bytes<'a, 'b: 'a>(value: &'a Self::SelfType<'b>) -> Self::AsBytes<'a>
            where
                Self: 'a,
                Self: 'b,
            {
                value
            }

            fn type_name() -> TypeName {
                TypeName::new($name)
            }
        }
    };
}

raw_bytes_value!(LexicalOrder, "redb_containers::LexicalOrder");
raw_bytes_value!(IntegerOrder, "redb_containers::IntegerOrder");

impl Key for LexicalOrder {
    fn compare(data1: &[u8], data2: &[u8]) -> Ordering {
        data1.cmp(data2)
    }
}

impl Key for IntegerOrder {
    fn compare(data1: &[u8], data2: &[u8]) -> Ordering {
        if let (Ok(a), Ok(b)) = (<[u8; 4]>::try_from(data1), <[u8; 4]>::try_from(data2)) {
            return u32::from_ne_bytes(a).cmp(&u32::from_ne_bytes(b));
        }
        if let (Ok(a), Ok(b)) = (<[u8; 8]>::try_from(data1), <[u8; 8]>::try_from(data2)) {
            return u64::from_ne_bytes(a).cmp(&u64::from_ne_bytes(b));
        }
        // Mixed widths never come from one key codec; keep the order total.
        data1
            .len()
            .cmp(&data2.len())
            .then_with(|| data1.cmp(data2))
    }
}

impl KeyOrder for LexicalOrder {
    const INTEGER: bool = false;
}

impl KeyOrder for IntegerOrder {
    const INTEGER: bool = true;
}
