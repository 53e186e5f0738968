//! Type-directed binary encoding of keys and values.
//!
//! Every storable type picks exactly one encoding [`Category`] through its
//! [`KeyCodec`] or [`ValueCodec`] implementation. Types outside the supported
//! set implement neither trait, so using them with a table fails to compile.
//!
//! | Priority | Category | Types |
//! |---|---|---|
//! | 1 | [`Category::Text`] | `String` |
//! | 2 | [`Category::WidenedInteger`] | `bool`, `u8`, `i8`, `u16`, `i16` keys |
//! | 3 | [`Category::Integer`] | `u32`, `i32`, `u64`, `i64` keys |
//! | 4 | [`Category::SortableFloat`] | `f32`, `f64` keys |
//! | 5 | [`Category::RawBytes`] | `Vec<u8>`, `[u8; N]` |
//! | 6 | [`Category::ElementArray`] | containers of [`Element`] |
//! | 7 | [`Category::StringList`] | containers of `String` |
//! | 8 | [`Category::SelfDescribing`] | [`SelfDescribing`] and bincode types |
//! | 9 | [`Category::Raw`] | fixed-width scalars and opted-in [`Element`] structs as values |
//! | - | [`Category::Bitset`] | [`Bitset`] |

mod bits;
mod custom;
mod order;
mod primitive;
mod scratch;
mod sequence;

pub use bits::Bitset;
pub use custom::{SelfDescribing, decode_bincode, encode_bincode};
pub use order::{IntegerOrder, KeyOrder, LexicalOrder};
pub use scratch::{INLINE_CAPACITY, Scratch};
pub use sequence::Element;

use strum::{Display, EnumIter};

use crate::error::CodecError;

/// Encoding strategy, listed in dispatch priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum Category {
    Text,
    WidenedInteger,
    Integer,
    SortableFloat,
    RawBytes,
    ElementArray,
    StringList,
    SelfDescribing,
    Raw,
    Bitset,
}

impl Category {
    /// Position in the dispatch table; bitsets sit outside the numbered rules.
    pub fn priority(self) -> Option<u8> {
        match self {
            Category::Text => Some(1),
            Category::WidenedInteger => Some(2),
            Category::Integer => Some(3),
            Category::SortableFloat => Some(4),
            Category::RawBytes => Some(5),
            Category::ElementArray => Some(6),
            Category::StringList => Some(7),
            Category::SelfDescribing => Some(8),
            Category::Raw => Some(9),
            Category::Bitset => None,
        }
    }
}

/// Encoding of a type stored in the value position.
///
/// `decode_value(encode_value(v)) == v` holds for every supported value.
pub trait ValueCodec: Sized {
    const CATEGORY: Category;

    /// Encodes `self`, staging bytes in `scratch` when a copy is needed.
    fn encode_value<'a>(&'a self, scratch: &'a mut Scratch) -> Result<&'a [u8], CodecError>;

    fn decode_value(bytes: &[u8]) -> Result<Self, CodecError>;
}

/// Encoding of a type stored in the key position.
///
/// The encoded bytes, compared under [`KeyCodec::Order`], order keys the way
/// the type itself orders them.
pub trait KeyCodec: Sized {
    const CATEGORY: Category;

    /// redb comparator for the encoded bytes.
    type Order: KeyOrder;

    fn encode_key<'a>(&'a self, scratch: &'a mut Scratch) -> &'a [u8];

    fn decode_key(bytes: &[u8]) -> Result<Self, CodecError>;
}

/// Exact-length check shared by fixed-width decoders.
pub(crate) fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N], CodecError> {
    <[u8; N]>::try_from(bytes).map_err(|_| CodecError::SizeMismatch {
        expected: N,
        actual: bytes.len(),
    })
}
