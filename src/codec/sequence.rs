//! Byte buffers, element arrays and string lists.

use std::collections::{BTreeSet, HashSet, LinkedList, VecDeque};
use std::hash::Hash;

use super::{Category, KeyCodec, LexicalOrder, Scratch, ValueCodec};
use crate::error::CodecError;

/// A fixed-width, trivially copyable element stored by its raw bytes.
///
/// Containers of elements encode as the concatenation of each element's
/// bytes. User structs can implement this trait and opt in to raw value
/// storage with [`value_codec!`](crate::value_codec).
///
/// # Examples
///
/// ```
/// use redb_containers::codec::Element;
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl Element for Point {
///     const SIZE: usize = 8;
///
///     fn write_bytes(&self, out: &mut Vec<u8>) {
///         out.extend_from_slice(&self.x.to_ne_bytes());
///         out.extend_from_slice(&self.y.to_ne_bytes());
///     }
///
///     fn read_bytes(bytes: &[u8]) -> Self {
///         let mut x = [0u8; 4];
///         let mut y = [0u8; 4];
///         x.copy_from_slice(&bytes[..4]);
///         y.copy_from_slice(&bytes[4..8]);
///         Point { x: i32::from_ne_bytes(x), y: i32::from_ne_bytes(y) }
///     }
/// }
///
/// redb_containers::value_codec!(element Point);
/// ```
pub trait Element: Copy + 'static {
    /// Encoded width in bytes; never zero.
    const SIZE: usize;

    /// Category reported by containers of this element.
    const CONTAINER_CATEGORY: Category = Category::ElementArray;

    /// Appends exactly [`Element::SIZE`] bytes.
    fn write_bytes(&self, out: &mut Vec<u8>);

    /// Reads one element from exactly [`Element::SIZE`] bytes.
    fn read_bytes(bytes: &[u8]) -> Self;

    /// Contiguous elements already in their encoded form.
    fn as_raw(_elements: &[Self]) -> Option<&[u8]> {
        None
    }
}

impl Element for u8 {
    const SIZE: usize = 1;
    const CONTAINER_CATEGORY: Category = Category::RawBytes;

    fn write_bytes(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }

    fn read_bytes(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn as_raw(elements: &[Self]) -> Option<&[u8]> {
        Some(elements)
    }
}

macro_rules! scalar_element {
    ($($ty:ty),*) => {
        $(
            impl Element for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn write_bytes(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_ne_bytes());
                }

                fn read_bytes(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_ne_bytes(raw)
                }
            }
        )*
    };
}

scalar_element!(i8, u16, i16, u32, i32, u64, i64, u128, i128, f32, f64);

/// Splits `bytes` into whole elements, rejecting a partial trailing element.
pub(crate) fn decode_elements<T: Element>(bytes: &[u8]) -> Result<Vec<T>, CodecError> {
    if T::SIZE == 0 || bytes.len() % T::SIZE != 0 {
        return Err(CodecError::ElementSize {
            len: bytes.len(),
            element_size: T::SIZE,
        });
    }
    Ok(bytes.chunks_exact(T::SIZE).map(T::read_bytes).collect())
}

fn encode_elements<'a, T, I>(elements: I, scratch: &'a mut Scratch) -> &'a [u8]
where
    T: Element,
    I: IntoIterator<Item = &'a T>,
{
    scratch.build(|buf| {
        for element in elements {
            element.write_bytes(buf);
        }
    })
}

impl<T: Element> ValueCodec for Vec<T> {
    const CATEGORY: Category = T::CONTAINER_CATEGORY;

    fn encode_value<'a>(&'a self, scratch: &'a mut Scratch) -> Result<&'a [u8], CodecError> {
        match T::as_raw(self) {
            Some(raw) => Ok(scratch.view(raw)),
            None => Ok(encode_elements(self.iter(), scratch)),
        }
    }

    fn decode_value(bytes: &[u8]) -> Result<Self, CodecError> {
        decode_elements(bytes)
    }
}

impl<T: Element> ValueCodec for VecDeque<T> {
    const CATEGORY: Category = Category::ElementArray;

    fn encode_value<'a>(&'a self, scratch: &'a mut Scratch) -> Result<&'a [u8], CodecError> {
        Ok(encode_elements(self.iter(), scratch))
    }

    fn decode_value(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(decode_elements(bytes)?.into())
    }
}

impl<T: Element> ValueCodec for LinkedList<T> {
    const CATEGORY: Category = Category::ElementArray;

    fn encode_value<'a>(&'a self, scratch: &'a mut Scratch) -> Result<&'a [u8], CodecError> {
        Ok(encode_elements(self.iter(), scratch))
    }

    fn decode_value(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(decode_elements(bytes)?.into_iter().collect())
    }
}

impl<T: Element + Ord> ValueCodec for BTreeSet<T> {
    const CATEGORY: Category = Category::ElementArray;

    fn encode_value<'a>(&'a self, scratch: &'a mut Scratch) -> Result<&'a [u8], CodecError> {
        Ok(encode_elements(self.iter(), scratch))
    }

    fn decode_value(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(decode_elements(bytes)?.into_iter().collect())
    }
}

impl<T: Element + Eq + Hash> ValueCodec for HashSet<T> {
    const CATEGORY: Category = Category::ElementArray;

    fn encode_value<'a>(&'a self, scratch: &'a mut Scratch) -> Result<&'a [u8], CodecError> {
        Ok(encode_elements(self.iter(), scratch))
    }

    fn decode_value(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(decode_elements(bytes)?.into_iter().collect())
    }
}

impl<const N: usize> ValueCodec for [u8; N] {
    const CATEGORY: Category = Category::RawBytes;

    fn encode_value<'a>(&'a self, scratch: &'a mut Scratch) -> Result<&'a [u8], CodecError> {
        Ok(scratch.view(self))
    }

    fn decode_value(bytes: &[u8]) -> Result<Self, CodecError> {
        super::fixed::<N>(bytes)
    }
}

impl KeyCodec for Vec<u8> {
    const CATEGORY: Category = Category::RawBytes;
    type Order = LexicalOrder;

    fn encode_key<'a>(&'a self, scratch: &'a mut Scratch) -> &'a [u8] {
        scratch.view(self)
    }

    fn decode_key(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(bytes.to_vec())
    }
}

impl<const N: usize> KeyCodec for [u8; N] {
    const CATEGORY: Category = Category::RawBytes;
    type Order = LexicalOrder;

    fn encode_key<'a>(&'a self, scratch: &'a mut Scratch) -> &'a [u8] {
        scratch.view(self)
    }

    fn decode_key(bytes: &[u8]) -> Result<Self, CodecError> {
        super::fixed::<N>(bytes)
    }
}

const LENGTH_PREFIX: usize = 4;

fn encode_strings<'a, I>(strings: I, scratch: &'a mut Scratch) -> Result<&'a [u8], CodecError>
where
    I: IntoIterator<Item = &'a String>,
{
    scratch.try_build(|buf| {
        for s in strings {
            let len = u32::try_from(s.len()).map_err(|_| CodecError::OutOfRange {
                value: s.len() as u64,
                target: "u32 length prefix",
            })?;
            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(s.as_bytes());
        }
        Ok(())
    })
}

/// Walks length-prefixed spans; a prefix or span that does not fit is corruption.
pub(crate) fn decode_strings(bytes: &[u8]) -> Result<Vec<String>, CodecError> {
    let mut strings = Vec::new();
    let mut cursor = 0;
    while cursor < bytes.len() {
        let remaining = &bytes[cursor..];
        if remaining.len() < LENGTH_PREFIX {
            return Err(CodecError::TruncatedPrefix { offset: cursor });
        }
        let mut prefix = [0u8; LENGTH_PREFIX];
        prefix.copy_from_slice(&remaining[..LENGTH_PREFIX]);
        let len = u32::from_le_bytes(prefix) as usize;

        let start = cursor + LENGTH_PREFIX;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= bytes.len())
            .ok_or(CodecError::SpanOverrun { offset: start, len })?;
        strings.push(String::from_utf8(bytes[start..end].to_vec())?);
        cursor = end;
    }
    Ok(strings)
}

macro_rules! string_list {
    ($($container:ident),*) => {
        $(
            impl ValueCodec for $container<String> {
                const CATEGORY: Category = Category::StringList;

                fn encode_value<'a>(&'a self, scratch: &'a mut Scratch) -> Result<&'a [u8], CodecError> {
                    encode_strings(self.iter(), scratch)
                }

                fn decode_value(bytes: &[u8]) -> Result<Self, CodecError> {
                    Ok(decode_strings(bytes)?.into_iter().collect())
                }
            }
        )*
    };
}

string_list!(Vec, VecDeque, LinkedList, BTreeSet, HashSet);
