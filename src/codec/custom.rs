//! User-defined encodings and the [`value_codec!`](crate::value_codec) opt-in.

use crate::error::CodecError;

/// A type that serializes itself.
///
/// `decode(encode(v)) == v` must hold. Decode failures surface as
/// data-format errors, usually [`CodecError::Custom`] or
/// [`CodecError::SizeMismatch`].
pub trait SelfDescribing: Sized {
    fn encode(&self, out: &mut Vec<u8>) -> Result<(), CodecError>;

    fn decode(bytes: &[u8]) -> Result<Self, CodecError>;
}

/// Appends the bincode form of `value` to `out`.
pub fn encode_bincode<T: bincode::Encode>(value: &T, out: &mut Vec<u8>) -> Result<(), CodecError> {
    let encoded = bincode::encode_to_vec(value, bincode::config::standard())?;
    out.extend_from_slice(&encoded);
    Ok(())
}

/// Decodes a bincode value that must span all of `bytes`.
pub fn decode_bincode<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T, CodecError> {
    let (value, consumed) = bincode::decode_from_slice(bytes, bincode::config::standard())?;
    if consumed != bytes.len() {
        return Err(CodecError::TrailingBytes {
            trailing: bytes.len() - consumed,
        });
    }
    Ok(value)
}

/// Implements [`ValueCodec`](crate::codec::ValueCodec) for user types.
///
/// - `element T`: raw bytes of an [`Element`](crate::codec::Element); decoding
///   requires the exact width.
/// - `self_describing T`: delegates to [`SelfDescribing`].
/// - `bincode T`: bincode's standard configuration.
///
/// # Examples
///
/// ```
/// use redb_containers::value_codec;
///
/// #[derive(Debug, PartialEq, bincode::Encode, bincode::Decode)]
/// struct Profile {
///     name: String,
///     tags: Vec<String>,
/// }
///
/// value_codec!(bincode Profile);
/// ```
#[macro_export]
macro_rules! value_codec {
    (element $($ty:ty),+ $(,)?) => {
        $(
            impl $crate::codec::ValueCodec for $ty {
                const CATEGORY: $crate::codec::Category = $crate::codec::Category::Raw;

                fn encode_value<'a>(
                    &'a self,
                    scratch: &'a mut $crate::codec::Scratch,
                ) -> ::std::result::Result<&'a [u8], $crate::CodecError> {
                    Ok(scratch.build(|buf| $crate::codec::Element::write_bytes(self, buf)))
                }

                fn decode_value(bytes: &[u8]) -> ::std::result::Result<Self, $crate::CodecError> {
                    let expected = <$ty as $crate::codec::Element>::SIZE;
                    if bytes.len() != expected {
                        return Err($crate::CodecError::SizeMismatch {
                            expected,
                            actual: bytes.len(),
                        });
                    }
                    Ok(<$ty as $crate::codec::Element>::read_bytes(bytes))
                }
            }
        )+
    };
    (self_describing $($ty:ty),+ $(,)?) => {
        $(
            impl $crate::codec::ValueCodec for $ty {
                const CATEGORY: $crate::codec::Category = $crate::codec::Category::SelfDescribing;

                fn encode_value<'a>(
                    &'a self,
                    scratch: &'a mut $crate::codec::Scratch,
                ) -> ::std::result::Result<&'a [u8], $crate::CodecError> {
                    scratch.try_build(|buf| $crate::codec::SelfDescribing::encode(self, buf))
                }

                fn decode_value(bytes: &[u8]) -> ::std::result::Result<Self, $crate::CodecError> {
                    <$ty as $crate::codec::SelfDescribing>::decode(bytes)
                }
            }
        )+
    };
    (bincode $($ty:ty),+ $(,)?) => {
        $(
            impl $crate::codec::ValueCodec for $ty {
                const CATEGORY: $crate::codec::Category = $crate::codec::Category::SelfDescribing;

                fn encode_value<'a>(
                    &'a self,
                    scratch: &'a mut $crate::codec::Scratch,
                ) -> ::std::result::Result<&'a [u8], $crate::CodecError> {
                    scratch.try_build(|buf| $crate::codec::encode_bincode(self, buf))
                }

                fn decode_value(bytes: &[u8]) -> ::std::result::Result<Self, $crate::CodecError> {
                    $crate::codec::decode_bincode(bytes)
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Category, Element, Scratch, ValueCodec};

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Rgb {
        r: u8,
        g: u8,
        b: u8,
    }

    impl Element for Rgb {
        const SIZE: usize = 3;

        fn write_bytes(&self, out: &mut Vec<u8>) {
            out.extend_from_slice(&[self.r, self.g, self.b]);
        }

        fn read_bytes(bytes: &[u8]) -> Self {
            Rgb {
                r: bytes[0],
                g: bytes[1],
                b: bytes[2],
            }
        }
    }

    crate::value_codec!(element Rgb);

    /// Version byte followed by a little-endian u32.
    #[derive(Debug, PartialEq)]
    struct Versioned(u32);

    impl SelfDescribing for Versioned {
        fn encode(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
            out.push(1);
            out.extend_from_slice(&self.0.to_le_bytes());
            Ok(())
        }

        fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
            match bytes {
                [1, rest @ ..] => {
                    let raw = crate::codec::fixed::<4>(rest)?;
                    Ok(Versioned(u32::from_le_bytes(raw)))
                }
                _ => Err(CodecError::Custom("unknown version".into())),
            }
        }
    }

    crate::value_codec!(self_describing Versioned);

    #[derive(Debug, PartialEq, bincode::Encode, bincode::Decode)]
    struct Note {
        title: String,
        pinned: bool,
    }

    crate::value_codec!(bincode Note);

    #[test]
    fn test_element_struct_round_trip() {
        let color = Rgb { r: 1, g: 2, b: 3 };
        let mut scratch = Scratch::new();
        let bytes = color.encode_value(&mut scratch).unwrap().to_vec();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(Rgb::decode_value(&bytes).unwrap(), color);
        assert_eq!(<Rgb as ValueCodec>::CATEGORY, Category::Raw);
        assert!(Rgb::decode_value(&[1, 2]).is_err());
    }

    #[test]
    fn test_element_struct_in_containers() {
        let colors = vec![Rgb { r: 9, g: 8, b: 7 }, Rgb { r: 0, g: 0, b: 1 }];
        let mut scratch = Scratch::new();
        let bytes = colors.encode_value(&mut scratch).unwrap().to_vec();
        assert_eq!(Vec::<Rgb>::decode_value(&bytes).unwrap(), colors);
    }

    #[test]
    fn test_self_describing_errors_propagate() {
        let mut scratch = Scratch::new();
        let bytes = Versioned(77).encode_value(&mut scratch).unwrap().to_vec();
        assert_eq!(Versioned::decode_value(&bytes).unwrap(), Versioned(77));
        assert!(matches!(
            Versioned::decode_value(&[1, 0]),
            Err(CodecError::SizeMismatch { expected: 4, actual: 1 })
        ));
        assert!(matches!(
            Versioned::decode_value(&[2, 0, 0, 0, 0]),
            Err(CodecError::Custom(_))
        ));
    }

    #[test]
    fn test_bincode_rejects_trailing_bytes() {
        let note = Note {
            title: "groceries".into(),
            pinned: true,
        };
        let mut scratch = Scratch::new();
        let mut bytes = note.encode_value(&mut scratch).unwrap().to_vec();
        assert_eq!(Note::decode_value(&bytes).unwrap(), note);

        bytes.push(0);
        assert!(matches!(
            Note::decode_value(&bytes),
            Err(CodecError::TrailingBytes { trailing: 1 })
        ));
    }
}
