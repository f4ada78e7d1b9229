// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::io::{Read, Write};

/// Error during serialization
#[derive(Debug)]
pub enum EncodeError {
    /// I/O error
    Io(std::io::Error),

    /// A value of a type no codec is registered for
    UnsupportedType(&'static str),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EncodeError({})",
            match self {
                Self::Io(e) => e.to_string(),
                Self::UnsupportedType(t) => format!("unsupported type {t}"),
            }
        )
    }
}

impl From<std::io::Error> for EncodeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::UnsupportedType(_) => None,
        }
    }
}

/// Error during deserialization
#[derive(Debug)]
pub enum DecodeError {
    /// I/O error
    Io(std::io::Error),

    /// Invalid UTF-8 in a decoded string
    Utf8(std::string::FromUtf8Error),

    /// The file carries a format version this implementation does not speak
    InvalidVersion(u8),

    /// Structure header (magic bytes) mismatch
    InvalidHeader(&'static str),

    /// Unknown type tag (structure name, tag byte)
    InvalidTag((&'static str, u8)),

    /// A custom value references a codec name that was never registered
    MissingSerializer(String),

    /// The input ended in the middle of a value
    UnexpectedEof,

    /// Decompression of a compressed payload failed
    Decompress,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DecodeError({self:?})")
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(value: std::io::Error) -> Self {
        if value.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::UnexpectedEof
        } else {
            Self::Io(value)
        }
    }
}

impl From<std::string::FromUtf8Error> for DecodeError {
    fn from(value: std::string::FromUtf8Error) -> Self {
        Self::Utf8(value)
    }
}

impl std::error::Error for DecodeError {}

/// Number of bytes the 7-bit-per-byte varint encoding of `value` takes.
#[must_use]
pub fn varint_len(value: u64) -> usize {
    let bits = (64 - value.leading_zeros()).max(1) as usize;
    bits.div_ceil(7)
}

/// Trait to serialize stuff
pub trait Encode {
    /// Serializes into writer.
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError>;

    /// Serializes into vector.
    #[allow(clippy::expect_used)]
    fn encode_into_vec(&self) -> Vec<u8> {
        let mut v = vec![];
        self.encode_into(&mut v).expect("cannot fail");
        v
    }
}

/// Trait to deserialize stuff
pub trait Decode {
    /// Deserializes from reader.
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError>
    where
        Self: Sized;
}
