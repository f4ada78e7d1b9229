// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{DecodeError, EncodeError};
use crate::Slice;
use std::sync::Arc;

/// Represents errors that can occur in the store
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Serialization failed
    Encode(EncodeError),

    /// Deserialization failed
    Decode(DecodeError),

    /// The same key was written twice with duplicates disabled
    DuplicateKey(Slice),

    /// Keys must not be empty
    EmptyKey,

    /// Read against a closed reader
    StoreClosed,

    /// Invalid configuration value
    InvalidConfig(&'static str),

    /// The build would not fit into the free disk space
    InsufficientDiskSpace {
        /// Expected output size in bytes
        required: u64,

        /// Usable free bytes on the scratch volume
        available: u64,
    },

    /// A background compaction failed
    Compaction(Arc<Error>),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ShelfError: {self:?}")
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Encode(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::Compaction(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EncodeError> for Error {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}

impl From<DecodeError> for Error {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// Store result
pub type Result<T> = std::result::Result<T, Error>;
