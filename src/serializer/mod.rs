// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The pluggable binary serializer framework
//!
//! Typed keys and values are translated to opaque byte strings through a
//! compact, self-describing tagged format: a single leading tag byte selects
//! the encoding of everything that follows. Scalars get dense one-byte
//! constants for frequent values and width-ranged encodings otherwise;
//! numeric arrays are narrowed to the smallest element width their value
//! range allows; large arrays can travel lz4-compressed behind a wrapper tag.
//!
//! Unknown types travel as custom values: a registered codec name followed by
//! the codec's opaque payload, dispatched through a [`Registry`].

mod read;
mod registry;
mod tag;
mod typed;
mod value;
mod write;

/// Arrays longer than this are compressed, when compression is enabled
pub const COMPRESS_MIN_LEN: usize = 32;

pub use read::read_value;
pub use registry::{CustomSerializer, Registry};
pub use tag::Tag;
pub use typed::{
    Serializer, TypedReader, TypedRw, TypedWriter, ValueReader, ValueRw, ValueSerializer,
    ValueWriter,
};
pub use value::Value;
pub use write::{write_value, write_value_plain};
