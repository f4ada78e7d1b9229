// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! An embeddable, write-once/read-many key-value store optimized for very
//! fast point lookups against a static binary file held mostly in the
//! operating system's page cache via memory mapping.
//!
//! ##### About
//!
//! The store targets *side data*: large, read-only reference tables
//! (stopword lists, classifier models, id-to-attribute maps) where a
//! general-purpose in-memory map would cost several times the memory.
//!
//! Keys are partitioned by byte length; each length bucket gets its own
//! open-addressing index region and data region in a single immutable file.
//! A lookup hashes the key, linearly probes the bucket's slot array through
//! the mapping, and decodes the value record it points at. There are no
//! locks on that path.
//!
//! The base file is immutable between compactions; mutation happens through
//! a buffered read-write overlay that folds its in-memory buffer into a new
//! file in the background and atomically swaps it in.
//!
//! # Example usage
//!
//! ```
//! use shelf::{Config, Value, ValueReader, ValueWriter};
//! #
//! # let dir = tempfile::tempdir()?;
//! # let path = dir.path().join("attributes.shelf");
//!
//! let mut writer = ValueWriter::create(&path, Config::new())?;
//! writer.put(&Value::Int(1), &Value::from("foo"))?;
//! writer.finish()?;
//!
//! let reader = ValueReader::open(&path, Config::new())?;
//! assert_eq!(Some(Value::from("foo")), reader.get(&Value::Int(1))?);
//! assert_eq!(None, reader.get(&Value::Int(-1))?);
//! #
//! # Ok::<(), shelf::Error>(())
//! ```

#![deny(unsafe_code)]
#![deny(clippy::all, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![warn(clippy::indexing_slicing)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_precision_loss)]

macro_rules! fail_iter {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => return Some(Err(e)),
        }
    };
}

#[doc(hidden)]
pub mod bloom;

pub mod coding;

mod compression;
mod config;
mod error;
mod format;

#[doc(hidden)]
pub mod hash;

#[doc(hidden)]
pub mod meta;

pub mod reader;

pub mod rw;

pub mod serializer;

mod slice;

pub mod writer;

pub use {
    compression::CompressionType,
    config::Config,
    error::{Error, Result},
    format::FormatVersion,
    reader::Reader,
    rw::RwStore,
    serializer::{
        CustomSerializer, Registry, Serializer, TypedReader, TypedRw, TypedWriter, Value,
        ValueReader, ValueRw, ValueSerializer, ValueWriter,
    },
    slice::Slice,
    writer::Writer,
};
