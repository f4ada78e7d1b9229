// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{reader::Reader, rw::RwStore, writer::Writer, CompressionType};
use std::io::Write;
use std::path::Path;

/// Largest allowed mapped segment (must fit 32-bit positions)
pub const MAX_SEGMENT_SIZE: u64 = 1 << 31;

/// Store configuration builder
///
/// One `Config` parameterizes readers, writers and read-write stores alike;
/// options that do not apply to a given role are simply ignored by it.
#[derive(Clone)]
pub struct Config {
    /// Byte length of a single mapped segment
    pub segment_size: u64,

    /// Whether the data section is memory-mapped
    ///
    /// When `false`, values are served by positioned reads on the file,
    /// serialized under a single lock.
    pub mmap_data: bool,

    /// Target index fill ratio, in (0, 1)
    pub load_factor: f64,

    /// Compression applied to large value arrays
    pub compression: CompressionType,

    /// Whether a bloom filter is built at write time
    pub bloom_filter: bool,

    /// Target bloom filter false-positive rate
    pub bloom_fp_rate: f64,

    /// Last-write-wins instead of duplicate-key failure
    pub allow_duplicates: bool,

    /// Read-write store buffer capacity, in entries
    pub write_buffer_size: usize,

    /// Whether the read-write store flushes when its buffer is full
    pub auto_flush: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            segment_size: /* 1 GiB */ 1_024 * 1_024 * 1_024,
            mmap_data: true,
            load_factor: 0.75,
            compression: CompressionType::None,
            bloom_filter: false,
            bloom_fp_rate: 0.01,
            allow_duplicates: false,
            write_buffer_size: 100_000,
            auto_flush: true,
        }
    }
}

impl Config {
    /// Initializes a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the mapped segment size.
    ///
    /// Values above 2^31 are rejected when a reader is opened.
    ///
    /// Default = 1 GiB
    #[must_use]
    pub fn segment_size(mut self, bytes: u64) -> Self {
        self.segment_size = bytes;
        self
    }

    /// Toggles memory mapping of the data section.
    ///
    /// Default = `true`
    #[must_use]
    pub fn mmap_data(mut self, enabled: bool) -> Self {
        self.mmap_data = enabled;
        self
    }

    /// Sets the target index fill ratio.
    ///
    /// Must be in (0, 1); rejected when a writer is created.
    ///
    /// Default = 0.75
    #[must_use]
    pub fn load_factor(mut self, ratio: f64) -> Self {
        self.load_factor = ratio;
        self
    }

    /// Sets the compression method for large value arrays.
    ///
    /// Default = [`CompressionType::None`]
    #[must_use]
    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Enables bloom filter construction at write time.
    ///
    /// Default = `false`
    #[must_use]
    pub fn bloom_filter(mut self, enabled: bool) -> Self {
        self.bloom_filter = enabled;
        self
    }

    /// Sets the target bloom filter false-positive rate.
    ///
    /// Default = 0.01
    #[must_use]
    pub fn bloom_fp_rate(mut self, rate: f64) -> Self {
        self.bloom_fp_rate = rate;
        self
    }

    /// Makes the last write win instead of failing the build on a duplicate key.
    ///
    /// Default = `false`
    #[must_use]
    pub fn allow_duplicates(mut self, enabled: bool) -> Self {
        self.allow_duplicates = enabled;
        self
    }

    /// Sets the read-write store's buffer capacity in entries.
    ///
    /// Default = 100 000
    #[must_use]
    pub fn write_buffer_size(mut self, entries: usize) -> Self {
        self.write_buffer_size = entries;
        self
    }

    /// Toggles flush-on-full for the read-write store.
    ///
    /// Default = `true`
    #[must_use]
    pub fn auto_flush(mut self, enabled: bool) -> Self {
        self.auto_flush = enabled;
        self
    }

    /// Opens a reader over an existing store file.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred or the file is malformed.
    pub fn open<P: AsRef<Path>>(self, path: P) -> crate::Result<Reader> {
        Reader::open(path, self)
    }

    /// Creates a writer that will atomically produce `path` when finished.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred or the config is invalid.
    pub fn writer<P: AsRef<Path>>(self, path: P) -> crate::Result<Writer> {
        Writer::create(path, self)
    }

    /// Creates a writer over an arbitrary byte sink.
    ///
    /// Stream destinations do not checkpoint: aborting mid-build leaves
    /// the sink partially written.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred or the config is invalid.
    pub fn writer_to_stream<W: Write + Send + 'static>(self, sink: W) -> crate::Result<Writer> {
        Writer::from_stream(sink, self)
    }

    /// Opens a buffered read-write store over `path`, creating an empty
    /// store file first if none exists.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred or the file is malformed.
    pub fn open_rw<P: AsRef<Path>>(self, path: P) -> crate::Result<RwStore> {
        RwStore::open(path, self)
    }
}
