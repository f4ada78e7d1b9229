// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod iter;
pub mod region;

use crate::config::{Config, MAX_SEGMENT_SIZE};
use crate::hash::hash64;
use crate::meta::{BucketMeta, Metadata};
use crate::{Error, Slice};
use region::{DataSource, MappedRegion};
use std::cell::RefCell;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use varint_rs::VarintReader;

pub use iter::{Iter, Keys, OwnedIter};

thread_local! {
    // Slot-sized scratch so the probe loop does not allocate
    static SLOT_SCRATCH: RefCell<Vec<u8>> = const { RefCell::new(Vec::new()) };
}

/// A reader over an immutable store file
///
/// Point lookups and iteration are safe from many threads concurrently; the
/// memory-mapped hot path takes no lock.
pub struct Reader {
    meta: Metadata,

    /// Slot arrays, always mapped
    index: MappedRegion,

    /// Value records, mapped or served by positioned reads
    data: DataSource,

    /// Maps a key length to its bucket, `None` for absent lengths
    length_index: Vec<Option<u32>>,

    closed: AtomicBool,
}

impl Reader {
    /// Opens a reader over an existing store file.
    ///
    /// Scans past unrecognized leading bytes (their count corrects all
    /// absolute offsets), validates the format version, and maps the index
    /// and data sections in segments of `config.segment_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred or the file is malformed.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> crate::Result<Self> {
        let path = path.as_ref();

        if config.segment_size == 0 || config.segment_size > MAX_SEGMENT_SIZE {
            return Err(Error::InvalidConfig("segment_size must be in 1..=2^31"));
        }

        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        let (meta, skipped) = Metadata::scan_from(&mut BufReader::new(&file))?;

        let index_base = meta.index_offset + skipped;
        let data_base = meta.data_offset + skipped;
        let index_len = meta.index_length();
        let data_len = file_len
            .checked_sub(data_base)
            .ok_or(Error::Decode(crate::coding::DecodeError::InvalidHeader(
                "Metadata",
            )))?;

        debug_assert_eq!(index_base + index_len, data_base);

        let index = MappedRegion::map(&file, index_base, index_len, config.segment_size)?;

        let data = if config.mmap_data {
            DataSource::Mapped(MappedRegion::map(
                &file,
                data_base,
                data_len,
                config.segment_size,
            )?)
        } else {
            DataSource::Positioned {
                file: Mutex::new(file),
                base: data_base,
                len: data_len,
            }
        };

        let mut length_index = vec![None; meta.max_key_length as usize + 1];
        for (idx, bucket) in meta.buckets.iter().enumerate() {
            if let Some(slot) = length_index.get_mut(bucket.key_length as usize) {
                *slot = Some(idx as u32);
            }
        }

        log::debug!(
            "opened store {path:?}: {} keys in {} buckets, skipped={skipped}",
            meta.key_count,
            meta.buckets.len(),
        );

        Ok(Self {
            meta,
            index,
            data,
            length_index,
            closed: AtomicBool::new(false),
        })
    }

    fn bucket_for(&self, key_length: usize) -> Option<&BucketMeta> {
        let idx = (*self.length_index.get(key_length)?)?;
        self.meta.buckets.get(idx as usize)
    }

    fn check_open(&self) -> crate::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::StoreClosed);
        }
        Ok(())
    }

    /// Retrieves the value bytes for a key.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred or the reader is closed.
    pub fn get(&self, key: &[u8]) -> crate::Result<Option<Slice>> {
        self.check_open()?;

        let Some(bucket) = self.bucket_for(key.len()) else {
            return Ok(None);
        };

        if bucket.key_count == 0 {
            return Ok(None);
        }

        if let Some(bloom) = &self.meta.bloom {
            if !bloom.contains(key) {
                return Ok(None);
            }
        }

        let slot_size = usize::try_from(bucket.slot_size).map_err(|_| {
            Error::Decode(crate::coding::DecodeError::InvalidHeader("BucketMeta"))
        })?;
        let hash = hash64(key);

        SLOT_SCRATCH.with(|scratch| {
            let mut scratch = scratch.borrow_mut();

            for probe in 0..bucket.slot_count {
                let slot = hash.wrapping_add(probe) % bucket.slot_count;
                let offset = bucket.index_offset + slot * u64::from(bucket.slot_size);

                // Fast path: the slot lies within one mapped segment
                let slot_bytes: &[u8] = if let Some(bytes) = self.index.slice(offset, slot_size) {
                    bytes
                } else {
                    scratch.resize(slot_size, 0);
                    self.index.read_into(offset, &mut scratch)?;
                    &scratch
                };

                let (slot_key, mut packed) = slot_bytes.split_at(key.len());
                let data_offset = packed.read_u64_varint()?;

                if data_offset == 0 {
                    return Ok(None);
                }

                if slot_key == key {
                    let value = self
                        .data
                        .read_record(bucket.data_offset + data_offset)?;
                    return Ok(Some(value));
                }
            }

            Ok(None)
        })
    }

    /// Returns `true` if the key exists.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred or the reader is closed.
    pub fn contains_key(&self, key: &[u8]) -> crate::Result<bool> {
        self.get(key).map(|value| value.is_some())
    }

    /// Number of keys in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.meta.key_count as usize
    }

    /// Returns `true` if the store has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build timestamp, in wall-clock milliseconds.
    #[must_use]
    pub fn created_at(&self) -> u64 {
        self.meta.created_at
    }

    #[doc(hidden)]
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.meta
    }

    /// Iterates over all key-value pairs, bucket by bucket in ascending
    /// key length.
    ///
    /// The iterator is single-pass and forward-only.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self)
    }

    /// Iterates over all keys without touching the data sections.
    #[must_use]
    pub fn keys(&self) -> Keys<'_> {
        Keys::new(self)
    }

    /// Marks the reader closed; subsequent reads fail with
    /// [`Error::StoreClosed`].
    ///
    /// The mappings themselves are released when the reader drops.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub(crate) fn index_region(&self) -> &MappedRegion {
        &self.index
    }

    pub(crate) fn data_source(&self) -> &DataSource {
        &self.data
    }
}
