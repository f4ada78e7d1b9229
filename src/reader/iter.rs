// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::Reader;
use crate::Slice;
use std::sync::Arc;
use varint_rs::VarintReader;

/// Walk state over a store's slot arrays
///
/// Buckets are visited in ascending key length; empty slots are skipped.
pub(crate) struct WalkCursor {
    bucket_idx: usize,
    slot: u64,
    scratch: Vec<u8>,
}

impl WalkCursor {
    pub(crate) fn new() -> Self {
        Self {
            bucket_idx: 0,
            slot: 0,
            scratch: Vec::new(),
        }
    }

    /// Advances to the next occupied slot, returning its key and the
    /// data-section-relative offset of its record.
    pub(crate) fn advance(&mut self, reader: &Reader) -> crate::Result<Option<(Slice, u64)>> {
        reader.check_open()?;

        loop {
            let Some(bucket) = reader.metadata().buckets.get(self.bucket_idx) else {
                return Ok(None);
            };

            if self.slot >= bucket.slot_count {
                self.bucket_idx += 1;
                self.slot = 0;
                continue;
            }

            let slot_size = bucket.slot_size as usize;
            let offset = bucket.index_offset + self.slot * u64::from(bucket.slot_size);
            self.slot += 1;

            let index = reader.index_region();
            let slot_bytes: &[u8] = if let Some(bytes) = index.slice(offset, slot_size) {
                bytes
            } else {
                self.scratch.resize(slot_size, 0);
                index.read_into(offset, &mut self.scratch)?;
                &self.scratch
            };

            let (key, mut packed) = slot_bytes.split_at(bucket.key_length as usize);
            let data_offset = packed.read_u64_varint()?;

            if data_offset == 0 {
                continue;
            }

            return Ok(Some((Slice::from(key), bucket.data_offset + data_offset)));
        }
    }
}

/// Single-pass iterator over all key-value pairs
pub struct Iter<'a> {
    reader: &'a Reader,
    cursor: WalkCursor,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(reader: &'a Reader) -> Self {
        Self {
            reader,
            cursor: WalkCursor::new(),
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = crate::Result<(Slice, Slice)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, data_offset) = fail_iter!(self.cursor.advance(self.reader))?;
        let value = fail_iter!(self.reader.data_source().read_record(data_offset));
        Some(Ok((key, value)))
    }
}

/// Single-pass iterator over all keys
pub struct Keys<'a> {
    reader: &'a Reader,
    cursor: WalkCursor,
}

impl<'a> Keys<'a> {
    pub(crate) fn new(reader: &'a Reader) -> Self {
        Self {
            reader,
            cursor: WalkCursor::new(),
        }
    }
}

impl Iterator for Keys<'_> {
    type Item = crate::Result<Slice>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, _) = fail_iter!(self.cursor.advance(self.reader))?;
        Some(Ok(key))
    }
}

/// Like [`Iter`], but keeps the reader alive through an [`Arc`]
///
/// Used by snapshot iteration in the read-write store, where the reader may
/// be swapped out mid-iteration.
pub struct OwnedIter {
    reader: Arc<Reader>,
    cursor: WalkCursor,
}

impl OwnedIter {
    pub(crate) fn new(reader: Arc<Reader>) -> Self {
        Self {
            reader,
            cursor: WalkCursor::new(),
        }
    }
}

impl Iterator for OwnedIter {
    type Item = crate::Result<(Slice, Slice)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, data_offset) = fail_iter!(self.cursor.advance(&self.reader))?;
        let value = fail_iter!(self.reader.data_source().read_record(data_offset));
        Some(Ok((key, value)))
    }
}
