// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod bucket;

use crate::bloom::BloomFilter;
use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use crate::format::{FormatVersion, MAGIC_BYTES};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

pub use bucket::{BucketMeta, BUCKET_META_LEN};

/// The store header
///
/// Written once at the head of the file, ahead of the index and data sections:
///
/// ----------------
/// |    header    | <- magic, version, bloom filter, bucket geometry
/// |--------------|
/// | index region | <- one slot array per key length, ascending
/// |--------------|
/// |  data region | <- varint-prefixed records per key length, ascending
/// ----------------
#[derive(Debug)]
pub struct Metadata {
    /// Wall-clock millis at build time
    pub created_at: u64,

    /// Total live keys
    pub key_count: u64,

    /// Optional lookup gate
    pub bloom: Option<BloomFilter>,

    /// Largest key length present
    pub max_key_length: u32,

    /// Per-length geometry, ascending key length
    pub buckets: Vec<BucketMeta>,

    /// Absolute offset of the index section (uncorrected for skipped prefixes)
    pub index_offset: u64,

    /// Absolute offset of the data section (uncorrected for skipped prefixes)
    pub data_offset: u64,
}

impl Metadata {
    /// Serialized header length in bytes.
    ///
    /// The header is fully determined by bucket count and bloom geometry, which
    /// is what lets the writer fill in the absolute section offsets up front.
    #[must_use]
    pub fn serialized_len(&self) -> u64 {
        let bloom_words = self
            .bloom
            .as_ref()
            .map_or(0, |filter| filter.word_count() as u64);

        (MAGIC_BYTES.len() as u64)
            + 1 // version
            + 8 // created_at
            + 8 // key_count
            + 12 + 8 * bloom_words
            + 4 // bucket count
            + 4 // max key length
            + BUCKET_META_LEN * self.buckets.len() as u64
            + 8 // index offset
            + 8 // data offset
    }

    /// Geometry for the given key length, if that bucket exists.
    #[must_use]
    pub fn bucket(&self, key_length: usize) -> Option<&BucketMeta> {
        self.buckets
            .iter()
            .find(|bucket| bucket.key_length as usize == key_length)
    }

    /// Total byte length of the index section.
    #[must_use]
    pub fn index_length(&self) -> u64 {
        self.buckets.iter().map(BucketMeta::index_length).sum()
    }

    fn decode_body<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let version = reader.read_u8()?;
        if FormatVersion::try_from(version) != Ok(FormatVersion::V1) {
            return Err(DecodeError::InvalidVersion(version));
        }

        let created_at = reader.read_u64::<LittleEndian>()?;
        let key_count = reader.read_u64::<LittleEndian>()?;

        let bloom = BloomFilter::read_from(reader)?;

        let bucket_count = reader.read_u32::<LittleEndian>()?;
        let max_key_length = reader.read_u32::<LittleEndian>()?;

        let mut buckets = Vec::with_capacity(bucket_count as usize);
        for _ in 0..bucket_count {
            buckets.push(BucketMeta::decode_from(reader)?);
        }

        #[allow(clippy::indexing_slicing)]
        if !buckets
            .windows(2)
            .all(|pair| pair[0].key_length < pair[1].key_length)
        {
            return Err(DecodeError::InvalidHeader("Metadata"));
        }

        let index_offset = reader.read_u64::<LittleEndian>()?;
        let data_offset = reader.read_u64::<LittleEndian>()?;

        Ok(Self {
            created_at,
            key_count,
            bloom,
            max_key_length,
            buckets,
            index_offset,
            data_offset,
        })
    }

    /// Scans past unrecognized leading bytes until the magic sequence,
    /// then decodes the header.
    ///
    /// Returns the header and the number of bytes skipped ahead of it.
    /// The caller corrects the absolute section offsets by that count.
    pub fn scan_from<R: Read>(reader: &mut R) -> Result<(Self, u64), DecodeError> {
        let mut window = [0u8; MAGIC_BYTES.len()];
        let mut read: u64 = 0;

        loop {
            let mut byte = [0u8; 1];
            if reader.read(&mut byte)? == 0 {
                return Err(DecodeError::InvalidHeader("Metadata"));
            }

            window.rotate_left(1);
            window[MAGIC_BYTES.len() - 1] = byte[0];
            read += 1;

            if read >= MAGIC_BYTES.len() as u64 && window == MAGIC_BYTES {
                let skipped = read - MAGIC_BYTES.len() as u64;

                if skipped > 0 {
                    log::debug!("skipped {skipped} unrecognized bytes ahead of store header");
                }

                return Ok((Self::decode_body(reader)?, skipped));
            }
        }
    }
}

impl Encode for Metadata {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_all(&MAGIC_BYTES)?;
        writer.write_u8(FormatVersion::V1.into())?;

        writer.write_u64::<LittleEndian>(self.created_at)?;
        writer.write_u64::<LittleEndian>(self.key_count)?;

        BloomFilter::write_into(self.bloom.as_ref(), writer)?;

        writer.write_u32::<LittleEndian>(self.buckets.len() as u32)?;
        writer.write_u32::<LittleEndian>(self.max_key_length)?;

        for bucket in &self.buckets {
            bucket.encode_into(writer)?;
        }

        writer.write_u64::<LittleEndian>(self.index_offset)?;
        writer.write_u64::<LittleEndian>(self.data_offset)?;

        Ok(())
    }
}

impl Decode for Metadata {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut magic = [0u8; MAGIC_BYTES.len()];
        reader.read_exact(&mut magic)?;

        if magic != MAGIC_BYTES {
            return Err(DecodeError::InvalidHeader("Metadata"));
        }

        Self::decode_body(reader)
    }
}
