// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Index/data geometry of one key-length bucket
///
/// Region offsets are relative to the index and data section bases;
/// the reader adds the section base (plus any skipped file prefix).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BucketMeta {
    /// Key length shared by every key in this bucket
    pub key_length: u32,

    /// Entries streamed during the build (counts overwritten duplicates)
    pub put_count: u64,

    /// Unique keys placed into the index
    pub key_count: u64,

    /// Slots in the index region
    pub slot_count: u64,

    /// Bytes per slot (key length + packed offset width)
    pub slot_size: u32,

    /// Offset of this bucket's slot array within the index section
    pub index_offset: u64,

    /// Offset of this bucket's records within the data section
    pub data_offset: u64,
}

impl BucketMeta {
    /// Packed offset width within a slot.
    #[must_use]
    pub fn offset_width(&self) -> u32 {
        self.slot_size - self.key_length
    }

    /// Byte length of this bucket's slot array.
    #[must_use]
    pub fn index_length(&self) -> u64 {
        self.slot_count * u64::from(self.slot_size)
    }
}

impl Encode for BucketMeta {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u32::<LittleEndian>(self.key_length)?;
        writer.write_u64::<LittleEndian>(self.put_count)?;
        writer.write_u64::<LittleEndian>(self.key_count)?;
        writer.write_u64::<LittleEndian>(self.slot_count)?;
        writer.write_u32::<LittleEndian>(self.slot_size)?;
        writer.write_u64::<LittleEndian>(self.index_offset)?;
        writer.write_u64::<LittleEndian>(self.data_offset)?;
        Ok(())
    }
}

impl Decode for BucketMeta {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let key_length = reader.read_u32::<LittleEndian>()?;
        let put_count = reader.read_u64::<LittleEndian>()?;
        let key_count = reader.read_u64::<LittleEndian>()?;
        let slot_count = reader.read_u64::<LittleEndian>()?;
        let slot_size = reader.read_u32::<LittleEndian>()?;
        let index_offset = reader.read_u64::<LittleEndian>()?;
        let data_offset = reader.read_u64::<LittleEndian>()?;

        if slot_size < key_length {
            return Err(DecodeError::InvalidHeader("BucketMeta"));
        }

        Ok(Self {
            key_length,
            put_count,
            key_count,
            slot_count,
            slot_size,
            index_offset,
            data_offset,
        })
    }
}

/// Serialized size of one bucket descriptor.
pub const BUCKET_META_LEN: u64 = 4 + 8 + 8 + 8 + 4 + 8 + 8;

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn bucket_meta_round_trip() -> crate::Result<()> {
        let meta = BucketMeta {
            key_length: 4,
            put_count: 100,
            key_count: 100,
            slot_count: 133,
            slot_size: 6,
            index_offset: 1_024,
            data_offset: 77,
        };

        let bytes = meta.encode_into_vec();
        assert_eq!(BUCKET_META_LEN, bytes.len() as u64);

        assert_eq!(meta, BucketMeta::decode_from(&mut &bytes[..])?);
        assert_eq!(2, meta.offset_width());
        assert_eq!(798, meta.index_length());

        Ok(())
    }

    #[test]
    fn bucket_meta_rejects_undersized_slots() {
        let meta = BucketMeta {
            key_length: 8,
            slot_size: 4,
            ..Default::default()
        };

        let bytes = meta.encode_into_vec();
        assert!(matches!(
            BucketMeta::decode_from(&mut &bytes[..]),
            Err(DecodeError::InvalidHeader("BucketMeta"))
        ));
    }
}
