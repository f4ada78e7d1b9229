// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::tag::Tag;
use super::value::Value;
use super::COMPRESS_MIN_LEN;
use crate::coding::EncodeError;
use crate::compression::{compress, CompressionType};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use varint_rs::VarintWriter;

// Scalars above these bounds take more varint bytes than their full width
const INT_PACK_LIMIT: i64 = 1 << 28;
const LONG_PACK_LIMIT: i64 = 1 << 56;

fn write_tag<W: Write>(writer: &mut W, tag: Tag) -> Result<(), EncodeError> {
    writer.write_u8(tag.into())?;
    Ok(())
}

/// Serializes a value, compressing large arrays when enabled.
///
/// Compression wraps the plain encoding in a [`Tag::Compressed`] frame; it is
/// only ever applied to values, never keys, which is enforced by the caller
/// handing in [`CompressionType::None`] on the key side.
pub fn write_value<W: Write>(
    value: &Value,
    writer: &mut W,
    compression: CompressionType,
) -> Result<(), EncodeError> {
    let compressible = compression == CompressionType::Lz4
        && value.array_len().is_some_and(|len| len > COMPRESS_MIN_LEN);

    if compressible {
        let mut plain = Vec::new();
        write_value_plain(value, &mut plain)?;

        let compressed = compress(&plain);

        write_tag(writer, Tag::Compressed)?;
        writer.write_u32_varint(compressed.len() as u32)?;
        writer.write_all(&compressed)?;

        return Ok(());
    }

    write_value_plain(value, writer)
}

/// The tag-dispatched plain encoding.
#[allow(clippy::too_many_lines)]
pub fn write_value_plain<W: Write>(value: &Value, writer: &mut W) -> Result<(), EncodeError> {
    match value {
        Value::Null => write_tag(writer, Tag::Null),

        Value::Bool(true) => write_tag(writer, Tag::BoolTrue),
        Value::Bool(false) => write_tag(writer, Tag::BoolFalse),

        Value::Int(v) => write_int(*v, writer),
        Value::Long(v) => write_long(*v, writer),

        Value::Byte(v) => match v {
            -1 => write_tag(writer, Tag::ByteM1),
            0 => write_tag(writer, Tag::Byte0),
            1 => write_tag(writer, Tag::Byte1),
            v => {
                write_tag(writer, Tag::Byte)?;
                writer.write_i8(*v)?;
                Ok(())
            }
        },

        Value::Short(v) => match v {
            -1 => write_tag(writer, Tag::ShortM1),
            0 => write_tag(writer, Tag::Short0),
            1 => write_tag(writer, Tag::Short1),
            v if (2..=255).contains(v) => {
                write_tag(writer, Tag::ShortByte)?;
                writer.write_u8(*v as u8)?;
                Ok(())
            }
            v => {
                write_tag(writer, Tag::Short)?;
                writer.write_i16::<LittleEndian>(*v)?;
                Ok(())
            }
        },

        Value::Char(v) => {
            let code = *v as u32;
            if code <= 255 {
                write_tag(writer, Tag::CharByte)?;
                writer.write_u8(code as u8)?;
            } else {
                write_tag(writer, Tag::Char)?;
                writer.write_u32::<LittleEndian>(code)?;
            }
            Ok(())
        }

        Value::Float(v) => {
            if v.to_bits() == 0.0f32.to_bits() {
                write_tag(writer, Tag::Float0)
            } else if v.to_bits() == 1.0f32.to_bits() {
                write_tag(writer, Tag::Float1)
            } else if (0.0..=255.0).contains(v) && v.to_bits() == (*v as u8 as f32).to_bits() {
                write_tag(writer, Tag::FloatByte)?;
                writer.write_u8(*v as u8)?;
                Ok(())
            } else {
                write_tag(writer, Tag::Float)?;
                writer.write_u32::<LittleEndian>(v.to_bits())?;
                Ok(())
            }
        }

        Value::Double(v) => {
            if v.to_bits() == 0.0f64.to_bits() {
                write_tag(writer, Tag::Double0)
            } else if v.to_bits() == 1.0f64.to_bits() {
                write_tag(writer, Tag::Double1)
            } else if (0.0..=255.0).contains(v) && v.to_bits() == (*v as u8 as f64).to_bits() {
                write_tag(writer, Tag::DoubleByte)?;
                writer.write_u8(*v as u8)?;
                Ok(())
            } else {
                write_tag(writer, Tag::Double)?;
                writer.write_u64::<LittleEndian>(v.to_bits())?;
                Ok(())
            }
        }

        Value::Str(v) => {
            if v.is_empty() {
                write_tag(writer, Tag::StringEmpty)
            } else {
                write_tag(writer, Tag::String)?;
                write_string(v, writer)
            }
        }

        Value::BigInt(v) => {
            write_tag(writer, Tag::BigInt)?;
            let bytes = v.to_signed_bytes_le();
            writer.write_u32_varint(bytes.len() as u32)?;
            writer.write_all(&bytes)?;
            Ok(())
        }

        Value::BigDecimal(v) => {
            write_tag(writer, Tag::BigDecimal)?;
            let (digits, scale) = v.as_bigint_and_exponent();
            // Zigzagged so negative scales stay short
            writer.write_u64_varint(((scale << 1) ^ (scale >> 63)) as u64)?;
            let bytes = digits.to_signed_bytes_le();
            writer.write_u32_varint(bytes.len() as u32)?;
            writer.write_all(&bytes)?;
            Ok(())
        }

        Value::BoolArray(v) => {
            write_tag(writer, Tag::BoolArray)?;
            writer.write_u32_varint(v.len() as u32)?;
            for item in v {
                writer.write_u8(u8::from(*item))?;
            }
            Ok(())
        }

        Value::ByteArray(v) => {
            write_tag(writer, Tag::ByteArray)?;
            writer.write_u32_varint(v.len() as u32)?;
            writer.write_all(v)?;
            Ok(())
        }

        Value::CharArray(v) => {
            write_tag(writer, Tag::CharArray)?;
            writer.write_u32_varint(v.len() as u32)?;
            for item in v {
                writer.write_u32_varint(*item as u32)?;
            }
            Ok(())
        }

        Value::ShortArray(v) => {
            write_tag(writer, Tag::ShortArray)?;
            writer.write_u32_varint(v.len() as u32)?;
            for item in v {
                writer.write_i16::<LittleEndian>(*item)?;
            }
            Ok(())
        }

        Value::IntArray(v) => write_int_array(v, writer),
        Value::LongArray(v) => write_long_array(v, writer),

        Value::FloatArray(v) => {
            write_tag(writer, Tag::FloatArray)?;
            writer.write_u32_varint(v.len() as u32)?;
            for item in v {
                writer.write_u32::<LittleEndian>(item.to_bits())?;
            }
            Ok(())
        }

        Value::DoubleArray(v) => {
            write_tag(writer, Tag::DoubleArray)?;
            writer.write_u32_varint(v.len() as u32)?;
            for item in v {
                writer.write_u64::<LittleEndian>(item.to_bits())?;
            }
            Ok(())
        }

        Value::StringArray(v) => {
            write_tag(writer, Tag::StringArray)?;
            writer.write_u32_varint(v.len() as u32)?;
            for item in v {
                write_string(item, writer)?;
            }
            Ok(())
        }

        Value::Array(v) => {
            write_tag(writer, Tag::ValueArray)?;
            writer.write_u32_varint(v.len() as u32)?;
            for item in v {
                write_value_plain(item, writer)?;
            }
            Ok(())
        }

        Value::IntArray2(v) => {
            write_tag(writer, Tag::IntArray2)?;
            writer.write_u32_varint(v.len() as u32)?;
            for inner in v {
                write_int_array(inner, writer)?;
            }
            Ok(())
        }

        Value::LongArray2(v) => {
            write_tag(writer, Tag::LongArray2)?;
            writer.write_u32_varint(v.len() as u32)?;
            for inner in v {
                write_long_array(inner, writer)?;
            }
            Ok(())
        }

        Value::Custom { type_name, payload } => {
            write_tag(writer, Tag::Custom)?;
            writer.write_u32_varint(type_name.len() as u32)?;
            writer.write_all(type_name.as_bytes())?;
            writer.write_u32_varint(payload.len() as u32)?;
            writer.write_all(payload)?;
            Ok(())
        }
    }
}

/// Varint char count followed by one varint code point per char.
fn write_string<W: Write>(value: &str, writer: &mut W) -> Result<(), EncodeError> {
    writer.write_u32_varint(value.chars().count() as u32)?;
    for c in value.chars() {
        writer.write_u32_varint(c as u32)?;
    }
    Ok(())
}

fn write_int<W: Write>(v: i32, writer: &mut W) -> Result<(), EncodeError> {
    match v {
        -1 => write_tag(writer, Tag::IntM1),
        0..=8 => write_tag(writer, CONST_INT_TAGS[v as usize]),
        i32::MIN => write_tag(writer, Tag::IntMin),
        9..=255 => {
            write_tag(writer, Tag::IntByte)?;
            writer.write_u8(v as u8)?;
            Ok(())
        }
        -32_768..=32_767 => {
            write_tag(writer, Tag::IntShort)?;
            writer.write_i16::<LittleEndian>(v as i16)?;
            Ok(())
        }
        v if v > 0 && i64::from(v) < INT_PACK_LIMIT => {
            write_tag(writer, Tag::IntPacked)?;
            writer.write_u32_varint(v as u32)?;
            Ok(())
        }
        v if v < 0 && -i64::from(v) < INT_PACK_LIMIT => {
            write_tag(writer, Tag::IntPackedNegative)?;
            writer.write_u32_varint((-i64::from(v)) as u32)?;
            Ok(())
        }
        v => {
            write_tag(writer, Tag::Int)?;
            writer.write_i32::<LittleEndian>(v)?;
            Ok(())
        }
    }
}

fn write_long<W: Write>(v: i64, writer: &mut W) -> Result<(), EncodeError> {
    match v {
        -1 => write_tag(writer, Tag::LongM1),
        0..=8 => write_tag(writer, CONST_LONG_TAGS[v as usize]),
        i64::MIN => write_tag(writer, Tag::LongMin),
        9..=255 => {
            write_tag(writer, Tag::LongByte)?;
            writer.write_u8(v as u8)?;
            Ok(())
        }
        -32_768..=32_767 => {
            write_tag(writer, Tag::LongShort)?;
            writer.write_i16::<LittleEndian>(v as i16)?;
            Ok(())
        }
        v if v > 0 && v < LONG_PACK_LIMIT => {
            write_tag(writer, Tag::LongPacked)?;
            writer.write_u64_varint(v as u64)?;
            Ok(())
        }
        v if v < 0 && v.checked_neg().is_some_and(|n| n < LONG_PACK_LIMIT) => {
            write_tag(writer, Tag::LongPackedNegative)?;
            writer.write_u64_varint((-v) as u64)?;
            Ok(())
        }
        v => {
            write_tag(writer, Tag::Long)?;
            writer.write_i64::<LittleEndian>(v)?;
            Ok(())
        }
    }
}

const CONST_INT_TAGS: [Tag; 9] = [
    Tag::Int0,
    Tag::Int1,
    Tag::Int2,
    Tag::Int3,
    Tag::Int4,
    Tag::Int5,
    Tag::Int6,
    Tag::Int7,
    Tag::Int8,
];

const CONST_LONG_TAGS: [Tag; 9] = [
    Tag::Long0,
    Tag::Long1,
    Tag::Long2,
    Tag::Long3,
    Tag::Long4,
    Tag::Long5,
    Tag::Long6,
    Tag::Long7,
    Tag::Long8,
];

/// Picks the narrowest element encoding the observed value range allows.
fn write_int_array<W: Write>(v: &[i32], writer: &mut W) -> Result<(), EncodeError> {
    if v.iter().all(|item| (0..=255).contains(item)) {
        write_tag(writer, Tag::IntArrayByte)?;
        writer.write_u32_varint(v.len() as u32)?;
        for item in v {
            writer.write_u8(*item as u8)?;
        }
    } else if v.iter().all(|item| (-32_768..=32_767).contains(item)) {
        write_tag(writer, Tag::IntArrayShort)?;
        writer.write_u32_varint(v.len() as u32)?;
        for item in v {
            writer.write_i16::<LittleEndian>(*item as i16)?;
        }
    } else if v.iter().all(|item| *item >= 0) {
        write_tag(writer, Tag::IntArrayPacked)?;
        writer.write_u32_varint(v.len() as u32)?;
        for item in v {
            writer.write_u32_varint(*item as u32)?;
        }
    } else {
        write_tag(writer, Tag::IntArray)?;
        writer.write_u32_varint(v.len() as u32)?;
        for item in v {
            writer.write_i32::<LittleEndian>(*item)?;
        }
    }

    Ok(())
}

fn write_long_array<W: Write>(v: &[i64], writer: &mut W) -> Result<(), EncodeError> {
    if v.iter().all(|item| (0..=255).contains(item)) {
        write_tag(writer, Tag::LongArrayByte)?;
        writer.write_u32_varint(v.len() as u32)?;
        for item in v {
            writer.write_u8(*item as u8)?;
        }
    } else if v.iter().all(|item| (-32_768..=32_767).contains(item)) {
        write_tag(writer, Tag::LongArrayShort)?;
        writer.write_u32_varint(v.len() as u32)?;
        for item in v {
            writer.write_i16::<LittleEndian>(*item as i16)?;
        }
    } else if v
        .iter()
        .all(|item| (i64::from(i32::MIN)..=i64::from(i32::MAX)).contains(item))
    {
        write_tag(writer, Tag::LongArrayInt)?;
        writer.write_u32_varint(v.len() as u32)?;
        for item in v {
            writer.write_i32::<LittleEndian>(*item as i32)?;
        }
    } else if v.iter().all(|item| *item >= 0) {
        write_tag(writer, Tag::LongArrayPacked)?;
        writer.write_u32_varint(v.len() as u32)?;
        for item in v {
            writer.write_u64_varint(*item as u64)?;
        }
    } else {
        write_tag(writer, Tag::LongArray)?;
        writer.write_u32_varint(v.len() as u32)?;
        for item in v {
            writer.write_i64::<LittleEndian>(*item)?;
        }
    }

    Ok(())
}
