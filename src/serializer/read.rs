// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::tag::Tag;
use super::value::Value;
use crate::coding::DecodeError;
use crate::compression::decompress;
use bigdecimal::BigDecimal;
use byteorder::{LittleEndian, ReadBytesExt};
use num_bigint::BigInt;
use std::io::Read;
use varint_rs::VarintReader;

/// Deserializes one tagged value.
///
/// Narrowed encodings re-widen purely from the tag: e.g. an int array stored
/// as bytes is decoded into a `Vec<i32>`, promoting each element.
#[allow(clippy::too_many_lines)]
pub fn read_value<R: Read>(reader: &mut R) -> Result<Value, DecodeError> {
    let tag = Tag::try_from(reader.read_u8()?)?;

    Ok(match tag {
        Tag::Null => Value::Null,
        Tag::BoolTrue => Value::Bool(true),
        Tag::BoolFalse => Value::Bool(false),

        Tag::IntM1 => Value::Int(-1),
        Tag::Int0 => Value::Int(0),
        Tag::Int1 => Value::Int(1),
        Tag::Int2 => Value::Int(2),
        Tag::Int3 => Value::Int(3),
        Tag::Int4 => Value::Int(4),
        Tag::Int5 => Value::Int(5),
        Tag::Int6 => Value::Int(6),
        Tag::Int7 => Value::Int(7),
        Tag::Int8 => Value::Int(8),
        Tag::IntMin => Value::Int(i32::MIN),
        Tag::IntByte => Value::Int(i32::from(reader.read_u8()?)),
        Tag::IntShort => Value::Int(i32::from(reader.read_i16::<LittleEndian>()?)),
        Tag::IntPacked => Value::Int(reader.read_u32_varint()? as i32),
        Tag::IntPackedNegative => Value::Int(-(reader.read_u32_varint()? as i32)),
        Tag::Int => Value::Int(reader.read_i32::<LittleEndian>()?),

        Tag::LongM1 => Value::Long(-1),
        Tag::Long0 => Value::Long(0),
        Tag::Long1 => Value::Long(1),
        Tag::Long2 => Value::Long(2),
        Tag::Long3 => Value::Long(3),
        Tag::Long4 => Value::Long(4),
        Tag::Long5 => Value::Long(5),
        Tag::Long6 => Value::Long(6),
        Tag::Long7 => Value::Long(7),
        Tag::Long8 => Value::Long(8),
        Tag::LongMin => Value::Long(i64::MIN),
        Tag::LongByte => Value::Long(i64::from(reader.read_u8()?)),
        Tag::LongShort => Value::Long(i64::from(reader.read_i16::<LittleEndian>()?)),
        Tag::LongPacked => Value::Long(reader.read_u64_varint()? as i64),
        Tag::LongPackedNegative => Value::Long(-(reader.read_u64_varint()? as i64)),
        Tag::Long => Value::Long(reader.read_i64::<LittleEndian>()?),

        Tag::ByteM1 => Value::Byte(-1),
        Tag::Byte0 => Value::Byte(0),
        Tag::Byte1 => Value::Byte(1),
        Tag::Byte => Value::Byte(reader.read_i8()?),

        Tag::ShortM1 => Value::Short(-1),
        Tag::Short0 => Value::Short(0),
        Tag::Short1 => Value::Short(1),
        Tag::ShortByte => Value::Short(i16::from(reader.read_u8()?)),
        Tag::Short => Value::Short(reader.read_i16::<LittleEndian>()?),

        Tag::CharByte => Value::Char(char::from(reader.read_u8()?)),
        Tag::Char => {
            let code = reader.read_u32::<LittleEndian>()?;
            Value::Char(char::from_u32(code).ok_or(DecodeError::InvalidTag(("Char", 0)))?)
        }

        Tag::Float0 => Value::Float(0.0),
        Tag::Float1 => Value::Float(1.0),
        Tag::FloatByte => Value::Float(f32::from(reader.read_u8()?)),
        Tag::Float => Value::Float(f32::from_bits(reader.read_u32::<LittleEndian>()?)),

        Tag::Double0 => Value::Double(0.0),
        Tag::Double1 => Value::Double(1.0),
        Tag::DoubleByte => Value::Double(f64::from(reader.read_u8()?)),
        Tag::Double => Value::Double(f64::from_bits(reader.read_u64::<LittleEndian>()?)),

        Tag::StringEmpty => Value::Str(String::new()),
        Tag::String => Value::Str(read_string(reader)?),

        Tag::BigInt => {
            let len = reader.read_u32_varint()? as usize;
            let mut bytes = vec![0u8; len];
            reader.read_exact(&mut bytes)?;
            Value::BigInt(BigInt::from_signed_bytes_le(&bytes))
        }

        Tag::BigDecimal => {
            let zigzag = reader.read_u64_varint()?;
            let scale = ((zigzag >> 1) as i64) ^ -((zigzag & 1) as i64);
            let len = reader.read_u32_varint()? as usize;
            let mut bytes = vec![0u8; len];
            reader.read_exact(&mut bytes)?;
            Value::BigDecimal(BigDecimal::new(BigInt::from_signed_bytes_le(&bytes), scale))
        }

        Tag::BoolArray => {
            let len = reader.read_u32_varint()? as usize;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(reader.read_u8()? != 0);
            }
            Value::BoolArray(items)
        }

        Tag::ByteArray => {
            let len = reader.read_u32_varint()? as usize;
            let mut bytes = vec![0u8; len];
            reader.read_exact(&mut bytes)?;
            Value::ByteArray(bytes)
        }

        Tag::CharArray => {
            let len = reader.read_u32_varint()? as usize;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                let code = reader.read_u32_varint()?;
                items.push(char::from_u32(code).ok_or(DecodeError::InvalidTag(("Char", 0)))?);
            }
            Value::CharArray(items)
        }

        Tag::ShortArray => {
            let len = reader.read_u32_varint()? as usize;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(reader.read_i16::<LittleEndian>()?);
            }
            Value::ShortArray(items)
        }

        Tag::IntArrayByte
        | Tag::IntArrayShort
        | Tag::IntArrayPacked
        | Tag::IntArray => Value::IntArray(read_int_array(reader, tag)?),

        Tag::LongArrayByte
        | Tag::LongArrayShort
        | Tag::LongArrayInt
        | Tag::LongArrayPacked
        | Tag::LongArray => Value::LongArray(read_long_array(reader, tag)?),

        Tag::FloatArray => {
            let len = reader.read_u32_varint()? as usize;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(f32::from_bits(reader.read_u32::<LittleEndian>()?));
            }
            Value::FloatArray(items)
        }

        Tag::DoubleArray => {
            let len = reader.read_u32_varint()? as usize;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(f64::from_bits(reader.read_u64::<LittleEndian>()?));
            }
            Value::DoubleArray(items)
        }

        Tag::StringArray => {
            let len = reader.read_u32_varint()? as usize;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(read_string(reader)?);
            }
            Value::StringArray(items)
        }

        Tag::ValueArray => {
            let len = reader.read_u32_varint()? as usize;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(read_value(reader)?);
            }
            Value::Array(items)
        }

        Tag::IntArray2 => {
            let len = reader.read_u32_varint()? as usize;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                let inner_tag = Tag::try_from(reader.read_u8()?)?;
                items.push(read_int_array(reader, inner_tag)?);
            }
            Value::IntArray2(items)
        }

        Tag::LongArray2 => {
            let len = reader.read_u32_varint()? as usize;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                let inner_tag = Tag::try_from(reader.read_u8()?)?;
                items.push(read_long_array(reader, inner_tag)?);
            }
            Value::LongArray2(items)
        }

        Tag::Compressed => {
            let len = reader.read_u32_varint()? as usize;
            let mut bytes = vec![0u8; len];
            reader.read_exact(&mut bytes)?;

            let plain = decompress(&bytes)?;
            read_value(&mut &plain[..])?
        }

        Tag::Custom => {
            let name_len = reader.read_u32_varint()? as usize;
            let mut name = vec![0u8; name_len];
            reader.read_exact(&mut name)?;

            let payload_len = reader.read_u32_varint()? as usize;
            let mut payload = vec![0u8; payload_len];
            reader.read_exact(&mut payload)?;

            Value::Custom {
                type_name: String::from_utf8(name)?,
                payload,
            }
        }
    })
}

/// Varint char count followed by one varint code point per char.
fn read_string<R: Read>(reader: &mut R) -> Result<String, DecodeError> {
    let len = reader.read_u32_varint()? as usize;
    let mut out = String::with_capacity(len);

    for _ in 0..len {
        let code = reader.read_u32_varint()?;
        out.push(char::from_u32(code).ok_or(DecodeError::InvalidTag(("Char", 0)))?);
    }

    Ok(out)
}

fn read_int_array<R: Read>(reader: &mut R, tag: Tag) -> Result<Vec<i32>, DecodeError> {
    let len = reader.read_u32_varint()? as usize;
    let mut items = Vec::with_capacity(len);

    for _ in 0..len {
        items.push(match tag {
            Tag::IntArrayByte => i32::from(reader.read_u8()?),
            Tag::IntArrayShort => i32::from(reader.read_i16::<LittleEndian>()?),
            Tag::IntArrayPacked => reader.read_u32_varint()? as i32,
            Tag::IntArray => reader.read_i32::<LittleEndian>()?,
            tag => return Err(DecodeError::InvalidTag(("IntArray", tag.into()))),
        });
    }

    Ok(items)
}

fn read_long_array<R: Read>(reader: &mut R, tag: Tag) -> Result<Vec<i64>, DecodeError> {
    let len = reader.read_u32_varint()? as usize;
    let mut items = Vec::with_capacity(len);

    for _ in 0..len {
        items.push(match tag {
            Tag::LongArrayByte => i64::from(reader.read_u8()?),
            Tag::LongArrayShort => i64::from(reader.read_i16::<LittleEndian>()?),
            Tag::LongArrayInt => i64::from(reader.read_i32::<LittleEndian>()?),
            Tag::LongArrayPacked => reader.read_u64_varint()? as i64,
            Tag::LongArray => reader.read_i64::<LittleEndian>()?,
            tag => return Err(DecodeError::InvalidTag(("LongArray", tag.into()))),
        });
    }

    Ok(items)
}
