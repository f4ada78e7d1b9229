// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::DecodeError;

/// On-disk type tag: the leading byte of every serialized value
///
/// The tag set is closed; user types travel under [`Tag::Custom`] with a
/// registered name. Narrowed encodings (e.g. an int array stored as bytes)
/// carry their own tags, so decoding is a pure function of the tag.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Tag {
    Null = 0,
    BoolTrue = 1,
    BoolFalse = 2,

    // 32-bit ints: constants for the frequent -1..=8, MIN, then ranged widths
    IntM1 = 3,
    Int0 = 4,
    Int1 = 5,
    Int2 = 6,
    Int3 = 7,
    Int4 = 8,
    Int5 = 9,
    Int6 = 10,
    Int7 = 11,
    Int8 = 12,
    IntMin = 13,
    IntByte = 14,
    IntShort = 15,
    IntPacked = 16,
    IntPackedNegative = 17,
    Int = 18,

    // 64-bit ints, same family
    LongM1 = 19,
    Long0 = 20,
    Long1 = 21,
    Long2 = 22,
    Long3 = 23,
    Long4 = 24,
    Long5 = 25,
    Long6 = 26,
    Long7 = 27,
    Long8 = 28,
    LongMin = 29,
    LongByte = 30,
    LongShort = 31,
    LongPacked = 32,
    LongPackedNegative = 33,
    Long = 34,

    ByteM1 = 35,
    Byte0 = 36,
    Byte1 = 37,
    Byte = 38,

    ShortM1 = 39,
    Short0 = 40,
    Short1 = 41,
    ShortByte = 42,
    Short = 43,

    CharByte = 44,
    Char = 45,

    Float0 = 46,
    Float1 = 47,
    FloatByte = 48,
    Float = 49,

    Double0 = 50,
    Double1 = 51,
    DoubleByte = 52,
    Double = 53,

    StringEmpty = 54,
    String = 55,

    BigInt = 56,
    BigDecimal = 57,

    BoolArray = 58,
    ByteArray = 59,
    CharArray = 60,
    ShortArray = 61,

    // Int arrays, narrowed by observed value range
    IntArrayByte = 62,
    IntArrayShort = 63,
    IntArrayPacked = 64,
    IntArray = 65,

    // Long arrays, likewise
    LongArrayByte = 66,
    LongArrayShort = 67,
    LongArrayInt = 68,
    LongArrayPacked = 69,
    LongArray = 70,

    FloatArray = 71,
    DoubleArray = 72,
    StringArray = 73,
    ValueArray = 74,

    IntArray2 = 75,
    LongArray2 = 76,

    /// Length-prefixed compressed bytes wrapping another encoded value
    Compressed = 77,

    /// Registered type name + opaque payload
    Custom = 78,
}

impl From<Tag> for u8 {
    fn from(value: Tag) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for Tag {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use Tag::*;

        Ok(match value {
            0 => Null,
            1 => BoolTrue,
            2 => BoolFalse,
            3 => IntM1,
            4 => Int0,
            5 => Int1,
            6 => Int2,
            7 => Int3,
            8 => Int4,
            9 => Int5,
            10 => Int6,
            11 => Int7,
            12 => Int8,
            13 => IntMin,
            14 => IntByte,
            15 => IntShort,
            16 => IntPacked,
            17 => IntPackedNegative,
            18 => Int,
            19 => LongM1,
            20 => Long0,
            21 => Long1,
            22 => Long2,
            23 => Long3,
            24 => Long4,
            25 => Long5,
            26 => Long6,
            27 => Long7,
            28 => Long8,
            29 => LongMin,
            30 => LongByte,
            31 => LongShort,
            32 => LongPacked,
            33 => LongPackedNegative,
            34 => Long,
            35 => ByteM1,
            36 => Byte0,
            37 => Byte1,
            38 => Byte,
            39 => ShortM1,
            40 => Short0,
            41 => Short1,
            42 => ShortByte,
            43 => Short,
            44 => CharByte,
            45 => Char,
            46 => Float0,
            47 => Float1,
            48 => FloatByte,
            49 => Float,
            50 => Double0,
            51 => Double1,
            52 => DoubleByte,
            53 => Double,
            54 => StringEmpty,
            55 => String,
            56 => BigInt,
            57 => BigDecimal,
            58 => BoolArray,
            59 => ByteArray,
            60 => CharArray,
            61 => ShortArray,
            62 => IntArrayByte,
            63 => IntArrayShort,
            64 => IntArrayPacked,
            65 => IntArray,
            66 => LongArrayByte,
            67 => LongArrayShort,
            68 => LongArrayInt,
            69 => LongArrayPacked,
            70 => LongArray,
            71 => FloatArray,
            72 => DoubleArray,
            73 => StringArray,
            74 => ValueArray,
            75 => IntArray2,
            76 => LongArray2,
            77 => Compressed,
            78 => Custom,
            tag => return Err(DecodeError::InvalidTag(("Value", tag))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Tag;
    use test_log::test;

    #[test]
    fn tag_round_trip() {
        for byte in 0u8..=78 {
            let tag = Tag::try_from(byte).expect("tag should exist");
            assert_eq!(byte, u8::from(tag));
        }
    }

    #[test]
    fn tag_rejects_unknown() {
        assert!(Tag::try_from(79).is_err());
        assert!(Tag::try_from(255).is_err());
    }
}
