// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod bit_array;

use crate::coding::{DecodeError, EncodeError};
use crate::hash::hash128;
use bit_array::BitArray;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Two hashes that are used for double hashing
pub type CompositeHash = (u64, u64);

/// A standard bloom filter
///
/// The filter gates point lookups: a negative answer skips the index probe
/// entirely and is always correct, a positive answer means "probably present".
///
/// Uses double hashing (`h_i(x) = h1(x) + i * h2(x)`) instead of `k` independent
/// hash functions.
#[derive(Debug, Eq, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub struct BloomFilter {
    /// Raw words exposed as bit array
    inner: BitArray,

    /// Bit count
    m: usize,

    /// Number of hash functions
    k: usize,
}

impl BloomFilter {
    /// Constructs a bloom filter that can hold `n` items
    /// while maintaining a certain false positive rate `fpr`.
    #[must_use]
    pub fn with_fp_rate(n: usize, fpr: f64) -> Self {
        use std::f64::consts::LN_2;

        assert!(n > 0);

        // NOTE: Some sensible minimum
        let fpr = fpr.max(0.000_001);

        let m = Self::calculate_m(n, fpr);
        let k = (((m as f64 / n as f64) * LN_2).round() as usize).max(1);

        Self {
            inner: BitArray::with_capacity(m / 64),
            m,
            k,
        }
    }

    fn calculate_m(n: usize, fp_rate: f64) -> usize {
        use std::f64::consts::LN_2;

        let n = n as f64;
        let ln2_squared = LN_2.powi(2);

        let m = (n * fp_rate.ln().abs() / ln2_squared).ceil();

        // Round up to the next whole word
        ((m / 64.0).ceil() * 64.0) as usize
    }

    /// Number of bits.
    #[must_use]
    pub fn bit_count(&self) -> usize {
        self.m
    }

    /// Number of backing 64-bit words.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.inner.len()
    }

    /// Returns the amount of hashes used per lookup.
    #[must_use]
    pub fn hash_fn_count(&self) -> usize {
        self.k
    }

    /// Returns `true` if the hash may be contained.
    ///
    /// Will never have a false negative.
    #[must_use]
    pub fn contains_hash(&self, (h1, h2): CompositeHash) -> bool {
        for i in 0..(self.k as u64) {
            let idx = h1.wrapping_add(i.wrapping_mul(h2)) % (self.m as u64);

            if !self.inner.get(idx as usize) {
                return false;
            }
        }

        true
    }

    /// Returns `true` if the item may be contained.
    ///
    /// Will never have a false negative.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.contains_hash(Self::get_hash(key))
    }

    /// Adds the key to the filter.
    pub fn set_with_hash(&mut self, (h1, h2): CompositeHash) {
        for i in 0..(self.k as u64) {
            let idx = h1.wrapping_add(i.wrapping_mul(h2)) % (self.m as u64);
            self.inner.enable(idx as usize);
        }
    }

    /// Gets the hash of a key.
    #[must_use]
    pub fn get_hash(key: &[u8]) -> CompositeHash {
        let h0 = hash128(key);
        let h1 = (h0 >> 64) as u64;
        let h2 = h0 as u64;
        (h1, h2)
    }

    /// Writes the header descriptor (bit count, word count, hash count, words).
    ///
    /// An absent filter is encoded as three zero fields.
    pub fn write_into<W: Write>(
        filter: Option<&Self>,
        writer: &mut W,
    ) -> Result<(), EncodeError> {
        let Some(filter) = filter else {
            writer.write_u32::<LittleEndian>(0)?;
            writer.write_u32::<LittleEndian>(0)?;
            writer.write_u32::<LittleEndian>(0)?;
            return Ok(());
        };

        writer.write_u32::<LittleEndian>(filter.m as u32)?;
        writer.write_u32::<LittleEndian>(filter.word_count() as u32)?;
        writer.write_u32::<LittleEndian>(filter.k as u32)?;

        for word in filter.inner.words() {
            writer.write_u64::<LittleEndian>(*word)?;
        }

        Ok(())
    }

    /// Inverse of [`BloomFilter::write_into`]; a zero word count means no filter.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Option<Self>, DecodeError> {
        let m = reader.read_u32::<LittleEndian>()? as usize;
        let word_count = reader.read_u32::<LittleEndian>()? as usize;
        let k = reader.read_u32::<LittleEndian>()? as usize;

        if word_count == 0 {
            return Ok(None);
        }

        let mut words = vec![0u64; word_count];
        for word in &mut words {
            *word = reader.read_u64::<LittleEndian>()?;
        }

        Ok(Some(Self {
            inner: BitArray::from_words(words.into_boxed_slice()),
            m,
            k,
        }))
    }
}
