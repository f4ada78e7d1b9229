// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::bloom::BloomFilter;
use crate::hash::hash64;
use crate::{Error, Slice};
use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::io::{BufReader, Read};
use std::path::Path;
use varint_rs::{VarintReader, VarintWriter};

/// Result of one bucket's placement pass
pub struct BuiltIndex {
    /// The finished slot array, kept mapped until it is concatenated
    /// into the output
    pub slots: MmapMut,

    /// Unique keys placed
    pub key_count: u64,

    /// Probe steps beyond the home slot, for diagnostics
    pub collisions: u64,
}

/// Runs the hash-placement pass for one bucket.
///
/// Replays `(key, offset)` entries from the scratch index stream and places
/// each into an exact-size slot array using linear probing. A slot is
/// `key_length` raw key bytes followed by the data offset as a varint
/// zero-padded to the bucket's offset width; a packed offset of zero marks
/// an empty slot.
#[allow(clippy::too_many_arguments)]
pub fn build_index(
    scratch_path: &Path,
    slots_path: &Path,
    key_length: usize,
    put_count: u64,
    slot_count: u64,
    slot_size: usize,
    allow_duplicates: bool,
    mut bloom: Option<&mut BloomFilter>,
) -> crate::Result<BuiltIndex> {
    let slots_file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(slots_path)?;
    slots_file.set_len(slot_count * slot_size as u64)?;

    // SAFETY: the scratch file is exclusively owned by this writer
    // and unmapped before the scratch directory is removed
    #[expect(unsafe_code, reason = "see safety")]
    let mut slots = unsafe { MmapMut::map_mut(&slots_file)? };

    let mut stream = BufReader::new(std::fs::File::open(scratch_path)?);
    let mut key = vec![0u8; key_length];
    let mut packed = Vec::with_capacity(slot_size - key_length);

    let mut key_count = 0u64;
    let mut collisions = 0u64;

    for _ in 0..put_count {
        stream.read_exact(&mut key)?;
        let offset = stream.read_u64_varint()?;

        packed.clear();
        packed.write_u64_varint(offset)?;
        debug_assert!(packed.len() <= slot_size - key_length);
        packed.resize(slot_size - key_length, 0);

        let hash = hash64(&key);
        let mut placed = false;

        for probe in 0..slot_count {
            let slot = hash.wrapping_add(probe) % slot_count;
            let start = (slot * slot_size as u64) as usize;

            #[allow(clippy::expect_used)]
            let slot_bytes = slots
                .get_mut(start..start + slot_size)
                .expect("slot array was sized for slot_count slots");

            let (slot_key, slot_packed) = slot_bytes.split_at_mut(key_length);

            let occupied = {
                let mut tail: &[u8] = slot_packed;
                tail.read_u64_varint()? != 0
            };

            if !occupied {
                slot_key.copy_from_slice(&key);
                slot_packed.copy_from_slice(&packed);
                key_count += 1;
                placed = true;
                break;
            }

            if slot_key == key.as_slice() {
                if !allow_duplicates {
                    return Err(Error::DuplicateKey(Slice::from(key.as_slice())));
                }

                // Last write wins
                slot_packed.copy_from_slice(&packed);
                placed = true;
                break;
            }

            collisions += 1;
        }

        debug_assert!(placed, "slot array cannot run out of space");

        if let Some(filter) = bloom.as_deref_mut() {
            filter.set_with_hash(BloomFilter::get_hash(&key));
        }
    }

    Ok(BuiltIndex {
        slots,
        key_count,
        collisions,
    })
}
