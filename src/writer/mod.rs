// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod index;

use crate::bloom::BloomFilter;
use crate::coding::{varint_len, Encode};
use crate::config::Config;
use crate::meta::{BucketMeta, Metadata};
use crate::rw::REMOVED_MARKER;
use crate::Error;
use index::BuiltIndex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use varint_rs::VarintWriter;

/// Where the finished store goes
enum Destination {
    /// Atomically persisted over `path` on success
    File(PathBuf),

    /// Written directly; does not checkpoint
    Stream(Box<dyn Write + Send>),
}

/// Scratch state for one key-length bucket
struct BucketScratch {
    index: BufWriter<File>,
    index_path: PathBuf,

    data: BufWriter<File>,

    /// Entries streamed into the index scratch
    put_count: u64,

    /// Data stream length, including the leading padding byte
    data_length: u64,

    /// Previously appended value, for adjacent-duplicate elision
    last_value: Option<Vec<u8>>,
    last_offset: u64,

    /// Widest packed offset seen
    max_offset_width: u32,
}

/// Streams `(key, value)` pairs into per-key-length scratch files and
/// assembles the final store on [`Writer::finish`]
///
/// Pairs may arrive in any order. Nothing is visible at the destination
/// until `finish` succeeds.
pub struct Writer {
    config: Config,
    destination: Destination,

    /// Owns all scratch streams; removed when the writer drops
    scratch: tempfile::TempDir,

    /// Indexed by key length
    buckets: Vec<Option<BucketScratch>>,

    put_count: u64,
}

impl Writer {
    /// Creates a writer that atomically produces `path` when finished.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred or the config is invalid.
    pub fn create<P: AsRef<Path>>(path: P, config: Config) -> crate::Result<Self> {
        Self::new(Destination::File(path.as_ref().into()), config)
    }

    /// Creates a writer over an arbitrary byte sink.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred or the config is invalid.
    pub fn from_stream<W: Write + Send + 'static>(sink: W, config: Config) -> crate::Result<Self> {
        Self::new(Destination::Stream(Box::new(sink)), config)
    }

    fn new(destination: Destination, config: Config) -> crate::Result<Self> {
        if !(config.load_factor > 0.0 && config.load_factor < 1.0) {
            return Err(Error::InvalidConfig("load_factor must be in (0, 1)"));
        }

        Ok(Self {
            config,
            destination,
            scratch: tempfile::tempdir()?,
            buckets: Vec::new(),
            put_count: 0,
        })
    }

    /// Queues one key-value pair.
    ///
    /// Duplicate keys surface at [`Writer::finish`], not here.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred or the key is empty.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> crate::Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        let key_length = key.len();

        if self.buckets.len() <= key_length {
            self.buckets.resize_with(key_length + 1, || None);
        }

        #[allow(clippy::expect_used)]
        let slot = self.buckets.get_mut(key_length).expect("resized above");

        if slot.is_none() {
            let index_path = self.scratch.path().join(format!("index_{key_length}"));
            let data_path = self.scratch.path().join(format!("data_{key_length}"));

            let index = BufWriter::new(File::create(&index_path)?);
            let mut data = BufWriter::new(File::create(&data_path)?);

            // Padding byte: offset 0 must never address a record
            data.write_all(&[0])?;

            *slot = Some(BucketScratch {
                index,
                index_path,
                data,
                put_count: 0,
                data_length: 1,
                last_value: None,
                last_offset: 0,
                max_offset_width: 0,
            });
        }

        #[allow(clippy::expect_used)]
        let bucket = slot.as_mut().expect("just created above");

        let offset = if bucket.last_value.as_deref() == Some(value) {
            // Same value as the previous record: point at it instead
            bucket.last_offset
        } else {
            let offset = bucket.data_length;

            bucket.data.write_u32_varint(value.len() as u32)?;
            bucket.data.write_all(value)?;

            bucket.data_length += varint_len(value.len() as u64) as u64 + value.len() as u64;
            bucket.last_value = Some(value.to_vec());
            bucket.last_offset = offset;

            offset
        };

        bucket.index.write_all(key)?;
        bucket.index.write_u64_varint(offset)?;

        bucket.max_offset_width = bucket.max_offset_width.max(varint_len(offset) as u32);
        bucket.put_count += 1;
        self.put_count += 1;

        Ok(())
    }

    /// Queues a removed-marker record for the key, so a later merge drops it.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred or the key is empty.
    pub fn remove(&mut self, key: &[u8]) -> crate::Result<()> {
        self.put(key, REMOVED_MARKER)
    }

    /// Number of pairs queued so far.
    #[must_use]
    pub fn queued_len(&self) -> u64 {
        self.put_count
    }

    /// Runs the hash-placement pass for every bucket and assembles
    /// header + index regions + data regions at the destination.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred, a key was written twice
    /// (with duplicates disabled), or the build would not fit into the
    /// free disk space. On error, a file destination is left untouched.
    pub fn finish(mut self) -> crate::Result<()> {
        // Geometry first: it determines the expected output size
        let mut descriptors: Vec<(usize, u64, u64, u32)> = Vec::new(); // (L, puts, slots, slot size)
        let mut index_total = 0u64;
        let mut data_total = 0u64;

        for (key_length, bucket) in self
            .buckets
            .iter_mut()
            .enumerate()
            .filter_map(|(l, b)| b.as_mut().map(|b| (l, b)))
        {
            bucket.index.flush()?;
            bucket.data.flush()?;

            let slot_count = ((bucket.put_count as f64 / self.config.load_factor).round() as u64)
                .max(bucket.put_count);
            let slot_size = key_length as u32 + bucket.max_offset_width;

            index_total += slot_count * u64::from(slot_size);
            data_total += bucket.data_length;

            descriptors.push((key_length, bucket.put_count, slot_count, slot_size));
        }

        let mut bloom = if self.config.bloom_filter && self.put_count > 0 {
            Some(BloomFilter::with_fp_rate(
                self.put_count as usize,
                self.config.bloom_fp_rate,
            ))
        } else {
            None
        };

        let header_len = Metadata {
            created_at: 0,
            key_count: 0,
            bloom: None, // patched below; bloom length is added separately
            max_key_length: 0,
            buckets: descriptors
                .iter()
                .map(|_| BucketMeta::default())
                .collect(),
            index_offset: 0,
            data_offset: 0,
        }
        .serialized_len()
            + bloom
                .as_ref()
                .map_or(0, |filter| 8 * filter.word_count() as u64);

        self.check_free_space(header_len + index_total + data_total)?;

        // Placement pass, ascending key length
        let mut built: Vec<BuiltIndex> = Vec::with_capacity(descriptors.len());
        let mut buckets: Vec<BucketMeta> = Vec::with_capacity(descriptors.len());
        let mut index_offset = 0u64;
        let mut data_offset = 0u64;
        let mut key_count = 0u64;
        let mut collisions = 0u64;

        for (key_length, put_count, slot_count, slot_size) in &descriptors {
            #[allow(clippy::expect_used)]
            let bucket = self
                .buckets
                .get(*key_length)
                .and_then(Option::as_ref)
                .expect("descriptor refers to a present bucket");

            let slots_path = self.scratch.path().join(format!("slots_{key_length}"));

            let index = index::build_index(
                &bucket.index_path,
                &slots_path,
                *key_length,
                *put_count,
                *slot_count,
                *slot_size as usize,
                self.config.allow_duplicates,
                bloom.as_mut(),
            )?;

            key_count += index.key_count;
            collisions += index.collisions;

            buckets.push(BucketMeta {
                key_length: *key_length as u32,
                put_count: *put_count,
                key_count: index.key_count,
                slot_count: *slot_count,
                slot_size: *slot_size,
                index_offset,
                data_offset,
            });

            index_offset += slot_count * u64::from(*slot_size);
            data_offset += bucket.data_length;

            built.push(index);
        }

        if collisions > 0 {
            log::debug!("index placement took {collisions} collision probes");
        }

        let max_key_length = descriptors.last().map_or(0, |(l, ..)| *l as u32);

        let mut meta = Metadata {
            created_at: unix_millis(),
            key_count,
            bloom,
            max_key_length,
            buckets,
            index_offset: 0,
            data_offset: 0,
        };
        meta.index_offset = meta.serialized_len();
        meta.data_offset = meta.index_offset + index_total;

        debug_assert_eq!(header_len, meta.serialized_len());

        // Concatenate header, slot arrays, data streams
        match self.destination {
            Destination::File(ref path) => {
                let folder = parent_dir(path);
                std::fs::create_dir_all(folder)?;

                let mut temp_file = tempfile::NamedTempFile::new_in(folder)?;
                {
                    let mut sink = BufWriter::new(temp_file.as_file_mut());
                    Self::concatenate(&mut sink, &meta, &built, &descriptors, &self.buckets)?;
                    sink.flush()?;
                }
                temp_file.as_file_mut().sync_all()?;
                temp_file
                    .persist(path)
                    .map_err(|e| Error::Io(e.error))?;

                crate::format::fsync_directory(folder)?;
            }
            Destination::Stream(ref mut sink) => {
                Self::concatenate(sink, &meta, &built, &descriptors, &self.buckets)?;
                sink.flush()?;
            }
        }

        log::info!(
            "store build finished: {key_count} keys in {} buckets, {} bytes",
            meta.buckets.len(),
            meta.data_offset + data_total,
        );

        Ok(())
    }

    fn concatenate<W: Write>(
        sink: &mut W,
        meta: &Metadata,
        built: &[BuiltIndex],
        descriptors: &[(usize, u64, u64, u32)],
        buckets: &[Option<BucketScratch>],
    ) -> crate::Result<()> {
        meta.encode_into(sink)?;

        for index in built {
            sink.write_all(&index.slots)?;
        }

        for (key_length, ..) in descriptors {
            #[allow(clippy::expect_used)]
            let bucket = buckets
                .get(*key_length)
                .and_then(Option::as_ref)
                .expect("descriptor refers to a present bucket");

            let data_path = bucket
                .index_path
                .with_file_name(format!("data_{key_length}"));
            let mut data = File::open(data_path)?;
            std::io::copy(&mut data, sink)?;
        }

        Ok(())
    }

    /// Fails fast when the expected output would eat more than two thirds
    /// of the usable free space.
    fn check_free_space(&self, required: u64) -> crate::Result<()> {
        let probe_dir = match &self.destination {
            Destination::File(path) => parent_dir(path),
            Destination::Stream(_) => self.scratch.path(),
        };

        let available = fs2::available_space(probe_dir).unwrap_or(u64::MAX);

        if required.saturating_mul(3) >= available.saturating_mul(2) {
            return Err(Error::InsufficientDiskSpace {
                required,
                available,
            });
        }

        Ok(())
    }
}

/// A relative file name has an empty parent; treat it as the working directory.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis() as u64)
}
