// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::io::Read;
use std::sync::Mutex;

/// A file region mapped as segments of bounded size
///
/// Segment sizes are capped so every in-segment position fits 32-bit
/// addressing; reads that straddle a segment boundary are reassembled.
pub struct MappedRegion {
    segments: Vec<Mmap>,
    segment_size: u64,
    len: u64,
}

impl MappedRegion {
    /// Maps `len` bytes of `file` starting at `offset`.
    pub fn map(file: &File, offset: u64, len: u64, segment_size: u64) -> std::io::Result<Self> {
        debug_assert!(segment_size > 0);

        let mut segments = Vec::with_capacity(len.div_ceil(segment_size.max(1)) as usize);
        let mut mapped = 0;

        while mapped < len {
            let chunk = (len - mapped).min(segment_size);

            // SAFETY: the store file is write-once and never truncated while
            // a reader exists; the mapping is read-only
            #[expect(unsafe_code, reason = "see safety")]
            let segment = unsafe {
                MmapOptions::new()
                    .offset(offset + mapped)
                    .len(chunk as usize)
                    .map(file)?
            };

            segments.push(segment);
            mapped += chunk;
        }

        Ok(Self {
            segments,
            segment_size,
            len,
        })
    }

    /// Region length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Borrows `len` contiguous bytes, if they do not straddle a segment boundary.
    #[must_use]
    pub fn slice(&self, offset: u64, len: usize) -> Option<&[u8]> {
        let segment = self.segments.get((offset / self.segment_size) as usize)?;
        let start = (offset % self.segment_size) as usize;
        segment.get(start..start + len)
    }

    /// Copies bytes starting at `offset`, spanning segments if necessary.
    pub fn read_into(&self, mut offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        if offset + buf.len() as u64 > self.len {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "read beyond mapped region",
            ));
        }

        let mut remaining: &mut [u8] = buf;

        while !remaining.is_empty() {
            let segment_idx = (offset / self.segment_size) as usize;
            let start = (offset % self.segment_size) as usize;

            #[allow(clippy::expect_used)]
            let segment = self.segments.get(segment_idx).expect("bounds checked above");

            let take = remaining.len().min(segment.len() - start);
            let (dst, rest) = remaining.split_at_mut(take);
            dst.copy_from_slice(
                segment
                    .get(start..start + take)
                    .expect("bounds checked above"),
            );

            remaining = rest;
            offset += take as u64;
        }

        Ok(())
    }

    /// A forward [`Read`] view starting at `offset`, used for varint-prefixed
    /// records that may span segments.
    #[must_use]
    pub fn reader_at(&self, offset: u64) -> RegionReader<'_> {
        RegionReader {
            region: self,
            pos: offset,
        }
    }
}

/// Forward reader over a [`MappedRegion`]
pub struct RegionReader<'a> {
    region: &'a MappedRegion,
    pos: u64,
}

impl Read for RegionReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pos >= self.region.len {
            return Ok(0);
        }

        // One contiguous chunk per call; callers loop
        let in_segment = self.region.segment_size - (self.pos % self.region.segment_size);
        let available = (self.region.len - self.pos).min(in_segment);
        let take = (buf.len() as u64).min(available) as usize;

        self.region.read_into(self.pos, &mut buf[..take])?;
        self.pos += take as u64;

        Ok(take)
    }
}

/// How the data section is accessed
pub enum DataSource {
    /// Memory-mapped, lock-free
    Mapped(MappedRegion),

    /// Positioned reads on the file, serialized under a single lock
    Positioned {
        /// Store file handle
        file: Mutex<File>,

        /// Absolute file offset of the data section
        base: u64,

        /// Data section length
        len: u64,
    },
}

impl DataSource {
    /// Reads the varint-prefixed record starting at `offset` (relative to the
    /// data section base) into a fresh buffer.
    pub fn read_record(&self, offset: u64) -> crate::Result<crate::Slice> {
        use varint_rs::VarintReader;

        match self {
            Self::Mapped(region) => {
                let mut reader = region.reader_at(offset);
                let len = reader.read_u32_varint()?;
                Ok(crate::Slice::from_reader(&mut reader, len as usize)?)
            }

            Self::Positioned { file, base, len } => {
                #[allow(clippy::expect_used)]
                let file = file.lock().expect("lock is not poisoned");

                // The length prefix is at most 5 bytes; clamp at the section end
                let mut prefix = [0u8; 5];
                let take = (len.saturating_sub(offset)).min(5) as usize;
                if take == 0 {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "record offset beyond data section",
                    )
                    .into());
                }

                read_exact_at(&file, &mut prefix[..take], base + offset)?;

                let mut cursor = &prefix[..take];
                let value_len = cursor.read_u32_varint()?;
                let prefix_len = take - cursor.len();

                let mut value = vec![0u8; value_len as usize];
                read_exact_at(&file, &mut value, base + offset + prefix_len as u64)?;

                Ok(crate::Slice::from(value))
            }
        }
    }
}

#[cfg(unix)]
pub fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    std::os::unix::fs::FileExt::read_exact_at(file, buf, offset)
}

#[cfg(windows)]
pub fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> std::io::Result<()> {
    while !buf.is_empty() {
        let read = std::os::windows::fs::FileExt::seek_read(file, buf, offset)?;

        if read == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "seek_read did not read enough bytes",
            ));
        }

        buf = &mut buf[read..];
        offset += read as u64;
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use test_log::test;

    fn file_with(bytes: &[u8]) -> (tempfile::TempDir, File) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region");
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        file.sync_all().unwrap();
        (dir, File::open(&path).unwrap())
    }

    #[test]
    fn region_spanning_read() -> crate::Result<()> {
        let payload = (0..=255u8).collect::<Vec<_>>();
        let (_dir, file) = file_with(&payload);

        // 16-byte segments force plenty of boundaries
        let region = MappedRegion::map(&file, 0, 256, 16)?;
        assert_eq!(256, region.len());

        assert!(region.slice(0, 16).is_some());
        assert!(region.slice(8, 16).is_none(), "straddles a boundary");

        let mut buf = [0u8; 40];
        region.read_into(5, &mut buf)?;
        assert_eq!(&payload[5..45], &buf);

        assert!(region.read_into(250, &mut buf).is_err());

        Ok(())
    }

    #[test]
    fn region_reader_crosses_segments() -> crate::Result<()> {
        let payload = (0..=255u8).collect::<Vec<_>>();
        let (_dir, file) = file_with(&payload);

        let region = MappedRegion::map(&file, 0, 256, 16)?;
        let mut reader = region.reader_at(10);

        let mut out = vec![];
        reader.read_to_end(&mut out)?;
        assert_eq!(&payload[10..], &*out);

        Ok(())
    }

    #[test]
    fn region_with_offset() -> crate::Result<()> {
        let payload = (0..=255u8).collect::<Vec<_>>();
        let (_dir, file) = file_with(&payload);

        let region = MappedRegion::map(&file, 100, 56, 16)?;

        let mut buf = [0u8; 8];
        region.read_into(0, &mut buf)?;
        assert_eq!(&payload[100..108], &buf);

        Ok(())
    }
}
