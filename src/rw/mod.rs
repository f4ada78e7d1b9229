// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod flush;

use crate::config::Config;
use crate::format::replace_atomic;
use crate::reader::{OwnedIter, Reader};
use crate::writer::Writer;
use crate::Slice;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

pub use flush::FlushHandle;

/// Value bytes marking a key as removed, so a later merge drops it
///
/// Only ever written by [`Writer::remove`] and the read-write store;
/// user values equal to this sequence cannot be stored through the
/// read-write store.
pub const REMOVED_MARKER: &[u8] = b"\x00shelf.removed\x00";

/// A buffered entry: a live value, or a removal awaiting compaction
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BufferEntry {
    /// Pending value
    Value(Slice),

    /// Pending removal
    Removed,
}

/// Listener invoked after every completed compaction with the last
/// snapshot entry and the path of the new store file
pub type FlushListener = Box<dyn Fn(Option<(Slice, Slice)>, &Path) + Send + Sync>;

struct RwState {
    reader: Arc<Reader>,
    buffer: IndexMap<Slice, BufferEntry>,
}

struct RwInner {
    path: PathBuf,
    config: Config,
    state: RwLock<RwState>,

    /// Exactly one compaction runs at a time
    compacting: AtomicBool,
    current_flush: Mutex<Option<FlushHandle>>,

    listeners: Mutex<Vec<FlushListener>>,
}

/// A mutable write buffer layered over an immutable [`Reader`]
///
/// Writes land in an insertion-ordered in-memory buffer; a background
/// compaction folds the buffer into a new store file and atomically swaps
/// it over the base path. The base file is only ever replaced wholesale.
///
/// Cloning the store is cheap and shares the underlying state.
#[derive(Clone)]
pub struct RwStore {
    inner: Arc<RwInner>,
}

impl RwStore {
    /// Opens a read-write store over `path`, creating an empty store file
    /// first if none exists.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred or the file is malformed.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> crate::Result<Self> {
        let path = path.as_ref().to_path_buf();

        let is_empty = std::fs::metadata(&path).map_or(true, |meta| meta.len() == 0);
        if is_empty {
            Writer::create(&path, config.clone())?.finish()?;
        }

        let reader = Arc::new(Reader::open(&path, config.clone())?);

        Ok(Self {
            inner: Arc::new(RwInner {
                path,
                config,
                state: RwLock::new(RwState {
                    reader,
                    buffer: IndexMap::new(),
                }),
                compacting: AtomicBool::new(false),
                current_flush: Mutex::new(None),
                listeners: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Retrieves the value for a key, preferring the write buffer.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred.
    #[allow(clippy::expect_used)]
    pub fn get(&self, key: &[u8]) -> crate::Result<Option<Slice>> {
        let state = self.inner.state.read().expect("lock is not poisoned");

        match state.buffer.get(key) {
            Some(BufferEntry::Removed) => Ok(None),
            Some(BufferEntry::Value(value)) => Ok(Some(value.clone())),
            None => state.reader.get(key),
        }
    }

    /// Buffers a key-value pair.
    ///
    /// May trigger a background flush when the buffer is full.
    ///
    /// # Errors
    ///
    /// Returns error if the key is empty.
    pub fn put(&self, key: &[u8], value: &[u8]) -> crate::Result<()> {
        self.insert(key, BufferEntry::Value(Slice::from(value)))
    }

    /// Buffers a removal.
    ///
    /// # Errors
    ///
    /// Returns error if the key is empty.
    pub fn remove(&self, key: &[u8]) -> crate::Result<()> {
        self.insert(key, BufferEntry::Removed)
    }

    #[allow(clippy::expect_used)]
    fn insert(&self, key: &[u8], entry: BufferEntry) -> crate::Result<()> {
        if key.is_empty() {
            return Err(crate::Error::EmptyKey);
        }

        let should_flush = {
            let mut state = self.inner.state.write().expect("lock is not poisoned");
            state.buffer.insert(Slice::from(key), entry);

            self.inner.config.auto_flush
                && state.buffer.len() >= self.inner.config.write_buffer_size
                && !self.inner.compacting.load(Ordering::Acquire)
        };

        if should_flush {
            let _ = self.flush();
        }

        Ok(())
    }

    /// Number of keys: reader count plus live buffer entries.
    ///
    /// This is an approximation until a flush completes, since buffered
    /// entries may shadow or remove keys already in the reader.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn len(&self) -> usize {
        let state = self.inner.state.read().expect("lock is not poisoned");

        let live = state
            .buffer
            .values()
            .filter(|entry| matches!(entry, BufferEntry::Value(_)))
            .count();

        state.reader.len() + live
    }

    /// Returns `true` if no keys are visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers a compaction listener.
    ///
    /// A panicking listener is caught and logged.
    #[allow(clippy::expect_used)]
    pub fn on_flush<F>(&self, listener: F)
    where
        F: Fn(Option<(Slice, Slice)>, &Path) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .lock()
            .expect("lock is not poisoned")
            .push(Box::new(listener));
    }

    /// Folds the write buffer into a new store file in the background.
    ///
    /// While a compaction is running, further calls return the same handle.
    /// An empty buffer completes immediately.
    #[allow(clippy::expect_used)]
    pub fn flush(&self) -> FlushHandle {
        let mut current = self
            .inner
            .current_flush
            .lock()
            .expect("lock is not poisoned");

        if self.inner.compacting.load(Ordering::Acquire) {
            if let Some(handle) = current.as_ref() {
                return handle.clone();
            }
        }

        let snapshot = {
            let state = self.inner.state.read().expect("lock is not poisoned");
            if state.buffer.is_empty() {
                return FlushHandle::finished();
            }
            state.buffer.clone()
        };

        self.inner.compacting.store(true, Ordering::Release);

        let handle = FlushHandle::new();
        *current = Some(handle.clone());

        let inner = Arc::clone(&self.inner);
        let task_handle = handle.clone();

        std::thread::spawn(move || {
            let result = compact(&inner, &snapshot);

            if let Err(e) = &result {
                log::error!("compaction failed: {e}");
            }

            inner.compacting.store(false, Ordering::Release);
            task_handle.complete(result);
        });

        handle
    }

    /// Snapshot iteration: reader entries not shadowed by the buffer, then
    /// live buffer entries in insertion order. Removals are respected.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn iter(&self) -> RwIter {
        let state = self.inner.state.read().expect("lock is not poisoned");

        RwIter {
            base: OwnedIter::new(Arc::clone(&state.reader)),
            snapshot: state.buffer.clone(),
            buffer_pos: 0,
            base_done: false,
        }
    }

    /// The base file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }
}

/// Writes a merged store and swaps it over the base path.
fn compact(inner: &RwInner, snapshot: &IndexMap<Slice, BufferEntry>) -> crate::Result<()> {
    #[allow(clippy::expect_used)]
    let reader = {
        let state = inner.state.read().expect("lock is not poisoned");
        Arc::clone(&state.reader)
    };

    let temp_path = inner.path.with_extension("compact");

    let mut writer = Writer::create(&temp_path, inner.config.clone())?;

    for pair in reader.iter() {
        let (key, value) = pair?;

        if snapshot.contains_key(&key) || &*value == REMOVED_MARKER {
            continue;
        }

        writer.put(&key, &value)?;
    }

    for (key, entry) in snapshot {
        if let BufferEntry::Value(value) = entry {
            writer.put(key, value)?;
        }
    }

    writer.finish()?;

    {
        #[allow(clippy::expect_used)]
        let mut state = inner.state.write().expect("lock is not poisoned");

        // The old mapping is released once the last reference drops;
        // readers opened before the swap keep seeing the old file
        state.reader.close();

        replace_atomic(&temp_path, &inner.path)?;

        state.reader = Arc::new(Reader::open(&inner.path, inner.config.clone())?);

        // Retire exactly the entries that did not change since the snapshot
        state
            .buffer
            .retain(|key, entry| snapshot.get(key) != Some(&*entry));
    }

    log::info!(
        "compacted {} buffered entries into {:?}",
        snapshot.len(),
        inner.path,
    );

    #[allow(clippy::expect_used)]
    let listeners = inner.listeners.lock().expect("lock is not poisoned");

    let last_entry = snapshot.last().map(|(key, entry)| {
        let value = match entry {
            BufferEntry::Value(value) => value.clone(),
            BufferEntry::Removed => Slice::from(REMOVED_MARKER),
        };
        (key.clone(), value)
    });

    for listener in listeners.iter() {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            listener(last_entry.clone(), &inner.path);
        }));

        if result.is_err() {
            log::error!("compaction listener panicked");
        }
    }

    Ok(())
}

/// Snapshot iterator over a read-write store
pub struct RwIter {
    base: OwnedIter,
    snapshot: IndexMap<Slice, BufferEntry>,
    buffer_pos: usize,
    base_done: bool,
}

impl Iterator for RwIter {
    type Item = crate::Result<(Slice, Slice)>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.base_done {
            match self.base.next() {
                Some(Ok((key, value))) => {
                    if self.snapshot.contains_key(&key) || &*value == REMOVED_MARKER {
                        continue;
                    }
                    return Some(Ok((key, value)));
                }
                Some(Err(e)) => return Some(Err(e)),
                None => self.base_done = true,
            }
        }

        while let Some((key, entry)) = self.snapshot.get_index(self.buffer_pos) {
            self.buffer_pos += 1;

            if let BufferEntry::Value(value) = entry {
                return Some(Ok((key.clone(), value.clone())));
            }
        }

        None
    }
}
