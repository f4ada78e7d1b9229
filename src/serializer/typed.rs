// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{read_value, write_value, Value};
use crate::coding::{DecodeError, EncodeError};
use crate::compression::CompressionType;
use crate::config::Config;
use crate::reader::Reader;
use crate::rw::{FlushHandle, RwStore};
use crate::writer::Writer;
use std::path::Path;

/// Translates one item type to and from opaque bytes
///
/// A store carries two codec slots: one for keys, one for values. Compression
/// is a property of the codec instance, so the key slot simply never gets a
/// compressing codec.
pub trait Serializer: Send + Sync {
    /// The item type this codec handles.
    type Item;

    /// Serializes an item into bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the item cannot be encoded.
    fn serialize(&self, item: &Self::Item) -> Result<Vec<u8>, EncodeError>;

    /// Deserializes an item from bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are malformed or truncated.
    fn deserialize(&self, bytes: &[u8]) -> Result<Self::Item, DecodeError>;
}

/// The built-in codec over the tagged [`Value`] union
#[derive(Clone, Copy, Debug, Default)]
pub struct ValueSerializer {
    compression: CompressionType,
}

impl ValueSerializer {
    /// A codec that compresses large arrays with the given method.
    #[must_use]
    pub fn new(compression: CompressionType) -> Self {
        Self { compression }
    }

    /// A codec that never compresses; used on the key side.
    #[must_use]
    pub fn plain() -> Self {
        Self {
            compression: CompressionType::None,
        }
    }
}

impl Serializer for ValueSerializer {
    type Item = Value;

    fn serialize(&self, item: &Self::Item) -> Result<Vec<u8>, EncodeError> {
        let mut bytes = Vec::new();
        write_value(item, &mut bytes, self.compression)?;
        Ok(bytes)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Self::Item, DecodeError> {
        read_value(&mut &bytes[..])
    }
}

/// A [`Writer`] that rehydrates typed pairs through two codec slots
pub struct TypedWriter<KS: Serializer, VS: Serializer> {
    inner: Writer,
    key_codec: KS,
    value_codec: VS,
}

impl<KS: Serializer, VS: Serializer> TypedWriter<KS, VS> {
    /// Wraps a byte-level writer.
    #[must_use]
    pub fn with_codecs(inner: Writer, key_codec: KS, value_codec: VS) -> Self {
        Self {
            inner,
            key_codec,
            value_codec,
        }
    }

    /// Queues one typed pair.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or an I/O operation failed.
    pub fn put(&mut self, key: &KS::Item, value: &VS::Item) -> crate::Result<()> {
        let key = self.key_codec.serialize(key)?;
        let value = self.value_codec.serialize(value)?;
        self.inner.put(&key, &value)
    }

    /// Finishes the build; see [`Writer::finish`].
    ///
    /// # Errors
    ///
    /// Returns error if the build failed.
    pub fn finish(self) -> crate::Result<()> {
        self.inner.finish()
    }
}

/// The default writer: tagged values on both sides
pub type ValueWriter = TypedWriter<ValueSerializer, ValueSerializer>;

impl TypedWriter<ValueSerializer, ValueSerializer> {
    /// Creates a writer producing `path`, with value-side compression taken
    /// from the config.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred or the config is invalid.
    pub fn create<P: AsRef<Path>>(path: P, config: Config) -> crate::Result<Self> {
        let value_codec = ValueSerializer::new(config.compression);
        let inner = Writer::create(path, config)?;

        Ok(Self::with_codecs(
            inner,
            ValueSerializer::plain(),
            value_codec,
        ))
    }
}

/// A [`Reader`] that rehydrates typed pairs through two codec slots
pub struct TypedReader<KS: Serializer, VS: Serializer> {
    inner: Reader,
    key_codec: KS,
    value_codec: VS,
}

impl<KS: Serializer, VS: Serializer> TypedReader<KS, VS> {
    /// Wraps a byte-level reader.
    #[must_use]
    pub fn with_codecs(inner: Reader, key_codec: KS, value_codec: VS) -> Self {
        Self {
            inner,
            key_codec,
            value_codec,
        }
    }

    /// Retrieves and decodes the value for a typed key.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred or decoding failed.
    pub fn get(&self, key: &KS::Item) -> crate::Result<Option<VS::Item>> {
        let key = self.key_codec.serialize(key)?;

        match self.inner.get(&key)? {
            Some(bytes) => Ok(Some(self.value_codec.deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Number of keys in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the store has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates over all typed pairs.
    pub fn iter(&self) -> impl Iterator<Item = crate::Result<(KS::Item, VS::Item)>> + '_ {
        self.inner.iter().map(|pair| {
            let (key, value) = pair?;
            let key = self.key_codec.deserialize(&key)?;
            let value = self.value_codec.deserialize(&value)?;
            Ok((key, value))
        })
    }

    /// The underlying byte-level reader.
    #[must_use]
    pub fn inner(&self) -> &Reader {
        &self.inner
    }
}

/// The default reader: tagged values on both sides
pub type ValueReader = TypedReader<ValueSerializer, ValueSerializer>;

impl TypedReader<ValueSerializer, ValueSerializer> {
    /// Opens a reader over `path`.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred or the file is malformed.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> crate::Result<Self> {
        let value_codec = ValueSerializer::new(config.compression);
        let inner = Reader::open(path, config)?;

        Ok(Self::with_codecs(
            inner,
            ValueSerializer::plain(),
            value_codec,
        ))
    }
}

/// An [`RwStore`] that rehydrates typed pairs through two codec slots
pub struct TypedRw<KS: Serializer, VS: Serializer> {
    inner: RwStore,
    key_codec: KS,
    value_codec: VS,
}

impl<KS: Serializer, VS: Serializer> TypedRw<KS, VS> {
    /// Wraps a byte-level read-write store.
    #[must_use]
    pub fn with_codecs(inner: RwStore, key_codec: KS, value_codec: VS) -> Self {
        Self {
            inner,
            key_codec,
            value_codec,
        }
    }

    /// Retrieves and decodes the value for a typed key.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred or decoding failed.
    pub fn get(&self, key: &KS::Item) -> crate::Result<Option<VS::Item>> {
        let key = self.key_codec.serialize(key)?;

        match self.inner.get(&key)? {
            Some(bytes) => Ok(Some(self.value_codec.deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Buffers a typed pair.
    ///
    /// # Errors
    ///
    /// Returns error if serialization failed.
    pub fn put(&self, key: &KS::Item, value: &VS::Item) -> crate::Result<()> {
        let key = self.key_codec.serialize(key)?;
        let value = self.value_codec.serialize(value)?;
        self.inner.put(&key, &value)
    }

    /// Buffers a removal.
    ///
    /// # Errors
    ///
    /// Returns error if serialization failed.
    pub fn remove(&self, key: &KS::Item) -> crate::Result<()> {
        let key = self.key_codec.serialize(key)?;
        self.inner.remove(&key)
    }

    /// Triggers a background flush; see [`RwStore::flush`].
    pub fn flush(&self) -> FlushHandle {
        self.inner.flush()
    }

    /// Approximate number of keys; see [`RwStore::len`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if no keys are visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// The underlying byte-level store.
    #[must_use]
    pub fn inner(&self) -> &RwStore {
        &self.inner
    }
}

/// The default read-write store: tagged values on both sides
pub type ValueRw = TypedRw<ValueSerializer, ValueSerializer>;

impl TypedRw<ValueSerializer, ValueSerializer> {
    /// Opens a typed read-write store over `path`.
    ///
    /// # Errors
    ///
    /// Returns error if an I/O error occurred or the file is malformed.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> crate::Result<Self> {
        let value_codec = ValueSerializer::new(config.compression);
        let inner = RwStore::open(path, config)?;

        Ok(Self::with_codecs(
            inner,
            ValueSerializer::plain(),
            value_codec,
        ))
    }
}
