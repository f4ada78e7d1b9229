// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::value::Value;
use crate::coding::{DecodeError, EncodeError};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

/// A user codec for one type, registered under a stable name
///
/// The name is written into the byte stream ahead of the payload, so it must
/// stay stable across program versions for stores to remain readable.
pub trait CustomSerializer: Send + Sync {
    /// The name written into the byte stream.
    fn type_name(&self) -> &'static str;

    /// Writes the value's opaque payload.
    ///
    /// # Errors
    ///
    /// Returns error if the value is not of the codec's type or an I/O error
    /// occurred.
    fn serialize(&self, value: &dyn Any, out: &mut Vec<u8>) -> Result<(), EncodeError>;

    /// Reads the payload back.
    ///
    /// # Errors
    ///
    /// Returns error if the payload is malformed.
    fn deserialize(&self, input: &mut dyn Read) -> Result<Box<dyn Any + Send + Sync>, DecodeError>;
}

/// Name-indexed dictionary of user codecs
///
/// The serialize side is additionally indexed by [`TypeId`], so a value can
/// find its codec without naming it at every call site.
#[derive(Clone, Default)]
pub struct Registry {
    by_name: HashMap<&'static str, Arc<dyn CustomSerializer>>,
    by_type: HashMap<TypeId, Arc<dyn CustomSerializer>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a codec for `T`.
    ///
    /// A codec registered later under the same name or type wins.
    pub fn register<T: Any, S: CustomSerializer + 'static>(&mut self, codec: S) {
        let codec: Arc<dyn CustomSerializer> = Arc::new(codec);
        self.by_name.insert(codec.type_name(), Arc::clone(&codec));
        self.by_type.insert(TypeId::of::<T>(), codec);
    }

    /// Returns `true` if a codec is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Wraps a user value into [`Value::Custom`] through its registered codec.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::UnsupportedType`] if no codec is registered
    /// for `T`.
    pub fn to_value<T: Any>(&self, item: &T) -> Result<Value, EncodeError> {
        let codec = self
            .by_type
            .get(&TypeId::of::<T>())
            .ok_or(EncodeError::UnsupportedType(std::any::type_name::<T>()))?;

        let mut payload = Vec::new();
        codec.serialize(item, &mut payload)?;

        Ok(Value::Custom {
            type_name: codec.type_name().to_owned(),
            payload,
        })
    }

    /// Unwraps a [`Value::Custom`] back into its user type.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MissingSerializer`] if the referenced codec was
    /// never registered (or yields a different type), and
    /// [`DecodeError::InvalidTag`] if the value is not a custom value.
    pub fn from_value<T: Any>(&self, value: &Value) -> Result<T, DecodeError> {
        let Value::Custom { type_name, payload } = value else {
            return Err(DecodeError::InvalidTag(("Custom", 0)));
        };

        let codec = self
            .by_name
            .get(type_name.as_str())
            .ok_or_else(|| DecodeError::MissingSerializer(type_name.clone()))?;

        let boxed = codec.deserialize(&mut &payload[..])?;

        boxed
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| DecodeError::MissingSerializer(format!("{type_name} (wrong target type)")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use test_log::test;

    #[derive(Debug, Eq, PartialEq, Clone)]
    struct Point {
        x: i32,
        y: i32,
    }

    struct PointCodec;

    impl CustomSerializer for PointCodec {
        fn type_name(&self) -> &'static str {
            "point"
        }

        fn serialize(&self, value: &dyn Any, out: &mut Vec<u8>) -> Result<(), EncodeError> {
            let point = value
                .downcast_ref::<Point>()
                .ok_or(EncodeError::UnsupportedType("point"))?;

            out.extend(point.x.to_le_bytes());
            out.extend(point.y.to_le_bytes());
            Ok(())
        }

        fn deserialize(
            &self,
            input: &mut dyn Read,
        ) -> Result<Box<dyn Any + Send + Sync>, DecodeError> {
            let mut buf = [0u8; 4];

            input.read_exact(&mut buf)?;
            let x = i32::from_le_bytes(buf);

            input.read_exact(&mut buf)?;
            let y = i32::from_le_bytes(buf);

            Ok(Box::new(Point { x, y }))
        }
    }

    #[test]
    fn registry_round_trip() -> crate::Result<()> {
        let mut registry = Registry::new();
        registry.register::<Point, _>(PointCodec);

        let point = Point { x: -4, y: 77 };

        let value = registry.to_value(&point)?;
        assert!(matches!(&value, Value::Custom { type_name, .. } if type_name == "point"));

        let back: Point = registry.from_value(&value)?;
        assert_eq!(point, back);

        Ok(())
    }

    #[test]
    fn registry_unknown_type_fails() {
        let registry = Registry::new();

        assert!(matches!(
            registry.to_value(&42u128),
            Err(EncodeError::UnsupportedType(_))
        ));
    }

    #[test]
    fn registry_missing_serializer_fails() {
        let registry = Registry::new();

        let value = Value::Custom {
            type_name: "nowhere".into(),
            payload: vec![],
        };

        assert!(matches!(
            registry.from_value::<Point>(&value),
            Err(DecodeError::MissingSerializer(name)) if name == "nowhere"
        ));
    }
}
