use shelf::{Config, Value, ValueReader, ValueWriter};
use test_log::test;

#[test]
fn store_tiny_int_to_string() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("tiny.shelf");

    let mut writer = ValueWriter::create(&path, Config::new())?;
    writer.put(&Value::Int(1), &Value::from("foo"))?;
    writer.finish()?;

    assert!(path.exists());

    let reader = ValueReader::open(&path, Config::new())?;
    assert_eq!(1, reader.len());
    assert_eq!(Some(Value::from("foo")), reader.get(&Value::Int(1))?);
    assert_eq!(None, reader.get(&Value::Int(-1))?);

    Ok(())
}

#[test]
fn store_mixed_key_lengths() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("mixed.shelf");

    let mut writer = ValueWriter::create(&path, Config::new())?;
    writer.put(&Value::Int(1), &Value::Int(1))?;
    writer.put(&Value::Int(245), &Value::Int(6))?;
    writer.finish()?;

    let reader = ValueReader::open(&path, Config::new())?;

    // Int(1) serializes to one byte, Int(245) to two
    let buckets = &reader.inner().metadata().buckets;
    assert_eq!(2, buckets.len());
    assert_eq!(vec![1, 2], buckets.iter().map(|b| b.key_length).collect::<Vec<_>>());

    assert_eq!(Some(Value::Int(1)), reader.get(&Value::Int(1))?);
    assert_eq!(Some(Value::Int(6)), reader.get(&Value::Int(245))?);
    assert_eq!(None, reader.get(&Value::Int(0))?);
    assert_eq!(None, reader.get(&Value::Int(244))?);
    assert_eq!(None, reader.get(&Value::Int(246))?);

    Ok(())
}

#[test]
fn store_over_long_key_misses() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("short.shelf");

    let mut writer = Config::new().writer(&path)?;
    writer.put(b"ab", b"value")?;
    writer.finish()?;

    let reader = Config::new().open(&path)?;
    assert_eq!(None, reader.get(b"way too long a key")?);
    assert_eq!(None, reader.get(b"x")?);
    assert_eq!(Some(b"value".as_slice()), reader.get(b"ab")?.as_deref());

    Ok(())
}

#[test]
fn store_zero_keys() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("empty.shelf");

    Config::new().writer(&path)?.finish()?;

    let reader = Config::new().open(&path)?;
    assert_eq!(0, reader.len());
    assert!(reader.is_empty());
    assert_eq!(None, reader.get(b"anything")?);
    assert_eq!(0, reader.iter().count());

    Ok(())
}

#[test]
fn store_closed_reader_fails() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("closed.shelf");

    let mut writer = Config::new().writer(&path)?;
    writer.put(b"a", b"1")?;
    writer.finish()?;

    let reader = Config::new().open(&path)?;
    assert!(reader.get(b"a")?.is_some());

    reader.close();

    assert!(matches!(reader.get(b"a"), Err(shelf::Error::StoreClosed)));
    assert!(matches!(
        reader.iter().next(),
        Some(Err(shelf::Error::StoreClosed))
    ));

    Ok(())
}

#[test]
fn store_rejects_oversized_segments() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cfg.shelf");

    Config::new().writer(&path)?.finish()?;

    let result = Config::new().segment_size((1 << 31) + 1).open(&path);
    assert!(matches!(result, Err(shelf::Error::InvalidConfig(_))));

    // The boundary itself is fine
    assert!(Config::new().segment_size(1 << 31).open(&path).is_ok());

    Ok(())
}

#[test]
fn store_rejects_version_mismatch() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("versioned.shelf");

    let mut writer = Config::new().writer(&path)?;
    writer.put(b"a", b"1")?;
    writer.finish()?;

    // The version byte sits right behind the magic bytes
    let mut bytes = std::fs::read(&path)?;
    bytes[4] = 99;
    std::fs::write(&path, &bytes)?;

    assert!(matches!(
        Config::new().open(&path),
        Err(shelf::Error::Decode(
            shelf::coding::DecodeError::InvalidVersion(99)
        ))
    ));

    Ok(())
}

#[test]
fn store_reads_past_unknown_prefix() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("prefixed.shelf");

    let mut writer = Config::new().writer(&path)?;
    writer.put(b"key", b"value")?;
    writer.finish()?;

    // Prepend unrecognized bytes; the reader scans past them
    let store_bytes = std::fs::read(&path)?;
    let mut prefixed = b"#!/usr/bin/env something\n".to_vec();
    prefixed.extend(&store_bytes);
    std::fs::write(&path, &prefixed)?;

    let reader = Config::new().open(&path)?;
    assert_eq!(Some(b"value".as_slice()), reader.get(b"key")?.as_deref());
    assert_eq!(1, reader.len());

    Ok(())
}

#[test]
fn store_rejects_bad_load_factor() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("lf.shelf");

    for lf in [0.0, 1.0, -0.5, 1.5] {
        assert!(matches!(
            Config::new().load_factor(lf).writer(&path),
            Err(shelf::Error::InvalidConfig(_))
        ));
    }
}
