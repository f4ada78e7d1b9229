use shelf::Config;
use test_log::test;

#[test]
fn builder_duplicate_key_fails() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("dup.shelf");

    let mut writer = Config::new().writer(&path)?;
    writer.put(b"0", b"A")?;
    writer.put(b"0", b"B")?;

    let result = writer.finish();
    assert!(matches!(result, Err(shelf::Error::DuplicateKey(key)) if key == b"0".as_slice()));

    // A failed build leaves no output behind
    assert!(!path.exists());

    Ok(())
}

#[test]
fn builder_duplicates_last_write_wins() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("dup_ok.shelf");

    let mut writer = Config::new().allow_duplicates(true).writer(&path)?;
    writer.put(b"0", b"A")?;
    writer.put(b"0", b"B")?;
    writer.put(b"1", b"C")?;
    writer.finish()?;

    let reader = Config::new().open(&path)?;
    assert_eq!(Some(b"B".as_slice()), reader.get(b"0")?.as_deref());
    assert_eq!(Some(b"C".as_slice()), reader.get(b"1")?.as_deref());
    assert_eq!(2, reader.len());

    Ok(())
}

#[test]
fn builder_empty_key_rejected() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("emptykey.shelf");

    let mut writer = Config::new().writer(&path)?;
    assert!(matches!(writer.put(b"", b"x"), Err(shelf::Error::EmptyKey)));

    Ok(())
}

#[test]
fn builder_slot_count_follows_load_factor() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("lf.shelf");

    let mut writer = Config::new().load_factor(0.75).writer(&path)?;
    for i in 0..100u32 {
        writer.put(&i.to_le_bytes(), b"v")?;
    }
    writer.finish()?;

    let reader = Config::new().open(&path)?;
    let meta = reader.metadata();

    assert_eq!(1, meta.buckets.len());
    let bucket = &meta.buckets[0];

    assert_eq!(100, bucket.key_count);
    assert_eq!((100f64 / 0.75).round() as u64, bucket.slot_count);
    assert_eq!(
        u64::from(bucket.slot_size) * bucket.slot_count,
        meta.index_length()
    );

    Ok(())
}

#[test]
fn builder_round_trips_every_pair() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("all.shelf");

    let pairs: Vec<(Vec<u8>, Vec<u8>)> = (0..1_000u32)
        .map(|i| {
            let key = format!("key_{i}").into_bytes();
            let value = format!("value number {i}").repeat(i as usize % 7 + 1).into_bytes();
            (key, value)
        })
        .collect();

    let mut writer = Config::new().writer(&path)?;
    for (key, value) in &pairs {
        writer.put(key, value)?;
    }
    writer.finish()?;

    let reader = Config::new().open(&path)?;
    assert_eq!(pairs.len(), reader.len());

    for (key, value) in &pairs {
        assert_eq!(Some(value.as_slice()), reader.get(key)?.as_deref());
    }

    Ok(())
}

#[test]
fn builder_adjacent_value_dedup_shrinks_file() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;

    let value = vec![42u8; 1_024];

    let unique = dir.path().join("unique.shelf");
    let mut writer = Config::new().writer(&unique)?;
    for i in 0..64u8 {
        // Alternating values defeat adjacent-duplicate elision
        writer.put(&[i], if i % 2 == 0 { &value } else { b"x" })?;
    }
    writer.finish()?;

    let deduped = dir.path().join("deduped.shelf");
    let mut writer = Config::new().writer(&deduped)?;
    for i in 0..64u8 {
        writer.put(&[i], &value)?;
    }
    writer.finish()?;

    let unique_len = std::fs::metadata(&unique)?.len();
    let deduped_len = std::fs::metadata(&deduped)?.len();
    assert!(
        deduped_len * 4 < unique_len,
        "expected dedup to collapse repeated values ({unique_len} vs {deduped_len})",
    );

    // And the deduplicated store still answers correctly
    let reader = Config::new().open(&deduped)?;
    for i in 0..64u8 {
        assert_eq!(Some(value.as_slice()), reader.get(&[i])?.as_deref());
    }

    Ok(())
}

#[test]
fn builder_random_pairs_round_trip() -> shelf::Result<()> {
    use rand::{Rng, SeedableRng};

    let mut rng = rand::rngs::StdRng::seed_from_u64(0xDEC0DE);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("random.shelf");

    let mut pairs = std::collections::BTreeMap::new();
    while pairs.len() < 2_000 {
        let key_len = rng.random_range(1..=24);
        let value_len = rng.random_range(0..=512);

        let key: Vec<u8> = (0..key_len).map(|_| rng.random()).collect();
        let value: Vec<u8> = (0..value_len).map(|_| rng.random()).collect();

        pairs.insert(key, value);
    }

    let mut writer = Config::new().writer(&path)?;
    for (key, value) in &pairs {
        writer.put(key, value)?;
    }
    writer.finish()?;

    let reader = Config::new().open(&path)?;
    assert_eq!(pairs.len(), reader.len());

    for (key, value) in &pairs {
        assert_eq!(Some(value.as_slice()), reader.get(key)?.as_deref());
    }

    // And a pile of keys that were never written
    for _ in 0..1_000 {
        let key: Vec<u8> = (0..rng.random_range(1..=24)).map(|_| rng.random()).collect();
        if !pairs.contains_key(&key) {
            assert_eq!(None, reader.get(&key)?);
        }
    }

    Ok(())
}

#[test]
fn builder_writes_to_stream() -> shelf::Result<()> {
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let dir = tempfile::tempdir()?;
    let sink = SharedSink(Arc::new(Mutex::new(Vec::new())));

    let mut writer = Config::new().writer_to_stream(sink.clone())?;
    writer.put(b"k", b"v")?;
    writer.put(b"other", b"value")?;
    writer.finish()?;

    // The streamed bytes form a complete store
    let path = dir.path().join("streamed.shelf");
    std::fs::write(&path, sink.0.lock().unwrap().as_slice())?;

    let reader = Config::new().open(&path)?;
    assert_eq!(2, reader.len());
    assert_eq!(Some(b"v".as_slice()), reader.get(b"k")?.as_deref());
    assert_eq!(Some(b"value".as_slice()), reader.get(b"other")?.as_deref());

    Ok(())
}
