use shelf::Config;
use test_log::test;

fn psnake(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

#[test]
fn spanning_value_straddles_segment_boundary() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("span.shelf");

    let small_a = psnake(100, 1);
    let large = psnake(10_000, 2);
    let small_b = psnake(100, 3);

    let mut writer = Config::new().writer(&path)?;
    writer.put(b"a", &small_a)?;
    writer.put(b"b", &large)?;
    writer.put(b"c", &small_b)?;
    writer.finish()?;

    // 4 KiB segments: the 10 000-byte value crosses two boundaries
    let reader = Config::new().segment_size(4_096).open(&path)?;

    assert_eq!(Some(small_a.as_slice()), reader.get(b"a")?.as_deref());
    assert_eq!(Some(large.as_slice()), reader.get(b"b")?.as_deref());
    assert_eq!(Some(small_b.as_slice()), reader.get(b"c")?.as_deref());

    Ok(())
}

#[test]
fn spanning_index_slots_straddle_segments() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("span_index.shelf");

    let mut writer = Config::new().writer(&path)?;
    for i in 0..500u64 {
        writer.put(&i.to_le_bytes(), format!("value_{i}").as_bytes())?;
    }
    writer.finish()?;

    // Tiny segments so 9-byte slots constantly cross boundaries
    let reader = Config::new().segment_size(64).open(&path)?;

    for i in 0..500u64 {
        assert_eq!(
            Some(format!("value_{i}").as_bytes()),
            reader.get(&i.to_le_bytes())?.as_deref(),
        );
    }
    assert_eq!(None, reader.get(&9_999u64.to_le_bytes())?);

    assert_eq!(500, reader.iter().count());
    for pair in reader.iter() {
        let (key, value) = pair?;
        let i = u64::from_le_bytes(key.as_ref().try_into().unwrap());
        assert_eq!(format!("value_{i}").as_bytes(), &*value);
    }

    Ok(())
}

#[test]
fn spanning_positioned_reads_serve_data() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("pread.shelf");

    let large = psnake(10_000, 7);

    let mut writer = Config::new().writer(&path)?;
    writer.put(b"big", &large)?;
    writer.put(b"tiny", b"x")?;
    writer.finish()?;

    let reader = Config::new()
        .mmap_data(false)
        .segment_size(4_096)
        .open(&path)?;

    assert_eq!(Some(large.as_slice()), reader.get(b"big")?.as_deref());
    assert_eq!(Some(b"x".as_slice()), reader.get(b"tiny")?.as_deref());
    assert_eq!(None, reader.get(b"gone")?);

    Ok(())
}

#[test]
fn spanning_concurrent_reads() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("threads.shelf");

    let mut writer = Config::new().writer(&path)?;
    for i in 0..1_000u32 {
        writer.put(format!("key_{i}").as_bytes(), format!("value_{i}").as_bytes())?;
    }
    writer.finish()?;

    let reader = std::sync::Arc::new(Config::new().segment_size(256).open(&path)?);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let reader = std::sync::Arc::clone(&reader);
            std::thread::spawn(move || {
                for i in (t..1_000u32).step_by(8) {
                    let value = reader
                        .get(format!("key_{i}").as_bytes())
                        .expect("read should not fail")
                        .expect("key should exist");
                    assert_eq!(format!("value_{i}").as_bytes(), &*value);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("thread should not panic");
    }

    Ok(())
}
