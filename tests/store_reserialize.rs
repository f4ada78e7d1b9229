use shelf::Config;
use test_log::test;

// Rebuilding a store from its own iteration output must answer `get`
// identically on every key.
#[test]
fn reserialize_preserves_answers() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let first_path = dir.path().join("first.shelf");
    let second_path = dir.path().join("second.shelf");

    let mut writer = Config::new().writer(&first_path)?;
    for i in 0..2_000u64 {
        // Mixed key widths land in different buckets
        if i % 3 == 0 {
            writer.put(&(i as u32).to_le_bytes(), format!("v{i}").as_bytes())?;
        } else {
            writer.put(&i.to_le_bytes(), format!("v{i}").as_bytes())?;
        }
    }
    writer.finish()?;

    let first = Config::new().open(&first_path)?;

    let mut writer = Config::new().writer(&second_path)?;
    for pair in first.iter() {
        let (key, value) = pair?;
        writer.put(&key, &value)?;
    }
    writer.finish()?;

    let second = Config::new().open(&second_path)?;
    assert_eq!(first.len(), second.len());

    for pair in first.iter() {
        let (key, value) = pair?;
        assert_eq!(Some(&*value), second.get(&key)?.as_deref());
    }

    // And misses stay misses
    assert_eq!(None, second.get(b"not there")?);

    Ok(())
}

#[test]
fn reserialize_key_iteration_matches() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("keys.shelf");

    let mut writer = Config::new().writer(&path)?;
    for i in 0..100u32 {
        writer.put(&i.to_le_bytes(), b"v")?;
    }
    writer.finish()?;

    let reader = Config::new().open(&path)?;

    let mut from_pairs: Vec<Vec<u8>> = reader
        .iter()
        .map(|pair| pair.map(|(key, _)| key.to_vec()))
        .collect::<shelf::Result<_>>()?;

    let mut from_keys: Vec<Vec<u8>> = reader
        .keys()
        .map(|key| key.map(|key| key.to_vec()))
        .collect::<shelf::Result<_>>()?;

    from_pairs.sort();
    from_keys.sort();

    assert_eq!(100, from_keys.len());
    assert_eq!(from_pairs, from_keys);

    Ok(())
}
