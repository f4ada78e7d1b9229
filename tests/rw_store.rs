use shelf::Config;
use std::sync::mpsc;
use std::time::Duration;
use test_log::test;

#[test]
fn rw_buffer_flush_cycle() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rw.shelf");

    let store = Config::new().write_buffer_size(2).open_rw(&path)?;
    let empty_len = std::fs::metadata(&path)?.len();

    let (sender, receiver) = mpsc::channel();
    store.on_flush(move |_last_entry, _path| {
        let _ = sender.send(());
    });

    store.put(b"one", b"1")?;
    store.put(b"two", b"2")?; // buffer is full: kicks a background flush
    store.put(b"three", b"3")?;

    receiver
        .recv_timeout(Duration::from_secs(30))
        .expect("auto-flush should fire its listener");
    store.flush().wait()?;

    assert!(std::fs::metadata(&path)?.len() > empty_len);

    assert_eq!(Some(b"1".as_slice()), store.get(b"one")?.as_deref());
    assert_eq!(Some(b"2".as_slice()), store.get(b"two")?.as_deref());
    assert_eq!(Some(b"3".as_slice()), store.get(b"three")?.as_deref());

    // Remove + flush shrinks the base file again
    store.flush().wait()?;
    let full_len = std::fs::metadata(&path)?.len();

    store.remove(b"three")?;
    store.flush().wait()?;

    assert!(std::fs::metadata(&path)?.len() < full_len);
    assert_eq!(None, store.get(b"three")?);
    assert_eq!(Some(b"1".as_slice()), store.get(b"one")?.as_deref());

    Ok(())
}

#[test]
fn rw_read_your_writes() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ryw.shelf");

    let store = Config::new().auto_flush(false).open_rw(&path)?;

    assert_eq!(None, store.get(b"k")?);

    store.put(b"k", b"v1")?;
    assert_eq!(Some(b"v1".as_slice()), store.get(b"k")?.as_deref());

    store.put(b"k", b"v2")?;
    assert_eq!(Some(b"v2".as_slice()), store.get(b"k")?.as_deref());

    store.remove(b"k")?;
    assert_eq!(None, store.get(b"k")?);

    // Still removed after compaction
    store.flush().wait()?;
    assert_eq!(None, store.get(b"k")?);

    Ok(())
}

#[test]
fn rw_reopens_existing_store() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("reopen.shelf");

    {
        let store = Config::new().auto_flush(false).open_rw(&path)?;
        store.put(b"persisted", b"yes")?;
        store.flush().wait()?;
    }

    {
        let store = Config::new().auto_flush(false).open_rw(&path)?;
        assert_eq!(1, store.len());
        assert_eq!(Some(b"yes".as_slice()), store.get(b"persisted")?.as_deref());

        store.put(b"more", b"data")?;
        assert_eq!(2, store.len());
    }

    Ok(())
}

#[test]
fn rw_empty_flush_is_noop() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("noop.shelf");

    let store = Config::new().open_rw(&path)?;

    store.put(b"a", b"1")?;
    store.flush().wait()?;

    let len_after_first = std::fs::metadata(&path)?.len();

    // Two successive compactions over an empty buffer change nothing
    store.flush().wait()?;
    store.flush().wait()?;

    assert_eq!(len_after_first, std::fs::metadata(&path)?.len());
    assert_eq!(Some(b"1".as_slice()), store.get(b"a")?.as_deref());

    Ok(())
}

#[test]
fn rw_flush_retires_snapshot_entries_only() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("retire.shelf");

    let store = Config::new().auto_flush(false).open_rw(&path)?;

    store.put(b"stable", b"1")?;
    store.put(b"racy", b"old")?;

    let handle = store.flush();

    // This may land before or after the snapshot is cut; either way the
    // latest value must win once the flush settles.
    store.put(b"racy", b"new")?;

    handle.wait()?;

    assert_eq!(Some(b"1".as_slice()), store.get(b"stable")?.as_deref());
    assert_eq!(Some(b"new".as_slice()), store.get(b"racy")?.as_deref());

    store.flush().wait()?;
    assert_eq!(Some(b"new".as_slice()), store.get(b"racy")?.as_deref());

    Ok(())
}

#[test]
fn rw_iteration_respects_buffer() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("iter.shelf");

    let store = Config::new().auto_flush(false).open_rw(&path)?;

    store.put(b"a", b"1")?;
    store.put(b"b", b"2")?;
    store.flush().wait()?;

    store.put(b"b", b"2b")?; // shadows the flushed value
    store.remove(b"a")?; // hides the flushed key
    store.put(b"c", b"3")?;

    let mut entries = vec![];
    for pair in store.iter() {
        let (key, value) = pair?;
        entries.push((key.to_vec(), value.to_vec()));
    }

    entries.sort();
    assert_eq!(
        vec![
            (b"b".to_vec(), b"2b".to_vec()),
            (b"c".to_vec(), b"3".to_vec()),
        ],
        entries,
    );

    assert_eq!(2, store.iter().count());

    Ok(())
}

#[test]
fn rw_listener_panics_are_swallowed() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("panicky.shelf");

    let store = Config::new().auto_flush(false).open_rw(&path)?;

    store.on_flush(|_, _| panic!("misbehaving listener"));

    let (sender, receiver) = mpsc::channel();
    store.on_flush(move |last_entry, _| {
        let _ = sender.send(last_entry.map(|(key, _)| key.to_vec()));
    });

    store.put(b"k", b"v")?;
    store.flush().wait()?;

    // The panicking listener did not prevent the next one from running
    let last_key = receiver
        .recv_timeout(Duration::from_secs(30))
        .expect("second listener should fire");
    assert_eq!(Some(b"k".to_vec()), last_key);

    assert_eq!(Some(b"v".as_slice()), store.get(b"k")?.as_deref());

    Ok(())
}

#[test]
fn rw_size_counts_buffer_and_reader() -> shelf::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("size.shelf");

    let store = Config::new().auto_flush(false).open_rw(&path)?;
    assert_eq!(0, store.len());
    assert!(store.is_empty());

    store.put(b"a", b"1")?;
    store.put(b"b", b"2")?;
    assert_eq!(2, store.len());

    store.flush().wait()?;
    assert_eq!(2, store.len());

    store.put(b"c", b"3")?;
    assert_eq!(3, store.len());

    Ok(())
}
