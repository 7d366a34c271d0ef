use std::io::{Read, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use n5kv::storage::{FileSystemKeyValueAccess, KeyValueAccess, LockMode};
use tempfile::TempDir;

const BLOCKED: Duration = Duration::from_millis(300);
const RELEASED: Duration = Duration::from_secs(3);

fn setup() -> (TempDir, FileSystemKeyValueAccess, String) {
    env_logger::try_init().ok();
    let dir = tempfile::tempdir().expect("create temp dir");
    let key = dir.path().join("locks").join("test.txt");
    (
        dir,
        FileSystemKeyValueAccess::new(),
        key.to_string_lossy().into_owned(),
    )
}

/// Try to acquire a lock on another thread; the receiver fires once it is held.
fn acquire_in_background(key: &str, mode: LockMode) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel();
    let key = key.to_owned();
    thread::spawn(move || {
        let access = FileSystemKeyValueAccess::new();
        let lock = match mode {
            LockMode::Shared => access.lock_for_reading(&key),
            LockMode::Exclusive => access.lock_for_writing(&key),
        }
        .expect("lock in background");
        tx.send(()).ok();
        lock.close().expect("release background lock");
    });
    rx
}

fn assert_blocked(rx: &mpsc::Receiver<()>) {
    assert_eq!(
        rx.recv_timeout(BLOCKED),
        Err(mpsc::RecvTimeoutError::Timeout),
        "lock should not have been granted"
    );
}

fn assert_acquired(rx: &mpsc::Receiver<()>) {
    rx.recv_timeout(RELEASED)
        .expect("lock should have been granted");
}

#[test]
fn write_lock_excludes_writers() {
    let (_dir, access, key) = setup();
    let lock = access.lock_for_writing(&key).unwrap();
    assert_eq!(lock.mode(), LockMode::Exclusive);

    let rx = acquire_in_background(&key, LockMode::Exclusive);
    assert_blocked(&rx);
    lock.close().unwrap();
    assert_acquired(&rx);
}

#[test]
fn write_lock_excludes_readers() {
    let (_dir, access, key) = setup();
    let lock = access.lock_for_writing(&key).unwrap();

    let rx = acquire_in_background(&key, LockMode::Shared);
    assert_blocked(&rx);
    drop(lock);
    assert_acquired(&rx);
}

#[test]
fn read_lock_excludes_writers() {
    let (_dir, access, key) = setup();
    access.lock_for_writing(&key).unwrap().close().unwrap();
    let lock = access.lock_for_reading(&key).unwrap();

    let rx = acquire_in_background(&key, LockMode::Exclusive);
    assert_blocked(&rx);
    lock.close().unwrap();
    assert_acquired(&rx);
}

#[test]
fn read_locks_are_shared() {
    let (_dir, access, key) = setup();
    access.lock_for_writing(&key).unwrap().close().unwrap();

    let first = access.lock_for_reading(&key).unwrap();
    let second = access.lock_for_reading(&key).unwrap();
    assert_acquired(&acquire_in_background(&key, LockMode::Shared));

    let third = access.try_lock_for_reading(&key).unwrap();
    assert!(third.is_some());
    assert!(access.try_lock_for_writing(&key).unwrap().is_none());

    drop((first, second, third));
    assert!(access.try_lock_for_writing(&key).unwrap().is_some());
}

#[test]
fn closing_a_reader_releases_the_lock() {
    let (_dir, access, key) = setup();
    let lock = access.lock_for_writing(&key).unwrap();
    let rx = acquire_in_background(&key, LockMode::Exclusive);
    assert_blocked(&rx);

    lock.new_reader().close().unwrap();
    assert!(!lock.is_open());
    assert_acquired(&rx);
    // closing again is a no-op
    lock.close().unwrap();
}

#[test]
fn closing_an_input_stream_releases_the_lock() {
    let (_dir, access, key) = setup();
    let lock = access.lock_for_writing(&key).unwrap();
    let rx = acquire_in_background(&key, LockMode::Exclusive);
    assert_blocked(&rx);

    lock.new_input_stream().close().unwrap();
    assert!(!lock.is_open());
    assert_acquired(&rx);
}

#[test]
fn dropping_a_writer_releases_the_lock() {
    let (_dir, access, key) = setup();
    let lock = access.lock_for_writing(&key).unwrap();
    {
        let mut writer = lock.new_writer();
        writer.write_all(b"payload").unwrap();
    }
    assert!(!lock.is_open());
    assert!(access.try_lock_for_writing(&key).unwrap().is_some());
}

#[test]
fn closed_channel_rejects_io() {
    let (_dir, access, key) = setup();
    let mut lock = access.lock_for_writing(&key).unwrap();
    lock.new_output_stream().close().unwrap();

    let mut buf = [0u8; 4];
    assert!(lock.read(&mut buf).is_err());
    assert!(lock.write(b"late").is_err());
    assert!(lock.set_len(0).is_err());
}

#[test]
fn written_content_is_visible_to_readers() {
    let (_dir, access, key) = setup();
    let lock = access.lock_for_writing(&key).unwrap();
    let mut writer = lock.new_writer();
    writer.write_all(b"hello n5").unwrap();
    writer.close().unwrap();

    assert_eq!(access.size(&key).unwrap(), 8);
    let mut text = String::new();
    access
        .lock_for_reading(&key)
        .unwrap()
        .new_reader()
        .read_to_string(&mut text)
        .unwrap();
    assert_eq!(text, "hello n5");

    // reopening for writing does not truncate
    let lock = access.lock_for_writing(&key).unwrap();
    assert_eq!(access.size(&key).unwrap(), 8);
    lock.close().unwrap();
}

#[test]
fn reading_a_missing_key_is_not_found() {
    let (_dir, access, key) = setup();
    let err = access.lock_for_reading(&key).unwrap_err();
    assert!(err.is_not_found(), "{err}");
    assert!(!access.exists(&key));
}

#[test]
fn lists_directories_and_deletes_recursively() {
    let (dir, access, _key) = setup();
    let root = dir.path().join("tree").to_string_lossy().into_owned();
    for sub in ["b", "a", "a/nested"] {
        access
            .create_directories(&access.compose(&[root.as_str(), sub]))
            .unwrap();
    }
    let file = access.compose(&[root.as_str(), "a", "nested", "value"]);
    access.lock_for_writing(&file).unwrap().close().unwrap();
    access
        .lock_for_writing(&access.compose(&[root.as_str(), "file"]))
        .unwrap()
        .close()
        .unwrap();

    assert_eq!(access.list(&root).unwrap(), vec!["a", "b"]);
    assert!(access.is_file(&file));
    assert!(access.is_directory(&access.compose(&[root.as_str(), "a"])));

    let a = access.compose(&[root.as_str(), "a"]);
    access.delete(&a).unwrap();
    assert!(!access.exists(&a));
    assert!(!access.exists(&file));
    assert_eq!(access.list(&root).unwrap(), vec!["b"]);
    // deleting again is fine
    access.delete(&a).unwrap();
}

#[test]
fn delete_waits_for_readers() {
    let (_dir, access, key) = setup();
    access.lock_for_writing(&key).unwrap().close().unwrap();
    let lock = access.lock_for_reading(&key).unwrap();

    let (tx, rx) = mpsc::channel();
    let target = key.clone();
    thread::spawn(move || {
        FileSystemKeyValueAccess::new()
            .delete(&target)
            .expect("delete");
        tx.send(()).ok();
    });
    assert_blocked(&rx);
    assert!(access.exists(&key));
    lock.close().unwrap();
    assert_acquired(&rx);
    assert!(!access.exists(&key));
}
