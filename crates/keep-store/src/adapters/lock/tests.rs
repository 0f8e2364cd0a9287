use super::*;
use std::fs;
use std::path::PathBuf;

fn temp_path(test_name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "keepstore_pidfile_{}_{}",
        test_name,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir.join("keepstore.pid")
}

#[test]
fn acquire_creates_and_writes_pid() {
    let path = temp_path("acquire");

    let lock = PidFile::acquire(&path).expect("should acquire lock");
    assert!(lock.path().exists());
    assert_eq!(lock.pid(), std::process::id());

    let contents = fs::read_to_string(lock.path()).unwrap();
    let stored: u32 = contents.trim().parse().unwrap();
    assert_eq!(stored, std::process::id());

    drop(lock);
}

#[test]
fn second_acquire_fails_immediately() {
    let path = temp_path("contention");

    let lock1 = PidFile::acquire(&path).expect("first lock should succeed");

    let result = PidFile::acquire(&path);
    assert!(matches!(result, Err(LockError::AlreadyLocked { .. })));

    drop(lock1);
}

#[test]
fn lock_released_on_drop() {
    let path = temp_path("released");

    {
        let _lock = PidFile::acquire(&path).expect("should acquire");
    }

    let lock2 = PidFile::acquire(&path).expect("should acquire after release");
    drop(lock2);
}
