use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

fn scratch_path(name: &str) -> PathBuf {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir()
        .join(format!("calcdesk-storage-{}-{n}", std::process::id()))
        .join(name)
}

#[test]
fn guest_flag_requires_literal_true() {
    let store = MemoryStore::new();
    assert!(!is_guest(&store));

    store.set(GUEST_FLAG_KEY, "yes").unwrap();
    assert!(!is_guest(&store));

    store.set(GUEST_FLAG_KEY, "true").unwrap();
    assert!(is_guest(&store));
}

#[test]
fn set_guest_false_removes_key() {
    let store = MemoryStore::new();
    set_guest(&store, true).unwrap();
    assert_eq!(store.get(GUEST_FLAG_KEY).as_deref(), Some("true"));

    set_guest(&store, false).unwrap();
    assert_eq!(store.get(GUEST_FLAG_KEY), None);
}

#[test]
fn file_store_starts_empty_when_missing() {
    let store = FileStore::open(scratch_path("missing.json")).unwrap();
    assert_eq!(store.get(GUEST_FLAG_KEY), None);
}

#[test]
fn file_store_persists_across_reopen() {
    let path = scratch_path("storage.json");
    {
        let store = FileStore::open(&path).unwrap();
        set_guest(&store, true).unwrap();
    }
    let reopened = FileStore::open(&path).unwrap();
    assert!(is_guest(&reopened));

    set_guest(&reopened, false).unwrap();
    let again = FileStore::open(&path).unwrap();
    assert!(!is_guest(&again));
}

#[test]
fn file_store_rejects_corrupt_file() {
    let path = scratch_path("corrupt.json");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "{not json").unwrap();

    let err = FileStore::open(&path).unwrap_err();
    assert!(matches!(err, StorageError::Parse { .. }));
}

#[test]
fn file_store_treats_blank_file_as_empty() {
    let path = scratch_path("blank.json");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "\n").unwrap();

    let store = FileStore::open(&path).unwrap();
    assert_eq!(store.path(), path.as_path());
    assert_eq!(store.get("anything"), None);
}
