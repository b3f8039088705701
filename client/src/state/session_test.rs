use super::*;

#[test]
fn memory_store_round_trips_and_clears() {
    let store = MemorySessionStore::new();
    assert_eq!(store.load(), None);

    store.save("c-1").expect("save");
    assert_eq!(store.load().as_deref(), Some("c-1"));

    store.clear().expect("clear");
    assert_eq!(store.load(), None);
}

#[test]
fn file_store_creates_parent_dirs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileSessionStore::new(dir.path().join("nested/state/session.json"));

    store.save("c-42").expect("save");
    assert_eq!(store.load().as_deref(), Some("c-42"));

    let reopened = FileSessionStore::new(store.path());
    assert_eq!(reopened.load().as_deref(), Some("c-42"));
}

#[test]
fn file_store_clear_tolerates_missing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileSessionStore::new(dir.path().join("session.json"));

    store.clear().expect("missing file is fine");
    store.save("c-1").expect("save");
    store.clear().expect("clear");
    assert_eq!(store.load(), None);
}

#[test]
fn file_store_ignores_corrupt_contents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.json");
    std::fs::write(&path, "not json").expect("write");

    assert_eq!(FileSessionStore::new(&path).load(), None);
}
