#![forbid(unsafe_code)]

use relcon_core::ids::TagCategory;
use relcon_core::model::EntityRef;
use relcon_storage::{ErrorKind, SqliteStore};
use std::path::PathBuf;
use std::sync::{Arc, Barrier};

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("relcon_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

#[test]
fn resolve_returns_existing_tag_unchanged() {
    let mut store =
        SqliteStore::open(temp_dir("resolve_returns_existing_tag_unchanged")).expect("open");
    let content = TagCategory::content();

    let first = store.tag_resolve(&content, "portrait").expect("create");
    assert!(!first.flagged);
    store
        .tag_set_flagged(&content, first.id, true)
        .expect("flag");

    let again = store.tag_resolve(&content, "  portrait  ").expect("resolve");
    assert_eq!(again.id, first.id);
    assert_eq!(again.label, "portrait");
    assert!(again.flagged, "flagged must be preserved");
    assert_eq!(store.tags_list(&content).expect("list").len(), 1);
}

#[test]
fn resolve_rejects_blank_label() {
    let mut store = SqliteStore::open(temp_dir("resolve_rejects_blank_label")).expect("open");
    let err = store
        .tag_resolve(&TagCategory::content(), "   ")
        .expect_err("blank label");
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn tags_list_puts_flagged_first() {
    let mut store = SqliteStore::open(temp_dir("tags_list_puts_flagged_first")).expect("open");
    let search = TagCategory::search();
    for label in ["delta", "alpha", "charlie", "bravo"] {
        store.tag_resolve(&search, label).expect("resolve");
    }
    let charlie = store
        .tag_get(&search, "charlie")
        .expect("get")
        .expect("charlie exists");
    store
        .tag_set_flagged(&search, charlie.id, true)
        .expect("flag");

    let labels: Vec<String> = store
        .tags_list(&search)
        .expect("list")
        .into_iter()
        .map(|tag| tag.label)
        .collect();
    assert_eq!(labels, vec!["charlie", "alpha", "bravo", "delta"]);
}

#[test]
fn set_flagged_on_missing_tag_is_not_found() {
    let mut store =
        SqliteStore::open(temp_dir("set_flagged_on_missing_tag_is_not_found")).expect("open");
    let content = TagCategory::content();
    let tag = store.tag_resolve(&content, "x").expect("resolve");

    let err = store
        .tag_set_flagged(&TagCategory::search(), tag.id, true)
        .expect_err("tag belongs to another category");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = store
        .tag_set_flagged(&content, tag.id + 1000, true)
        .expect_err("missing id");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn concurrent_resolvers_create_one_tag() {
    let dir = temp_dir("concurrent_resolvers_create_one_tag");
    let workers = 8;
    let stores: Vec<SqliteStore> = (0..workers)
        .map(|_| SqliteStore::open(&dir).expect("open worker store"))
        .collect();
    let barrier = Arc::new(Barrier::new(workers));

    let handles: Vec<_> = stores
        .into_iter()
        .map(|mut store| {
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                store
                    .tag_resolve(&TagCategory::content(), "portrait")
                    .expect("concurrent resolve")
                    .id
            })
        })
        .collect();

    let ids: Vec<i64> = handles
        .into_iter()
        .map(|handle| handle.join().expect("worker thread"))
        .collect();
    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]), "ids: {ids:?}");

    let store = SqliteStore::open(&dir).expect("reopen");
    let tags = store.tags_list(&TagCategory::content()).expect("list");
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].label, "portrait");
}

#[test]
fn concurrent_syncs_sharing_new_labels_do_not_duplicate_tags() {
    let dir = temp_dir("concurrent_syncs_sharing_new_labels_do_not_duplicate_tags");
    let workers = 6;
    let entities: Vec<EntityRef> = (0..workers)
        .map(|i| EntityRef::parse("photo", &format!("p{i}")).expect("entity"))
        .collect();
    {
        let mut setup = SqliteStore::open(&dir).expect("open setup store");
        for entity in &entities {
            setup.entity_register(entity).expect("register");
        }
    }

    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = entities
        .iter()
        .cloned()
        .map(|entity| {
            let mut store = SqliteStore::open(&dir).expect("open worker store");
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                store
                    .sync_tags(&entity, &TagCategory::content(), ["street", "night", "rain"])
                    .expect("concurrent sync")
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker thread");
    }

    let store = SqliteStore::open(&dir).expect("reopen");
    let content = TagCategory::content();
    assert_eq!(store.tags_list(&content).expect("list").len(), 3);
    for entity in &entities {
        let labels: Vec<String> = store
            .entity_tags(entity, &content)
            .expect("entity tags")
            .into_iter()
            .map(|tag| tag.label)
            .collect();
        assert_eq!(labels, vec!["night", "rain", "street"]);
    }
}
