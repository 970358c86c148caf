use super::*;
use crate::models::{Page, PageCursor, PostSummary, Publication};
use chrono::Duration as ChronoDuration;
use tempfile::TempDir;

fn create_test_store() -> (SnapshotStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = SnapshotStore::at(temp_dir.path()).unwrap();
    (store, temp_dir)
}

fn create_test_initial() -> InitialPage {
    InitialPage {
        publication: Publication {
            id: "pub-1".to_string(),
            title: "Weekly Recap".to_string(),
            display_title: None,
            description_seo: Some("What I watched this week".to_string()),
            url: Some("https://recap.example.dev".to_string()),
            author_name: "Test Author".to_string(),
            logo: None,
        },
        page: Page {
            posts: vec![PostSummary {
                id: "post-1".to_string(),
                title: "Week 1".to_string(),
                brief: "First week".to_string(),
                slug: "week-1".to_string(),
                published_at: Utc::now(),
                cover_image: Some("https://cdn.example.dev/1.png".to_string()),
            }],
            cursor: PageCursor::new("c1", true),
        },
    }
}

#[test]
fn test_store_and_load() {
    let (store, _temp_dir) = create_test_store();
    let initial = create_test_initial();

    store.store("recap.example.dev", &initial).unwrap();

    let loaded = store.load("recap.example.dev").unwrap().unwrap();
    assert_eq!(loaded.host, "recap.example.dev");
    assert_eq!(loaded.initial, initial);

    // other publications are stored separately
    assert!(store.load("other.example.dev").unwrap().is_none());
}

#[test]
fn test_store_replaces_previous_snapshot() {
    let (store, _temp_dir) = create_test_store();
    let mut initial = create_test_initial();
    store.store("recap.example.dev", &initial).unwrap();

    initial.page.cursor = PageCursor::new("c9", false);
    store.store("recap.example.dev", &initial).unwrap();

    let loaded = store.load("recap.example.dev").unwrap().unwrap();
    assert_eq!(loaded.initial.page.cursor, PageCursor::new("c9", false));
}

#[test]
fn test_freshness_window() {
    let (store, _temp_dir) = create_test_store();
    let snapshot = store.store("recap.example.dev", &create_test_initial()).unwrap();

    let max_age = Duration::from_secs(60);
    assert!(snapshot.is_fresh(max_age, snapshot.generated_at + ChronoDuration::seconds(30)));
    assert!(!snapshot.is_fresh(max_age, snapshot.generated_at + ChronoDuration::seconds(61)));
    assert!(snapshot.is_fresh(max_age, snapshot.generated_at - ChronoDuration::seconds(5)));

    assert!(store.load_fresh("recap.example.dev", max_age).unwrap().is_some());
    assert!(store.load_fresh("recap.example.dev", Duration::ZERO).unwrap().is_none());
}

#[test]
fn test_corrupt_snapshot_is_an_error() {
    let (store, temp_dir) = create_test_store();
    fs::write(
        temp_dir.path().join("snapshots").join("recap.example.dev.json"),
        "not json",
    )
    .unwrap();

    assert!(store.load("recap.example.dev").is_err());
}
