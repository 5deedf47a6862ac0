//! Integration tests for [`telegram_export::ExportDirSource`].
//!
//! Covers handle resolution for both directory layouts, half-open range filtering,
//! lookup by id without prior resolution, unavailable / malformed exports, and the
//! snapshot horizon across a replaced export.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use chansync_core::{ChannelId, ChannelRef, MessageSource, SyncError, TimeRange};
use chrono::{DateTime, Utc};
use reconciler::RangeReconciler;
use storage::InMemoryMessageStore;
use telegram_export::ExportDirSource;

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

/// Writes `json` to `path` and pins its modification time to `mtime_secs`.
fn write_export(path: &Path, json: String, mtime_secs: u64) {
    std::fs::write(path, json).unwrap();
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(UNIX_EPOCH + Duration::from_secs(mtime_secs))
        .unwrap();
}

fn export_json(id: i64, name: &str, unix_times: &[i64]) -> String {
    let messages: Vec<String> = unix_times
        .iter()
        .enumerate()
        .map(|(i, t)| {
            format!(
                r#"{{"id": {}, "type": "message", "date_unixtime": "{}", "from": "author", "text": "post {}"}}"#,
                i + 1,
                t,
                i + 1
            )
        })
        .collect();
    format!(
        r#"{{"name": "{}", "type": "public_channel", "id": {}, "messages": [{}]}}"#,
        name,
        id,
        messages.join(",")
    )
}

/// **Test: A handle resolves from `<handle>.json` and fetch honors `[start, end)`.**
#[tokio::test]
async fn test_resolve_and_fetch_flat_layout() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("rust_news.json"),
        export_json(777, "Rust News", &[100, 200, 300]),
    )
    .unwrap();
    let source = ExportDirSource::new(dir.path());

    let info = source
        .resolve_channel(&ChannelRef::parse("https://t.me/rust_news").unwrap())
        .await
        .unwrap();
    assert_eq!(info.id, ChannelId::from("777"));
    assert_eq!(info.title.as_deref(), Some("Rust News"));

    let messages = source
        .fetch(&info.id, TimeRange::new(ts(100), ts(300)).unwrap())
        .await
        .unwrap();
    let ids: Vec<i64> = messages.iter().map(|m| m.message_id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(messages.iter().all(|m| m.channel_id == info.id));
}

/// **Test: `<handle>/result.json` layout, and fetch by id without resolving first.**
#[tokio::test]
async fn test_nested_layout_and_lookup_by_id() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("news")).unwrap();
    std::fs::write(
        dir.path().join("news").join("result.json"),
        export_json(42, "News", &[10, 20]),
    )
    .unwrap();
    std::fs::write(dir.path().join("other.json"), export_json(43, "Other", &[15])).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not an export").unwrap();
    let source = ExportDirSource::new(dir.path());

    let messages = source
        .fetch(&ChannelId::from("42"), TimeRange::from_beginning(ts(1000)).unwrap())
        .await
        .unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].chat_title.as_deref(), Some("News"));

    let info = source
        .resolve_channel(&ChannelRef::parse("@news").unwrap())
        .await
        .unwrap();
    assert_eq!(info.id, ChannelId::from("42"));
}

/// **Test: Missing exports and malformed JSON surface as SourceUnavailable.**
#[tokio::test]
async fn test_unavailable_exports() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
    let source = ExportDirSource::new(dir.path());

    let missing = source
        .resolve_channel(&ChannelRef::parse("t.me/absent").unwrap())
        .await;
    assert!(matches!(missing, Err(SyncError::SourceUnavailable { .. })));

    let broken = source
        .resolve_channel(&ChannelRef::parse("broken").unwrap())
        .await;
    assert!(matches!(broken, Err(SyncError::SourceUnavailable { .. })));

    let unknown_id = source
        .fetch(&ChannelId::from("999"), TimeRange::new(ts(0), ts(10)).unwrap())
        .await;
    assert!(matches!(unknown_id, Err(SyncError::SourceUnavailable { .. })));
}

/// **Test: The horizon is the export's mtime, or just past its newest entry if later.**
#[tokio::test]
async fn test_horizon_follows_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    write_export(&dir.path().join("a.json"), export_json(1, "A", &[100]), 150);
    write_export(&dir.path().join("b.json"), export_json(2, "B", &[100, 400]), 150);
    let source = ExportDirSource::new(dir.path());

    assert_eq!(
        source.horizon(&ChannelId::from("1")).await.unwrap(),
        Some(ts(150))
    );
    assert_eq!(
        source.horizon(&ChannelId::from("2")).await.unwrap(),
        Some(ts(401))
    );
    assert!(matches!(
        source.horizon(&ChannelId::from("3")).await,
        Err(SyncError::SourceUnavailable { .. })
    ));
}

/// **Test: A newer export replacing the old one is picked up by the next sync.**
///
/// **Setup:** Export taken at t=150 holding message 1 (t=100).
/// **Action:** Reconcile `[0, 300)`; replace the export with one taken at t=250 that also
/// holds message 2 (t=200); reconcile `[0, 300)` again.
/// **Expected:** First sync covers `[0, 150)` and reports the rest unavailable; the second
/// fetches `[150, 250)` and returns both messages.
#[tokio::test]
async fn test_replaced_export_is_synced_past_old_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rust_news.json");
    write_export(&path, export_json(777, "Rust News", &[100]), 150);

    let store = InMemoryMessageStore::new();
    let reconciler = RangeReconciler::new(
        Arc::new(store.clone()),
        Arc::new(ExportDirSource::new(dir.path())),
    );
    let channel = ChannelId::from("777");
    let wanted = TimeRange::new(ts(0), ts(300)).unwrap();

    let first = reconciler.reconcile(&channel, wanted).await.unwrap();
    assert_eq!(first.fetched, vec![TimeRange::new(ts(0), ts(150)).unwrap()]);
    assert_eq!(first.failed_ranges(), vec![TimeRange::new(ts(150), ts(300)).unwrap()]);
    assert!(matches!(
        first.failed[0].error,
        SyncError::SourceUnavailable { .. }
    ));
    assert_eq!(first.messages.len(), 1);

    write_export(&path, export_json(777, "Rust News", &[100, 200]), 250);

    let second = reconciler.reconcile(&channel, wanted).await.unwrap();
    assert_eq!(second.fetched, vec![TimeRange::new(ts(150), ts(250)).unwrap()]);
    assert_eq!(second.failed_ranges(), vec![TimeRange::new(ts(250), ts(300)).unwrap()]);
    let ids: Vec<i64> = second.messages.iter().map(|m| m.message_id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(
        store.coverage(&channel).await.ranges(),
        &[TimeRange::new(ts(0), ts(250)).unwrap()]
    );
}
