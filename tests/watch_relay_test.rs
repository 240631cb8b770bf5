//! End-to-end scenarios: real filesystem changes in a temp tree, observed
//! through the full translate/stamp/serialize/broadcast pipeline.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use serde_json::Value;
use tempfile::tempdir;

use fsrelay::config::Settings;
use fsrelay::{WatchError, Watcher};

const WAIT: Duration = Duration::from_secs(10);

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.storage_token = "test-token".to_string();
    settings.watch.poll_interval_ms = 25;
    settings
}

fn start(root: &Path) -> (Watcher, Receiver<Vec<u8>>) {
    let watcher = Watcher::rooted(&settings(), root.to_path_buf()).unwrap();
    let (tx, rx) = crossbeam_channel::unbounded();
    watcher.listen(tx);
    (watcher, rx)
}

/// Receive messages until one satisfies the predicate, returning it along
/// with everything seen on the way.
fn recv_until(
    rx: &Receiver<Vec<u8>>,
    pred: impl Fn(&Value) -> bool,
) -> (Value, Vec<Value>) {
    let deadline = Instant::now() + WAIT;
    let mut seen = Vec::new();
    loop {
        let bytes = rx
            .recv_deadline(deadline)
            .expect("expected message before deadline");
        let msg: Value = serde_json::from_slice(&bytes).expect("messages are valid JSON");
        if pred(&msg) {
            return (msg, seen);
        }
        seen.push(msg);
    }
}

#[test]
fn test_create_file_message() {
    let dir = tempdir().unwrap();
    let (mut watcher, rx) = start(dir.path());

    fs::write(dir.path().join("foo.txt"), "hello").unwrap();

    let (msg, _) = recv_until(&rx, |m| m["action"] == "create" && m["path"] == "/foo.txt");
    assert_eq!(msg["storage"], "test-token");
    assert_eq!(msg["file_type"], "file");
    assert!(msg.get("src_path").is_none());
    assert!(msg.get("dest_path").is_none());
    let mtime = msg["mtime"].as_str().expect("mtime is a string");
    let (secs, nanos) = mtime.split_once('.').expect("seconds.nanoseconds");
    secs.parse::<u64>().unwrap();
    nanos.parse::<u32>().unwrap();

    watcher.close().unwrap();
}

#[test]
fn test_rename_file_message() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("foo.txt"), "hello").unwrap();
    let (mut watcher, rx) = start(dir.path());

    fs::rename(dir.path().join("foo.txt"), dir.path().join("bar.txt")).unwrap();

    let (msg, _) = recv_until(&rx, |m| m["action"] == "rename");
    assert_eq!(msg["src_path"], "/foo.txt");
    assert_eq!(msg["dest_path"], "/bar.txt");
    assert_eq!(msg["file_type"], "file");
    assert!(
        msg.get("path").is_none(),
        "rename shape must omit the generic path field"
    );

    watcher.close().unwrap();
}

#[test]
fn test_modify_file_message() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("doc.md"), "v1").unwrap();
    let (mut watcher, rx) = start(dir.path());

    std::thread::sleep(Duration::from_millis(50));
    fs::write(dir.path().join("doc.md"), "v2 with more content").unwrap();

    let (msg, _) = recv_until(&rx, |m| m["action"] == "modify" && m["path"] == "/doc.md");
    assert_eq!(msg["file_type"], "file");

    watcher.close().unwrap();
}

#[test]
fn test_remove_file_message() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("gone.txt"), "x").unwrap();
    let (mut watcher, rx) = start(dir.path());

    fs::remove_file(dir.path().join("gone.txt")).unwrap();

    let (msg, _) = recv_until(&rx, |m| m["action"] == "remove" && m["path"] == "/gone.txt");
    assert_eq!(msg["file_type"], "file");

    watcher.close().unwrap();
}

#[test]
fn test_ignored_paths_produce_no_messages() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join(".cache")).unwrap();
    let (mut watcher, rx) = start(dir.path());

    // Filtered both by the .cache directory rule and the .log suffix rule.
    fs::write(dir.path().join(".cache/tmp.log"), "noise").unwrap();
    fs::write(dir.path().join("sentinel.txt"), "signal").unwrap();

    let (_, earlier) = recv_until(&rx, |m| m["path"] == "/sentinel.txt");
    for msg in earlier {
        let text = msg.to_string();
        assert!(!text.contains("tmp.log"), "ignored path leaked: {text}");
        assert!(!text.contains(".cache"), "ignored path leaked: {text}");
    }

    watcher.close().unwrap();
}

#[test]
fn test_directory_write_produces_no_message() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("subdir")).unwrap();
    let (mut watcher, rx) = start(dir.path());

    // Creating a file inside subdir bumps the directory's mtime; the file
    // create must come through, the directory write must not.
    fs::write(dir.path().join("subdir/inner.txt"), "x").unwrap();

    let (_, earlier) = recv_until(&rx, |m| m["path"] == "/subdir/inner.txt");
    for msg in earlier {
        assert!(
            !(msg["file_type"] == "directory" && msg["action"] == "modify"),
            "directory write leaked: {msg}"
        );
    }
    // Drain a couple more scans to catch a late directory-write message.
    std::thread::sleep(Duration::from_millis(100));
    while let Ok(bytes) = rx.try_recv() {
        let msg: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(
            !(msg["file_type"] == "directory" && msg["action"] == "modify"),
            "directory write leaked: {msg}"
        );
    }

    watcher.close().unwrap();
}

#[test]
fn test_directory_create_message() {
    let dir = tempdir().unwrap();
    let (mut watcher, rx) = start(dir.path());

    fs::create_dir(dir.path().join("fresh")).unwrap();

    let (msg, _) = recv_until(&rx, |m| m["action"] == "create" && m["path"] == "/fresh");
    assert_eq!(msg["file_type"], "directory");

    watcher.close().unwrap();
}

#[test]
fn test_all_subscribers_observe_same_order() {
    let dir = tempdir().unwrap();
    let mut watcher = Watcher::rooted(&settings(), dir.path().to_path_buf()).unwrap();

    let (tx_a, rx_a) = crossbeam_channel::unbounded();
    let (tx_b, rx_b) = crossbeam_channel::unbounded();
    watcher.listen(tx_a);
    watcher.listen(tx_b);
    assert_eq!(watcher.subscriber_count(), 2);

    fs::write(dir.path().join("one.txt"), "1").unwrap();
    std::thread::sleep(Duration::from_millis(100));
    fs::write(dir.path().join("two.txt"), "2").unwrap();

    let collect = |rx: &Receiver<Vec<u8>>| {
        let (_, mut earlier) = recv_until(rx, |m| m["path"] == "/two.txt");
        earlier.retain(|m| m["file_type"] == "file");
        earlier
    };
    let from_a = collect(&rx_a);
    let from_b = collect(&rx_b);
    assert_eq!(from_a, from_b, "subscribers must see the same total order");

    watcher.close().unwrap();
}

#[test]
fn test_unlisten_stops_delivery() {
    let dir = tempdir().unwrap();
    let (mut watcher, rx) = start(dir.path());

    let (tx_b, rx_b) = crossbeam_channel::unbounded::<Vec<u8>>();
    let id_b = watcher.listen(tx_b);
    watcher.unlisten(id_b);

    fs::write(dir.path().join("after.txt"), "x").unwrap();
    recv_until(&rx, |m| m["path"] == "/after.txt");

    assert!(
        rx_b.try_recv().is_err(),
        "conduit unsubscribed before the broadcast must not receive it"
    );

    watcher.close().unwrap();
}

#[test]
fn test_blank_token_is_fatal_at_startup() {
    let dir = tempdir().unwrap();
    let mut blank = settings();
    blank.storage_token = "  ".to_string();
    let err = Watcher::rooted(&blank, dir.path().to_path_buf());
    assert!(matches!(err, Err(WatchError::BlankToken)));
}

#[test]
fn test_missing_root_is_fatal_at_startup() {
    let err = Watcher::rooted(
        &settings(),
        Path::new("/nonexistent/fsrelay-e2e").to_path_buf(),
    );
    assert!(matches!(err, Err(WatchError::Scan { .. })));
}

#[test]
fn test_close_is_idempotent_and_clean() {
    let dir = tempdir().unwrap();
    let (mut watcher, _rx) = start(dir.path());
    watcher.close().unwrap();
    watcher.close().unwrap();
}
