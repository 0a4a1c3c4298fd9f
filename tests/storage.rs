use std::path::Path;
use std::sync::Arc;

use vocalscribe::storage::{extract_object_key, ObjectStore, StorageError, StorageHandle};

#[test]
fn extracts_key_from_download_url() {
    let key = extract_object_key("https://x/o/vocals/abc123_vocals.mp3?token=y")
        .expect("key should be recognized");
    assert_eq!(key.file_name, "abc123_vocals.mp3");
    assert_eq!(key.bucket_path(), "vocals/abc123_vocals.mp3");
}

#[test]
fn key_stops_at_first_slash_or_query() {
    let key = extract_object_key("bucket/vocals/song.mp3/extra").unwrap();
    assert_eq!(key.file_name, "song.mp3");

    let key = extract_object_key("vocals/song.mp3?alt=media&token=t").unwrap();
    assert_eq!(key.file_name, "song.mp3");

    let key = extract_object_key("vocals/plain.wav").unwrap();
    assert_eq!(key.file_name, "plain.wav");
}

#[test]
fn references_without_vocals_segment_are_rejected() {
    assert!(extract_object_key("https://x/o/drums/abc.mp3").is_none());
    assert!(extract_object_key("").is_none());
    assert!(extract_object_key("vocals/").is_none());
}

struct NamedStore(&'static str);

impl ObjectStore for NamedStore {
    fn download_to(&self, _key: &str, dest: &Path) -> Result<u64, StorageError> {
        std::fs::write(dest, self.0).map_err(|source| StorageError::Write {
            path: dest.to_path_buf(),
            source,
        })?;
        Ok(self.0.len() as u64)
    }
}

#[test]
fn handle_rebind_swaps_the_client() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempfile::tempdir()?;
    let dest = temp_dir.path().join("object");

    let handle = StorageHandle::new(Arc::new(NamedStore("before")));
    handle.current().download_to("vocals/x", &dest)?;
    assert_eq!(std::fs::read_to_string(&dest)?, "before");

    // A clone observes the swap; inflight holders keep their own Arc.
    let observer = handle.clone();
    handle.rebind(Arc::new(NamedStore("after")));
    observer.current().download_to("vocals/x", &dest)?;
    assert_eq!(std::fs::read_to_string(&dest)?, "after");
    Ok(())
}
