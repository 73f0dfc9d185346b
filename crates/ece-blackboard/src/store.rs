use async_trait::async_trait;
use ece_core::{EceError, EceResult};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const STORE_LOCK_FILE: &str = ".store.lock";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
const LOCK_RETRY: Duration = Duration::from_millis(5);
const STALE_LOCK_AFTER: Duration = Duration::from_secs(10);

/// Trait for the backing list store of the blackboard.
///
/// Mirrors the Redis list primitives the blackboard needs. Every method is a
/// single atomic operation; implementations must not interleave two calls on
/// the same key.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Check that the store is reachable.
    async fn ping(&self) -> EceResult<()>;

    /// Append a value to the tail of `key`. Returns the new length.
    async fn rpush(&self, key: &str, value: String) -> EceResult<usize>;

    /// Prepend a value to the head of `key`. Returns the new length.
    async fn lpush(&self, key: &str, value: String) -> EceResult<usize>;

    /// Remove and return the head of `key`, if any.
    async fn lpop(&self, key: &str) -> EceResult<Option<String>>;

    /// Wait until `key` has an element, then remove and return its head.
    ///
    /// Returns `Ok(None)` once `shutdown` is cancelled. A cancelled pop never
    /// consumes an element.
    async fn blpop(&self, key: &str, shutdown: &CancellationToken) -> EceResult<Option<String>>;

    /// Return elements `start..=stop`. Negative indices count from the tail
    /// (`-1` is the last element); out-of-range indices are clamped.
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> EceResult<Vec<String>>;

    /// Length of `key` (0 if it does not exist).
    async fn llen(&self, key: &str) -> EceResult<usize>;

    /// Delete `key`. Returns whether it existed.
    async fn delete(&self, key: &str) -> EceResult<bool>;
}

/// Resolves Redis-style range indices against a list of `len` elements.
fn range_bounds(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    let start = (if start < 0 { len + start } else { start }).max(0);
    let stop = (if stop < 0 { len + stop } else { stop }).min(len - 1);
    if start > stop || start >= len {
        return None;
    }
    Some((usize::try_from(start).ok()?, usize::try_from(stop).ok()?))
}

/// Process-local list store.
///
/// All lists live behind one mutex that is only held for the duration of a
/// single primitive. Blocked poppers are woken through a [`Notify`] on every
/// push.
pub struct InMemoryListStore {
    lists: Mutex<HashMap<String, VecDeque<String>>>,
    pushed: Notify,
}

impl InMemoryListStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            lists: Mutex::new(HashMap::new()),
            pushed: Notify::new(),
        }
    }

    fn push_back(&self, key: &str, value: String) -> usize {
        let len = {
            let mut lists = self.lists.lock();
            let list = lists.entry(key.to_string()).or_default();
            list.push_back(value);
            list.len()
        };
        self.pushed.notify_waiters();
        len
    }

    fn push_front(&self, key: &str, value: String) -> usize {
        let len = {
            let mut lists = self.lists.lock();
            let list = lists.entry(key.to_string()).or_default();
            list.push_front(value);
            list.len()
        };
        self.pushed.notify_waiters();
        len
    }

    fn pop_front(&self, key: &str) -> Option<String> {
        let mut lists = self.lists.lock();
        let list = lists.get_mut(key)?;
        let value = list.pop_front();
        if list.is_empty() {
            lists.remove(key);
        }
        value
    }

}

impl Default for InMemoryListStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ListStore for InMemoryListStore {
    async fn ping(&self) -> EceResult<()> {
        Ok(())
    }

    async fn rpush(&self, key: &str, value: String) -> EceResult<usize> {
        Ok(self.push_back(key, value))
    }

    async fn lpush(&self, key: &str, value: String) -> EceResult<usize> {
        Ok(self.push_front(key, value))
    }

    async fn lpop(&self, key: &str) -> EceResult<Option<String>> {
        Ok(self.pop_front(key))
    }

    async fn blpop(&self, key: &str, shutdown: &CancellationToken) -> EceResult<Option<String>> {
        loop {
            if shutdown.is_cancelled() {
                return Ok(None);
            }

            // Register interest before checking the list so a push landing
            // between the check and the await is not missed.
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.pop_front(key) {
                return Ok(Some(value));
            }

            tokio::select! {
                _ = shutdown.cancelled() => return Ok(None),
                _ = &mut notified => {}
            }
        }
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> EceResult<Vec<String>> {
        let lists = self.lists.lock();
        let Some(list) = lists.get(key) else {
            return Ok(Vec::new());
        };
        Ok(match range_bounds(list.len(), start, stop) {
            Some((from, to)) => list.range(from..=to).cloned().collect(),
            None => Vec::new(),
        })
    }

    async fn llen(&self, key: &str) -> EceResult<usize> {
        Ok(self.lists.lock().get(key).map_or(0, VecDeque::len))
    }

    async fn delete(&self, key: &str) -> EceResult<bool> {
        Ok(self.lists.lock().remove(key).is_some())
    }
}

/// File-backed list store shared by every process opened on the same directory.
///
/// Each list is persisted as `<dir>/<key>.jsonl`, one JSON string per line,
/// head first. Nothing is cached: every primitive re-reads the list under the
/// directory lock, so pushes from another process are visible to the next
/// call. Blocked pops poll the file every `poll_interval` and are woken at
/// once by pushes made through the same handle.
pub struct FileListStore {
    dir: PathBuf,
    poll_interval: Duration,
    pushed: Notify,
}

impl FileListStore {
    /// Open (or create) a store rooted at `dir`, validating every persisted list.
    pub async fn open(dir: impl Into<PathBuf>) -> EceResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            EceError::Store(format!("Failed to create store dir {}: {e}", dir.display()))
        })?;

        let store = Self {
            dir,
            poll_interval: DEFAULT_POLL_INTERVAL,
            pushed: Notify::new(),
        };

        let _lock = store.lock().await?;
        let mut entries = tokio::fs::read_dir(&store.dir)
            .await
            .map_err(|e| EceError::Store(format!("Failed to read store dir: {e}")))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| EceError::Store(format!("Failed to read store dir: {e}")))?
        {
            let path = entry.path();
            let Some(stem) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".jsonl"))
            else {
                continue;
            };
            let Some(key) = decode_key(stem) else {
                warn!(file = %path.display(), "Skipping list file with undecodable name");
                continue;
            };

            let values = read_list_file(&path).await?;
            debug!(key = %key, len = values.len(), "Found persisted list");
        }

        Ok(store)
    }

    /// How often a blocked pop re-checks the file for pushes from other processes.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn list_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", encode_key(key)))
    }

    async fn lock(&self) -> EceResult<StoreLock> {
        StoreLock::acquire(&self.dir.join(STORE_LOCK_FILE)).await
    }

    /// Current contents of `key`. Callers hold the store lock.
    async fn read_list(&self, key: &str) -> EceResult<VecDeque<String>> {
        let path = self.list_path(key);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(VecDeque::new());
        }
        read_list_file(&path).await
    }

    /// Replace the file of `key` with `values`. Callers hold the store lock.
    async fn write_list(&self, key: &str, values: &VecDeque<String>) -> EceResult<()> {
        let path = self.list_path(key);
        if values.is_empty() {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| EceError::Store(format!("Failed to remove list file: {e}")))?;
            }
            return Ok(());
        }

        let mut data = String::new();
        for value in values {
            data.push_str(&serde_json::to_string(value)?);
            data.push('\n');
        }
        let tmp = path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp, data.as_bytes())
            .await
            .map_err(|e| EceError::Store(format!("Failed to write list file: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| EceError::Store(format!("Failed to replace list file: {e}")))
    }

    async fn append_to_file(&self, key: &str, value: &str) -> EceResult<()> {
        use tokio::io::AsyncWriteExt;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.list_path(key))
            .await
            .map_err(|e| EceError::Store(format!("Failed to open list file: {e}")))?;
        let mut line = serde_json::to_string(value)?;
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| EceError::Store(format!("Failed to append to list file: {e}")))?;
        file.flush()
            .await
            .map_err(|e| EceError::Store(format!("Failed to append to list file: {e}")))
    }
}

#[async_trait]
impl ListStore for FileListStore {
    async fn ping(&self) -> EceResult<()> {
        tokio::fs::metadata(&self.dir).await.map_err(|e| {
            EceError::Store(format!("Store dir {} unavailable: {e}", self.dir.display()))
        })?;
        Ok(())
    }

    async fn rpush(&self, key: &str, value: String) -> EceResult<usize> {
        let len = {
            let _lock = self.lock().await?;
            let len = self.read_list(key).await?.len();
            self.append_to_file(key, &value).await?;
            len + 1
        };
        self.pushed.notify_waiters();
        Ok(len)
    }

    async fn lpush(&self, key: &str, value: String) -> EceResult<usize> {
        let len = {
            let _lock = self.lock().await?;
            let mut values = self.read_list(key).await?;
            values.push_front(value);
            self.write_list(key, &values).await?;
            values.len()
        };
        self.pushed.notify_waiters();
        Ok(len)
    }

    async fn lpop(&self, key: &str) -> EceResult<Option<String>> {
        let _lock = self.lock().await?;
        let mut values = self.read_list(key).await?;
        let value = values.pop_front();
        if value.is_some() {
            self.write_list(key, &values).await?;
        }
        Ok(value)
    }

    async fn blpop(&self, key: &str, shutdown: &CancellationToken) -> EceResult<Option<String>> {
        loop {
            if shutdown.is_cancelled() {
                return Ok(None);
            }

            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.lpop(key).await? {
                return Ok(Some(value));
            }

            tokio::select! {
                _ = shutdown.cancelled() => return Ok(None),
                _ = &mut notified => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> EceResult<Vec<String>> {
        let _lock = self.lock().await?;
        let values = self.read_list(key).await?;
        Ok(match range_bounds(values.len(), start, stop) {
            Some((from, to)) => values.range(from..=to).cloned().collect(),
            None => Vec::new(),
        })
    }

    async fn llen(&self, key: &str) -> EceResult<usize> {
        let _lock = self.lock().await?;
        Ok(self.read_list(key).await?.len())
    }

    async fn delete(&self, key: &str) -> EceResult<bool> {
        let _lock = self.lock().await?;
        let existed = !self.read_list(key).await?.is_empty();
        self.write_list(key, &VecDeque::new()).await?;
        Ok(existed)
    }
}

/// Cross-process mutual exclusion over one store directory.
///
/// Held by creating the lock file exclusively; released by removing it on
/// drop. A lock file older than [`STALE_LOCK_AFTER`] belongs to a process that
/// died mid-operation and is taken over.
struct StoreLock {
    path: PathBuf,
}

impl StoreLock {
    async fn acquire(path: &Path) -> EceResult<Self> {
        loop {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .await
            {
                Ok(_) => return Ok(Self { path: path.to_path_buf() }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if lock_is_stale(path).await {
                        warn!(path = %path.display(), "Removing stale store lock");
                        let _ = tokio::fs::remove_file(path).await;
                        continue;
                    }
                    tokio::time::sleep(LOCK_RETRY).await;
                }
                Err(e) => {
                    return Err(EceError::Store(format!(
                        "Failed to lock store {}: {e}",
                        path.display()
                    )))
                }
            }
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to release store lock");
        }
    }
}

async fn lock_is_stale(path: &Path) -> bool {
    let Ok(meta) = tokio::fs::metadata(path).await else {
        return false;
    };
    meta.modified()
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK_AFTER)
}

async fn read_list_file(path: &Path) -> EceResult<VecDeque<String>> {
    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| EceError::Store(format!("Failed to read {}: {e}", path.display())))?;
    let mut values = VecDeque::new();
    for line in data.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let value: String = serde_json::from_str(line).map_err(|e| {
            EceError::Store(format!("Invalid JSONL entry in {}: {e}", path.display()))
        })?;
        values.push_back(value);
    }
    Ok(values)
}

/// Percent-encodes every byte outside `[A-Za-z0-9_-]` so any key maps to a
/// safe, reversible file name.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    out
}

fn decode_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_range_bounds() {
        assert_eq!(range_bounds(3, -1, -1), Some((2, 2)));
        assert_eq!(range_bounds(3, -5, -1), Some((0, 2)));
        assert_eq!(range_bounds(3, 0, 10), Some((0, 2)));
        assert_eq!(range_bounds(3, 2, 1), None);
        assert_eq!(range_bounds(0, -1, -1), None);
        assert_eq!(range_bounds(3, 3, 5), None);
    }

    #[test]
    fn test_key_encoding_roundtrip() {
        for key in ["blackboard_stream", "scout tasks", "a/b:c", "ünïcode", ""] {
            let encoded = encode_key(key);
            assert!(!encoded.contains('/'));
            assert_eq!(decode_key(&encoded).as_deref(), Some(key));
        }
        assert_eq!(decode_key("bad%Z"), None);
    }

    #[tokio::test]
    async fn test_push_pop_fifo() {
        let store = InMemoryListStore::new();
        store.rpush("q", "a".into()).await.unwrap();
        store.rpush("q", "b".into()).await.unwrap();
        assert_eq!(store.lpush("q", "z".into()).await.unwrap(), 3);

        assert_eq!(store.lpop("q").await.unwrap().as_deref(), Some("z"));
        assert_eq!(store.lpop("q").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.lpop("q").await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.lpop("q").await.unwrap(), None);
        assert_eq!(store.llen("q").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lrange_tail() {
        let store = InMemoryListStore::new();
        for v in ["1", "2", "3", "4"] {
            store.rpush("log", v.into()).await.unwrap();
        }
        assert_eq!(store.lrange("log", -2, -1).await.unwrap(), vec!["3", "4"]);
        assert_eq!(store.lrange("log", 0, -1).await.unwrap().len(), 4);
        assert!(store.lrange("missing", 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blpop_wakes_on_push() {
        let store = Arc::new(InMemoryListStore::new());
        let shutdown = CancellationToken::new();

        let waiter = {
            let store = store.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { store.blpop("q", &shutdown).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        store.rpush("q", "task".into()).await.unwrap();
        let value = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(value.as_deref(), Some("task"));
    }

    #[tokio::test]
    async fn test_blpop_cancel_does_not_consume() {
        let store = InMemoryListStore::new();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        store.rpush("q", "kept".into()).await.unwrap();
        assert_eq!(store.blpop("q", &shutdown).await.unwrap(), None);
        assert_eq!(store.llen("q").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileListStore::open(dir.path()).await.unwrap();
            store.rpush("scout tasks", "one".into()).await.unwrap();
            store.rpush("scout tasks", "two\nlines".into()).await.unwrap();
            store.rpush("log", "entry".into()).await.unwrap();
            assert_eq!(store.lpop("scout tasks").await.unwrap().as_deref(), Some("one"));
        }

        let store = FileListStore::open(dir.path()).await.unwrap();
        assert_eq!(
            store.lrange("scout tasks", 0, -1).await.unwrap(),
            vec!["two\nlines"]
        );
        assert_eq!(store.llen("log").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_file_store_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileListStore::open(dir.path()).await.unwrap();
        store.rpush("log", "entry".into()).await.unwrap();
        assert!(dir.path().join("log.jsonl").exists());

        assert!(store.delete("log").await.unwrap());
        assert!(!dir.path().join("log.jsonl").exists());
        assert!(!store.delete("log").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_store_handles_share_one_directory() {
        let dir = tempfile::tempdir().unwrap();
        let a = FileListStore::open(dir.path()).await.unwrap();
        let b = FileListStore::open(dir.path()).await.unwrap();

        a.rpush("q", "t1".into()).await.unwrap();
        assert_eq!(b.rpush("q", "t2".into()).await.unwrap(), 2);
        assert_eq!(a.lpop("q").await.unwrap().as_deref(), Some("t1"));
        assert_eq!(b.lrange("q", 0, -1).await.unwrap(), vec!["t2"]);
        assert!(!dir.path().join(STORE_LOCK_FILE).exists());
    }

    #[tokio::test]
    async fn test_file_store_blpop_polls_other_handle() {
        let dir = tempfile::tempdir().unwrap();
        let a = Arc::new(
            FileListStore::open(dir.path())
                .await
                .unwrap()
                .with_poll_interval(Duration::from_millis(10)),
        );
        let b = FileListStore::open(dir.path()).await.unwrap();
        let shutdown = CancellationToken::new();

        let waiter = {
            let a = a.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { a.blpop("q", &shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        b.rpush("q", "remote".into()).await.unwrap();

        let value = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(value.as_deref(), Some("remote"));
        assert_eq!(b.llen("q").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stale_store_lock_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileListStore::open(dir.path()).await.unwrap();
        let lock_path = dir.path().join(STORE_LOCK_FILE);
        std::fs::write(&lock_path, "").unwrap();
        let old = SystemTime::now() - STALE_LOCK_AFTER - Duration::from_secs(5);
        std::fs::File::options()
            .write(true)
            .open(&lock_path)
            .unwrap()
            .set_modified(old)
            .unwrap();

        let pushed = tokio::time::timeout(Duration::from_secs(1), store.rpush("q", "x".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pushed, 1);
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("log.jsonl"), "not json\n").unwrap();
        let result = FileListStore::open(dir.path()).await;
        assert!(matches!(result, Err(EceError::Store(_))));
    }
}
