//! In-memory store with an operation log and failure injection, for tests.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use eyre::bail;
use parking_lot::Mutex;

use super::{KvStore, Put};

/// An operation performed against a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Get(String),
    Put(String),
    Commit(Vec<String>),
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, Vec<u8>>,
    ops: Vec<Op>,
    fail_reads: bool,
    fail_writes: bool,
    fail_commits: bool,
}

/// [`KvStore`] kept in process memory.
///
/// Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` without recording an operation.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.inner.lock().entries.insert(key.into(), value.into());
    }

    /// Current value of `key`, without recording an operation.
    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().entries.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().entries.keys().cloned().collect()
    }

    /// Operations performed so far, oldest first.
    pub fn ops(&self) -> Vec<Op> {
        self.inner.lock().ops.clone()
    }

    /// Keys written so far by `put` or `commit`, in order.
    pub fn written_keys(&self) -> Vec<String> {
        self.inner
            .lock()
            .ops
            .iter()
            .flat_map(|op| match op {
                Op::Get(_) => Vec::new(),
                Op::Put(key) => vec![key.clone()],
                Op::Commit(keys) => keys.clone(),
            })
            .collect()
    }

    pub fn clear_ops(&self) {
        self.inner.lock().ops.clear();
    }

    pub fn fail_reads(&self, fail: bool) {
        self.inner.lock().fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// Makes every following [`KvStore::commit`] fail without applying anything.
    pub fn fail_commits(&self, fail: bool) {
        self.inner.lock().fail_commits = fail;
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> eyre::Result<Option<Vec<u8>>> {
        let mut inner = self.inner.lock();

        if inner.fail_reads {
            bail!("read of {key} failed");
        }

        inner.ops.push(Op::Get(key.to_owned()));
        Ok(inner.entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> eyre::Result<()> {
        let mut inner = self.inner.lock();

        if inner.fail_writes {
            bail!("write of {key} failed");
        }

        inner.ops.push(Op::Put(key.to_owned()));
        inner.entries.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn commit(&self, puts: Vec<Put>) -> eyre::Result<()> {
        let mut inner = self.inner.lock();

        if inner.fail_commits {
            bail!("transaction rejected");
        }

        inner
            .ops
            .push(Op::Commit(puts.iter().map(|put| put.key.clone()).collect()));

        // single lock scope: readers see all of the writes or none
        for put in puts {
            inner.entries.insert(put.key, put.value);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_put_round_trip() {
        let store = MemoryStore::new();

        assert_eq!(store.get("/a").await.unwrap(), None);
        store.put("/a", b"1").await.unwrap();
        assert_eq!(store.get("/a").await.unwrap().as_deref(), Some(&b"1"[..]));

        assert_eq!(
            store.ops(),
            [
                Op::Get("/a".to_owned()),
                Op::Put("/a".to_owned()),
                Op::Get("/a".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn commit_writes_all_keys() {
        let store = MemoryStore::new();

        store
            .commit(vec![Put::new("/a", "1"), Put::new("/b", "2")])
            .await
            .unwrap();

        assert_eq!(store.value("/a").unwrap(), b"1");
        assert_eq!(store.value("/b").unwrap(), b"2");
        assert_eq!(store.written_keys(), ["/a", "/b"]);
    }

    #[tokio::test]
    async fn failed_commit_writes_nothing() {
        let store = MemoryStore::new();
        store.insert("/a", "old");
        store.fail_commits(true);

        let err = store
            .commit(vec![Put::new("/a", "new"), Put::new("/b", "new")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rejected"), "{err}");

        assert_eq!(store.value("/a").unwrap(), b"old");
        assert_eq!(store.value("/b"), None);
        assert!(store.written_keys().is_empty());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = MemoryStore::new();
        let handle = store.clone();

        store.put("/a", b"1").await.unwrap();
        assert_eq!(handle.keys(), ["/a"]);
    }
}
