//! Key-value store holding accounts, certificates and keys.

use async_trait::async_trait;

mod etcd;
#[cfg(test)]
mod memory;

pub use self::etcd::{EtcdOptions, EtcdStore};
#[cfg(test)]
pub(crate) use self::memory::{MemoryStore, Op};

/// A single key write, part of a [`KvStore::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Put {
    pub key: String,
    pub value: Vec<u8>,
}

impl Put {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Put {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Distributed key-value store addressed by hierarchical string keys.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Reads `key`, returning `None` when it does not exist.
    async fn get(&self, key: &str) -> eyre::Result<Option<Vec<u8>>>;

    /// Writes a single key.
    async fn put(&self, key: &str, value: &[u8]) -> eyre::Result<()>;

    /// Applies all `puts` in one transaction.
    ///
    /// Either every write becomes visible or none does.
    async fn commit(&self, puts: Vec<Put>) -> eyre::Result<()>;
}
