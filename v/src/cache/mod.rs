//! 缓存抽象与进程内实现 / Cache abstraction and an in-process implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("缓存不可用: {0}")]
    Unavailable(String),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// 键值缓存；`ttl` 为 `Duration::ZERO` 表示永不过期
/// Key-value cache; a `ttl` of `Duration::ZERO` never expires
#[async_trait]
pub trait Cache: Send + Sync {
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> CacheResult<()>;
    async fn get(&self, key: &str) -> CacheResult<Option<Value>>;
    async fn remove(&self, key: &str) -> CacheResult<()>;
}

/// 进程内缓存 / in-process cache
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (Option<Instant>, Value)>>,
    writes: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `set` 调用次数 / number of `set` calls so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> CacheResult<()> {
        let expires = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        self.entries
            .write()
            .await
            .insert(key.to_string(), (expires, value));
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).and_then(|(expires, v)| match expires {
            Some(at) if *at <= Instant::now() => None,
            _ => Some(v.clone()),
        }))
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
