//! 进行中请求的共享缓存
//!
//! 同一时刻只存在一个获取操作，并发调用者共享同一个 Future；
//! 成功结果一直缓存到被显式失效，失败时清空缓存以便下次重新获取。

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::translation::error::TranslationResult;

type SharedResult<T> = Shared<BoxFuture<'static, TranslationResult<Arc<T>>>>;

/// 缓存统计信息
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub fetches: u64,
    pub shared_hits: u64,
    pub invalidations: u64,
}

/// 共享的进行中获取
pub struct SharedFetch<T> {
    slot: Mutex<Option<(u64, SharedResult<T>)>>,
    generation: AtomicU64,
    stats: Mutex<CacheStats>,
}

impl<T> SharedFetch<T>
where
    T: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            generation: AtomicU64::new(0),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// 返回缓存的结果，没有缓存时通过 `fetch` 获取
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> TranslationResult<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TranslationResult<T>> + Send + 'static,
    {
        let (generation, future) = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some((generation, future)) => {
                    stats.shared_hits += 1;
                    (*generation, future.clone())
                }
                None => {
                    stats.fetches += 1;
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                    let future = fetch().map(|result| result.map(Arc::new)).boxed().shared();
                    *slot = Some((generation, future.clone()));
                    (generation, future)
                }
            }
        };

        let result = future.await;

        if result.is_err() {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            if matches!(slot.as_ref(), Some((current, _)) if *current == generation) {
                *slot = None;
            }
        }

        result
    }

    /// 失效缓存，下次调用重新获取
    pub fn invalidate(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.take().is_some() {
            self.stats
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .invalidations += 1;
        }
    }

    /// 是否存在缓存（包括进行中的获取）
    pub fn is_cached(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn get_stats(&self) -> CacheStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T> Default for SharedFetch<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::error::TranslationError;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let cache: SharedFetch<String> = SharedFetch::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                Ok("records".to_string())
            }
        };

        let (a, b) = tokio::join!(
            cache.get_or_fetch(fetch(Arc::clone(&calls))),
            cache.get_or_fetch(fetch(Arc::clone(&calls)))
        );

        assert_eq!(*a.unwrap(), "records");
        assert_eq!(*b.unwrap(), "records");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get_stats().shared_hits, 1);
    }

    #[tokio::test]
    async fn test_failure_clears_memo() {
        let cache: SharedFetch<u32> = SharedFetch::new();

        let failed = cache
            .get_or_fetch(|| async { Err(TranslationError::CollectionError("离线".into())) })
            .await;
        assert!(failed.is_err());
        assert!(!cache.is_cached());

        let value = cache.get_or_fetch(|| async { Ok(7) }).await.unwrap();
        assert_eq!(*value, 7);
        assert!(cache.is_cached());
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache: SharedFetch<u32> = SharedFetch::new();
        assert_eq!(*cache.get_or_fetch(|| async { Ok(1) }).await.unwrap(), 1);
        assert_eq!(*cache.get_or_fetch(|| async { Ok(2) }).await.unwrap(), 1);

        cache.invalidate();
        cache.invalidate();
        assert_eq!(*cache.get_or_fetch(|| async { Ok(3) }).await.unwrap(), 3);
        assert_eq!(cache.get_stats().invalidations, 1);
    }
}
