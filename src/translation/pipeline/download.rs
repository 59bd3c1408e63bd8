//! 下载管理器
//!
//! 有界并发、带重试的通用任务执行器。固定数量的工作者从共享队列中取任务，
//! 任一工作者空闲即可开始下一个任务。失败的任务追加到队列末尾，
//! 因此重试总是排在所有已入队任务之后。

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::future::{join_all, BoxFuture, FutureExt};
use rand::Rng;

use crate::translation::config::TranslationsConfig;
use crate::translation::error::{TranslationError, TranslationResult};

type DownloadFn<T> = Box<dyn Fn() -> BoxFuture<'static, TranslationResult<T>> + Send + Sync>;
type SuccessFn<T> = Box<dyn FnOnce(T) + Send>;
type FailureFn = Box<dyn FnOnce(TranslationError) + Send>;

/// 队列中的一项下载任务
pub struct QueueItem<T> {
    label: String,
    download: DownloadFn<T>,
    on_success: Option<SuccessFn<T>>,
    on_failure: Option<FailureFn>,
    retries_left: Option<usize>,
}

impl<T> QueueItem<T> {
    pub fn new<F, Fut>(label: impl Into<String>, download: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TranslationResult<T>> + Send + 'static,
    {
        Self {
            label: label.into(),
            download: Box::new(move || download().boxed()),
            on_success: None,
            on_failure: None,
            retries_left: None,
        }
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_failure<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(TranslationError) + Send + 'static,
    {
        self.on_failure = Some(Box::new(callback));
        self
    }

    /// 覆盖管理器默认的重试次数
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries_left = Some(retries);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// 单次运行的统计
#[derive(Debug, Default)]
pub struct DownloadStats {
    pub attempts: AtomicUsize,
    pub succeeded: AtomicUsize,
    pub retried: AtomicUsize,
    pub failed: AtomicUsize,
}

/// 有界并发下载管理器
#[derive(Debug, Clone)]
pub struct DownloadManager {
    max_concurrent: usize,
    max_retries: usize,
    chaos_delay: Option<Duration>,
}

impl DownloadManager {
    pub fn new(max_concurrent: usize, max_retries: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            max_retries,
            chaos_delay: None,
        }
    }

    pub fn from_config(config: &TranslationsConfig) -> Self {
        let manager = Self::new(config.max_concurrent_downloads, config.max_download_retries);
        if config.chaos_mode {
            manager.with_chaos(config.chaos_max_delay())
        } else {
            manager
        }
    }

    /// 启用混沌模式：随机延迟并以一半的概率失败
    pub fn with_chaos(mut self, max_delay: Duration) -> Self {
        self.chaos_delay = Some(max_delay);
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// 执行队列中的全部任务
    ///
    /// 有任务耗尽重试时返回 `PartialFailureError`，其余任务仍会执行完。
    pub async fn run<T>(&self, items: Vec<QueueItem<T>>) -> TranslationResult<()>
    where
        T: Send + 'static,
    {
        if items.is_empty() {
            return Ok(());
        }

        let total = items.len();
        let queue: Mutex<VecDeque<QueueItem<T>>> = Mutex::new(
            items
                .into_iter()
                .map(|mut item| {
                    item.retries_left.get_or_insert(self.max_retries);
                    item
                })
                .collect(),
        );
        let stats = DownloadStats::default();

        let workers = self.max_concurrent.min(total);
        tracing::debug!("开始下载 {} 项，并发数 {}", total, workers);
        join_all((0..workers).map(|worker| self.worker(worker, &queue, &stats))).await;

        let failed = stats.failed.load(Ordering::Relaxed);
        tracing::info!(
            "下载完成: 成功 {}, 失败 {}, 重试 {}, 尝试 {}",
            stats.succeeded.load(Ordering::Relaxed),
            failed,
            stats.retried.load(Ordering::Relaxed),
            stats.attempts.load(Ordering::Relaxed)
        );

        if failed > 0 {
            Err(TranslationError::PartialFailureError { failed })
        } else {
            Ok(())
        }
    }

    async fn worker<T>(
        &self,
        worker: usize,
        queue: &Mutex<VecDeque<QueueItem<T>>>,
        stats: &DownloadStats,
    ) where
        T: Send + 'static,
    {
        // 队列为空时工作者立即退出。失败的任务由同一个工作者放回队尾，
        // 因此其他工作者即使已经退出，重试也一定会被执行。
        loop {
            let next = queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some(mut item) = next else {
                break;
            };

            stats.attempts.fetch_add(1, Ordering::Relaxed);
            let download = (item.download)();
            match self.attempt(item.label(), download).await {
                Ok(value) => {
                    stats.succeeded.fetch_add(1, Ordering::Relaxed);
                    if let Some(callback) = item.on_success.take() {
                        callback(value);
                    }
                }
                Err(e) => {
                    let retries_left = item.retries_left.unwrap_or(0);
                    if retries_left > 0 {
                        tracing::warn!(
                            "工作者 {} 下载 {} 失败，剩余重试 {}: {}",
                            worker,
                            item.label(),
                            retries_left,
                            e
                        );
                        item.retries_left = Some(retries_left - 1);
                        stats.retried.fetch_add(1, Ordering::Relaxed);
                        queue
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push_back(item);
                    } else {
                        tracing::error!("下载 {} 失败，重试已耗尽: {}", item.label(), e);
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        if let Some(callback) = item.on_failure.take() {
                            callback(e);
                        }
                    }
                }
            }
        }
    }

    async fn attempt<T>(
        &self,
        label: &str,
        download: BoxFuture<'static, TranslationResult<T>>,
    ) -> TranslationResult<T> {
        if let Some(max_delay) = self.chaos_delay {
            let (delay, fail) = {
                let mut rng = rand::thread_rng();
                let max_ms = max_delay.as_millis() as u64;
                (rng.gen_range(0..=max_ms), rng.gen_bool(0.5))
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if fail {
                return Err(TranslationError::AttachmentDownloadError(format!(
                    "混沌模式: {} 的下载被随机拒绝",
                    label
                )));
            }
        }

        download.await
    }
}

impl Default for DownloadManager {
    fn default() -> Self {
        Self::from_config(&TranslationsConfig::default())
    }
}
