//! 远程记录同步处理
//!
//! 收到集合同步事件后先无条件失效记录与语言对缓存，再交给记录目录处理附件。
//! 不触碰任何会话状态，进行中的翻译继续使用已获取的文件。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::catalog::{CollectionKind, RecordCatalog, SyncEvent, SyncReport};
use crate::translation::languages::pairs::LanguagePairResolver;

/// 同步事件协调器
pub struct RemoteRecordSyncHandler {
    catalog: Arc<RecordCatalog>,
    pairs: Arc<LanguagePairResolver>,
}

impl RemoteRecordSyncHandler {
    pub fn new(catalog: Arc<RecordCatalog>, pairs: Arc<LanguagePairResolver>) -> Self {
        Self { catalog, pairs }
    }

    /// 处理一次同步事件
    ///
    /// 缓存在任何附件操作之前失效，附件下载期间的查询已能看到新记录。
    pub async fn on_sync(&self, kind: CollectionKind, event: &SyncEvent) -> SyncReport {
        self.catalog.invalidate(kind);
        self.pairs.invalidate();
        let report = self.catalog.apply_sync(kind, event).await;
        tracing::debug!(
            "{:?} 同步完成: 删除 {} 个附件, 替换 {} 个附件",
            kind,
            report.deleted_attachments,
            report.replaced_attachments
        );
        report
    }

    /// 持续消费某个集合的同步事件，通道关闭时结束
    pub fn listen(
        self: Arc<Self>,
        kind: CollectionKind,
        mut events: mpsc::UnboundedReceiver<SyncEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.on_sync(kind, &event).await;
            }
            tracing::debug!("{:?} 同步通道已关闭", kind);
        })
    }
}
