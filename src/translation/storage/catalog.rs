//! 记录目录
//!
//! 从模型集合与 WASM 集合延迟获取全部记录，按版本策略为每个查找键选择
//! 最新的兼容记录，并校验中转可达性。结果在内存中缓存，任何同步事件
//! 或获取失败都会使整个缓存失效。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::cache::SharedFetch;
use super::collection::RecordCollection;
use super::records::{AssetRecord, LanguagePair};
use super::version::select_best;
use crate::translation::config::TranslationsConfig;
use crate::translation::error::{TranslationError, TranslationResult};

/// 按记录 id 索引的模型记录
pub type RecordMap = BTreeMap<String, AssetRecord>;

/// 因缺少中转语言腿而被丢弃的语言对
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotGap {
    pub pair: LanguagePair,
    pub missing: LanguagePair,
}

/// 一次获取得到的模型记录
#[derive(Debug, Clone, Default)]
pub struct ModelRecords {
    pub records: RecordMap,
    pub pivot_gaps: Vec<PivotGap>,
}

impl ModelRecords {
    /// 某个语言对的全部记录
    pub fn records_for_pair(&self, pair: &LanguagePair) -> Vec<&AssetRecord> {
        self.records
            .values()
            .filter(|record| record.pair() == Some(pair))
            .collect()
    }

    /// 记录中出现的全部语言对
    pub fn pairs(&self) -> BTreeSet<LanguagePair> {
        self.records
            .values()
            .filter_map(|record| record.pair().cloned())
            .collect()
    }

    pub fn has_pair(&self, pair: &LanguagePair) -> bool {
        self.records.values().any(|record| record.pair() == Some(pair))
    }
}

/// 集合种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Models,
    Wasm,
}

/// 一条记录的更新
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    pub old: AssetRecord,
    pub new: AssetRecord,
}

/// 集合同步事件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncEvent {
    pub created: Vec<AssetRecord>,
    pub updated: Vec<RecordUpdate>,
    pub deleted: Vec<AssetRecord>,
}

impl SyncEvent {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// 同步后附件的处理结果
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub deleted_attachments: usize,
    pub replaced_attachments: usize,
    pub failures: Vec<(String, TranslationError)>,
}

/// 记录目录
pub struct RecordCatalog {
    models: Arc<dyn RecordCollection>,
    wasm: Arc<dyn RecordCollection>,
    config: Arc<TranslationsConfig>,
    model_records: SharedFetch<ModelRecords>,
    wasm_record: SharedFetch<AssetRecord>,
}

impl RecordCatalog {
    pub fn new(
        models: Arc<dyn RecordCollection>,
        wasm: Arc<dyn RecordCollection>,
        config: Arc<TranslationsConfig>,
    ) -> Self {
        Self {
            models,
            wasm,
            config,
            model_records: SharedFetch::new(),
            wasm_record: SharedFetch::new(),
        }
    }

    pub fn collection(&self, kind: CollectionKind) -> Arc<dyn RecordCollection> {
        match kind {
            CollectionKind::Models => Arc::clone(&self.models),
            CollectionKind::Wasm => Arc::clone(&self.wasm),
        }
    }

    /// 获取全部可用模型记录
    pub async fn get_model_records(&self) -> TranslationResult<Arc<ModelRecords>> {
        let collection = Arc::clone(&self.models);
        let config = Arc::clone(&self.config);
        self.model_records
            .get_or_fetch(move || Self::fetch_model_records(collection, config))
            .await
    }

    /// 获取最新的兼容 WASM 记录
    pub async fn get_wasm_record(&self) -> TranslationResult<Arc<AssetRecord>> {
        let collection = Arc::clone(&self.wasm);
        let config = Arc::clone(&self.config);
        self.wasm_record
            .get_or_fetch(move || Self::fetch_wasm_record(collection, config))
            .await
    }

    async fn fetch_model_records(
        collection: Arc<dyn RecordCollection>,
        config: Arc<TranslationsConfig>,
    ) -> TranslationResult<ModelRecords> {
        tracing::info!("从集合 {} 获取模型记录", collection.name());
        let all = collection.records().await?;
        let candidates: Vec<AssetRecord> = all.into_iter().filter(|record| !record.is_wasm()).collect();

        let selected = select_best(
            &candidates,
            config.min_major_version,
            config.max_major_version,
            |record| record.model_lookup_key(),
        )?;

        let mut records: RecordMap = selected
            .into_values()
            .map(|record| (record.id.clone(), record))
            .collect();

        let pivot_gaps = if config.validate_pivots {
            let gaps = find_pivot_gaps(&records, &config.pivot_language);
            let dropped: BTreeSet<&LanguagePair> = gaps.iter().map(|gap| &gap.pair).collect();
            for gap in &gaps {
                tracing::warn!("语言对 {} 缺少中转记录 {}，已从可用集合中移除", gap.pair, gap.missing);
            }
            records.retain(|_, record| record.pair().map_or(true, |pair| !dropped.contains(pair)));
            gaps
        } else {
            Vec::new()
        };

        tracing::info!("可用模型记录 {} 条", records.len());
        Ok(ModelRecords { records, pivot_gaps })
    }

    async fn fetch_wasm_record(
        collection: Arc<dyn RecordCollection>,
        config: Arc<TranslationsConfig>,
    ) -> TranslationResult<AssetRecord> {
        tracing::info!("从集合 {} 获取 WASM 记录", collection.name());
        let candidates: Vec<AssetRecord> = collection
            .records()
            .await?
            .into_iter()
            .filter(|record| record.is_wasm() && record.name == config.wasm_record_name)
            .collect();

        let mut selected = select_best(
            &candidates,
            config.min_major_version,
            config.max_major_version,
            |record| record.name.clone(),
        )?;

        selected.remove(&config.wasm_record_name).ok_or_else(|| {
            TranslationError::CollectionError(format!(
                "集合 {} 中没有兼容的 {} 记录",
                collection.name(),
                config.wasm_record_name
            ))
        })
    }

    /// 失效某个集合的缓存
    pub fn invalidate(&self, kind: CollectionKind) {
        match kind {
            CollectionKind::Models => self.model_records.invalidate(),
            CollectionKind::Wasm => self.wasm_record.invalidate(),
        }
    }

    pub fn invalidate_all(&self) {
        self.model_records.invalidate();
        self.wasm_record.invalidate();
    }

    pub fn is_cached(&self, kind: CollectionKind) -> bool {
        match kind {
            CollectionKind::Models => self.model_records.is_cached(),
            CollectionKind::Wasm => self.wasm_record.is_cached(),
        }
    }

    /// 处理同步事件：失效缓存并调整已下载的附件
    ///
    /// 单条附件的失败只记录，不向调用者传播。
    pub async fn apply_sync(&self, kind: CollectionKind, event: &SyncEvent) -> SyncReport {
        self.invalidate(kind);

        let collection = self.collection(kind);
        let mut report = SyncReport::default();

        tracing::info!(
            "集合 {} 同步: 新增 {}, 更新 {}, 删除 {}",
            collection.name(),
            event.created.len(),
            event.updated.len(),
            event.deleted.len()
        );

        for record in &event.deleted {
            match collection.is_downloaded(record).await {
                Ok(true) => match collection.delete_downloaded(record).await {
                    Ok(()) => report.deleted_attachments += 1,
                    Err(e) => {
                        tracing::warn!("删除附件 {} 失败: {}", record.name, e);
                    }
                },
                Ok(false) => {}
                Err(e) => tracing::warn!("检查附件 {} 失败: {}", record.name, e),
            }
        }

        for update in &event.updated {
            match Self::replace_attachment(collection.as_ref(), update).await {
                Ok(true) => report.replaced_attachments += 1,
                Ok(false) => {}
                Err(e) => report.failures.push((update.new.id.clone(), e)),
            }
        }

        if !report.failures.is_empty() {
            tracing::warn!(
                "集合 {} 同步后有 {} 个附件未能替换",
                collection.name(),
                report.failures.len()
            );
        }

        report
    }

    /// 旧附件已下载时，先删除旧附件再下载新附件
    async fn replace_attachment(
        collection: &dyn RecordCollection,
        update: &RecordUpdate,
    ) -> TranslationResult<bool> {
        if !collection.is_downloaded(&update.old).await? {
            return Ok(false);
        }

        collection.delete_downloaded(&update.old).await?;
        collection.download(&update.new).await?;
        tracing::debug!(
            "附件 {} 已从 {} 更新到 {}",
            update.new.name,
            update.old.version,
            update.new.version
        );
        Ok(true)
    }
}

/// 找出缺少中转腿的语言对
///
/// 非中转的源语言必须存在 `from -> pivot` 记录，非中转的目标语言必须存在
/// `pivot -> to` 记录。
pub fn find_pivot_gaps(records: &RecordMap, pivot: &str) -> Vec<PivotGap> {
    let pairs: BTreeSet<LanguagePair> = records
        .values()
        .filter_map(|record| record.pair().cloned())
        .collect();

    let mut gaps = Vec::new();
    for pair in &pairs {
        if pair.from_lang != pivot {
            let leg = LanguagePair::new(pair.from_lang.clone(), pivot);
            if !pairs.contains(&leg) {
                gaps.push(PivotGap {
                    pair: pair.clone(),
                    missing: leg,
                });
                continue;
            }
        }
        if pair.to_lang != pivot {
            let leg = LanguagePair::new(pivot, pair.to_lang.clone());
            if !pairs.contains(&leg) {
                gaps.push(PivotGap {
                    pair: pair.clone(),
                    missing: leg,
                });
            }
        }
    }
    gaps
}
