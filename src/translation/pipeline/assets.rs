//! 资源获取
//!
//! 组合记录目录、语言对解析和下载管理器，为翻译引擎准备 WASM 二进制与
//! 语言模型文件，并提供按语言的批量下载与删除。

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::download::{DownloadManager, QueueItem};
use crate::translation::error::{helpers, TranslationError, TranslationResult};
use crate::translation::languages::pairs::{LanguagePairResolver, TranslationRoute};
use crate::translation::storage::catalog::{CollectionKind, RecordCatalog};
use crate::translation::storage::records::{AssetRecord, LanguagePair, ModelFileType};
use crate::translation::storage::version::parse_record_version;

/// 一个已下载的模型文件
#[derive(Debug, Clone)]
pub struct ModelFile {
    pub record: AssetRecord,
    pub bytes: Arc<Vec<u8>>,
}

/// 一个语言对的完整模型文件集合
#[derive(Debug, Clone)]
pub struct LanguageModelFiles {
    pub pair: LanguagePair,
    pub files: BTreeMap<ModelFileType, ModelFile>,
}

impl LanguageModelFiles {
    pub fn get(&self, file_type: ModelFileType) -> Option<&ModelFile> {
        self.files.get(&file_type)
    }

    pub fn total_size(&self) -> usize {
        self.files.values().map(|file| file.bytes.len()).sum()
    }
}

/// 翻译引擎所需的全部资源
#[derive(Debug, Clone)]
pub struct TranslationPayload {
    pub route: TranslationRoute,
    pub wasm: Arc<Vec<u8>>,
    pub models: Vec<LanguageModelFiles>,
}

/// 资源管理器
pub struct AssetManager {
    catalog: Arc<RecordCatalog>,
    pairs: Arc<LanguagePairResolver>,
    downloads: DownloadManager,
}

impl AssetManager {
    pub fn new(
        catalog: Arc<RecordCatalog>,
        pairs: Arc<LanguagePairResolver>,
        downloads: DownloadManager,
    ) -> Self {
        Self {
            catalog,
            pairs,
            downloads,
        }
    }

    pub fn downloads(&self) -> &DownloadManager {
        &self.downloads
    }

    /// 下载记录的附件，任何一个耗尽重试都视为失败
    async fn fetch_required(
        &self,
        kind: CollectionKind,
        records: Vec<AssetRecord>,
    ) -> TranslationResult<BTreeMap<String, Arc<Vec<u8>>>> {
        let collection = self.catalog.collection(kind);
        let fetched: Arc<Mutex<BTreeMap<String, Arc<Vec<u8>>>>> = Arc::new(Mutex::new(BTreeMap::new()));
        let total = records.len();

        let items = records
            .into_iter()
            .map(|record| {
                let collection = Arc::clone(&collection);
                let fetched = Arc::clone(&fetched);
                let id = record.id.clone();
                let label = record.name.clone();
                let record = Arc::new(record);
                QueueItem::new(label, move || {
                    let collection = Arc::clone(&collection);
                    let record = Arc::clone(&record);
                    async move { collection.download(&record).await }
                })
                .on_success(move |bytes| {
                    fetched
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(id, Arc::new(bytes));
                })
            })
            .collect();

        match self.downloads.run(items).await {
            Ok(()) => {}
            Err(TranslationError::PartialFailureError { failed }) => {
                return Err(TranslationError::AttachmentDownloadError(format!(
                    "{} 个必需文件中有 {} 个下载失败",
                    total, failed
                )));
            }
            Err(e) => return Err(e),
        }

        let fetched = fetched.lock().unwrap_or_else(PoisonError::into_inner).clone();
        Ok(fetched)
    }

    /// 翻译引擎 WASM 二进制
    pub async fn wasm_binary(&self) -> TranslationResult<Arc<Vec<u8>>> {
        let record = self.catalog.get_wasm_record().await?;
        tracing::info!("获取 WASM 二进制 {} {}", record.name, record.version);
        let id = record.id.clone();
        let mut fetched = self
            .fetch_required(CollectionKind::Wasm, vec![record.as_ref().clone()])
            .await?;
        fetched
            .remove(&id)
            .ok_or_else(|| helpers::internal_error(format!("WASM 附件 {} 丢失", id)))
    }

    /// 一个直连语言对的模型文件
    ///
    /// 每种文件类型取最新版本；下载后检查文件集合是否完整。
    pub async fn language_model_files(
        &self,
        pair: &LanguagePair,
        include_quality_model: bool,
    ) -> TranslationResult<LanguageModelFiles> {
        let records = self.catalog.get_model_records().await?;

        let mut newest: BTreeMap<ModelFileType, AssetRecord> = BTreeMap::new();
        for record in records.records_for_pair(pair) {
            let Some(file_type) = record.file_type() else {
                continue;
            };
            if file_type == ModelFileType::QualityModel && !include_quality_model {
                continue;
            }
            let replace = match newest.get(&file_type) {
                Some(current) => is_newer(record, current),
                None => true,
            };
            if replace {
                newest.insert(file_type, record.clone());
            }
        }

        if newest.is_empty() {
            return Err(TranslationError::NoModelError(format!("{} 没有模型记录", pair)));
        }

        tracing::info!("下载 {} 的 {} 个模型文件", pair, newest.len());
        let mut fetched = self
            .fetch_required(CollectionKind::Models, newest.values().cloned().collect())
            .await?;

        let files: BTreeMap<ModelFileType, ModelFile> = newest
            .into_iter()
            .filter_map(|(file_type, record)| {
                fetched
                    .remove(&record.id)
                    .map(|bytes| (file_type, ModelFile { record, bytes }))
            })
            .collect();

        check_bundle(pair, &files, include_quality_model)?;
        Ok(LanguageModelFiles {
            pair: pair.clone(),
            files,
        })
    }

    /// 翻译 `from -> to` 所需的全部资源
    pub async fn translation_payload(&self, from: &str, to: &str) -> TranslationResult<TranslationPayload> {
        let route = self.pairs.resolve_route(from, to).await?;
        tracing::info!("翻译路线: {}", route);

        let legs = route.legs();
        let (wasm, models) = futures::try_join!(
            self.wasm_binary(),
            futures::future::try_join_all(
                legs.iter().map(|leg| self.language_model_files(leg, false))
            ),
        )?;

        Ok(TranslationPayload { route, wasm, models })
    }

    /// 下载与某个语言互译所需的全部文件
    pub async fn download_language_files(&self, language: &str) -> TranslationResult<usize> {
        let records = self
            .pairs
            .get_records_for_pair(language, self.pairs.pivot(), true)
            .await?;
        if records.is_empty() {
            return Err(TranslationError::NoModelError(format!("语言 {} 没有模型记录", language)));
        }

        let count = records.len();
        self.fetch_required(CollectionKind::Models, records).await?;
        self.wasm_binary().await?;
        tracing::info!("语言 {} 的 {} 个文件已下载", language, count);
        Ok(count)
    }

    /// 下载全部文件，返回失败的数量
    ///
    /// 部分失败不会中断其他文件，只记录日志。
    pub async fn download_all_files(&self) -> TranslationResult<usize> {
        let records = self.catalog.get_model_records().await?;
        let mut failed = 0;

        let models: Vec<AssetRecord> = records.records.values().cloned().collect();
        if let Err(e) = self.run_bulk(CollectionKind::Models, models).await {
            failed += bulk_failures(e)?;
        }

        let wasm = self.catalog.get_wasm_record().await?;
        if let Err(e) = self.run_bulk(CollectionKind::Wasm, vec![wasm.as_ref().clone()]).await {
            failed += bulk_failures(e)?;
        }

        if failed > 0 {
            tracing::warn!("批量下载完成，{} 个文件失败", failed);
        } else {
            tracing::info!("批量下载完成");
        }
        Ok(failed)
    }

    async fn run_bulk(&self, kind: CollectionKind, records: Vec<AssetRecord>) -> TranslationResult<()> {
        let collection = self.catalog.collection(kind);
        let items = records
            .into_iter()
            .map(|record| {
                let collection = Arc::clone(&collection);
                let label = record.name.clone();
                let record = Arc::new(record);
                QueueItem::new(label, move || {
                    let collection = Arc::clone(&collection);
                    let record = Arc::clone(&record);
                    async move { collection.download(&record).await.map(|_| ()) }
                })
            })
            .collect();
        self.downloads.run(items).await
    }

    /// 删除某个语言独占的文件，返回删除的数量
    ///
    /// 中转语言的文件被其他语言共享，不会删除。
    pub async fn delete_language_files(&self, language: &str) -> TranslationResult<usize> {
        if language == self.pairs.pivot() {
            tracing::warn!("中转语言 {} 的文件被其他语言共享，不删除", language);
            return Ok(0);
        }

        let records = self
            .pairs
            .get_records_for_pair(language, self.pairs.pivot(), false)
            .await?;
        let collection = self.catalog.collection(CollectionKind::Models);

        let mut deleted = 0;
        for record in &records {
            match collection.delete_downloaded(record).await {
                Ok(()) => deleted += 1,
                Err(e) => tracing::warn!("删除 {} 失败: {}", record.name, e),
            }
        }
        tracing::info!("语言 {} 删除了 {} 个文件", language, deleted);
        Ok(deleted)
    }

    /// 删除所有已下载的模型文件
    pub async fn delete_all_language_files(&self) -> TranslationResult<()> {
        self.catalog
            .collection(CollectionKind::Models)
            .delete_all()
            .await?;
        tracing::info!("已删除所有语言模型文件");
        Ok(())
    }

    /// 与某个语言互译所需的文件是否都已下载
    pub async fn has_all_files_for_language(&self, language: &str) -> TranslationResult<bool> {
        let records = self
            .pairs
            .get_records_for_pair(language, self.pairs.pivot(), true)
            .await?;
        if records.is_empty() {
            return Ok(false);
        }

        let collection = self.catalog.collection(CollectionKind::Models);
        for record in &records {
            if !collection.is_downloaded(record).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// 下载某个语言需要的字节数
    pub async fn language_download_size(&self, language: &str) -> TranslationResult<u64> {
        let records = self
            .pairs
            .get_records_for_pair(language, self.pairs.pivot(), true)
            .await?;
        Ok(records.iter().map(|record| record.attachment.size).sum())
    }
}

fn is_newer(candidate: &AssetRecord, current: &AssetRecord) -> bool {
    match (
        parse_record_version(&candidate.version),
        parse_record_version(&current.version),
    ) {
        (Ok(candidate), Ok(current)) => candidate > current,
        (Ok(_), Err(_)) => true,
        _ => false,
    }
}

fn bulk_failures(error: TranslationError) -> TranslationResult<usize> {
    match error {
        TranslationError::PartialFailureError { failed } => Ok(failed),
        other => Err(other),
    }
}

/// 检查模型文件集合是否完整
///
/// 需要 model、lex，以及 vocab 或 srcvocab + trgvocab；请求时还需要 qualityModel。
pub fn check_bundle(
    pair: &LanguagePair,
    files: &BTreeMap<ModelFileType, ModelFile>,
    include_quality_model: bool,
) -> TranslationResult<()> {
    let mut missing: Vec<&str> = Vec::new();

    for required in [ModelFileType::Model, ModelFileType::Lex] {
        if !files.contains_key(&required) {
            missing.push(required.as_str());
        }
    }

    let has_shared_vocab = files.contains_key(&ModelFileType::Vocab);
    let has_split_vocab =
        files.contains_key(&ModelFileType::Srcvocab) && files.contains_key(&ModelFileType::Trgvocab);
    if !has_shared_vocab && !has_split_vocab {
        missing.push("vocab");
    }

    if include_quality_model && !files.contains_key(&ModelFileType::QualityModel) {
        missing.push(ModelFileType::QualityModel.as_str());
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(TranslationError::IncompleteBundleError(format!(
            "{} 缺少文件: {}",
            pair,
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::config::TranslationsConfig;
    use crate::translation::storage::collection::{MemoryCollection, RecordCollection};

    fn file(id: &str, from: &str, to: &str, file_type: ModelFileType, version: &str) -> AssetRecord {
        AssetRecord::model(
            id,
            format!("{}.{}{}", file_type, from, to),
            version,
            file_type,
            LanguagePair::new(from, to),
        )
        .with_size(100)
    }

    fn bundle(prefix: &str, from: &str, to: &str) -> Vec<AssetRecord> {
        vec![
            file(&format!("{}-model", prefix), from, to, ModelFileType::Model, "1.0"),
            file(&format!("{}-lex", prefix), from, to, ModelFileType::Lex, "1.0"),
            file(&format!("{}-vocab", prefix), from, to, ModelFileType::Vocab, "1.0"),
        ]
    }

    fn manager(records: Vec<AssetRecord>) -> (Arc<MemoryCollection>, AssetManager) {
        let models = Arc::new(MemoryCollection::new("translations-models", records));
        let wasm = Arc::new(MemoryCollection::new(
            "translations-wasm",
            vec![AssetRecord::wasm("wasm-1", "bergamot-translator", "1.0")],
        ));
        let catalog = Arc::new(RecordCatalog::new(
            models.clone(),
            wasm,
            Arc::new(TranslationsConfig::default()),
        ));
        let pairs = Arc::new(LanguagePairResolver::new(Arc::clone(&catalog), "en"));
        (models, AssetManager::new(catalog, pairs, DownloadManager::new(4, 1)))
    }

    #[tokio::test]
    async fn test_language_model_files_complete() {
        let (_models, assets) = manager(bundle("esen", "es", "en"));
        let files = assets
            .language_model_files(&LanguagePair::new("es", "en"), false)
            .await
            .unwrap();
        assert_eq!(files.files.len(), 3);
        assert_eq!(&*files.get(ModelFileType::Lex).unwrap().bytes, b"esen-lex");
    }

    #[tokio::test]
    async fn test_incomplete_bundle() {
        let mut records = bundle("esen", "es", "en");
        records.retain(|record| record.file_type() != Some(ModelFileType::Lex));
        let (_models, assets) = manager(records);

        let error = assets
            .language_model_files(&LanguagePair::new("es", "en"), false)
            .await
            .unwrap_err();
        assert!(matches!(error, TranslationError::IncompleteBundleError(msg) if msg.contains("lex")));
    }

    #[tokio::test]
    async fn test_quality_model_required_when_requested() {
        let (_models, assets) = manager(bundle("esen", "es", "en"));
        let error = assets
            .language_model_files(&LanguagePair::new("es", "en"), true)
            .await
            .unwrap_err();
        assert!(matches!(error, TranslationError::IncompleteBundleError(_)));
    }

    #[tokio::test]
    async fn test_split_vocab_is_complete() {
        let records = vec![
            file("m", "es", "en", ModelFileType::Model, "1.0"),
            file("l", "es", "en", ModelFileType::Lex, "1.0"),
            file("s", "es", "en", ModelFileType::Srcvocab, "1.0"),
            file("t", "es", "en", ModelFileType::Trgvocab, "1.0"),
        ];
        let (_models, assets) = manager(records);
        assert!(assets
            .language_model_files(&LanguagePair::new("es", "en"), false)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_delete_language_keeps_shared_pivot_files() {
        let mut records = bundle("fren", "fr", "en");
        records.extend(bundle("enfr", "en", "fr"));
        records.extend(bundle("iten", "it", "en"));
        records.extend(bundle("enit", "en", "it"));
        let (models, assets) = manager(records);

        assert_eq!(assets.download_all_files().await.unwrap(), 0);
        assert!(assets.has_all_files_for_language("fr").await.unwrap());
        assert_eq!(assets.language_download_size("fr").await.unwrap(), 600);

        assert_eq!(assets.delete_language_files("fr").await.unwrap(), 6);
        assert!(!assets.has_all_files_for_language("fr").await.unwrap());
        assert!(assets.has_all_files_for_language("it").await.unwrap());
        assert!(models.downloaded_ids().contains("iten-model"));

        assert_eq!(assets.delete_language_files("en").await.unwrap(), 0);
        assert!(models.is_downloaded(&bundle("enit", "en", "it")[0]).await.unwrap());
    }
}
