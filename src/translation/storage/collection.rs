//! 远程记录集合边界
//!
//! 远程记录存储本身不在本模块范围内，这里只定义它的同步/附件契约，
//! 并提供内存实现和基于 JSON 导出文件的实现。

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::records::{check_path_component, parse_records, AssetRecord, RawRecord};
use crate::translation::error::{helpers, TranslationResult};

/// 记录集合的同步与附件接口
#[async_trait]
pub trait RecordCollection: Send + Sync {
    /// 集合名称
    fn name(&self) -> &str;

    /// 当前同步到的全部记录
    async fn records(&self) -> TranslationResult<Vec<AssetRecord>>;

    /// 附件是否已下载到本地
    async fn is_downloaded(&self, record: &AssetRecord) -> TranslationResult<bool>;

    /// 下载（或从本地缓存读取）附件
    async fn download(&self, record: &AssetRecord) -> TranslationResult<Vec<u8>>;

    /// 删除已下载的附件
    async fn delete_downloaded(&self, record: &AssetRecord) -> TranslationResult<()>;

    /// 删除所有已下载的附件
    async fn delete_all(&self) -> TranslationResult<()>;
}

/// 内存中的记录集合
pub struct MemoryCollection {
    name: String,
    records: Mutex<Vec<AssetRecord>>,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    downloaded: Mutex<HashSet<String>>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>, records: Vec<AssetRecord>) -> Self {
        Self {
            name: name.into(),
            records: Mutex::new(records),
            blobs: Mutex::new(HashMap::new()),
            downloaded: Mutex::new(HashSet::new()),
        }
    }

    /// 为记录提供附件内容；没有提供内容的记录下载时返回其 id 的字节
    pub fn with_blob(self, record_id: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record_id.into(), bytes);
        self
    }

    /// 替换全部记录，模拟一次同步
    pub fn set_records(&self, records: Vec<AssetRecord>) {
        *self.records.lock().unwrap_or_else(PoisonError::into_inner) = records;
    }

    pub fn downloaded_ids(&self) -> HashSet<String> {
        self.downloaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn mark_downloaded(&self, record_id: impl Into<String>) {
        self.downloaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record_id.into());
    }
}

#[async_trait]
impl RecordCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn records(&self) -> TranslationResult<Vec<AssetRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn is_downloaded(&self, record: &AssetRecord) -> TranslationResult<bool> {
        Ok(self
            .downloaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&record.id))
    }

    async fn download(&self, record: &AssetRecord) -> TranslationResult<Vec<u8>> {
        let bytes = self
            .blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&record.id)
            .cloned()
            .unwrap_or_else(|| record.id.as_bytes().to_vec());
        self.mark_downloaded(record.id.clone());
        Ok(bytes)
    }

    async fn delete_downloaded(&self, record: &AssetRecord) -> TranslationResult<()> {
        self.downloaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&record.id);
        Ok(())
    }

    async fn delete_all(&self) -> TranslationResult<()> {
        self.downloaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// 基于磁盘导出的记录集合
///
/// 目录结构：
///
/// ```text
/// <root>/records.json        记录列表
/// <root>/attachments/<file>  附件原件
/// <root>/cache/<id>          已下载的附件
/// ```
pub struct JsonFileCollection {
    name: String,
    root: PathBuf,
}

impl JsonFileCollection {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    fn records_path(&self) -> PathBuf {
        self.root.join("records.json")
    }

    fn source_path(&self, record: &AssetRecord) -> TranslationResult<PathBuf> {
        check_path_component("attachment.filename", &record.attachment.filename)?;
        Ok(self.root.join("attachments").join(&record.attachment.filename))
    }

    fn cache_path(&self, record: &AssetRecord) -> TranslationResult<PathBuf> {
        check_path_component("id", &record.id)?;
        Ok(self.root.join("cache").join(&record.id))
    }

    async fn exists(path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }
}

#[async_trait]
impl RecordCollection for JsonFileCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn records(&self) -> TranslationResult<Vec<AssetRecord>> {
        let path = self.records_path();
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            helpers::collection_error(format!("读取 {} 失败: {}", path.display(), e))
        })?;
        let raw: Vec<RawRecord> = serde_json::from_str(&content)?;
        Ok(parse_records(raw))
    }

    async fn is_downloaded(&self, record: &AssetRecord) -> TranslationResult<bool> {
        Ok(Self::exists(&self.cache_path(record)?).await)
    }

    async fn download(&self, record: &AssetRecord) -> TranslationResult<Vec<u8>> {
        let cached = self.cache_path(record)?;
        if Self::exists(&cached).await {
            return Ok(tokio::fs::read(&cached).await?);
        }

        let source = self.source_path(record)?;
        let bytes = tokio::fs::read(&source).await.map_err(|e| {
            helpers::download_error(format!("附件 {} 不可用: {}", source.display(), e))
        })?;

        tokio::fs::create_dir_all(self.root.join("cache")).await?;
        tokio::fs::write(&cached, &bytes).await?;
        tracing::debug!("已缓存附件 {} ({} 字节)", record.name, bytes.len());
        Ok(bytes)
    }

    async fn delete_downloaded(&self, record: &AssetRecord) -> TranslationResult<()> {
        let cached = self.cache_path(record)?;
        if Self::exists(&cached).await {
            tokio::fs::remove_file(&cached).await?;
        }
        Ok(())
    }

    async fn delete_all(&self) -> TranslationResult<()> {
        let cache_dir = self.root.join("cache");
        if Self::exists(&cache_dir).await {
            tokio::fs::remove_dir_all(&cache_dir).await?;
        }
        Ok(())
    }
}
