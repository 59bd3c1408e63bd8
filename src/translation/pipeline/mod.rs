//! 资源获取管道
//!
//! 提供有界并发下载和翻译资源的组装、批量下载与删除

pub mod assets;
pub mod download;

// 重新导出主要类型
pub use assets::{AssetManager, LanguageModelFiles, ModelFile, TranslationPayload};
pub use download::{DownloadManager, DownloadStats, QueueItem};
