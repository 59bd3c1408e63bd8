//! 翻译资源模块
//!
//! 为本地机器翻译解析、获取并管理资源，驱动文档级的翻译会话：
//! - **storage**: 记录数据模型、版本选择、记录集合、记录目录与同步
//! - **languages**: 语言标签、语言对解析、偏好语言排序
//! - **pipeline**: 有界并发下载与翻译资源组装
//! - **core**: 资源上下文、翻译会话状态机、端口与窗口状态
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use translations_engine::translation::{
//!     JsonFileCollection, ResourceCatalogContext, StaticLocaleProvider, TranslationsConfig,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let context = ResourceCatalogContext::new(
//!     TranslationsConfig::default(),
//!     Arc::new(JsonFileCollection::new("translations-models", "dump/models")),
//!     Arc::new(JsonFileCollection::new("translations-wasm", "dump/wasm")),
//!     Arc::new(StaticLocaleProvider::default()),
//! )?;
//!
//! let route = context.pairs().resolve_route("fr", "it").await?;
//! println!("{}", route);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块 - 版本范围、下载并发、中转语言等配置
pub mod config;

/// 会话核心模块 - 资源上下文、翻译会话、端口与窗口状态
pub mod core;

/// 错误处理模块 - 统一的错误类型和处理机制
pub mod error;

/// 语言模块 - 标签比较、语言对解析和偏好语言
pub mod languages;

/// 资源获取管道 - 下载管理器和资源组装
pub mod pipeline;

/// 存储模块 - 记录、版本选择、集合与目录
pub mod storage;

// ============================================================================
// 核心API导出
// ============================================================================

/// 配置管理相关组件
pub use config::{constants, ConfigManager, TranslationsConfig};

/// 错误处理相关类型
pub use error::{ErrorCategory, ErrorSeverity, TranslationError, TranslationResult};

/// 会话与上下文
pub use core::{
    ResourceCatalogContext, SessionBindings, SessionPhase, TranslationSession,
};

/// 语言对与偏好语言
pub use languages::{LanguagePairResolver, PreferredLanguageRanker, StaticLocaleProvider};

/// 资源获取
pub use pipeline::{AssetManager, DownloadManager, QueueItem};

/// 记录与集合
pub use storage::{
    AssetRecord, JsonFileCollection, LanguagePair, MemoryCollection, ModelFileType,
    RecordCatalog, RecordCollection, RemoteRecordSyncHandler, SyncEvent,
};
