//! # Translations Engine
//!
//! 本地文档翻译的资源解析与获取引擎，以及驱动它的翻译会话状态机。
//!
//! ## 模块组织
//!
//! - `env` - 类型安全的环境变量访问
//! - `translation` - 记录目录、语言对、下载管理、偏好语言和翻译会话

pub mod env;
pub mod translation;

// Re-export commonly used items for convenience
pub use translation::{
    ResourceCatalogContext, TranslationError, TranslationResult, TranslationSession,
    TranslationsConfig,
};
