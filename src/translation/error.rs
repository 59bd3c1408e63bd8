//! 翻译资源模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制。
//!
//! 错误值实现了 `Clone`：同一个进行中的记录获取会被多个等待者共享，
//! 失败结果需要原样交给每一个等待者。

use std::fmt;

use thiserror::Error;

/// 翻译资源错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// 配置错误（缺失的版本范围等），属于编程错误，不重试
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 请求的语言对既没有直连模型，也没有完整的中转模型
    #[error("没有可用的模型: {0}")]
    NoModelError(String),

    /// 单个附件下载失败
    #[error("附件下载失败: {0}")]
    AttachmentDownloadError(String),

    /// 下载队列中有任务在耗尽重试次数后仍然失败
    #[error("{failed} 个下载任务最终失败")]
    PartialFailureError { failed: usize },

    /// 无法连接翻译引擎进程
    #[error("无法创建翻译端口: {0}")]
    PortCreationError(String),

    /// 模型文件集合不完整，说明服务端数据不一致
    #[error("模型文件不完整: {0}")]
    IncompleteBundleError(String),

    /// 远程记录集合读写错误
    #[error("记录集合错误: {0}")]
    CollectionError(String),

    /// 记录内容无效
    #[error("记录无效: {0}")]
    InvalidRecord(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    ParseError(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::AttachmentDownloadError(_) => true,
            TranslationError::CollectionError(_) => true,
            TranslationError::PortCreationError(_) => true,
            TranslationError::PartialFailureError { .. } => true,
            TranslationError::ConfigError(_) => false,
            TranslationError::NoModelError(_) => false,
            TranslationError::IncompleteBundleError(_) => false,
            TranslationError::InvalidRecord(_) => false,
            TranslationError::ParseError(_) => false,
            TranslationError::SerializationError(_) => false,
            TranslationError::InternalError(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::NoModelError(_) => ErrorSeverity::Info,
            TranslationError::AttachmentDownloadError(_) => ErrorSeverity::Warning,
            TranslationError::PartialFailureError { .. } => ErrorSeverity::Warning,
            TranslationError::PortCreationError(_) => ErrorSeverity::Error,
            TranslationError::IncompleteBundleError(_) => ErrorSeverity::Error,
            TranslationError::CollectionError(_) => ErrorSeverity::Warning,
            TranslationError::InvalidRecord(_) => ErrorSeverity::Warning,
            TranslationError::ParseError(_) => ErrorSeverity::Error,
            TranslationError::SerializationError(_) => ErrorSeverity::Error,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::NoModelError(_) => ErrorCategory::Model,
            TranslationError::IncompleteBundleError(_) => ErrorCategory::Model,
            TranslationError::AttachmentDownloadError(_) => ErrorCategory::Download,
            TranslationError::PartialFailureError { .. } => ErrorCategory::Download,
            TranslationError::PortCreationError(_) => ErrorCategory::Engine,
            TranslationError::CollectionError(_) => ErrorCategory::Collection,
            TranslationError::InvalidRecord(_) => ErrorCategory::Collection,
            TranslationError::ParseError(_) => ErrorCategory::Parsing,
            TranslationError::SerializationError(_) => ErrorCategory::Serialization,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        match &mut self {
            TranslationError::ConfigError(ref mut msg)
            | TranslationError::NoModelError(ref mut msg)
            | TranslationError::AttachmentDownloadError(ref mut msg)
            | TranslationError::PortCreationError(ref mut msg)
            | TranslationError::IncompleteBundleError(ref mut msg)
            | TranslationError::CollectionError(ref mut msg)
            | TranslationError::InvalidRecord(ref mut msg)
            | TranslationError::ParseError(ref mut msg)
            | TranslationError::SerializationError(ref mut msg)
            | TranslationError::InternalError(ref mut msg) => {
                *msg = format!("{} (上下文: {})", msg, context);
            }
            TranslationError::PartialFailureError { .. } => {}
        }

        self
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Model,
    Download,
    Engine,
    Collection,
    Parsing,
    Serialization,
    Internal,
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::CollectionError(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ParseError(format!("TOML解析错误: {}", error))
    }
}

impl From<semver::Error> for TranslationError {
    fn from(error: semver::Error) -> Self {
        TranslationError::ParseError(format!("版本号解析错误: {}", error))
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误，不改变错误本身
    pub fn log_error(error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::ConfigError(msg.to_string())
    }

    /// 创建下载错误
    pub fn download_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::AttachmentDownloadError(msg.to_string())
    }

    /// 创建集合错误
    pub fn collection_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::CollectionError(msg.to_string())
    }

    /// 创建内部错误
    pub fn internal_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::InternalError(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TranslationError::AttachmentDownloadError("超时".into()).is_retryable());
        assert!(!TranslationError::ConfigError("缺少版本".into()).is_retryable());
        assert!(!TranslationError::IncompleteBundleError("缺少 lex".into()).is_retryable());
    }

    #[test]
    fn test_with_context_appends() {
        let error = TranslationError::NoModelError("fr -> it".into()).with_context("pivot");
        assert_eq!(error.to_string(), "没有可用的模型: fr -> it (上下文: pivot)");

        let partial = TranslationError::PartialFailureError { failed: 2 }.with_context("忽略");
        assert_eq!(partial, TranslationError::PartialFailureError { failed: 2 });
    }

    #[test]
    fn test_category_and_severity() {
        let error = TranslationError::PortCreationError("引擎不可达".into());
        assert_eq!(error.category(), ErrorCategory::Engine);
        assert_eq!(error.severity(), ErrorSeverity::Error);
    }
}
