//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问

use std::env;
use std::fmt;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "TRANSLATIONS_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// 翻译资源相关环境变量
pub mod translations {
    use super::*;

    /// 最小兼容主版本号
    pub struct MinMajorVersion;
    impl EnvVar<u64> for MinMajorVersion {
        const NAME: &'static str = "TRANSLATIONS_MIN_MAJOR_VERSION";
        const DEFAULT: Option<u64> = None;
        const DESCRIPTION: &'static str = "Lowest record major version this build can consume";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_major(value, Self::NAME)
        }
    }

    /// 最大兼容主版本号
    pub struct MaxMajorVersion;
    impl EnvVar<u64> for MaxMajorVersion {
        const NAME: &'static str = "TRANSLATIONS_MAX_MAJOR_VERSION";
        const DEFAULT: Option<u64> = None;
        const DESCRIPTION: &'static str = "Highest record major version this build can consume";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_major(value, Self::NAME)
        }
    }

    /// 最大并发下载数
    pub struct MaxConcurrentDownloads;
    impl EnvVar<usize> for MaxConcurrentDownloads {
        const NAME: &'static str = "TRANSLATIONS_MAX_CONCURRENT_DOWNLOADS";
        const DEFAULT: Option<usize> = None;
        const DESCRIPTION: &'static str = "Maximum number of attachment downloads in flight";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 64)
        }
    }

    /// 单个下载的重试次数
    pub struct MaxDownloadRetries;
    impl EnvVar<usize> for MaxDownloadRetries {
        const NAME: &'static str = "TRANSLATIONS_MAX_DOWNLOAD_RETRIES";
        const DEFAULT: Option<usize> = None;
        const DESCRIPTION: &'static str = "Retry budget for each attachment download";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 0, 20)
        }
    }

    /// 混沌模式
    pub struct ChaosMode;
    impl EnvVar<bool> for ChaosMode {
        const NAME: &'static str = "TRANSLATIONS_CHAOS_MODE";
        const DEFAULT: Option<bool> = None;
        const DESCRIPTION: &'static str = "Inject random delays and failures into downloads";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 自动弹出翻译提示
    pub struct AutomaticOffer;
    impl EnvVar<bool> for AutomaticOffer {
        const NAME: &'static str = "TRANSLATIONS_AUTOMATIC_OFFER";
        const DEFAULT: Option<bool> = None;
        const DESCRIPTION: &'static str = "Offer translations automatically when a page is supported";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

fn parse_major(value: &str, var_name: &str) -> EnvResult<u64> {
    match value.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(EnvError {
            variable: var_name.to_string(),
            message: "Major version must be a positive integer".to_string(),
        }),
        Ok(major) => Ok(major),
    }
}

/// 生成环境变量文档
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    docs.push_str("## Core Configuration\n\n");
    docs.push_str(&format!(
        "- `{}`: {}\n",
        core::LogLevel::NAME,
        core::LogLevel::DESCRIPTION
    ));

    docs.push_str("\n## Translations Configuration\n\n");
    let entries = [
        (translations::MinMajorVersion::NAME, translations::MinMajorVersion::DESCRIPTION),
        (translations::MaxMajorVersion::NAME, translations::MaxMajorVersion::DESCRIPTION),
        (
            translations::MaxConcurrentDownloads::NAME,
            translations::MaxConcurrentDownloads::DESCRIPTION,
        ),
        (
            translations::MaxDownloadRetries::NAME,
            translations::MaxDownloadRetries::DESCRIPTION,
        ),
        (translations::ChaosMode::NAME, translations::ChaosMode::DESCRIPTION),
        (translations::AutomaticOffer::NAME, translations::AutomaticOffer::DESCRIPTION),
    ];
    for (name, description) in entries {
        docs.push_str(&format!("- `{}`: {}\n", name, description));
    }

    docs
}
