//! 简化的配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::{TranslationError, TranslationResult};

/// 翻译资源配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationsConfig {
    // 版本兼容范围（主版本号，闭区间）
    pub min_major_version: u64,
    pub max_major_version: u64,

    // 下载配置
    pub max_concurrent_downloads: usize,
    pub max_download_retries: usize,

    // 记录集合
    pub pivot_language: String,
    pub wasm_record_name: String,
    pub models_collection: String,
    pub wasm_collection: String,

    // 偏好语言
    pub most_recent_capacity: usize,

    // 功能开关
    pub validate_pivots: bool,
    pub chaos_mode: bool,
    pub chaos_max_delay_ms: u64,
    pub automatic_offer: bool,
    pub automation_testing: bool,
    pub is_automation: bool,
}

impl Default for TranslationsConfig {
    fn default() -> Self {
        Self {
            min_major_version: constants::DEFAULT_MIN_MAJOR_VERSION,
            max_major_version: constants::DEFAULT_MAX_MAJOR_VERSION,

            max_concurrent_downloads: constants::MAX_CONCURRENT_DOWNLOADS,
            max_download_retries: constants::MAX_DOWNLOAD_RETRIES,

            pivot_language: constants::PIVOT_LANGUAGE.to_string(),
            wasm_record_name: constants::WASM_RECORD_NAME.to_string(),
            models_collection: constants::MODELS_COLLECTION.to_string(),
            wasm_collection: constants::WASM_COLLECTION.to_string(),

            most_recent_capacity: constants::MOST_RECENT_TARGETS_CAPACITY,

            validate_pivots: cfg!(debug_assertions),
            chaos_mode: false,
            chaos_max_delay_ms: constants::DEFAULT_CHAOS_MAX_DELAY_MS,
            automatic_offer: true,
            automation_testing: false,
            is_automation: false,
        }
    }
}

impl TranslationsConfig {
    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.min_major_version == 0 || self.max_major_version == 0 {
            return Err(TranslationError::ConfigError(
                "主版本号范围未设置".to_string(),
            ));
        }

        if self.min_major_version > self.max_major_version {
            return Err(TranslationError::ConfigError(format!(
                "最小主版本号 {} 大于最大主版本号 {}",
                self.min_major_version, self.max_major_version
            )));
        }

        if self.max_concurrent_downloads == 0 {
            return Err(TranslationError::ConfigError("最大并发下载数不能为0".to_string()));
        }

        if self.pivot_language.trim().is_empty() {
            return Err(TranslationError::ConfigError("中转语言不能为空".to_string()));
        }

        if self.most_recent_capacity == 0 {
            return Err(TranslationError::ConfigError("最近使用语言数量不能为0".to_string()));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{translations, EnvVar};

        if let Ok(min) = translations::MinMajorVersion::get() {
            self.min_major_version = min;
        }

        if let Ok(max) = translations::MaxMajorVersion::get() {
            self.max_major_version = max;
        }

        if let Ok(concurrent) = translations::MaxConcurrentDownloads::get() {
            self.max_concurrent_downloads = concurrent;
        }

        if let Ok(retries) = translations::MaxDownloadRetries::get() {
            self.max_download_retries = retries;
        }

        if let Ok(chaos) = translations::ChaosMode::get() {
            if chaos {
                tracing::warn!("已启用混沌模式，下载将随机延迟和失败");
            }
            self.chaos_mode = chaos;
        }

        if let Ok(automatic) = translations::AutomaticOffer::get() {
            self.automatic_offer = automatic;
        }
    }

    /// 混沌模式的最大延迟
    pub fn chaos_max_delay(&self) -> Duration {
        Duration::from_millis(self.chaos_max_delay_ms)
    }
}

/// 简化的配置管理器
pub struct ConfigManager {
    config: TranslationsConfig,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new() -> TranslationResult<Self> {
        let mut config = Self::load_config()?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 使用指定配置创建，不读取文件和环境变量
    pub fn with_config(config: TranslationsConfig) -> TranslationResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 获取配置
    pub fn get_config(&self) -> &TranslationsConfig {
        &self.config
    }

    /// 取出配置
    pub fn into_config(self) -> TranslationsConfig {
        self.config
    }

    /// 从文件加载配置
    fn load_config() -> TranslationResult<TranslationsConfig> {
        // 首先尝试加载 .env 文件
        Self::load_dotenv();

        // 查找配置文件
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(&expanded_path);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(TranslationsConfig::default())
    }

    /// 从指定文件加载配置
    pub fn load_from_file(path: &str) -> TranslationResult<TranslationsConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslationError::ConfigError(format!("读取配置文件失败: {}", e)))?;

        if path.ends_with(".toml") {
            toml::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析TOML配置失败: {}", e)))
        } else {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析JSON配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env.development", ".env.production", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> TranslationResult<()> {
        let config = TranslationsConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| TranslationError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TranslationsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrent_downloads, 10);
        assert_eq!(config.max_download_retries, 3);
        assert_eq!(config.pivot_language, "en");
    }

    #[test]
    fn test_missing_major_bounds_rejected() {
        let config = TranslationsConfig {
            max_major_version: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TranslationError::ConfigError(_))));

        let inverted = TranslationsConfig {
            min_major_version: 3,
            max_major_version: 2,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_example_config_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("translations-config.toml");
        let path = path.to_str().unwrap();

        ConfigManager::generate_example_config(path).unwrap();
        let loaded = ConfigManager::load_from_file(path).unwrap();
        assert_eq!(loaded, TranslationsConfig::default());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "max_major_version": 2, "chaos_mode": true }"#).unwrap();

        let loaded = ConfigManager::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.max_major_version, 2);
        assert!(loaded.chaos_mode);
        assert_eq!(loaded.min_major_version, 1);
    }
}
