//! 翻译资源配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, TranslationsConfig};

/// 配置常量
pub mod constants {
    // 版本兼容范围
    pub const DEFAULT_MIN_MAJOR_VERSION: u64 = 1;
    pub const DEFAULT_MAX_MAJOR_VERSION: u64 = 1;

    // 下载相关
    pub const MAX_CONCURRENT_DOWNLOADS: usize = 10;
    pub const MAX_DOWNLOAD_RETRIES: usize = 3;
    pub const DEFAULT_CHAOS_MAX_DELAY_MS: u64 = 3000;

    // 语言与记录
    pub const PIVOT_LANGUAGE: &str = "en";
    pub const WASM_RECORD_NAME: &str = "bergamot-translator";
    pub const MODELS_COLLECTION: &str = "translations-models";
    pub const WASM_COLLECTION: &str = "translations-wasm";

    // 最近使用的目标语言数量
    pub const MOST_RECENT_TARGETS_CAPACITY: usize = 3;

    // 已知的宏语言细化
    pub const MACRO_LANGUAGE_REFINEMENTS: &[(&str, &str)] = &[("no", "nb")];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "translations-config.toml",
        "translations-config.json",
        ".translations-config.toml",
        "~/.config/translations-engine/config.toml",
        "/etc/translations-engine/config.toml",
    ];
}

/// 便利函数
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| std::path::Path::new(shellexpand::tilde(path).as_ref()).exists())
}
