//! 语言处理模块
//!
//! 包含语言标签比较、语言对解析和偏好语言排序

pub mod pairs;
pub mod preferred;
pub mod tags;

pub use pairs::{
    find_compatible_source, find_compatible_target, LanguagePairResolver, SupportedLanguages,
    TranslationRoute,
};
pub use preferred::{LocaleProvider, PreferredLanguageRanker, StaticLocaleProvider};
pub use tags::{base_language, canonicalize, lang_tags_match, refine_macro_language};
