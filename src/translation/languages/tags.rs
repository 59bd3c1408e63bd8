//! BCP-47 语言标签工具
//!
//! 语言对按基础语言声明（如 `en`），而文档和用户设置中的标签往往带有
//! 地区或书写系统（如 `en-US`、`zh-Hant`），因此比较时不能使用字符串相等。

use std::str::FromStr;

use unic_langid::LanguageIdentifier;

use crate::translation::config::constants;

/// 规范化标签，无法解析时返回 `None`
pub fn canonicalize(tag: &str) -> Option<String> {
    let tag = tag.trim();
    if tag.is_empty() {
        return None;
    }
    LanguageIdentifier::from_str(tag)
        .ok()
        .map(|langid| langid.to_string())
}

/// 基础语言子标签（小写）
pub fn base_language(tag: &str) -> String {
    match LanguageIdentifier::from_str(tag.trim()) {
        Ok(langid) => langid.language.as_str().to_string(),
        Err(_) => tag
            .trim()
            .split(|c| c == '-' || c == '_')
            .next()
            .unwrap_or_default()
            .to_lowercase(),
    }
}

/// 将已知的宏语言细化为具体语言，例如 `no` -> `nb`
pub fn refine_macro_language(tag: &str) -> String {
    let base = base_language(tag);
    for (macro_language, refined) in constants::MACRO_LANGUAGE_REFINEMENTS {
        if base == *macro_language {
            return refined.to_string();
        }
    }
    tag.trim().to_string()
}

/// 判断 `other` 是否可以由声明为 `known` 的语言服务
///
/// 基础语言必须相同；`known` 声明了书写系统或地区时，`other` 也必须一致。
pub fn lang_tags_match(known: &str, other: &str) -> bool {
    if known == other {
        return true;
    }
    if known.is_empty() || other.is_empty() {
        return false;
    }

    let (known_id, other_id) = match (
        LanguageIdentifier::from_str(known),
        LanguageIdentifier::from_str(other),
    ) {
        (Ok(known_id), Ok(other_id)) => (known_id, other_id),
        _ => return base_language(known) == base_language(other),
    };

    if known_id.language != other_id.language {
        return false;
    }
    if let Some(script) = known_id.script {
        if other_id.script != Some(script) {
            return false;
        }
    }
    if let Some(region) = known_id.region {
        if other_id.region != Some(region) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_language() {
        assert_eq!(base_language("en-US"), "en");
        assert_eq!(base_language("ZH_hant"), "zh");
        assert_eq!(base_language("es"), "es");
    }

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize("EN-us").as_deref(), Some("en-US"));
        assert_eq!(canonicalize("  "), None);
        assert_eq!(canonicalize("not a tag!"), None);
    }

    #[test]
    fn test_refine_macro_language() {
        assert_eq!(refine_macro_language("no"), "nb");
        assert_eq!(refine_macro_language("no-NO"), "nb");
        assert_eq!(refine_macro_language("nn"), "nn");
    }

    #[test]
    fn test_lang_tags_match() {
        assert!(lang_tags_match("es", "es-MX"));
        assert!(lang_tags_match("en", "en-US"));
        assert!(!lang_tags_match("en-GB", "en-US"));
        assert!(!lang_tags_match("zh-Hant", "zh-Hans"));
        assert!(!lang_tags_match("fr", "de"));
        assert!(!lang_tags_match("", "fr"));
    }
}
