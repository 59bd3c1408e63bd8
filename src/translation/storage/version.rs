//! 记录版本选择
//!
//! 同一个查找键下可能同时存在多个版本的记录（分阶段发布）。客户端只能使用
//! 主版本号在 `[min_major, max_major]` 范围内的记录，并在其中选择最新的一个。

use std::collections::HashMap;
use std::hash::Hash;

use semver::{Prerelease, Version};

use super::records::AssetRecord;
use crate::translation::error::{TranslationError, TranslationResult};

/// 将记录中的版本字符串规范化为语义化版本
///
/// 集合中的版本形如 `1.0`、`1.0a1`、`2.1.3` 或 `1.0.0-alpha`：
/// 缺失的组成部分补零，数字之后的后缀作为预发布标识。
pub fn parse_record_version(version: &str) -> TranslationResult<Version> {
    let version = version.trim();
    let split_at = version
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(version.len());
    let (numeric, suffix) = version.split_at(split_at);
    let numeric = numeric.trim_end_matches('.');

    let mut parts: Vec<&str> = numeric.split('.').filter(|part| !part.is_empty()).collect();
    if parts.is_empty() || parts.len() > 3 {
        return Err(TranslationError::ParseError(format!("无法识别的版本号: {}", version)));
    }
    while parts.len() < 3 {
        parts.push("0");
    }

    let pre = suffix.trim_start_matches('-');
    let normalized = if pre.is_empty() {
        parts.join(".")
    } else {
        format!("{}-{}", parts.join("."), pre)
    };

    Ok(Version::parse(&normalized)?)
}

/// 主版本号区间的下界 `major.0.0-0`，低于该主版本的任何预发布版本
fn lower_bound(major: u64) -> TranslationResult<Version> {
    let mut bound = Version::new(major, 0, 0);
    bound.pre = Prerelease::new("0")?;
    Ok(bound)
}

/// 判断版本是否在 `[min.0-alpha, (max+1).0-alpha)` 半开区间内
pub fn is_version_compatible(version: &Version, min_major: u64, max_major: u64) -> TranslationResult<bool> {
    let lower = lower_bound(min_major)?;
    let upper = lower_bound(max_major + 1)?;
    Ok(*version >= lower && *version < upper)
}

/// 为每个查找键选择兼容范围内版本最高的记录
///
/// 范围外的记录被静默丢弃；版本号无法解析的记录记录警告后丢弃。
pub fn select_best<K, F>(
    candidates: &[AssetRecord],
    min_major: u64,
    max_major: u64,
    key_fn: F,
) -> TranslationResult<HashMap<K, AssetRecord>>
where
    K: Eq + Hash,
    F: Fn(&AssetRecord) -> K,
{
    if min_major == 0 || max_major == 0 {
        return Err(TranslationError::ConfigError(
            "选择记录版本时缺少主版本号范围".to_string(),
        ));
    }

    let mut best: HashMap<K, (Version, AssetRecord)> = HashMap::new();

    for record in candidates {
        let version = match parse_record_version(&record.version) {
            Ok(version) => version,
            Err(e) => {
                tracing::warn!("记录 {} 的版本号无效: {}", record.id, e);
                continue;
            }
        };

        if !is_version_compatible(&version, min_major, max_major)? {
            tracing::debug!(
                "记录 {} 的版本 {} 不在兼容范围 {}..={} 内",
                record.name,
                record.version,
                min_major,
                max_major
            );
            continue;
        }

        let key = key_fn(record);
        match best.get(&key) {
            Some((existing, _)) if *existing >= version => {}
            _ => {
                best.insert(key, (version, record.clone()));
            }
        }
    }

    Ok(best.into_iter().map(|(key, (_, record))| (key, record)).collect())
}
