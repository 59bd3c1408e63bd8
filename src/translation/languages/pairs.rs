//! 语言对解析
//!
//! 从记录目录派生可服务的语言对，并为请求的语言对解析直连或经中转语言
//! 的翻译路线。

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::tags::{lang_tags_match, refine_macro_language};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::storage::cache::SharedFetch;
use crate::translation::storage::catalog::{ModelRecords, RecordCatalog};
use crate::translation::storage::records::{AssetRecord, LanguagePair};

/// 翻译路线
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationRoute {
    /// 存在直连模型
    Direct(LanguagePair),
    /// 经中转语言的两段模型
    Pivot {
        first: LanguagePair,
        second: LanguagePair,
    },
}

impl TranslationRoute {
    /// 路线上需要的模型语言对，按翻译顺序排列
    pub fn legs(&self) -> Vec<LanguagePair> {
        match self {
            TranslationRoute::Direct(pair) => vec![pair.clone()],
            TranslationRoute::Pivot { first, second } => vec![first.clone(), second.clone()],
        }
    }

    pub fn is_pivot(&self) -> bool {
        matches!(self, TranslationRoute::Pivot { .. })
    }
}

impl fmt::Display for TranslationRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslationRoute::Direct(pair) => write!(f, "{} (直连)", pair),
            TranslationRoute::Pivot { first, second } => {
                write!(f, "{} -> {} (经 {})", first.from_lang, second.to_lang, first.to_lang)
            }
        }
    }
}

/// 支持的源语言与目标语言列表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportedLanguages {
    pub from_languages: Vec<String>,
    pub to_languages: Vec<String>,
}

/// 语言对解析器
pub struct LanguagePairResolver {
    catalog: Arc<RecordCatalog>,
    pivot: String,
    pairs: SharedFetch<Vec<LanguagePair>>,
}

impl LanguagePairResolver {
    pub fn new(catalog: Arc<RecordCatalog>, pivot: impl Into<String>) -> Self {
        Self {
            catalog,
            pivot: pivot.into(),
            pairs: SharedFetch::new(),
        }
    }

    pub fn pivot(&self) -> &str {
        &self.pivot
    }

    pub fn catalog(&self) -> &Arc<RecordCatalog> {
        &self.catalog
    }

    /// 去重后的全部语言对
    pub async fn get_language_pairs(&self) -> TranslationResult<Arc<Vec<LanguagePair>>> {
        let catalog = Arc::clone(&self.catalog);
        self.pairs
            .get_or_fetch(move || async move {
                let records = catalog.get_model_records().await?;
                let pairs: BTreeSet<LanguagePair> = records.pairs();
                tracing::debug!("派生出 {} 个语言对", pairs.len());
                Ok(pairs.into_iter().collect())
            })
            .await
    }

    /// 失效语言对缓存
    pub fn invalidate(&self) {
        self.pairs.invalidate();
    }

    /// 支持的源语言和目标语言
    pub async fn supported_languages(&self) -> TranslationResult<SupportedLanguages> {
        let pairs = self.get_language_pairs().await?;
        let from: BTreeSet<String> = pairs.iter().map(|pair| pair.from_lang.clone()).collect();
        let to: BTreeSet<String> = pairs.iter().map(|pair| pair.to_lang.clone()).collect();
        Ok(SupportedLanguages {
            from_languages: from.into_iter().collect(),
            to_languages: to.into_iter().collect(),
        })
    }

    /// 为请求的语言对解析翻译路线
    pub async fn resolve_route(&self, from: &str, to: &str) -> TranslationResult<TranslationRoute> {
        let records = self.catalog.get_model_records().await?;
        resolve_route_in(&records, &self.pivot, from, to)
    }

    /// 在 `a` 与 `b` 之间双向翻译所需的最小记录集合
    ///
    /// `a` 是被管理的语言，`b` 是对端语言。`include_pivot_records` 为 false 时
    /// 不返回 `b` 与中转语言之间的记录，它们同时服务于其他语言对。
    pub async fn get_records_for_pair(
        &self,
        a: &str,
        b: &str,
        include_pivot_records: bool,
    ) -> TranslationResult<Vec<AssetRecord>> {
        let records = self.catalog.get_model_records().await?;
        let mut pairs: BTreeSet<LanguagePair> = BTreeSet::new();

        for (from, to) in [(a, b), (b, a)] {
            let direct = LanguagePair::new(from, to);
            if records.has_pair(&direct) {
                pairs.insert(direct);
                continue;
            }
            for leg in [
                LanguagePair::new(from, self.pivot.as_str()),
                LanguagePair::new(self.pivot.as_str(), to),
            ] {
                if leg.from_lang == leg.to_lang || !records.has_pair(&leg) {
                    continue;
                }
                let touches_a = leg.from_lang == a || leg.to_lang == a;
                if touches_a || include_pivot_records {
                    pairs.insert(leg);
                }
            }
        }

        Ok(records
            .records
            .values()
            .filter(|record| record.pair().map_or(false, |pair| pairs.contains(pair)))
            .cloned()
            .collect())
    }
}

/// 在给定记录中解析路线
pub fn resolve_route_in(
    records: &ModelRecords,
    pivot: &str,
    from: &str,
    to: &str,
) -> TranslationResult<TranslationRoute> {
    if from == to {
        return Err(TranslationError::NoModelError(format!(
            "源语言与目标语言相同: {}",
            from
        )));
    }

    let direct = LanguagePair::new(from, to);
    if records.has_pair(&direct) {
        return Ok(TranslationRoute::Direct(direct));
    }

    let first = LanguagePair::new(from, pivot);
    let second = LanguagePair::new(pivot, to);
    let has_first = from == pivot || records.has_pair(&first);
    let has_second = to == pivot || records.has_pair(&second);

    match (has_first, has_second) {
        (true, true) if from != pivot && to != pivot => Ok(TranslationRoute::Pivot { first, second }),
        (false, _) => Err(TranslationError::NoModelError(format!(
            "{} 没有直连模型，且缺少中转记录 {}",
            direct, first
        ))),
        (_, false) => Err(TranslationError::NoModelError(format!(
            "{} 没有直连模型，且缺少中转记录 {}",
            direct, second
        ))),
        _ => Err(TranslationError::NoModelError(format!("{} 没有模型", direct))),
    }
}

/// 在语言对中查找可以服务 `tag` 的源语言
pub fn find_compatible_source(tag: &str, pairs: &[LanguagePair]) -> Option<String> {
    let refined = refine_macro_language(tag);
    pairs
        .iter()
        .find(|pair| lang_tags_match(&pair.from_lang, &refined))
        .map(|pair| pair.from_lang.clone())
}

/// 在语言对中查找可以服务 `tag` 的目标语言
pub fn find_compatible_target(tag: &str, pairs: &[LanguagePair]) -> Option<String> {
    let refined = refine_macro_language(tag);
    pairs
        .iter()
        .find(|pair| lang_tags_match(&pair.to_lang, &refined))
        .map(|pair| pair.to_lang.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::storage::catalog::RecordMap;
    use crate::translation::storage::records::ModelFileType;

    fn records(pairs: &[(&str, &str)]) -> ModelRecords {
        let records: RecordMap = pairs
            .iter()
            .enumerate()
            .map(|(i, (from, to))| {
                let record = AssetRecord::model(
                    i.to_string(),
                    format!("model.{}{}", from, to),
                    "1.0",
                    ModelFileType::Model,
                    LanguagePair::new(*from, *to),
                );
                (record.id.clone(), record)
            })
            .collect();
        ModelRecords {
            records,
            pivot_gaps: Vec::new(),
        }
    }

    #[test]
    fn test_direct_route_preferred() {
        let records = records(&[("fr", "it"), ("fr", "en"), ("en", "it")]);
        let route = resolve_route_in(&records, "en", "fr", "it").unwrap();
        assert_eq!(route, TranslationRoute::Direct(LanguagePair::new("fr", "it")));
    }

    #[test]
    fn test_pivot_route() {
        let records = records(&[("fr", "en"), ("en", "it")]);
        let route = resolve_route_in(&records, "en", "fr", "it").unwrap();
        assert!(route.is_pivot());
        assert_eq!(
            route.legs(),
            vec![LanguagePair::new("fr", "en"), LanguagePair::new("en", "it")]
        );
    }

    #[test]
    fn test_missing_leg_is_named() {
        let records = records(&[("fr", "en")]);
        let error = resolve_route_in(&records, "en", "fr", "it").unwrap_err();
        match error {
            TranslationError::NoModelError(msg) => assert!(msg.contains("en -> it")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_to_pivot_without_direct_is_unsupported() {
        let records = records(&[("en", "fr")]);
        assert!(resolve_route_in(&records, "en", "fr", "en").is_err());
        assert!(resolve_route_in(&records, "en", "fr", "fr").is_err());
    }

    #[test]
    fn test_find_compatible_tags() {
        let pairs = vec![LanguagePair::new("es", "en"), LanguagePair::new("nb", "en")];
        assert_eq!(find_compatible_source("es-MX", &pairs).as_deref(), Some("es"));
        assert_eq!(find_compatible_source("no", &pairs).as_deref(), Some("nb"));
        assert_eq!(find_compatible_source("de", &pairs), None);
        assert_eq!(find_compatible_target("en-US", &pairs).as_deref(), Some("en"));
        assert_eq!(find_compatible_target("es", &pairs), None);
    }
}
