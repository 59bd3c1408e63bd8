//! 记录目录与语言对解析集成测试
//!
//! 测试版本选择、中转语言解析、中转完整性和同步处理

use std::collections::HashSet;

use translations_engine::translation::error::TranslationError;
use translations_engine::translation::languages::{find_compatible_source, TranslationRoute};
use translations_engine::translation::storage::{
    CollectionKind, LanguagePair, ModelFileType, RecordCollection, RecordUpdate, SyncEvent,
};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{RecordBuilder, TestEnvironment};

/// 直连语言对：带地区的文档语言匹配到基础语言
#[tokio::test]
async fn test_direct_pair_compatible_source() {
    let env = TestEnvironment::new(RecordBuilder::bundles(&[("es", "en"), ("en", "es")]));

    let pairs = env.context.pairs().get_language_pairs().await.unwrap();
    assert_eq!(find_compatible_source("es-MX", &pairs).as_deref(), Some("es"));
    assert_eq!(find_compatible_source("pt-BR", &pairs), None);

    println!("✅ Direct pair compatibility test passed");
}

/// 中转回退：只有 fr->en 与 en->it 时，fr->it 需要获取两段模型
#[tokio::test]
async fn test_pivot_fallback_fetches_both_payloads() {
    let env = TestEnvironment::new(RecordBuilder::bundles(&[
        ("fr", "en"),
        ("en", "fr"),
        ("en", "it"),
        ("it", "en"),
    ]));

    let payload = env
        .context
        .assets()
        .translation_payload("fr", "it")
        .await
        .expect("pivot route should resolve");

    assert_eq!(
        payload.route,
        TranslationRoute::Pivot {
            first: LanguagePair::new("fr", "en"),
            second: LanguagePair::new("en", "it"),
        }
    );
    assert_eq!(payload.models.len(), 2);
    assert_eq!(payload.models[0].pair, LanguagePair::new("fr", "en"));
    assert_eq!(payload.models[1].pair, LanguagePair::new("en", "it"));
    assert!(!payload.wasm.is_empty());

    let downloaded = env.models.downloaded_ids();
    for record in RecordBuilder::bundle("fr", "en")
        .iter()
        .chain(RecordBuilder::bundle("en", "it").iter())
    {
        assert!(downloaded.contains(&record.id), "{} should be downloaded", record.id);
    }
    assert!(!downloaded.contains(&RecordBuilder::bundle("en", "fr")[0].id));
}

/// 缺少中转腿时报告具体缺失的一段
#[tokio::test]
async fn test_missing_pivot_leg_is_no_model_error() {
    let env = TestEnvironment::new(RecordBuilder::bundles(&[("fr", "en"), ("en", "fr")]));

    let error = env
        .context
        .assets()
        .translation_payload("fr", "ja")
        .await
        .unwrap_err();
    match error {
        TranslationError::NoModelError(msg) => assert!(msg.contains("en -> ja"), "{}", msg),
        other => panic!("unexpected error: {:?}", other),
    }
}

/// 中转完整性：缺少中转腿的语言对被移除，其余语言对不受影响
#[tokio::test]
async fn test_pivot_completeness() {
    let mut records = RecordBuilder::bundles(&[("fr", "en"), ("en", "fr")]);
    records.extend(RecordBuilder::bundle("it", "de"));
    let env = TestEnvironment::new(records);

    let model_records = env.context.catalog().get_model_records().await.unwrap();
    assert!(!model_records.pivot_gaps.is_empty());
    assert!(model_records
        .pivot_gaps
        .iter()
        .all(|gap| gap.pair == LanguagePair::new("it", "de")));

    let pairs = env.context.pairs().get_language_pairs().await.unwrap();
    let available: HashSet<LanguagePair> = pairs.iter().cloned().collect();
    assert!(!available.contains(&LanguagePair::new("it", "de")));

    for pair in pairs.iter() {
        let direct = available.contains(pair);
        let via_pivot = available.contains(&LanguagePair::new(pair.from_lang.as_str(), "en"))
            && available.contains(&LanguagePair::new("en", pair.to_lang.as_str()));
        assert!(direct || via_pivot, "{} is not servable", pair);
    }
}

/// 版本选择：范围内最大的版本胜出，范围外的版本永不被选中
#[tokio::test]
async fn test_newest_compatible_version_selected() {
    let mut records = Vec::new();
    for version in ["1.0", "1.2", "1.1a1", "2.0", "0.9"] {
        records.extend(RecordBuilder::bundle_version("fr", "en", version));
        records.extend(RecordBuilder::bundle_version("en", "fr", version));
    }
    let env = TestEnvironment::new(records);

    let model_records = env.context.catalog().get_model_records().await.unwrap();
    let selected = model_records.records_for_pair(&LanguagePair::new("fr", "en"));
    assert_eq!(selected.len(), 3);
    assert!(selected.iter().all(|record| record.version == "1.2"));
}

/// 并发调用者共享一次获取
#[tokio::test]
async fn test_concurrent_callers_share_fetch() {
    let env = TestEnvironment::new(RecordBuilder::bundles(&[("fr", "en"), ("en", "fr")]));
    let catalog = env.context.catalog();

    let (first, second) = tokio::join!(catalog.get_model_records(), catalog.get_model_records());
    assert!(std::sync::Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
}

/// 幂等同步：重复应用空同步事件得到相同的目录
#[tokio::test]
async fn test_idempotent_empty_sync() {
    let env = TestEnvironment::new(RecordBuilder::bundles(&[("fr", "en"), ("en", "fr")]));
    let sync = env.context.sync_handler();

    let before = env.context.catalog().get_model_records().await.unwrap();
    let event = SyncEvent::default();
    sync.on_sync(CollectionKind::Models, &event).await;
    let once = env.context.catalog().get_model_records().await.unwrap();
    sync.on_sync(CollectionKind::Models, &event).await;
    let twice = env.context.catalog().get_model_records().await.unwrap();

    assert_eq!(before.records, once.records);
    assert_eq!(once.records, twice.records);
}

/// 同步更新：已下载的旧附件被新版本替换
#[tokio::test]
async fn test_sync_replaces_downloaded_attachments() {
    let records = RecordBuilder::bundles(&[("fr", "en"), ("en", "fr")]);
    let env = TestEnvironment::new(records.clone());

    env.context
        .assets()
        .download_language_files("fr")
        .await
        .unwrap();

    let old = RecordBuilder::file("fr", "en", ModelFileType::Model, "1.0");
    let new = RecordBuilder::file("fr", "en", ModelFileType::Model, "1.1");
    let deleted = RecordBuilder::file("en", "fr", ModelFileType::Lex, "1.0");

    let mut updated_records: Vec<_> = records
        .into_iter()
        .filter(|record| record.id != old.id && record.id != deleted.id)
        .collect();
    updated_records.push(new.clone());
    env.models.set_records(updated_records);

    let event = SyncEvent {
        created: Vec::new(),
        updated: vec![RecordUpdate {
            old: old.clone(),
            new: new.clone(),
        }],
        deleted: vec![deleted.clone()],
    };
    let report = env
        .context
        .sync_handler()
        .on_sync(CollectionKind::Models, &event)
        .await;

    assert_eq!(report.replaced_attachments, 1);
    assert_eq!(report.deleted_attachments, 1);
    assert!(report.failures.is_empty());
    assert!(!env.models.is_downloaded(&old).await.unwrap());
    assert!(env.models.is_downloaded(&new).await.unwrap());
    assert!(!env.models.is_downloaded(&deleted).await.unwrap());

    let refreshed = env.context.catalog().get_model_records().await.unwrap();
    assert!(refreshed.records.contains_key(&new.id));
}

/// 未下载的旧附件在更新时不会被下载
#[tokio::test]
async fn test_sync_skips_attachments_never_downloaded() {
    let env = TestEnvironment::new(RecordBuilder::bundles(&[("fr", "en"), ("en", "fr")]));

    let old = RecordBuilder::file("fr", "en", ModelFileType::Model, "1.0");
    let new = RecordBuilder::file("fr", "en", ModelFileType::Model, "1.1");
    let event = SyncEvent {
        updated: vec![RecordUpdate { old, new: new.clone() }],
        ..Default::default()
    };
    let report = env
        .context
        .sync_handler()
        .on_sync(CollectionKind::Models, &event)
        .await;

    assert_eq!(report.replaced_attachments, 0);
    assert!(!env.models.is_downloaded(&new).await.unwrap());
}
