//! 资源目录上下文
//!
//! 进程范围内共享的组件集中在这里，由应用根部持有并注入到每个会话中。
//! 失效操作是上下文上的方法调用，测试之间互不影响。

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use super::events::EventBus;
use super::prefs::PreferenceStore;
use super::state::LanguageStateEvent;
use super::window::WindowRegistry;
use crate::translation::config::TranslationsConfig;
use crate::translation::error::TranslationResult;
use crate::translation::languages::pairs::LanguagePairResolver;
use crate::translation::languages::preferred::{LocaleProvider, PreferredLanguageRanker};
use crate::translation::pipeline::assets::AssetManager;
use crate::translation::pipeline::download::DownloadManager;
use crate::translation::storage::catalog::RecordCatalog;
use crate::translation::storage::collection::RecordCollection;
use crate::translation::storage::sync::RemoteRecordSyncHandler;

/// 进程范围的翻译资源上下文
pub struct ResourceCatalogContext {
    config: Arc<TranslationsConfig>,
    prefs: Arc<PreferenceStore>,
    catalog: Arc<RecordCatalog>,
    pairs: Arc<LanguagePairResolver>,
    ranker: Arc<PreferredLanguageRanker>,
    assets: Arc<AssetManager>,
    sync: Arc<RemoteRecordSyncHandler>,
    windows: WindowRegistry,
    offered_hosts: Mutex<HashSet<String>>,
    state_events: Arc<EventBus<LanguageStateEvent>>,
}

impl ResourceCatalogContext {
    pub fn new(
        config: TranslationsConfig,
        models: Arc<dyn RecordCollection>,
        wasm: Arc<dyn RecordCollection>,
        locales: Arc<dyn LocaleProvider>,
    ) -> TranslationResult<Arc<Self>> {
        config.validate()?;
        let config = Arc::new(config);

        let prefs = Arc::new(PreferenceStore::new(config.automatic_offer));
        let catalog = Arc::new(RecordCatalog::new(models, wasm, Arc::clone(&config)));
        let pairs = Arc::new(LanguagePairResolver::new(
            Arc::clone(&catalog),
            config.pivot_language.clone(),
        ));
        let ranker = PreferredLanguageRanker::new(
            Arc::clone(&prefs),
            locales,
            config.most_recent_capacity,
        );
        let assets = Arc::new(AssetManager::new(
            Arc::clone(&catalog),
            Arc::clone(&pairs),
            DownloadManager::from_config(&config),
        ));
        let sync = Arc::new(RemoteRecordSyncHandler::new(
            Arc::clone(&catalog),
            Arc::clone(&pairs),
        ));

        tracing::info!(
            "翻译资源上下文已创建: 版本范围 [{}, {}], 中转语言 {}",
            config.min_major_version,
            config.max_major_version,
            config.pivot_language
        );

        Ok(Arc::new(Self {
            config,
            prefs,
            catalog,
            pairs,
            ranker,
            assets,
            sync,
            windows: WindowRegistry::new(),
            offered_hosts: Mutex::new(HashSet::new()),
            state_events: Arc::new(EventBus::new()),
        }))
    }

    pub fn config(&self) -> &Arc<TranslationsConfig> {
        &self.config
    }

    pub fn prefs(&self) -> &Arc<PreferenceStore> {
        &self.prefs
    }

    pub fn catalog(&self) -> &Arc<RecordCatalog> {
        &self.catalog
    }

    pub fn pairs(&self) -> &Arc<LanguagePairResolver> {
        &self.pairs
    }

    pub fn ranker(&self) -> &Arc<PreferredLanguageRanker> {
        &self.ranker
    }

    pub fn assets(&self) -> &Arc<AssetManager> {
        &self.assets
    }

    pub fn sync_handler(&self) -> &Arc<RemoteRecordSyncHandler> {
        &self.sync
    }

    pub fn windows(&self) -> &WindowRegistry {
        &self.windows
    }

    /// 语言状态变更通知
    pub fn state_events(&self) -> &Arc<EventBus<LanguageStateEvent>> {
        &self.state_events
    }

    /// 记录已向某个主机提供过翻译，首次记录时返回 true
    pub fn mark_host_offered(&self, host: &str) -> bool {
        self.offered_hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(host.to_string())
    }

    /// 失效所有派生缓存
    pub fn invalidate(&self) {
        self.catalog.invalidate_all();
        self.pairs.invalidate();
        self.ranker.invalidate_all();
        tracing::debug!("翻译资源缓存已全部失效");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::error::TranslationError;
    use crate::translation::languages::preferred::StaticLocaleProvider;
    use crate::translation::storage::catalog::CollectionKind;
    use crate::translation::storage::collection::MemoryCollection;
    use crate::translation::storage::records::{AssetRecord, LanguagePair, ModelFileType};

    fn context() -> Arc<ResourceCatalogContext> {
        let models = Arc::new(MemoryCollection::new(
            "translations-models",
            vec![AssetRecord::model(
                "1",
                "model.enfr",
                "1.0",
                ModelFileType::Model,
                LanguagePair::new("en", "fr"),
            )],
        ));
        let wasm = Arc::new(MemoryCollection::new("translations-wasm", Vec::new()));
        ResourceCatalogContext::new(
            TranslationsConfig::default(),
            models,
            wasm,
            Arc::new(StaticLocaleProvider::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TranslationsConfig {
            min_major_version: 0,
            ..Default::default()
        };
        let result = ResourceCatalogContext::new(
            config,
            Arc::new(MemoryCollection::new("m", Vec::new())),
            Arc::new(MemoryCollection::new("w", Vec::new())),
            Arc::new(StaticLocaleProvider::default()),
        );
        assert!(matches!(result, Err(TranslationError::ConfigError(_))));
    }

    #[test]
    fn test_host_offered_once() {
        let context = context();
        assert!(context.mark_host_offered("example.com"));
        assert!(!context.mark_host_offered("example.com"));
        assert!(context.mark_host_offered("example.org"));
    }

    #[tokio::test]
    async fn test_invalidate_clears_caches() {
        let context = context();
        assert_eq!(context.pairs().get_language_pairs().await.unwrap().len(), 1);
        assert!(context.catalog().is_cached(CollectionKind::Models));

        context.invalidate();
        assert!(!context.catalog().is_cached(CollectionKind::Models));
    }
}
