// 集成测试公共模块
//
// 提供测试记录构建、测试环境和会话协作方的模拟实现

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;

use translations_engine::translation::config::TranslationsConfig;
use translations_engine::translation::core::{
    BrowserHost, ContentActor, ContentMessage, EngineProcess, EngineRequest, EngineStatus,
    EngineStatusListener, LocalEngineHost, MessagePort, ResourceCatalogContext, SessionBindings,
    TranslationPortProvider, TranslationSession, WindowId,
};
use translations_engine::translation::error::{TranslationError, TranslationResult};
use translations_engine::translation::languages::StaticLocaleProvider;
use translations_engine::translation::storage::{
    AssetRecord, LanguagePair, MemoryCollection, ModelFileType,
};

/// 测试记录构建器
pub struct RecordBuilder;

impl RecordBuilder {
    /// 单个模型文件记录
    pub fn file(from: &str, to: &str, file_type: ModelFileType, version: &str) -> AssetRecord {
        AssetRecord::model(
            format!("{}{}-{}-{}", from, to, file_type, version),
            format!("{}.{}{}", file_type, from, to),
            version,
            file_type,
            LanguagePair::new(from, to),
        )
        .with_size(1000)
    }

    /// 一个语言对的完整文件集合（model + lex + vocab）
    pub fn bundle(from: &str, to: &str) -> Vec<AssetRecord> {
        Self::bundle_version(from, to, "1.0")
    }

    pub fn bundle_version(from: &str, to: &str, version: &str) -> Vec<AssetRecord> {
        [ModelFileType::Model, ModelFileType::Lex, ModelFileType::Vocab]
            .into_iter()
            .map(|file_type| Self::file(from, to, file_type, version))
            .collect()
    }

    /// 多个语言对的文件集合
    pub fn bundles(pairs: &[(&str, &str)]) -> Vec<AssetRecord> {
        pairs
            .iter()
            .flat_map(|(from, to)| Self::bundle(from, to))
            .collect()
    }

    pub fn wasm(version: &str) -> AssetRecord {
        AssetRecord::wasm(format!("wasm-{}", version), "bergamot-translator", version)
    }
}

/// 测试环境
pub struct TestEnvironment {
    pub models: Arc<MemoryCollection>,
    pub wasm: Arc<MemoryCollection>,
    pub context: Arc<ResourceCatalogContext>,
}

impl TestEnvironment {
    pub fn new(records: Vec<AssetRecord>) -> Self {
        Self::with_config(records, test_config(), StaticLocaleProvider::default())
    }

    pub fn with_locales(records: Vec<AssetRecord>, locales: StaticLocaleProvider) -> Self {
        Self::with_config(records, test_config(), locales)
    }

    pub fn with_config(
        records: Vec<AssetRecord>,
        config: TranslationsConfig,
        locales: StaticLocaleProvider,
    ) -> Self {
        let models = Arc::new(MemoryCollection::new("translations-models", records));
        let wasm = Arc::new(MemoryCollection::new(
            "translations-wasm",
            vec![RecordBuilder::wasm("1.0")],
        ));
        let context = ResourceCatalogContext::new(
            config,
            models.clone(),
            wasm.clone(),
            Arc::new(locales),
        )
        .expect("test context should be valid");
        Self {
            models,
            wasm,
            context,
        }
    }
}

/// 测试使用的配置：不进入混沌模式，下载重试一次
pub fn test_config() -> TranslationsConfig {
    TranslationsConfig {
        max_download_retries: 1,
        validate_pivots: true,
        chaos_mode: false,
        ..Default::default()
    }
}

/// 英语用户的区域设置
pub fn english_user() -> StaticLocaleProvider {
    StaticLocaleProvider {
        accept_languages: vec!["en-US".to_string(), "en".to_string()],
        app_locale: "en-US".to_string(),
        os_locales: vec!["en-US".to_string()],
    }
}

/// 记录发往内容侧消息的模拟内容端
#[derive(Default)]
pub struct RecordingContent {
    pub document_lang: Mutex<Option<String>>,
    pub identified_language: Mutex<Option<String>>,
    pub identify_calls: AtomicUsize,
    pub sent: Mutex<Vec<String>>,
}

impl RecordingContent {
    pub fn identifying(language: &str) -> Self {
        Self {
            identified_language: Mutex::new(Some(language.to_string())),
            ..Default::default()
        }
    }

    /// 只在被查询时才给出 `<html lang>` 的内容端
    pub fn declaring(language: &str) -> Self {
        Self {
            document_lang: Mutex::new(Some(language.to_string())),
            ..Default::default()
        }
    }

    pub fn sent_messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentActor for RecordingContent {
    async fn query_document_element_lang(&self) -> Option<String> {
        self.document_lang.lock().unwrap().clone()
    }

    async fn query_identify_language(&self) -> Option<String> {
        self.identify_calls.fetch_add(1, Ordering::SeqCst);
        self.identified_language.lock().unwrap().clone()
    }

    fn send(&self, message: ContentMessage) -> TranslationResult<()> {
        let description = match message {
            ContentMessage::TranslatePage {
                from_language,
                to_language,
                ..
            } => format!("TranslatePage {},{}", from_language, to_language),
            ContentMessage::AcquirePort { .. } => "AcquirePort".to_string(),
        };
        self.sent.lock().unwrap().push(description);
        Ok(())
    }
}

/// 记录重新加载请求的模拟浏览器
#[derive(Default)]
pub struct RecordingHost {
    pub selected: Mutex<Option<u64>>,
    pub reloads: Mutex<Vec<(WindowId, u64)>>,
}

impl RecordingHost {
    pub fn selecting(inner_window_id: u64) -> Self {
        Self {
            selected: Mutex::new(Some(inner_window_id)),
            ..Default::default()
        }
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.lock().unwrap().len()
    }
}

impl BrowserHost for RecordingHost {
    fn selected_inner_window_id(&self, _window: WindowId) -> Option<u64> {
        *self.selected.lock().unwrap()
    }

    fn reload(&self, window: WindowId, inner_window_id: u64) {
        self.reloads.lock().unwrap().push((window, inner_window_id));
    }
}

/// 记录启动请求的模拟引擎
#[derive(Default)]
pub struct RecordingEngine {
    pub started: Mutex<Vec<(LanguagePair, usize)>>,
    pub discarded: Mutex<Vec<u64>>,
    pub unreachable: AtomicBool,
    pub fail_discard: AtomicBool,
}

#[async_trait]
impl EngineProcess for RecordingEngine {
    async fn start(&self, request: EngineRequest) -> TranslationResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(TranslationError::InternalError("engine process gone".into()));
        }
        self.started
            .lock()
            .unwrap()
            .push((request.pair.clone(), request.payload.models.len()));
        request.report(EngineStatus::Ready);
        Ok(())
    }

    async fn discard(&self, inner_window_id: u64) -> TranslationResult<()> {
        self.discarded.lock().unwrap().push(inner_window_id);
        if self.fail_discard.load(Ordering::SeqCst) {
            return Err(TranslationError::PortCreationError("engine process gone".into()));
        }
        Ok(())
    }
}

/// 不创建端口的端口提供者
pub struct NoopPorts;

#[async_trait]
impl TranslationPortProvider for NoopPorts {
    async fn request_port(
        &self,
        _from_language: &str,
        _to_language: &str,
        _owner: Option<Weak<dyn EngineStatusListener>>,
    ) -> TranslationResult<Option<MessagePort>> {
        Ok(None)
    }

    async fn discard_translations(&self, _inner_window_id: u64) -> TranslationResult<()> {
        Ok(())
    }
}

/// 会话测试夹具
pub struct SessionFixture {
    pub env: TestEnvironment,
    pub content: Arc<RecordingContent>,
    pub host: Arc<RecordingHost>,
    pub engine: Arc<RecordingEngine>,
    pub window: WindowId,
}

impl SessionFixture {
    pub fn new(env: TestEnvironment, content: RecordingContent) -> Self {
        let window = env.context.windows().open_window();
        Self {
            env,
            content: Arc::new(content),
            host: Arc::new(RecordingHost::default()),
            engine: Arc::new(RecordingEngine::default()),
            window,
        }
    }

    fn bindings(&self) -> SessionBindings {
        let ports: Arc<dyn TranslationPortProvider> = Arc::new(LocalEngineHost::new(
            Arc::clone(self.env.context.assets()),
            self.engine.clone(),
        ));
        SessionBindings {
            content: self.content.clone(),
            host: self.host.clone(),
            ports,
        }
    }

    /// 为当前窗口创建一个新的文档会话，并把它设为选中文档
    pub fn open_document(&self, inner_window_id: u64) -> Arc<TranslationSession> {
        *self.host.selected.lock().unwrap() = Some(inner_window_id);
        TranslationSession::new(
            Arc::clone(&self.env.context),
            self.bindings(),
            self.window,
            inner_window_id,
        )
    }

    pub fn started_pairs(&self) -> Vec<LanguagePair> {
        self.engine
            .started
            .lock()
            .unwrap()
            .iter()
            .map(|(pair, _)| pair.clone())
            .collect()
    }
}
