//! 翻译会话状态机
//!
//! 每个文档一个会话，决定 检测 → 提供/自动翻译 → 翻译 → 还原 的转换，
//! 管理跨进程端口的交接，并在页面重新加载后继续之前的翻译。
//!
//! 会话销毁后不会继续任何进行中的检测或翻译：每个等待点之后都会检查
//! 存活标志，然后才修改状态。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use async_trait::async_trait;
use url::Url;

use super::context::ResourceCatalogContext;
use super::port::{EngineStatus, EngineStatusListener, MessagePort, TranslationPortProvider};
use super::prefs::PrefKey;
use super::state::{LangTags, LanguageSnapshot, LanguageState, SessionPhase};
use super::window::WindowId;
use crate::translation::error::{helpers, TranslationError, TranslationResult};
use crate::translation::languages::pairs::find_compatible_source;
use crate::translation::languages::tags::{base_language, canonicalize, lang_tags_match};
use crate::translation::storage::records::LanguagePair;

/// 发往内容侧的消息
#[derive(Debug)]
pub enum ContentMessage {
    TranslatePage {
        from_language: String,
        to_language: String,
        port: MessagePort,
    },
    AcquirePort {
        port: MessagePort,
    },
}

/// 来自内容侧的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildMessage {
    ReportLangTags {
        document_element_lang: Option<String>,
        href: String,
    },
    RequestPort,
    ReportFirstVisibleChange,
}

/// 内容侧查询接口
///
/// 文档已离开时查询可能得不到回应，这与返回 `None` 同等对待。
#[async_trait]
pub trait ContentActor: Send + Sync {
    async fn query_document_element_lang(&self) -> Option<String>;
    async fn query_identify_language(&self) -> Option<String>;
    fn send(&self, message: ContentMessage) -> TranslationResult<()>;
}

/// 浏览器窗口操作
pub trait BrowserHost: Send + Sync {
    /// 窗口当前选中文档的 id
    fn selected_inner_window_id(&self, window: WindowId) -> Option<u64>;
    /// 强制重新加载文档
    fn reload(&self, window: WindowId, inner_window_id: u64);
}

/// 会话的外部协作方
#[derive(Clone)]
pub struct SessionBindings {
    pub content: Arc<dyn ContentActor>,
    pub host: Arc<dyn BrowserHost>,
    pub ports: Arc<dyn TranslationPortProvider>,
}

/// 文档翻译会话
pub struct TranslationSession {
    me: Weak<TranslationSession>,
    context: Arc<ResourceCatalogContext>,
    bindings: SessionBindings,
    window: WindowId,
    inner_window_id: u64,
    state: LanguageState,
    href: Mutex<Option<String>>,
    alive: AtomicBool,
}

impl TranslationSession {
    pub fn new(
        context: Arc<ResourceCatalogContext>,
        bindings: SessionBindings,
        window: WindowId,
        inner_window_id: u64,
    ) -> Arc<Self> {
        let events = Arc::clone(context.state_events());
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            context,
            bindings,
            window,
            inner_window_id,
            state: LanguageState::new(inner_window_id, events),
            href: Mutex::new(None),
            alive: AtomicBool::new(true),
        })
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn inner_window_id(&self) -> u64 {
        self.inner_window_id
    }

    pub fn language_state(&self) -> LanguageSnapshot {
        self.state.snapshot()
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn href(&self) -> Option<String> {
        self.href
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 当前文档的来源，用于按站点的偏好
    pub fn origin(&self) -> Option<String> {
        let href = self.href()?;
        let url = Url::parse(&href).ok()?;
        let origin = url.origin();
        origin.is_tuple().then(|| origin.ascii_serialization())
    }

    fn host_name(&self) -> Option<String> {
        let href = self.href()?;
        Url::parse(&href).ok()?.host_str().map(str::to_string)
    }

    /// 处理内容侧消息
    pub async fn handle_child_message(&self, message: ChildMessage) -> TranslationResult<()> {
        match message {
            ChildMessage::ReportLangTags {
                document_element_lang,
                href,
            } => {
                self.on_report_lang_tags(document_element_lang, href).await;
                Ok(())
            }
            ChildMessage::RequestPort => self.acquire_port().await,
            ChildMessage::ReportFirstVisibleChange => {
                self.state.set_has_visible_change(true);
                if self.state.phase() == SessionPhase::Translating {
                    self.state.set_phase(SessionPhase::Translated);
                }
                Ok(())
            }
        }
    }

    async fn on_report_lang_tags(&self, document_element_lang: Option<String>, href: String) {
        if !self.is_alive() {
            return;
        }
        *self.href.lock().unwrap_or_else(PoisonError::into_inner) = Some(href);

        let stashed = self
            .context
            .windows()
            .with_state(self.window, |window| window.translate_on_page_reload.take())
            .flatten();
        if let Some(pair) = stashed {
            tracing::info!("页面重新加载后继续翻译 {}", pair);
            if let Err(e) = self.translate(&pair.from_lang, &pair.to_lang).await {
                tracing::warn!("重新加载后的翻译失败: {}", e);
            }
            return;
        }

        // 还原标志只对还原后的第一次检测生效，不论检测结果如何都在这里消费
        let was_restored = self
            .context
            .windows()
            .with_state(self.window, |window| std::mem::take(&mut window.is_page_restored))
            .unwrap_or(false);

        let declared = match document_element_lang.filter(|tag| !tag.trim().is_empty()) {
            Some(tag) => Some(tag),
            None => {
                let queried = self.bindings.content.query_document_element_lang().await;
                if !self.is_alive() {
                    return;
                }
                queried
            }
        };

        let Some(tags) = self.detect_languages(declared.as_deref()).await else {
            return;
        };
        if tags.user_lang_tag.is_some() && tags.is_doc_lang_tag_supported {
            self.maybe_offer_or_auto_translate(&tags, was_restored).await;
        }
    }

    /// 检测文档语言并计算目标语言
    ///
    /// 会话在等待期间被销毁时返回 `None`。
    pub async fn detect_languages(&self, declared: Option<&str>) -> Option<LangTags> {
        self.state.set_phase(SessionPhase::Detecting);

        let pairs = match self.context.pairs().get_language_pairs().await {
            Ok(pairs) => pairs,
            Err(e) => {
                if self.is_alive() {
                    tracing::warn!("语言检测失败，无法获取语言对: {}", e);
                    self.state.set_phase(SessionPhase::Unsupported);
                }
                return None;
            }
        };
        if !self.is_alive() {
            return None;
        }

        let declared = declared.map(str::trim).filter(|tag| !tag.is_empty());
        let mut doc_lang_tag = declared.and_then(|tag| find_compatible_source(tag, &pairs));
        if doc_lang_tag.is_none() {
            doc_lang_tag = declared
                .and_then(canonicalize)
                .and_then(|tag| find_compatible_source(&tag, &pairs));
        }

        let mut recorded_tag = doc_lang_tag.clone().or_else(|| declared.and_then(canonicalize));
        if doc_lang_tag.is_none() {
            let identified = self.bindings.content.query_identify_language().await;
            if !self.is_alive() {
                return None;
            }
            if let Some(identified) = identified.as_deref().and_then(canonicalize) {
                doc_lang_tag = find_compatible_source(&identified, &pairs);
                recorded_tag = doc_lang_tag.clone().or(Some(identified));
            }
        }

        let is_doc_lang_tag_supported = doc_lang_tag.is_some();
        let user_lang_tag = match doc_lang_tag.as_deref() {
            Some(doc) => {
                let top = self
                    .context
                    .ranker()
                    .top_preferred_supported_to_lang(&pairs, self.context.pairs().pivot());
                if base_language(&top) == base_language(doc) || self.is_known_language(doc) {
                    tracing::debug!("文档语言 {} 是用户已知语言，不提供翻译", doc);
                    None
                } else {
                    Some(top)
                }
            }
            None => None,
        };

        let tags = LangTags {
            doc_lang_tag: recorded_tag,
            user_lang_tag,
            is_doc_lang_tag_supported,
        };
        tracing::info!(
            "文档 {} 检测结果: {:?} -> {:?}",
            self.inner_window_id,
            tags.doc_lang_tag,
            tags.user_lang_tag
        );

        self.state.set_detected_languages(Some(tags.clone()));
        self.state.set_phase(if tags.user_lang_tag.is_some() {
            SessionPhase::Supported
        } else {
            SessionPhase::Unsupported
        });
        Some(tags)
    }

    fn is_known_language(&self, tag: &str) -> bool {
        self.context
            .ranker()
            .user_settings_languages()
            .iter()
            .any(|known| lang_tags_match(&base_language(known), tag))
    }

    async fn maybe_offer_or_auto_translate(&self, tags: &LangTags, was_restored: bool) {
        let (Some(doc), Some(user)) = (tags.doc_lang_tag.as_deref(), tags.user_lang_tag.as_deref()) else {
            return;
        };

        let prefs = self.context.prefs();
        let never_language = prefs.list_contains_language(PrefKey::NeverTranslateLanguages, doc);
        let never_site = self
            .origin()
            .map_or(false, |origin| prefs.never_translate_site(&origin));
        if never_language || never_site {
            tracing::debug!("{} 在永不翻译列表中", doc);
            return;
        }

        let always = prefs.list_contains_language(PrefKey::AlwaysTranslateLanguages, doc);
        if always && !was_restored {
            self.state.set_phase(SessionPhase::AutoTranslating);
            if let Err(e) = self.translate(doc, user).await {
                tracing::warn!("自动翻译 {} -> {} 失败: {}", doc, user, e);
            }
            return;
        }

        self.maybe_offer(doc, user);
    }

    fn maybe_offer(&self, doc: &str, user: &str) {
        let config = self.context.config();
        if config.is_automation && !config.automation_testing {
            return;
        }
        if !self.context.prefs().automatic_offer() {
            return;
        }
        if self.bindings.host.selected_inner_window_id(self.window) != Some(self.inner_window_id) {
            tracing::debug!("文档 {} 已不是当前页面，不提供翻译", self.inner_window_id);
            return;
        }
        let Some(host) = self.host_name() else {
            return;
        };
        if !self.context.mark_host_offered(&host) {
            return;
        }

        tracing::info!("向 {} 提供翻译 {} -> {}", host, doc, user);
        self.state.set_phase(SessionPhase::Offered);
    }

    /// 翻译页面
    ///
    /// 已在翻译其他语言对时，先还原页面，重新加载后再翻译新的语言对。
    pub async fn translate(&self, from_language: &str, to_language: &str) -> TranslationResult<()> {
        if !self.is_alive() {
            return Ok(());
        }
        let pair = LanguagePair::new(from_language, to_language);

        if self.state.requested_translation_pair().is_some() {
            tracing::info!("已在翻译中，还原页面后翻译 {}", pair);
            self.restore_page();
            self.context.windows().with_state(self.window, |window| {
                window.translate_on_page_reload = Some(pair);
            });
            return Ok(());
        }

        self.state.set_requested_translation_pair(Some(pair.clone()));
        self.state.set_phase(SessionPhase::Translating);

        let owner: Weak<dyn EngineStatusListener> = self.me.clone();
        let port = self
            .bindings
            .ports
            .request_port(from_language, to_language, Some(owner))
            .await;
        if !self.is_alive() {
            return Ok(());
        }

        let result = match port {
            Ok(Some(port)) => self.bindings.content.send(ContentMessage::TranslatePage {
                from_language: from_language.to_string(),
                to_language: to_language.to_string(),
                port,
            }),
            Ok(None) => Err(TranslationError::PortCreationError(format!(
                "{} 没有可用的翻译端口",
                pair
            ))),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::error!("翻译 {} 失败: {}", pair, e);
            self.state.set_error(Some(e.clone()));
            self.state.set_phase(SessionPhase::Supported);
            return Err(e);
        }
        self.context.ranker().record_most_recent_target(to_language);
        Ok(())
    }

    /// 还原页面
    ///
    /// 当前语言对暂存到窗口状态，页面重新加载后直接进入翻译；同时设置一次性的
    /// 还原标志，下一次检测不会自动翻译。
    pub fn restore_page(&self) {
        if !self.is_alive() {
            return;
        }
        let pair = self.state.requested_translation_pair();
        self.context.windows().with_state(self.window, |window| {
            window.translate_on_page_reload = pair;
            window.is_page_restored = true;
        });

        self.state.set_requested_translation_pair(None);
        self.state.set_phase(SessionPhase::Restored);
        tracing::info!("还原文档 {}", self.inner_window_id);
        self.bindings.host.reload(self.window, self.inner_window_id);
    }

    /// 内容侧重新请求端口
    async fn acquire_port(&self) -> TranslationResult<()> {
        let Some(pair) = self.state.requested_translation_pair() else {
            tracing::debug!("没有请求的语言对，忽略端口请求");
            return Ok(());
        };

        let owner: Weak<dyn EngineStatusListener> = self.me.clone();
        let port = self
            .bindings
            .ports
            .request_port(&pair.from_lang, &pair.to_lang, Some(owner))
            .await;
        if !self.is_alive() {
            return Ok(());
        }

        let result = match port {
            Ok(Some(port)) => self.bindings.content.send(ContentMessage::AcquirePort { port }),
            Ok(None) => Err(TranslationError::PortCreationError(format!(
                "{} 没有可用的翻译端口",
                pair
            ))),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            self.state.set_error(Some(e.clone()));
        }
        result
    }

    /// 切换始终翻译某个语言，返回切换后的状态
    ///
    /// 打开时从永不翻译列表中移除，并在页面未翻译时立即翻译。
    pub async fn toggle_always_translate_language(&self, tag: &str) -> TranslationResult<bool> {
        let prefs = self.context.prefs();
        let enabled = prefs.toggle_language(PrefKey::AlwaysTranslateLanguages, tag);
        if enabled {
            prefs.remove_language(PrefKey::NeverTranslateLanguages, tag);
            if self.state.requested_translation_pair().is_none() {
                if let Some(LangTags {
                    doc_lang_tag: Some(doc),
                    user_lang_tag: Some(user),
                    ..
                }) = self.state.detected_languages()
                {
                    if base_language(&doc) == base_language(tag) {
                        self.translate(&doc, &user).await?;
                    }
                }
            }
        }
        Ok(enabled)
    }

    /// 切换永不翻译某个语言，返回切换后的状态
    ///
    /// 打开时从始终翻译列表中移除，并还原已翻译的页面。
    pub fn toggle_never_translate_language(&self, tag: &str) -> bool {
        let prefs = self.context.prefs();
        let enabled = prefs.toggle_language(PrefKey::NeverTranslateLanguages, tag);
        if enabled {
            prefs.remove_language(PrefKey::AlwaysTranslateLanguages, tag);
            if self.state.requested_translation_pair().is_some() {
                self.restore_page();
            }
        }
        enabled
    }

    /// 当前站点是否永不翻译
    pub fn never_translate_site(&self) -> bool {
        self.origin()
            .map_or(false, |origin| self.context.prefs().never_translate_site(&origin))
    }

    /// 设置当前站点永不翻译
    pub fn set_never_translate_site(&self, never: bool) -> TranslationResult<()> {
        let origin = self.origin().ok_or_else(|| {
            helpers::internal_error("当前文档没有可用的来源")
        })?;
        self.context.prefs().set_never_translate_site(&origin, never);
        if never && self.state.requested_translation_pair().is_some() {
            self.restore_page();
        }
        Ok(())
    }

    /// 偏好语言变化后重新计算目标语言，只替换 `user_lang_tag`
    pub async fn refresh_user_lang_tag(&self) -> TranslationResult<()> {
        let Some(tags) = self.state.detected_languages() else {
            return Ok(());
        };
        let Some(doc) = tags.doc_lang_tag.clone().filter(|_| tags.is_doc_lang_tag_supported) else {
            return Ok(());
        };

        let pairs = self.context.pairs().get_language_pairs().await?;
        if !self.is_alive() {
            return Ok(());
        }

        let top = self
            .context
            .ranker()
            .top_preferred_supported_to_lang(&pairs, self.context.pairs().pivot());
        let user_lang_tag = if base_language(&top) == base_language(&doc) || self.is_known_language(&doc) {
            None
        } else {
            Some(top)
        };

        if user_lang_tag != tags.user_lang_tag {
            self.state
                .set_detected_languages(Some(tags.with_user_lang_tag(user_lang_tag)));
        }
        Ok(())
    }

    /// 销毁会话
    ///
    /// 之后所有进行中的逻辑都不再修改状态。通知引擎丢弃该文档的翻译，
    /// 忽略通知本身的错误。
    pub async fn destroy(&self) {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        tracing::debug!("销毁文档 {} 的翻译会话", self.inner_window_id);
        if let Err(e) = self
            .bindings
            .ports
            .discard_translations(self.inner_window_id)
            .await
        {
            tracing::warn!("丢弃文档 {} 的翻译失败: {}", self.inner_window_id, e);
        }
    }
}

impl EngineStatusListener for TranslationSession {
    fn inner_window_id(&self) -> u64 {
        self.inner_window_id
    }

    fn report_engine_status(&self, status: EngineStatus) {
        if !self.is_alive() {
            return;
        }
        match status {
            EngineStatus::Ready => self.state.set_engine_ready(true),
            EngineStatus::Error(e) => {
                tracing::error!("文档 {} 的翻译引擎出错: {}", self.inner_window_id, e);
                self.state.set_error(Some(e));
                self.state.set_phase(SessionPhase::Error);
            }
        }
    }
}
