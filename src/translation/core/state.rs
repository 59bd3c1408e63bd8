//! 会话语言状态
//!
//! 每次字段变更都会在状态事件总线上广播一条带原因的通知，这是本模块向
//! 界面层报告变化的唯一渠道。

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use super::events::EventBus;
use crate::translation::error::TranslationError;
use crate::translation::storage::records::LanguagePair;

/// 一次文档语言检测的结果，整体替换而不就地修改
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LangTags {
    pub doc_lang_tag: Option<String>,
    pub user_lang_tag: Option<String>,
    pub is_doc_lang_tag_supported: bool,
}

impl LangTags {
    pub fn with_user_lang_tag(&self, user_lang_tag: Option<String>) -> Self {
        Self {
            user_lang_tag,
            ..self.clone()
        }
    }
}

/// 会话阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    Idle,
    Detecting,
    Unsupported,
    Supported,
    Offered,
    AutoTranslating,
    Translating,
    Translated,
    Restored,
    Error,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 状态变更原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateChangeReason {
    RequestedTranslationPair,
    DetectedLanguages,
    HasVisibleChange,
    Error,
    EngineReady,
    Phase,
}

/// 语言状态快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageSnapshot {
    pub requested_translation_pair: Option<LanguagePair>,
    pub detected_languages: Option<LangTags>,
    pub has_visible_change: bool,
    pub error: Option<TranslationError>,
    pub is_engine_ready: bool,
    pub phase: SessionPhase,
}

impl Default for LanguageSnapshot {
    fn default() -> Self {
        Self {
            requested_translation_pair: None,
            detected_languages: None,
            has_visible_change: false,
            error: None,
            is_engine_ready: false,
            phase: SessionPhase::Idle,
        }
    }
}

/// 状态变更通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageStateEvent {
    pub inner_window_id: u64,
    pub reason: StateChangeReason,
    pub state: LanguageSnapshot,
}

/// 一个文档的语言状态
pub struct LanguageState {
    inner_window_id: u64,
    state: Mutex<LanguageSnapshot>,
    events: Arc<EventBus<LanguageStateEvent>>,
}

impl LanguageState {
    pub fn new(inner_window_id: u64, events: Arc<EventBus<LanguageStateEvent>>) -> Self {
        Self {
            inner_window_id,
            state: Mutex::new(LanguageSnapshot::default()),
            events,
        }
    }

    pub fn snapshot(&self) -> LanguageSnapshot {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update<F>(&self, reason: StateChangeReason, mutate: F)
    where
        F: FnOnce(&mut LanguageSnapshot),
    {
        let state = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            mutate(&mut state);
            state.clone()
        };
        tracing::debug!("文档 {} 状态变更: {:?}", self.inner_window_id, reason);
        self.events.emit(&LanguageStateEvent {
            inner_window_id: self.inner_window_id,
            reason,
            state,
        });
    }

    pub fn requested_translation_pair(&self) -> Option<LanguagePair> {
        self.snapshot().requested_translation_pair
    }

    /// 设置请求的语言对；新的请求清除错误
    pub fn set_requested_translation_pair(&self, pair: Option<LanguagePair>) {
        self.update(StateChangeReason::RequestedTranslationPair, |state| {
            if pair.is_some() {
                state.error = None;
            }
            state.is_engine_ready = false;
            state.requested_translation_pair = pair;
        });
    }

    pub fn detected_languages(&self) -> Option<LangTags> {
        self.snapshot().detected_languages
    }

    pub fn set_detected_languages(&self, tags: Option<LangTags>) {
        self.update(StateChangeReason::DetectedLanguages, |state| {
            state.detected_languages = tags;
        });
    }

    pub fn set_has_visible_change(&self, has_visible_change: bool) {
        self.update(StateChangeReason::HasVisibleChange, |state| {
            state.has_visible_change = has_visible_change;
        });
    }

    /// 设置错误；出错时清除请求的语言对
    pub fn set_error(&self, error: Option<TranslationError>) {
        self.update(StateChangeReason::Error, |state| {
            if error.is_some() {
                state.requested_translation_pair = None;
                state.is_engine_ready = false;
            }
            state.error = error;
        });
    }

    pub fn set_engine_ready(&self, ready: bool) {
        self.update(StateChangeReason::EngineReady, |state| {
            state.is_engine_ready = ready;
        });
    }

    pub fn phase(&self) -> SessionPhase {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .phase
    }

    pub fn set_phase(&self, phase: SessionPhase) {
        self.update(StateChangeReason::Phase, |state| {
            state.phase = phase;
        });
    }
}
