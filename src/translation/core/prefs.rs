//! 偏好设置存储
//!
//! 持久化存储本身不在范围内；这里是一个内存实现，每次写入都会在
//! 事件总线上广播变更的键。

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use super::events::EventBus;
use crate::translation::languages::tags::base_language;

/// 偏好键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefKey {
    AlwaysTranslateLanguages,
    NeverTranslateLanguages,
    MostRecentTargetLanguages,
    AutomaticOffer,
    NeverTranslateSites,
    AcceptLanguages,
}

/// 偏好变更事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefChange {
    pub key: PrefKey,
}

#[derive(Debug, Clone, Default)]
struct PrefValues {
    lists: HashMap<PrefKey, Vec<String>>,
    automatic_offer: bool,
    never_translate_sites: BTreeSet<String>,
}

/// 内存偏好存储
pub struct PreferenceStore {
    values: Mutex<PrefValues>,
    events: Arc<EventBus<PrefChange>>,
}

impl PreferenceStore {
    pub fn new(automatic_offer: bool) -> Self {
        Self {
            values: Mutex::new(PrefValues {
                automatic_offer,
                ..Default::default()
            }),
            events: Arc::new(EventBus::new()),
        }
    }

    pub fn events(&self) -> &Arc<EventBus<PrefChange>> {
        &self.events
    }

    fn notify(&self, key: PrefKey) {
        tracing::debug!("偏好变更: {:?}", key);
        self.events.emit(&PrefChange { key });
    }

    /// 读取列表偏好（逗号拼接存储的语言列表）
    pub fn list(&self, key: PrefKey) -> Vec<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .lists
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    /// 列表偏好是否被设置过
    pub fn has_user_value(&self, key: PrefKey) -> bool {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .lists
            .contains_key(&key)
    }

    /// 以逗号拼接形式读取
    pub fn list_joined(&self, key: PrefKey) -> String {
        self.list(key).join(",")
    }

    pub fn set_list(&self, key: PrefKey, values: Vec<String>) {
        {
            let mut prefs = self.values.lock().unwrap_or_else(PoisonError::into_inner);
            prefs.lists.insert(key, values);
        }
        self.notify(key);
    }

    /// 从逗号拼接的字符串设置列表
    pub fn set_list_joined(&self, key: PrefKey, joined: &str) {
        let values = joined
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();
        self.set_list(key, values);
    }

    /// 列表中是否包含与 `tag` 基础语言相同的条目
    pub fn list_contains_language(&self, key: PrefKey, tag: &str) -> bool {
        let base = base_language(tag);
        self.list(key).iter().any(|entry| base_language(entry) == base)
    }

    /// 添加或移除语言，返回操作后是否包含
    pub fn toggle_language(&self, key: PrefKey, tag: &str) -> bool {
        let base = base_language(tag);
        let mut list = self.list(key);
        let present = list.iter().any(|entry| base_language(entry) == base);
        if present {
            list.retain(|entry| base_language(entry) != base);
        } else {
            list.push(base);
        }
        self.set_list(key, list);
        !present
    }

    /// 从列表中移除语言
    pub fn remove_language(&self, key: PrefKey, tag: &str) {
        if self.list_contains_language(key, tag) {
            let base = base_language(tag);
            let mut list = self.list(key);
            list.retain(|entry| base_language(entry) != base);
            self.set_list(key, list);
        }
    }

    pub fn automatic_offer(&self) -> bool {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .automatic_offer
    }

    pub fn set_automatic_offer(&self, enabled: bool) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .automatic_offer = enabled;
        self.notify(PrefKey::AutomaticOffer);
    }

    /// 站点（按来源）是否被设为永不翻译
    pub fn never_translate_site(&self, origin: &str) -> bool {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .never_translate_sites
            .contains(origin)
    }

    pub fn set_never_translate_site(&self, origin: &str, never: bool) {
        {
            let mut prefs = self.values.lock().unwrap_or_else(PoisonError::into_inner);
            if never {
                prefs.never_translate_sites.insert(origin.to_string());
            } else {
                prefs.never_translate_sites.remove(origin);
            }
        }
        self.notify(PrefKey::NeverTranslateSites);
    }
}
