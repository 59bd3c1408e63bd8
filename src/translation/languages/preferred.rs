//! 偏好语言排序
//!
//! 合并三层来源：最近使用的目标语言、用户配置的接受语言、应用与系统
//! 区域设置。每层独立缓存，任何一层失效都会清空合并结果。

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use lru::LruCache;

use super::pairs::find_compatible_target;
use super::tags::base_language;
use crate::translation::core::events::SubscriptionId;
use crate::translation::core::prefs::{PrefChange, PrefKey, PreferenceStore};
use crate::translation::storage::records::LanguagePair;

type Tier = Mutex<Option<Arc<Vec<String>>>>;

/// 区域设置来源
pub trait LocaleProvider: Send + Sync {
    /// 用户未自定义时的接受语言
    fn default_accept_languages(&self) -> Vec<String>;
    fn app_locale(&self) -> String;
    fn os_locales(&self) -> Vec<String>;
}

/// 固定值的区域设置来源
#[derive(Debug, Clone, Default)]
pub struct StaticLocaleProvider {
    pub accept_languages: Vec<String>,
    pub app_locale: String,
    pub os_locales: Vec<String>,
}

impl LocaleProvider for StaticLocaleProvider {
    fn default_accept_languages(&self) -> Vec<String> {
        self.accept_languages.clone()
    }

    fn app_locale(&self) -> String {
        self.app_locale.clone()
    }

    fn os_locales(&self) -> Vec<String> {
        self.os_locales.clone()
    }
}

/// 偏好语言排序器
pub struct PreferredLanguageRanker {
    prefs: Arc<PreferenceStore>,
    locales: Arc<dyn LocaleProvider>,
    capacity: NonZeroUsize,
    most_recent: Tier,
    user_settings: Tier,
    app_and_os: Tier,
    merged: Tier,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl PreferredLanguageRanker {
    /// 创建排序器并订阅偏好变更
    pub fn new(
        prefs: Arc<PreferenceStore>,
        locales: Arc<dyn LocaleProvider>,
        capacity: usize,
    ) -> Arc<Self> {
        let ranker = Arc::new(Self {
            prefs: Arc::clone(&prefs),
            locales,
            capacity: NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            most_recent: Mutex::new(None),
            user_settings: Mutex::new(None),
            app_and_os: Mutex::new(None),
            merged: Mutex::new(None),
            subscription: Mutex::new(None),
        });

        let weak: Weak<Self> = Arc::downgrade(&ranker);
        let id = prefs.events().subscribe(move |change: &PrefChange| {
            if let Some(ranker) = weak.upgrade() {
                ranker.on_pref_change(change.key);
            }
        });
        *ranker
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(id);

        ranker
    }

    fn on_pref_change(&self, key: PrefKey) {
        match key {
            PrefKey::MostRecentTargetLanguages => self.invalidate_most_recent(),
            PrefKey::AcceptLanguages => self.invalidate_user_settings(),
            _ => {}
        }
    }

    /// 最近使用的目标语言失效
    pub fn invalidate_most_recent(&self) {
        clear(&self.most_recent);
        clear(&self.merged);
    }

    /// 用户语言设置失效
    pub fn invalidate_user_settings(&self) {
        clear(&self.user_settings);
        clear(&self.merged);
    }

    /// 应用或系统区域设置失效
    pub fn invalidate_app_and_os(&self) {
        clear(&self.app_and_os);
        clear(&self.merged);
    }

    pub fn invalidate_all(&self) {
        self.invalidate_most_recent();
        self.invalidate_user_settings();
        self.invalidate_app_and_os();
    }

    /// 记录一次翻译的目标语言
    ///
    /// 已存在的标签移到最近位置，容量已满时淘汰最久未使用的标签。
    pub fn record_most_recent_target(&self, tag: &str) {
        let tag = base_language(tag);
        if tag.is_empty() {
            return;
        }

        let mut window: LruCache<String, ()> = LruCache::new(self.capacity);
        for existing in self.prefs.list(PrefKey::MostRecentTargetLanguages) {
            window.put(existing, ());
        }
        window.put(tag, ());

        // 迭代顺序为最近优先，存储时按最旧优先
        let mut stored: Vec<String> = window.iter().map(|(tag, _)| tag.clone()).collect();
        stored.reverse();
        self.prefs.set_list(PrefKey::MostRecentTargetLanguages, stored);
    }

    /// 最近使用的目标语言，最近的在前
    pub fn most_recent_targets(&self) -> Arc<Vec<String>> {
        cached(&self.most_recent, || {
            let mut tags = self.prefs.list(PrefKey::MostRecentTargetLanguages);
            tags.reverse();
            tags
        })
    }

    /// 用户配置的接受语言
    ///
    /// 用户从未自定义时，去掉隐式的 `en` 后备项。
    pub fn user_settings_languages(&self) -> Arc<Vec<String>> {
        cached(&self.user_settings, || {
            if self.prefs.has_user_value(PrefKey::AcceptLanguages) {
                self.prefs.list(PrefKey::AcceptLanguages)
            } else {
                self.locales
                    .default_accept_languages()
                    .into_iter()
                    .filter(|tag| !tag.trim().eq_ignore_ascii_case("en"))
                    .collect()
            }
        })
    }

    pub fn app_and_os_languages(&self) -> Arc<Vec<String>> {
        cached(&self.app_and_os, || {
            let mut tags = vec![self.locales.app_locale()];
            tags.extend(self.locales.os_locales());
            tags
        })
    }

    fn merged_languages(&self) -> Arc<Vec<String>> {
        cached(&self.merged, || {
            let most_recent = self.most_recent_targets();
            let user_settings = self.user_settings_languages();
            let app_and_os = self.app_and_os_languages();

            let mut merged: Vec<String> = Vec::new();
            for tag in most_recent
                .iter()
                .chain(user_settings.iter())
                .chain(app_and_os.iter())
            {
                let base = base_language(tag);
                if !base.is_empty() && !merged.contains(&base) {
                    merged.push(base);
                }
            }
            tracing::debug!("偏好语言: {:?}", merged);
            merged
        })
    }

    /// 按重要性排序的偏好语言，排除 `exclude` 中的语言
    pub fn get_preferred_languages(&self, exclude: &[&str]) -> Vec<String> {
        let excluded: Vec<String> = exclude.iter().map(|tag| base_language(tag)).collect();
        self.merged_languages()
            .iter()
            .filter(|tag| !excluded.contains(tag))
            .cloned()
            .collect()
    }

    /// 第一个可以作为目标语言的偏好语言，都不支持时返回中转语言
    pub fn top_preferred_supported_to_lang(&self, pairs: &[LanguagePair], pivot: &str) -> String {
        self.merged_languages()
            .iter()
            .find_map(|tag| find_compatible_target(tag, pairs))
            .unwrap_or_else(|| pivot.to_string())
    }
}

impl Drop for PreferredLanguageRanker {
    fn drop(&mut self) {
        let id = self
            .subscription
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = id {
            self.prefs.events().unsubscribe(id);
        }
    }
}

fn clear(tier: &Tier) {
    *tier.lock().unwrap_or_else(PoisonError::into_inner) = None;
}

fn cached<F>(tier: &Tier, compute: F) -> Arc<Vec<String>>
where
    F: FnOnce() -> Vec<String>,
{
    if let Some(tags) = tier.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
        return Arc::clone(tags);
    }
    let tags = Arc::new(compute());
    *tier.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&tags));
    tags
}
