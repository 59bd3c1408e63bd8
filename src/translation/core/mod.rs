//! 翻译会话核心模块
//!
//! 本模块负责文档级的翻译会话以及它所依赖的进程范围组件：
//!
//! - **上下文** (`context.rs`): 共享的记录目录、语言对、偏好语言和资源管理器
//! - **会话** (`session.rs`): 检测、提供、翻译、还原的状态机
//! - **状态** (`state.rs`): 语言状态与变更通知
//! - **窗口** (`window.rs`): 代际索引的窗口状态
//! - **端口** (`port.rs`): 跨进程消息通道与引擎边界
//! - **偏好** (`prefs.rs`) 与 **事件** (`events.rs`)
//!
//! ## 模块依赖关系
//!
//! ```text
//! TranslationSession (session.rs)
//!     ├── ResourceCatalogContext (context.rs)
//!     │       ├── RecordCatalog (storage/catalog.rs)
//!     │       ├── LanguagePairResolver (languages/pairs.rs)
//!     │       ├── PreferredLanguageRanker (languages/preferred.rs)
//!     │       └── AssetManager (pipeline/assets.rs)
//!     │               └── DownloadManager (pipeline/download.rs)
//!     └── TranslationPortProvider (port.rs)
//! ```

pub mod context;
pub mod events;
pub mod port;
pub mod prefs;
pub mod session;
pub mod state;
pub mod window;

/// 进程范围的资源上下文
pub use context::ResourceCatalogContext;

pub use events::{EventBus, SubscriptionId};

pub use port::{
    EngineProcess, EngineRequest, EngineStatus, EngineStatusListener, LocalEngineHost,
    MessagePort, PortMessage, TranslationPortProvider,
};

pub use prefs::{PrefChange, PrefKey, PreferenceStore};

/// 文档翻译会话及其协作方接口
pub use session::{
    BrowserHost, ChildMessage, ContentActor, ContentMessage, SessionBindings, TranslationSession,
};

pub use state::{
    LangTags, LanguageSnapshot, LanguageState, LanguageStateEvent, SessionPhase, StateChangeReason,
};

pub use window::{WindowId, WindowRegistry, WindowState};
