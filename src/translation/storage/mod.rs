//! 存储模块
//!
//! 记录数据模型、版本选择、集合边界、记录目录与同步处理。

pub mod cache;
pub mod catalog;
pub mod collection;
pub mod records;
pub mod sync;
pub mod version;

pub use cache::{CacheStats, SharedFetch};
pub use catalog::{
    CollectionKind, ModelRecords, PivotGap, RecordCatalog, RecordUpdate, SyncEvent, SyncReport,
};
pub use collection::{JsonFileCollection, MemoryCollection, RecordCollection};
pub use records::{AssetRecord, AttachmentMeta, LanguagePair, ModelFileType, RawRecord};
pub use sync::RemoteRecordSyncHandler;
pub use version::{parse_record_version, select_best};
