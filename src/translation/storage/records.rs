//! 远程记录数据模型
//!
//! 远程集合中的条目在边界处被反序列化为 [`RawRecord`]，再校验为
//! [`AssetRecord`]。模型记录和 WASM 记录使用 [`RecordKind`] 区分。

use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::translation::error::{TranslationError, TranslationResult};

/// 模型文件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelFileType {
    Model,
    Lex,
    Vocab,
    Srcvocab,
    Trgvocab,
    QualityModel,
}

impl ModelFileType {
    /// 集合中使用的名称
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFileType::Model => "model",
            ModelFileType::Lex => "lex",
            ModelFileType::Vocab => "vocab",
            ModelFileType::Srcvocab => "srcvocab",
            ModelFileType::Trgvocab => "trgvocab",
            ModelFileType::QualityModel => "qualityModel",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "model" => Some(ModelFileType::Model),
            "lex" => Some(ModelFileType::Lex),
            "vocab" => Some(ModelFileType::Vocab),
            "srcvocab" => Some(ModelFileType::Srcvocab),
            "trgvocab" => Some(ModelFileType::Trgvocab),
            "qualityModel" => Some(ModelFileType::QualityModel),
            _ => None,
        }
    }
}

impl fmt::Display for ModelFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 附件元数据
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct AttachmentMeta {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
}

/// 有序语言对
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguagePair {
    pub from_lang: String,
    pub to_lang: String,
}

impl LanguagePair {
    pub fn new(from_lang: impl Into<String>, to_lang: impl Into<String>) -> Self {
        Self {
            from_lang: from_lang.into(),
            to_lang: to_lang.into(),
        }
    }

    /// 去重使用的规范键 `"{from},{to}"`
    pub fn key(&self) -> String {
        format!("{},{}", self.from_lang, self.to_lang)
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.to_lang.clone(), self.from_lang.clone())
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from_lang, self.to_lang)
    }
}

/// 记录类别
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    /// 语言模型文件
    Model {
        file_type: ModelFileType,
        pair: LanguagePair,
    },
    /// 翻译引擎 WASM 二进制
    Wasm,
}

/// 已校验的远程记录，同步后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub id: String,
    pub name: String,
    pub version: String,
    pub kind: RecordKind,
    pub attachment: AttachmentMeta,
}

impl AssetRecord {
    /// 创建模型记录
    pub fn model(
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        file_type: ModelFileType,
        pair: LanguagePair,
    ) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            attachment: AttachmentMeta {
                filename: name.clone(),
                ..Default::default()
            },
            name,
            version: version.into(),
            kind: RecordKind::Model { file_type, pair },
        }
    }

    /// 创建 WASM 记录
    pub fn wasm(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            attachment: AttachmentMeta {
                filename: name.clone(),
                ..Default::default()
            },
            name,
            version: version.into(),
            kind: RecordKind::Wasm,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.attachment.size = size;
        self
    }

    pub fn pair(&self) -> Option<&LanguagePair> {
        match &self.kind {
            RecordKind::Model { pair, .. } => Some(pair),
            RecordKind::Wasm => None,
        }
    }

    pub fn file_type(&self) -> Option<ModelFileType> {
        match &self.kind {
            RecordKind::Model { file_type, .. } => Some(*file_type),
            RecordKind::Wasm => None,
        }
    }

    pub fn to_lang(&self) -> Option<&str> {
        self.pair().map(|pair| pair.to_lang.as_str())
    }

    pub fn is_wasm(&self) -> bool {
        matches!(self.kind, RecordKind::Wasm)
    }

    /// 模型记录的组合查找键：名称在不同语言对之间并不唯一
    pub fn model_lookup_key(&self) -> String {
        match &self.kind {
            RecordKind::Model { pair, .. } => {
                format!("{}{}{}", self.name, pair.from_lang, pair.to_lang)
            }
            RecordKind::Wasm => self.name.clone(),
        }
    }

    /// 转换回集合中的原始形式
    pub fn to_raw(&self) -> RawRecord {
        let (file_type, from_lang, to_lang) = match &self.kind {
            RecordKind::Model { file_type, pair } => (
                file_type.as_str().to_string(),
                Some(pair.from_lang.clone()),
                Some(pair.to_lang.clone()),
            ),
            RecordKind::Wasm => ("wasm".to_string(), None, None),
        };

        RawRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            file_type: Some(file_type),
            from_lang,
            to_lang,
            attachment: Some(self.attachment.clone()),
        }
    }
}

/// 集合中的原始条目
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub from_lang: Option<String>,
    #[serde(default)]
    pub to_lang: Option<String>,
    #[serde(default)]
    pub attachment: Option<AttachmentMeta>,
}

impl TryFrom<RawRecord> for AssetRecord {
    type Error = TranslationError;

    fn try_from(raw: RawRecord) -> TranslationResult<Self> {
        let attachment = raw.attachment.unwrap_or_else(|| AttachmentMeta {
            filename: raw.name.clone(),
            ..Default::default()
        });

        let kind = match raw.file_type.as_deref() {
            None | Some("wasm") if raw.from_lang.is_none() && raw.to_lang.is_none() => {
                RecordKind::Wasm
            }
            Some(file_type) => {
                let file_type = ModelFileType::parse(file_type).ok_or_else(|| {
                    TranslationError::InvalidRecord(format!(
                        "记录 {} 的文件类型未知: {}",
                        raw.id, file_type
                    ))
                })?;
                match (raw.from_lang, raw.to_lang) {
                    (Some(from), Some(to)) if !from.is_empty() && !to.is_empty() => {
                        RecordKind::Model {
                            file_type,
                            pair: LanguagePair::new(from, to),
                        }
                    }
                    _ => {
                        return Err(TranslationError::InvalidRecord(format!(
                            "模型记录 {} 缺少语言对",
                            raw.id
                        )))
                    }
                }
            }
            None => {
                return Err(TranslationError::InvalidRecord(format!(
                    "记录 {} 缺少文件类型",
                    raw.id
                )))
            }
        };

        check_path_component("id", &raw.id)?;
        check_path_component("attachment.filename", &attachment.filename)?;

        Ok(Self {
            id: raw.id,
            name: raw.name,
            version: raw.version,
            kind,
            attachment,
        })
    }
}

/// 记录 id 和附件文件名会被拼接进本地路径，只允许单个普通路径分量
pub fn check_path_component(field: &str, value: &str) -> TranslationResult<()> {
    let mut components = Path::new(value).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == value
    );
    if single_normal && !value.contains(|c: char| c == '/' || c == '\\') {
        Ok(())
    } else {
        Err(TranslationError::InvalidRecord(format!(
            "{} 不是合法的文件名: {:?}",
            field, value
        )))
    }
}

/// 校验一组原始条目，无效条目记录警告后跳过
pub fn parse_records(raw: Vec<RawRecord>) -> Vec<AssetRecord> {
    raw.into_iter()
        .filter_map(|raw| match AssetRecord::try_from(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("跳过无效记录: {}", e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_record_from_json() {
        let raw: RawRecord = serde_json::from_str(
            r#"{
                "id": "1",
                "name": "model.esen.intgemm.alphas.bin",
                "version": "1.0",
                "fileType": "model",
                "fromLang": "es",
                "toLang": "en",
                "attachment": { "filename": "model.esen.intgemm.alphas.bin", "size": 17140836 }
            }"#,
        )
        .unwrap();

        let record = AssetRecord::try_from(raw).unwrap();
        assert_eq!(record.file_type(), Some(ModelFileType::Model));
        assert_eq!(record.pair(), Some(&LanguagePair::new("es", "en")));
        assert_eq!(record.attachment.size, 17140836);
        assert_eq!(record.model_lookup_key(), "model.esen.intgemm.alphas.binesen");
    }

    #[test]
    fn test_wasm_record_without_languages() {
        let raw: RawRecord =
            serde_json::from_str(r#"{ "id": "w", "name": "bergamot-translator", "version": "2.0" }"#)
                .unwrap();
        let record = AssetRecord::try_from(raw).unwrap();
        assert!(record.is_wasm());
        assert_eq!(record.model_lookup_key(), "bergamot-translator");
    }

    #[test]
    fn test_invalid_records_are_skipped() {
        let raw = vec![
            RawRecord {
                id: "a".into(),
                name: "lex".into(),
                version: "1.0".into(),
                file_type: Some("lex".into()),
                from_lang: Some("fr".into()),
                to_lang: None,
                attachment: None,
            },
            RawRecord {
                id: "b".into(),
                name: "unknown".into(),
                version: "1.0".into(),
                file_type: Some("weights".into()),
                from_lang: Some("fr".into()),
                to_lang: Some("en".into()),
                attachment: None,
            },
            AssetRecord::model("c", "vocab", "1.0", ModelFileType::Vocab, LanguagePair::new("fr", "en"))
                .to_raw(),
        ];

        let records = parse_records(raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "c");
    }

    #[test]
    fn test_path_like_ids_and_filenames_are_rejected() {
        let escaping_id = AssetRecord::model(
            "../../escaped",
            "lex",
            "1.0",
            ModelFileType::Lex,
            LanguagePair::new("fr", "en"),
        )
        .to_raw();
        let mut escaping_file = AssetRecord::model(
            "d",
            "vocab",
            "1.0",
            ModelFileType::Vocab,
            LanguagePair::new("fr", "en"),
        )
        .to_raw();
        if let Some(attachment) = escaping_file.attachment.as_mut() {
            attachment.filename = "/etc/passwd".into();
        }

        assert!(matches!(
            AssetRecord::try_from(escaping_id.clone()),
            Err(TranslationError::InvalidRecord(_))
        ));
        assert!(parse_records(vec![escaping_id, escaping_file]).is_empty());

        for bad in ["", ".", "..", "a/b", "a\\b", "/abs"] {
            assert!(check_path_component("id", bad).is_err(), "{:?}", bad);
        }
        assert!(check_path_component("id", "model.esen.intgemm.alphas.bin").is_ok());
    }

    #[test]
    fn test_pair_key() {
        let pair = LanguagePair::new("fr", "en");
        assert_eq!(pair.key(), "fr,en");
        assert_eq!(pair.reversed(), LanguagePair::new("en", "fr"));
    }
}
