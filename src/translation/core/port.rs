//! 跨进程翻译端口
//!
//! 会话向端口提供者请求一个双向消息通道的一端，另一端连同语言对和资源
//! 一起交给引擎进程。可选的所属会话引用只用于把引擎状态回报给界面状态。

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::assets::{AssetManager, TranslationPayload};
use crate::translation::storage::records::LanguagePair;

/// 端口上传递的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortMessage {
    TranslationRequest { message_id: u64, source_text: String },
    TranslationResponse { message_id: u64, target_text: String },
    EngineReady,
    EngineError(String),
    DiscardTranslations,
}

/// 双向消息通道的一端，转移而不复制
#[derive(Debug)]
pub struct MessagePort {
    sender: mpsc::UnboundedSender<PortMessage>,
    receiver: mpsc::UnboundedReceiver<PortMessage>,
}

impl MessagePort {
    /// 创建相互连接的两端
    pub fn pair() -> (MessagePort, MessagePort) {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = mpsc::unbounded_channel();
        (
            MessagePort {
                sender: left_tx,
                receiver: right_rx,
            },
            MessagePort {
                sender: right_tx,
                receiver: left_rx,
            },
        )
    }

    pub fn send(&self, message: PortMessage) -> TranslationResult<()> {
        self.sender
            .send(message)
            .map_err(|_| TranslationError::PortCreationError("端口对端已关闭".to_string()))
    }

    pub async fn recv(&mut self) -> Option<PortMessage> {
        self.receiver.recv().await
    }
}

/// 引擎状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Ready,
    Error(TranslationError),
}

/// 接收引擎状态回报的一方
pub trait EngineStatusListener: Send + Sync {
    fn inner_window_id(&self) -> u64;
    fn report_engine_status(&self, status: EngineStatus);
}

/// 端口提供者
#[async_trait]
pub trait TranslationPortProvider: Send + Sync {
    /// 为语言对请求端口；引擎无法连接时返回 `PortCreationError`
    async fn request_port(
        &self,
        from_language: &str,
        to_language: &str,
        owner: Option<Weak<dyn EngineStatusListener>>,
    ) -> TranslationResult<Option<MessagePort>>;

    /// 丢弃某个文档进行中的翻译
    async fn discard_translations(&self, inner_window_id: u64) -> TranslationResult<()>;
}

/// 交给引擎进程的启动请求
pub struct EngineRequest {
    pub pair: LanguagePair,
    pub payload: TranslationPayload,
    pub port: MessagePort,
    pub owner: Option<Weak<dyn EngineStatusListener>>,
}

impl EngineRequest {
    /// 向所属会话回报状态，会话已销毁时忽略
    pub fn report(&self, status: EngineStatus) {
        if let Some(owner) = self.owner.as_ref().and_then(Weak::upgrade) {
            owner.report_engine_status(status);
        }
    }
}

/// 下游引擎进程
#[async_trait]
pub trait EngineProcess: Send + Sync {
    async fn start(&self, request: EngineRequest) -> TranslationResult<()>;
    async fn discard(&self, inner_window_id: u64) -> TranslationResult<()>;
}

/// 在本进程内组装资源并启动引擎的端口提供者
pub struct LocalEngineHost {
    assets: Arc<AssetManager>,
    engine: Arc<dyn EngineProcess>,
}

impl LocalEngineHost {
    pub fn new(assets: Arc<AssetManager>, engine: Arc<dyn EngineProcess>) -> Self {
        Self { assets, engine }
    }
}

#[async_trait]
impl TranslationPortProvider for LocalEngineHost {
    async fn request_port(
        &self,
        from_language: &str,
        to_language: &str,
        owner: Option<Weak<dyn EngineStatusListener>>,
    ) -> TranslationResult<Option<MessagePort>> {
        let payload = self
            .assets
            .translation_payload(from_language, to_language)
            .await?;

        let (ours, theirs) = MessagePort::pair();
        let request = EngineRequest {
            pair: LanguagePair::new(from_language, to_language),
            payload,
            port: theirs,
            owner,
        };

        self.engine.start(request).await.map_err(|e| {
            TranslationError::PortCreationError(format!(
                "无法启动 {} -> {} 的翻译引擎: {}",
                from_language, to_language, e
            ))
        })?;

        tracing::info!("已为 {} -> {} 创建翻译端口", from_language, to_language);
        Ok(Some(ours))
    }

    async fn discard_translations(&self, inner_window_id: u64) -> TranslationResult<()> {
        self.engine.discard(inner_window_id).await
    }
}
