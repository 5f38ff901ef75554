// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 订阅生命周期管理 (Subscription lifecycle)
///
/// 任意时刻最多持有一个订阅:
/// - `attach()`  已订阅时为空操作
/// - `detach()`  未订阅时为空操作; 返回后旧订阅的回调不会再触发
use crate::bus::{Bus, Subscription};
use crate::error::SubscriptionError;
use crate::frame::InboundFrame;
use crate::ingest::FrameIngestSink;
use crate::transport::{subscribe_frames, TransportMode};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type FrameHandler = Arc<dyn Fn(&InboundFrame) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Detached,
    Attached,
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionState::Detached => f.write_str("unsubscribed"),
            SubscriptionState::Attached => f.write_str("subscribed"),
        }
    }
}

pub struct SubscriptionManager {
    bus: Bus,
    topic: String,
    transport: String,
    queue_size: usize,
    handler: FrameHandler,
    handle: Mutex<Option<Subscription>>,
}

impl SubscriptionManager {
    /// `transport` 在 attach 时才解析, 未知模式表现为注册失败
    pub fn new(
        bus: Bus,
        topic: impl Into<String>,
        transport: impl Into<String>,
        queue_size: usize,
        sink: FrameIngestSink,
    ) -> Self {
        Self::with_handler(bus, topic, transport, queue_size, move |frame| {
            sink.on_frame(frame)
        })
    }

    /// 用任意回调接收帧 (默认是 FrameIngestSink)
    pub fn with_handler<F>(
        bus: Bus,
        topic: impl Into<String>,
        transport: impl Into<String>,
        queue_size: usize,
        handler: F,
    ) -> Self
    where
        F: Fn(&InboundFrame) + Send + Sync + 'static,
    {
        Self {
            bus,
            topic: topic.into(),
            transport: transport.into(),
            queue_size,
            handler: Arc::new(handler),
            handle: Mutex::new(None),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn transport(&self) -> &str {
        &self.transport
    }

    /// 投递线程已失效的订阅按 Detached 计
    pub fn state(&self) -> SubscriptionState {
        match self.lock().as_ref() {
            Some(subscription) if subscription.is_active() => SubscriptionState::Attached,
            _ => SubscriptionState::Detached,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.state() == SubscriptionState::Attached
    }

    /// 订阅帧流; 失败时保持 Detached
    pub fn attach(&self) -> Result<(), SubscriptionError> {
        let mut handle = self.lock();
        if handle.as_ref().is_some_and(Subscription::is_active) {
            return Ok(());
        }
        if let Some(mut dead) = handle.take() {
            log::warn!("⚠️  订阅 {} 已失效, 重新订阅", dead.topic());
            dead.close();
        }

        let mode: TransportMode = self.transport.parse()?;
        let handler = self.handler.clone();
        let subscription = subscribe_frames(
            &self.bus,
            &self.topic,
            mode,
            self.queue_size,
            move |frame| handler(frame),
        )?;

        log::debug!("订阅 {} ({})", subscription.topic(), mode);
        *handle = Some(subscription);
        Ok(())
    }

    /// 同步退订: 等待进行中的回调结束后才返回
    pub fn detach(&self) {
        let mut handle = self.lock();
        // 持锁关闭, 防止紧接着的 attach 与旧回调交错
        if let Some(mut subscription) = handle.take() {
            subscription.close();
            log::debug!("退订 {}", subscription.topic());
        }
    }

    /// 切换订阅状态,返回切换后的状态
    pub fn toggle(&self) -> Result<SubscriptionState, SubscriptionError> {
        if self.is_attached() {
            self.detach();
        } else {
            self.attach()?;
        }
        Ok(self.state())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Subscription>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("topic", &self.topic)
            .field("transport", &self.transport)
            .field("state", &self.state())
            .finish()
    }
}
