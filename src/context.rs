// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 运行上下文 (Viewer context)
///
/// 显式持有最新帧槽、订阅管理器和退出信号,传给调度循环和接收回调,
/// 不使用进程级全局状态。
use crate::bus::Bus;
use crate::frame::FrameSlot;
use crate::ingest::FrameIngestSink;
use crate::subscription::SubscriptionManager;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 外部退出信号 (Ctrl-C、窗口关闭、测试等都可以触发)
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// 注册 Ctrl-C / SIGTERM 处理 (进程内只能注册一次)
    pub fn install_ctrlc(&self) -> Result<(), ctrlc::Error> {
        let signal = self.clone();
        ctrlc::set_handler(move || {
            log::info!("🛑 收到退出信号");
            signal.trigger();
        })
    }
}

#[derive(Debug)]
pub struct ViewerContext {
    pub slot: Arc<FrameSlot>,
    pub sink: FrameIngestSink,
    pub subscriptions: SubscriptionManager,
    pub shutdown: ShutdownSignal,
}

impl ViewerContext {
    pub fn new(
        bus: Bus,
        topic: &str,
        transport: &str,
        queue_size: usize,
        shutdown: ShutdownSignal,
    ) -> Self {
        let slot = Arc::new(FrameSlot::new());
        let sink = FrameIngestSink::new(slot.clone());
        let subscriptions =
            SubscriptionManager::new(bus, topic, transport, queue_size, sink.clone());
        Self {
            slot,
            sink,
            subscriptions,
            shutdown,
        }
    }
}
