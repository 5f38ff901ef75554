// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 远程预览桥 (Remote preview bridge)
//!
//! 显示图像流的最新一帧, 把操作员按键翻译成命令发回上游,
//! 并允许随时订阅/退订图像流。
//!
//! 两条线程:
//! - 投递线程: 传输层 → FrameIngestSink → FrameSlot
//! - 主线程:   CommandDispatcher → 显示 / 订阅切换 / 发布命令
pub mod acquisition; // 帧来源
pub mod bus; // 进程内消息总线
pub mod config; // 启动参数
pub mod context; // 运行上下文
pub mod convert; // 帧格式转换
pub mod dispatch; // 按键调度
pub mod error;
pub mod frame; // 帧与最新帧槽
pub mod ingest; // 帧接收回调
pub mod keyboard; // 终端按键
pub mod renderer; // 终端显示
pub mod subscription; // 订阅管理
pub mod transport; // 图像传输 (raw / compressed)

pub use crate::bus::{Bus, Publisher, Subscription};
pub use crate::config::{Args, SourceSpec, ViewerConfig};
pub use crate::context::{ShutdownSignal, ViewerContext};
pub use crate::dispatch::{
    action_for, CommandDispatcher, CommandSink, DisplaySink, Key, KeyAction, OperatorInput,
    OutboundCommand,
};
pub use crate::error::{ConfigError, ConversionError, PublishError, SubscriptionError};
pub use crate::frame::{CanonicalFrame, FrameSlot, InboundFrame};
pub use crate::ingest::FrameIngestSink;
pub use crate::subscription::{SubscriptionManager, SubscriptionState};
pub use crate::transport::{FramePublisher, TransportMode};
