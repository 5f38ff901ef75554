// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 帧接收回调 (Frame ingest sink)
///
/// 运行在传输层的投递线程上:
/// 1. bayer 编码标签改写为 mono8 (只改元数据,不动像素)
/// 2. 转换为 bgr8
/// 3. 成功则写入 FrameSlot, 失败记录日志并保留上一帧
///
/// 这里从不订阅/退订, 订阅状态只由调度循环修改。
use crate::convert::convert;
use crate::error::ConversionError;
use crate::frame::{encodings, CanonicalFrame, FrameSlot, InboundFrame};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 接收统计
#[derive(Debug, Default)]
pub struct IngestStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl IngestStats {
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug)]
pub struct FrameIngestSink {
    slot: Arc<FrameSlot>,
    stats: Arc<IngestStats>,
}

impl FrameIngestSink {
    pub fn new(slot: Arc<FrameSlot>) -> Self {
        Self {
            slot,
            stats: Arc::new(IngestStats::default()),
        }
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// 传输层回调入口: 错误只记录,不向上传播
    pub fn on_frame(&self, frame: &InboundFrame) {
        if let Err(e) = self.ingest(frame) {
            log::error!(
                "❌ Unable to convert {} image to {}: {}",
                frame.encoding,
                CanonicalFrame::ENCODING,
                e
            );
        }
    }

    pub fn ingest(&self, frame: &InboundFrame) -> Result<(), ConversionError> {
        let encoding = normalize_encoding(&frame.encoding);
        match convert(frame, encoding, CanonicalFrame::ENCODING) {
            Ok(canonical) => {
                self.slot.put(canonical);
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}

/// 允许直接查看 bayer 原始数据: 按单通道灰度显示
pub fn normalize_encoding(encoding: &str) -> &str {
    if encoding.contains("bayer") {
        encodings::MONO8
    } else {
        encoding
    }
}
