// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 帧采集 (Frame acquisition)
///
/// 独立工作线程,按固定帧率从来源取帧并通过图像传输层发布:
/// - TestPattern: 合成测试图 (rgb8 / bgr8 / bayer 轮换)
/// - ImageDir:    循环读取目录中的图片
pub mod image_dir;
pub mod pattern;

pub use image_dir::ImageDir;
pub use pattern::TestPattern;

use crate::context::ShutdownSignal;
use crate::frame::InboundFrame;
use crate::transport::FramePublisher;
use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// 帧来源
pub trait FrameSource: Send {
    fn name(&self) -> &str;

    /// 本轮没有可用帧时返回 None
    fn next_frame(&mut self) -> Option<InboundFrame>;
}

/// 启动采集线程,退出信号触发后返回
pub fn spawn_source(
    mut source: Box<dyn FrameSource>,
    publisher: FramePublisher,
    period: Duration,
    shutdown: ShutdownSignal,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("source:{}", source.name()))
        .spawn(move || {
            log::info!("🎬 帧来源启动: {} → {}", source.name(), publisher.topic());
            let mut published = 0u64;
            let mut last = Instant::now();

            while !shutdown.is_triggered() {
                let started = Instant::now();
                if let Some(frame) = source.next_frame() {
                    match publisher.publish(frame) {
                        Ok(()) => published += 1,
                        Err(e) => {
                            log::warn!("⚠️  发布帧失败: {}", e);
                            break;
                        }
                    }
                }

                // 每秒打印一次发布统计
                if last.elapsed().as_secs_f64() >= 1.0 {
                    let fps = published as f64 / last.elapsed().as_secs_f64();
                    log::debug!("📺 发布统计: {}帧 | {:.1}fps", published, fps);
                    published = 0;
                    last = Instant::now();
                }

                if let Some(rest) = period.checked_sub(started.elapsed()) {
                    thread::sleep(rest);
                }
            }
            log::info!("❌ 帧来源退出: {}", source.name());
        })
}
