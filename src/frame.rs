// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 帧数据与最新帧槽 (Frame types and the latest-frame slot)
///
/// 传输线程写入,主线程读取,两者只通过 FrameSlot 的互斥锁同步。
use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// 常用编码名 (与 sensor_msgs/image_encodings 一致)
pub mod encodings {
    pub const RGB8: &str = "rgb8";
    pub const BGR8: &str = "bgr8";
    pub const RGBA8: &str = "rgba8";
    pub const BGRA8: &str = "bgra8";
    pub const MONO8: &str = "mono8";
    pub const MONO16: &str = "mono16";
    pub const BAYER_RGGB8: &str = "bayer_rggb8";
}

/// 传输层投递的原始帧 (payload 在转换前视为不透明字节)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundFrame {
    pub payload: Vec<u8>,
    pub encoding: String,
    pub width: u32,
    pub height: u32,
    pub step: u32, // 每行字节数, 0 表示紧密排列
    pub sequence: u64,
}

impl InboundFrame {
    pub fn new(
        payload: Vec<u8>,
        encoding: impl Into<String>,
        width: u32,
        height: u32,
        sequence: u64,
    ) -> Self {
        Self {
            payload,
            encoding: encoding.into(),
            width,
            height,
            step: 0,
            sequence,
        }
    }

    pub fn with_step(mut self, step: u32) -> Self {
        self.step = step;
        self
    }
}

/// 规范显示格式的帧: 固定 bgr8 三通道
#[derive(Clone, Debug, PartialEq)]
pub struct CanonicalFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u64,
    pub source_encoding: String,
    pub received_at: DateTime<Local>,
}

impl CanonicalFrame {
    pub const ENCODING: &'static str = encodings::BGR8;

    pub fn step(&self) -> usize {
        (self.width as usize).saturating_mul(3)
    }

    /// (b, g, r), 越界或数据不足时为 None
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize)
            .checked_mul(self.step())?
            .checked_add(x as usize * 3)?;
        self.data
            .get(idx..idx.checked_add(3)?)
            .map(|px| [px[0], px[1], px[2]])
    }
}

/// 最新帧槽: 整帧原子替换,读取返回共享快照 (只拷贝 Arc,不拷贝像素)
#[derive(Debug, Default)]
pub struct FrameSlot {
    latest: Mutex<Option<Arc<CanonicalFrame>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 无条件替换 (last write wins)
    pub fn put(&self, frame: CanonicalFrame) {
        // 在锁外分配,临界区只剩一次指针交换
        let frame = Arc::new(frame);
        let previous = self.lock().replace(frame);
        drop(previous);
    }

    pub fn get(&self) -> Option<Arc<CanonicalFrame>> {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    // 槽里只有完整的 Arc,中毒后内容仍然有效
    fn lock(&self) -> MutexGuard<'_, Option<Arc<CanonicalFrame>>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn frame(sequence: u64) -> CanonicalFrame {
        CanonicalFrame {
            data: vec![sequence as u8; 2 * 2 * 3],
            width: 2,
            height: 2,
            sequence,
            source_encoding: format!("enc{}", sequence),
            received_at: Local::now(),
        }
    }

    #[test]
    fn empty_until_first_put() {
        let slot = FrameSlot::new();
        assert!(slot.get().is_none());
        assert!(slot.is_empty());

        slot.put(frame(1));
        assert_eq!(slot.get().map(|f| f.sequence), Some(1));
    }

    #[test]
    fn later_put_replaces_earlier() {
        let slot = FrameSlot::new();
        slot.put(frame(1));
        slot.put(frame(2));
        let latest = slot.get().unwrap();
        assert_eq!(latest.sequence, 2);
        assert_eq!(latest.source_encoding, "enc2");
    }

    #[test]
    fn snapshot_outlives_replacement() {
        let slot = FrameSlot::new();
        slot.put(frame(1));
        let snapshot = slot.get().unwrap();
        slot.put(frame(2));
        assert_eq!(snapshot.sequence, 1);
        assert_eq!(snapshot.data, vec![1u8; 12]);
    }

    #[test]
    fn concurrent_writers_never_tear() {
        let slot = Arc::new(FrameSlot::new());
        let writers: Vec<_> = (0..4u64)
            .map(|w| {
                let slot = slot.clone();
                thread::spawn(move || {
                    for i in 0..200u64 {
                        slot.put(frame(w * 1000 + i));
                    }
                })
            })
            .collect();

        let reader = {
            let slot = slot.clone();
            thread::spawn(move || {
                for _ in 0..2000 {
                    if let Some(f) = slot.get() {
                        // 标签与像素必须来自同一帧
                        assert_eq!(f.source_encoding, format!("enc{}", f.sequence));
                        assert!(f.data.iter().all(|&b| b == f.sequence as u8));
                    }
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();

        let last = slot.get().unwrap();
        assert_eq!(last.source_encoding, format!("enc{}", last.sequence));
    }

    #[test]
    fn pixel_is_bgr_ordered() {
        let f = CanonicalFrame {
            data: vec![1, 2, 3, 4, 5, 6],
            width: 2,
            height: 1,
            sequence: 0,
            source_encoding: encodings::BGR8.into(),
            received_at: Local::now(),
        };
        assert_eq!(f.pixel(1, 0), Some([4, 5, 6]));
        assert_eq!(f.pixel(2, 0), None);
    }

    #[test]
    fn pixel_tolerates_inconsistent_geometry() {
        let f = CanonicalFrame {
            data: vec![1, 2, 3],
            width: u32::MAX,
            height: u32::MAX,
            sequence: 0,
            source_encoding: encodings::BGR8.into(),
            received_at: Local::now(),
        };
        assert_eq!(f.pixel(0, 0), Some([1, 2, 3]));
        assert_eq!(f.pixel(u32::MAX - 1, u32::MAX - 1), None);
    }
}
