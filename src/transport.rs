// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 图像传输层 (Image transports over the bus)
///
/// 发布端同时声明两个 topic:
/// - `<topic>`            原始帧 (raw)
/// - `<topic>/compressed` PNG 压缩帧 (compressed)
/// 订阅端按传输模式选择 topic, compressed 模式在投递线程内解码后再交给回调。
use crate::bus::{Bus, Publisher, Subscription};
use crate::convert::packed_rows;
use crate::error::{ConversionError, PublishError, SubscriptionError};
use crate::frame::{encodings, InboundFrame};
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// 传输模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Raw,
    Compressed,
}

impl TransportMode {
    pub fn name(&self) -> &'static str {
        match self {
            TransportMode::Raw => "raw",
            TransportMode::Compressed => "compressed",
        }
    }

    /// 该模式实际订阅的 topic
    pub fn topic(&self, base: &str) -> String {
        match self {
            TransportMode::Raw => base.to_string(),
            TransportMode::Compressed => format!("{}/compressed", base),
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransportMode {
    type Err = SubscriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raw" => Ok(TransportMode::Raw),
            "compressed" => Ok(TransportMode::Compressed),
            other => Err(SubscriptionError::UnknownTransport(other.to_string())),
        }
    }
}

/// 压缩帧消息
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressedFrame {
    pub format: String,
    pub data: Vec<u8>,
    pub sequence: u64,
}

/// 帧发布者: 原始帧总是发布, 只有存在压缩订阅者时才压缩
#[derive(Debug)]
pub struct FramePublisher {
    raw: Publisher<InboundFrame>,
    compressed: Publisher<CompressedFrame>,
}

impl FramePublisher {
    pub fn advertise(bus: &Bus, topic: &str) -> Result<Self, PublishError> {
        Ok(Self {
            raw: bus.advertise(&TransportMode::Raw.topic(topic))?,
            compressed: bus.advertise(&TransportMode::Compressed.topic(topic))?,
        })
    }

    pub fn topic(&self) -> &str {
        self.raw.topic()
    }

    pub fn publish(&self, frame: InboundFrame) -> Result<(), PublishError> {
        let frame = Arc::new(frame);
        if self.compressed.subscriber_count() > 0 {
            let packed = compress_png(&frame).map_err(|e| PublishError::Encode {
                topic: self.compressed.topic().to_string(),
                reason: e.to_string(),
            });
            match packed {
                Ok(compressed) => {
                    self.compressed.publish(compressed)?;
                }
                Err(e) => log::warn!("⚠️  压缩帧失败,仅发布原始帧: {}", e),
            }
        }
        self.raw.publish_shared(frame)?;
        Ok(())
    }
}

/// 按传输模式订阅帧流
pub fn subscribe_frames<F>(
    bus: &Bus,
    topic: &str,
    mode: TransportMode,
    queue_size: usize,
    mut sink: F,
) -> Result<Subscription, SubscriptionError>
where
    F: FnMut(&InboundFrame) + Send + 'static,
{
    let topic = mode.topic(topic);
    match mode {
        TransportMode::Raw => {
            bus.subscribe::<InboundFrame, _>(&topic, queue_size, move |frame| sink(&*frame))
        }
        TransportMode::Compressed => {
            bus.subscribe::<CompressedFrame, _>(&topic, queue_size, move |msg| {
                match decompress(&msg) {
                    Ok(frame) => sink(&frame),
                    Err(e) => log::error!("❌ 无法解压 {} 帧 #{}: {}", msg.format, msg.sequence, e),
                }
            })
        }
    }
}

fn compress_png(frame: &InboundFrame) -> Result<CompressedFrame, ConversionError> {
    // bayer 原样作为单通道压缩
    let encoding = if frame.encoding.contains("bayer") {
        encodings::MONO8
    } else {
        frame.encoding.as_str()
    };

    let packed = packed_rows(frame, encoding)?;
    let (pixels, color) = match encoding {
        encodings::RGB8 => (packed.into_owned(), ExtendedColorType::Rgb8),
        encodings::RGBA8 => (packed.into_owned(), ExtendedColorType::Rgba8),
        encodings::MONO8 => (packed.into_owned(), ExtendedColorType::L8),
        encodings::BGR8 => (
            packed.chunks_exact(3).flat_map(|px| [px[2], px[1], px[0]]).collect(),
            ExtendedColorType::Rgb8,
        ),
        encodings::BGRA8 => (
            packed
                .chunks_exact(4)
                .flat_map(|px| [px[2], px[1], px[0], px[3]])
                .collect(),
            ExtendedColorType::Rgba8,
        ),
        other => {
            return Err(ConversionError::Unsupported {
                encoding: other.to_string(),
            })
        }
    };

    let mut data = Vec::new();
    PngEncoder::new(&mut data)
        .write_image(&pixels, frame.width, frame.height, color)
        .map_err(|e| ConversionError::Codec {
            format: "png".into(),
            reason: e.to_string(),
        })?;

    Ok(CompressedFrame {
        format: "png".into(),
        data,
        sequence: frame.sequence,
    })
}

fn decompress(msg: &CompressedFrame) -> Result<InboundFrame, ConversionError> {
    let format = ImageFormat::from_extension(&msg.format).ok_or_else(|| {
        ConversionError::Unsupported {
            encoding: msg.format.clone(),
        }
    })?;
    let image = image::load_from_memory_with_format(&msg.data, format).map_err(|e| {
        ConversionError::Codec {
            format: msg.format.clone(),
            reason: e.to_string(),
        }
    })?;

    let (width, height) = (image.width(), image.height());
    let (payload, encoding) = match image {
        DynamicImage::ImageLuma8(gray) => (gray.into_raw(), encodings::MONO8),
        DynamicImage::ImageRgba8(rgba) => (rgba.into_raw(), encodings::RGBA8),
        other => (other.to_rgb8().into_raw(), encodings::RGB8),
    };
    Ok(InboundFrame::new(payload, encoding, width, height, msg.sequence))
}
