// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 帧格式转换 (Frame conversion → bgr8)
///
/// 只做像素排列/通道转换,不做任何图像处理。
use crate::error::ConversionError;
use crate::frame::{encodings, CanonicalFrame, InboundFrame};
use chrono::Local;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbaImage};
use std::borrow::Cow;

/// 每像素字节数, 未知编码返回 None
pub fn bytes_per_pixel(encoding: &str) -> Option<usize> {
    match encoding {
        encodings::RGB8 | encodings::BGR8 => Some(3),
        encodings::RGBA8 | encodings::BGRA8 => Some(4),
        encodings::MONO8 => Some(1),
        encodings::MONO16 => Some(2),
        e if e.starts_with("bayer_") && e.ends_with('8') => Some(1),
        _ => None,
    }
}

/// 去掉行尾填充,返回紧密排列的像素
pub(crate) fn packed_rows<'a>(
    frame: &'a InboundFrame,
    encoding: &str,
) -> Result<Cow<'a, [u8]>, ConversionError> {
    let bpp = bytes_per_pixel(encoding).ok_or_else(|| ConversionError::Unsupported {
        encoding: encoding.to_string(),
    })?;

    let geometry = || ConversionError::Geometry {
        encoding: encoding.to_string(),
        width: frame.width,
        height: frame.height,
        step: frame.step,
    };

    // 尺寸来自上游元数据, 溢出按几何错误处理
    let row = (frame.width as usize)
        .checked_mul(bpp)
        .ok_or_else(geometry)?;
    let step = if frame.step == 0 {
        row
    } else {
        frame.step as usize
    };
    if frame.width == 0 || frame.height == 0 || step < row {
        return Err(geometry());
    }

    let height = frame.height as usize;
    let packed_len = row.checked_mul(height).ok_or_else(geometry)?;
    let expected = step
        .checked_mul(height - 1)
        .and_then(|rows| rows.checked_add(row))
        .ok_or_else(geometry)?;
    if frame.payload.len() < expected {
        return Err(ConversionError::Malformed {
            encoding: encoding.to_string(),
            expected,
            actual: frame.payload.len(),
        });
    }

    if step == row {
        return Ok(Cow::Borrowed(&frame.payload[..packed_len]));
    }

    let mut packed = Vec::with_capacity(packed_len);
    for line in frame.payload.chunks(step).take(height) {
        packed.extend_from_slice(&line[..row]);
    }
    Ok(Cow::Owned(packed))
}

/// 转换服务: `from` 编码 → `to` 编码 (目前只支持 bgr8 目标)
pub fn convert(
    frame: &InboundFrame,
    from: &str,
    to: &str,
) -> Result<CanonicalFrame, ConversionError> {
    if to != CanonicalFrame::ENCODING {
        return Err(ConversionError::Unsupported {
            encoding: to.to_string(),
        });
    }

    let packed = packed_rows(frame, from)?;
    let data = match from {
        encodings::BGR8 => packed.into_owned(),
        encodings::BGRA8 => packed
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect(),
        encodings::RGB8 => swap_red_blue(&packed),
        encodings::MONO8 | encodings::MONO16 | encodings::RGBA8 => {
            let image = to_dynamic(&packed, from, frame.width, frame.height)?;
            swap_red_blue(&image.to_rgb8().into_raw())
        }
        _ => {
            return Err(ConversionError::Unsupported {
                encoding: from.to_string(),
            })
        }
    };

    Ok(CanonicalFrame {
        data,
        width: frame.width,
        height: frame.height,
        sequence: frame.sequence,
        source_encoding: frame.encoding.clone(),
        received_at: Local::now(),
    })
}

fn to_dynamic(
    packed: &[u8],
    encoding: &str,
    width: u32,
    height: u32,
) -> Result<DynamicImage, ConversionError> {
    let malformed = || ConversionError::Malformed {
        encoding: encoding.to_string(),
        expected: (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(bytes_per_pixel(encoding).unwrap_or(1)),
        actual: packed.len(),
    };

    let image = match encoding {
        encodings::MONO8 => {
            let gray = GrayImage::from_raw(width, height, packed.to_vec()).ok_or_else(malformed)?;
            DynamicImage::ImageLuma8(gray)
        }
        encodings::MONO16 => {
            // 小端字节序
            let samples: Vec<u16> = packed
                .chunks_exact(2)
                .map(|b| u16::from_le_bytes([b[0], b[1]]))
                .collect();
            let buffer: ImageBuffer<Luma<u16>, Vec<u16>> =
                ImageBuffer::from_raw(width, height, samples).ok_or_else(malformed)?;
            DynamicImage::ImageLuma16(buffer)
        }
        encodings::RGBA8 => {
            let rgba = RgbaImage::from_raw(width, height, packed.to_vec()).ok_or_else(malformed)?;
            DynamicImage::ImageRgba8(rgba)
        }
        _ => {
            return Err(ConversionError::Unsupported {
                encoding: encoding.to_string(),
            })
        }
    };
    Ok(image)
}

fn swap_red_blue(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3)
        .flat_map(|px| [px[2], px[1], px[0]])
        .collect()
}
