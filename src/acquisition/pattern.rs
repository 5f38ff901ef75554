// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 合成测试图: 随帧号平移的渐变
use super::FrameSource;
use crate::convert::bytes_per_pixel;
use crate::frame::{encodings, InboundFrame};

pub struct TestPattern {
    width: u32,
    height: u32,
    sequence: u64,
    encodings: Vec<String>,
}

impl TestPattern {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            sequence: 0,
            encodings: vec![
                encodings::RGB8.to_string(),
                encodings::BGR8.to_string(),
                encodings::BAYER_RGGB8.to_string(),
            ],
        }
    }

    /// 自定义编码轮换顺序 (可以放入不支持的编码来观察转换失败)
    pub fn with_encodings<S: Into<String>>(
        mut self,
        encodings: impl IntoIterator<Item = S>,
    ) -> Self {
        let list: Vec<String> = encodings.into_iter().map(Into::into).collect();
        if !list.is_empty() {
            self.encodings = list;
        }
        self
    }

    fn color_at(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = self.sequence as u32;
        [
            (x.wrapping_add(offset) % 256) as u8,
            (y.wrapping_add(offset) % 256) as u8,
            (offset.wrapping_mul(3) % 256) as u8,
        ]
    }

    fn render(&self, encoding: &str) -> Vec<u8> {
        let bpp = bytes_per_pixel(encoding).unwrap_or(2);
        let mut payload = Vec::with_capacity((self.width * self.height) as usize * bpp);

        for y in 0..self.height {
            for x in 0..self.width {
                let [r, g, b] = self.color_at(x, y);
                match encoding {
                    encodings::RGB8 => payload.extend_from_slice(&[r, g, b]),
                    encodings::BGR8 => payload.extend_from_slice(&[b, g, r]),
                    encodings::RGBA8 => payload.extend_from_slice(&[r, g, b, 255]),
                    encodings::BGRA8 => payload.extend_from_slice(&[b, g, r, 255]),
                    encodings::MONO8 => payload.push(luma(r, g, b)),
                    encodings::MONO16 => {
                        payload.extend_from_slice(&(u16::from(luma(r, g, b)) * 257).to_le_bytes())
                    }
                    // RGGB 马赛克
                    encodings::BAYER_RGGB8 => payload.push(match (y % 2, x % 2) {
                        (0, 0) => r,
                        (1, 1) => b,
                        _ => g,
                    }),
                    _ => payload.extend(std::iter::repeat(128).take(bpp)),
                }
            }
        }
        payload
    }
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114) / 1000) as u8
}

impl FrameSource for TestPattern {
    fn name(&self) -> &str {
        "pattern"
    }

    fn next_frame(&mut self) -> Option<InboundFrame> {
        self.sequence += 1;
        let encoding = &self.encodings[(self.sequence as usize - 1) % self.encodings.len()];
        let payload = self.render(encoding);
        Some(InboundFrame::new(
            payload,
            encoding.clone(),
            self.width,
            self.height,
            self.sequence,
        ))
    }
}
