// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 图片目录来源: 按文件名顺序循环发布
use super::FrameSource;
use crate::frame::{encodings, InboundFrame};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub struct ImageDir {
    name: String,
    files: Vec<PathBuf>,
    index: usize,
    sequence: u64,
}

impl ImageDir {
    pub fn open(dir: &Path) -> io::Result<Self> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no images in {}", dir.display()),
            ));
        }
        log::info!("📂 {} 张图片: {}", files.len(), dir.display());

        Ok(Self {
            name: dir.display().to_string(),
            files,
            index: 0,
            sequence: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageDir {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> Option<InboundFrame> {
        let path = &self.files[self.index];
        self.index = (self.index + 1) % self.files.len();

        match image::open(path) {
            Ok(img) => {
                let rgb = img.to_rgb8();
                let (width, height) = rgb.dimensions();
                self.sequence += 1;
                Some(InboundFrame::new(
                    rgb.into_raw(),
                    encodings::RGB8,
                    width,
                    height,
                    self.sequence,
                ))
            }
            Err(e) => {
                log::warn!("⚠️  跳过 {}: {}", path.display(), e);
                None
            }
        }
    }
}
