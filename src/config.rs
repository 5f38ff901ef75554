// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 启动参数与配置 (CLI arguments and viewer configuration)
///
/// 优先级: 默认值 < `--config` JSON 文件 < 命令行显式参数
use crate::error::ConfigError;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TOPIC: &str = "vslam/preview";
pub const DEFAULT_COMMAND_TOPIC: &str = "vslam/key_pressed";

/// 远程预览 + 按键命令
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "远程预览图像流并通过按键发送命令", long_about = None)]
pub struct Args {
    /// 传输模式 (raw/compressed)
    pub transport: Option<String>,

    /// 图像 topic
    #[arg(long)]
    pub topic: Option<String>,

    /// 命令 topic
    #[arg(long)]
    pub command_topic: Option<String>,

    /// 窗口名 (默认与图像 topic 相同)
    #[arg(long)]
    pub window_name: Option<String>,

    /// 状态行自动适应终端宽度
    #[arg(long)]
    pub autosize: bool,

    /// 按键轮询间隔 (毫秒)
    #[arg(long)]
    pub poll_ms: Option<u64>,

    /// 订阅队列长度
    #[arg(long)]
    pub queue_size: Option<usize>,

    /// 帧来源: pattern 或图片目录
    #[arg(short, long)]
    pub source: Option<String>,

    /// 帧来源发布帧率
    #[arg(long)]
    pub fps: Option<u32>,

    /// 在本地回显发出的命令
    #[arg(long)]
    pub echo_commands: bool,

    /// JSON 配置文件
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// 帧来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Pattern,
    Directory(PathBuf),
}

/// 解析后的运行配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub topic: String,
    pub command_topic: String,
    pub transport: String,
    pub window_name: Option<String>,
    pub autosize: bool,
    pub poll_ms: u64,
    pub queue_size: usize,
    pub source: String,
    pub fps: u32,
    pub echo_commands: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            command_topic: DEFAULT_COMMAND_TOPIC.to_string(),
            transport: "raw".to_string(),
            window_name: None,
            autosize: false,
            poll_ms: 10,
            queue_size: 1,
            source: "pattern".to_string(),
            fps: 15,
            echo_commands: false,
        }
    }
}

impl ViewerConfig {
    /// 从JSON文件加载配置 (缺省字段取默认值)
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("✅ 配置已从 {} 加载", path.display());
        Ok(config)
    }

    /// 合并配置文件与命令行参数
    pub fn resolve(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(transport) = &args.transport {
            config.transport = transport.clone();
        }
        if let Some(topic) = &args.topic {
            config.topic = topic.clone();
        }
        if let Some(command_topic) = &args.command_topic {
            config.command_topic = command_topic.clone();
        }
        if let Some(window_name) = &args.window_name {
            config.window_name = Some(window_name.clone());
        }
        if let Some(poll_ms) = args.poll_ms {
            config.poll_ms = poll_ms;
        }
        if let Some(queue_size) = args.queue_size {
            config.queue_size = queue_size;
        }
        if let Some(source) = &args.source {
            config.source = source.clone();
        }
        if let Some(fps) = args.fps {
            config.fps = fps;
        }
        config.autosize |= args.autosize;
        config.echo_commands |= args.echo_commands;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topic.trim().is_empty() || self.command_topic.trim().is_empty() {
            return Err(ConfigError::Invalid("topics must not be empty".into()));
        }
        if self.topic == self.command_topic {
            return Err(ConfigError::Invalid(format!(
                "image and command topics are both {}",
                self.topic
            )));
        }
        if self.poll_ms == 0 {
            return Err(ConfigError::Invalid("poll_ms must be positive".into()));
        }
        if self.queue_size == 0 {
            return Err(ConfigError::Invalid("queue_size must be positive".into()));
        }
        if self.fps == 0 {
            return Err(ConfigError::Invalid("fps must be positive".into()));
        }
        Ok(())
    }

    pub fn window_name(&self) -> &str {
        self.window_name.as_deref().unwrap_or(&self.topic)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps))
    }

    pub fn source_spec(&self) -> SourceSpec {
        if self.source.eq_ignore_ascii_case("pattern") {
            SourceSpec::Pattern
        } else {
            SourceSpec::Directory(PathBuf::from(&self.source))
        }
    }
}
