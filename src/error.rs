// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 错误类型 (Error types)
//!
//! 除启动阶段的订阅失败外,全部是可恢复错误: 调用方记录日志后继续运行。

use std::path::PathBuf;
use thiserror::Error;

/// 帧格式转换失败 (跳过该帧,FrameSlot 保留上一帧)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("unsupported encoding: {encoding}")]
    Unsupported { encoding: String },

    #[error("malformed {encoding} frame: expected at least {expected} bytes, got {actual}")]
    Malformed {
        encoding: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid {encoding} geometry: {width}x{height}, step {step}")]
    Geometry {
        encoding: String,
        width: u32,
        height: u32,
        step: u32,
    },

    #[error("{format} codec failed: {reason}")]
    Codec { format: String, reason: String },
}

impl ConversionError {
    /// 出错帧的编码名 (日志用)
    pub fn encoding(&self) -> &str {
        match self {
            Self::Unsupported { encoding }
            | Self::Malformed { encoding, .. }
            | Self::Geometry { encoding, .. } => encoding,
            Self::Codec { format, .. } => format,
        }
    }
}

/// 订阅注册失败 (启动时致命,运行时切换可重试)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("topic {0} is not advertised")]
    TopicUnavailable(String),

    #[error("topic {topic} carries {actual}, not {expected}")]
    TypeMismatch {
        topic: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("unknown transport mode: {0}")]
    UnknownTransport(String),

    #[error("transport is shut down")]
    TransportClosed,

    #[error("failed to spawn delivery thread for {topic}: {reason}")]
    Spawn { topic: String, reason: String },
}

/// 发布失败 (记录日志,不重试)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("transport is shut down")]
    Closed,

    #[error("topic {topic} carries {actual}, not {expected}")]
    TypeMismatch {
        topic: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("failed to encode message for {topic}: {reason}")]
    Encode { topic: String, reason: String },
}

/// 配置加载失败
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
