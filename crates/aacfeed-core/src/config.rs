//! 解码配置.
//!
//! 所有字段都有默认值, 可从 JSON 片段部分覆盖.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{FeedError, FeedResult};

/// 解码前端配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DecoderConfig {
    /// 每个 PCM 块的字节容量
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// 循环缓冲区中的块数
    #[serde(default = "default_buffered_chunks")]
    pub buffered_chunks: usize,
    /// 支持的最大声道数, 决定读缓冲区大小
    #[serde(default = "default_max_channels")]
    pub max_channels: usize,
    /// 每声道最小解码单元字节数
    #[serde(default = "default_min_stream_size")]
    pub min_stream_size: usize,
    /// 缓冲区满时的等待轮询间隔 (毫秒)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 引擎支持时, 多声道下混为立体声
    #[serde(default = "default_true")]
    pub downmix: bool,
    /// 引擎支持时, 对隐式 SBR 流按双倍采样率输出
    #[serde(default = "default_true")]
    pub upsample_implicit_sbr: bool,
}

fn default_chunk_size() -> usize {
    1020
}

fn default_buffered_chunks() -> usize {
    1024
}

fn default_max_channels() -> usize {
    6
}

fn default_min_stream_size() -> usize {
    768
}

fn default_poll_interval_ms() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            buffered_chunks: default_buffered_chunks(),
            max_channels: default_max_channels(),
            min_stream_size: default_min_stream_size(),
            poll_interval_ms: default_poll_interval_ms(),
            downmix: true,
            upsample_implicit_sbr: true,
        }
    }
}

impl DecoderConfig {
    /// 从 JSON 文本解析配置, 缺省字段取默认值
    pub fn from_json_str(text: &str) -> FeedResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> FeedResult<()> {
        if self.chunk_size == 0 {
            return Err(FeedError::Config("chunk_size 必须大于 0".into()));
        }
        // 16 位采样不能被拆到两个块中
        if self.chunk_size % 2 != 0 {
            return Err(FeedError::Config(format!(
                "chunk_size 必须为偶数, 当前 {}",
                self.chunk_size
            )));
        }
        if self.buffered_chunks == 0 {
            return Err(FeedError::Config("buffered_chunks 必须大于 0".into()));
        }
        if self.max_channels == 0 || self.min_stream_size == 0 {
            return Err(FeedError::Config(
                "max_channels 与 min_stream_size 必须大于 0".into(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(FeedError::Config("poll_interval_ms 必须大于 0".into()));
        }
        Ok(())
    }

    /// 读缓冲区容量 (字节)
    pub fn cursor_capacity(&self) -> usize {
        self.min_stream_size * self.max_channels
    }

    /// 缓冲区满时的等待间隔
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DecoderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cursor_capacity(), 4608);
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = DecoderConfig::from_json_str(r#"{"chunk_size": 2048, "downmix": false}"#)
            .unwrap();
        assert_eq!(config.chunk_size, 2048);
        assert!(!config.downmix);
        assert_eq!(config.buffered_chunks, 1024);
        assert!(config.upsample_implicit_sbr);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = DecoderConfig::default();
        config.chunk_size = 1021;
        assert!(config.validate().is_err());

        config.chunk_size = 1020;
        config.buffered_chunks = 0;
        assert!(config.validate().is_err());

        assert!(DecoderConfig::from_json_str(r#"{"poll_interval_ms": 0}"#).is_err());
        assert!(matches!(
            DecoderConfig::from_json_str("not json"),
            Err(FeedError::Config(_))
        ));
    }
}
