//! # aacfeed-core
//!
//! aacfeed 核心库, 提供解码线程与播放线程之间共享的基础设施:
//!
//! - 统一错误类型 [`FeedError`]
//! - 解码配置 [`DecoderConfig`]
//! - 跨线程控制信号 [`DecoderControl`]
//! - 定长循环 PCM 块缓冲区 [`ChunkSink`]

pub mod audio_format;
pub mod chunk;
pub mod config;
pub mod control;
pub mod error;

// 重导出常用类型
pub use audio_format::AudioFormat;
pub use chunk::{Chunk, ChunkSink};
pub use config::DecoderConfig;
pub use control::{DecoderControl, SessionState};
pub use error::{FeedError, FeedResult};
