//! # aacfeed
//!
//! AAC 流式解码前端: 把可能带标签包裹的 AAC 裸流转换为
//! 总时长估算和带时间戳的 16 位 PCM 块序列, 供实时播放使用.
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use aacfeed::core::{ChunkSink, DecoderConfig, DecoderControl};
//! use aacfeed::DecodeDriver;
//!
//! let config = DecoderConfig::default();
//! let driver = DecodeDriver::with_symphonia(config.clone()).unwrap();
//! let sink = Arc::new(ChunkSink::from_config(&config).unwrap());
//! let control = Arc::new(DecoderControl::for_file("music/song.aac"));
//!
//! driver.decode(&sink, &control).unwrap();
//! while let Some(chunk) = sink.pop_front() {
//!     println!("{:.2}s {} kbit/s {} 字节", chunk.time, chunk.bit_rate, chunk.data.len());
//! }
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `aacfeed-core` | 错误, 配置, 控制信号, PCM 块缓冲区 |
//! | `aacfeed-format` | 输入后端, 预读游标, 标签与容器探测 |
//! | `aacfeed-codec` | 解码引擎接口与 symphonia 后端 |

/// 核心类型
pub use aacfeed_core as core;

/// 输入与容器探测
pub use aacfeed_format as format;

/// 解码引擎
pub use aacfeed_codec as codec;

pub mod driver;
pub mod logging;

pub use driver::DecodeDriver;

/// 获取 aacfeed 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
