//! # aacfeed-codec
//!
//! AAC 解码引擎接口.
//!
//! 解码前端不关心具体的 AAC 解码算法, 只通过 [`AacEngine`] 使用引擎:
//! 打开 → 配置 → `init` → 逐帧 `decode` → 关闭.
//! 启用 `symphonia-backend` 特性时提供基于 symphonia 的实现.

pub mod engine;
pub mod engines;

pub use engine::{
    AacEngine, DecodedFrame, EngineCapabilities, EngineConfig, EngineHandle, EngineProvider,
    FrameInfo, InitInfo, OutputFormat,
};
#[cfg(feature = "symphonia-backend")]
pub use engines::SymphoniaAacEngine;
