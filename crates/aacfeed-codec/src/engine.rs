//! AAC 解码引擎 trait 定义.
//!
//! 引擎以帧为单位工作: 调用方给出当前未读数据, 引擎解码开头的一帧,
//! 并报告消费的字节数. 调用方按报告的字节数推进输入.
//!
//! 解码流程:
//! 1. [`EngineProvider::open`] 创建引擎
//! 2. 按能力调整 [`EngineConfig`]
//! 3. [`AacEngine::init`] 识别流参数
//! 4. 反复调用 [`AacEngine::decode`]
//! 5. [`AacEngine::close`] 释放资源 ([`EngineHandle`] 保证恰好一次)

use std::ops::{Deref, DerefMut};

use aacfeed_core::{DecoderConfig, FeedResult};
use bitflags::bitflags;

bitflags! {
    /// 引擎可选能力
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EngineCapabilities: u32 {
        /// 多声道下混为立体声
        const DOWNMIX               = 1 << 0;
        /// 隐式 SBR 流按双倍采样率输出
        const UPSAMPLE_IMPLICIT_SBR = 1 << 1;
    }
}

/// PCM 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// 16 位有符号整数, 交错
    #[default]
    S16,
}

/// 引擎配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineConfig {
    pub output: OutputFormat,
    pub downmix: bool,
    pub upsample_implicit_sbr: bool,
}

impl EngineConfig {
    /// 在引擎当前配置上应用解码配置
    ///
    /// 输出固定为 16 位; 下混与 SBR 上采样只在引擎声明了对应能力时修改.
    pub fn negotiate(
        current: EngineConfig,
        config: &DecoderConfig,
        caps: EngineCapabilities,
    ) -> EngineConfig {
        let mut next = current;
        next.output = OutputFormat::S16;
        if caps.contains(EngineCapabilities::DOWNMIX) {
            next.downmix = config.downmix;
        }
        if caps.contains(EngineCapabilities::UPSAMPLE_IMPLICIT_SBR) {
            next.upsample_implicit_sbr = config.upsample_implicit_sbr;
        }
        next
    }
}

/// `init` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitInfo {
    /// 初始化过程中消费的字节数
    pub bytes_consumed: usize,
    pub sample_rate: u32,
    pub channels: u8,
}

/// 单帧解码信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    /// 本帧消费的输入字节数
    pub bytes_consumed: usize,
    /// 输出采样总数 (所有声道合计)
    pub samples: usize,
    pub channels: u8,
    pub sample_rate: u32,
    /// 错误码, 0 表示成功
    pub error: u8,
}

impl FrameInfo {
    pub fn is_error(&self) -> bool {
        self.error != 0
    }

    /// 仅携带错误码的帧信息
    pub fn failed(error: u8, bytes_consumed: usize) -> Self {
        Self {
            bytes_consumed,
            error,
            ..Default::default()
        }
    }
}

/// 单帧解码结果, PCM 借用引擎内部缓冲区直到下一次调用
#[derive(Debug, Clone, Copy)]
pub struct DecodedFrame<'a> {
    pub info: FrameInfo,
    /// 交错 16 位 PCM, 长度等于 `info.samples`
    pub pcm: &'a [i16],
}

/// AAC 解码引擎 trait
pub trait AacEngine: Send {
    /// 引擎名称
    fn name(&self) -> &str;

    /// 引擎支持的可选能力
    fn capabilities(&self) -> EngineCapabilities;

    /// 当前配置
    fn configuration(&self) -> EngineConfig;

    /// 应用配置
    fn set_configuration(&mut self, config: EngineConfig) -> FeedResult<()>;

    /// 从流开头的数据识别采样率与声道数
    ///
    /// # 返回
    /// - `Ok(info)`: 识别成功, `info.bytes_consumed` 为应跳过的字节数
    /// - `Err(FeedError::EngineInit(status))`: 引擎返回负状态码
    fn init(&mut self, data: &[u8]) -> FeedResult<InitInfo>;

    /// 解码 `data` 开头的一帧
    ///
    /// 失败通过 `info.error` 报告, 不返回 `Err`.
    fn decode(&mut self, data: &[u8]) -> DecodedFrame<'_>;

    /// 错误码对应的描述
    fn error_message(&self, code: u8) -> String;

    /// 释放引擎资源
    fn close(&mut self);
}

/// 引擎工厂
pub trait EngineProvider: Send + Sync {
    fn open(&self) -> FeedResult<Box<dyn AacEngine>>;
}

impl<F> EngineProvider for F
where
    F: Fn() -> FeedResult<Box<dyn AacEngine>> + Send + Sync,
{
    fn open(&self) -> FeedResult<Box<dyn AacEngine>> {
        self()
    }
}

/// 引擎句柄, 保证 `close` 恰好调用一次
///
/// 显式调用 [`EngineHandle::close`] 或离开作用域时关闭.
pub struct EngineHandle {
    engine: Box<dyn AacEngine>,
    closed: bool,
}

impl EngineHandle {
    /// 通过工厂打开引擎
    pub fn open(provider: &dyn EngineProvider) -> FeedResult<Self> {
        Ok(Self::new(provider.open()?))
    }

    pub fn new(engine: Box<dyn AacEngine>) -> Self {
        Self {
            engine,
            closed: false,
        }
    }

    /// 关闭引擎, 重复调用无效果
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.engine.close();
            log::debug!("解码引擎 {} 已关闭", self.engine.name());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Deref for EngineHandle {
    type Target = dyn AacEngine;

    fn deref(&self) -> &Self::Target {
        self.engine.as_ref()
    }
}

impl DerefMut for EngineHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.engine.as_mut()
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.close();
    }
}
