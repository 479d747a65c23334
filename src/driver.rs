//! 解码驱动.
//!
//! 一次解码会话:
//!
//! ```text
//! 估算总时长 → 重新打开输入 → 跳过 ID3v2 → 引擎 init
//!   → 循环 { 检查停止/跳转 → 解码一帧 → 写入 PCM 块 → 补读 }
//!   → 发布最后的不完整块 → 关闭引擎 → Stopped
//! ```
//!
//! 解码线程在会话期间独占输入, 游标和引擎; 与播放线程只通过
//! [`DecoderControl`] 和 [`ChunkSink`] 交互.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use aacfeed_codec::{EngineConfig, EngineHandle, EngineProvider, OutputFormat};
use aacfeed_core::{
    AudioFormat, ChunkSink, DecoderConfig, DecoderControl, FeedError, FeedResult, SessionState,
};
use aacfeed_format::{ContainerProbe, InputSource, ProbeReport, ProbedDuration, StreamCursor};
use log::{debug, error, info};

/// 解码循环结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    EndOfStream,
    Stopped,
    DecodeError,
}

/// AAC 解码驱动
pub struct DecodeDriver {
    provider: Box<dyn EngineProvider>,
    config: DecoderConfig,
}

impl DecodeDriver {
    /// 使用指定引擎工厂创建驱动
    pub fn new(provider: impl EngineProvider + 'static, config: DecoderConfig) -> FeedResult<Self> {
        config.validate()?;
        Ok(Self {
            provider: Box::new(provider),
            config,
        })
    }

    /// 使用 symphonia 引擎创建驱动
    #[cfg(feature = "symphonia-backend")]
    pub fn with_symphonia(config: DecoderConfig) -> FeedResult<Self> {
        Self::new(aacfeed_codec::SymphoniaAacEngine::create, config)
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// 探测容器并估算时长
    ///
    /// 容器无法识别时用引擎试解码: 能识别出流参数则报告 [`ProbedDuration::Streaming`].
    pub fn probe(&self, source: &InputSource) -> FeedResult<ProbeReport> {
        let mut cursor = StreamCursor::open(source.open()?, self.config.cursor_capacity())?;
        let mut report = ContainerProbe::run(&mut cursor)?;
        if report.duration.is_unknown() && self.probe_decode(&mut cursor)? {
            report.duration = ProbedDuration::Streaming;
        }
        debug!("{} 探测结果: {:?}", source.describe(), report);
        Ok(report)
    }

    /// 总时长
    pub fn total_time(&self, source: &InputSource) -> FeedResult<ProbedDuration> {
        Ok(self.probe(source)?.duration)
    }

    /// 四舍五入到整秒的总时长, 无法确定 (或无法打开) 时为 -1
    pub fn total_time_secs(&self, source: &InputSource) -> i32 {
        match self.total_time(source) {
            Ok(duration) if !duration.is_unknown() => (duration.as_secs() + 0.5) as i32,
            Ok(_) => -1,
            Err(e) => {
                debug!("{} 无法估算时长: {e}", source.describe());
                -1
            }
        }
    }

    fn probe_decode(&self, cursor: &mut StreamCursor) -> FeedResult<bool> {
        let mut engine = EngineHandle::open(self.provider.as_ref())?;
        let config = EngineConfig {
            output: OutputFormat::S16,
            ..engine.configuration()
        };
        engine.set_configuration(config)?;
        cursor.refill()?;
        match engine.init(cursor.data()) {
            Ok(info) => Ok(info.sample_rate > 0 && info.channels > 0),
            Err(e) => {
                debug!("试解码失败: {e}");
                Ok(false)
            }
        }
    }

    /// 解码控制块指定的文件
    pub fn decode(&self, sink: &ChunkSink, control: &DecoderControl) -> FeedResult<()> {
        let source = InputSource::File(control.file());
        self.decode_source(&source, sink, control)
    }

    /// 解码指定输入, 直到流结束, 收到停止请求或解码出错
    ///
    /// # 返回
    /// - `Ok(())`: 会话已运行并结束 (解码错误只记录日志)
    /// - `Err(FeedError::NotAacStream)`: 时长无法确定或引擎初始化失败, 会话未开始
    /// - `Err(FeedError::Io)`: 输入无法打开或读取失败
    pub fn decode_source(
        &self,
        source: &InputSource,
        sink: &ChunkSink,
        control: &DecoderControl,
    ) -> FeedResult<()> {
        let label = source.describe();
        control.begin_session();
        let total = self.total_time(source)?;
        if total.is_unknown() {
            return Err(FeedError::NotAacStream(label));
        }

        let mut cursor = StreamCursor::open(source.open()?, self.config.cursor_capacity())?;
        ContainerProbe::skip_id3v2(&mut cursor)?;

        let mut engine = EngineHandle::open(self.provider.as_ref())?;
        let engine_config =
            EngineConfig::negotiate(engine.configuration(), &self.config, engine.capabilities());
        engine.set_configuration(engine_config)?;

        cursor.refill()?;
        let init = match engine.init(cursor.data()) {
            Ok(init) => init,
            Err(e) => {
                error!("不是 AAC 流: {label} ({e})");
                engine.close();
                return Err(FeedError::NotAacStream(label));
            }
        };

        let format = AudioFormat::s16(init.sample_rate, init.channels);
        control.set_audio_format(format);
        control.set_total_time(total.as_secs());
        control.set_state(SessionState::Decoding);
        info!(
            "开始解码 {label}: {format}, 总时长 {:.2}s, 引擎 {}",
            total.as_secs(),
            engine.name()
        );

        cursor.advance(init.bytes_consumed);
        let mut session = DecodeSession {
            engine,
            writer: ChunkWriter::new(sink.chunk_size()),
            label: &label,
        };
        let exit = cursor
            .refill()
            .and_then(|()| session.run(&mut cursor, sink, control, self.config.poll_interval()));

        if !matches!(exit, Ok(LoopExit::Stopped)) && session.writer.pending > 0 {
            sink.publish(session.writer.pending);
        }
        let written = session.writer.published_time();
        session.engine.close();
        drop(session);
        drop(cursor);

        control.clear_seek();
        if control.stop_requested() {
            control.clear_stop();
        }
        control.set_state(SessionState::Stopped);

        match exit {
            Ok(reason) => {
                info!("解码结束 {label}: {reason:?}, 已输出 {written:.2}s");
                Ok(())
            }
            Err(e) => {
                error!("解码 {label} 时读取失败: {e}");
                Err(e)
            }
        }
    }

    /// 在新线程中运行解码会话
    pub fn spawn(
        self: Arc<Self>,
        source: InputSource,
        sink: Arc<ChunkSink>,
        control: Arc<DecoderControl>,
    ) -> std::io::Result<JoinHandle<FeedResult<()>>> {
        thread::Builder::new()
            .name("aacfeed-decode".to_string())
            .spawn(move || self.decode_source(&source, &sink, &control))
    }
}

struct DecodeSession<'a> {
    engine: EngineHandle,
    writer: ChunkWriter,
    label: &'a str,
}

impl DecodeSession<'_> {
    fn run(
        &mut self,
        cursor: &mut StreamCursor,
        sink: &ChunkSink,
        control: &DecoderControl,
        poll: Duration,
    ) -> FeedResult<LoopExit> {
        loop {
            if control.stop_requested() {
                return Ok(LoopExit::Stopped);
            }
            if control.seek_requested() {
                debug!("不支持跳转, 回报失败");
                control.reject_seek();
            }

            let frame = self.engine.decode(cursor.data());
            let info = frame.info;
            cursor.advance(info.bytes_consumed);

            if info.is_error() {
                error!("AAC 解码出错: {}", self.label);
                error!("引擎错误: {}", self.engine.error_message(info.error));
                return Ok(LoopExit::DecodeError);
            }

            if info.samples > 0 && info.channels > 0 && info.sample_rate > 0 {
                let samples = info.samples as f64;
                let channels = f64::from(info.channels);
                let rate = f64::from(info.sample_rate);
                let bit_rate =
                    info.bytes_consumed as f64 * 8.0 * channels * rate / samples / 1024.0 + 0.5;
                self.writer.bit_rate = bit_rate as u16;
                self.writer.time += (samples / channels / rate) as f32;
            }

            if !self.writer.place(frame.pcm, sink, control, poll) {
                return Ok(LoopExit::Stopped);
            }

            cursor.refill()?;
            if cursor.unread() == 0 {
                return Ok(LoopExit::EndOfStream);
            }
        }
    }
}

/// 把 PCM 写入循环缓冲区, 凑满一块即发布
struct ChunkWriter {
    chunk_size: usize,
    /// 累计播放时间 (秒)
    time: f32,
    /// 最近一帧的码率 (kbit/s)
    bit_rate: u16,
    /// 正在填充的块中已写入的字节数
    pending: usize,
    scratch: Vec<u8>,
}

impl ChunkWriter {
    fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            time: 0.0,
            bit_rate: 0,
            pending: 0,
            scratch: Vec::with_capacity(chunk_size * 2),
        }
    }

    /// 写入一帧 PCM, 收到停止请求时放弃剩余数据并返回 `false`
    fn place(
        &mut self,
        pcm: &[i16],
        sink: &ChunkSink,
        control: &DecoderControl,
        poll: Duration,
    ) -> bool {
        self.scratch.clear();
        self.scratch.extend(pcm.iter().flat_map(|s| s.to_ne_bytes()));

        let mut offset = 0;
        while offset < self.scratch.len() {
            if !sink.wait_for_space(control, poll) {
                return false;
            }
            let n = (self.scratch.len() - offset).min(self.chunk_size - self.pending);
            sink.write_open(
                self.pending,
                &self.scratch[offset..offset + n],
                self.time,
                self.bit_rate,
            );
            offset += n;
            self.pending += n;
            if self.pending >= self.chunk_size {
                sink.publish(self.chunk_size);
                self.pending = 0;
            }
        }
        true
    }

    fn published_time(&self) -> f32 {
        self.time
    }
}
