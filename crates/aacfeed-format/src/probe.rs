//! 容器探测与时长估算.
//!
//! 依次识别:
//! 1. 开头的 ID3v2 块 (跳过)
//! 2. ADTS: 逐帧累加帧长, 时长 = 帧数 × 1024 / 采样率
//! 3. ADIF: 由头部码率与文件大小估算
//!
//! 都不匹配时返回 [`Container::Unknown`], 由调用方决定是否试解码.

use aacfeed_core::FeedResult;
use log::debug;

use crate::adts::{self, ADTS_HEADER_SIZE, SAMPLES_PER_FRAME};
use crate::cursor::StreamCursor;
use crate::tag;

/// 识别出的容器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// ADTS 帧序列
    Adts,
    /// ADIF 单头部流
    Adif,
    /// 无法识别
    Unknown,
}

/// 探测得到的总时长
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbedDuration {
    /// 已知时长 (秒)
    Known(f32),
    /// 可以解码但无法估算时长
    Streaming,
    /// 无法确定
    Unknown,
}

impl ProbedDuration {
    /// 转为秒数: `Streaming` 为 0, `Unknown` 为 -1
    pub fn as_secs(&self) -> f32 {
        match self {
            ProbedDuration::Known(secs) => *secs,
            ProbedDuration::Streaming => 0.0,
            ProbedDuration::Unknown => -1.0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ProbedDuration::Unknown)
    }
}

/// 探测结果
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub container: Container,
    pub duration: ProbedDuration,
    /// 首帧采样率 (仅 ADTS)
    pub sample_rate: u32,
    /// 每秒帧数 (仅 ADTS)
    pub frames_per_sec: f32,
    /// 平均帧长 / 1000 (仅 ADTS, 诊断用)
    pub bytes_per_frame: f32,
    /// 计入的完整帧数 (仅 ADTS)
    pub frame_count: u64,
    /// 头部码率 (仅 ADIF, bit/s)
    pub bit_rate: u32,
    /// 输入总字节数
    pub file_size: u64,
    /// 开头 ID3v2 块大小 (含头部), 无则为 0
    pub tag_size: u64,
}

impl ProbeReport {
    fn new(file_size: u64, tag_size: u64) -> Self {
        Self {
            container: Container::Unknown,
            duration: ProbedDuration::Unknown,
            sample_rate: 0,
            frames_per_sec: 0.0,
            bytes_per_frame: 0.0,
            frame_count: 0,
            bit_rate: 0,
            file_size,
            tag_size,
        }
    }
}

/// 容器探测器
pub struct ContainerProbe;

impl ContainerProbe {
    /// 在游标当前位置执行探测
    ///
    /// 返回时游标位于首个音频字节 (ADTS 会回退到 ID3v2 块之后).
    pub fn run(cursor: &mut StreamCursor) -> FeedResult<ProbeReport> {
        let tag_size = Self::skip_id3v2(cursor)?;
        let mut report = ProbeReport::new(cursor.file_size(), tag_size);

        if adts::is_adts_sync(cursor.data()) {
            Self::count_adts_frames(cursor, &mut report)?;
            cursor.rewind_to(tag_size)?;
        } else if cursor.data().starts_with(b"ADIF") {
            Self::read_adif(cursor.data(), &mut report);
        } else {
            debug!("未识别容器, 开头字节 {:02X?}", &cursor.data()[..cursor.unread().min(4)]);
        }
        Ok(report)
    }

    /// 跳过开头的 ID3v2 块, 返回跳过的字节数
    pub fn skip_id3v2(cursor: &mut StreamCursor) -> FeedResult<u64> {
        match tag::id3v2_size(cursor.data()) {
            Some(size) => {
                debug!("跳过 ID3v2 标签, 大小={size}");
                cursor.skip(size)?;
                Ok(size)
            }
            None => Ok(0),
        }
    }

    fn count_adts_frames(cursor: &mut StreamCursor, report: &mut ProbeReport) -> FeedResult<()> {
        report.container = Container::Adts;
        let mut frames: u64 = 0;
        let mut total_len: u64 = 0;

        loop {
            cursor.refill()?;
            let data = cursor.data();
            if data.len() <= ADTS_HEADER_SIZE || !adts::is_adts_sync(data) {
                break;
            }
            if frames == 0 {
                report.sample_rate = adts::adts_sample_rate(data);
            }
            let frame_len = adts::adts_frame_length(data);
            if frame_len < ADTS_HEADER_SIZE || frame_len > data.len() {
                break;
            }
            total_len += frame_len as u64;
            frames += 1;
            cursor.advance(frame_len);
        }

        report.frame_count = frames;
        report.frames_per_sec = report.sample_rate as f32 / SAMPLES_PER_FRAME as f32;
        if frames > 0 {
            report.bytes_per_frame = total_len as f32 / (frames * 1000) as f32;
        }
        report.duration = if report.frames_per_sec > 0.0 && frames > 0 {
            ProbedDuration::Known(frames as f32 / report.frames_per_sec)
        } else {
            ProbedDuration::Unknown
        };
        debug!(
            "ADTS: {} 帧, 采样率 {} Hz, 时长 {:?}",
            frames, report.sample_rate, report.duration
        );
        Ok(())
    }

    fn read_adif(data: &[u8], report: &mut ProbeReport) {
        report.container = Container::Adif;
        report.bit_rate = adts::adif_bit_rate(data).unwrap_or(0);
        report.duration = if report.file_size > 0 && report.bit_rate > 0 {
            ProbedDuration::Known(report.file_size as f32 * 8.0 / report.bit_rate as f32)
        } else {
            ProbedDuration::Unknown
        };
        debug!(
            "ADIF: 码率 {} bit/s, 时长 {:?}",
            report.bit_rate, report.duration
        );
    }
}
