//! 基于 symphonia 的 AAC-LC 引擎.
//!
//! 只支持 ADTS 流: `init` 从首个帧头构造 AudioSpecificConfig,
//! `decode` 去掉帧头后把原始数据块交给 symphonia.

use aacfeed_core::{FeedError, FeedResult};
use aacfeed_format::adts::{self, AdtsHeader};
use log::debug;
use symphonia_codec_aac::AacDecoder as SymAacDecoder;
use symphonia_core::audio::SampleBuffer;
use symphonia_core::codecs::{
    CODEC_TYPE_AAC, CodecParameters as SymCodecParameters, Decoder as SymDecoderTrait,
    DecoderOptions as SymDecoderOptions,
};
use symphonia_core::formats::Packet as SymPacket;

use crate::engine::{
    AacEngine, DecodedFrame, EngineCapabilities, EngineConfig, FrameInfo, InitInfo,
};

/// 帧不完整
const ERR_TRUNCATED: u8 = 1;
/// 失去同步
const ERR_LOST_SYNC: u8 = 2;
/// 解码器拒绝该帧
const ERR_REJECTED: u8 = 3;
/// 未初始化
const ERR_NOT_INITIALISED: u8 = 4;

/// `init` 找不到 ADTS 帧头
const INIT_NO_HEADER: i32 = -1;
/// symphonia 不接受流参数
const INIT_UNSUPPORTED: i32 = -2;

/// symphonia AAC 引擎
pub struct SymphoniaAacEngine {
    decoder: Option<SymAacDecoder>,
    config: EngineConfig,
    /// 最近一帧的交错 PCM
    pcm: Vec<i16>,
    /// 已送入的采样数, 作为包时间戳
    next_ts: u64,
}

impl SymphoniaAacEngine {
    /// 创建引擎实例 (工厂函数)
    pub fn create() -> FeedResult<Box<dyn AacEngine>> {
        Ok(Box::new(Self::new()))
    }

    pub fn new() -> Self {
        Self {
            decoder: None,
            config: EngineConfig::default(),
            pcm: Vec::with_capacity(2048),
            next_ts: 0,
        }
    }

    fn decode_frame(&mut self, data: &[u8]) -> FrameInfo {
        let Some(decoder) = self.decoder.as_mut() else {
            return FrameInfo::failed(ERR_NOT_INITIALISED, 0);
        };
        if data.len() < adts::ADTS_HEADER_SIZE {
            return FrameInfo::failed(ERR_TRUNCATED, 0);
        }
        let Some(header) = adts::parse_adts_header(data) else {
            return FrameInfo::failed(ERR_LOST_SYNC, 0);
        };
        let frame_len = usize::from(header.frame_length);
        if frame_len > data.len() {
            return FrameInfo::failed(ERR_TRUNCATED, 0);
        }

        let payload = &data[usize::from(header.header_size)..frame_len];
        let packet = SymPacket::new_from_slice(
            0,
            self.next_ts,
            u64::from(adts::SAMPLES_PER_FRAME),
            payload,
        );
        self.next_ts += u64::from(adts::SAMPLES_PER_FRAME);

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let mut sample_buf = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);
                self.pcm.clear();
                self.pcm.extend_from_slice(sample_buf.samples());
                FrameInfo {
                    bytes_consumed: frame_len,
                    samples: self.pcm.len(),
                    channels: spec.channels.count() as u8,
                    sample_rate: spec.rate,
                    error: 0,
                }
            }
            Err(e) => {
                debug!("symphonia 拒绝 AAC 帧: {e}");
                FrameInfo::failed(ERR_REJECTED, frame_len)
            }
        }
    }

    fn open_decoder(header: &AdtsHeader) -> FeedResult<SymAacDecoder> {
        let mut params = SymCodecParameters::new();
        params
            .for_codec(CODEC_TYPE_AAC)
            .with_sample_rate(header.sample_rate())
            .with_extra_data(header.audio_specific_config().to_vec().into_boxed_slice());
        SymAacDecoder::try_new(&params, &SymDecoderOptions::default()).map_err(|e| {
            debug!("symphonia AAC 初始化失败: {e}");
            FeedError::EngineInit(INIT_UNSUPPORTED)
        })
    }
}

impl Default for SymphoniaAacEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AacEngine for SymphoniaAacEngine {
    fn name(&self) -> &str {
        "symphonia-aac"
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities::empty()
    }

    fn configuration(&self) -> EngineConfig {
        self.config
    }

    fn set_configuration(&mut self, config: EngineConfig) -> FeedResult<()> {
        if config.downmix || config.upsample_implicit_sbr {
            return Err(FeedError::Unsupported(
                "symphonia AAC 引擎不支持下混与 SBR 上采样".into(),
            ));
        }
        self.config = config;
        Ok(())
    }

    fn init(&mut self, data: &[u8]) -> FeedResult<InitInfo> {
        let header = adts::parse_adts_header(data).ok_or(FeedError::EngineInit(INIT_NO_HEADER))?;
        let decoder = Self::open_decoder(&header)?;
        debug!(
            "symphonia AAC: profile={} sr={} ch={}",
            header.profile,
            header.sample_rate(),
            header.channels()
        );
        self.decoder = Some(decoder);
        self.next_ts = 0;
        Ok(InitInfo {
            bytes_consumed: 0,
            sample_rate: header.sample_rate(),
            channels: header.channels(),
        })
    }

    fn decode(&mut self, data: &[u8]) -> DecodedFrame<'_> {
        let info = self.decode_frame(data);
        if info.is_error() {
            self.pcm.clear();
        }
        DecodedFrame {
            info,
            pcm: &self.pcm,
        }
    }

    fn error_message(&self, code: u8) -> String {
        match code {
            0 => "成功",
            ERR_TRUNCATED => "帧数据不完整",
            ERR_LOST_SYNC => "失去 ADTS 同步",
            ERR_REJECTED => "解码器拒绝该帧",
            ERR_NOT_INITIALISED => "引擎未初始化",
            _ => "未知错误",
        }
        .to_string()
    }

    fn close(&mut self) {
        self.decoder = None;
        self.pcm.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// LC, 44.1kHz, 立体声, 无 CRC
    fn adts_frame(payload_len: usize) -> Vec<u8> {
        let frame_length = (7 + payload_len) as u16;
        let mut frame = vec![
            0xFF,
            0xF1,
            (1 << 6) | (4 << 2),
            (2 << 6) | ((frame_length >> 11) & 0x03) as u8,
            ((frame_length >> 3) & 0xFF) as u8,
            (((frame_length & 0x07) as u8) << 5) | 0x1F,
            0xFC,
        ];
        frame.resize(frame_length as usize, 0);
        frame
    }

    #[test]
    fn test_init_reads_adts_header() {
        let mut engine = SymphoniaAacEngine::new();
        let info = engine.init(&adts_frame(32)).unwrap();
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.bytes_consumed, 0);
    }

    #[test]
    fn test_init_rejects_garbage() {
        let mut engine = SymphoniaAacEngine::new();
        assert!(matches!(
            engine.init(b"not an aac stream"),
            Err(FeedError::EngineInit(INIT_NO_HEADER))
        ));
    }

    #[test]
    fn test_decode_error_codes() {
        let mut engine = SymphoniaAacEngine::new();
        assert_eq!(engine.decode(&adts_frame(8)).info.error, ERR_NOT_INITIALISED);

        engine.init(&adts_frame(8)).unwrap();
        let frame = adts_frame(64);
        assert_eq!(engine.decode(&frame[..20]).info.error, ERR_TRUNCATED);
        assert_eq!(engine.decode(&frame[..3]).info.error, ERR_TRUNCATED);
        assert_eq!(engine.decode(&[0x12; 16]).info.error, ERR_LOST_SYNC);

        engine.close();
        assert_eq!(engine.decode(&frame).info.error, ERR_NOT_INITIALISED);
    }

    #[test]
    fn test_configuration() {
        let mut engine = SymphoniaAacEngine::new();
        assert!(engine.capabilities().is_empty());
        assert!(engine.set_configuration(EngineConfig::default()).is_ok());
        let downmix = EngineConfig {
            downmix: true,
            ..Default::default()
        };
        assert!(engine.set_configuration(downmix).is_err());
        assert_eq!(engine.error_message(ERR_LOST_SYNC), "失去 ADTS 同步");
    }
}
