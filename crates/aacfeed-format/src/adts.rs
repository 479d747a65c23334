//! ADTS 帧头与 ADIF 头部字段.
//!
//! # ADTS 帧结构 (7 或 9 字节头部)
//! ```text
//! 固定头部 (28 bits):
//!   sync word (12 bits = 0xFFF)
//!   ID (1 bit): 0=MPEG-4, 1=MPEG-2
//!   layer (2 bits): always 0
//!   protection_absent (1 bit): 1=no CRC, 0=CRC present
//!   profile (2 bits): 0=Main, 1=LC, 2=SSR, 3=LTP
//!   sampling_frequency_index (4 bits)
//!   private_bit (1 bit)
//!   channel_configuration (3 bits)
//!   ...
//! 可变头部 (28 bits):
//!   frame_length (13 bits): 含头部的完整帧大小
//!   adts_buffer_fullness (11 bits)
//!   number_of_raw_data_blocks (2 bits)
//! [CRC (16 bits)] 仅当 protection_absent=0
//! ```

/// AAC 采样率索引表 (ISO 14496-3), 13..15 保留
pub const AAC_SAMPLE_RATES: [u32; 16] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350, 0, 0,
    0,
];

/// 每个 AAC 帧的采样数
pub const SAMPLES_PER_FRAME: u32 = 1024;

/// 不含 CRC 的 ADTS 头部大小
pub const ADTS_HEADER_SIZE: usize = 7;

/// ADTS 帧头部信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdtsHeader {
    /// AAC Profile (0=Main, 1=LC, 2=SSR, 3=LTP)
    pub profile: u8,
    /// 采样率索引
    pub sampling_frequency_index: u8,
    /// 声道配置
    pub channel_configuration: u8,
    /// 帧总大小 (含头部)
    pub frame_length: u16,
    /// 头部大小 (7 或 9 字节)
    pub header_size: u8,
}

impl AdtsHeader {
    /// 采样率 (Hz)
    pub fn sample_rate(&self) -> u32 {
        AAC_SAMPLE_RATES[usize::from(self.sampling_frequency_index & 0x0F)]
    }

    /// 声道数, 配置 0 按立体声处理, 7 为 7.1
    pub fn channels(&self) -> u8 {
        match self.channel_configuration {
            0 => 2,
            7 => 8,
            c => c,
        }
    }

    /// 构造 2 字节 AudioSpecificConfig
    ///
    /// audioObjectType (5 bits) + samplingFrequencyIndex (4 bits)
    /// + channelConfiguration (4 bits) + padding (3 bits)
    pub fn audio_specific_config(&self) -> [u8; 2] {
        let aot = self.profile + 1;
        let sfi = self.sampling_frequency_index;
        let cc = self.channel_configuration;
        [(aot << 3) | (sfi >> 1), ((sfi & 1) << 7) | (cc << 3)]
    }
}

/// 是否为 ADTS 同步字 (忽略 ID 位, 要求 layer 为 0)
pub fn is_adts_sync(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && (data[1] & 0xF6) == 0xF0
}

/// 读取 13 位帧长度字段, 调用方保证至少 6 字节
pub fn adts_frame_length(data: &[u8]) -> usize {
    (usize::from(data[3] & 0x03) << 11) | (usize::from(data[4]) << 3) | (usize::from(data[5]) >> 5)
}

/// 读取采样率索引对应的采样率, 保留索引返回 0
pub fn adts_sample_rate(data: &[u8]) -> u32 {
    AAC_SAMPLE_RATES[usize::from((data[2] & 0x3C) >> 2)]
}

/// 严格解析 ADTS 帧头部
///
/// 除同步字外还校验采样率索引, 声道配置与帧长度下限.
pub fn parse_adts_header(data: &[u8]) -> Option<AdtsHeader> {
    if data.len() < ADTS_HEADER_SIZE || !is_adts_sync(data) {
        return None;
    }

    let protection_absent = (data[1] & 0x01) != 0;
    let profile = (data[2] >> 6) & 0x03;
    let sampling_frequency_index = (data[2] >> 2) & 0x0F;
    let channel_configuration = ((data[2] & 0x01) << 2) | ((data[3] >> 6) & 0x03);
    let frame_length = adts_frame_length(data) as u16;

    if sampling_frequency_index >= 13 {
        return None;
    }

    let header_size = if protection_absent { 7 } else { 9 };
    if frame_length < u16::from(header_size) {
        return None;
    }

    Some(AdtsHeader {
        profile,
        sampling_frequency_index,
        channel_configuration,
        frame_length,
        header_size,
    })
}

/// ADIF 头部中的码率 (bit/s)
///
/// `data` 从 `ADIF` 魔数开始. copyright_id_present 置位时跳过 9 字节版权 ID.
/// 码率取其后 4 字节: 第 1 字节低 4 位, 第 2, 3 字节, 以及第 4 字节的高 3 位
/// (保持在字节内的原位置, 不右移). 数据不足时返回 `None`.
pub fn adif_bit_rate(data: &[u8]) -> Option<u32> {
    if data.len() < 5 || &data[..4] != b"ADIF" {
        return None;
    }
    let skip = if data[4] & 0x80 != 0 { 9 } else { 0 };
    if data.len() < 8 + skip {
        return None;
    }
    let b = &data[4 + skip..8 + skip];
    Some(
        (u32::from(b[0] & 0x0F) << 19)
            | (u32::from(b[1]) << 11)
            | (u32::from(b[2]) << 3)
            | (u32::from(b[3]) & 0xE0),
    )
}
