//! 解码输出的 PCM 格式.

use std::fmt;

/// 解码会话协商出的 PCM 输出格式
///
/// 位深固定为 16 (有符号, 交错排列).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 声道数
    pub channels: u8,
    /// 位深
    pub bits: u8,
}

impl AudioFormat {
    /// 输出位深
    pub const BITS: u8 = 16;

    /// 创建 16 位输出格式
    pub fn s16(sample_rate: u32, channels: u8) -> Self {
        Self {
            sample_rate,
            channels,
            bits: Self::BITS,
        }
    }

    /// 每秒字节数
    pub fn bytes_per_second(&self) -> u64 {
        u64::from(self.sample_rate) * u64::from(self.channels) * u64::from(self.bits / 8)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz/{}ch/s{}", self.sample_rate, self.channels, self.bits)
    }
}
