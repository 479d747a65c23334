//! 解码线程与播放线程之间的控制信号.
//!
//! 每个字段只有一个写入方:
//!
//! | 字段 | 写入方 | 读取方 |
//! |------|--------|--------|
//! | `stop` | 播放线程置位, 解码线程消费清除 | 解码线程 |
//! | `seek` | 播放线程置位, 解码线程消费清除 | 解码线程 |
//! | `seek_error` | 解码线程 (会话开始时复位, 拒绝跳转时置位) | 播放线程 |
//! | `state` | 解码线程 | 播放线程 |
//! | `total_time` / `audio_format` | 解码线程 (解码开始前一次) | 播放线程 |
//! | `file` | 播放线程 (会话开始前) | 解码线程 |
//!
//! 标志位均为原子字, 不需要全局锁.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::audio_format::AudioFormat;

/// 解码会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// 尚未开始
    Idle = 0,
    /// 正在解码
    Decoding = 1,
    /// 已结束 (正常结束, 被停止或解码出错)
    Stopped = 2,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => SessionState::Decoding,
            2 => SessionState::Stopped,
            _ => SessionState::Idle,
        }
    }
}

/// 控制信号集合
///
/// 由播放子系统持有 (通常放在 `Arc` 中), 解码线程只借用.
#[derive(Debug)]
pub struct DecoderControl {
    stop: AtomicBool,
    seek: AtomicBool,
    seek_error: AtomicBool,
    state: AtomicU8,
    /// 总时长 (f32 秒的位模式)
    total_time: AtomicU32,
    audio_format: Mutex<Option<AudioFormat>>,
    file: Mutex<PathBuf>,
}

impl Default for DecoderControl {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderControl {
    /// 创建空闲状态的控制块
    pub fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            seek: AtomicBool::new(false),
            seek_error: AtomicBool::new(false),
            state: AtomicU8::new(SessionState::Idle as u8),
            total_time: AtomicU32::new((-1.0f32).to_bits()),
            audio_format: Mutex::new(None),
            file: Mutex::new(PathBuf::new()),
        }
    }

    /// 创建指向目标文件的控制块
    pub fn for_file(path: impl Into<PathBuf>) -> Self {
        let control = Self::new();
        control.set_file(path);
        control
    }

    // ========================
    // 播放线程侧
    // ========================

    /// 请求停止解码
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// 请求跳转 (解码端只会回报失败)
    pub fn request_seek(&self) {
        self.seek.store(true, Ordering::Release);
    }

    /// 设置目标文件
    pub fn set_file(&self, path: impl Into<PathBuf>) {
        *self.file.lock().unwrap_or_else(PoisonError::into_inner) = path.into();
    }

    /// 目标文件
    pub fn file(&self) -> PathBuf {
        self.file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 本次会话中是否有跳转请求被拒绝
    pub fn seek_failed(&self) -> bool {
        self.seek_error.load(Ordering::Acquire)
    }

    /// 当前会话状态
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// 总时长 (秒), 负数表示未知
    pub fn total_time(&self) -> f32 {
        f32::from_bits(self.total_time.load(Ordering::Acquire))
    }

    /// 会话协商出的 PCM 格式
    pub fn audio_format(&self) -> Option<AudioFormat> {
        *self
            .audio_format
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ========================
    // 解码线程侧
    // ========================

    /// 是否有停止请求
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// 是否有跳转请求
    pub fn seek_requested(&self) -> bool {
        self.seek.load(Ordering::Acquire)
    }

    /// 消费停止请求
    pub fn clear_stop(&self) {
        self.stop.store(false, Ordering::Release);
    }

    /// 应答跳转请求: 回报失败并清除请求
    pub fn reject_seek(&self) {
        self.seek_error.store(true, Ordering::Release);
        self.seek.store(false, Ordering::Release);
    }

    /// 会话开始: 复位上一次会话的跳转失败回报
    pub fn begin_session(&self) {
        self.seek_error.store(false, Ordering::Release);
    }

    /// 清除未处理的跳转请求
    pub fn clear_seek(&self) {
        self.seek.store(false, Ordering::Release);
    }

    /// 设置会话状态
    pub fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// 写入总时长
    pub fn set_total_time(&self, secs: f32) {
        self.total_time.store(secs.to_bits(), Ordering::Release);
    }

    /// 写入协商出的 PCM 格式
    pub fn set_audio_format(&self, format: AudioFormat) {
        *self
            .audio_format
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(format);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let control = DecoderControl::new();
        assert_eq!(control.state(), SessionState::Idle);
        assert!(!control.stop_requested());
        assert!(!control.seek_requested());
        assert!(!control.seek_failed());
        assert!(control.total_time() < 0.0);
        assert!(control.audio_format().is_none());
    }

    #[test]
    fn test_seek_handshake() {
        let control = DecoderControl::new();
        control.request_seek();
        assert!(control.seek_requested());

        control.reject_seek();
        assert!(!control.seek_requested());
        assert!(control.seek_failed());

        // 新的请求不改写失败回报, 由解码线程在会话开始时复位
        control.request_seek();
        assert!(control.seek_failed());
        control.begin_session();
        assert!(!control.seek_failed());
        assert!(control.seek_requested());
    }

    #[test]
    fn test_state_and_time_roundtrip() {
        let control = DecoderControl::for_file("/music/a.aac");
        assert_eq!(control.file(), PathBuf::from("/music/a.aac"));

        control.set_state(SessionState::Decoding);
        assert_eq!(control.state(), SessionState::Decoding);
        control.set_state(SessionState::Stopped);
        assert_eq!(control.state(), SessionState::Stopped);

        control.set_total_time(12.5);
        assert_eq!(control.total_time(), 12.5);

        control.set_audio_format(AudioFormat::s16(48000, 2));
        assert_eq!(control.audio_format(), Some(AudioFormat::s16(48000, 2)));
    }
}
