//! 定长循环 PCM 块缓冲区.
//!
//! 解码线程 (生产者) 写入 `end` 指向的块, 播放线程 (消费者) 从 `begin` 读取.
//! 当生产者的 `end` 回绕到 0 时置位 `wrap`, 消费者的 `begin` 回绕时清除.
//!
//! ```text
//! 空: begin == end && !wrap
//! 满: begin == end &&  wrap
//! ```
//!
//! 缓冲区满时生产者阻塞等待, 从不覆盖未读数据. 等待使用带超时的条件变量,
//! 每次醒来都重新检查停止请求.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::DecoderConfig;
use crate::control::DecoderControl;
use crate::error::{FeedError, FeedResult};

/// 消费者取出的一个 PCM 块
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 交错 16 位 PCM 字节 (本机字节序)
    pub data: Vec<u8>,
    /// 块写满时的累计播放时间 (秒)
    pub time: f32,
    /// 块写满时的码率估计 (kbit/s)
    pub bit_rate: u16,
}

struct Slot {
    data: Box<[u8]>,
    len: usize,
    time: f32,
    bit_rate: u16,
}

struct SinkState {
    slots: Vec<Slot>,
    begin: usize,
    end: usize,
    wrap: bool,
}

impl SinkState {
    fn is_full(&self) -> bool {
        self.begin == self.end && self.wrap
    }

    fn len(&self) -> usize {
        if self.wrap {
            self.slots.len() - self.begin + self.end
        } else {
            self.end - self.begin
        }
    }
}

/// 循环 PCM 块缓冲区
pub struct ChunkSink {
    state: Mutex<SinkState>,
    /// 生产者发布或消费者释放块时通知
    changed: Condvar,
    chunk_size: usize,
}

impl ChunkSink {
    /// 创建 `buffered_chunks` 个容量为 `chunk_size` 字节的块
    ///
    /// `chunk_size` 必须为正偶数, `buffered_chunks` 必须大于 0.
    pub fn new(chunk_size: usize, buffered_chunks: usize) -> FeedResult<Self> {
        if chunk_size == 0 || chunk_size % 2 != 0 {
            return Err(FeedError::InvalidArgument(format!(
                "PCM 块大小必须为正偶数, 当前 {chunk_size}"
            )));
        }
        if buffered_chunks == 0 {
            return Err(FeedError::InvalidArgument("PCM 块数必须大于 0".into()));
        }
        let slots = (0..buffered_chunks)
            .map(|_| Slot {
                data: vec![0u8; chunk_size].into_boxed_slice(),
                len: 0,
                time: 0.0,
                bit_rate: 0,
            })
            .collect();
        Ok(Self {
            state: Mutex::new(SinkState {
                slots,
                begin: 0,
                end: 0,
                wrap: false,
            }),
            changed: Condvar::new(),
            chunk_size,
        })
    }

    /// 按配置创建
    pub fn from_config(config: &DecoderConfig) -> FeedResult<Self> {
        config.validate()?;
        Self::new(config.chunk_size, config.buffered_chunks)
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 每块字节容量
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 块数
    pub fn capacity(&self) -> usize {
        self.lock().slots.len()
    }

    /// 已发布未消费的块数
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        let state = self.lock();
        state.begin == state.end && !state.wrap
    }

    pub fn is_full(&self) -> bool {
        self.lock().is_full()
    }

    /// 当前 (begin, end, wrap)
    pub fn indices(&self) -> (usize, usize, bool) {
        let state = self.lock();
        (state.begin, state.end, state.wrap)
    }

    // ========================
    // 生产者侧
    // ========================

    /// 等待至少一个空闲块
    ///
    /// # 返回
    /// - `true`: `end` 指向的块可写
    /// - `false`: 等待期间 (或之前) 收到停止请求
    pub fn wait_for_space(&self, control: &DecoderControl, poll: Duration) -> bool {
        let mut state = self.lock();
        loop {
            if control.stop_requested() {
                return false;
            }
            if !state.is_full() {
                return true;
            }
            let (guard, _) = self
                .changed
                .wait_timeout(state, poll)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }

    /// 把 `bytes` 写入正在填充的块 (`end`) 的 `offset` 处, 并以当前时间/码率标记该块
    ///
    /// 调用前必须确认缓冲区未满. 写入范围超出块容量的部分被截断.
    /// 返回实际写入的字节数.
    pub fn write_open(&self, offset: usize, bytes: &[u8], time: f32, bit_rate: u16) -> usize {
        let mut state = self.lock();
        if state.is_full() || offset >= self.chunk_size {
            log::warn!(
                "PCM 块写入被拒绝: offset={}, full={}",
                offset,
                state.is_full()
            );
            return 0;
        }
        let n = bytes.len().min(self.chunk_size - offset);
        let end = state.end;
        let slot = &mut state.slots[end];
        slot.data[offset..offset + n].copy_from_slice(&bytes[..n]);
        slot.time = time;
        slot.bit_rate = bit_rate;
        n
    }

    /// 发布正在填充的块, 长度为 `len` 字节, 并推进 `end`
    pub fn publish(&self, len: usize) {
        let mut state = self.lock();
        if state.is_full() {
            log::warn!("PCM 缓冲区已满, 丢弃发布请求");
            return;
        }
        let end = state.end;
        state.slots[end].len = len.min(self.chunk_size);
        state.end += 1;
        if state.end >= state.slots.len() {
            state.end = 0;
            state.wrap = true;
        }
        drop(state);
        self.changed.notify_all();
    }

    // ========================
    // 消费者侧
    // ========================

    /// 复制 `begin` 处的块 (不消费)
    pub fn front(&self) -> Option<Chunk> {
        let state = self.lock();
        if state.len() == 0 {
            return None;
        }
        let slot = &state.slots[state.begin];
        Some(Chunk {
            data: slot.data[..slot.len].to_vec(),
            time: slot.time,
            bit_rate: slot.bit_rate,
        })
    }

    /// 取出 `begin` 处的块并推进 `begin`
    pub fn pop_front(&self) -> Option<Chunk> {
        let mut state = self.lock();
        if state.len() == 0 {
            return None;
        }
        let slot = &state.slots[state.begin];
        let chunk = Chunk {
            data: slot.data[..slot.len].to_vec(),
            time: slot.time,
            bit_rate: slot.bit_rate,
        };
        state.begin += 1;
        if state.begin >= state.slots.len() {
            state.begin = 0;
            state.wrap = false;
        }
        drop(state);
        self.changed.notify_all();
        Some(chunk)
    }

    /// 最多等待 `timeout` 取出一个块
    pub fn wait_pop(&self, timeout: Duration) -> Option<Chunk> {
        {
            let state = self.lock();
            if state.len() == 0 {
                let (guard, _) = self
                    .changed
                    .wait_timeout_while(state, timeout, |s| s.len() == 0)
                    .unwrap_or_else(PoisonError::into_inner);
                drop(guard);
            }
        }
        self.pop_front()
    }

    /// 清空缓冲区 (仅在没有活动解码会话时调用)
    pub fn clear(&self) {
        let mut state = self.lock();
        state.begin = 0;
        state.end = 0;
        state.wrap = false;
        drop(state);
        self.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn fill_and_publish(sink: &ChunkSink, byte: u8, time: f32) {
        let bytes = vec![byte; sink.chunk_size()];
        assert_eq!(sink.write_open(0, &bytes, time, 128), sink.chunk_size());
        sink.publish(sink.chunk_size());
    }

    #[test]
    fn test_rejects_degenerate_sizes() {
        assert!(matches!(ChunkSink::new(0, 4), Err(FeedError::InvalidArgument(_))));
        assert!(matches!(ChunkSink::new(7, 4), Err(FeedError::InvalidArgument(_))));
        assert!(matches!(ChunkSink::new(8, 0), Err(FeedError::InvalidArgument(_))));

        let config = DecoderConfig {
            buffered_chunks: 0,
            ..Default::default()
        };
        assert!(matches!(ChunkSink::from_config(&config), Err(FeedError::Config(_))));
        assert_eq!(ChunkSink::from_config(&DecoderConfig::default()).unwrap().capacity(), 1024);
    }

    #[test]
    fn test_empty_sink() {
        let sink = ChunkSink::new(4, 3).unwrap();
        assert!(sink.is_empty());
        assert!(!sink.is_full());
        assert_eq!(sink.len(), 0);
        assert!(sink.front().is_none());
        assert!(sink.pop_front().is_none());
    }

    #[test]
    fn test_publish_and_pop_in_order() {
        let sink = ChunkSink::new(4, 3).unwrap();
        fill_and_publish(&sink, 1, 0.1);
        fill_and_publish(&sink, 2, 0.2);
        assert_eq!(sink.len(), 2);

        let first = sink.pop_front().unwrap();
        assert_eq!(first.data, vec![1; 4]);
        assert_eq!(first.time, 0.1);
        assert_eq!(first.bit_rate, 128);

        let second = sink.pop_front().unwrap();
        assert_eq!(second.data, vec![2; 4]);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_wrap_flag_lifecycle() {
        let sink = ChunkSink::new(2, 2).unwrap();
        fill_and_publish(&sink, 1, 0.0);
        fill_and_publish(&sink, 2, 0.0);
        assert_eq!(sink.indices(), (0, 0, true));
        assert!(sink.is_full());
        assert_eq!(sink.len(), 2);

        sink.pop_front();
        assert_eq!(sink.indices(), (1, 0, true));
        fill_and_publish(&sink, 3, 0.0);
        assert!(sink.is_full());

        sink.pop_front();
        // begin 回绕时清除 wrap
        assert_eq!(sink.indices(), (0, 1, false));
        assert_eq!(sink.pop_front().unwrap().data, vec![3, 3]);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_full_sink_rejects_writes() {
        let sink = ChunkSink::new(2, 1).unwrap();
        fill_and_publish(&sink, 7, 0.0);
        assert!(sink.is_full());
        assert_eq!(sink.write_open(0, &[9, 9], 1.0, 0), 0);
        sink.publish(2);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.front().unwrap().data, vec![7, 7]);
    }

    #[test]
    fn test_partial_slot_length() {
        let sink = ChunkSink::new(8, 2).unwrap();
        assert_eq!(sink.write_open(0, &[1, 2, 3], 0.5, 64), 3);
        assert_eq!(sink.write_open(3, &[4, 5], 0.6, 65), 2);
        sink.publish(5);
        let chunk = sink.pop_front().unwrap();
        assert_eq!(chunk.data, vec![1, 2, 3, 4, 5]);
        // 以最后一次写入时的状态标记
        assert_eq!(chunk.time, 0.6);
        assert_eq!(chunk.bit_rate, 65);
    }

    #[test]
    fn test_wait_for_space_returns_on_stop() {
        let sink = Arc::new(ChunkSink::new(2, 1).unwrap());
        fill_and_publish(&sink, 1, 0.0);
        let control = Arc::new(DecoderControl::new());

        let waiter = {
            let sink = Arc::clone(&sink);
            let control = Arc::clone(&control);
            thread::spawn(move || sink.wait_for_space(&control, Duration::from_millis(5)))
        };
        thread::sleep(Duration::from_millis(30));
        control.request_stop();
        assert!(!waiter.join().unwrap());
        // 未消费的块保持不变
        assert_eq!(sink.front().unwrap().data, vec![1, 1]);
    }

    #[test]
    fn test_wait_for_space_wakes_on_consume() {
        let sink = Arc::new(ChunkSink::new(2, 1).unwrap());
        fill_and_publish(&sink, 1, 0.0);
        let control = Arc::new(DecoderControl::new());

        let consumer = {
            let sink = Arc::clone(&sink);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                sink.pop_front()
            })
        };
        let start = Instant::now();
        assert!(sink.wait_for_space(&control, Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(consumer.join().unwrap().is_some());
    }

    #[test]
    fn test_wait_pop_times_out_when_empty() {
        let sink = ChunkSink::new(2, 2).unwrap();
        assert!(sink.wait_pop(Duration::from_millis(10)).is_none());
    }
}
