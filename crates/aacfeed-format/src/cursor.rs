//! 定长预读缓冲.
//!
//! 缓冲区布局:
//!
//! ```text
//! |<- consumed ->|<------ unread ------>|<-- 空闲 -->|
//! 0                                                  capacity
//! ```
//!
//! `advance` 只移动计数, `refill` 时才把未读数据搬到开头并从输入补满.
//! 补读后若未读数据以 ID3v1 / Lyrics3 / APEv2 签名开头, 视为音频结束.

use std::io::SeekFrom;

use aacfeed_core::FeedResult;
use log::{debug, warn};

use crate::io::IoBackend;
use crate::tag;

/// 输入流上的预读游标
pub struct StreamCursor {
    /// 输入后端, 游标销毁时一并关闭
    backend: Box<dyn IoBackend>,
    buffer: Vec<u8>,
    /// 未读字节数
    unread: usize,
    /// 已消费但尚未搬移的字节数
    consumed: usize,
    /// 第一个未读字节在输入中的绝对偏移
    file_offset: u64,
    at_eof: bool,
    file_size: u64,
}

impl StreamCursor {
    /// 创建游标并预读一次
    pub fn open(backend: Box<dyn IoBackend>, capacity: usize) -> FeedResult<Self> {
        let file_size = backend.size();
        let mut cursor = Self {
            backend,
            buffer: vec![0u8; capacity],
            unread: 0,
            consumed: 0,
            file_offset: 0,
            at_eof: false,
            file_size,
        };
        cursor.file_offset = cursor.backend.position()?;
        cursor.prime()?;
        Ok(cursor)
    }

    /// 未读数据
    pub fn data(&self) -> &[u8] {
        &self.buffer[self.consumed..self.consumed + self.unread]
    }

    /// 未读字节数
    pub fn unread(&self) -> usize {
        self.unread
    }

    /// 第一个未读字节的绝对偏移
    pub fn file_offset(&self) -> u64 {
        self.file_offset
    }

    /// 输入是否已读尽
    pub fn is_eof(&self) -> bool {
        self.at_eof
    }

    /// 输入总大小
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// 缓冲区容量
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// 标记 `n` 字节已消费
    ///
    /// `n` 超过未读字节数属于调用方错误, 按未读字节数截断.
    pub fn advance(&mut self, n: usize) {
        let n = if n > self.unread {
            warn!("游标前进 {} 字节超出未读数据 {} 字节, 已截断", n, self.unread);
            self.unread
        } else {
            n
        };
        self.consumed += n;
        self.unread -= n;
        self.file_offset += n as u64;
    }

    /// 搬移未读数据并从输入补满缓冲区
    ///
    /// 自上次补读以来没有消费任何数据时不做任何事.
    pub fn refill(&mut self) -> FeedResult<()> {
        if self.consumed == 0 {
            return Ok(());
        }

        if self.unread > 0 {
            self.buffer
                .copy_within(self.consumed..self.consumed + self.unread, 0);
        }
        self.consumed = 0;

        if !self.at_eof {
            let wanted = self.buffer.len() - self.unread;
            let got = self.read_into(self.unread)?;
            if got < wanted {
                self.at_eof = true;
            }
            self.unread += got;
        }

        if tag::starts_with_trailing_tag(self.data()) {
            debug!("偏移 {} 处遇到尾部标签, 视为音频结束", self.file_offset);
            self.unread = 0;
        }
        Ok(())
    }

    /// 跳过 `n` 字节, `n` 可以超出缓冲窗口
    pub fn skip(&mut self, n: u64) -> FeedResult<()> {
        if n <= self.unread as u64 {
            self.advance(n as usize);
            return self.refill();
        }
        let target = self.file_offset + n;
        debug!("跳过 {} 字节, 重新定位到偏移 {}", n, target);
        self.rewind_to(target)
    }

    /// 重新定位到绝对偏移 `offset` 并重新预读
    pub fn rewind_to(&mut self, offset: u64) -> FeedResult<()> {
        self.backend.seek(SeekFrom::Start(offset))?;
        self.file_offset = offset;
        self.prime()
    }

    /// 清空缓冲区后从当前输入位置读满
    fn prime(&mut self) -> FeedResult<()> {
        self.unread = 0;
        self.consumed = 0;
        self.at_eof = false;
        let got = self.read_into(0)?;
        self.at_eof = got < self.buffer.len();
        self.unread = got;
        Ok(())
    }

    /// 从 `start` 开始读到缓冲区末尾或输入结束, 返回读到的字节数
    fn read_into(&mut self, start: usize) -> FeedResult<usize> {
        let mut filled = start;
        while filled < self.buffer.len() {
            match self.backend.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled - start)
    }
}
