//! 输入后端抽象.
//!
//! 解码前端只需要顺序读取, 绝对定位和总大小三种能力,
//! 由 [`IoBackend`] 统一, 文件与内存两种来源各有一个实现.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aacfeed_core::FeedResult;

/// 输入后端 trait
///
/// 实现此 trait 以支持不同的输入来源 (文件, 内存等).
pub trait IoBackend: Send {
    /// 读取数据到缓冲区, 返回 0 表示已到末尾
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// 定位 (seek)
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;
    /// 获取当前位置
    fn position(&mut self) -> io::Result<u64>;
    /// 获取总大小
    fn size(&self) -> u64;
}

/// 输入来源描述
///
/// 每次打开都产生一个独立的后端, 时长估算和解码会话各自打开一次.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// 本地文件
    File(PathBuf),
    /// 内存中的完整文件内容
    Memory(Arc<[u8]>),
}

impl InputSource {
    /// 打开输入, 返回读取后端
    pub fn open(&self) -> FeedResult<Box<dyn IoBackend>> {
        match self {
            InputSource::File(path) => Ok(Box::new(FileBackend::open(path)?)),
            InputSource::Memory(data) => Ok(Box::new(MemoryBackend::from_shared(Arc::clone(data)))),
        }
    }

    /// 用于日志的描述
    pub fn describe(&self) -> String {
        match self {
            InputSource::File(path) => path.display().to_string(),
            InputSource::Memory(data) => format!("<内存输入 {} 字节>", data.len()),
        }
    }
}

impl From<PathBuf> for InputSource {
    fn from(path: PathBuf) -> Self {
        InputSource::File(path)
    }
}

impl From<&Path> for InputSource {
    fn from(path: &Path) -> Self {
        InputSource::File(path.to_path_buf())
    }
}

impl From<Vec<u8>> for InputSource {
    fn from(data: Vec<u8>) -> Self {
        InputSource::Memory(Arc::from(data))
    }
}

/// 文件输入后端
pub struct FileBackend {
    file: File,
    size: u64,
}

impl FileBackend {
    /// 以只读方式打开文件
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(file))
    }

    /// 包装已打开的文件
    pub fn new(file: File) -> Self {
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);
        Self { file, size }
    }
}

impl IoBackend for FileBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }

    fn position(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// 内存输入后端
///
/// 用于测试和已完整载入内存的数据.
pub struct MemoryBackend {
    /// 数据缓冲区
    data: Arc<[u8]>,
    /// 当前位置
    pos: usize,
}

impl MemoryBackend {
    /// 从已有数据创建
    pub fn from_data(data: Vec<u8>) -> Self {
        Self::from_shared(Arc::from(data))
    }

    /// 从共享数据创建, 不复制
    pub fn from_shared(data: Arc<[u8]>) -> Self {
        Self { data, pos: 0 }
    }

    /// 获取内部数据的引用
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl IoBackend for MemoryBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.data.len().saturating_sub(self.pos);
        let to_read = buf.len().min(available);
        if to_read == 0 {
            return Ok(0);
        }
        buf[..to_read].copy_from_slice(&self.data[self.pos..self.pos + to_read]);
        self.pos += to_read;
        Ok(to_read)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => self.data.len() as i64 + offset,
            SeekFrom::Current(offset) => self.pos as i64 + offset,
        };
        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek 位置不能为负数",
            ));
        }
        // 允许定位到末尾之后, 之后的读取返回 0
        self.pos = new_pos as usize;
        Ok(self.pos as u64)
    }

    fn position(&mut self) -> io::Result<u64> {
        Ok(self.pos as u64)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_memory_read_and_seek() {
        let mut backend = MemoryBackend::from_data((0u8..10).collect());
        assert_eq!(backend.size(), 10);

        let mut buf = [0u8; 4];
        assert_eq!(backend.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [0, 1, 2, 3]);

        backend.seek(SeekFrom::Start(8)).unwrap();
        assert_eq!(backend.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[8, 9]);
        assert_eq!(backend.read(&mut buf).unwrap(), 0);

        backend.seek(SeekFrom::Start(100)).unwrap();
        assert_eq!(backend.read(&mut buf).unwrap(), 0);
        assert!(backend.seek(SeekFrom::Current(-200)).is_err());
    }

    #[test]
    fn test_file_source_open() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"ADIF0123").unwrap();
        tmp.flush().unwrap();

        let source = InputSource::from(tmp.path());
        let mut backend = source.open().unwrap();
        assert_eq!(backend.size(), 8);
        let mut buf = [0u8; 4];
        assert_eq!(backend.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"ADIF");
        assert_eq!(backend.position().unwrap(), 4);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let source = InputSource::File(PathBuf::from("/nonexistent/dir/a.aac"));
        assert!(matches!(
            source.open(),
            Err(aacfeed_core::FeedError::Io(_))
        ));
    }
}
