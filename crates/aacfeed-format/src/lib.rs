//! # aacfeed-format
//!
//! AAC 裸流的输入层.
//!
//! - I/O 后端抽象 ([`IoBackend`], 文件/内存两种实现)
//! - 定长预读缓冲 [`StreamCursor`], 负责压缩, 补读与尾部标签截断
//! - ID3v2 / ID3v1 / Lyrics3 / APEv2 标签签名
//! - ADTS 帧头与 ADIF 头解析, 以及时长估算 [`ContainerProbe`]

pub mod adts;
pub mod cursor;
pub mod io;
pub mod probe;
pub mod tag;

pub use cursor::StreamCursor;
pub use io::{FileBackend, InputSource, IoBackend, MemoryBackend};
pub use probe::{Container, ContainerProbe, ProbeReport, ProbedDuration};
