//! 标签签名识别.
//!
//! AAC 裸流文件常被 ID3v2 (头部) 以及 ID3v1 / Lyrics3 / APEv2 (尾部) 包裹.
//! 这里只识别字节签名, 不解析标签内容.

/// ID3v2 头部大小
pub const ID3V2_HEADER_SIZE: usize = 10;

/// 尾部标签签名及其最小有效数据量 (缓冲区中需多于该字节数才判断)
const TRAILING_TAGS: [(&[u8], usize); 3] = [
    (b"TAG", 3),
    (b"LYRICSBEGIN", 11),
    (b"APETAGEX", 8),
];

/// 读取 ID3v2 块的总大小 (含 10 字节头部)
///
/// 大小字段为 4 字节 syncsafe 整数, 每字节仅低 7 位有效.
/// 数据不以 `ID3` 开头或不足 10 字节时返回 `None`.
pub fn id3v2_size(data: &[u8]) -> Option<u64> {
    if data.len() < ID3V2_HEADER_SIZE || &data[..3] != b"ID3" {
        return None;
    }
    let size = (u64::from(data[6] & 0x7F) << 21)
        | (u64::from(data[7] & 0x7F) << 14)
        | (u64::from(data[8] & 0x7F) << 7)
        | u64::from(data[9] & 0x7F);
    Some(size + ID3V2_HEADER_SIZE as u64)
}

/// 数据是否以尾部标签开头
pub fn starts_with_trailing_tag(data: &[u8]) -> bool {
    TRAILING_TAGS
        .iter()
        .any(|(sig, min)| data.len() > *min && data.starts_with(sig))
}
