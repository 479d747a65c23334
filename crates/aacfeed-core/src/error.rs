//! 统一错误类型定义.
//!
//! 所有 aacfeed crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// aacfeed 统一错误类型
#[derive(Debug, Error)]
pub enum FeedError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// I/O 错误 (包括输入流无法打开)
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 输入不是可识别的 AAC 流
    #[error("不是 AAC 流: {0}")]
    NotAacStream(String),

    /// 解码引擎初始化失败, 携带引擎返回的负状态码
    #[error("解码引擎初始化失败, 状态码 {0}")]
    EngineInit(i32),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),
}

/// aacfeed 统一 Result 类型
pub type FeedResult<T> = Result<T, FeedError>;

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let err: FeedError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(err, FeedError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_invalid_argument_message() {
        let err = FeedError::InvalidArgument("PCM 块数必须大于 0".into());
        assert_eq!(err.to_string(), "无效参数: PCM 块数必须大于 0");
    }

    #[test]
    fn test_engine_init_message() {
        let err = FeedError::EngineInit(-1);
        assert_eq!(err.to_string(), "解码引擎初始化失败, 状态码 -1");
    }
}
