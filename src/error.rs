//! Error types for ring creation, release and checked commits
//!
//! 环形缓冲区创建、释放以及带检查提交的错误类型

use std::io;
use thiserror::Error;

/// Errors returned by `magicring`
///
/// `magicring` 返回的错误
#[derive(Debug, Error)]
pub enum RingError {
    /// An argument was outside of what the operation accepts
    ///
    /// 参数超出操作可接受的范围
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The requested capacity does not fit the cursor width with one bit of headroom
    ///
    /// 请求的容量无法在保留一个高位的前提下放入索引宽度
    #[error(
        "capacity 2^({page_log2} + {extra_page_log2}) does not fit the index width (max exponent sum {max})"
    )]
    Domain {
        page_log2: u32,
        extra_page_log2: u32,
        max: u32,
    },

    /// Creating, sizing or mapping the shared memory object failed
    ///
    /// 共享内存对象的创建、调整大小或映射失败
    #[error("os resource error: {0}")]
    Os(#[from] rustix::io::Errno),

    /// The ring was never created or has already been destroyed
    ///
    /// 环形缓冲区从未创建或已被销毁
    #[error("ring is not initialized")]
    NotInitialized,

    /// A checked commit asked for more bytes than the region holds
    ///
    /// 带检查的提交请求的字节数超过了区域大小
    #[error("commit of {requested} bytes exceeds the {limit} bytes in the region")]
    Overcommit { requested: usize, limit: usize },
}

/// Result alias used throughout the crate
///
/// 本 crate 使用的 Result 别名
pub type Result<T> = std::result::Result<T, RingError>;

impl From<RingError> for io::Error {
    fn from(err: RingError) -> Self {
        match err {
            RingError::Os(errno) => io::Error::from(errno),
            RingError::InvalidArgument(_) | RingError::Domain { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, err)
            }
            RingError::NotInitialized => io::Error::new(io::ErrorKind::NotConnected, err),
            RingError::Overcommit { .. } => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}
