//! 运行时错误.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 重建及数据处理中的错误.
#[derive(Debug, Error)]
pub enum ReconError {
    /// 无法打开或写入文件. 第一个参数为相关路径.
    #[error("文件 `{0}` 读写失败: {1}")]
    Io(PathBuf, #[source] io::Error),

    /// 不带路径信息的流错误.
    #[error("流读写失败: {0}")]
    Stream(#[from] io::Error),

    /// NIfTI 文件读写失败.
    #[error("NIfTI 读写失败: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// npy 文件写出失败.
    #[error("npy 写出失败: {0}")]
    Npy(#[from] ndarray_npy::WriteNpyError),

    /// 投影数据或图像的几何信息不匹配.
    #[error("几何信息不匹配: {0}")]
    GeometryMismatch(String),

    /// 参数取值非法.
    #[error("参数非法: {0}")]
    InvalidParameter(String),

    /// 尚未实现的功能.
    #[error("功能尚未实现: {0}")]
    Unimplemented(&'static str),

    /// 序列化或反序列化失败.
    #[cfg(feature = "serde")]
    #[error("序列化失败: {0}")]
    Serde(#[from] bincode::Error),
}

impl ReconError {
    /// 由路径和底层 I/O 错误构造.
    #[inline]
    pub fn io<P: Into<PathBuf>>(path: P, e: io::Error) -> Self {
        Self::Io(path.into(), e)
    }
}

/// 重建结果.
pub type ReconResult<T> = Result<T, ReconError>;
