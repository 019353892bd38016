//! 重建过程的持久日志.

use crate::error::{ReconError, ReconResult};
use log::{debug, warn};
use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// 记录阶段切换, 统计量与滤波器参数的文本日志.
///
/// 警告同时写入日志和 `log::warn!`. 写入失败只记一条调试信息, 不中断重建.
pub struct FullLog {
    path: Option<PathBuf>,
    writer: Box<dyn Write + Send>,
}

impl FullLog {
    /// 创建 (覆盖) `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> ReconResult<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| ReconError::io(path, e))?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            writer: Box::new(BufWriter::new(file)),
        })
    }

    /// 丢弃所有内容的日志. 警告仍然会通过 `log::warn!` 发出.
    pub fn disabled() -> Self {
        Self {
            path: None,
            writer: Box::new(io::sink()),
        }
    }

    /// 日志文件路径.
    #[inline]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 写入一行.
    pub fn line<D: Display>(&mut self, msg: D) {
        if let Err(e) = writeln!(self.writer, "{msg}") {
            debug!("写入重建日志失败: {e}");
        }
    }

    /// 写入一条警告.
    pub fn warn<D: Display>(&mut self, msg: D) {
        warn!("{msg}");
        self.line(format_args!("WARNING: {msg}"));
    }

    /// 新的阶段.
    pub fn section<D: Display>(&mut self, title: D) {
        self.line("");
        self.line("---------------------------------------------------------");
        self.line(title);
    }

    /// 图像或投影数据的统计量.
    pub fn stats<D: Display>(&mut self, what: D, min: f32, max: f32, sum: f32) {
        self.line(format_args!("  - {what}: min = {min}, max = {max}, sum = {sum}"));
    }

    /// 刷新到磁盘.
    pub fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            debug!("刷新重建日志失败: {e}");
        }
    }
}

impl std::fmt::Debug for FullLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FullLog").field("path", &self.path).finish()
    }
}

impl Drop for FullLog {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_lines_and_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.full_log");
        {
            let mut log = FullLog::create(&path).unwrap();
            assert_eq!(log.path(), Some(path.as_path()));
            log.section("2D FBP");
            log.stats("image", 0.0, 2.0, 10.5);
            log.warn("singular");
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("2D FBP\n"));
        assert!(text.contains("min = 0, max = 2, sum = 10.5"));
        assert!(text.contains("WARNING: singular"));
    }

    #[test]
    fn test_create_fails_in_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = FullLog::create(dir.path().join("no/such/dir/x.full_log")).unwrap_err();
        assert!(matches!(err, ReconError::Io(..)));
        let mut log = FullLog::disabled();
        log.line("dropped");
        assert!(log.path().is_none());
    }
}
