//! 命令行工具依赖的通用组件.

use std::env;
use std::path::PathBuf;

pub mod phantom;

const SEP: &str = "--------------------------------------------------------";

/// 向 `w` 写入一条分隔线.
#[inline]
pub fn sep_to<W: std::io::Write>(mut w: W) -> std::io::Result<()> {
    writeln!(&mut w, "{SEP}")
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 获取输出目录.
///
/// 1. 若环境变量 `$PET_BERRY_OUTPUT_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/pet-berry/output`;
/// 3. 无法确定主目录时, 返回当前目录下的 `output`.
pub fn output_dir_from_env_or_home() -> PathBuf {
    match env::var("PET_BERRY_OUTPUT_DIR") {
        Ok(d) if !d.trim().is_empty() => PathBuf::from(d),
        _ => dirs::home_dir()
            .map(|h| h.join("pet-berry").join("output"))
            .unwrap_or_else(|| PathBuf::from("output")),
    }
}
