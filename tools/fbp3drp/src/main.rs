//! FBP3DRP 命令行工具.
//!
//! 读取无头二进制流中的投影数据 (未指定输入时使用模拟的均匀圆柱),
//! 重建后写出 NIfTI 与 `.npy` 图像, 并打印运行报告.

mod report;
mod runner;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;

/// 流中的数值类型.
#[derive(ValueEnum, Copy, Clone, Debug)]
pub enum DataType {
    /// 32 位浮点数.
    F32,
    /// 64 位浮点数.
    F64,
    /// 16 位有符号整数.
    I16,
    /// 16 位无符号整数.
    U16,
    /// 32 位有符号整数.
    I32,
}

/// 流的字节序.
#[derive(ValueEnum, Copy, Clone, Debug)]
pub enum Endian {
    /// 本机字节序.
    Native,
    /// 小端序.
    Little,
    /// 大端序.
    Big,
}

/// 三维重投影滤波反投影 (FBP3DRP) 重建.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// 投影数据文件 (无头二进制流). 省略时使用模拟的均匀圆柱.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// 扫描仪名称.
    #[arg(long, default_value = "test")]
    pub scanner: String,

    /// 轴向压缩 (正奇数).
    #[arg(long, default_value_t = 1)]
    pub span: i32,

    /// 最大环差.
    #[arg(long, default_value_t = 1)]
    pub max_ring_diff: i32,

    /// 视角个数. 默认为每环探测器数的一半.
    #[arg(long)]
    pub views: Option<i32>,

    /// 径向位置个数. 默认为扫描仪的弧校正采样个数.
    #[arg(long)]
    pub tangs: Option<i32>,

    /// 流中的数值类型.
    #[arg(long, value_enum, default_value_t = DataType::F32)]
    pub data_type: DataType,

    /// 流的字节序.
    #[arg(long, value_enum, default_value_t = Endian::Native)]
    pub byte_order: Endian,

    /// 流中数值的缩放因子.
    #[arg(long, default_value_t = 1.0)]
    pub scale: f32,

    /// 数据的起始字节偏移.
    #[arg(long, default_value_t = 0)]
    pub offset: u64,

    /// 模拟圆柱的半径 (mm).
    #[arg(long, default_value_t = 40.0)]
    pub phantom_radius: f32,

    /// 图像横断面的放大倍数.
    #[arg(long, default_value_t = 1.0)]
    pub zoom: f32,

    /// 径向补零倍数.
    #[arg(long, default_value_t = 2)]
    pub pad_s: i32,

    /// 轴向补零倍数.
    #[arg(long, default_value_t = 2)]
    pub pad_z: i32,

    /// Ramp 与 Colsher 滤波器的窗参数.
    #[arg(long, default_value_t = 1.0)]
    pub alpha: f32,

    /// Ramp 与 Colsher 滤波器的截止频率.
    #[arg(long, default_value_t = 0.5)]
    pub fc: f32,

    /// SSRB 时合并的段数, -1 为自动.
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    pub num_segments_to_combine: i32,

    /// 参与三维重建的最大段号, -1 为全部.
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    pub max_segment: i32,

    /// 用于补全缺失投影的图像 (NIfTI). 省略时先做二维重建.
    #[arg(long)]
    pub reprojection_image: Option<PathBuf>,

    /// 把正投影数据拟合到测量数据.
    #[arg(long)]
    pub fit: bool,

    /// 保存中间图像.
    #[arg(long)]
    pub save_intermediate: bool,

    /// 输出目录. 默认为 `$PET_BERRY_OUTPUT_DIR` 或 `$HOME/pet-berry/output`.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// 输出文件名前缀.
    #[arg(long, default_value = "fbp3drp")]
    pub prefix: String,

    /// 输出更多日志.
    #[arg(short, long)]
    pub verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    simple_logger::SimpleLogger::new().with_level(level).init()?;

    println!("Running FBP3DRP reconstruction...");
    let summary = runner::run(&cli)?;
    summary.analyze();
    Ok(())
}
