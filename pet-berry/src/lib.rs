#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供 PET/SPECT 投影数据的结构化表示, 解析重建算法与归一化数据结构.
//!
//! 该 crate 只提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 投影数据按圆柱形扫描仪描述, 段号 `s` 与 `-s` 互为对称.
//! 2. 图像和投影数据的下标可以为负, 由 [`array::Array`] 统一管理.
//! 3. 下标越界时程序直接 panic, 而不会导致内存错误.
//!
//! # 功能
//!
//! ### 带偏移的多维数组 ✅
//!
//! 任意起始下标, 每一行可以拥有不同的范围. 支持逐元素运算与二进制读写.
//!
//! 实现位于 `pet-berry/src/array`.
//!
//! ### 投影数据 ✅
//!
//! 扫描仪, 段, 视角图, 正弦图与对称视角组; 内存存储与二进制流存储; SSRB 重组.
//!
//! 实现位于 `pet-berry/src/proj_data`.
//!
//! ### 滤波器 ✅
//!
//! 一维 Ramp 滤波器与二维 Colsher 滤波器, 均以 FFT 在频域上相乘.
//!
//! 实现位于 `pet-berry/src/filter`.
//!
//! ### 正投影与反投影 ✅
//!
//! 射线追踪正投影, 插值反投影, 以及预平滑包装.
//!
//! 实现位于 `pet-berry/src/projector`.
//!
//! ### FBP3DRP 三维重建 ✅
//!
//! 二维 FBP 估计, 正投影补全缺失数据, Colsher 滤波与三维反投影.
//!
//! 实现位于 `pet-berry/src/recon`.
//!
//! ### 归一化数据结构 ✅
//!
//! 探测器对数据与扇形数据, 块因子, 几何因子与探测器效率.
//!
//! 实现位于 `pet-berry/src/norm`.

pub mod array;
pub mod consts;
pub mod error;
pub mod filter;
pub mod image;
pub mod norm;
pub mod proj_data;
pub mod projector;
pub mod recon;
pub mod timer;

pub mod prelude;

pub use error::{ReconError, ReconResult};
