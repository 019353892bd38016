//! 三维图像: 笛卡尔网格上的体素, 文件读写, 分辨率测量.

mod io;
mod profile;
mod voxels;

pub use profile::{find_fwhm_at_max, find_level_width, invert_axis};
pub use voxels::{Axis, VoxelsOnCartesianGrid};
