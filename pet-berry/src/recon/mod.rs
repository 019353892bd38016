//! 滤波反投影重建: 二维 FBP 与三维重投影 FBP3DRP.

mod fbp2d;
mod fbp3drp;
mod full_log;
mod params;

pub use fbp2d::Fbp2dReconstruction;
pub use fbp3drp::{best_fit, find_rmin_rmax, num_segments_to_combine_to_use, Fbp3drpReconstruction};
pub use full_log::FullLog;
pub use params::Fbp3drpParameters;
