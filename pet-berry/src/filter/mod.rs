//! 频域滤波器与图像处理器.

mod colsher;
mod fft;
mod gaussian;
mod ramp;

pub use colsher::{ColsherFilter, ColsherParameters};
pub use fft::{generalised_hamming, padded_fft_size};
pub use gaussian::SeparableGaussian;
pub use ramp::RampFilter;

use crate::error::ReconResult;
use crate::image::VoxelsOnCartesianGrid;

/// 原地处理整幅图像的算子, 例如平滑.
pub trait ImageProcessor: Send + Sync {
    /// 处理 `image`.
    fn apply(&self, image: &mut VoxelsOnCartesianGrid) -> ReconResult<()>;

    /// 参数说明.
    fn parameter_info(&self) -> String;
}
