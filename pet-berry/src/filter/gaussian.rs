//! 可分离的三维高斯平滑.

use super::ImageProcessor;
use crate::error::{ReconError, ReconResult};
use crate::image::{Axis, VoxelsOnCartesianGrid};
use std::fmt::Write;

/// 半高宽与标准差之比 `2 * sqrt(2 * ln 2)`.
const FWHM_TO_SIGMA: f32 = 2.354_82;

/// 依次沿 z, y, x 做一维高斯卷积. 边界外视为 0.
#[derive(Clone, Debug, PartialEq)]
pub struct SeparableGaussian {
    fwhm: [f32; 3],
    max_kernel_sizes: [i32; 3],
}

impl SeparableGaussian {
    /// `fwhm` 为 `[z, y, x]` 方向的半高宽 (毫米), 0 代表该方向不平滑.
    pub fn new(fwhm: [f32; 3]) -> ReconResult<Self> {
        if fwhm.iter().any(|&f| !(f >= 0.0) || !f.is_finite()) {
            return Err(ReconError::InvalidParameter(format!(
                "高斯半高宽必须为非负有限值, 实际为 {fwhm:?}"
            )));
        }
        Ok(Self {
            fwhm,
            max_kernel_sizes: [-1; 3],
        })
    }

    /// 限制各方向卷积核的最大长度 (奇数), 负数代表不限制.
    pub fn with_max_kernel_sizes(mut self, sizes: [i32; 3]) -> Self {
        self.max_kernel_sizes = sizes;
        self
    }

    /// 半高宽 `[z, y, x]`.
    #[inline]
    pub fn fwhm(&self) -> [f32; 3] {
        self.fwhm
    }

    /// 给定体素大小时某方向的归一化卷积核, 下标 `0` 为中心, 只存非负一侧.
    pub fn kernel(&self, axis: Axis, voxel_size: f32) -> Vec<f32> {
        let fwhm = self.fwhm[axis.index()];
        if fwhm == 0.0 {
            return vec![1.0];
        }
        let sigma = fwhm / FWHM_TO_SIGMA / voxel_size;
        let mut half = (3.0 * sigma).ceil() as i32;
        let limit = self.max_kernel_sizes[axis.index()];
        if limit > 0 {
            half = half.min(limit / 2);
        }
        let raw: Vec<f32> = (0..=half)
            .map(|i| (-(i * i) as f32 / (2.0 * sigma * sigma)).exp())
            .collect();
        let total = raw[0] + 2.0 * raw[1..].iter().sum::<f32>();
        raw.into_iter().map(|v| v / total).collect()
    }

    fn smooth_axis(&self, image: &mut VoxelsOnCartesianGrid, axis: Axis) {
        let kernel = self.kernel(axis, image.voxel_size()[axis.index()]);
        if kernel.len() == 1 {
            return;
        }
        let [(z0, z1), (y0, y1), (x0, x1)] = image.bounds();
        let src = image.data().clone();
        let half = kernel.len() as i32 - 1;
        let (lo, hi) = image.bounds()[axis.index()];
        for z in z0..=z1 {
            for y in y0..=y1 {
                for x in x0..=x1 {
                    let centre = [z, y, x][axis.index()];
                    let mut acc = 0.0;
                    for off in -half..=half {
                        let p = centre + off;
                        if p < lo || p > hi {
                            continue;
                        }
                        let v = match axis {
                            Axis::Z => src[p][y][x],
                            Axis::Y => src[z][p][x],
                            Axis::X => src[z][y][p],
                        };
                        acc += kernel[off.unsigned_abs() as usize] * v;
                    }
                    image.data_mut()[z][y][x] = acc;
                }
            }
        }
    }
}

impl ImageProcessor for SeparableGaussian {
    fn apply(&self, image: &mut VoxelsOnCartesianGrid) -> ReconResult<()> {
        for axis in [Axis::Z, Axis::Y, Axis::X] {
            self.smooth_axis(image, axis);
        }
        Ok(())
    }

    fn parameter_info(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "Separable Gaussian :");
        let _ = writeln!(s, "  fwhm (z, y, x) := {:?}", self.fwhm);
        let _ = write!(s, "  max kernel sizes := {:?}", self.max_kernel_sizes);
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::range3d;
    use crate::image::find_fwhm_at_max;
    use approx::assert_abs_diff_eq;

    fn point() -> VoxelsOnCartesianGrid {
        let mut img = VoxelsOnCartesianGrid::zeros(&range3d((0, 20), (-15, 15), (-15, 15)), [1.0; 3]);
        img.data_mut()[10][0][0] = 1.0;
        img
    }

    #[test]
    fn test_kernel_normalised() {
        let g = SeparableGaussian::new([0.0, 4.0, 4.0]).unwrap();
        assert_eq!(g.kernel(Axis::Z, 1.0), vec![1.0]);
        let k = g.kernel(Axis::X, 1.0);
        assert_abs_diff_eq!(k[0] + 2.0 * k[1..].iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        let g = g.with_max_kernel_sizes([-1, 3, -1]);
        assert_eq!(g.kernel(Axis::Y, 1.0).len(), 2);
    }

    #[test]
    fn test_preserves_mass_and_sets_fwhm() {
        let g = SeparableGaussian::new([0.0, 6.0, 6.0]).unwrap();
        let mut img = point();
        g.apply(&mut img).unwrap();
        assert_abs_diff_eq!(img.sum(), 1.0, epsilon = 1e-4);
        assert_eq!(img.argmax(), [10, 0, 0]);
        assert_abs_diff_eq!(find_fwhm_at_max(&img, Axis::X), 6.0, epsilon = 0.3);
        // z 方向没有平滑.
        assert_eq!(img.data()[9][0][0], 0.0);
    }

    #[test]
    fn test_rejects_negative_fwhm() {
        assert!(SeparableGaussian::new([-1.0, 0.0, 0.0]).is_err());
    }
}
