//! 图像空间与投影空间之间的正投影和反投影.
//!
//! 两类投影器都以 [`RelatedViewgrams`] 为单位工作, 并只处理给定的轴向位置子区间,
//! 区间之外的数据保持不变. 每个投影器持有一个累计计时器.

mod interpolation;
mod presmoothing;
mod ray_tracing;

pub use interpolation::BackProjectorByBinUsingInterpolation;
pub use presmoothing::PresmoothingForwardProjectorByBin;
pub use ray_tracing::ForwardProjectorByBinUsingRayTracing;

pub(crate) use interpolation::interpolate;

use crate::error::{ReconError, ReconResult};
use crate::image::VoxelsOnCartesianGrid;
use crate::proj_data::{ProjData, ProjDataInfo, RelatedViewgrams, Viewgram};
use crate::timer::AccTimer;

/// 正投影器.
pub trait ForwardProjectorByBin: Send {
    /// 计算单个视角图在 `[min_axial_pos_num, max_axial_pos_num]` 内的投影值,
    /// 覆盖原有数据.
    fn forward_project_viewgram(
        &self,
        viewgram: &mut Viewgram,
        image: &VoxelsOnCartesianGrid,
        min_axial_pos_num: i32,
        max_axial_pos_num: i32,
    ) -> ReconResult<()>;

    /// 累计计时器.
    fn timer(&self) -> &AccTimer;

    /// 可变的累计计时器.
    fn timer_mut(&mut self) -> &mut AccTimer;

    /// 参数说明.
    fn parameter_info(&self) -> String;

    /// 投影一组视角图的给定轴向区间.
    fn forward_project(
        &mut self,
        viewgrams: &mut RelatedViewgrams,
        image: &VoxelsOnCartesianGrid,
        min_axial_pos_num: i32,
        max_axial_pos_num: i32,
    ) -> ReconResult<()> {
        self.timer_mut().start();
        let result = viewgrams.iter_mut().try_for_each(|v| {
            self.forward_project_viewgram(v, image, min_axial_pos_num, max_axial_pos_num)
        });
        self.timer_mut().stop();
        result
    }

    /// 投影一组视角图的全部轴向位置.
    fn forward_project_all(
        &mut self,
        viewgrams: &mut RelatedViewgrams,
        image: &VoxelsOnCartesianGrid,
    ) -> ReconResult<()> {
        let (lo, hi) = (viewgrams.get_min_axial_pos_num(), viewgrams.get_max_axial_pos_num());
        self.forward_project(viewgrams, image, lo, hi)
    }
}

/// 反投影器.
pub trait BackProjectorByBin: Send {
    /// 把单个视角图在 `[min_axial_pos_num, max_axial_pos_num]` 内的数据累加到图像.
    fn back_project_viewgram(
        &self,
        image: &mut VoxelsOnCartesianGrid,
        viewgram: &Viewgram,
        min_axial_pos_num: i32,
        max_axial_pos_num: i32,
    ) -> ReconResult<()>;

    /// 累计计时器.
    fn timer(&self) -> &AccTimer;

    /// 可变的累计计时器.
    fn timer_mut(&mut self) -> &mut AccTimer;

    /// 参数说明.
    fn parameter_info(&self) -> String;

    /// 反投影一组视角图的给定轴向区间.
    fn back_project(
        &mut self,
        image: &mut VoxelsOnCartesianGrid,
        viewgrams: &RelatedViewgrams,
        min_axial_pos_num: i32,
        max_axial_pos_num: i32,
    ) -> ReconResult<()> {
        self.timer_mut().start();
        let result = viewgrams.iter().try_for_each(|v| {
            self.back_project_viewgram(image, v, min_axial_pos_num, max_axial_pos_num)
        });
        self.timer_mut().stop();
        result
    }
}

/// 把整幅图像正投影到 `proj_data` 的全部段和视角.
///
/// 按对称视角组遍历, 视角号取 `[0, N/4]`, 段号取 `[0, S]`.
pub fn forward_project_proj_data(
    projector: &mut dyn ForwardProjectorByBin,
    image: &VoxelsOnCartesianGrid,
    proj_data: &mut dyn ProjData,
) -> ReconResult<()> {
    let info = proj_data.info().clone();
    for seg in 0..=info.get_max_segment_num() {
        for view in 0..=info.get_num_views() / 4 {
            let mut viewgrams = RelatedViewgrams::zeros(info.clone(), view, seg);
            projector.forward_project_all(&mut viewgrams, image)?;
            proj_data.set_related_viewgrams(&viewgrams)?;
        }
    }
    Ok(())
}

/// 响应线在图像坐标 `[z, y, x]` (毫米) 中的参数表示 `p(t) = origin + t * dir`.
///
/// `t` 为横断面内沿响应线方向的距离, 因此 `dir` 的横断面分量为单位长度,
/// 轴向分量为 `tan(theta)`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct Lor {
    pub origin: [f32; 3],
    pub dir: [f32; 3],
    /// 横断面内到探测器圆柱的半长度.
    pub half_length: f32,
}

impl Lor {
    pub fn new(info: &ProjDataInfo, segment_num: i32, view_num: i32, m: f32, s: f32) -> Self {
        let phi = info.get_phi(view_num);
        let (sin_phi, cos_phi) = phi.sin_cos();
        let r = info.get_ring_radius();
        Self {
            origin: [m, s * sin_phi, s * cos_phi],
            dir: [info.get_tantheta(segment_num), cos_phi, -sin_phi],
            half_length: (r * r - s * s).max(0.0).sqrt(),
        }
    }

    /// 沿响应线单位 `t` 的实际长度.
    #[inline]
    pub fn length_per_t(&self) -> f32 {
        (1.0 + self.dir[0] * self.dir[0]).sqrt()
    }
}

/// 图像与投影数据的横断面采样是否能够配合使用.
pub(crate) fn check_image(image: &VoxelsOnCartesianGrid) -> ReconResult<()> {
    if image.data().get_regular_range().is_none() {
        return Err(ReconError::GeometryMismatch("投影器要求规则的图像".to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proj_data::Scanner;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_lor_geometry() {
        let scanner = Scanner::by_name("test").unwrap();
        let info = ProjDataInfo::cylindrical(scanner, 1, 2, 32, 32, true).unwrap();
        let lor = Lor::new(&info, 2, 8, 1.0, 10.0);
        // phi = pi/4: 原点在 (x, y) = s * (cos, sin) 处, 方向与之垂直.
        let k = std::f32::consts::FRAC_1_SQRT_2;
        assert_abs_diff_eq!(lor.origin[1], 10.0 * k, epsilon = 1e-5);
        assert_abs_diff_eq!(lor.origin[2], 10.0 * k, epsilon = 1e-5);
        assert_abs_diff_eq!(lor.origin[1] * lor.dir[1] + lor.origin[2] * lor.dir[2], 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(lor.dir[0], info.get_tantheta(2));
        assert_abs_diff_eq!(lor.half_length, (100.0_f32 * 100.0 - 100.0).sqrt());
        assert!(lor.length_per_t() > 1.0);
    }

    #[test]
    fn test_forward_project_proj_data_fills_every_view() {
        use crate::array::range3d;
        use crate::proj_data::ProjDataInMemory;
        use std::sync::Arc;

        let scanner = Scanner::by_name("test").unwrap();
        let info = Arc::new(ProjDataInfo::cylindrical(scanner, 1, 1, 8, 16, true).unwrap());
        let mut image = VoxelsOnCartesianGrid::zeros(&range3d((0, 14), (-2, 2), (-2, 2)), [2.5, 4.0, 4.0]);
        image.fill(1.0);
        let mut pd = ProjDataInMemory::zeros(info.clone());
        let mut fp = ForwardProjectorByBinUsingRayTracing::new();
        forward_project_proj_data(&mut fp, &image, &mut pd).unwrap();
        // 中心 bin 穿过 5 个体素, 每个视角都应有非零投影.
        for seg in info.segment_nums() {
            for view in 0..8 {
                let v = pd.get_viewgram(view, seg).unwrap();
                assert!(v.data()[3][0] > 0.0, "view {view}, segment {seg}");
            }
        }
        assert!(!fp.timer().is_running());
    }
}
