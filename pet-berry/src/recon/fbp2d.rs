//! 直接平面上的二维滤波反投影.

use crate::consts::DIRECT_SEGMENT;
use crate::error::{ReconError, ReconResult};
use crate::filter::RampFilter;
use crate::image::{Axis, VoxelsOnCartesianGrid};
use crate::projector::interpolate;
use crate::proj_data::{ProjData, Viewgram};
use crate::timer::AccTimer;
use log::debug;
use std::f32::consts::PI;

/// 只使用段 0 的二维 FBP.
///
/// 每个视角图的每一行先做 Ramp 滤波, 再以 `pi / num_views` 为权重逐平面反投影.
/// 图像平面与正弦图之间按轴向坐标 `m` 线性插值.
#[derive(Clone, Debug)]
pub struct Fbp2dReconstruction {
    ramp: RampFilter,
    timer: AccTimer,
}

impl Fbp2dReconstruction {
    /// 使用给定的 Ramp 滤波器.
    pub fn new(ramp: RampFilter) -> Self {
        Self {
            ramp,
            timer: AccTimer::new(),
        }
    }

    /// Ramp 滤波器.
    #[inline]
    pub fn ramp(&self) -> &RampFilter {
        &self.ramp
    }

    /// 累计计时器.
    #[inline]
    pub fn timer(&self) -> &AccTimer {
        &self.timer
    }

    /// 重建到 `image`. 图像原有内容被覆盖.
    pub fn reconstruct(
        &mut self,
        proj_data: &dyn ProjData,
        image: &mut VoxelsOnCartesianGrid,
    ) -> ReconResult<()> {
        let info = proj_data.info();
        if !info.is_arc_corrected() {
            return Err(ReconError::GeometryMismatch(
                "二维 FBP 要求弧校正的投影数据".to_owned(),
            ));
        }
        if info.get_num_tangential_poss() as usize > self.ramp.fft_size() {
            return Err(ReconError::GeometryMismatch(format!(
                "径向位置数 {} 超过 Ramp 滤波器长度 {}",
                info.get_num_tangential_poss(),
                self.ramp.fft_size()
            )));
        }
        if image.data().get_regular_range().is_none() {
            return Err(ReconError::GeometryMismatch("二维 FBP 要求规则的图像".to_owned()));
        }

        self.timer.start();
        image.fill(0.0);
        let weight = PI / info.get_num_views() as f32;
        for view in 0..info.get_num_views() {
            let mut viewgram = proj_data.get_viewgram(view, DIRECT_SEGMENT)?;
            for row in viewgram.data_mut().iter_mut() {
                self.ramp.apply_array(row);
            }
            back_project_direct(image, &viewgram, weight);
        }
        self.timer.stop();
        debug!(
            "二维 FBP: {} 个视角, 用时 {} ms",
            info.get_num_views(),
            self.timer.get_total_ms()
        );
        Ok(())
    }
}

fn back_project_direct(image: &mut VoxelsOnCartesianGrid, viewgram: &Viewgram, weight: f32) {
    let info = viewgram.info();
    let seg = viewgram.segment_num();
    let (lo, hi) = (viewgram.get_min_axial_pos_num(), viewgram.get_max_axial_pos_num());
    let (sin_phi, cos_phi) = info.get_phi(viewgram.view_num()).sin_cos();

    let [(z0, z1), (y0, y1), (x0, x1)] = image.bounds();
    let axials: Vec<f32> = (z0..=z1)
        .map(|z| info.get_axial_pos_for_m(seg, image.coord_mm(Axis::Z, z)))
        .collect();
    let ys: Vec<f32> = (y0..=y1).map(|i| image.coord_mm(Axis::Y, i)).collect();
    let xs: Vec<f32> = (x0..=x1).map(|i| image.coord_mm(Axis::X, i)).collect();

    image.for_each_plane_mut(|z, plane| {
        let axial = axials[(z - z0) as usize];
        for (row, &yy) in plane.iter_mut().zip(&ys) {
            for (v, &xx) in row.as_mut_slice().iter_mut().zip(&xs) {
                let Some(tang) = info.get_tangential_pos_for_s(xx * cos_phi + yy * sin_phi) else {
                    continue;
                };
                *v += weight * interpolate(viewgram, axial, tang, lo, hi);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::padded_fft_size;
    use crate::projector::{forward_project_proj_data, ForwardProjectorByBinUsingRayTracing};
    use crate::proj_data::{ProjDataInMemory, ProjDataInfo, Scanner};
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    /// 半径为 `radius` 毫米, 值为 1 的圆柱.
    fn cylinder(info: &ProjDataInfo, radius: f32) -> VoxelsOnCartesianGrid {
        let mut image = VoxelsOnCartesianGrid::from_proj_data_info(info, 1.0);
        let [_, (y0, y1), (x0, x1)] = image.bounds();
        let ys: Vec<f32> = (y0..=y1).map(|i| image.coord_mm(Axis::Y, i)).collect();
        let xs: Vec<f32> = (x0..=x1).map(|i| image.coord_mm(Axis::X, i)).collect();
        image.for_each_plane_mut(|_, plane| {
            for (row, &y) in plane.iter_mut().zip(&ys) {
                for (v, &x) in row.as_mut_slice().iter_mut().zip(&xs) {
                    if x * x + y * y <= radius * radius {
                        *v = 1.0;
                    }
                }
            }
        });
        image
    }

    fn ramp(info: &ProjDataInfo) -> RampFilter {
        let n = padded_fft_size(2, info.get_num_tangential_poss());
        RampFilter::new(info.get_sampling_in_s(), n, 1.0, 0.5).unwrap()
    }

    #[test]
    fn test_uniform_cylinder() {
        let scanner = Scanner::by_name("test").unwrap();
        let info = Arc::new(ProjDataInfo::cylindrical(scanner, 1, 0, 32, 32, true).unwrap());
        let phantom = cylinder(&info, 40.0);
        let mut pd = ProjDataInMemory::zeros(info.clone());
        let mut fp = ForwardProjectorByBinUsingRayTracing::new();
        forward_project_proj_data(&mut fp, &phantom, &mut pd).unwrap();

        let mut image = phantom.get_empty_copy();
        let mut fbp = Fbp2dReconstruction::new(ramp(&info));
        fbp.reconstruct(&pd, &mut image).unwrap();

        let plane = &image.data()[7];
        let mut centre = 0.0;
        for y in -2..=2 {
            for x in -2..=2 {
                centre += plane[y][x];
            }
        }
        assert_abs_diff_eq!(centre / 25.0, 1.0, epsilon = 0.1);
        // 圆柱外部接近 0.
        assert_abs_diff_eq!(plane[15][0], 0.0, epsilon = 0.15);
        assert!(!fbp.timer().is_running());
    }

    #[test]
    fn test_rejects_non_arc_corrected() {
        let scanner = Scanner::by_name("test").unwrap();
        let info = Arc::new(ProjDataInfo::cylindrical(scanner, 1, 0, 32, 32, false).unwrap());
        let pd = ProjDataInMemory::zeros(info.clone());
        let mut image = VoxelsOnCartesianGrid::from_proj_data_info(&info, 1.0);
        let arc = ProjDataInfo::cylindrical(Scanner::by_name("test").unwrap(), 1, 0, 32, 32, true).unwrap();
        let mut fbp = Fbp2dReconstruction::new(ramp(&arc));
        assert!(fbp.reconstruct(&pd, &mut image).is_err());
    }
}
