//! 基于双线性插值的体素驱动反投影器.

use super::{check_image, BackProjectorByBin};
use crate::error::ReconResult;
use crate::image::{Axis, VoxelsOnCartesianGrid};
use crate::proj_data::{ProjDataInfo, Viewgram};
use crate::timer::AccTimer;
use std::f32::consts::PI;
use std::fmt::Write;

/// 对每个体素求出其在视角图中的连续位置 `(axial, tangential)`, 双线性插值后累加.
///
/// 反投影离散化了对方向的积分: 每个视角的权重为 `pi / num_views`, 每个环差的权重为
/// `(ring_spacing / (2 * ring_radius)) * cos^3(theta)`.
#[derive(Clone, Debug)]
pub struct BackProjectorByBinUsingInterpolation {
    timer: AccTimer,
}

impl BackProjectorByBinUsingInterpolation {
    /// 新的反投影器.
    pub fn new() -> Self {
        Self {
            timer: AccTimer::new(),
        }
    }

    /// 单个视角图的权重.
    pub fn weight(info: &ProjDataInfo, segment_num: i32) -> f32 {
        let d_phi = PI / info.get_num_views() as f32;
        let d_tan = info.get_ring_spacing() / (2.0 * info.get_ring_radius());
        d_phi * d_tan * info.get_costheta(segment_num).powi(3)
    }
}

impl Default for BackProjectorByBinUsingInterpolation {
    fn default() -> Self {
        Self::new()
    }
}

/// 在 `[lo, hi]` 轴向区间内双线性插值, 区间外或径向越界的采样点视为 0.
pub(crate) fn interpolate(viewgram: &Viewgram, axial: f32, tangential: f32, lo: i32, hi: i32) -> f32 {
    let a0 = axial.floor();
    let t0 = tangential.floor();
    let (fa, ft) = (axial - a0, tangential - t0);
    let (a0, t0) = (a0 as i32, t0 as i32);
    let (tmin, tmax) = (
        viewgram.get_min_tangential_pos_num(),
        viewgram.get_max_tangential_pos_num(),
    );
    let data = viewgram.data();
    let mut sum = 0.0;
    for (a, wa) in [(a0, 1.0 - fa), (a0 + 1, fa)] {
        if a < lo || a > hi || wa == 0.0 {
            continue;
        }
        let row = &data[a];
        for (t, wt) in [(t0, 1.0 - ft), (t0 + 1, ft)] {
            if t >= tmin && t <= tmax && wt != 0.0 {
                sum += wa * wt * row[t];
            }
        }
    }
    sum
}

impl BackProjectorByBin for BackProjectorByBinUsingInterpolation {
    fn back_project_viewgram(
        &self,
        image: &mut VoxelsOnCartesianGrid,
        viewgram: &Viewgram,
        min_axial_pos_num: i32,
        max_axial_pos_num: i32,
    ) -> ReconResult<()> {
        check_image(image)?;
        let lo = min_axial_pos_num.max(viewgram.get_min_axial_pos_num());
        let hi = max_axial_pos_num.min(viewgram.get_max_axial_pos_num());
        if lo > hi {
            return Ok(());
        }
        let info = viewgram.info();
        let seg = viewgram.segment_num();
        let (sin_phi, cos_phi) = info.get_phi(viewgram.view_num()).sin_cos();
        let tan_theta = info.get_tantheta(seg);
        let weight = Self::weight(info, seg);

        let [(z0, z1), (y0, y1), (x0, x1)] = image.bounds();
        let zs: Vec<f32> = (z0..=z1).map(|i| image.coord_mm(Axis::Z, i)).collect();
        let ys: Vec<f32> = (y0..=y1).map(|i| image.coord_mm(Axis::Y, i)).collect();
        let xs: Vec<f32> = (x0..=x1).map(|i| image.coord_mm(Axis::X, i)).collect();

        image.for_each_plane_mut(|z, plane| {
            let zz = zs[(z - z0) as usize];
            for (row, &yy) in plane.iter_mut().zip(&ys) {
                for (v, &xx) in row.as_mut_slice().iter_mut().zip(&xs) {
                    let s = xx * cos_phi + yy * sin_phi;
                    let Some(tang) = info.get_tangential_pos_for_s(s) else {
                        continue;
                    };
                    let t = -xx * sin_phi + yy * cos_phi;
                    let axial = info.get_axial_pos_for_m(seg, zz - t * tan_theta);
                    *v += weight * interpolate(viewgram, axial, tang, lo, hi);
                }
            }
        });
        Ok(())
    }

    #[inline]
    fn timer(&self) -> &AccTimer {
        &self.timer
    }

    #[inline]
    fn timer_mut(&mut self) -> &mut AccTimer {
        &mut self.timer
    }

    fn parameter_info(&self) -> String {
        let mut s = String::new();
        let _ = write!(s, "Back projector : Interpolation (bilinear)");
        s
    }
}
