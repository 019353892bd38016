//! 基于 Siddon 光线追踪的正投影器.

use super::{check_image, ForwardProjectorByBin, Lor};
use crate::error::ReconResult;
use crate::image::{Axis, VoxelsOnCartesianGrid};
use crate::proj_data::Viewgram;
use crate::timer::AccTimer;
use itertools::Itertools;
use std::fmt::Write;

/// 沿响应线精确计算穿过每个体素的长度, 投影值为体素值与长度的乘积之和.
///
/// 每个 bin 可以用径向均匀分布的多条响应线取平均.
#[derive(Clone, Debug)]
pub struct ForwardProjectorByBinUsingRayTracing {
    num_tangential_rays: u32,
    timer: AccTimer,
}

impl ForwardProjectorByBinUsingRayTracing {
    /// 每个 bin 使用一条响应线.
    pub fn new() -> Self {
        Self {
            num_tangential_rays: 1,
            timer: AccTimer::new(),
        }
    }

    /// 每个 bin 沿径向使用 `n` 条响应线 (至少 1 条).
    pub fn with_num_tangential_rays(mut self, n: u32) -> Self {
        self.num_tangential_rays = n.max(1);
        self
    }

    /// 每个 bin 的响应线条数.
    #[inline]
    pub fn num_tangential_rays(&self) -> u32 {
        self.num_tangential_rays
    }
}

impl Default for ForwardProjectorByBinUsingRayTracing {
    fn default() -> Self {
        Self::new()
    }
}

/// 各坐标轴上的体素边界, 按 `[z, y, x]` 排列.
struct Grid {
    lo_edge: [f32; 3],
    voxel: [f32; 3],
    min: [i32; 3],
    num: [i32; 3],
}

impl Grid {
    fn new(image: &VoxelsOnCartesianGrid) -> Self {
        let bounds = image.bounds();
        let voxel = image.voxel_size();
        let mut grid = Grid {
            lo_edge: [0.0; 3],
            voxel,
            min: [0; 3],
            num: [0; 3],
        };
        for axis in [Axis::Z, Axis::Y, Axis::X] {
            let d = axis.index();
            let (lo, hi) = bounds[d];
            grid.lo_edge[d] = image.coord_mm(axis, lo) - voxel[d] / 2.0;
            grid.min[d] = lo;
            grid.num[d] = hi - lo + 1;
        }
        grid
    }

    /// 响应线与某一轴所有边界平面相交的参数, 升序且落在 `(t0, t1)` 内.
    fn crossings(&self, lor: &Lor, d: usize, t0: f32, t1: f32) -> Vec<f32> {
        let dir = lor.dir[d];
        if dir == 0.0 {
            return Vec::new();
        }
        let mut ts: Vec<f32> = (0..=self.num[d])
            .map(|k| (self.lo_edge[d] + k as f32 * self.voxel[d] - lor.origin[d]) / dir)
            .filter(|&t| t > t0 && t < t1)
            .collect();
        if dir < 0.0 {
            ts.reverse();
        }
        ts
    }

    /// 点所在体素的索引.
    fn voxel_at(&self, p: [f32; 3]) -> Option<[i32; 3]> {
        let mut idx = [0; 3];
        for d in 0..3 {
            let k = ((p[d] - self.lo_edge[d]) / self.voxel[d]).floor() as i32;
            if k < 0 || k >= self.num[d] {
                return None;
            }
            idx[d] = self.min[d] + k;
        }
        Some(idx)
    }
}

/// Siddon 算法: 在 `t` 上合并三个方向的边界交点, 逐段累加.
fn siddon(grid: &Grid, image: &VoxelsOnCartesianGrid, lor: &Lor) -> f32 {
    let (t0, t1) = (-lor.half_length, lor.half_length);
    if t1 <= t0 {
        return 0.0;
    }
    let data = image.data();
    let ts = std::iter::once(t0)
        .chain((0..3).map(|d| grid.crossings(lor, d, t0, t1)).kmerge_by(|a, b| a < b))
        .chain(std::iter::once(t1));
    let mut sum = 0.0;
    for (ta, tb) in ts.tuple_windows() {
        if tb <= ta {
            continue;
        }
        let mid = 0.5 * (ta + tb);
        let p = [
            lor.origin[0] + mid * lor.dir[0],
            lor.origin[1] + mid * lor.dir[1],
            lor.origin[2] + mid * lor.dir[2],
        ];
        if let Some([z, y, x]) = grid.voxel_at(p) {
            sum += data[z][y][x] * (tb - ta);
        }
    }
    sum * lor.length_per_t()
}

impl ForwardProjectorByBin for ForwardProjectorByBinUsingRayTracing {
    fn forward_project_viewgram(
        &self,
        viewgram: &mut Viewgram,
        image: &VoxelsOnCartesianGrid,
        min_axial_pos_num: i32,
        max_axial_pos_num: i32,
    ) -> ReconResult<()> {
        check_image(image)?;
        let info = viewgram.info().clone();
        let (seg, view) = (viewgram.segment_num(), viewgram.view_num());
        let grid = Grid::new(image);
        let lo = min_axial_pos_num.max(viewgram.get_min_axial_pos_num());
        let hi = max_axial_pos_num.min(viewgram.get_max_axial_pos_num());
        let n = self.num_tangential_rays;
        let sampling = info.get_sampling_in_s();

        for ax in lo..=hi {
            let m = info.get_m(seg, ax);
            for (tang, bin) in viewgram.data_mut()[ax].indexed_iter_mut() {
                let s_centre = info.get_s(tang);
                let total: f32 = (0..n)
                    .map(|i| {
                        let offset = ((i as f32 + 0.5) / n as f32 - 0.5) * sampling;
                        siddon(&grid, image, &Lor::new(&info, seg, view, m, s_centre + offset))
                    })
                    .sum();
                *bin = total / n as f32;
            }
        }
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
        let _ = writeln!(s, "Forward projector : Ray Tracing");
        let _ = write!(s, "  number of rays in tangential direction := {}", self.num_tangential_rays);
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::range3d;
    use crate::proj_data::{ProjDataInfo, RelatedViewgrams, Scanner};
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn info() -> Arc<ProjDataInfo> {
        let scanner = Scanner::by_name("test").unwrap();
        Arc::new(ProjDataInfo::cylindrical(scanner, 1, 2, 8, 16, true).unwrap())
    }

    #[test]
    fn test_uniform_slab_gives_chord_length() {
        let info = info();
        // 三个平面覆盖 [-7.5, 7.5] mm, 横断面体素 4x4 mm 覆盖 [-42, 42] mm.
        let mut img = VoxelsOnCartesianGrid::zeros(&range3d((0, 2), (-10, 10), (-10, 10)), [5.0, 4.0, 4.0]);
        img.fill(1.0);
        let direct = Arc::new(info.with_max_segment_num(0).unwrap());
        let mut v = Viewgram::zeros(direct, 0, 0);
        let p = ForwardProjectorByBinUsingRayTracing::new();
        p.forward_project_viewgram(&mut v, &img, 3, 4).unwrap();
        // phi = 0 时响应线沿 y 方向, 弦长为 84 mm.
        assert_abs_diff_eq!(v.data()[3][0], 84.0, epsilon = 1e-3);
        assert_abs_diff_eq!(v.data()[4][0], 84.0, epsilon = 1e-3);
        assert_abs_diff_eq!(v.data()[3][5], 84.0, epsilon = 1e-3);
        assert_eq!(v.data()[2][0], 0.0);
    }

    #[test]
    fn test_oblique_length_and_range() {
        let info = info();
        let mut img = VoxelsOnCartesianGrid::zeros(&range3d((0, 14), (-3, 3), (-3, 3)), [2.5, 4.0, 4.0]);
        img.data_mut()[7][0][0] = 1.0;
        let mut r = RelatedViewgrams::zeros(info.clone(), 0, 1);
        r.fill(-1.0);
        let mut p = ForwardProjectorByBinUsingRayTracing::new();
        p.forward_project(&mut r, &img, 3, 3).unwrap();
        for v in r.iter() {
            // 区间之外保持不变.
            assert_eq!(v.data()[2][0], -1.0);
            assert_eq!(v.data()[4][0], -1.0);
            // 轴向位置 3 的中点 m = 0 穿过中心体素, 长度为 4 / cos(theta).
            let expected = 4.0 * (1.0 + info.get_tantheta(1).powi(2)).sqrt();
            assert_abs_diff_eq!(v.data()[3][0], expected, epsilon = 1e-3);
        }
        assert!(!p.timer().is_running());
    }

    #[test]
    fn test_multiple_rays_average() {
        let info = info();
        let mut img = VoxelsOnCartesianGrid::zeros(&range3d((0, 14), (-3, 3), (-3, 3)), [2.5, 4.0, 4.0]);
        img.fill(1.0);
        let mut a = Viewgram::zeros(info.clone(), 0, 0);
        let mut b = a.clone();
        let one = ForwardProjectorByBinUsingRayTracing::new();
        let four = ForwardProjectorByBinUsingRayTracing::new().with_num_tangential_rays(4);
        one.forward_project_viewgram(&mut a, &img, 0, 7).unwrap();
        four.forward_project_viewgram(&mut b, &img, 0, 7).unwrap();
        // 图像内部的 bin 两者一致.
        assert_abs_diff_eq!(a.data()[3][0], b.data()[3][0], epsilon = 1e-3);
        assert_eq!(four.num_tangential_rays(), 4);
    }
}
