//! 图像的坐标轴翻转与点源分辨率测量.

use super::voxels::{Axis, VoxelsOnCartesianGrid};
use crate::array::Array3d;
use log::warn;

/// 沿 `axis` 翻转体素顺序. 几何信息 (索引范围与体素大小) 不变.
///
/// # 注意
///
/// 图像不规则时 panic.
pub fn invert_axis(image: &VoxelsOnCartesianGrid, axis: Axis) -> VoxelsOnCartesianGrid {
    let mut out = image.clone();
    let [(z0, z1), (y0, y1), (x0, x1)] = image.bounds();
    let src: &Array3d<f32> = image.data();
    for (z, plane) in out.data_mut().indexed_iter_mut() {
        for (y, row) in plane.indexed_iter_mut() {
            for (x, v) in row.indexed_iter_mut() {
                *v = match axis {
                    Axis::Z => src[z0 + z1 - z][y][x],
                    Axis::Y => src[z][y0 + y1 - y][x],
                    Axis::X => src[z][y][x0 + x1 - x],
                };
            }
        }
    }
    out
}

/// 一维剖面在高度 `level` 处的宽度 (以采样间隔为单位), 两侧均线性插值.
///
/// 从最大值出发分别向两侧寻找第一个不高于 `level` 的采样点. 若某侧直到边界
/// 都高于 `level`, 会给出警告, 此时结果不是真实宽度.
/// 少于两个采样点时返回 0.
pub fn find_level_width(values: &[f32], level: f32) -> f32 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let max_idx = values
        .iter()
        .enumerate()
        .fold(0, |best, (i, &v)| if v > values[best] { i } else { best });
    let max_position = max_idx as f32 + 1.0;
    let frac = |here: usize, neighbour: usize| {
        let d = values[here] - values[neighbour];
        if d == 0.0 {
            0.0
        } else {
            (values[here] - level) / d
        }
    };

    let mut cur = max_idx;
    while cur < n && values[cur] > level {
        cur += 1;
    }
    if cur == n {
        warn!("find_level_width: 剖面在右边界处仍高于 {level}, 无法得到真实宽度");
        cur -= 1;
    }
    let right = if cur == 0 {
        -max_position
    } else {
        (cur as f32 - max_position) - frac(cur, cur - 1)
    };

    let mut cur = max_idx;
    while cur > 0 && values[cur] > level {
        cur -= 1;
    }
    if cur == 0 && values[cur] > level {
        warn!("find_level_width: 剖面在左边界处仍高于 {level}, 无法得到真实宽度");
    }
    let left = if cur + 1 >= n {
        cur as f32 - max_position
    } else {
        frac(cur, cur + 1) + (cur as f32 - max_position)
    };

    right - left
}

/// 图像最大值处沿 `axis` 的半高宽 (毫米).
pub fn find_fwhm_at_max(image: &VoxelsOnCartesianGrid, axis: Axis) -> f32 {
    let [z, y, x] = image.argmax();
    let [(z0, z1), (y0, y1), _] = image.bounds();
    let data = image.data();
    let profile: Vec<f32> = match axis {
        Axis::Z => (z0..=z1).map(|p| data[p][y][x]).collect(),
        Axis::Y => (y0..=y1).map(|p| data[z][p][x]).collect(),
        Axis::X => data[z][y].as_slice().to_vec(),
    };
    let max = profile.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    find_level_width(&profile, max / 2.0) * image.voxel_size()[axis.index()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::range3d;
    use approx::assert_relative_eq;

    #[test]
    fn test_level_width_triangle() {
        assert_relative_eq!(find_level_width(&[0.0, 1.0, 2.0, 1.0, 0.0], 1.0), 2.0);
        assert_relative_eq!(find_level_width(&[0.0, 2.0, 4.0, 2.0, 0.0], 1.0), 3.0);
    }

    #[test]
    fn test_level_width_asymmetric() {
        // 左侧在 1.5 处穿过 2, 右侧在 3.5 处穿过 2.
        let w = find_level_width(&[0.0, 0.0, 4.0, 4.0, 0.0], 2.0);
        assert_relative_eq!(w, 3.5 - 1.5);
    }

    #[test]
    fn test_level_width_degenerate() {
        assert_eq!(find_level_width(&[1.0], 0.5), 0.0);
        // 整个剖面都高于 level 时仍然给出有限值.
        assert!(find_level_width(&[3.0, 4.0, 3.0], 1.0).is_finite());
    }

    #[test]
    fn test_invert_axis() {
        let mut img = VoxelsOnCartesianGrid::zeros(&range3d((0, 1), (-1, 1), (-2, 2)), [1.0; 3]);
        img.data_mut()[0][-1][-2] = 1.0;
        let x = invert_axis(&img, Axis::X);
        assert_eq!(x.data()[0][-1][2], 1.0);
        let y = invert_axis(&img, Axis::Y);
        assert_eq!(y.data()[0][1][-2], 1.0);
        let z = invert_axis(&img, Axis::Z);
        assert_eq!(z.data()[1][-1][-2], 1.0);
        assert_eq!(invert_axis(&x, Axis::X), img);
    }

    #[test]
    fn test_fwhm_at_max() {
        let mut img = VoxelsOnCartesianGrid::zeros(&range3d((0, 4), (-2, 2), (-2, 2)), [2.0, 1.0, 1.0]);
        let d = img.data_mut();
        d[2][0][0] = 2.0;
        d[1][0][0] = 1.0;
        d[3][0][0] = 1.0;
        d[2][0][1] = 1.0;
        d[2][0][-1] = 1.0;
        assert_relative_eq!(find_fwhm_at_max(&img, Axis::Z), 4.0);
        assert_relative_eq!(find_fwhm_at_max(&img, Axis::X), 2.0);
        assert_relative_eq!(find_fwhm_at_max(&img, Axis::Y), 0.5 + 0.5);
    }
}
