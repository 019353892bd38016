//! 笛卡尔网格上的体素图像.

use crate::array::{range3d, Array2d, Array3d, IndexRange3d};
use crate::proj_data::ProjDataInfo;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelRefMutIterator, ParallelIterator};
    }
}

/// 坐标轴.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Axis {
    /// 轴向 (第一维).
    Z,
    /// 第二维.
    Y,
    /// 第三维, 变化最快.
    X,
}

impl Axis {
    /// 按名称 (`x`, `y`, `z`, 大小写不敏感) 解析.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "x" => Some(Self::X),
            "y" => Some(Self::Y),
            "z" => Some(Self::Z),
            _ => None,
        }
    }

    /// 在 `[z, y, x]` 排列中的下标.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::Z => 0,
            Self::Y => 1,
            Self::X => 2,
        }
    }
}

/// 笛卡尔网格上的三维密度图像, 数组索引为 `[z][y][x]`.
///
/// 物理坐标 (毫米) 以各维索引范围的中心为原点.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelsOnCartesianGrid {
    data: Array3d<f32>,
    voxel_size: [f32; 3],
}

impl VoxelsOnCartesianGrid {
    /// 全零图像. `voxel_size` 按 `[z, y, x]` 排列.
    pub fn zeros(range: &IndexRange3d, voxel_size: [f32; 3]) -> Self {
        Self {
            data: Array3d::with_range(range),
            voxel_size,
        }
    }

    /// 以已有数据构造.
    #[inline]
    pub fn from_data(data: Array3d<f32>, voxel_size: [f32; 3]) -> Self {
        Self { data, voxel_size }
    }

    /// 与投影数据匹配的图像.
    ///
    /// 共 `2 * num_rings - 1` 个平面, 层厚为环间距的一半; 横断面大小为
    /// `round(num_tangential_poss * zoom)` (偶数时加一), 索引以 0 为中心,
    /// 像素大小为径向采样间隔除以 `zoom`.
    pub fn from_proj_data_info(info: &ProjDataInfo, zoom: f32) -> Self {
        let num_planes = 2 * info.scanner().num_rings() - 1;
        let mut n = (info.get_num_tangential_poss() as f32 * zoom).round() as i32;
        if n % 2 == 0 {
            n += 1;
        }
        let half = n / 2;
        let vxy = info.get_sampling_in_s() / zoom;
        let vz = info.get_ring_spacing() / 2.0;
        Self::zeros(
            &range3d((0, num_planes - 1), (-half, half), (-half, half)),
            [vz, vxy, vxy],
        )
    }

    /// 同样几何的全零图像.
    pub fn get_empty_copy(&self) -> Self {
        Self::zeros(&self.data.get_index_range(), self.voxel_size)
    }

    /// 数据.
    #[inline]
    pub fn data(&self) -> &Array3d<f32> {
        &self.data
    }

    /// 可变数据.
    #[inline]
    pub fn data_mut(&mut self) -> &mut Array3d<f32> {
        &mut self.data
    }

    /// 取出数据.
    #[inline]
    pub fn into_data(self) -> Array3d<f32> {
        self.data
    }

    /// 体素大小 `[z, y, x]`.
    #[inline]
    pub fn voxel_size(&self) -> [f32; 3] {
        self.voxel_size
    }

    /// 平面个数.
    #[inline]
    pub fn num_planes(&self) -> usize {
        self.data.len()
    }

    /// 规则图像各维的 `(min, max)`, 按 `[z, y, x]` 排列.
    ///
    /// # 注意
    ///
    /// 图像不规则时 panic.
    pub fn bounds(&self) -> [(i32, i32); 3] {
        let Some((mins, maxs)) = self.data.get_regular_range() else {
            panic!("图像的索引范围不规则");
        };
        [(mins[0], maxs[0]), (mins[1], maxs[1]), (mins[2], maxs[2])]
    }

    /// 索引 `i` 沿 `axis` 的物理坐标.
    pub fn coord_mm(&self, axis: Axis, i: i32) -> f32 {
        let (lo, hi) = self.bounds()[axis.index()];
        (i as f32 - (lo + hi) as f32 / 2.0) * self.voxel_size[axis.index()]
    }

    /// 几何 (索引范围与体素大小) 是否相同.
    pub fn has_same_characteristics(&self, other: &Self) -> bool {
        self.voxel_size == other.voxel_size
            && self.data.get_index_range() == other.data.get_index_range()
    }

    /// 所有体素设为 `v`.
    #[inline]
    pub fn fill(&mut self, v: f32) {
        self.data.fill(v);
    }

    /// 所有体素之和.
    #[inline]
    pub fn sum(&self) -> f32 {
        self.data.sum()
    }

    /// 最大值.
    #[inline]
    pub fn find_max(&self) -> f32 {
        self.data.find_max()
    }

    /// 最小值.
    #[inline]
    pub fn find_min(&self) -> f32 {
        self.data.find_min()
    }

    /// 最大值所在的索引 `[z, y, x]`. 有多个时取行优先顺序的第一个.
    pub fn argmax(&self) -> [i32; 3] {
        use ordered_float::OrderedFloat;
        use std::cmp::Reverse;

        self.data
            .indexed_iter()
            .flat_map(|(z, plane)| {
                plane.indexed_iter().flat_map(move |(y, row)| {
                    row.indexed_iter().map(move |(x, &v)| ([z, y, x], v))
                })
            })
            .min_by_key(|&(_, v)| Reverse(OrderedFloat(v)))
            .map_or([0; 3], |(idx, _)| idx)
    }
}

/// 逐平面操作部分
impl VoxelsOnCartesianGrid {
    /// 借助 `rayon`, 并行地对每个平面实施 `op` 操作, 同时携带平面索引.
    #[cfg(feature = "rayon")]
    pub fn for_each_plane_mut<F>(&mut self, op: F)
    where
        F: Fn(i32, &mut Array2d<f32>) + Sync + Send,
    {
        let min = self.data.get_min_index();
        self.data
            .as_rows_mut()
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, plane)| op(min + i as i32, plane));
    }

    /// 依次对每个平面实施 `op` 操作, 同时携带平面索引.
    #[cfg(not(feature = "rayon"))]
    pub fn for_each_plane_mut<F>(&mut self, op: F)
    where
        F: Fn(i32, &mut Array2d<f32>) + Sync + Send,
    {
        let min = self.data.get_min_index();
        self.data
            .as_rows_mut()
            .iter_mut()
            .enumerate()
            .for_each(|(i, plane)| op(min + i as i32, plane));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proj_data::Scanner;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_proj_data_info() {
        let scanner = Scanner::by_name("test").unwrap();
        let info = ProjDataInfo::cylindrical(scanner, 1, 1, 16, 20, true).unwrap();
        let img = VoxelsOnCartesianGrid::from_proj_data_info(&info, 1.0);
        assert_eq!(img.bounds(), [(0, 14), (-10, 10), (-10, 10)]);
        assert_eq!(img.voxel_size(), [2.5, 4.0, 4.0]);
        assert_relative_eq!(img.coord_mm(Axis::Z, 0), -17.5);
        assert_relative_eq!(img.coord_mm(Axis::X, 3), 12.0);
    }

    #[test]
    fn test_argmax_and_copy() {
        let mut img = VoxelsOnCartesianGrid::zeros(&range3d((0, 2), (-1, 1), (-1, 1)), [1.0; 3]);
        img.data_mut()[2][-1][1] = 5.0;
        assert_eq!(img.argmax(), [2, -1, 1]);
        let empty = img.get_empty_copy();
        assert!(empty.has_same_characteristics(&img));
        assert_eq!(empty.sum(), 0.0);
        assert_eq!(Axis::from_name(" Y "), Some(Axis::Y));
        assert_eq!(Axis::from_name("w"), None);
    }

    #[test]
    fn test_for_each_plane_mut() {
        let mut img = VoxelsOnCartesianGrid::zeros(&range3d((2, 4), (0, 1), (0, 1)), [1.0; 3]);
        img.for_each_plane_mut(|z, plane| plane.fill(z as f32));
        assert_eq!(img.data()[3][1][0], 3.0);
        assert_eq!(img.sum(), 4.0 * (2.0 + 3.0 + 4.0));
    }
}
