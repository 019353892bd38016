//! 视角图 (固定视角) 与正弦图 (固定轴向位置).

use super::info::ProjDataInfo;
use crate::array::{range2d, Array2d};
use std::sync::Arc;

/// 一个视角下的投影数据, 数组索引为 `[axial][tangential]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewgram {
    info: Arc<ProjDataInfo>,
    view_num: i32,
    segment_num: i32,
    timing_pos_num: i32,
    data: Array2d<f32>,
}

impl Viewgram {
    /// 全零的视角图, 范围取自 `info`.
    pub fn zeros(info: Arc<ProjDataInfo>, view_num: i32, segment_num: i32) -> Self {
        let range = range2d(
            (0, info.get_max_axial_pos_num(segment_num)),
            (info.get_min_tangential_pos_num(), info.get_max_tangential_pos_num()),
        );
        Self {
            view_num,
            segment_num,
            timing_pos_num: 0,
            data: Array2d::with_range(&range),
            info,
        }
    }

    /// 以已有数据构造.
    pub fn from_data(
        info: Arc<ProjDataInfo>,
        view_num: i32,
        segment_num: i32,
        data: Array2d<f32>,
    ) -> Self {
        Self {
            info,
            view_num,
            segment_num,
            timing_pos_num: 0,
            data,
        }
    }

    /// 几何描述.
    #[inline]
    pub fn info(&self) -> &Arc<ProjDataInfo> {
        &self.info
    }

    /// 视角号.
    #[inline]
    pub fn view_num(&self) -> i32 {
        self.view_num
    }

    /// 段号.
    #[inline]
    pub fn segment_num(&self) -> i32 {
        self.segment_num
    }

    /// 飞行时间位置号.
    #[inline]
    pub fn timing_pos_num(&self) -> i32 {
        self.timing_pos_num
    }

    /// 数据.
    #[inline]
    pub fn data(&self) -> &Array2d<f32> {
        &self.data
    }

    /// 可变数据.
    #[inline]
    pub fn data_mut(&mut self) -> &mut Array2d<f32> {
        &mut self.data
    }

    /// 取出数据.
    #[inline]
    pub fn into_data(self) -> Array2d<f32> {
        self.data
    }

    /// 当前最小轴向位置号. 可能因 [`Self::grow_axial`] 而小于 0.
    #[inline]
    pub fn get_min_axial_pos_num(&self) -> i32 {
        self.data.get_min_index()
    }

    /// 当前最大轴向位置号.
    #[inline]
    pub fn get_max_axial_pos_num(&self) -> i32 {
        self.data.get_max_index()
    }

    /// 最小径向位置号.
    #[inline]
    pub fn get_min_tangential_pos_num(&self) -> i32 {
        self.info.get_min_tangential_pos_num()
    }

    /// 最大径向位置号.
    #[inline]
    pub fn get_max_tangential_pos_num(&self) -> i32 {
        self.info.get_max_tangential_pos_num()
    }

    /// 把轴向范围扩展为 `[min, max]`, 新的位置为 0, 径向范围不变.
    pub fn grow_axial(&mut self, min: i32, max: i32) {
        let range = range2d(
            (min, max),
            (self.get_min_tangential_pos_num(), self.get_max_tangential_pos_num()),
        );
        self.data.grow(&range);
    }

    /// 所有元素设为 `v`.
    #[inline]
    pub fn fill(&mut self, v: f32) {
        self.data.fill(v);
    }

    /// 几何信息 (视角号除外) 是否一致.
    pub fn has_same_characteristics(&self, other: &Viewgram) -> bool {
        *self.info == *other.info
            && self.segment_num == other.segment_num
            && self.timing_pos_num == other.timing_pos_num
    }
}

/// 一个轴向位置上的投影数据, 数组索引为 `[view][tangential]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Sinogram {
    info: Arc<ProjDataInfo>,
    axial_pos_num: i32,
    segment_num: i32,
    timing_pos_num: i32,
    data: Array2d<f32>,
}

impl Sinogram {
    /// 全零的正弦图, 范围取自 `info`.
    pub fn zeros(info: Arc<ProjDataInfo>, axial_pos_num: i32, segment_num: i32) -> Self {
        let range = range2d(
            (0, info.get_max_view_num()),
            (info.get_min_tangential_pos_num(), info.get_max_tangential_pos_num()),
        );
        Self {
            axial_pos_num,
            segment_num,
            timing_pos_num: 0,
            data: Array2d::with_range(&range),
            info,
        }
    }

    /// 以已有数据构造.
    pub fn from_data(
        info: Arc<ProjDataInfo>,
        axial_pos_num: i32,
        segment_num: i32,
        data: Array2d<f32>,
    ) -> Self {
        Self {
            info,
            axial_pos_num,
            segment_num,
            timing_pos_num: 0,
            data,
        }
    }

    /// 几何描述.
    #[inline]
    pub fn info(&self) -> &Arc<ProjDataInfo> {
        &self.info
    }

    /// 轴向位置号.
    #[inline]
    pub fn axial_pos_num(&self) -> i32 {
        self.axial_pos_num
    }

    /// 段号.
    #[inline]
    pub fn segment_num(&self) -> i32 {
        self.segment_num
    }

    /// 飞行时间位置号.
    #[inline]
    pub fn timing_pos_num(&self) -> i32 {
        self.timing_pos_num
    }

    /// 数据.
    #[inline]
    pub fn data(&self) -> &Array2d<f32> {
        &self.data
    }

    /// 可变数据.
    #[inline]
    pub fn data_mut(&mut self) -> &mut Array2d<f32> {
        &mut self.data
    }

    /// 取出数据.
    #[inline]
    pub fn into_data(self) -> Array2d<f32> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proj_data::Scanner;

    fn info() -> Arc<ProjDataInfo> {
        let scanner = Scanner::by_name("test").unwrap();
        Arc::new(ProjDataInfo::cylindrical(scanner, 1, 2, 16, 9, true).unwrap())
    }

    #[test]
    fn test_viewgram_ranges() {
        let v = Viewgram::zeros(info(), 3, -1);
        assert_eq!(v.get_min_axial_pos_num(), 0);
        assert_eq!(v.get_max_axial_pos_num(), 6);
        assert_eq!(v.data()[0].get_min_index(), -4);
        assert_eq!(v.data()[0].get_max_index(), 4);
    }

    #[test]
    fn test_grow_axial_zero_fills() {
        let mut v = Viewgram::zeros(info(), 0, 0);
        v.fill(2.0);
        v.grow_axial(-2, 9);
        assert_eq!(v.get_min_axial_pos_num(), -2);
        assert_eq!(v.get_max_axial_pos_num(), 9);
        assert_eq!(v.data()[-1][0], 0.0);
        assert_eq!(v.data()[3][0], 2.0);
        assert_eq!(v.data().sum(), 2.0 * 8.0 * 9.0);
    }

    #[test]
    fn test_sinogram_ranges() {
        let s = Sinogram::zeros(info(), 2, 1);
        assert_eq!(s.data().len(), 16);
        assert_eq!(s.data().size_all(), 16 * 9);
    }
}
