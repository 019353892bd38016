//! 段: 同一组环差的全部投影数据.

use super::info::ProjDataInfo;
use super::viewgram::{Sinogram, Viewgram};
use crate::array::{range2d, range3d, Array2d, Array3d};
use std::fmt::Write;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 段数据的存储方式.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SegmentKind {
    /// 索引为 `[axial][view][tangential]`.
    BySinogram,
    /// 索引为 `[view][axial][tangential]`.
    ByView,
}

/// 一个段的全部投影数据.
///
/// # 比较语义
///
/// [`Segment::has_same_characteristics`] 只比较元数据 (存储方式, 几何, 段号,
/// 飞行时间位置号), 而 `==` 在元数据一致的前提下还要求全部数据相等.
/// 两者有意保持不同: 前者用于判断两个段能否相互运算, 后者用于判断内容是否相同.
#[derive(Clone, Debug)]
pub struct Segment {
    kind: SegmentKind,
    info: Arc<ProjDataInfo>,
    segment_num: i32,
    timing_pos_num: i32,
    data: Array3d<f32>,
}

impl Segment {
    /// 全零的段.
    pub fn zeros(info: Arc<ProjDataInfo>, segment_num: i32, kind: SegmentKind) -> Self {
        let ax = (0, info.get_max_axial_pos_num(segment_num));
        let view = (0, info.get_max_view_num());
        let tang = (info.get_min_tangential_pos_num(), info.get_max_tangential_pos_num());
        let range = match kind {
            SegmentKind::BySinogram => range3d(ax, view, tang),
            SegmentKind::ByView => range3d(view, ax, tang),
        };
        Self {
            kind,
            segment_num,
            timing_pos_num: 0,
            data: Array3d::with_range(&range),
            info,
        }
    }

    /// 存储方式.
    #[inline]
    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    /// 几何描述.
    #[inline]
    pub fn info(&self) -> &Arc<ProjDataInfo> {
        &self.info
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

    /// 原始数据, 索引顺序取决于 [`Self::kind`].
    #[inline]
    pub fn data(&self) -> &Array3d<f32> {
        &self.data
    }

    /// 可变原始数据.
    #[inline]
    pub fn data_mut(&mut self) -> &mut Array3d<f32> {
        &mut self.data
    }

    /// 轴向位置个数.
    #[inline]
    pub fn get_num_axial_poss(&self) -> i32 {
        self.info.get_num_axial_poss(self.segment_num)
    }

    /// 视角个数.
    #[inline]
    pub fn get_num_views(&self) -> i32 {
        self.info.get_num_views()
    }

    /// 读取单个 bin.
    #[inline]
    pub fn bin(&self, view: i32, axial: i32, tangential: i32) -> f32 {
        match self.kind {
            SegmentKind::BySinogram => self.data[axial][view][tangential],
            SegmentKind::ByView => self.data[view][axial][tangential],
        }
    }

    /// 可变的单个 bin.
    #[inline]
    pub fn bin_mut(&mut self, view: i32, axial: i32, tangential: i32) -> &mut f32 {
        match self.kind {
            SegmentKind::BySinogram => &mut self.data[axial][view][tangential],
            SegmentKind::ByView => &mut self.data[view][axial][tangential],
        }
    }

    /// 取出一个视角图.
    pub fn get_viewgram(&self, view_num: i32) -> Viewgram {
        let data = match self.kind {
            SegmentKind::ByView => self.data[view_num].clone(),
            SegmentKind::BySinogram => {
                let mut out = Array2d::with_range(&range2d(
                    (self.data.get_min_index(), self.data.get_max_index()),
                    (
                        self.info.get_min_tangential_pos_num(),
                        self.info.get_max_tangential_pos_num(),
                    ),
                ));
                for (ax, row) in out.indexed_iter_mut() {
                    *row = self.data[ax][view_num].clone();
                }
                out
            }
        };
        Viewgram::from_data(self.info.clone(), view_num, self.segment_num, data)
    }

    /// 写入一个视角图. 视角图的轴向范围必须与段一致.
    pub fn set_viewgram(&mut self, v: &Viewgram) {
        debug_assert_eq!(v.segment_num(), self.segment_num);
        let view_num = v.view_num();
        match self.kind {
            SegmentKind::ByView => self.data[view_num] = v.data().clone(),
            SegmentKind::BySinogram => {
                for (ax, row) in v.data().indexed_iter() {
                    self.data[ax][view_num] = row.clone();
                }
            }
        }
    }

    /// 取出一个正弦图.
    pub fn get_sinogram(&self, axial_pos_num: i32) -> Sinogram {
        let data = match self.kind {
            SegmentKind::BySinogram => self.data[axial_pos_num].clone(),
            SegmentKind::ByView => {
                let mut out = Array2d::with_range(&range2d(
                    (0, self.info.get_max_view_num()),
                    (
                        self.info.get_min_tangential_pos_num(),
                        self.info.get_max_tangential_pos_num(),
                    ),
                ));
                for (view, row) in out.indexed_iter_mut() {
                    *row = self.data[view][axial_pos_num].clone();
                }
                out
            }
        };
        Sinogram::from_data(self.info.clone(), axial_pos_num, self.segment_num, data)
    }

    /// 写入一个正弦图.
    pub fn set_sinogram(&mut self, s: &Sinogram) {
        debug_assert_eq!(s.segment_num(), self.segment_num);
        let ax = s.axial_pos_num();
        match self.kind {
            SegmentKind::BySinogram => self.data[ax] = s.data().clone(),
            SegmentKind::ByView => {
                for (view, row) in s.data().indexed_iter() {
                    self.data[view][ax] = row.clone();
                }
            }
        }
    }

    /// 转换为另一种存储方式.
    pub fn to_kind(&self, kind: SegmentKind) -> Segment {
        if kind == self.kind {
            return self.clone();
        }
        let mut out = Segment::zeros(self.info.clone(), self.segment_num, kind);
        out.timing_pos_num = self.timing_pos_num;
        for view in 0..self.get_num_views() {
            out.set_viewgram(&self.get_viewgram(view));
        }
        out
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

    /// 所有元素之和.
    #[inline]
    pub fn sum(&self) -> f32 {
        self.data.sum()
    }

    /// 逐项比较元数据: 存储方式, 几何, 段号, 飞行时间位置号.
    ///
    /// 第一个不一致的项会被写入 `explanation` 并返回 `false`.
    pub fn has_same_characteristics_explained(
        &self,
        other: &Segment,
        explanation: &mut String,
    ) -> bool {
        if self.kind != other.kind {
            let _ = write!(
                explanation,
                "Differing segment storage: {:?} vs {:?}",
                self.kind, other.kind
            );
            return false;
        }
        if *self.info != *other.info {
            let _ = write!(
                explanation,
                "Differing projection data info:\n{}\n-------- vs -------\n{}",
                self.info.parameter_info(),
                other.info.parameter_info()
            );
            return false;
        }
        if self.segment_num != other.segment_num {
            let _ = write!(
                explanation,
                "Differing segment number: {} vs {}",
                self.segment_num, other.segment_num
            );
            return false;
        }
        if self.timing_pos_num != other.timing_pos_num {
            let _ = write!(
                explanation,
                "Differing timing position index: {} vs {}",
                self.timing_pos_num, other.timing_pos_num
            );
            return false;
        }
        true
    }

    /// 同 [`Self::has_same_characteristics_explained`], 丢弃说明.
    #[inline]
    pub fn has_same_characteristics(&self, other: &Segment) -> bool {
        let mut ignored = String::new();
        self.has_same_characteristics_explained(other, &mut ignored)
    }
}

impl PartialEq for Segment {
    /// 元数据一致并且全部数据相等. `!=` 即其取反.
    fn eq(&self, other: &Self) -> bool {
        self.has_same_characteristics(other) && self.data == other.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proj_data::Scanner;

    fn info() -> Arc<ProjDataInfo> {
        let scanner = Scanner::by_name("test").unwrap();
        Arc::new(ProjDataInfo::cylindrical(scanner, 1, 2, 8, 5, true).unwrap())
    }

    fn filled(kind: SegmentKind, seg: i32) -> Segment {
        let mut s = Segment::zeros(info(), seg, kind);
        for view in 0..8 {
            for ax in 0..s.get_num_axial_poss() {
                for t in -2..=2 {
                    *s.bin_mut(view, ax, t) = (view * 100 + ax * 10 + t) as f32;
                }
            }
        }
        s
    }

    #[test]
    fn test_differs_only_in_segment_num() {
        let a = Segment::zeros(info(), 1, SegmentKind::ByView);
        let b = Segment::zeros(info(), -1, SegmentKind::ByView);
        let mut why = String::new();
        assert!(!a.has_same_characteristics_explained(&b, &mut why));
        assert!(!why.is_empty());
        assert!(why.contains("segment number"));
    }

    #[test]
    fn test_same_characteristics_ignores_values() {
        let a = filled(SegmentKind::BySinogram, 0);
        let b = Segment::zeros(info(), 0, SegmentKind::BySinogram);
        let mut why = String::new();
        assert!(a.has_same_characteristics_explained(&b, &mut why));
        assert!(why.is_empty());
        assert!(a != b);
        assert!(a == a.clone());
    }

    #[test]
    fn test_kind_mismatch_explained() {
        let a = Segment::zeros(info(), 0, SegmentKind::BySinogram);
        let b = Segment::zeros(info(), 0, SegmentKind::ByView);
        let mut why = String::new();
        assert!(!a.has_same_characteristics_explained(&b, &mut why));
        assert!(why.contains("storage"));
    }

    #[test]
    fn test_viewgram_sinogram_consistent_across_kinds() {
        let a = filled(SegmentKind::BySinogram, 1);
        let b = a.to_kind(SegmentKind::ByView);
        assert_eq!(b.kind(), SegmentKind::ByView);
        assert_eq!(a.get_viewgram(3), b.get_viewgram(3));
        assert_eq!(a.get_sinogram(4), b.get_sinogram(4));
        assert_eq!(a.get_viewgram(3).data()[2][-1], 300.0 + 20.0 - 1.0);
        assert_eq!(b.to_kind(SegmentKind::BySinogram), a);
    }

    #[test]
    fn test_set_viewgram() {
        let mut s = Segment::zeros(info(), 0, SegmentKind::BySinogram);
        let mut v = s.get_viewgram(5);
        v.fill(1.5);
        s.set_viewgram(&v);
        assert_eq!(s.sum(), 1.5 * 8.0 * 5.0);
        assert_eq!(s.bin(5, 7, 2), 1.5);
        assert_eq!(s.bin(4, 7, 2), 0.0);
    }
}
