//! 由扫描仪对称性关联起来的一组视角图.

use super::info::ProjDataInfo;
use super::viewgram::Viewgram;
use itertools::Itertools;
use std::sync::Arc;

/// 与 `(view, segment)` 对称相关的全部 `(view, segment)` 组合.
///
/// 视角取 `{v, N/2 - v, N/2 + v, N - v}` 中落在 `[0, N - 1]` 内的部分,
/// 段号取 `{seg, -seg}`, 均去重. 当 `v` 取遍 `[0, N/4]` 且 `seg` 取遍 `[0, S]` 时,
/// 每个 `(view, segment)` 恰好出现一次. 要求视角数 `N` 为偶数.
///
/// 结果中的组合数总是偶数.
pub fn related_view_segment_numbers(
    info: &ProjDataInfo,
    view_num: i32,
    segment_num: i32,
) -> Vec<(i32, i32)> {
    let n = info.get_num_views();
    let views = [view_num, n / 2 - view_num, n / 2 + view_num, n - view_num]
        .into_iter()
        .filter(|v| (0..n).contains(v))
        .unique()
        .collect::<Vec<_>>();
    let segments = [segment_num, -segment_num].into_iter().unique().collect::<Vec<_>>();
    segments
        .into_iter()
        .cartesian_product(views)
        .map(|(s, v)| (v, s))
        .collect()
}

/// 一组对称相关的视角图, 作为整体扩展, 投影, 滤波和反投影.
#[derive(Clone, Debug, PartialEq)]
pub struct RelatedViewgrams {
    basic_view_num: i32,
    basic_segment_num: i32,
    viewgrams: Vec<Viewgram>,
}

impl RelatedViewgrams {
    /// 由已取出的视角图构造. 第一个视角图的编号即基本编号.
    ///
    /// # 注意
    ///
    /// `viewgrams` 为空时 panic.
    pub fn new(viewgrams: Vec<Viewgram>) -> Self {
        let Some(first) = viewgrams.first() else {
            panic!("RelatedViewgrams 不能为空");
        };
        Self {
            basic_view_num: first.view_num(),
            basic_segment_num: first.segment_num(),
            viewgrams,
        }
    }

    /// 与 `(view, segment)` 对称相关的全零视角图.
    pub fn zeros(info: Arc<ProjDataInfo>, view_num: i32, segment_num: i32) -> Self {
        let viewgrams = related_view_segment_numbers(&info, view_num, segment_num)
            .into_iter()
            .map(|(v, s)| Viewgram::zeros(info.clone(), v, s))
            .collect();
        Self::new(viewgrams)
    }

    /// 基本视角号.
    #[inline]
    pub fn get_basic_view_num(&self) -> i32 {
        self.basic_view_num
    }

    /// 基本段号.
    #[inline]
    pub fn get_basic_segment_num(&self) -> i32 {
        self.basic_segment_num
    }

    /// 几何描述.
    #[inline]
    pub fn info(&self) -> &Arc<ProjDataInfo> {
        self.viewgrams[0].info()
    }

    /// 视角图个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.viewgrams.len()
    }

    /// 总是 `false`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.viewgrams.is_empty()
    }

    /// 遍历视角图.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Viewgram> {
        self.viewgrams.iter()
    }

    /// 可变地遍历视角图.
    #[inline]
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Viewgram> {
        self.viewgrams.iter_mut()
    }

    /// 成对地可变遍历. Colsher 滤波一次处理两个视角图.
    ///
    /// # 注意
    ///
    /// 视角图个数为奇数时 panic.
    pub fn pairs_mut(&mut self) -> std::slice::ChunksExactMut<'_, Viewgram> {
        assert!(
            self.viewgrams.len() % 2 == 0,
            "成对处理要求视角图个数为偶数, 实际为 {}",
            self.viewgrams.len()
        );
        self.viewgrams.chunks_exact_mut(2)
    }

    /// 当前最小轴向位置号.
    #[inline]
    pub fn get_min_axial_pos_num(&self) -> i32 {
        self.viewgrams[0].get_min_axial_pos_num()
    }

    /// 当前最大轴向位置号.
    #[inline]
    pub fn get_max_axial_pos_num(&self) -> i32 {
        self.viewgrams[0].get_max_axial_pos_num()
    }

    /// 把每个视角图的轴向范围扩展为 `[min, max]`, 新的位置为 0.
    pub fn grow_axial(&mut self, min: i32, max: i32) {
        self.viewgrams.iter_mut().for_each(|v| v.grow_axial(min, max));
    }

    /// 所有元素设为 `v`.
    pub fn fill(&mut self, v: f32) {
        self.viewgrams.iter_mut().for_each(|g| g.fill(v));
    }

    /// 最大值.
    pub fn find_max(&self) -> f32 {
        self.viewgrams
            .iter()
            .map(|v| v.data().find_max())
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// 最小值.
    pub fn find_min(&self) -> f32 {
        self.viewgrams
            .iter()
            .map(|v| v.data().find_min())
            .fold(f32::INFINITY, f32::min)
    }

    /// 所有元素之和.
    pub fn sum(&self) -> f32 {
        self.viewgrams.iter().map(|v| v.data().sum()).sum()
    }

    /// 取出全部视角图.
    #[inline]
    pub fn into_viewgrams(self) -> Vec<Viewgram> {
        self.viewgrams
    }
}

impl std::ops::MulAssign<f32> for RelatedViewgrams {
    fn mul_assign(&mut self, rhs: f32) {
        self.viewgrams.iter_mut().for_each(|v| *v.data_mut() *= rhs);
    }
}

impl std::ops::DivAssign<f32> for RelatedViewgrams {
    fn div_assign(&mut self, rhs: f32) {
        self.viewgrams.iter_mut().for_each(|v| *v.data_mut() /= rhs);
    }
}

impl<'a> IntoIterator for &'a RelatedViewgrams {
    type Item = &'a Viewgram;
    type IntoIter = std::slice::Iter<'a, Viewgram>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
