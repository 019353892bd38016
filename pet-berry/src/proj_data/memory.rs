//! 投影数据的存取接口与内存实现.

use super::info::ProjDataInfo;
use super::related::{related_view_segment_numbers, RelatedViewgrams};
use super::segment::{Segment, SegmentKind};
use super::viewgram::{Sinogram, Viewgram};
use crate::error::{ReconError, ReconResult};
use std::sync::Arc;

/// 按段, 视角, 轴向位置存取投影数据.
///
/// 实现者只需提供视角图与正弦图的读写, 其余操作由默认实现组合得到.
pub trait ProjData {
    /// 几何描述.
    fn info(&self) -> &Arc<ProjDataInfo>;

    /// 读取一个视角图.
    fn get_viewgram(&self, view_num: i32, segment_num: i32) -> ReconResult<Viewgram>;

    /// 写入一个视角图.
    fn set_viewgram(&mut self, v: &Viewgram) -> ReconResult<()>;

    /// 读取一个正弦图.
    fn get_sinogram(&self, axial_pos_num: i32, segment_num: i32) -> ReconResult<Sinogram>;

    /// 写入一个正弦图.
    fn set_sinogram(&mut self, s: &Sinogram) -> ReconResult<()>;

    /// 读取与 `(view, segment)` 对称相关的一组视角图.
    fn get_related_viewgrams(
        &self,
        view_num: i32,
        segment_num: i32,
    ) -> ReconResult<RelatedViewgrams> {
        let viewgrams = related_view_segment_numbers(self.info(), view_num, segment_num)
            .into_iter()
            .map(|(v, s)| self.get_viewgram(v, s))
            .collect::<ReconResult<Vec<_>>>()?;
        Ok(RelatedViewgrams::new(viewgrams))
    }

    /// 写入一组视角图.
    fn set_related_viewgrams(&mut self, r: &RelatedViewgrams) -> ReconResult<()> {
        r.iter().try_for_each(|v| self.set_viewgram(v))
    }

    /// 以视角优先的方式读取整个段.
    fn get_segment_by_view(&self, segment_num: i32) -> ReconResult<Segment> {
        check_segment(self.info(), segment_num)?;
        let mut seg = Segment::zeros(self.info().clone(), segment_num, SegmentKind::ByView);
        for view in 0..self.info().get_num_views() {
            seg.set_viewgram(&self.get_viewgram(view, segment_num)?);
        }
        Ok(seg)
    }

    /// 以正弦图优先的方式读取整个段.
    fn get_segment_by_sinogram(&self, segment_num: i32) -> ReconResult<Segment> {
        check_segment(self.info(), segment_num)?;
        let mut seg = Segment::zeros(self.info().clone(), segment_num, SegmentKind::BySinogram);
        for ax in 0..self.info().get_num_axial_poss(segment_num) {
            seg.set_sinogram(&self.get_sinogram(ax, segment_num)?);
        }
        Ok(seg)
    }

    /// 写入整个段.
    fn set_segment(&mut self, seg: &Segment) -> ReconResult<()> {
        check_segment(self.info(), seg.segment_num())?;
        let num_views = self.info().get_num_views();
        for view in 0..num_views {
            self.set_viewgram(&seg.get_viewgram(view))?;
        }
        Ok(())
    }

    /// 从另一份投影数据复制全部段. 两者几何必须一致.
    fn fill_from(&mut self, other: &dyn ProjData) -> ReconResult<()> {
        if **self.info() != **other.info() {
            return Err(ReconError::GeometryMismatch(
                "复制投影数据时几何描述不一致".to_owned(),
            ));
        }
        let segment_nums = self.info().segment_nums();
        for seg in segment_nums {
            self.set_segment(&other.get_segment_by_view(seg)?)?;
        }
        Ok(())
    }
}

pub(crate) fn check_segment(info: &ProjDataInfo, segment_num: i32) -> ReconResult<()> {
    if info.contains_segment(segment_num) {
        Ok(())
    } else {
        Err(ReconError::GeometryMismatch(format!(
            "段号 {segment_num} 超出 [{}, {}]",
            info.get_min_segment_num(),
            info.get_max_segment_num()
        )))
    }
}

pub(crate) fn check_view_axial(
    info: &ProjDataInfo,
    view_num: i32,
    axial_pos_num: Option<i32>,
    segment_num: i32,
) -> ReconResult<()> {
    check_segment(info, segment_num)?;
    if !(0..info.get_num_views()).contains(&view_num) {
        return Err(ReconError::GeometryMismatch(format!("视角号 {view_num} 越界")));
    }
    if let Some(ax) = axial_pos_num {
        if !(0..info.get_num_axial_poss(segment_num)).contains(&ax) {
            return Err(ReconError::GeometryMismatch(format!("轴向位置号 {ax} 越界")));
        }
    }
    Ok(())
}

/// 全部驻留内存的投影数据. 每个段以视角优先方式存储.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjDataInMemory {
    info: Arc<ProjDataInfo>,
    segments: Vec<Segment>,
}

impl ProjDataInMemory {
    /// 全零的投影数据.
    pub fn zeros(info: Arc<ProjDataInfo>) -> Self {
        let segments = info
            .segment_nums()
            .map(|s| Segment::zeros(info.clone(), s, SegmentKind::ByView))
            .collect();
        Self { info, segments }
    }

    /// 从另一份投影数据复制.
    pub fn from_proj_data(other: &dyn ProjData) -> ReconResult<Self> {
        let mut out = Self::zeros(other.info().clone());
        out.fill_from(other)?;
        Ok(out)
    }

    #[inline]
    fn slot(&self, segment_num: i32) -> usize {
        (segment_num + self.info.get_max_segment_num()) as usize
    }

    /// 直接借用一个段.
    pub fn segment(&self, segment_num: i32) -> ReconResult<&Segment> {
        check_segment(&self.info, segment_num)?;
        Ok(&self.segments[self.slot(segment_num)])
    }

    /// 直接可变借用一个段.
    pub fn segment_mut(&mut self, segment_num: i32) -> ReconResult<&mut Segment> {
        check_segment(&self.info, segment_num)?;
        let slot = self.slot(segment_num);
        Ok(&mut self.segments[slot])
    }

    /// 所有元素设为 `v`.
    pub fn fill(&mut self, v: f32) {
        self.segments.iter_mut().for_each(|s| s.data_mut().fill(v));
    }

    /// 所有元素之和.
    pub fn sum(&self) -> f32 {
        self.segments.iter().map(Segment::sum).sum()
    }

    /// 最大值.
    pub fn find_max(&self) -> f32 {
        self.segments
            .iter()
            .map(Segment::find_max)
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// 最小值.
    pub fn find_min(&self) -> f32 {
        self.segments
            .iter()
            .map(Segment::find_min)
            .fold(f32::INFINITY, f32::min)
    }
}

impl ProjData for ProjDataInMemory {
    #[inline]
    fn info(&self) -> &Arc<ProjDataInfo> {
        &self.info
    }

    fn get_viewgram(&self, view_num: i32, segment_num: i32) -> ReconResult<Viewgram> {
        check_view_axial(&self.info, view_num, None, segment_num)?;
        Ok(self.segments[self.slot(segment_num)].get_viewgram(view_num))
    }

    fn set_viewgram(&mut self, v: &Viewgram) -> ReconResult<()> {
        check_view_axial(&self.info, v.view_num(), None, v.segment_num())?;
        let n = self.info.get_num_axial_poss(v.segment_num());
        if v.get_min_axial_pos_num() != 0 || v.get_max_axial_pos_num() != n - 1 {
            return Err(ReconError::GeometryMismatch(format!(
                "视角图轴向范围 [{}, {}] 与数据 [0, {}] 不一致",
                v.get_min_axial_pos_num(),
                v.get_max_axial_pos_num(),
                n - 1
            )));
        }
        let slot = self.slot(v.segment_num());
        self.segments[slot].set_viewgram(v);
        Ok(())
    }

    fn get_sinogram(&self, axial_pos_num: i32, segment_num: i32) -> ReconResult<Sinogram> {
        check_view_axial(&self.info, 0, Some(axial_pos_num), segment_num)?;
        Ok(self.segments[self.slot(segment_num)].get_sinogram(axial_pos_num))
    }

    fn set_sinogram(&mut self, s: &Sinogram) -> ReconResult<()> {
        check_view_axial(&self.info, 0, Some(s.axial_pos_num()), s.segment_num())?;
        let slot = self.slot(s.segment_num());
        self.segments[slot].set_sinogram(s);
        Ok(())
    }

    fn get_segment_by_view(&self, segment_num: i32) -> ReconResult<Segment> {
        Ok(self.segment(segment_num)?.clone())
    }

    fn set_segment(&mut self, seg: &Segment) -> ReconResult<()> {
        if **seg.info() != *self.info {
            return Err(ReconError::GeometryMismatch("段的几何描述不一致".to_owned()));
        }
        *self.segment_mut(seg.segment_num())? = seg.to_kind(SegmentKind::ByView);
        Ok(())
    }
}
