//! 投影数据的几何描述.
//!
//! 索引约定:
//!
//! - 段号 (segment) 对称地取 `[-S, S]`, 0 号段为直接平面;
//! - 视角 (view) 取 `[0, num_views - 1]`, 对应角度 `phi = view * pi / num_views`;
//! - 轴向位置 (axial) 取 `[0, num_axial_poss(seg) - 1]`;
//! - 径向位置 (tangential) 取 `[-(n / 2), -(n / 2) + n - 1]`.

use super::scanner::Scanner;
use crate::error::{ReconError, ReconResult};
use std::f32::consts::PI;
use std::fmt::Write;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 投影数据种类. 决定径向坐标 `s` 与径向索引之间的关系.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ProjDataKind {
    /// 圆柱形扫描仪, 经过弧校正: 径向等间隔采样, 间隔为 `bin_size`.
    CylindricalArcCorr {
        /// 径向采样间隔.
        bin_size: f32,
    },

    /// 圆柱形扫描仪, 未经弧校正: 径向索引直接对应探测器对.
    CylindricalNoArcCorr,
}

impl ProjDataKind {
    /// 名称, 用于日志.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CylindricalArcCorr { .. } => "Cylindrical arc-corrected",
            Self::CylindricalNoArcCorr => "Cylindrical not arc-corrected",
        }
    }
}

/// 单个段的环差范围和轴向位置个数.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SegmentGeometry {
    /// 最小环差.
    pub min_ring_diff: i32,
    /// 最大环差.
    pub max_ring_diff: i32,
    /// 轴向位置个数.
    pub num_axial_poss: i32,
}

impl SegmentGeometry {
    /// 环差绝对值的最小值.
    #[inline]
    pub fn min_abs_ring_diff(&self) -> i32 {
        if self.min_ring_diff <= 0 && self.max_ring_diff >= 0 {
            0
        } else {
            self.min_ring_diff.abs().min(self.max_ring_diff.abs())
        }
    }

    /// 该段是否由多个环差合并而成.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.min_ring_diff != self.max_ring_diff
    }
}

/// 投影数据的完整几何描述, 被所有投影数据对象以 `Arc` 共享.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ProjDataInfo {
    scanner: Scanner,
    kind: ProjDataKind,
    num_views: i32,
    num_tangential_poss: i32,
    max_segment_num: i32,
    segments: Vec<SegmentGeometry>,
}

/// 按 `span` 和最大环差生成段表, 段号从 `-S` 到 `S` 依次排列.
pub fn segment_table(
    num_rings: i32,
    span: i32,
    max_ring_diff: i32,
) -> ReconResult<Vec<SegmentGeometry>> {
    if span < 1 || span % 2 == 0 {
        return Err(ReconError::InvalidParameter(format!(
            "span 必须是正奇数, 实际为 {span}"
        )));
    }
    if max_ring_diff < 0 || max_ring_diff >= num_rings {
        return Err(ReconError::InvalidParameter(format!(
            "最大环差 {max_ring_diff} 超出 [0, {}]",
            num_rings - 1
        )));
    }
    let geom = |lo: i32, hi: i32| {
        let g = SegmentGeometry {
            min_ring_diff: lo,
            max_ring_diff: hi,
            num_axial_poss: 0,
        };
        let num_axial_poss = if g.is_compressed() {
            2 * num_rings - 1 - 2 * g.min_abs_ring_diff()
        } else {
            num_rings - lo.abs()
        };
        SegmentGeometry { num_axial_poss, ..g }
    };

    let half = (span - 1) / 2;
    let mut positive = Vec::new();
    let mut k = 1;
    loop {
        let lo = if span == 1 { k } else { k * span - half };
        if lo > max_ring_diff {
            break;
        }
        let hi = (lo + span - 1).min(max_ring_diff);
        positive.push((lo, hi));
        k += 1;
    }
    let zero_half = half.min(max_ring_diff);

    let mut table: Vec<_> = positive.iter().rev().map(|&(lo, hi)| geom(-hi, -lo)).collect();
    table.push(geom(-zero_half, zero_half));
    table.extend(positive.iter().map(|&(lo, hi)| geom(lo, hi)));
    Ok(table)
}

impl ProjDataInfo {
    /// 按 `span` 和最大环差构建圆柱形扫描仪的投影数据描述.
    ///
    /// 弧校正时使用扫描仪的默认径向采样间隔.
    pub fn cylindrical(
        scanner: Scanner,
        span: i32,
        max_ring_diff: i32,
        num_views: i32,
        num_tangential_poss: i32,
        arc_corrected: bool,
    ) -> ReconResult<Self> {
        let segments = segment_table(scanner.num_rings(), span, max_ring_diff)?;
        let kind = if arc_corrected {
            ProjDataKind::CylindricalArcCorr {
                bin_size: scanner.default_bin_size(),
            }
        } else {
            ProjDataKind::CylindricalNoArcCorr
        };
        Self::from_segments(scanner, kind, num_views, num_tangential_poss, segments)
    }

    /// 由显式段表构建. 段表长度必须为奇数, 中间一项为 0 号段.
    pub fn from_segments(
        scanner: Scanner,
        kind: ProjDataKind,
        num_views: i32,
        num_tangential_poss: i32,
        segments: Vec<SegmentGeometry>,
    ) -> ReconResult<Self> {
        if num_views <= 0 || num_tangential_poss <= 0 {
            return Err(ReconError::InvalidParameter(format!(
                "视角数 {num_views} 与径向位置数 {num_tangential_poss} 必须为正"
            )));
        }
        if segments.len() % 2 == 0 {
            return Err(ReconError::InvalidParameter("段表长度必须为奇数".to_owned()));
        }
        if let Some(bad) = segments
            .iter()
            .find(|g| g.num_axial_poss <= 0 || g.min_ring_diff > g.max_ring_diff)
        {
            return Err(ReconError::InvalidParameter(format!("非法的段几何: {bad:?}")));
        }
        Ok(Self {
            scanner,
            kind,
            num_views,
            num_tangential_poss,
            max_segment_num: (segments.len() / 2) as i32,
            segments,
        })
    }

    /// 只保留 `[-max_segment_num, max_segment_num]` 内的段.
    pub fn with_max_segment_num(&self, max_segment_num: i32) -> ReconResult<Self> {
        if max_segment_num < 0 || max_segment_num > self.max_segment_num {
            return Err(ReconError::InvalidParameter(format!(
                "最大段号 {max_segment_num} 超出 [0, {}]",
                self.max_segment_num
            )));
        }
        let skip = (self.max_segment_num - max_segment_num) as usize;
        let segments = self.segments[skip..self.segments.len() - skip].to_vec();
        Ok(Self {
            max_segment_num,
            segments,
            ..self.clone()
        })
    }

    /// 修改径向位置个数.
    pub fn with_num_tangential_poss(&self, num_tangential_poss: i32) -> Self {
        Self {
            num_tangential_poss,
            ..self.clone()
        }
    }

    /// 扫描仪.
    #[inline]
    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// 投影数据种类.
    #[inline]
    pub fn kind(&self) -> ProjDataKind {
        self.kind
    }

    /// 是否经过弧校正.
    #[inline]
    pub fn is_arc_corrected(&self) -> bool {
        matches!(self.kind, ProjDataKind::CylindricalArcCorr { .. })
    }

    /// 段的几何. 段号越界时 panic.
    #[inline]
    pub fn segment(&self, segment_num: i32) -> &SegmentGeometry {
        debug_assert!(self.contains_segment(segment_num), "段号 {segment_num} 越界");
        &self.segments[(segment_num + self.max_segment_num) as usize]
    }

    /// 段号是否存在.
    #[inline]
    pub fn contains_segment(&self, segment_num: i32) -> bool {
        segment_num.abs() <= self.max_segment_num
    }

    /// 最小段号.
    #[inline]
    pub fn get_min_segment_num(&self) -> i32 {
        -self.max_segment_num
    }

    /// 最大段号.
    #[inline]
    pub fn get_max_segment_num(&self) -> i32 {
        self.max_segment_num
    }

    /// 段的个数.
    #[inline]
    pub fn get_num_segments(&self) -> i32 {
        2 * self.max_segment_num + 1
    }

    /// 段号序列 `[-S, S]`.
    #[inline]
    pub fn segment_nums(&self) -> std::ops::RangeInclusive<i32> {
        -self.max_segment_num..=self.max_segment_num
    }

    /// 最小环差.
    #[inline]
    pub fn get_min_ring_difference(&self, segment_num: i32) -> i32 {
        self.segment(segment_num).min_ring_diff
    }

    /// 最大环差.
    #[inline]
    pub fn get_max_ring_difference(&self, segment_num: i32) -> i32 {
        self.segment(segment_num).max_ring_diff
    }

    /// 平均环差.
    #[inline]
    pub fn get_average_ring_difference(&self, segment_num: i32) -> f32 {
        let g = self.segment(segment_num);
        (g.min_ring_diff + g.max_ring_diff) as f32 / 2.0
    }

    /// 轴向位置个数.
    #[inline]
    pub fn get_num_axial_poss(&self, segment_num: i32) -> i32 {
        self.segment(segment_num).num_axial_poss
    }

    /// 最小轴向位置号, 总是 0.
    #[inline]
    pub fn get_min_axial_pos_num(&self, _segment_num: i32) -> i32 {
        0
    }

    /// 最大轴向位置号.
    #[inline]
    pub fn get_max_axial_pos_num(&self, segment_num: i32) -> i32 {
        self.get_num_axial_poss(segment_num) - 1
    }

    /// 每跨过一个物理环, 轴向位置号增加多少. 合并多个环差的段为 2, 否则为 1.
    #[inline]
    pub fn get_num_axial_poss_per_ring_inc(&self, segment_num: i32) -> i32 {
        if self.segment(segment_num).is_compressed() {
            2
        } else {
            1
        }
    }

    /// 视角个数.
    #[inline]
    pub fn get_num_views(&self) -> i32 {
        self.num_views
    }

    /// 最小视角号.
    #[inline]
    pub fn get_min_view_num(&self) -> i32 {
        0
    }

    /// 最大视角号.
    #[inline]
    pub fn get_max_view_num(&self) -> i32 {
        self.num_views - 1
    }

    /// 径向位置个数.
    #[inline]
    pub fn get_num_tangential_poss(&self) -> i32 {
        self.num_tangential_poss
    }

    /// 最小径向位置号.
    #[inline]
    pub fn get_min_tangential_pos_num(&self) -> i32 {
        -(self.num_tangential_poss / 2)
    }

    /// 最大径向位置号.
    #[inline]
    pub fn get_max_tangential_pos_num(&self) -> i32 {
        self.get_min_tangential_pos_num() + self.num_tangential_poss - 1
    }

    /// 飞行时间位置个数. 目前总是 1.
    #[inline]
    pub fn get_num_timing_poss(&self) -> i32 {
        1
    }

    /// 环半径.
    #[inline]
    pub fn get_ring_radius(&self) -> f32 {
        self.scanner.ring_radius()
    }

    /// 环间距.
    #[inline]
    pub fn get_ring_spacing(&self) -> f32 {
        self.scanner.ring_spacing()
    }

    /// 段的轴向采样间隔. 合并多个环差的段为环间距的一半.
    #[inline]
    pub fn get_sampling_in_m(&self, segment_num: i32) -> f32 {
        self.get_ring_spacing() / self.get_num_axial_poss_per_ring_inc(segment_num) as f32
    }

    /// 中心处的径向采样间隔.
    #[inline]
    pub fn get_sampling_in_s(&self) -> f32 {
        match self.kind {
            ProjDataKind::CylindricalArcCorr { bin_size } => bin_size,
            ProjDataKind::CylindricalNoArcCorr => {
                self.get_ring_radius() * PI / self.scanner.num_detectors_per_ring() as f32
            }
        }
    }

    /// 段的倾斜角正切.
    #[inline]
    pub fn get_tantheta(&self, segment_num: i32) -> f32 {
        self.get_average_ring_difference(segment_num) * self.get_ring_spacing()
            / (2.0 * self.get_ring_radius())
    }

    /// 段的倾斜角余弦.
    #[inline]
    pub fn get_costheta(&self, segment_num: i32) -> f32 {
        1.0 / (1.0 + self.get_tantheta(segment_num).powi(2)).sqrt()
    }

    /// 轴向坐标 `m`: 响应线中点到扫描仪轴向中心的距离.
    #[inline]
    pub fn get_m(&self, segment_num: i32, axial_pos_num: i32) -> f32 {
        let n = self.get_num_axial_poss(segment_num);
        (axial_pos_num as f32 - (n - 1) as f32 / 2.0) * self.get_sampling_in_m(segment_num)
    }

    /// [`Self::get_m`] 的逆映射, 结果为连续值.
    #[inline]
    pub fn get_axial_pos_for_m(&self, segment_num: i32, m: f32) -> f32 {
        let n = self.get_num_axial_poss(segment_num);
        m / self.get_sampling_in_m(segment_num) + (n - 1) as f32 / 2.0
    }

    /// 径向坐标 `s`.
    #[inline]
    pub fn get_s(&self, tangential_pos_num: i32) -> f32 {
        match self.kind {
            ProjDataKind::CylindricalArcCorr { bin_size } => tangential_pos_num as f32 * bin_size,
            ProjDataKind::CylindricalNoArcCorr => {
                let n = self.scanner.num_detectors_per_ring() as f32;
                self.get_ring_radius() * (tangential_pos_num as f32 * PI / n).sin()
            }
        }
    }

    /// [`Self::get_s`] 的逆映射, 结果为连续值. 未弧校正时 `|s|` 超过环半径则返回 `None`.
    #[inline]
    pub fn get_tangential_pos_for_s(&self, s: f32) -> Option<f32> {
        match self.kind {
            ProjDataKind::CylindricalArcCorr { bin_size } => Some(s / bin_size),
            ProjDataKind::CylindricalNoArcCorr => {
                let r = self.get_ring_radius();
                if s.abs() > r {
                    return None;
                }
                let n = self.scanner.num_detectors_per_ring() as f32;
                Some((s / r).asin() * n / PI)
            }
        }
    }

    /// 视角对应的方位角.
    #[inline]
    pub fn get_phi(&self, view_num: i32) -> f32 {
        view_num as f32 * PI / self.num_views as f32
    }

    /// 由视角号和径向位置号得到探测器对 `(a, b)`.
    ///
    /// 要求视角个数等于每环探测器数的一半.
    pub fn get_det_pair_for_view_tangential(&self, view_num: i32, tangential_pos_num: i32) -> (i32, i32) {
        let n = self.scanner.num_detectors_per_ring();
        let s = tangential_pos_num;
        let a = (view_num - (s >> 1)).rem_euclid(n);
        let b = (view_num + ((s + 1) >> 1) + n / 2).rem_euclid(n);
        (a, b)
    }

    /// [`Self::get_det_pair_for_view_tangential`] 的逆映射.
    ///
    /// 返回 `(view, tangential, swapped)`, `swapped` 为真代表 `b` 才是第一个探测器.
    /// 落在数据范围之外时返回 `None`.
    pub fn get_view_tangential_for_det_pair(&self, a: i32, b: i32) -> Option<(i32, i32, bool)> {
        let n = self.scanner.num_detectors_per_ring();
        [(a, b, false), (b, a, true)].into_iter().find_map(|(p, q, swapped)| {
            let mut s = (q - p - n / 2).rem_euclid(n);
            if s >= n / 2 {
                s -= n;
            }
            let v = (p + (s >> 1)).rem_euclid(n);
            let ok = v < self.num_views
                && s >= self.get_min_tangential_pos_num()
                && s <= self.get_max_tangential_pos_num();
            ok.then_some((v, s, swapped))
        })
    }

    /// 属于 `(segment, axial)` 的所有环对 `(ra, rb)`, 环差为 `rb - ra`.
    pub fn get_ring_pairs_for_segment_axial(
        &self,
        segment_num: i32,
        axial_pos_num: i32,
    ) -> Vec<(i32, i32)> {
        let g = self.segment(segment_num);
        let num_rings = self.scanner.num_rings();
        (g.min_ring_diff..=g.max_ring_diff)
            .filter_map(|delta| {
                let (ra, rb) = if g.is_compressed() {
                    let ring_sum = axial_pos_num + g.min_abs_ring_diff();
                    if (ring_sum - delta) % 2 != 0 {
                        return None;
                    }
                    let ra = (ring_sum - delta) / 2;
                    (ra, ra + delta)
                } else if delta >= 0 {
                    (axial_pos_num, axial_pos_num + delta)
                } else {
                    (axial_pos_num - delta, axial_pos_num)
                };
                let inside = |r: i32| (0..num_rings).contains(&r);
                (inside(ra) && inside(rb)).then_some((ra, rb))
            })
            .collect()
    }

    /// 环对 `(ra, rb)` 所属的 `(segment, axial)`. 环差不在任何段内时返回 `None`.
    pub fn get_segment_axial_for_ring_pair(&self, ra: i32, rb: i32) -> Option<(i32, i32)> {
        let delta = rb - ra;
        let segment_num = self
            .segment_nums()
            .find(|&s| {
                let g = self.segment(s);
                delta >= g.min_ring_diff && delta <= g.max_ring_diff
            })?;
        let g = self.segment(segment_num);
        let axial = if g.is_compressed() {
            ra + rb - g.min_abs_ring_diff()
        } else {
            ra.min(rb)
        };
        (axial >= 0 && axial < g.num_axial_poss).then_some((segment_num, axial))
    }

    /// 以 `key := value` 形式描述全部几何参数.
    pub fn parameter_info(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "Scanner type := {}", self.scanner.name());
        let _ = writeln!(s, "Data kind := {}", self.kind.name());
        let _ = writeln!(s, "Number of rings := {}", self.scanner.num_rings());
        let _ = writeln!(
            s,
            "Number of detectors per ring := {}",
            self.scanner.num_detectors_per_ring()
        );
        let _ = writeln!(s, "Ring radius (mm) := {}", self.get_ring_radius());
        let _ = writeln!(s, "Ring spacing (mm) := {}", self.get_ring_spacing());
        let _ = writeln!(s, "Tangential sampling (mm) := {}", self.get_sampling_in_s());
        let _ = writeln!(s, "Number of views := {}", self.num_views);
        let _ = writeln!(s, "Number of tangential positions := {}", self.num_tangential_poss);
        let _ = writeln!(s, "Maximum segment number := {}", self.max_segment_num);
        for seg in self.segment_nums() {
            let g = self.segment(seg);
            let _ = writeln!(
                s,
                "  segment {seg:>3}: ring difference [{}, {}], {} axial positions",
                g.min_ring_diff, g.max_ring_diff, g.num_axial_poss
            );
        }
        s
    }
}
