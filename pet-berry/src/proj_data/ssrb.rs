//! 单层重组 (SSRB): 把若干相邻段按轴向坐标 `m` 合并为一个段.

use super::info::{ProjDataInfo, SegmentGeometry};
use super::memory::{ProjData, ProjDataInMemory};
use crate::error::{ReconError, ReconResult};
use log::debug;
use std::sync::Arc;

/// 输出段 `k` 合并的输入段范围.
#[inline]
fn input_segments(k: i32, num_segments_to_combine: i32) -> std::ops::RangeInclusive<i32> {
    let half = (num_segments_to_combine - 1) / 2;
    k * num_segments_to_combine - half..=k * num_segments_to_combine + half
}

/// 每 `num_segments_to_combine` 个输入段合并为一个输出段时的输出几何.
///
/// `num_segments_to_combine` 必须为正奇数. 只使用段号绝对值不超过
/// `max_in_segment_num_to_process` 的输入段; 负数代表使用全部输入段.
pub fn ssrb_info(
    in_info: &ProjDataInfo,
    num_segments_to_combine: i32,
    max_in_segment_num_to_process: i32,
) -> ReconResult<ProjDataInfo> {
    if num_segments_to_combine < 1 || num_segments_to_combine % 2 == 0 {
        return Err(ReconError::InvalidParameter(format!(
            "合并段数必须为正奇数, 实际为 {num_segments_to_combine}"
        )));
    }
    let max_in = if max_in_segment_num_to_process < 0 {
        in_info.get_max_segment_num()
    } else {
        max_in_segment_num_to_process.min(in_info.get_max_segment_num())
    };
    let half = (num_segments_to_combine - 1) / 2;
    if max_in < half {
        return Err(ReconError::InvalidParameter(format!(
            "合并 {num_segments_to_combine} 个段需要至少 {half} 个斜段, 实际只有 {max_in} 个"
        )));
    }
    let max_out = (max_in - half) / num_segments_to_combine;
    let num_rings = in_info.scanner().num_rings();
    let segments = (-max_out..=max_out)
        .map(|k| {
            let ins = input_segments(k, num_segments_to_combine);
            let min_ring_diff = ins
                .clone()
                .map(|s| in_info.get_min_ring_difference(s))
                .min()
                .unwrap_or(0);
            let max_ring_diff = ins
                .map(|s| in_info.get_max_ring_difference(s))
                .max()
                .unwrap_or(0);
            let g = SegmentGeometry {
                min_ring_diff,
                max_ring_diff,
                num_axial_poss: 0,
            };
            let num_axial_poss = if g.is_compressed() {
                2 * num_rings - 1 - 2 * g.min_abs_ring_diff()
            } else {
                in_info.get_num_axial_poss(k * num_segments_to_combine)
            };
            SegmentGeometry { num_axial_poss, ..g }
        })
        .collect();
    ProjDataInfo::from_segments(
        in_info.scanner().clone(),
        in_info.kind(),
        in_info.get_num_views(),
        in_info.get_num_tangential_poss(),
        segments,
    )
}

/// 按 `out_info` 对输入数据做单层重组.
///
/// 每个输入正弦图按其轴向坐标 `m` 累加到输出段的对应轴向位置. `do_norm` 为真时,
/// 每个输出正弦图除以累加到它上面的输入正弦图个数.
pub fn ssrb(
    out_info: Arc<ProjDataInfo>,
    input: &dyn ProjData,
    num_segments_to_combine: i32,
    do_norm: bool,
) -> ReconResult<ProjDataInMemory> {
    let in_info = input.info().clone();
    let mut out = ProjDataInMemory::zeros(out_info.clone());
    for k in out_info.segment_nums() {
        let mut counts = vec![0_u32; out_info.get_num_axial_poss(k) as usize];
        let out_seg = out.segment_mut(k)?;
        for in_seg_num in input_segments(k, num_segments_to_combine) {
            if !in_info.contains_segment(in_seg_num) {
                return Err(ReconError::GeometryMismatch(format!(
                    "输入数据缺少段 {in_seg_num}"
                )));
            }
            let in_seg = input.get_segment_by_view(in_seg_num)?;
            for in_ax in 0..in_info.get_num_axial_poss(in_seg_num) {
                let m = in_info.get_m(in_seg_num, in_ax);
                let out_ax = out_info.get_axial_pos_for_m(k, m).round() as i32;
                if out_ax < 0 || out_ax >= out_info.get_num_axial_poss(k) {
                    debug!("SSRB: 段 {in_seg_num} 轴向位置 {in_ax} (m = {m}) 落在输出之外");
                    continue;
                }
                counts[out_ax as usize] += 1;
                for view in 0..in_info.get_num_views() {
                    let src = &in_seg.data()[view][in_ax];
                    let dst = &mut out_seg.data_mut()[view][out_ax];
                    for (d, s) in dst.as_mut_slice().iter_mut().zip(src.as_slice()) {
                        *d += *s;
                    }
                }
            }
        }
        if do_norm {
            for (ax, &c) in counts.iter().enumerate() {
                if c > 1 {
                    let inv = 1.0 / c as f32;
                    for view in 0..out_info.get_num_views() {
                        out_seg.data_mut()[view][ax as i32] *= inv;
                    }
                }
            }
        }
    }
    Ok(out)
}
