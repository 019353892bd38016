//! 归一化估计用的探测器对数据结构.
//!
//! [`DetPairData`] 保存单个正弦图 (一个环对) 上的 `(a, b)` 探测器对数据,
//! [`FanProjData`] 保存全部环对 `(ra, a, rb, b)` 上的扇形数据. 两者都可以与投影数据互相转换,
//! 并可乘上块因子, 几何因子与探测器效率.

mod det_pair;
mod fan;

pub use det_pair::{make_det_pair_data, set_det_pair_data, BlockData, DetPairData, GeoData};
pub use fan::{make_fan_data, set_fan_data, BlockData3D, DetectorEfficiencies, FanProjData};

use crate::error::{ReconError, ReconResult};
use crate::proj_data::ProjDataInfo;

/// 单个元素的 KL 散度 `a ln(a / b) + b - a`, 分子分母都先与 `threshold` 取最大值.
#[inline]
pub fn kl(a: f32, b: f32, threshold: f32) -> f32 {
    a * (a.max(threshold) / b.max(threshold)).ln() + b - a
}

/// 非零元素乘以 (`apply` 为假时除以) `factor`.
#[inline]
fn scale_entry(v: &mut f32, factor: f32, apply: bool) {
    if *v == 0.0 {
        return;
    }
    if apply {
        *v *= factor;
    } else if factor != 0.0 {
        *v /= factor;
    }
}

/// 探测器对与 `(view, tangential)` 之间的换算要求未弧校正, 且视角数为探测器数的一半.
fn check_fan_geometry(info: &ProjDataInfo) -> ReconResult<()> {
    if info.is_arc_corrected() {
        return Err(ReconError::GeometryMismatch(
            "探测器对数据要求未弧校正的投影数据".to_owned(),
        ));
    }
    let n = info.scanner().num_detectors_per_ring();
    if info.get_num_views() * 2 != n {
        return Err(ReconError::GeometryMismatch(format!(
            "视角数 {} 不等于每环探测器数 {n} 的一半",
            info.get_num_views()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_kl_threshold() {
        assert_abs_diff_eq!(kl(2.0, 2.0, 1e-5), 0.0);
        // a = 0 时只剩 b.
        assert_abs_diff_eq!(kl(0.0, 3.0, 1e-5), 3.0);
        // b = 0 被阈值截断, 结果有限.
        assert!(kl(1.0, 0.0, 1e-3).is_finite());
        assert!(kl(1.0, 0.5, 1e-5) > 0.0);
    }

    #[test]
    fn test_scale_entry() {
        let mut v = 2.0;
        scale_entry(&mut v, 3.0, true);
        assert_eq!(v, 6.0);
        scale_entry(&mut v, 3.0, false);
        assert_eq!(v, 2.0);
        scale_entry(&mut v, 0.0, false);
        assert_eq!(v, 2.0);
        let mut z = 0.0;
        scale_entry(&mut z, 5.0, true);
        assert_eq!(z, 0.0);
    }
}
