//! 单个正弦图上的探测器对数据.

use super::{check_fan_geometry, kl, scale_entry};
use crate::array::{Array1d, Array2d};
use crate::error::{ReconError, ReconResult};
use crate::proj_data::{ProjData, Sinogram};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 按块的归一化因子 `[block_a][block_b]`.
pub type BlockData = Array2d<f32>;

/// 几何归一化因子 `[crystal_in_half_block][detector_offset]`.
pub type GeoData = Array2d<f32>;

/// 一个环内探测器对 `(a, b)` 上的数据.
///
/// 第 `a` 行只存储扇形 `[a + n/2 - h, a + n/2 + h]` 内的 `b`, 其中 `n` 为每环探测器数,
/// `h` 为扇形半宽. 超过 `n` 的下标代表绕回后的探测器 `b - n`, 访问时自动换算.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DetPairData {
    data: Array2d<f32>,
    num_detectors: i32,
}

impl DetPairData {
    /// 全零数据. `fan_size` 为扇形中探测器个数 (取奇数, 偶数按 `fan_size / 2` 取半宽).
    pub fn new(num_detectors: i32, fan_size: i32) -> Self {
        let half = fan_size / 2;
        let rows = (0..num_detectors)
            .map(|a| Array1d::zeros(a + num_detectors / 2 - half, a + num_detectors / 2 + half))
            .collect();
        Self {
            data: Array2d::from_rows(0, rows),
            num_detectors,
        }
    }

    /// 每环探测器数.
    #[inline]
    pub fn num_detectors(&self) -> i32 {
        self.num_detectors
    }

    /// 底层存储.
    #[inline]
    pub fn data(&self) -> &Array2d<f32> {
        &self.data
    }

    /// 第一个探测器的最小编号.
    #[inline]
    pub fn get_min_index(&self) -> i32 {
        self.data.get_min_index()
    }

    /// 第一个探测器的最大编号.
    #[inline]
    pub fn get_max_index(&self) -> i32 {
        self.data.get_max_index()
    }

    /// 与 `a` 配对的探测器在存储中的最小下标.
    #[inline]
    pub fn get_min_b(&self, a: i32) -> i32 {
        self.data[a].get_min_index()
    }

    /// 与 `a` 配对的探测器在存储中的最大下标.
    #[inline]
    pub fn get_max_b(&self, a: i32) -> i32 {
        self.data[a].get_max_index()
    }

    /// `(a, b)` 在第 `a` 行中的存储下标. 要求 `0 <= a < n`, `b >= 0`.
    #[inline]
    pub fn stored_b(&self, a: i32, b: i32) -> i32 {
        if b < self.get_min_b(a) {
            b + self.num_detectors
        } else {
            b
        }
    }

    /// `(a, b)` 是否落在存储的扇形内.
    pub fn is_in_data(&self, a: i32, b: i32) -> bool {
        if !self.data.contains(a) {
            return false;
        }
        self.stored_b(a, b) <= self.get_max_b(a)
    }

    /// 读取 `(a, b)`.
    ///
    /// # 注意
    ///
    /// 不在扇形内时 panic, 先用 [`Self::is_in_data`] 检查.
    #[inline]
    pub fn get(&self, a: i32, b: i32) -> f32 {
        self.data[a][self.stored_b(a, b)]
    }

    /// 可变地访问 `(a, b)`.
    #[inline]
    pub fn get_mut(&mut self, a: i32, b: i32) -> &mut f32 {
        let b = self.stored_b(a, b);
        &mut self.data[a][b]
    }

    /// 所有元素设为 `v`.
    #[inline]
    pub fn fill(&mut self, v: f32) {
        self.data.fill(v);
    }

    /// 所有元素之和.
    #[inline]
    pub fn sum(&self) -> f32 {
        self.data.sum()
    }

    /// 与探测器 `a` 配对的所有元素之和.
    #[inline]
    pub fn sum_for(&self, a: i32) -> f32 {
        self.data[a].sum()
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

    /// 展开为 `n x n` 的矩阵, 扇形之外为 0.
    pub fn to_full(&self) -> Array2d<f32> {
        let n = self.num_detectors;
        let mut full = Array2d::from_rows(0, (0..n).map(|_| Array1d::zeros(0, n - 1)).collect());
        for (a, row) in self.data.indexed_iter() {
            for (b, &v) in row.indexed_iter() {
                full[a.rem_euclid(n)][b.rem_euclid(n)] = v;
            }
        }
        full
    }

    fn for_each_nonzero<F: FnMut(i32, i32) -> f32>(&mut self, apply: bool, mut factor: F) {
        for (a, row) in self.data.indexed_iter_mut() {
            for (b, v) in row.indexed_iter_mut() {
                scale_entry(v, factor(a, b), apply);
            }
        }
    }

    /// 乘以 (`apply` 为假时除以) 块归一化因子. 值为 0 的元素不变.
    pub fn apply_block_norm(&mut self, block_data: &BlockData, apply: bool) -> ReconResult<()> {
        let num_blocks = block_data.len() as i32;
        if num_blocks == 0 || self.num_detectors % num_blocks != 0 {
            return Err(ReconError::InvalidParameter(format!(
                "块数 {num_blocks} 不能整除探测器数 {}",
                self.num_detectors
            )));
        }
        let per_block = self.num_detectors / num_blocks;
        self.for_each_nonzero(apply, |a, b| {
            block_data[a / per_block][(b / per_block) % num_blocks]
        });
        Ok(())
    }

    /// 乘以 (`apply` 为假时除以) 几何归一化因子. 值为 0 的元素不变.
    ///
    /// 利用块内的镜像对称, `geo_data` 只保存半个块的晶体.
    pub fn apply_geo_norm(&mut self, geo_data: &GeoData, apply: bool) -> ReconResult<()> {
        let n = self.num_detectors;
        let per_block = 2 * geo_data.len() as i32;
        if per_block == 0 || geo_data.iter().any(|row| row.len() as i32 != n) {
            return Err(ReconError::InvalidParameter(format!(
                "几何归一化因子的每一行必须有 {n} 个元素"
            )));
        }
        self.for_each_nonzero(apply, |a, b| {
            let mut new_a = a % per_block;
            let mut new_b = b - (a - new_a);
            if new_a > per_block - 1 - new_a {
                new_a = per_block - 1 - new_a;
                new_b = per_block - 1 - new_b;
            }
            geo_data[new_a][new_b.rem_euclid(n)]
        });
        Ok(())
    }

    /// 乘以 (`apply` 为假时除以) 两个探测器效率之积. 值为 0 的元素不变.
    pub fn apply_efficiencies(&mut self, efficiencies: &Array1d<f32>, apply: bool) -> ReconResult<()> {
        let n = self.num_detectors;
        if efficiencies.len() as i32 != n || efficiencies.get_min_index() != 0 {
            return Err(ReconError::InvalidParameter(format!(
                "探测器效率必须是下标 0..{n} 的一维数组"
            )));
        }
        self.for_each_nonzero(apply, |a, b| efficiencies[a] * efficiencies[b % n]);
        Ok(())
    }

    /// 与 `other` 之间逐元素 KL 散度之和. 两者的扇形必须相同.
    pub fn kl(&self, other: &DetPairData, threshold: f32) -> ReconResult<f32> {
        if self.data.get_index_range() != other.data.get_index_range() {
            return Err(ReconError::GeometryMismatch("探测器对数据的扇形不同".to_owned()));
        }
        Ok(self
            .data
            .full_iter()
            .zip(other.data.full_iter())
            .map(|(&a, &b)| kl(a, b, threshold))
            .sum())
    }
}

/// 取出投影数据中 `(segment, axial)` 处的正弦图. `segment` 非零时, `(b, a)` 方向的
/// 数据取自段 `-segment`.
///
/// 要求未弧校正的数据, 视角个数为每环探测器数的一半.
pub fn make_det_pair_data(
    proj_data: &dyn ProjData,
    segment_num: i32,
    axial_pos_num: i32,
) -> ReconResult<DetPairData> {
    let info = proj_data.info();
    check_fan_geometry(info)?;
    let n = info.scanner().num_detectors_per_ring();
    let fan_size = 2 * info.get_max_tangential_pos_num().max(-info.get_min_tangential_pos_num()) + 1;
    let mut det_pair_data = DetPairData::new(n, fan_size);

    let pos = proj_data.get_sinogram(axial_pos_num, segment_num)?;
    let neg = if segment_num == 0 {
        pos.clone()
    } else {
        proj_data.get_sinogram(axial_pos_num, -segment_num)?
    };
    for view in 0..n / 2 {
        for tang in info.get_min_tangential_pos_num()..=info.get_max_tangential_pos_num() {
            let (a, b) = info.get_det_pair_for_view_tangential(view, tang);
            *det_pair_data.get_mut(a, b) = pos.data()[view][tang];
            *det_pair_data.get_mut(b, a) = neg.data()[view][tang];
        }
    }
    Ok(det_pair_data)
}

/// [`make_det_pair_data`] 的逆操作: 写回 `(segment, axial)` (以及 `-segment`) 处的正弦图.
pub fn set_det_pair_data(
    proj_data: &mut dyn ProjData,
    det_pair_data: &DetPairData,
    segment_num: i32,
    axial_pos_num: i32,
) -> ReconResult<()> {
    let info = proj_data.info().clone();
    check_fan_geometry(&info)?;
    let n = info.scanner().num_detectors_per_ring();
    if det_pair_data.num_detectors() != n {
        return Err(ReconError::GeometryMismatch(format!(
            "探测器对数据有 {} 个探测器, 扫描仪为 {n}",
            det_pair_data.num_detectors()
        )));
    }
    let mut pos = Sinogram::zeros(info.clone(), axial_pos_num, segment_num);
    let mut neg = Sinogram::zeros(info.clone(), axial_pos_num, -segment_num);
    for view in 0..n / 2 {
        for tang in info.get_min_tangential_pos_num()..=info.get_max_tangential_pos_num() {
            let (a, b) = info.get_det_pair_for_view_tangential(view, tang);
            pos.data_mut()[view][tang] = det_pair_data.get(a, b);
            neg.data_mut()[view][tang] = det_pair_data.get(b, a);
        }
    }
    proj_data.set_sinogram(&pos)?;
    if segment_num != 0 {
        proj_data.set_sinogram(&neg)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proj_data::{ProjDataInMemory, ProjDataInfo, Scanner};
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn info() -> Arc<ProjDataInfo> {
        let scanner = Scanner::by_name("test").unwrap();
        Arc::new(ProjDataInfo::cylindrical(scanner, 1, 1, 32, 16, false).unwrap())
    }

    #[test]
    fn test_wraparound_indexing() {
        let mut d = DetPairData::new(8, 5);
        assert_eq!((d.get_min_b(0), d.get_max_b(0)), (2, 6));
        assert_eq!((d.get_min_b(7), d.get_max_b(7)), (9, 13));
        // 探测器 1 与 7 配对: 存储在第 7 行的下标 9.
        assert_eq!(d.stored_b(7, 1), 9);
        assert!(d.is_in_data(7, 1));
        assert!(!d.is_in_data(0, 1));
        assert!(!d.is_in_data(8, 1));
        *d.get_mut(7, 1) = 3.0;
        assert_eq!(d.get(7, 1), 3.0);
        assert_eq!(d.data()[7][9], 3.0);
        assert_eq!(d.to_full()[7][1], 3.0);
        assert_eq!(d.sum_for(7), 3.0);
    }

    #[test]
    fn test_make_and_set_round_trip() {
        let info = info();
        let mut pd = ProjDataInMemory::zeros(info.clone());
        for seg in [-1, 1] {
            let mut s = pd.get_sinogram(2, seg).unwrap();
            for (k, v) in s.data_mut().full_iter_mut().enumerate() {
                *v = (k as i32 * seg) as f32;
            }
            pd.set_sinogram(&s).unwrap();
        }
        let d = make_det_pair_data(&pd, 1, 2).unwrap();
        assert_eq!(d.num_detectors(), 64);
        let (a, b) = info.get_det_pair_for_view_tangential(5, 3);
        let pos = pd.get_sinogram(2, 1).unwrap();
        let neg = pd.get_sinogram(2, -1).unwrap();
        assert_eq!(d.get(a, b), pos.data()[5][3]);
        assert_eq!(d.get(b, a), neg.data()[5][3]);

        let mut out = ProjDataInMemory::zeros(info);
        set_det_pair_data(&mut out, &d, 1, 2).unwrap();
        assert_eq!(out.get_sinogram(2, 1).unwrap(), pos);
        assert_eq!(out.get_sinogram(2, -1).unwrap(), neg);
    }

    #[test]
    fn test_rejects_arc_corrected() {
        let scanner = Scanner::by_name("test").unwrap();
        let arc = Arc::new(ProjDataInfo::cylindrical(scanner, 1, 1, 32, 16, true).unwrap());
        let pd = ProjDataInMemory::zeros(arc);
        assert!(make_det_pair_data(&pd, 0, 0).is_err());
    }

    #[test]
    fn test_norm_factors_skip_zeros() {
        let mut d = DetPairData::new(8, 5);
        d.fill(2.0);
        *d.get_mut(0, 4) = 0.0;
        let eff = Array1d::from_vec(0, vec![1.0, 2.0, 1.0, 1.0, 1.0, 1.0, 1.0, 3.0]);
        d.apply_efficiencies(&eff, true).unwrap();
        assert_eq!(d.get(0, 4), 0.0);
        assert_eq!(d.get(1, 5), 4.0);
        assert_eq!(d.get(7, 1), 12.0);
        d.apply_efficiencies(&eff, false).unwrap();
        assert!(d.data().full_iter().all(|&v| v == 2.0 || v == 0.0));

        let block = Array2d::from_rows(
            0,
            vec![Array1d::from_vec(0, vec![1.0, 0.5]), Array1d::from_vec(0, vec![2.0, 4.0])],
        );
        d.apply_block_norm(&block, true).unwrap();
        // a = 1 属于块 0, b = 5 属于块 1.
        assert_eq!(d.get(1, 5), 1.0);
        assert_eq!(d.get(5, 1), 4.0);
        assert!(d.apply_block_norm(&Array2d::from_rows(0, vec![Array1d::zeros(0, 2); 3]), true).is_err());
    }

    #[test]
    fn test_geo_norm_mirror_symmetry() {
        let n = 8;
        let mut d = DetPairData::new(n, 5);
        d.fill(1.0);
        // 每块 4 个晶体, 只保存前两个.
        let geo = Array2d::from_rows(
            0,
            (0..2)
                .map(|c| Array1d::from_vec(0, (0..n).map(|k| (10 * c + k + 1) as f32).collect()))
                .collect(),
        );
        d.apply_geo_norm(&geo, true).unwrap();
        // a = 1: new_a = 1, new_b = b.
        assert_eq!(d.get(1, 4), geo[1][4]);
        // a = 3 镜像为 new_a = 0, new_b = 3 - b.
        assert_eq!(d.get(3, 7), geo[0][(3 - 7_i32).rem_euclid(n)]);
    }

    #[test]
    fn test_kl() {
        let mut a = DetPairData::new(8, 5);
        a.fill(1.0);
        let b = a.clone();
        assert_abs_diff_eq!(a.kl(&b, 1e-6).unwrap(), 0.0);
        let mut c = a.clone();
        c.fill(2.0);
        let per = 1.0 * (1.0_f32 / 2.0).ln() + 2.0 - 1.0;
        assert_abs_diff_eq!(a.kl(&c, 1e-6).unwrap(), per * 40.0, epsilon = 1e-4);
        assert!(a.kl(&DetPairData::new(8, 3), 1e-6).is_err());
    }
}
