//! 全部环对上的扇形数据.

use super::{check_fan_geometry, kl, scale_entry};
use crate::array::{Array1d, Array2d, Array3d, Array4d};
use crate::error::{ReconError, ReconResult};
use crate::proj_data::{ProjData, Sinogram};
use log::{debug, warn};

#[cfg(feature = "serde")]
use {
    flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression},
    serde::{Deserialize, Serialize},
    std::fs::File,
    std::io::{BufReader, BufWriter, Read, Write},
    std::path::Path,
};

/// 探测器效率 `[ring][detector]`.
pub type DetectorEfficiencies = Array2d<f32>;

/// 扇形数据, 逻辑索引为 `(ra, a, rb, b)`.
///
/// 每条响应线只存储一次: `ra < rb` 时存于 `[ra][a][rb][b]`, 否则存于 `[rb][b][ra][a]`.
/// 因此第 `r` 行只保存 `rb` 在 `[r, min(r + max_ring_diff, num_rings - 1)]` 内的部分.
/// 同一个环内 `(a, b)` 与 `(b, a)` 是两个不同的元素. 第二个探测器的下标按
/// [`DetPairData`](super::DetPairData) 的方式绕回.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct FanProjData {
    data: Array4d<f32>,
    num_rings: i32,
    num_detectors_per_ring: i32,
    max_ring_diff: i32,
    half_fan_size: i32,
}

impl FanProjData {
    /// 全零的扇形数据.
    pub fn new(
        num_rings: i32,
        num_detectors_per_ring: i32,
        max_ring_diff: i32,
        fan_size: i32,
    ) -> ReconResult<Self> {
        let n = num_detectors_per_ring;
        if n <= 0 || n % 2 != 0 {
            return Err(ReconError::InvalidParameter(format!(
                "每环探测器数必须为正偶数, 实际为 {n}"
            )));
        }
        if num_rings <= 0 || max_ring_diff < 0 || max_ring_diff >= num_rings {
            return Err(ReconError::InvalidParameter(format!(
                "最大环差 {max_ring_diff} 超出 [0, {})",
                num_rings
            )));
        }
        if fan_size <= 0 || fan_size >= n {
            return Err(ReconError::InvalidParameter(format!(
                "扇形大小 {fan_size} 必须在 (0, {n}) 内"
            )));
        }
        let half = fan_size / 2;
        let planes = (0..num_rings)
            .map(|ra| {
                let max_rb = (ra + max_ring_diff).min(num_rings - 1);
                let fans = (0..n)
                    .map(|a| {
                        let rows = (ra..=max_rb)
                            .map(|_| Array1d::zeros(a + n / 2 - half, a + n / 2 + half))
                            .collect();
                        Array2d::from_rows(ra, rows)
                    })
                    .collect();
                Array3d::from_rows(0, fans)
            })
            .collect();
        Ok(Self {
            data: Array4d::from_rows(0, planes),
            num_rings,
            num_detectors_per_ring: n,
            max_ring_diff,
            half_fan_size: half,
        })
    }

    /// 环数.
    #[inline]
    pub fn num_rings(&self) -> i32 {
        self.num_rings
    }

    /// 每环探测器数.
    #[inline]
    pub fn num_detectors_per_ring(&self) -> i32 {
        self.num_detectors_per_ring
    }

    /// 最大环差.
    #[inline]
    pub fn max_ring_diff(&self) -> i32 {
        self.max_ring_diff
    }

    /// 扇形半宽.
    #[inline]
    pub fn half_fan_size(&self) -> i32 {
        self.half_fan_size
    }

    /// 底层存储.
    #[inline]
    pub fn data(&self) -> &Array4d<f32> {
        &self.data
    }

    /// 与环 `ra` 配对的最小环号.
    #[inline]
    pub fn get_min_rb(&self, ra: i32) -> i32 {
        (ra - self.max_ring_diff).max(0)
    }

    /// 与环 `ra` 配对的最大环号.
    #[inline]
    pub fn get_max_rb(&self, ra: i32) -> i32 {
        (ra + self.max_ring_diff).min(self.num_rings - 1)
    }

    /// 与 `a` 配对的探测器在存储中的最小下标.
    #[inline]
    pub fn get_min_b(&self, a: i32) -> i32 {
        a + self.num_detectors_per_ring / 2 - self.half_fan_size
    }

    /// 与 `a` 配对的探测器在存储中的最大下标.
    #[inline]
    pub fn get_max_b(&self, a: i32) -> i32 {
        a + self.num_detectors_per_ring / 2 + self.half_fan_size
    }

    /// 逻辑索引对应的存储位置. 要求探测器编号非负.
    fn locate(&self, ra: i32, a: i32, rb: i32, b: i32) -> [i32; 4] {
        let n = self.num_detectors_per_ring;
        let (r1, d1, r2, d2) = if ra < rb { (ra, a, rb, b) } else { (rb, b, ra, a) };
        let d1 = d1 % n;
        let d2 = d2 % n;
        let d2 = if d2 < self.get_min_b(d1) { d2 + n } else { d2 };
        [r1, d1, r2, d2]
    }

    /// `(ra, a, rb, b)` 是否在存储的范围内.
    pub fn is_in_data(&self, ra: i32, a: i32, rb: i32, b: i32) -> bool {
        let rings = 0..self.num_rings;
        if !rings.contains(&ra) || !rings.contains(&rb) || (ra - rb).abs() > self.max_ring_diff {
            return false;
        }
        if a < 0 || b < 0 {
            return false;
        }
        let [_, d1, _, d2] = self.locate(ra, a, rb, b);
        d2 <= self.get_max_b(d1)
    }

    /// 读取 `(ra, a, rb, b)`.
    ///
    /// # 注意
    ///
    /// 不在存储范围内时 panic, 先用 [`Self::is_in_data`] 检查.
    #[inline]
    pub fn get(&self, ra: i32, a: i32, rb: i32, b: i32) -> f32 {
        self.data[self.locate(ra, a, rb, b)]
    }

    /// 可变地访问 `(ra, a, rb, b)`.
    #[inline]
    pub fn get_mut(&mut self, ra: i32, a: i32, rb: i32, b: i32) -> &mut f32 {
        let idx = self.locate(ra, a, rb, b);
        &mut self.data[idx]
    }

    /// 所有元素设为 `v`.
    #[inline]
    pub fn fill(&mut self, v: f32) {
        self.data.fill(v);
    }

    /// 探测器 `(ra, a)` 所在扇形的总和, 覆盖所有可能的 `rb`.
    pub fn sum_for(&self, ra: i32, a: i32) -> f32 {
        let n = self.num_detectors_per_ring;
        (self.get_min_rb(ra)..=self.get_max_rb(ra))
            .flat_map(|rb| (self.get_min_b(a)..=self.get_max_b(a)).map(move |b| (rb, b)))
            .map(|(rb, b)| self.get(ra, a, rb, b % n))
            .sum()
    }

    /// 所有探测器扇形总和之和. 不同环之间的响应线被计两次.
    pub fn sum(&self) -> f32 {
        (0..self.num_rings)
            .flat_map(|ra| (0..self.num_detectors_per_ring).map(move |a| (ra, a)))
            .map(|(ra, a)| self.sum_for(ra, a))
            .sum()
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

    /// 对每个存储的元素调用 `f(ra, a, rb, b, v)`, 其中 `(ra, a, rb, b)` 是它代表的响应线.
    fn for_each_lor_mut<F: FnMut(i32, i32, i32, i32, &mut f32)>(&mut self, mut f: F) {
        let n = self.num_detectors_per_ring;
        for (r1, fans) in self.data.indexed_iter_mut() {
            for (d1, rows) in fans.indexed_iter_mut() {
                for (r2, row) in rows.indexed_iter_mut() {
                    for (d2, v) in row.indexed_iter_mut() {
                        let d2 = d2 % n;
                        if r1 < r2 {
                            f(r1, d1, r2, d2, v);
                        } else {
                            f(r1, d2, r2, d1, v);
                        }
                    }
                }
            }
        }
    }

    /// 乘以 (`apply` 为假时除以) 块归一化因子. 值为 0 的元素不变.
    pub fn apply_block_norm(&mut self, block_data: &BlockData3D, apply: bool) -> ReconResult<()> {
        let (num_axial, num_tangential) = (block_data.num_rings(), block_data.num_detectors_per_ring());
        if self.num_rings % num_axial != 0 || self.num_detectors_per_ring % num_tangential != 0 {
            return Err(ReconError::InvalidParameter(format!(
                "块数 {num_axial} x {num_tangential} 不能整除探测器数 {} x {}",
                self.num_rings, self.num_detectors_per_ring
            )));
        }
        let rings_per_block = self.num_rings / num_axial;
        let dets_per_block = self.num_detectors_per_ring / num_tangential;
        self.for_each_lor_mut(|ra, a, rb, b, v| {
            let factor = block_data.get(
                ra / rings_per_block,
                a / dets_per_block,
                rb / rings_per_block,
                b / dets_per_block,
            );
            scale_entry(v, factor, apply);
        });
        Ok(())
    }

    /// 乘以 (`apply` 为假时除以) 两个探测器效率之积. 值为 0 的元素不变.
    pub fn apply_efficiencies(
        &mut self,
        efficiencies: &DetectorEfficiencies,
        apply: bool,
    ) -> ReconResult<()> {
        let n = self.num_detectors_per_ring as usize;
        let ok = efficiencies.get_min_index() == 0
            && efficiencies.len() == self.num_rings as usize
            && efficiencies.iter().all(|row| row.get_min_index() == 0 && row.len() == n);
        if !ok {
            return Err(ReconError::InvalidParameter(format!(
                "探测器效率必须是 {} x {n} 的二维数组",
                self.num_rings
            )));
        }
        self.for_each_lor_mut(|ra, a, rb, b, v| {
            scale_entry(v, efficiencies[ra][a] * efficiencies[rb][b], apply);
        });
        Ok(())
    }

    /// 与 `other` 之间逐元素 KL 散度之和. 两者的形状必须相同.
    pub fn kl(&self, other: &FanProjData, threshold: f32) -> ReconResult<f32> {
        if self.data.get_index_range() != other.data.get_index_range() {
            return Err(ReconError::GeometryMismatch("扇形数据的形状不同".to_owned()));
        }
        Ok(self
            .data
            .full_iter()
            .zip(other.data.full_iter())
            .map(|(&a, &b)| kl(a, b, threshold))
            .sum())
    }

    /// 按几何参数重建存储布局, 把已有的值按位置逐行拷入.
    ///
    /// 以几何参数为准: 某一层长度不符时发出警告, 多出的部分丢弃, 缺少的部分为 0.
    pub fn repair_offsets(&mut self) -> ReconResult<()> {
        let mut expected = Self::new(
            self.num_rings,
            self.num_detectors_per_ring,
            self.max_ring_diff,
            2 * self.half_fan_size + 1,
        )?;
        let mut mismatches = 0_usize;
        let mut check = |what: &str, got: usize, want: usize| {
            if got != want {
                warn!("扇形数据 {what} 的长度为 {got}, 应为 {want}");
                mismatches += 1;
            }
        };

        check("环", self.data.len(), expected.data.len());
        for (fans, want_fans) in self.data.iter().zip(expected.data.iter_mut()) {
            check("探测器", fans.len(), want_fans.len());
            for (rows, want_rows) in fans.iter().zip(want_fans.iter_mut()) {
                check("配对环", rows.len(), want_rows.len());
                for (row, want_row) in rows.iter().zip(want_rows.iter_mut()) {
                    check("扇形", row.len(), want_row.len());
                    for (w, &v) in want_row.as_mut_slice().iter_mut().zip(row.as_slice()) {
                        *w = v;
                    }
                }
            }
        }
        if mismatches > 0 {
            warn!("扇形数据有 {mismatches} 处长度不符, 已按几何参数补齐");
        }
        self.data = expected.data;
        Ok(())
    }
}

#[cfg(feature = "serde")]
impl FanProjData {
    /// 以 zlib 压缩的 bincode 格式写出.
    pub fn write_compressed<W: Write>(&self, w: W) -> ReconResult<()> {
        let mut e = ZlibEncoder::new(w, Compression::best());
        bincode::serialize_into(&mut e, self)?;
        e.finish()?;
        Ok(())
    }

    /// 读取 [`Self::write_compressed`] 的输出, 并修复各行的起始下标.
    pub fn read_compressed<R: Read>(r: R) -> ReconResult<Self> {
        let d = ZlibDecoder::new(r);
        let mut fan: Self = bincode::deserialize_from(d)?;
        fan.repair_offsets()?;
        Ok(fan)
    }

    /// 保存到文件.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ReconResult<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| ReconError::io(path, e))?;
        self.write_compressed(BufWriter::new(file))?;
        debug!("扇形数据已保存到 {}", path.display());
        Ok(())
    }

    /// 从文件读取.
    pub fn load<P: AsRef<Path>>(path: P) -> ReconResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ReconError::io(path, e))?;
        Self::read_compressed(BufReader::new(file))
    }
}

/// 按块的三维归一化因子, 逻辑索引为 `(ra, a, rb, b)`, 各方向按块数取模.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct BlockData3D {
    data: Array4d<f32>,
    num_rings: i32,
    num_detectors_per_ring: i32,
}

impl BlockData3D {
    /// 轴向 `num_rings` 个块, 横向 `num_detectors_per_ring` 个块, 所有因子为 1.
    pub fn new(num_rings: i32, num_detectors_per_ring: i32) -> Self {
        let (r, n) = (num_rings.max(1), num_detectors_per_ring.max(1));
        let mut data = Array4d::from_rows(
            0,
            (0..r)
                .map(|_| {
                    Array3d::from_rows(
                        0,
                        (0..n)
                            .map(|_| Array2d::from_rows(0, (0..r).map(|_| Array1d::zeros(0, n - 1)).collect()))
                            .collect(),
                    )
                })
                .collect(),
        );
        data.fill(1.0);
        Self {
            data,
            num_rings: r,
            num_detectors_per_ring: n,
        }
    }

    /// 轴向块数.
    #[inline]
    pub fn num_rings(&self) -> i32 {
        self.num_rings
    }

    /// 横向块数.
    #[inline]
    pub fn num_detectors_per_ring(&self) -> i32 {
        self.num_detectors_per_ring
    }

    #[inline]
    fn wrap(&self, ra: i32, a: i32, rb: i32, b: i32) -> [i32; 4] {
        let (r, n) = (self.num_rings, self.num_detectors_per_ring);
        [ra.rem_euclid(r), a.rem_euclid(n), rb.rem_euclid(r), b.rem_euclid(n)]
    }

    /// 读取块对 `(ra, a, rb, b)` 的因子.
    #[inline]
    pub fn get(&self, ra: i32, a: i32, rb: i32, b: i32) -> f32 {
        self.data[self.wrap(ra, a, rb, b)]
    }

    /// 可变地访问块对 `(ra, a, rb, b)` 的因子.
    #[inline]
    pub fn get_mut(&mut self, ra: i32, a: i32, rb: i32, b: i32) -> &mut f32 {
        let idx = self.wrap(ra, a, rb, b);
        &mut self.data[idx]
    }
}

/// 把投影数据转换为扇形数据. 每个 `(segment, axial)` 只能对应一个环对, 即 span 为 1.
pub fn make_fan_data(proj_data: &dyn ProjData) -> ReconResult<FanProjData> {
    let info = proj_data.info();
    check_fan_geometry(info)?;
    if let Some(s) = info
        .segment_nums()
        .find(|&s| info.get_min_ring_difference(s) != info.get_max_ring_difference(s))
    {
        return Err(ReconError::GeometryMismatch(format!(
            "扇形数据只支持 span 为 1 的投影数据, 段 {s} 包含多个环差"
        )));
    }
    let scanner = info.scanner();
    let n = scanner.num_detectors_per_ring();
    let half = info.get_max_tangential_pos_num().min(-info.get_min_tangential_pos_num());
    let max_ring_diff = info
        .get_max_ring_difference(info.get_max_segment_num())
        .max(-info.get_min_ring_difference(info.get_min_segment_num()));
    let mut fan = FanProjData::new(scanner.num_rings(), n, max_ring_diff, 2 * half + 1)?;

    for seg in info.segment_nums() {
        for ax in info.get_min_axial_pos_num(seg)..=info.get_max_axial_pos_num(seg) {
            let Some(&(ra, rb)) = info.get_ring_pairs_for_segment_axial(seg, ax).first() else {
                continue;
            };
            let sinogram = proj_data.get_sinogram(ax, seg)?;
            for view in 0..n / 2 {
                for tang in -half..=half {
                    let (a, b) = info.get_det_pair_for_view_tangential(view, tang);
                    let v = sinogram.data()[view][tang];
                    *fan.get_mut(ra, a, rb, b) = v;
                    *fan.get_mut(rb, b, ra, a) = v;
                }
            }
        }
    }
    debug!(
        "扇形数据: {} 环, 每环 {n} 个探测器, 最大环差 {max_ring_diff}, 扇形半宽 {half}",
        scanner.num_rings()
    );
    Ok(fan)
}

/// [`make_fan_data`] 的逆操作. 扇形之外的径向位置写 0.
pub fn set_fan_data(proj_data: &mut dyn ProjData, fan: &FanProjData) -> ReconResult<()> {
    let info = proj_data.info().clone();
    check_fan_geometry(&info)?;
    let scanner = info.scanner();
    if scanner.num_rings() != fan.num_rings()
        || scanner.num_detectors_per_ring() != fan.num_detectors_per_ring()
    {
        return Err(ReconError::GeometryMismatch(format!(
            "扇形数据为 {} x {}, 扫描仪为 {} x {}",
            fan.num_rings(),
            fan.num_detectors_per_ring(),
            scanner.num_rings(),
            scanner.num_detectors_per_ring()
        )));
    }
    let n = scanner.num_detectors_per_ring();
    for seg in info.segment_nums() {
        for ax in info.get_min_axial_pos_num(seg)..=info.get_max_axial_pos_num(seg) {
            let mut sinogram = Sinogram::zeros(info.clone(), ax, seg);
            if let Some(&(ra, rb)) = info.get_ring_pairs_for_segment_axial(seg, ax).first() {
                for view in 0..n / 2 {
                    for tang in info.get_min_tangential_pos_num()..=info.get_max_tangential_pos_num() {
                        let (a, b) = info.get_det_pair_for_view_tangential(view, tang);
                        if fan.is_in_data(ra, a, rb, b) {
                            sinogram.data_mut()[view][tang] = fan.get(ra, a, rb, b);
                        }
                    }
                }
            }
            proj_data.set_sinogram(&sinogram)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proj_data::{ProjDataInMemory, ProjDataInfo, Scanner};
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn info(span: i32, max_ring_diff: i32) -> Arc<ProjDataInfo> {
        let scanner = Scanner::by_name("test").unwrap();
        Arc::new(ProjDataInfo::cylindrical(scanner, span, max_ring_diff, 32, 16, false).unwrap())
    }

    #[test]
    fn test_each_lor_stored_once() {
        let mut fan = FanProjData::new(4, 8, 2, 5).unwrap();
        *fan.get_mut(0, 1, 2, 5) = 3.0;
        assert_eq!(fan.get(2, 5, 0, 1), 3.0);
        // 同一个环内两个方向分开存储.
        *fan.get_mut(1, 1, 1, 5) = 4.0;
        assert_eq!(fan.get(1, 5, 1, 1), 0.0);
        // 绕回: 探测器 6 的扇形为 [8, 12].
        *fan.get_mut(0, 6, 1, 1) = 2.0;
        assert_eq!(fan.get(1, 1, 0, 6), 2.0);
        assert_eq!(fan.data()[[0, 6, 1, 9]], 2.0);
        assert_eq!(fan.find_max(), 4.0);
    }

    #[test]
    fn test_is_in_data() {
        let fan = FanProjData::new(4, 8, 2, 5).unwrap();
        assert!(fan.is_in_data(3, 0, 1, 4));
        assert!(fan.is_in_data(0, 6, 1, 1));
        assert!(!fan.is_in_data(0, 0, 3, 4));
        assert!(!fan.is_in_data(0, 0, 1, 0));
        assert!(!fan.is_in_data(0, 0, 4, 4));
        assert_eq!((fan.get_min_rb(3), fan.get_max_rb(0)), (1, 2));
    }

    #[test]
    fn test_new_rejects_bad_geometry() {
        assert!(FanProjData::new(4, 7, 2, 5).is_err());
        assert!(FanProjData::new(4, 8, 4, 5).is_err());
        assert!(FanProjData::new(4, 8, 2, 8).is_err());
    }

    #[test]
    fn test_sums() {
        let mut fan = FanProjData::new(4, 8, 2, 5).unwrap();
        fan.fill(1.0);
        assert_abs_diff_eq!(fan.sum_for(0, 0), 15.0);
        assert_abs_diff_eq!(fan.sum_for(2, 0), 20.0);
        assert_abs_diff_eq!(fan.sum(), 560.0);
    }

    #[test]
    fn test_make_and_set_round_trip() {
        let info = info(1, 2);
        let mut pd = ProjDataInMemory::zeros(info.clone());
        for seg in info.segment_nums() {
            for ax in 0..info.get_num_axial_poss(seg) {
                let mut s = pd.get_sinogram(ax, seg).unwrap();
                for (k, v) in s.data_mut().full_iter_mut().enumerate() {
                    *v = (1000 * (seg + 2) + 10 * ax) as f32 + k as f32 * 0.5;
                }
                pd.set_sinogram(&s).unwrap();
            }
        }
        let fan = make_fan_data(&pd).unwrap();
        assert_eq!((fan.num_rings(), fan.max_ring_diff(), fan.half_fan_size()), (8, 2, 7));

        let mut out = ProjDataInMemory::zeros(info.clone());
        set_fan_data(&mut out, &fan).unwrap();
        for seg in info.segment_nums() {
            for ax in 0..info.get_num_axial_poss(seg) {
                let a = pd.get_sinogram(ax, seg).unwrap();
                let b = out.get_sinogram(ax, seg).unwrap();
                for view in 0..32 {
                    for tang in -7..=7 {
                        assert_eq!(a.data()[view][tang], b.data()[view][tang], "{seg} {ax} {view} {tang}");
                    }
                    assert_eq!(b.data()[view][-8], 0.0);
                }
            }
        }
    }

    #[test]
    fn test_make_rejects_span() {
        let pd = ProjDataInMemory::zeros(info(3, 1));
        assert!(matches!(make_fan_data(&pd), Err(ReconError::GeometryMismatch(_))));
    }

    #[test]
    fn test_efficiencies_skip_zeros() {
        let mut fan = FanProjData::new(2, 8, 1, 5).unwrap();
        fan.fill(2.0);
        *fan.get_mut(0, 0, 1, 4) = 0.0;
        let mut eff = DetectorEfficiencies::from_rows(0, vec![Array1d::zeros(0, 7); 2]);
        eff.fill(1.0);
        eff[0][0] = 2.0;
        eff[1][4] = 3.0;
        fan.apply_efficiencies(&eff, true).unwrap();
        assert_eq!(fan.get(1, 4, 0, 0), 0.0);
        assert_eq!(fan.get(0, 1, 1, 5), 2.0);
        assert_eq!(fan.get(0, 0, 1, 3), 4.0);
        assert_eq!(fan.get(1, 4, 1, 0), 6.0);
        assert_eq!(fan.get(1, 0, 1, 4), 6.0);
        fan.apply_efficiencies(&eff, false).unwrap();
        assert_eq!(fan.get(1, 4, 1, 0), 2.0);
        assert!(fan.apply_efficiencies(&DetectorEfficiencies::new(), true).is_err());
    }

    #[test]
    fn test_block_norm() {
        let mut fan = FanProjData::new(2, 8, 1, 5).unwrap();
        fan.fill(1.0);
        let mut block = BlockData3D::new(2, 2);
        *block.get_mut(0, 0, 1, 1) = 0.5;
        assert_eq!(block.get(2, 2, 3, 3), 0.5);
        fan.apply_block_norm(&block, true).unwrap();
        assert_eq!(fan.get(0, 1, 1, 5), 0.5);
        assert_eq!(fan.get(1, 5, 0, 1), 0.5);
        assert_eq!(fan.get(0, 5, 1, 1), 1.0);
        assert!(fan.apply_block_norm(&BlockData3D::new(3, 2), true).is_err());
    }

    #[test]
    fn test_kl() {
        let mut a = FanProjData::new(2, 8, 1, 5).unwrap();
        a.fill(1.0);
        assert_abs_diff_eq!(a.kl(&a.clone(), 1e-6).unwrap(), 0.0);
        let b = FanProjData::new(2, 8, 0, 5).unwrap();
        assert!(a.kl(&b, 1e-6).is_err());
    }

    #[test]
    fn test_repair_offsets_keeps_layout() {
        let mut fan = FanProjData::new(3, 8, 1, 5).unwrap();
        *fan.get_mut(2, 7, 1, 3) = 1.5;
        let before = fan.clone();
        fan.repair_offsets().unwrap();
        assert_eq!(fan, before);
    }

    #[test]
    fn test_repair_offsets_trusts_geometry() {
        let mut fan = FanProjData::new(3, 8, 1, 5).unwrap();
        let expected = FanProjData::new(3, 8, 1, 5).unwrap();
        let row = &mut fan.data[0][0][0];
        let lo = row.get_min_index();
        row[lo] = 2.0;
        row[lo + 4] = 3.0;
        row.resize_1d(lo, lo + 2);
        fan.data[1][3][1].set_offset(100);

        fan.repair_offsets().unwrap();
        assert_eq!(fan.data.get_index_range(), expected.data.get_index_range());
        let row = &fan.data[0][0][0];
        assert_eq!(row[lo], 2.0);
        assert_eq!(row.get_max_index(), lo + 4);
        assert_eq!(row[lo + 4], 0.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fan.bin");
        let mut fan = FanProjData::new(3, 8, 1, 5).unwrap();
        *fan.get_mut(0, 2, 1, 6) = 7.5;
        fan.save(&path).unwrap();
        let loaded = FanProjData::load(&path).unwrap();
        assert_eq!(loaded, fan);
        assert!(matches!(
            FanProjData::load(dir.path().join("missing.bin")),
            Err(ReconError::Io(..))
        ));
    }
}
