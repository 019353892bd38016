//! 三维重投影 (3DRP) 滤波反投影重建.
//!
//! 重建分两步:
//!
//! 1. 二维: 把直接段附近的若干段用 SSRB 合并为一个段, 用 Ramp 滤波的二维 FBP
//!    得到初始图像. 也可以直接读入一幅事先重建好的图像.
//! 2. 三维: 对每个段, 先把视角图的轴向范围扩展到能覆盖整个视野, 扩展出的位置由
//!    初始图像正投影补全, 再做 Colsher 滤波并反投影到输出图像.

use super::fbp2d::Fbp2dReconstruction;
use super::full_log::FullLog;
use super::params::Fbp3drpParameters;
use crate::array::Array2d;
use crate::consts::{defaults, DIRECT_SEGMENT};
use crate::error::{ReconError, ReconResult};
use crate::filter::{padded_fft_size, ColsherFilter, ColsherParameters, RampFilter};
use crate::image::{Axis, VoxelsOnCartesianGrid};
use crate::projector::{
    BackProjectorByBin, BackProjectorByBinUsingInterpolation, ForwardProjectorByBin,
    ForwardProjectorByBinUsingRayTracing,
};
use crate::proj_data::{
    ssrb, ssrb_info, ProjData, ProjDataInfo, RelatedViewgrams, Sinogram, Viewgram,
};
use crate::timer::AccTimer;
use log::{info, warn};
use std::f32::consts::FRAC_PI_2;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// SSRB 实际合并的段数.
///
/// `requested` 为 `-1` 时: 段 0 只含一个环差则合并 3 个段, 否则 (段 0 已经是多个环差的
/// 合并) 不再合并.
pub fn num_segments_to_combine_to_use(info: &ProjDataInfo, requested: i32) -> i32 {
    if requested != defaults::AUTO {
        return requested;
    }
    if info.get_min_ring_difference(DIRECT_SEGMENT) != info.get_max_ring_difference(DIRECT_SEGMENT) {
        1
    } else {
        3
    }
}

/// 段 `segment_num` 需要扩展到的轴向位置范围 `(rmin, rmax)`.
///
/// 由环半径, 视野半径和平均环差求出刚好越过图像轴向边界的响应线所在的虚拟环,
/// `rmin` 向下取整, `rmax` 与之关于段的原有范围对称.
pub fn find_rmin_rmax(
    info: &ProjDataInfo,
    segment_num: i32,
    image: &VoxelsOnCartesianGrid,
) -> (i32, i32) {
    let fovrad = ((info.get_num_tangential_poss() / 2 - 1) as f32) * info.get_sampling_in_s();
    let radius = info.get_ring_radius();
    let delta = info.get_average_ring_difference(segment_num);
    let single_rd =
        info.get_min_ring_difference(segment_num) == info.get_max_ring_difference(segment_num);
    // 每个虚拟环对应的图像平面数, 以及每个环对应的虚拟环数.
    let (planes_per_virtual_ring, virtual_rings_per_ring) = if single_rd { (2.0, 1.0) } else { (1.0, 2.0) };

    let min_ax = info.get_min_axial_pos_num(segment_num);
    let max_ax = info.get_max_axial_pos_num(segment_num);
    let [(z_min, z_max), _, _] = image.bounds();

    let offset = (z_max + z_min) as f32 / 2.0
        - planes_per_virtual_ring
            * (max_ax as f32 + virtual_rings_per_ring * delta + min_ax as f32)
            / 2.0;
    let z = -delta * planes_per_virtual_ring * virtual_rings_per_ring * (fovrad + radius)
        / (2.0 * radius)
        + z_min as f32
        - 0.5;
    let rmin = ((z - offset) / planes_per_virtual_ring).floor() as i32;
    let rmax = max_ax + (min_ax - rmin);
    (rmin, rmax)
}

/// 正投影与测量数据之间的线性最小二乘拟合 `measured ~ alpha * calculated + beta`.
///
/// 方程组奇异时返回 `None`.
pub fn best_fit(measured: &Array2d<f32>, calculated: &Array2d<f32>) -> Option<(f32, f32)> {
    let (mut n, mut meas_sum, mut calc_sum, mut meas_calc, mut calc_sq) = (0.0_f64, 0.0, 0.0, 0.0, 0.0);
    for (&m, &c) in measured.full_iter().zip(calculated.full_iter()) {
        let (m, c) = (m as f64, c as f64);
        n += 1.0;
        meas_sum += m;
        calc_sum += c;
        meas_calc += m * c;
        calc_sq += c * c;
    }
    let det = n * calc_sq - calc_sum * calc_sum;
    if det == 0.0 {
        return None;
    }
    let alpha = (meas_calc * n - meas_sum * calc_sum) / det;
    let beta = (calc_sq * meas_sum - calc_sum * meas_calc) / det;
    Some((alpha as f32, beta as f32))
}

fn colsher_parameters(
    params: &Fbp3drpParameters,
    info: &ProjDataInfo,
    segment_num: i32,
    num_axial_poss: i32,
) -> ColsherParameters {
    let gamma = FRAC_PI_2 - info.get_tantheta(segment_num).atan();
    ColsherParameters {
        height: padded_fft_size(params.pad_z, num_axial_poss),
        width: padded_fft_size(params.pad_s, info.get_num_tangential_poss()),
        gamma,
        theta_max: info.get_tantheta(params.max_segment_num_to_process).atan(),
        d_a: info.get_sampling_in_s(),
        d_b: info.get_sampling_in_m(segment_num) * gamma.sin(),
        alpha_axial: params.alpha_colsher_axial,
        fc_axial: params.fc_colsher_axial,
        alpha_planar: params.alpha_colsher_planar,
        fc_planar: params.fc_colsher_planar,
    }
}

/// FBP3DRP 重建.
///
/// 重建对象可以重复使用: 每次 [`Self::reconstruct`] 都重新打开日志,
/// 并在返回前恢复参数中的最大段号.
pub struct Fbp3drpReconstruction {
    params: Fbp3drpParameters,
    proj_data: Box<dyn ProjData>,
    forward_projector: Box<dyn ForwardProjectorByBin>,
    back_projector: Box<dyn BackProjectorByBin>,
    timer: AccTimer,
    alpha_fit: f32,
    beta_fit: f32,
    /// 上一次使用的 Colsher 滤波器及其段号.
    colsher: Option<(i32, ColsherFilter)>,
    estimated: Option<VoxelsOnCartesianGrid>,
    log: FullLog,
}

impl Fbp3drpReconstruction {
    /// 使用光线追踪正投影器和插值反投影器.
    ///
    /// 投影数据必须是弧校正的.
    pub fn new(params: Fbp3drpParameters, proj_data: Box<dyn ProjData>) -> ReconResult<Self> {
        params.check()?;
        if !proj_data.info().is_arc_corrected() {
            return Err(ReconError::GeometryMismatch(
                "FBP3DRP 要求弧校正的投影数据".to_owned(),
            ));
        }
        let max_seg = proj_data.info().get_max_segment_num();
        if params.max_segment_num_to_process > max_seg {
            return Err(ReconError::InvalidParameter(format!(
                "最大段号 {} 超出数据中的 {max_seg}",
                params.max_segment_num_to_process
            )));
        }
        Ok(Self {
            params,
            proj_data,
            forward_projector: Box::new(ForwardProjectorByBinUsingRayTracing::new()),
            back_projector: Box::new(BackProjectorByBinUsingInterpolation::new()),
            timer: AccTimer::new(),
            alpha_fit: 1.0,
            beta_fit: 0.0,
            colsher: None,
            estimated: None,
            log: FullLog::disabled(),
        })
    }

    /// 替换投影器.
    pub fn with_projectors(
        mut self,
        forward_projector: Box<dyn ForwardProjectorByBin>,
        back_projector: Box<dyn BackProjectorByBin>,
    ) -> Self {
        self.forward_projector = forward_projector;
        self.back_projector = back_projector;
        self
    }

    /// 参数.
    #[inline]
    pub fn params(&self) -> &Fbp3drpParameters {
        &self.params
    }

    /// 投影数据.
    #[inline]
    pub fn proj_data(&self) -> &dyn ProjData {
        self.proj_data.as_ref()
    }

    /// 二维阶段得到 (或读入) 的初始图像.
    #[inline]
    pub fn estimated_image(&self) -> Option<&VoxelsOnCartesianGrid> {
        self.estimated.as_ref()
    }

    /// 拟合系数 `(alpha, beta)`.
    #[inline]
    pub fn fit_coefficients(&self) -> (f32, f32) {
        (self.alpha_fit, self.beta_fit)
    }

    /// 整个重建的累计计时器.
    #[inline]
    pub fn timer(&self) -> &AccTimer {
        &self.timer
    }

    /// 正投影器.
    #[inline]
    pub fn forward_projector(&self) -> &dyn ForwardProjectorByBin {
        self.forward_projector.as_ref()
    }

    /// 反投影器.
    #[inline]
    pub fn back_projector(&self) -> &dyn BackProjectorByBin {
        self.back_projector.as_ref()
    }

    /// 全部参数的说明.
    pub fn parameter_info(&self) -> String {
        let mut s = self.params.parameter_info();
        let _ = writeln!(s, "{}", self.forward_projector.parameter_info());
        let _ = writeln!(s, "{}", self.back_projector.parameter_info());
        s
    }

    /// 重建到 `image`. 图像的几何决定输出的范围和体素大小.
    ///
    /// 无法创建 `{prefix}.full_log` 时立即返回错误.
    pub fn reconstruct(&mut self, image: &mut VoxelsOnCartesianGrid) -> ReconResult<()> {
        self.alpha_fit = 1.0;
        self.beta_fit = 0.0;
        self.colsher = None;

        let prefix = self.params.output_filename_prefix.clone();
        self.log = FullLog::create(format!("{prefix}.full_log"))?;
        if self.params.pad_s < 2 || self.params.pad_z < 2 {
            self.log.warn(format_args!(
                "PadS = {}, PadZ = {}: 补零倍数小于 2 时滤波可能产生混叠",
                self.params.pad_s, self.params.pad_z
            ));
        }
        self.timer.reset();
        self.timer.start();

        let requested_max = self.params.max_segment_num_to_process;
        let result = self.run(image);
        self.params.max_segment_num_to_process = requested_max;

        self.timer.stop();
        self.log.line(format_args!("Total time : {} s", self.timer.value_secs()));
        self.log.flush();
        result?;

        self.do_log_file(image);
        info!("FBP3DRP 重建完成, 用时 {} ms", self.timer.get_total_ms());
        Ok(())
    }

    fn run(&mut self, image: &mut VoxelsOnCartesianGrid) -> ReconResult<()> {
        let info = self.proj_data.info().clone();
        if self.params.max_segment_num_to_process == defaults::AUTO {
            self.params.max_segment_num_to_process = info.get_max_segment_num();
        }
        let max_seg = self.params.max_segment_num_to_process;

        self.log.section("FBP3DRP reconstruction");
        let parameters = self.parameter_info();
        self.log.line(parameters);
        self.log.line(info.parameter_info());

        let estimated = match self.params.image_for_reprojection_filename.clone() {
            None => self.do_2d_reconstruction()?,
            Some(path) => self.read_image_for_reprojection(path)?,
        };
        if self.params.fit_projections {
            self.do_best_fit(&estimated)?;
        }

        if max_seg == 0 {
            self.log.warn("max_segment_num_to_process = 0, 使用二维重建结果. Output image will NOT be zoomed.");
            *image = estimated.clone();
        } else {
            self.do_3d_reconstruction(image, &estimated)?;
        }
        self.estimated = Some(estimated);
        Ok(())
    }

    fn do_2d_reconstruction(&mut self) -> ReconResult<VoxelsOnCartesianGrid> {
        let info = self.proj_data.info().clone();
        self.log.section("2D FBP");

        let mut n = num_segments_to_combine_to_use(&info, self.params.num_segments_to_combine);
        let available = 2 * info.get_max_segment_num() + 1;
        if n > available {
            self.log.warn(format_args!(
                "数据只有 {available} 个段可供合并, 合并段数从 {n} 改为 {available}"
            ));
            n = available;
        }

        let rebinned;
        let direct: &dyn ProjData = if n > 1 {
            self.log.line(format_args!("  - SSRB: combining {n} segments"));
            let out_info = Arc::new(ssrb_info(&info, n, (n - 1) / 2)?);
            rebinned = ssrb(out_info, self.proj_data.as_ref(), n, true)?;
            &rebinned
        } else {
            self.proj_data.as_ref()
        };

        let fft_size = padded_fft_size(self.params.pad_s, info.get_num_tangential_poss());
        let ramp = RampFilter::new(
            info.get_sampling_in_s(),
            fft_size,
            self.params.alpha_ramp,
            self.params.fc_ramp,
        )?;
        self.log.line(ramp.parameter_info());

        let mut estimated = VoxelsOnCartesianGrid::from_proj_data_info(&info, 1.0);
        let mut fbp = Fbp2dReconstruction::new(ramp);
        fbp.reconstruct(direct, &mut estimated)?;
        self.log.stats(
            "2D FBP image",
            estimated.find_min(),
            estimated.find_max(),
            estimated.sum(),
        );
        self.log.line(format_args!("  - 2D FBP time : {} ms", fbp.timer().get_total_ms()));

        if self.params.save_intermediate_files {
            self.save_image(&estimated, "_estimated")?;
        }
        Ok(estimated)
    }

    fn read_image_for_reprojection(&mut self, path: PathBuf) -> ReconResult<VoxelsOnCartesianGrid> {
        self.log.section("Reading image for reprojection");
        self.log.line(format_args!("  - {}", path.display()));
        let image = VoxelsOnCartesianGrid::read_nifti(&path)?;
        self.log.stats("image", image.find_min(), image.find_max(), image.sum());
        Ok(image)
    }

    /// 在活度最大的平面上, 把正投影拟合到测量的直接正弦图.
    fn do_best_fit(&mut self, estimated: &VoxelsOnCartesianGrid) -> ReconResult<()> {
        let info = self.proj_data.info().clone();
        self.log.section("Fitting projections");

        let [z, _, _] = estimated.argmax();
        let m = estimated.coord_mm(Axis::Z, z);
        let ax = (info.get_axial_pos_for_m(DIRECT_SEGMENT, m).round() as i32)
            .clamp(0, info.get_max_axial_pos_num(DIRECT_SEGMENT));
        let measured = self.proj_data.get_sinogram(ax, DIRECT_SEGMENT)?;

        let mut calculated = Sinogram::zeros(info.clone(), ax, DIRECT_SEGMENT);
        self.forward_projector.timer_mut().start();
        for view in 0..info.get_num_views() {
            let mut v = Viewgram::zeros(info.clone(), view, DIRECT_SEGMENT);
            let result = self.forward_projector.forward_project_viewgram(&mut v, estimated, ax, ax);
            if let Err(e) = result {
                self.forward_projector.timer_mut().stop();
                return Err(e);
            }
            calculated.data_mut()[view] = v.data()[ax].clone();
        }
        self.forward_projector.timer_mut().stop();

        match best_fit(measured.data(), calculated.data()) {
            Some((alpha, beta)) => {
                self.alpha_fit = alpha;
                self.beta_fit = beta;
                self.log.line(format_args!(
                    "  - plane {z} (axial position {ax}): alpha = {alpha}, beta = {beta}"
                ));
            }
            None => self.log.warn("拟合方程组奇异, 不做拟合 (alpha = 1, beta = 0)"),
        }
        Ok(())
    }

    fn do_3d_reconstruction(
        &mut self,
        image: &mut VoxelsOnCartesianGrid,
        estimated: &VoxelsOnCartesianGrid,
    ) -> ReconResult<()> {
        let info = self.proj_data.info().clone();
        self.log.section("3D FBP");
        image.fill(0.0);

        for seg in 0..=self.params.max_segment_num_to_process {
            let (rmin, rmax) = find_rmin_rmax(&info, seg, image);
            self.log.line(format_args!(
                "Segment {seg}: axial positions [{}, {}] extended to [{rmin}, {rmax}]",
                info.get_min_axial_pos_num(seg),
                info.get_max_axial_pos_num(seg)
            ));
            for view in 0..=info.get_num_views() / 4 {
                let viewgrams = self.proj_data.get_related_viewgrams(view, seg)?;
                self.process_viewgrams(viewgrams, image, estimated, rmin, rmax)?;
            }
            self.log.stats(
                format_args!("image after segment {seg}"),
                image.find_min(),
                image.find_max(),
                image.sum(),
            );
            if self.params.save_intermediate_files {
                self.save_image(image, &format!("_afterseg{seg}"))?;
            }
        }
        self.log.line(format_args!(
            "  - forward projection time : {} s",
            self.forward_projector.timer().value_secs()
        ));
        self.log.line(format_args!(
            "  - back projection time : {} s",
            self.back_projector.timer().value_secs()
        ));
        Ok(())
    }

    fn process_viewgrams(
        &mut self,
        mut viewgrams: RelatedViewgrams,
        image: &mut VoxelsOnCartesianGrid,
        estimated: &VoxelsOnCartesianGrid,
        rmin: i32,
        rmax: i32,
    ) -> ReconResult<()> {
        let seg = viewgrams.get_basic_segment_num();
        let (orig_min, orig_max) = (viewgrams.get_min_axial_pos_num(), viewgrams.get_max_axial_pos_num());
        let (new_min, new_max) = (rmin.min(orig_min), rmax.max(orig_max));
        viewgrams.grow_axial(new_min, new_max);

        let missing = [(new_min, orig_min - 1), (orig_max + 1, new_max)];
        for &(lo, hi) in missing.iter().filter(|(lo, hi)| lo <= hi) {
            self.forward_projector.forward_project(&mut viewgrams, estimated, lo, hi)?;
            if self.params.fit_projections {
                let (alpha, beta) = (self.alpha_fit, self.beta_fit);
                for v in viewgrams.iter_mut() {
                    for ax in lo..=hi {
                        v.data_mut()[ax]
                            .as_mut_slice()
                            .iter_mut()
                            .for_each(|x| *x = alpha * *x + beta);
                    }
                }
            }
        }

        self.colsher_filter(&mut viewgrams)?;

        let info = viewgrams.info().clone();
        let num_ring_diffs = info.get_max_ring_difference(seg) - info.get_min_ring_difference(seg) + 1;
        if num_ring_diffs > 1 {
            viewgrams *= num_ring_diffs as f32;
        }
        if seg == self.params.max_segment_num_to_process {
            viewgrams /= 2.0;
        }

        self.back_projector.back_project(image, &viewgrams, rmin, rmax)
    }

    /// 按段缓存 Colsher 滤波器, 段号变化时重建.
    fn colsher_filter(&mut self, viewgrams: &mut RelatedViewgrams) -> ReconResult<()> {
        let seg = viewgrams.get_basic_segment_num();
        if self.colsher.as_ref().map(|(s, _)| *s) != Some(seg) {
            let num_axial = viewgrams.get_max_axial_pos_num() - viewgrams.get_min_axial_pos_num() + 1;
            let params = colsher_parameters(&self.params, viewgrams.info(), seg, num_axial);
            let filter = ColsherFilter::new(params)?;
            self.log.line(format_args!("Segment {seg}:"));
            self.log.line(filter.parameter_info());
            self.colsher = Some((seg, filter));
        }
        if let Some((_, filter)) = &self.colsher {
            for pair in viewgrams.pairs_mut() {
                if let [a, b] = pair {
                    filter.filter_pair(a, b)?;
                }
            }
        }
        Ok(())
    }

    fn save_image(&mut self, image: &VoxelsOnCartesianGrid, suffix: &str) -> ReconResult<()> {
        let path = PathBuf::from(format!("{}{suffix}.nii", self.params.output_filename_prefix));
        self.log.line(format_args!("  - saving {}", path.display()));
        image.write_nifti(&path)
    }

    /// 写出 `{prefix}.log`. 无法写出时只发出警告.
    fn do_log_file(&self, image: &VoxelsOnCartesianGrid) {
        let path = PathBuf::from(format!("{}.log", self.params.output_filename_prefix));
        let result = File::create(&path).and_then(|f| {
            let mut w = BufWriter::new(f);
            self.write_summary(&mut w, image)?;
            w.flush()
        });
        if let Err(e) = result {
            warn!("无法写出日志文件 {}: {e}", path.display());
        }
    }

    fn write_summary<W: Write>(&self, w: &mut W, image: &VoxelsOnCartesianGrid) -> io::Result<()> {
        let date = chrono::Local::now().format("%a %b %e %H:%M:%S %Y");
        writeln!(w, "Date of the image reconstruction : {date}")?;
        writeln!(w)?;
        writeln!(w, "{}", self.parameter_info())?;
        writeln!(
            w,
            "Output image : min = {}, max = {}, sum = {}",
            image.find_min(),
            image.find_max(),
            image.sum()
        )?;
        writeln!(w)?;
        writeln!(w, "TIMING RESULTS :")?;
        writeln!(w, "Total time : {} s", self.timer.value_secs())?;
        writeln!(
            w,
            "Forward projection time : {} s",
            self.forward_projector.timer().value_secs()
        )?;
        writeln!(
            w,
            "Back projection time : {} s",
            self.back_projector.timer().value_secs()
        )?;
        Ok(())
    }
}

impl std::fmt::Debug for Fbp3drpReconstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fbp3drpReconstruction")
            .field("params", &self.params)
            .field("alpha_fit", &self.alpha_fit)
            .field("beta_fit", &self.beta_fit)
            .field("colsher_segment", &self.colsher.as_ref().map(|(s, _)| *s))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Array1d;
    use crate::projector::forward_project_proj_data;
    use crate::proj_data::{ProjDataInMemory, Scanner};
    use approx::assert_abs_diff_eq;
    use std::path::Path;

    fn test_info(span: i32, max_delta: i32) -> Arc<ProjDataInfo> {
        let scanner = Scanner::by_name("test").unwrap();
        Arc::new(ProjDataInfo::cylindrical(scanner, span, max_delta, 32, 32, true).unwrap())
    }

    fn cylinder(info: &ProjDataInfo, radius: f32) -> VoxelsOnCartesianGrid {
        let mut image = VoxelsOnCartesianGrid::from_proj_data_info(info, 1.0);
        let [_, (y0, y1), (x0, x1)] = image.bounds();
        let ys: Vec<f32> = (y0..=y1).map(|i| image.coord_mm(Axis::Y, i)).collect();
        let xs: Vec<f32> = (x0..=x1).map(|i| image.coord_mm(Axis::X, i)).collect();
        image.for_each_plane_mut(|_, plane| {
            for (row, &y) in plane.iter_mut().zip(&ys) {
                for (v, &x) in row.as_mut_slice().iter_mut().zip(&xs) {
                    if x * x + y * y <= radius * radius {
                        *v = 1.0;
                    }
                }
            }
        });
        image
    }

    fn simulate(info: Arc<ProjDataInfo>) -> ProjDataInMemory {
        let phantom = cylinder(&info, 40.0);
        let mut pd = ProjDataInMemory::zeros(info);
        let mut fp = ForwardProjectorByBinUsingRayTracing::new();
        forward_project_proj_data(&mut fp, &phantom, &mut pd).unwrap();
        pd
    }

    fn centre_mean(image: &VoxelsOnCartesianGrid) -> f32 {
        let [(z0, z1), _, _] = image.bounds();
        let plane = &image.data()[(z0 + z1) / 2];
        let mut sum = 0.0;
        for y in -2..=2 {
            for x in -2..=2 {
                sum += plane[y][x];
            }
        }
        sum / 25.0
    }

    fn prefix_in(dir: &Path) -> String {
        dir.join("recon").to_string_lossy().into_owned()
    }

    #[test]
    fn test_find_rmin_rmax() {
        let scanner = Scanner::new("cylinder", 64, 512, 300.0, 5.0, 2.0, 64).unwrap();
        let info = ProjDataInfo::cylindrical(scanner, 1, 1, 8, 64, true).unwrap();
        let image = VoxelsOnCartesianGrid::from_proj_data_info(&info, 1.0);
        assert_eq!(image.bounds()[0], (0, 126));
        assert_eq!(find_rmin_rmax(&info, 0, &image), (-1, 64));

        // 斜段: rmax 与 rmin 关于原有范围对称.
        let (rmin, rmax) = find_rmin_rmax(&info, 1, &image);
        assert!(rmin < 0);
        assert_eq!(rmax, info.get_max_axial_pos_num(1) + (0 - rmin));
    }

    #[test]
    fn test_num_segments_to_combine() {
        assert_eq!(num_segments_to_combine_to_use(&test_info(1, 2), -1), 3);
        assert_eq!(num_segments_to_combine_to_use(&test_info(3, 4), -1), 1);
        assert_eq!(num_segments_to_combine_to_use(&test_info(1, 2), 5), 5);
    }

    #[test]
    fn test_best_fit() {
        let calc = Array2d::from_rows(0, vec![Array1d::from_vec(0, vec![1.0, 2.0]), Array1d::from_vec(0, vec![3.0, 4.0])]);
        let mut meas = calc.clone();
        meas.full_iter_mut().for_each(|v| *v = 2.0 * *v + 1.0);
        let (alpha, beta) = best_fit(&meas, &calc).unwrap();
        assert_abs_diff_eq!(alpha, 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(beta, 1.0, epsilon = 1e-5);

        let mut flat = calc.clone();
        flat.fill(3.0);
        assert!(best_fit(&meas, &flat).is_none());
    }

    #[test]
    fn test_reconstruct_uniform_cylinder() {
        // 其它测试可能已经安装了 logger.
        let _ = simple_logger::SimpleLogger::new().with_level(log::LevelFilter::Warn).init();
        let dir = tempfile::tempdir().unwrap();
        let info = test_info(1, 2);
        let params = Fbp3drpParameters {
            output_filename_prefix: prefix_in(dir.path()),
            save_intermediate_files: true,
            ..Default::default()
        };
        let mut recon = Fbp3drpReconstruction::new(params, Box::new(simulate(info.clone()))).unwrap();
        let mut image = VoxelsOnCartesianGrid::from_proj_data_info(&info, 1.0);
        recon.reconstruct(&mut image).unwrap();

        assert_abs_diff_eq!(centre_mean(&image), 1.0, epsilon = 0.25);
        let estimated = recon.estimated_image().unwrap();
        assert_abs_diff_eq!(centre_mean(estimated), 1.0, epsilon = 0.1);
        assert_eq!(recon.params().max_segment_num_to_process, -1);
        assert_eq!(recon.fit_coefficients(), (1.0, 0.0));

        let log = std::fs::read_to_string(dir.path().join("recon.log")).unwrap();
        assert!(log.starts_with("Date of the image reconstruction : "));
        assert!(log.contains("Back projection time"));
        let full_log = std::fs::read_to_string(dir.path().join("recon.full_log")).unwrap();
        assert!(full_log.contains("SSRB: combining 3 segments"));
        assert!(full_log.contains("Colsher filter"));
        assert!(dir.path().join("recon_estimated.nii").exists());
        assert!(dir.path().join("recon_afterseg2.nii").exists());
    }

    /// 以 `max_seg` 为最大段号处理段 `seg` 的视角 0, 返回反投影的结果.
    fn back_project_view0(
        recon: &mut Fbp3drpReconstruction,
        max_seg: i32,
        seg: i32,
        estimated: &VoxelsOnCartesianGrid,
    ) -> VoxelsOnCartesianGrid {
        recon.params.max_segment_num_to_process = max_seg;
        let info = recon.proj_data().info().clone();
        let mut image = estimated.get_empty_copy();
        let (rmin, rmax) = find_rmin_rmax(&info, seg, &image);
        let viewgrams = recon.proj_data().get_related_viewgrams(0, seg).unwrap();
        recon.process_viewgrams(viewgrams, &mut image, estimated, rmin, rmax).unwrap();
        image
    }

    fn assert_half_of(half: &VoxelsOnCartesianGrid, full: &VoxelsOnCartesianGrid) {
        assert!(full.data().full_iter().any(|v| v.abs() > 1e-6));
        for (h, f) in half.data().full_iter().zip(full.data().full_iter()) {
            assert_abs_diff_eq!(2.0 * *h, *f, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_outermost_segment_is_halved() {
        let info = test_info(1, 2);
        let estimated = cylinder(&info, 40.0);
        let mut recon = Fbp3drpReconstruction::new(Default::default(), Box::new(simulate(info.clone()))).unwrap();

        // 缓存中的 Colsher 滤波器按段号复用, 两次处理只有边界权重不同.
        let outer = back_project_view0(&mut recon, 1, 1, &estimated);
        let inner = back_project_view0(&mut recon, 2, 1, &estimated);
        assert_half_of(&outer, &inner);

        let not_halved = back_project_view0(&mut recon, 1, 0, &estimated);
        let halved = back_project_view0(&mut recon, 0, 0, &estimated);
        assert_half_of(&halved, &not_halved);
    }

    #[test]
    fn test_small_padding_warns_in_full_log() {
        let dir = tempfile::tempdir().unwrap();
        let info = test_info(1, 1);
        let params = Fbp3drpParameters {
            output_filename_prefix: prefix_in(dir.path()),
            pad_s: 1,
            max_segment_num_to_process: 0,
            ..Default::default()
        };
        let mut recon = Fbp3drpReconstruction::new(params, Box::new(ProjDataInMemory::zeros(info.clone()))).unwrap();
        let mut image = VoxelsOnCartesianGrid::from_proj_data_info(&info, 1.0);
        recon.reconstruct(&mut image).unwrap();
        let full_log = std::fs::read_to_string(dir.path().join("recon.full_log")).unwrap();
        assert!(full_log.contains("WARNING: PadS = 1, PadZ = 2"));
    }

    #[test]
    fn test_direct_only_returns_estimate() {
        let dir = tempfile::tempdir().unwrap();
        let info = test_info(1, 1);
        let params = Fbp3drpParameters {
            output_filename_prefix: prefix_in(dir.path()),
            max_segment_num_to_process: 0,
            ..Default::default()
        };
        let mut recon = Fbp3drpReconstruction::new(params, Box::new(simulate(info.clone()))).unwrap();
        let mut image = VoxelsOnCartesianGrid::from_proj_data_info(&info, 2.0);
        recon.reconstruct(&mut image).unwrap();
        assert_eq!(Some(&image), recon.estimated_image());
        assert_eq!(recon.params().max_segment_num_to_process, 0);
        let full_log = std::fs::read_to_string(dir.path().join("recon.full_log")).unwrap();
        assert!(full_log.contains("NOT be zoomed"));
    }

    #[test]
    fn test_reprojection_image_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let info = test_info(1, 1);
        let data = simulate(info.clone());

        let params = Fbp3drpParameters {
            output_filename_prefix: prefix_in(dir.path()),
            ..Default::default()
        };
        let mut first = Fbp3drpReconstruction::new(params.clone(), Box::new(data.clone())).unwrap();
        let mut a = VoxelsOnCartesianGrid::from_proj_data_info(&info, 1.0);
        first.reconstruct(&mut a).unwrap();
        let path = dir.path().join("estimate.nii");
        first.estimated_image().unwrap().write_nifti(&path).unwrap();

        let params = Fbp3drpParameters {
            image_for_reprojection_filename: Some(path),
            ..params
        };
        let mut second = Fbp3drpReconstruction::new(params, Box::new(data)).unwrap();
        let mut b = a.get_empty_copy();
        second.reconstruct(&mut b).unwrap();
        for (x, y) in a.data().full_iter().zip(b.data().full_iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_fit_projections() {
        let dir = tempfile::tempdir().unwrap();
        let info = test_info(1, 1);
        let params = Fbp3drpParameters {
            output_filename_prefix: prefix_in(dir.path()),
            fit_projections: true,
            ..Default::default()
        };
        let mut recon = Fbp3drpReconstruction::new(params, Box::new(simulate(info.clone()))).unwrap();
        let mut image = VoxelsOnCartesianGrid::from_proj_data_info(&info, 1.0);
        recon.reconstruct(&mut image).unwrap();
        let (alpha, beta) = recon.fit_coefficients();
        // 初始图像与真实分布接近, 拟合接近恒等变换.
        assert_abs_diff_eq!(alpha, 1.0, epsilon = 0.2);
        assert!(beta.abs() < 5.0);
    }

    #[test]
    fn test_fatal_without_full_log() {
        let dir = tempfile::tempdir().unwrap();
        let info = test_info(1, 1);
        let params = Fbp3drpParameters {
            output_filename_prefix: dir.path().join("missing/recon").to_string_lossy().into_owned(),
            ..Default::default()
        };
        let mut recon = Fbp3drpReconstruction::new(params, Box::new(ProjDataInMemory::zeros(info.clone()))).unwrap();
        let mut image = VoxelsOnCartesianGrid::from_proj_data_info(&info, 1.0);
        assert!(matches!(recon.reconstruct(&mut image), Err(ReconError::Io(..))));
    }

    #[test]
    fn test_rejects_bad_setup() {
        let info = test_info(1, 1);
        let too_far = Fbp3drpParameters {
            max_segment_num_to_process: 3,
            ..Default::default()
        };
        assert!(Fbp3drpReconstruction::new(too_far, Box::new(ProjDataInMemory::zeros(info))).is_err());

        let scanner = Scanner::by_name("test").unwrap();
        let non_arc = Arc::new(ProjDataInfo::cylindrical(scanner, 1, 1, 32, 32, false).unwrap());
        let r = Fbp3drpReconstruction::new(Default::default(), Box::new(ProjDataInMemory::zeros(non_arc)));
        assert!(r.is_err());
    }
}
