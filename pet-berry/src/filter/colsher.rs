//! 三维重建使用的 Colsher 滤波器.

use super::fft::{generalised_hamming, signed_freq, Fft2d};
use super::ramp::check_window;
use crate::array::Array2d;
use crate::error::{ReconError, ReconResult};
use crate::proj_data::Viewgram;
use ndarray::Array2;
use rustfft::num_complex::Complex32;
use std::f32::consts::PI;
use std::fmt::Write;

/// Colsher 滤波器的构造参数.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ColsherParameters {
    /// 频域高度 (轴向, 2 的幂).
    pub height: usize,
    /// 频域宽度 (径向, 2 的幂).
    pub width: usize,
    /// 当前段的响应线与 z 轴的夹角.
    pub gamma: f32,
    /// 参与重建的最大极角.
    pub theta_max: f32,
    /// 径向采样间隔.
    pub d_a: f32,
    /// 投影平面内的轴向采样间隔.
    pub d_b: f32,
    /// 轴向窗参数.
    pub alpha_axial: f32,
    /// 轴向截止频率.
    pub fc_axial: f32,
    /// 径向窗参数.
    pub alpha_planar: f32,
    /// 径向截止频率.
    pub fc_planar: f32,
}

/// 二维频域 Colsher 滤波器.
///
/// 对频率 `nu = (nu_a, nu_b)`, 令 `psi` 为其在图像空间中与 z 轴的夹角
/// (`cos psi = nu_b * sin(gamma) / |nu|`), 响应为
///
/// ```text
/// H = |nu| / pi                                  sin(psi) <= sin(theta_max)
/// H = |nu| / (2 * asin(sin(theta_max) / sin(psi)))  其他
/// ```
///
/// 再乘以两个方向各自的广义 Hamming 窗. 响应是实数且关于原点对称, 因此两个视角图
/// 可以分别放在实部与虚部中一起滤波.
#[derive(Clone, Debug)]
pub struct ColsherFilter {
    params: ColsherParameters,
    response: Array2<f32>,
    fft: Fft2d,
}

impl ColsherFilter {
    /// 构造滤波器.
    pub fn new(params: ColsherParameters) -> ReconResult<Self> {
        let ColsherParameters {
            height,
            width,
            gamma,
            theta_max,
            d_a,
            d_b,
            ..
        } = params;
        for n in [height, width] {
            if n < 2 || !n.is_power_of_two() {
                return Err(ReconError::InvalidParameter(format!(
                    "Colsher 滤波器尺寸必须为 2 的幂, 实际为 {height}x{width}"
                )));
            }
        }
        if !(theta_max > 0.0 && theta_max < PI / 2.0) {
            return Err(ReconError::InvalidParameter(format!(
                "theta_max 必须在 (0, pi/2) 内, 实际为 {theta_max}"
            )));
        }
        if !(d_a > 0.0 && d_b > 0.0) {
            return Err(ReconError::InvalidParameter(format!(
                "采样间隔必须为正, 实际为 d_a = {d_a}, d_b = {d_b}"
            )));
        }
        check_window(params.alpha_axial, params.fc_axial)?;
        check_window(params.alpha_planar, params.fc_planar)?;

        let sin_gamma = gamma.sin();
        let sin_theta_max = theta_max.sin();
        let response = Array2::from_shape_fn((height, width), |(i, j)| {
            let kb = signed_freq(i, height) as f32;
            let ka = signed_freq(j, width) as f32;
            let nu_a = ka / (width as f32 * d_a);
            let nu_b = kb / (height as f32 * d_b);
            let fr = nu_a.hypot(nu_b);
            if fr == 0.0 {
                return 0.0;
            }
            let cos_psi = (nu_b * sin_gamma / fr).clamp(-1.0, 1.0);
            let sin_psi = (1.0 - cos_psi * cos_psi).sqrt();
            let aperture = if sin_psi <= sin_theta_max {
                PI
            } else {
                2.0 * (sin_theta_max / sin_psi).asin()
            };
            let window = generalised_hamming(ka / width as f32, params.alpha_planar, params.fc_planar)
                * generalised_hamming(kb / height as f32, params.alpha_axial, params.fc_axial);
            fr / aperture * window
        });

        Ok(Self {
            params,
            response,
            fft: Fft2d::new(height, width),
        })
    }

    /// 构造参数.
    #[inline]
    pub fn params(&self) -> &ColsherParameters {
        &self.params
    }

    /// 频率下标 `(i, j)` 处的响应, `i` 为轴向.
    #[inline]
    pub fn response(&self, i: usize, j: usize) -> f32 {
        self.response[[i, j]]
    }

    /// 同时滤波两个视角图: `a` 放在实部, `b` 放在虚部.
    ///
    /// 两个视角图的大小必须一致且不超过滤波器尺寸.
    pub fn filter_pair(&self, a: &mut Viewgram, b: &mut Viewgram) -> ReconResult<()> {
        let (height, width) = self.fft.dim();
        let (a0, a1) = (a.get_min_axial_pos_num(), a.get_max_axial_pos_num());
        let (t0, t1) = (a.get_min_tangential_pos_num(), a.get_max_tangential_pos_num());
        if (b.get_min_axial_pos_num(), b.get_max_axial_pos_num()) != (a0, a1)
            || (b.get_min_tangential_pos_num(), b.get_max_tangential_pos_num()) != (t0, t1)
        {
            return Err(ReconError::GeometryMismatch(
                "成对滤波的两个视角图大小不一致".to_owned(),
            ));
        }
        if (a1 - a0 + 1) as usize > height || (t1 - t0 + 1) as usize > width {
            return Err(ReconError::GeometryMismatch(format!(
                "视角图 {}x{} 超出 Colsher 滤波器尺寸 {height}x{width}",
                a1 - a0 + 1,
                t1 - t0 + 1
            )));
        }

        let mut buf = Array2::<Complex32>::zeros((height, width));
        pack(&mut buf, a.data(), b.data());
        self.fft.forward(&mut buf);
        buf.zip_mut_with(&self.response, |c, &h| *c *= h);
        self.fft.inverse(&mut buf);
        unpack(&buf, a.data_mut(), b.data_mut());
        Ok(())
    }

    /// 参数说明, 写入日志.
    pub fn parameter_info(&self) -> String {
        let p = &self.params;
        let mut s = String::new();
        let _ = writeln!(s, "Colsher filter :");
        let _ = writeln!(s, "  size := {} x {}", p.height, p.width);
        let _ = writeln!(s, "  gamma := {}", p.gamma);
        let _ = writeln!(s, "  theta_max := {}", p.theta_max);
        let _ = writeln!(s, "  d_a := {}", p.d_a);
        let _ = writeln!(s, "  d_b := {}", p.d_b);
        let _ = writeln!(s, "  alpha axial := {}, cut-off axial := {}", p.alpha_axial, p.fc_axial);
        let _ = write!(s, "  alpha planar := {}, cut-off planar := {}", p.alpha_planar, p.fc_planar);
        s
    }
}

fn pack(buf: &mut Array2<Complex32>, re: &Array2d<f32>, im: &Array2d<f32>) {
    for ((mut out, a), b) in buf.rows_mut().into_iter().zip(re.iter()).zip(im.iter()) {
        for ((c, &x), &y) in out.iter_mut().zip(a.as_slice()).zip(b.as_slice()) {
            *c = Complex32::new(x, y);
        }
    }
}

fn unpack(buf: &Array2<Complex32>, re: &mut Array2d<f32>, im: &mut Array2d<f32>) {
    for ((row, a), b) in buf.rows().into_iter().zip(re.iter_mut()).zip(im.iter_mut()) {
        for ((c, x), y) in row.iter().zip(a.as_mut_slice()).zip(b.as_mut_slice()) {
            *x = c.re;
            *y = c.im;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proj_data::{ProjDataInfo, Scanner};
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn params() -> ColsherParameters {
        ColsherParameters {
            height: 32,
            width: 32,
            gamma: PI / 2.0 - 0.05,
            theta_max: 0.2,
            d_a: 4.0,
            d_b: 2.5,
            alpha_axial: 1.0,
            fc_axial: 0.5,
            alpha_planar: 1.0,
            fc_planar: 0.5,
        }
    }

    #[test]
    fn test_response_shape() {
        let f = ColsherFilter::new(params()).unwrap();
        assert_eq!(f.response(0, 0), 0.0);
        for (i, j) in [(1, 3), (5, 0), (0, 7), (16, 16)] {
            assert_abs_diff_eq!(f.response(i, j), f.response((32 - i) % 32, (32 - j) % 32));
        }
        // 纯径向频率: psi = pi/2, 响应为 |nu| / (2 * theta_max).
        let nu = 3.0 / (32.0 * 4.0);
        assert_abs_diff_eq!(f.response(0, 3), nu / (2.0 * 0.2), epsilon = 1e-5);
        // 几乎纯轴向的频率落在完全采样区域.
        let nu = 5.0 / (32.0 * 2.5);
        assert_abs_diff_eq!(f.response(5, 0), nu / PI, epsilon = 1e-5);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(ColsherFilter::new(ColsherParameters { width: 30, ..params() }).is_err());
        assert!(ColsherFilter::new(ColsherParameters { theta_max: 0.0, ..params() }).is_err());
        assert!(ColsherFilter::new(ColsherParameters { fc_axial: 0.0, ..params() }).is_err());
    }

    #[test]
    fn test_pair_filtering_is_independent() {
        let scanner = Scanner::by_name("test").unwrap();
        let info = Arc::new(ProjDataInfo::cylindrical(scanner, 1, 2, 8, 16, true).unwrap());
        let f = ColsherFilter::new(params()).unwrap();

        let mut a = Viewgram::zeros(info.clone(), 0, 1);
        let mut b = Viewgram::zeros(info.clone(), 4, 1);
        for (ax, row) in a.data_mut().indexed_iter_mut() {
            for (t, v) in row.indexed_iter_mut() {
                *v = ((ax - 3) * (ax - 3) + t * t) as f32;
            }
        }
        b.data_mut()[3][0] = 1.0;

        let (mut a1, mut b1) = (a.clone(), b.clone());
        f.filter_pair(&mut a1, &mut b1).unwrap();
        let (mut a2, mut zero) = (a.clone(), Viewgram::zeros(info.clone(), 4, 1));
        f.filter_pair(&mut a2, &mut zero).unwrap();
        let (mut b2, mut zero) = (b.clone(), Viewgram::zeros(info, 0, 1));
        f.filter_pair(&mut b2, &mut zero).unwrap();

        for (x, y) in a1.data().full_iter().zip(a2.data().full_iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-3);
        }
        for (x, y) in b1.data().full_iter().zip(b2.data().full_iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-4);
        }
        // 点源滤波后中心为正.
        assert!(b1.data()[3][0] > 0.0);
    }
}
