//! 一维斜坡 (Ramp) 滤波器.

use super::fft::{generalised_hamming, signed_freq, Fft1d};
use crate::array::Array1d;
use crate::error::{ReconError, ReconResult};
use rustfft::num_complex::Complex32;
use std::f32::consts::PI;
use std::fmt::Write;

/// 频域斜坡滤波器, 乘以广义 Hamming 窗.
///
/// 响应由空间域的 Ram-Lak 核经 FFT 得到, 因此直流分量接近 0 而不是恰好为 0,
/// 避免补零后出现整体偏置.
#[derive(Clone, Debug)]
pub struct RampFilter {
    sampling: f32,
    alpha: f32,
    fc: f32,
    response: Vec<f32>,
    fft: Fft1d,
}

impl RampFilter {
    /// `sampling` 为径向采样间隔, `fft_size` 为补零后的长度 (2 的幂),
    /// `alpha` 和 `fc` 为窗参数.
    pub fn new(sampling: f32, fft_size: usize, alpha: f32, fc: f32) -> ReconResult<Self> {
        if !(sampling > 0.0) {
            return Err(ReconError::InvalidParameter(format!(
                "径向采样间隔必须为正, 实际为 {sampling}"
            )));
        }
        if fft_size < 2 || !fft_size.is_power_of_two() {
            return Err(ReconError::InvalidParameter(format!(
                "FFT 长度必须为不小于 2 的 2 的幂, 实际为 {fft_size}"
            )));
        }
        check_window(alpha, fc)?;

        let d2 = sampling * sampling;
        let mut kernel: Vec<Complex32> = (0..fft_size)
            .map(|j| {
                let lag = signed_freq(j, fft_size);
                let h = if lag == 0 {
                    1.0 / (4.0 * d2)
                } else if lag % 2 != 0 {
                    -1.0 / (PI * PI * (lag * lag) as f32 * d2)
                } else {
                    0.0
                };
                Complex32::new(h, 0.0)
            })
            .collect();
        let fft = Fft1d::new(fft_size);
        fft.forward(&mut kernel);
        let response = kernel
            .iter()
            .enumerate()
            .map(|(k, c)| {
                let f = signed_freq(k, fft_size) as f32 / fft_size as f32;
                c.re * sampling * generalised_hamming(f, alpha, fc)
            })
            .collect();

        Ok(Self {
            sampling,
            alpha,
            fc,
            response,
            fft,
        })
    }

    /// 补零后的长度.
    #[inline]
    pub fn fft_size(&self) -> usize {
        self.fft.len()
    }

    /// 频率下标 `k` 处的响应 (单位为 1/长度).
    #[inline]
    pub fn response(&self, k: usize) -> f32 {
        self.response[k]
    }

    /// 对一行数据原地滤波. 数据长度不能超过 FFT 长度.
    pub fn apply(&self, row: &mut [f32]) {
        debug_assert!(row.len() <= self.fft_size());
        let mut buf = vec![Complex32::default(); self.fft_size()];
        buf.iter_mut()
            .zip(row.iter())
            .for_each(|(b, &v)| *b = Complex32::new(v, 0.0));
        self.fft.forward(&mut buf);
        buf.iter_mut().zip(&self.response).for_each(|(b, &h)| *b *= h);
        self.fft.inverse(&mut buf);
        row.iter_mut().zip(&buf).for_each(|(v, b)| *v = b.re);
    }

    /// 对带偏移的一维数组原地滤波.
    #[inline]
    pub fn apply_array(&self, row: &mut Array1d<f32>) {
        self.apply(row.as_mut_slice());
    }

    /// 参数说明, 写入日志.
    pub fn parameter_info(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "Ramp filter :");
        let _ = writeln!(s, "  sampling distance := {}", self.sampling);
        let _ = writeln!(s, "  FFT length := {}", self.fft_size());
        let _ = writeln!(s, "  alpha := {}", self.alpha);
        let _ = write!(s, "  cut-off frequency := {}", self.fc);
        s
    }
}

pub(crate) fn check_window(alpha: f32, fc: f32) -> ReconResult<()> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(ReconError::InvalidParameter(format!(
            "窗参数 alpha 必须在 [0, 1] 内, 实际为 {alpha}"
        )));
    }
    if !(fc > 0.0 && fc <= 0.5) {
        return Err(ReconError::InvalidParameter(format!(
            "截止频率必须在 (0, 0.5] 内, 实际为 {fc}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_response_is_ramp() {
        let f = RampFilter::new(1.0, 256, 1.0, 0.5).unwrap();
        assert!(f.response(0).abs() < 5e-3);
        assert_abs_diff_eq!(f.response(64), 0.25, epsilon = 5e-3);
        assert_abs_diff_eq!(f.response(32), 0.125, epsilon = 5e-3);
        // 对称.
        assert_abs_diff_eq!(f.response(10), f.response(246), epsilon = 1e-5);
    }

    #[test]
    fn test_sampling_scales_response() {
        let f = RampFilter::new(2.0, 256, 1.0, 0.5).unwrap();
        assert_abs_diff_eq!(f.response(64), 0.125, epsilon = 5e-3);
    }

    #[test]
    fn test_cut_off() {
        let f = RampFilter::new(1.0, 64, 1.0, 0.25).unwrap();
        assert_eq!(f.response(20), 0.0);
        assert!(f.response(8) > 0.0);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(RampFilter::new(0.0, 64, 1.0, 0.5).is_err());
        assert!(RampFilter::new(1.0, 60, 1.0, 0.5).is_err());
        assert!(RampFilter::new(1.0, 64, 1.5, 0.5).is_err());
        assert!(RampFilter::new(1.0, 64, 1.0, 0.7).is_err());
    }

    #[test]
    fn test_apply_removes_constant() {
        let f = RampFilter::new(1.0, 128, 1.0, 0.5).unwrap();
        let mut row = Array1d::from_vec(-8, vec![1.0_f32; 17]);
        f.apply_array(&mut row);
        // 常数经斜坡滤波后中心接近 0, 边缘处较高.
        assert!(row[0].abs() < 0.1);
        assert!(row[-8] > row[-7]);
        assert!(row.as_slice().iter().all(|v| v.is_finite()));
    }
}
