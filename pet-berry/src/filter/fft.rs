//! 基于 `rustfft` 的一维/二维变换与频域窗函数.

use ndarray::Array2;
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

/// 补零后的变换长度: 不小于 `(pad + 1) * n` 的最小 2 的幂.
#[inline]
pub fn padded_fft_size(pad: i32, n: i32) -> usize {
    (((pad.max(0) + 1) * n.max(1)) as usize).next_power_of_two()
}

/// 长度为 `n` 的离散频率下标 `k` 对应的有符号下标.
#[inline]
pub(crate) fn signed_freq(k: usize, n: usize) -> i64 {
    if k <= n / 2 {
        k as i64
    } else {
        k as i64 - n as i64
    }
}

/// 广义 Hamming 窗. `f` 以每采样周期数计 (`0..=0.5`), `fc` 为截止频率.
///
/// `f <= fc` 时取 `alpha + (1 - alpha) * cos(pi * f / fc)`, 否则为 0.
/// `alpha = 1` 且 `fc = 0.5` 时窗函数恒为 1.
#[inline]
pub fn generalised_hamming(f: f32, alpha: f32, fc: f32) -> f32 {
    let f = f.abs();
    if f > fc {
        0.0
    } else {
        alpha + (1.0 - alpha) * (std::f32::consts::PI * f / fc).cos()
    }
}

/// 固定长度的一维复数变换. 逆变换带 `1/n` 归一化.
#[derive(Clone)]
pub(crate) struct Fft1d {
    len: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl Fft1d {
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            len,
            forward: planner.plan_fft_forward(len),
            inverse: planner.plan_fft_inverse(len),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn forward(&self, buf: &mut [Complex32]) {
        self.forward.process(buf);
    }

    pub fn inverse(&self, buf: &mut [Complex32]) {
        self.inverse.process(buf);
        let scale = 1.0 / self.len as f32;
        buf.iter_mut().for_each(|c| *c *= scale);
    }
}

impl fmt::Debug for Fft1d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fft1d").field("len", &self.len).finish()
    }
}

/// 固定大小的二维复数变换, 先行后列. 逆变换带 `1/(rows * cols)` 归一化.
#[derive(Clone)]
pub(crate) struct Fft2d {
    rows: Fft1d,
    cols: Fft1d,
}

impl Fft2d {
    /// `height` 行, `width` 列.
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            rows: Fft1d::new(width),
            cols: Fft1d::new(height),
        }
    }

    #[inline]
    pub fn dim(&self) -> (usize, usize) {
        (self.cols.len(), self.rows.len())
    }

    pub fn forward(&self, data: &mut Array2<Complex32>) {
        self.transform(data, |t, buf| t.forward(buf));
    }

    pub fn inverse(&self, data: &mut Array2<Complex32>) {
        self.transform(data, |t, buf| t.inverse(buf));
    }

    fn transform<F>(&self, data: &mut Array2<Complex32>, op: F)
    where
        F: Fn(&Fft1d, &mut [Complex32]),
    {
        debug_assert_eq!(data.dim(), self.dim());
        let mut buf = vec![Complex32::default(); self.rows.len()];
        for mut row in data.rows_mut() {
            buf.iter_mut().zip(row.iter()).for_each(|(b, v)| *b = *v);
            op(&self.rows, &mut buf);
            row.iter_mut().zip(&buf).for_each(|(v, b)| *v = *b);
        }
        let mut buf = vec![Complex32::default(); self.cols.len()];
        for mut col in data.columns_mut() {
            buf.iter_mut().zip(col.iter()).for_each(|(b, v)| *b = *v);
            op(&self.cols, &mut buf);
            col.iter_mut().zip(&buf).for_each(|(v, b)| *v = *b);
        }
    }
}

impl fmt::Debug for Fft2d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fft2d").field("dim", &self.dim()).finish()
    }
}
