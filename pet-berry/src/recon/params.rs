//! FBP3DRP 重建参数.

use crate::consts::defaults;
use crate::error::{ReconError, ReconResult};
use std::fmt::Write;
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// FBP3DRP 的全部可调参数.
///
/// 段号和合并段数中的 `-1` 代表自动选择, 见 [`defaults::AUTO`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Fbp3drpParameters {
    /// 径向补零倍数.
    pub pad_s: i32,
    /// 轴向补零倍数.
    pub pad_z: i32,
    /// 二维 Ramp 滤波器的窗参数.
    pub alpha_ramp: f32,
    /// 二维 Ramp 滤波器的截止频率.
    pub fc_ramp: f32,
    /// Colsher 滤波器轴向窗参数.
    pub alpha_colsher_axial: f32,
    /// Colsher 滤波器轴向截止频率.
    pub fc_colsher_axial: f32,
    /// Colsher 滤波器横断面窗参数.
    pub alpha_colsher_planar: f32,
    /// Colsher 滤波器横断面截止频率.
    pub fc_colsher_planar: f32,
    /// SSRB 时合并的段数, `-1` 为自动.
    pub num_segments_to_combine: i32,
    /// 参与三维重建的最大段号, `-1` 为数据中的最大段号.
    pub max_segment_num_to_process: i32,
    /// 用于补全缺失投影的图像. 为空时先做二维重建.
    pub image_for_reprojection_filename: Option<PathBuf>,
    /// 输出文件名前缀, 可以带目录.
    pub output_filename_prefix: String,
    /// 是否保存中间结果.
    pub save_intermediate_files: bool,
    /// 是否把正投影得到的数据拟合到测量数据.
    pub fit_projections: bool,
}

impl Default for Fbp3drpParameters {
    fn default() -> Self {
        Self {
            pad_s: defaults::PAD_S,
            pad_z: defaults::PAD_Z,
            alpha_ramp: defaults::ALPHA,
            fc_ramp: defaults::FC,
            alpha_colsher_axial: defaults::ALPHA,
            fc_colsher_axial: defaults::FC,
            alpha_colsher_planar: defaults::ALPHA,
            fc_colsher_planar: defaults::FC,
            num_segments_to_combine: defaults::AUTO,
            max_segment_num_to_process: defaults::AUTO,
            image_for_reprojection_filename: None,
            output_filename_prefix: defaults::OUTPUT_PREFIX.to_owned(),
            save_intermediate_files: false,
            fit_projections: false,
        }
    }
}

fn check_window(name: &str, alpha: f32, fc: f32) -> ReconResult<()> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(ReconError::InvalidParameter(format!(
            "{name} 的 alpha 必须在 [0, 1] 内, 实际为 {alpha}"
        )));
    }
    if !(fc > 0.0 && fc <= 0.5) {
        return Err(ReconError::InvalidParameter(format!(
            "{name} 的截止频率必须在 (0, 0.5] 内, 实际为 {fc}"
        )));
    }
    Ok(())
}

impl Fbp3drpParameters {
    /// 检查取值范围.
    pub fn check(&self) -> ReconResult<()> {
        if self.pad_s < 0 || self.pad_z < 0 {
            return Err(ReconError::InvalidParameter(format!(
                "补零倍数不能为负, 实际为 PadS = {}, PadZ = {}",
                self.pad_s, self.pad_z
            )));
        }
        check_window("Ramp", self.alpha_ramp, self.fc_ramp)?;
        check_window("Colsher (axial)", self.alpha_colsher_axial, self.fc_colsher_axial)?;
        check_window("Colsher (planar)", self.alpha_colsher_planar, self.fc_colsher_planar)?;
        let n = self.num_segments_to_combine;
        if n != defaults::AUTO && (n < 1 || n % 2 == 0) {
            return Err(ReconError::InvalidParameter(format!(
                "合并段数必须为 -1 或正奇数, 实际为 {n}"
            )));
        }
        if self.max_segment_num_to_process < defaults::AUTO {
            return Err(ReconError::InvalidParameter(format!(
                "最大段号不能小于 -1, 实际为 {}",
                self.max_segment_num_to_process
            )));
        }
        if self.output_filename_prefix.trim().is_empty() {
            return Err(ReconError::InvalidParameter("输出文件名前缀为空".to_owned()));
        }
        Ok(())
    }

    /// 以 `key := value` 形式列出全部参数.
    pub fn parameter_info(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "FBP3DRPParameters :=");
        let _ = writeln!(s, "output filename prefix := {}", self.output_filename_prefix);
        let _ = writeln!(s, "Transaxial extension for FFT := {}", self.pad_s);
        let _ = writeln!(s, "Axial extension for FFT := {}", self.pad_z);
        let _ = writeln!(s, "Alpha parameter for Ramp filter := {}", self.alpha_ramp);
        let _ = writeln!(s, "Cut-off for Ramp filter := {}", self.fc_ramp);
        let _ = writeln!(s, "Alpha parameter for Colsher filter in axial direction := {}", self.alpha_colsher_axial);
        let _ = writeln!(s, "Cut-off for Colsher filter in axial direction := {}", self.fc_colsher_axial);
        let _ = writeln!(s, "Alpha parameter for Colsher filter in planar direction := {}", self.alpha_colsher_planar);
        let _ = writeln!(s, "Cut-off for Colsher filter in planar direction := {}", self.fc_colsher_planar);
        let _ = writeln!(s, "num_segments_to_combine with SSRB := {}", self.num_segments_to_combine);
        let _ = writeln!(s, "maximum absolute segment number to process := {}", self.max_segment_num_to_process);
        let image = self
            .image_for_reprojection_filename
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let _ = writeln!(s, "image to be used for reprojection := {image}");
        let _ = writeln!(s, "Save intermediate images := {}", self.save_intermediate_files as i32);
        let _ = writeln!(s, "fit projections := {}", self.fit_projections as i32);
        let _ = writeln!(s, "End FBP3DRPParameters :=");
        s
    }
}
