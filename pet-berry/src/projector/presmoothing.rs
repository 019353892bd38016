//! 先平滑图像再正投影.

use super::ForwardProjectorByBin;
use crate::error::{ReconError, ReconResult};
use crate::filter::ImageProcessor;
use crate::image::VoxelsOnCartesianGrid;
use crate::proj_data::{RelatedViewgrams, Viewgram};
use crate::timer::AccTimer;
use std::fmt::Write;

/// 对图像副本实施 `processor` 后交给 `inner` 正投影. 原图像不变.
///
/// `processor` 不能改变图像几何.
pub struct PresmoothingForwardProjectorByBin {
    inner: Box<dyn ForwardProjectorByBin>,
    processor: Box<dyn ImageProcessor>,
    timer: AccTimer,
}

impl PresmoothingForwardProjectorByBin {
    /// 由实际的正投影器和图像处理器构造.
    pub fn new(inner: Box<dyn ForwardProjectorByBin>, processor: Box<dyn ImageProcessor>) -> Self {
        Self {
            inner,
            processor,
            timer: AccTimer::new(),
        }
    }

    /// 实际的正投影器.
    #[inline]
    pub fn inner(&self) -> &dyn ForwardProjectorByBin {
        self.inner.as_ref()
    }

    fn smoothed(&self, image: &VoxelsOnCartesianGrid) -> ReconResult<VoxelsOnCartesianGrid> {
        let mut copy = image.clone();
        self.processor.apply(&mut copy)?;
        if !copy.has_same_characteristics(image) {
            return Err(ReconError::GeometryMismatch(
                "预平滑改变了图像的几何".to_owned(),
            ));
        }
        Ok(copy)
    }
}

impl std::fmt::Debug for PresmoothingForwardProjectorByBin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresmoothingForwardProjectorByBin")
            .field("inner", &self.inner.parameter_info())
            .field("processor", &self.processor.parameter_info())
            .finish()
    }
}

impl ForwardProjectorByBin for PresmoothingForwardProjectorByBin {
    fn forward_project_viewgram(
        &self,
        viewgram: &mut Viewgram,
        image: &VoxelsOnCartesianGrid,
        min_axial_pos_num: i32,
        max_axial_pos_num: i32,
    ) -> ReconResult<()> {
        let smoothed = self.smoothed(image)?;
        self.inner
            .forward_project_viewgram(viewgram, &smoothed, min_axial_pos_num, max_axial_pos_num)
    }

    /// 整组只平滑一次.
    fn forward_project(
        &mut self,
        viewgrams: &mut RelatedViewgrams,
        image: &VoxelsOnCartesianGrid,
        min_axial_pos_num: i32,
        max_axial_pos_num: i32,
    ) -> ReconResult<()> {
        self.timer.start();
        let result = self.smoothed(image).and_then(|smoothed| {
            self.inner
                .forward_project(viewgrams, &smoothed, min_axial_pos_num, max_axial_pos_num)
        });
        self.timer.stop();
        result
    }

    #[inline]
    fn timer(&self) -> &AccTimer {
        &self.timer
    }

    #[inline]
    fn timer_mut(&mut self) -> &mut AccTimer {
        &mut self.timer
    }

    fn parameter_info(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "Forward projector : Pre Smoother");
        let _ = writeln!(s, "{}", self.processor.parameter_info());
        let _ = write!(s, "{}", self.inner.parameter_info());
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::range3d;
    use crate::filter::SeparableGaussian;
    use crate::projector::ForwardProjectorByBinUsingRayTracing;
    use crate::proj_data::{ProjDataInfo, Scanner};
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    #[test]
    fn test_smoothing_spreads_point_source() {
        let scanner = Scanner::by_name("test").unwrap();
        let info = Arc::new(ProjDataInfo::cylindrical(scanner, 1, 0, 8, 16, true).unwrap());
        let mut img = VoxelsOnCartesianGrid::zeros(&range3d((0, 14), (-5, 5), (-5, 5)), [2.5, 4.0, 4.0]);
        // 平面 6 的中心 z = -2.5 mm 与轴向位置 3 一致.
        img.data_mut()[6][0][0] = 1.0;
        let orig = img.clone();

        let plain = ForwardProjectorByBinUsingRayTracing::new();
        let mut smooth = PresmoothingForwardProjectorByBin::new(
            Box::new(ForwardProjectorByBinUsingRayTracing::new()),
            Box::new(SeparableGaussian::new([0.0, 8.0, 8.0]).unwrap()),
        );
        let mut a = Viewgram::zeros(info.clone(), 0, 0);
        plain.forward_project_viewgram(&mut a, &img, 0, 7).unwrap();
        let mut r = RelatedViewgrams::zeros(info, 0, 0);
        smooth.forward_project(&mut r, &img, 0, 7).unwrap();
        let b = r.iter().next().unwrap();

        assert_eq!(img, orig);
        // 平滑后中心值降低, 旁边的 bin 出现数值.
        assert!(b.data()[3][0] < a.data()[3][0]);
        assert_eq!(a.data()[3][2], 0.0);
        assert!(b.data()[3][2] > 0.0);
        // 总量基本守恒.
        let sa: f32 = a.data()[3].as_slice().iter().sum();
        let sb: f32 = b.data()[3].as_slice().iter().sum();
        assert_abs_diff_eq!(sa, sb, epsilon = 0.05 * sa);
        assert!(smooth.parameter_info().contains("Gaussian"));
    }
}
