//! 图像与 `ndarray`, NIfTI, npy 之间的转换.

use super::voxels::VoxelsOnCartesianGrid;
use crate::array::{range3d, Array3d};
use crate::error::{ReconError, ReconResult};
use ndarray::{Array3, Ix3, IxDyn};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use std::path::Path;

impl VoxelsOnCartesianGrid {
    /// 转换为形状 `[z, y, x]` 的 `ndarray` 数组, 索引偏移被丢弃.
    ///
    /// # 注意
    ///
    /// 图像不规则时 panic.
    pub fn to_ndarray(&self) -> Array3<f32> {
        let [(z0, z1), (y0, y1), (x0, x1)] = self.bounds();
        let shape = (
            (z1 - z0 + 1) as usize,
            (y1 - y0 + 1) as usize,
            (x1 - x0 + 1) as usize,
        );
        let flat: Vec<f32> = self.data().full_iter().copied().collect();
        // 行优先遍历与标准布局一致, 长度也一致.
        Array3::from_shape_vec(shape, flat).unwrap_or_else(|_| Array3::zeros(shape))
    }

    /// 由 `[z, y, x]` 数组构造, 平面从 0 开始, 横断面以 0 为中心.
    pub fn from_ndarray(arr: &Array3<f32>, voxel_size: [f32; 3]) -> Self {
        let (nz, ny, nx) = arr.dim();
        let (y0, x0) = (-(ny as i32 / 2), -(nx as i32 / 2));
        let range = range3d(
            (0, nz as i32 - 1),
            (y0, y0 + ny as i32 - 1),
            (x0, x0 + nx as i32 - 1),
        );
        let mut data = Array3d::with_range(&range);
        for (v, &a) in data.full_iter_mut().zip(arr.iter()) {
            *v = a;
        }
        Self::from_data(data, voxel_size)
    }

    /// 写出为 NIfTI 文件. 体素大小写入 `pixdim`.
    pub fn write_nifti<P: AsRef<Path>>(&self, path: P) -> ReconResult<()> {
        let [vz, vy, vx] = self.voxel_size();
        let header = NiftiHeader {
            pixdim: [1.0, vx, vy, vz, 1.0, 1.0, 1.0, 1.0],
            ..NiftiHeader::default()
        };
        // NIfTI 的第一维变化最快, 即 [x, y, z].
        let data = self.to_ndarray().reversed_axes();
        WriterOptions::new(path.as_ref())
            .reference_header(&header)
            .write_nifti(&data)?;
        Ok(())
    }

    /// 读取 NIfTI 文件. 体素大小取自 `pixdim`.
    pub fn read_nifti<P: AsRef<Path>>(path: P) -> ReconResult<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = obj.header().clone();
        // [x, y, z] -> [z, y, x].
        let data = obj
            .into_volume()
            .into_ndarray::<f32>()?
            .permuted_axes(IxDyn(&[2, 1, 0]))
            .into_dimensionality::<Ix3>()
            .map_err(|e| ReconError::GeometryMismatch(format!("NIfTI 数据不是三维的: {e}")))?;
        let data = data.as_standard_layout().to_owned();
        let [_, vx, vy, vz, ..] = header.pixdim;
        Ok(Self::from_ndarray(&data, [vz, vy, vx]))
    }

    /// 写出为 `.npy` 文件, 形状为 `[z, y, x]`.
    pub fn write_npy<P: AsRef<Path>>(&self, path: P) -> ReconResult<()> {
        ndarray_npy::write_npy(path.as_ref(), &self.to_ndarray())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VoxelsOnCartesianGrid {
        let mut img = VoxelsOnCartesianGrid::zeros(&range3d((0, 2), (-2, 1), (-1, 1)), [2.0, 1.5, 1.5]);
        for (k, v) in img.data_mut().full_iter_mut().enumerate() {
            *v = k as f32;
        }
        img
    }

    #[test]
    fn test_ndarray_layout() {
        let img = sample();
        let arr = img.to_ndarray();
        assert_eq!(arr.dim(), (3, 4, 3));
        assert_eq!(arr[[1, 2, 0]], img.data()[1][0][-1]);
        let back = VoxelsOnCartesianGrid::from_ndarray(&arr, img.voxel_size());
        assert_eq!(back, img);
    }

    #[test]
    fn test_nifti_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.nii");
        let img = sample();
        img.write_nifti(&path).unwrap();
        let back = VoxelsOnCartesianGrid::read_nifti(&path).unwrap();
        assert_eq!(back.voxel_size(), img.voxel_size());
        assert_eq!(back.data(), img.data());
    }

    #[test]
    fn test_npy_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.npy");
        sample().write_npy(&path).unwrap();
        let arr: Array3<f32> = ndarray_npy::read_npy(&path).unwrap();
        assert_eq!(arr.dim(), (3, 4, 3));
        assert_eq!(arr[[2, 3, 2]], 35.0);
    }
}
