//! 用于演示和冒烟测试的模拟数据.

use pet_berry::image::{Axis, VoxelsOnCartesianGrid};
use pet_berry::proj_data::{ProjDataInMemory, ProjDataInfo};
use pet_berry::projector::{forward_project_proj_data, ForwardProjectorByBinUsingRayTracing};
use pet_berry::ReconResult;
use std::sync::Arc;

/// 与 `info` 匹配的图像中, 以 z 轴为中心, 半径 `radius` 毫米, 值为 1 的均匀圆柱.
pub fn cylinder(info: &ProjDataInfo, radius: f32) -> VoxelsOnCartesianGrid {
    let mut image = VoxelsOnCartesianGrid::from_proj_data_info(info, 1.0);
    let [_, (y0, y1), (x0, x1)] = image.bounds();
    let ys: Vec<f32> = (y0..=y1).map(|i| image.coord_mm(Axis::Y, i)).collect();
    let xs: Vec<f32> = (x0..=x1).map(|i| image.coord_mm(Axis::X, i)).collect();
    let r2 = radius * radius;
    image.for_each_plane_mut(|_, plane| {
        for (row, &y) in plane.iter_mut().zip(&ys) {
            for (v, &x) in row.as_mut_slice().iter_mut().zip(&xs) {
                if x * x + y * y <= r2 {
                    *v = 1.0;
                }
            }
        }
    });
    image
}

/// 正投影 [`cylinder`] 得到的投影数据.
pub fn simulate_cylinder(info: &Arc<ProjDataInfo>, radius: f32) -> ReconResult<ProjDataInMemory> {
    let phantom = cylinder(info, radius);
    let mut proj_data = ProjDataInMemory::zeros(info.clone());
    let mut fp = ForwardProjectorByBinUsingRayTracing::new();
    forward_project_proj_data(&mut fp, &phantom, &mut proj_data)?;
    Ok(proj_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pet_berry::proj_data::{ProjData, Scanner};

    #[test]
    fn test_cylinder_projection_is_positive() {
        let scanner = Scanner::by_name("test").unwrap();
        let info = Arc::new(ProjDataInfo::cylindrical(scanner, 1, 0, 32, 32, true).unwrap());
        let image = cylinder(&info, 20.0);
        assert_eq!(image.find_max(), 1.0);
        let pd = simulate_cylinder(&info, 20.0).unwrap();
        let v = pd.get_viewgram(3, 0).unwrap();
        // 中心射线穿过整个直径.
        assert!(v.data()[3][0] > 30.0);
        assert_eq!(pd.info().get_num_views(), 32);
    }
}
