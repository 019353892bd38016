//! 程序运行函数.

use crate::report::RunSummary;
use crate::{Cli, DataType, Endian};
use anyhow::{bail, Context, Result};
use log::info;
use pet_berry::array::{ByteOrder, NumericType};
use pet_berry::image::VoxelsOnCartesianGrid;
use pet_berry::proj_data::{ProjData, ProjDataFromStream, ProjDataInfo, Scanner, StreamLayout};
use pet_berry::recon::{Fbp3drpParameters, Fbp3drpReconstruction};
use std::fs;
use std::sync::Arc;
use utils::phantom;

impl From<DataType> for NumericType {
    fn from(t: DataType) -> Self {
        match t {
            DataType::F32 => NumericType::F32,
            DataType::F64 => NumericType::F64,
            DataType::I16 => NumericType::I16,
            DataType::U16 => NumericType::U16,
            DataType::I32 => NumericType::I32,
        }
    }
}

impl From<Endian> for ByteOrder {
    fn from(e: Endian) -> Self {
        match e {
            Endian::Native => ByteOrder::native(),
            Endian::Little => ByteOrder::LittleEndian,
            Endian::Big => ByteOrder::BigEndian,
        }
    }
}

fn parameters(cli: &Cli, prefix: String) -> Fbp3drpParameters {
    Fbp3drpParameters {
        pad_s: cli.pad_s,
        pad_z: cli.pad_z,
        alpha_ramp: cli.alpha,
        fc_ramp: cli.fc,
        alpha_colsher_axial: cli.alpha,
        fc_colsher_axial: cli.fc,
        alpha_colsher_planar: cli.alpha,
        fc_colsher_planar: cli.fc,
        num_segments_to_combine: cli.num_segments_to_combine,
        max_segment_num_to_process: cli.max_segment,
        image_for_reprojection_filename: cli.reprojection_image.clone(),
        output_filename_prefix: prefix,
        save_intermediate_files: cli.save_intermediate,
        fit_projections: cli.fit,
    }
}

/// 实际运行.
pub fn run(cli: &Cli) -> Result<RunSummary> {
    let Some(scanner) = Scanner::by_name(&cli.scanner) else {
        bail!(
            "未知的扫描仪 `{}`, 可选: {}",
            cli.scanner,
            Scanner::list_names().join(", ")
        );
    };
    let scanner_name = scanner.name().to_owned();
    let num_views = cli.views.unwrap_or_else(|| scanner.max_num_views());
    let num_tangs = cli.tangs.unwrap_or_else(|| scanner.default_num_arccorrected_bins());
    let info = Arc::new(
        ProjDataInfo::cylindrical(scanner, cli.span, cli.max_ring_diff, num_views, num_tangs, true)
            .context("无法构造投影数据几何")?,
    );

    let proj_data: Box<dyn ProjData> = match &cli.input {
        Some(path) => {
            let layout = StreamLayout {
                data_type: cli.data_type.into(),
                byte_order: cli.byte_order.into(),
                scale: cli.scale,
                offset: cli.offset,
                ..StreamLayout::new(&info)
            };
            info!("从 {} 读取投影数据", path.display());
            Box::new(ProjDataFromStream::open(path, info.clone(), layout)?)
        }
        None => {
            info!("未指定输入, 使用半径 {} mm 的均匀圆柱模体", cli.phantom_radius);
            Box::new(phantom::simulate_cylinder(&info, cli.phantom_radius)?)
        }
    };

    let out_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(utils::output_dir_from_env_or_home);
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("无法创建输出目录 {}", out_dir.display()))?;
    let prefix = out_dir.join(&cli.prefix);

    let params = parameters(cli, prefix.to_string_lossy().into_owned());
    let mut image = VoxelsOnCartesianGrid::from_proj_data_info(&info, cli.zoom);
    let mut recon = Fbp3drpReconstruction::new(params, proj_data)?;
    recon.reconstruct(&mut image)?;

    let nifti_path = out_dir.join(format!("{}.nii", cli.prefix));
    let npy_path = out_dir.join(format!("{}.npy", cli.prefix));
    image.write_nifti(&nifti_path)?;
    image.write_npy(&npy_path)?;
    info!("图像已写出到 {}", nifti_path.display());

    Ok(RunSummary {
        scanner: scanner_name,
        num_segments: info.get_num_segments(),
        bounds: image.bounds(),
        min: image.find_min(),
        max: image.find_max(),
        sum: image.sum(),
        fit: recon.fit_coefficients(),
        total_ms: recon.timer().get_total_ms(),
        forward_ms: recon.forward_projector().timer().get_total_ms(),
        back_ms: recon.back_projector().timer().get_total_ms(),
        outputs: vec![nifti_path, npy_path],
        cpus: utils::cpus(),
    })
}
