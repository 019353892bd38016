//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::array::{Array1d, Array2d, Array3d, Array4d, ByteOrder, NumericType};
pub use crate::error::{ReconError, ReconResult};

pub use crate::proj_data::{
    ProjData, ProjDataFromStream, ProjDataInMemory, ProjDataInfo, RelatedViewgrams, Scanner,
    Segment, Sinogram, StreamLayout, Viewgram,
};

pub use crate::image::{Axis, VoxelsOnCartesianGrid};

pub use crate::filter::{ColsherFilter, ImageProcessor, RampFilter, SeparableGaussian};

pub use crate::projector::{
    forward_project_proj_data, BackProjectorByBin, BackProjectorByBinUsingInterpolation,
    ForwardProjectorByBin, ForwardProjectorByBinUsingRayTracing,
};

pub use crate::recon::{Fbp2dReconstruction, Fbp3drpParameters, Fbp3drpReconstruction};

pub use crate::norm::{DetPairData, FanProjData};

pub use crate::consts::defaults;
pub use crate::timer::AccTimer;
