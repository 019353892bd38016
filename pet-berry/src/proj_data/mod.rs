//! 投影数据: 扫描仪几何, 段, 视角图, 正弦图, 对称视角组, 存储与重组.

mod info;
mod memory;
mod related;
mod scanner;
mod segment;
mod ssrb;
mod stream;
mod viewgram;

pub use info::{segment_table, ProjDataInfo, ProjDataKind, SegmentGeometry};
pub use memory::{ProjData, ProjDataInMemory};
pub use related::{related_view_segment_numbers, RelatedViewgrams};
pub use scanner::Scanner;
pub use segment::{Segment, SegmentKind};
pub use ssrb::{ssrb, ssrb_info};
pub use stream::{default_segment_sequence, ProjDataFromStream, StorageOrder, StreamLayout};
pub use viewgram::{Sinogram, Viewgram};
