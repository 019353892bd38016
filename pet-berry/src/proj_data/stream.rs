//! 存储在无头二进制流中的投影数据.
//!
//! 流的布局完全由外部参数描述: 存储顺序, 段序列, 数值类型, 字节序,
//! 缩放因子与起始偏移.

use super::info::ProjDataInfo;
use super::memory::{check_view_axial, ProjData};
use super::viewgram::{Sinogram, Viewgram};
use crate::array::{Array1d, ByteOrder, NumericType};
use crate::error::{ReconError, ReconResult};
use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 每个段内部的存储顺序. 最内层总是径向位置.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StorageOrder {
    /// 段, 轴向, 视角, 径向.
    SegmentAxialViewTangential,
    /// 段, 视角, 轴向, 径向.
    SegmentViewAxialTangential,
}

/// 默认的段序列 `0, -1, 1, -2, 2, ...`.
pub fn default_segment_sequence(info: &ProjDataInfo) -> Vec<i32> {
    std::iter::once(0)
        .chain((1..=info.get_max_segment_num()).flat_map(|s| [-s, s]))
        .collect()
}

/// 流的布局参数.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct StreamLayout {
    /// 存储顺序.
    pub storage_order: StorageOrder,
    /// 段在流中的先后顺序.
    pub segment_sequence: Vec<i32>,
    /// 流中的数值类型.
    pub data_type: NumericType,
    /// 字节序.
    pub byte_order: ByteOrder,
    /// 缩放因子: 实际值 = 流中的值 * `scale`.
    pub scale: f32,
    /// 数据的起始字节偏移.
    pub offset: u64,
}

impl StreamLayout {
    /// `f32`, 本机字节序, 默认段序列, 段-轴向-视角-径向顺序.
    pub fn new(info: &ProjDataInfo) -> Self {
        Self {
            storage_order: StorageOrder::SegmentAxialViewTangential,
            segment_sequence: default_segment_sequence(info),
            data_type: NumericType::F32,
            byte_order: ByteOrder::native(),
            scale: 1.0,
            offset: 0,
        }
    }
}

/// 以流为后端的投影数据.
///
/// 每次读写都会在流上定位, 所以读写操作需要内部可变性.
#[derive(Debug)]
pub struct ProjDataFromStream<S> {
    info: Arc<ProjDataInfo>,
    layout: StreamLayout,
    stream: RefCell<S>,
}

impl ProjDataFromStream<File> {
    /// 打开一个已有的文件.
    pub fn open<P: AsRef<Path>>(
        path: P,
        info: Arc<ProjDataInfo>,
        layout: StreamLayout,
    ) -> ReconResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| ReconError::io(path, e))?;
        Self::new(f, info, layout)
    }

    /// 创建 (或截断) 一个文件用于写出.
    pub fn create<P: AsRef<Path>>(
        path: P,
        info: Arc<ProjDataInfo>,
        layout: StreamLayout,
    ) -> ReconResult<Self> {
        let path = path.as_ref();
        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| ReconError::io(path, e))?;
        Self::new(f, info, layout)
    }
}

impl<S: Read + Seek> ProjDataFromStream<S> {
    /// 以给定的流和布局构造. 段序列必须恰好包含每个段一次.
    pub fn new(stream: S, info: Arc<ProjDataInfo>, layout: StreamLayout) -> ReconResult<Self> {
        let mut seq = layout.segment_sequence.clone();
        seq.sort_unstable();
        if !seq.iter().copied().eq(info.segment_nums()) {
            return Err(ReconError::InvalidParameter(format!(
                "段序列 {:?} 与段范围 [{}, {}] 不一致",
                layout.segment_sequence,
                info.get_min_segment_num(),
                info.get_max_segment_num()
            )));
        }
        if layout.scale <= 0.0 {
            return Err(ReconError::InvalidParameter(format!(
                "缩放因子必须为正, 实际为 {}",
                layout.scale
            )));
        }
        Ok(Self {
            info,
            layout,
            stream: RefCell::new(stream),
        })
    }

    /// 布局参数.
    #[inline]
    pub fn layout(&self) -> &StreamLayout {
        &self.layout
    }

    /// 取出底层流.
    #[inline]
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    /// 段在流中的序号.
    pub fn find_segment_index_in_sequence(&self, segment_num: i32) -> Option<usize> {
        self.layout
            .segment_sequence
            .iter()
            .position(|&s| s == segment_num)
    }

    fn bytes_per_row(&self) -> u64 {
        (self.info.get_num_tangential_poss() as usize * self.layout.data_type.size_in_bytes()) as u64
    }

    fn segment_offset(&self, segment_num: i32) -> u64 {
        let rows_per_ax = self.info.get_num_views() as u64;
        let before: u64 = self
            .layout
            .segment_sequence
            .iter()
            .take_while(|&&s| s != segment_num)
            .map(|&s| self.info.get_num_axial_poss(s) as u64 * rows_per_ax)
            .sum();
        self.layout.offset + before * self.bytes_per_row()
    }

    /// 一行 (固定视角与轴向位置) 的起始字节位置.
    fn row_offset(&self, view_num: i32, axial_pos_num: i32, segment_num: i32) -> u64 {
        let num_views = self.info.get_num_views() as u64;
        let num_axial = self.info.get_num_axial_poss(segment_num) as u64;
        let (view, ax) = (view_num as u64, axial_pos_num as u64);
        let row = match self.layout.storage_order {
            StorageOrder::SegmentAxialViewTangential => ax * num_views + view,
            StorageOrder::SegmentViewAxialTangential => view * num_axial + ax,
        };
        self.segment_offset(segment_num) + row * self.bytes_per_row()
    }

    fn read_row(&self, view_num: i32, axial_pos_num: i32, segment_num: i32) -> ReconResult<Array1d<f32>> {
        let mut row = Array1d::zeros(
            self.info.get_min_tangential_pos_num(),
            self.info.get_max_tangential_pos_num(),
        );
        let pos = self.row_offset(view_num, axial_pos_num, segment_num);
        let mut s = self.stream.borrow_mut();
        s.seek(SeekFrom::Start(pos))?;
        row.read_data_as(
            &mut *s,
            self.layout.data_type,
            self.layout.scale,
            self.layout.byte_order,
        )?;
        Ok(row)
    }
}

impl<S: Read + Write + Seek> ProjDataFromStream<S> {
    fn write_row(
        &self,
        row: &Array1d<f32>,
        view_num: i32,
        axial_pos_num: i32,
        segment_num: i32,
    ) -> ReconResult<()> {
        let pos = self.row_offset(view_num, axial_pos_num, segment_num);
        let mut s = self.stream.borrow_mut();
        s.seek(SeekFrom::Start(pos))?;
        row.write_data_as(
            &mut *s,
            self.layout.data_type,
            Some(self.layout.scale),
            self.layout.byte_order,
        )?;
        Ok(())
    }

    /// 把缓冲的数据写入底层.
    pub fn flush(&self) -> ReconResult<()> {
        self.stream.borrow_mut().flush()?;
        Ok(())
    }
}

impl<S: Read + Write + Seek> ProjData for ProjDataFromStream<S> {
    #[inline]
    fn info(&self) -> &Arc<ProjDataInfo> {
        &self.info
    }

    fn get_viewgram(&self, view_num: i32, segment_num: i32) -> ReconResult<Viewgram> {
        check_view_axial(&self.info, view_num, None, segment_num)?;
        let mut v = Viewgram::zeros(self.info.clone(), view_num, segment_num);
        for (ax, row) in v.data_mut().indexed_iter_mut() {
            *row = self.read_row(view_num, ax, segment_num)?;
        }
        Ok(v)
    }

    fn set_viewgram(&mut self, v: &Viewgram) -> ReconResult<()> {
        check_view_axial(&self.info, v.view_num(), None, v.segment_num())?;
        for (ax, row) in v.data().indexed_iter() {
            check_view_axial(&self.info, v.view_num(), Some(ax), v.segment_num())?;
            self.write_row(row, v.view_num(), ax, v.segment_num())?;
        }
        Ok(())
    }

    fn get_sinogram(&self, axial_pos_num: i32, segment_num: i32) -> ReconResult<Sinogram> {
        check_view_axial(&self.info, 0, Some(axial_pos_num), segment_num)?;
        let mut s = Sinogram::zeros(self.info.clone(), axial_pos_num, segment_num);
        for (view, row) in s.data_mut().indexed_iter_mut() {
            *row = self.read_row(view, axial_pos_num, segment_num)?;
        }
        Ok(s)
    }

    fn set_sinogram(&mut self, s: &Sinogram) -> ReconResult<()> {
        check_view_axial(&self.info, 0, Some(s.axial_pos_num()), s.segment_num())?;
        for (view, row) in s.data().indexed_iter() {
            self.write_row(row, view, s.axial_pos_num(), s.segment_num())?;
        }
        Ok(())
    }
}
