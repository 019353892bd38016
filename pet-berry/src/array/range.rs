//! 多维 (可能不规则的) 索引范围.

use std::fmt::Debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 索引范围的公共行为. 由 `()` (零维, 即标量) 和 [`IndexRange`] 实现.
///
/// 维数在编译期确定: `IndexRange<()>` 是一维, `IndexRange<IndexRange<()>>`
/// 是二维, 以此类推.
pub trait RangeShape: Clone + Debug + Default + PartialEq {
    /// 维数.
    const DIM: usize;

    /// 该范围覆盖的标量元素总数.
    fn size_all(&self) -> usize;

    /// 每一层的所有行是否共享完全相同的子范围.
    fn is_regular(&self) -> bool;

    /// 将规则范围的每一维上下界依次写入 `mins` 和 `maxs`.
    /// 范围不规则时返回 `false`, 此时写入的内容无意义.
    fn regular_bounds(&self, mins: &mut Vec<i32>, maxs: &mut Vec<i32>) -> bool;
}

impl RangeShape for () {
    const DIM: usize = 0;

    #[inline]
    fn size_all(&self) -> usize {
        1
    }

    #[inline]
    fn is_regular(&self) -> bool {
        true
    }

    #[inline]
    fn regular_bounds(&self, _: &mut Vec<i32>, _: &mut Vec<i32>) -> bool {
        true
    }
}

/// 带偏移的索引范围 `[min, max]`, 每一行拥有各自的子范围 `R`.
///
/// 空范围统一表示为 `min == 0` 且没有行, 因此两个空范围总是相等.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexRange<R> {
    min: i32,
    rows: Vec<R>,
}

impl IndexRange<()> {
    /// 一维范围 `[min, max]`. 当 `max < min` 时得到空范围.
    pub fn new(min: i32, max: i32) -> Self {
        Self::regular(min, max, ())
    }

    /// 长度为 `len`, 从 0 开始的一维范围.
    #[inline]
    pub fn with_len(len: usize) -> Self {
        Self::new(0, len as i32 - 1)
    }
}

impl<R: RangeShape> IndexRange<R> {
    /// 外层为 `[min, max]`, 每一行都是 `row` 的规则范围.
    pub fn regular(min: i32, max: i32, row: R) -> Self {
        if max < min {
            return Self::default();
        }
        Self {
            min,
            rows: vec![row; (max - min + 1) as usize],
        }
    }

    /// 由逐行子范围构建 (可以不规则). 第一行的索引为 `min`.
    pub fn from_rows(min: i32, rows: Vec<R>) -> Self {
        if rows.is_empty() {
            return Self::default();
        }
        Self { min, rows }
    }

    /// 最小外层索引.
    #[inline]
    pub fn min(&self) -> i32 {
        self.min
    }

    /// 最大外层索引. 空范围时为 `min - 1`.
    #[inline]
    pub fn max(&self) -> i32 {
        self.min + self.rows.len() as i32 - 1
    }

    /// 外层长度.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否为空范围.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 外层索引 `i` 是否落在范围内.
    #[inline]
    pub fn contains(&self, i: i32) -> bool {
        i >= self.min && i <= self.max()
    }

    /// 获取外层索引 `i` 对应行的子范围. 越界时返回 `None`.
    #[inline]
    pub fn row(&self, i: i32) -> Option<&R> {
        if !self.contains(i) {
            return None;
        }
        self.rows.get((i - self.min) as usize)
    }

    /// 获取外层索引 `i` 对应行的可变子范围.
    #[inline]
    pub fn row_mut(&mut self, i: i32) -> Option<&mut R> {
        if !self.contains(i) {
            return None;
        }
        self.rows.get_mut((i - self.min) as usize)
    }

    /// 所有行的子范围.
    #[inline]
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    /// 规则范围的逐维上下界, 不规则时返回 `None`.
    ///
    /// 空的内层维度以 `(0, -1)` 表示.
    pub fn get_regular_range(&self) -> Option<(Vec<i32>, Vec<i32>)> {
        let mut mins = Vec::with_capacity(Self::DIM);
        let mut maxs = Vec::with_capacity(Self::DIM);
        if self.regular_bounds(&mut mins, &mut maxs) {
            Some((mins, maxs))
        } else {
            None
        }
    }
}

impl<R: RangeShape> RangeShape for IndexRange<R> {
    const DIM: usize = R::DIM + 1;

    fn size_all(&self) -> usize {
        self.rows.iter().map(R::size_all).sum()
    }

    fn is_regular(&self) -> bool {
        match self.rows.split_first() {
            None => true,
            Some((first, rest)) => rest.iter().all(|r| r == first) && first.is_regular(),
        }
    }

    fn regular_bounds(&self, mins: &mut Vec<i32>, maxs: &mut Vec<i32>) -> bool {
        mins.push(self.min);
        maxs.push(self.max());
        match self.rows.split_first() {
            None => {
                for _ in 0..R::DIM {
                    mins.push(0);
                    maxs.push(-1);
                }
                true
            }
            Some((first, rest)) => {
                rest.iter().all(|r| r == first) && first.regular_bounds(mins, maxs)
            }
        }
    }
}

/// 一维索引范围.
pub type IndexRange1d = IndexRange<()>;

/// 二维索引范围.
pub type IndexRange2d = IndexRange<IndexRange1d>;

/// 三维索引范围.
pub type IndexRange3d = IndexRange<IndexRange2d>;

/// 四维索引范围.
pub type IndexRange4d = IndexRange<IndexRange3d>;

/// 二维规则范围 `[min0, max0] x [min1, max1]`.
#[inline]
pub fn range2d((min0, max0): (i32, i32), (min1, max1): (i32, i32)) -> IndexRange2d {
    IndexRange::regular(min0, max0, IndexRange::new(min1, max1))
}

/// 三维规则范围.
#[inline]
pub fn range3d(d0: (i32, i32), d1: (i32, i32), d2: (i32, i32)) -> IndexRange3d {
    IndexRange::regular(d0.0, d0.1, range2d(d1, d2))
}
