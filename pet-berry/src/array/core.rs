use super::io::Scalar;
use super::iter::{FullIter, FullIterMut};
use super::range::{IndexRange, RangeShape};
use num::Zero;
use std::fmt::Debug;
use std::ops::{Index, IndexMut};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 数组的一个元素: 要么是标量 (递归终点), 要么是低一维的 [`Array`].
///
/// 这是多维数组维度递归的核心. 所有 "对每个叶子元素" 的操作都通过
/// 关联函数 (以 `&[Self]` 为参数) 实现, 从而让一维数组直接在连续存储上工作,
/// 不需要额外的递归层.
pub trait Element: Clone + Debug + PartialEq + Send + Sync {
    /// 叶子标量类型.
    type Scalar: Scalar;

    /// 该元素自身的索引范围类型. 标量为 `()`.
    type Range: RangeShape;

    /// 以给定范围构造, 所有标量为 0.
    fn with_range(range: &Self::Range) -> Self;

    /// 当前索引范围.
    fn index_range(&self) -> Self::Range;

    /// 改变索引范围. 新旧范围交集内的值保留, 新增元素为 0.
    fn resize(&mut self, range: &Self::Range);

    /// 把自身的范围扩展到与 `other` 的并集, 逐层递归. 标量无操作.
    fn grow_to_union(&mut self, other: &Self);

    /// 按坐标递归访问标量. `coords` 的长度必须等于剩余维数.
    fn at(&self, coords: &[i32]) -> &Self::Scalar;

    /// 按坐标递归访问可变标量.
    fn at_mut(&mut self, coords: &[i32]) -> &mut Self::Scalar;

    /// `items` 中所有叶子标量的个数.
    fn leaf_count(items: &[Self]) -> usize;

    /// 按行优先顺序遍历 `items` 中的所有叶子标量.
    fn leaves<'a>(items: &'a [Self]) -> Box<dyn Iterator<Item = &'a Self::Scalar> + 'a>;

    /// 按行优先顺序可变地遍历 `items` 中的所有叶子标量.
    fn leaves_mut<'a>(
        items: &'a mut [Self],
    ) -> Box<dyn Iterator<Item = &'a mut Self::Scalar> + 'a>;
}

macro_rules! impl_scalar_element {
    ($($t: ty),+) => {
        $(
            impl Element for $t {
                type Scalar = $t;
                type Range = ();

                #[inline]
                fn with_range(_: &()) -> Self {
                    <$t>::default()
                }

                #[inline]
                fn index_range(&self) {}

                #[inline]
                fn resize(&mut self, _: &()) {}

                #[inline]
                fn grow_to_union(&mut self, _: &Self) {}

                #[inline]
                fn at(&self, coords: &[i32]) -> &$t {
                    assert!(coords.is_empty(), "坐标维数多于数组维数");
                    self
                }

                #[inline]
                fn at_mut(&mut self, coords: &[i32]) -> &mut $t {
                    assert!(coords.is_empty(), "坐标维数多于数组维数");
                    self
                }

                #[inline]
                fn leaf_count(items: &[Self]) -> usize {
                    items.len()
                }

                #[inline]
                fn leaves<'a>(items: &'a [Self]) -> Box<dyn Iterator<Item = &'a $t> + 'a> {
                    Box::new(items.iter())
                }

                #[inline]
                fn leaves_mut<'a>(
                    items: &'a mut [Self],
                ) -> Box<dyn Iterator<Item = &'a mut $t> + 'a> {
                    Box::new(items.iter_mut())
                }
            }
        )+
    };
}

impl_scalar_element!(i8, u8, i16, u16, i32, u32, f32, f64);

/// 带偏移的多维数值数组, 值语义.
///
/// `Array<E>` 拥有若干个 `E` 行, 第一行的索引为 `min`. 多维数组由嵌套得到:
/// [`Array1d<T>`] = `Array<T>`, [`Array2d<T>`] = `Array<Array1d<T>>`, 以此类推.
/// 每一行可以拥有不同的子范围 (不规则数组).
///
/// # 注意
///
/// 用 `arr[i]` 访问越界行时程序 panic.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Array<E> {
    min: i32,
    rows: Vec<E>,
}

/// 一维数组.
pub type Array1d<T> = Array<T>;

/// 二维数组.
pub type Array2d<T> = Array<Array1d<T>>;

/// 三维数组.
pub type Array3d<T> = Array<Array2d<T>>;

/// 四维数组.
pub type Array4d<T> = Array<Array3d<T>>;

impl<E: Element> Default for Array<E> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Element> Array<E> {
    /// 空数组.
    #[inline]
    pub fn new() -> Self {
        Self {
            min: 0,
            rows: Vec::new(),
        }
    }

    /// 以 `range` 分配数组, 所有元素为 0.
    pub fn with_range(range: &IndexRange<E::Range>) -> Self {
        Self {
            min: if range.is_empty() { 0 } else { range.min() },
            rows: range.rows().iter().map(E::with_range).collect(),
        }
    }

    /// 由已有的行构造, 第一行的索引为 `min`.
    pub fn from_rows(min: i32, rows: Vec<E>) -> Self {
        let min = if rows.is_empty() { 0 } else { min };
        Self { min, rows }
    }

    /// 当前完整的 (可能不规则的) 索引范围.
    pub fn get_index_range(&self) -> IndexRange<E::Range> {
        IndexRange::from_rows(self.min, self.rows.iter().map(E::index_range).collect())
    }

    /// 最小行索引.
    #[inline]
    pub fn get_min_index(&self) -> i32 {
        self.min
    }

    /// 最大行索引. 空数组时为 `min - 1`.
    #[inline]
    pub fn get_max_index(&self) -> i32 {
        self.min + self.rows.len() as i32 - 1
    }

    /// 行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否没有任何行.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 行索引 `i` 是否存在.
    #[inline]
    pub fn contains(&self, i: i32) -> bool {
        i >= self.min && i <= self.get_max_index()
    }

    /// 所有叶子元素的个数.
    #[inline]
    pub fn size_all(&self) -> usize {
        E::leaf_count(&self.rows)
    }

    /// 改变最小行索引而不移动数据.
    #[inline]
    pub fn set_offset(&mut self, min: i32) {
        self.min = min;
    }

    /// 改变索引范围. 旧范围与新范围交集内的元素保持原值, 新增元素为 0.
    pub fn resize(&mut self, range: &IndexRange<E::Range>) {
        if range.is_empty() {
            self.min = 0;
            self.rows.clear();
            return;
        }
        let old_min = self.min;
        let mut old_rows = std::mem::take(&mut self.rows).into_iter().map(Some).collect::<Vec<_>>();
        let rows = (range.min()..=range.max())
            .zip(range.rows())
            .map(|(i, r)| {
                let slot = i - old_min;
                match old_rows.get_mut(slot.max(0) as usize).filter(|_| slot >= 0) {
                    Some(old) => match old.take() {
                        Some(mut row) => {
                            row.resize(r);
                            row
                        }
                        None => E::with_range(r),
                    },
                    None => E::with_range(r),
                }
            })
            .collect();
        self.min = range.min();
        self.rows = rows;
    }

    /// 扩展索引范围, 语义同 [`Self::resize`].
    ///
    /// 新范围必须包含旧范围 (debug 模式下检查).
    pub fn grow(&mut self, range: &IndexRange<E::Range>) {
        debug_assert!(
            self.is_empty() || (range.min() <= self.min && range.max() >= self.get_max_index()),
            "grow 的新范围必须包含旧范围"
        );
        self.resize(range);
    }

    /// 只改变外层范围为 `[min, max]`. 保留行不变, 新行为空.
    pub fn resize_outer(&mut self, min: i32, max: i32) {
        let mut rows = self.get_index_range().rows().to_vec();
        let range = if self.is_empty() {
            IndexRange::from_rows(min, vec![E::Range::default(); (max - min + 1).max(0) as usize])
        } else {
            let old_min = self.min;
            let new_rows = (min..=max)
                .map(|i| {
                    let slot = i - old_min;
                    if slot >= 0 && (slot as usize) < rows.len() {
                        std::mem::take(&mut rows[slot as usize])
                    } else {
                        E::Range::default()
                    }
                })
                .collect();
            IndexRange::from_rows(min, new_rows)
        };
        self.resize(&range);
    }

    /// 每一层的所有行是否共享同一子范围.
    ///
    /// 每次调用都会重新计算 (O(size)), 因为某一行可能在外层不知情时被单独改变大小.
    #[inline]
    pub fn is_regular(&self) -> bool {
        self.get_index_range().is_regular()
    }

    /// 规则数组的逐维上下界, 不规则时返回 `None`.
    #[inline]
    pub fn get_regular_range(&self) -> Option<(Vec<i32>, Vec<i32>)> {
        self.get_index_range().get_regular_range()
    }

    /// 获取第 `i` 行. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, i: i32) -> Option<&E> {
        if i < self.min {
            return None;
        }
        self.rows.get((i - self.min) as usize)
    }

    /// 获取可变的第 `i` 行. 越界时返回 `None`.
    #[inline]
    pub fn get_mut(&mut self, i: i32) -> Option<&mut E> {
        if i < self.min {
            return None;
        }
        self.rows.get_mut((i - self.min) as usize)
    }

    /// 按坐标访问标量, 等价于逐层 `[]`.
    ///
    /// # 注意
    ///
    /// `coords` 的长度必须等于数组的维数, 否则 panic.
    #[inline]
    pub fn at(&self, coords: &[i32]) -> &E::Scalar {
        <Self as Element>::at(self, coords)
    }

    /// 按坐标访问可变标量.
    #[inline]
    pub fn at_mut(&mut self, coords: &[i32]) -> &mut E::Scalar {
        <Self as Element>::at_mut(self, coords)
    }

    /// 层次化遍历所有行.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.rows.iter()
    }

    /// 层次化可变遍历所有行.
    #[inline]
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, E> {
        self.rows.iter_mut()
    }

    /// 带行索引的层次化遍历.
    #[inline]
    pub fn indexed_iter(&self) -> impl Iterator<Item = (i32, &E)> {
        (self.min..).zip(self.rows.iter())
    }

    /// 带行索引的层次化可变遍历.
    #[inline]
    pub fn indexed_iter_mut(&mut self) -> impl Iterator<Item = (i32, &mut E)> {
        (self.min..).zip(self.rows.iter_mut())
    }

    /// 所有行组成的切片.
    #[inline]
    pub fn as_rows(&self) -> &[E] {
        &self.rows
    }

    /// 所有行组成的可变切片.
    #[inline]
    pub fn as_rows_mut(&mut self) -> &mut [E] {
        &mut self.rows
    }

    /// 行优先遍历所有叶子元素. 可以反复获取, 每次都从头开始.
    #[inline]
    pub fn full_iter(&self) -> FullIter<'_, E::Scalar> {
        FullIter::new(E::leaves(&self.rows), self.size_all())
    }

    /// 行优先地可变遍历所有叶子元素.
    #[inline]
    pub fn full_iter_mut(&mut self) -> FullIterMut<'_, E::Scalar> {
        let n = self.size_all();
        FullIterMut::new(E::leaves_mut(&mut self.rows), n)
    }

    /// 将所有元素设为 `v`.
    pub fn fill(&mut self, v: E::Scalar) {
        self.full_iter_mut().for_each(|x| *x = v);
    }

    /// 所有元素之和.
    pub fn sum(&self) -> E::Scalar {
        self.full_iter().fold(E::Scalar::zero(), |acc, &x| acc + x)
    }

    /// 所有正元素之和.
    pub fn sum_positive(&self) -> E::Scalar {
        let zero = E::Scalar::zero();
        self.full_iter()
            .filter(|&&x| x > zero)
            .fold(zero, |acc, &x| acc + x)
    }

    /// 最大元素.
    ///
    /// # 注意
    ///
    /// 当数组没有任何元素时 panic.
    pub fn find_max(&self) -> E::Scalar {
        let mut it = self.full_iter();
        let Some(&first) = it.next() else {
            panic!("空数组没有最大值");
        };
        it.fold(first, |m, &x| if x > m { x } else { m })
    }

    /// 最小元素.
    ///
    /// # 注意
    ///
    /// 当数组没有任何元素时 panic.
    pub fn find_min(&self) -> E::Scalar {
        let mut it = self.full_iter();
        let Some(&first) = it.next() else {
            panic!("空数组没有最小值");
        };
        it.fold(first, |m, &x| if x < m { x } else { m })
    }
}

impl<E: Element> Element for Array<E> {
    type Scalar = E::Scalar;
    type Range = IndexRange<E::Range>;

    #[inline]
    fn with_range(range: &Self::Range) -> Self {
        Array::with_range(range)
    }

    #[inline]
    fn index_range(&self) -> Self::Range {
        self.get_index_range()
    }

    #[inline]
    fn resize(&mut self, range: &Self::Range) {
        Array::resize(self, range)
    }

    fn grow_to_union(&mut self, other: &Self) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            self.resize_outer(other.min, other.get_max_index());
            return;
        }
        let min = self.min.min(other.min);
        let max = self.get_max_index().max(other.get_max_index());
        if min != self.min || max != self.get_max_index() {
            self.resize_outer(min, max);
        }
    }

    fn at(&self, coords: &[i32]) -> &E::Scalar {
        let Some((&i, rest)) = coords.split_first() else {
            panic!("坐标维数少于数组维数");
        };
        self[i].at(rest)
    }

    fn at_mut(&mut self, coords: &[i32]) -> &mut E::Scalar {
        let Some((&i, rest)) = coords.split_first() else {
            panic!("坐标维数少于数组维数");
        };
        self[i].at_mut(rest)
    }

    #[inline]
    fn leaf_count(items: &[Self]) -> usize {
        items.iter().map(|a| E::leaf_count(&a.rows)).sum()
    }

    fn leaves<'a>(items: &'a [Self]) -> Box<dyn Iterator<Item = &'a E::Scalar> + 'a> {
        Box::new(items.iter().flat_map(|a| E::leaves(&a.rows)))
    }

    fn leaves_mut<'a>(items: &'a mut [Self]) -> Box<dyn Iterator<Item = &'a mut E::Scalar> + 'a> {
        Box::new(items.iter_mut().flat_map(|a| E::leaves_mut(&mut a.rows)))
    }
}

impl<E: Element> Index<i32> for Array<E> {
    type Output = E;

    #[inline]
    fn index(&self, i: i32) -> &E {
        &self.rows[(i - self.min) as usize]
    }
}

impl<E: Element> IndexMut<i32> for Array<E> {
    #[inline]
    fn index_mut(&mut self, i: i32) -> &mut E {
        &mut self.rows[(i - self.min) as usize]
    }
}

impl<E: Element, const N: usize> Index<[i32; N]> for Array<E> {
    type Output = E::Scalar;

    #[inline]
    fn index(&self, coords: [i32; N]) -> &E::Scalar {
        self.at(&coords)
    }
}

impl<E: Element, const N: usize> IndexMut<[i32; N]> for Array<E> {
    #[inline]
    fn index_mut(&mut self, coords: [i32; N]) -> &mut E::Scalar {
        self.at_mut(&coords)
    }
}

impl<T: Element<Range = ()>> Array<T> {
    /// 一维数组 `[min, max]`, 元素为 0.
    #[inline]
    pub fn zeros(min: i32, max: i32) -> Self {
        Self::with_range(&IndexRange::new(min, max))
    }

    /// 以 `data` 作为内容的一维数组, 第一个元素的索引为 `min`.
    #[inline]
    pub fn from_vec(min: i32, data: Vec<T>) -> Self {
        Self::from_rows(min, data)
    }

    /// 一维数组的连续存储.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.rows
    }

    /// 一维数组的可变连续存储.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.rows
    }

    /// 一维数组改为 `[min, max]`.
    #[inline]
    pub fn resize_1d(&mut self, min: i32, max: i32) {
        self.resize(&IndexRange::new(min, max));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{range2d, range3d, IndexRange1d, IndexRange2d};

    #[test]
    fn test_zero_init_and_range() {
        let r = range3d((-1, 2), (0, 3), (-5, 5));
        let a = Array3d::<f32>::with_range(&r);
        assert_eq!(a.get_index_range(), r);
        assert_eq!(a.size_all(), 4 * 4 * 11);
        assert!(a.full_iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_irregular_zero_init() {
        let r = IndexRange2d::from_rows(3, vec![IndexRange1d::new(0, 1), IndexRange1d::new(-2, 4)]);
        let a = Array2d::<i32>::with_range(&r);
        assert_eq!(a.get_index_range(), r);
        assert_eq!(a[4].get_min_index(), -2);
        assert_eq!(a.size_all(), 9);
        assert!(!a.is_regular());
    }

    #[test]
    fn test_grow_keeps_values() {
        let mut a = Array2d::<f32>::with_range(&range2d((0, 2), (0, 2)));
        for (i, row) in a.indexed_iter_mut() {
            for (j, v) in row.as_mut_slice().iter_mut().enumerate() {
                *v = (i * 10 + j as i32) as f32 + 1.0;
            }
        }
        let old = a.clone();
        a.grow(&range2d((-2, 4), (-1, 3)));
        assert_eq!(a.get_index_range(), range2d((-2, 4), (-1, 3)));
        for i in -2..=4 {
            for j in -1..=3 {
                let inside = (0..=2).contains(&i) && (0..=2).contains(&j);
                if inside {
                    assert_eq!(a[[i, j]], old[[i, j]]);
                } else {
                    assert_eq!(a[[i, j]], 0.0);
                }
            }
        }
    }

    #[test]
    fn test_resize_shrinks() {
        let mut a = Array1d::<i16>::from_vec(-1, vec![1, 2, 3, 4]);
        a.resize_1d(0, 4);
        assert_eq!(a.as_slice(), &[2, 3, 4, 0, 0]);
        assert_eq!(a.get_min_index(), 0);
    }

    #[test]
    fn test_is_regular_after_row_resize() {
        let mut a = Array2d::<f32>::with_range(&range2d((0, 3), (0, 7)));
        assert!(a.is_regular());
        a[2].resize_1d(0, 5);
        assert!(!a.is_regular());
        assert!(a.get_regular_range().is_none());
    }

    #[test]
    fn test_coordinate_access_matches_chained() {
        let mut a = Array3d::<f64>::with_range(&range3d((0, 1), (-1, 1), (2, 3)));
        a[1][-1][3] = 4.5;
        assert_eq!(a[[1, -1, 3]], 4.5);
        a[[0, 1, 2]] = -1.0;
        assert_eq!(a[0][1][2], -1.0);
        assert_eq!(*a.at(&[1, -1, 3]), 4.5);
    }

    #[test]
    #[should_panic(expected = "坐标维数多于数组维数")]
    fn test_coordinate_access_rejects_extra_coords() {
        let a = Array2d::<f32>::with_range(&range2d((0, 1), (0, 1)));
        let _ = a.at(&[0, 0, 0]);
    }

    #[test]
    #[should_panic(expected = "坐标维数少于数组维数")]
    fn test_coordinate_access_rejects_missing_coords() {
        let mut a = Array3d::<f32>::with_range(&range3d((0, 1), (0, 1), (0, 1)));
        *a.at_mut(&[0, 0]) = 1.0;
    }

    #[test]
    fn test_reductions() {
        let a = Array1d::<f32>::from_vec(5, vec![1.0, -3.0, 2.5, 0.0]);
        assert_eq!(a.sum(), 0.5);
        assert_eq!(a.sum_positive(), 3.5);
        assert_eq!(a.find_max(), 2.5);
        assert_eq!(a.find_min(), -3.0);
    }

    #[test]
    fn test_resize_outer_adds_empty_rows() {
        let mut a = Array2d::<f32>::with_range(&range2d((0, 1), (0, 1)));
        a.fill(1.0);
        a.resize_outer(-1, 1);
        assert_eq!(a.get_min_index(), -1);
        assert!(a[-1].is_empty());
        assert_eq!(a.sum(), 4.0);
    }
}
