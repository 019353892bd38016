//! 行优先的全元素迭代器.

use std::fmt::{self, Debug, Formatter};
use std::iter::FusedIterator;

/// 按行优先顺序遍历多维数组的所有叶子元素.
///
/// 已知总长度, 因此实现了 [`ExactSizeIterator`].
pub struct FullIter<'a, T> {
    inner: Box<dyn Iterator<Item = &'a T> + 'a>,
    remaining: usize,
}

impl<'a, T> FullIter<'a, T> {
    pub(crate) fn new(inner: Box<dyn Iterator<Item = &'a T> + 'a>, len: usize) -> Self {
        Self {
            inner,
            remaining: len,
        }
    }
}

impl<T> Debug for FullIter<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FullIter")
            .field("remaining", &self.remaining)
            .finish()
    }
}

impl<'a, T> Iterator for FullIter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        let v = self.inner.next()?;
        self.remaining -= 1;
        Some(v)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for FullIter<'_, T> {}

impl<T> FusedIterator for FullIter<'_, T> {}

/// [`FullIter`] 的可变版本.
pub struct FullIterMut<'a, T> {
    inner: Box<dyn Iterator<Item = &'a mut T> + 'a>,
    remaining: usize,
}

impl<'a, T> FullIterMut<'a, T> {
    pub(crate) fn new(inner: Box<dyn Iterator<Item = &'a mut T> + 'a>, len: usize) -> Self {
        Self {
            inner,
            remaining: len,
        }
    }
}

impl<T> Debug for FullIterMut<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FullIterMut")
            .field("remaining", &self.remaining)
            .finish()
    }
}

impl<'a, T> Iterator for FullIterMut<'a, T> {
    type Item = &'a mut T;

    #[inline]
    fn next(&mut self) -> Option<&'a mut T> {
        let v = self.inner.next()?;
        self.remaining -= 1;
        Some(v)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for FullIterMut<'_, T> {}

impl<T> FusedIterator for FullIterMut<'_, T> {}

#[cfg(test)]
mod tests {
    use crate::array::{range2d, Array2d, IndexRange, IndexRange1d};

    #[test]
    fn test_full_iter_len_and_restart() {
        let a = Array2d::<f32>::with_range(&range2d((-1, 1), (0, 4)));
        let it = a.full_iter();
        assert_eq!(it.len(), a.size_all());
        assert_eq!(a.full_iter().count(), 15);
        assert_eq!(a.full_iter().count(), 15);
    }

    #[test]
    fn test_full_iter_row_major_irregular() {
        let r = IndexRange::from_rows(0, vec![IndexRange1d::new(0, 1), IndexRange1d::new(5, 7)]);
        let mut a = Array2d::<i32>::with_range(&r);
        for (k, v) in a.full_iter_mut().enumerate() {
            *v = k as i32;
        }
        assert_eq!(a[1][5], 2);
        assert_eq!(a[1][7], 4);
        let seen: Vec<i32> = a.full_iter().copied().collect();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_full_iter_empty() {
        let a = Array2d::<f32>::new();
        assert_eq!(a.full_iter().next(), None);
        assert_eq!(a.full_iter().len(), 0);
    }
}
