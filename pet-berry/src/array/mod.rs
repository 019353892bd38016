//! 带偏移的多维数值数组.
//!
//! 维数在编译期由嵌套确定, 每一行都可以拥有各自的索引范围 (不规则数组).
//! 数组提供两种遍历方式:
//!
//! 1. 层次化遍历: [`Array::iter`], 每次给出低一维的子数组;
//! 2. 全元素遍历: [`Array::full_iter`], 按行优先顺序给出每一个标量.
//!
//! # 例子
//!
//! ```
//! use pet_berry::array::{range2d, Array2d};
//!
//! let mut a = Array2d::<f32>::with_range(&range2d((-1, 1), (0, 3)));
//! a[[0, 2]] = 1.5;
//! assert_eq!(a[0][2], 1.5);
//! assert_eq!(a.full_iter().count(), 12);
//! assert!(a.is_regular());
//! ```

mod core;
mod io;
mod iter;
mod ops;
mod range;

pub use self::core::{Array, Array1d, Array2d, Array3d, Array4d, Element};
pub use self::io::{ByteOrder, NumericType, Scalar};
pub use self::iter::{FullIter, FullIterMut};
pub use self::range::{
    range2d, range3d, IndexRange, IndexRange1d, IndexRange2d, IndexRange3d, IndexRange4d,
    RangeShape,
};
