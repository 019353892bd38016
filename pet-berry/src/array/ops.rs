//! 数组算术运算.
//!
//! 两个数组之间的 `+=` 等运算先把左侧数组的外层范围扩展为两者的并集
//! (逐层递归), 再逐元素运算. 右侧数组没有覆盖的位置保持不变.

use super::core::{Array, Element};
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Sub, SubAssign};

macro_rules! impl_elementwise {
    ($Tr: ident, $f: ident) => {
        impl<'a, E> $Tr<&'a Array<E>> for Array<E>
        where
            E: Element + for<'b> $Tr<&'b E>,
        {
            fn $f(&mut self, rhs: &'a Array<E>) {
                self.grow_to_union(rhs);
                for (i, r) in rhs.indexed_iter() {
                    let row = &mut self[i];
                    row.grow_to_union(r);
                    row.$f(r);
                }
            }
        }
    };
}

impl_elementwise!(AddAssign, add_assign);
impl_elementwise!(SubAssign, sub_assign);
impl_elementwise!(MulAssign, mul_assign);
impl_elementwise!(DivAssign, div_assign);

macro_rules! impl_scalar_ops {
    ($($t: ty),+) => {
        $(
            impl<E: Element<Scalar = $t>> AddAssign<$t> for Array<E> {
                fn add_assign(&mut self, rhs: $t) {
                    self.full_iter_mut().for_each(|x| *x += rhs);
                }
            }

            impl<E: Element<Scalar = $t>> SubAssign<$t> for Array<E> {
                fn sub_assign(&mut self, rhs: $t) {
                    self.full_iter_mut().for_each(|x| *x -= rhs);
                }
            }

            impl<E: Element<Scalar = $t>> MulAssign<$t> for Array<E> {
                fn mul_assign(&mut self, rhs: $t) {
                    self.full_iter_mut().for_each(|x| *x *= rhs);
                }
            }

            impl<E: Element<Scalar = $t>> DivAssign<$t> for Array<E> {
                fn div_assign(&mut self, rhs: $t) {
                    self.full_iter_mut().for_each(|x| *x /= rhs);
                }
            }

            impl<E: Element<Scalar = $t>> Mul<$t> for Array<E> {
                type Output = Array<E>;

                #[inline]
                fn mul(mut self, rhs: $t) -> Array<E> {
                    self *= rhs;
                    self
                }
            }

            impl<E: Element<Scalar = $t>> Div<$t> for Array<E> {
                type Output = Array<E>;

                #[inline]
                fn div(mut self, rhs: $t) -> Array<E> {
                    self /= rhs;
                    self
                }
            }
        )+
    };
}

impl_scalar_ops!(i8, u8, i16, u16, i32, u32, f32, f64);

macro_rules! impl_binary {
    ($Tr: ident, $f: ident, $TrAssign: ident, $fa: ident) => {
        impl<'a, E> $Tr<&'a Array<E>> for &'a Array<E>
        where
            Array<E>: for<'b> $TrAssign<&'b Array<E>>,
            E: Element,
        {
            type Output = Array<E>;

            fn $f(self, rhs: &'a Array<E>) -> Array<E> {
                let mut out = self.clone();
                out.$fa(rhs);
                out
            }
        }
    };
}

impl_binary!(Add, add, AddAssign, add_assign);
impl_binary!(Sub, sub, SubAssign, sub_assign);
impl_binary!(Mul, mul, MulAssign, mul_assign);
impl_binary!(Div, div, DivAssign, div_assign);
