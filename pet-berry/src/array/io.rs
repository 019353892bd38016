//! 数组的二进制流读写: 数值类型转换、统一缩放因子与字节序控制.
//!
//! 流中不包含任何头信息, 形状等元数据由调用者在外部保存.

use super::core::{Array, Element};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use num::{Num, NumCast};
use std::fmt::Debug;
use std::io::{self, Read, Write};
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 流中元素的数值类型.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NumericType {
    /// `i8`.
    I8,
    /// `u8`.
    U8,
    /// `i16`.
    I16,
    /// `u16`.
    U16,
    /// `i32`.
    I32,
    /// `u32`.
    U32,
    /// `f32`.
    F32,
    /// `f64`.
    F64,
}

impl NumericType {
    /// 单个元素占用的字节数.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// 是否为整数类型.
    #[inline]
    pub const fn is_integer(self) -> bool {
        !matches!(self, Self::F32 | Self::F64)
    }

    /// 该类型可表示的最大值.
    pub fn max_value(self) -> f64 {
        match self {
            Self::I8 => i8::MAX as f64,
            Self::U8 => u8::MAX as f64,
            Self::I16 => i16::MAX as f64,
            Self::U16 => u16::MAX as f64,
            Self::I32 => i32::MAX as f64,
            Self::U32 => u32::MAX as f64,
            Self::F32 => f32::MAX as f64,
            Self::F64 => f64::MAX,
        }
    }

    /// 该类型可表示的最小值.
    pub fn min_value(self) -> f64 {
        match self {
            Self::I8 => i8::MIN as f64,
            Self::I16 => i16::MIN as f64,
            Self::I32 => i32::MIN as f64,
            Self::U8 | Self::U16 | Self::U32 => 0.0,
            Self::F32 => f32::MIN as f64,
            Self::F64 => f64::MIN,
        }
    }
}

/// 流的字节序.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ByteOrder {
    /// 小端序.
    LittleEndian,
    /// 大端序.
    BigEndian,
}

impl ByteOrder {
    /// 本机字节序.
    #[inline]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::BigEndian
        } else {
            Self::LittleEndian
        }
    }

    /// 与本机相反的字节序.
    #[inline]
    pub const fn swapped() -> Self {
        match Self::native() {
            Self::LittleEndian => Self::BigEndian,
            Self::BigEndian => Self::LittleEndian,
        }
    }

    /// 是否为本机字节序.
    #[inline]
    pub fn is_native(self) -> bool {
        self == Self::native()
    }
}

impl Default for ByteOrder {
    #[inline]
    fn default() -> Self {
        Self::native()
    }
}

/// 按运行时字节序展开成两个分支, 分支内 `$e` 为对应的 `byteorder` 类型.
macro_rules! with_order {
    ($order: expr, $e: ident => $body: expr) => {
        match $order {
            ByteOrder::LittleEndian => {
                type $e = LittleEndian;
                $body
            }
            ByteOrder::BigEndian => {
                type $e = BigEndian;
                $body
            }
        }
    };
}

/// 数组的标量元素类型.
pub trait Scalar:
    Copy
    + Debug
    + Default
    + PartialOrd
    + Num
    + NumCast
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + for<'a> AddAssign<&'a Self>
    + for<'a> SubAssign<&'a Self>
    + for<'a> MulAssign<&'a Self>
    + for<'a> DivAssign<&'a Self>
    + Send
    + Sync
    + 'static
{
    /// 对应的流数值类型.
    const NUMERIC_TYPE: NumericType;

    /// 以给定字节序读取一个元素.
    fn read_one<Rd: Read>(r: &mut Rd, order: ByteOrder) -> io::Result<Self>;

    /// 以给定字节序写出一个元素.
    fn write_one<W: Write>(self, w: &mut W, order: ByteOrder) -> io::Result<()>;
}

macro_rules! impl_scalar {
    (byte $t: ty, $nt: expr, $read: ident, $write: ident) => {
        impl Scalar for $t {
            const NUMERIC_TYPE: NumericType = $nt;

            #[inline]
            fn read_one<Rd: Read>(r: &mut Rd, _: ByteOrder) -> io::Result<Self> {
                r.$read()
            }

            #[inline]
            fn write_one<W: Write>(self, w: &mut W, _: ByteOrder) -> io::Result<()> {
                w.$write(self)
            }
        }
    };
    ($t: ty, $nt: expr, $read: ident, $write: ident) => {
        impl Scalar for $t {
            const NUMERIC_TYPE: NumericType = $nt;

            #[inline]
            fn read_one<Rd: Read>(r: &mut Rd, order: ByteOrder) -> io::Result<Self> {
                with_order!(order, E => r.$read::<E>())
            }

            #[inline]
            fn write_one<W: Write>(self, w: &mut W, order: ByteOrder) -> io::Result<()> {
                with_order!(order, E => w.$write::<E>(self))
            }
        }
    };
}

impl_scalar!(byte i8, NumericType::I8, read_i8, write_i8);
impl_scalar!(byte u8, NumericType::U8, read_u8, write_u8);
impl_scalar!(i16, NumericType::I16, read_i16, write_i16);
impl_scalar!(u16, NumericType::U16, read_u16, write_u16);
impl_scalar!(i32, NumericType::I32, read_i32, write_i32);
impl_scalar!(u32, NumericType::U32, read_u32, write_u32);
impl_scalar!(f32, NumericType::F32, read_f32, write_f32);
impl_scalar!(f64, NumericType::F64, read_f64, write_f64);

/// 以 `ty` 类型读取一个值并提升为 `f64`.
pub(crate) fn read_as<R: Read>(r: &mut R, ty: NumericType, order: ByteOrder) -> io::Result<f64> {
    Ok(match ty {
        NumericType::I8 => i8::read_one(r, order)? as f64,
        NumericType::U8 => u8::read_one(r, order)? as f64,
        NumericType::I16 => i16::read_one(r, order)? as f64,
        NumericType::U16 => u16::read_one(r, order)? as f64,
        NumericType::I32 => i32::read_one(r, order)? as f64,
        NumericType::U32 => u32::read_one(r, order)? as f64,
        NumericType::F32 => f32::read_one(r, order)? as f64,
        NumericType::F64 => f64::read_one(r, order)?,
    })
}

/// 将 `v` 以 `ty` 类型写出. 整数类型会先四舍五入并截断到该类型的范围.
pub(crate) fn write_as<W: Write>(
    w: &mut W,
    ty: NumericType,
    order: ByteOrder,
    v: f64,
) -> io::Result<()> {
    let v = if ty.is_integer() {
        v.round().clamp(ty.min_value(), ty.max_value())
    } else {
        v
    };
    match ty {
        NumericType::I8 => (v as i8).write_one(w, order),
        NumericType::U8 => (v as u8).write_one(w, order),
        NumericType::I16 => (v as i16).write_one(w, order),
        NumericType::U16 => (v as u16).write_one(w, order),
        NumericType::I32 => (v as i32).write_one(w, order),
        NumericType::U32 => (v as u32).write_one(w, order),
        NumericType::F32 => (v as f32).write_one(w, order),
        NumericType::F64 => v.write_one(w, order),
    }
}

/// 计算把取值范围为 `[min, max]` 的数据写成 `ty` 类型时所需的最小缩放因子.
///
/// 当数据本身是整数并且已经落在 `ty` 的范围内时无需缩放, 返回 1.
pub(crate) fn required_scale(
    min: f64,
    max: f64,
    ty: NumericType,
    source_is_integer: bool,
) -> f64 {
    if !ty.is_integer() {
        return 1.0;
    }
    if source_is_integer && min >= ty.min_value() && max <= ty.max_value() {
        return 1.0;
    }
    let max_abs = if ty.min_value() < 0.0 {
        min.abs().max(max.abs())
    } else {
        max.max(0.0)
    };
    if max_abs == 0.0 {
        1.0
    } else {
        max_abs / ty.max_value()
    }
}

impl<E: Element> Array<E> {
    /// 以 `order` 字节序读入全部元素, 元素类型与数组一致.
    /// 数组的形状必须事先确定.
    pub fn read_data<R: Read>(&mut self, r: &mut R, order: ByteOrder) -> io::Result<()> {
        for v in self.full_iter_mut() {
            *v = E::Scalar::read_one(r, order)?;
        }
        Ok(())
    }

    /// 以 `order` 字节序写出全部元素, 元素类型与数组一致.
    pub fn write_data<W: Write>(&self, w: &mut W, order: ByteOrder) -> io::Result<()> {
        for &v in self.full_iter() {
            v.write_one(w, order)?;
        }
        Ok(())
    }

    /// 以 `ty` 类型写出全部元素, 所有元素共享同一个缩放因子: 流中的值为 `v / scale`.
    ///
    /// `scale` 为 `None` 时自动计算所需的最小缩放因子; 给定的缩放因子不足以容纳数据时
    /// 返回 `InvalidInput` 错误. 返回实际使用的缩放因子.
    pub fn write_data_as<W: Write>(
        &self,
        w: &mut W,
        ty: NumericType,
        scale: Option<f32>,
        order: ByteOrder,
    ) -> io::Result<f32> {
        let required = if self.size_all() == 0 {
            1.0
        } else {
            let min = to_f64(self.find_min());
            let max = to_f64(self.find_max());
            required_scale(min, max, ty, E::Scalar::NUMERIC_TYPE.is_integer())
        };
        let scale = match scale {
            None => required,
            Some(s) if s > 0.0 && (s as f64) >= required * (1.0 - 1e-6) => s as f64,
            Some(s) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("缩放因子 {s} 过小, 至少需要 {required}"),
                ))
            }
        };
        for &v in self.full_iter() {
            write_as(w, ty, order, to_f64(v) / scale)?;
        }
        Ok(scale as f32)
    }

    /// 读入以 `ty` 类型存储的全部元素, 每个值乘以 `scale` 后转换为数组元素类型.
    ///
    /// 转换后的值超出数组元素类型的范围时返回 `InvalidData` 错误.
    pub fn read_data_as<R: Read>(
        &mut self,
        r: &mut R,
        ty: NumericType,
        scale: f32,
        order: ByteOrder,
    ) -> io::Result<()> {
        let to_integer = E::Scalar::NUMERIC_TYPE.is_integer();
        for v in self.full_iter_mut() {
            let mut x = read_as(r, ty, order)? * scale as f64;
            if to_integer {
                x = x.round();
            }
            *v = num::cast(x).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, format!("{x} 超出元素类型的范围"))
            })?;
        }
        Ok(())
    }
}

#[inline]
fn to_f64<T: Scalar>(v: T) -> f64 {
    num::cast(v).unwrap_or(0.0)
}
