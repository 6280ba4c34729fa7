//! Cursor width abstraction
//!
//! 游标宽度抽象
//!
//! A ring is parameterized by the unsigned integer type of its cursors. Both cursors
//! grow without bound and are only ever compared through wrapping subtraction, so the
//! width decides how large the capacity may be, not how long the ring may live.
//!
//! 环形缓冲区以游标的无符号整数类型作为参数。两个游标无限增长，只通过回绕减法
//! 进行比较，因此宽度决定容量上限，而不是缓冲区的寿命。

use std::fmt;
use std::ops::BitAnd;

mod sealed {
    pub trait Sealed {}
}

/// Unsigned integer usable as a ring cursor
///
/// 可用作环形缓冲区游标的无符号整数
///
/// Implemented for `u16` and `u32`. The trait is sealed.
///
/// 已为 `u16` 和 `u32` 实现，该 trait 是封闭的。
pub trait RingIndex:
    sealed::Sealed
    + Copy
    + Eq
    + Ord
    + Default
    + fmt::Debug
    + fmt::Display
    + BitAnd<Output = Self>
    + Send
    + Sync
    + 'static
{
    /// Bit width of the cursor type
    ///
    /// 游标类型的位宽
    const BITS: u32;

    /// Zero
    const ZERO: Self;

    fn wrapping_add(self, rhs: Self) -> Self;

    fn wrapping_sub(self, rhs: Self) -> Self;

    /// Widen to `usize` (lossless for every implementor)
    ///
    /// 扩展为 `usize`（对所有实现均无损）
    fn to_usize(self) -> usize;

    /// Narrow from `usize`, keeping the low bits
    ///
    /// 从 `usize` 截断，保留低位
    fn from_usize_truncating(n: usize) -> Self;

    /// Narrow from `usize`, returning `None` if `n` does not fit
    ///
    /// 从 `usize` 转换，若 `n` 放不下则返回 `None`
    fn try_from_usize(n: usize) -> Option<Self>;
}

macro_rules! impl_ring_index {
    ($($t:ty),*) => {
        $(
            impl sealed::Sealed for $t {}

            impl RingIndex for $t {
                const BITS: u32 = <$t>::BITS;
                const ZERO: Self = 0;

                #[inline]
                fn wrapping_add(self, rhs: Self) -> Self {
                    <$t>::wrapping_add(self, rhs)
                }

                #[inline]
                fn wrapping_sub(self, rhs: Self) -> Self {
                    <$t>::wrapping_sub(self, rhs)
                }

                #[inline]
                fn to_usize(self) -> usize {
                    self as usize
                }

                #[inline]
                fn from_usize_truncating(n: usize) -> Self {
                    n as $t
                }

                #[inline]
                fn try_from_usize(n: usize) -> Option<Self> {
                    <$t>::try_from(n).ok()
                }
            }
        )*
    };
}

impl_ring_index!(u16, u32);
