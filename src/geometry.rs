//! Ring geometry - capacity and mask derived from the page size
//!
//! 环形缓冲区几何参数 - 由页大小推导出的容量与掩码
//!
//! The capacity is always `page_size × 2^extra_page_log2`, a power of two that fits in
//! the cursor type with its top bit left unused. Keeping that bit free means the
//! wrapping distance `end - start` can never be confused between "empty" and "full".
//!
//! 容量总是 `page_size × 2^extra_page_log2`，是一个 2 的幂次，并且在游标类型中保留
//! 最高位不用。保留该位可保证回绕距离 `end - start` 不会混淆"空"与"满"。

use crate::error::{Result, RingError};
use crate::index::RingIndex;
use tracing::trace;

/// Immutable capacity and mask of a ring
///
/// 环形缓冲区不可变的容量与掩码
///
/// # Type Parameters
/// - `I`: Cursor width (`u16` or `u32`)
///
/// # 类型参数
/// - `I`: 游标宽度（`u16` 或 `u32`）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry<I: RingIndex = u32> {
    /// Buffer size in bytes (power of 2)
    ///
    /// 缓冲区字节数（2 的幂次）
    capacity: I,

    /// `capacity - 1`, folds a cursor into an offset
    ///
    /// `capacity - 1`，用于将游标折叠为偏移量
    mask: I,

    /// Page size the geometry was derived from
    ///
    /// 推导该几何参数时使用的页大小
    page_size: usize,
}

impl<I: RingIndex> Geometry<I> {
    /// All-zero geometry of a destroyed ring
    pub(crate) const EMPTY: Self = Self {
        capacity: I::ZERO,
        mask: I::ZERO,
        page_size: 0,
    };

    /// Derive the geometry for `2^extra_page_log2` pages of the platform page size
    ///
    /// 按平台页大小推导 `2^extra_page_log2` 个页的几何参数
    ///
    /// # Errors
    ///
    /// `RingError::Domain` if the capacity would not fit `I` with one bit of headroom.
    ///
    /// 如果容量在保留一个高位后无法放入 `I`，返回 `RingError::Domain`。
    ///
    /// # Examples
    ///
    /// ```
    /// use magicring::Geometry;
    ///
    /// let geometry = Geometry::<u32>::new(0).unwrap();
    /// assert_eq!(geometry.capacity_bytes(), rustix::param::page_size());
    ///
    /// // 2^16 pages can never fit a 16-bit cursor
    /// assert!(Geometry::<u16>::new(16).is_err());
    /// ```
    pub fn new(extra_page_log2: u8) -> Result<Self> {
        Self::with_page_size(rustix::param::page_size(), extra_page_log2)
    }

    /// Same as [`Geometry::new`] with an explicit page size
    ///
    /// 与 [`Geometry::new`] 相同，但显式指定页大小
    ///
    /// # Errors
    ///
    /// - `RingError::InvalidArgument` if `page_size` is not a non-zero power of 2
    /// - `RingError::Domain` if the capacity does not fit `I` with headroom
    ///
    /// - 如果 `page_size` 不是非零的 2 的幂次，返回 `RingError::InvalidArgument`
    /// - 如果容量在保留高位后无法放入 `I`，返回 `RingError::Domain`
    pub fn with_page_size(page_size: usize, extra_page_log2: u8) -> Result<Self> {
        if !page_size.is_power_of_two() {
            return Err(RingError::InvalidArgument(
                "page size must be a non-zero power of two",
            ));
        }

        let page_log2 = page_size.trailing_zeros();
        let extra_page_log2 = u32::from(extra_page_log2);
        let max = I::BITS - 1;

        if page_log2 + extra_page_log2 > max {
            return Err(RingError::Domain {
                page_log2,
                extra_page_log2,
                max,
            });
        }

        // the check above keeps the shift below I::BITS
        let capacity = I::from_usize_truncating(1usize << (page_log2 + extra_page_log2));
        let mask = capacity.wrapping_sub(I::from_usize_truncating(1));

        trace!(
            page_size,
            extra_page_log2,
            capacity = capacity.to_usize(),
            "derived ring geometry"
        );

        Ok(Self {
            capacity,
            mask,
            page_size,
        })
    }

    /// Smallest geometry whose capacity is at least `min_bytes`
    ///
    /// 容量不小于 `min_bytes` 的最小几何参数
    ///
    /// A request of zero bytes yields a single page.
    ///
    /// 请求 0 字节时返回单页。
    pub fn for_min_capacity(min_bytes: usize) -> Result<Self> {
        Self::fit(rustix::param::page_size(), min_bytes)
    }

    fn fit(page_size: usize, min_bytes: usize) -> Result<Self> {
        if !page_size.is_power_of_two() {
            return Err(RingError::InvalidArgument(
                "page size must be a non-zero power of two",
            ));
        }

        let page_log2 = page_size.trailing_zeros();
        let max = I::BITS - 1;
        let too_big = |extra_page_log2| RingError::Domain {
            page_log2,
            extra_page_log2,
            max,
        };

        let needed = min_bytes
            .max(page_size)
            .checked_next_power_of_two()
            .ok_or_else(|| too_big(usize::BITS - page_log2))?;
        let extra_page_log2 = needed.trailing_zeros() - page_log2;
        let extra_page_log2 = u8::try_from(extra_page_log2).map_err(|_| too_big(extra_page_log2))?;

        Self::with_page_size(page_size, extra_page_log2)
    }

    /// Largest `extra_page_log2` accepted for pages of `2^page_log2` bytes
    ///
    /// 对于 `2^page_log2` 字节的页，可接受的最大 `extra_page_log2`
    ///
    /// Returns `None` if even a single page does not fit `I`.
    ///
    /// 如果连单页都无法放入 `I`，返回 `None`。
    pub fn max_extra_page_log2(page_log2: u32) -> Option<u8> {
        (I::BITS - 1)
            .checked_sub(page_log2)
            .and_then(|extra| u8::try_from(extra).ok())
    }

    /// Buffer size in bytes
    ///
    /// 缓冲区字节数
    #[inline]
    pub fn capacity(&self) -> I {
        self.capacity
    }

    /// Buffer size as `usize`
    ///
    /// 以 `usize` 表示的缓冲区字节数
    #[inline]
    pub fn capacity_bytes(&self) -> usize {
        self.capacity.to_usize()
    }

    /// `capacity - 1`
    #[inline]
    pub fn mask(&self) -> I {
        self.mask
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages making up the buffer
    ///
    /// 构成缓冲区的页数
    #[inline]
    pub fn pages(&self) -> usize {
        match self.page_size {
            0 => 0,
            page_size => self.capacity_bytes() / page_size,
        }
    }

    /// Fold a cursor into a byte offset inside the primary mapping
    ///
    /// 将游标折叠为主映射内的字节偏移
    #[inline]
    pub fn offset_of(&self, cursor: I) -> usize {
        (cursor & self.mask).to_usize()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.capacity == I::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: usize = 4096;

    #[test]
    fn test_capacity_is_page_multiple() {
        for extra in 0..=19u8 {
            let geometry = Geometry::<u32>::with_page_size(PAGE, extra).unwrap();
            assert_eq!(geometry.capacity_bytes(), PAGE << extra);
            assert!(geometry.capacity_bytes().is_power_of_two());
            assert_eq!(geometry.mask(), geometry.capacity() - 1);
            assert_eq!(geometry.capacity() & geometry.mask(), 0);
            assert_eq!(geometry.pages(), 1 << extra);
        }
    }

    #[test]
    fn test_u32_range() {
        assert!(Geometry::<u32>::with_page_size(PAGE, 19).is_ok());
        assert_eq!(
            Geometry::<u32>::with_page_size(PAGE, 19).unwrap().capacity(),
            1 << 31
        );

        match Geometry::<u32>::with_page_size(PAGE, 20) {
            Err(RingError::Domain {
                page_log2,
                extra_page_log2,
                max,
            }) => {
                assert_eq!(page_log2, 12);
                assert_eq!(extra_page_log2, 20);
                assert_eq!(max, 31);
            }
            other => panic!("expected domain error, got {other:?}"),
        }
    }

    #[test]
    fn test_u16_range() {
        let sizes: Vec<u16> = (0..=3u8)
            .map(|extra| Geometry::<u16>::with_page_size(PAGE, extra).unwrap().capacity())
            .collect();
        assert_eq!(sizes, vec![4096, 8192, 16384, 32768]);

        assert!(matches!(
            Geometry::<u16>::with_page_size(PAGE, 4),
            Err(RingError::Domain { max: 15, .. })
        ));
    }

    #[test]
    fn test_bad_page_size() {
        assert!(matches!(
            Geometry::<u32>::with_page_size(0, 0),
            Err(RingError::InvalidArgument(_))
        ));
        assert!(matches!(
            Geometry::<u32>::with_page_size(3000, 0),
            Err(RingError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_max_extra_page_log2() {
        assert_eq!(Geometry::<u32>::max_extra_page_log2(12), Some(19));
        assert_eq!(Geometry::<u16>::max_extra_page_log2(12), Some(3));
        assert_eq!(Geometry::<u16>::max_extra_page_log2(14), Some(1));
        assert_eq!(Geometry::<u16>::max_extra_page_log2(16), None);
    }

    #[test]
    fn test_fit() {
        assert_eq!(Geometry::<u32>::fit(PAGE, 0).unwrap().capacity(), 4096);
        assert_eq!(Geometry::<u32>::fit(PAGE, 1).unwrap().capacity(), 4096);
        assert_eq!(Geometry::<u32>::fit(PAGE, 4096).unwrap().capacity(), 4096);
        assert_eq!(Geometry::<u32>::fit(PAGE, 4097).unwrap().capacity(), 8192);
        assert_eq!(Geometry::<u32>::fit(PAGE, 100_000).unwrap().capacity(), 131_072);

        assert_eq!(Geometry::<u16>::fit(PAGE, 32768).unwrap().capacity(), 32768);
        assert!(matches!(
            Geometry::<u16>::fit(PAGE, 32769),
            Err(RingError::Domain { .. })
        ));
        assert!(matches!(
            Geometry::<u32>::fit(PAGE, usize::MAX),
            Err(RingError::Domain { .. })
        ));
    }

    #[test]
    fn test_offset_of() {
        let geometry = Geometry::<u16>::with_page_size(PAGE, 0).unwrap();
        assert_eq!(geometry.offset_of(4090), 4090);
        assert_eq!(geometry.offset_of(4096 + 7), 7);
        assert_eq!(geometry.offset_of(u16::MAX), 4095);
    }

    #[test]
    fn test_empty() {
        let geometry = Geometry::<u32>::EMPTY;
        assert!(geometry.is_empty());
        assert_eq!(geometry.pages(), 0);
        assert_eq!(geometry.capacity_bytes(), 0);
    }
}
