//! Packed 1-bit-per-pixel framebuffer.
//!
//! # Memory Layout
//! Rows are stored top to bottom, `bytes_per_row` bytes each. Within a row,
//! byte `x / 8` holds eight horizontally adjacent pixels with the leftmost
//! pixel in the most significant bit, which is the order the scan engine
//! shifts them into the panel:
//!
//! ```text
//! byte:  |       0       |       1       | ...
//! bit:   7 6 5 4 3 2 1 0 7 6 5 4 3 2 1 0
//! x:     0 1 2 3 4 5 6 7 8 9 ...
//! ```
//!
//! Storage is allocated once by [`Framebuffer::try_new`] and never resized.

use alloc::vec::Vec;
use core::convert::Infallible;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::{OriginDimensions, Point, Size};
use embedded_graphics::Pixel;

use crate::geometry::{DataLanes, PanelGeometry, Polarity};
use crate::Error;

/// A monochrome bitmap covering a whole chain of panels.
#[derive(Clone, PartialEq, Eq)]
pub struct Framebuffer {
    geometry: PanelGeometry,
    bytes: Vec<u8>,
}

impl Framebuffer {
    /// A framebuffer with no storage. Used for unconfigured buffer slots.
    pub(crate) const fn empty() -> Self {
        Self {
            geometry: PanelGeometry {
                width: 0,
                height: 0,
                chain: 0,
                scan_depth: 0,
                lanes: DataLanes::Dual,
                polarity: Polarity::ActiveHigh,
            },
            bytes: Vec::new(),
        }
    }

    /// Allocates a cleared framebuffer for `geometry`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Allocation`] if the heap cannot hold the buffer.
    pub fn try_new(geometry: PanelGeometry) -> Result<Self, Error> {
        let len = geometry.buffer_len();
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| Error::Allocation)?;
        bytes.resize(len, 0);
        Ok(Self { geometry, bytes })
    }

    /// The geometry this buffer was allocated for.
    #[must_use]
    pub fn geometry(&self) -> &PanelGeometry {
        &self.geometry
    }

    /// Raw bitmap bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes of row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `y` is not below the panel height.
    #[must_use]
    #[inline]
    pub fn row(&self, y: usize) -> &[u8] {
        let bpr = self.geometry.bytes_per_row();
        &self.bytes[y * bpr..(y + 1) * bpr]
    }

    /// Returns the byte index and bit mask of `(x, y)`, or `None` when the
    /// point lies outside the panel.
    #[inline]
    fn locate(&self, x: i32, y: i32) -> Option<(usize, u8)> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.geometry.total_width() || y >= u32::from(self.geometry.height) {
            return None;
        }
        let index = y as usize * self.geometry.bytes_per_row() + (x as usize >> 3);
        Some((index, 0x80 >> (x & 7)))
    }

    /// Sets or clears one pixel. Points outside the panel are ignored.
    #[inline]
    pub fn set_pixel(&mut self, x: i32, y: i32, on: bool) {
        let Some((index, mask)) = self.locate(x, y) else {
            return;
        };
        if on {
            self.bytes[index] |= mask;
        } else {
            self.bytes[index] &= !mask;
        }
    }

    /// Reads one pixel, `None` outside the panel.
    #[must_use]
    pub fn pixel(&self, x: i32, y: i32) -> Option<bool> {
        self.locate(x, y)
            .map(|(index, mask)| self.bytes[index] & mask != 0)
    }

    /// Lights (`true`) or blanks (`false`) every pixel.
    pub fn fill(&mut self, on: bool) {
        self.bytes.fill(if on { 0xFF } else { 0x00 });
    }

    /// Blanks every pixel.
    pub fn clear(&mut self) {
        self.fill(false);
    }

    /// Copies the bitmap of `other`, which must share this buffer's geometry.
    pub(crate) fn copy_from(&mut self, other: &Self) {
        self.bytes.copy_from_slice(&other.bytes);
    }
}

impl core::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Framebuffer")
            .field("width", &self.geometry.total_width())
            .field("height", &self.geometry.height)
            .field("size", &self.bytes.len())
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Framebuffer {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Framebuffer {}x{} size: {}",
            self.geometry.total_width(),
            self.geometry.height,
            self.bytes.len()
        );
    }
}

impl OriginDimensions for Framebuffer {
    fn size(&self) -> Size {
        Size::new(self.geometry.total_width(), u32::from(self.geometry.height))
    }
}

impl embedded_graphics::draw_target::DrawTarget for Framebuffer {
    type Color = BinaryColor;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(Point { x, y }, color) in pixels {
            self.set_pixel(x, y, color.is_on());
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color.is_on());
        Ok(())
    }
}
