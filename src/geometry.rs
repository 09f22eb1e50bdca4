//! Panel geometry and its validation.

use derive_more::{Display, Error};

/// How many serial data lines feed the panel's shift registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataLanes {
    /// One data line (HUB12 `R`). Every row group of the scan is shifted
    /// through the same line, last group first.
    Single,
    /// Two data lines (HUB08 `R1`/`R2`) feeding the upper and lower half of
    /// the panel in parallel.
    Dual,
}

/// Electrical level on the data line(s) that lights an LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// A HIGH data bit lights the LED (HUB08).
    ActiveHigh,
    /// A LOW data bit lights the LED, so bytes are inverted while shifting (HUB12).
    ActiveLow,
}

/// Reasons a [`PanelGeometry`] cannot be scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GeometryError {
    /// Width, height, chain length or scan depth is zero.
    #[display("panel dimensions must be non-zero")]
    ZeroDimension,
    /// `width × chain` is not a whole number of bytes.
    #[display("total width must be a multiple of 8 pixels")]
    WidthNotByteAligned,
    /// Scan depth is not a power of two.
    #[display("scan depth {_0} is not a power of two")]
    ScanDepthNotPowerOfTwo(#[error(not(source))] u8),
    /// Height is not a whole number of scan groups.
    #[display("height {height} is not a multiple of scan depth {scan_depth}")]
    HeightNotMultipleOfScanDepth {
        /// Panel height in pixels.
        height: u16,
        /// Rows driven per tick.
        scan_depth: u8,
    },
    /// A dual-lane panel can only drive one or two row groups per tick.
    #[display("dual-lane panels need height equal to 1 or 2 times the scan depth")]
    TooManyRowGroups,
    /// The port map does not wire enough row-address lines.
    #[display("scan depth needs {needed} address lines but the port has {available}")]
    NotEnoughAddressLines {
        /// Address lines required by the scan depth.
        needed: u8,
        /// Address lines wired by the port map.
        available: u8,
    },
    /// One framebuffer would not fit the target's address space.
    #[display("a {bytes}-byte framebuffer does not fit the address space")]
    BufferTooLarge {
        /// Bytes one framebuffer needs.
        bytes: u64,
    },
}

/// Physical layout of one chain of HUB08/HUB12 panels.
///
/// Chained panels are wired side by side, so the drawable area is
/// `width × chain` pixels wide and `height` pixels tall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelGeometry {
    /// Width of a single panel in pixels.
    pub width: u16,
    /// Height of the panel in pixels.
    pub height: u16,
    /// Number of panels chained horizontally.
    pub chain: u16,
    /// Rows driven per scan tick (16 for a 1/16 scan panel).
    pub scan_depth: u8,
    /// Number of data lines.
    pub lanes: DataLanes,
    /// Data line level that lights an LED.
    pub polarity: Polarity,
}

impl PanelGeometry {
    /// A dual-lane, active-high HUB08 panel.
    #[must_use]
    pub const fn hub08(width: u16, height: u16, chain: u16, scan_depth: u8) -> Self {
        Self {
            width,
            height,
            chain,
            scan_depth,
            lanes: DataLanes::Dual,
            polarity: Polarity::ActiveHigh,
        }
    }

    /// A single-lane, active-low HUB12 panel.
    #[must_use]
    pub const fn hub12(width: u16, height: u16, chain: u16, scan_depth: u8) -> Self {
        Self {
            width,
            height,
            chain,
            scan_depth,
            lanes: DataLanes::Single,
            polarity: Polarity::ActiveLow,
        }
    }

    /// Returns a copy with a different chain length.
    #[must_use]
    pub const fn with_chain(mut self, chain: u16) -> Self {
        self.chain = chain;
        self
    }

    /// Drawable width of the whole chain in pixels.
    #[must_use]
    pub const fn total_width(&self) -> u32 {
        self.width as u32 * self.chain as u32
    }

    /// Size of one framebuffer in bytes, computed without overflow.
    #[must_use]
    pub const fn buffer_bytes(&self) -> u64 {
        (self.total_width() / 8) as u64 * self.height as u64
    }

    /// Bytes per framebuffer row.
    ///
    /// Only meaningful for geometries that pass [`PanelGeometry::validate`].
    #[must_use]
    pub const fn bytes_per_row(&self) -> usize {
        self.total_width() as usize / 8
    }

    /// Size of one framebuffer in bytes.
    #[must_use]
    pub const fn buffer_len(&self) -> usize {
        self.bytes_per_row() * self.height as usize
    }

    /// Row-address lines needed to select every scan row.
    #[must_use]
    pub const fn address_bits(&self) -> u8 {
        self.scan_depth.trailing_zeros() as u8
    }

    /// Number of physical rows driven by one scan row.
    #[must_use]
    pub const fn row_groups(&self) -> usize {
        if self.scan_depth == 0 {
            return 0;
        }
        self.height as usize / self.scan_depth as usize
    }

    /// Checks that the geometry can be scanned by a port wiring
    /// `address_lines` row-address lines.
    ///
    /// # Errors
    ///
    /// Returns the first [`GeometryError`] that applies. Nothing is adjusted
    /// to make an invalid geometry fit.
    pub fn validate(&self, address_lines: u8) -> Result<(), GeometryError> {
        if self.width == 0 || self.height == 0 || self.chain == 0 || self.scan_depth == 0 {
            return Err(GeometryError::ZeroDimension);
        }
        if self.total_width() % 8 != 0 {
            return Err(GeometryError::WidthNotByteAligned);
        }
        self.check_buffer_size(isize::MAX as u64)?;
        if !self.scan_depth.is_power_of_two() {
            return Err(GeometryError::ScanDepthNotPowerOfTwo(self.scan_depth));
        }
        if self.height % u16::from(self.scan_depth) != 0 {
            return Err(GeometryError::HeightNotMultipleOfScanDepth {
                height: self.height,
                scan_depth: self.scan_depth,
            });
        }
        if self.lanes == DataLanes::Dual && self.row_groups() > 2 {
            return Err(GeometryError::TooManyRowGroups);
        }
        if self.address_bits() > address_lines {
            return Err(GeometryError::NotEnoughAddressLines {
                needed: self.address_bits(),
                available: address_lines,
            });
        }
        Ok(())
    }

    // `Vec` cannot hold more than `isize::MAX` bytes, 32767 on AVR
    fn check_buffer_size(&self, max_bytes: u64) -> Result<(), GeometryError> {
        let bytes = self.buffer_bytes();
        if bytes > max_bytes {
            return Err(GeometryError::BufferTooLarge { bytes });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::format;

    use super::*;

    #[test]
    fn test_hub08_derived_values() {
        let g = PanelGeometry::hub08(64, 32, 1, 16);
        assert_eq!(g.total_width(), 64);
        assert_eq!(g.bytes_per_row(), 8);
        assert_eq!(g.buffer_len(), 256);
        assert_eq!(g.address_bits(), 4);
        assert_eq!(g.row_groups(), 2);
        assert_eq!(g.lanes, DataLanes::Dual);
        assert_eq!(g.polarity, Polarity::ActiveHigh);
    }

    #[test]
    fn test_chained_width() {
        let g = PanelGeometry::hub08(64, 32, 1, 16).with_chain(2);
        assert_eq!(g.total_width(), 128);
        assert_eq!(g.bytes_per_row(), 16);
        assert_eq!(g.buffer_len(), 512);
    }

    #[test]
    fn test_hub12_derived_values() {
        let g = PanelGeometry::hub12(32, 16, 1, 4);
        assert_eq!(g.bytes_per_row(), 4);
        assert_eq!(g.address_bits(), 2);
        assert_eq!(g.row_groups(), 4);
        assert_eq!(g.polarity, Polarity::ActiveLow);
        assert_eq!(g.validate(2), Ok(()));
    }

    #[test]
    fn test_valid_geometries() {
        assert_eq!(PanelGeometry::hub08(64, 32, 1, 16).validate(4), Ok(()));
        assert_eq!(PanelGeometry::hub08(64, 16, 2, 16).validate(4), Ok(()));
        assert_eq!(PanelGeometry::hub08(32, 16, 1, 8).validate(4), Ok(()));
        assert_eq!(PanelGeometry::hub12(8, 1, 1, 1).validate(0), Ok(()));
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        for g in [
            PanelGeometry::hub08(0, 32, 1, 16),
            PanelGeometry::hub08(64, 0, 1, 16),
            PanelGeometry::hub08(64, 32, 0, 16),
            PanelGeometry::hub08(64, 32, 1, 0),
        ] {
            assert_eq!(g.validate(4), Err(GeometryError::ZeroDimension));
        }
    }

    #[test]
    fn test_rejects_unaligned_width() {
        let g = PanelGeometry::hub08(60, 32, 1, 16);
        assert_eq!(g.validate(4), Err(GeometryError::WidthNotByteAligned));
        // 12 × 2 = 24 is byte aligned even though a single panel is not
        let g = PanelGeometry::hub08(12, 32, 2, 16);
        assert_eq!(g.validate(4), Ok(()));
    }

    #[test]
    fn test_rejects_non_power_of_two_scan() {
        let g = PanelGeometry::hub08(64, 24, 1, 12);
        assert_eq!(g.validate(4), Err(GeometryError::ScanDepthNotPowerOfTwo(12)));
    }

    #[test]
    fn test_rejects_height_not_multiple_of_scan() {
        let g = PanelGeometry::hub08(64, 24, 1, 16);
        assert_eq!(
            g.validate(4),
            Err(GeometryError::HeightNotMultipleOfScanDepth {
                height: 24,
                scan_depth: 16
            })
        );
    }

    #[test]
    fn test_rejects_dual_lane_with_many_groups() {
        let g = PanelGeometry::hub08(64, 32, 1, 8);
        assert_eq!(g.validate(4), Err(GeometryError::TooManyRowGroups));
        // the same layout is fine when shifted through a single lane
        let g = PanelGeometry::hub12(64, 32, 1, 8);
        assert_eq!(g.validate(4), Ok(()));
    }

    #[test]
    fn test_rejects_missing_address_lines() {
        let g = PanelGeometry::hub08(64, 64, 1, 32);
        assert_eq!(
            g.validate(4),
            Err(GeometryError::NotEnoughAddressLines {
                needed: 5,
                available: 4
            })
        );
    }

    #[test]
    fn test_buffer_size_against_address_space() {
        // 65536 px wide wraps to 0 in a 16-bit usize
        let g = PanelGeometry::hub08(2048, 32, 32, 16);
        assert_eq!(g.buffer_bytes(), 262_144);
        assert_eq!(
            g.check_buffer_size(i16::MAX as u64),
            Err(GeometryError::BufferTooLarge { bytes: 262_144 })
        );
        assert_eq!(PanelGeometry::hub08(64, 32, 1, 16).check_buffer_size(i16::MAX as u64), Ok(()));

        let huge = PanelGeometry::hub12(65528, 65528, 65535, 1);
        assert_eq!(huge.buffer_bytes(), 35_175_245_938_680);
        assert_eq!(
            huge.check_buffer_size(u64::from(u32::MAX)),
            Err(GeometryError::BufferTooLarge {
                bytes: 35_175_245_938_680
            })
        );
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_large_buffer_fits_64_bit_address_space() {
        assert_eq!(PanelGeometry::hub08(2048, 32, 32, 16).validate(4), Ok(()));
    }

    #[test]
    fn test_error_display() {
        let msg = format!("{}", GeometryError::ScanDepthNotPowerOfTwo(12));
        assert_eq!(msg, "scan depth 12 is not a power of two");
        let msg = format!(
            "{}",
            GeometryError::NotEnoughAddressLines {
                needed: 5,
                available: 4
            }
        );
        assert_eq!(msg, "scan depth needs 5 address lines but the port has 4");
        let msg = format!("{}", GeometryError::BufferTooLarge { bytes: 262_144 });
        assert_eq!(msg, "a 262144-byte framebuffer does not fit the address space");
    }
}
