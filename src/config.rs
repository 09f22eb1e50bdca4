//! Panel configuration: geometry plus the timing and brightness a panel
//! starts with.

use crate::geometry::PanelGeometry;

/// Row tick rate used by [`PanelConfig::HUB08_64X32`].
///
/// 10 kHz over 16 scan rows refreshes the whole panel at 625 Hz.
pub const DEFAULT_TICK_HZ: u32 = 10_000;

/// Everything [`Panel::configure`](crate::Panel::configure) needs besides the
/// port map.
///
/// # Example
/// ```rust
/// use hub_panel::PanelConfig;
///
/// // two 64x32 HUB08 panels side by side, refreshed at 2 kHz per row
/// const CONFIG: PanelConfig = PanelConfig::HUB08_64X32
///     .with_chain(2)
///     .with_tick_hz(2_000);
///
/// assert_eq!(CONFIG.geometry.total_width(), 128);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelConfig {
    /// Panel layout.
    pub geometry: PanelGeometry,
    /// Scan interrupt rate in Hz (one scan row per tick).
    pub tick_hz: u32,
    /// Linear brightness programmed at configure time.
    pub brightness: u8,
}

impl PanelConfig {
    /// P4.75 64×32 HUB08 panel, 1/16 scan, dual data lanes.
    pub const HUB08_64X32: Self = Self {
        geometry: PanelGeometry::hub08(64, 32, 1, 16),
        tick_hz: DEFAULT_TICK_HZ,
        brightness: u8::MAX,
    };

    /// P10 32×16 HUB12 panel, 1/4 scan, single inverted data lane.
    pub const HUB12_32X16: Self = Self {
        geometry: PanelGeometry::hub12(32, 16, 1, 4),
        tick_hz: 1_250,
        brightness: 128,
    };

    /// Creates a configuration with the default tick rate and full brightness.
    #[must_use]
    pub const fn new(geometry: PanelGeometry) -> Self {
        Self {
            geometry,
            tick_hz: DEFAULT_TICK_HZ,
            brightness: u8::MAX,
        }
    }

    /// Returns a copy with a different chain length.
    #[must_use]
    pub const fn with_chain(mut self, chain: u16) -> Self {
        self.geometry = self.geometry.with_chain(chain);
        self
    }

    /// Returns a copy with a different scan tick rate.
    #[must_use]
    pub const fn with_tick_hz(mut self, tick_hz: u32) -> Self {
        self.tick_hz = tick_hz;
        self
    }

    /// Returns a copy with a different initial brightness.
    #[must_use]
    pub const fn with_brightness(mut self, brightness: u8) -> Self {
        self.brightness = brightness;
        self
    }

    /// Full-panel refresh rate in Hz for this tick rate and scan depth.
    #[must_use]
    pub const fn refresh_hz(&self) -> u32 {
        if self.geometry.scan_depth == 0 {
            return 0;
        }
        self.tick_hz / self.geometry.scan_depth as u32
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self::HUB08_64X32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{DataLanes, Polarity};

    #[test]
    fn test_presets_are_valid() {
        assert_eq!(PanelConfig::HUB08_64X32.geometry.validate(4), Ok(()));
        assert_eq!(PanelConfig::HUB12_32X16.geometry.validate(2), Ok(()));
        assert_eq!(PanelConfig::HUB12_32X16.geometry.lanes, DataLanes::Single);
        assert_eq!(
            PanelConfig::HUB12_32X16.geometry.polarity,
            Polarity::ActiveLow
        );
    }

    #[test]
    fn test_refresh_rate() {
        assert_eq!(PanelConfig::HUB08_64X32.refresh_hz(), 625);
        assert_eq!(PanelConfig::HUB08_64X32.with_tick_hz(2_000).refresh_hz(), 125);
    }

    #[test]
    fn test_builders() {
        let config = PanelConfig::default()
            .with_chain(3)
            .with_tick_hz(4_000)
            .with_brightness(10);
        assert_eq!(config.geometry.chain, 3);
        assert_eq!(config.geometry.width, 64);
        assert_eq!(config.tick_hz, 4_000);
        assert_eq!(config.brightness, 10);
    }

    #[test]
    fn test_new_defaults() {
        let config = PanelConfig::new(PanelGeometry::hub08(32, 16, 1, 8));
        assert_eq!(config.tick_hz, DEFAULT_TICK_HZ);
        assert_eq!(config.brightness, 255);
    }
}
