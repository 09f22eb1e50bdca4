//! Hardware port maps: how the logical HUB08/HUB12 signals reach the pins.
//!
//! A port map binds the logical roles (data lanes, CLK, LAT, OE, row
//! address) and the row timer to one board's registers. The scan engine is
//! generic over [`PortMap`], so the mapping is monomorphized into the tick
//! loop at build time and there is no dynamic dispatch per bit.
//!
//! Provided variants:
//! - [`avr::Atmega328p`]: Arduino Uno, Nano and Pro Mini
//! - [`avr::Atmega2560`]: Arduino Mega 2560
//! - [`avr::Atmega2560Hub12`]: Arduino Mega 2560 wired to a HUB12 panel
//! - [`hal::HalPort`]: any `embedded-hal` 1.0 pins plus a PWM channel for OE
//! - [`VirtualPanel`](crate::sim::VirtualPanel): a host-side simulation

pub mod avr;
pub mod hal;

use crate::Error;

/// Control-line operations the scan engine needs from a board.
///
/// Every method except [`PortMap::init_outputs`] runs inside the scan
/// interrupt or inside a critical section and must return quickly without
/// blocking. Pin errors cannot be reported from there, so implementations
/// drop them.
pub trait PortMap {
    /// Board name, for diagnostics.
    const NAME: &'static str;

    /// Number of row-address lines wired (A, B, C, ...).
    const ADDRESS_LINES: u8;

    /// Drive the row address before pulsing the latch. When `false` the latch
    /// is pulsed first and the address follows.
    const ADDRESS_BEFORE_LATCH: bool = true;

    /// Pulse the latch twice per row.
    const DOUBLE_LATCH: bool = false;

    /// Configures every control line as an output, driven low, with OE
    /// blanked. Called once from [`Panel::configure`](crate::Panel::configure).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pin`] if a control line cannot be driven.
    fn init_outputs(&mut self) -> Result<(), Error>;

    /// Drives the data lanes. Single-lane boards ignore `lower`.
    fn write_data(&mut self, upper: bool, lower: bool);

    /// Pulses CLK high then low.
    fn pulse_clock(&mut self);

    /// Pulses LAT high then low.
    fn pulse_latch(&mut self);

    /// Drives the lowest `bits` address lines with the bits of `row`.
    fn write_address(&mut self, row: u8, bits: u8);

    /// Current OE compare value (OE active-low off time).
    fn output_duty(&self) -> u8;

    /// Programs the OE compare value directly.
    fn set_output_duty(&mut self, duty: u8);

    /// Starts the periodic row interrupt at `tick_hz`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedTickRate`] if the timer cannot produce
    /// the requested rate.
    fn start_row_timer(&mut self, tick_hz: u32) -> Result<(), Error>;

    /// Masks the periodic row interrupt.
    fn stop_row_timer(&mut self);

    /// Shifts one bit into each lane: data first, then a clock pulse.
    #[inline(always)]
    fn shift_bit(&mut self, upper: bool, lower: bool) {
        self.write_data(upper, lower);
        self.pulse_clock();
    }
}
