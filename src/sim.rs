//! Host-side panel simulation.
//!
//! [`VirtualPanel`] is a [`PortMap`] that records the control-line activity
//! of the scan engine and rebuilds what a real panel would show. It makes
//! the whole pipeline, from drawing to shifted bits, testable without
//! hardware.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::gamma::DUTY_OFF;
use crate::geometry::{DataLanes, PanelGeometry, Polarity};
use crate::port::PortMap;
use crate::Error;

/// One recorded control-line action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// OE compare value written.
    Duty(u8),
    /// One clock pulse with the data lane levels at that moment.
    Clock {
        /// R1 level.
        upper: bool,
        /// R2 level.
        lower: bool,
    },
    /// One latch pulse.
    Latch,
    /// Row address driven.
    Address(u8),
}

/// A simulated panel.
///
/// `ADDRESS_FIRST` and `DOUBLE_LATCH` mirror
/// [`PortMap::ADDRESS_BEFORE_LATCH`] and [`PortMap::DOUBLE_LATCH`] so both
/// board orderings can be exercised.
///
/// Latched data becomes visible on the addressed row when the output is
/// enabled again, i.e. on the next duty write, which is what a real panel
/// displays regardless of the latch/address order.
#[derive(Debug, Clone)]
pub struct VirtualPanel<const ADDRESS_FIRST: bool = true, const DOUBLE_LATCH: bool = false> {
    record: bool,
    events: Vec<Event>,
    data: (bool, bool),
    shifted: Vec<(bool, bool)>,
    latched: Option<Vec<(bool, bool)>>,
    rows: BTreeMap<u8, Vec<(bool, bool)>>,
    address: u8,
    duty: u8,
    tick_hz: Option<u32>,
    outputs_ready: bool,
}

impl<const ADDRESS_FIRST: bool, const DOUBLE_LATCH: bool> VirtualPanel<ADDRESS_FIRST, DOUBLE_LATCH> {
    /// A blank panel that records every event.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            record: true,
            events: Vec::new(),
            data: (false, false),
            shifted: Vec::new(),
            latched: None,
            rows: BTreeMap::new(),
            address: 0,
            duty: DUTY_OFF,
            tick_hz: None,
            outputs_ready: false,
        }
    }

    /// A blank panel that keeps row captures but no event log, for
    /// benchmarks and long runs.
    #[must_use]
    pub const fn quiet() -> Self {
        let mut panel = Self::new();
        panel.record = false;
        panel
    }

    fn push(&mut self, event: Event) {
        if self.record {
            self.events.push(event);
        }
    }

    /// Events recorded so far.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Forgets the recorded events.
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Bits shifted since the last latch, in shift order.
    #[must_use]
    pub fn shifted(&self) -> &[(bool, bool)] {
        &self.shifted
    }

    /// Bits displayed on scan row `address`, if it has been shown yet.
    #[must_use]
    pub fn row_bits(&self, address: u8) -> Option<&[(bool, bool)]> {
        self.rows.get(&address).map(Vec::as_slice)
    }

    /// Currently driven row address.
    #[must_use]
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Current OE compare value.
    #[must_use]
    pub fn duty(&self) -> u8 {
        self.duty
    }

    /// Rate of the running row timer, `None` when stopped.
    #[must_use]
    pub fn tick_hz(&self) -> Option<u32> {
        self.tick_hz
    }

    /// Whether [`PortMap::init_outputs`] has been called.
    #[must_use]
    pub fn outputs_ready(&self) -> bool {
        self.outputs_ready
    }

    /// Whether pixel `(x, y)` of a panel with `geometry` is lit, taking the
    /// lane layout and data polarity into account. Rows never displayed
    /// read as dark.
    #[must_use]
    pub fn lit(&self, geometry: &PanelGeometry, x: u32, y: u32) -> bool {
        let depth = u32::from(geometry.scan_depth);
        if depth == 0 || x >= geometry.total_width() || y >= u32::from(geometry.height) {
            return false;
        }
        let Some(bits) = self.rows.get(&((y % depth) as u8)) else {
            return false;
        };
        let group = y / depth;
        let raw = match geometry.lanes {
            DataLanes::Dual => bits.get(x as usize).map(|&(upper, lower)| {
                if group == 0 {
                    upper
                } else {
                    lower
                }
            }),
            DataLanes::Single => {
                let groups = geometry.row_groups() as u32;
                let index = (x / 8) * groups * 8 + (groups - 1 - group) * 8 + x % 8;
                bits.get(index as usize).map(|&(upper, _)| upper)
            }
        };
        match (raw, geometry.polarity) {
            (None, _) => false,
            (Some(level), Polarity::ActiveHigh) => level,
            (Some(level), Polarity::ActiveLow) => !level,
        }
    }
}

impl<const ADDRESS_FIRST: bool, const DOUBLE_LATCH: bool> Default
    for VirtualPanel<ADDRESS_FIRST, DOUBLE_LATCH>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const ADDRESS_FIRST: bool, const DOUBLE_LATCH: bool> PortMap
    for VirtualPanel<ADDRESS_FIRST, DOUBLE_LATCH>
{
    const NAME: &'static str = "virtual panel";
    const ADDRESS_LINES: u8 = 5;
    const ADDRESS_BEFORE_LATCH: bool = ADDRESS_FIRST;
    const DOUBLE_LATCH: bool = DOUBLE_LATCH;

    fn init_outputs(&mut self) -> Result<(), Error> {
        self.outputs_ready = true;
        Ok(())
    }

    fn write_data(&mut self, upper: bool, lower: bool) {
        self.data = (upper, lower);
    }

    fn pulse_clock(&mut self) {
        let (upper, lower) = self.data;
        self.shifted.push((upper, lower));
        self.push(Event::Clock { upper, lower });
    }

    fn pulse_latch(&mut self) {
        self.push(Event::Latch);
        // an empty re-latch keeps the previous capture
        if !self.shifted.is_empty() {
            self.latched = Some(core::mem::take(&mut self.shifted));
        }
    }

    fn write_address(&mut self, row: u8, bits: u8) {
        let mask = if bits >= 8 { 0xFF } else { (1u8 << bits) - 1 };
        self.address = row & mask;
        self.push(Event::Address(self.address));
    }

    fn output_duty(&self) -> u8 {
        self.duty
    }

    fn set_output_duty(&mut self, duty: u8) {
        self.duty = duty;
        self.push(Event::Duty(duty));
        if let Some(bits) = self.latched.take() {
            self.rows.insert(self.address, bits);
        }
    }

    fn start_row_timer(&mut self, tick_hz: u32) -> Result<(), Error> {
        if tick_hz == 0 {
            return Err(Error::UnsupportedTickRate(tick_hz));
        }
        self.tick_hz = Some(tick_hz);
        Ok(())
    }

    fn stop_row_timer(&mut self) {
        self.tick_hz = None;
    }
}
