//! Row-scanning engine, the body of the timer interrupt.
//!
//! Each [`Engine::tick`] drives exactly one scan row:
//!
//! 1. blank the output (OE duty forced to [`DUTY_OFF`](crate::gamma::DUTY_OFF)),
//!    remembering the current duty,
//! 2. shift the row's pixels out MSB first from the front buffer,
//! 3. drive the row address and pulse the latch (in the order the
//!    [`PortMap`] asks for),
//! 4. restore the remembered duty,
//! 5. advance the row counter modulo the scan depth.
//!
//! The tick never allocates, never blocks and never reports errors. Ticks
//! arriving before [`Panel::configure`](crate::Panel::configure) finished, or
//! after the panel was dropped, are ignored.

use core::cell::UnsafeCell;
use core::sync::atomic::Ordering;

use portable_atomic::{AtomicBool, AtomicU8};

use crate::double_buffer::DoubleBuffer;
use crate::framebuffer::Framebuffer;
use crate::gamma::DUTY_OFF;
use crate::geometry::{DataLanes, Polarity};
use crate::port::PortMap;

/// State shared between the scan interrupt and the [`Panel`](crate::Panel)
/// that owns it.
///
/// Declare one as a `static` and call [`Engine::tick`] from the row timer's
/// interrupt vector. Only one [`Panel`](crate::Panel) can use an engine at a
/// time.
///
/// # Example
/// ```rust
/// use hub_panel::sim::VirtualPanel;
/// use hub_panel::{Engine, Panel, PanelConfig};
///
/// static ENGINE: Engine<VirtualPanel> = Engine::new();
///
/// // normally the row timer's interrupt handler
/// fn on_row_timer() {
///     ENGINE.tick();
/// }
///
/// let mut panel = Panel::configure(&ENGINE, PanelConfig::HUB08_64X32, VirtualPanel::new()).unwrap();
/// panel.set_pixel(0, 0, true);
/// panel.swap_buffers(false);
/// for _ in 0..16 {
///     on_row_timer();
/// }
/// let geometry = *panel.geometry();
/// assert_eq!(panel.with_port(|p| p.lit(&geometry, 0, 0)), Some(true));
/// ```
pub struct Engine<P> {
    buffers: DoubleBuffer,
    port: UnsafeCell<Option<P>>,
    row: AtomicU8,
    initialized: AtomicBool,
    claimed: AtomicBool,
}

// SAFETY: the port is only touched inside critical sections, the buffers
// follow the `DoubleBuffer` access rules and the claim flag guarantees a
// single drawing owner.
unsafe impl<P: Send> Sync for Engine<P> {}

impl<P> Engine<P> {
    /// An unclaimed, uninitialized engine.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffers: DoubleBuffer::new(),
            port: UnsafeCell::new(None),
            row: AtomicU8::new(0),
            initialized: AtomicBool::new(false),
            claimed: AtomicBool::new(false),
        }
    }

    /// Whether a panel is configured and ticks are being processed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// The scan row the next tick will drive.
    #[must_use]
    pub fn current_row(&self) -> u8 {
        self.row.load(Ordering::Relaxed)
    }

    pub(crate) fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn unclaim(&self) {
        self.claimed.store(false, Ordering::Release);
    }

    pub(crate) fn buffers(&self) -> &DoubleBuffer {
        &self.buffers
    }

    /// Installs the buffers and an initialized port and arms the tick guard.
    ///
    /// # Safety
    ///
    /// The caller must hold the claim.
    pub(crate) unsafe fn bring_up(&self, front: Framebuffer, back: Framebuffer, mut port: P, duty: u8)
    where
        P: PortMap,
    {
        critical_section::with(|_cs| {
            self.buffers.install(front, back);
            port.set_output_duty(duty);
            *self.port.get() = Some(port);
            self.row.store(0, Ordering::Relaxed);
            self.initialized.store(true, Ordering::Release);
        });
    }

    /// Disarms the tick guard, stops the timer, blanks the output and frees
    /// the buffers. Returns the port.
    ///
    /// # Safety
    ///
    /// The caller must hold the claim and no buffer reference may be alive.
    pub(crate) unsafe fn tear_down(&self) -> Option<P>
    where
        P: PortMap,
    {
        critical_section::with(|_cs| {
            self.initialized.store(false, Ordering::Release);
            let mut port = (*self.port.get()).take();
            if let Some(port) = port.as_mut() {
                port.stop_row_timer();
                port.set_output_duty(DUTY_OFF);
            }
            self.buffers.release();
            self.row.store(0, Ordering::Relaxed);
            port
        })
    }

    /// Runs `f` on the port with the scan interrupt masked.
    ///
    /// # Safety
    ///
    /// The caller must hold the claim.
    pub(crate) unsafe fn with_port<R>(&self, f: impl FnOnce(&mut P) -> R) -> Option<R> {
        critical_section::with(|_cs| (*self.port.get()).as_mut().map(f))
    }

    /// Drives the next scan row. Call this from the row timer interrupt.
    pub fn tick(&self)
    where
        P: PortMap,
    {
        if !self.initialized.load(Ordering::Acquire) {
            return;
        }
        critical_section::with(|_cs| {
            // SAFETY: the port is only reached inside critical sections.
            let Some(port) = (unsafe { (*self.port.get()).as_mut() }) else {
                return;
            };
            // SAFETY: swaps and releases are masked too, so the front buffer
            // stays put until this closure returns.
            let front = unsafe { self.buffers.front() };
            let depth = front.geometry().scan_depth;
            if depth == 0 {
                return;
            }
            let row = self.row.load(Ordering::Relaxed);
            scan_row(port, front, row);
            self.row.store((row + 1) % depth, Ordering::Relaxed);
        });
    }
}

impl<P> Default for Engine<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> core::fmt::Debug for Engine<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("initialized", &self.is_initialized())
            .field("row", &self.current_row())
            .field("claimed", &self.claimed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Shifts one byte per lane, MSB first.
#[inline(always)]
fn shift_byte<P: PortMap>(port: &mut P, upper: u8, lower: u8) {
    for bit in (0..8).rev() {
        port.shift_bit((upper >> bit) & 1 != 0, (lower >> bit) & 1 != 0);
    }
}

#[inline(always)]
fn latch<P: PortMap>(port: &mut P) {
    port.pulse_latch();
    if P::DOUBLE_LATCH {
        port.pulse_latch();
    }
}

/// Shifts out, addresses and latches scan row `row` of `frame`, with the
/// output blanked for the duration.
///
/// Dual-lane panels shift rows `row` and `row + scan_depth` side by side.
/// Single-lane panels shift, per byte column, the byte of every row group
/// from the last group down to the first.
///
/// A `row` outside `0..scan_depth` is ignored and the port is left untouched.
pub fn scan_row<P: PortMap>(port: &mut P, frame: &Framebuffer, row: u8) {
    let geometry = frame.geometry();
    if row >= geometry.scan_depth {
        return;
    }
    let saved = port.output_duty();
    port.set_output_duty(DUTY_OFF);

    let invert = match geometry.polarity {
        Polarity::ActiveHigh => 0x00,
        Polarity::ActiveLow => 0xFF,
    };
    let depth = usize::from(geometry.scan_depth);
    let r = usize::from(row);

    match geometry.lanes {
        DataLanes::Dual => {
            let upper = frame.row(r);
            let lower = (geometry.row_groups() > 1).then(|| frame.row(r + depth));
            for (i, &byte) in upper.iter().enumerate() {
                let other = lower.map_or(0, |lower| lower[i]);
                shift_byte(port, byte ^ invert, other ^ invert);
            }
        }
        DataLanes::Single => {
            let groups = geometry.row_groups();
            for col in 0..geometry.bytes_per_row() {
                for group in (0..groups).rev() {
                    let byte = frame.row(r + group * depth)[col];
                    shift_byte(port, byte ^ invert, 0);
                }
            }
        }
    }

    let bits = geometry.address_bits();
    if P::ADDRESS_BEFORE_LATCH {
        port.write_address(row, bits);
        latch(port);
    } else {
        latch(port);
        port.write_address(row, bits);
    }

    port.set_output_duty(saved);
}
