//! Scan engine and framebuffer for HUB08/HUB12 monochrome LED matrix panels.
//!
//! ## How HUB08/HUB12 LED Panels Work
//!
//! HUB08 and HUB12 panels are single-colour, row-multiplexed displays. Like
//! their HUB75 RGB cousins they behave as a long shift-register chain rather
//! than as random-access memory: the controller has to stream every row over
//! and over again, fast enough that the eye sees a steady picture.
//!
//! ### Signal names
//! - **R1 / R2** – Serial data for the upper and lower half of the panel (HUB08). HUB12 has a single **R** line and inverted data: a LOW bit lights the LED
//! - **CLK** – Shift clock; every rising edge pushes one bit into the chain
//! - **LAT / STB** – Latch; copies the shift register into the LED drivers
//! - **OE** – Output-Enable (active LOW): LEDs are lit while OE is LOW and blanked while it is HIGH
//! - **A B C D** – Row-address lines selecting which scan row is lit
//!
//! ### Scan workflow (e.g., 64×32 HUB08 panel at 1/16 scan)
//! 1. A timer interrupt fires once per scan row.
//! 2. The controller blanks the panel by driving OE HIGH.
//! 3. It shifts the row's 64 bits out on R1, and in the same clocks the 64 bits of the row 16 lines below on R2.
//! 4. It drives the row address and pulses LAT. Some boards want the address first and some the latch first, see [`PortMap::ADDRESS_BEFORE_LATCH`].
//! 5. OE returns to its PWM duty and the row lights up until the next interrupt.
//! 6. After 16 interrupts every physical row has been shown once.
//!
//! HUB12 panels (P10 32×16 at 1/4 scan) push the same idea further: one data
//! line carries all four row groups of a scan row, byte column by byte
//! column, last group first.
//!
//! ### Brightness
//! OE is driven by a hardware PWM channel. Its compare value is the fraction
//! of each period the LEDs are *off*. [`gamma::duty_for`] maps a linear 0-255
//! brightness onto that value through a perceptual curve.
//!
//! ## Crate Structure
//!
//! - [`Engine`] lives in a `static` and is ticked from the row timer's
//!   interrupt. It only ever reads the front buffer.
//! - [`Panel`] is the single drawing-side handle: pixels, text, brightness,
//!   buffer swaps, start and stop. It implements `embedded-graphics`'
//!   [`DrawTarget`](embedded_graphics::draw_target::DrawTarget), so any
//!   primitive or font can draw into the back buffer.
//! - [`port`] holds the [`PortMap`] trait and the board variants.
//! - [`sim::VirtualPanel`] is a port that records control-line activity on
//!   the host, for tests and experiments.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use embedded_graphics::mono_font::{ascii::FONT_6X10, MonoTextStyle};
//! use embedded_graphics::pixelcolor::BinaryColor;
//! use hub_panel::{Engine, Panel, PanelConfig, SelectedPort};
//!
//! static ENGINE: Engine<SelectedPort> = Engine::new();
//!
//! #[avr_device::interrupt(atmega328p)]
//! fn TIMER1_COMPA() {
//!     ENGINE.tick();
//! }
//!
//! // SAFETY: nothing else drives the panel pins or Timer1/Timer2.
//! let port = unsafe { SelectedPort::new() };
//! let mut panel = Panel::configure(&ENGINE, PanelConfig::HUB08_64X32, port)?;
//! unsafe { avr_device::interrupt::enable() };
//!
//! let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
//! panel.set_brightness(128);
//! panel.draw_text_multiline_centered("HELLO\nWORLD", &style);
//! ```
//!
//! ## Available Feature Flags
//!
//! ### `atmega328p` / `atmega2560` / `atmega2560-hub12` Features
//! Select the register-level port map exported as [`SelectedPort`]:
//! Uno-class boards, the Mega with a HUB08 panel, or the Mega with a HUB12
//! panel on its own pin set. When
//! building for `target_arch = "avr"` exactly one of them **must** be enabled,
//! anything else is a compile error. On other targets they are optional and
//! [`port::hal::HalPort`] covers any `embedded-hal` 1.0 board.
//!
//! ```toml
//! [dependencies]
//! hub-panel = { version = "0.1.0", features = ["atmega328p"] }
//! ```
//!
//! ### `defmt` Feature
//! Implements `defmt::Format` for the public types so they can be emitted
//! with the `defmt` logging framework. No functional changes.
//!
//! ## Logging
//! Lifecycle events (configure, start, stop, release) go through the `log`
//! facade. Nothing is logged from the interrupt path.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

extern crate alloc;

pub mod config;
mod double_buffer;
pub mod framebuffer;
pub mod gamma;
pub mod geometry;
pub mod panel;
pub mod port;
pub mod scan;
pub mod sim;
pub mod text;

pub use config::PanelConfig;
pub use framebuffer::Framebuffer;
pub use geometry::{DataLanes, GeometryError, PanelGeometry, Polarity};
pub use panel::{EngineState, Panel};
pub use port::PortMap;
pub use scan::Engine;

#[cfg(all(
    target_arch = "avr",
    not(any(
        feature = "atmega328p",
        feature = "atmega2560",
        feature = "atmega2560-hub12"
    ))
))]
compile_error!(
    "hub-panel: unsupported board. Enable exactly one of the `atmega328p` \
     (Arduino Uno, Nano, Pro Mini 5V/16MHz), `atmega2560` (Arduino Mega 2560, HUB08) \
     or `atmega2560-hub12` (Arduino Mega 2560, HUB12) features."
);

#[cfg(all(
    target_arch = "avr",
    any(
        all(feature = "atmega328p", feature = "atmega2560"),
        all(feature = "atmega328p", feature = "atmega2560-hub12"),
        all(feature = "atmega2560", feature = "atmega2560-hub12")
    )
))]
compile_error!(
    "hub-panel: the `atmega328p`, `atmega2560` and `atmega2560-hub12` features are mutually exclusive."
);

/// Port map chosen by the board feature.
#[cfg(all(
    feature = "atmega328p",
    not(any(feature = "atmega2560", feature = "atmega2560-hub12"))
))]
pub type SelectedPort = port::avr::Atmega328p;

/// Port map chosen by the board feature.
#[cfg(all(
    feature = "atmega2560",
    not(any(feature = "atmega328p", feature = "atmega2560-hub12"))
))]
pub type SelectedPort = port::avr::Atmega2560;

/// Port map chosen by the board feature.
#[cfg(all(
    feature = "atmega2560-hub12",
    not(any(feature = "atmega328p", feature = "atmega2560"))
))]
pub type SelectedPort = port::avr::Atmega2560Hub12;

/// Errors reported by [`Panel`] and the port maps.
///
/// Drawing outside the panel is never an error, such pixels are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The heap could not hold the two framebuffers.
    #[display("framebuffer allocation failed")]
    Allocation,
    /// The geometry cannot be scanned by the selected port.
    #[display("invalid panel geometry: {_0}")]
    InvalidGeometry(GeometryError),
    /// Another [`Panel`] is using the engine.
    #[display("scan engine is already in use")]
    EngineBusy,
    /// The row timer cannot produce this many ticks per second.
    #[display("row timer cannot tick at {_0} Hz")]
    UnsupportedTickRate(#[error(not(source))] u32),
    /// A control line could not be driven while setting up the port.
    #[display("panel control line could not be driven")]
    Pin,
}
