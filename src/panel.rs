//! The drawing-side handle of a configured panel.
//!
//! [`Panel`] is what the rest of the application talks to: it draws into the
//! back buffer, publishes frames, sets brightness and starts or stops the
//! row timer. The scan interrupt only ever sees the [`Engine`] it was
//! configured with.

use core::convert::Infallible;

use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::{OriginDimensions, Size};
use embedded_graphics::text::renderer::TextRenderer;
use embedded_graphics::text::Baseline;
use embedded_graphics::Pixel;
use log::{debug, info, warn};

use crate::config::PanelConfig;
use crate::framebuffer::Framebuffer;
use crate::gamma::duty_for;
use crate::geometry::PanelGeometry;
use crate::port::PortMap;
use crate::scan::Engine;
use crate::text::{centered_origin, font_height, layout_multiline_centered, text_width};
use crate::Error;

/// Whether the row timer is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineState {
    /// Row timer stopped, nothing is refreshed.
    Idle,
    /// Row timer running.
    Scanning,
}

/// Exclusive handle to a configured [`Engine`].
///
/// Dropping the panel stops the row timer, blanks the output, frees both
/// framebuffers and makes the engine available to
/// [`Panel::configure`] again.
pub struct Panel<P: PortMap + 'static> {
    engine: &'static Engine<P>,
    config: PanelConfig,
    brightness: u8,
    state: EngineState,
}

impl<P: PortMap + 'static> Panel<P> {
    /// Claims `engine`, allocates the framebuffers, initializes the port and
    /// starts scanning at `config.tick_hz` with `config.brightness`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidGeometry`] if `config.geometry` cannot be scanned
    ///   through `P`.
    /// - [`Error::EngineBusy`] if another panel holds the engine.
    /// - [`Error::Allocation`] if the framebuffers do not fit in the heap.
    /// - [`Error::Pin`] if the port cannot drive its control lines.
    /// - [`Error::UnsupportedTickRate`] if the row timer rejects the rate.
    ///
    /// On error the engine is left unclaimed and the port is dropped.
    pub fn configure(engine: &'static Engine<P>, config: PanelConfig, mut port: P) -> Result<Self, Error> {
        let geometry = config.geometry;
        geometry
            .validate(P::ADDRESS_LINES)
            .map_err(Error::InvalidGeometry)?;

        if !engine.try_claim() {
            warn!("{}: engine already in use", P::NAME);
            return Err(Error::EngineBusy);
        }

        let buffers = Framebuffer::try_new(geometry)
            .and_then(|front| Framebuffer::try_new(geometry).map(|back| (front, back)));
        let (front, back) = match buffers {
            Ok(buffers) => buffers,
            Err(err) => {
                engine.unclaim();
                warn!("{}: cannot allocate 2x{} bytes", P::NAME, geometry.buffer_len());
                return Err(err);
            }
        };
        if let Err(err) = port.init_outputs() {
            engine.unclaim();
            warn!("{}: control lines failed to initialize", P::NAME);
            return Err(err);
        }

        // SAFETY: the claim was taken above.
        unsafe { engine.bring_up(front, back, port, duty_for(config.brightness)) };
        debug!(
            "{}: {}x{} panel, 1/{} scan, {} bytes per buffer",
            P::NAME,
            geometry.total_width(),
            geometry.height,
            geometry.scan_depth,
            geometry.buffer_len()
        );

        let mut panel = Self {
            engine,
            config,
            brightness: config.brightness,
            state: EngineState::Idle,
        };
        // dropping `panel` on error tears the engine down again
        panel.start_scanning(config.tick_hz)?;
        info!("{}: configured, refresh {} Hz", P::NAME, panel.config.refresh_hz());
        Ok(panel)
    }

    /// Configuration in effect, with the current tick rate.
    #[must_use]
    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// Panel layout.
    #[must_use]
    pub fn geometry(&self) -> &PanelGeometry {
        &self.config.geometry
    }

    /// Whether the engine behind this panel processes ticks.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.engine.is_initialized()
    }

    /// Current linear brightness.
    #[must_use]
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// The buffer being scanned.
    #[must_use]
    pub fn front(&self) -> &Framebuffer {
        // SAFETY: only `swap_buffers` and `drop` change the front slot, and
        // both need `&mut self`.
        unsafe { self.engine.buffers().front() }
    }

    /// The buffer being drawn into.
    #[must_use]
    pub fn back(&self) -> &Framebuffer {
        // SAFETY: this panel is the single drawing owner.
        unsafe { self.engine.buffers().back() }
    }

    fn back_mut(&mut self) -> &mut Framebuffer {
        // SAFETY: this panel is the single drawing owner and `&mut self`
        // rules out other back references.
        unsafe { self.engine.buffers().back_mut() }
    }

    /// Runs `f` on the port with the scan interrupt masked. Returns `None`
    /// only if the engine has no port, which cannot happen while the panel
    /// exists.
    pub fn with_port<R>(&mut self, f: impl FnOnce(&mut P) -> R) -> Option<R> {
        // SAFETY: this panel holds the claim.
        unsafe { self.engine.with_port(f) }
    }

    /// Sets or clears pixel `(x, y)` of the back buffer. Points outside the
    /// panel are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, on: bool) {
        self.back_mut().set_pixel(x, y, on);
    }

    /// Reads pixel `(x, y)` of the back buffer, `None` outside the panel.
    #[must_use]
    pub fn get_pixel(&self, x: i32, y: i32) -> Option<bool> {
        self.back().pixel(x, y)
    }

    /// Lights or blanks the whole back buffer.
    pub fn fill(&mut self, on: bool) {
        self.back_mut().fill(on);
    }

    /// Blanks the whole back buffer.
    pub fn clear(&mut self) {
        self.back_mut().clear();
    }

    /// Publishes the back buffer: the scan interrupt shows it from the next
    /// tick on. With `copy_front_to_back` the new back buffer starts as a
    /// copy of what is shown; otherwise it holds the frame before last.
    pub fn swap_buffers(&mut self, copy_front_to_back: bool) {
        // SAFETY: `&mut self` rules out live back references.
        unsafe { self.engine.buffers().swap(copy_front_to_back) };
    }

    /// Sets the linear brightness and programs the gamma-corrected OE duty.
    pub fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness;
        let duty = duty_for(brightness);
        self.with_port(|port| port.set_output_duty(duty));
    }

    /// Starts (or restarts) the row timer at `tick_hz`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedTickRate`] if the port's timer cannot
    /// produce the rate. The previous state is kept.
    pub fn start_scanning(&mut self, tick_hz: u32) -> Result<(), Error> {
        self.with_port(|port| port.start_row_timer(tick_hz))
            .unwrap_or(Ok(()))?;
        self.config.tick_hz = tick_hz;
        self.state = EngineState::Scanning;
        info!("{}: scanning at {} Hz", P::NAME, tick_hz);
        Ok(())
    }

    /// Stops the row timer. Buffers and image are kept, a tick already
    /// running completes.
    pub fn stop_scanning(&mut self) {
        self.with_port(P::stop_row_timer);
        self.state = EngineState::Idle;
        info!("{}: scanning stopped", P::NAME);
    }

    /// Width of `text` in pixels.
    pub fn text_width<S: TextRenderer>(&self, text: &str, style: &S) -> u32 {
        text_width(text, style)
    }

    /// Line height of `style` in pixels.
    pub fn text_height<S: TextRenderer>(&self, style: &S) -> u32 {
        font_height(style)
    }

    /// Clears the back buffer, draws `text` centered line by line and
    /// publishes it with `swap_buffers(true)`.
    ///
    /// Up to [`MAX_TEXT_LINES`](crate::text::MAX_TEXT_LINES) non-empty lines
    /// are drawn. Anything drawn into the back buffer before this call is
    /// discarded.
    pub fn draw_text_multiline_centered<S>(&mut self, text: &str, style: &S)
    where
        S: TextRenderer<Color = BinaryColor>,
    {
        self.clear();
        for line in layout_multiline_centered(text, style, self.size()) {
            let Ok(_) = style.draw_string(line.text, line.origin, Baseline::Top, self);
        }
        self.swap_buffers(true);
    }

    /// Draws one line of `text` centered on the panel, on top of the back
    /// buffer's contents. Nothing is published.
    pub fn draw_text_centered<S>(&mut self, text: &str, style: &S)
    where
        S: TextRenderer<Color = BinaryColor>,
    {
        let origin = centered_origin(text_width(text, style), style, self.size());
        let Ok(_) = style.draw_string(text, origin, Baseline::Top, self);
    }
}

impl<P: PortMap + 'static> Drop for Panel<P> {
    fn drop(&mut self) {
        // SAFETY: this panel holds the claim and no buffer borrow can
        // outlive it.
        drop(unsafe { self.engine.tear_down() });
        self.engine.unclaim();
        info!("{}: released", P::NAME);
    }
}

impl<P: PortMap + 'static> core::fmt::Debug for Panel<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Panel")
            .field("port", &P::NAME)
            .field("config", &self.config)
            .field("brightness", &self.brightness)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<P: PortMap + 'static> OriginDimensions for Panel<P> {
    fn size(&self) -> Size {
        let geometry = &self.config.geometry;
        Size::new(geometry.total_width(), u32::from(geometry.height))
    }
}

impl<P: PortMap + 'static> DrawTarget for Panel<P> {
    type Color = BinaryColor;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        self.back_mut().draw_iter(pixels)
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color.is_on());
        Ok(())
    }
}
