//! Port map over `embedded-hal` 1.0 traits, for boards without a dedicated
//! register-level variant.
//!
//! Data, clock, latch and address lines are plain [`OutputPin`]s and OE is a
//! [`SetDutyCycle`] channel. The periodic row interrupt is platform specific,
//! so it is delegated to a [`RowTimer`]. Pass `()` when the application
//! drives [`Engine::tick`](crate::Engine::tick) from its own timer.

use embedded_hal::digital::{ErrorType, OutputPin, PinState};
use embedded_hal::pwm::SetDutyCycle;

use super::PortMap;
use crate::gamma::DUTY_OFF;
use crate::Error;

/// Starts and stops the periodic interrupt that calls
/// [`Engine::tick`](crate::Engine::tick).
pub trait RowTimer {
    /// Arms the timer at `tick_hz` interrupts per second.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedTickRate`] if the rate cannot be produced.
    fn start(&mut self, tick_hz: u32) -> Result<(), Error>;

    /// Disarms the timer.
    fn stop(&mut self);
}

/// No timer: ticks come from elsewhere.
impl RowTimer for () {
    fn start(&mut self, tick_hz: u32) -> Result<(), Error> {
        if tick_hz == 0 {
            return Err(Error::UnsupportedTickRate(tick_hz));
        }
        Ok(())
    }

    fn stop(&mut self) {}
}

/// Placeholder for the unused R2 line of single-lane (HUB12) boards.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPin;

impl ErrorType for NoPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A [`PortMap`] built from `embedded-hal` pins.
///
/// `N` is the number of address lines, A first.
#[derive(Debug)]
pub struct HalPort<R1, R2, Clk, Lat, A, Oe, T, const N: usize> {
    r1: R1,
    r2: R2,
    clk: Clk,
    lat: Lat,
    address: [A; N],
    oe: Oe,
    timer: T,
    duty: u8,
}

impl<R1, R2, Clk, Lat, A, Oe, T, const N: usize> HalPort<R1, R2, Clk, Lat, A, Oe, T, N>
where
    R1: OutputPin,
    R2: OutputPin,
    Clk: OutputPin,
    Lat: OutputPin,
    A: OutputPin,
    Oe: SetDutyCycle,
    T: RowTimer,
{
    /// Binds a dual-lane (HUB08) board.
    pub fn new(r1: R1, r2: R2, clk: Clk, lat: Lat, address: [A; N], oe: Oe, timer: T) -> Self {
        Self {
            r1,
            r2,
            clk,
            lat,
            address,
            oe,
            timer,
            duty: DUTY_OFF,
        }
    }

    /// Gives the pins back.
    pub fn release(self) -> (R1, R2, Clk, Lat, [A; N], Oe, T) {
        (
            self.r1,
            self.r2,
            self.clk,
            self.lat,
            self.address,
            self.oe,
            self.timer,
        )
    }
}

impl<R1, Clk, Lat, A, Oe, T, const N: usize> HalPort<R1, NoPin, Clk, Lat, A, Oe, T, N>
where
    R1: OutputPin,
    Clk: OutputPin,
    Lat: OutputPin,
    A: OutputPin,
    Oe: SetDutyCycle,
    T: RowTimer,
{
    /// Binds a single-lane (HUB12) board.
    pub fn single_lane(r1: R1, clk: Clk, lat: Lat, address: [A; N], oe: Oe, timer: T) -> Self {
        Self::new(r1, NoPin, clk, lat, address, oe, timer)
    }
}

impl<R1, R2, Clk, Lat, A, Oe, T, const N: usize> PortMap for HalPort<R1, R2, Clk, Lat, A, Oe, T, N>
where
    R1: OutputPin,
    R2: OutputPin,
    Clk: OutputPin,
    Lat: OutputPin,
    A: OutputPin,
    Oe: SetDutyCycle,
    T: RowTimer,
{
    const NAME: &'static str = "embedded-hal";
    const ADDRESS_LINES: u8 = N as u8;

    fn init_outputs(&mut self) -> Result<(), Error> {
        self.r1.set_low().map_err(|_| Error::Pin)?;
        self.r2.set_low().map_err(|_| Error::Pin)?;
        self.clk.set_low().map_err(|_| Error::Pin)?;
        self.lat.set_low().map_err(|_| Error::Pin)?;
        for pin in &mut self.address {
            pin.set_low().map_err(|_| Error::Pin)?;
        }
        self.oe
            .set_duty_cycle_fraction(u16::from(DUTY_OFF), u16::from(u8::MAX))
            .map_err(|_| Error::Pin)?;
        self.duty = DUTY_OFF;
        Ok(())
    }

    #[inline]
    fn write_data(&mut self, upper: bool, lower: bool) {
        let _ = self.r1.set_state(PinState::from(upper));
        let _ = self.r2.set_state(PinState::from(lower));
    }

    #[inline]
    fn pulse_clock(&mut self) {
        let _ = self.clk.set_high();
        let _ = self.clk.set_low();
    }

    #[inline]
    fn pulse_latch(&mut self) {
        let _ = self.lat.set_high();
        let _ = self.lat.set_low();
    }

    #[inline]
    fn write_address(&mut self, row: u8, bits: u8) {
        for (i, pin) in self.address.iter_mut().enumerate().take(usize::from(bits)) {
            let _ = pin.set_state(PinState::from(row & (1 << i) != 0));
        }
    }

    fn output_duty(&self) -> u8 {
        self.duty
    }

    fn set_output_duty(&mut self, duty: u8) {
        self.duty = duty;
        let _ = self.oe.set_duty_cycle_fraction(u16::from(duty), u16::from(u8::MAX));
    }

    fn start_row_timer(&mut self, tick_hz: u32) -> Result<(), Error> {
        self.timer.start(tick_hz)
    }

    fn stop_row_timer(&mut self) {
        self.timer.stop();
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec;

    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorKind;

    type Log = Rc<RefCell<Vec<(&'static str, bool)>>>;

    struct MockPin {
        name: &'static str,
        log: Log,
    }

    impl ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.log.borrow_mut().push((self.name, false));
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.log.borrow_mut().push((self.name, true));
            Ok(())
        }
    }

    struct MockPwm {
        duty: Rc<RefCell<u16>>,
    }

    impl embedded_hal::pwm::ErrorType for MockPwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for MockPwm {
        fn max_duty_cycle(&self) -> u16 {
            1000
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
            *self.duty.borrow_mut() = duty;
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockTimer {
        running: Option<u32>,
    }

    impl RowTimer for MockTimer {
        fn start(&mut self, tick_hz: u32) -> Result<(), Error> {
            self.running = Some(tick_hz);
            Ok(())
        }

        fn stop(&mut self) {
            self.running = None;
        }
    }

    fn pin(name: &'static str, log: &Log) -> MockPin {
        MockPin {
            name,
            log: Rc::clone(log),
        }
    }

    #[allow(clippy::type_complexity)]
    fn port(
        log: &Log,
        duty: &Rc<RefCell<u16>>,
    ) -> HalPort<MockPin, MockPin, MockPin, MockPin, MockPin, MockPwm, MockTimer, 3> {
        HalPort::new(
            pin("r1", log),
            pin("r2", log),
            pin("clk", log),
            pin("lat", log),
            [pin("a", log), pin("b", log), pin("c", log)],
            MockPwm {
                duty: Rc::clone(duty),
            },
            MockTimer::default(),
        )
    }

    #[test]
    fn test_address_lines_from_array_length() {
        type Port = HalPort<NoPin, NoPin, NoPin, NoPin, NoPin, MockPwm, (), 4>;
        assert_eq!(<Port as PortMap>::ADDRESS_LINES, 4);
    }

    #[test]
    fn test_shift_bit_order() {
        let log = Log::default();
        let duty = Rc::new(RefCell::new(0));
        let mut port = port(&log, &duty);
        port.shift_bit(true, false);
        assert_eq!(
            *log.borrow(),
            [("r1", true), ("r2", false), ("clk", true), ("clk", false)]
        );
    }

    #[test]
    fn test_write_address_limited_to_bits() {
        let log = Log::default();
        let duty = Rc::new(RefCell::new(0));
        let mut port = port(&log, &duty);
        port.write_address(0b101, 2);
        assert_eq!(*log.borrow(), [("a", true), ("b", false)]);
    }

    #[test]
    fn test_latch_pulse() {
        let log = Log::default();
        let duty = Rc::new(RefCell::new(0));
        let mut port = port(&log, &duty);
        port.pulse_latch();
        assert_eq!(*log.borrow(), [("lat", true), ("lat", false)]);
    }

    #[test]
    fn test_duty_scaled_to_channel() {
        let log = Log::default();
        let duty = Rc::new(RefCell::new(0));
        let mut port = port(&log, &duty);
        port.set_output_duty(255);
        assert_eq!(*duty.borrow(), 1000);
        assert_eq!(port.output_duty(), 255);
        port.set_output_duty(0);
        assert_eq!(*duty.borrow(), 0);
        assert_eq!(port.output_duty(), 0);
    }

    #[test]
    fn test_init_blanks_outputs() {
        let log = Log::default();
        let duty = Rc::new(RefCell::new(0));
        let mut port = port(&log, &duty);
        port.init_outputs().unwrap();
        assert!(log.borrow().iter().all(|&(_, high)| !high));
        assert_eq!(log.borrow().len(), 7);
        assert_eq!(port.output_duty(), DUTY_OFF);
        assert_eq!(*duty.borrow(), 1000);
    }

    struct StuckPin;

    impl ErrorType for StuckPin {
        type Error = ErrorKind;
    }

    impl OutputPin for StuckPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Err(ErrorKind::Other)
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Err(ErrorKind::Other)
        }
    }

    #[test]
    fn test_init_reports_pin_failure() {
        let log = Log::default();
        let duty = Rc::new(RefCell::new(0));
        let mut port = HalPort::new(
            pin("r1", &log),
            pin("r2", &log),
            pin("clk", &log),
            StuckPin,
            [pin("a", &log)],
            MockPwm {
                duty: Rc::clone(&duty),
            },
            (),
        );
        assert_eq!(port.init_outputs(), Err(Error::Pin));
        assert_eq!(*log.borrow(), [("r1", false), ("r2", false), ("clk", false)]);

        // the scan path keeps going past a stuck line
        port.pulse_latch();
        port.write_data(true, true);
        assert_eq!(log.borrow().len(), 5);
    }

    #[test]
    fn test_timer_delegation() {
        let log = Log::default();
        let duty = Rc::new(RefCell::new(0));
        let mut port = port(&log, &duty);
        port.start_row_timer(2_000).unwrap();
        assert_eq!(port.timer.running, Some(2_000));
        port.stop_row_timer();
        assert_eq!(port.timer.running, None);
    }

    #[test]
    fn test_unit_timer_rejects_zero() {
        assert_eq!(().start(0), Err(Error::UnsupportedTickRate(0)));
        assert_eq!(().start(1_000), Ok(()));
    }

    #[test]
    fn test_single_lane_constructor() {
        let log = Log::default();
        let duty = Rc::new(RefCell::new(0));
        let mut port = HalPort::single_lane(
            pin("r1", &log),
            pin("clk", &log),
            pin("lat", &log),
            [pin("a", &log), pin("b", &log)],
            MockPwm {
                duty: Rc::clone(&duty),
            },
            (),
        );
        port.write_data(false, true);
        assert_eq!(*log.borrow(), [("r1", false)]);
        let (_, NoPin, ..) = port.release();
    }
}
