//! Direct register port maps for 8-bit AVR Arduino boards.
//!
//! Every control line is written with a single volatile read-modify-write
//! of its `PORTx` register, which keeps the per-bit cost of the shift loop
//! small and deterministic.
//!
//! Timer usage, identical on every board except for the OE channel:
//! - **Timer1** runs in CTC mode and fires `TIMER1_COMPA` once per scan row.
//! - **OE** is a hardware PWM output whose compare register is the
//!   active-low off time (see [`crate::gamma`]).
//!
//! The application owns the interrupt vector and forwards it to the engine:
//!
//! ```rust,ignore
//! static ENGINE: Engine<Atmega328p> = Engine::new();
//!
//! #[avr_device::interrupt(atmega328p)]
//! fn TIMER1_COMPA() {
//!     ENGINE.tick();
//! }
//! ```

use bitfield::bitfield;

use super::PortMap;
use crate::gamma::DUTY_OFF;
use crate::Error;

/// A memory-mapped 8-bit I/O register, addressed in data space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reg(pub usize);

impl Reg {
    #[inline(always)]
    fn read(self) -> u8 {
        // SAFETY: port map constructors require running on the matching MCU,
        // where every `Reg` constant is a valid I/O register address.
        unsafe { core::ptr::read_volatile(self.0 as *const u8) }
    }

    #[inline(always)]
    fn write(self, value: u8) {
        // SAFETY: see `Reg::read`.
        unsafe { core::ptr::write_volatile(self.0 as *mut u8, value) }
    }

    #[inline(always)]
    fn set(self, mask: u8) {
        self.write(self.read() | mask);
    }

    #[inline(always)]
    fn clear(self, mask: u8) {
        self.write(self.read() & !mask);
    }

    /// Writes a 16-bit register pair. AVR latches the high byte into a
    /// temporary register, so it has to go first.
    #[inline(always)]
    fn write16(self, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        Reg(self.0 + 1).write(hi);
        self.write(lo);
    }
}

/// One control line: its output and direction registers and its bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    /// `PORTx` register.
    pub port: Reg,
    /// `DDRx` register.
    pub ddr: Reg,
    /// Bit number within the port.
    pub bit: u8,
}

impl Line {
    const fn new(port: usize, bit: u8) -> Self {
        // DDRx sits one address below PORTx on every AVR port
        Self {
            port: Reg(port),
            ddr: Reg(port - 1),
            bit,
        }
    }

    /// Bit mask of this line within its port.
    #[must_use]
    pub const fn mask(&self) -> u8 {
        1 << self.bit
    }

    #[inline(always)]
    fn make_output(self) {
        self.ddr.set(self.mask());
    }

    #[inline(always)]
    fn write(self, high: bool) {
        if high {
            self.port.set(self.mask());
        } else {
            self.port.clear(self.mask());
        }
    }

    #[inline(always)]
    fn pulse(self) {
        self.port.set(self.mask());
        self.port.clear(self.mask());
    }
}

/// Control-line table of one board variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wiring {
    /// Upper half data (R1).
    pub r1: Line,
    /// Lower half data (R2).
    pub r2: Line,
    /// Shift clock.
    pub clk: Line,
    /// Latch.
    pub lat: Line,
    /// Output enable, driven by the PWM channel.
    pub oe: Line,
    /// Port holding the address lines A.. on bits 0.. .
    pub address: Reg,
    /// Direction register of the address port.
    pub address_ddr: Reg,
}

mod regs {
    pub const PORTB: usize = 0x25;
    pub const PORTC: usize = 0x28;
    pub const PORTD: usize = 0x2B;
    pub const PORTE: usize = 0x2E;
    pub const PORTF: usize = 0x31;
    pub const PORTH: usize = 0x102;

    pub const TIMSK1: usize = 0x6F;
    pub const TCCR1A: usize = 0x80;
    pub const TCCR1B: usize = 0x81;
    pub const TCNT1: usize = 0x84;
    pub const OCR1A: usize = 0x88;

    pub const TCCR2A: usize = 0xB0;
    pub const TCCR2B: usize = 0xB1;
    pub const OCR2B: usize = 0xB4;

    pub const TCCR3A: usize = 0x90;
    pub const TCCR3B: usize = 0x91;
    pub const OCR3C: usize = 0x9C;
}

bitfield! {
    /// Timer1 control register B.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Tccr1b(u8);
    impl Debug;
    /// CTC mode with `OCR1A` as TOP.
    pub wgm12, set_wgm12: 3;
    /// Clock select (prescaler).
    pub u8, clock_select, set_clock_select: 2, 0;
}

bitfield! {
    /// Timer1 interrupt mask register.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Timsk1(u8);
    impl Debug;
    /// Compare match A interrupt enable.
    pub ocie1a, set_ocie1a: 1;
}

bitfield! {
    /// Timer2 control register A.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Tccr2a(u8);
    impl Debug;
    /// Non-inverting PWM on OC2B.
    pub com2b1, set_com2b1: 5;
    /// Phase correct 8-bit PWM.
    pub wgm20, set_wgm20: 0;
}

bitfield! {
    /// Timer3 control register A.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Tccr3a(u8);
    impl Debug;
    /// Non-inverting PWM on OC3C.
    pub com3c1, set_com3c1: 3;
    /// Waveform generation bit 0.
    pub wgm30, set_wgm30: 0;
}

bitfield! {
    /// Timer3 control register B.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Tccr3b(u8);
    impl Debug;
    /// Waveform generation bit 2, with `wgm30` selects 8-bit fast PWM.
    pub wgm32, set_wgm32: 3;
    /// Clock select (prescaler).
    pub u8, clock_select, set_clock_select: 2, 0;
}

/// Timer1 prescalers with their clock-select codes.
const TIMER1_PRESCALERS: [(u8, u32); 5] = [(1, 1), (2, 8), (3, 64), (4, 256), (5, 1024)];

/// Picks the smallest prescaler for which `tick_hz` fits Timer1's 16-bit
/// compare register in CTC mode.
///
/// Returns the clock-select code and the `OCR1A` value, or `None` if the rate
/// is zero, faster than half the CPU clock, or too slow for any prescaler.
#[must_use]
pub const fn ctc_compare(cpu_hz: u32, tick_hz: u32) -> Option<(u8, u16)> {
    if tick_hz == 0 {
        return None;
    }
    let mut i = 0;
    while i < TIMER1_PRESCALERS.len() {
        let (cs, prescale) = TIMER1_PRESCALERS[i];
        let counts = cpu_hz / prescale / tick_hz;
        if counts >= 2 && counts <= 0x1_0000 {
            return Some((cs, (counts - 1) as u16));
        }
        if counts < 2 {
            return None;
        }
        i += 1;
    }
    None
}

/// Programs Timer1 for CTC interrupts at `tick_hz` and unmasks `COMPA`.
fn start_timer1(cpu_hz: u32, tick_hz: u32) -> Result<(), Error> {
    let (cs, compare) = ctc_compare(cpu_hz, tick_hz).ok_or(Error::UnsupportedTickRate(tick_hz))?;
    stop_timer1();
    Reg(regs::TCCR1A).write(0);
    Reg(regs::TCCR1B).write(0);
    Reg(regs::TCNT1).write16(0);
    Reg(regs::OCR1A).write16(compare);

    let mut control = Tccr1b(0);
    control.set_wgm12(true);
    control.set_clock_select(cs);
    Reg(regs::TCCR1B).write(control.0);

    let mut mask = Timsk1(Reg(regs::TIMSK1).read());
    mask.set_ocie1a(true);
    Reg(regs::TIMSK1).write(mask.0);
    Ok(())
}

/// 8-bit fast PWM on OC3C (Mega D3), no prescaler.
fn start_timer3_pwm() {
    let mut control_a = Tccr3a(0);
    control_a.set_com3c1(true);
    control_a.set_wgm30(true);
    let mut control_b = Tccr3b(0);
    control_b.set_wgm32(true);
    control_b.set_clock_select(1);
    Reg(regs::TCCR3A).write(control_a.0);
    Reg(regs::TCCR3B).write(control_b.0);
}

fn stop_timer1() {
    let mut mask = Timsk1(Reg(regs::TIMSK1).read());
    mask.set_ocie1a(false);
    Reg(regs::TIMSK1).write(mask.0);
}

/// Arduino Uno / Nano / Pro Mini 5V (ATmega328P @ 16 MHz).
///
/// | Signal | Pin | Port |
/// |--------|-----|------|
/// | R1     | D8  | PB0  |
/// | R2     | D9  | PB1  |
/// | CLK    | D10 | PB2  |
/// | LAT    | D11 | PB3  |
/// | OE     | D3  | PD3 (Timer2 OC2B, ~31 kHz) |
/// | A-D    | A0-A3 | PC0-PC3 |
#[derive(Debug)]
pub struct Atmega328p {
    _private: (),
}

impl Atmega328p {
    /// CPU clock the timer math assumes.
    pub const CPU_HZ: u32 = 16_000_000;

    /// Control-line table.
    pub const WIRING: Wiring = Wiring {
        r1: Line::new(regs::PORTB, 0),
        r2: Line::new(regs::PORTB, 1),
        clk: Line::new(regs::PORTB, 2),
        lat: Line::new(regs::PORTB, 3),
        oe: Line::new(regs::PORTD, 3),
        address: Reg(regs::PORTC),
        address_ddr: Reg(regs::PORTC - 1),
    };

    /// Takes over the pins and timers listed above.
    ///
    /// # Safety
    ///
    /// The program must run on an ATmega328P at 16 MHz, and nothing else may
    /// drive PB0-PB3, PC0-PC3, PD3, Timer1 or Timer2.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl PortMap for Atmega328p {
    const NAME: &'static str = "Arduino Uno / Nano / Pro Mini (ATmega328P)";
    const ADDRESS_LINES: u8 = 4;

    fn init_outputs(&mut self) -> Result<(), Error> {
        let w = Self::WIRING;
        for line in [w.r1, w.r2, w.clk, w.lat, w.oe] {
            line.make_output();
        }
        w.address_ddr.set(0x0F);

        let mut pwm = Tccr2a(0);
        pwm.set_com2b1(true);
        pwm.set_wgm20(true);
        Reg(regs::TCCR2A).write(pwm.0);
        // prescaler 1: 16 MHz / 510 ≈ 31 kHz, well above visible flicker
        Reg(regs::TCCR2B).write(0x01);
        self.set_output_duty(DUTY_OFF);
        Ok(())
    }

    // R1, R2 and CLK share PORTB, so data lands in one write
    #[inline(always)]
    fn shift_bit(&mut self, upper: bool, lower: bool) {
        let port = Self::WIRING.clk.port;
        let out = (port.read() & 0b1111_1000) | u8::from(upper) | (u8::from(lower) << 1);
        port.write(out);
        Self::WIRING.clk.pulse();
    }

    #[inline(always)]
    fn write_data(&mut self, upper: bool, lower: bool) {
        Self::WIRING.r1.write(upper);
        Self::WIRING.r2.write(lower);
    }

    #[inline(always)]
    fn pulse_clock(&mut self) {
        Self::WIRING.clk.pulse();
    }

    #[inline(always)]
    fn pulse_latch(&mut self) {
        Self::WIRING.lat.pulse();
    }

    #[inline(always)]
    fn write_address(&mut self, row: u8, bits: u8) {
        let mask = address_mask(bits);
        let port = Self::WIRING.address;
        port.write((port.read() & !mask) | (row & mask));
    }

    #[inline(always)]
    fn output_duty(&self) -> u8 {
        Reg(regs::OCR2B).read()
    }

    #[inline(always)]
    fn set_output_duty(&mut self, duty: u8) {
        Reg(regs::OCR2B).write(duty);
    }

    fn start_row_timer(&mut self, tick_hz: u32) -> Result<(), Error> {
        start_timer1(Self::CPU_HZ, tick_hz)
    }

    fn stop_row_timer(&mut self) {
        stop_timer1();
    }
}

/// Arduino Mega 2560 (ATmega2560 @ 16 MHz).
///
/// | Signal | Pin | Port |
/// |--------|-----|------|
/// | R1     | D8  | PH5  |
/// | R2     | D9  | PH6  |
/// | CLK    | D10 | PB4  |
/// | LAT    | D11 | PB5  |
/// | OE     | D3  | PE5 (Timer3 OC3C, 8-bit fast PWM) |
/// | A-D    | A0-A3 | PF0-PF3 |
///
/// On the Mega, D3 is wired to Timer3 rather than Timer2, and this board
/// latches before driving the row address.
#[derive(Debug)]
pub struct Atmega2560 {
    _private: (),
}

impl Atmega2560 {
    /// CPU clock the timer math assumes.
    pub const CPU_HZ: u32 = 16_000_000;

    /// Control-line table.
    pub const WIRING: Wiring = Wiring {
        r1: Line::new(regs::PORTH, 5),
        r2: Line::new(regs::PORTH, 6),
        clk: Line::new(regs::PORTB, 4),
        lat: Line::new(regs::PORTB, 5),
        oe: Line::new(regs::PORTE, 5),
        address: Reg(regs::PORTF),
        address_ddr: Reg(regs::PORTF - 1),
    };

    /// Takes over the pins and timers listed above.
    ///
    /// # Safety
    ///
    /// The program must run on an ATmega2560 at 16 MHz, and nothing else may
    /// drive PH5, PH6, PB4, PB5, PE5, PF0-PF3, Timer1 or Timer3.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl PortMap for Atmega2560 {
    const NAME: &'static str = "Arduino Mega 2560 (ATmega2560)";
    const ADDRESS_LINES: u8 = 4;
    const ADDRESS_BEFORE_LATCH: bool = false;

    fn init_outputs(&mut self) -> Result<(), Error> {
        let w = Self::WIRING;
        for line in [w.r1, w.r2, w.clk, w.lat, w.oe] {
            line.make_output();
        }
        w.address_ddr.set(0x0F);
        start_timer3_pwm();
        self.set_output_duty(DUTY_OFF);
        Ok(())
    }

    #[inline(always)]
    fn write_data(&mut self, upper: bool, lower: bool) {
        Self::WIRING.r1.write(upper);
        Self::WIRING.r2.write(lower);
    }

    #[inline(always)]
    fn pulse_clock(&mut self) {
        Self::WIRING.clk.pulse();
    }

    #[inline(always)]
    fn pulse_latch(&mut self) {
        Self::WIRING.lat.pulse();
    }

    #[inline(always)]
    fn write_address(&mut self, row: u8, bits: u8) {
        let mask = address_mask(bits);
        let port = Self::WIRING.address;
        port.write((port.read() & !mask) | (row & mask));
    }

    #[inline(always)]
    fn output_duty(&self) -> u8 {
        Reg(regs::OCR3C).read()
    }

    #[inline(always)]
    fn set_output_duty(&mut self, duty: u8) {
        Reg(regs::OCR3C).write16(u16::from(duty));
    }

    fn start_row_timer(&mut self, tick_hz: u32) -> Result<(), Error> {
        start_timer1(Self::CPU_HZ, tick_hz)
    }

    fn stop_row_timer(&mut self) {
        stop_timer1();
    }
}

/// Arduino Mega 2560 driving a single-lane HUB12 (P10) panel.
///
/// | Signal | Pin | Port |
/// |--------|-----|------|
/// | R      | D5  | PE3  |
/// | CLK    | D7  | PH4  |
/// | LAT    | D8  | PH5  |
/// | OE     | D3  | PE5 (Timer3 OC3C, 8-bit fast PWM) |
/// | A, B   | A0, A1 | PF0, PF1 |
///
/// HUB12 has no second data line, so `WIRING.r2` names R again and is
/// never driven separately. The row address is set before the latch.
#[derive(Debug)]
pub struct Atmega2560Hub12 {
    _private: (),
}

impl Atmega2560Hub12 {
    /// CPU clock the timer math assumes.
    pub const CPU_HZ: u32 = 16_000_000;

    /// Control-line table.
    pub const WIRING: Wiring = Wiring {
        r1: Line::new(regs::PORTE, 3),
        r2: Line::new(regs::PORTE, 3),
        clk: Line::new(regs::PORTH, 4),
        lat: Line::new(regs::PORTH, 5),
        oe: Line::new(regs::PORTE, 5),
        address: Reg(regs::PORTF),
        address_ddr: Reg(regs::PORTF - 1),
    };

    /// Takes over the pins and timers listed above.
    ///
    /// # Safety
    ///
    /// The program must run on an ATmega2560 at 16 MHz, and nothing else may
    /// drive PE3, PE5, PH4, PH5, PF0, PF1, Timer1 or Timer3.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl PortMap for Atmega2560Hub12 {
    const NAME: &'static str = "Arduino Mega 2560 HUB12 (ATmega2560)";
    const ADDRESS_LINES: u8 = 2;

    fn init_outputs(&mut self) -> Result<(), Error> {
        let w = Self::WIRING;
        for line in [w.r1, w.clk, w.lat, w.oe] {
            line.make_output();
        }
        w.address_ddr.set(0x03);
        start_timer3_pwm();
        self.set_output_duty(DUTY_OFF);
        Ok(())
    }

    #[inline(always)]
    fn write_data(&mut self, upper: bool, _lower: bool) {
        Self::WIRING.r1.write(upper);
    }

    #[inline(always)]
    fn pulse_clock(&mut self) {
        Self::WIRING.clk.pulse();
    }

    #[inline(always)]
    fn pulse_latch(&mut self) {
        Self::WIRING.lat.pulse();
    }

    #[inline(always)]
    fn write_address(&mut self, row: u8, bits: u8) {
        let mask = address_mask(bits.min(Self::ADDRESS_LINES));
        let port = Self::WIRING.address;
        port.write((port.read() & !mask) | (row & mask));
    }

    #[inline(always)]
    fn output_duty(&self) -> u8 {
        Reg(regs::OCR3C).read()
    }

    #[inline(always)]
    fn set_output_duty(&mut self, duty: u8) {
        Reg(regs::OCR3C).write16(u16::from(duty));
    }

    fn start_row_timer(&mut self, tick_hz: u32) -> Result<(), Error> {
        start_timer1(Self::CPU_HZ, tick_hz)
    }

    fn stop_row_timer(&mut self) {
        stop_timer1();
    }
}

/// Mask covering the lowest `bits` address lines.
#[inline(always)]
const fn address_mask(bits: u8) -> u8 {
    if bits >= 8 {
        0xFF
    } else {
        (1 << bits) - 1
    }
}
