//! The I/O bus and the chips hanging off of it.
//!
//! The core types here are:
//! - [`DeviceConfig`]: which peripheral wiring is plugged in.
//! - [`IoBus`]: routes the 8-bit I/O port space to the chips and fans
//!   external pokes (clock ticks, F10, switches, printer) out to them.
//!
//! Port map:
//!
//! | ports       | device                                        |
//! |-------------|-----------------------------------------------|
//! | `10h`–`1Bh` | PIC (EOI, IMR, IRR, ISR, INT0..INT7)          |
//! | `20h`–`21h` | timer (CONT, COMP)                            |
//! | `30h`–`33h` | PIO (PA, PB, CA, CB)                          |
//! | `40h`–`41h` | handshake (DATA, STATE)                       |
//!
//! Everything else is unmapped: reads return 0 and writes are dropped (the
//! simulator reports both through `io.unmapped-*` events).

pub mod handshake;
pub mod pic;
pub mod pio;
pub mod timer;

use handshake::Handshake;
use pic::Pic;
use pio::{Pio, PioPort};
use timer::Timer;

/// PIC line wired to the F10 key.
pub const LINE_F10: u8 = 0;
/// PIC line wired to the timer.
pub const LINE_TIMER: u8 = 1;
/// PIC line wired to the handshake controller.
pub const LINE_HANDSHAKE: u8 = 2;

const PIC_BASE: u8 = 0x10;
const PIC_END: u8 = 0x1B;
const TIMER_BASE: u8 = 0x20;
const TIMER_END: u8 = 0x21;
const PIO_BASE: u8 = 0x30;
const PIO_END: u8 = 0x33;
const HS_BASE: u8 = 0x40;
const HS_END: u8 = 0x41;

/// PB bit 0 carries the printer's busy line in the PIO-printer wiring.
const PIO_PRINTER_BUSY: u8 = 0;
/// PB bit 1 carries the CPU's strobe line in the PIO-printer wiring.
const PIO_PRINTER_STROBE: u8 = 1;

/// Which peripherals are wired up for a run.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub enum DeviceConfig {
    /// PIO port A reads the switches, port B drives the LEDs.
    #[default]
    SwitchesLeds,
    /// A printer on the PIO: PA data, PB bit 0 busy, PB bit 1 strobe.
    PioPrinter,
    /// A printer behind the handshake controller.
    HandshakePrinter,
}

/// What a bus write did, so the simulator can report it.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BusWrite {
    /// No device is mapped at the port.
    Unmapped,
    /// A device register took the byte.
    Ok,
    /// The write additionally latched a byte towards the printer.
    Latched(u8),
}

/// The I/O bus: the PIC, the timer, and the configured peripheral wiring.
#[derive(Debug, PartialEq, Eq, Clone, serde::Serialize, serde::Deserialize)]
pub struct IoBus {
    /// The active wiring.
    pub config: DeviceConfig,
    /// The interrupt controller.
    pub pic: Pic,
    /// The interval timer.
    pub timer: Timer,
    /// The PIO, present unless the handshake wiring is active.
    pub pio: Option<Pio>,
    /// The handshake controller, present in the handshake wiring.
    pub handshake: Option<Handshake>,
    /// Byte latched towards the PIO printer, waiting to be printed.
    pio_printer_latch: Option<u8>,
}

impl IoBus {
    /// Creates a bus with the given wiring.
    pub fn new(config: DeviceConfig) -> Self {
        let (pio, handshake) = match config {
            DeviceConfig::SwitchesLeds => (Some(Pio::new()), None),
            DeviceConfig::PioPrinter => {
                let mut pio = Pio::new();
                // data port all outputs; PB strobe out, busy in
                pio.ca = 0xFF;
                pio.cb = 1 << PIO_PRINTER_STROBE;
                (Some(pio), None)
            }
            DeviceConfig::HandshakePrinter => (None, Some(Handshake::new())),
        };
        Self { config, pic: Pic::new(), timer: Timer::new(), pio, handshake, pio_printer_latch: None }
    }

    /// Reads an I/O port. `None` means the port is unmapped.
    pub fn read(&self, port: u8) -> Option<u8> {
        match port {
            PIC_BASE..=PIC_END => Some(self.pic.read_reg(port - PIC_BASE)),
            TIMER_BASE..=TIMER_END => Some(self.timer.read_reg(port - TIMER_BASE)),
            PIO_BASE..=PIO_END => self.pio.as_ref().map(|p| p.read_reg(port - PIO_BASE)),
            HS_BASE..=HS_END => self.handshake.as_ref().map(|h| h.read_reg(port - HS_BASE)),
            _ => None,
        }
    }

    /// Writes an I/O port.
    pub fn write(&mut self, port: u8, byte: u8) -> BusWrite {
        match port {
            PIC_BASE..=PIC_END => {
                self.pic.write_reg(port - PIC_BASE, byte);
                BusWrite::Ok
            }
            TIMER_BASE..=TIMER_END => {
                self.timer.write_reg(port - TIMER_BASE, byte);
                BusWrite::Ok
            }
            PIO_BASE..=PIO_END => {
                let Some(pio) = self.pio.as_mut() else { return BusWrite::Unmapped };
                let offset = port - PIO_BASE;

                let strobe_mask = 1 << PIO_PRINTER_STROBE;
                let strobe_before = pio.pb & strobe_mask != 0;
                pio.write_reg(offset, byte);

                // PIO printer: a rising strobe edge while idle latches PA
                if self.config == DeviceConfig::PioPrinter && offset == 1 {
                    let strobe_now = pio.pb & strobe_mask != 0;
                    if strobe_now && !strobe_before && self.pio_printer_latch.is_none() {
                        let data = pio.pa;
                        self.pio_printer_latch = Some(data);
                        pio.set_input(PioPort::B, PIO_PRINTER_BUSY, true);
                        return BusWrite::Latched(data);
                    }
                }
                BusWrite::Ok
            }
            HS_BASE..=HS_END => {
                let Some(hs) = self.handshake.as_mut() else { return BusWrite::Unmapped };
                match port - HS_BASE {
                    0 => match hs.write_data(byte) {
                        Some(latched) => BusWrite::Latched(latched),
                        None => BusWrite::Ok,
                    },
                    _ => {
                        hs.write_state(byte);
                        BusWrite::Ok
                    }
                }
            }
            _ => BusWrite::Unmapped,
        }
    }

    /// One external clock tick. Returns whether the timer fired (its PIC
    /// line was raised).
    pub fn clock_tick(&mut self) -> bool {
        let fired = self.timer.tick();
        if fired {
            self.pic.request(LINE_TIMER);
        }
        fired
    }

    /// The F10 key was pressed.
    pub fn press_f10(&mut self) {
        self.pic.request(LINE_F10);
    }

    /// Toggles switch `i` (wired to a PIO port A input bit).
    ///
    /// Returns whether a bit actually flipped.
    pub fn toggle_switch(&mut self, i: u8) -> bool {
        match self.pio.as_mut() {
            Some(pio) => pio.toggle_input(PioPort::A, i),
            None => false,
        }
    }

    /// The printer finishes the byte it is holding.
    ///
    /// Returns the printed byte. In the handshake wiring this also raises
    /// the handshake PIC line when interrupts are enabled.
    pub fn printer_print(&mut self) -> Option<u8> {
        match self.config {
            DeviceConfig::HandshakePrinter => {
                let hs = self.handshake.as_mut()?;
                let byte = hs.printer_done()?;
                if hs.interrupts_enabled() {
                    self.pic.request(LINE_HANDSHAKE);
                }
                Some(byte)
            }
            DeviceConfig::PioPrinter => {
                let byte = self.pio_printer_latch.take()?;
                if let Some(pio) = self.pio.as_mut() {
                    pio.set_input(PioPort::B, PIO_PRINTER_BUSY, false);
                }
                Some(byte)
            }
            DeviceConfig::SwitchesLeds => None,
        }
    }

    /// Drops any byte the printer is holding and clears its busy line.
    pub fn printer_clear(&mut self) {
        self.pio_printer_latch = None;
        if let Some(pio) = self.pio.as_mut() {
            pio.set_input(PioPort::B, PIO_PRINTER_BUSY, false);
        }
        if let Some(hs) = self.handshake.as_mut() {
            let _ = hs.printer_done();
        }
    }
}
impl Default for IoBus {
    fn default() -> Self {
        Self::new(DeviceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_routing() {
        let mut bus = IoBus::new(DeviceConfig::SwitchesLeds);
        // IMR at 11h
        bus.write(0x11, 0b1111_1110);
        assert_eq!(bus.pic.imr, 0b1111_1110);
        assert_eq!(bus.read(0x11), Some(0b1111_1110));

        // timer COMP at 21h
        bus.write(0x21, 5);
        assert_eq!(bus.timer.comp, 5);

        // PIO CA at 32h
        bus.write(0x32, 0xFF);
        assert_eq!(bus.pio.as_ref().unwrap().ca, 0xFF);

        // handshake is absent in this wiring
        assert_eq!(bus.read(0x40), None);
        assert_eq!(bus.write(0x40, 1), BusWrite::Unmapped);

        // unmapped port
        assert_eq!(bus.read(0x7F), None);
        assert_eq!(bus.write(0x7F, 1), BusWrite::Unmapped);
    }

    #[test]
    fn test_clock_drives_timer_and_pic() {
        let mut bus = IoBus::new(DeviceConfig::SwitchesLeds);
        bus.write(0x21, 2); // COMP = 2
        assert!(!bus.clock_tick());
        assert!(bus.clock_tick());
        assert_eq!(bus.pic.irr & (1 << LINE_TIMER), 1 << LINE_TIMER);
    }

    #[test]
    fn test_f10_line() {
        let mut bus = IoBus::new(DeviceConfig::SwitchesLeds);
        bus.press_f10();
        assert_eq!(bus.pic.irr & 1, 1);
    }

    #[test]
    fn test_switches() {
        let mut bus = IoBus::new(DeviceConfig::SwitchesLeds);
        assert!(bus.toggle_switch(3));
        assert_eq!(bus.pio.as_ref().unwrap().pa, 0b1000);
        // output-configured bits refuse toggles
        bus.write(0x32, 0xFF);
        assert!(!bus.toggle_switch(3));
    }

    #[test]
    fn test_pio_printer_strobe() {
        let mut bus = IoBus::new(DeviceConfig::PioPrinter);
        bus.write(0x30, b'P'); // PA = data
        assert_eq!(bus.write(0x31, 1 << 1), BusWrite::Latched(b'P'));
        // busy input bit raised
        assert_eq!(bus.read(0x31).unwrap() & 1, 1);

        // strobe still high: no new latch on rewrite
        assert_eq!(bus.write(0x31, 1 << 1), BusWrite::Ok);

        assert_eq!(bus.printer_print(), Some(b'P'));
        assert_eq!(bus.read(0x31).unwrap() & 1, 0);
    }

    #[test]
    fn test_handshake_printer_interrupt() {
        let mut bus = IoBus::new(DeviceConfig::HandshakePrinter);
        bus.write(0x41, handshake::STATE_INT_ENABLE);
        assert_eq!(bus.write(0x40, b'Q'), BusWrite::Latched(b'Q'));
        assert_eq!(bus.printer_print(), Some(b'Q'));
        assert_eq!(bus.pic.irr & (1 << LINE_HANDSHAKE), 1 << LINE_HANDSHAKE);
    }
}
