//! The handshake controller.
//!
//! A strobe-based byte channel to the printer. Writing `DATA` while the
//! printer is idle latches the byte and raises the busy bit; the printer
//! consuming the byte clears busy and, when the interrupt-enable bit is
//! set, the controller asks for its PIC line to be raised.

/// STATE bit 0: the printer is holding an unconsumed byte.
pub const STATE_BUSY: u8 = 0b0000_0001;
/// STATE bit 1: strobe, pulsed by the controller when a byte is latched.
pub const STATE_STROBE: u8 = 0b0000_0010;
/// STATE bit 7: raise the PIC line when the printer finishes a byte.
pub const STATE_INT_ENABLE: u8 = 0b1000_0000;

/// The handshake controller state.
#[derive(Debug, Default, PartialEq, Eq, Clone, serde::Serialize, serde::Deserialize)]
pub struct Handshake {
    /// The data latch.
    pub data: u8,
    /// The status register.
    pub state: u8,
}

impl Handshake {
    /// Creates an idle controller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a latched byte is waiting on the printer.
    pub fn busy(&self) -> bool {
        self.state & STATE_BUSY != 0
    }

    /// Whether printer completion raises the PIC line.
    pub fn interrupts_enabled(&self) -> bool {
        self.state & STATE_INT_ENABLE != 0
    }

    /// Reads a register by port offset (0 DATA, 1 STATE).
    pub fn read_reg(&self, offset: u8) -> u8 {
        match offset {
            0 => self.data,
            _ => self.state,
        }
    }

    /// CPU write to `DATA`.
    ///
    /// While idle this latches the byte, pulses the strobe, and sets busy;
    /// the latched byte is returned. While busy the write is dropped.
    pub fn write_data(&mut self, byte: u8) -> Option<u8> {
        if self.busy() {
            return None;
        }
        self.data = byte;
        self.state |= STATE_BUSY | STATE_STROBE;
        self.state &= !STATE_STROBE; // strobe is a pulse, not a level
        Some(byte)
    }

    /// CPU write to `STATE`. The busy bit is printer-owned and preserved.
    pub fn write_state(&mut self, byte: u8) {
        self.state = (self.state & STATE_BUSY) | (byte & !(STATE_BUSY | STATE_STROBE));
    }

    /// The printer consumed the latched byte.
    ///
    /// Clears busy and returns the byte, or `None` when there is nothing
    /// to print.
    pub fn printer_done(&mut self) -> Option<u8> {
        match self.busy() {
            true => {
                self.state &= !STATE_BUSY;
                Some(self.data)
            }
            false => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latch_and_consume() {
        let mut hs = Handshake::new();
        assert_eq!(hs.write_data(b'A'), Some(b'A'));
        assert!(hs.busy());

        // a second write while busy is dropped
        assert_eq!(hs.write_data(b'B'), None);
        assert_eq!(hs.data, b'A');

        assert_eq!(hs.printer_done(), Some(b'A'));
        assert!(!hs.busy());
        assert_eq!(hs.printer_done(), None);
    }

    #[test]
    fn test_state_write_preserves_busy() {
        let mut hs = Handshake::new();
        hs.write_data(b'X');
        hs.write_state(STATE_INT_ENABLE);
        assert!(hs.busy());
        assert!(hs.interrupts_enabled());

        hs.write_state(0);
        assert!(hs.busy());
        assert!(!hs.interrupts_enabled());
    }
}
