//! The programmable interrupt controller.
//!
//! The PIC arbitrates eight interrupt lines through four visible registers
//! (EOI, IMR, IRR, ISR) and one vector register per line (INT0 through
//! INT7). Devices raise lines with [`Pic::request`]; the CPU calls
//! [`Pic::update`] between instructions and dispatches through the
//! interrupt vector table when a vector ID comes back.

use crate::sim::SimErr;

/// The end-of-interrupt command an interrupt handler writes to the EOI
/// register.
pub const EOI_COMMAND: u8 = 0x20;

/// What one [`Pic::update`] call did.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PicUpdate {
    /// Nothing to do.
    None,
    /// An end-of-interrupt completed: ISR and EOI were cleared.
    Eoi,
    /// A request was accepted; the CPU must dispatch through this vector ID.
    Dispatch(u8),
}

/// The interrupt controller state.
#[derive(Debug, PartialEq, Eq, Clone, serde::Serialize, serde::Deserialize)]
pub struct Pic {
    /// Interrupt mask register; a set bit masks its line.
    pub imr: u8,
    /// Interrupt request register; a set bit is a pending request.
    pub irr: u8,
    /// In-service register. Holds at most one set bit.
    pub isr: u8,
    /// End-of-interrupt register.
    pub eoi: u8,
    /// Per-line vector registers INT0..INT7.
    pub vectors: [u8; 8],
    /// Inclusive range of vector IDs the CPU manages itself; dispatching
    /// one of these is a fatal error.
    pub reserved: (u8, u8),
}

impl Pic {
    /// Creates a PIC with every line masked and vectors 0 through 7.
    pub fn new() -> Self {
        Self {
            imr: 0xFF,
            irr: 0,
            isr: 0,
            eoi: 0,
            vectors: [0, 1, 2, 3, 4, 5, 6, 7],
            reserved: (0, 7),
        }
    }

    /// Raises interrupt line `n`.
    pub fn request(&mut self, n: u8) {
        self.irr |= 1 << (n & 7);
    }

    /// Withdraws a pending request on line `n`.
    pub fn cancel(&mut self, n: u8) {
        self.irr &= !(1 << (n & 7));
    }

    /// Runs the controller for one instruction boundary.
    ///
    /// In order:
    /// 1. a pending EOI command retires the in-service interrupt;
    /// 2. nothing dispatches while one is in service or IF is clear;
    /// 3. the lowest-numbered unmasked pending line wins;
    /// 4. a reserved vector ID is a fatal error;
    /// 5. otherwise the request moves from IRR to ISR and the vector ID is
    ///    returned for dispatch.
    pub fn update(&mut self, if_enabled: bool) -> Result<PicUpdate, SimErr> {
        if self.isr != 0 && self.eoi == EOI_COMMAND {
            self.isr = 0;
            self.eoi = 0;
            return Ok(PicUpdate::Eoi);
        }
        if self.isr != 0 || !if_enabled {
            return Ok(PicUpdate::None);
        }

        let pending = self.irr & !self.imr;
        if pending == 0 {
            return Ok(PicUpdate::None);
        }
        let line = pending.trailing_zeros() as u8;

        let vector = self.vectors[usize::from(line)];
        let (lo, hi) = self.reserved;
        if (lo..=hi).contains(&vector) {
            return Err(SimErr::ReservedInterrupt(vector));
        }

        self.irr &= !(1 << line);
        self.isr = 1 << line;
        self.eoi = 0;
        Ok(PicUpdate::Dispatch(vector))
    }

    /// Reads a register by its port offset (0 EOI, 1 IMR, 2 IRR, 3 ISR,
    /// 4..=11 INT0..INT7).
    pub fn read_reg(&self, offset: u8) -> u8 {
        match offset {
            0 => self.eoi,
            1 => self.imr,
            2 => self.irr,
            3 => self.isr,
            n => self.vectors[usize::from(n - 4)],
        }
    }

    /// Writes a register by its port offset.
    ///
    /// IRR and ISR are status registers; writes to them are ignored.
    pub fn write_reg(&mut self, offset: u8, byte: u8) {
        match offset {
            0 => self.eoi = byte,
            1 => self.imr = byte,
            2 | 3 => {}
            n => self.vectors[usize::from(n - 4)] = byte,
        }
    }
}
impl Default for Pic {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A PIC with line `n` unmasked and a non-reserved vector installed.
    fn unmasked(line: u8, vector: u8) -> Pic {
        let mut pic = Pic::new();
        pic.imr &= !(1 << line);
        pic.vectors[usize::from(line)] = vector;
        pic
    }

    #[test]
    fn test_masked_request_stays_pending() {
        let mut pic = Pic::new();
        pic.request(3);
        assert_eq!(pic.update(true), Ok(PicUpdate::None));
        assert_eq!(pic.irr, 0b1000);
    }

    #[test]
    fn test_dispatch() {
        let mut pic = unmasked(0, 10);
        pic.request(0);
        assert_eq!(pic.update(true), Ok(PicUpdate::Dispatch(10)));
        assert_eq!(pic.irr, 0);
        assert_eq!(pic.isr, 0b1);
    }

    #[test]
    fn test_if_clear_blocks_dispatch() {
        let mut pic = unmasked(0, 10);
        pic.request(0);
        assert_eq!(pic.update(false), Ok(PicUpdate::None));
        assert_eq!(pic.irr, 0b1);
    }

    #[test]
    fn test_lowest_line_wins() {
        let mut pic = unmasked(2, 12);
        pic.imr &= !(1 << 5);
        pic.vectors[5] = 15;
        pic.request(5);
        pic.request(2);
        assert_eq!(pic.update(true), Ok(PicUpdate::Dispatch(12)));
        // line 5 stays pending until EOI retires line 2
        assert_eq!(pic.irr, 0b10_0000);
        assert_eq!(pic.update(true), Ok(PicUpdate::None));

        pic.write_reg(0, EOI_COMMAND);
        assert_eq!(pic.update(true), Ok(PicUpdate::Eoi));
        assert_eq!(pic.update(true), Ok(PicUpdate::Dispatch(15)));
    }

    #[test]
    fn test_isr_single_bit() {
        let mut pic = unmasked(1, 11);
        pic.imr &= !(1 << 4);
        pic.vectors[4] = 14;

        pic.request(1);
        pic.request(4);
        let _ = pic.update(true);
        assert!(pic.isr.count_ones() <= 1);
        pic.write_reg(0, EOI_COMMAND);
        let _ = pic.update(true);
        assert!(pic.isr.count_ones() <= 1);
        let _ = pic.update(true);
        assert!(pic.isr.count_ones() <= 1);
    }

    #[test]
    fn test_reserved_vector_is_fatal() {
        let mut pic = unmasked(0, 6);
        pic.request(0);
        assert_eq!(pic.update(true), Err(SimErr::ReservedInterrupt(6)));
    }

    #[test]
    fn test_cancel() {
        let mut pic = unmasked(0, 10);
        pic.request(0);
        pic.cancel(0);
        assert_eq!(pic.update(true), Ok(PicUpdate::None));
    }

    #[test]
    fn test_status_registers_read_only() {
        let mut pic = Pic::new();
        pic.request(0);
        pic.write_reg(2, 0);
        pic.write_reg(3, 0xFF);
        assert_eq!(pic.read_reg(2), 0b1);
        assert_eq!(pic.read_reg(3), 0);
    }
}
