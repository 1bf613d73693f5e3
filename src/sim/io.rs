//! Console state and external pokes.
//!
//! This module consists of:
//! - [`Console`]: the screen buffer and the keyboard latch.
//! - [`Poke`]: one imperative action from the outside world.
//! - [`SimRemote`]: a cloneable, channel-backed handle that delivers pokes
//!   while the event stream is running; they are applied at instruction
//!   boundaries.

use crossbeam_channel as cbc;

/// The console: an append-only screen and a one-byte keyboard latch.
#[derive(Debug, Default, PartialEq, Eq, Clone, serde::Serialize, serde::Deserialize)]
pub struct Console {
    screen: String,
    key: Option<u8>,
}

impl Console {
    /// Creates an empty console.
    pub fn new() -> Self {
        Self::default()
    }

    /// The screen contents so far.
    pub fn screen(&self) -> &str {
        &self.screen
    }

    /// Appends one output byte to the screen.
    pub fn write(&mut self, byte: u8) {
        self.screen.push(char::from(byte));
    }

    /// Clears the screen.
    pub fn clear_screen(&mut self) {
        self.screen.clear();
    }

    /// Latches a keystroke. A new key replaces an unread one.
    pub fn feed_key(&mut self, byte: u8) {
        self.key = Some(byte);
    }

    /// Consumes the latched keystroke, if any.
    pub fn take_key(&mut self) -> Option<u8> {
        self.key.take()
    }

    /// Whether a keystroke is waiting.
    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }
}

/// One imperative action on the machine's peripherals.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Poke {
    /// Advance the clock one tick (drives the timer).
    ClockTick,
    /// Press the F10 key (raises its PIC line).
    PressF10,
    /// Latch a keyboard byte.
    FeedKey(u8),
    /// Toggle switch `i`.
    ToggleSwitch(u8),
    /// The printer finishes the byte it is holding.
    PrinterPrint,
    /// Drop whatever the printer is holding.
    PrinterClear,
    /// Clear the screen.
    ScreenClear,
}

/// A cloneable handle for poking a running simulator.
///
/// Pokes pile up in a channel and are applied at the next instruction
/// boundary, so they never land mid-instruction. Sends to a dropped
/// simulator are silently discarded.
#[derive(Debug, Clone)]
pub struct SimRemote {
    tx: cbc::Sender<Poke>,
}

impl SimRemote {
    /// Sends one poke.
    pub fn poke(&self, poke: Poke) {
        let _ = self.tx.send(poke);
    }

    /// Advance the clock one tick.
    pub fn clock_tick(&self) {
        self.poke(Poke::ClockTick);
    }
    /// Press the F10 key.
    pub fn press_f10(&self) {
        self.poke(Poke::PressF10);
    }
    /// Latch a keyboard byte.
    pub fn feed_key(&self, byte: u8) {
        self.poke(Poke::FeedKey(byte));
    }
    /// Toggle switch `i`.
    pub fn toggle_switch(&self, i: u8) {
        self.poke(Poke::ToggleSwitch(i));
    }
    /// The printer finishes the byte it is holding.
    pub fn printer_print(&self) {
        self.poke(Poke::PrinterPrint);
    }
    /// Drop whatever the printer is holding.
    pub fn printer_clear(&self) {
        self.poke(Poke::PrinterClear);
    }
    /// Clear the screen.
    pub fn screen_clear(&self) {
        self.poke(Poke::ScreenClear);
    }
}

/// Creates the poke channel: the remote handle and the receiving end the
/// simulator drains.
pub(super) fn poke_channel() -> (SimRemote, cbc::Receiver<Poke>) {
    let (tx, rx) = cbc::unbounded();
    (SimRemote { tx }, rx)
}
