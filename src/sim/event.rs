//! The event model of the running machine.
//!
//! Execution is observed as a sequence of [`SimulatorEvent`]s, each tagged
//! with the component it originates from. Within one instruction, events
//! follow the micro-cycle phases in order; hardware interrupt dispatch
//! events only ever appear between instructions.

use super::mem::Flags;
use super::SimErr;

/// The micro-cycle phase of the current instruction.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Phase {
    /// Reading the opcode byte.
    Fetching,
    /// Reading the remaining instruction bytes.
    FetchingOperands,
    /// Performing the operation.
    Executing,
    /// Writing results back to registers or memory.
    Writeback,
}
impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Fetching => f.write_str("fetching"),
            Phase::FetchingOperands => f.write_str("fetching-operands"),
            Phase::Executing => f.write_str("executing"),
            Phase::Writeback => f.write_str("writeback"),
        }
    }
}

/// An event originating from the CPU.
#[derive(Debug, PartialEq, Clone)]
pub enum CpuEvent {
    /// A new instruction cycle begins at this IP.
    CycleStart {
        #[allow(missing_docs)]
        ip: u16,
    },
    /// The cycle moved to a new phase.
    Phase(Phase),
    /// The fetched bytes decoded to this instruction (rendered as source).
    Decode {
        #[allow(missing_docs)]
        instr: String,
    },
    /// A register was read.
    RegRead {
        /// Register name (program-visible or internal).
        reg: &'static str,
        #[allow(missing_docs)]
        value: u16,
    },
    /// A register was written.
    RegWrite {
        /// Register name (program-visible or internal).
        reg: &'static str,
        #[allow(missing_docs)]
        value: u16,
    },
    /// The status flags were written.
    FlagsWrite {
        #[allow(missing_docs)]
        flags: Flags,
    },
    /// An interrupt (software or hardware) dispatches with this ID.
    IntDispatch {
        #[allow(missing_docs)]
        id: u8,
    },
    /// `INT 3` executed.
    Breakpoint,
    /// The CPU halted.
    Halt,
    /// Execution aborted with this error.
    Error {
        #[allow(missing_docs)]
        err: SimErr,
    },
}

/// An event originating from memory.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MemEvent {
    /// A byte was read.
    Read {
        #[allow(missing_docs)]
        addr: u16,
        #[allow(missing_docs)]
        value: u8,
    },
    /// A byte was written.
    Write {
        #[allow(missing_docs)]
        addr: u16,
        #[allow(missing_docs)]
        value: u8,
    },
}

/// An event originating from the PIC.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PicEvent {
    /// A line was requested.
    Request {
        #[allow(missing_docs)]
        line: u8,
    },
    /// An end-of-interrupt retired the in-service interrupt.
    Eoi,
    /// A request was accepted and is being dispatched.
    Dispatch {
        #[allow(missing_docs)]
        vector: u8,
    },
}

/// An event originating from the I/O bus.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum IoEvent {
    /// A mapped port was read.
    PortRead {
        #[allow(missing_docs)]
        port: u8,
        #[allow(missing_docs)]
        value: u8,
    },
    /// A mapped port was written.
    PortWrite {
        #[allow(missing_docs)]
        port: u8,
        #[allow(missing_docs)]
        value: u8,
    },
    /// A read from a port with no device behind it (returns 0).
    UnmappedRead {
        #[allow(missing_docs)]
        port: u8,
    },
    /// A write to a port with no device behind it (dropped).
    UnmappedWrite {
        #[allow(missing_docs)]
        port: u8,
    },
}

/// An event originating from the timer.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TimerEvent {
    /// The clock ticked; `cont` is the new counter.
    Tick {
        #[allow(missing_docs)]
        cont: u8,
    },
    /// The counter matched the compare register.
    Fired,
}

/// An event originating from the PIO and its peripherals.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PioEvent {
    /// A switch flipped.
    SwitchToggled {
        #[allow(missing_docs)]
        index: u8,
    },
    /// The PIO printer latched a data byte off the strobe edge.
    PrinterLatched {
        #[allow(missing_docs)]
        byte: u8,
    },
}

/// An event originating from the handshake controller.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum HandshakeEvent {
    /// A byte was latched towards the printer.
    DataLatched {
        #[allow(missing_docs)]
        byte: u8,
    },
}

/// An event originating from the printer (either wiring).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PrinterEvent {
    /// The printer put a byte on paper.
    Printed {
        #[allow(missing_docs)]
        byte: u8,
    },
}

/// An event originating from the console.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConsoleEvent {
    /// `INT 6` wants a byte; the stream pauses until one is provided.
    ReadRequest,
    /// A character was appended to the screen.
    Write {
        #[allow(missing_docs)]
        ch: char,
    },
}

/// One observable step of the running machine, tagged by source component.
#[derive(Debug, PartialEq, Clone)]
#[allow(missing_docs)]
pub enum SimulatorEvent {
    Cpu(CpuEvent),
    Mem(MemEvent),
    Pic(PicEvent),
    Io(IoEvent),
    Timer(TimerEvent),
    Pio(PioEvent),
    Handshake(HandshakeEvent),
    Printer(PrinterEvent),
    Console(ConsoleEvent),
}

/// How a finished run ended.
#[derive(Debug, PartialEq, Clone)]
pub enum RunOutcome {
    /// The CPU executed HLT or `INT 0`.
    Halted,
    /// Execution aborted.
    Errored(SimErr),
}

/// The result of pumping the event stream once.
#[derive(Debug, PartialEq, Clone)]
pub enum StreamState {
    /// The next event.
    Event(SimulatorEvent),
    /// Execution is paused waiting for a console byte
    /// (see `EventStream::provide_input`).
    AwaitingInput,
    /// Execution is over; no further events will be produced.
    Complete(RunOutcome),
}
