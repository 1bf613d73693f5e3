//! Simulating and executing compiled programs.
//!
//! This module is focused on executing fully assembled code (i.e., [`Program`]).
//!
//! This module consists of:
//! - [`Simulator`]: the machine itself: CPU, memory, I/O bus, console.
//! - [`EventStream`]: the pull-based stream of [`SimulatorEvent`]s a run
//!   produces.
//! - [`mem`]: memory, register file and flags.
//! - [`alu`]: the arithmetic-logic unit.
//! - [`device`]: the I/O bus and the chips behind it.
//! - [`io`]: console state and external pokes.
//! - [`event`]: the event model.
//!
//! # Usage
//!
//! ```
//! use vonsim::compile;
//! use vonsim::sim::Simulator;
//! use vonsim::sim::event::{RunOutcome, StreamState};
//!
//! let program = compile("
//!     ORG 2000h
//!     MOV AL, 2
//!     ADD AL, 3
//!     HLT
//!     END
//! ").unwrap();
//!
//! let mut sim = Simulator::default();
//! sim.load_program(&program, Default::default());
//!
//! let mut stream = sim.start_cpu();
//! loop {
//!     match stream.resume() {
//!         StreamState::Event(_) => {}
//!         StreamState::AwaitingInput => unreachable!("program reads no input"),
//!         StreamState::Complete(outcome) => {
//!             assert_eq!(outcome, RunOutcome::Halted);
//!             break;
//!         }
//!     }
//! }
//! assert_eq!(sim.regs.ax & 0xFF, 5);
//! ```

pub mod alu;
pub mod device;
pub mod event;
pub mod io;
pub mod mem;

use std::collections::VecDeque;

use crossbeam_channel as cbc;

use crate::asm::encoding::{
    BinaryOp, DecodeErr, Decoder, IoDir, JumpOp, Loc, MachInstr, MemRef, Port, Src, UnaryOp,
    ZeroaryOp,
};
use crate::asm::Program;
use crate::ast::Reg;
use crate::value::{Size, Value};

use device::{BusWrite, DeviceConfig, IoBus, LINE_F10, LINE_HANDSHAKE, LINE_TIMER};
use event::{
    ConsoleEvent, CpuEvent, HandshakeEvent, IoEvent, MemEvent, Phase, PicEvent, PioEvent,
    PrinterEvent, RunOutcome, SimulatorEvent, StreamState, TimerEvent,
};
use io::{poke_channel, Console, Poke, SimRemote};
use mem::{Flags, Mem, MemInit, RegFile, MEM_SIZE, MEM_TOP};

/// Errors that abort execution.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SimErr {
    /// A memory access fell outside `0000h..=3FFFh`.
    MemOutOfRange(u16),
    /// A push would move SP below the bottom of memory.
    StackOverflow,
    /// A pop would move SP past the top of memory.
    StackUnderflow,
    /// The PIC tried to dispatch a reserved vector ID.
    ReservedInterrupt(u8),
    /// The fetched bytes do not form an instruction.
    Decode(DecodeErr),
}
impl std::fmt::Display for SimErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimErr::MemOutOfRange(addr) => write!(f, "memory address {addr:04X}h is out of range"),
            SimErr::StackOverflow => f.write_str("stack overflow"),
            SimErr::StackUnderflow => f.write_str("stack underflow"),
            SimErr::ReservedInterrupt(id) => write!(f, "interrupt vector {id} is reserved"),
            SimErr::Decode(e) => e.fmt(f),
        }
    }
}
impl std::error::Error for SimErr {}
impl crate::err::Error for SimErr {
    fn code(&self) -> &'static str {
        match self {
            SimErr::MemOutOfRange(_) => "mem-out-of-range",
            SimErr::StackOverflow => "stack-overflow",
            SimErr::StackUnderflow => "stack-underflow",
            SimErr::ReservedInterrupt(_) => "reserved-interrupt",
            SimErr::Decode(_) => "illegal-opcode",
        }
    }
}
impl From<DecodeErr> for SimErr {
    fn from(value: DecodeErr) -> Self {
        SimErr::Decode(value)
    }
}

/// Where the CPU currently stands.
#[derive(Debug, PartialEq, Clone)]
enum Status {
    /// Ready to execute the next instruction.
    Ready,
    /// Paused inside `INT 6`, waiting for a console byte.
    AwaitingKey,
    /// Halted; a new program load is needed to run again.
    Halted,
    /// Aborted with an error.
    Errored(SimErr),
}

/// A serializable snapshot of the whole machine.
///
/// Produced by [`Simulator::state`] and accepted back by
/// [`Simulator::load_state`]; serializing to JSON and restoring is a fixed
/// point.
#[derive(Debug, PartialEq, Clone, serde::Serialize, serde::Deserialize)]
pub struct ComputerState {
    /// The register file, including the internal registers.
    pub regs: RegFile,
    /// The status flags.
    pub flags: Flags,
    /// Main memory as one lowercase hex string (two digits per byte).
    pub memory: String,
    /// The I/O bus and every chip on it.
    pub bus: IoBus,
    /// The console (screen and keyboard latch).
    pub console: Console,
}

/// A malformed [`ComputerState`] was handed to [`Simulator::load_state`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SnapshotErr;
impl std::fmt::Display for SnapshotErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("malformed machine snapshot")
    }
}
impl std::error::Error for SnapshotErr {}
impl crate::err::Error for SnapshotErr {
    fn code(&self) -> &'static str {
        "bad-snapshot"
    }
}

/// The machine: CPU state, memory, I/O bus and console.
#[derive(Debug)]
pub struct Simulator {
    /// The register file.
    pub regs: RegFile,
    /// The status flags.
    pub flags: Flags,
    /// Main memory.
    pub mem: Mem,
    /// The I/O bus and its chips.
    pub bus: IoBus,
    /// The console.
    pub console: Console,

    status: Status,
    queue: VecDeque<SimulatorEvent>,
    remote: SimRemote,
    pokes: cbc::Receiver<Poke>,
}

impl Simulator {
    /// Creates a machine with the given peripheral wiring and nothing
    /// loaded.
    pub fn new(config: DeviceConfig) -> Self {
        let (remote, pokes) = poke_channel();
        let mut regs = RegFile::default();
        regs.sp = MEM_TOP;
        Self {
            regs,
            flags: Flags::default(),
            mem: Mem::new(),
            bus: IoBus::new(config),
            console: Console::new(),
            status: Status::Halted,
            queue: VecDeque::new(),
            remote,
            pokes,
        }
    }

    /// Loads a compiled program.
    ///
    /// Memory is first re-initialized per `init`, then the program's data
    /// and code images are copied in. Registers and flags reset (SP to the
    /// top of memory, IP to the program's first instruction, IF clear) and
    /// the I/O chips reset to power-on state. The screen is kept; use
    /// [`Simulator::screen_clear`] to wipe it.
    pub fn load_program(&mut self, program: &Program, init: MemInit) {
        self.mem.reinit(init);
        self.mem.load_image(&program.data_bytes);
        self.mem.load_image(&program.code_bytes);

        self.regs = RegFile::default();
        self.regs.sp = MEM_TOP;
        self.flags = Flags::default();
        self.bus = IoBus::new(self.bus.config);
        self.console.take_key();
        self.queue.clear();

        match program.entry() {
            Some(entry) => {
                self.regs.ip = entry;
                self.status = Status::Ready;
            }
            None => self.status = Status::Halted,
        }
    }

    /// Starts (or resumes) execution, producing the event stream.
    ///
    /// Dropping the stream cancels execution at an instruction boundary;
    /// calling `start_cpu` again resumes from the machine state left
    /// behind.
    pub fn start_cpu(&mut self) -> EventStream<'_> {
        EventStream { sim: self }
    }

    /// A cloneable handle for poking the machine while it runs.
    pub fn remote(&self) -> SimRemote {
        self.remote.clone()
    }

    /// Takes a snapshot of the whole machine.
    pub fn state(&self) -> ComputerState {
        let memory: String = self.mem.raw().iter().map(|b| format!("{b:02x}")).collect();
        ComputerState {
            regs: self.regs.clone(),
            flags: self.flags,
            memory,
            bus: self.bus.clone(),
            console: self.console.clone(),
        }
    }

    /// Restores the machine from a snapshot.
    pub fn load_state(&mut self, state: &ComputerState) -> Result<(), SnapshotErr> {
        if state.memory.len() != MEM_SIZE * 2 || !state.memory.is_char_boundary(2) {
            return Err(SnapshotErr);
        }
        let mut bytes = [0u8; MEM_SIZE];
        for (i, slot) in bytes.iter_mut().enumerate() {
            let pair = state.memory.get(i * 2..i * 2 + 2).ok_or(SnapshotErr)?;
            *slot = u8::from_str_radix(pair, 16).map_err(|_| SnapshotErr)?;
        }

        self.regs = state.regs.clone();
        self.flags = state.flags;
        *self.mem.raw_mut() = bytes;
        self.bus = state.bus.clone();
        self.console = state.console.clone();
        self.queue.clear();
        self.status = Status::Ready;
        Ok(())
    }

    // ---- direct pokes (usable between runs; while running, prefer the remote) ----

    /// Advance the clock one tick.
    pub fn clock_tick(&mut self) {
        self.apply_poke(Poke::ClockTick);
    }
    /// Press the F10 key.
    pub fn press_f10(&mut self) {
        self.apply_poke(Poke::PressF10);
    }
    /// Latch a keyboard byte.
    pub fn feed_key(&mut self, byte: u8) {
        self.apply_poke(Poke::FeedKey(byte));
    }
    /// Toggle switch `i`.
    pub fn toggle_switch(&mut self, i: u8) {
        self.apply_poke(Poke::ToggleSwitch(i));
    }
    /// The printer finishes the byte it is holding.
    pub fn printer_print(&mut self) {
        self.apply_poke(Poke::PrinterPrint);
    }
    /// Drop whatever the printer is holding.
    pub fn printer_clear(&mut self) {
        self.apply_poke(Poke::PrinterClear);
    }
    /// Clear the screen.
    pub fn screen_clear(&mut self) {
        self.apply_poke(Poke::ScreenClear);
    }

    // ---- event plumbing ----

    fn emit(&mut self, ev: SimulatorEvent) {
        self.queue.push_back(ev);
    }
    fn emit_cpu(&mut self, ev: CpuEvent) {
        self.emit(SimulatorEvent::Cpu(ev));
    }
    fn emit_reg_write(&mut self, reg: &'static str, value: u16) {
        self.emit_cpu(CpuEvent::RegWrite { reg, value });
    }
    fn emit_flags(&mut self) {
        let flags = self.flags;
        self.emit_cpu(CpuEvent::FlagsWrite { flags });
    }
    fn set_error(&mut self, err: SimErr) {
        self.emit_cpu(CpuEvent::Error { err });
        self.status = Status::Errored(err);
    }

    fn apply_poke(&mut self, poke: Poke) {
        match poke {
            Poke::ClockTick => {
                let fired = self.bus.clock_tick();
                let cont = self.bus.timer.cont;
                self.emit(SimulatorEvent::Timer(TimerEvent::Tick { cont }));
                if fired {
                    self.emit(SimulatorEvent::Timer(TimerEvent::Fired));
                    self.emit(SimulatorEvent::Pic(PicEvent::Request { line: LINE_TIMER }));
                }
            }
            Poke::PressF10 => {
                self.bus.press_f10();
                self.emit(SimulatorEvent::Pic(PicEvent::Request { line: LINE_F10 }));
            }
            Poke::FeedKey(byte) => match self.status {
                Status::AwaitingKey => self.finish_console_read(byte),
                _ => self.console.feed_key(byte),
            },
            Poke::ToggleSwitch(i) => {
                if self.bus.toggle_switch(i) {
                    self.emit(SimulatorEvent::Pio(PioEvent::SwitchToggled { index: i }));
                }
            }
            Poke::PrinterPrint => {
                let irq = matches!(self.bus.config, DeviceConfig::HandshakePrinter)
                    && self.bus.handshake.as_ref().is_some_and(|h| h.busy() && h.interrupts_enabled());
                if let Some(byte) = self.bus.printer_print() {
                    self.emit(SimulatorEvent::Printer(PrinterEvent::Printed { byte }));
                    self.console.write(byte);
                    self.emit(SimulatorEvent::Console(ConsoleEvent::Write { ch: char::from(byte) }));
                    if irq {
                        self.emit(SimulatorEvent::Pic(PicEvent::Request { line: LINE_HANDSHAKE }));
                    }
                }
            }
            Poke::PrinterClear => self.bus.printer_clear(),
            Poke::ScreenClear => self.console.clear_screen(),
        }
    }

    // ---- the instruction boundary and one instruction ----

    fn drain_pokes(&mut self) {
        while let Ok(poke) = self.pokes.try_recv() {
            self.apply_poke(poke);
        }
    }

    /// Runs one instruction boundary (pokes, then the PIC) and, if the CPU
    /// is still ready, one instruction. Fills the event queue.
    fn advance(&mut self) {
        self.drain_pokes();
        if self.status != Status::Ready {
            return;
        }

        match self.bus.pic.update(self.flags.if_) {
            Ok(device::pic::PicUpdate::None) => {}
            Ok(device::pic::PicUpdate::Eoi) => self.emit(SimulatorEvent::Pic(PicEvent::Eoi)),
            Ok(device::pic::PicUpdate::Dispatch(vector)) => {
                self.emit(SimulatorEvent::Pic(PicEvent::Dispatch { vector }));
                if let Err(e) = self.dispatch_interrupt(vector) {
                    self.set_error(e);
                    return;
                }
            }
            Err(e) => {
                self.set_error(e);
                return;
            }
        }

        if let Err(e) = self.step() {
            self.set_error(e);
        }
    }

    /// Fetches one instruction byte through MAR and MBR, advancing IP.
    fn fetch_byte(&mut self) -> Result<u8, SimErr> {
        let addr = self.regs.ip;
        self.regs.mar = addr;
        self.emit_reg_write("MAR", addr);

        let byte = self.mem.read_byte(addr)?;
        self.emit(SimulatorEvent::Mem(MemEvent::Read { addr, value: byte }));
        self.regs.mbr = byte;
        self.emit_reg_write("MBR", u16::from(byte));

        self.regs.ip = addr.wrapping_add(1);
        let ip = self.regs.ip;
        self.emit_reg_write("IP", ip);
        Ok(byte)
    }

    /// Executes one full instruction cycle.
    fn step(&mut self) -> Result<(), SimErr> {
        let ip = self.regs.ip;
        self.emit_cpu(CpuEvent::CycleStart { ip });
        self.emit_cpu(CpuEvent::Phase(Phase::Fetching));

        let opcode = self.fetch_byte()?;
        self.regs.ir = opcode;
        self.emit_reg_write("IR", u16::from(opcode));

        let mut decoder = Decoder::new(opcode);
        if decoder.needs()? > 0 {
            self.emit_cpu(CpuEvent::Phase(Phase::FetchingOperands));
            while decoder.needs()? > 0 {
                let byte = self.fetch_byte()?;
                decoder.push(byte);
            }
        }
        let instr = decoder.decode()?;
        self.emit_cpu(CpuEvent::Decode { instr: instr.to_string() });
        self.note_operand_regs(&instr);

        self.emit_cpu(CpuEvent::Phase(Phase::Executing));
        self.execute(instr)
    }

    /// Mirrors decoded operands into the internal `ri`/`id` registers.
    fn note_operand_regs(&mut self, instr: &MachInstr) {
        let mut ri = None;
        let mut id = None;
        match *instr {
            MachInstr::Unary { tgt: Loc::Mem(MemRef::Direct(a)), .. } => ri = Some(a),
            MachInstr::Binary { dst, src, .. } => {
                if let Loc::Mem(MemRef::Direct(a)) = dst {
                    ri = Some(a);
                }
                match src {
                    Src::Mem(MemRef::Direct(a)) => ri = Some(a),
                    Src::Imm(v) => id = Some(v.unsigned()),
                    _ => {}
                }
            }
            MachInstr::Jump { target, .. } => ri = Some(target),
            _ => {}
        }
        if let Some(a) = ri {
            self.regs.ri = a;
            self.emit_reg_write("ri", a);
        }
        if let Some(v) = id {
            self.regs.id = v;
            self.emit_reg_write("id", v);
        }
    }

    // ---- memory and bus access with events ----

    fn read_mem_value(&mut self, addr: u16, size: Size) -> Result<Value, SimErr> {
        self.regs.mar = addr;
        self.emit_reg_write("MAR", addr);
        let lo = self.mem.read_byte(addr)?;
        self.emit(SimulatorEvent::Mem(MemEvent::Read { addr, value: lo }));
        self.regs.mbr = lo;
        self.emit_reg_write("MBR", u16::from(lo));

        match size {
            Size::Byte => Ok(Value::byte(lo)),
            Size::Word => {
                let hi_addr = addr.checked_add(1).ok_or(SimErr::MemOutOfRange(addr))?;
                let hi = self.mem.read_byte(hi_addr)?;
                self.emit(SimulatorEvent::Mem(MemEvent::Read { addr: hi_addr, value: hi }));
                self.regs.mbr = hi;
                self.emit_reg_write("MBR", u16::from(hi));
                Ok(Value::word_from_halves(lo, hi))
            }
        }
    }

    fn write_mem_value(&mut self, addr: u16, value: Value) -> Result<(), SimErr> {
        self.regs.mar = addr;
        self.emit_reg_write("MAR", addr);
        let lo = value.low().unsigned() as u8;
        self.mem.write_byte(addr, lo)?;
        self.emit(SimulatorEvent::Mem(MemEvent::Write { addr, value: lo }));

        if value.size() == Size::Word {
            let hi_addr = addr.checked_add(1).ok_or(SimErr::MemOutOfRange(addr))?;
            let hi = value.high().unsigned() as u8;
            self.mem.write_byte(hi_addr, hi)?;
            self.emit(SimulatorEvent::Mem(MemEvent::Write { addr: hi_addr, value: hi }));
        }
        Ok(())
    }

    fn bus_read(&mut self, port: u8) -> u8 {
        match self.bus.read(port) {
            Some(value) => {
                self.emit(SimulatorEvent::Io(IoEvent::PortRead { port, value }));
                value
            }
            None => {
                self.emit(SimulatorEvent::Io(IoEvent::UnmappedRead { port }));
                0
            }
        }
    }

    fn bus_write(&mut self, port: u8, value: u8) {
        match self.bus.write(port, value) {
            BusWrite::Unmapped => self.emit(SimulatorEvent::Io(IoEvent::UnmappedWrite { port })),
            BusWrite::Ok => self.emit(SimulatorEvent::Io(IoEvent::PortWrite { port, value })),
            BusWrite::Latched(byte) => {
                self.emit(SimulatorEvent::Io(IoEvent::PortWrite { port, value }));
                match self.bus.config {
                    DeviceConfig::HandshakePrinter => {
                        self.emit(SimulatorEvent::Handshake(HandshakeEvent::DataLatched { byte }));
                    }
                    _ => self.emit(SimulatorEvent::Pio(PioEvent::PrinterLatched { byte })),
                }
            }
        }
    }

    // ---- operand access ----

    /// Resolves the run-time address of a memory reference.
    fn mem_addr(&mut self, mem: MemRef) -> u16 {
        match mem {
            MemRef::Bx => {
                let bx = self.regs.bx;
                self.emit_cpu(CpuEvent::RegRead { reg: "BX", value: bx });
                bx
            }
            MemRef::Direct(addr) => addr,
        }
    }

    fn read_loc(&mut self, size: Size, loc: Loc) -> Result<Value, SimErr> {
        match loc {
            Loc::Reg(r) => {
                let v = self.regs.get(r);
                self.emit_cpu(CpuEvent::RegRead { reg: r.name(), value: v.unsigned() });
                Ok(v)
            }
            Loc::Mem(m) => {
                let addr = self.mem_addr(m);
                self.read_mem_value(addr, size)
            }
        }
    }

    fn read_src(&mut self, size: Size, src: Src) -> Result<Value, SimErr> {
        match src {
            Src::Reg(r) => self.read_loc(size, Loc::Reg(r)),
            Src::Mem(m) => self.read_loc(size, Loc::Mem(m)),
            Src::Imm(v) => Ok(v),
        }
    }

    fn write_loc(&mut self, loc: Loc, value: Value) -> Result<(), SimErr> {
        match loc {
            Loc::Reg(r) => {
                self.regs.set(r, value);
                self.emit_cpu(CpuEvent::RegWrite { reg: r.name(), value: value.unsigned() });
                Ok(())
            }
            Loc::Mem(m) => {
                let addr = self.mem_addr(m);
                self.write_mem_value(addr, value)
            }
        }
    }

    // ---- stack ----

    fn push_word(&mut self, word: u16) -> Result<(), SimErr> {
        let sp = self.regs.sp;
        if sp < 2 {
            return Err(SimErr::StackOverflow);
        }
        self.regs.sp = sp - 2;
        let sp = self.regs.sp;
        self.emit_reg_write("SP", sp);
        self.write_mem_value(sp, Value::word(word))
    }

    fn pop_word(&mut self) -> Result<u16, SimErr> {
        let sp = self.regs.sp;
        match sp.checked_add(2) {
            Some(next) if next <= MEM_TOP => {}
            _ => return Err(SimErr::StackUnderflow),
        }
        let value = self.read_mem_value(sp, Size::Word)?;
        self.regs.sp = sp + 2;
        let sp = self.regs.sp;
        self.emit_reg_write("SP", sp);
        Ok(value.unsigned())
    }

    // ---- interrupts ----

    /// The shared dispatch sequence: push FLAGS, clear IF, push IP, and
    /// jump through the interrupt vector table.
    fn dispatch_interrupt(&mut self, id: u8) -> Result<(), SimErr> {
        self.emit_cpu(CpuEvent::IntDispatch { id });
        self.push_word(self.flags.to_word())?;
        self.flags.if_ = false;
        self.emit_flags();
        self.push_word(self.regs.ip)?;

        let vector_addr = u16::from(id) * 4;
        let target = self.read_mem_value(vector_addr, Size::Word)?.unsigned();
        self.regs.ip = target;
        self.emit_reg_write("IP", target);
        Ok(())
    }

    /// Completes a pending `INT 6` once a key arrives.
    fn finish_console_read(&mut self, byte: u8) {
        self.status = Status::Ready;
        let addr = self.regs.bx;
        self.emit_cpu(CpuEvent::RegRead { reg: "BX", value: addr });
        let result = self
            .write_mem_value(addr, Value::byte(byte))
            .and_then(|()| self.pop_flags());
        if let Err(e) = result {
            self.set_error(e);
        }
    }

    fn pop_flags(&mut self) -> Result<(), SimErr> {
        let word = self.pop_word()?;
        self.flags = Flags::from_word(word);
        self.emit_flags();
        Ok(())
    }

    fn do_int(&mut self, id: u8) -> Result<(), SimErr> {
        match id {
            0 => {
                self.emit_cpu(CpuEvent::Halt);
                self.status = Status::Halted;
                Ok(())
            }
            3 => {
                self.emit_cpu(CpuEvent::Breakpoint);
                Ok(())
            }
            // The console interrupts save FLAGS and clear IF even though
            // they never touch the vector table, and restore FLAGS on the
            // way out.
            6 => {
                self.push_word(self.flags.to_word())?;
                self.flags.if_ = false;
                self.emit_flags();

                match self.console.take_key() {
                    Some(byte) => {
                        self.finish_console_read(byte);
                        Ok(())
                    }
                    None => {
                        self.emit(SimulatorEvent::Console(ConsoleEvent::ReadRequest));
                        self.status = Status::AwaitingKey;
                        Ok(())
                    }
                }
            }
            7 => {
                self.push_word(self.flags.to_word())?;
                self.flags.if_ = false;
                self.emit_flags();

                let count = self.regs.ax & 0xFF;
                let start = self.regs.bx;
                self.emit_cpu(CpuEvent::RegRead { reg: "AL", value: count });
                self.emit_cpu(CpuEvent::RegRead { reg: "BX", value: start });
                for i in 0..count {
                    let addr = start.wrapping_add(i);
                    let byte = self.read_mem_value(addr, Size::Byte)?.unsigned() as u8;
                    self.console.write(byte);
                    self.emit(SimulatorEvent::Console(ConsoleEvent::Write { ch: char::from(byte) }));
                }
                self.pop_flags()
            }
            id => self.dispatch_interrupt(id),
        }
    }

    // ---- execution ----

    fn execute(&mut self, instr: MachInstr) -> Result<(), SimErr> {
        match instr {
            MachInstr::Zeroary(op) => match op {
                ZeroaryOp::Hlt => {
                    self.emit_cpu(CpuEvent::Halt);
                    self.status = Status::Halted;
                    Ok(())
                }
                ZeroaryOp::Nop => Ok(()),
                ZeroaryOp::Ret => {
                    let ip = self.pop_word()?;
                    self.regs.ip = ip;
                    self.emit_reg_write("IP", ip);
                    Ok(())
                }
                ZeroaryOp::Iret => {
                    let ip = self.pop_word()?;
                    self.regs.ip = ip;
                    self.emit_reg_write("IP", ip);
                    self.pop_flags()
                }
                ZeroaryOp::Cli => {
                    self.flags.if_ = false;
                    self.emit_flags();
                    Ok(())
                }
                ZeroaryOp::Sti => {
                    self.flags.if_ = true;
                    self.emit_flags();
                    Ok(())
                }
                ZeroaryOp::Pushf => self.push_word(self.flags.to_word()),
                ZeroaryOp::Popf => self.pop_flags(),
            },
            MachInstr::Push(r) => {
                let v = self.regs.get(r).unsigned();
                self.emit_cpu(CpuEvent::RegRead { reg: r.name(), value: v });
                self.push_word(v)
            }
            MachInstr::Pop(r) => {
                let v = self.pop_word()?;
                self.regs.set(r, Value::word(v));
                self.emit_cpu(CpuEvent::RegWrite { reg: r.name(), value: v });
                Ok(())
            }
            MachInstr::Unary { op, size, tgt } => {
                let cur = self.read_loc(size, tgt)?;
                let out = match op {
                    UnaryOp::Inc => alu::add(cur, Value::truncated(size, 1), false),
                    UnaryOp::Dec => alu::sub(cur, Value::truncated(size, 1), false),
                    UnaryOp::Neg => alu::neg(cur),
                    UnaryOp::Not => alu::not(cur),
                };
                self.emit_reg_write("result", out.value.unsigned());

                // INC and DEC leave the carry flag alone
                let keep_cf = matches!(op, UnaryOp::Inc | UnaryOp::Dec);
                let cf = if keep_cf { self.flags.cf } else { out.cf };
                self.flags = Flags { cf, zf: out.zf, sf: out.sf, of: out.of, if_: self.flags.if_ };

                self.emit_cpu(CpuEvent::Phase(Phase::Writeback));
                self.write_loc(tgt, out.value)?;
                self.emit_flags();
                Ok(())
            }
            MachInstr::Binary { op: BinaryOp::Mov, size, dst, src } => {
                let v = self.read_src(size, src)?;
                self.emit_cpu(CpuEvent::Phase(Phase::Writeback));
                self.write_loc(dst, v)
            }
            MachInstr::Binary { op, size, dst, src } => {
                let a = self.read_loc(size, dst)?;
                let b = self.read_src(size, src)?;
                self.emit_reg_write("left", a.unsigned());
                self.emit_reg_write("right", b.unsigned());

                let out = alu::binary(op, a, b, self.flags.cf);
                self.emit_reg_write("result", out.value.unsigned());
                self.flags =
                    Flags { cf: out.cf, zf: out.zf, sf: out.sf, of: out.of, if_: self.flags.if_ };

                if op != BinaryOp::Cmp {
                    self.emit_cpu(CpuEvent::Phase(Phase::Writeback));
                    self.write_loc(dst, out.value)?;
                }
                self.emit_flags();
                Ok(())
            }
            MachInstr::Jump { op, target } => {
                let taken = match op {
                    JumpOp::Jmp | JumpOp::Call => true,
                    JumpOp::Jz => self.flags.zf,
                    JumpOp::Jnz => !self.flags.zf,
                    JumpOp::Jc => self.flags.cf,
                    JumpOp::Jnc => !self.flags.cf,
                    JumpOp::Js => self.flags.sf,
                    JumpOp::Jns => !self.flags.sf,
                    JumpOp::Jo => self.flags.of,
                    JumpOp::Jno => !self.flags.of,
                };
                if taken {
                    if op == JumpOp::Call {
                        self.push_word(self.regs.ip)?;
                    }
                    self.regs.ip = target;
                    self.emit_reg_write("IP", target);
                }
                Ok(())
            }
            MachInstr::Int(id) => self.do_int(id),
            MachInstr::InOut { dir, size, port } => {
                let port = match port {
                    Port::Fixed(p) => p,
                    Port::Dx => {
                        let dx = self.regs.dx;
                        self.emit_cpu(CpuEvent::RegRead { reg: "DX", value: dx });
                        dx as u8
                    }
                };
                match dir {
                    IoDir::In => {
                        let value = match size {
                            Size::Byte => Value::byte(self.bus_read(port)),
                            Size::Word => {
                                let lo = self.bus_read(port);
                                let hi = self.bus_read(port.wrapping_add(1));
                                Value::word_from_halves(lo, hi)
                            }
                        };
                        self.emit_cpu(CpuEvent::Phase(Phase::Writeback));
                        let acc = match size {
                            Size::Byte => Reg::AL,
                            Size::Word => Reg::AX,
                        };
                        self.regs.set(acc, value);
                        self.emit_cpu(CpuEvent::RegWrite { reg: acc.name(), value: value.unsigned() });
                        Ok(())
                    }
                    IoDir::Out => {
                        let acc = match size {
                            Size::Byte => Reg::AL,
                            Size::Word => Reg::AX,
                        };
                        let value = self.regs.get(acc);
                        self.emit_cpu(CpuEvent::RegRead { reg: acc.name(), value: value.unsigned() });
                        self.bus_write(port, value.low().unsigned() as u8);
                        if size == Size::Word {
                            self.bus_write(port.wrapping_add(1), value.high().unsigned() as u8);
                        }
                        Ok(())
                    }
                }
            }
        }
    }
}
impl Default for Simulator {
    fn default() -> Self {
        Self::new(DeviceConfig::default())
    }
}

/// The lazy, consumer-paced stream of events a run produces.
///
/// [`EventStream::resume`] yields one event at a time, executing the next
/// instruction only when the queued events of the previous one are drained.
/// When execution needs a console byte (`INT 6`), the stream reports
/// [`StreamState::AwaitingInput`] until [`EventStream::provide_input`] is
/// called. Dropping the stream abandons the run at an instruction boundary.
#[derive(Debug)]
pub struct EventStream<'s> {
    sim: &'s mut Simulator,
}

impl EventStream<'_> {
    /// Pumps the stream once.
    pub fn resume(&mut self) -> StreamState {
        loop {
            if let Some(ev) = self.sim.queue.pop_front() {
                return StreamState::Event(ev);
            }
            match &self.sim.status {
                Status::Halted => return StreamState::Complete(RunOutcome::Halted),
                Status::Errored(e) => return StreamState::Complete(RunOutcome::Errored(*e)),
                Status::AwaitingKey => {
                    // a remote feed_key can end the wait
                    self.sim.drain_pokes();
                    if matches!(self.sim.status, Status::AwaitingKey) && self.sim.queue.is_empty() {
                        return StreamState::AwaitingInput;
                    }
                }
                Status::Ready => self.sim.advance(),
            }
        }
    }

    /// Supplies the byte a paused `INT 6` is waiting for.
    ///
    /// If the stream is not waiting, the byte lands in the keyboard latch
    /// for the next `INT 6`.
    pub fn provide_input(&mut self, byte: u8) {
        match self.sim.status {
            Status::AwaitingKey => self.sim.finish_console_read(byte),
            _ => self.sim.console.feed_key(byte),
        }
    }

    /// Runs the stream to completion, discarding events.
    ///
    /// Returns `None` if the stream pauses for input.
    pub fn run_to_completion(&mut self) -> Option<RunOutcome> {
        loop {
            match self.resume() {
                StreamState::Event(_) => {}
                StreamState::AwaitingInput => return None,
                StreamState::Complete(outcome) => return Some(outcome),
            }
        }
    }
}
