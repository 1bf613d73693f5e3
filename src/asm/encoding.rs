//! The machine instruction form and its byte-exact codec.
//!
//! [`MachInstr`] is the executable instruction representation shared by the
//! assembler (which encodes it into the program image) and the simulator
//! (which decodes fetched bytes back into it). [`MachInstr::encode`] and
//! [`Decoder`] are exact inverses over all legal encodings.
//!
//! # Encoding
//!
//! The first byte of every instruction is `GGGGG LLL`: a 5-bit opcode group
//! and 3 payload bits whose meaning is group-specific (for the binary
//! operations, a size bit plus two addressing-mode bits). Immediates and
//! direct addresses are little-endian. The group table:
//!
//! | group       | meaning                  | `LLL`                          | extra bytes             |
//! |-------------|--------------------------|--------------------------------|-------------------------|
//! | `00000`     | zeroary                  | op: HLT NOP RET IRET CLI STI PUSHF POPF | none           |
//! | `00001`     | PUSH                     | word register index            | none                    |
//! | `00010`     | POP                      | word register index            | none                    |
//! | `00011`–`01010` | INC/DEC/NEG/NOT on a register, one group per op and size | register index | none |
//! | `01011`     | unary on `[BX]`          | `UUW` (op, size)               | none                    |
//! | `01100`     | unary on `[addr]`        | `UUW` (op, size)               | addr16                  |
//! | `10000`–`11000` | MOV ADD ADC SUB SBB AND OR XOR CMP | `WMM` (size, mode) | see below           |
//! | `11001`     | JMP JZ JNZ JC JNC JS JNS JO | condition                   | addr16                  |
//! | `11010`     | JNO (0), CALL (1)        | condition                      | addr16                  |
//! | `11011`     | INT                      | 0                              | vector byte             |
//! | `11100`     | IN/OUT                   | `DPW` (direction, port, size)  | port byte unless `P`=DX |
//!
//! Binary-operation modes (`MM`), with the mode byte following the opcode:
//!
//! | `MM` | form        | mode byte    | extra bytes                   |
//! |------|-------------|--------------|-------------------------------|
//! | `00` | reg ← reg   | `dddd ssss`  | none                          |
//! | `01` | reg ← mem   | `dddd 000M`  | addr16 if `M`=1 (direct)      |
//! | `10` | reg ← imm   | `dddd 0000`  | imm8/imm16 per `W`            |
//! | `11` | mem ← src   | `ssss 00TM`  | addr16 if `M`=1, then imm if `T`=1 (`ssss`=0) |
//!
//! Encoded lengths per class: zeroary/PUSH/POP 1; unary 1 (register, `[BX]`)
//! or 3 (direct); binary 2 to 6; jumps and CALL 3; INT 2; IN/OUT 1 (DX) or
//! 2 (fixed port).

use crate::ast::Reg;
use crate::value::{Size, Value};

/// A zero-operand instruction.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[allow(missing_docs)]
pub enum ZeroaryOp { Hlt, Nop, Ret, Iret, Cli, Sti, Pushf, Popf }

/// A unary read-modify-write operation.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[allow(missing_docs)]
pub enum UnaryOp { Inc, Dec, Neg, Not }

/// A two-operand operation.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[allow(missing_docs)]
pub enum BinaryOp { Mov, Add, Adc, Sub, Sbb, And, Or, Xor, Cmp }

/// A transfer-of-control operation.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[allow(missing_docs)]
pub enum JumpOp { Jmp, Jz, Jnz, Jc, Jnc, Js, Jns, Jo, Jno, Call }

/// The direction of an I/O instruction.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[allow(missing_docs)]
pub enum IoDir { In, Out }

/// A memory reference of a resolved instruction.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum MemRef {
    /// `[BX]`: address read from BX at run time.
    Bx,
    /// `[addr]`: fixed address.
    Direct(u16),
}

/// A writable operand location.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[allow(missing_docs)]
pub enum Loc {
    Reg(Reg),
    Mem(MemRef),
}

/// A readable source operand.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[allow(missing_docs)]
pub enum Src {
    Reg(Reg),
    Mem(MemRef),
    Imm(Value),
}

/// An I/O port selector.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Port {
    /// A fixed 8-bit port number.
    Fixed(u8),
    /// The port number is read from DX at run time.
    Dx,
}

/// A fully resolved machine instruction.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum MachInstr {
    /// HLT, NOP, RET, IRET, CLI, STI, PUSHF, POPF.
    Zeroary(ZeroaryOp),
    /// PUSH of a word register.
    Push(Reg),
    /// POP into a word register.
    Pop(Reg),
    /// INC, DEC, NEG, NOT.
    Unary {
        #[allow(missing_docs)]
        op: UnaryOp,
        #[allow(missing_docs)]
        size: Size,
        #[allow(missing_docs)]
        tgt: Loc,
    },
    /// MOV and the two-operand ALU instructions.
    Binary {
        #[allow(missing_docs)]
        op: BinaryOp,
        #[allow(missing_docs)]
        size: Size,
        #[allow(missing_docs)]
        dst: Loc,
        #[allow(missing_docs)]
        src: Src,
    },
    /// JMP, the conditional jumps, and CALL. The target is absolute.
    Jump {
        #[allow(missing_docs)]
        op: JumpOp,
        #[allow(missing_docs)]
        target: u16,
    },
    /// INT with its interrupt number.
    Int(u8),
    /// IN or OUT between the accumulator and a port.
    InOut {
        #[allow(missing_docs)]
        dir: IoDir,
        #[allow(missing_docs)]
        size: Size,
        #[allow(missing_docs)]
        port: Port,
    },
}

// Opcode groups.
const G_ZEROARY: u8 = 0x00;
const G_PUSH: u8 = 0x01;
const G_POP: u8 = 0x02;
const G_UNARY_REG: u8 = 0x03; // 0x03..=0x0A, one per (op, size)
const G_UNARY_BX: u8 = 0x0B;
const G_UNARY_DIR: u8 = 0x0C;
const G_BINARY: u8 = 0x10; // 0x10..=0x18, one per op
const G_JUMP_A: u8 = 0x19;
const G_JUMP_B: u8 = 0x1A;
const G_INT: u8 = 0x1B;
const G_INOUT: u8 = 0x1C;

fn first_byte(group: u8, low: u8) -> u8 {
    debug_assert!(group < 0x20 && low < 8);
    group << 3 | low
}

impl ZeroaryOp {
    fn code(self) -> u8 {
        match self {
            ZeroaryOp::Hlt => 0,
            ZeroaryOp::Nop => 1,
            ZeroaryOp::Ret => 2,
            ZeroaryOp::Iret => 3,
            ZeroaryOp::Cli => 4,
            ZeroaryOp::Sti => 5,
            ZeroaryOp::Pushf => 6,
            ZeroaryOp::Popf => 7,
        }
    }
    fn from_code(c: u8) -> Self {
        [
            ZeroaryOp::Hlt, ZeroaryOp::Nop, ZeroaryOp::Ret, ZeroaryOp::Iret,
            ZeroaryOp::Cli, ZeroaryOp::Sti, ZeroaryOp::Pushf, ZeroaryOp::Popf,
        ][usize::from(c)]
    }
}
impl UnaryOp {
    fn code(self) -> u8 {
        match self {
            UnaryOp::Inc => 0,
            UnaryOp::Dec => 1,
            UnaryOp::Neg => 2,
            UnaryOp::Not => 3,
        }
    }
    fn from_code(c: u8) -> Self {
        [UnaryOp::Inc, UnaryOp::Dec, UnaryOp::Neg, UnaryOp::Not][usize::from(c)]
    }
}
impl BinaryOp {
    fn code(self) -> u8 {
        match self {
            BinaryOp::Mov => 0,
            BinaryOp::Add => 1,
            BinaryOp::Adc => 2,
            BinaryOp::Sub => 3,
            BinaryOp::Sbb => 4,
            BinaryOp::And => 5,
            BinaryOp::Or => 6,
            BinaryOp::Xor => 7,
            BinaryOp::Cmp => 8,
        }
    }
    fn from_code(c: u8) -> Self {
        [
            BinaryOp::Mov, BinaryOp::Add, BinaryOp::Adc, BinaryOp::Sub, BinaryOp::Sbb,
            BinaryOp::And, BinaryOp::Or, BinaryOp::Xor, BinaryOp::Cmp,
        ][usize::from(c)]
    }
}
impl JumpOp {
    /// `(group, condition)` pair of this jump.
    fn code(self) -> (u8, u8) {
        match self {
            JumpOp::Jmp => (G_JUMP_A, 0),
            JumpOp::Jz => (G_JUMP_A, 1),
            JumpOp::Jnz => (G_JUMP_A, 2),
            JumpOp::Jc => (G_JUMP_A, 3),
            JumpOp::Jnc => (G_JUMP_A, 4),
            JumpOp::Js => (G_JUMP_A, 5),
            JumpOp::Jns => (G_JUMP_A, 6),
            JumpOp::Jo => (G_JUMP_A, 7),
            JumpOp::Jno => (G_JUMP_B, 0),
            JumpOp::Call => (G_JUMP_B, 1),
        }
    }
}

fn size_bit(size: Size) -> u8 {
    match size {
        Size::Byte => 0,
        Size::Word => 1,
    }
}
fn size_of_bit(b: u8) -> Size {
    match b & 1 {
        0 => Size::Byte,
        _ => Size::Word,
    }
}

impl MachInstr {
    /// Encodes this instruction, appending its bytes to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match *self {
            MachInstr::Zeroary(op) => out.push(first_byte(G_ZEROARY, op.code())),
            MachInstr::Push(r) => out.push(first_byte(G_PUSH, r.index())),
            MachInstr::Pop(r) => out.push(first_byte(G_POP, r.index())),
            MachInstr::Unary { op, size, tgt } => match tgt {
                Loc::Reg(r) => {
                    debug_assert_eq!(r.size(), size);
                    let group = G_UNARY_REG + op.code() * 2 + size_bit(size);
                    out.push(first_byte(group, r.index()));
                }
                Loc::Mem(MemRef::Bx) => {
                    out.push(first_byte(G_UNARY_BX, op.code() << 1 | size_bit(size)));
                }
                Loc::Mem(MemRef::Direct(addr)) => {
                    out.push(first_byte(G_UNARY_DIR, op.code() << 1 | size_bit(size)));
                    out.extend(addr.to_le_bytes());
                }
            },
            MachInstr::Binary { op, size, dst, src } => {
                let group = G_BINARY + op.code();
                let w = size_bit(size);
                let push_imm = |out: &mut Vec<u8>, v: Value| match size {
                    Size::Byte => out.push(v.unsigned() as u8),
                    Size::Word => out.extend(v.unsigned().to_le_bytes()),
                };

                match (dst, src) {
                    (Loc::Reg(d), Src::Reg(s)) => {
                        out.push(first_byte(group, w << 2));
                        out.push(d.index() << 4 | s.index());
                    }
                    (Loc::Reg(d), Src::Mem(m)) => {
                        out.push(first_byte(group, w << 2 | 0b01));
                        match m {
                            MemRef::Bx => out.push(d.index() << 4),
                            MemRef::Direct(addr) => {
                                out.push(d.index() << 4 | 1);
                                out.extend(addr.to_le_bytes());
                            }
                        }
                    }
                    (Loc::Reg(d), Src::Imm(v)) => {
                        out.push(first_byte(group, w << 2 | 0b10));
                        out.push(d.index() << 4);
                        push_imm(out, v);
                    }
                    (Loc::Mem(m), src) => {
                        out.push(first_byte(group, w << 2 | 0b11));
                        let (t, s) = match src {
                            Src::Reg(r) => (0, r.index()),
                            Src::Imm(_) => (1, 0),
                            Src::Mem(_) => unreachable!("memory-to-memory is rejected before encoding"),
                        };
                        let m_bit = matches!(m, MemRef::Direct(_)) as u8;
                        out.push(s << 4 | t << 1 | m_bit);
                        if let MemRef::Direct(addr) = m {
                            out.extend(addr.to_le_bytes());
                        }
                        if let Src::Imm(v) = src {
                            push_imm(out, v);
                        }
                    }
                }
            }
            MachInstr::Jump { op, target } => {
                let (group, cond) = op.code();
                out.push(first_byte(group, cond));
                out.extend(target.to_le_bytes());
            }
            MachInstr::Int(n) => {
                out.push(first_byte(G_INT, 0));
                out.push(n);
            }
            MachInstr::InOut { dir, size, port } => {
                let d = matches!(dir, IoDir::Out) as u8;
                let p = matches!(port, Port::Dx) as u8;
                out.push(first_byte(G_INOUT, d << 2 | p << 1 | size_bit(size)));
                if let Port::Fixed(n) = port {
                    out.push(n);
                }
            }
        }
    }

    /// The encoded byte length of this instruction.
    pub fn encoded_len(&self) -> u16 {
        let mut buf = Vec::with_capacity(6);
        self.encode(&mut buf);
        buf.len() as u16
    }
}

/// Error from decoding machine code.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DecodeErr {
    /// The first byte does not belong to any opcode group.
    IllegalOpcode(u8),
    /// The opcode group is recognized but the operand fields are invalid.
    InvalidFormat(u8),
}
impl std::fmt::Display for DecodeErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeErr::IllegalOpcode(b) => write!(f, "illegal opcode {b:02X}h"),
            DecodeErr::InvalidFormat(b) => write!(f, "invalid instruction format for opcode {b:02X}h"),
        }
    }
}
impl std::error::Error for DecodeErr {}
impl crate::err::Error for DecodeErr {
    fn code(&self) -> &'static str {
        "illegal-opcode"
    }
}

/// Incremental instruction decoder.
///
/// The simulator fetches one byte per memory access, so decoding is
/// incremental: feed the opcode byte to [`Decoder::new`], then while
/// [`Decoder::needs`] is nonzero fetch and [`Decoder::push`] further bytes,
/// and [`Decoder::decode`] at the end.
#[derive(Debug)]
pub struct Decoder {
    bytes: Vec<u8>,
}

impl Decoder {
    /// Starts decoding from the opcode byte.
    pub fn new(first: u8) -> Self {
        Self { bytes: vec![first] }
    }

    /// How many more bytes are known to be required.
    ///
    /// This can grow as bytes arrive (a binary instruction reveals its
    /// addressing fields in the second byte).
    pub fn needs(&self) -> Result<usize, DecodeErr> {
        Ok(self.expected_len()?.saturating_sub(self.bytes.len()))
    }

    /// Adds one fetched byte.
    pub fn push(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    fn expected_len(&self) -> Result<usize, DecodeErr> {
        let first = self.bytes[0];
        let (group, low) = (first >> 3, first & 0b111);

        let len = match group {
            G_ZEROARY | G_PUSH | G_POP | G_UNARY_BX => 1,
            g if (G_UNARY_REG..=0x0A).contains(&g) => 1,
            G_UNARY_DIR => 3,
            g if (G_BINARY..=0x18).contains(&g) => {
                let imm_len = match size_of_bit(low) {
                    Size::Byte => 1,
                    Size::Word => 2,
                };
                match low >> 1 {
                    0b00 => 2,
                    0b10 => 2 + imm_len,
                    // the mode byte decides the rest
                    _ if self.bytes.len() < 2 => 2,
                    0b01 => match self.bytes[1] & 1 {
                        0 => 2,
                        _ => 4,
                    },
                    _ => {
                        let mode = self.bytes[1];
                        2 + if mode & 1 != 0 { 2 } else { 0 }
                            + if mode & 0b10 != 0 { imm_len } else { 0 }
                    }
                }
            }
            G_JUMP_A | G_JUMP_B => 3,
            G_INT | G_INOUT => {
                if group == G_INOUT && low & 0b10 != 0 {
                    1 // port in DX
                } else {
                    2
                }
            }
            _ => return Err(DecodeErr::IllegalOpcode(first)),
        };
        Ok(len)
    }

    /// Decodes the collected bytes into a [`MachInstr`].
    pub fn decode(&self) -> Result<MachInstr, DecodeErr> {
        debug_assert_eq!(self.needs(), Ok(0), "decode requires a complete instruction");

        let first = self.bytes[0];
        let (group, low) = (first >> 3, first & 0b111);
        let invalid = DecodeErr::InvalidFormat(first);

        let word_reg = |i: u8| Reg::from_word_index(i).ok_or(invalid);
        let reg = |i: u8, size: Size| match size {
            Size::Byte => Reg::from_byte_index(i).ok_or(invalid),
            Size::Word => Reg::from_word_index(i).ok_or(invalid),
        };
        let le16 = |lo: u8, hi: u8| u16::from_le_bytes([lo, hi]);

        match group {
            G_ZEROARY => Ok(MachInstr::Zeroary(ZeroaryOp::from_code(low))),
            G_PUSH => Ok(MachInstr::Push(word_reg(low)?)),
            G_POP => Ok(MachInstr::Pop(word_reg(low)?)),
            g if (G_UNARY_REG..=0x0A).contains(&g) => {
                let idx = g - G_UNARY_REG;
                let op = UnaryOp::from_code(idx / 2);
                let size = size_of_bit(idx);
                Ok(MachInstr::Unary { op, size, tgt: Loc::Reg(reg(low, size)?) })
            }
            G_UNARY_BX => Ok(MachInstr::Unary {
                op: UnaryOp::from_code(low >> 1),
                size: size_of_bit(low),
                tgt: Loc::Mem(MemRef::Bx),
            }),
            G_UNARY_DIR => Ok(MachInstr::Unary {
                op: UnaryOp::from_code(low >> 1),
                size: size_of_bit(low),
                tgt: Loc::Mem(MemRef::Direct(le16(self.bytes[1], self.bytes[2]))),
            }),
            g if (G_BINARY..=0x18).contains(&g) => {
                let op = BinaryOp::from_code(g - G_BINARY);
                let size = size_of_bit(low);
                let mode = self.bytes[1];
                let imm = |bytes: &[u8]| match size {
                    Size::Byte => Value::byte(bytes[0]),
                    Size::Word => Value::word(le16(bytes[0], bytes[1])),
                };

                match low >> 1 {
                    0b00 => {
                        let dst = reg(mode >> 4, size)?;
                        let src = reg(mode & 0xF, size)?;
                        Ok(MachInstr::Binary { op, size, dst: Loc::Reg(dst), src: Src::Reg(src) })
                    }
                    0b01 => {
                        if mode & 0b1110 != 0 {
                            return Err(invalid);
                        }
                        let dst = reg(mode >> 4, size)?;
                        let mem = match mode & 1 {
                            0 => MemRef::Bx,
                            _ => MemRef::Direct(le16(self.bytes[2], self.bytes[3])),
                        };
                        Ok(MachInstr::Binary { op, size, dst: Loc::Reg(dst), src: Src::Mem(mem) })
                    }
                    0b10 => {
                        if mode & 0xF != 0 {
                            return Err(invalid);
                        }
                        let dst = reg(mode >> 4, size)?;
                        Ok(MachInstr::Binary {
                            op,
                            size,
                            dst: Loc::Reg(dst),
                            src: Src::Imm(imm(&self.bytes[2..])),
                        })
                    }
                    _ => {
                        if mode & 0b1100 != 0 {
                            return Err(invalid);
                        }
                        let (mem, rest) = match mode & 1 {
                            0 => (MemRef::Bx, &self.bytes[2..]),
                            _ => (MemRef::Direct(le16(self.bytes[2], self.bytes[3])), &self.bytes[4..]),
                        };
                        let src = match mode & 0b10 {
                            0 => Src::Reg(reg(mode >> 4, size)?),
                            _ => {
                                if mode >> 4 != 0 {
                                    return Err(invalid);
                                }
                                Src::Imm(imm(rest))
                            }
                        };
                        Ok(MachInstr::Binary { op, size, dst: Loc::Mem(mem), src })
                    }
                }
            }
            G_JUMP_A | G_JUMP_B => {
                let op = match (group, low) {
                    (G_JUMP_A, 0) => JumpOp::Jmp,
                    (G_JUMP_A, 1) => JumpOp::Jz,
                    (G_JUMP_A, 2) => JumpOp::Jnz,
                    (G_JUMP_A, 3) => JumpOp::Jc,
                    (G_JUMP_A, 4) => JumpOp::Jnc,
                    (G_JUMP_A, 5) => JumpOp::Js,
                    (G_JUMP_A, 6) => JumpOp::Jns,
                    (G_JUMP_A, 7) => JumpOp::Jo,
                    (G_JUMP_B, 0) => JumpOp::Jno,
                    (G_JUMP_B, 1) => JumpOp::Call,
                    _ => return Err(invalid),
                };
                Ok(MachInstr::Jump { op, target: le16(self.bytes[1], self.bytes[2]) })
            }
            G_INT => match low {
                0 => Ok(MachInstr::Int(self.bytes[1])),
                _ => Err(invalid),
            },
            G_INOUT => {
                let dir = match low & 0b100 {
                    0 => IoDir::In,
                    _ => IoDir::Out,
                };
                let size = size_of_bit(low);
                let port = match low & 0b10 {
                    0 => Port::Fixed(self.bytes[1]),
                    _ => Port::Dx,
                };
                Ok(MachInstr::InOut { dir, size, port })
            }
            _ => Err(DecodeErr::IllegalOpcode(first)),
        }
    }
}

/// Decodes one instruction from the start of a byte slice.
///
/// Mostly useful for tests and disassembly; the simulator drives a
/// [`Decoder`] directly so each fetch is observable.
pub fn decode_one(bytes: &[u8]) -> Result<(MachInstr, usize), DecodeErr> {
    let (&first, mut rest) = bytes.split_first().ok_or(DecodeErr::IllegalOpcode(0))?;
    let mut dec = Decoder::new(first);
    while dec.needs()? > 0 {
        let (&b, r) = rest.split_first().ok_or(DecodeErr::InvalidFormat(first))?;
        dec.push(b);
        rest = r;
    }
    Ok((dec.decode()?, dec.bytes.len()))
}

fn fmt_addr(f: &mut std::fmt::Formatter<'_>, addr: u16) -> std::fmt::Result {
    // leading zero keeps the literal lexable when the first digit is A-F
    write!(f, "0{addr:04X}h")
}
fn fmt_mem(f: &mut std::fmt::Formatter<'_>, size: Size, mem: MemRef) -> std::fmt::Result {
    let prefix = match size {
        Size::Byte => "BYTE PTR ",
        Size::Word => "WORD PTR ",
    };
    match mem {
        MemRef::Bx => write!(f, "{prefix}[BX]"),
        MemRef::Direct(addr) => {
            write!(f, "{prefix}[")?;
            fmt_addr(f, addr)?;
            write!(f, "]")
        }
    }
}

impl std::fmt::Display for MachInstr {
    /// Renders the instruction as (re-assemblable) source text.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            MachInstr::Zeroary(op) => {
                let name = match op {
                    ZeroaryOp::Hlt => "HLT",
                    ZeroaryOp::Nop => "NOP",
                    ZeroaryOp::Ret => "RET",
                    ZeroaryOp::Iret => "IRET",
                    ZeroaryOp::Cli => "CLI",
                    ZeroaryOp::Sti => "STI",
                    ZeroaryOp::Pushf => "PUSHF",
                    ZeroaryOp::Popf => "POPF",
                };
                f.write_str(name)
            }
            MachInstr::Push(r) => write!(f, "PUSH {r}"),
            MachInstr::Pop(r) => write!(f, "POP {r}"),
            MachInstr::Unary { op, size, tgt } => {
                let name = match op {
                    UnaryOp::Inc => "INC",
                    UnaryOp::Dec => "DEC",
                    UnaryOp::Neg => "NEG",
                    UnaryOp::Not => "NOT",
                };
                write!(f, "{name} ")?;
                match tgt {
                    Loc::Reg(r) => write!(f, "{r}"),
                    Loc::Mem(m) => fmt_mem(f, size, m),
                }
            }
            MachInstr::Binary { op, size, dst, src } => {
                let name = match op {
                    BinaryOp::Mov => "MOV",
                    BinaryOp::Add => "ADD",
                    BinaryOp::Adc => "ADC",
                    BinaryOp::Sub => "SUB",
                    BinaryOp::Sbb => "SBB",
                    BinaryOp::And => "AND",
                    BinaryOp::Or => "OR",
                    BinaryOp::Xor => "XOR",
                    BinaryOp::Cmp => "CMP",
                };
                write!(f, "{name} ")?;
                match dst {
                    Loc::Reg(r) => write!(f, "{r}")?,
                    Loc::Mem(m) => fmt_mem(f, size, m)?,
                }
                write!(f, ", ")?;
                match src {
                    Src::Reg(r) => write!(f, "{r}"),
                    Src::Mem(m) => fmt_mem(f, size, m),
                    Src::Imm(v) => fmt_addr(f, v.unsigned()),
                }
            }
            MachInstr::Jump { op, target } => {
                let name = match op {
                    JumpOp::Jmp => "JMP",
                    JumpOp::Jz => "JZ",
                    JumpOp::Jnz => "JNZ",
                    JumpOp::Jc => "JC",
                    JumpOp::Jnc => "JNC",
                    JumpOp::Js => "JS",
                    JumpOp::Jns => "JNS",
                    JumpOp::Jo => "JO",
                    JumpOp::Jno => "JNO",
                    JumpOp::Call => "CALL",
                };
                write!(f, "{name} ")?;
                fmt_addr(f, target)
            }
            MachInstr::Int(n) => write!(f, "INT {n}"),
            MachInstr::InOut { dir, size, port } => {
                let acc = match size {
                    Size::Byte => "AL",
                    Size::Word => "AX",
                };
                match (dir, port) {
                    (IoDir::In, Port::Dx) => write!(f, "IN {acc}, DX"),
                    (IoDir::In, Port::Fixed(n)) => {
                        write!(f, "IN {acc}, ")?;
                        write!(f, "0{n:02X}h")
                    }
                    (IoDir::Out, Port::Dx) => write!(f, "OUT DX, {acc}"),
                    (IoDir::Out, Port::Fixed(n)) => {
                        write!(f, "OUT 0{n:02X}h, {acc}")
                    }
                }
            }
        }
    }
}
