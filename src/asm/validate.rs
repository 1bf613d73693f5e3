//! Semantic validation of parsed statements.
//!
//! [`check`] turns the parser's output into typed, length-annotated items
//! the assembler can lay out:
//! - every instruction is classified per mnemonic class ([`InstrKind`])
//!   with its operand combination and operand size checked,
//! - data directives are checked and measured,
//! - `EQU` definitions are split out for the resolver.
//!
//! Validation knows each label's kind (byte data, word data, instruction,
//! constant), which is what disambiguates a bare identifier operand: a data
//! label is a direct memory operand, an `EQU` label is an immediate.

use std::collections::HashMap;
use std::ops::Range;

use crate::ast::{
    DataKind, DataValue, Expr, Label, MemMode, Mnemonic, Operand, OperandKind, Reg, Stmt, StmtKind,
};
use crate::err::ErrSpan;
use crate::value::Size;

use super::encoding::{BinaryOp, IoDir, JumpOp, UnaryOp, ZeroaryOp};

/// What a defined label names.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LabelKind {
    /// A `DB` data directive.
    Db,
    /// A `DW` data directive.
    Dw,
    /// An instruction.
    Instr,
    /// An `EQU` constant.
    Equ,
}

/// Kinds of errors that can occur from validating statements.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ValidateErrKind {
    /// An instruction got the wrong number of operands.
    OperandCount {
        #[allow(missing_docs)]
        mnemonic: Mnemonic,
        #[allow(missing_docs)]
        expected: usize,
        #[allow(missing_docs)]
        found: usize,
    },
    /// Operand sizes disagree.
    SizeMismatch,
    /// Both operands address memory.
    DoubleMemoryAccess,
    /// The operand must be an immediate value.
    ExpectsImmediate,
    /// A memory operand has no discernible size.
    UnknownSize,
    /// The destination must be a writable location.
    LabelNotWritable(String),
    /// An instruction label was used where a value is needed.
    LabelNotNumber(String),
    /// The destination cannot be an immediate value.
    DestImmediate,
    /// The operand must be an instruction label.
    ExpectsLabel,
    /// PUSH and POP take a 16-bit general register.
    ExpectsWordReg,
    /// IN and OUT move data through AL or AX.
    ExpectsAccumulator,
    /// This register cannot be an instruction operand.
    InvalidRegister(Reg),
    /// The referenced label is not defined anywhere.
    LabelNotFound(String),
    /// A string literal appeared outside a `DB` directive.
    StringOutsideDb,
    /// A constant operand does not fit its range.
    OutOfRange(i64),
}

/// Error from validating statements.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ValidateErr {
    /// The kind of error.
    pub kind: ValidateErrKind,
    /// The span in the source associated with this error.
    pub span: ErrSpan,
}
impl ValidateErr {
    fn new(kind: ValidateErrKind, span: impl Into<ErrSpan>) -> Self {
        Self { kind, span: span.into() }
    }
}
impl std::fmt::Display for ValidateErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ValidateErrKind::OperandCount { mnemonic, expected, found } => {
                write!(f, "{mnemonic} expects {expected} operand(s), found {found}")
            }
            ValidateErrKind::SizeMismatch => f.write_str("operand sizes do not match"),
            ValidateErrKind::DoubleMemoryAccess => f.write_str("only one operand may access memory"),
            ValidateErrKind::ExpectsImmediate => f.write_str("operand must be an immediate value"),
            ValidateErrKind::UnknownSize => f.write_str("cannot tell the size of this memory access"),
            ValidateErrKind::LabelNotWritable(l) => write!(f, "label {l} is not a writable location"),
            ValidateErrKind::LabelNotNumber(l) => write!(f, "label {l} is not a number"),
            ValidateErrKind::DestImmediate => f.write_str("destination cannot be an immediate value"),
            ValidateErrKind::ExpectsLabel => f.write_str("operand must be an instruction label"),
            ValidateErrKind::ExpectsWordReg => f.write_str("operand must be a 16-bit register"),
            ValidateErrKind::ExpectsAccumulator => f.write_str("operand must be AL or AX"),
            ValidateErrKind::InvalidRegister(r) => write!(f, "{r} cannot be used as an operand"),
            ValidateErrKind::LabelNotFound(l) => write!(f, "label {l} not found"),
            ValidateErrKind::StringOutsideDb => f.write_str("strings are only allowed in DB"),
            ValidateErrKind::OutOfRange(v) => write!(f, "value {v} is out of range"),
        }
    }
}
impl std::error::Error for ValidateErr {}
impl crate::err::Error for ValidateErr {
    fn code(&self) -> &'static str {
        match &self.kind {
            ValidateErrKind::OperandCount { .. } => "invalid-operand-count",
            ValidateErrKind::SizeMismatch => "size-mismatch",
            ValidateErrKind::DoubleMemoryAccess => "double-memory-access",
            ValidateErrKind::ExpectsImmediate => "expects-immediate",
            ValidateErrKind::UnknownSize => "unknown-size",
            ValidateErrKind::LabelNotWritable(_) => "label-should-be-writable",
            ValidateErrKind::LabelNotNumber(_) => "label-should-be-a-number",
            ValidateErrKind::DestImmediate => "destination-cannot-be-immediate",
            ValidateErrKind::ExpectsLabel => "expects-label",
            ValidateErrKind::ExpectsWordReg => "expects-word-register",
            ValidateErrKind::ExpectsAccumulator => "expects-accumulator",
            ValidateErrKind::InvalidRegister(_) => "invalid-register",
            ValidateErrKind::LabelNotFound(_) => "label-not-found",
            ValidateErrKind::StringOutsideDb => "expects-number",
            ValidateErrKind::OutOfRange(_) => "value-out-of-range",
        }
    }

    fn span(&self) -> Option<ErrSpan> {
        Some(self.span.clone())
    }

    fn help(&self) -> Option<std::borrow::Cow<'_, str>> {
        match &self.kind {
            ValidateErrKind::DoubleMemoryAccess => {
                Some("move one of the operands through a register first".into())
            }
            ValidateErrKind::UnknownSize => {
                Some("qualify the access with BYTE PTR or WORD PTR".into())
            }
            ValidateErrKind::LabelNotNumber(_) => {
                Some("use OFFSET to refer to the address of a label".into())
            }
            _ => None,
        }
    }
}

/// A memory operand after validation; the address is still an expression.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum MemTarget {
    /// `[BX]`.
    Bx,
    /// `[expr]`, or a bare data label (which stands for `[OFFSET label]`).
    Direct(Expr),
}

/// A validated writable operand.
#[derive(Debug, PartialEq, Eq, Clone)]
#[allow(missing_docs)]
pub enum Target {
    Reg(Reg),
    Mem(MemTarget),
}

/// A validated source operand.
#[derive(Debug, PartialEq, Eq, Clone)]
#[allow(missing_docs)]
pub enum Source {
    Reg(Reg),
    Mem(MemTarget),
    Imm(Expr),
}

/// A validated I/O port selector.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PortSel {
    /// A fixed port number (checked to 0..=255 at resolution).
    Fixed(Expr),
    /// The port number is taken from DX.
    Dx,
}

/// A validated instruction, classified by mnemonic class.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum InstrKind {
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
        tgt: Target,
    },
    /// MOV and the two-operand ALU instructions.
    Binary {
        #[allow(missing_docs)]
        op: BinaryOp,
        #[allow(missing_docs)]
        size: Size,
        #[allow(missing_docs)]
        dst: Target,
        #[allow(missing_docs)]
        src: Source,
    },
    /// JMP, the conditional jumps, and CALL.
    Jump {
        #[allow(missing_docs)]
        op: JumpOp,
        /// The target instruction label.
        target: Label,
    },
    /// INT with its interrupt number expression.
    Int(Expr),
    /// IN or OUT.
    InOut {
        #[allow(missing_docs)]
        dir: IoDir,
        #[allow(missing_docs)]
        size: Size,
        #[allow(missing_docs)]
        port: PortSel,
    },
}

/// Location and identity of one validated instruction.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct InstrMeta {
    /// The label attached to the instruction, if any.
    pub label: Option<String>,
    /// The instruction's start address, assigned by the assembler's first
    /// pass.
    pub start: u16,
    /// The encoded length in bytes.
    pub len: u16,
    /// The span of the statement in source code.
    pub span: Range<usize>,
}

/// A validated instruction with its metadata.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Instruction {
    #[allow(missing_docs)]
    pub meta: InstrMeta,
    #[allow(missing_docs)]
    pub kind: InstrKind,
}

/// A validated data directive with its measured length.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DataItem {
    /// The label attached to the directive, if any.
    pub label: Option<String>,
    #[allow(missing_docs)]
    pub kind: DataKind,
    #[allow(missing_docs)]
    pub values: Vec<DataValue>,
    /// Total byte length of the directive.
    pub len: u16,
    /// The directive's start address, assigned by the assembler's first
    /// pass.
    pub start: u16,
    #[allow(missing_docs)]
    pub span: Range<usize>,
}

/// An `EQU` definition awaiting resolution.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct EquDef {
    #[allow(missing_docs)]
    pub label: Label,
    #[allow(missing_docs)]
    pub expr: Expr,
    #[allow(missing_docs)]
    pub span: Range<usize>,
}

/// One layout-relevant item, in source order.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Item {
    /// An `ORG` directive.
    Org {
        #[allow(missing_docs)]
        addr: u16,
        #[allow(missing_docs)]
        span: Range<usize>,
    },
    /// A data directive.
    Data(DataItem),
    /// An instruction.
    Instr(Instruction),
}

/// The validator's output: layout items, pending `EQU`s, and the label-kind
/// table.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Checked {
    #[allow(missing_docs)]
    pub items: Vec<Item>,
    #[allow(missing_docs)]
    pub equs: Vec<EquDef>,
    #[allow(missing_docs)]
    pub label_kinds: HashMap<String, LabelKind>,
}

/// Validates a parsed program.
///
/// Errors are accumulated: a bad statement is reported and skipped so that
/// every problem surfaces in one pass.
pub fn check(stmts: Vec<Stmt>) -> Result<Checked, Vec<ValidateErr>> {
    // label kinds first, so forward references classify correctly
    let mut label_kinds = HashMap::new();
    for stmt in &stmts {
        let Some(label) = &stmt.label else { continue };
        let kind = match &stmt.kind {
            StmtKind::Data { kind: DataKind::Db, .. } => LabelKind::Db,
            StmtKind::Data { kind: DataKind::Dw, .. } => LabelKind::Dw,
            StmtKind::Equ(_) => LabelKind::Equ,
            StmtKind::Instr { .. } => LabelKind::Instr,
            _ => continue,
        };
        label_kinds.insert(label.name.clone(), kind);
    }

    let mut items = vec![];
    let mut equs = vec![];
    let mut errs = vec![];

    for stmt in stmts {
        let Stmt { label, kind, span } = stmt;
        match kind {
            StmtKind::Org(addr) => items.push(Item::Org { addr, span }),
            StmtKind::End => {}
            StmtKind::Equ(expr) => {
                let label = label.expect("parser attaches a label to every EQU");
                equs.push(EquDef { label, expr, span });
            }
            StmtKind::Data { kind, values } => {
                match check_data(kind, &values, &span) {
                    Ok(len) => items.push(Item::Data(DataItem {
                        label: label.map(|l| l.name),
                        kind,
                        values,
                        len,
                        start: 0,
                        span,
                    })),
                    Err(e) => errs.push(e),
                }
            }
            StmtKind::Instr { mnemonic, operands } => {
                match check_instr(mnemonic, operands, &span, &label_kinds) {
                    Ok((kind, len)) => items.push(Item::Instr(Instruction {
                        meta: InstrMeta { label: label.map(|l| l.name), start: 0, len, span },
                        kind,
                    })),
                    Err(e) => errs.push(e),
                }
            }
        }
    }

    match errs.is_empty() {
        true => Ok(Checked { items, equs, label_kinds }),
        false => Err(errs),
    }
}

fn check_data(kind: DataKind, values: &[DataValue], span: &Range<usize>) -> Result<u16, ValidateErr> {
    let mut len = 0u16;
    for value in values {
        len = len.wrapping_add(match (kind, value) {
            (DataKind::Db, DataValue::Str(s)) => s.len() as u16,
            (DataKind::Dw, DataValue::Str(_)) => {
                return Err(ValidateErr::new(ValidateErrKind::StringOutsideDb, span.clone()))
            }
            (_, DataValue::Uninit | DataValue::Expr(_)) => kind.size().bytes(),
        });
    }
    Ok(len)
}

/// An operand lifted to its semantic class.
enum AbstractOp {
    Reg(Reg),
    Mem { mem: MemTarget, size: Option<Size> },
    Imm(Expr),
    InstrLabel(Label),
}

fn classify(
    operand: Operand,
    kinds: &HashMap<String, LabelKind>,
) -> Result<AbstractOp, ValidateErr> {
    let span = operand.span;
    match operand.kind {
        OperandKind::Reg(r) if !r.is_operand() => {
            Err(ValidateErr::new(ValidateErrKind::InvalidRegister(r), span))
        }
        OperandKind::Reg(r) => Ok(AbstractOp::Reg(r)),
        OperandKind::Mem { mode, size } => {
            let mem = match mode {
                MemMode::IndirectBx => MemTarget::Bx,
                MemMode::Direct(e) => MemTarget::Direct(e),
            };
            Ok(AbstractOp::Mem { mem, size })
        }
        OperandKind::Expr(e) => {
            let Some(label) = e.as_single_label().cloned() else {
                return Ok(AbstractOp::Imm(e));
            };
            match kinds.get(&label.name) {
                // a bare data label stands for [OFFSET label]
                Some(LabelKind::Db) => Ok(AbstractOp::Mem {
                    mem: MemTarget::Direct(addr_of(&label)),
                    size: Some(Size::Byte),
                }),
                Some(LabelKind::Dw) => Ok(AbstractOp::Mem {
                    mem: MemTarget::Direct(addr_of(&label)),
                    size: Some(Size::Word),
                }),
                Some(LabelKind::Instr) => Ok(AbstractOp::InstrLabel(label)),
                Some(LabelKind::Equ) => Ok(AbstractOp::Imm(e)),
                None => Err(ValidateErr::new(
                    ValidateErrKind::LabelNotFound(label.name.clone()),
                    label.span(),
                )),
            }
        }
    }
}

fn addr_of(label: &Label) -> Expr {
    Expr::LabelRef { label: label.clone(), offset: true }
}

fn check_instr(
    mnemonic: Mnemonic,
    operands: Vec<Operand>,
    span: &Range<usize>,
    kinds: &HashMap<String, LabelKind>,
) -> Result<(InstrKind, u16), ValidateErr> {
    use Mnemonic as M;

    let arity = match mnemonic {
        M::Hlt | M::Nop | M::Ret | M::Iret | M::Cli | M::Sti | M::Pushf | M::Popf => 0,
        M::Push | M::Pop | M::Inc | M::Dec | M::Neg | M::Not | M::Int => 1,
        M::Jmp | M::Jc | M::Jnc | M::Jz | M::Jnz | M::Js | M::Jns | M::Jo | M::Jno | M::Call => 1,
        _ => 2,
    };
    if operands.len() != arity {
        return Err(ValidateErr::new(
            ValidateErrKind::OperandCount { mnemonic, expected: arity, found: operands.len() },
            span.clone(),
        ));
    }
    let mut operands = operands.into_iter();
    let mut next = || operands.next().expect("arity was checked");

    let kind = match mnemonic {
        M::Hlt => InstrKind::Zeroary(ZeroaryOp::Hlt),
        M::Nop => InstrKind::Zeroary(ZeroaryOp::Nop),
        M::Ret => InstrKind::Zeroary(ZeroaryOp::Ret),
        M::Iret => InstrKind::Zeroary(ZeroaryOp::Iret),
        M::Cli => InstrKind::Zeroary(ZeroaryOp::Cli),
        M::Sti => InstrKind::Zeroary(ZeroaryOp::Sti),
        M::Pushf => InstrKind::Zeroary(ZeroaryOp::Pushf),
        M::Popf => InstrKind::Zeroary(ZeroaryOp::Popf),

        M::Push | M::Pop => {
            let operand = next();
            let op_span = operand.span.clone();
            match classify(operand, kinds)? {
                AbstractOp::Reg(r) if r.is_stackable() => match mnemonic {
                    M::Push => InstrKind::Push(r),
                    _ => InstrKind::Pop(r),
                },
                _ => return Err(ValidateErr::new(ValidateErrKind::ExpectsWordReg, op_span)),
            }
        }

        M::Inc | M::Dec | M::Neg | M::Not => {
            let op = match mnemonic {
                M::Inc => UnaryOp::Inc,
                M::Dec => UnaryOp::Dec,
                M::Neg => UnaryOp::Neg,
                _ => UnaryOp::Not,
            };
            let operand = next();
            let op_span = operand.span.clone();
            let (size, tgt) = match classify(operand, kinds)? {
                AbstractOp::Reg(r) => (r.size(), Target::Reg(r)),
                AbstractOp::Mem { mem, size: Some(size) } => (size, Target::Mem(mem)),
                AbstractOp::Mem { size: None, .. } => {
                    return Err(ValidateErr::new(ValidateErrKind::UnknownSize, op_span))
                }
                AbstractOp::InstrLabel(l) => {
                    return Err(ValidateErr::new(ValidateErrKind::LabelNotWritable(l.name), op_span))
                }
                AbstractOp::Imm(_) => {
                    return Err(ValidateErr::new(ValidateErrKind::DestImmediate, op_span))
                }
            };
            InstrKind::Unary { op, size, tgt }
        }

        M::Mov | M::Add | M::Adc | M::Sub | M::Sbb | M::And | M::Or | M::Xor | M::Cmp => {
            let op = match mnemonic {
                M::Mov => BinaryOp::Mov,
                M::Add => BinaryOp::Add,
                M::Adc => BinaryOp::Adc,
                M::Sub => BinaryOp::Sub,
                M::Sbb => BinaryOp::Sbb,
                M::And => BinaryOp::And,
                M::Or => BinaryOp::Or,
                M::Xor => BinaryOp::Xor,
                _ => BinaryOp::Cmp,
            };
            let dst_operand = next();
            let src_operand = next();
            let dst_span = dst_operand.span.clone();
            let src_span = src_operand.span.clone();
            let whole = dst_span.start..src_span.end;

            let dst = match classify(dst_operand, kinds)? {
                AbstractOp::Reg(r) => (Target::Reg(r), None),
                AbstractOp::Mem { mem, size } => (Target::Mem(mem), size),
                AbstractOp::InstrLabel(l) => {
                    return Err(ValidateErr::new(ValidateErrKind::LabelNotWritable(l.name), dst_span))
                }
                AbstractOp::Imm(_) => {
                    return Err(ValidateErr::new(ValidateErrKind::DestImmediate, dst_span))
                }
            };
            let src = match classify(src_operand, kinds)? {
                AbstractOp::Reg(r) => (Source::Reg(r), None),
                AbstractOp::Mem { mem, size } => (Source::Mem(mem), size),
                AbstractOp::Imm(e) => (Source::Imm(e), None),
                AbstractOp::InstrLabel(l) => {
                    return Err(ValidateErr::new(ValidateErrKind::LabelNotNumber(l.name), src_span))
                }
            };

            let size = binary_size(&dst, &src, &whole)?;
            InstrKind::Binary { op, size, dst: dst.0, src: src.0 }
        }

        M::Jmp | M::Jc | M::Jnc | M::Jz | M::Jnz | M::Js | M::Jns | M::Jo | M::Jno | M::Call => {
            let op = match mnemonic {
                M::Jmp => JumpOp::Jmp,
                M::Jc => JumpOp::Jc,
                M::Jnc => JumpOp::Jnc,
                M::Jz => JumpOp::Jz,
                M::Jnz => JumpOp::Jnz,
                M::Js => JumpOp::Js,
                M::Jns => JumpOp::Jns,
                M::Jo => JumpOp::Jo,
                M::Jno => JumpOp::Jno,
                _ => JumpOp::Call,
            };
            let operand = next();
            let op_span = operand.span.clone();
            match classify(operand, kinds)? {
                AbstractOp::InstrLabel(target) => InstrKind::Jump { op, target },
                _ => return Err(ValidateErr::new(ValidateErrKind::ExpectsLabel, op_span)),
            }
        }

        M::Int => {
            let operand = next();
            let op_span = operand.span.clone();
            match classify(operand, kinds)? {
                AbstractOp::Imm(e) => {
                    check_const_range(&e, 0..=255, &op_span)?;
                    InstrKind::Int(e)
                }
                _ => return Err(ValidateErr::new(ValidateErrKind::ExpectsImmediate, op_span)),
            }
        }

        M::In | M::Out => {
            let first = next();
            let second = next();
            let (acc_operand, port_operand, dir) = match mnemonic {
                M::In => (first, second, IoDir::In),
                _ => (second, first, IoDir::Out),
            };

            let acc_span = acc_operand.span.clone();
            let size = match classify(acc_operand, kinds)? {
                AbstractOp::Reg(Reg::AL) => Size::Byte,
                AbstractOp::Reg(Reg::AX) => Size::Word,
                _ => return Err(ValidateErr::new(ValidateErrKind::ExpectsAccumulator, acc_span)),
            };

            let port_span = port_operand.span.clone();
            let port = match classify(port_operand, kinds)? {
                AbstractOp::Reg(Reg::DX) => PortSel::Dx,
                AbstractOp::Imm(e) => {
                    check_const_range(&e, 0..=255, &port_span)?;
                    PortSel::Fixed(e)
                }
                _ => return Err(ValidateErr::new(ValidateErrKind::ExpectsImmediate, port_span)),
            };
            InstrKind::InOut { dir, size, port }
        }
    };

    let len = instr_len(&kind);
    Ok((kind, len))
}

/// Rejects label-free constant expressions that already sit outside their
/// range, so the error points at the source instead of surfacing during
/// resolution.
fn check_const_range(
    e: &Expr,
    range: std::ops::RangeInclusive<i64>,
    span: &Range<usize>,
) -> Result<(), ValidateErr> {
    if let Some(v) = e.const_eval() {
        if !range.contains(&v) {
            return Err(ValidateErr::new(ValidateErrKind::OutOfRange(v), span.clone()));
        }
    }
    Ok(())
}

/// Infers the operand size of a binary instruction and rejects illegal
/// combinations.
fn binary_size(
    dst: &(Target, Option<Size>),
    src: &(Source, Option<Size>),
    span: &Range<usize>,
) -> Result<Size, ValidateErr> {
    let err = |kind| Err(ValidateErr::new(kind, span.clone()));

    match (&dst.0, &src.0) {
        (Target::Mem(_), Source::Mem(_)) => err(ValidateErrKind::DoubleMemoryAccess),
        (Target::Reg(d), Source::Reg(s)) => match d.size() == s.size() {
            true => Ok(d.size()),
            false => err(ValidateErrKind::SizeMismatch),
        },
        (Target::Reg(d), Source::Mem(_)) => match src.1 {
            Some(s) if s != d.size() => err(ValidateErrKind::SizeMismatch),
            _ => Ok(d.size()),
        },
        (Target::Reg(d), Source::Imm(_)) => Ok(d.size()),
        (Target::Mem(_), Source::Reg(s)) => match dst.1 {
            Some(d) if d != s.size() => err(ValidateErrKind::SizeMismatch),
            _ => Ok(s.size()),
        },
        (Target::Mem(_), Source::Imm(_)) => match dst.1 {
            Some(d) => Ok(d),
            None => err(ValidateErrKind::UnknownSize),
        },
    }
}

/// The encoded byte length of a validated instruction.
///
/// This mirrors the encoding exactly; the assembler's first pass depends
/// on it before any expression is resolved.
fn instr_len(kind: &InstrKind) -> u16 {
    match kind {
        InstrKind::Zeroary(_) | InstrKind::Push(_) | InstrKind::Pop(_) => 1,
        InstrKind::Unary { tgt, .. } => match tgt {
            Target::Reg(_) | Target::Mem(MemTarget::Bx) => 1,
            Target::Mem(MemTarget::Direct(_)) => 3,
        },
        InstrKind::Binary { size, dst, src, .. } => {
            let mut len = 2;
            if let Target::Mem(MemTarget::Direct(_)) = dst {
                len += 2;
            }
            match src {
                Source::Mem(MemTarget::Direct(_)) => len += 2,
                Source::Imm(_) => len += size.bytes(),
                _ => {}
            }
            len
        }
        InstrKind::Jump { .. } => 3,
        InstrKind::Int(_) => 2,
        InstrKind::InOut { port, .. } => match port {
            PortSel::Fixed(_) => 2,
            PortSel::Dx => 1,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn check_src(src: &str) -> Result<Checked, Vec<ValidateErr>> {
        check(parse(src).unwrap())
    }
    fn first_err_code(src: &str) -> &'static str {
        use crate::err::Error;
        let errs = check_src(src).unwrap_err();
        errs[0].code()
    }

    fn instr_lens(src: &str) -> Vec<u16> {
        check_src(src)
            .unwrap()
            .items
            .iter()
            .filter_map(|i| match i {
                Item::Instr(instr) => Some(instr.meta.len),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_operand_counts() {
        assert_eq!(first_err_code("ORG 2000h\nHLT AX\nEND"), "invalid-operand-count");
        assert_eq!(first_err_code("ORG 2000h\nMOV AX\nEND"), "invalid-operand-count");
        assert_eq!(first_err_code("ORG 2000h\nINC\nEND"), "invalid-operand-count");
    }

    #[test]
    fn test_size_rules() {
        assert_eq!(first_err_code("ORG 2000h\nMOV AL, BX\nEND"), "size-mismatch");
        assert_eq!(first_err_code("ORG 2000h\nMOV WORD PTR [10h], AL\nEND"), "size-mismatch");
        assert_eq!(first_err_code("ORG 2000h\nMOV [10h], 5\nEND"), "unknown-size");
        assert_eq!(first_err_code("ORG 2000h\nMOV [BX], 5\nEND"), "unknown-size");
        // a data label carries its own size
        assert_eq!(first_err_code("ORG 1000h\nW DW 0\nORG 2000h\nMOV AL, W\nEND"), "size-mismatch");
        assert!(check_src("ORG 1000h\nW DW 0\nORG 2000h\nMOV AX, W\nEND").is_ok());
    }

    #[test]
    fn test_memory_rules() {
        assert_eq!(first_err_code("ORG 2000h\nMOV [BX], [10h]\nEND"), "double-memory-access");
        assert_eq!(
            first_err_code("ORG 1000h\nA DB 0\nB DB 0\nORG 2000h\nMOV A, B\nEND"),
            "double-memory-access"
        );
    }

    #[test]
    fn test_immediate_rules() {
        assert_eq!(first_err_code("ORG 2000h\nMOV 5, AL\nEND"), "destination-cannot-be-immediate");
        assert_eq!(first_err_code("ORG 2000h\nINC 5\nEND"), "destination-cannot-be-immediate");
        assert_eq!(first_err_code("ORG 2000h\nINT [10h]\nEND"), "expects-immediate");
        // INT range is checked as soon as the value is known
        assert!(check_src("ORG 2000h\nINT 255\nHLT\nEND").is_ok());
        assert_eq!(first_err_code("ORG 2000h\nINT 256\nEND"), "value-out-of-range");
    }

    #[test]
    fn test_label_kinds() {
        assert_eq!(
            first_err_code("ORG 2000h\nETIQ: NOP\nMOV ETIQ, AL\nHLT\nEND"),
            "label-should-be-writable"
        );
        assert_eq!(
            first_err_code("ORG 2000h\nETIQ: NOP\nMOV AL, ETIQ\nHLT\nEND"),
            "label-should-be-a-number"
        );
        assert_eq!(first_err_code("ORG 2000h\nMOV AL, NADA\nEND"), "label-not-found");
        // an EQU label is an immediate
        assert!(check_src("N EQU 9\nORG 2000h\nMOV AL, N\nHLT\nEND").is_ok());
    }

    #[test]
    fn test_jump_rules() {
        assert_eq!(first_err_code("ORG 1000h\nX DB 0\nORG 2000h\nJMP X\nEND"), "expects-label");
        assert_eq!(first_err_code("ORG 2000h\nJMP 2000h\nEND"), "expects-label");
        assert!(check_src("ORG 2000h\nBUCLE: JMP BUCLE\nEND").is_ok());
    }

    #[test]
    fn test_stack_rules() {
        assert_eq!(first_err_code("ORG 2000h\nPUSH AL\nEND"), "expects-word-register");
        assert_eq!(first_err_code("ORG 2000h\nPOP [10h]\nEND"), "expects-word-register");
        assert!(check_src("ORG 2000h\nPUSH SP\nHLT\nEND").is_ok());
    }

    #[test]
    fn test_io_rules() {
        assert_eq!(first_err_code("ORG 2000h\nIN BL, 30h\nEND"), "expects-accumulator");
        assert_eq!(first_err_code("ORG 2000h\nIN AL, BX\nEND"), "expects-immediate");
        assert_eq!(first_err_code("ORG 2000h\nOUT 300h, AL\nEND"), "value-out-of-range");
        assert!(check_src("ORG 2000h\nIN AX, DX\nOUT DX, AL\nHLT\nEND").is_ok());
    }

    #[test]
    fn test_register_rules() {
        assert_eq!(first_err_code("ORG 2000h\nMOV IP, AX\nEND"), "invalid-register");
        assert_eq!(first_err_code("ORG 2000h\nPUSH IP\nEND"), "invalid-register");
    }

    #[test]
    fn test_string_rules() {
        assert_eq!(first_err_code("ORG 1000h\nX DW \"hi\"\nEND"), "expects-number");
        assert!(check_src("ORG 1000h\nX DB \"hi\", 0\nEND").is_ok());
    }

    #[test]
    fn test_lengths() {
        assert_eq!(instr_lens("ORG 2000h\nHLT\nPUSH AX\nEND"), vec![1, 1]);
        assert_eq!(instr_lens("ORG 2000h\nINC AL\nINC [BX]\nNOT BYTE PTR [10h]\nEND"), vec![1, 1, 3]);
        assert_eq!(
            instr_lens(
                "ORG 2000h
                 MOV AX, BX
                 MOV AX, [BX]
                 MOV AX, [10h]
                 MOV AL, 1
                 MOV AX, 1
                 MOV [BX], AL
                 MOV [10h], AX
                 MOV BYTE PTR [BX], 1
                 MOV WORD PTR [10h], 1
                 END"
            ),
            vec![2, 2, 4, 3, 4, 2, 4, 3, 6]
        );
        assert_eq!(
            instr_lens("ORG 2000h\nX: JMP X\nINT 6\nIN AL, 30h\nIN AL, DX\nEND"),
            vec![3, 2, 2, 1]
        );
    }
}
