//! Components relating to the abstract syntax tree (AST)
//! used in representing assembly statements.
//!
//! These components together are used to construct...
//! - [`Stmt`] (a data structure holding one assembly source statement),
//! - [`Operand`] (a data structure holding one instruction operand),
//! - and [`Expr`] (a compile-time number expression).

use std::ops::Range;

use crate::value::Size;

/// A CPU register name.
///
/// The byte registers alias the low and high halves of AX through DX.
/// `IP` is recognized by the lexer but is never a legal instruction operand.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[allow(missing_docs)]
pub enum Reg {
    AX, BX, CX, DX, SP, IP,
    AL, AH, BL, BH, CL, CH, DL, DH,
}

impl Reg {
    /// The operand size of this register.
    pub fn size(self) -> Size {
        match self {
            Reg::AX | Reg::BX | Reg::CX | Reg::DX | Reg::SP | Reg::IP => Size::Word,
            _ => Size::Byte,
        }
    }

    /// Whether this is one of the word registers PUSH and POP accept.
    pub fn is_stackable(self) -> bool {
        matches!(self, Reg::AX | Reg::BX | Reg::CX | Reg::DX | Reg::SP)
    }

    /// Whether this register may appear as an instruction operand at all.
    pub fn is_operand(self) -> bool {
        !matches!(self, Reg::IP)
    }

    /// The encoding index of this register within its size class.
    ///
    /// Byte registers: AL CL DL BL AH CH DH BH (0..8).
    /// Word registers: AX CX DX BX SP (0..5).
    pub fn index(self) -> u8 {
        match self {
            Reg::AL | Reg::AX => 0,
            Reg::CL | Reg::CX => 1,
            Reg::DL | Reg::DX => 2,
            Reg::BL | Reg::BX => 3,
            Reg::AH | Reg::SP => 4,
            Reg::CH => 5,
            Reg::DH => 6,
            Reg::BH => 7,
            Reg::IP => unreachable!("IP is never encoded"),
        }
    }

    /// Recovers a byte register from its encoding index.
    pub fn from_byte_index(i: u8) -> Option<Reg> {
        [Reg::AL, Reg::CL, Reg::DL, Reg::BL, Reg::AH, Reg::CH, Reg::DH, Reg::BH]
            .get(usize::from(i))
            .copied()
    }

    /// Recovers a word register from its encoding index.
    pub fn from_word_index(i: u8) -> Option<Reg> {
        [Reg::AX, Reg::CX, Reg::DX, Reg::BX, Reg::SP]
            .get(usize::from(i))
            .copied()
    }

    /// The display name of this register.
    pub fn name(self) -> &'static str {
        match self {
            Reg::AX => "AX", Reg::BX => "BX", Reg::CX => "CX", Reg::DX => "DX",
            Reg::SP => "SP", Reg::IP => "IP",
            Reg::AL => "AL", Reg::AH => "AH", Reg::BL => "BL", Reg::BH => "BH",
            Reg::CL => "CL", Reg::CH => "CH", Reg::DL => "DL", Reg::DH => "DH",
        }
    }
}
impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A label occurrence in source code.
///
/// This struct stores the (uppercased) name of the label and the source
/// position where it occurs.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Label {
    /// The label's identifier, uppercased.
    pub name: String,

    /// The start of the label in assembly source code.
    ///
    /// Since the name stores the length of the string,
    /// we don't need to store the whole span.
    start: usize,
}
impl Label {
    /// Creates a new label.
    pub fn new(name: String, span: Range<usize>) -> Self {
        debug_assert_eq!(span.start + name.len(), span.end, "span should have the same length as name");
        Label { name, start: span.start }
    }
    /// Returns the span of the label in assembly source code.
    pub fn span(&self) -> Range<usize> {
        self.start..(self.start + self.name.len())
    }
}
impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name.fmt(f)
    }
}

/// A unary operator in a number expression.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[allow(missing_docs)]
pub enum UnOp { Plus, Minus }

/// A binary operator in a number expression.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[allow(missing_docs)]
pub enum BinOp { Add, Sub, Mul }

/// A compile-time number expression.
///
/// Expressions evaluate to an integer once labels are resolved. Intermediate
/// results are not range-checked; only the final value is checked against
/// its destination width.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Expr {
    /// A number literal.
    Num(i64),
    /// A label reference, optionally under the `OFFSET` marker.
    LabelRef {
        /// The referenced label.
        label: Label,
        /// Whether the reference is `OFFSET label` (the label's address)
        /// rather than a plain constant reference.
        offset: bool,
    },
    /// A unary `+`/`-` application.
    Unary {
        #[allow(missing_docs)]
        op: UnOp,
        #[allow(missing_docs)]
        inner: Box<Expr>,
    },
    /// A binary `+`/`-`/`*` application.
    Binary {
        #[allow(missing_docs)]
        op: BinOp,
        #[allow(missing_docs)]
        lhs: Box<Expr>,
        #[allow(missing_docs)]
        rhs: Box<Expr>,
    },
}

/// What a label resolves to during expression evaluation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LabelInfo {
    /// A compile-time constant (an EQU definition).
    Constant(i64),
    /// An addressable location (a data directive or an instruction).
    Address(u16),
}

/// Resolves label names during expression evaluation.
pub trait LabelResolver {
    /// Looks up a label by (uppercased) name.
    fn lookup(&self, name: &str) -> Option<LabelInfo>;
}

/// A resolver with no labels at all.
///
/// Evaluation against this resolver succeeds only for label-free expressions.
pub struct NoLabels;
impl LabelResolver for NoLabels {
    fn lookup(&self, _name: &str) -> Option<LabelInfo> {
        None
    }
}

/// Kinds of errors that can occur evaluating an [`Expr`].
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum EvalErrKind {
    /// The referenced label is not defined anywhere.
    NotFound(String),
    /// A data or instruction label was used as a plain number
    /// (its address is spelled `OFFSET label`).
    NotNumeric(String),
    /// `OFFSET` was applied to a label with no address (an EQU constant).
    NotAddressable(String),
}

/// Error from evaluating an [`Expr`].
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct EvalErr {
    /// The kind of evaluation failure.
    pub kind: EvalErrKind,
    /// The span of the offending label reference.
    pub span: Range<usize>,
}
impl std::fmt::Display for EvalErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            EvalErrKind::NotFound(l) => write!(f, "label {l} not found"),
            EvalErrKind::NotNumeric(l) => write!(f, "label {l} is not a number"),
            EvalErrKind::NotAddressable(l) => write!(f, "label {l} has no address"),
        }
    }
}
impl std::error::Error for EvalErr {}
impl crate::err::Error for EvalErr {
    fn code(&self) -> &'static str {
        match self.kind {
            EvalErrKind::NotFound(_) => "label-not-found",
            EvalErrKind::NotNumeric(_) => "label-should-be-a-number",
            EvalErrKind::NotAddressable(_) => "expects-data-label",
        }
    }

    fn span(&self) -> Option<crate::err::ErrSpan> {
        Some(self.span.clone().into())
    }

    fn help(&self) -> Option<std::borrow::Cow<'_, str>> {
        match self.kind {
            EvalErrKind::NotNumeric(_) => Some("use OFFSET to refer to the address of a label".into()),
            EvalErrKind::NotAddressable(_) => Some("OFFSET applies to data and instruction labels only".into()),
            _ => None,
        }
    }
}

impl Expr {
    /// Evaluates the expression against a label resolver.
    ///
    /// Intermediates are 64-bit; callers range-check the final value.
    pub fn eval(&self, labels: &impl LabelResolver) -> Result<i64, EvalErr> {
        match self {
            Expr::Num(n) => Ok(*n),
            Expr::LabelRef { label, offset } => {
                let err = |kind| EvalErr { kind, span: label.span() };

                match (labels.lookup(&label.name), offset) {
                    (Some(LabelInfo::Constant(v)), false) => Ok(v),
                    (Some(LabelInfo::Address(a)), true) => Ok(i64::from(a)),
                    (Some(LabelInfo::Address(_)), false) => Err(err(EvalErrKind::NotNumeric(label.name.clone()))),
                    (Some(LabelInfo::Constant(_)), true) => Err(err(EvalErrKind::NotAddressable(label.name.clone()))),
                    (None, _) => Err(err(EvalErrKind::NotFound(label.name.clone()))),
                }
            }
            Expr::Unary { op, inner } => {
                let v = inner.eval(labels)?;
                Ok(match op {
                    UnOp::Plus => v,
                    UnOp::Minus => v.wrapping_neg(),
                })
            }
            Expr::Binary { op, lhs, rhs } => {
                let l = lhs.eval(labels)?;
                let r = rhs.eval(labels)?;
                Ok(match op {
                    BinOp::Add => l.wrapping_add(r),
                    BinOp::Sub => l.wrapping_sub(r),
                    BinOp::Mul => l.wrapping_mul(r),
                })
            }
        }
    }

    /// Evaluates the expression if it holds no label references.
    pub fn const_eval(&self) -> Option<i64> {
        self.eval(&NoLabels).ok()
    }

    /// If this expression is a lone, un-`OFFSET`ed label reference, returns it.
    ///
    /// A bare identifier operand is parsed as such an expression; the
    /// validator uses this to tell data-label memory operands apart from
    /// immediates.
    pub fn as_single_label(&self) -> Option<&Label> {
        match self {
            Expr::LabelRef { label, offset: false } => Some(label),
            _ => None,
        }
    }

    /// Calls `f` for every plain (non-`OFFSET`) label reference in the tree.
    pub fn for_each_plain_ref(&self, f: &mut impl FnMut(&Label)) {
        match self {
            Expr::Num(_) => {}
            Expr::LabelRef { label, offset: false } => f(label),
            Expr::LabelRef { offset: true, .. } => {}
            Expr::Unary { inner, .. } => inner.for_each_plain_ref(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.for_each_plain_ref(f);
                rhs.for_each_plain_ref(f);
            }
        }
    }
}

/// The addressing mode of a memory operand.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum MemMode {
    /// `[expr]`: the address is a compile-time expression.
    Direct(Expr),
    /// `[BX]`: the address is read from BX at run time.
    IndirectBx,
}

/// The syntactic form of one instruction operand.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum OperandKind {
    /// A bare register.
    Reg(Reg),
    /// A memory operand, optionally sized with `BYTE PTR`/`WORD PTR`.
    Mem {
        #[allow(missing_docs)]
        mode: MemMode,
        /// The explicit size hint, if one was written.
        size: Option<Size>,
    },
    /// A number expression; bare identifiers land here too and are
    /// disambiguated by the validator.
    Expr(Expr),
}

/// One instruction operand with its source span.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Operand {
    #[allow(missing_docs)]
    pub kind: OperandKind,
    #[allow(missing_docs)]
    pub span: Range<usize>,
}

/// An instruction mnemonic.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[allow(missing_docs)]
pub enum Mnemonic {
    Mov, Add, Adc, Sub, Sbb, Cmp, Neg, Inc, Dec,
    And, Or, Xor, Not,
    Push, Pop, Pushf, Popf,
    In, Out,
    Jmp, Jc, Jnc, Jz, Jnz, Js, Jns, Jo, Jno, Call, Ret, Iret,
    Int, Cli, Sti, Hlt, Nop,
}
impl std::fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Mnemonic::Mov => "MOV", Mnemonic::Add => "ADD", Mnemonic::Adc => "ADC",
            Mnemonic::Sub => "SUB", Mnemonic::Sbb => "SBB", Mnemonic::Cmp => "CMP",
            Mnemonic::Neg => "NEG", Mnemonic::Inc => "INC", Mnemonic::Dec => "DEC",
            Mnemonic::And => "AND", Mnemonic::Or => "OR", Mnemonic::Xor => "XOR",
            Mnemonic::Not => "NOT", Mnemonic::Push => "PUSH", Mnemonic::Pop => "POP",
            Mnemonic::Pushf => "PUSHF", Mnemonic::Popf => "POPF",
            Mnemonic::In => "IN", Mnemonic::Out => "OUT",
            Mnemonic::Jmp => "JMP", Mnemonic::Jc => "JC", Mnemonic::Jnc => "JNC",
            Mnemonic::Jz => "JZ", Mnemonic::Jnz => "JNZ", Mnemonic::Js => "JS",
            Mnemonic::Jns => "JNS", Mnemonic::Jo => "JO", Mnemonic::Jno => "JNO",
            Mnemonic::Call => "CALL", Mnemonic::Ret => "RET", Mnemonic::Iret => "IRET",
            Mnemonic::Int => "INT", Mnemonic::Cli => "CLI", Mnemonic::Sti => "STI",
            Mnemonic::Hlt => "HLT", Mnemonic::Nop => "NOP",
        };
        f.write_str(name)
    }
}

/// Which data directive a statement is.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DataKind {
    /// `DB`: define bytes.
    Db,
    /// `DW`: define words.
    Dw,
}
impl DataKind {
    /// The size of each defined element.
    pub fn size(self) -> Size {
        match self {
            DataKind::Db => Size::Byte,
            DataKind::Dw => Size::Word,
        }
    }
}

/// One value of a data directive.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum DataValue {
    /// A string literal; each character becomes one byte (`DB` only).
    Str(String),
    /// `?`: reserves space without assigning a value.
    Uninit,
    /// A number expression.
    Expr(Expr),
}

/// The nucleus of a statement.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum StmtKind {
    /// `ORG n`: sets the assembly pointer.
    Org(u16),
    /// `END`: marks the end of the program.
    End,
    /// A `DB`/`DW` data directive.
    Data {
        #[allow(missing_docs)]
        kind: DataKind,
        #[allow(missing_docs)]
        values: Vec<DataValue>,
    },
    /// An `EQU` compile-time constant definition.
    Equ(Expr),
    /// An instruction.
    Instr {
        #[allow(missing_docs)]
        mnemonic: Mnemonic,
        #[allow(missing_docs)]
        operands: Vec<Operand>,
    },
}

/// One assembly statement.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Stmt {
    /// The label attached to this statement, if any.
    pub label: Option<Label>,
    /// What the statement is.
    pub kind: StmtKind,
    /// The span of the statement in source code.
    pub span: Range<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    impl LabelResolver for HashMap<&str, LabelInfo> {
        fn lookup(&self, name: &str) -> Option<LabelInfo> {
            self.get(name).copied()
        }
    }

    fn lbl(name: &str) -> Label {
        Label::new(name.to_string(), 0..name.len())
    }

    #[test]
    fn test_eval_arith() {
        // 2 + 3 * 4 (precedence is the parser's job; the tree is explicit here)
        let e = Expr::Binary {
            op: BinOp::Add,
            lhs: Box::new(Expr::Num(2)),
            rhs: Box::new(Expr::Binary {
                op: BinOp::Mul,
                lhs: Box::new(Expr::Num(3)),
                rhs: Box::new(Expr::Num(4)),
            }),
        };
        assert_eq!(e.eval(&NoLabels), Ok(14));
        assert_eq!(e.const_eval(), Some(14));
    }

    #[test]
    fn test_eval_labels() {
        let mut labels = HashMap::new();
        labels.insert("N", LabelInfo::Constant(5));
        labels.insert("X", LabelInfo::Address(0x1000));

        let plain = |name: &str, offset| Expr::LabelRef { label: lbl(name), offset };

        assert_eq!(plain("N", false).eval(&labels), Ok(5));
        assert_eq!(plain("X", true).eval(&labels), Ok(0x1000));
        assert!(matches!(
            plain("X", false).eval(&labels),
            Err(EvalErr { kind: EvalErrKind::NotNumeric(_), .. })
        ));
        assert!(matches!(
            plain("N", true).eval(&labels),
            Err(EvalErr { kind: EvalErrKind::NotAddressable(_), .. })
        ));
        assert!(matches!(
            plain("MISSING", false).eval(&labels),
            Err(EvalErr { kind: EvalErrKind::NotFound(_), .. })
        ));
    }

    #[test]
    fn test_reg_indices() {
        for r in [Reg::AL, Reg::CL, Reg::DL, Reg::BL, Reg::AH, Reg::CH, Reg::DH, Reg::BH] {
            assert_eq!(Reg::from_byte_index(r.index()), Some(r));
        }
        for r in [Reg::AX, Reg::CX, Reg::DX, Reg::BX, Reg::SP] {
            assert_eq!(Reg::from_word_index(r.index()), Some(r));
        }
        assert_eq!(Reg::from_word_index(5), None);
    }
}
