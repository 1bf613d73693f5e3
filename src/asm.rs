//! Assembling validated statements into a program image.
//!
//! This module is used to convert validated items (see [`validate`]) into a
//! [`Program`] that can be loaded into the simulator and executed.
//!
//! The assembler notably consists of:
//! - the `EQU` resolver, which peels the constant-definition graph in
//!   dependency order and reports every label on a cycle,
//! - **pass 1**: walking statements with the location counter, assigning
//!   every statement its address and checking bounds and overlap,
//! - **pass 2**: evaluating every number expression against the resolved
//!   labels and encoding instructions and data into sparse byte images.

pub mod encoding;
pub mod validate;

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use crate::ast::{DataValue, EvalErr, Expr, LabelInfo, LabelResolver};
use crate::err::ErrSpan;
use crate::value::{Size, Value, ValueErr};

use encoding::{Loc, MachInstr, MemRef, Port, Src};
use validate::{
    Checked, DataItem, EquDef, InstrKind, InstrMeta, Item, LabelKind, MemTarget, PortSel, Source,
    Target,
};

/// The first address past the end of memory.
const MEM_END: u32 = 0x4000;

/// Kinds of errors that can occur from assembling validated statements.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AsmErrKind {
    /// A statement appears before any `ORG` set the location counter.
    MissingOrg,
    /// A statement does not fit inside memory.
    OutOfRange,
    /// Two statements occupy overlapping addresses.
    Occupied,
    /// `EQU` definitions depend on each other in a cycle.
    EquCycle(Vec<String>),
    /// A number expression failed to evaluate.
    Eval(EvalErr),
    /// A resolved value does not fit where it is used.
    Value(ValueErr),
}

/// Error from assembling validated statements.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AsmErr {
    /// The kind of error.
    pub kind: AsmErrKind,
    /// The span(s) in the source associated with this error.
    pub span: ErrSpan,
}
impl AsmErr {
    fn new(kind: AsmErrKind, span: impl Into<ErrSpan>) -> Self {
        Self { kind, span: span.into() }
    }
}
impl std::fmt::Display for AsmErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            AsmErrKind::MissingOrg => f.write_str("no ORG before this statement"),
            AsmErrKind::OutOfRange => f.write_str("statement does not fit in memory"),
            AsmErrKind::Occupied => f.write_str("statements overlap in memory"),
            AsmErrKind::EquCycle(labels) => {
                write!(f, "EQU definitions form a cycle: {}", labels.join(", "))
            }
            AsmErrKind::Eval(e) => e.fmt(f),
            AsmErrKind::Value(e) => e.fmt(f),
        }
    }
}
impl std::error::Error for AsmErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            AsmErrKind::Eval(e) => Some(e),
            AsmErrKind::Value(e) => Some(e),
            _ => None,
        }
    }
}
impl crate::err::Error for AsmErr {
    fn code(&self) -> &'static str {
        match &self.kind {
            AsmErrKind::MissingOrg => "missing-org",
            AsmErrKind::OutOfRange => "instruction-out-of-range",
            AsmErrKind::Occupied => "occupied-address",
            AsmErrKind::EquCycle(_) => "label-undefined-chain",
            AsmErrKind::Eval(e) => e.code(),
            AsmErrKind::Value(e) => e.code(),
        }
    }

    fn span(&self) -> Option<ErrSpan> {
        Some(self.span.clone())
    }

    fn help(&self) -> Option<std::borrow::Cow<'_, str>> {
        match &self.kind {
            AsmErrKind::MissingOrg => Some("add an ORG directive above this statement".into()),
            AsmErrKind::OutOfRange => None,
            AsmErrKind::Occupied => Some("move the starting address of one of the statements".into()),
            AsmErrKind::EquCycle(_) => Some("EQU chains must be acyclic".into()),
            AsmErrKind::Eval(e) => e.help(),
            AsmErrKind::Value(e) => e.help(),
        }
    }
}

/// What kind of location a program label names.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MemLabelKind {
    /// Byte data.
    Db,
    /// Word data.
    Dw,
    /// An instruction address.
    Instr,
}

/// A resolved program label.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ProgramLabel {
    #[allow(missing_docs)]
    pub kind: MemLabelKind,
    #[allow(missing_docs)]
    pub address: u16,
}

/// One fully encoded instruction of the program.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct EmittedInstr {
    /// Location and identity of the instruction.
    pub meta: InstrMeta,
    /// The resolved machine form.
    pub instr: MachInstr,
}

/// A compiled program: the final product of the assembler.
///
/// The byte images are sparse `address → byte` maps. `EQU` labels are gone
/// by this point; only addressable labels survive into [`Program::labels`].
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Program {
    /// Every instruction, in source order, with its assigned address.
    pub instructions: Vec<EmittedInstr>,
    /// Addressable labels (data and instructions).
    pub labels: BTreeMap<String, ProgramLabel>,
    /// The encoded instruction bytes.
    pub code_bytes: BTreeMap<u16, u8>,
    /// The data directive bytes (uninitialized values emit nothing).
    pub data_bytes: BTreeMap<u16, u8>,
}

impl Program {
    /// The address execution starts at: the first instruction in source
    /// order.
    pub fn entry(&self) -> Option<u16> {
        self.instructions.first().map(|i| i.meta.start)
    }
}

/// Label lookup for pass 2: addressable labels plus resolved `EQU` values.
struct Resolved {
    labels: BTreeMap<String, ProgramLabel>,
    equs: HashMap<String, i64>,
}
impl LabelResolver for Resolved {
    fn lookup(&self, name: &str) -> Option<LabelInfo> {
        if let Some(&v) = self.equs.get(name) {
            return Some(LabelInfo::Constant(v));
        }
        self.labels.get(name).map(|l| LabelInfo::Address(l.address))
    }
}

/// Assembles validated statements into a [`Program`].
///
/// Errors are accumulated across statements so every problem surfaces in
/// one pass.
pub fn assemble(checked: Checked) -> Result<Program, Vec<AsmErr>> {
    let Checked { mut items, equs, label_kinds } = checked;
    let mut errs = vec![];

    // PASS 1: assign every statement its address.
    let labels = assign_addresses(&mut items, &mut errs);

    // Resolve EQU constants; addresses are known now, so OFFSET works.
    let equ_values = resolve_equs(equs, &label_kinds, &labels, &mut errs);

    // PASS 2: evaluate expressions and emit bytes.
    let resolver = Resolved { labels, equs: equ_values };
    let mut instructions = vec![];
    let mut code_bytes = BTreeMap::new();
    let mut data_bytes = BTreeMap::new();

    for item in items {
        match item {
            Item::Org { .. } => {}
            Item::Data(d) => {
                if let Err(e) = emit_data(&d, &resolver, &mut data_bytes) {
                    errs.push(e);
                }
            }
            Item::Instr(instr) => match lower_instr(&instr.kind, &resolver, &instr.meta.span) {
                Ok(mach) => {
                    debug_assert_eq!(
                        mach.encoded_len(),
                        instr.meta.len,
                        "pass 1 length must match the encoding"
                    );
                    let mut bytes = vec![];
                    mach.encode(&mut bytes);
                    for (i, byte) in bytes.into_iter().enumerate() {
                        code_bytes.insert(instr.meta.start.wrapping_add(i as u16), byte);
                    }
                    instructions.push(EmittedInstr { meta: instr.meta, instr: mach });
                }
                Err(e) => errs.push(e),
            },
        }
    }

    match errs.is_empty() {
        true => Ok(Program { instructions, labels: resolver.labels, code_bytes, data_bytes }),
        false => Err(errs),
    }
}

/// Pass 1: walks the items in source order, maintaining the location
/// counter, recording label addresses and checking bounds and overlap.
fn assign_addresses(items: &mut [Item], errs: &mut Vec<AsmErr>) -> BTreeMap<String, ProgramLabel> {
    let mut labels = BTreeMap::new();
    let mut lc: Option<u16> = None;
    // occupied ranges: (start, len, statement span)
    let mut ranges: Vec<(u16, u16, Range<usize>)> = vec![];

    for item in items.iter_mut() {
        let (start_slot, label, kind, len, span) = match item {
            Item::Org { addr, .. } => {
                lc = Some(*addr);
                continue;
            }
            Item::Data(d) => {
                let kind = match d.kind {
                    crate::ast::DataKind::Db => MemLabelKind::Db,
                    crate::ast::DataKind::Dw => MemLabelKind::Dw,
                };
                (&mut d.start, d.label.as_deref(), kind, d.len, d.span.clone())
            }
            Item::Instr(i) => (
                &mut i.meta.start,
                i.meta.label.as_deref(),
                MemLabelKind::Instr,
                i.meta.len,
                i.meta.span.clone(),
            ),
        };

        let Some(cur) = lc else {
            errs.push(AsmErr::new(AsmErrKind::MissingOrg, span));
            continue;
        };

        if u32::from(cur) + u32::from(len) > MEM_END {
            errs.push(AsmErr::new(AsmErrKind::OutOfRange, span));
            // park the counter past the end so everything after is also
            // reported as not fitting
            lc = Some(MEM_END as u16);
            continue;
        }

        *start_slot = cur;
        if let Some(name) = label {
            labels.insert(name.to_string(), ProgramLabel { kind, address: cur });
        }
        if len > 0 {
            ranges.push((cur, len, span));
        }
        lc = Some(cur.wrapping_add(len));
    }

    // ranges must be pairwise disjoint
    ranges.sort_by_key(|&(start, _, _)| start);
    for pair in ranges.windows(2) {
        let [(a_start, a_len, a_span), (b_start, _, b_span)] = pair else { unreachable!() };
        if a_start + a_len > *b_start {
            errs.push(AsmErr::new(AsmErrKind::Occupied, [a_span.clone(), b_span.clone()]));
        }
    }

    labels
}

/// Resolves `EQU` constants by repeatedly peeling definitions whose
/// dependencies are settled. Whatever survives the peel is a cycle.
fn resolve_equs(
    mut pending: Vec<EquDef>,
    label_kinds: &HashMap<String, LabelKind>,
    labels: &BTreeMap<String, ProgramLabel>,
    errs: &mut Vec<AsmErr>,
) -> HashMap<String, i64> {
    let mut values: HashMap<String, i64> = HashMap::new();

    /// Plain references to other EQU labels are the only edges of the
    /// dependency graph; address references resolve in pass 1 already.
    fn equ_deps(expr: &Expr, label_kinds: &HashMap<String, LabelKind>) -> Vec<String> {
        let mut deps = vec![];
        expr.for_each_plain_ref(&mut |label| {
            if label_kinds.get(&label.name) == Some(&LabelKind::Equ) {
                deps.push(label.name.clone());
            }
        });
        deps
    }

    struct Peek<'a> {
        labels: &'a BTreeMap<String, ProgramLabel>,
        values: &'a HashMap<String, i64>,
    }
    impl LabelResolver for Peek<'_> {
        fn lookup(&self, name: &str) -> Option<LabelInfo> {
            if let Some(&v) = self.values.get(name) {
                return Some(LabelInfo::Constant(v));
            }
            self.labels.get(name).map(|l| LabelInfo::Address(l.address))
        }
    }

    loop {
        let (ready, blocked): (Vec<_>, Vec<_>) = pending.into_iter().partition(|def| {
            equ_deps(&def.expr, label_kinds).iter().all(|dep| values.contains_key(dep))
        });
        pending = blocked;
        if ready.is_empty() {
            break;
        }

        for def in ready {
            let result = def.expr.eval(&Peek { labels, values: &values });
            match result {
                Ok(v) => {
                    values.insert(def.label.name.clone(), v);
                }
                Err(e) => {
                    errs.push(AsmErr::new(AsmErrKind::Eval(e), def.span));
                    // keep dependents from showing up as a bogus cycle
                    values.insert(def.label.name.clone(), 0);
                }
            }
        }
    }

    if !pending.is_empty() {
        let names: Vec<_> = pending.iter().map(|d| d.label.name.clone()).collect();
        let spans: Vec<_> = pending.iter().map(|d| d.label.span()).collect();
        errs.push(AsmErr::new(AsmErrKind::EquCycle(names), spans));
    }

    values
}

fn eval_value(
    expr: &Expr,
    size: Size,
    resolver: &Resolved,
    span: &Range<usize>,
) -> Result<Value, AsmErr> {
    let raw = expr.eval(resolver).map_err(|e| AsmErr::new(AsmErrKind::Eval(e), span.clone()))?;
    Value::new(size, raw).map_err(|e| AsmErr::new(AsmErrKind::Value(e), span.clone()))
}

/// Evaluates an expression that must land in `0..=255` (interrupt numbers,
/// port numbers).
fn eval_u8(expr: &Expr, resolver: &Resolved, span: &Range<usize>) -> Result<u8, AsmErr> {
    let raw = expr.eval(resolver).map_err(|e| AsmErr::new(AsmErrKind::Eval(e), span.clone()))?;
    u8::try_from(raw).map_err(|_| {
        AsmErr::new(AsmErrKind::Value(ValueErr { size: Size::Byte, input: raw }), span.clone())
    })
}

fn emit_data(
    d: &DataItem,
    resolver: &Resolved,
    out: &mut BTreeMap<u16, u8>,
) -> Result<(), AsmErr> {
    let size = d.kind.size();
    let mut at = d.start;
    for value in &d.values {
        match value {
            DataValue::Str(s) => {
                for byte in s.bytes() {
                    out.insert(at, byte);
                    at = at.wrapping_add(1);
                }
            }
            DataValue::Uninit => at = at.wrapping_add(size.bytes()),
            DataValue::Expr(e) => {
                let v = eval_value(e, size, resolver, &d.span)?;
                out.insert(at, v.low().unsigned() as u8);
                at = at.wrapping_add(1);
                if size == Size::Word {
                    out.insert(at, v.high().unsigned() as u8);
                    at = at.wrapping_add(1);
                }
            }
        }
    }
    Ok(())
}

/// Lowers one validated instruction to its machine form by resolving every
/// remaining expression.
fn lower_instr(
    kind: &InstrKind,
    resolver: &Resolved,
    span: &Range<usize>,
) -> Result<MachInstr, AsmErr> {
    let mem = |m: &MemTarget| -> Result<MemRef, AsmErr> {
        match m {
            MemTarget::Bx => Ok(MemRef::Bx),
            MemTarget::Direct(e) => {
                Ok(MemRef::Direct(eval_value(e, Size::Word, resolver, span)?.unsigned()))
            }
        }
    };
    let target = |t: &Target| -> Result<Loc, AsmErr> {
        match t {
            Target::Reg(r) => Ok(Loc::Reg(*r)),
            Target::Mem(m) => Ok(Loc::Mem(mem(m)?)),
        }
    };

    let mach = match kind {
        InstrKind::Zeroary(op) => MachInstr::Zeroary(*op),
        InstrKind::Push(r) => MachInstr::Push(*r),
        InstrKind::Pop(r) => MachInstr::Pop(*r),
        InstrKind::Unary { op, size, tgt } => {
            MachInstr::Unary { op: *op, size: *size, tgt: target(tgt)? }
        }
        InstrKind::Binary { op, size, dst, src } => {
            let src = match src {
                Source::Reg(r) => Src::Reg(*r),
                Source::Mem(m) => Src::Mem(mem(m)?),
                Source::Imm(e) => Src::Imm(eval_value(e, *size, resolver, span)?),
            };
            MachInstr::Binary { op: *op, size: *size, dst: target(dst)?, src }
        }
        InstrKind::Jump { op, target } => {
            let address = match resolver.labels.get(&target.name) {
                Some(l) => l.address,
                None => {
                    let e = EvalErr {
                        kind: crate::ast::EvalErrKind::NotFound(target.name.clone()),
                        span: target.span(),
                    };
                    return Err(AsmErr::new(AsmErrKind::Eval(e), target.span()));
                }
            };
            MachInstr::Jump { op: *op, target: address }
        }
        InstrKind::Int(e) => MachInstr::Int(eval_u8(e, resolver, span)?),
        InstrKind::InOut { dir, size, port } => {
            let port = match port {
                PortSel::Dx => Port::Dx,
                PortSel::Fixed(e) => Port::Fixed(eval_u8(e, resolver, span)?),
            };
            MachInstr::InOut { dir: *dir, size: *size, port }
        }
    };
    Ok(mach)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::err::Error;
    use crate::parse::parse;

    fn assemble_src(src: &str) -> Result<Program, Vec<AsmErr>> {
        let checked = validate::check(parse(src).unwrap()).unwrap();
        assemble(checked)
    }
    fn assemble_ok(src: &str) -> Program {
        assemble_src(src).unwrap()
    }
    fn first_err_code(src: &str) -> &'static str {
        assemble_src(src).unwrap_err()[0].code()
    }

    #[test]
    fn test_label_addresses() {
        let prog = assemble_ok(
            "ORG 1000h
             X DB 1, 2, 3
             Y DW 1234h
             ORG 2000h
             INICIO: MOV AL, X
             FIN: HLT
             END",
        );
        assert_eq!(prog.labels["X"], ProgramLabel { kind: MemLabelKind::Db, address: 0x1000 });
        assert_eq!(prog.labels["Y"], ProgramLabel { kind: MemLabelKind::Dw, address: 0x1003 });
        assert_eq!(
            prog.labels["INICIO"],
            ProgramLabel { kind: MemLabelKind::Instr, address: 0x2000 }
        );
        // MOV AL, X is reg <- direct memory: 4 bytes
        assert_eq!(prog.labels["FIN"], ProgramLabel { kind: MemLabelKind::Instr, address: 0x2004 });
        assert_eq!(prog.entry(), Some(0x2000));
    }

    #[test]
    fn test_data_bytes() {
        let prog = assemble_ok("ORG 1000h\nX DB 1, ?, \"AB\"\nY DW 0ABCDh, ?\nEND");
        assert_eq!(prog.data_bytes.get(&0x1000), Some(&1));
        // the ? reserves a hole: no byte emitted
        assert_eq!(prog.data_bytes.get(&0x1001), None);
        assert_eq!(prog.data_bytes.get(&0x1002), Some(&b'A'));
        assert_eq!(prog.data_bytes.get(&0x1003), Some(&b'B'));
        // words are little-endian
        assert_eq!(prog.data_bytes.get(&0x1004), Some(&0xCD));
        assert_eq!(prog.data_bytes.get(&0x1005), Some(&0xAB));
        assert_eq!(prog.data_bytes.get(&0x1006), None);
    }

    #[test]
    fn test_occupied_addresses_disjoint() {
        let prog = assemble_ok(
            "ORG 1000h\nA DB 1, 2\nB DW ?\nORG 2000h\nHLT\nEND",
        );
        // occupied = exactly the union of statement ranges
        let occupied: Vec<(u16, u16)> = vec![(0x1000, 2), (0x1002, 2), (0x2000, 1)];
        for (start, len) in occupied {
            for a in start..start + len {
                let in_data = prog.data_bytes.contains_key(&a);
                let in_code = prog.code_bytes.contains_key(&a);
                let reserved = (0x1002..0x1004).contains(&a); // the ? hole
                assert!(in_data || in_code || reserved, "address {a:04X} should be occupied");
            }
        }
    }

    #[test]
    fn test_missing_org() {
        assert_eq!(first_err_code("HLT\nEND"), "missing-org");
        assert_eq!(first_err_code("X DB 1\nORG 2000h\nHLT\nEND"), "missing-org");
    }

    #[test]
    fn test_memory_bounds() {
        // DW at the last two bytes fits
        assert!(assemble_src("ORG 3FFEh\nDW 0\nEND").is_ok());
        // one byte further does not
        assert_eq!(first_err_code("ORG 3FFFh\nDW 0\nEND"), "instruction-out-of-range");
    }

    #[test]
    fn test_overlap() {
        assert_eq!(
            first_err_code("ORG 1000h\nDB 1, 2, 3\nORG 1002h\nDB 9\nEND"),
            "occupied-address"
        );
        // touching ranges are fine
        assert!(assemble_src("ORG 1000h\nDB 1, 2\nORG 1002h\nDB 9\nEND").is_ok());
    }

    #[test]
    fn test_equ_resolution() {
        let prog = assemble_ok(
            "BASE EQU 1000h
             DOBLE EQU BASE * 2
             ORG 2000h
             MOV AX, DOBLE
             HLT
             END",
        );
        let imm = match prog.instructions[0].instr {
            MachInstr::Binary { src: Src::Imm(v), .. } => v.unsigned(),
            ref other => panic!("unexpected form {other:?}"),
        };
        assert_eq!(imm, 0x2000);
    }

    #[test]
    fn test_equ_offset_of_label() {
        let prog = assemble_ok(
            "ORG 1000h
             X DB ?
             DIR EQU OFFSET X + 1
             ORG 2000h
             MOV AX, DIR
             HLT
             END",
        );
        let imm = match prog.instructions[0].instr {
            MachInstr::Binary { src: Src::Imm(v), .. } => v.unsigned(),
            ref other => panic!("unexpected form {other:?}"),
        };
        assert_eq!(imm, 0x1001);
    }

    #[test]
    fn test_equ_cycle() {
        let errs =
            assemble_src("A EQU B + 1\nB EQU C + 1\nC EQU A + 1\nORG 2000h\nHLT\nEND").unwrap_err();
        let AsmErrKind::EquCycle(names) = &errs[0].kind else {
            panic!("expected a cycle, got {:?}", errs[0].kind)
        };
        let mut names = names.clone();
        names.sort();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(errs[0].code(), "label-undefined-chain");
    }

    #[test]
    fn test_label_not_found() {
        // bare unknown labels are caught earlier; OFFSET of one resolves here
        assert_eq!(first_err_code("ORG 2000h\nMOV AX, OFFSET NADA\nHLT\nEND"), "label-not-found");
    }

    #[test]
    fn test_value_out_of_range() {
        assert_eq!(first_err_code("ORG 2000h\nMOV AL, 300\nHLT\nEND"), "value-out-of-range");
        assert_eq!(first_err_code("ORG 1000h\nX DB 256\nEND"), "value-out-of-range");
        assert!(assemble_src("ORG 1000h\nX DB 255\nY DB -128\nEND").is_ok());
    }

    #[test]
    fn test_negative_immediates() {
        let prog = assemble_ok("ORG 2000h\nMOV AL, -1\nHLT\nEND");
        let imm = match prog.instructions[0].instr {
            MachInstr::Binary { src: Src::Imm(v), .. } => v,
            ref other => panic!("unexpected form {other:?}"),
        };
        assert_eq!(imm.unsigned(), 0xFF);
        assert_eq!(imm.signed(), -1);
    }

    #[test]
    fn test_jump_targets_resolve() {
        let prog = assemble_ok("ORG 2000h\nNOP\nBUCLE: JMP BUCLE\nEND");
        assert_eq!(
            prog.instructions[1].instr,
            MachInstr::Jump { op: encoding::JumpOp::Jmp, target: 0x2001 }
        );
    }

    #[test]
    fn test_code_bytes_at_addresses() {
        let prog = assemble_ok("ORG 2000h\nHLT\nEND");
        assert_eq!(prog.code_bytes.get(&0x2000), Some(&0x00));
    }

    #[test]
    fn test_reassembly_of_disassembly_is_identical() {
        // the canonical rendering of every decoded instruction assembles
        // back to the same image
        let src = "
            ORG 1000h
            X DB 5
            ORG 2000h
            MOV AL, X
            ADD AL, 37
            MOV X, AL
            PUSH AX
            POP BX
            INC WORD PTR [BX]
            CMP AL, 0
            JNZ FIN
            IN AL, 30h
            OUT 31h, AL
            INT 7
            FIN: HLT
            END";
        let first = assemble_ok(src);

        // Jump operands must be labels in source, so synthesize one per
        // branch target.
        let targets: std::collections::BTreeSet<u16> = first
            .instructions
            .iter()
            .filter_map(|e| match e.instr {
                MachInstr::Jump { target, .. } => Some(target),
                _ => None,
            })
            .collect();

        let mut rebuilt = String::from("ORG 2000h\n");
        for emitted in &first.instructions {
            if targets.contains(&emitted.meta.start) {
                rebuilt.push_str(&format!("L{:04X}: ", emitted.meta.start));
            }
            match emitted.instr {
                MachInstr::Jump { op, target } => {
                    let name = match op {
                        encoding::JumpOp::Jnz => "JNZ",
                        _ => unreachable!("only JNZ appears in this program"),
                    };
                    rebuilt.push_str(&format!("{name} L{target:04X}"));
                }
                ref instr => rebuilt.push_str(&instr.to_string()),
            }
            rebuilt.push('\n');
        }
        rebuilt.push_str("END\n");

        let second = assemble_ok(&rebuilt);
        assert_eq!(first.code_bytes, second.code_bytes);
    }
}
