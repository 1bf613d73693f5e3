//! Parsing assembly source code into an AST.
//!
//! This module is used to convert source code into a sequence of statements
//! ([`Stmt`]) that can be handed to the assembler.
//!
//! The parser is line-oriented and recovers from errors at line boundaries,
//! so one call to [`parse`] reports every lex and parse error in the file.

pub mod lex;

use std::collections::HashMap;
use std::ops::Range;

use logos::Logos;

use crate::ast::{
    BinOp, DataKind, DataValue, Expr, Label, MemMode, Mnemonic, Operand, OperandKind, Stmt,
    StmtKind, UnOp,
};
use crate::err::ErrSpan;
use crate::value::Size;
use lex::{Ident, LexErr, Token};

/// Kinds of errors that can occur from parsing assembly code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ParseErrKind {
    /// The tokenizer rejected part of the line.
    Lex(LexErr),
    /// Expected a statement (a directive or an instruction mnemonic).
    ExpectedStatement,
    /// Expected an instruction operand.
    ExpectedOperand,
    /// Expected a number literal.
    ExpectedNumber,
    /// Expected a number expression.
    ExpectedExpr,
    /// Expected a data value (a number expression, a string, or `?`).
    ExpectedDataValue,
    /// Expected a label name.
    ExpectedLabel,
    /// Expected the end of the line.
    ExpectedEol,
    /// Expected a closing `]`.
    ExpectedCloseBracket,
    /// Expected a closing `)`.
    ExpectedCloseParen,
    /// Expected `PTR` after `BYTE`/`WORD`.
    ExpectedPtr,
    /// `EQU` requires a label to define.
    EquNeedsLabel,
    /// The same label was defined more than once.
    DuplicatedLabel(String),
    /// A statement follows the `END` directive.
    EndNotLast,
    /// The program has no `END` directive.
    MissingEnd,
}

/// Error from parsing assembly code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ParseErr {
    /// The kind of error.
    pub kind: ParseErrKind,
    /// The span(s) in the source associated with this error.
    pub span: ErrSpan,
}
impl ParseErr {
    fn new(kind: ParseErrKind, span: impl Into<ErrSpan>) -> Self {
        Self { kind, span: span.into() }
    }
}
impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ParseErrKind::Lex(e) => e.fmt(f),
            ParseErrKind::ExpectedStatement => f.write_str("expected a directive or instruction"),
            ParseErrKind::ExpectedOperand => f.write_str("expected an operand"),
            ParseErrKind::ExpectedNumber => f.write_str("expected a number literal"),
            ParseErrKind::ExpectedExpr => f.write_str("expected a number expression"),
            ParseErrKind::ExpectedDataValue => f.write_str("expected a data value"),
            ParseErrKind::ExpectedLabel => f.write_str("expected a label name"),
            ParseErrKind::ExpectedEol => f.write_str("expected end of line"),
            ParseErrKind::ExpectedCloseBracket => f.write_str("expected ']'"),
            ParseErrKind::ExpectedCloseParen => f.write_str("expected ')'"),
            ParseErrKind::ExpectedPtr => f.write_str("expected PTR"),
            ParseErrKind::EquNeedsLabel => f.write_str("EQU requires a label"),
            ParseErrKind::DuplicatedLabel(l) => write!(f, "label {l} is defined more than once"),
            ParseErrKind::EndNotLast => f.write_str("END must be the last statement"),
            ParseErrKind::MissingEnd => f.write_str("program is missing an END directive"),
        }
    }
}
impl std::error::Error for ParseErr {}
impl crate::err::Error for ParseErr {
    fn code(&self) -> &'static str {
        match &self.kind {
            ParseErrKind::Lex(e) => e.code(),
            ParseErrKind::ExpectedStatement => "expected-instruction",
            ParseErrKind::ExpectedOperand => "expected-operand",
            ParseErrKind::ExpectedNumber => "expected-number",
            ParseErrKind::ExpectedExpr => "expected-expression",
            ParseErrKind::ExpectedDataValue => "expected-data-value",
            ParseErrKind::ExpectedLabel | ParseErrKind::EquNeedsLabel => "expected-label",
            ParseErrKind::ExpectedEol => "expected-eol",
            ParseErrKind::ExpectedCloseBracket => "expected-closing-bracket",
            ParseErrKind::ExpectedCloseParen => "expected-closing-paren",
            ParseErrKind::ExpectedPtr => "expected-ptr",
            ParseErrKind::DuplicatedLabel(_) => "duplicated-label",
            ParseErrKind::EndNotLast => "end-must-be-last",
            ParseErrKind::MissingEnd => "missing-end",
        }
    }

    fn span(&self) -> Option<ErrSpan> {
        Some(self.span.clone())
    }

    fn help(&self) -> Option<std::borrow::Cow<'_, str>> {
        match &self.kind {
            ParseErrKind::Lex(e) => e.help(),
            ParseErrKind::DuplicatedLabel(_) => Some("labels must be unique, try renaming one of them".into()),
            ParseErrKind::MissingEnd => Some("add an END directive after the last statement".into()),
            ParseErrKind::ExpectedPtr => Some("sized memory operands are written BYTE PTR [...] or WORD PTR [...]".into()),
            _ => None,
        }
    }
}

/// Parses assembly source code into a statement list.
///
/// Errors are accumulated: a bad line is reported and skipped, and parsing
/// continues on the next line.
///
/// # Example
/// ```
/// use vonsim::parse::parse;
///
/// let stmts = parse("
///     ORG 2000h
///     MOV AL, 5
///     HLT
///     END
/// ").unwrap();
/// assert_eq!(stmts.len(), 4);
/// ```
pub fn parse(src: &str) -> Result<Vec<Stmt>, Vec<ParseErr>> {
    let tokens: Vec<_> = Token::lexer(src)
        .spanned()
        .filter(|(t, _)| !matches!(t, Ok(Token::Comment)))
        .collect();

    let mut parser = Parser { tokens, index: 0, labels_seen: HashMap::new(), pending: None };
    let mut stmts = vec![];
    let mut errs = vec![];
    let mut end_seen = false;

    loop {
        parser.skip_newlines();
        let Some(start_span) = parser.peek_span() else { break };

        if end_seen {
            errs.push(ParseErr::new(ParseErrKind::EndNotLast, start_span));
            parser.sync_line();
            continue;
        }

        match parser.parse_stmt() {
            Ok(stmt) => {
                end_seen = matches!(stmt.kind, StmtKind::End);
                stmts.push(stmt);
            }
            Err(e) => {
                errs.push(e);
                parser.sync_line();
            }
        }
    }

    if !end_seen {
        let end = src.len();
        errs.push(ParseErr::new(ParseErrKind::MissingEnd, end..end));
    }

    match errs.is_empty() {
        true => Ok(stmts),
        false => Err(errs),
    }
}

struct Parser {
    tokens: Vec<(Result<Token, LexErr>, Range<usize>)>,
    index: usize,
    labels_seen: HashMap<String, Range<usize>>,
    /// Label recorded for the statement currently being parsed.
    pending: Option<Label>,
}

impl Parser {
    fn peek(&self) -> Option<&Result<Token, LexErr>> {
        self.tokens.get(self.index).map(|(t, _)| t)
    }
    fn peek_span(&self) -> Option<Range<usize>> {
        self.tokens.get(self.index).map(|(_, s)| s.clone())
    }
    /// The span right after the last consumed token, for "expected X" errors.
    fn here(&self) -> Range<usize> {
        match self.tokens.get(self.index) {
            Some((_, s)) => s.clone(),
            None => {
                let end = self.tokens.last().map_or(0, |(_, s)| s.end);
                end..end
            }
        }
    }
    fn bump(&mut self) -> Option<(Result<Token, LexErr>, Range<usize>)> {
        let pair = self.tokens.get(self.index).cloned();
        if pair.is_some() {
            self.index += 1;
        }
        pair
    }
    /// Consumes the next token if it equals `tok`.
    fn eat(&mut self, tok: &Token) -> bool {
        match self.peek() {
            Some(Ok(t)) if t == tok => {
                self.index += 1;
                true
            }
            _ => false,
        }
    }
    fn at_eol(&self) -> bool {
        matches!(self.peek(), None | Some(Ok(Token::NewLine)))
    }
    fn skip_newlines(&mut self) {
        while self.eat(&Token::NewLine) {}
    }
    /// Skips tokens up to (and including) the next line break.
    fn sync_line(&mut self) {
        loop {
            match self.bump() {
                None | Some((Ok(Token::NewLine), _)) => break,
                _ => {}
            }
        }
    }

    /// Checks the next token for a lexer error and surfaces it.
    fn check_lex(&self) -> Result<(), ParseErr> {
        if let Some((Err(e), span)) = self.tokens.get(self.index) {
            return Err(ParseErr::new(ParseErrKind::Lex(*e), span.clone()));
        }
        Ok(())
    }

    fn expect_eol(&mut self) -> Result<(), ParseErr> {
        self.check_lex()?;
        match self.at_eol() {
            true => Ok(()),
            false => Err(ParseErr::new(ParseErrKind::ExpectedEol, self.here())),
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseErr> {
        self.pending = None;
        self.check_lex()?;
        let start = self.here();

        let Some(Ok(Token::Ident(ident))) = self.peek() else {
            return Err(ParseErr::new(ParseErrKind::ExpectedStatement, start));
        };
        let ident = ident.clone();
        let kind = match ident {
            Ident::ORG => {
                self.bump();
                self.check_lex()?;
                let span = self.here();
                let Some((Ok(Token::Number(n)), _)) = self.bump() else {
                    return Err(ParseErr::new(ParseErrKind::ExpectedNumber, span));
                };
                StmtKind::Org(n)
            }
            Ident::END => {
                self.bump();
                StmtKind::End
            }
            Ident::Label(name) => {
                let label = Label::new(name, start.clone());
                self.bump();
                self.eat(&Token::Colon);
                self.record_label(&label)?;
                self.parse_nucleus(Some(&label))?
            }
            _ => self.parse_nucleus(None)?,
        };
        self.expect_eol()?;

        let end = self.tokens[self.index.saturating_sub(1)].1.end;
        let label = match &kind {
            StmtKind::Org(_) | StmtKind::End => None,
            _ => self.take_pending_label(),
        };
        Ok(Stmt { label, kind, span: start.start..end })
    }

    // The label is threaded through `pending_label` instead of a parameter
    // so that `parse_stmt` can attach it after the span is known.
    fn record_label(&mut self, label: &Label) -> Result<(), ParseErr> {
        if let Some(prev) = self.labels_seen.get(&label.name) {
            return Err(ParseErr::new(
                ParseErrKind::DuplicatedLabel(label.name.clone()),
                [prev.clone(), label.span()],
            ));
        }
        self.labels_seen.insert(label.name.clone(), label.span());
        self.pending = Some(label.clone());
        Ok(())
    }
    fn take_pending_label(&mut self) -> Option<Label> {
        self.pending.take()
    }

    /// Parses the directive or instruction a (possibly labeled) line holds.
    fn parse_nucleus(&mut self, label: Option<&Label>) -> Result<StmtKind, ParseErr> {
        self.check_lex()?;
        let Some(Ok(Token::Ident(ident))) = self.peek() else {
            return Err(ParseErr::new(ParseErrKind::ExpectedStatement, self.here()));
        };

        match ident.clone() {
            Ident::DB => {
                self.bump();
                Ok(StmtKind::Data { kind: DataKind::Db, values: self.parse_data_values()? })
            }
            Ident::DW => {
                self.bump();
                Ok(StmtKind::Data { kind: DataKind::Dw, values: self.parse_data_values()? })
            }
            Ident::EQU => {
                let span = self.here();
                self.bump();
                if label.is_none() {
                    return Err(ParseErr::new(ParseErrKind::EquNeedsLabel, span));
                }
                Ok(StmtKind::Equ(self.parse_expr()?))
            }
            ident => match mnemonic_of(&ident) {
                Some(mnemonic) => {
                    self.bump();
                    Ok(StmtKind::Instr { mnemonic, operands: self.parse_operands()? })
                }
                None => Err(ParseErr::new(ParseErrKind::ExpectedStatement, self.here())),
            },
        }
    }

    fn parse_data_values(&mut self) -> Result<Vec<DataValue>, ParseErr> {
        let mut values = vec![self.parse_data_value()?];
        while self.eat(&Token::Comma) {
            values.push(self.parse_data_value()?);
        }
        Ok(values)
    }

    fn parse_data_value(&mut self) -> Result<DataValue, ParseErr> {
        self.check_lex()?;
        match self.peek() {
            Some(Ok(Token::Str(_))) => {
                let Some((Ok(Token::Str(s)), _)) = self.bump() else { unreachable!() };
                Ok(DataValue::Str(s))
            }
            Some(Ok(Token::Question)) => {
                self.bump();
                Ok(DataValue::Uninit)
            }
            Some(Ok(_)) => self.parse_expr().map(DataValue::Expr).map_err(|e| match e.kind {
                ParseErrKind::ExpectedExpr => ParseErr::new(ParseErrKind::ExpectedDataValue, e.span.first()),
                _ => e,
            }),
            _ => Err(ParseErr::new(ParseErrKind::ExpectedDataValue, self.here())),
        }
    }

    fn parse_operands(&mut self) -> Result<Vec<Operand>, ParseErr> {
        if self.at_eol() {
            return Ok(vec![]);
        }
        let mut operands = vec![self.parse_operand()?];
        while self.eat(&Token::Comma) {
            operands.push(self.parse_operand()?);
        }
        Ok(operands)
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseErr> {
        self.check_lex()?;
        let start = self.here();

        let kind = match self.peek() {
            Some(Ok(Token::Ident(id))) if id.as_reg().is_some() => {
                let reg = id.as_reg().expect("peeked register");
                self.bump();
                OperandKind::Reg(reg)
            }
            Some(Ok(Token::Ident(Ident::BYTE))) => self.parse_sized_mem(Size::Byte)?,
            Some(Ok(Token::Ident(Ident::WORD))) => self.parse_sized_mem(Size::Word)?,
            Some(Ok(Token::LBracket)) => self.parse_mem()?,
            Some(Ok(_)) => OperandKind::Expr(self.parse_expr().map_err(|e| match e.kind {
                ParseErrKind::ExpectedExpr => ParseErr::new(ParseErrKind::ExpectedOperand, e.span.first()),
                _ => e,
            })?),
            _ => return Err(ParseErr::new(ParseErrKind::ExpectedOperand, start)),
        };

        let end = self.tokens[self.index - 1].1.end;
        Ok(Operand { kind, span: start.start..end })
    }

    fn parse_sized_mem(&mut self, size: Size) -> Result<OperandKind, ParseErr> {
        self.bump();
        if !self.eat(&Token::Ident(Ident::PTR)) {
            return Err(ParseErr::new(ParseErrKind::ExpectedPtr, self.here()));
        }
        match self.parse_mem()? {
            OperandKind::Mem { mode, .. } => Ok(OperandKind::Mem { mode, size: Some(size) }),
            _ => unreachable!("parse_mem only builds memory operands"),
        }
    }

    fn parse_mem(&mut self) -> Result<OperandKind, ParseErr> {
        self.check_lex()?;
        if !self.eat(&Token::LBracket) {
            return Err(ParseErr::new(ParseErrKind::ExpectedOperand, self.here()));
        }

        let mode = match self.peek() {
            Some(Ok(Token::Ident(Ident::BX))) => {
                self.bump();
                MemMode::IndirectBx
            }
            _ => MemMode::Direct(self.parse_expr()?),
        };

        match self.eat(&Token::RBracket) {
            true => Ok(OperandKind::Mem { mode, size: None }),
            false => Err(ParseErr::new(ParseErrKind::ExpectedCloseBracket, self.here())),
        }
    }

    // Number expression grammar:
    //   expr   := factor (('+' | '-') factor)*
    //   factor := unary ('*' unary)*
    //   unary  := ('+' | '-') unary | primary
    //   primary:= number | OFFSET label | label | '(' expr ')'
    fn parse_expr(&mut self) -> Result<Expr, ParseErr> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Some(Ok(Token::Plus)) => BinOp::Add,
                Some(Ok(Token::Minus)) => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_factor()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseErr> {
        let mut lhs = self.parse_unary()?;
        while self.eat(&Token::Star) {
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary { op: BinOp::Mul, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseErr> {
        let op = match self.peek() {
            Some(Ok(Token::Plus)) => Some(UnOp::Plus),
            Some(Ok(Token::Minus)) => Some(UnOp::Minus),
            _ => None,
        };
        match op {
            Some(op) => {
                self.bump();
                let inner = self.parse_unary()?;
                Ok(Expr::Unary { op, inner: Box::new(inner) })
            }
            None => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseErr> {
        self.check_lex()?;
        let span = self.here();
        match self.peek() {
            Some(Ok(Token::Number(n))) => {
                let n = i64::from(*n);
                self.bump();
                Ok(Expr::Num(n))
            }
            Some(Ok(Token::Ident(Ident::OFFSET))) => {
                self.bump();
                self.check_lex()?;
                let span = self.here();
                let Some((Ok(Token::Ident(Ident::Label(name))), _)) = self.bump() else {
                    return Err(ParseErr::new(ParseErrKind::ExpectedLabel, span));
                };
                Ok(Expr::LabelRef { label: Label::new(name, span), offset: true })
            }
            Some(Ok(Token::Ident(Ident::Label(name)))) => {
                let name = name.clone();
                self.bump();
                Ok(Expr::LabelRef { label: Label::new(name, span), offset: false })
            }
            Some(Ok(Token::LParen)) => {
                self.bump();
                let inner = self.parse_expr()?;
                match self.eat(&Token::RParen) {
                    true => Ok(inner),
                    false => Err(ParseErr::new(ParseErrKind::ExpectedCloseParen, self.here())),
                }
            }
            _ => Err(ParseErr::new(ParseErrKind::ExpectedExpr, span)),
        }
    }
}

fn mnemonic_of(ident: &Ident) -> Option<Mnemonic> {
    let m = match ident {
        Ident::MOV => Mnemonic::Mov,
        Ident::ADD => Mnemonic::Add,
        Ident::ADC => Mnemonic::Adc,
        Ident::SUB => Mnemonic::Sub,
        Ident::SBB => Mnemonic::Sbb,
        Ident::CMP => Mnemonic::Cmp,
        Ident::NEG => Mnemonic::Neg,
        Ident::INC => Mnemonic::Inc,
        Ident::DEC => Mnemonic::Dec,
        Ident::AND => Mnemonic::And,
        Ident::OR => Mnemonic::Or,
        Ident::XOR => Mnemonic::Xor,
        Ident::NOT => Mnemonic::Not,
        Ident::PUSH => Mnemonic::Push,
        Ident::POP => Mnemonic::Pop,
        Ident::PUSHF => Mnemonic::Pushf,
        Ident::POPF => Mnemonic::Popf,
        Ident::IN => Mnemonic::In,
        Ident::OUT => Mnemonic::Out,
        Ident::JMP => Mnemonic::Jmp,
        Ident::JC => Mnemonic::Jc,
        Ident::JNC => Mnemonic::Jnc,
        Ident::JZ => Mnemonic::Jz,
        Ident::JNZ => Mnemonic::Jnz,
        Ident::JS => Mnemonic::Js,
        Ident::JNS => Mnemonic::Jns,
        Ident::JO => Mnemonic::Jo,
        Ident::JNO => Mnemonic::Jno,
        Ident::CALL => Mnemonic::Call,
        Ident::RET => Mnemonic::Ret,
        Ident::IRET => Mnemonic::Iret,
        Ident::INT => Mnemonic::Int,
        Ident::CLI => Mnemonic::Cli,
        Ident::STI => Mnemonic::Sti,
        Ident::HLT => Mnemonic::Hlt,
        Ident::NOP => Mnemonic::Nop,
        _ => return None,
    };
    Some(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Reg;

    fn parse_ok(src: &str) -> Vec<Stmt> {
        parse(src).unwrap()
    }
    fn parse_err(src: &str) -> Vec<ParseErr> {
        parse(src).unwrap_err()
    }

    #[test]
    fn test_basic_program() {
        let stmts = parse_ok("ORG 2000h\nMOV AL, 5\nHLT\nEND\n");
        assert_eq!(stmts.len(), 4);
        assert_eq!(stmts[0].kind, StmtKind::Org(0x2000));
        assert!(matches!(stmts[1].kind, StmtKind::Instr { mnemonic: Mnemonic::Mov, .. }));
        assert!(matches!(stmts[2].kind, StmtKind::Instr { mnemonic: Mnemonic::Hlt, .. }));
        assert_eq!(stmts[3].kind, StmtKind::End);
    }

    #[test]
    fn test_labels() {
        let stmts = parse_ok("ORG 1000h\nX DB 1\nORG 2000h\nLOOP: JMP LOOP\nEND");
        assert_eq!(stmts[1].label.as_ref().unwrap().name, "X");
        assert_eq!(stmts[3].label.as_ref().unwrap().name, "LOOP");
    }

    #[test]
    fn test_data_values() {
        let stmts = parse_ok("ORG 1000h\nMSG DB \"Hi\", 0\nW DW ?, 1234h\nEND");
        let StmtKind::Data { kind: DataKind::Db, values } = &stmts[1].kind else {
            panic!("expected DB")
        };
        assert_eq!(values[0], DataValue::Str("Hi".to_string()));
        assert_eq!(values[1], DataValue::Expr(Expr::Num(0)));

        let StmtKind::Data { kind: DataKind::Dw, values } = &stmts[2].kind else {
            panic!("expected DW")
        };
        assert_eq!(values[0], DataValue::Uninit);
        assert_eq!(values[1], DataValue::Expr(Expr::Num(0x1234)));
    }

    #[test]
    fn test_operand_forms() {
        let stmts = parse_ok("ORG 2000h\nMOV AX, [BX]\nMOV BYTE PTR [10h], 1\nMOV CL, [20h]\nEND");

        let StmtKind::Instr { operands, .. } = &stmts[1].kind else { panic!() };
        assert_eq!(operands[0].kind, OperandKind::Reg(Reg::AX));
        assert_eq!(operands[1].kind, OperandKind::Mem { mode: MemMode::IndirectBx, size: None });

        let StmtKind::Instr { operands, .. } = &stmts[2].kind else { panic!() };
        assert_eq!(
            operands[0].kind,
            OperandKind::Mem { mode: MemMode::Direct(Expr::Num(0x10)), size: Some(Size::Byte) }
        );

        let StmtKind::Instr { operands, .. } = &stmts[3].kind else { panic!() };
        assert_eq!(
            operands[1].kind,
            OperandKind::Mem { mode: MemMode::Direct(Expr::Num(0x20)), size: None }
        );
    }

    #[test]
    fn test_expr_precedence() {
        let stmts = parse_ok("ORG 2000h\nMOV AL, 2+3*4\nEND");
        let StmtKind::Instr { operands, .. } = &stmts[1].kind else { panic!() };
        let OperandKind::Expr(e) = &operands[1].kind else { panic!() };
        assert_eq!(e.const_eval(), Some(14));

        let stmts = parse_ok("ORG 2000h\nMOV AL, (2+3)*4\nEND");
        let StmtKind::Instr { operands, .. } = &stmts[1].kind else { panic!() };
        let OperandKind::Expr(e) = &operands[1].kind else { panic!() };
        assert_eq!(e.const_eval(), Some(20));

        let stmts = parse_ok("ORG 2000h\nMOV AL, -(1+2)\nEND");
        let StmtKind::Instr { operands, .. } = &stmts[1].kind else { panic!() };
        let OperandKind::Expr(e) = &operands[1].kind else { panic!() };
        assert_eq!(e.const_eval(), Some(-3));
    }

    #[test]
    fn test_offset_expr() {
        let stmts = parse_ok("ORG 2000h\nMOV AX, OFFSET X + 1\nEND");
        let StmtKind::Instr { operands, .. } = &stmts[1].kind else { panic!() };
        let OperandKind::Expr(Expr::Binary { lhs, .. }) = &operands[1].kind else { panic!() };
        assert!(matches!(&**lhs, Expr::LabelRef { offset: true, .. }));
    }

    #[test]
    fn test_equ() {
        let stmts = parse_ok("N EQU 5\nORG 2000h\nHLT\nEND");
        assert_eq!(stmts[0].label.as_ref().unwrap().name, "N");
        assert_eq!(stmts[0].kind, StmtKind::Equ(Expr::Num(5)));

        let errs = parse_err("EQU 5\nEND");
        assert!(errs.iter().any(|e| e.kind == ParseErrKind::EquNeedsLabel));
    }

    #[test]
    fn test_duplicated_label() {
        let errs = parse_err("ORG 1000h\nX DB 1\nX DB 2\nEND");
        assert!(errs.iter().any(|e| matches!(&e.kind, ParseErrKind::DuplicatedLabel(l) if l == "X")));
    }

    #[test]
    fn test_end_must_be_last() {
        let errs = parse_err("ORG 2000h\nHLT\nEND\nNOP");
        assert!(errs.iter().any(|e| e.kind == ParseErrKind::EndNotLast));
    }

    #[test]
    fn test_missing_end() {
        let errs = parse_err("ORG 2000h\nHLT");
        assert!(errs.iter().any(|e| e.kind == ParseErrKind::MissingEnd));
    }

    #[test]
    fn test_error_recovery_reports_all() {
        // both bad lines surface in one pass
        let errs = parse_err("ORG 2000h\nMOV AL,\n@\nHLT\nEND");
        assert!(errs.len() >= 2);
    }

    #[test]
    fn test_comments_ignored() {
        let stmts = parse_ok("; header\nORG 2000h ; code start\nHLT\nEND ; done");
        assert_eq!(stmts.len(), 3);
    }
}
