//! Tokenizing assembly source.
//!
//! This module holds the tokens that characterize the assembly dialect
//! ([`Token`]). It is used by the parser to facilitate the conversion of
//! assembly source code into an AST.
//!
//! The module's key data structure is the [`Token`] enum,
//! which lists all of the tokens of the dialect.

use logos::{Lexer, Logos};

use crate::ast::Reg;

/// A unit of information in assembly source code.
#[derive(Debug, Logos, PartialEq, Eq, Clone)]
#[logos(skip r"[ \t]+", error = LexErr)]
pub enum Token {
    // These regexes span over tokens that are technically invalid
    // (e.g., 23xyz matches for a number even though it shouldn't).
    // This is intended.
    // The regex collects one discernable unit and the callback validates it.

    /// A numeric literal: decimal (`123`), hex (`7Fh`), or binary (`1010b`).
    ///
    /// Suffixes are case-insensitive. Hex literals must start with a digit.
    #[regex(r"\d\w*", lex_number)]
    Number(u16),

    /// An identifier.
    ///
    /// This can refer to a register, a mnemonic, a directive keyword, or a
    /// label. Reserved words are matched case-insensitively before labels.
    #[regex(r"[A-Za-z_]\w*", |lx| lx.slice().parse::<Ident>().expect("should be infallible"))]
    Ident(Ident),

    /// A string literal (e.g., `"Hello!"`). ASCII only, single-line.
    #[token(r#"""#, lex_str_literal)]
    Str(String),

    /// The `?` marker for uninitialized data.
    #[token("?")]
    Question,

    /// A colon, which follows instruction labels.
    #[token(":")]
    Colon,

    /// A comma, which delineates operands and data values.
    #[token(",")]
    Comma,

    /// An opening bracket, starting a memory operand.
    #[token("[")]
    LBracket,

    /// A closing bracket.
    #[token("]")]
    RBracket,

    /// An opening parenthesis (grouping in number expressions).
    #[token("(")]
    LParen,

    /// A closing parenthesis.
    #[token(")")]
    RParen,

    /// A plus sign.
    #[token("+")]
    Plus,

    /// A minus sign.
    #[token("-")]
    Minus,

    /// An asterisk (multiplication in number expressions).
    #[token("*")]
    Star,

    /// A comment, which starts with a semicolon and spans the rest of the line.
    #[regex(r";[^\n]*")]
    Comment,

    /// A new line.
    #[regex(r"\r?\n")]
    NewLine,
}

macro_rules! ident_enum {
    ($($word:ident),+) => {
        /// An identifier.
        ///
        /// This can refer to a reserved word (a register, a mnemonic, or a
        /// directive keyword) or a label. Reserved words match
        /// case-insensitively and before labels.
        #[derive(Debug, PartialEq, Eq, Clone)]
        pub enum Ident {
            $(
                #[allow(missing_docs)]
                $word
            ),+,
            /// A label name, uppercased for comparison.
            Label(String)
        }

        impl std::str::FromStr for Ident {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match &*s.to_uppercase() {
                    $(stringify!($word) => Ok(Self::$word)),*,
                    upper => Ok(Self::Label(upper.to_string()))
                }
            }
        }

        impl std::fmt::Display for Ident {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$word => f.write_str(stringify!($word))),*,
                    Self::Label(id) => f.write_str(id)
                }
            }
        }
    };
}
ident_enum! {
    // registers
    AX, BX, CX, DX, SP, IP, AL, AH, BL, BH, CL, CH, DL, DH,
    // data transfer and arithmetic
    MOV, ADD, ADC, SUB, SBB, CMP, NEG, INC, DEC,
    // logic
    AND, OR, XOR, NOT,
    // stack
    PUSH, POP, PUSHF, POPF,
    // I/O
    IN, OUT,
    // control
    JMP, JC, JNC, JZ, JNZ, JS, JNS, JO, JNO, CALL, RET, IRET,
    // misc
    INT, CLI, STI, HLT, NOP,
    // directives
    ORG, END, DB, DW, EQU, OFFSET, PTR, BYTE, WORD
}

impl Ident {
    /// The register this identifier names, if it names one.
    pub fn as_reg(&self) -> Option<Reg> {
        let reg = match self {
            Ident::AX => Reg::AX,
            Ident::BX => Reg::BX,
            Ident::CX => Reg::CX,
            Ident::DX => Reg::DX,
            Ident::SP => Reg::SP,
            Ident::IP => Reg::IP,
            Ident::AL => Reg::AL,
            Ident::AH => Reg::AH,
            Ident::BL => Reg::BL,
            Ident::BH => Reg::BH,
            Ident::CL => Reg::CL,
            Ident::CH => Reg::CH,
            Ident::DL => Reg::DL,
            Ident::DH => Reg::DH,
            _ => return None,
        };
        Some(reg)
    }
}

/// Any errors raised in attempting to tokenize an input stream.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum LexErr {
    /// Numeric literal cannot fit within the range of a u16.
    DoesNotFitU16,
    /// Numeric literal has invalid decimal digits.
    InvalidDec,
    /// Numeric literal with an `h` suffix has invalid hex digits.
    InvalidHex,
    /// Numeric literal with a `b` suffix has digits other than 0 and 1.
    InvalidBin,
    /// String literal is missing an end quotation mark.
    UnclosedStrLit,
    /// String literal holds characters outside the printable ASCII range.
    NonAsciiStrLit,
    /// A symbol was used which does not occur in any token of the dialect.
    #[default]
    InvalidSymbol,
}
impl std::fmt::Display for LexErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErr::DoesNotFitU16 => f.write_str("numeric literal does not fit 16-bit unsigned integer"),
            LexErr::InvalidDec => f.write_str("invalid decimal literal"),
            LexErr::InvalidHex => f.write_str("invalid hex literal"),
            LexErr::InvalidBin => f.write_str("invalid binary literal"),
            LexErr::UnclosedStrLit => f.write_str("unterminated string"),
            LexErr::NonAsciiStrLit => f.write_str("string literals may only hold printable ASCII"),
            LexErr::InvalidSymbol => f.write_str("unexpected character"),
        }
    }
}
impl std::error::Error for LexErr {}
impl crate::err::Error for LexErr {
    fn code(&self) -> &'static str {
        match self {
            LexErr::UnclosedStrLit => "unterminated-string",
            LexErr::NonAsciiStrLit => "non-ascii-string",
            LexErr::InvalidSymbol => "unexpected-character",
            _ => "invalid-number-literal",
        }
    }

    fn help(&self) -> Option<std::borrow::Cow<'_, str>> {
        match self {
            LexErr::DoesNotFitU16 => Some(format!("the range for a numeric literal is [0, {}]", u16::MAX).into()),
            LexErr::InvalidDec => Some("a decimal literal only consists of digits 0-9".into()),
            LexErr::InvalidHex => Some("a hex literal consists of digits 0-9, A-F, ends with 'h' and starts with a digit".into()),
            LexErr::InvalidBin => Some("a binary literal consists of digits 0-1 and ends with 'b'".into()),
            LexErr::UnclosedStrLit => Some("add a quote before the end of the line".into()),
            LexErr::NonAsciiStrLit => None,
            LexErr::InvalidSymbol => Some("this character does not occur in any token of the assembly dialect".into()),
        }
    }
}

fn lex_number(lx: &Lexer<'_, Token>) -> Result<u16, LexErr> {
    let slice = lx.slice();

    // The suffix picks the radix; 'h' wins over 'b' so that 1Bh parses as hex.
    if let Some(digits) = slice.strip_suffix(['h', 'H']) {
        return u16::from_str_radix(digits, 16).map_err(|e| match e.kind() {
            std::num::IntErrorKind::PosOverflow => LexErr::DoesNotFitU16,
            _ => LexErr::InvalidHex,
        });
    }
    if let Some(digits) = slice.strip_suffix(['b', 'B']) {
        return u16::from_str_radix(digits, 2).map_err(|e| match e.kind() {
            std::num::IntErrorKind::PosOverflow => LexErr::DoesNotFitU16,
            _ => LexErr::InvalidBin,
        });
    }
    slice.parse::<u16>().map_err(|e| match e.kind() {
        std::num::IntErrorKind::PosOverflow => LexErr::DoesNotFitU16,
        _ => LexErr::InvalidDec,
    })
}

fn lex_str_literal(lx: &mut Lexer<'_, Token>) -> Result<String, LexErr> {
    let rem = lx.remainder().lines().next().unwrap_or("");

    // consume up to and including the closing quote
    let Some(len) = rem.find('"') else {
        lx.bump(rem.len());
        return Err(LexErr::UnclosedStrLit);
    };
    lx.bump(len + 1);

    let inner = &lx.slice()[1..(lx.slice().len() - 1)];
    match inner.bytes().all(|b| (0x20..0x7F).contains(&b)) {
        true => Ok(inner.to_string()),
        false => Err(LexErr::NonAsciiStrLit),
    }
}

#[cfg(test)]
mod tests {
    use logos::Logos;

    use super::{Ident, LexErr, Token};

    fn label(s: &str) -> Token {
        Token::Ident(Ident::Label(s.to_string()))
    }
    fn str_literal(s: &str) -> Token {
        Token::Str(s.to_string())
    }

    #[test]
    fn test_numeric_dec() {
        let mut tokens = Token::lexer("0 123 456 65535");
        assert_eq!(tokens.next(), Some(Ok(Token::Number(0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Number(123))));
        assert_eq!(tokens.next(), Some(Ok(Token::Number(456))));
        assert_eq!(tokens.next(), Some(Ok(Token::Number(65535))));
        assert_eq!(tokens.next(), None);

        assert_eq!(Token::lexer("65536").next(), Some(Err(LexErr::DoesNotFitU16)));
        assert_eq!(Token::lexer("12q3").next(), Some(Err(LexErr::InvalidDec)));
    }

    #[test]
    fn test_numeric_hex() {
        let mut tokens = Token::lexer("0h 7Fh 0FFh 3fffH 1Bh");
        assert_eq!(tokens.next(), Some(Ok(Token::Number(0x0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Number(0x7F))));
        assert_eq!(tokens.next(), Some(Ok(Token::Number(0xFF))));
        assert_eq!(tokens.next(), Some(Ok(Token::Number(0x3FFF))));
        assert_eq!(tokens.next(), Some(Ok(Token::Number(0x1B))));
        assert_eq!(tokens.next(), None);

        // without a leading digit this is an identifier, not a number
        assert_eq!(Token::lexer("FFh").next(), Some(Ok(label("FFH"))));

        assert_eq!(Token::lexer("0GGh").next(), Some(Err(LexErr::InvalidHex)));
        assert_eq!(Token::lexer("10000h").next(), Some(Err(LexErr::DoesNotFitU16)));
    }

    #[test]
    fn test_numeric_bin() {
        let mut tokens = Token::lexer("0b 1b 1010b 11111111B");
        assert_eq!(tokens.next(), Some(Ok(Token::Number(0))));
        assert_eq!(tokens.next(), Some(Ok(Token::Number(1))));
        assert_eq!(tokens.next(), Some(Ok(Token::Number(0b1010))));
        assert_eq!(tokens.next(), Some(Ok(Token::Number(0xFF))));
        assert_eq!(tokens.next(), None);

        assert_eq!(Token::lexer("102b").next(), Some(Err(LexErr::InvalidBin)));
    }

    #[test]
    fn test_keywords_and_labels() {
        // Case insensitivity
        let mut tokens = Token::lexer("mov MOV Mov hlt Db offset");
        assert_eq!(tokens.next(), Some(Ok(Token::Ident(Ident::MOV))));
        assert_eq!(tokens.next(), Some(Ok(Token::Ident(Ident::MOV))));
        assert_eq!(tokens.next(), Some(Ok(Token::Ident(Ident::MOV))));
        assert_eq!(tokens.next(), Some(Ok(Token::Ident(Ident::HLT))));
        assert_eq!(tokens.next(), Some(Ok(Token::Ident(Ident::DB))));
        assert_eq!(tokens.next(), Some(Ok(Token::Ident(Ident::OFFSET))));
        assert_eq!(tokens.next(), None);

        // Labels are uppercased for comparison
        let mut tokens = Token::lexer("loop_start x _tmp");
        assert_eq!(tokens.next(), Some(Ok(label("LOOP_START"))));
        assert_eq!(tokens.next(), Some(Ok(label("X"))));
        assert_eq!(tokens.next(), Some(Ok(label("_TMP"))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_registers() {
        let mut tokens = Token::lexer("ax bl SP dh");
        assert_eq!(tokens.next(), Some(Ok(Token::Ident(Ident::AX))));
        assert_eq!(tokens.next(), Some(Ok(Token::Ident(Ident::BL))));
        assert_eq!(tokens.next(), Some(Ok(Token::Ident(Ident::SP))));
        assert_eq!(tokens.next(), Some(Ok(Token::Ident(Ident::DH))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_str() {
        let mut tokens = Token::lexer(r#" "Hello, world!" "" "a" "#);
        assert_eq!(tokens.next(), Some(Ok(str_literal("Hello, world!"))));
        assert_eq!(tokens.next(), Some(Ok(str_literal(""))));
        assert_eq!(tokens.next(), Some(Ok(str_literal("a"))));
        assert_eq!(tokens.next(), None);

        assert_eq!(Token::lexer(r#""oops"#).next(), Some(Err(LexErr::UnclosedStrLit)));
        assert_eq!(Token::lexer("\"ab\ncd\"").next(), Some(Err(LexErr::UnclosedStrLit)));
    }

    #[test]
    fn test_punct() {
        let mut tokens = Token::lexer("x: db ?, 2\n[bx] (1+2)*3 ; trailing");
        assert_eq!(tokens.next(), Some(Ok(label("X"))));
        assert_eq!(tokens.next(), Some(Ok(Token::Colon)));
        assert_eq!(tokens.next(), Some(Ok(Token::Ident(Ident::DB))));
        assert_eq!(tokens.next(), Some(Ok(Token::Question)));
        assert_eq!(tokens.next(), Some(Ok(Token::Comma)));
        assert_eq!(tokens.next(), Some(Ok(Token::Number(2))));
        assert_eq!(tokens.next(), Some(Ok(Token::NewLine)));
        assert_eq!(tokens.next(), Some(Ok(Token::LBracket)));
        assert_eq!(tokens.next(), Some(Ok(Token::Ident(Ident::BX))));
        assert_eq!(tokens.next(), Some(Ok(Token::RBracket)));
        assert_eq!(tokens.next(), Some(Ok(Token::LParen)));
        assert_eq!(tokens.next(), Some(Ok(Token::Number(1))));
        assert_eq!(tokens.next(), Some(Ok(Token::Plus)));
        assert_eq!(tokens.next(), Some(Ok(Token::Number(2))));
        assert_eq!(tokens.next(), Some(Ok(Token::RParen)));
        assert_eq!(tokens.next(), Some(Ok(Token::Star)));
        assert_eq!(tokens.next(), Some(Ok(Token::Number(3))));
        assert_eq!(tokens.next(), Some(Ok(Token::Comment)));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_invalid_symbol() {
        assert_eq!(Token::lexer("@").next(), Some(Err(LexErr::InvalidSymbol)));
        assert_eq!(Token::lexer("{").next(), Some(Err(LexErr::InvalidSymbol)));
    }
}
