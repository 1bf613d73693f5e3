//! An assembler and cycle-accurate simulator for an educational
//! 8088-derived instruction set.
//!
//! The crate is two tightly coupled halves:
//! - an **assembler** ([`compile`]) that turns a small, case-insensitive
//!   assembly dialect into a byte-exact [`Program`] image, and
//! - a **simulator** ([`sim::Simulator`]) that executes that image against a
//!   deterministic model of CPU, memory, interrupt controller, timer,
//!   parallel I/O, handshake, and the devices behind them, exposed as a
//!   consumer-paced event stream.
//!
//! # Usage
//!
//! Compile source and run it:
//!
//! ```
//! use vonsim::compile;
//! use vonsim::sim::Simulator;
//!
//! let program = compile("
//!     ORG 1000h
//!     X DB 0
//!     ORG 2000h
//!     MOV AL, X
//!     INC AL
//!     MOV X, AL
//!     HLT
//!     END
//! ").unwrap();
//!
//! let mut sim = Simulator::default();
//! sim.load_program(&program, Default::default());
//! sim.start_cpu().run_to_completion();
//!
//! assert_eq!(sim.mem.read_byte(0x1000), Ok(1));
//! ```
//!
//! Compilation failures report every problem at once, with stable error
//! codes and source positions:
//!
//! ```
//! use vonsim::compile;
//!
//! let errors = compile("ORG 2000h\nMOV AL, BX\nHLT\nEND").unwrap_err();
//! assert_eq!(errors[0].code, "size-mismatch");
//! assert_eq!(errors[0].line, 1);
//! ```
#![warn(missing_docs)]

pub mod asm;
pub mod ast;
pub mod err;
pub mod parse;
pub mod sim;
pub mod value;

pub use asm::Program;

use err::SourceInfo;

/// One compilation error, positioned in the source.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CompileError {
    /// The stable kebab-case identifier of the error kind.
    pub code: &'static str,
    /// The human-readable message.
    pub message: String,
    /// Zero-indexed source line.
    pub line: usize,
    /// Zero-indexed column within the line.
    pub column: usize,
    /// Byte offset in the source.
    pub offset: usize,
}
impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {} [{}]", self.line + 1, self.column + 1, self.message, self.code)
    }
}
impl std::error::Error for CompileError {}

fn to_compile_errors<E: err::Error>(info: &SourceInfo, errs: Vec<E>) -> Vec<CompileError> {
    errs.into_iter()
        .map(|e| {
            let offset = e.span().map_or(0, |span| span.first().start);
            let (line, column) = info.get_pos_pair(offset);
            CompileError { code: e.code(), message: e.to_string(), line, column, offset }
        })
        .collect()
}

/// Compiles assembly source into a loadable [`Program`].
///
/// The pipeline is lexing and parsing, semantic validation, and two-pass
/// address resolution and encoding. Each phase accumulates every error it
/// can find before giving up, so a failing compile reports as many
/// problems as possible.
pub fn compile(source: &str) -> Result<Program, Vec<CompileError>> {
    let info = SourceInfo::new(source);

    let stmts = parse::parse(source).map_err(|es| to_compile_errors(&info, es))?;
    let checked = asm::validate::check(stmts).map_err(|es| to_compile_errors(&info, es))?;
    asm::assemble(checked).map_err(|es| to_compile_errors(&info, es))
}

#[cfg(test)]
mod tests {
    use super::compile;

    #[test]
    fn test_compile_success() {
        let program = compile("ORG 2000h\nMOV AX, 1\nHLT\nEND").unwrap();
        assert_eq!(program.entry(), Some(0x2000));
        assert_eq!(program.instructions.len(), 2);
    }

    #[test]
    fn test_errors_carry_positions() {
        // every statement of a phase reports, in source order
        let errs = compile("ORG 2000h\nMOV AL, BX\nMOV 5, AL\nHLT\nEND").unwrap_err();
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].code, "size-mismatch");
        assert_eq!(errs[0].line, 1);
        assert_eq!(errs[1].code, "destination-cannot-be-immediate");
        assert_eq!(errs[1].line, 2);
    }

    #[test]
    fn test_resolution_error_position() {
        let errs = compile("ORG 2000h\nMOV AL, 300\nHLT\nEND").unwrap_err();
        assert_eq!(errs[0].code, "value-out-of-range");
        assert_eq!(errs[0].line, 1);
    }

    #[test]
    fn test_parse_errors_aggregate() {
        let errs = compile("ORG 2000h\nMOV AL,\n@@@\nHLT\nEND").unwrap_err();
        assert!(errs.len() >= 2);
        assert!(errs.iter().all(|e| !e.message.is_empty()));
    }
}
