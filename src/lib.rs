//! # sylc: Syl compiler middle/back end
//!
//! The part of the Syl compiler that sits behind the front end: an in-memory
//! intermediate representation, a pipeline of optimization passes, and a code
//! generator that lowers the IR to MIPS assembly through graph-coloring
//! register allocation.
//!
//! ## Pipeline
//!
//! ```text
//! Builder calls → Module → [Optimizations to fixpoint] → RegAlloc → MIPS text
//! ```
//!
//! The front end (lexer, parser, symbol tables, diagnostics) is a separate
//! component. This crate receives an already type-checked program as a
//! sequence of [`ir::Module`] builder calls and produces assembly text. It
//! performs no source-level checking of its own; every error this crate can
//! report is an internal-invariant violation, fatal by contract.

pub mod ir;
pub mod mips;
pub mod opt;
pub mod regalloc;

use thiserror::Error;

/// Internal-invariant violations. A well-formed [`ir::Module`] never
/// triggers any of these; their occurrence indicates a bug in this crate or
/// in the builder sequence, not bad user input. There is no recovery path.
#[derive(Error, Debug)]
pub enum SylcError {
    #[error("type mismatch: {message}")]
    TypeMismatch { message: String },

    /// A replace/remove was attempted on an instruction that is no longer in
    /// its own basic block, i.e. another pass already moved or removed it.
    #[error("instruction is not attached to its basic block")]
    DetachedInstruction,

    #[error("no storage assigned for value: {message}")]
    UnresolvedValue { message: String },

    #[error("call to '{func}' expects {expected} arguments, got {actual}")]
    ArgCountMismatch {
        func: String,
        expected: usize,
        actual: usize,
    },

    /// Frame layout did not account for every byte of the computed frame.
    #[error("frame layout mismatch: {leftover} bytes unaccounted")]
    FrameImbalance { leftover: i32 },

    #[error("scratch registers exhausted")]
    ScratchExhausted,

    #[error("malformed IR: {message}")]
    Ir { message: String },
}

/// Result type for sylc operations
pub type Result<T> = std::result::Result<T, SylcError>;

/// Knobs for one compilation. The front end builds one of these from its
/// command line and hands it in alongside the module.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Run the optimization pipeline to a fixpoint before translation.
    pub optimize: bool,
    /// Echo each IR instruction as a `#` comment above its lowered group.
    pub debug_comments: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            optimize: true,
            debug_comments: false,
        }
    }
}

/// Compile a built module down to MIPS assembly text.
pub fn compile(module: &mut ir::Module, options: &CompileOptions) -> Result<String> {
    if options.optimize {
        opt::optimize(module)?;
    }
    let asm = mips::translate(module)?;
    Ok(asm.render(options.debug_comments))
}
