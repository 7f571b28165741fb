//! Intermediate Representation for Syl
//!
//! A value-graph IR sitting between the (external) front end and code
//! generation.
//!
//! ## Design Principles
//!
//! - **Arena-backed**: all instructions, blocks, functions and globals live
//!   in vectors owned by [`Module`] and are addressed by opaque ids, so the
//!   cyclic use-def graph never needs shared ownership.
//! - **Explicit use-def edges**: every instruction records who reads its
//!   result; the operand lists and use lists are kept bidirectionally
//!   consistent by the mutation API.
//! - **Fold at construction**: the builder recognizes immediate arithmetic
//!   and algebraic identities and returns a plain value instead of emitting
//!   an instruction.
//!
//! ## Pipeline
//!
//! ```text
//! Builder calls → Module → [Optimizations] → RegAlloc → MIPS
//! ```

pub mod module;
pub mod print;
pub mod types;

pub use module::{
    BlockId, Builtin, FuncId, GlobalId, InstId, InstKind, Module, Use, Value,
};
pub use types::{BinOp, CmpCond, IrType};
