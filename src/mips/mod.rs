//! MIPS backend
//!
//! Lowers an optimized module to MARS-flavored MIPS assembly. Register
//! decisions come in three tiers:
//!
//! 1. slots colored by the register allocator live in `$s` registers,
//! 2. frame words are staged through the LRU pool in [`pool`],
//! 3. immediates and transient addresses use the `$t8/$t9` scratch pair.

pub mod asm;
pub mod pool;
pub mod registers;
pub mod translator;

pub use asm::Assembly;

use crate::ir::Module;
use crate::Result;

/// Translate every function and global of the module.
pub fn translate(module: &Module) -> Result<Assembly> {
    translator::translate(module)
}
