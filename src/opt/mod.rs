//! Optimization pipeline
//!
//! Every pass is a plain function `run(&mut Module) -> Result<bool>` that
//! reports whether it changed anything. [`optimize`] runs the whole pipeline
//! repeatedly until a full round leaves the module untouched; each pass is
//! individually sound, so the fixpoint loop is free to reorder discoveries
//! between rounds (a constant exposed by value numbering feeds the next
//! round's propagation, and so on).

pub mod const_fold;
pub mod const_prop;
pub mod dce;
pub mod dead_store;
pub mod liveness;
pub mod lvn;
pub mod peephole;

use crate::ir::{FuncId, Module};
use crate::Result;

/// Run all passes to a fixpoint.
pub fn optimize(module: &mut Module) -> Result<()> {
    let mut round = 0u32;
    loop {
        round += 1;
        let mut changed = false;
        changed |= const_fold::run(module)?;
        changed |= const_prop::run(module)?;
        changed |= lvn::run(module)?;
        changed |= dce::run(module)?;
        changed |= dead_store::run(module)?;
        changed |= peephole::run(module)?;
        log::debug!(
            "optimization round {}: {}",
            round,
            if changed { "changed" } else { "stable" }
        );
        if !changed {
            return Ok(());
        }
    }
}

/// Functions that carry a body; builtins and library declarations have
/// nothing to optimize.
pub(crate) fn body_funcs(module: &Module) -> Vec<FuncId> {
    module
        .func_ids()
        .filter(|&f| {
            let data = module.func(f);
            data.builtin.is_none() && !data.is_library && !data.blocks.is_empty()
        })
        .collect()
}
