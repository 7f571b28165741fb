//! Block-local constant propagation through stack slots
//!
//! Tracks, within a single block, which scalar slots currently hold a known
//! immediate. A store of an immediate to a slot records it; a load from a
//! recorded slot is replaced by the immediate outright. Knowledge never
//! crosses block boundaries, so no merge logic is needed; the fixpoint
//! driver picks up whatever the replacement exposes.
//!
//! Only a store to the slot itself clears its entry. Stores through element
//! pointers or globals cannot touch a scalar slot, whose address never
//! escapes its own loads and stores, so they leave the map alone.

use std::collections::HashMap;

use crate::ir::{InstId, InstKind, Module, Value};
use crate::Result;

pub fn run(module: &mut Module) -> Result<bool> {
    let mut changed = false;
    for func in super::body_funcs(module) {
        for block in module.func(func).blocks.clone() {
            let mut known: HashMap<InstId, i32> = HashMap::new();
            for inst in module.block(block).insts.clone() {
                let data = module.inst(inst);
                match data.kind {
                    InstKind::Store => {
                        if let Value::Inst(ptr) = data.operands[1] {
                            match data.operands[0] {
                                Value::Imm(v) if module.inst(ptr).is_alloc() => {
                                    known.insert(ptr, v);
                                }
                                _ => {
                                    known.remove(&ptr);
                                }
                            }
                        }
                    }
                    InstKind::Load => {
                        if let Value::Inst(ptr) = data.operands[0] {
                            if let Some(&v) = known.get(&ptr) {
                                module.replace_all_uses(inst, Value::Imm(v), false)?;
                                changed = true;
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(changed)
}
