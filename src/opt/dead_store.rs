//! Dead store elimination
//!
//! Walks each block backwards carrying the set of slots whose current value
//! is still wanted, seeded from the block's live-out. A store to a slot
//! nobody will read again is removed; a load re-arms the slot. Built on the
//! same slot liveness the register allocator uses, so the two always agree
//! on which writes matter.

use crate::ir::{InstKind, Module, Value};
use crate::opt::liveness;
use crate::Result;

pub fn run(module: &mut Module) -> Result<bool> {
    let mut changed = false;
    for func in super::body_funcs(module) {
        let tracked = liveness::tracked_slots(module, func);
        let live = liveness::analyze(module, func);
        for block in module.func(func).blocks.clone() {
            let mut wanted = live.live_out[&block].clone();
            for inst in module.block(block).insts.clone().into_iter().rev() {
                let data = module.inst(inst);
                match data.kind {
                    InstKind::Load => {
                        if let Value::Inst(slot) = data.operands[0] {
                            if tracked.contains(&slot) {
                                wanted.insert(slot);
                            }
                        }
                    }
                    InstKind::Store => {
                        if let Value::Inst(slot) = data.operands[1] {
                            if tracked.contains(&slot) && !wanted.remove(&slot) {
                                module.remove_inst(inst)?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IrType;

    #[test]
    fn test_overwritten_store_is_removed() {
        let mut m = Module::new();
        let f = m.add_function("main", IrType::Int, vec![]);
        let b = m.add_block(f);
        let slot = m.build_alloc(f, IrType::Int).unwrap();
        let s1 = m.build_store(b, Value::Imm(1), slot).unwrap();
        let s2 = m.build_store(b, Value::Imm(2), slot).unwrap();
        let x = m.build_load(b, slot).unwrap();
        m.build_ret(b, Some(x)).unwrap();

        assert!(run(&mut m).unwrap());
        assert!(m.inst(s1.as_inst().unwrap()).block.is_none());
        assert!(m.inst(s2.as_inst().unwrap()).block.is_some());
    }

    #[test]
    fn test_store_read_later_survives() {
        let mut m = Module::new();
        let f = m.add_function("main", IrType::Int, vec![]);
        let b = m.add_block(f);
        let slot = m.build_alloc(f, IrType::Int).unwrap();
        let s1 = m.build_store(b, Value::Imm(1), slot).unwrap();
        let x = m.build_load(b, slot).unwrap();
        let s2 = m.build_store(b, Value::Imm(2), slot).unwrap();
        let y = m.build_load(b, slot).unwrap();
        let sum = m.build_add(b, x, y).unwrap();
        m.build_ret(b, Some(sum)).unwrap();

        assert!(!run(&mut m).unwrap());
        assert!(m.inst(s1.as_inst().unwrap()).block.is_some());
        assert!(m.inst(s2.as_inst().unwrap()).block.is_some());
    }

    #[test]
    fn test_store_live_across_blocks_survives() {
        let mut m = Module::new();
        let f = m.add_function("main", IrType::Int, vec![]);
        let b0 = m.add_block(f);
        let b1 = m.add_block(f);
        let slot = m.build_alloc(f, IrType::Int).unwrap();
        let s = m.build_store(b0, Value::Imm(3), slot).unwrap();
        m.build_br(b0, b1).unwrap();
        let x = m.build_load(b1, slot).unwrap();
        m.build_ret(b1, Some(x)).unwrap();

        assert!(!run(&mut m).unwrap());
        assert!(m.inst(s.as_inst().unwrap()).block.is_some());
    }

    #[test]
    fn test_unread_slot_loses_all_stores() {
        let mut m = Module::new();
        let f = m.add_function("main", IrType::Int, vec![IrType::Int]);
        let b = m.add_block(f);
        let shadow = m.build_alloc(f, IrType::Int).unwrap();
        let s = m.build_store(b, Value::Arg(0), shadow).unwrap();
        m.build_ret(b, Some(Value::Imm(0))).unwrap();

        // even the argument shadow store goes once nothing reads the slot
        assert!(run(&mut m).unwrap());
        assert!(m.inst(s.as_inst().unwrap()).block.is_none());
    }

    #[test]
    fn test_element_stores_untouched() {
        let mut m = Module::new();
        let f = m.add_function("main", IrType::Void, vec![]);
        let b = m.add_block(f);
        let arr = m.build_alloc(f, IrType::Array { dims: vec![4] }).unwrap();
        let p = m.build_gep(b, arr, vec![Value::Imm(0), Value::Imm(2)]).unwrap();
        let s = m.build_store(b, Value::Imm(5), p).unwrap();
        m.build_ret(b, None).unwrap();

        assert!(!run(&mut m).unwrap());
        assert!(m.inst(s.as_inst().unwrap()).block.is_some());
    }
}
