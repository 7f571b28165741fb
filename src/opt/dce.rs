//! Dead code elimination
//!
//! Marks every instruction reachable from an effectful root (returns,
//! branches, calls, stores) through operand edges, then removes the rest.
//! Allocations are exempt; a slot whose stores all survive is trivially
//! reachable anyway, and fully dead slots fall out once dead-store
//! elimination has removed their writes.

use std::collections::HashSet;

use crate::ir::{InstId, InstKind, Module, Value};
use crate::Result;

pub fn run(module: &mut Module) -> Result<bool> {
    let mut changed = false;
    for func in super::body_funcs(module) {
        let mut work: Vec<InstId> = Vec::new();
        for &block in &module.func(func).blocks {
            for &inst in &module.block(block).insts {
                if matches!(
                    module.inst(inst).kind,
                    InstKind::Return | InstKind::Branch { .. } | InstKind::Call(_) | InstKind::Store
                ) {
                    work.push(inst);
                }
            }
        }

        let mut live: HashSet<InstId> = HashSet::new();
        while let Some(inst) = work.pop() {
            if !live.insert(inst) {
                continue;
            }
            for &op in &module.inst(inst).operands {
                if let Value::Inst(id) = op {
                    work.push(id);
                }
            }
        }

        for block in module.func(func).blocks.clone() {
            for inst in module.block(block).insts.clone() {
                if !live.contains(&inst) && !module.inst(inst).is_alloc() {
                    module.remove_inst(inst)?;
                    changed = true;
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
    fn test_unused_chain_is_removed() {
        let mut m = Module::new();
        let f = m.add_function("main", IrType::Int, vec![]);
        let b = m.add_block(f);
        let slot = m.build_alloc(f, IrType::Int).unwrap();
        m.build_store(b, Value::Imm(4), slot).unwrap();
        let x = m.build_load(b, slot).unwrap();
        let dead1 = m.build_add(b, x, Value::Imm(2)).unwrap();
        let dead2 = m.build_mul(b, dead1, x).unwrap();
        m.build_ret(b, Some(Value::Imm(0))).unwrap();

        assert!(run(&mut m).unwrap());
        assert!(m.inst(dead2.as_inst().unwrap()).block.is_none());
        assert!(m.inst(dead1.as_inst().unwrap()).block.is_none());
        // the load only fed dead arithmetic
        assert!(m.inst(x.as_inst().unwrap()).block.is_none());
        // the store and the alloc stay
        assert_eq!(m.block(b).insts.len(), 3);
    }

    #[test]
    fn test_call_roots_its_arguments() {
        let mut m = Module::new();
        let putint = m.add_builtin(crate::ir::Builtin::PutInt);
        let f = m.add_function("main", IrType::Void, vec![]);
        let b = m.add_block(f);
        let slot = m.build_alloc(f, IrType::Int).unwrap();
        m.build_store(b, Value::Imm(1), slot).unwrap();
        let x = m.build_load(b, slot).unwrap();
        let y = m.build_add(b, x, Value::Imm(1)).unwrap();
        m.build_call(b, putint, vec![y]).unwrap();
        m.build_ret(b, None).unwrap();

        assert!(!run(&mut m).unwrap());
        assert!(m.inst(y.as_inst().unwrap()).block.is_some());
        assert!(m.inst(x.as_inst().unwrap()).block.is_some());
    }

    #[test]
    fn test_branch_condition_stays() {
        let mut m = Module::new();
        let f = m.add_function("main", IrType::Int, vec![]);
        let b0 = m.add_block(f);
        let b1 = m.add_block(f);
        let slot = m.build_alloc(f, IrType::Int).unwrap();
        m.build_store(b0, Value::Imm(1), slot).unwrap();
        let x = m.build_load(b0, slot).unwrap();
        let c = m
            .build_icmp(b0, crate::ir::CmpCond::Ne, x, Value::Imm(0))
            .unwrap();
        m.build_br_cond(b0, c, b1, b1).unwrap();
        m.build_ret(b1, Some(Value::Imm(0))).unwrap();

        assert!(!run(&mut m).unwrap());
        assert!(m.inst(c.as_inst().unwrap()).block.is_some());
        assert!(m.inst(x.as_inst().unwrap()).block.is_some());
    }
}
