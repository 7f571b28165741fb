//! Per-block live-variable analysis over stack slots
//!
//! The IR keeps every local variable in a stack slot behind explicit loads
//! and stores, so liveness is phrased over allocation instructions rather
//! than SSA values. Only scalar slots participate; arrays always live in
//! memory.
//!
//! A block *uses* a slot it loads from and *defines* a slot it stores to,
//! with one exception: the argument-shadow stores the front end emits on
//! entry do not count as definitions, so an argument slot read anywhere
//! stays live into the entry block and its shadow store survives dead-store
//! elimination.

use std::collections::{HashMap, HashSet};

use crate::ir::{BlockId, FuncId, InstId, InstKind, Module, Value};

/// Live-in and live-out slot sets for every block of one function.
pub struct Liveness {
    pub live_in: HashMap<BlockId, HashSet<InstId>>,
    pub live_out: HashMap<BlockId, HashSet<InstId>>,
}

/// The slots liveness ranges over: scalar allocations in the entry block.
pub fn tracked_slots(module: &Module, func: FuncId) -> HashSet<InstId> {
    let Some(entry) = module.entry_block(func) else {
        return HashSet::new();
    };
    module
        .block(entry)
        .insts
        .iter()
        .copied()
        .filter(|&i| {
            module
                .inst(i)
                .alloc_data_type()
                .is_some_and(|t| t.is_scalar())
        })
        .collect()
}

/// Backward dataflow to a fixpoint. Blocks are walked in reverse layout
/// order each round, which converges quickly on the mostly-forward control
/// flow the front end produces.
pub fn analyze(module: &Module, func: FuncId) -> Liveness {
    let tracked = tracked_slots(module, func);
    let blocks = module.func(func).blocks.clone();

    let mut uses: HashMap<BlockId, HashSet<InstId>> = HashMap::new();
    let mut defs: HashMap<BlockId, HashSet<InstId>> = HashMap::new();
    for &block in &blocks {
        let mut use_set = HashSet::new();
        let mut def_set = HashSet::new();
        for &inst in &module.block(block).insts {
            let data = module.inst(inst);
            match data.kind {
                InstKind::Load => {
                    if let Value::Inst(slot) = data.operands[0] {
                        if tracked.contains(&slot) {
                            use_set.insert(slot);
                        }
                    }
                }
                InstKind::Store => {
                    if let Value::Inst(slot) = data.operands[1] {
                        let shadows_arg = matches!(data.operands[0], Value::Arg(_));
                        if tracked.contains(&slot) && !shadows_arg {
                            def_set.insert(slot);
                        }
                    }
                }
                _ => {}
            }
        }
        uses.insert(block, use_set);
        defs.insert(block, def_set);
    }

    let mut live_in: HashMap<BlockId, HashSet<InstId>> =
        blocks.iter().map(|&b| (b, uses[&b].clone())).collect();
    let mut live_out: HashMap<BlockId, HashSet<InstId>> =
        blocks.iter().map(|&b| (b, HashSet::new())).collect();

    loop {
        let mut grew = false;
        for &block in blocks.iter().rev() {
            let mut out = HashSet::new();
            for succ in module.successors(block) {
                out.extend(live_in[&succ].iter().copied());
            }
            let in_set = live_in.entry(block).or_default();
            for &slot in &out {
                if !defs[&block].contains(&slot) && in_set.insert(slot) {
                    grew = true;
                }
            }
            live_out.insert(block, out);
        }
        if !grew {
            return Liveness { live_in, live_out };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CmpCond, IrType};

    // entry: x = alloc; store 1, x; br cond ? body : exit
    // body:  t = load x; store t+1, x; br entry
    // exit:  ret load x
    fn loop_func() -> (Module, FuncId, Vec<BlockId>, InstId) {
        let mut m = Module::new();
        let f = m.add_function("main", IrType::Int, vec![]);
        let entry = m.add_block(f);
        let body = m.add_block(f);
        let exit = m.add_block(f);
        let x = m.build_alloc(f, IrType::Int).unwrap();
        m.build_store(entry, Value::Imm(1), x).unwrap();
        let v = m.build_load(entry, x).unwrap();
        let c = m.build_icmp(entry, CmpCond::Slt, v, Value::Imm(10)).unwrap();
        m.build_br_cond(entry, c, body, exit).unwrap();
        let t = m.build_load(body, x).unwrap();
        let t1 = m.build_add(body, t, Value::Imm(1)).unwrap();
        m.build_store(body, t1, x).unwrap();
        m.build_br(body, entry).unwrap();
        let r = m.build_load(exit, x).unwrap();
        m.build_ret(exit, Some(r)).unwrap();
        let slot = x.as_inst().unwrap();
        (m, f, vec![entry, body, exit], slot)
    }

    #[test]
    fn test_loop_variable_live_around_backedge() {
        let (m, f, blocks, x) = loop_func();
        let live = analyze(&m, f);
        let (entry, body, exit) = (blocks[0], blocks[1], blocks[2]);
        assert!(live.live_out[&entry].contains(&x));
        assert!(live.live_in[&body].contains(&x));
        assert!(live.live_out[&body].contains(&x));
        assert!(live.live_in[&exit].contains(&x));
        assert!(live.live_out[&exit].is_empty());
    }

    #[test]
    fn test_array_slots_not_tracked() {
        let mut m = Module::new();
        let f = m.add_function("main", IrType::Void, vec![]);
        let b = m.add_block(f);
        let scalar = m.build_alloc(f, IrType::Int).unwrap().as_inst().unwrap();
        let array = m
            .build_alloc(f, IrType::Array { dims: vec![4] })
            .unwrap()
            .as_inst()
            .unwrap();
        m.build_ret(b, None).unwrap();
        let tracked = tracked_slots(&m, f);
        assert!(tracked.contains(&scalar));
        assert!(!tracked.contains(&array));
    }

    #[test]
    fn test_arg_shadow_store_is_not_a_def() {
        let mut m = Module::new();
        let f = m.add_function("id", IrType::Int, vec![IrType::Int]);
        let b = m.add_block(f);
        let slot = m.build_alloc(f, IrType::Int).unwrap();
        m.build_store(b, Value::Arg(0), slot).unwrap();
        let v = m.build_load(b, slot).unwrap();
        m.build_ret(b, Some(v)).unwrap();

        let live = analyze(&m, f);
        // the load keeps the slot in the entry's live-in despite the store
        assert!(live.live_in[&b].contains(&slot.as_inst().unwrap()));
    }
}
