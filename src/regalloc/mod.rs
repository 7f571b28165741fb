//! Register allocation and frame layout
//!
//! Chaitin-style graph coloring over stack slots, at block granularity: two
//! slots interfere when both are live into or out of the same block. Colored
//! slots live their whole life in an `$s` register; everything else gets a
//! word in the frame and is staged through the temp register pool during
//! translation.
//!
//! Frame picture, offsets from the callee's `$sp` after its prologue:
//!
//! ```text
//! local_size + 4*argc  ┬ caller's saved registers
//! local_size + 4*i     │ argument i (first four slots shadow $a0..$a3)
//! local_size           ┼ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─ ─
//!                      │ spilled slots, arrays, instruction temporaries
//! 0                    ┴
//! ```
//!
//! The caller reserves the argument area as part of its call sequence; the
//! callee prologue extends the stack by `local_size` only.

pub mod graph;

use std::collections::{HashMap, HashSet};

use crate::ir::{FuncId, InstId, InstKind, IrType, Module, Value};
use crate::mips::registers::{Reg, ARG_REGS, COLOR_REGS};
use crate::opt::liveness;
use crate::{Result, SylcError};
use graph::InterferenceGraph;

/// Where a value lives for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Reg(Reg),
    /// Byte offset from `$sp` after the function prologue
    Frame(u32),
}

/// The allocation result for one function.
#[derive(Debug)]
pub struct FrameLayout {
    pub storage: HashMap<InstId, Storage>,
    /// Total frame footprint, argument area included
    pub frame_size: u32,
    /// Bytes the prologue reserves below the argument area
    pub local_size: u32,
}

impl FrameLayout {
    /// Every register holding a live value across the function, sorted for
    /// deterministic save/restore sequences.
    pub fn registers_in_use(&self) -> Vec<Reg> {
        let mut regs: Vec<Reg> = self
            .storage
            .values()
            .filter_map(|s| match s {
                Storage::Reg(r) => Some(*r),
                Storage::Frame(_) => None,
            })
            .collect();
        regs.sort();
        regs.dedup();
        regs
    }
}

/// Slots shadowing formal arguments, recognized by their initializing store.
fn arg_slots(module: &Module, func: FuncId) -> HashMap<InstId, usize> {
    let mut slots = HashMap::new();
    for &block in &module.func(func).blocks {
        for &inst in &module.block(block).insts {
            let data = module.inst(inst);
            if data.kind == InstKind::Store {
                if let (Value::Arg(i), Value::Inst(slot)) = (data.operands[0], data.operands[1]) {
                    slots.insert(slot, i);
                }
            }
        }
    }
    slots
}

/// Deepest loop any access to the slot sits in. Hot slots are offered to the
/// colorer last so that on a degree tie the cold ones are sacrificed first.
fn access_depth(module: &Module, slot: InstId) -> u32 {
    module
        .inst(slot)
        .uses
        .iter()
        .filter_map(|u| module.inst(u.user).block)
        .map(|b| module.block(b).loop_depth)
        .max()
        .unwrap_or(0)
}

fn color(module: &Module, func: FuncId, args: &HashMap<InstId, usize>) -> HashMap<InstId, Reg> {
    let tracked = liveness::tracked_slots(module, func);
    let live = liveness::analyze(module, func);

    let mut candidates: Vec<InstId> = match module.entry_block(func) {
        Some(entry) => module
            .block(entry)
            .insts
            .iter()
            .copied()
            .filter(|i| tracked.contains(i) && !args.contains_key(i))
            .collect(),
        None => Vec::new(),
    };
    candidates.sort_by_key(|&slot| access_depth(module, slot));

    let mut full = InterferenceGraph::new();
    for &slot in &candidates {
        full.add_node(slot);
    }
    for &block in &module.func(func).blocks {
        let mut active: Vec<InstId> = live.live_in[&block]
            .union(&live.live_out[&block])
            .copied()
            .filter(|s| full.contains(*s))
            .collect();
        active.sort();
        for (i, &a) in active.iter().enumerate() {
            for &b in &active[i + 1..] {
                full.add_edge(a, b);
            }
        }
    }

    // simplify: peel trivially colorable nodes; when stuck, drop the node
    // with the fewest conflicts straight to the frame
    let mut work = full.clone();
    let mut stack = Vec::new();
    while !work.is_empty() {
        if let Some(node) = work.first_below(COLOR_REGS.len()) {
            stack.push(node);
            work.remove_node(node);
        } else if let Some(node) = work.min_degree() {
            log::trace!("slot {:?} spilled to the frame", node);
            work.remove_node(node);
        }
    }

    let mut colors: HashMap<InstId, Reg> = HashMap::new();
    while let Some(node) = stack.pop() {
        let taken: HashSet<Reg> = full
            .neighbors(node)
            .filter_map(|n| colors.get(&n))
            .copied()
            .collect();
        if let Some(&reg) = COLOR_REGS.iter().find(|r| !taken.contains(r)) {
            colors.insert(node, reg);
        }
    }
    colors
}

/// Frame bytes an instruction's result occupies when it is not held in a
/// register. Zero for instructions producing nothing.
fn slot_bytes(module: &Module, inst: InstId) -> u32 {
    let data = module.inst(inst);
    if data.ty == IrType::Void {
        return 0;
    }
    match data.alloc_data_type() {
        Some(ty) if !ty.is_scalar() => 4 * ty.total_elems(),
        _ => 4,
    }
}

/// Color the function's slots, then lay out its frame.
pub fn allocate(module: &Module, func: FuncId) -> Result<FrameLayout> {
    let args = arg_slots(module, func);
    let colors = color(module, func, &args);
    let argc = module.func(func).param_tys.len();

    let mut storage: HashMap<InstId, Storage> = HashMap::new();
    for (&slot, &i) in &args {
        if i < ARG_REGS.len() {
            storage.insert(slot, Storage::Reg(ARG_REGS[i]));
        }
    }
    for (&slot, &reg) in &colors {
        storage.insert(slot, Storage::Reg(reg));
    }

    let blocks = module.func(func).blocks.clone();
    let mut memory_required = 4 * argc as u32;
    for &block in &blocks {
        for &inst in &module.block(block).insts {
            if !storage.contains_key(&inst) && !args.contains_key(&inst) {
                memory_required += slot_bytes(module, inst);
            }
        }
    }

    let mut base = memory_required;
    let slot_of_arg: HashMap<usize, InstId> = args.iter().map(|(&s, &i)| (i, s)).collect();
    for i in (ARG_REGS.len()..argc).rev() {
        base -= 4;
        if let Some(&slot) = slot_of_arg.get(&i) {
            storage.insert(slot, Storage::Frame(base));
        }
    }
    base -= 4 * argc.min(ARG_REGS.len()) as u32;

    for &block in &blocks {
        for &inst in &module.block(block).insts {
            if storage.contains_key(&inst) {
                continue;
            }
            let bytes = slot_bytes(module, inst);
            if bytes == 0 {
                continue;
            }
            base -= bytes;
            storage.insert(inst, Storage::Frame(base));
        }
    }
    if base != 0 {
        return Err(SylcError::FrameImbalance {
            leftover: base as i32,
        });
    }

    Ok(FrameLayout {
        storage,
        frame_size: memory_required,
        local_size: memory_required - 4 * argc as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg_of(layout: &FrameLayout, slot: Value) -> Option<Reg> {
        match layout.storage.get(&slot.as_inst().unwrap()) {
            Some(Storage::Reg(r)) => Some(*r),
            _ => None,
        }
    }

    fn frame_of(layout: &FrameLayout, slot: Value) -> Option<u32> {
        match layout.storage.get(&slot.as_inst().unwrap()) {
            Some(Storage::Frame(off)) => Some(*off),
            _ => None,
        }
    }

    // n slots, all stored in b0 and read in b1, so every pair conflicts
    fn overlapping_slots(n: usize) -> (Module, FuncId, Vec<Value>) {
        let mut m = Module::new();
        let f = m.add_function("main", IrType::Int, vec![]);
        let b0 = m.add_block(f);
        let b1 = m.add_block(f);
        let slots: Vec<Value> = (0..n)
            .map(|i| {
                let s = m.build_alloc(f, IrType::Int).unwrap();
                m.build_store(b0, Value::Imm(i as i32), s).unwrap();
                s
            })
            .collect();
        m.build_br(b0, b1).unwrap();
        let mut acc = Value::Imm(0);
        for &s in &slots {
            let v = m.build_load(b1, s).unwrap();
            acc = m.build_add(b1, acc, v).unwrap();
        }
        m.build_ret(b1, Some(acc)).unwrap();
        (m, f, slots)
    }

    #[test]
    fn test_conflicting_slots_get_distinct_registers() {
        let (m, f, slots) = overlapping_slots(3);
        let layout = allocate(&m, f).unwrap();
        let regs: Vec<Reg> = slots.iter().map(|&s| reg_of(&layout, s).unwrap()).collect();
        let unique: HashSet<Reg> = regs.iter().copied().collect();
        assert_eq!(unique.len(), 3);
        for reg in regs {
            assert!(COLOR_REGS.contains(&reg));
        }
    }

    #[test]
    fn test_ninth_conflicting_slot_falls_to_frame() {
        let (m, f, slots) = overlapping_slots(9);
        let layout = allocate(&m, f).unwrap();
        let colored = slots.iter().filter(|&&s| reg_of(&layout, s).is_some()).count();
        let spilled = slots.iter().filter(|&&s| frame_of(&layout, s).is_some()).count();
        assert_eq!(colored, 8);
        assert_eq!(spilled, 1);
    }

    #[test]
    fn test_disjoint_slots_may_share_a_register() {
        // x dies before y is written, even at block granularity
        let mut m = Module::new();
        let f = m.add_function("main", IrType::Int, vec![]);
        let b0 = m.add_block(f);
        let b1 = m.add_block(f);
        let b2 = m.add_block(f);
        let x = m.build_alloc(f, IrType::Int).unwrap();
        let y = m.build_alloc(f, IrType::Int).unwrap();
        m.build_store(b0, Value::Imm(1), x).unwrap();
        m.build_br(b0, b1).unwrap();
        let xv = m.build_load(b1, x).unwrap();
        let xs = m.build_add(b1, xv, Value::Imm(1)).unwrap();
        m.build_store(b1, xs, y).unwrap();
        m.build_br(b1, b2).unwrap();
        let yv = m.build_load(b2, y).unwrap();
        m.build_ret(b2, Some(yv)).unwrap();

        let layout = allocate(&m, f).unwrap();
        // x live into b1, y live out of b1: they do conflict here, so the
        // sharing case needs fully separate lifetimes
        assert_ne!(reg_of(&layout, x), reg_of(&layout, y));

        // a confined to c0, b spanning only the c1/c2 boundary: no block
        // sees both at its edges, so they share a color
        let mut m2 = Module::new();
        let f2 = m2.add_function("main", IrType::Int, vec![]);
        let c0 = m2.add_block(f2);
        let c1 = m2.add_block(f2);
        let c2 = m2.add_block(f2);
        let a = m2.build_alloc(f2, IrType::Int).unwrap();
        let b = m2.build_alloc(f2, IrType::Int).unwrap();
        m2.build_store(c0, Value::Imm(1), a).unwrap();
        let av = m2.build_load(c0, a).unwrap();
        m2.build_br(c0, c1).unwrap();
        let seed = m2.build_add(c1, av, Value::Imm(1)).unwrap();
        m2.build_store(c1, seed, b).unwrap();
        m2.build_br(c1, c2).unwrap();
        let bv = m2.build_load(c2, b).unwrap();
        m2.build_ret(c2, Some(bv)).unwrap();

        let layout2 = allocate(&m2, f2).unwrap();
        assert_eq!(reg_of(&layout2, a), Some(Reg::S0));
        assert_eq!(reg_of(&layout2, b), Some(Reg::S0));
    }

    #[test]
    fn test_argument_storage_convention() {
        let mut m = Module::new();
        let f = m.add_function("six", IrType::Int, vec![IrType::Int; 6]);
        let b = m.add_block(f);
        let mut slots = Vec::new();
        for i in 0..6 {
            let s = m.build_alloc(f, IrType::Int).unwrap();
            m.build_store(b, Value::Arg(i), s).unwrap();
            slots.push(s);
        }
        let v = m.build_load(b, slots[5]).unwrap();
        m.build_ret(b, Some(v)).unwrap();

        let layout = allocate(&m, f).unwrap();
        for (i, &reg) in ARG_REGS.iter().enumerate() {
            assert_eq!(reg_of(&layout, slots[i]), Some(reg));
        }
        // one temporary (the load) below the argument area
        assert_eq!(layout.local_size, 4);
        assert_eq!(layout.frame_size, 28);
        assert_eq!(frame_of(&layout, slots[4]), Some(layout.local_size + 16));
        assert_eq!(frame_of(&layout, slots[5]), Some(layout.local_size + 20));
        assert_eq!(frame_of(&layout, v), Some(0));
    }

    #[test]
    fn test_array_slot_gets_full_footprint() {
        let mut m = Module::new();
        let f = m.add_function("main", IrType::Void, vec![]);
        let b = m.add_block(f);
        let arr = m.build_alloc(f, IrType::Array { dims: vec![3, 4] }).unwrap();
        let p = m.build_gep(b, arr, vec![Value::Imm(0), Value::Imm(0), Value::Imm(0)]).unwrap();
        m.build_store(b, Value::Imm(1), p).unwrap();
        m.build_ret(b, None).unwrap();

        let layout = allocate(&m, f).unwrap();
        // 48 bytes of array plus 4 for the element pointer
        assert_eq!(layout.frame_size, 52);
        assert_eq!(frame_of(&layout, arr), Some(4));
        assert_eq!(frame_of(&layout, p), Some(0));
    }

    #[test]
    fn test_registers_in_use_sorted_and_deduped() {
        let (m, f, _slots) = overlapping_slots(3);
        let layout = allocate(&m, f).unwrap();
        let regs = layout.registers_in_use();
        let mut sorted = regs.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(regs, sorted);
        assert_eq!(regs.len(), 3);
    }
}
