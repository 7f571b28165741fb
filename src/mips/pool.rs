//! LRU temp register pool
//!
//! Frame-resident values are staged through a pool of registers keyed by
//! their `$sp` offset. Acquiring an offset that is already mapped is free;
//! otherwise a free register is claimed, or the least recently used mapping
//! is evicted with a write-back. Evictions always store; the pool does not
//! track dirtiness, and a redundant word store is cheaper than the
//! bookkeeping would be.
//!
//! The pool is reset at every block boundary and around calls, because both
//! invalidate the register/memory correspondence it relies on.

use std::collections::{HashMap, VecDeque};

use crate::mips::asm::{AsmOp, Assembly};
use crate::mips::registers::Reg;
use crate::{Result, SylcError};

pub struct TempRegisterPool {
    regs: Vec<Reg>,
    free: Vec<Reg>,
    by_offset: HashMap<u32, Reg>,
    by_reg: HashMap<Reg, u32>,
    lru: VecDeque<Reg>,
}

impl TempRegisterPool {
    pub fn new(regs: Vec<Reg>) -> TempRegisterPool {
        TempRegisterPool {
            free: regs.clone(),
            regs,
            by_offset: HashMap::new(),
            by_reg: HashMap::new(),
            lru: VecDeque::new(),
        }
    }

    /// Register currently backing `offset`, if any.
    pub fn lookup(&self, offset: u32) -> Option<Reg> {
        self.by_offset.get(&offset).copied()
    }

    /// Map `offset` to a register. With `first_write` the slot's current
    /// memory content is irrelevant and no load is emitted.
    pub fn acquire(&mut self, asm: &mut Assembly, offset: u32, first_write: bool) -> Result<Reg> {
        if let Some(&reg) = self.by_offset.get(&offset) {
            self.lru.retain(|&r| r != reg);
            self.lru.push_back(reg);
            return Ok(reg);
        }
        let reg = match self.free.pop() {
            Some(reg) => reg,
            None => {
                let victim = self.lru.pop_front().ok_or_else(|| SylcError::Ir {
                    message: "temp register pool has no registers".to_string(),
                })?;
                if let Some(old) = self.by_reg.remove(&victim) {
                    self.by_offset.remove(&old);
                    asm.inst(
                        "sw",
                        vec![AsmOp::Reg(victim), AsmOp::Offset(Reg::Sp, old as i32)],
                    );
                }
                victim
            }
        };
        self.by_offset.insert(offset, reg);
        self.by_reg.insert(reg, offset);
        self.lru.push_back(reg);
        if !first_write {
            asm.inst(
                "lw",
                vec![AsmOp::Reg(reg), AsmOp::Offset(Reg::Sp, offset as i32)],
            );
        }
        Ok(reg)
    }

    /// Flush every mapping to memory. The mappings survive, so values can
    /// still be read from their registers until the next [`reset`].
    ///
    /// [`reset`]: TempRegisterPool::reset
    pub fn write_back_all(&mut self, asm: &mut Assembly) {
        for &reg in &self.lru {
            if let Some(&offset) = self.by_reg.get(&reg) {
                asm.inst(
                    "sw",
                    vec![AsmOp::Reg(reg), AsmOp::Offset(Reg::Sp, offset as i32)],
                );
            }
        }
    }

    /// Forget every mapping without touching memory.
    pub fn reset(&mut self) {
        self.free = self.regs.clone();
        self.by_offset.clear();
        self.by_reg.clear();
        self.lru.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool2() -> TempRegisterPool {
        TempRegisterPool::new(vec![Reg::T0, Reg::T1])
    }

    fn ops(asm: &Assembly) -> Vec<String> {
        asm.render(false)
            .lines()
            .filter(|l| l.starts_with('\t') && !l.starts_with("\tla") && !l.starts_with("\tj"))
            .map(|l| l.trim().to_string())
            .collect()
    }

    #[test]
    fn test_reacquire_is_free() {
        let mut pool = pool2();
        let mut asm = Assembly::new();
        let r1 = pool.acquire(&mut asm, 0, false).unwrap();
        let r2 = pool.acquire(&mut asm, 0, false).unwrap();
        assert_eq!(r1, r2);
        // one lw for the first acquire only
        assert_eq!(ops(&asm).len(), 1);
    }

    #[test]
    fn test_first_write_skips_load() {
        let mut pool = pool2();
        let mut asm = Assembly::new();
        pool.acquire(&mut asm, 4, true).unwrap();
        assert!(ops(&asm).is_empty());
    }

    #[test]
    fn test_eviction_writes_back_least_recent() {
        let mut pool = pool2();
        let mut asm = Assembly::new();
        let a = pool.acquire(&mut asm, 0, true).unwrap();
        let _b = pool.acquire(&mut asm, 4, true).unwrap();
        // touch offset 0 so offset 4 is now the oldest
        pool.acquire(&mut asm, 0, true).unwrap();
        let c = pool.acquire(&mut asm, 8, false).unwrap();

        let lines = ops(&asm);
        assert_eq!(lines, vec![format!("sw     {}, 4($sp)", c), format!("lw     {}, 8($sp)", c)]);
        assert_eq!(pool.lookup(0), Some(a));
        assert_eq!(pool.lookup(4), None);
        assert_eq!(pool.lookup(8), Some(c));
    }

    #[test]
    fn test_write_back_all_keeps_mappings() {
        let mut pool = pool2();
        let mut asm = Assembly::new();
        let a = pool.acquire(&mut asm, 0, true).unwrap();
        let b = pool.acquire(&mut asm, 4, true).unwrap();
        pool.write_back_all(&mut asm);
        assert_eq!(pool.lookup(0), Some(a));
        assert_eq!(pool.lookup(4), Some(b));
        let lines = ops(&asm);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.starts_with("sw")));
    }

    #[test]
    fn test_reset_forgets_everything() {
        let mut pool = pool2();
        let mut asm = Assembly::new();
        pool.acquire(&mut asm, 0, true).unwrap();
        pool.reset();
        assert_eq!(pool.lookup(0), None);
        // both registers free again; two acquires need no eviction
        pool.acquire(&mut asm, 4, true).unwrap();
        pool.acquire(&mut asm, 8, true).unwrap();
        assert!(ops(&asm).is_empty());
    }
}
