//! MIPS register file
//!
//! Only the registers the generated code actually touches are modeled. The
//! split of responsibilities:
//!
//! - `$s0..$s7`: graph-coloring targets, also part of the temp pool
//! - `$t0..$t7`: temp pool only, backing frame-resident values
//! - `$t8/$t9`: statement-scoped scratch, never pooled
//! - `$a0..$a3`: the first four arguments
//! - `$v0`: return value and syscall selector

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reg {
    Zero,
    V0,
    A0,
    A1,
    A2,
    A3,
    T0,
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
    T7,
    T8,
    T9,
    S0,
    S1,
    S2,
    S3,
    S4,
    S5,
    S6,
    S7,
    Sp,
    Ra,
}

impl Reg {
    pub fn name(self) -> &'static str {
        match self {
            Reg::Zero => "$zero",
            Reg::V0 => "$v0",
            Reg::A0 => "$a0",
            Reg::A1 => "$a1",
            Reg::A2 => "$a2",
            Reg::A3 => "$a3",
            Reg::T0 => "$t0",
            Reg::T1 => "$t1",
            Reg::T2 => "$t2",
            Reg::T3 => "$t3",
            Reg::T4 => "$t4",
            Reg::T5 => "$t5",
            Reg::T6 => "$t6",
            Reg::T7 => "$t7",
            Reg::T8 => "$t8",
            Reg::T9 => "$t9",
            Reg::S0 => "$s0",
            Reg::S1 => "$s1",
            Reg::S2 => "$s2",
            Reg::S3 => "$s3",
            Reg::S4 => "$s4",
            Reg::S5 => "$s5",
            Reg::S6 => "$s6",
            Reg::S7 => "$s7",
            Reg::Sp => "$sp",
            Reg::Ra => "$ra",
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Registers the graph-coloring allocator hands out.
pub const COLOR_REGS: [Reg; 8] = [
    Reg::S0,
    Reg::S1,
    Reg::S2,
    Reg::S3,
    Reg::S4,
    Reg::S5,
    Reg::S6,
    Reg::S7,
];

/// The first four arguments travel in registers.
pub const ARG_REGS: [Reg; 4] = [Reg::A0, Reg::A1, Reg::A2, Reg::A3];

pub const RET_REG: Reg = Reg::V0;

/// Candidates for the LRU temp pool; colored registers are filtered out per
/// function before the pool is built.
pub const POOL_REGS: [Reg; 16] = [
    Reg::S0,
    Reg::S1,
    Reg::S2,
    Reg::S3,
    Reg::S4,
    Reg::S5,
    Reg::S6,
    Reg::S7,
    Reg::T0,
    Reg::T1,
    Reg::T2,
    Reg::T3,
    Reg::T4,
    Reg::T5,
    Reg::T6,
    Reg::T7,
];

/// Statement-scoped scratch, disjoint from the pool so an eviction can never
/// clobber a value mid-statement.
pub const SCRATCH_REGS: [Reg; 2] = [Reg::T8, Reg::T9];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_names() {
        assert_eq!(Reg::S0.to_string(), "$s0");
        assert_eq!(Reg::T9.to_string(), "$t9");
        assert_eq!(Reg::Sp.to_string(), "$sp");
        assert_eq!(RET_REG.to_string(), "$v0");
    }

    #[test]
    fn test_scratch_disjoint_from_pool() {
        for scratch in SCRATCH_REGS {
            assert!(!POOL_REGS.contains(&scratch));
        }
    }

    #[test]
    fn test_pool_contains_all_color_regs() {
        for reg in COLOR_REGS {
            assert!(POOL_REGS.contains(&reg));
        }
    }
}
