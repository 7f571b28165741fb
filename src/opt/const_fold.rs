//! Constant folding
//!
//! Evaluates arithmetic, comparisons and zero-extensions whose operands are
//! all immediates and forwards the result to every user. The builder already
//! folds most of these at construction time; this pass catches the ones that
//! become constant later, after propagation or value numbering rewrote an
//! operand.
//!
//! Division and remainder by an immediate zero are deliberately left in
//! place for the target to trap on.

use crate::ir::{BinOp, CmpCond, InstKind, Module, Value};
use crate::Result;

fn eval_binop(op: BinOp, lhs: i32, rhs: i32) -> Option<i32> {
    Some(match op {
        BinOp::Add => lhs.wrapping_add(rhs),
        BinOp::Sub => lhs.wrapping_sub(rhs),
        BinOp::Mul => lhs.wrapping_mul(rhs),
        BinOp::Sdiv => {
            if rhs == 0 {
                return None;
            }
            lhs.wrapping_div(rhs)
        }
        BinOp::Srem => {
            if rhs == 0 {
                return None;
            }
            lhs.wrapping_rem(rhs)
        }
    })
}

fn eval_cmp(cond: CmpCond, lhs: i32, rhs: i32) -> i32 {
    let holds = match cond {
        CmpCond::Eq => lhs == rhs,
        CmpCond::Ne => lhs != rhs,
        CmpCond::Slt => lhs < rhs,
        CmpCond::Sgt => lhs > rhs,
        CmpCond::Sle => lhs <= rhs,
        CmpCond::Sge => lhs >= rhs,
    };
    holds as i32
}

pub fn run(module: &mut Module) -> Result<bool> {
    let mut changed = false;
    for func in super::body_funcs(module) {
        for block in module.func(func).blocks.clone() {
            for inst in module.block(block).insts.clone() {
                let data = module.inst(inst);
                let folded = match (&data.kind, data.operands.as_slice()) {
                    (InstKind::Binary(op), &[Value::Imm(a), Value::Imm(b)]) => {
                        eval_binop(*op, a, b)
                    }
                    (InstKind::ICmp(cond), &[Value::Imm(a), Value::Imm(b)]) => {
                        Some(eval_cmp(*cond, a, b))
                    }
                    (InstKind::ZExt, &[Value::Imm(v)]) => Some(v),
                    _ => None,
                };
                if let Some(v) = folded {
                    module.replace_all_uses(inst, Value::Imm(v), false)?;
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
    use crate::ir::{FuncId, IrType};

    fn scaffold() -> (Module, FuncId, crate::ir::BlockId) {
        let mut m = Module::new();
        let f = m.add_function("main", IrType::Int, vec![]);
        let b = m.add_block(f);
        (m, f, b)
    }

    #[test]
    fn test_folds_constant_chain_exposed_by_replacement() {
        let (mut m, f, b) = scaffold();
        let slot = m.build_alloc(f, IrType::Int).unwrap();
        let x = m.build_load(b, slot).unwrap();
        let sum = m.build_add(b, x, Value::Imm(2)).unwrap();
        let prod = m.build_mul(b, sum, sum).unwrap();
        m.build_ret(b, Some(prod)).unwrap();

        // simulate propagation discovering the load's value
        m.replace_all_uses(x.as_inst().unwrap(), Value::Imm(3), false)
            .unwrap();

        assert!(run(&mut m).unwrap());
        let ret = *m.block(b).insts.last().unwrap();
        assert_eq!(m.inst(ret).operands[0], Value::Imm(25));
        // second round finds nothing
        assert!(!run(&mut m).unwrap());
    }

    #[test]
    fn test_comparison_folds_to_zero_or_one() {
        let (mut m, f, b) = scaffold();
        let slot = m.build_alloc(f, IrType::Int).unwrap();
        let x = m.build_load(b, slot).unwrap();
        let c = m.build_icmp(b, crate::ir::CmpCond::Sle, x, Value::Imm(5)).unwrap();
        let z = m.build_zext(b, IrType::Int, c).unwrap();
        m.build_ret(b, Some(z)).unwrap();

        m.replace_all_uses(x.as_inst().unwrap(), Value::Imm(5), false)
            .unwrap();
        assert!(run(&mut m).unwrap());

        let ret = *m.block(b).insts.last().unwrap();
        assert_eq!(m.inst(ret).operands[0], Value::Imm(1));
    }

    #[test]
    fn test_division_by_zero_left_alone() {
        let (mut m, f, b) = scaffold();
        let slot = m.build_alloc(f, IrType::Int).unwrap();
        let x = m.build_load(b, slot).unwrap();
        let q = m.build_sdiv(b, x, Value::Imm(0)).unwrap();
        m.build_ret(b, Some(q)).unwrap();
        m.replace_all_uses(x.as_inst().unwrap(), Value::Imm(8), false)
            .unwrap();

        assert!(!run(&mut m).unwrap());
        assert!(matches!(
            m.inst(q.as_inst().unwrap()).kind,
            InstKind::Binary(BinOp::Sdiv)
        ));
    }

    #[test]
    fn test_wrapping_semantics() {
        assert_eq!(eval_binop(BinOp::Add, i32::MAX, 1), Some(i32::MIN));
        assert_eq!(eval_binop(BinOp::Mul, i32::MIN, -1), Some(i32::MIN));
        assert_eq!(eval_binop(BinOp::Sdiv, i32::MIN, -1), Some(i32::MIN));
        assert_eq!(eval_binop(BinOp::Srem, -7, 3), Some(-1));
    }
}
