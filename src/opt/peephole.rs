//! Peephole identity simplification
//!
//! Strips the algebraic no-ops that survive into the instruction stream
//! after other passes rewrite operands: adding zero, subtracting zero,
//! multiplying or dividing by one. The builder already refuses to emit these
//! when the identity is visible at construction time; this catches the ones
//! that only become identities later.

use crate::ir::{BinOp, InstKind, Module, Value};
use crate::Result;

fn simplify(op: BinOp, lhs: Value, rhs: Value) -> Option<Value> {
    match op {
        BinOp::Add => match (lhs, rhs) {
            (Value::Imm(0), v) | (v, Value::Imm(0)) => Some(v),
            _ => None,
        },
        BinOp::Sub => match rhs {
            Value::Imm(0) => Some(lhs),
            _ => None,
        },
        BinOp::Mul => match (lhs, rhs) {
            (Value::Imm(1), v) | (v, Value::Imm(1)) => Some(v),
            _ => None,
        },
        BinOp::Sdiv => match rhs {
            Value::Imm(1) => Some(lhs),
            _ => None,
        },
        BinOp::Srem => None,
    }
}

pub fn run(module: &mut Module) -> Result<bool> {
    let mut changed = false;
    for func in super::body_funcs(module) {
        for block in module.func(func).blocks.clone() {
            for inst in module.block(block).insts.clone() {
                let data = module.inst(inst);
                if let InstKind::Binary(op) = data.kind {
                    if let Some(v) = simplify(op, data.operands[0], data.operands[1]) {
                        module.replace_all_uses(inst, v, false)?;
                        changed = true;
                    }
                }
            }
        }
    }
    Ok(changed)
}
