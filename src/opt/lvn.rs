//! Local value numbering
//!
//! Classic hash-based value numbering within a single block. Every value
//! gets a number; instructions hash to a descriptor string built from their
//! kind and operand numbers, and an instruction whose descriptor was already
//! seen is replaced by the first instruction that produced it.
//!
//! Loads participate, which makes this a redundant-load eliminator too: a
//! second load from the same pointer with no intervening write reuses the
//! first. Stores and calls invalidate every load descriptor (calls can write
//! globals), but leave arithmetic numbering intact.

use std::collections::HashMap;

use crate::ir::{InstKind, Module, Value};
use crate::Result;

struct Numbering {
    desc_to_num: HashMap<String, u32>,
    value_to_num: HashMap<Value, u32>,
    num_to_value: HashMap<u32, Value>,
    next: u32,
}

impl Numbering {
    fn new() -> Numbering {
        Numbering {
            desc_to_num: HashMap::new(),
            value_to_num: HashMap::new(),
            num_to_value: HashMap::new(),
            next: 0,
        }
    }

    fn fresh(&mut self, desc: String, value: Value) -> u32 {
        let num = self.next;
        self.next += 1;
        self.desc_to_num.insert(desc, num);
        self.value_to_num.insert(value, num);
        self.num_to_value.insert(num, value);
        num
    }

    /// Number an operand value. Immediates, globals and arguments hash by
    /// content; an instruction defined outside the current block numbers by
    /// identity.
    fn number_of(&mut self, value: Value) -> u32 {
        if let Some(&num) = self.value_to_num.get(&value) {
            return num;
        }
        let desc = match value {
            Value::Imm(v) => format!("imm {}", v),
            Value::Global(g) => format!("global {}", g.index()),
            Value::Arg(i) => format!("arg {}", i),
            Value::Inst(id) => format!("inst {}", id.index()),
        };
        if let Some(&num) = self.desc_to_num.get(&desc) {
            self.value_to_num.insert(value, num);
            return num;
        }
        self.fresh(desc, value)
    }

    fn forget_loads(&mut self) {
        self.desc_to_num.retain(|desc, _| !desc.starts_with("load "));
    }
}

pub fn run(module: &mut Module) -> Result<bool> {
    let mut changed = false;
    for func in super::body_funcs(module) {
        for block in module.func(func).blocks.clone() {
            let mut numbering = Numbering::new();
            for inst in module.block(block).insts.clone() {
                let data = module.inst(inst);
                let operands = data.operands.clone();
                let desc = match &data.kind {
                    InstKind::Branch { .. } | InstKind::Return => continue,
                    InstKind::Store => {
                        numbering.forget_loads();
                        continue;
                    }
                    // every slot is its own value
                    InstKind::Alloc => format!("slot {}", inst.index()),
                    InstKind::Call(_) => {
                        numbering.forget_loads();
                        format!("call {}", inst.index())
                    }
                    InstKind::Load => {
                        format!("load {}", numbering.number_of(operands[0]))
                    }
                    InstKind::Binary(op) => format!(
                        "{} {}, {}",
                        op,
                        numbering.number_of(operands[0]),
                        numbering.number_of(operands[1])
                    ),
                    InstKind::ICmp(cond) => format!(
                        "icmp {} {}, {}",
                        cond,
                        numbering.number_of(operands[0]),
                        numbering.number_of(operands[1])
                    ),
                    InstKind::GetElementPtr => {
                        let nums: Vec<String> = operands
                            .iter()
                            .map(|&op| numbering.number_of(op).to_string())
                            .collect();
                        format!("gep {}", nums.join(", "))
                    }
                    InstKind::ZExt => format!("zext {}", numbering.number_of(operands[0])),
                };
                match numbering.desc_to_num.get(&desc) {
                    Some(&num) => {
                        let rep = numbering.num_to_value[&num];
                        module.replace_all_uses(inst, rep, false)?;
                        changed = true;
                    }
                    None => {
                        numbering.fresh(desc, Value::Inst(inst));
                    }
                }
            }
        }
    }
    Ok(changed)
}
