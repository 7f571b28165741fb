//! Textual IR dumping
//!
//! Names are assigned per function at print time: result-producing
//! instructions get `%t0, %t1, ...` in block order, blocks get `b0, b1, ...`
//! in layout order. The translator reuses [`NameTable`] to echo instructions
//! as assembly comments.

use std::collections::HashMap;
use std::fmt::Write;

use crate::ir::module::{FuncId, InstId, InstKind, Module, Value};
use crate::ir::types::IrType;

/// Print-time name assignment for one function.
pub struct NameTable {
    temps: HashMap<InstId, u32>,
    blocks: HashMap<crate::ir::BlockId, u32>,
}

impl NameTable {
    pub fn build(module: &Module, func: FuncId) -> NameTable {
        let mut temps = HashMap::new();
        let mut blocks = HashMap::new();
        let mut next_temp = 0u32;
        for (bi, &block) in module.func(func).blocks.iter().enumerate() {
            blocks.insert(block, bi as u32);
            for &inst in &module.block(block).insts {
                if module.inst(inst).ty != IrType::Void {
                    temps.insert(inst, next_temp);
                    next_temp += 1;
                }
            }
        }
        NameTable { temps, blocks }
    }

    pub fn temp(&self, inst: InstId) -> String {
        match self.temps.get(&inst) {
            Some(n) => format!("%t{}", n),
            None => "%?".to_string(),
        }
    }

    pub fn block(&self, block: crate::ir::BlockId) -> String {
        match self.blocks.get(&block) {
            Some(n) => format!("b{}", n),
            None => "b?".to_string(),
        }
    }

    pub fn value(&self, module: &Module, value: Value) -> String {
        match value {
            Value::Imm(v) => v.to_string(),
            Value::Inst(id) => self.temp(id),
            Value::Global(id) => format!("@{}", module.global(id).name),
            Value::Arg(i) => format!("%arg{}", i),
        }
    }
}

/// One instruction on one line, without trailing newline.
pub fn inst_to_string(module: &Module, names: &NameTable, inst: InstId) -> String {
    let data = module.inst(inst);
    let v = |val| names.value(module, val);
    match &data.kind {
        InstKind::Alloc => format!(
            "{} = alloc {}",
            names.temp(inst),
            data.alloc_data_type().map(|t| t.to_string()).unwrap_or_default()
        ),
        InstKind::Binary(op) => format!(
            "{} = {} {}, {}",
            names.temp(inst),
            op,
            v(data.operands[0]),
            v(data.operands[1])
        ),
        InstKind::ICmp(cond) => format!(
            "{} = icmp {} {}, {}",
            names.temp(inst),
            cond,
            v(data.operands[0]),
            v(data.operands[1])
        ),
        InstKind::Load => format!("{} = load {}", names.temp(inst), v(data.operands[0])),
        InstKind::Store => format!("store {}, {}", v(data.operands[0]), v(data.operands[1])),
        InstKind::Call(callee) => {
            let args: Vec<String> = data.operands.iter().map(|&a| v(a)).collect();
            let call = format!("call @{}({})", module.func(*callee).name, args.join(", "));
            if data.ty == IrType::Void {
                call
            } else {
                format!("{} = {}", names.temp(inst), call)
            }
        }
        InstKind::GetElementPtr => {
            let parts: Vec<String> = data.operands.iter().map(|&a| v(a)).collect();
            format!("{} = gep {}", names.temp(inst), parts.join(", "))
        }
        InstKind::ZExt => format!(
            "{} = zext {} to {}",
            names.temp(inst),
            v(data.operands[0]),
            data.ty
        ),
        InstKind::Branch { on_true, on_false } => match on_false {
            Some(on_false) => format!(
                "br {}, {}, {}",
                v(data.operands[0]),
                names.block(*on_true),
                names.block(*on_false)
            ),
            None => format!("br {}", names.block(*on_true)),
        },
        InstKind::Return => match data.operands.first() {
            Some(&val) => format!("ret {}", v(val)),
            None => "ret".to_string(),
        },
    }
}

pub fn function_to_string(module: &Module, func: FuncId) -> String {
    let data = module.func(func);
    let names = NameTable::build(module, func);
    let params: Vec<String> = data
        .param_tys
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{} %arg{}", t, i))
        .collect();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "fn @{}({}) -> {} {{",
        data.name,
        params.join(", "),
        data.ret_ty
    );
    for &block in &data.blocks {
        let _ = writeln!(out, "{}:", names.block(block));
        for &inst in &module.block(block).insts {
            let _ = writeln!(out, "  {}", inst_to_string(module, &names, inst));
        }
    }
    out.push_str("}\n");
    out
}

/// The whole module: globals first, then every function with a body.
pub fn module_to_string(module: &Module) -> String {
    let mut out = String::new();
    for gid in module.global_ids() {
        let g = module.global(gid);
        let _ = writeln!(out, "@{}: {} = {:?}", g.name, g.data_ty, g.init);
    }
    if !out.is_empty() {
        out.push('\n');
    }
    for fid in module.func_ids() {
        let f = module.func(fid);
        if f.builtin.is_some() || f.is_library || f.blocks.is_empty() {
            continue;
        }
        out.push_str(&function_to_string(module, fid));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::{CmpCond, IrType};

    #[test]
    fn test_function_dump_shape() {
        let mut m = Module::new();
        let f = m.add_function("main", IrType::Int, vec![]);
        let b0 = m.add_block(f);
        let b1 = m.add_block(f);
        let slot = m.build_alloc(f, IrType::Int).unwrap();
        m.build_store(b0, Value::Imm(3), slot).unwrap();
        let x = m.build_load(b0, slot).unwrap();
        let c = m.build_icmp(b0, CmpCond::Slt, x, Value::Imm(10)).unwrap();
        m.build_br_cond(b0, c, b1, b1).unwrap();
        m.build_ret(b1, Some(x)).unwrap();

        let text = function_to_string(&m, f);
        assert!(text.contains("fn @main() -> i32 {"));
        assert!(text.contains("%t0 = alloc i32"));
        assert!(text.contains("store 3, %t0"));
        assert!(text.contains("%t1 = load %t0"));
        assert!(text.contains("%t2 = icmp slt %t1, 10"));
        assert!(text.contains("br %t2, b1, b1"));
        assert!(text.contains("ret %t1"));
    }

    #[test]
    fn test_void_call_has_no_result_name() {
        let mut m = Module::new();
        let putint = m.add_builtin(crate::ir::Builtin::PutInt);
        let f = m.add_function("main", IrType::Void, vec![]);
        let b = m.add_block(f);
        m.build_call(b, putint, vec![Value::Imm(7)]).unwrap();
        m.build_ret(b, None).unwrap();

        let names = NameTable::build(&m, f);
        let call = m.block(b).insts[0];
        assert_eq!(inst_to_string(&m, &names, call), "call @putint(7)");
    }
}
