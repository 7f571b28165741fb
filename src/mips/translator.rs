//! IR to MIPS lowering
//!
//! One [`FuncTranslator`] per function. The frame layout fixes where every
//! value lives; lowering is then a single pass over the blocks, with the
//! temp pool caching frame words and `reg_bound` short-circuiting loads from
//! register-resident slots.
//!
//! Calling convention: the caller reserves space for saved registers plus
//! one word per argument, fills `$a0..$a3` and the stack words, and restores
//! everything after `jal`. Builtin I/O never gets a body; each call site
//! expands to the corresponding syscall inline.

use std::collections::HashMap;

use crate::ir::print::{inst_to_string, NameTable};
use crate::ir::{
    BinOp, BlockId, Builtin, CmpCond, FuncId, InstId, InstKind, IrType, Module, Value,
};
use crate::mips::asm::{AsmOp, Assembly, DataDirective};
use crate::mips::pool::TempRegisterPool;
use crate::mips::registers::{Reg, ARG_REGS, POOL_REGS, RET_REG, SCRATCH_REGS};
use crate::regalloc::{self, FrameLayout, Storage};
use crate::{Result, SylcError};

pub fn translate(module: &Module) -> Result<Assembly> {
    let mut asm = Assembly::new();
    emit_data(module, &mut asm);
    for func in module.func_ids() {
        let data = module.func(func);
        if data.builtin.is_some() {
            continue;
        }
        if data.is_library {
            asm.label(data.name.clone());
            asm.inst("jr", vec![AsmOp::Reg(Reg::Ra)]);
            continue;
        }
        if data.blocks.is_empty() {
            continue;
        }
        FuncTranslator::new(module, func)?.run(&mut asm)?;
    }
    Ok(asm)
}

fn emit_data(module: &Module, asm: &mut Assembly) {
    for gid in module.global_ids() {
        let global = module.global(gid);
        let total = global.data_ty.total_elems() as usize;
        let directive = if global.init.is_empty() {
            if total > 1 {
                DataDirective::Space(4 * total as u32)
            } else {
                DataDirective::Words(vec![0])
            }
        } else {
            let mut words = global.init.clone();
            words.resize(total, 0);
            DataDirective::Words(words)
        };
        asm.data(global.name.clone(), directive);
    }
}

/// Where a value is available right now.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MachineValue {
    Imm(i32),
    Reg(Reg),
    Frame(u32),
    Label(String),
}

/// Statement-scoped scratch registers, handed back after every instruction.
struct Scratch {
    free: Vec<Reg>,
}

impl Scratch {
    fn new() -> Scratch {
        Scratch {
            free: SCRATCH_REGS.to_vec(),
        }
    }

    fn acquire(&mut self) -> Result<Reg> {
        self.free.pop().ok_or(SylcError::ScratchExhausted)
    }

    fn release_all(&mut self) {
        self.free = SCRATCH_REGS.to_vec();
    }
}

struct FuncTranslator<'a> {
    module: &'a Module,
    func: FuncId,
    layout: FrameLayout,
    in_use: Vec<Reg>,
    block_index: HashMap<BlockId, usize>,
    pool: TempRegisterPool,
    scratch: Scratch,
    /// Loads from register-resident slots cost nothing; they are recorded
    /// here instead of emitting code.
    reg_bound: HashMap<InstId, Reg>,
    names: NameTable,
}

impl<'a> FuncTranslator<'a> {
    fn new(module: &'a Module, func: FuncId) -> Result<FuncTranslator<'a>> {
        let layout = regalloc::allocate(module, func)?;
        let in_use = layout.registers_in_use();
        let pool_regs: Vec<Reg> = POOL_REGS
            .iter()
            .copied()
            .filter(|r| !in_use.contains(r))
            .collect();
        let block_index = module
            .func(func)
            .blocks
            .iter()
            .enumerate()
            .map(|(i, &b)| (b, i))
            .collect();
        Ok(FuncTranslator {
            module,
            func,
            layout,
            in_use,
            block_index,
            pool: TempRegisterPool::new(pool_regs),
            scratch: Scratch::new(),
            reg_bound: HashMap::new(),
            names: NameTable::build(module, func),
        })
    }

    fn run(mut self, asm: &mut Assembly) -> Result<()> {
        let module = self.module;
        let fdata = module.func(self.func);
        asm.label(fdata.name.clone());
        if self.layout.local_size > 0 {
            asm.inst(
                "addiu",
                vec![
                    AsmOp::Reg(Reg::Sp),
                    AsmOp::Reg(Reg::Sp),
                    AsmOp::Imm(-(self.layout.local_size as i32)),
                ],
            );
        }
        for &block in &fdata.blocks {
            self.pool.reset();
            self.reg_bound.clear();
            asm.label(self.block_label(block)?);
            for &inst in &module.block(block).insts {
                asm.comment(inst_to_string(module, &self.names, inst));
                self.lower_inst(asm, block, inst)?;
                self.scratch.release_all();
            }
        }
        Ok(())
    }

    fn block_label(&self, block: BlockId) -> Result<String> {
        let idx = self
            .block_index
            .get(&block)
            .ok_or_else(|| SylcError::Ir {
                message: "branch target outside the current function".to_string(),
            })?;
        Ok(format!("{}.b{}", self.module.func(self.func).name, idx))
    }

    fn resolve(&self, value: Value) -> Result<MachineValue> {
        match value {
            Value::Imm(v) => Ok(MachineValue::Imm(v)),
            Value::Global(g) => Ok(MachineValue::Label(self.module.global(g).name.clone())),
            Value::Inst(id) => match self.layout.storage.get(&id) {
                Some(Storage::Reg(r)) => Ok(MachineValue::Reg(*r)),
                Some(Storage::Frame(off)) => Ok(MachineValue::Frame(*off)),
                None => Err(SylcError::UnresolvedValue {
                    message: format!("no storage assigned to instruction {}", id.index()),
                }),
            },
            Value::Arg(i) => Err(SylcError::UnresolvedValue {
                message: format!("argument {} read outside its shadow store", i),
            }),
        }
    }

    /// Make a value readable, pulling frame words into the pool.
    fn read_value(&mut self, asm: &mut Assembly, value: Value) -> Result<MachineValue> {
        if let Value::Inst(id) = value {
            if let Some(&reg) = self.reg_bound.get(&id) {
                return Ok(MachineValue::Reg(reg));
            }
        }
        match self.resolve(value)? {
            MachineValue::Frame(off) => {
                let reg = self.pool.acquire(asm, off, false)?;
                Ok(MachineValue::Reg(reg))
            }
            other => Ok(other),
        }
    }

    /// Force a machine value into some register, burning scratch if needed.
    fn to_register(&mut self, asm: &mut Assembly, value: MachineValue) -> Result<Reg> {
        match value {
            MachineValue::Reg(reg) => Ok(reg),
            MachineValue::Imm(v) => {
                let reg = self.scratch.acquire()?;
                asm.inst("li", vec![AsmOp::Reg(reg), AsmOp::Imm(v)]);
                Ok(reg)
            }
            MachineValue::Frame(off) => {
                let reg = self.scratch.acquire()?;
                asm.inst(
                    "lw",
                    vec![AsmOp::Reg(reg), AsmOp::Offset(Reg::Sp, off as i32)],
                );
                Ok(reg)
            }
            MachineValue::Label(label) => {
                let reg = self.scratch.acquire()?;
                asm.inst("lw", vec![AsmOp::Reg(reg), AsmOp::Label(label)]);
                Ok(reg)
            }
        }
    }

    fn value_to_reg(&mut self, asm: &mut Assembly, value: Value) -> Result<Reg> {
        let mv = self.read_value(asm, value)?;
        self.to_register(asm, mv)
    }

    /// Register the instruction's result is computed into.
    fn dest_reg_for(&mut self, asm: &mut Assembly, inst: InstId) -> Result<Reg> {
        match self.resolve(Value::Inst(inst))? {
            MachineValue::Reg(reg) => Ok(reg),
            MachineValue::Frame(off) => self.pool.acquire(asm, off, true),
            other => Err(SylcError::UnresolvedValue {
                message: format!("result of instruction cannot live in {:?}", other),
            }),
        }
    }

    fn is_gep(&self, value: Value) -> bool {
        matches!(value, Value::Inst(id)
            if self.module.inst(id).kind == InstKind::GetElementPtr)
    }

    fn lower_inst(&mut self, asm: &mut Assembly, block: BlockId, inst: InstId) -> Result<()> {
        let module = self.module;
        let data = module.inst(inst);
        let operands = data.operands.clone();
        match data.kind.clone() {
            InstKind::Alloc => Ok(()),
            InstKind::Binary(op) => self.lower_binary(asm, inst, op, operands[0], operands[1]),
            InstKind::ICmp(cond) => self.lower_icmp(asm, inst, cond, operands[0], operands[1]),
            InstKind::Load => self.lower_load(asm, inst, operands[0]),
            InstKind::Store => self.lower_store(asm, operands[0], operands[1]),
            InstKind::Call(callee) => self.lower_call(asm, inst, callee, &operands),
            InstKind::GetElementPtr => self.lower_gep(asm, inst, &operands),
            InstKind::ZExt => self.lower_zext(asm, inst, operands[0]),
            InstKind::Branch { on_true, on_false } => {
                self.lower_branch(asm, block, &operands, on_true, on_false)
            }
            InstKind::Return => self.lower_return(asm, operands.first().copied()),
        }
    }

    fn lower_binary(
        &mut self,
        asm: &mut Assembly,
        inst: InstId,
        op: BinOp,
        lhs: Value,
        rhs: Value,
    ) -> Result<()> {
        let dest = self.dest_reg_for(asm, inst)?;
        let lhs_reg = match self.read_value(asm, lhs)? {
            MachineValue::Imm(v) => {
                asm.inst("li", vec![AsmOp::Reg(dest), AsmOp::Imm(v)]);
                dest
            }
            other => self.to_register(asm, other)?,
        };
        let rhs_mv = self.read_value(asm, rhs)?;
        let rhs_reg = self.to_register(asm, rhs_mv)?;
        match op {
            BinOp::Add => asm.inst(
                "addu",
                vec![AsmOp::Reg(dest), AsmOp::Reg(lhs_reg), AsmOp::Reg(rhs_reg)],
            ),
            BinOp::Sub => asm.inst(
                "subu",
                vec![AsmOp::Reg(dest), AsmOp::Reg(lhs_reg), AsmOp::Reg(rhs_reg)],
            ),
            BinOp::Mul => asm.inst(
                "mul",
                vec![AsmOp::Reg(dest), AsmOp::Reg(lhs_reg), AsmOp::Reg(rhs_reg)],
            ),
            BinOp::Sdiv => {
                asm.inst("div", vec![AsmOp::Reg(lhs_reg), AsmOp::Reg(rhs_reg)]);
                asm.inst("mflo", vec![AsmOp::Reg(dest)]);
            }
            BinOp::Srem => {
                asm.inst("div", vec![AsmOp::Reg(lhs_reg), AsmOp::Reg(rhs_reg)]);
                asm.inst("mfhi", vec![AsmOp::Reg(dest)]);
            }
        }
        Ok(())
    }

    fn lower_icmp(
        &mut self,
        asm: &mut Assembly,
        inst: InstId,
        cond: CmpCond,
        lhs: Value,
        rhs: Value,
    ) -> Result<()> {
        let dest = self.dest_reg_for(asm, inst)?;
        let lhs_reg = match self.read_value(asm, lhs)? {
            MachineValue::Imm(v) => {
                asm.inst("li", vec![AsmOp::Reg(dest), AsmOp::Imm(v)]);
                dest
            }
            other => self.to_register(asm, other)?,
        };
        let rhs_mv = self.read_value(asm, rhs)?;
        let rhs_reg = self.to_register(asm, rhs_mv)?;
        let op = match cond {
            CmpCond::Eq => "seq",
            CmpCond::Ne => "sne",
            CmpCond::Slt => "slt",
            CmpCond::Sgt => "sgt",
            CmpCond::Sle => "sle",
            CmpCond::Sge => "sge",
        };
        asm.inst(
            op,
            vec![AsmOp::Reg(dest), AsmOp::Reg(lhs_reg), AsmOp::Reg(rhs_reg)],
        );
        Ok(())
    }

    fn lower_load(&mut self, asm: &mut Assembly, inst: InstId, ptr: Value) -> Result<()> {
        if self.is_gep(ptr) {
            let preg = self.value_to_reg(asm, ptr)?;
            let dest = self.dest_reg_for(asm, inst)?;
            asm.inst("lw", vec![AsmOp::Reg(dest), AsmOp::Offset(preg, 0)]);
            return Ok(());
        }
        match self.resolve(ptr)? {
            MachineValue::Reg(reg) => {
                self.reg_bound.insert(inst, reg);
            }
            MachineValue::Frame(off) => {
                let dest = self.dest_reg_for(asm, inst)?;
                asm.inst(
                    "lw",
                    vec![AsmOp::Reg(dest), AsmOp::Offset(Reg::Sp, off as i32)],
                );
            }
            MachineValue::Label(label) => {
                let dest = self.dest_reg_for(asm, inst)?;
                asm.inst("lw", vec![AsmOp::Reg(dest), AsmOp::Label(label)]);
            }
            MachineValue::Imm(_) => {
                return Err(SylcError::Ir {
                    message: "load from an immediate".to_string(),
                })
            }
        }
        Ok(())
    }

    fn lower_store(&mut self, asm: &mut Assembly, value: Value, ptr: Value) -> Result<()> {
        // argument values are already in place when the function is entered
        if matches!(value, Value::Arg(_)) {
            return Ok(());
        }
        if self.is_gep(ptr) {
            let preg = self.value_to_reg(asm, ptr)?;
            let vreg = self.value_to_reg(asm, value)?;
            asm.inst("sw", vec![AsmOp::Reg(vreg), AsmOp::Offset(preg, 0)]);
            return Ok(());
        }
        match self.resolve(ptr)? {
            MachineValue::Reg(reg) => match self.read_value(asm, value)? {
                MachineValue::Imm(v) => {
                    asm.inst("li", vec![AsmOp::Reg(reg), AsmOp::Imm(v)]);
                }
                other => {
                    let vreg = self.to_register(asm, other)?;
                    asm.inst("move", vec![AsmOp::Reg(reg), AsmOp::Reg(vreg)]);
                }
            },
            MachineValue::Frame(off) => {
                let vreg = self.value_to_reg(asm, value)?;
                asm.inst(
                    "sw",
                    vec![AsmOp::Reg(vreg), AsmOp::Offset(Reg::Sp, off as i32)],
                );
            }
            MachineValue::Label(label) => {
                let vreg = self.value_to_reg(asm, value)?;
                asm.inst("sw", vec![AsmOp::Reg(vreg), AsmOp::Label(label)]);
            }
            MachineValue::Imm(_) => {
                return Err(SylcError::Ir {
                    message: "store to an immediate".to_string(),
                })
            }
        }
        Ok(())
    }

    fn lower_zext(&mut self, asm: &mut Assembly, inst: InstId, value: Value) -> Result<()> {
        let dest = self.dest_reg_for(asm, inst)?;
        match self.read_value(asm, value)? {
            MachineValue::Imm(v) => {
                asm.inst("li", vec![AsmOp::Reg(dest), AsmOp::Imm(v)]);
            }
            other => {
                let reg = self.to_register(asm, other)?;
                asm.inst("move", vec![AsmOp::Reg(dest), AsmOp::Reg(reg)]);
            }
        }
        Ok(())
    }

    fn lower_gep(&mut self, asm: &mut Assembly, inst: InstId, operands: &[Value]) -> Result<()> {
        let module = self.module;
        let base = operands[0];
        let base_is_derived = self.is_gep(base)
            || matches!(base, Value::Inst(id) if module.inst(id).kind == InstKind::Load);
        if base_is_derived {
            let breg = self.value_to_reg(asm, base)?;
            let dest = self.dest_reg_for(asm, inst)?;
            asm.inst("move", vec![AsmOp::Reg(dest), AsmOp::Reg(breg)]);
            self.accumulate_offsets(asm, dest, base, &operands[1..])
        } else {
            let dest = self.dest_reg_for(asm, inst)?;
            match self.resolve(base)? {
                MachineValue::Frame(off) => asm.inst(
                    "addiu",
                    vec![AsmOp::Reg(dest), AsmOp::Reg(Reg::Sp), AsmOp::Imm(off as i32)],
                ),
                MachineValue::Label(label) => {
                    asm.inst("la", vec![AsmOp::Reg(dest), AsmOp::Label(label)])
                }
                MachineValue::Reg(reg) => {
                    asm.inst("move", vec![AsmOp::Reg(dest), AsmOp::Reg(reg)])
                }
                MachineValue::Imm(_) => {
                    return Err(SylcError::Ir {
                        message: "address computation on an immediate".to_string(),
                    })
                }
            }
            self.accumulate_offsets(asm, dest, base, &operands[1..])
        }
    }

    /// Add each index times its row stride onto `dest`. The stride of index
    /// `k` covers everything below dimension `k`; an immediate zero index
    /// contributes nothing and costs nothing.
    fn accumulate_offsets(
        &mut self,
        asm: &mut Assembly,
        dest: Reg,
        base: Value,
        offsets: &[Value],
    ) -> Result<()> {
        let dims = self.module.value_type(base).array_dims().to_vec();
        for (k, &offset) in offsets.iter().enumerate() {
            let stride: i32 = 4 * dims
                .get(k..)
                .unwrap_or(&[])
                .iter()
                .map(|&d| d as i32)
                .product::<i32>();
            match offset {
                Value::Imm(0) => {}
                Value::Imm(v) => {
                    let tmp = self.scratch.acquire()?;
                    asm.inst(
                        "li",
                        vec![AsmOp::Reg(tmp), AsmOp::Imm(v.wrapping_mul(stride))],
                    );
                    asm.inst(
                        "addu",
                        vec![AsmOp::Reg(dest), AsmOp::Reg(dest), AsmOp::Reg(tmp)],
                    );
                    self.scratch.release_all();
                }
                other => {
                    let vreg = self.value_to_reg(asm, other)?;
                    let tmp = self.scratch.acquire()?;
                    asm.inst("li", vec![AsmOp::Reg(tmp), AsmOp::Imm(stride)]);
                    asm.inst(
                        "mul",
                        vec![AsmOp::Reg(tmp), AsmOp::Reg(vreg), AsmOp::Reg(tmp)],
                    );
                    asm.inst(
                        "addu",
                        vec![AsmOp::Reg(dest), AsmOp::Reg(dest), AsmOp::Reg(tmp)],
                    );
                    self.scratch.release_all();
                }
            }
        }
        Ok(())
    }

    fn lower_branch(
        &mut self,
        asm: &mut Assembly,
        block: BlockId,
        operands: &[Value],
        on_true: BlockId,
        on_false: Option<BlockId>,
    ) -> Result<()> {
        let next = self.module.next_block(block);
        match on_false {
            None => {
                self.pool.write_back_all(asm);
                if next != Some(on_true) {
                    asm.inst("j", vec![AsmOp::Label(self.block_label(on_true)?)]);
                }
            }
            Some(on_false) => {
                let creg = self.value_to_reg(asm, operands[0])?;
                self.pool.write_back_all(asm);
                if next == Some(on_true) {
                    asm.inst(
                        "beqz",
                        vec![AsmOp::Reg(creg), AsmOp::Label(self.block_label(on_false)?)],
                    );
                } else if next == Some(on_false) {
                    asm.inst(
                        "bnez",
                        vec![AsmOp::Reg(creg), AsmOp::Label(self.block_label(on_true)?)],
                    );
                } else {
                    asm.inst(
                        "bnez",
                        vec![AsmOp::Reg(creg), AsmOp::Label(self.block_label(on_true)?)],
                    );
                    asm.inst("j", vec![AsmOp::Label(self.block_label(on_false)?)]);
                }
            }
        }
        Ok(())
    }

    fn lower_return(&mut self, asm: &mut Assembly, value: Option<Value>) -> Result<()> {
        if let Some(value) = value {
            match self.read_value(asm, value)? {
                MachineValue::Imm(v) => {
                    asm.inst("li", vec![AsmOp::Reg(RET_REG), AsmOp::Imm(v)]);
                }
                other => {
                    let reg = self.to_register(asm, other)?;
                    asm.inst("move", vec![AsmOp::Reg(RET_REG), AsmOp::Reg(reg)]);
                }
            }
        }
        if self.layout.local_size > 0 {
            asm.inst(
                "addiu",
                vec![
                    AsmOp::Reg(Reg::Sp),
                    AsmOp::Reg(Reg::Sp),
                    AsmOp::Imm(self.layout.local_size as i32),
                ],
            );
        }
        asm.inst("jr", vec![AsmOp::Reg(Reg::Ra)]);
        Ok(())
    }

    fn lower_call(
        &mut self,
        asm: &mut Assembly,
        inst: InstId,
        callee: FuncId,
        args: &[Value],
    ) -> Result<()> {
        let module = self.module;
        let fdata = module.func(callee);
        if fdata.param_tys.len() != args.len() {
            return Err(SylcError::ArgCountMismatch {
                func: fdata.name.clone(),
                expected: fdata.param_tys.len(),
                actual: args.len(),
            });
        }
        if let Some(builtin) = fdata.builtin {
            return self.lower_builtin(asm, inst, builtin, args);
        }

        let mut reserve = vec![Reg::Ra];
        reserve.extend(self.in_use.iter().copied());
        let param_bytes = 4 * args.len() as u32;
        let total = param_bytes + 4 * reserve.len() as u32;

        self.pool.write_back_all(asm);
        asm.inst(
            "addiu",
            vec![
                AsmOp::Reg(Reg::Sp),
                AsmOp::Reg(Reg::Sp),
                AsmOp::Imm(-(total as i32)),
            ],
        );
        for (i, &reg) in reserve.iter().enumerate() {
            asm.inst(
                "sw",
                vec![
                    AsmOp::Reg(reg),
                    AsmOp::Offset(Reg::Sp, (param_bytes + 4 * i as u32) as i32),
                ],
            );
        }

        for (i, &arg) in args.iter().enumerate() {
            let src = self.call_arg_source(arg, &reserve, param_bytes, total)?;
            if i < ARG_REGS.len() {
                let target = ARG_REGS[i];
                match src {
                    ArgSource::Imm(v) => {
                        asm.inst("li", vec![AsmOp::Reg(target), AsmOp::Imm(v)]);
                    }
                    ArgSource::Reg(reg) => {
                        asm.inst("move", vec![AsmOp::Reg(target), AsmOp::Reg(reg)]);
                    }
                    ArgSource::Frame(off) => {
                        asm.inst(
                            "lw",
                            vec![AsmOp::Reg(target), AsmOp::Offset(Reg::Sp, off as i32)],
                        );
                    }
                    ArgSource::FrameAddr(off) => {
                        asm.inst(
                            "addiu",
                            vec![
                                AsmOp::Reg(target),
                                AsmOp::Reg(Reg::Sp),
                                AsmOp::Imm(off as i32),
                            ],
                        );
                    }
                    ArgSource::Label(label) => {
                        asm.inst("la", vec![AsmOp::Reg(target), AsmOp::Label(label)]);
                    }
                }
            } else {
                let reg = match src {
                    ArgSource::Reg(reg) => reg,
                    ArgSource::Imm(v) => {
                        let reg = self.scratch.acquire()?;
                        asm.inst("li", vec![AsmOp::Reg(reg), AsmOp::Imm(v)]);
                        reg
                    }
                    ArgSource::Frame(off) => {
                        let reg = self.scratch.acquire()?;
                        asm.inst(
                            "lw",
                            vec![AsmOp::Reg(reg), AsmOp::Offset(Reg::Sp, off as i32)],
                        );
                        reg
                    }
                    ArgSource::FrameAddr(off) => {
                        let reg = self.scratch.acquire()?;
                        asm.inst(
                            "addiu",
                            vec![
                                AsmOp::Reg(reg),
                                AsmOp::Reg(Reg::Sp),
                                AsmOp::Imm(off as i32),
                            ],
                        );
                        reg
                    }
                    ArgSource::Label(label) => {
                        let reg = self.scratch.acquire()?;
                        asm.inst("la", vec![AsmOp::Reg(reg), AsmOp::Label(label)]);
                        reg
                    }
                };
                asm.inst(
                    "sw",
                    vec![AsmOp::Reg(reg), AsmOp::Offset(Reg::Sp, 4 * i as i32)],
                );
                self.scratch.release_all();
            }
        }

        self.pool.reset();
        asm.inst("jal", vec![AsmOp::Label(fdata.name.clone())]);
        for (i, &reg) in reserve.iter().enumerate() {
            asm.inst(
                "lw",
                vec![
                    AsmOp::Reg(reg),
                    AsmOp::Offset(Reg::Sp, (param_bytes + 4 * i as u32) as i32),
                ],
            );
        }
        asm.inst(
            "addiu",
            vec![
                AsmOp::Reg(Reg::Sp),
                AsmOp::Reg(Reg::Sp),
                AsmOp::Imm(total as i32),
            ],
        );
        if module.inst(inst).ty != IrType::Void {
            let dest = self.dest_reg_for(asm, inst)?;
            asm.inst("move", vec![AsmOp::Reg(dest), AsmOp::Reg(RET_REG)]);
        }
        Ok(())
    }

    fn call_arg_source(
        &self,
        value: Value,
        reserve: &[Reg],
        param_bytes: u32,
        displacement: u32,
    ) -> Result<ArgSource> {
        let saved_slot =
            |r: Reg| reserve.iter().position(|&x| x == r).map(|p| param_bytes + 4 * p as u32);
        if let Value::Inst(id) = value {
            if let Some(&reg) = self.reg_bound.get(&id) {
                return Ok(match saved_slot(reg) {
                    Some(off) => ArgSource::Frame(off),
                    None => ArgSource::Reg(reg),
                });
            }
            // a local array travels by address
            if self.module.inst(id).is_alloc() {
                return match self.resolve(value)? {
                    MachineValue::Frame(off) => Ok(ArgSource::FrameAddr(off + displacement)),
                    _ => Err(SylcError::Ir {
                        message: "array argument without a frame footprint".to_string(),
                    }),
                };
            }
        }
        match self.resolve(value)? {
            MachineValue::Imm(v) => Ok(ArgSource::Imm(v)),
            MachineValue::Label(label) => Ok(ArgSource::Label(label)),
            MachineValue::Reg(reg) => Ok(match saved_slot(reg) {
                Some(off) => ArgSource::Frame(off),
                None => ArgSource::Reg(reg),
            }),
            MachineValue::Frame(off) => Ok(match self.pool.lookup(off) {
                Some(reg) => ArgSource::Reg(reg),
                None => ArgSource::Frame(off + displacement),
            }),
        }
    }

    fn lower_builtin(
        &mut self,
        asm: &mut Assembly,
        inst: InstId,
        builtin: Builtin,
        args: &[Value],
    ) -> Result<()> {
        match builtin {
            Builtin::GetInt => {
                asm.inst("li", vec![AsmOp::Reg(RET_REG), AsmOp::Imm(5)]);
                asm.inst("syscall", vec![]);
                let dest = self.dest_reg_for(asm, inst)?;
                asm.inst("move", vec![AsmOp::Reg(dest), AsmOp::Reg(RET_REG)]);
            }
            Builtin::PutInt | Builtin::PutCh => {
                let code = if builtin == Builtin::PutInt { 1 } else { 11 };
                asm.inst("li", vec![AsmOp::Reg(RET_REG), AsmOp::Imm(code)]);
                let save = self.scratch.acquire()?;
                asm.inst("move", vec![AsmOp::Reg(save), AsmOp::Reg(Reg::A0)]);
                match self.read_value(asm, args[0])? {
                    MachineValue::Imm(v) => {
                        asm.inst("li", vec![AsmOp::Reg(Reg::A0), AsmOp::Imm(v)]);
                    }
                    MachineValue::Reg(reg) => {
                        asm.inst("move", vec![AsmOp::Reg(Reg::A0), AsmOp::Reg(reg)]);
                    }
                    MachineValue::Label(label) => {
                        asm.inst("lw", vec![AsmOp::Reg(Reg::A0), AsmOp::Label(label)]);
                    }
                    MachineValue::Frame(off) => {
                        asm.inst(
                            "lw",
                            vec![AsmOp::Reg(Reg::A0), AsmOp::Offset(Reg::Sp, off as i32)],
                        );
                    }
                }
                asm.inst("syscall", vec![]);
                asm.inst("move", vec![AsmOp::Reg(Reg::A0), AsmOp::Reg(save)]);
            }
        }
        Ok(())
    }
}

/// Where a call argument comes from once the caller has moved `$sp`.
#[derive(Debug)]
enum ArgSource {
    Imm(i32),
    Reg(Reg),
    /// Word to load, offset already displaced for the moved `$sp`
    Frame(u32),
    /// Address to materialize, likewise displaced
    FrameAddr(u32),
    Label(String),
}
