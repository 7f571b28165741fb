//! IR Module, arenas and the builder/mutation API
//!
//! The [`Module`] owns every function, basic block, instruction and global
//! in four arenas and hands out opaque ids. Use-def edges are `(user, pos)`
//! pairs stored on the producing value, mirrored by the operand lists, and
//! the two sides are kept consistent by the mutation API: the only ways to
//! rewrite the graph are [`Module::replace_all_uses`] and
//! [`Module::remove_inst`].
//!
//! The `build_*` constructors fold eagerly: an immediate-immediate binary
//! operation and the usual algebraic identities (`x+0`, `x*1`, `x-x`, ...)
//! return a plain [`Value`] and emit nothing.

use crate::ir::types::{BinOp, CmpCond, IrType};
use crate::{Result, SylcError};

/// Instruction id into the module arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(u32);

/// Basic block id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);

/// Function id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(u32);

/// Global value id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalId(u32);

impl InstId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl FuncId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl GlobalId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A value readable as an operand.
///
/// Immediates carry their constant inline and have no arena identity: equal
/// immediates are interchangeable and own no use list. `Arg(i)` is the
/// placeholder for formal argument `i`; it only ever appears as the stored
/// value of the argument-shadow store the front end emits on entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Imm(i32),
    Inst(InstId),
    Global(GlobalId),
    Arg(usize),
}

impl Value {
    pub fn as_imm(self) -> Option<i32> {
        match self {
            Value::Imm(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_inst(self) -> Option<InstId> {
        match self {
            Value::Inst(id) => Some(id),
            _ => None,
        }
    }
}

/// One operand reference: `user` reads the value at operand position `pos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Use {
    pub user: InstId,
    pub pos: usize,
}

/// Instruction kinds, payload included. Branch targets are payload rather
/// than operands; only readable values go in the operand list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstKind {
    /// Stack slot reservation; always lives at the front of the entry block
    Alloc,
    /// operands: [lhs, rhs]
    Binary(BinOp),
    /// operands: [lhs, rhs]
    ICmp(CmpCond),
    /// operands: [ptr]
    Load,
    /// operands: [value, ptr]
    Store,
    /// operands: the arguments, in order
    Call(FuncId),
    /// operands: [base, offsets...]
    GetElementPtr,
    /// operands: [value]
    ZExt,
    /// Conditional when `on_false` is set (operands: [cond]), otherwise an
    /// unconditional jump to `on_true` with no operands
    Branch {
        on_true: BlockId,
        on_false: Option<BlockId>,
    },
    /// operands: [value] or empty for void returns
    Return,
}

/// One instruction in the arena.
#[derive(Debug, Clone)]
pub struct InstData {
    pub kind: InstKind,
    /// Result type (`Void` for stores, branches, returns)
    pub ty: IrType,
    pub operands: Vec<Value>,
    pub uses: Vec<Use>,
    /// The owning block; `None` once removed from the graph
    pub block: Option<BlockId>,
}

impl InstData {
    pub fn is_terminator(&self) -> bool {
        matches!(self.kind, InstKind::Branch { .. } | InstKind::Return)
    }

    pub fn is_alloc(&self) -> bool {
        matches!(self.kind, InstKind::Alloc)
    }

    /// Data type behind an allocation's pointer result.
    pub fn alloc_data_type(&self) -> Option<&IrType> {
        match self.kind {
            InstKind::Alloc => self.ty.deref(),
            _ => None,
        }
    }
}

/// One basic block: an ordered instruction list plus the loop-nest depth the
/// front end recorded for it (an allocation-priority heuristic downstream).
#[derive(Debug, Clone)]
pub struct BlockData {
    pub func: FuncId,
    pub insts: Vec<InstId>,
    pub loop_depth: u32,
}

/// Builtin I/O routines lowered to direct system calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    GetInt,
    PutInt,
    PutCh,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::GetInt => "getint",
            Builtin::PutInt => "putint",
            Builtin::PutCh => "putch",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionData {
    pub name: String,
    pub ret_ty: IrType,
    pub param_tys: Vec<IrType>,
    /// First block is the entry
    pub blocks: Vec<BlockId>,
    pub builtin: Option<Builtin>,
    /// Body-less library function: emitted as a label plus an immediate
    /// return
    pub is_library: bool,
}

impl FunctionData {
    /// Stack bytes a caller reserves for this function's arguments (four
    /// register-argument shadow slots included).
    pub fn param_space(&self) -> u32 {
        4 * self.param_tys.len() as u32
    }
}

#[derive(Debug, Clone)]
pub struct GlobalData {
    pub name: String,
    /// Value type: pointer to `data_ty`
    pub ty: IrType,
    pub data_ty: IrType,
    /// Flat row-major initializer; missing trailing elements are zero
    pub init: Vec<i32>,
    pub uses: Vec<Use>,
}

/// The unit of compilation. Owns every IR entity.
#[derive(Debug, Default)]
pub struct Module {
    insts: Vec<InstData>,
    blocks: Vec<BlockData>,
    funcs: Vec<FunctionData>,
    globals: Vec<GlobalData>,
}

impl Module {
    pub fn new() -> Self {
        Module::default()
    }

    // ---- accessors -------------------------------------------------------

    pub fn inst(&self, id: InstId) -> &InstData {
        &self.insts[id.index()]
    }

    pub fn block(&self, id: BlockId) -> &BlockData {
        &self.blocks[id.index()]
    }

    pub fn func(&self, id: FuncId) -> &FunctionData {
        &self.funcs[id.index()]
    }

    pub fn global(&self, id: GlobalId) -> &GlobalData {
        &self.globals[id.index()]
    }

    pub fn func_ids(&self) -> impl Iterator<Item = FuncId> {
        (0..self.funcs.len() as u32).map(FuncId)
    }

    pub fn global_ids(&self) -> impl Iterator<Item = GlobalId> {
        (0..self.globals.len() as u32).map(GlobalId)
    }

    pub fn entry_block(&self, func: FuncId) -> Option<BlockId> {
        self.funcs[func.index()].blocks.first().copied()
    }

    /// The block physically following `block` in its function's layout
    /// order, used for fallthrough elision during translation.
    pub fn next_block(&self, block: BlockId) -> Option<BlockId> {
        let blocks = &self.funcs[self.blocks[block.index()].func.index()].blocks;
        let pos = blocks.iter().position(|&b| b == block)?;
        blocks.get(pos + 1).copied()
    }

    /// Control-flow successors, derived from the terminator.
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        let Some(&last) = self.blocks[block.index()].insts.last() else {
            return Vec::new();
        };
        match self.insts[last.index()].kind {
            InstKind::Branch {
                on_true,
                on_false: Some(on_false),
            } => vec![on_true, on_false],
            InstKind::Branch { on_true, .. } => vec![on_true],
            _ => Vec::new(),
        }
    }

    /// Type of any readable value. Argument placeholders are plain `i32`
    /// (Syl functions only take scalar ints and array pointers; the pointer
    /// case never reaches a type check).
    pub fn value_type(&self, value: Value) -> IrType {
        match value {
            Value::Imm(_) => IrType::Int,
            Value::Inst(id) => self.insts[id.index()].ty.clone(),
            Value::Global(id) => self.globals[id.index()].ty.clone(),
            Value::Arg(_) => IrType::Int,
        }
    }

    // ---- construction ----------------------------------------------------

    pub fn add_function(
        &mut self,
        name: impl Into<String>,
        ret_ty: IrType,
        param_tys: Vec<IrType>,
    ) -> FuncId {
        self.funcs.push(FunctionData {
            name: name.into(),
            ret_ty,
            param_tys,
            blocks: Vec::new(),
            builtin: None,
            is_library: false,
        });
        FuncId(self.funcs.len() as u32 - 1)
    }

    /// Declare a body-less library function.
    pub fn add_library_function(
        &mut self,
        name: impl Into<String>,
        ret_ty: IrType,
        param_tys: Vec<IrType>,
    ) -> FuncId {
        let id = self.add_function(name, ret_ty, param_tys);
        self.funcs[id.index()].is_library = true;
        id
    }

    /// Declare one of the builtin I/O routines. The translator lowers calls
    /// to these directly to system calls; no body is ever emitted.
    pub fn add_builtin(&mut self, builtin: Builtin) -> FuncId {
        let (ret, params) = match builtin {
            Builtin::GetInt => (IrType::Int, vec![]),
            Builtin::PutInt | Builtin::PutCh => (IrType::Void, vec![IrType::Int]),
        };
        let id = self.add_function(builtin.name(), ret, params);
        self.funcs[id.index()].builtin = Some(builtin);
        id
    }

    pub fn add_global(
        &mut self,
        name: impl Into<String>,
        data_ty: IrType,
        init: Vec<i32>,
    ) -> GlobalId {
        self.globals.push(GlobalData {
            name: name.into(),
            ty: data_ty.clone().ptr_to(),
            data_ty,
            init,
            uses: Vec::new(),
        });
        GlobalId(self.globals.len() as u32 - 1)
    }

    pub fn add_block(&mut self, func: FuncId) -> BlockId {
        self.blocks.push(BlockData {
            func,
            insts: Vec::new(),
            loop_depth: 0,
        });
        let id = BlockId(self.blocks.len() as u32 - 1);
        self.funcs[func.index()].blocks.push(id);
        id
    }

    pub fn set_loop_depth(&mut self, block: BlockId, depth: u32) {
        self.blocks[block.index()].loop_depth = depth;
    }

    // ---- instruction builders -------------------------------------------

    /// Allocate the instruction and register a Use on every instruction or
    /// global operand.
    fn new_inst(&mut self, kind: InstKind, ty: IrType, operands: Vec<Value>) -> InstId {
        let id = InstId(self.insts.len() as u32);
        for (pos, &op) in operands.iter().enumerate() {
            match op {
                Value::Inst(v) => self.insts[v.index()].uses.push(Use { user: id, pos }),
                Value::Global(g) => self.globals[g.index()].uses.push(Use { user: id, pos }),
                _ => {}
            }
        }
        self.insts.push(InstData {
            kind,
            ty,
            operands,
            uses: Vec::new(),
            block: None,
        });
        id
    }

    fn append(&mut self, block: BlockId, inst: InstId) -> Value {
        self.blocks[block.index()].insts.push(inst);
        self.insts[inst.index()].block = Some(block);
        Value::Inst(inst)
    }

    fn check_same_type(&self, what: &str, lhs: Value, rhs: Value) -> Result<IrType> {
        let lt = self.value_type(lhs);
        let rt = self.value_type(rhs);
        if lt != rt {
            return Err(SylcError::TypeMismatch {
                message: format!("{} operands have types {} and {}", what, lt, rt),
            });
        }
        Ok(lt)
    }

    fn build_binary(&mut self, block: BlockId, op: BinOp, lhs: Value, rhs: Value) -> Result<Value> {
        let ty = self.check_same_type("binary", lhs, rhs)?;
        let id = self.new_inst(InstKind::Binary(op), ty, vec![lhs, rhs]);
        Ok(self.append(block, id))
    }

    pub fn build_add(&mut self, block: BlockId, lhs: Value, rhs: Value) -> Result<Value> {
        if let (Value::Imm(a), Value::Imm(b)) = (lhs, rhs) {
            return Ok(Value::Imm(a.wrapping_add(b)));
        }
        if lhs == Value::Imm(0) {
            return Ok(rhs);
        }
        if rhs == Value::Imm(0) {
            return Ok(lhs);
        }
        self.build_binary(block, BinOp::Add, lhs, rhs)
    }

    pub fn build_sub(&mut self, block: BlockId, lhs: Value, rhs: Value) -> Result<Value> {
        if let (Value::Imm(a), Value::Imm(b)) = (lhs, rhs) {
            return Ok(Value::Imm(a.wrapping_sub(b)));
        }
        if rhs == Value::Imm(0) {
            return Ok(lhs);
        }
        if lhs == rhs {
            return Ok(Value::Imm(0));
        }
        self.build_binary(block, BinOp::Sub, lhs, rhs)
    }

    pub fn build_mul(&mut self, block: BlockId, lhs: Value, rhs: Value) -> Result<Value> {
        if let (Value::Imm(a), Value::Imm(b)) = (lhs, rhs) {
            return Ok(Value::Imm(a.wrapping_mul(b)));
        }
        if lhs == Value::Imm(0) || rhs == Value::Imm(0) {
            return Ok(Value::Imm(0));
        }
        if lhs == Value::Imm(1) {
            return Ok(rhs);
        }
        if rhs == Value::Imm(1) {
            return Ok(lhs);
        }
        self.build_binary(block, BinOp::Mul, lhs, rhs)
    }

    pub fn build_sdiv(&mut self, block: BlockId, lhs: Value, rhs: Value) -> Result<Value> {
        // A zero divisor is left for the target to trap on; only nonzero
        // immediate divisors fold.
        if let (Value::Imm(a), Value::Imm(b)) = (lhs, rhs) {
            if b != 0 {
                return Ok(Value::Imm(a.wrapping_div(b)));
            }
        }
        if rhs == Value::Imm(1) {
            return Ok(lhs);
        }
        if lhs == Value::Imm(0) {
            return Ok(Value::Imm(0));
        }
        if lhs == rhs {
            return Ok(Value::Imm(1));
        }
        self.build_binary(block, BinOp::Sdiv, lhs, rhs)
    }

    pub fn build_srem(&mut self, block: BlockId, lhs: Value, rhs: Value) -> Result<Value> {
        if let (Value::Imm(a), Value::Imm(b)) = (lhs, rhs) {
            if b != 0 {
                return Ok(Value::Imm(a.wrapping_rem(b)));
            }
        }
        self.build_binary(block, BinOp::Srem, lhs, rhs)
    }

    pub fn build_icmp(
        &mut self,
        block: BlockId,
        cond: CmpCond,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value> {
        self.check_same_type("icmp", lhs, rhs)?;
        let id = self.new_inst(InstKind::ICmp(cond), IrType::Bool, vec![lhs, rhs]);
        Ok(self.append(block, id))
    }

    pub fn build_load(&mut self, block: BlockId, ptr: Value) -> Result<Value> {
        let ty = match self.value_type(ptr) {
            IrType::Ptr(inner) => *inner,
            other => {
                return Err(SylcError::TypeMismatch {
                    message: format!("load from non-pointer value of type {}", other),
                })
            }
        };
        let id = self.new_inst(InstKind::Load, ty, vec![ptr]);
        Ok(self.append(block, id))
    }

    pub fn build_store(&mut self, block: BlockId, value: Value, ptr: Value) -> Result<Value> {
        let id = self.new_inst(InstKind::Store, IrType::Void, vec![value, ptr]);
        Ok(self.append(block, id))
    }

    pub fn build_call(&mut self, block: BlockId, callee: FuncId, args: Vec<Value>) -> Result<Value> {
        let ty = self.funcs[callee.index()].ret_ty.clone();
        let id = self.new_inst(InstKind::Call(callee), ty, args);
        Ok(self.append(block, id))
    }

    /// Reserve a stack slot for `data_ty`. Allocations always go to the
    /// front of the function's entry block, after any already-inserted
    /// allocations, keeping the slots contiguous for frame layout.
    pub fn build_alloc(&mut self, func: FuncId, data_ty: IrType) -> Result<Value> {
        let entry = self.entry_block(func).ok_or_else(|| SylcError::Ir {
            message: format!(
                "alloc in function '{}' before its entry block exists",
                self.funcs[func.index()].name
            ),
        })?;
        let id = self.new_inst(InstKind::Alloc, data_ty.ptr_to(), vec![]);
        let pos = self.blocks[entry.index()]
            .insts
            .iter()
            .take_while(|&&i| matches!(self.insts[i.index()].kind, InstKind::Alloc))
            .count();
        self.blocks[entry.index()].insts.insert(pos, id);
        self.insts[id.index()].block = Some(entry);
        Ok(Value::Inst(id))
    }

    pub fn build_br(&mut self, block: BlockId, dest: BlockId) -> Result<Value> {
        let id = self.new_inst(
            InstKind::Branch {
                on_true: dest,
                on_false: None,
            },
            IrType::Void,
            vec![],
        );
        Ok(self.append(block, id))
    }

    pub fn build_br_cond(
        &mut self,
        block: BlockId,
        cond: Value,
        on_true: BlockId,
        on_false: BlockId,
    ) -> Result<Value> {
        let id = self.new_inst(
            InstKind::Branch {
                on_true,
                on_false: Some(on_false),
            },
            IrType::Void,
            vec![cond],
        );
        Ok(self.append(block, id))
    }

    pub fn build_ret(&mut self, block: BlockId, value: Option<Value>) -> Result<Value> {
        let operands = value.into_iter().collect();
        let id = self.new_inst(InstKind::Return, IrType::Void, operands);
        Ok(self.append(block, id))
    }

    /// Address computation over a (possibly multi-dimensional) array. The
    /// result type follows the remaining dimensions once `offsets.len()`
    /// indices are applied.
    pub fn build_gep(&mut self, block: BlockId, base: Value, offsets: Vec<Value>) -> Result<Value> {
        if offsets.is_empty() {
            return Err(SylcError::TypeMismatch {
                message: "address computation needs at least one offset".to_string(),
            });
        }
        let base_ty = self.value_type(base);
        let ty = match &base_ty {
            IrType::Ptr(inner) => match inner.as_ref() {
                IrType::Array { dims } => {
                    if offsets.len() > dims.len() + 1 {
                        return Err(SylcError::TypeMismatch {
                            message: format!(
                                "{} offsets applied to {}",
                                offsets.len(),
                                base_ty
                            ),
                        });
                    }
                    let rest = dims[offsets.len() - 1..].to_vec();
                    if rest.is_empty() {
                        IrType::Int.ptr_to()
                    } else {
                        IrType::Array { dims: rest }.ptr_to()
                    }
                }
                _ => {
                    if offsets.len() != 1 {
                        return Err(SylcError::TypeMismatch {
                            message: format!(
                                "{} offsets applied to non-array pointer {}",
                                offsets.len(),
                                base_ty
                            ),
                        });
                    }
                    base_ty.clone()
                }
            },
            other => {
                return Err(SylcError::TypeMismatch {
                    message: format!("address computation on non-pointer type {}", other),
                })
            }
        };
        let mut operands = vec![base];
        operands.extend(offsets);
        let id = self.new_inst(InstKind::GetElementPtr, ty, operands);
        Ok(self.append(block, id))
    }

    pub fn build_zext(&mut self, block: BlockId, to_ty: IrType, value: Value) -> Result<Value> {
        let id = self.new_inst(InstKind::ZExt, to_ty, vec![value]);
        Ok(self.append(block, id))
    }

    // ---- mutation protocol ----------------------------------------------

    /// The single mutation primitive. Rewires every use of `inst` to
    /// `new_value`; with `insert_in_place` the instruction is swapped for
    /// `new_value` (which must itself be an instruction) at the same list
    /// position, otherwise it is removed from its block.
    ///
    /// Calling this on an instruction not currently found in its own
    /// block's list is a sequencing bug in the caller and fatal.
    pub fn replace_all_uses(
        &mut self,
        inst: InstId,
        new_value: Value,
        insert_in_place: bool,
    ) -> Result<()> {
        self.detach(inst, insert_in_place.then_some(new_value))?;
        let uses = std::mem::take(&mut self.insts[inst.index()].uses);
        for u in uses {
            self.insts[u.user.index()].operands[u.pos] = new_value;
            match new_value {
                Value::Inst(id) => self.insts[id.index()].uses.push(u),
                Value::Global(id) => self.globals[id.index()].uses.push(u),
                _ => {}
            }
        }
        Ok(())
    }

    /// Remove a (use-less or known-dead) instruction from its block and
    /// drop its operand references. Any remaining uses of it must belong to
    /// instructions that are themselves about to be removed.
    pub fn remove_inst(&mut self, inst: InstId) -> Result<()> {
        self.detach(inst, None)?;
        Ok(())
    }

    /// Take `inst` out of its block (or swap in a replacement) and unlink
    /// its operand Use entries.
    fn detach(&mut self, inst: InstId, swap_in: Option<Value>) -> Result<()> {
        let block = self.insts[inst.index()]
            .block
            .ok_or(SylcError::DetachedInstruction)?;
        let pos = self.blocks[block.index()]
            .insts
            .iter()
            .position(|&i| i == inst)
            .ok_or(SylcError::DetachedInstruction)?;
        match swap_in {
            Some(Value::Inst(new_id)) => {
                self.blocks[block.index()].insts[pos] = new_id;
                self.insts[new_id.index()].block = Some(block);
                self.relink_operands(new_id);
            }
            Some(other) => {
                return Err(SylcError::Ir {
                    message: format!("in-place replacement with non-instruction {:?}", other),
                })
            }
            None => {
                self.blocks[block.index()].insts.remove(pos);
            }
        }
        self.insts[inst.index()].block = None;

        let operands = self.insts[inst.index()].operands.clone();
        for (opos, op) in operands.into_iter().enumerate() {
            match op {
                Value::Inst(id) => self.insts[id.index()]
                    .uses
                    .retain(|u| !(u.user == inst && u.pos == opos)),
                Value::Global(id) => self.globals[id.index()]
                    .uses
                    .retain(|u| !(u.user == inst && u.pos == opos)),
                _ => {}
            }
        }
        Ok(())
    }

    /// Re-register the operand use edges of an instruction that re-enters a
    /// block after having been detached.
    fn relink_operands(&mut self, inst: InstId) {
        let operands = self.insts[inst.index()].operands.clone();
        for (pos, op) in operands.into_iter().enumerate() {
            let entry = Use { user: inst, pos };
            match op {
                Value::Inst(id) => {
                    let uses = &mut self.insts[id.index()].uses;
                    if !uses.contains(&entry) {
                        uses.push(entry);
                    }
                }
                Value::Global(id) => {
                    let uses = &mut self.globals[id.index()].uses;
                    if !uses.contains(&entry) {
                        uses.push(entry);
                    }
                }
                _ => {}
            }
        }
    }
}
