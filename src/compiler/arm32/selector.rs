//! Maps the linear IR of one function onto ARM32 instructions.
//!
//! Dispatch is a match on the instruction tag. Every handler follows the
//! same spill protocol: operands already in registers are used in place,
//! anything else is loaded into a scratch register; results without a
//! register are computed into a scratch and stored back to their frame
//! slot. Scratch registers are freed immediately after each instruction.

use log::{debug, error};

use super::frame::{outgoing_arg_base, outgoing_arg_offset};
use super::iloc::ILoc;
use super::registers::{reg_name, RegisterPool, ADDR_TMP, ARG_REGS};
use crate::compiler::ir::printer::inst_text;
use crate::compiler::ir::{BinaryOp, FuncId, InstKind, Module, UnaryOp, ValueId};

pub struct InstSelector<'a, 'st> {
    module: &'a mut Module<'st>,
    fid: FuncId,
    iloc: ILoc,
    pool: RegisterPool,
    /// r0..r3 pseudo-values used while marshalling call arguments.
    arg_reg_values: [ValueId; 4],
    /// Argument markers seen since the last call.
    real_arg_count: usize,
    /// When set, each IR instruction is echoed as a comment above its
    /// assembly.
    show_ir: bool,
}

impl<'a, 'st> InstSelector<'a, 'st> {
    pub fn new(module: &'a mut Module<'st>, fid: FuncId, show_ir: bool) -> InstSelector<'a, 'st> {
        let int32 = module.types.int32();
        let arg_reg_values = [
            module.new_reg_value(int32, ARG_REGS[0]),
            module.new_reg_value(int32, ARG_REGS[1]),
            module.new_reg_value(int32, ARG_REGS[2]),
            module.new_reg_value(int32, ARG_REGS[3]),
        ];
        InstSelector {
            module,
            fid,
            iloc: ILoc::new(),
            pool: RegisterPool::new(),
            arg_reg_values,
            real_arg_count: 0,
            show_ir,
        }
    }

    pub fn run(mut self) -> ILoc {
        let code = self.module.func(self.fid).code.clone();
        for inst in code {
            if self.module.value(inst).is_dead() {
                continue;
            }
            if self.show_ir {
                let text = inst_text(self.module, inst);
                if !text.is_empty() {
                    self.iloc.comment(text);
                }
            }
            self.translate(inst);
        }
        self.iloc
    }

    fn translate(&mut self, inst: ValueId) {
        let kind = match self.module.value(inst).as_inst() {
            Some(k) => k.clone(),
            None => return,
        };
        debug!("selecting {:?}", kind);

        match kind {
            InstKind::Entry => self.translate_entry(),
            InstKind::Exit { ret } => self.translate_exit(ret),
            InstKind::Label => {
                let name = self.module.value(inst).ir_name.clone();
                self.iloc.label(&name);
            }
            InstKind::Goto { target } => {
                let name = self.module.value(target).ir_name.clone();
                self.iloc.jump(&name);
            }
            InstKind::CondGoto {
                cond,
                true_target,
                false_target,
            } => self.translate_cond_goto(cond, true_target, false_target),
            InstKind::Binary { op, lhs, rhs } => match op {
                BinaryOp::Add => self.translate_two_operator(inst, "add", lhs, rhs),
                BinaryOp::Sub => self.translate_two_operator(inst, "sub", lhs, rhs),
                BinaryOp::Mul => self.translate_two_operator(inst, "mul", lhs, rhs),
                BinaryOp::Div => self.translate_two_operator(inst, "sdiv", lhs, rhs),
                BinaryOp::Mod => self.translate_mod(inst, lhs, rhs),
                cmp => self.translate_cmp(inst, cmp, lhs, rhs),
            },
            InstKind::Unary { op, src } => match op {
                UnaryOp::Neg => self.translate_one_operator(inst, "neg", src),
                UnaryOp::Deref => self.translate_deref(inst, src),
            },
            InstKind::Move { dst, src } => self.translate_move(dst, src),
            InstKind::Call {
                callee_name, args, ..
            } => {
                let name = self
                    .module
                    .strings()
                    .get(callee_name)
                    .unwrap_or_default();
                self.translate_call(inst, &name, &args);
            }
            InstKind::Arg { src } => self.translate_arg(src),
        }
    }

    fn translate_entry(&mut self) {
        let protected = self.module.func(self.fid).protected_regs.clone();
        if !protected.is_empty() {
            let list = protected
                .iter()
                .map(|r| reg_name(*r))
                .collect::<Vec<_>>()
                .join(", ");
            self.iloc.inst("push", &[&format!("{{{}}}", list)]);
        }
        self.iloc.alloc_stack(self.module, self.fid, ADDR_TMP);
    }

    fn translate_exit(&mut self, ret: Option<ValueId>) {
        if let Some(ret) = ret {
            // The return value travels in r0.
            self.iloc.load_var(self.module, ARG_REGS[0], ret);
        }
        self.iloc.inst("mov", &["sp", "fp"]);
        let protected = self.module.func(self.fid).protected_regs.clone();
        if !protected.is_empty() {
            let list = protected
                .iter()
                .map(|r| reg_name(*r))
                .collect::<Vec<_>>()
                .join(", ");
            self.iloc.inst("pop", &[&format!("{{{}}}", list)]);
        }
        self.iloc.inst("bx", &["lr"]);
    }

    fn translate_cond_goto(&mut self, cond: ValueId, true_target: ValueId, false_target: ValueId) {
        let cond_reg = match self.module.value(cond).reg_id() {
            Some(r) => r,
            None => {
                let r = self.pool.allocate_for(cond);
                self.iloc.load_var(self.module, r, cond);
                r
            }
        };
        self.iloc.inst("cmp", &[reg_name(cond_reg), "#0"]);
        let t = self.module.value(true_target).ir_name.clone();
        let f = self.module.value(false_target).ir_name.clone();
        self.iloc.inst("bne", &[&t]);
        self.iloc.inst("b", &[&f]);
        self.pool.free_value(cond);
    }

    /// Loads `v` into a register if it is not already in one, returning the
    /// register to read it from.
    fn ensure_in_reg(&mut self, v: ValueId) -> i32 {
        match self.module.value(v).reg_id() {
            Some(r) => r,
            None => {
                let r = self.pool.allocate_for(v);
                self.iloc.load_var(self.module, r, v);
                r
            }
        }
    }

    /// A register for the result: its own when assigned, a scratch
    /// otherwise. The second element says whether a store-back is needed.
    fn result_reg(&mut self, inst: ValueId) -> (i32, bool) {
        match self.module.value(inst).reg_id() {
            Some(r) => (r, false),
            None => (self.pool.allocate_for(inst), true),
        }
    }

    fn translate_two_operator(&mut self, inst: ValueId, op: &str, lhs: ValueId, rhs: ValueId) {
        let a = self.ensure_in_reg(lhs);
        let b = self.ensure_in_reg(rhs);
        let (rd, spill) = self.result_reg(inst);

        self.iloc.inst(op, &[reg_name(rd), reg_name(a), reg_name(b)]);

        if spill {
            self.iloc.store_var(self.module, rd, inst, ADDR_TMP);
        }
        self.pool.free_value(lhs);
        self.pool.free_value(rhs);
        self.pool.free_value(inst);
    }

    fn translate_one_operator(&mut self, inst: ValueId, op: &str, src: ValueId) {
        let a = self.ensure_in_reg(src);
        let (rd, spill) = self.result_reg(inst);

        self.iloc.inst(op, &[reg_name(rd), reg_name(a)]);

        if spill {
            self.iloc.store_var(self.module, rd, inst, ADDR_TMP);
        }
        self.pool.free_value(src);
        self.pool.free_value(inst);
    }

    /// ARM32 has no modulo instruction: a % b = a - (a / b) * b.
    fn translate_mod(&mut self, inst: ValueId, lhs: ValueId, rhs: ValueId) {
        let a = self.ensure_in_reg(lhs);
        let b = self.ensure_in_reg(rhs);
        let (rd, spill) = self.result_reg(inst);
        let tmp = self.pool.allocate();

        self.iloc
            .inst("sdiv", &[reg_name(tmp), reg_name(a), reg_name(b)]);
        self.iloc
            .inst("mul", &[reg_name(tmp), reg_name(tmp), reg_name(b)]);
        self.iloc
            .inst("sub", &[reg_name(rd), reg_name(a), reg_name(tmp)]);

        if spill {
            self.iloc.store_var(self.module, rd, inst, ADDR_TMP);
        }
        self.pool.free_value(lhs);
        self.pool.free_value(rhs);
        self.pool.free_value(inst);
        self.pool.free_reg(tmp);
    }

    /// cmp, then set the result to 0 and conditionally to 1.
    fn translate_cmp(&mut self, inst: ValueId, op: BinaryOp, lhs: ValueId, rhs: ValueId) {
        let cond = match op.condition_code() {
            Some(c) => c,
            None => {
                error!("operator {:?} is not a comparison", op);
                return;
            }
        };

        let a = self.ensure_in_reg(lhs);
        let b = self.ensure_in_reg(rhs);
        let (rd, spill) = self.result_reg(inst);

        self.iloc.inst("cmp", &[reg_name(a), reg_name(b)]);
        self.iloc.inst("mov", &[reg_name(rd), "#0"]);
        self.iloc
            .inst(&format!("mov{}", cond), &[reg_name(rd), "#1"]);

        if spill {
            self.iloc.store_var(self.module, rd, inst, ADDR_TMP);
        }
        self.pool.free_value(lhs);
        self.pool.free_value(rhs);
        self.pool.free_value(inst);
    }

    fn translate_deref(&mut self, inst: ValueId, src: ValueId) {
        let p = self.ensure_in_reg(src);
        let (rd, spill) = self.result_reg(inst);

        self.iloc
            .inst("ldr", &[reg_name(rd), &format!("[{}]", reg_name(p))]);

        if spill {
            self.iloc.store_var(self.module, rd, inst, ADDR_TMP);
        }
        self.pool.free_value(src);
        self.pool.free_value(inst);
    }

    /// Moves dispatch on operand residency. A pointer-valued destination
    /// produced by address arithmetic means a store through the pointer.
    fn translate_move(&mut self, dst: ValueId, src: ValueId) {
        let dst_val = self.module.value(dst);
        let store_through =
            dst_val.is_inst() && self.module.types.is_pointer(dst_val.ty) && !dst_val.is_array();

        if store_through {
            let s = self.ensure_in_reg(src);
            let p = self.ensure_in_reg(dst);
            self.iloc
                .inst("str", &[reg_name(s), &format!("[{}]", reg_name(p))]);
            self.pool.free_value(src);
            self.pool.free_value(dst);
            return;
        }

        let src_reg = self.module.value(src).reg_id();
        let dst_reg = self.module.value(dst).reg_id();

        if let Some(s) = src_reg {
            // register -> register / register -> memory
            self.iloc.store_var(self.module, s, dst, ADDR_TMP);
        } else if let Some(d) = dst_reg {
            // memory or constant -> register
            self.iloc.load_var(self.module, d, src);
        } else {
            // memory -> memory goes through a scratch register
            let tmp = self.pool.allocate();
            self.iloc.load_var(self.module, tmp, src);
            self.iloc.store_var(self.module, tmp, dst, ADDR_TMP);
            self.pool.free_reg(tmp);
        }
    }

    fn translate_call(&mut self, inst: ValueId, callee: &str, args: &[ValueId]) {
        let argc = args.len();

        if self.real_arg_count != 0 && self.real_arg_count != argc {
            error!(
                "argument markers ({}) disagree with the call site ({})",
                self.real_arg_count, argc
            );
        }

        let int32 = self.module.types.int32();
        let void = self.module.types.void();

        if argc > 0 {
            // The argument registers are owned by the marshalling until the
            // call lands.
            for r in ARG_REGS {
                self.pool.allocate_reg(r);
            }

            // Overflow arguments first, through synthesized sp-relative
            // slots.
            for (k, arg) in args.iter().enumerate().skip(ARG_REGS.len()) {
                let slot = self.module.new_mem_slot(
                    int32,
                    outgoing_arg_base(),
                    outgoing_arg_offset(k),
                );
                let mv = self.module.new_inst(
                    self.fid,
                    InstKind::Move {
                        dst: slot,
                        src: *arg,
                    },
                    void,
                );
                self.translate_move(slot, *arg);
                self.module.release_uses(mv);
            }

            // Then the register arguments.
            for (k, arg) in args.iter().enumerate().take(ARG_REGS.len()) {
                let dst = self.arg_reg_values[k];
                let mv = self
                    .module
                    .new_inst(self.fid, InstKind::Move { dst, src: *arg }, void);
                self.translate_move(dst, *arg);
                self.module.release_uses(mv);
            }
        }

        self.iloc.call_fun(callee);

        if argc > 0 {
            for r in ARG_REGS {
                self.pool.free_reg(r);
            }
        }

        if !self.module.types.is_void(self.module.value(inst).ty) {
            // The result comes back in r0 and moves into the call's slot.
            let src = self.arg_reg_values[0];
            let mv = self
                .module
                .new_inst(self.fid, InstKind::Move { dst: inst, src }, void);
            self.translate_move(inst, src);
            self.module.release_uses(mv);
        }

        self.real_arg_count = 0;
    }

    /// Argument markers are optional; when they appear, the values must
    /// already sit where the ABI wants them.
    fn translate_arg(&mut self, src: ValueId) {
        if self.real_arg_count < ARG_REGS.len() {
            match self.module.value(src).reg_id() {
                Some(r) if r == self.real_arg_count as i32 => (),
                Some(r) => error!(
                    "argument {} bound to {} instead of {}",
                    self.real_arg_count + 1,
                    reg_name(r),
                    reg_name(self.real_arg_count as i32)
                ),
                None => error!(
                    "argument {} is not in a register",
                    self.real_arg_count + 1
                ),
            }
        } else {
            match self.module.value(src).mem_addr() {
                Some((base, _)) if base == outgoing_arg_base() => (),
                _ => error!(
                    "argument {} is not an sp-relative stack slot",
                    self.real_arg_count + 1
                ),
            }
        }
        self.real_arg_count += 1;
    }
}
