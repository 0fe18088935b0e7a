//! A single function under construction: its parameters, locals, linear
//! instruction list, exit label, loop-label stacks and frame bookkeeping.

use super::types::TypeId;
use super::value::ValueId;
use crate::compiler::stringtable::StringId;

#[derive(Debug)]
pub struct Function {
    pub name: StringId,
    pub ir_name: String,
    pub ret_ty: TypeId,
    /// The local the return value is moved into; absent for void functions.
    pub ret_slot: Option<ValueId>,
    /// The ABI-visible formal parameters, in declaration order.
    pub params: Vec<ValueId>,
    /// Every local created in the function, named or synthesized.
    pub locals: Vec<ValueId>,
    /// The ordered linear IR.
    pub code: Vec<ValueId>,
    /// The label every `return` jumps to; the unique exit sink.
    pub exit_label: Option<ValueId>,

    break_labels: Vec<ValueId>,
    continue_labels: Vec<ValueId>,

    /// Largest argument count among this function's call sites; sizes the
    /// outgoing overflow-argument area.
    pub max_call_args: usize,
    pub has_call: bool,

    /// Callee-saved registers the prologue pushes and the epilogue pops.
    pub protected_regs: Vec<i32>,
    /// Bytes subtracted from sp after the prologue push.
    pub frame_size: i32,

    next_temp: u32,
    next_local: u32,
    next_label: u32,
}

impl Function {
    pub fn new(name: StringId, ir_name: String, ret_ty: TypeId) -> Function {
        Function {
            name,
            ir_name,
            ret_ty,
            ret_slot: None,
            params: vec![],
            locals: vec![],
            code: vec![],
            exit_label: None,
            break_labels: vec![],
            continue_labels: vec![],
            max_call_args: 0,
            has_call: false,
            protected_regs: vec![],
            frame_size: 0,
            next_temp: 0,
            next_local: 0,
            next_label: 0,
        }
    }

    pub fn push_loop_labels(&mut self, break_to: ValueId, continue_to: ValueId) {
        self.break_labels.push(break_to);
        self.continue_labels.push(continue_to);
    }

    pub fn pop_loop_labels(&mut self) {
        self.break_labels.pop();
        self.continue_labels.pop();
    }

    pub fn break_label(&self) -> Option<ValueId> {
        self.break_labels.last().copied()
    }

    pub fn continue_label(&self) -> Option<ValueId> {
        self.continue_labels.last().copied()
    }

    pub fn next_temp_name(&mut self) -> String {
        let n = self.next_temp;
        self.next_temp += 1;
        format!("%t{}", n)
    }

    pub fn next_local_name(&mut self) -> String {
        let n = self.next_local;
        self.next_local += 1;
        format!("%l{}", n)
    }

    pub fn next_label_name(&mut self) -> String {
        self.next_label += 1;
        format!(".L{}", self.next_label)
    }

    pub fn record_call(&mut self, argc: usize) {
        self.has_call = true;
        if argc > self.max_call_args {
            self.max_call_args = argc;
        }
    }
}
