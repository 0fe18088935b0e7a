//! ARM32 register conventions and the short-lived scratch allocator the
//! instruction selector leans on.

use std::collections::{HashMap, HashSet};

use crate::compiler::ir::ValueId;

/// Argument-passing registers, in argument order.
pub const ARG_REGS: [i32; 4] = [0, 1, 2, 3];

/// The pool the selector draws scratch registers from. These are
/// callee-saved, so the prologue protects them.
pub const SCRATCH_REGS: [i32; 5] = [4, 5, 6, 7, 8];

/// Reserved temporary for addressing when an offset does not fit the
/// instruction's immediate range. Never handed out by the pool.
pub const ADDR_TMP: i32 = 9;

pub const FP: i32 = 11;
pub const SP: i32 = 13;
pub const LR: i32 = 14;

pub fn reg_name(id: i32) -> &'static str {
    match id {
        0 => "r0",
        1 => "r1",
        2 => "r2",
        3 => "r3",
        4 => "r4",
        5 => "r5",
        6 => "r6",
        7 => "r7",
        8 => "r8",
        9 => "r9",
        10 => "r10",
        11 => "fp",
        12 => "r12",
        13 => "sp",
        14 => "lr",
        15 => "pc",
        other => panic!("no such ARM32 register: {}", other),
    }
}

/// Hands out scratch registers with no liveness analysis: the selector
/// allocates around a single instruction and frees immediately after it.
/// A register can be bound to a value so that freeing by value releases it.
#[derive(Debug)]
pub struct RegisterPool {
    free: Vec<i32>,
    bindings: HashMap<ValueId, i32>,
    pinned: HashSet<i32>,
}

impl RegisterPool {
    pub fn new() -> RegisterPool {
        RegisterPool {
            free: SCRATCH_REGS.to_vec(),
            bindings: HashMap::new(),
            pinned: HashSet::new(),
        }
    }

    /// Takes the lowest-numbered unbound scratch register.
    pub fn allocate(&mut self) -> i32 {
        let lowest = self
            .free
            .iter()
            .enumerate()
            .min_by_key(|(_, r)| **r)
            .map(|(i, _)| i)
            // The spill protocol holds at most a handful of registers per
            // instruction; running out means the selector is broken.
            .unwrap_or_else(|| panic!("scratch register pool exhausted"));
        self.free.remove(lowest)
    }

    /// Takes a scratch register and binds it to `v`, so a later
    /// [`RegisterPool::free_value`] releases it. Repeated calls for the
    /// same value return the register already bound.
    pub fn allocate_for(&mut self, v: ValueId) -> i32 {
        if let Some(r) = self.bindings.get(&v) {
            return *r;
        }
        let r = self.allocate();
        self.bindings.insert(v, r);
        r
    }

    /// Pins a specific register for ABI use (argument marshalling).
    pub fn allocate_reg(&mut self, id: i32) {
        self.free.retain(|r| *r != id);
        self.pinned.insert(id);
    }

    /// Releases whatever register `v` was bound to; a no-op when the value
    /// never got one.
    pub fn free_value(&mut self, v: ValueId) {
        if let Some(r) = self.bindings.remove(&v) {
            self.free.push(r);
        }
    }

    /// Releases a register taken with [`RegisterPool::allocate`] or pinned
    /// with [`RegisterPool::allocate_reg`].
    pub fn free_reg(&mut self, id: i32) {
        if self.pinned.remove(&id) {
            if SCRATCH_REGS.contains(&id) {
                self.free.push(id);
            }
        } else if SCRATCH_REGS.contains(&id) && !self.free.contains(&id) {
            self.free.push(id);
        }
    }
}

impl Default for RegisterPool {
    fn default() -> Self {
        RegisterPool::new()
    }
}
