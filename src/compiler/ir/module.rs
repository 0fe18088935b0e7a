//! The module owns everything: the value arena, the interned constants and
//! types, the functions, and the scope stack the lowering resolves names
//! through. All def-use wiring goes through [`Module::new_inst`] and
//! [`Module::release_uses`] so both edge directions stay in step.

use std::collections::HashMap;

use super::function::Function;
use super::instruction::{FuncId, InstKind};
use super::types::{TypeId, TypeTable};
use super::value::{Use, Value, ValueId, ValueKind};
use crate::compiler::stringtable::{StringId, StringTable};

pub struct Module<'st> {
    st: &'st StringTable,
    pub types: TypeTable,
    values: Vec<Value>,
    pub globals: Vec<ValueId>,
    functions: Vec<Function>,
    func_names: HashMap<StringId, FuncId>,
    const_pool: HashMap<i32, ValueId>,
    /// Innermost scope last; index 0 holds the globals.
    scopes: Vec<HashMap<StringId, ValueId>>,
    current: Option<FuncId>,
    next_global: u32,
}

impl<'st> Module<'st> {
    pub fn new(st: &'st StringTable) -> Module<'st> {
        Module {
            st,
            types: TypeTable::new(),
            values: vec![],
            globals: vec![],
            functions: vec![],
            func_names: HashMap::new(),
            const_pool: HashMap::new(),
            scopes: vec![HashMap::new()],
            current: None,
            next_global: 0,
        }
    }

    pub fn strings(&self) -> &'st StringTable {
        self.st
    }

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    pub fn value_mut(&mut self, id: ValueId) -> &mut Value {
        &mut self.values[id.index()]
    }

    pub fn functions(&self) -> impl Iterator<Item = FuncId> {
        (0..self.functions.len()).map(|i| FuncId(i as u32))
    }

    pub fn func(&self, id: FuncId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    pub fn current_function(&self) -> Option<FuncId> {
        self.current
    }

    pub fn set_current_function(&mut self, f: Option<FuncId>) {
        self.current = f;
    }

    /// Registers a new function. Fails when the name is already taken.
    pub fn new_function(&mut self, name: StringId, ret_ty: TypeId) -> Option<FuncId> {
        if self.func_names.contains_key(&name) {
            return None;
        }
        let text = self.st.get(name).unwrap_or_default();
        let id = FuncId(self.functions.len() as u32);
        self.functions
            .push(Function::new(name, format!("@{}", text), ret_ty));
        self.func_names.insert(name, id);
        Some(id)
    }

    pub fn find_function(&self, name: StringId) -> Option<FuncId> {
        self.func_names.get(&name).copied()
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn leave_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "cannot leave the global scope");
        self.scopes.pop();
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Creates a variable in the current scope: a global when no function is
    /// active, otherwise a local of the current function. Anonymous locals
    /// get a synthesized IR name and are still tracked in the function.
    pub fn new_var_value(&mut self, ty: TypeId, name: Option<StringId>) -> ValueId {
        match self.current {
            Some(f) => {
                let scope_level = (self.scopes.len() - 1) as u32;
                let ir_name = self.functions[f.index()].next_local_name();
                let id = self.push_value(Value::new(
                    ty,
                    name,
                    ir_name,
                    ValueKind::Local { scope_level },
                ));
                self.functions[f.index()].locals.push(id);
                if let Some(n) = name {
                    self.scopes.last_mut().unwrap().insert(n, id);
                }
                id
            }
            None => {
                let ir_name = match name {
                    Some(n) => format!("@{}", self.st.get(n).unwrap_or_default()),
                    None => {
                        let n = self.next_global;
                        self.next_global += 1;
                        format!("@g{}", n)
                    }
                };
                let id = self.push_value(Value::new(
                    ty,
                    name,
                    ir_name,
                    ValueKind::Global { init: None },
                ));
                self.globals.push(id);
                if let Some(n) = name {
                    self.scopes[0].insert(n, id);
                }
                id
            }
        }
    }

    /// Resolves a name against the scope stack, innermost first.
    pub fn find_var_value(&self, name: StringId) -> Option<ValueId> {
        for scope in self.scopes.iter().rev() {
            if let Some(id) = scope.get(&name) {
                return Some(*id);
            }
        }
        None
    }

    /// Integer constants are interned per module.
    pub fn new_const_int(&mut self, i: i32) -> ValueId {
        if let Some(id) = self.const_pool.get(&i) {
            return *id;
        }
        let ty = self.types.int32();
        let id = self.push_value(Value::new(ty, None, i.to_string(), ValueKind::ConstInt(i)));
        self.const_pool.insert(i, id);
        id
    }

    /// Creates a formal parameter value for the current function.
    pub fn new_param(&mut self, ty: TypeId, name: StringId, index: usize) -> ValueId {
        let text = self.st.get(name).unwrap_or_default();
        self.push_value(Value::new(
            ty,
            Some(name),
            format!("%{}", text),
            ValueKind::Param { index },
        ))
    }

    /// A stack slot addressed as `[base, #offset]`, synthesized by the
    /// backend for overflow call arguments.
    pub fn new_mem_slot(&mut self, ty: TypeId, base: i32, offset: i32) -> ValueId {
        let mut v = Value::new(ty, None, String::new(), ValueKind::MemSlot);
        v.set_mem(base, offset);
        self.push_value(v)
    }

    /// An ABI register pseudo-value (used for r0..r3 marshalling).
    pub fn new_reg_value(&mut self, ty: TypeId, reg: i32) -> ValueId {
        let mut v = Value::new(ty, None, format!("r{}", reg), ValueKind::Reg);
        v.set_reg(reg);
        self.push_value(v)
    }

    /// Creates an instruction value for function `f` and wires a def-use
    /// edge from every data operand back to the new instruction.
    pub fn new_inst(&mut self, f: FuncId, kind: InstKind, ty: TypeId) -> ValueId {
        let ir_name = if matches!(kind, InstKind::Label) {
            self.functions[f.index()].next_label_name()
        } else if kind.defines_result() && !self.types.is_void(ty) {
            self.functions[f.index()].next_temp_name()
        } else {
            String::new()
        };

        let operands = kind.data_operands();
        let id = self.push_value(Value::new(ty, None, ir_name, ValueKind::Inst(kind)));
        for (slot, op) in operands.into_iter().enumerate() {
            self.values[op.index()].add_use(Use { user: id, slot });
        }
        id
    }

    pub fn new_label(&mut self, f: FuncId) -> ValueId {
        let ty = self.types.void();
        self.new_inst(f, InstKind::Label, ty)
    }

    /// Rewrites data operand `slot` of `inst` to read `new`, keeping both
    /// endpoints of the def-use edge in step.
    pub fn replace_operand(&mut self, inst: ValueId, slot: usize, new: ValueId) {
        let old = match &mut self.values[inst.index()].kind {
            ValueKind::Inst(k) => k.set_data_operand(slot, new),
            _ => None,
        };
        if let Some(old) = old {
            self.values[old.index()].remove_use(inst, slot);
            self.values[new.index()].add_use(Use { user: inst, slot });
        }
    }

    /// Severs the def-use edges of an instruction that is being discarded,
    /// e.g. the transient moves the instruction selector synthesizes.
    pub fn release_uses(&mut self, inst: ValueId) {
        let operands = match self.values[inst.index()].as_inst() {
            Some(k) => k.data_operands(),
            None => return,
        };
        for (slot, op) in operands.into_iter().enumerate() {
            self.values[op.index()].remove_use(inst, slot);
        }
    }

    fn push_value(&mut self, v: Value) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(v);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::instruction::BinaryOp;

    fn module(st: &StringTable) -> Module {
        Module::new(st)
    }

    #[test]
    fn test_globals_live_at_level_zero() {
        let st = StringTable::new();
        let mut m = module(&st);
        let g = st.insert("g".into());
        let ty = m.types.int32();
        let id = m.new_var_value(ty, Some(g));
        assert_eq!(m.value(id).scope_level(), 0);
        assert_eq!(m.find_var_value(g), Some(id));
        assert_eq!(m.value(id).ir_name, "@g");
    }

    #[test]
    fn test_inner_scope_shadows_outer() {
        let st = StringTable::new();
        let mut m = module(&st);
        let x = st.insert("x".into());
        let f = st.insert("f".into());
        let ty = m.types.int32();

        let outer = m.new_var_value(ty, Some(x));
        let fid = m.new_function(f, ty).unwrap();
        m.set_current_function(Some(fid));
        m.enter_scope();
        let inner = m.new_var_value(ty, Some(x));

        assert_ne!(outer, inner);
        assert_eq!(m.find_var_value(x), Some(inner));
        // A resolved value never comes from deeper than the current scope.
        assert!(m.value(inner).scope_level() as usize <= m.scope_depth());

        m.leave_scope();
        assert_eq!(m.find_var_value(x), Some(outer));
        assert!(m.value(outer).scope_level() as usize <= m.scope_depth());
    }

    #[test]
    fn test_leaving_scope_unresolves_names() {
        let st = StringTable::new();
        let mut m = module(&st);
        let f = st.insert("f".into());
        let y = st.insert("y".into());
        let ty = m.types.int32();
        let fid = m.new_function(f, ty).unwrap();
        m.set_current_function(Some(fid));
        m.enter_scope();
        m.new_var_value(ty, Some(y));
        assert!(m.find_var_value(y).is_some());
        m.leave_scope();
        assert!(m.find_var_value(y).is_none());
    }

    #[test]
    fn test_duplicate_function_names_rejected() {
        let st = StringTable::new();
        let mut m = module(&st);
        let f = st.insert("f".into());
        let ty = m.types.int32();
        assert!(m.new_function(f, ty).is_some());
        assert!(m.new_function(f, ty).is_none());
    }

    #[test]
    fn test_constants_are_interned() {
        let st = StringTable::new();
        let mut m = module(&st);
        assert_eq!(m.new_const_int(42), m.new_const_int(42));
        assert_ne!(m.new_const_int(42), m.new_const_int(43));
    }

    #[test]
    fn test_new_inst_wires_def_use_edges() {
        let st = StringTable::new();
        let mut m = module(&st);
        let f = st.insert("f".into());
        let ty = m.types.int32();
        let fid = m.new_function(f, ty).unwrap();
        m.set_current_function(Some(fid));

        let a = m.new_const_int(1);
        let b = m.new_const_int(2);
        let add = m.new_inst(
            fid,
            InstKind::Binary {
                op: BinaryOp::Add,
                lhs: a,
                rhs: b,
            },
            ty,
        );

        assert_eq!(m.value(a).uses.len(), 1);
        assert_eq!(m.value(a).uses[0].user, add);
        assert_eq!(m.value(b).uses[0].slot, 1);
        assert_eq!(m.value(add).ir_name, "%t0");

        m.release_uses(add);
        assert!(m.value(a).uses.is_empty());
        assert!(m.value(b).uses.is_empty());
    }

    #[test]
    fn test_replace_operand_moves_both_edge_ends() {
        let st = StringTable::new();
        let mut m = module(&st);
        let f = st.insert("f".into());
        let ty = m.types.int32();
        let fid = m.new_function(f, ty).unwrap();
        m.set_current_function(Some(fid));

        let a = m.new_const_int(1);
        let b = m.new_const_int(2);
        let c = m.new_const_int(3);
        let add = m.new_inst(
            fid,
            InstKind::Binary {
                op: BinaryOp::Add,
                lhs: a,
                rhs: b,
            },
            ty,
        );

        m.replace_operand(add, 1, c);

        assert!(m.value(b).uses.is_empty());
        assert_eq!(m.value(c).uses, vec![Use { user: add, slot: 1 }]);
        match m.value(add).as_inst() {
            Some(InstKind::Binary { rhs, .. }) => assert_eq!(*rhs, c),
            other => panic!("expected a binary instruction, got {:?}", other),
        }
    }

    #[test]
    fn test_labels_are_numbered_per_function() {
        let st = StringTable::new();
        let mut m = module(&st);
        let f = st.insert("f".into());
        let ty = m.types.int32();
        let fid = m.new_function(f, ty).unwrap();
        let l1 = m.new_label(fid);
        let l2 = m.new_label(fid);
        assert_eq!(m.value(l1).ir_name, ".L1");
        assert_eq!(m.value(l2).ir_name, ".L2");
    }
}
