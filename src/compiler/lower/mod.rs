//! Converts the AST into the linear three-address IR.
//!
//! The walker dispatches on node kind with an exhaustive match. Every
//! handler collects the instructions it emits into a per-node list which the
//! caller splices into its own; this keeps evaluation strictly left to right
//! without a global cursor. Semantic faults are reported into the
//! diagnostics sink; a handler that failed returns `Err(())` and the parent
//! propagates the failure upward.

mod cond;

#[cfg(test)]
mod tests;

use log::debug;

use crate::compiler::ast::*;
use crate::compiler::diagnostics::{Diagnostics, SemanticError};
use crate::compiler::ir::{BinaryOp, FuncId, InstKind, Module, TypeId, UnaryOp, ValueId, ValueKind};

/// The result a lowered AST node hands back to its parent: the emitted
/// instructions and, for expressions, the value holding the result.
pub struct Lowered {
    pub insts: Vec<ValueId>,
    pub val: Option<ValueId>,
}

impl Lowered {
    fn value(val: ValueId) -> Lowered {
        Lowered {
            insts: vec![],
            val: Some(val),
        }
    }
}

type LowerResult = Result<Lowered, ()>;

/// How an array access is being used, which decides whether it yields a
/// pointer or the loaded element.
#[derive(Clone, Copy, PartialEq)]
enum AccessMode {
    /// Value context: dereference and yield the element.
    Load,
    /// Left side of an assignment: yield the element address.
    Target,
    /// Actual argument of a call: a partial index yields the sub-array
    /// address with its remaining dimensions.
    CallArg,
}

pub struct Lowering<'a, 'st> {
    module: &'a mut Module<'st>,
    diags: &'a mut Diagnostics,
}

impl<'a, 'st> Lowering<'a, 'st> {
    /// Lowers a whole compilation unit. Returns false when any semantic
    /// error was raised; IR already produced stays in the module.
    pub fn run(
        module: &'a mut Module<'st>,
        diags: &'a mut Diagnostics,
        unit: &CompilationUnit,
    ) -> bool {
        let mut this = Lowering { module, diags };
        this.module.set_current_function(None);

        for item in &unit.items {
            // Keep going after a failed item so one pass reports as much
            // as possible.
            let _ = match item {
                Item::Globals(decls) => this.lower_globals(decls),
                Item::Function(def) => this.lower_function(def),
            };
        }

        !this.diags.has_errors()
    }

    fn int32(&self) -> TypeId {
        self.module.types.int32()
    }

    fn void(&self) -> TypeId {
        self.module.types.void()
    }

    fn lower_globals(&mut self, decls: &[VarDecl]) -> Result<(), ()> {
        for decl in decls {
            let dims = self.fold_dims(decl)?;
            let ty = if dims.is_empty() {
                self.int32()
            } else {
                let elem = self.int32();
                self.module.types.array_of(elem, dims.clone())
            };
            let var = self.module.new_var_value(ty, Some(decl.name));
            self.module.value_mut(var).dims = dims;

            if let Some(init) = &decl.init {
                match fold_const(init) {
                    Some(c) => {
                        if let ValueKind::Global { init } = &mut self.module.value_mut(var).kind {
                            *init = Some(c);
                        }
                    }
                    None => {
                        self.diags.error(
                            decl.line,
                            SemanticError::GlobalInitializerNotConstant(decl.name),
                        );
                        return Err(());
                    }
                }
            }
        }
        Ok(())
    }

    fn lower_function(&mut self, def: &FunctionDef) -> Result<(), ()> {
        debug!("lowering function definition");

        // A definition while another function is active can only be a
        // nested one.
        if self.module.current_function().is_some() {
            self.diags
                .error(def.line, SemanticError::NestedFunction(def.name));
            return Err(());
        }

        let ret_ty = match def.ret {
            TypeSpec::Int => self.int32(),
            TypeSpec::Void => self.void(),
        };
        let fid = match self.module.new_function(def.name, ret_ty) {
            Some(f) => f,
            None => {
                self.diags
                    .error(def.line, SemanticError::DuplicateFunction(def.name));
                return Err(());
            }
        };

        self.module.set_current_function(Some(fid));
        self.module.enter_scope();

        let result = self.lower_function_body(fid, def, ret_ty);

        // The scope and the current-function marker unwind regardless of
        // whether the body lowered cleanly.
        self.module.set_current_function(None);
        self.module.leave_scope();
        result
    }

    fn lower_function_body(
        &mut self,
        fid: FuncId,
        def: &FunctionDef,
        ret_ty: TypeId,
    ) -> Result<(), ()> {
        let void = self.void();
        let mut code = vec![self.module.new_inst(fid, InstKind::Entry, void)];

        // The exit label exists up front: `return` statements in the body
        // jump to it.
        let exit_label = self.module.new_label(fid);
        self.module.func_mut(fid).exit_label = Some(exit_label);

        code.append(&mut self.lower_params(fid, &def.params)?);

        let mut ret_slot = None;
        if !self.module.types.is_void(ret_ty) {
            let slot = self.module.new_var_value(ret_ty, None);
            ret_slot = Some(slot);

            // Control paths in `main` that never reach a `return` must
            // still produce exit status 0.
            if self.module.strings().get(def.name).as_deref() == Some("main") {
                let zero = self.module.new_const_int(0);
                code.push(self.module.new_inst(
                    fid,
                    InstKind::Move {
                        dst: slot,
                        src: zero,
                    },
                    void,
                ));
            }
        }
        self.module.func_mut(fid).ret_slot = ret_slot;

        // The function-definition handler has already entered the scope
        // holding the parameters, so the body block does not open another.
        code.append(&mut self.lower_block(fid, &def.body)?);

        code.push(exit_label);
        code.push(
            self.module
                .new_inst(fid, InstKind::Exit { ret: ret_slot }, void),
        );

        self.module.func_mut(fid).code = code;
        Ok(())
    }

    /// Each parameter produces two artifacts: the ABI-visible formal and a
    /// local it is copied into at entry. Array parameters transfer a base
    /// address; the binding move carries the dimensions.
    fn lower_params(&mut self, fid: FuncId, params: &[Param]) -> Result<Vec<ValueId>, ()> {
        let int32 = self.int32();
        let void = self.void();
        let mut insts = vec![];

        for (index, p) in params.iter().enumerate() {
            let mut dims = vec![];
            for d in &p.dims {
                match fold_const(d) {
                    Some(c) => dims.push(c),
                    None => {
                        self.diags
                            .error(p.line, SemanticError::NonConstantArrayDimension(p.name));
                        return Err(());
                    }
                }
            }

            let formal = self.module.new_param(int32, p.name, index);
            self.module.value_mut(formal).dims = dims.clone();
            self.module.func_mut(fid).params.push(formal);

            let local = self.module.new_var_value(int32, Some(p.name));
            self.module.value_mut(local).dims = dims.clone();

            let mv = self.module.new_inst(
                fid,
                InstKind::Move {
                    dst: local,
                    src: formal,
                },
                void,
            );
            self.module.value_mut(mv).dims = dims;
            insts.push(mv);
        }
        Ok(insts)
    }

    fn lower_block(&mut self, fid: FuncId, block: &Block) -> Result<Vec<ValueId>, ()> {
        let mut insts = vec![];
        for stmt in &block.stmts {
            insts.append(&mut self.lower_stmt(fid, stmt)?);
        }
        Ok(insts)
    }

    fn lower_stmt(&mut self, fid: FuncId, stmt: &Statement) -> Result<Vec<ValueId>, ()> {
        match stmt {
            Statement::Declare(decls) => self.lower_declare(fid, decls),
            Statement::Function(def) => {
                self.lower_function(def)?;
                Ok(vec![])
            }
            Statement::Assign {
                target,
                value,
                line,
            } => self.lower_assign(fid, target, value, *line),
            Statement::If {
                cond,
                then_body,
                else_body,
                line,
            } => self.lower_if(fid, cond, then_body, else_body.as_deref(), *line),
            Statement::While { cond, body, line } => self.lower_while(fid, cond, body, *line),
            Statement::Break(line) => self.lower_break(fid, *line),
            Statement::Continue(line) => self.lower_continue(fid, *line),
            Statement::Return(value, line) => self.lower_return(fid, value.as_ref(), *line),
            Statement::Block(block) => {
                self.module.enter_scope();
                let result = self.lower_block(fid, block);
                self.module.leave_scope();
                result
            }
            Statement::Expr(expr) => Ok(self.lower_expr(fid, expr)?.insts),
            Statement::Empty => Ok(vec![]),
        }
    }

    fn lower_declare(&mut self, fid: FuncId, decls: &[VarDecl]) -> Result<Vec<ValueId>, ()> {
        let void = self.void();
        let mut insts = vec![];

        for decl in decls {
            let dims = self.fold_dims(decl)?;
            let ty = if dims.is_empty() {
                self.int32()
            } else {
                let elem = self.int32();
                self.module.types.array_of(elem, dims.clone())
            };
            let var = self.module.new_var_value(ty, Some(decl.name));
            self.module.value_mut(var).dims = dims;

            if let Some(init) = &decl.init {
                let rhs = self.lower_expr(fid, init)?;
                insts.extend(rhs.insts);
                let src = rhs.val.ok_or(())?;
                insts.push(
                    self.module
                        .new_inst(fid, InstKind::Move { dst: var, src }, void),
                );
            }
        }
        Ok(insts)
    }

    /// The right side is evaluated first, then the target; the move comes
    /// last.
    fn lower_assign(
        &mut self,
        fid: FuncId,
        target: &Expression,
        value: &Expression,
        line: u32,
    ) -> Result<Vec<ValueId>, ()> {
        let rhs = self.lower_expr(fid, value)?;
        let src = rhs.val.ok_or(())?;

        let lhs = match target {
            Expression::Ident(name, line) => match self.module.find_var_value(*name) {
                Some(v) => Lowered::value(v),
                None => {
                    self.diags
                        .error(*line, SemanticError::UndefinedVariable(*name));
                    return Err(());
                }
            },
            Expression::ArrayAccess {
                name,
                indices,
                line,
            } => self.lower_array_access(fid, *name, indices, *line, AccessMode::Target)?,
            // The parser only lets variables and array elements through.
            _ => return Err(()),
        };
        let dst = lhs.val.ok_or(())?;

        if self.module.types.is_void(self.module.value(src).ty) {
            self.diags.warning(line, SemanticError::AssignTypeMismatch);
        }

        let mut insts = rhs.insts;
        insts.extend(lhs.insts);
        let void = self.void();
        insts.push(self.module.new_inst(fid, InstKind::Move { dst, src }, void));
        Ok(insts)
    }

    fn lower_return(
        &mut self,
        fid: FuncId,
        value: Option<&Expression>,
        line: u32,
    ) -> Result<Vec<ValueId>, ()> {
        let void = self.void();
        let ret_slot = self.module.func(fid).ret_slot;
        let exit_label = self.module.func(fid).exit_label.ok_or(())?;
        let mut insts = vec![];

        match (ret_slot, value) {
            (Some(slot), Some(expr)) => {
                let lowered = self.lower_expr(fid, expr)?;
                insts.extend(lowered.insts);
                let src = lowered.val.ok_or(())?;
                let slot_ty = self.module.value(slot).ty;
                if self.module.value(src).ty != slot_ty {
                    self.diags.warning(line, SemanticError::ReturnTypeMismatch);
                }
                insts.push(self.module.new_inst(fid, InstKind::Move { dst: slot, src }, void));
            }
            (Some(_), None) => {
                // The return slot keeps whatever it holds; main's was
                // initialized to 0 at entry.
                self.diags.warning(line, SemanticError::MissingReturnValue);
            }
            (None, Some(expr)) => {
                self.diags
                    .warning(line, SemanticError::ReturnValueInVoidFunction);
                // The expression may have side effects, so it still runs.
                insts.extend(self.lower_expr(fid, expr)?.insts);
            }
            (None, None) => (),
        }

        insts.push(self.module.new_inst(
            fid,
            InstKind::Goto { target: exit_label },
            void,
        ));
        Ok(insts)
    }

    fn lower_expr(&mut self, fid: FuncId, expr: &Expression) -> LowerResult {
        match expr {
            Expression::IntLit(v, _) => Ok(Lowered::value(self.module.new_const_int(*v))),
            Expression::Ident(name, line) => match self.module.find_var_value(*name) {
                Some(v) => Ok(Lowered::value(v)),
                None => {
                    self.diags
                        .error(*line, SemanticError::UndefinedVariable(*name));
                    Err(())
                }
            },
            Expression::ArrayAccess {
                name,
                indices,
                line,
            } => self.lower_array_access(fid, *name, indices, *line, AccessMode::Load),
            Expression::Unary { op, operand, .. } => match op {
                UnaryAstOp::Neg => {
                    let inner = self.lower_expr(fid, operand)?;
                    let src = inner.val.ok_or(())?;
                    let int32 = self.int32();
                    let mut insts = inner.insts;
                    let neg = self.module.new_inst(
                        fid,
                        InstKind::Unary {
                            op: UnaryOp::Neg,
                            src,
                        },
                        int32,
                    );
                    insts.push(neg);
                    Ok(Lowered {
                        insts,
                        val: Some(neg),
                    })
                }
                UnaryAstOp::Not => self.lower_bool_value(fid, expr),
            },
            Expression::Binary { op, lhs, rhs, .. } => {
                if op.is_boolean() {
                    // Relational and logical results in value position get
                    // materialized as 0/1 through the branch translator.
                    self.lower_bool_value(fid, expr)
                } else {
                    self.lower_arith(fid, *op, lhs, rhs)
                }
            }
            Expression::Call { name, args, line } => self.lower_call(fid, *name, args, *line),
        }
    }

    fn lower_arith(
        &mut self,
        fid: FuncId,
        op: BinaryAstOp,
        lhs: &Expression,
        rhs: &Expression,
    ) -> LowerResult {
        let left = self.lower_expr(fid, lhs)?;
        let right = self.lower_expr(fid, rhs)?;
        let l = left.val.ok_or(())?;
        let r = right.val.ok_or(())?;

        let int32 = self.int32();
        let mut insts = left.insts;
        insts.extend(right.insts);
        let inst = self.module.new_inst(
            fid,
            InstKind::Binary {
                op: arith_op(op),
                lhs: l,
                rhs: r,
            },
            int32,
        );
        insts.push(inst);
        Ok(Lowered {
            insts,
            val: Some(inst),
        })
    }

    fn lower_call(
        &mut self,
        fid: FuncId,
        name: crate::compiler::stringtable::StringId,
        args: &[Expression],
        line: u32,
    ) -> LowerResult {
        debug!("lowering call");

        let callee = match self.module.find_function(name) {
            Some(f) => f,
            None => {
                self.diags
                    .error(line, SemanticError::UndefinedFunction(name));
                return Err(());
            }
        };

        self.module.func_mut(fid).record_call(args.len());

        let mut insts = vec![];
        let mut arg_vals = vec![];
        for arg in args {
            // A partially indexed array argument decays to the sub-array
            // address and keeps its remaining shape.
            let lowered = match arg {
                Expression::ArrayAccess {
                    name,
                    indices,
                    line,
                } => self.lower_array_access(fid, *name, indices, *line, AccessMode::CallArg)?,
                other => self.lower_expr(fid, other)?,
            };
            insts.extend(lowered.insts);
            arg_vals.push(lowered.val.ok_or(())?);
        }

        let expected = self.module.func(callee).params.len();
        if expected != arg_vals.len() {
            self.diags.error(
                line,
                SemanticError::ArityMismatch {
                    name,
                    expected,
                    found: arg_vals.len(),
                },
            );
            return Err(());
        }

        let ret_ty = self.module.func(callee).ret_ty;
        let call = self.module.new_inst(
            fid,
            InstKind::Call {
                callee,
                callee_name: name,
                args: arg_vals,
            },
            ret_ty,
        );
        insts.push(call);
        Ok(Lowered {
            insts,
            val: Some(call),
        })
    }

    /// Row-major address arithmetic for `a[i0]..[ik]`, element size 4.
    /// Which value comes back depends on the context the access sits in.
    fn lower_array_access(
        &mut self,
        fid: FuncId,
        name: crate::compiler::stringtable::StringId,
        indices: &[Expression],
        line: u32,
        mode: AccessMode,
    ) -> LowerResult {
        let var = match self.module.find_var_value(name) {
            Some(v) => v,
            None => {
                self.diags
                    .error(line, SemanticError::UndefinedVariable(name));
                return Err(());
            }
        };
        let dims = self.module.value(var).dims.clone();
        let int32 = self.int32();
        let mut insts = vec![];

        let mut total: Option<ValueId> = None;
        for (i, index) in indices.iter().enumerate() {
            let lowered = self.lower_expr(fid, index)?;
            insts.extend(lowered.insts);
            let idx = lowered.val.ok_or(())?;

            let multiplier = crate::compiler::ir::types::dimension_multiplier(&dims, i);
            let scaled = if multiplier == 1 {
                idx
            } else {
                let m = self.module.new_const_int(multiplier);
                let mul = self.module.new_inst(
                    fid,
                    InstKind::Binary {
                        op: BinaryOp::Mul,
                        lhs: idx,
                        rhs: m,
                    },
                    int32,
                );
                insts.push(mul);
                mul
            };

            total = Some(match total {
                None => scaled,
                Some(acc) => {
                    let add = self.module.new_inst(
                        fid,
                        InstKind::Binary {
                            op: BinaryOp::Add,
                            lhs: acc,
                            rhs: scaled,
                        },
                        int32,
                    );
                    insts.push(add);
                    add
                }
            });
        }
        let total = total.ok_or(())?;

        let four = self.module.new_const_int(4);
        let byte_offset = self.module.new_inst(
            fid,
            InstKind::Binary {
                op: BinaryOp::Mul,
                lhs: total,
                rhs: four,
            },
            int32,
        );
        insts.push(byte_offset);

        let ptr_ty = self.module.types.pointer_to(int32);
        let addr = self.module.new_inst(
            fid,
            InstKind::Binary {
                op: BinaryOp::Add,
                lhs: var,
                rhs: byte_offset,
            },
            ptr_ty,
        );
        insts.push(addr);

        match mode {
            AccessMode::Target => Ok(Lowered {
                insts,
                val: Some(addr),
            }),
            AccessMode::CallArg if indices.len() < dims.len() => {
                // The callee's binding needs the sub-array shape.
                self.module.value_mut(addr).dims = dims[indices.len()..].to_vec();
                Ok(Lowered {
                    insts,
                    val: Some(addr),
                })
            }
            _ => {
                let load = self.module.new_inst(
                    fid,
                    InstKind::Unary {
                        op: UnaryOp::Deref,
                        src: addr,
                    },
                    int32,
                );
                insts.push(load);
                Ok(Lowered {
                    insts,
                    val: Some(load),
                })
            }
        }
    }

    fn fold_dims(&mut self, decl: &VarDecl) -> Result<Vec<i32>, ()> {
        let mut dims = vec![];
        for d in &decl.dims {
            match fold_const(d) {
                Some(c) => dims.push(c),
                None => {
                    self.diags
                        .error(decl.line, SemanticError::NonConstantArrayDimension(decl.name));
                    return Err(());
                }
            }
        }
        Ok(dims)
    }
}

/// Folds the constant expressions the language admits in static positions:
/// a literal, possibly negated.
fn fold_const(expr: &Expression) -> Option<i32> {
    match expr {
        Expression::IntLit(v, _) => Some(*v),
        Expression::Unary {
            op: UnaryAstOp::Neg,
            operand,
            ..
        } => match operand.as_ref() {
            Expression::IntLit(v, _) => Some(-*v),
            _ => None,
        },
        _ => None,
    }
}

fn arith_op(op: BinaryAstOp) -> BinaryOp {
    match op {
        BinaryAstOp::Add => BinaryOp::Add,
        BinaryAstOp::Sub => BinaryOp::Sub,
        BinaryAstOp::Mul => BinaryOp::Mul,
        BinaryAstOp::Div => BinaryOp::Div,
        BinaryAstOp::Mod => BinaryOp::Mod,
        // Boolean operators never reach the arithmetic handler.
        other => panic!("operator {:?} is not arithmetic", other),
    }
}

fn relational_op(op: BinaryAstOp) -> Option<BinaryOp> {
    match op {
        BinaryAstOp::Eq => Some(BinaryOp::CmpEq),
        BinaryAstOp::Ne => Some(BinaryOp::CmpNe),
        BinaryAstOp::Lt => Some(BinaryOp::CmpLt),
        BinaryAstOp::Le => Some(BinaryOp::CmpLe),
        BinaryAstOp::Gt => Some(BinaryOp::CmpGt),
        BinaryAstOp::Ge => Some(BinaryOp::CmpGe),
        _ => None,
    }
}
