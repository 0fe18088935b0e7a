//! Short-circuit translation of boolean expressions and the statements
//! built on them.
//!
//! Boolean contexts never materialize a 0/1 value up front. Instead the
//! inherited true/false labels are threaded through the expression: `&&`
//! chains its left operand to a fresh label before the right one, `||`
//! mirrors that on the false edge, `!` swaps the labels, and relational
//! operators finally emit a compare plus a conditional branch. Anything
//! else is rewritten into `value != 0` and translated the same way.

use log::debug;

use super::{relational_op, LowerResult, Lowered, Lowering};
use crate::compiler::ast::{BinaryAstOp, Expression, Statement, UnaryAstOp};
use crate::compiler::diagnostics::SemanticError;
use crate::compiler::ir::{BinaryOp, FuncId, InstKind, ValueId};

impl<'a, 'st> Lowering<'a, 'st> {
    /// Lowers `expr` in a boolean context with the inherited labels.
    pub(super) fn lower_cond(
        &mut self,
        fid: FuncId,
        expr: &Expression,
        true_label: ValueId,
        false_label: ValueId,
    ) -> Result<Vec<ValueId>, ()> {
        match expr {
            Expression::Binary {
                op: BinaryAstOp::And,
                lhs,
                rhs,
                ..
            } => {
                debug!("short-circuit &&");
                // The right operand only runs when the left one was true.
                let right_label = self.module.new_label(fid);
                let mut insts = self.lower_cond(fid, lhs, right_label, false_label)?;
                insts.push(right_label);
                insts.extend(self.lower_cond(fid, rhs, true_label, false_label)?);
                Ok(insts)
            }
            Expression::Binary {
                op: BinaryAstOp::Or,
                lhs,
                rhs,
                ..
            } => {
                debug!("short-circuit ||");
                // The right operand only runs when the left one was false.
                let right_label = self.module.new_label(fid);
                let mut insts = self.lower_cond(fid, lhs, true_label, right_label)?;
                insts.push(right_label);
                insts.extend(self.lower_cond(fid, rhs, true_label, false_label)?);
                Ok(insts)
            }
            Expression::Unary {
                op: UnaryAstOp::Not,
                operand,
                ..
            } => self.lower_cond(fid, operand, false_label, true_label),
            Expression::Binary { op, lhs, rhs, .. } if relational_op(*op).is_some() => {
                self.lower_relational(fid, relational_op(*op).unwrap(), lhs, rhs, true_label, false_label)
            }
            // Any other expression is compared against zero.
            other => {
                let lowered = self.lower_expr(fid, other)?;
                let val = lowered.val.ok_or(())?;
                let mut insts = lowered.insts;
                let zero = self.module.new_const_int(0);
                let boolean = self.module.types.boolean();
                let cmp = self.module.new_inst(
                    fid,
                    InstKind::Binary {
                        op: BinaryOp::CmpNe,
                        lhs: val,
                        rhs: zero,
                    },
                    boolean,
                );
                insts.push(cmp);
                let void = self.void();
                insts.push(self.module.new_inst(
                    fid,
                    InstKind::CondGoto {
                        cond: cmp,
                        true_target: true_label,
                        false_target: false_label,
                    },
                    void,
                ));
                Ok(insts)
            }
        }
    }

    fn lower_relational(
        &mut self,
        fid: FuncId,
        op: BinaryOp,
        lhs: &Expression,
        rhs: &Expression,
        true_label: ValueId,
        false_label: ValueId,
    ) -> Result<Vec<ValueId>, ()> {
        let left = self.lower_expr(fid, lhs)?;
        let right = self.lower_expr(fid, rhs)?;
        let l = left.val.ok_or(())?;
        let r = right.val.ok_or(())?;

        let mut insts = left.insts;
        insts.extend(right.insts);

        let boolean = self.module.types.boolean();
        let cmp = self
            .module
            .new_inst(fid, InstKind::Binary { op, lhs: l, rhs: r }, boolean);
        insts.push(cmp);

        let void = self.void();
        insts.push(self.module.new_inst(
            fid,
            InstKind::CondGoto {
                cond: cmp,
                true_target: true_label,
                false_target: false_label,
            },
            void,
        ));
        Ok(insts)
    }

    /// A boolean expression in value position: run the label translator and
    /// write 1 on the true path, 0 on the false path.
    pub(super) fn lower_bool_value(&mut self, fid: FuncId, expr: &Expression) -> LowerResult {
        let true_label = self.module.new_label(fid);
        let false_label = self.module.new_label(fid);
        let end_label = self.module.new_label(fid);
        let int32 = self.int32();
        let void = self.void();
        let result = self.module.new_var_value(int32, None);

        let mut insts = self.lower_cond(fid, expr, true_label, false_label)?;

        insts.push(true_label);
        let one = self.module.new_const_int(1);
        insts.push(self.module.new_inst(
            fid,
            InstKind::Move {
                dst: result,
                src: one,
            },
            void,
        ));
        insts.push(self.module.new_inst(
            fid,
            InstKind::Goto { target: end_label },
            void,
        ));

        insts.push(false_label);
        let zero = self.module.new_const_int(0);
        insts.push(self.module.new_inst(
            fid,
            InstKind::Move {
                dst: result,
                src: zero,
            },
            void,
        ));

        insts.push(end_label);
        Ok(Lowered {
            insts,
            val: Some(result),
        })
    }

    pub(super) fn lower_if(
        &mut self,
        fid: FuncId,
        cond: &Expression,
        then_body: &Statement,
        else_body: Option<&Statement>,
        _line: u32,
    ) -> Result<Vec<ValueId>, ()> {
        let void = self.void();
        let then_label = self.module.new_label(fid);
        let else_label = else_body.map(|_| self.module.new_label(fid));
        let end_label = self.module.new_label(fid);

        let mut insts =
            self.lower_cond(fid, cond, then_label, else_label.unwrap_or(end_label))?;

        insts.push(then_label);
        insts.extend(self.lower_stmt(fid, then_body)?);

        if let (Some(else_label), Some(else_body)) = (else_label, else_body) {
            insts.push(self.module.new_inst(
                fid,
                InstKind::Goto { target: end_label },
                void,
            ));
            insts.push(else_label);
            insts.extend(self.lower_stmt(fid, else_body)?);
        }

        insts.push(end_label);
        Ok(insts)
    }

    pub(super) fn lower_while(
        &mut self,
        fid: FuncId,
        cond: &Expression,
        body: &Statement,
        _line: u32,
    ) -> Result<Vec<ValueId>, ()> {
        let void = self.void();
        let entry_label = self.module.new_label(fid);
        let body_label = self.module.new_label(fid);
        let exit_label = self.module.new_label(fid);

        // `break` leaves through the exit label, `continue` re-evaluates
        // the condition.
        self.module
            .func_mut(fid)
            .push_loop_labels(exit_label, entry_label);

        let result = (|| {
            let mut insts = vec![entry_label];
            insts.extend(self.lower_cond(fid, cond, body_label, exit_label)?);
            insts.push(body_label);
            insts.extend(self.lower_stmt(fid, body)?);
            insts.push(self.module.new_inst(
                fid,
                InstKind::Goto {
                    target: entry_label,
                },
                void,
            ));
            insts.push(exit_label);
            Ok(insts)
        })();

        // The loop-label stacks unwind even when the body failed to lower.
        self.module.func_mut(fid).pop_loop_labels();
        result
    }

    pub(super) fn lower_break(&mut self, fid: FuncId, line: u32) -> Result<Vec<ValueId>, ()> {
        let void = self.void();
        match self.module.func(fid).break_label() {
            Some(target) => Ok(vec![self
                .module
                .new_inst(fid, InstKind::Goto { target }, void)]),
            None => {
                self.diags.error(line, SemanticError::BreakOutsideLoop);
                Err(())
            }
        }
    }

    pub(super) fn lower_continue(&mut self, fid: FuncId, line: u32) -> Result<Vec<ValueId>, ()> {
        let void = self.void();
        match self.module.func(fid).continue_label() {
            Some(target) => Ok(vec![self
                .module
                .new_inst(fid, InstKind::Goto { target }, void)]),
            None => {
                self.diags.error(line, SemanticError::ContinueOutsideLoop);
                Err(())
            }
        }
    }
}
