//! The instruction variants of the linear IR. An instruction is a value
//! (most of them define a result); its kind is a tagged variant carrying
//! per-kind payloads, and the backend dispatches on the tag.

use super::value::ValueId;
use crate::compiler::stringtable::StringId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FuncId(pub(crate) u32);

impl FuncId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,
}

impl BinaryOp {
    pub fn is_cmp(self) -> bool {
        matches!(
            self,
            BinaryOp::CmpEq
                | BinaryOp::CmpNe
                | BinaryOp::CmpLt
                | BinaryOp::CmpLe
                | BinaryOp::CmpGt
                | BinaryOp::CmpGe
        )
    }

    /// The operator's spelling in the textual IR.
    pub fn ir_text(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "sdiv",
            BinaryOp::Mod => "mod",
            BinaryOp::CmpEq => "icmp_eq",
            BinaryOp::CmpNe => "icmp_ne",
            BinaryOp::CmpLt => "icmp_lt",
            BinaryOp::CmpLe => "icmp_le",
            BinaryOp::CmpGt => "icmp_gt",
            BinaryOp::CmpGe => "icmp_ge",
        }
    }

    /// The ARM condition code a comparison maps to.
    pub fn condition_code(self) -> Option<&'static str> {
        match self {
            BinaryOp::CmpEq => Some("eq"),
            BinaryOp::CmpNe => Some("ne"),
            BinaryOp::CmpLt => Some("lt"),
            BinaryOp::CmpLe => Some("le"),
            BinaryOp::CmpGt => Some("gt"),
            BinaryOp::CmpGe => Some("ge"),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UnaryOp {
    Neg,
    /// Load through a pointer produced by array-access address arithmetic.
    Deref,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InstKind {
    /// Function entry; the backend expands it into the prologue.
    Entry,
    /// Function exit; `ret` is the return-value slot, absent for void.
    Exit { ret: Option<ValueId> },
    Label,
    Goto {
        target: ValueId,
    },
    CondGoto {
        cond: ValueId,
        true_target: ValueId,
        false_target: ValueId,
    },
    Binary {
        op: BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
    },
    Unary {
        op: UnaryOp,
        src: ValueId,
    },
    /// `dst` is a variable or an address-valued instruction; array-flagged
    /// moves (parameter binding) transfer a base address, not an element.
    Move {
        dst: ValueId,
        src: ValueId,
    },
    Call {
        callee: FuncId,
        callee_name: StringId,
        args: Vec<ValueId>,
    },
    /// Optional argument marker. The backend verifies it when present; the
    /// lowering does not produce it.
    Arg {
        src: ValueId,
    },
}

impl InstKind {
    /// The operands that form def-use edges. Branch targets are labels, not
    /// data, and are excluded.
    pub fn data_operands(&self) -> Vec<ValueId> {
        match self {
            InstKind::Entry | InstKind::Label | InstKind::Goto { .. } => vec![],
            InstKind::Exit { ret } => ret.iter().copied().collect(),
            InstKind::CondGoto { cond, .. } => vec![*cond],
            InstKind::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            InstKind::Unary { src, .. } => vec![*src],
            InstKind::Move { dst, src } => vec![*dst, *src],
            InstKind::Call { args, .. } => args.clone(),
            InstKind::Arg { src } => vec![*src],
        }
    }

    /// Rewrites data operand `slot`, returning the value it used to read.
    /// [`Module::replace_operand`](super::module::Module::replace_operand)
    /// wraps this so both ends of the def-use edge move together.
    pub fn set_data_operand(&mut self, slot: usize, new: ValueId) -> Option<ValueId> {
        use std::mem::replace;
        match self {
            InstKind::Entry | InstKind::Label | InstKind::Goto { .. } => None,
            InstKind::Exit { ret: Some(r) } if slot == 0 => Some(replace(r, new)),
            InstKind::Exit { .. } => None,
            InstKind::CondGoto { cond, .. } if slot == 0 => Some(replace(cond, new)),
            InstKind::CondGoto { .. } => None,
            InstKind::Binary { lhs, rhs, .. } => match slot {
                0 => Some(replace(lhs, new)),
                1 => Some(replace(rhs, new)),
                _ => None,
            },
            InstKind::Unary { src, .. } | InstKind::Arg { src } if slot == 0 => {
                Some(replace(src, new))
            }
            InstKind::Unary { .. } | InstKind::Arg { .. } => None,
            InstKind::Move { dst, src } => match slot {
                0 => Some(replace(dst, new)),
                1 => Some(replace(src, new)),
                _ => None,
            },
            InstKind::Call { args, .. } => args.get_mut(slot).map(|a| replace(a, new)),
        }
    }

    /// Whether the instruction defines a result value. Call results are only
    /// meaningful when the callee returns non-void, which the value's type
    /// records.
    pub fn defines_result(&self) -> bool {
        matches!(
            self,
            InstKind::Binary { .. } | InstKind::Unary { .. } | InstKind::Call { .. }
        )
    }

    /// Instructions without side effects whose result is never used are dead
    /// and skipped by the instruction selector.
    pub fn has_side_effects(&self) -> bool {
        !matches!(self, InstKind::Binary { .. } | InstKind::Unary { .. })
    }
}
