//! Renders the linear IR in its stable textual form. The same per-line
//! renderer feeds the `-i` output and the comments in the emitted assembly.

use std::fmt::Write;

use super::instruction::InstKind;
use super::module::Module;
use super::value::ValueId;

pub fn print_module(m: &Module) -> String {
    let mut out = String::new();

    for g in &m.globals {
        let v = m.value(*g);
        let elem = if v.is_array() {
            m.types.element_type(v.ty).unwrap_or(v.ty)
        } else {
            v.ty
        };
        write!(out, "declare {} {}", m.types.display(elem), v.ir_name).unwrap();
        for d in &v.dims {
            write!(out, "[{}]", d).unwrap();
        }
        if let super::value::ValueKind::Global { init: Some(i) } = &v.kind {
            write!(out, " = {}", i).unwrap();
        }
        out.push('\n');
    }
    if !m.globals.is_empty() {
        out.push('\n');
    }

    for f in m.functions() {
        let func = m.func(f);
        write!(
            out,
            "define {} {}(",
            m.types.display(func.ret_ty),
            func.ir_name
        )
        .unwrap();
        for (i, p) in func.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let pv = m.value(*p);
            let elem = if pv.is_array() {
                m.types.element_type(pv.ty).unwrap_or(pv.ty)
            } else {
                pv.ty
            };
            write!(out, "{} {}", m.types.display(elem), pv.ir_name).unwrap();
            for d in &pv.dims {
                write!(out, "[{}]", d).unwrap();
            }
        }
        out.push_str(") {\n");

        for inst in &func.code {
            let line = inst_text(m, *inst);
            if !line.is_empty() {
                writeln!(out, "  {}", line).unwrap();
            }
        }
        out.push_str("}\n");
    }

    out
}

/// The textual form of one instruction; empty for instructions that have no
/// printed form.
pub fn inst_text(m: &Module, id: ValueId) -> String {
    let v = m.value(id);
    let kind = match v.as_inst() {
        Some(k) => k,
        None => return String::new(),
    };
    let name = |id: &ValueId| m.value(*id).ir_name.clone();

    match kind {
        InstKind::Entry => "entry:".into(),
        InstKind::Exit { ret } => match ret {
            Some(r) => format!("exit {}", name(r)),
            None => "exit".into(),
        },
        InstKind::Label => format!("{}:", v.ir_name),
        InstKind::Goto { target } => format!("br label {}", name(target)),
        InstKind::CondGoto {
            cond,
            true_target,
            false_target,
        } => format!(
            "bc {}, label {}, label {}",
            name(cond),
            name(true_target),
            name(false_target)
        ),
        InstKind::Binary { op, lhs, rhs } => format!(
            "{} = {} {}, {}",
            v.ir_name,
            op.ir_text(),
            name(lhs),
            name(rhs)
        ),
        InstKind::Unary { op, src } => match op {
            super::instruction::UnaryOp::Neg => {
                format!("{} = neg {}", v.ir_name, name(src))
            }
            super::instruction::UnaryOp::Deref => {
                format!("{} = *{}", v.ir_name, name(src))
            }
        },
        InstKind::Move { dst, src } => format!("{} = {}", name(dst), name(src)),
        InstKind::Call {
            callee_name, args, ..
        } => {
            let arg_text = args
                .iter()
                .map(|a| name(a))
                .collect::<Vec<_>>()
                .join(", ");
            let callee = m
                .strings()
                .get(*callee_name)
                .unwrap_or_default();
            if v.ir_name.is_empty() {
                format!("call @{}({})", callee, arg_text)
            } else {
                format!("{} = call @{}({})", v.ir_name, callee, arg_text)
            }
        }
        InstKind::Arg { src } => format!("arg {}", name(src)),
    }
}
