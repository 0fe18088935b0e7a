//! Writes the final assembly file: directives, one text body per function,
//! then the data and BSS images of the globals.

use std::fmt::Write;

use super::frame::assign_frame;
use super::selector::InstSelector;
use crate::compiler::ir::{Module, ValueKind};

/// Runs register assignment and instruction selection over every function
/// and renders the module as ARM32 assembler text. With `show_ir` set, each
/// IR instruction precedes its assembly as a comment.
pub fn emit_assembly(module: &mut Module, show_ir: bool) -> String {
    let mut out = String::new();
    out.push_str("    .arch armv7-a\n");
    out.push_str("    .text\n");

    let fids: Vec<_> = module.functions().collect();
    for fid in fids {
        assign_frame(module, fid);

        let name = module
            .strings()
            .get(module.func(fid).name)
            .unwrap_or_default();
        write!(
            out,
            "\n    .global {}\n    .type {}, %function\n{}:\n",
            name, name, name
        )
        .unwrap();

        let iloc = InstSelector::new(module, fid, show_ir).run();
        for inst in iloc.code() {
            writeln!(out, "{}", inst).unwrap();
        }
    }

    emit_globals(module, &mut out);
    out
}

/// Initialized globals go to .data; everything else (including zero
/// initializers) is common BSS.
fn emit_globals(module: &Module, out: &mut String) {
    let mut data = vec![];
    let mut bss = vec![];

    for g in &module.globals {
        let v = module.value(*g);
        let name = v.ir_name.trim_start_matches('@').to_string();
        let size = if v.is_array() {
            4 * v.dims.iter().product::<i32>()
        } else {
            4
        };
        match v.kind {
            ValueKind::Global { init: Some(i) } if i != 0 => data.push((name, i)),
            _ => bss.push((name, size)),
        }
    }

    if !data.is_empty() {
        out.push_str("\n    .data\n");
        for (name, init) in data {
            write!(out, "    .global {}\n{}:\n    .word {}\n", name, name, init).unwrap();
        }
    }

    if !bss.is_empty() {
        out.push('\n');
        for (name, size) in bss {
            writeln!(out, "    .comm {}, {}, 4", name, size).unwrap();
        }
    }
}
