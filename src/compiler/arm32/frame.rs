//! Frame layout and the simple register assignment for one function.
//!
//! The scheme keeps every local and spilled temporary in the stack frame;
//! the selector moves values through scratch registers transiently. The
//! callee-saved set is therefore fixed: the scratch pool, the addressing
//! temporary, fp and lr. The frame grows downward from fp:
//!
//! ```text
//!   incoming overflow args          [fp, #(saved*4 + 0)], ...
//!   saved registers (push)          fp points just below them
//!   locals / arrays / spill slots   [fp, #-4] downward
//!   outgoing overflow args          [sp, #0], [sp, #4], ...
//! ```

use super::registers::{ADDR_TMP, ARG_REGS, FP, LR, SCRATCH_REGS, SP};
use crate::compiler::ir::{FuncId, Module, ValueKind};

/// Assigns registers and stack homes to every value of the function and
/// records the callee-saved set and frame size.
pub fn assign_frame(module: &mut Module, fid: FuncId) {
    let mut protected: Vec<i32> = SCRATCH_REGS.to_vec();
    protected.push(ADDR_TMP);
    protected.push(FP);
    protected.push(LR);
    let saved_bytes = protected.len() as i32 * 4;

    // Incoming parameters: the first four arrive in r0..r3, the rest on the
    // caller's stack just above our saved registers.
    let params = module.func(fid).params.clone();
    for (index, p) in params.into_iter().enumerate() {
        if index < ARG_REGS.len() {
            module.value_mut(p).set_reg(ARG_REGS[index]);
        } else {
            let offset = saved_bytes + (index - ARG_REGS.len()) as i32 * 4;
            module.value_mut(p).set_mem(FP, offset);
        }
    }

    // Locals, below fp. Declared arrays take their full row-major extent;
    // an array parameter's local holds only the incoming base address.
    let mut local_area = 0;
    let locals = module.func(fid).locals.clone();
    for l in locals {
        let v = module.value(l);
        let size = if !v.is_array() || v.dims[0] == 0 {
            4
        } else {
            4 * v.dims.iter().product::<i32>()
        };
        local_area += size;
        module.value_mut(l).set_mem(FP, -local_area);
    }

    // Spill slots for instruction results that live past their defining
    // instruction.
    let code = module.func(fid).code.clone();
    for inst in code {
        let v = module.value(inst);
        let needs_slot = match &v.kind {
            ValueKind::Inst(k) => {
                k.defines_result() && !module.types.is_void(v.ty) && !v.is_dead()
            }
            _ => false,
        };
        if needs_slot && v.reg_id().is_none() && v.mem_addr().is_none() {
            local_area += 4;
            module.value_mut(inst).set_mem(FP, -local_area);
        }
    }

    // The outgoing overflow area sits at the bottom of the frame, addressed
    // off sp at call sites.
    let max_args = module.func(fid).max_call_args as i32;
    let outgoing = (max_args - ARG_REGS.len() as i32).max(0) * 4;

    let frame_size = align8(local_area + outgoing);

    let func = module.func_mut(fid);
    func.protected_regs = protected;
    func.frame_size = frame_size;
}

fn align8(n: i32) -> i32 {
    (n + 7) & !7
}

/// Byte offset of the k-th outgoing overflow argument, sp-relative.
pub fn outgoing_arg_offset(k: usize) -> i32 {
    (k - ARG_REGS.len()) as i32 * 4
}

/// The base register outgoing overflow arguments are addressed from.
pub fn outgoing_arg_base() -> i32 {
    SP
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::diagnostics::Diagnostics;
    use crate::compiler::lexer::Lexer;
    use crate::compiler::lower::Lowering;
    use crate::compiler::parser::Parser;
    use crate::compiler::stringtable::StringTable;

    fn build<'st>(src: &str, st: &'st StringTable) -> Module<'st> {
        let tokens = Lexer::new(src, st).tokenize().unwrap();
        let unit = Parser::new(tokens).parse().unwrap();
        let mut module = Module::new(st);
        let mut diags = Diagnostics::new();
        assert!(Lowering::run(&mut module, &mut diags, &unit));
        module
    }

    #[test]
    fn test_first_four_params_in_registers() {
        let st = StringTable::new();
        let mut m = build(
            "int f(int a, int b, int c, int d, int e, int g) { return a + g; }",
            &st,
        );
        let fid = m.functions().next().unwrap();
        assign_frame(&mut m, fid);

        let params = m.func(fid).params.clone();
        for (i, p) in params.iter().enumerate().take(4) {
            assert_eq!(m.value(*p).reg_id(), Some(i as i32));
        }
        // Eight saved registers sit between fp and the overflow args.
        assert_eq!(m.value(params[4]).mem_addr(), Some((FP, 32)));
        assert_eq!(m.value(params[5]).mem_addr(), Some((FP, 36)));
    }

    #[test]
    fn test_locals_get_distinct_negative_offsets() {
        let st = StringTable::new();
        let mut m = build("int main() { int a = 1, b = 2; return a + b; }", &st);
        let fid = m.functions().next().unwrap();
        assign_frame(&mut m, fid);

        let locals = m.func(fid).locals.clone();
        let mut offsets = vec![];
        for l in locals {
            let (base, off) = m.value(l).mem_addr().unwrap();
            assert_eq!(base, FP);
            assert!(off < 0);
            offsets.push(off);
        }
        offsets.sort_unstable();
        offsets.dedup();
        assert_eq!(offsets.len(), 3); // return slot + a + b
    }

    #[test]
    fn test_array_local_reserves_full_extent() {
        let st = StringTable::new();
        let mut m = build("int main() { int a[2][3]; a[0][0] = 1; return 0; }", &st);
        let fid = m.functions().next().unwrap();
        assign_frame(&mut m, fid);

        // 4 (return slot) + 24 (array) + spill slots, rounded to 8.
        assert!(m.func(fid).frame_size >= 28);
    }

    #[test]
    fn test_outgoing_area_sized_from_max_call_args() {
        let st = StringTable::new();
        let src = "int f(int a, int b, int c, int d, int e, int g) { return a; }\n\
                   int main() { return f(1, 2, 3, 4, 5, 6); }";
        let mut m = build(src, &st);
        let main = m.functions().nth(1).unwrap();
        assign_frame(&mut m, main);

        // Two overflow arguments need 8 bytes at the frame bottom.
        let without_calls_src = "int main() { return 0; }";
        let st2 = StringTable::new();
        let mut m2 = build(without_calls_src, &st2);
        let main2 = m2.functions().next().unwrap();
        assign_frame(&mut m2, main2);

        assert!(m.func(main).frame_size >= m2.func(main2).frame_size + 8);
        assert_eq!(outgoing_arg_offset(4), 0);
        assert_eq!(outgoing_arg_offset(5), 4);
    }

    #[test]
    fn test_frame_size_is_8_byte_aligned() {
        let st = StringTable::new();
        let mut m = build("int main() { int a = 1; return a; }", &st);
        let fid = m.functions().next().unwrap();
        assign_frame(&mut m, fid);
        assert_eq!(m.func(fid).frame_size % 8, 0);
    }

    #[test]
    fn test_protected_set_contains_pool_and_linkage() {
        let st = StringTable::new();
        let mut m = build("int main() { return 0; }", &st);
        let fid = m.functions().next().unwrap();
        assign_frame(&mut m, fid);

        let protected = &m.func(fid).protected_regs;
        for r in SCRATCH_REGS {
            assert!(protected.contains(&r));
        }
        assert!(protected.contains(&ADDR_TMP));
        assert!(protected.contains(&FP));
        assert!(protected.contains(&LR));
        assert!(!protected.contains(&SP));
    }
}
