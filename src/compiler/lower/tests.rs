use super::*;
use crate::compiler::diagnostics::{Diagnostics, SemanticError, Severity};
use crate::compiler::ir::printer::print_module;
use crate::compiler::lexer::Lexer;
use crate::compiler::parser::Parser;
use crate::compiler::stringtable::StringTable;

fn lower<'st>(src: &str, st: &'st StringTable) -> (Module<'st>, Diagnostics, bool) {
    let tokens = Lexer::new(src, st).tokenize().unwrap();
    let unit = Parser::new(tokens).parse().unwrap();
    let mut module = Module::new(st);
    let mut diags = Diagnostics::new();
    let ok = Lowering::run(&mut module, &mut diags, &unit);
    (module, diags, ok)
}

fn lower_text(src: &str) -> String {
    let st = StringTable::new();
    let (module, _, ok) = lower(src, &st);
    assert!(ok, "expected `{}` to lower cleanly", src);
    print_module(&module)
}

#[test]
fn test_constant_expression_return() {
    let text = lower_text("int main() { return 1 + 2 * 3; }");
    assert!(text.contains("%t0 = mul 2, 3"), "got:\n{}", text);
    assert!(text.contains("%t1 = add 1, %t0"), "got:\n{}", text);
    // The return value moves into the slot and control transfers to the
    // exit label.
    assert!(text.contains("%l0 = %t1"), "got:\n{}", text);
    assert!(text.contains("br label .L1"), "got:\n{}", text);
}

#[test]
fn test_main_gets_implicit_zero() {
    let text = lower_text("int main() { }");
    assert!(text.contains("%l0 = 0"), "got:\n{}", text);
    assert!(text.contains("exit %l0"), "got:\n{}", text);
}

#[test]
fn test_non_main_has_no_implicit_zero() {
    let text = lower_text("int f() { return 3; }");
    assert!(!text.contains("%l0 = 0"), "got:\n{}", text);
}

#[test]
fn test_exit_is_unique_with_multiple_returns() {
    let text = lower_text("int f(int n) { if (n < 0) return 0; return n; }");
    assert_eq!(text.matches("exit").count(), 1, "got:\n{}", text);
    // Both returns jump into the single exit label.
    assert_eq!(text.matches("br label .L1").count(), 2, "got:\n{}", text);
    assert_eq!(text.matches(".L1:").count(), 1, "got:\n{}", text);
}

#[test]
fn test_and_short_circuits_through_fresh_label() {
    let text = lower_text("int main(int a, int b) { if (a && b) return 1; return 0; }");
    // then = .L2, end = .L3, right operand = .L4
    assert!(
        text.contains("bc %t0, label .L4, label .L3"),
        "left operand must branch to the right-operand label:\n{}",
        text
    );
    let right = text.find(".L4:").unwrap();
    let second = text.find("bc %t1, label .L2, label .L3").unwrap();
    assert!(
        second > right,
        "right operand must only be evaluated behind its label:\n{}",
        text
    );
}

#[test]
fn test_or_short_circuits_on_true_edge() {
    let text = lower_text("int main(int a, int b) { if (a || b) return 1; return 0; }");
    assert!(
        text.contains("bc %t0, label .L2, label .L4"),
        "left operand must jump straight to then on success:\n{}",
        text
    );
    assert!(text.contains("bc %t1, label .L2, label .L3"), "got:\n{}", text);
}

#[test]
fn test_not_swaps_inherited_labels() {
    let text = lower_text("int main(int a) { if (!a) return 1; return 0; }");
    // a's own test branches with true/false swapped: non-zero goes to end.
    assert!(
        text.contains("bc %t0, label .L3, label .L2"),
        "got:\n{}",
        text
    );
}

#[test]
fn test_relational_condition_produces_cmp_and_branch() {
    let text = lower_text("int main(int a) { if (a <= 5) return 1; return 0; }");
    assert!(text.contains("%t0 = icmp_le %l0, 5"), "got:\n{}", text);
    assert!(text.contains("bc %t0, label .L2, label .L3"), "got:\n{}", text);
}

#[test]
fn test_plain_value_condition_compares_against_zero() {
    let text = lower_text("int main(int a) { while (a) { a = a - 1; } return a; }");
    assert!(text.contains("%t0 = icmp_ne %l0, 0"), "got:\n{}", text);
}

#[test]
fn test_boolean_as_value_materializes_zero_one() {
    let text = lower_text("int main(int a) { int b; b = !a; return b; }");
    // Fresh true/false/end labels write 1 and 0 into a synthesized local.
    assert!(text.contains("= 1"), "got:\n{}", text);
    assert!(text.contains("= 0"), "got:\n{}", text);
    assert!(text.contains("bc %t0"), "got:\n{}", text);
}

#[test]
fn test_while_loop_shape() {
    let text = lower_text("int main() { int i = 0; while (i < 10) { i = i + 1; } return i; }");
    // entry = .L2, body = .L3, exit = .L4
    let entry = text.find(".L2:").unwrap();
    let cond = text.find("bc %t0, label .L3, label .L4").unwrap();
    let back_edge = text.rfind("br label .L2").unwrap();
    let exit = text.find(".L4:").unwrap();
    assert!(entry < cond && cond < back_edge && back_edge < exit, "got:\n{}", text);
}

#[test]
fn test_break_and_continue_target_loop_labels() {
    let text = lower_text(
        "int main() { int i = 0; while (1) { i = i + 1; if (i > 5) break; continue; } return i; }",
    );
    // entry = .L2, exit = .L4: break jumps to .L4, continue back to .L2.
    let body = text.find(".L3:").unwrap();
    let brk = text[body..].find("br label .L4").map(|p| p + body).unwrap();
    let cont = text[body..].find("br label .L2").map(|p| p + body).unwrap();
    let exit = text.find(".L4:").unwrap();
    assert!(brk < exit && cont < exit, "got:\n{}", text);
}

#[test]
fn test_break_outside_loop_is_an_error() {
    let st = StringTable::new();
    let (_, diags, ok) = lower("int main() { break; return 0; }", &st);
    assert!(!ok);
    assert!(diags
        .records()
        .iter()
        .any(|d| d.error == SemanticError::BreakOutsideLoop));
}

#[test]
fn test_continue_outside_loop_is_an_error() {
    let st = StringTable::new();
    let (_, diags, ok) = lower("int main() { continue; }", &st);
    assert!(!ok);
    assert!(diags
        .records()
        .iter()
        .any(|d| d.error == SemanticError::ContinueOutsideLoop));
}

#[test]
fn test_array_access_linearizes_row_major() {
    let text = lower_text("int main() { int a[2][3]; a[1][2] = 7; return 0; }");
    // offset = (1*3 + 2) * 4 added to the base
    assert!(text.contains("%t0 = mul 1, 3"), "got:\n{}", text);
    assert!(text.contains("%t1 = add %t0, 2"), "got:\n{}", text);
    assert!(text.contains("%t2 = mul %t1, 4"), "got:\n{}", text);
    assert!(text.contains("%t3 = add %l1, %t2"), "got:\n{}", text);
    // assignment target: store through the pointer, no deref
    assert!(text.contains("%t3 = 7"), "got:\n{}", text);
}

#[test]
fn test_array_read_dereferences() {
    let text = lower_text("int main() { int a[4]; a[0] = 1; return a[3]; }");
    assert!(text.contains("= *"), "got:\n{}", text);
}

#[test]
fn test_last_dimension_needs_no_multiplier() {
    let text = lower_text("int main() { int a[8]; a[5] = 1; return 0; }");
    // One-dimensional access multiplies by the element size only.
    assert!(text.contains("%t0 = mul 5, 4"), "got:\n{}", text);
    assert!(!text.contains("mul 5, 1"), "got:\n{}", text);
}

#[test]
fn test_param_binding_moves() {
    let st = StringTable::new();
    let (module, _, ok) = lower("int f(int a, int b) { return a + b; }", &st);
    assert!(ok);
    let text = print_module(&module);
    assert!(text.contains("%l0 = %a"), "got:\n{}", text);
    assert!(text.contains("%l1 = %b"), "got:\n{}", text);

    let fid = module.functions().next().unwrap();
    assert_eq!(module.func(fid).params.len(), 2);
}

#[test]
fn test_array_param_move_carries_dimensions() {
    let st = StringTable::new();
    let (module, _, ok) = lower("int f(int a[][3]) { return a[0][0]; }", &st);
    assert!(ok);

    let fid = module.functions().next().unwrap();
    let formal = module.func(fid).params[0];
    assert_eq!(module.value(formal).dims, vec![0, 3]);

    // The binding move itself is array-flagged with the same shape.
    let mv = module.func(fid).code.iter().copied().find(|v| {
        matches!(module.value(*v).as_inst(), Some(InstKind::Move { .. }))
    });
    assert_eq!(module.value(mv.unwrap()).dims, vec![0, 3]);
}

#[test]
fn test_partial_index_argument_keeps_remaining_dims() {
    let st = StringTable::new();
    let src = "int f(int a[][3]) { return a[0][0]; }\n\
               int main() { int m[2][3]; m[0][0] = 9; return f(m[1]); }";
    let (module, _, ok) = lower(src, &st);
    assert!(ok);

    let main = module.functions().nth(1).unwrap();
    let call = module
        .func(main)
        .code
        .iter()
        .copied()
        .find_map(|v| match module.value(v).as_inst() {
            Some(InstKind::Call { args, .. }) => Some(args.clone()),
            _ => None,
        })
        .unwrap();
    // The sub-array argument dropped the indexed dimension and kept [3].
    assert_eq!(module.value(call[0]).dims, vec![3]);
    assert!(module.types.is_pointer(module.value(call[0]).ty));
}

#[test]
fn test_global_declarations_print() {
    let text = lower_text("int g = 5;\nint h = -3;\nint z;\nint buf[4][8];\nint main() { return g; }");
    assert!(text.contains("declare i32 @g = 5"), "got:\n{}", text);
    assert!(text.contains("declare i32 @h = -3"), "got:\n{}", text);
    assert!(text.contains("declare i32 @z\n"), "got:\n{}", text);
    assert!(text.contains("declare i32 @buf[4][8]"), "got:\n{}", text);
}

#[test]
fn test_global_initializer_must_be_constant() {
    let st = StringTable::new();
    let (_, diags, ok) = lower("int g = 1 + 2;\nint main() { return 0; }", &st);
    assert!(!ok);
    assert!(diags.records().iter().any(|d| matches!(
        d.error,
        SemanticError::GlobalInitializerNotConstant(_)
    )));
}

#[test]
fn test_undefined_variable_is_an_error() {
    let st = StringTable::new();
    let (_, diags, ok) = lower("int main() { return missing; }", &st);
    assert!(!ok);
    assert!(diags.records().iter().any(|d| matches!(
        d.error,
        SemanticError::UndefinedVariable(_)
    )));
}

#[test]
fn test_undefined_function_is_an_error() {
    let st = StringTable::new();
    let (_, diags, ok) = lower("int main() { return nope(); }", &st);
    assert!(!ok);
    assert!(diags.records().iter().any(|d| matches!(
        d.error,
        SemanticError::UndefinedFunction(_)
    )));
}

#[test]
fn test_call_arity_is_checked() {
    let st = StringTable::new();
    let (_, diags, ok) = lower(
        "int f(int a, int b) { return a + b; }\nint main() { return f(1); }",
        &st,
    );
    assert!(!ok);
    assert!(diags.records().iter().any(|d| matches!(
        d.error,
        SemanticError::ArityMismatch {
            expected: 2,
            found: 1,
            ..
        }
    )));
}

#[test]
fn test_nested_function_is_a_semantic_error() {
    let st = StringTable::new();
    let (_, diags, ok) = lower("int main() { int f() { return 1; } return 0; }", &st);
    assert!(!ok);
    assert!(diags.records().iter().any(|d| matches!(
        d.error,
        SemanticError::NestedFunction(_)
    )));
}

#[test]
fn test_duplicate_function_is_an_error() {
    let st = StringTable::new();
    let (_, diags, ok) = lower("int f() { return 1; }\nint f() { return 2; }", &st);
    assert!(!ok);
    assert!(diags.records().iter().any(|d| matches!(
        d.error,
        SemanticError::DuplicateFunction(_)
    )));
}

#[test]
fn test_void_return_with_value_is_a_warning() {
    let st = StringTable::new();
    let (_, diags, ok) = lower("void f() { return 3; }\nint main() { return 0; }", &st);
    // Best-effort IR still comes out; the record is a warning.
    assert!(ok);
    assert!(diags.records().iter().any(|d| {
        d.severity == Severity::Warning && d.error == SemanticError::ReturnValueInVoidFunction
    }));
}

#[test]
fn test_shadowing_resolves_innermost() {
    let text = lower_text(
        "int g;\nint main() { int g; g = 1; { int g; g = 2; } g = 3; return g; }",
    );
    // Locals: %l0 is the return slot, %l1 the outer g, %l2 the inner g.
    // The inner block writes its own local, not the outer one.
    assert!(text.contains("%l2 = 2"), "got:\n{}", text);
    assert!(text.contains("%l1 = 3"), "got:\n{}", text);
}

#[test]
fn test_call_site_updates_max_args() {
    let st = StringTable::new();
    let src = "int f(int a, int b, int c, int d, int e, int g) { return a; }\n\
               int main() { return f(1, 2, 3, 4, 5, 6); }";
    let (module, _, ok) = lower(src, &st);
    assert!(ok);
    let main = module.functions().nth(1).unwrap();
    assert_eq!(module.func(main).max_call_args, 6);
    assert!(module.func(main).has_call);
}

#[test]
fn test_declaration_with_initializer_moves() {
    let text = lower_text("int main() { int a = 10, b = 3; return a % b; }");
    assert!(text.contains("%l1 = 10"), "got:\n{}", text);
    assert!(text.contains("%l2 = 3"), "got:\n{}", text);
    assert!(text.contains("= mod %l1, %l2"), "got:\n{}", text);
}
