//! The compiler pipeline: lex/parse → AST → linear IR → register
//! assignment → ARM32 instruction selection → text.

pub mod arm32;
pub mod ast;
pub mod diagnostics;
pub mod ir;
pub mod lexer;
pub mod lower;
pub mod parser;
pub mod stringtable;

use diagnostics::{Diagnostic, Diagnostics};
use ir::printer::print_module;
use ir::Module;
use lexer::{Lexer, LexerError};
use lower::Lowering;
use parser::{Parser, ParserError};
use stringtable::StringTable;

/// Which text the pipeline produces.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OutputKind {
    /// The linear IR in its textual form.
    LinearIr,
    /// ARM32 assembly; `show_ir` echoes each IR instruction as a comment.
    Assembly { show_ir: bool },
}

/// The stage that sank a failed compilation, with its diagnostics.
#[derive(Debug)]
pub enum StageError {
    Lexer(Vec<LexerError>),
    Parser(ParserError),
    Semantic(Vec<Diagnostic>),
}

pub struct CompileOutput {
    pub text: String,
    /// Warnings raised along the way; the output is still valid.
    pub warnings: Vec<Diagnostic>,
}

/// Runs the whole pipeline over one source text.
pub fn compile(
    src: &str,
    st: &StringTable,
    output: OutputKind,
) -> Result<CompileOutput, StageError> {
    let tokens = Lexer::new(src, st).tokenize().map_err(StageError::Lexer)?;
    let unit = Parser::new(tokens).parse().map_err(StageError::Parser)?;

    let mut module = Module::new(st);
    let mut diags = Diagnostics::new();
    let ok = Lowering::run(&mut module, &mut diags, &unit);
    let (errors, warnings) = diags.into_parts();
    if !ok {
        return Err(StageError::Semantic(errors));
    }

    let text = match output {
        OutputKind::LinearIr => print_module(&module),
        OutputKind::Assembly { show_ir } => arm32::emit_assembly(&mut module, show_ir),
    };
    Ok(CompileOutput { text, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_produces_assembly() {
        let st = StringTable::new();
        let out = compile(
            "int main() { return 0; }",
            &st,
            OutputKind::Assembly { show_ir: false },
        )
        .unwrap();
        assert!(out.text.contains(".global main"));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_pipeline_produces_ir() {
        let st = StringTable::new();
        let out = compile("int main() { return 0; }", &st, OutputKind::LinearIr).unwrap();
        assert!(out.text.contains("define i32 @main()"));
    }

    #[test]
    fn test_stage_errors_are_distinguished() {
        let st = StringTable::new();
        assert!(matches!(
            compile("int $ = 1;", &st, OutputKind::LinearIr),
            Err(StageError::Lexer(_))
        ));
        assert!(matches!(
            compile("int main( { }", &st, OutputKind::LinearIr),
            Err(StageError::Parser(_))
        ));
        assert!(matches!(
            compile("int main() { return missing; }", &st, OutputKind::LinearIr),
            Err(StageError::Semantic(_))
        ));
    }

    #[test]
    fn test_warnings_survive_successful_compiles() {
        let st = StringTable::new();
        let out = compile(
            "void f() { return 1; }\nint main() { return 0; }",
            &st,
            OutputKind::LinearIr,
        )
        .unwrap();
        assert_eq!(out.warnings.len(), 1);
    }
}
