//! Collects the errors and warnings that the compiler stages emit while
//! working through a compilation unit. Every record carries the source line
//! it was raised on so the driver can print actionable messages.

use log::error;

use super::stringtable::{StringId, StringTable};

/// How severe a diagnostic record is. Errors fail the compilation; warnings
/// are reported but the pipeline keeps going and still produces output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Severity {
    Error,
    Warning,
}

/// The semantic faults the lowering stage can detect while walking the AST.
#[derive(Clone, Debug, PartialEq)]
pub enum SemanticError {
    UndefinedVariable(StringId),
    UndefinedFunction(StringId),
    DuplicateFunction(StringId),
    NestedFunction(StringId),
    ArityMismatch {
        name: StringId,
        expected: usize,
        found: usize,
    },
    BreakOutsideLoop,
    ContinueOutsideLoop,
    NonConstantArrayDimension(StringId),
    GlobalInitializerNotConstant(StringId),
    ReturnTypeMismatch,
    AssignTypeMismatch,
    MissingReturnValue,
    ReturnValueInVoidFunction,
}

impl SemanticError {
    pub fn format(&self, st: &StringTable) -> String {
        let name = |id: &StringId| st.get(*id).unwrap_or_else(|| format!("<{}>", id));
        match self {
            SemanticError::UndefinedVariable(id) => {
                format!("use of undefined variable `{}`", name(id))
            }
            SemanticError::UndefinedFunction(id) => {
                format!("call to undefined function `{}`", name(id))
            }
            SemanticError::DuplicateFunction(id) => {
                format!("function `{}` is already defined", name(id))
            }
            SemanticError::NestedFunction(id) => {
                format!("function `{}` is defined inside another function", name(id))
            }
            SemanticError::ArityMismatch {
                name: id,
                expected,
                found,
            } => format!(
                "function `{}` takes {} argument(s) but {} were supplied",
                name(id),
                expected,
                found
            ),
            SemanticError::BreakOutsideLoop => "`break` outside of a loop".into(),
            SemanticError::ContinueOutsideLoop => "`continue` outside of a loop".into(),
            SemanticError::NonConstantArrayDimension(id) => {
                format!("array `{}` has a non-constant dimension", name(id))
            }
            SemanticError::GlobalInitializerNotConstant(id) => {
                format!("initializer of global `{}` is not a constant", name(id))
            }
            SemanticError::ReturnTypeMismatch => {
                "returned expression does not match the function's return type".into()
            }
            SemanticError::AssignTypeMismatch => {
                "assigned expression does not match the target's type".into()
            }
            SemanticError::MissingReturnValue => {
                "non-void function returns without a value".into()
            }
            SemanticError::ReturnValueInVoidFunction => {
                "void function returns a value".into()
            }
        }
    }
}

/// A single diagnostic record raised against a source line.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub line: u32,
    pub severity: Severity,
    pub error: SemanticError,
}

impl Diagnostic {
    pub fn format(&self, st: &StringTable) -> String {
        let tag = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        format!("{}: line {}: {}", tag, self.line, self.error.format(st))
    }
}

/// The sink the lowering reports into. The walker keeps going after most
/// faults so that one pass surfaces as many problems as possible.
#[derive(Debug, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics { records: vec![] }
    }

    pub fn error(&mut self, line: u32, e: SemanticError) {
        error!("semantic error at line {}: {:?}", line, e);
        self.records.push(Diagnostic {
            line,
            severity: Severity::Error,
            error: e,
        });
    }

    pub fn warning(&mut self, line: u32, e: SemanticError) {
        self.records.push(Diagnostic {
            line,
            severity: Severity::Warning,
            error: e,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.records
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    /// Consumes the sink, splitting it into errors and warnings.
    pub fn into_parts(self) -> (Vec<Diagnostic>, Vec<Diagnostic>) {
        self.records
            .into_iter()
            .partition(|d| d.severity == Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_do_not_fail_compilation() {
        let mut diags = Diagnostics::new();
        diags.warning(3, SemanticError::ReturnTypeMismatch);
        assert!(!diags.has_errors());

        diags.error(7, SemanticError::BreakOutsideLoop);
        assert!(diags.has_errors());
    }

    #[test]
    fn test_format_includes_line_number() {
        let st = StringTable::new();
        let d = Diagnostic {
            line: 12,
            severity: Severity::Error,
            error: SemanticError::BreakOutsideLoop,
        };
        assert_eq!(d.format(&st), "error: line 12: `break` outside of a loop");
    }
}
