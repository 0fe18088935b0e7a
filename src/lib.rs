pub mod cli;
pub mod compiler;

pub use cli::*;
pub use compiler::stringtable::{StringId, StringTable};
pub use compiler::{compile, CompileOutput, OutputKind, StageError};
