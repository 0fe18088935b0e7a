//! The linear three-address IR: types, the value/instruction graph, the
//! module and function containers, and the textual printer.

pub mod function;
pub mod instruction;
pub mod module;
pub mod printer;
pub mod types;
pub mod value;

pub use function::Function;
pub use instruction::{BinaryOp, FuncId, InstKind, UnaryOp};
pub use module::Module;
pub use types::{IrType, TypeId, TypeTable};
pub use value::{Use, Value, ValueId, ValueKind};
