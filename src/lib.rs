pub mod env;
pub mod error;
pub mod eval;
pub mod heap;
pub mod primitives;
pub mod printer;
pub mod reader;
pub mod repl;
pub mod symbol;
pub mod value;

/// The bundled standard library, evaluated against the root environment
/// before any user input is read.
pub const PRELUDE: &str = include_str!("prelude.lsp");
