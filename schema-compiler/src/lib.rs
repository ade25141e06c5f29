// Library interface for capnp-schema-compiler
// Compiles Cap'n Proto schema text into schema nodes.

pub mod ast;
pub mod compiler;
pub mod error;
pub mod ids;
pub mod layout;
pub mod lexer;
pub mod module_loader;
pub mod naming;
pub mod parser;
mod resolve;
pub mod schema;
pub mod vfs;

pub use compiler::{Compiler, Eagerness, ModuleScope};
pub use error::{ErrorReporter, SourcePos};
pub use module_loader::{Module, ModuleLoader};
pub use vfs::{InMemoryDirectory, ReadableDirectory};
