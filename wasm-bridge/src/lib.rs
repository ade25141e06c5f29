// Library interface for capnp-wasm-bridge
// Compiles one Cap'n Proto schema file into a base64url CodeGeneratorRequest.

pub mod backend;
pub mod collector;
pub mod config;
pub mod encode;
pub mod error;
pub mod inspect;
pub mod single_file;
pub mod staging;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

// Generated Cap'n Proto schema
pub mod codegen_capnp {
    include!(concat!(env!("OUT_DIR"), "/codegen_capnp.rs"));
}

pub use backend::SchemaBackend;
pub use collector::{Diagnostic, DiagnosticCollector};
pub use config::{BridgeConfig, CompilerVersion};
pub use error::BridgeError;
pub use single_file::{compile, compile_single_file, compile_with, CompileResult, SourceFile};
