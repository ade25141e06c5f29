// Single-file compile: stage the text, load it, compile it eagerly and
// either return every diagnostic or the encoded CodeGeneratorRequest.

use capnp_schema_compiler::schema::TypeId;
use capnp_schema_compiler::{Compiler, Eagerness};

use crate::backend::SchemaBackend;
use crate::collector::{Diagnostic, DiagnosticCollector};
use crate::config::BridgeConfig;
use crate::encode::{encode_base64url, encode_request, RequestedFile};
use crate::staging::stage_source;

/// A file that was staged, loaded and added to the compiler.
#[derive(Debug)]
pub struct SourceFile<M, S> {
    pub id: TypeId,
    pub scope: S,
    pub name: String,
    pub module: M,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileResult {
    Error(Vec<Diagnostic>),
    Success { payload: Vec<u8> },
}

impl CompileResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CompileResult::Success { .. })
    }

    /// `Ok\n<base64url>` or `Err\n` followed by one `line:col message` line
    /// per diagnostic.
    pub fn to_output(&self) -> String {
        match self {
            CompileResult::Success { payload } => format!("Ok\n{}", encode_base64url(payload)),
            CompileResult::Error(diagnostics) => {
                let mut out = String::from("Err");
                for diagnostic in diagnostics {
                    out.push('\n');
                    out.push_str(&diagnostic.to_string());
                }
                out
            }
        }
    }
}

/// What gets compiled along with the staged file: the file, everything
/// declared in it, whatever those depend on and the parents of the
/// dependencies.
pub fn compile_eagerness() -> Eagerness {
    Eagerness::NODE | Eagerness::CHILDREN | Eagerness::DEPENDENCIES | Eagerness::DEPENDENCY_PARENTS
}

/// Compile `text` with the bundled compiler and default configuration.
pub fn compile(text: &str) -> CompileResult {
    compile_with(&mut Compiler::new(), text, &BridgeConfig::default())
}

/// Compile `text` and render the result as the boundary output string.
pub fn compile_single_file(text: &str) -> String {
    compile(text).to_output()
}

/// Compile `text` with `backend`, which should be fresh: nodes it already
/// holds end up in the request.
pub fn compile_with<B: SchemaBackend>(
    backend: &mut B,
    text: &str,
    config: &BridgeConfig,
) -> CompileResult {
    let collector = DiagnosticCollector::new();
    let sources = load_sources(backend, text, config, &collector);

    if collector.has_errors() {
        tracing::debug!(diagnostics = collector.len(), "compile failed");
        return CompileResult::Error(collector.into_diagnostics());
    }

    let files: Vec<RequestedFile> = sources
        .iter()
        .map(|source| RequestedFile {
            id: source.id,
            filename: source.name.clone(),
            imports: backend.file_import_table(&source.module),
            resolutions: backend.resolutions(&source.module),
        })
        .collect();

    match encode_request(
        config.version,
        &backend.all_loaded(),
        &backend.all_source_info(),
        &files,
    ) {
        Ok(payload) => CompileResult::Success { payload },
        Err(err) => {
            tracing::warn!(error = %err, "encoding the request failed");
            CompileResult::Error(vec![Diagnostic::new(
                1,
                1,
                format!("Failed to encode CodeGeneratorRequest: {}", err),
            )])
        }
    }
}

/// Zero or one source files: none when staging fails or the loader finds
/// nothing.
fn load_sources<B: SchemaBackend>(
    backend: &mut B,
    text: &str,
    config: &BridgeConfig,
    collector: &DiagnosticCollector,
) -> Vec<SourceFile<B::Module, B::Scope>> {
    let dir = match stage_source(&config.source_name, text) {
        Ok(dir) => dir,
        Err(err) => {
            collector.report(1, 1, &err.to_string());
            return Vec::new();
        }
    };

    let Some(module) = backend.load_module(&dir, &config.source_name, collector) else {
        tracing::debug!(path = %config.source_name, "loader returned no module");
        return Vec::new();
    };

    let scope = backend.add(&module, collector);
    let id = backend.scope_id(&scope);
    backend.eagerly_compile(id, compile_eagerness(), collector);
    tracing::debug!(id = %format!("@0x{:016x}", id), "compiled source file");

    vec![SourceFile {
        id,
        scope,
        name: backend.source_name(&module),
        module,
    }]
}
