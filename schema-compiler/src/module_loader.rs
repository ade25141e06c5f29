// Module loader: reads schema files out of a directory, parses them, and
// follows imports. Each path is loaded at most once; cyclic imports are
// recorded by path and resolved lazily by the compiler.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use crate::ast::{File, Span};
use crate::error::{ErrorReporter, LineIndex, SourcePos};
use crate::parser;
use crate::vfs::{resolve_import_path, ReadableDirectory};

/// One parsed schema file.
#[derive(Debug)]
pub struct Module {
    path: String,
    source: String,
    lines: LineIndex,
    file: File,
    // import text as written -> normalized path of the loaded target
    imports: BTreeMap<String, Option<String>>,
}

impl Module {
    /// The name the file is known by in diagnostics and in the output.
    pub fn source_name(&self) -> &str {
        &self.path
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn position(&self, byte: u32) -> SourcePos {
        self.lines.position(byte)
    }

    /// Path of the module an `import "..."` expression refers to, or `None`
    /// when the target could not be loaded.
    pub fn import_target(&self, import: &str) -> Option<&str> {
        self.imports.get(import).and_then(|target| target.as_deref())
    }

    pub fn report(&self, reporter: &dyn ErrorReporter, span: Span, message: &str) {
        reporter.add_error(
            &self.path,
            self.position(span.start),
            self.position(span.end),
            message,
        );
    }
}

#[derive(Debug, Default)]
pub struct ModuleLoader {
    modules: HashMap<String, Rc<Module>>,
    loading: HashSet<String>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `path` from `dir`. Returns `None` if the file does not exist.
    /// Parse errors go to `reporter`; the module is still returned so that
    /// whatever did parse can be compiled.
    pub fn load_module(
        &mut self,
        dir: &dyn ReadableDirectory,
        path: &str,
        reporter: &dyn ErrorReporter,
    ) -> Option<Rc<Module>> {
        let path = crate::vfs::normalize_path(path)?;
        if let Some(module) = self.modules.get(&path) {
            return Some(Rc::clone(module));
        }

        let source = dir.read_file(&path)?;
        tracing::debug!(path = %path, bytes = source.len(), "loading schema module");

        let (file, errors) = parser::parse_file(&source);
        let lines = LineIndex::new(&source);
        for error in &errors {
            reporter.add_error(
                &path,
                lines.position(error.span.start),
                lines.position(error.span.end),
                &error.message,
            );
        }

        self.loading.insert(path.clone());
        let mut imports = BTreeMap::new();
        for import in &file.imports {
            if imports.contains_key(import) {
                continue;
            }
            let target = resolve_import_path(&path, import).and_then(|target| {
                if self.loading.contains(&target) {
                    return Some(target);
                }
                self.load_module(dir, &target, reporter)
                    .map(|module| module.path.clone())
            });
            if target.is_none() {
                tracing::debug!(importer = %path, import = %import, "import target not found");
            }
            imports.insert(import.clone(), target);
        }
        self.loading.remove(&path);

        let module = Rc::new(Module {
            path: path.clone(),
            source,
            lines,
            file,
            imports,
        });
        self.modules.insert(path, Rc::clone(&module));
        Some(module)
    }

    pub fn get(&self, path: &str) -> Option<Rc<Module>> {
        self.modules.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
