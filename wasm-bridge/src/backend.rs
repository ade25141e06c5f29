// The compiler seam. The adapter drives any schema compiler through this
// trait; `Compiler` from capnp-schema-compiler is the bundled one.

use std::rc::Rc;

use capnp_schema_compiler::schema::{Import, Node, Resolution, SourceInfo, TypeId};
use capnp_schema_compiler::{Compiler, Eagerness, ErrorReporter, Module, ModuleScope, ReadableDirectory};

pub trait SchemaBackend {
    type Module;
    type Scope;

    /// Load and parse `path` from `dir`. `None` when the file cannot be read.
    fn load_module(
        &mut self,
        dir: &dyn ReadableDirectory,
        path: &str,
        reporter: &dyn ErrorReporter,
    ) -> Option<Self::Module>;

    fn add(&mut self, module: &Self::Module, reporter: &dyn ErrorReporter) -> Self::Scope;

    fn scope_id(&self, scope: &Self::Scope) -> TypeId;

    fn source_name(&self, module: &Self::Module) -> String;

    fn eagerly_compile(&mut self, id: TypeId, eagerness: Eagerness, reporter: &dyn ErrorReporter);

    fn all_loaded(&self) -> Vec<&Node>;

    fn all_source_info(&self) -> Vec<&SourceInfo>;

    fn file_import_table(&self, module: &Self::Module) -> Vec<Import>;

    fn resolutions(&self, module: &Self::Module) -> Vec<Resolution>;
}

impl SchemaBackend for Compiler {
    type Module = Rc<Module>;
    type Scope = ModuleScope;

    fn load_module(
        &mut self,
        dir: &dyn ReadableDirectory,
        path: &str,
        reporter: &dyn ErrorReporter,
    ) -> Option<Rc<Module>> {
        Compiler::load_module(self, dir, path, reporter)
    }

    fn add(&mut self, module: &Rc<Module>, reporter: &dyn ErrorReporter) -> ModuleScope {
        Compiler::add(self, module, reporter)
    }

    fn scope_id(&self, scope: &ModuleScope) -> TypeId {
        scope.id()
    }

    fn source_name(&self, module: &Rc<Module>) -> String {
        module.source_name().to_string()
    }

    fn eagerly_compile(&mut self, id: TypeId, eagerness: Eagerness, reporter: &dyn ErrorReporter) {
        Compiler::eagerly_compile(self, id, eagerness, reporter)
    }

    fn all_loaded(&self) -> Vec<&Node> {
        Compiler::all_loaded(self)
    }

    fn all_source_info(&self) -> Vec<&SourceInfo> {
        Compiler::all_source_info(self)
    }

    fn file_import_table(&self, module: &Rc<Module>) -> Vec<Import> {
        Compiler::file_import_table(self, module)
    }

    fn resolutions(&self, module: &Rc<Module>) -> Vec<Resolution> {
        Compiler::resolutions(self, module)
    }
}
