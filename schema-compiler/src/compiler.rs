// Schema compiler: turns parsed modules into schema nodes.
//
// `add` registers a file and every declaration in it, assigning ids and
// display names. Nodes are compiled lazily; `eagerly_compile` walks the
// node graph according to an eagerness policy and collects every node it
// reaches into the output set.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ops::BitOr;
use std::rc::Rc;

use crate::ast::{Decl, DeclKind, StructMember};
use crate::error::ErrorReporter;
use crate::ids::{generate_child_id, generate_file_id, is_valid_id};
use crate::layout::{StructLayout, UnionLayout, UnionMemberLayout};
use crate::module_loader::{Module, ModuleLoader};
use crate::naming::{check_name, NameKind};
use crate::schema::*;
use crate::vfs::ReadableDirectory;

/// Which parts of the node graph around a node get compiled along with it.
/// Flags at `DEPENDENCIES` and above apply to the nodes a node depends on,
/// shifted down by one level for each step of dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eagerness(u32);

impl Eagerness {
    pub const NODE: Eagerness = Eagerness(1 << 0);
    pub const CHILDREN: Eagerness = Eagerness(1 << 1);
    pub const PARENTS: Eagerness = Eagerness(1 << 2);
    pub const DEPENDENCIES: Eagerness = Eagerness(1 << 15);
    pub const DEPENDENCY_CHILDREN: Eagerness = Eagerness(1 << 16);
    pub const DEPENDENCY_PARENTS: Eagerness = Eagerness(1 << 17);
    pub const DEPENDENCY_DEPENDENCIES: Eagerness = Eagerness(1 << 30);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Eagerness) -> bool {
        self.0 & other.0 == other.0
    }

    // Eagerness to apply to the dependencies of a node compiled with `self`.
    fn for_dependencies(self) -> Eagerness {
        let dependencies = Self::DEPENDENCIES.0;
        Eagerness((self.0 & !(dependencies - 1)) | (self.0 / dependencies))
    }
}

impl BitOr for Eagerness {
    type Output = Eagerness;

    fn bitor(self, rhs: Eagerness) -> Eagerness {
        Eagerness(self.0 | rhs.0)
    }
}

/// Handle returned by `Compiler::add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleScope {
    id: TypeId,
}

impl ModuleScope {
    pub fn id(&self) -> TypeId {
        self.id
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Member {
    Node(usize),
    Alias(Rc<Decl>),
}

/// A file or a declaration that becomes a node. `using` aliases live in
/// their scope's `members` map only.
#[derive(Debug)]
pub(crate) struct Entry {
    pub(crate) id: TypeId,
    pub(crate) name: String,
    pub(crate) display_name: String,
    pub(crate) prefix_len: u32,
    pub(crate) parent: Option<usize>,
    pub(crate) module: Rc<Module>,
    /// `None` for a file.
    pub(crate) decl: Option<Rc<Decl>>,
    pub(crate) children: Vec<usize>,
    pub(crate) aliases: Vec<String>,
    pub(crate) members: HashMap<String, Member>,
}

#[derive(Debug)]
pub(crate) struct CompiledNode {
    pub(crate) node: Node,
    pub(crate) source_info: SourceInfo,
}

#[derive(Debug, Clone)]
pub(crate) enum Slot<T> {
    InProgress,
    Done(T),
}

#[derive(Debug, Default)]
pub struct Compiler {
    pub(crate) loader: ModuleLoader,
    pub(crate) entries: Vec<Entry>,
    pub(crate) entry_by_id: HashMap<TypeId, usize>,
    pub(crate) files: HashMap<String, usize>,
    pub(crate) nodes: HashMap<usize, Rc<CompiledNode>>,
    pub(crate) const_values: HashMap<usize, Slot<Option<(Type, Value)>>>,
    pub(crate) annotation_signatures: HashMap<usize, Option<(Type, AnnotationTargets)>>,
    pub(crate) alias_targets: HashMap<(usize, String), Slot<Option<crate::resolve::Resolved>>>,
    pub(crate) imports: HashMap<String, BTreeMap<String, TypeId>>,
    pub(crate) resolutions: HashMap<String, BTreeSet<Resolution>>,
    loaded: BTreeMap<TypeId, Node>,
    source_info: BTreeMap<TypeId, SourceInfo>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_module(
        &mut self,
        dir: &dyn ReadableDirectory,
        path: &str,
        reporter: &dyn ErrorReporter,
    ) -> Option<Rc<Module>> {
        self.loader.load_module(dir, path, reporter)
    }

    /// Register a file and all declarations inside it. Adding the same file
    /// again returns the existing scope.
    pub fn add(&mut self, module: &Rc<Module>, reporter: &dyn ErrorReporter) -> ModuleScope {
        if let Some(&idx) = self.files.get(module.path()) {
            return ModuleScope {
                id: self.entries[idx].id,
            };
        }

        let file = module.file();
        let id = match file.id {
            Some(literal) => {
                if !is_valid_id(literal.value) {
                    module.report(
                        reporter,
                        literal.span,
                        "Invalid ID.  Please generate a new one with 'capnpc -i'.",
                    );
                }
                literal.value
            }
            None => {
                let generated = generate_file_id(module.source());
                module.report(
                    reporter,
                    crate::ast::Span::new(0, 0),
                    &format!(
                        "File does not declare an ID.  I've generated one for you.  Add this \
                         line to your file: @0x{:016x};",
                        generated
                    ),
                );
                generated
            }
        };

        let display_name = module.source_name().to_string();
        let prefix_len = display_name.rfind('/').map_or(0, |slash| slash + 1) as u32;
        let idx = self.entries.len();
        self.entries.push(Entry {
            id,
            name: display_name.clone(),
            display_name,
            prefix_len,
            parent: None,
            module: Rc::clone(module),
            decl: None,
            children: Vec::new(),
            aliases: Vec::new(),
            members: HashMap::new(),
        });
        self.register_id(idx, file.id.map(|literal| literal.span), reporter);
        self.files.insert(module.path().to_string(), idx);
        tracing::debug!(path = %module.path(), id = %format!("@0x{:016x}", id), "added file");

        let decls = file.decls.clone();
        self.add_children(idx, &decls, reporter);

        ModuleScope { id }
    }

    fn register_id(
        &mut self,
        idx: usize,
        span: Option<crate::ast::Span>,
        reporter: &dyn ErrorReporter,
    ) {
        let id = self.entries[idx].id;
        if self.entry_by_id.contains_key(&id) {
            let module = Rc::clone(&self.entries[idx].module);
            module.report(
                reporter,
                span.unwrap_or_default(),
                &format!("Duplicate ID @0x{:016x}.", id),
            );
            return;
        }
        self.entry_by_id.insert(id, idx);
    }

    fn add_children(&mut self, parent: usize, decls: &[Rc<Decl>], reporter: &dyn ErrorReporter) {
        let module = Rc::clone(&self.entries[parent].module);
        let parent_is_file = self.entries[parent].decl.is_none();

        for decl in decls {
            let name = decl.name.text.clone();
            let name_kind = match decl.kind {
                DeclKind::Struct { .. } | DeclKind::Enum { .. } => Some(NameKind::Type),
                DeclKind::Const { .. } | DeclKind::Annotation { .. } => Some(NameKind::Value),
                DeclKind::Using { .. } => None,
            };
            if let Some(kind) = name_kind {
                for problem in check_name(&name, kind) {
                    module.report(reporter, decl.name.span, problem);
                }
            }
            if self.entries[parent].members.contains_key(&name) {
                module.report(
                    reporter,
                    decl.name.span,
                    &format!("'{}' is already defined.", name),
                );
                continue;
            }

            if let DeclKind::Using { .. } = decl.kind {
                let entry = &mut self.entries[parent];
                entry.aliases.push(name.clone());
                entry.members.insert(name, Member::Alias(Rc::clone(decl)));
                continue;
            }

            let parent_id = self.entries[parent].id;
            let id = match decl.id {
                Some(literal) => {
                    if !is_valid_id(literal.value) {
                        module.report(
                            reporter,
                            literal.span,
                            "Invalid ID.  Please generate a new one with 'capnpc -i'.",
                        );
                    }
                    literal.value
                }
                None => generate_child_id(parent_id, &name),
            };
            let parent_display = &self.entries[parent].display_name;
            let separator = if parent_is_file { ':' } else { '.' };
            let display_name = format!("{}{}{}", parent_display, separator, name);
            let prefix_len = parent_display.len() as u32 + 1;

            let idx = self.entries.len();
            self.entries.push(Entry {
                id,
                name: name.clone(),
                display_name,
                prefix_len,
                parent: Some(parent),
                module: Rc::clone(&module),
                decl: Some(Rc::clone(decl)),
                children: Vec::new(),
                aliases: Vec::new(),
                members: HashMap::new(),
            });
            self.register_id(idx, decl.id.map(|literal| literal.span), reporter);
            let entry = &mut self.entries[parent];
            entry.children.push(idx);
            entry.members.insert(name, Member::Node(idx));

            if let DeclKind::Struct { members } = &decl.kind {
                let nested: Vec<Rc<Decl>> = members
                    .iter()
                    .filter_map(|member| match member {
                        StructMember::Nested(decl) => Some(Rc::clone(decl)),
                        _ => None,
                    })
                    .collect();
                self.add_children(idx, &nested, reporter);
            }
        }
    }

    /// Compile the node `id` and whatever else `eagerness` asks for, adding
    /// every reached node to the output set.
    pub fn eagerly_compile(&mut self, id: TypeId, eagerness: Eagerness, reporter: &dyn ErrorReporter) {
        let Some(&idx) = self.entry_by_id.get(&id) else {
            tracing::warn!(id = %format!("@0x{:016x}", id), "eagerly_compile: unknown node");
            return;
        };
        let mut seen = HashMap::new();
        self.traverse(idx, eagerness, &mut seen, reporter);
        tracing::debug!(nodes = self.loaded.len(), "eager compile finished");
    }

    fn traverse(
        &mut self,
        idx: usize,
        eagerness: Eagerness,
        seen: &mut HashMap<usize, u32>,
        reporter: &dyn ErrorReporter,
    ) {
        let slot = seen.entry(idx).or_insert(0);
        if *slot & eagerness.bits() == eagerness.bits() {
            return;
        }
        *slot |= eagerness.bits();

        let compiled = self.compile_node(idx, reporter);
        if eagerness.bits() / Eagerness::DEPENDENCIES.bits() != 0 {
            let next = eagerness.for_dependencies();
            for dep in compiled.node.dependencies() {
                if let Some(&dep_idx) = self.entry_by_id.get(&dep) {
                    self.traverse(dep_idx, next, seen, reporter);
                }
            }
        }
        self.loaded.insert(compiled.node.id, compiled.node.clone());
        self.source_info
            .insert(compiled.node.id, compiled.source_info.clone());

        if eagerness.contains(Eagerness::PARENTS) {
            if let Some(parent) = self.entries[idx].parent {
                self.traverse(parent, eagerness, seen, reporter);
            }
        }

        if eagerness.contains(Eagerness::CHILDREN) {
            let children = self.entries[idx].children.clone();
            for child in children {
                self.traverse(child, eagerness, seen, reporter);
            }
            let aliases = self.entries[idx].aliases.clone();
            for alias in aliases {
                self.resolve_alias(idx, &alias, reporter);
            }
        }
    }

    pub(crate) fn compile_node(&mut self, idx: usize, reporter: &dyn ErrorReporter) -> Rc<CompiledNode> {
        if let Some(compiled) = self.nodes.get(&idx) {
            return Rc::clone(compiled);
        }
        let module = Rc::clone(&self.entries[idx].module);
        let decl = self.entries[idx].decl.clone();
        tracing::trace!(node = %self.entries[idx].display_name, "compiling node");

        let mut source_info = SourceInfo {
            id: self.entries[idx].id,
            doc_comment: decl.as_ref().and_then(|decl| decl.doc_comment.clone()),
            members: Vec::new(),
        };

        let (kind, annotations) = match decl.as_deref() {
            None => {
                let apps = module.file().annotations.clone();
                let annotations =
                    self.compile_annotations(idx, &apps, AnnotationTarget::File, reporter);
                (NodeKind::File, annotations)
            }
            Some(decl) => {
                let (kind, target) = match &decl.kind {
                    DeclKind::Struct { members } => (
                        NodeKind::Struct(self.compile_struct(idx, members, &mut source_info, reporter)),
                        AnnotationTarget::Struct,
                    ),
                    DeclKind::Enum { enumerants } => (
                        NodeKind::Enum(self.compile_enum(idx, enumerants, &mut source_info, reporter)),
                        AnnotationTarget::Enum,
                    ),
                    DeclKind::Const { .. } => {
                        let (ty, value) = self
                            .const_value(idx, reporter)
                            .unwrap_or((Type::Void, Value::Void));
                        (NodeKind::Const { ty, value }, AnnotationTarget::Const)
                    }
                    DeclKind::Annotation { .. } => {
                        let (ty, targets) = self
                            .annotation_signature(idx, reporter)
                            .unwrap_or((Type::Void, AnnotationTargets::default()));
                        (NodeKind::Annotation { ty, targets }, AnnotationTarget::Annotation)
                    }
                    DeclKind::Using { .. } => unreachable!("aliases are not registered as nodes"),
                };
                let annotations = self.compile_annotations(idx, &decl.annotations, target, reporter);
                (kind, annotations)
            }
        };

        let entry = &self.entries[idx];
        let node = Node {
            id: entry.id,
            display_name: entry.display_name.clone(),
            display_name_prefix_length: entry.prefix_len,
            scope_id: entry.parent.map_or(0, |parent| self.entries[parent].id),
            nested_nodes: entry
                .children
                .iter()
                .map(|&child| NestedNode {
                    name: self.entries[child].name.clone(),
                    id: self.entries[child].id,
                })
                .collect(),
            annotations,
            kind,
        };

        let compiled = Rc::new(CompiledNode { node, source_info });
        self.nodes.insert(idx, Rc::clone(&compiled));
        compiled
    }

    fn compile_struct(
        &mut self,
        idx: usize,
        members: &[StructMember],
        source_info: &mut SourceInfo,
        reporter: &dyn ErrorReporter,
    ) -> StructNode {
        let module = Rc::clone(&self.entries[idx].module);

        struct MemberInfo<'a> {
            field: &'a crate::ast::Field,
            code_order: u16,
            discriminant: Option<u16>,
        }

        let mut infos: Vec<MemberInfo<'_>> = Vec::new();
        let mut union_size: Option<u16> = None;
        for member in members {
            match member {
                StructMember::Field(field) => infos.push(MemberInfo {
                    field,
                    code_order: infos.len() as u16,
                    discriminant: None,
                }),
                StructMember::Union(union) => {
                    if union_size.is_some() {
                        module.report(
                            reporter,
                            union.span,
                            "An unnamed union is already defined in this scope.",
                        );
                        continue;
                    }
                    if union.fields.len() < 2 {
                        module.report(reporter, union.span, "Union must have at least two members.");
                    }
                    union_size = Some(union.fields.len() as u16);
                    for (discriminant, field) in union.fields.iter().enumerate() {
                        infos.push(MemberInfo {
                            field,
                            code_order: infos.len() as u16,
                            discriminant: Some(discriminant as u16),
                        });
                    }
                }
                StructMember::Nested(_) => {}
            }
        }

        let mut field_names: HashSet<&str> = HashSet::new();
        for info in &infos {
            let name = &info.field.name;
            for problem in check_name(&name.text, NameKind::Value) {
                module.report(reporter, name.span, problem);
            }
            let taken = self.entries[idx].members.contains_key(&name.text)
                || !field_names.insert(&name.text);
            if taken {
                module.report(reporter, name.span, &format!("'{}' is already defined.", name.text));
            }
        }

        let mut order: Vec<usize> = (0..infos.len()).collect();
        order.sort_by_key(|&i| infos[i].field.ordinal.value);
        let mut ordinals = OrdinalChecker::default();
        for &i in &order {
            ordinals.check(&module, reporter, infos[i].field.ordinal);
        }

        let mut top = StructLayout::new();
        let mut union = UnionLayout::new();
        let mut member_layouts: Vec<UnionMemberLayout> =
            infos.iter().map(|_| UnionMemberLayout::new()).collect();
        let mut fields = Vec::with_capacity(infos.len());

        for &i in &order {
            let info = &infos[i];
            let field = info.field;
            let ty = self.compile_type(idx, &field.ty, reporter).unwrap_or(Type::Void);

            let offset = match (ty.data_lg_size(), info.discriminant) {
                (Some(lg_size), Some(_)) => member_layouts[i].add_data(&mut union, &mut top, lg_size),
                (Some(lg_size), None) => top.add_data(lg_size),
                (None, Some(_)) if ty.is_pointer() => {
                    member_layouts[i].add_pointer(&mut union, &mut top)
                }
                (None, None) if ty.is_pointer() => top.add_pointer(),
                (None, Some(_)) => {
                    member_layouts[i].add_void(&mut union, &mut top);
                    0
                }
                (None, None) => 0,
            };

            let (default_value, had_explicit_default) = match &field.default {
                Some(value) => {
                    let compiled = self
                        .compile_value(idx, value, &ty, reporter)
                        .unwrap_or_else(|| Value::zero(&ty));
                    (compiled, true)
                }
                None => (Value::zero(&ty), false),
            };
            let annotations =
                self.compile_annotations(idx, &field.annotations, AnnotationTarget::Field, reporter);

            source_info.members.push(field.doc_comment.clone());
            fields.push(FieldNode {
                name: field.name.text.clone(),
                code_order: info.code_order,
                annotations,
                discriminant_value: info.discriminant.unwrap_or(NO_DISCRIMINANT),
                offset,
                ty,
                default_value,
                had_explicit_default,
                ordinal: field.ordinal.value,
            });
        }

        let (discriminant_count, discriminant_offset) = match union_size {
            Some(size) => (size, union.add_discriminant(&mut top)),
            None => (0, 0),
        };

        StructNode {
            data_word_count: top.data_word_count(),
            pointer_count: top.pointer_count(),
            discriminant_count,
            discriminant_offset,
            fields,
        }
    }

    fn compile_enum(
        &mut self,
        idx: usize,
        enumerants: &[crate::ast::Enumerant],
        source_info: &mut SourceInfo,
        reporter: &dyn ErrorReporter,
    ) -> Vec<EnumerantNode> {
        let module = Rc::clone(&self.entries[idx].module);

        let mut names: HashSet<&str> = HashSet::new();
        for enumerant in enumerants {
            let name = &enumerant.name;
            for problem in check_name(&name.text, NameKind::Value) {
                module.report(reporter, name.span, problem);
            }
            if !names.insert(&name.text) {
                module.report(reporter, name.span, &format!("'{}' is already defined.", name.text));
            }
        }

        let mut order: Vec<usize> = (0..enumerants.len()).collect();
        order.sort_by_key(|&i| enumerants[i].ordinal.value);
        let mut ordinals = OrdinalChecker::default();
        let mut nodes = Vec::with_capacity(enumerants.len());
        for i in order {
            let enumerant = &enumerants[i];
            ordinals.check(&module, reporter, enumerant.ordinal);
            let annotations = self.compile_annotations(
                idx,
                &enumerant.annotations,
                AnnotationTarget::Enumerant,
                reporter,
            );
            source_info.members.push(enumerant.doc_comment.clone());
            nodes.push(EnumerantNode {
                name: enumerant.name.text.clone(),
                code_order: i as u16,
                annotations,
            });
        }
        nodes
    }

    /// Every node reached by `eagerly_compile`, sorted by id.
    pub fn all_loaded(&self) -> Vec<&Node> {
        self.loaded.values().collect()
    }

    pub fn all_source_info(&self) -> Vec<&SourceInfo> {
        self.source_info.values().collect()
    }

    /// Files imported by `module`, sorted by the import path as written.
    pub fn file_import_table(&self, module: &Module) -> Vec<Import> {
        self.imports
            .get(module.path())
            .map(|table| {
                table
                    .iter()
                    .map(|(name, &id)| Import {
                        id,
                        name: name.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Identifier resolutions recorded in `module`, ordered by position.
    pub fn resolutions(&self, module: &Module) -> Vec<Resolution> {
        self.resolutions
            .get(module.path())
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn record_resolution(
        &mut self,
        module: &Module,
        span: crate::ast::Span,
        target: ResolutionTarget,
    ) {
        self.resolutions
            .entry(module.path().to_string())
            .or_default()
            .insert(Resolution {
                start_byte: span.start,
                end_byte: span.end,
                target,
            });
    }
}

/// Ordinals must count up from zero without gaps or repeats. Feed them in
/// sorted order.
#[derive(Default)]
struct OrdinalChecker {
    expected: u32,
    last: Option<crate::ast::Ordinal>,
}

impl OrdinalChecker {
    fn check(&mut self, module: &Module, reporter: &dyn ErrorReporter, ordinal: crate::ast::Ordinal) {
        let value = u32::from(ordinal.value);
        if value < self.expected {
            module.report(reporter, ordinal.span, "Duplicate ordinal number.");
            if let Some(original) = self.last.take() {
                module.report(
                    reporter,
                    original.span,
                    &format!("Ordinal @{} originally used here.", original.value),
                );
            }
        } else if value > self.expected {
            module.report(
                reporter,
                ordinal.span,
                &format!(
                    "Skipped ordinal @{}.  Ordinals must be sequential with no holes.",
                    self.expected
                ),
            );
            self.expected = value + 1;
        } else {
            self.expected += 1;
            self.last = Some(ordinal);
        }
    }
}
