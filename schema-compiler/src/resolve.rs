// Name, type and value resolution for the compiler.
//
// Names are looked up through the lexical scope chain (the current node,
// then each enclosing node up to the file), then among the builtin types.
// Each identifier that lands on a node records a resolution in the module
// it was written in.

use std::rc::Rc;

use crate::ast::{AnnotationApp, DeclKind, Expr, Span, ValueExpr};
use crate::compiler::{Compiler, Member, Slot};
use crate::error::ErrorReporter;
use crate::module_loader::Module;
use crate::schema::*;

/// What a name expression refers to.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Resolved {
    /// A file or declaration, by entry index.
    Node(usize),
    /// A builtin type, or a type built from one such as `List(Text)`.
    Type(Type),
    /// The bare `List` builtin, which still needs its parameter.
    List,
}

const RECURSIVE_DECLARATION: &str = "Declaration recursively depends on itself.";

impl Compiler {
    fn module_of(&self, scope: usize) -> Rc<Module> {
        Rc::clone(&self.entries[scope].module)
    }

    fn file_of(&self, scope: usize) -> usize {
        let mut current = scope;
        while let Some(parent) = self.entries[current].parent {
            current = parent;
        }
        current
    }

    fn member_of(&mut self, idx: usize, name: &str, reporter: &dyn ErrorReporter) -> Option<Option<Resolved>> {
        let member = self.entries[idx].members.get(name).cloned()?;
        Some(match member {
            Member::Node(child) => Some(Resolved::Node(child)),
            Member::Alias(_) => self.resolve_alias(idx, name, reporter),
        })
    }

    /// Resolve the target of the `using` alias `name` declared in `scope`.
    /// Each alias is resolved once; a cycle through aliases is an error.
    pub(crate) fn resolve_alias(
        &mut self,
        scope: usize,
        name: &str,
        reporter: &dyn ErrorReporter,
    ) -> Option<Resolved> {
        let key = (scope, name.to_string());
        let decl = match self.entries[scope].members.get(name) {
            Some(Member::Alias(decl)) => Rc::clone(decl),
            _ => return None,
        };
        match self.alias_targets.get(&key) {
            Some(Slot::Done(resolved)) => return resolved.clone(),
            Some(Slot::InProgress) => {
                self.module_of(scope)
                    .report(reporter, decl.name.span, RECURSIVE_DECLARATION);
                return None;
            }
            None => {}
        }
        self.alias_targets.insert(key.clone(), Slot::InProgress);

        let resolved = match &decl.kind {
            DeclKind::Using { target: target @ Expr::Application { .. } } => {
                self.compile_type(scope, target, reporter).map(Resolved::Type)
            }
            DeclKind::Using { target } => self.resolve_expr(scope, target, reporter),
            _ => None,
        };
        self.alias_targets.insert(key, Slot::Done(resolved.clone()));
        resolved
    }

    /// Resolve a name expression. Reports and returns `None` if it does not
    /// name anything.
    pub(crate) fn resolve_expr(
        &mut self,
        scope: usize,
        expr: &Expr,
        reporter: &dyn ErrorReporter,
    ) -> Option<Resolved> {
        let module = self.module_of(scope);
        match expr {
            Expr::Name(name) => {
                let mut current = Some(scope);
                while let Some(idx) = current {
                    if let Some(found) = self.member_of(idx, &name.text, reporter) {
                        self.record_node(&module, name.span, found.as_ref());
                        return found;
                    }
                    current = self.entries[idx].parent;
                }
                if name.text == "List" {
                    return Some(Resolved::List);
                }
                if let Some(ty) = Type::builtin(&name.text) {
                    return Some(Resolved::Type(ty));
                }
                module.report(reporter, name.span, &format!("Not defined: {}", name.text));
                None
            }
            Expr::Absolute(name) => {
                let file = self.file_of(scope);
                match self.member_of(file, &name.text, reporter) {
                    Some(found) => {
                        self.record_node(&module, name.span, found.as_ref());
                        found
                    }
                    None => {
                        module.report(reporter, name.span, &format!("Not defined: {}", name.text));
                        None
                    }
                }
            }
            Expr::Import { path, span } => self.import_file(&module, path, *span, reporter),
            Expr::Member { base, name } => {
                let parent = match self.resolve_expr(scope, base, reporter)? {
                    Resolved::Node(parent) => Some(parent),
                    _ => None,
                };
                let found = parent.and_then(|parent| self.member_of(parent, &name.text, reporter));
                match found {
                    Some(found) => {
                        self.record_node(&module, name.span, found.as_ref());
                        found
                    }
                    None => {
                        module.report(
                            reporter,
                            name.span,
                            &format!("'{}' has no member named '{}'", base.display(), name.text),
                        );
                        None
                    }
                }
            }
            Expr::Application { span, .. } => {
                module.report(
                    reporter,
                    *span,
                    &format!("'{}' is not a declaration.", expr.display()),
                );
                None
            }
        }
    }

    fn record_node(&mut self, module: &Module, span: Span, found: Option<&Resolved>) {
        if let Some(Resolved::Node(idx)) = found {
            let type_id = self.entries[*idx].id;
            self.record_resolution(module, span, ResolutionTarget::Type { type_id });
        }
    }

    fn import_file(
        &mut self,
        module: &Module,
        path: &str,
        span: Span,
        reporter: &dyn ErrorReporter,
    ) -> Option<Resolved> {
        let imported = module
            .import_target(path)
            .and_then(|target| self.loader.get(target));
        let Some(imported) = imported else {
            module.report(reporter, span, &format!("Import failed: {}", path));
            return None;
        };
        let scope = self.add(&imported, reporter);
        self.imports
            .entry(module.path().to_string())
            .or_default()
            .insert(path.to_string(), scope.id());
        self.files.get(imported.path()).copied().map(Resolved::Node)
    }

    /// Evaluate a type expression.
    pub(crate) fn compile_type(
        &mut self,
        scope: usize,
        expr: &Expr,
        reporter: &dyn ErrorReporter,
    ) -> Option<Type> {
        let module = self.module_of(scope);
        if let Expr::Application { base, args, span } = expr {
            return match self.resolve_expr(scope, base, reporter)? {
                Resolved::List if args.len() == 1 => {
                    let element = self.compile_type(scope, &args[0], reporter)?;
                    Some(Type::List(Box::new(element)))
                }
                Resolved::List => {
                    module.report(reporter, *span, "'List' requires exactly one parameter.");
                    None
                }
                _ => {
                    module.report(
                        reporter,
                        *span,
                        &format!("'{}' does not accept parameters.", base.display()),
                    );
                    None
                }
            };
        }

        match self.resolve_expr(scope, expr, reporter)? {
            Resolved::Type(ty) => Some(ty),
            Resolved::List => {
                module.report(reporter, expr.span(), "'List' requires exactly one parameter.");
                None
            }
            Resolved::Node(idx) => {
                let id = self.entries[idx].id;
                match self.entries[idx].decl.as_ref().map(|decl| &decl.kind) {
                    Some(DeclKind::Struct { .. }) => Some(Type::Struct(id)),
                    Some(DeclKind::Enum { .. }) => Some(Type::Enum(id)),
                    _ => {
                        module.report(
                            reporter,
                            expr.span(),
                            &format!("'{}' is not a type.", expr.display()),
                        );
                        None
                    }
                }
            }
        }
    }

    /// Type and value of the constant declared at entry `idx`.
    pub(crate) fn const_value(&mut self, idx: usize, reporter: &dyn ErrorReporter) -> Option<(Type, Value)> {
        let decl = self.entries[idx].decl.clone()?;
        match self.const_values.get(&idx) {
            Some(Slot::Done(value)) => return value.clone(),
            Some(Slot::InProgress) => {
                self.module_of(idx)
                    .report(reporter, decl.name.span, RECURSIVE_DECLARATION);
                return None;
            }
            None => {}
        }
        self.const_values.insert(idx, Slot::InProgress);

        let result = match &decl.kind {
            DeclKind::Const { ty, value } => self.compile_type(idx, ty, reporter).and_then(|const_ty| {
                let compiled = self.compile_value(idx, value, &const_ty, reporter)?;
                Some((const_ty, compiled))
            }),
            _ => None,
        };
        self.const_values.insert(idx, Slot::Done(result.clone()));
        result
    }

    /// Value type and allowed targets of the annotation declared at `idx`.
    pub(crate) fn annotation_signature(
        &mut self,
        idx: usize,
        reporter: &dyn ErrorReporter,
    ) -> Option<(Type, AnnotationTargets)> {
        if let Some(signature) = self.annotation_signatures.get(&idx) {
            return signature.clone();
        }
        let decl = self.entries[idx].decl.clone()?;
        let module = self.module_of(idx);

        let signature = match &decl.kind {
            DeclKind::Annotation { targets, ty } => {
                let mut allowed = AnnotationTargets::default();
                for target in targets {
                    if target.text == "*" {
                        allowed = AnnotationTargets::all();
                    } else if let Some(kind) = AnnotationTarget::from_keyword(&target.text) {
                        allowed.insert(kind);
                    } else {
                        module.report(
                            reporter,
                            target.span,
                            &format!("'{}' is not a valid annotation target.", target.text),
                        );
                    }
                }
                self.compile_type(idx, ty, reporter).map(|ty| (ty, allowed))
            }
            _ => None,
        };
        self.annotation_signatures.insert(idx, signature.clone());
        signature
    }

    /// Compile `$annotation(value)` applications on a declaration of kind
    /// `target`. Applications with errors are reported and dropped.
    pub(crate) fn compile_annotations(
        &mut self,
        scope: usize,
        apps: &[AnnotationApp],
        target: AnnotationTarget,
        reporter: &dyn ErrorReporter,
    ) -> Vec<AnnotationValue> {
        let module = self.module_of(scope);
        let mut values = Vec::with_capacity(apps.len());
        for app in apps {
            let name = app.name.display();
            let annotation = match self.resolve_expr(scope, &app.name, reporter) {
                Some(Resolved::Node(idx))
                    if matches!(
                        self.entries[idx].decl.as_ref().map(|decl| &decl.kind),
                        Some(DeclKind::Annotation { .. })
                    ) =>
                {
                    idx
                }
                Some(_) => {
                    module.report(reporter, app.name.span(), &format!("'{}' is not an annotation.", name));
                    continue;
                }
                None => continue,
            };
            let Some((ty, targets)) = self.annotation_signature(annotation, reporter) else {
                continue;
            };
            if !targets.contains(target) {
                module.report(
                    reporter,
                    app.span,
                    &format!("'{}' cannot be applied to this kind of declaration.", name),
                );
                continue;
            }
            let value = match &app.value {
                Some(value) => match self.compile_value(scope, value, &ty, reporter) {
                    Some(value) => value,
                    None => continue,
                },
                None if ty == Type::Void => Value::Void,
                None => {
                    module.report(reporter, app.span, &format!("'{}' requires a value.", name));
                    continue;
                }
            };
            values.push(AnnotationValue {
                id: self.entries[annotation].id,
                value,
            });
        }
        values
    }

    /// Evaluate a value expression against the type it must have.
    pub(crate) fn compile_value(
        &mut self,
        scope: usize,
        expr: &ValueExpr,
        ty: &Type,
        reporter: &dyn ErrorReporter,
    ) -> Option<Value> {
        let module = self.module_of(scope);
        let mismatch = |compiler: &Compiler, span: Span| {
            module.report(
                reporter,
                span,
                &format!("Type mismatch; expected {}.", compiler.describe_type(ty)),
            );
            None
        };

        match expr {
            ValueExpr::Integer { value, span } => match integer_value(*value, ty) {
                IntegerFit::Fits(value) => Some(value),
                IntegerFit::OutOfRange => {
                    module.report(reporter, *span, "Integer value out of range.");
                    None
                }
                IntegerFit::NotNumeric => mismatch(self, *span),
            },
            ValueExpr::Float { value, span } => match ty {
                Type::Float32 => Some(Value::Float32(*value as f32)),
                Type::Float64 => Some(Value::Float64(*value)),
                _ => mismatch(self, *span),
            },
            ValueExpr::Text { value, span } => match ty {
                Type::Text => match String::from_utf8(value.clone()) {
                    Ok(text) => Some(Value::Text(text)),
                    Err(_) => {
                        module.report(reporter, *span, "Text value is not valid UTF-8.");
                        None
                    }
                },
                Type::Data => Some(Value::Data(value.clone())),
                _ => mismatch(self, *span),
            },
            ValueExpr::List { items, span } => {
                let Type::List(element) = ty else {
                    return mismatch(self, *span);
                };
                let mut values = Vec::with_capacity(items.len());
                let mut ok = true;
                for item in items {
                    match self.compile_value(scope, item, element, reporter) {
                        Some(value) => values.push(value),
                        None => ok = false,
                    }
                }
                if !ok {
                    return None;
                }
                match collect_list(element, values) {
                    Some(list) => Some(Value::List(Some(list))),
                    None => {
                        module.report(
                            reporter,
                            *span,
                            "List values of this element type are not supported by this compiler.",
                        );
                        None
                    }
                }
            }
            ValueExpr::Name(name_expr) => {
                if let Expr::Name(name) = name_expr {
                    if let Some(value) = self.keyword_value(&module, name, ty) {
                        return Some(value);
                    }
                }
                let idx = match self.resolve_expr(scope, name_expr, reporter)? {
                    Resolved::Node(idx) => idx,
                    _ => return mismatch(self, name_expr.span()),
                };
                let is_const = matches!(
                    self.entries[idx].decl.as_ref().map(|decl| &decl.kind),
                    Some(DeclKind::Const { .. })
                );
                if !is_const {
                    module.report(
                        reporter,
                        name_expr.span(),
                        &format!("'{}' does not refer to a constant.", name_expr.display()),
                    );
                    return None;
                }
                let (const_ty, value) = self.const_value(idx, reporter)?;
                if const_ty != *ty {
                    return mismatch(self, name_expr.span());
                }
                Some(value)
            }
        }
    }

    // Bare identifiers that are values of `ty` without being declarations:
    // `true`, `void`, `inf`, enumerant names.
    fn keyword_value(&mut self, module: &Module, name: &crate::ast::Name, ty: &Type) -> Option<Value> {
        match (ty, name.text.as_str()) {
            (Type::Void, "void") => Some(Value::Void),
            (Type::Bool, "true") => Some(Value::Bool(true)),
            (Type::Bool, "false") => Some(Value::Bool(false)),
            (Type::Float32, "inf") => Some(Value::Float32(f32::INFINITY)),
            (Type::Float32, "nan") => Some(Value::Float32(f32::NAN)),
            (Type::Float64, "inf") => Some(Value::Float64(f64::INFINITY)),
            (Type::Float64, "nan") => Some(Value::Float64(f64::NAN)),
            (Type::Enum(enum_id), text) => {
                let idx = *self.entry_by_id.get(enum_id)?;
                let decl = self.entries[idx].decl.clone()?;
                let DeclKind::Enum { enumerants } = &decl.kind else {
                    return None;
                };
                let ordinal = enumerants
                    .iter()
                    .find(|enumerant| enumerant.name.text == text)?
                    .ordinal
                    .value;
                self.record_resolution(
                    module,
                    name.span,
                    ResolutionTarget::Member {
                        parent_type_id: *enum_id,
                        ordinal,
                    },
                );
                Some(Value::Enum(ordinal))
            }
            _ => None,
        }
    }

    /// How a type reads in diagnostics.
    pub(crate) fn describe_type(&self, ty: &Type) -> String {
        match ty {
            Type::Struct(id) | Type::Enum(id) => match self.entry_by_id.get(id) {
                Some(&idx) => self.entries[idx].name.clone(),
                None => ty.to_string(),
            },
            Type::List(element) => format!("List({})", self.describe_type(element)),
            _ => ty.to_string(),
        }
    }
}

enum IntegerFit {
    Fits(Value),
    OutOfRange,
    NotNumeric,
}

fn integer_value(value: i128, ty: &Type) -> IntegerFit {
    fn fit<T: TryFrom<i128>>(value: i128, wrap: fn(T) -> Value) -> IntegerFit {
        match T::try_from(value) {
            Ok(value) => IntegerFit::Fits(wrap(value)),
            Err(_) => IntegerFit::OutOfRange,
        }
    }
    match ty {
        Type::Int8 => fit(value, Value::Int8),
        Type::Int16 => fit(value, Value::Int16),
        Type::Int32 => fit(value, Value::Int32),
        Type::Int64 => fit(value, Value::Int64),
        Type::UInt8 => fit(value, Value::UInt8),
        Type::UInt16 => fit(value, Value::UInt16),
        Type::UInt32 => fit(value, Value::UInt32),
        Type::UInt64 => fit(value, Value::UInt64),
        Type::Float32 => IntegerFit::Fits(Value::Float32(value as f32)),
        Type::Float64 => IntegerFit::Fits(Value::Float64(value as f64)),
        _ => IntegerFit::NotNumeric,
    }
}

// Pack already type-checked element values into a typed list.
fn collect_list(element: &Type, values: Vec<Value>) -> Option<ListValue> {
    macro_rules! gather {
        ($variant:ident) => {
            ListValue::$variant(
                values
                    .into_iter()
                    .filter_map(|value| match value {
                        Value::$variant(item) => Some(item),
                        _ => None,
                    })
                    .collect(),
            )
        };
    }

    let list = match element {
        Type::Void => ListValue::Void(values.len()),
        Type::Bool => gather!(Bool),
        Type::Int8 => gather!(Int8),
        Type::Int16 => gather!(Int16),
        Type::Int32 => gather!(Int32),
        Type::Int64 => gather!(Int64),
        Type::UInt8 => gather!(UInt8),
        Type::UInt16 => gather!(UInt16),
        Type::UInt32 => gather!(UInt32),
        Type::UInt64 => gather!(UInt64),
        Type::Float32 => gather!(Float32),
        Type::Float64 => gather!(Float64),
        Type::Text => gather!(Text),
        Type::Data => gather!(Data),
        Type::Enum(_) => gather!(Enum),
        Type::List(_) | Type::Struct(_) | Type::AnyPointer => return None,
    };
    Some(list)
}

#[cfg(test)]
mod tests {
    use crate::compiler::tests::compile;
    use crate::schema::*;

    fn find<'a>(compiler: &'a crate::compiler::Compiler, display_name: &str) -> &'a Node {
        compiler
            .all_loaded()
            .into_iter()
            .find(|node| node.display_name == display_name)
            .unwrap_or_else(|| panic!("no node named {}", display_name))
    }

    #[test]
    fn hex_escapes_keep_raw_bytes_for_data() {
        let (compiler, _, messages) = compile(&[(
            "index.capnp",
            "@0xdbb9ad1f14bf0b36;\n\
             const blob :Data = \"\\xff\\x80A\";\n\
             const name :Text = \"caf\\xc3\\xa9\";\n\
             const bad :Text = \"\\xff\";\n",
        )]);
        assert_eq!(messages, vec!["4:19 Text value is not valid UTF-8.".to_string()]);

        match &find(&compiler, "index.capnp:blob").kind {
            NodeKind::Const { value, .. } => assert_eq!(*value, Value::Data(vec![0xff, 0x80, b'A'])),
            _ => panic!("expected const"),
        }
        match &find(&compiler, "index.capnp:name").kind {
            NodeKind::Const { value, .. } => assert_eq!(*value, Value::Text("café".to_string())),
            _ => panic!("expected const"),
        }
    }

    #[test]
    fn constants_and_defaults() {
        let (compiler, _, messages) = compile(&[(
            "index.capnp",
            "@0xdbb9ad1f14bf0b36;\n\
             const limit :Int32 = -5;\n\
             const primes :List(UInt8) = [2, 3, 5];\n\
             const greeting :Text = \"hi\";\n\
             struct S {\n\
               n @0 :Int32 = .limit;\n\
               f @1 :Float64 = inf;\n\
               b @2 :Bool = true;\n\
             }\n",
        )]);
        assert!(messages.is_empty(), "{:?}", messages);

        match &find(&compiler, "index.capnp:limit").kind {
            NodeKind::Const { ty, value } => {
                assert_eq!(*ty, Type::Int32);
                assert_eq!(*value, Value::Int32(-5));
            }
            _ => panic!("expected const"),
        }
        match &find(&compiler, "index.capnp:primes").kind {
            NodeKind::Const { value, .. } => {
                assert_eq!(*value, Value::List(Some(ListValue::UInt8(vec![2, 3, 5]))))
            }
            _ => panic!("expected const"),
        }
        match &find(&compiler, "index.capnp:S").kind {
            NodeKind::Struct(node) => {
                assert_eq!(node.fields[0].default_value, Value::Int32(-5));
                assert!(node.fields[0].had_explicit_default);
                assert_eq!(node.fields[1].default_value, Value::Float64(f64::INFINITY));
                assert_eq!(node.fields[2].default_value, Value::Bool(true));
            }
            _ => panic!("expected struct"),
        }
    }

    #[test]
    fn enumerant_values_record_member_resolutions() {
        let source = "@0xdbb9ad1f14bf0b36;\n\
                      enum Color { red @0; green @1; }\n\
                      struct Paint { color @0 :Color = green; }\n";
        let (compiler, module, messages) = compile(&[("index.capnp", source)]);
        assert!(messages.is_empty(), "{:?}", messages);

        let color_id = find(&compiler, "index.capnp:Color").id;
        let resolutions = compiler.resolutions(&module);
        let type_ref = source.find(":Color").unwrap() as u32 + 1;
        let member_ref = source.find("green;").unwrap() as u32;
        assert_eq!(
            resolutions,
            vec![
                Resolution {
                    start_byte: type_ref,
                    end_byte: type_ref + 5,
                    target: ResolutionTarget::Type { type_id: color_id },
                },
                Resolution {
                    start_byte: member_ref,
                    end_byte: member_ref + 5,
                    target: ResolutionTarget::Member {
                        parent_type_id: color_id,
                        ordinal: 1,
                    },
                },
            ]
        );
    }

    #[test]
    fn value_errors() {
        let (_, _, messages) = compile(&[(
            "index.capnp",
            "@0xdbb9ad1f14bf0b36;\n\
             const a :UInt8 = 300;\n\
             const b :Text = 5;\n\
             const c :Int32 = missing;\n",
        )]);
        assert_eq!(
            messages,
            vec![
                "2:18 Integer value out of range.".to_string(),
                "3:17 Type mismatch; expected Text.".to_string(),
                "4:18 Not defined: missing".to_string(),
            ]
        );
    }

    #[test]
    fn type_errors() {
        let (_, _, messages) = compile(&[(
            "index.capnp",
            "@0xdbb9ad1f14bf0b36;\n\
             const k :Int32 = 1;\n\
             struct S {\n\
               a @0 :List;\n\
               b @1 :k;\n\
               c @2 :Nope.Thing;\n\
             }\n",
        )]);
        assert_eq!(
            messages,
            vec![
                "4:7 'List' requires exactly one parameter.".to_string(),
                "5:7 'k' is not a type.".to_string(),
                "6:7 Not defined: Nope".to_string(),
            ]
        );
    }

    #[test]
    fn aliases_imports_and_cycles() {
        let (compiler, module, messages) = compile(&[
            (
                "index.capnp",
                "@0xdbb9ad1f14bf0b36;\n\
                 using Other = import \"other.capnp\";\n\
                 using T = Other.Thing;\n\
                 using Loop = Loop;\n\
                 using Gone = import \"gone.capnp\";\n\
                 struct S { t @0 :T; }\n",
            ),
            ("other.capnp", "@0xc0c1c2c3c4c5c6c7;\nstruct Thing {}\n"),
        ]);
        assert_eq!(
            messages,
            vec![
                "4:7 Declaration recursively depends on itself.".to_string(),
                "5:14 Import failed: gone.capnp".to_string(),
            ]
        );
        let imports = compiler.file_import_table(&module);
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].name, "other.capnp");
        assert_eq!(imports[0].id, 0xc0c1c2c3c4c5c6c7);
        assert!(compiler
            .all_loaded()
            .iter()
            .any(|node| node.display_name == "other.capnp:Thing"));
    }

    #[test]
    fn annotations_are_checked_and_applied() {
        let (compiler, _, messages) = compile(&[(
            "index.capnp",
            "@0xdbb9ad1f14bf0b36;\n\
             annotation label(struct, field) :Text;\n\
             annotation flag(*) :Void;\n\
             annotation onFile(file) :Text;\n\
             struct S $label(\"s\") $flag {\n\
               x @0 :Int32 $onFile(\"no\");\n\
               y @1 :Int32 $label;\n\
             }\n",
        )]);
        assert_eq!(
            messages,
            vec![
                "6:13 'onFile' cannot be applied to this kind of declaration.".to_string(),
                "7:13 'label' requires a value.".to_string(),
            ]
        );
        let s = find(&compiler, "index.capnp:S");
        assert_eq!(s.annotations.len(), 2);
        assert_eq!(s.annotations[0].value, Value::Text("s".to_string()));
        assert_eq!(s.annotations[1].value, Value::Void);
        assert!(compiler
            .all_loaded()
            .iter()
            .any(|node| node.display_name == "index.capnp:flag"));
    }
}
