// Parsed form of a schema file. Spans are byte ranges into the source text.

use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start as u32,
            end: end as u32,
        }
    }

    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Name {
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdLiteral {
    pub value: u64,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ordinal {
    pub value: u16,
    pub span: Span,
}

#[derive(Debug, Clone, Default)]
pub struct File {
    pub id: Option<IdLiteral>,
    pub annotations: Vec<AnnotationApp>,
    pub decls: Vec<Rc<Decl>>,
    /// Every path written in an `import "..."` expression, in source order.
    pub imports: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Decl {
    pub name: Name,
    pub id: Option<IdLiteral>,
    pub annotations: Vec<AnnotationApp>,
    pub doc_comment: Option<String>,
    pub span: Span,
    pub kind: DeclKind,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    Using { target: Expr },
    Const { ty: Expr, value: ValueExpr },
    Struct { members: Vec<StructMember> },
    Enum { enumerants: Vec<Enumerant> },
    Annotation { targets: Vec<Name>, ty: Expr },
}

impl DeclKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            DeclKind::Using { .. } => "using",
            DeclKind::Const { .. } => "const",
            DeclKind::Struct { .. } => "struct",
            DeclKind::Enum { .. } => "enum",
            DeclKind::Annotation { .. } => "annotation",
        }
    }
}

#[derive(Debug, Clone)]
pub enum StructMember {
    Field(Field),
    Union(Union),
    Nested(Rc<Decl>),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: Name,
    pub ordinal: Ordinal,
    pub ty: Expr,
    pub default: Option<ValueExpr>,
    pub annotations: Vec<AnnotationApp>,
    pub doc_comment: Option<String>,
    pub span: Span,
}

/// An unnamed union inside a struct.
#[derive(Debug, Clone)]
pub struct Union {
    pub fields: Vec<Field>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Enumerant {
    pub name: Name,
    pub ordinal: Ordinal,
    pub annotations: Vec<AnnotationApp>,
    pub doc_comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name(Name),
    /// `.Name`, looked up from the file scope only.
    Absolute(Name),
    Import { path: String, span: Span },
    Member { base: Box<Expr>, name: Name },
    Application { base: Box<Expr>, args: Vec<Expr>, span: Span },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Name(name) => name.span,
            Expr::Absolute(name) => name.span,
            Expr::Import { span, .. } => *span,
            Expr::Member { base, name } => base.span().to(name.span),
            Expr::Application { span, .. } => *span,
        }
    }

    /// Source-like rendering used in diagnostics.
    pub fn display(&self) -> String {
        match self {
            Expr::Name(name) => name.text.clone(),
            Expr::Absolute(name) => format!(".{}", name.text),
            Expr::Import { path, .. } => format!("import \"{}\"", path),
            Expr::Member { base, name } => format!("{}.{}", base.display(), name.text),
            Expr::Application { base, args, .. } => {
                let args: Vec<String> = args.iter().map(Expr::display).collect();
                format!("{}({})", base.display(), args.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    Integer { value: i128, span: Span },
    Float { value: f64, span: Span },
    /// String literal bytes, checked as UTF-8 only when the target is Text.
    Text { value: Vec<u8>, span: Span },
    List { items: Vec<ValueExpr>, span: Span },
    /// `true`, `void`, `inf`, an enumerant, or a reference to a constant.
    Name(Expr),
}

impl ValueExpr {
    pub fn span(&self) -> Span {
        match self {
            ValueExpr::Integer { span, .. }
            | ValueExpr::Float { span, .. }
            | ValueExpr::Text { span, .. }
            | ValueExpr::List { span, .. } => *span,
            ValueExpr::Name(expr) => expr.span(),
        }
    }
}

/// `$name` or `$name(value)` attached to a declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationApp {
    pub name: Expr,
    pub value: Option<ValueExpr>,
    pub span: Span,
}
