// Compiled schema nodes, the in-memory form of what ends up in a
// CodeGeneratorRequest.

use std::fmt;

pub type TypeId = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Void,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Text,
    Data,
    List(Box<Type>),
    Enum(TypeId),
    Struct(TypeId),
    AnyPointer,
}

impl Type {
    pub fn builtin(name: &str) -> Option<Type> {
        let ty = match name {
            "Void" => Type::Void,
            "Bool" => Type::Bool,
            "Int8" => Type::Int8,
            "Int16" => Type::Int16,
            "Int32" => Type::Int32,
            "Int64" => Type::Int64,
            "UInt8" => Type::UInt8,
            "UInt16" => Type::UInt16,
            "UInt32" => Type::UInt32,
            "UInt64" => Type::UInt64,
            "Float32" => Type::Float32,
            "Float64" => Type::Float64,
            "Text" => Type::Text,
            "Data" => Type::Data,
            "AnyPointer" => Type::AnyPointer,
            _ => return None,
        };
        Some(ty)
    }

    /// lg2 of the bit width for data-section types, `None` for Void and
    /// pointer types.
    pub fn data_lg_size(&self) -> Option<u32> {
        match self {
            Type::Bool => Some(0),
            Type::Int8 | Type::UInt8 => Some(3),
            Type::Int16 | Type::UInt16 | Type::Enum(_) => Some(4),
            Type::Int32 | Type::UInt32 | Type::Float32 => Some(5),
            Type::Int64 | Type::UInt64 | Type::Float64 => Some(6),
            _ => None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            Type::Text | Type::Data | Type::List(_) | Type::Struct(_) | Type::AnyPointer
        )
    }

    /// Id of the struct or enum this type names, looking through lists.
    pub fn referenced_id(&self) -> Option<TypeId> {
        match self {
            Type::Enum(id) | Type::Struct(id) => Some(*id),
            Type::List(element) => element.referenced_id(),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "Void"),
            Type::Bool => write!(f, "Bool"),
            Type::Int8 => write!(f, "Int8"),
            Type::Int16 => write!(f, "Int16"),
            Type::Int32 => write!(f, "Int32"),
            Type::Int64 => write!(f, "Int64"),
            Type::UInt8 => write!(f, "UInt8"),
            Type::UInt16 => write!(f, "UInt16"),
            Type::UInt32 => write!(f, "UInt32"),
            Type::UInt64 => write!(f, "UInt64"),
            Type::Float32 => write!(f, "Float32"),
            Type::Float64 => write!(f, "Float64"),
            Type::Text => write!(f, "Text"),
            Type::Data => write!(f, "Data"),
            Type::List(element) => write!(f, "List({})", element),
            Type::Enum(id) => write!(f, "enum @0x{:016x}", id),
            Type::Struct(id) => write!(f, "struct @0x{:016x}", id),
            Type::AnyPointer => write!(f, "AnyPointer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Data(Vec<u8>),
    /// `None` is a null list.
    List(Option<ListValue>),
    Enum(u16),
    /// Null struct; struct literals are not supported.
    Struct,
    AnyPointer,
}

impl Value {
    /// The implicit default of a field of type `ty`.
    pub fn zero(ty: &Type) -> Value {
        match ty {
            Type::Void => Value::Void,
            Type::Bool => Value::Bool(false),
            Type::Int8 => Value::Int8(0),
            Type::Int16 => Value::Int16(0),
            Type::Int32 => Value::Int32(0),
            Type::Int64 => Value::Int64(0),
            Type::UInt8 => Value::UInt8(0),
            Type::UInt16 => Value::UInt16(0),
            Type::UInt32 => Value::UInt32(0),
            Type::UInt64 => Value::UInt64(0),
            Type::Float32 => Value::Float32(0.0),
            Type::Float64 => Value::Float64(0.0),
            Type::Text => Value::Text(String::new()),
            Type::Data => Value::Data(Vec::new()),
            Type::List(_) => Value::List(None),
            Type::Enum(_) => Value::Enum(0),
            Type::Struct(_) => Value::Struct,
            Type::AnyPointer => Value::AnyPointer,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListValue {
    Void(usize),
    Bool(Vec<bool>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Text(Vec<String>),
    Data(Vec<Vec<u8>>),
    Enum(Vec<u16>),
}

impl ListValue {
    pub fn len(&self) -> usize {
        match self {
            ListValue::Void(len) => *len,
            ListValue::Bool(items) => items.len(),
            ListValue::Int8(items) => items.len(),
            ListValue::Int16(items) => items.len(),
            ListValue::Int32(items) => items.len(),
            ListValue::Int64(items) => items.len(),
            ListValue::UInt8(items) => items.len(),
            ListValue::UInt16(items) => items.len(),
            ListValue::UInt32(items) => items.len(),
            ListValue::UInt64(items) => items.len(),
            ListValue::Float32(items) => items.len(),
            ListValue::Float64(items) => items.len(),
            ListValue::Text(items) => items.len(),
            ListValue::Data(items) => items.len(),
            ListValue::Enum(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AnnotationTarget {
    File,
    Const,
    Enum,
    Enumerant,
    Struct,
    Field,
    Union,
    Group,
    Interface,
    Method,
    Param,
    Annotation,
}

impl AnnotationTarget {
    pub const ALL: [AnnotationTarget; 12] = [
        AnnotationTarget::File,
        AnnotationTarget::Const,
        AnnotationTarget::Enum,
        AnnotationTarget::Enumerant,
        AnnotationTarget::Struct,
        AnnotationTarget::Field,
        AnnotationTarget::Union,
        AnnotationTarget::Group,
        AnnotationTarget::Interface,
        AnnotationTarget::Method,
        AnnotationTarget::Param,
        AnnotationTarget::Annotation,
    ];

    pub fn from_keyword(keyword: &str) -> Option<AnnotationTarget> {
        let target = match keyword {
            "file" => AnnotationTarget::File,
            "const" => AnnotationTarget::Const,
            "enum" => AnnotationTarget::Enum,
            "enumerant" => AnnotationTarget::Enumerant,
            "struct" => AnnotationTarget::Struct,
            "field" => AnnotationTarget::Field,
            "union" => AnnotationTarget::Union,
            "group" => AnnotationTarget::Group,
            "interface" => AnnotationTarget::Interface,
            "method" => AnnotationTarget::Method,
            "param" => AnnotationTarget::Param,
            "annotation" => AnnotationTarget::Annotation,
            _ => return None,
        };
        Some(target)
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationTargets(u16);

impl AnnotationTargets {
    pub fn all() -> Self {
        AnnotationTarget::ALL
            .iter()
            .fold(Self::default(), |mut targets, &target| {
                targets.insert(target);
                targets
            })
    }

    pub fn insert(&mut self, target: AnnotationTarget) {
        self.0 |= target.bit();
    }

    pub fn contains(&self, target: AnnotationTarget) -> bool {
        self.0 & target.bit() != 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationValue {
    pub id: TypeId,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedNode {
    pub name: String,
    pub id: TypeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: TypeId,
    pub display_name: String,
    pub display_name_prefix_length: u32,
    pub scope_id: TypeId,
    pub nested_nodes: Vec<NestedNode>,
    pub annotations: Vec<AnnotationValue>,
    pub kind: NodeKind,
}

impl Node {
    /// Short name of the node, the part after the display-name prefix.
    pub fn short_name(&self) -> &str {
        self.display_name
            .get(self.display_name_prefix_length as usize..)
            .unwrap_or(&self.display_name)
    }

    /// Ids of every node this one needs at code-generation time: field,
    /// constant and annotation types plus every applied annotation.
    pub fn dependencies(&self) -> Vec<TypeId> {
        let mut deps = Vec::new();
        match &self.kind {
            NodeKind::File => {}
            NodeKind::Struct(node) => {
                for field in &node.fields {
                    deps.extend(field.ty.referenced_id());
                    deps.extend(field.annotations.iter().map(|a| a.id));
                }
            }
            NodeKind::Enum(enumerants) => {
                for enumerant in enumerants {
                    deps.extend(enumerant.annotations.iter().map(|a| a.id));
                }
            }
            NodeKind::Const { ty, .. } | NodeKind::Annotation { ty, .. } => {
                deps.extend(ty.referenced_id());
            }
        }
        deps.extend(self.annotations.iter().map(|a| a.id));
        deps
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::File => "file",
            NodeKind::Struct(_) => "struct",
            NodeKind::Enum(_) => "enum",
            NodeKind::Const { .. } => "const",
            NodeKind::Annotation { .. } => "annotation",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    File,
    Struct(StructNode),
    Enum(Vec<EnumerantNode>),
    Const { ty: Type, value: Value },
    Annotation { ty: Type, targets: AnnotationTargets },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructNode {
    pub data_word_count: u16,
    pub pointer_count: u16,
    pub discriminant_count: u16,
    pub discriminant_offset: u32,
    /// Sorted by ordinal.
    pub fields: Vec<FieldNode>,
}

/// Discriminant value of a field that is not part of a union.
pub const NO_DISCRIMINANT: u16 = 0xffff;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub name: String,
    pub code_order: u16,
    pub annotations: Vec<AnnotationValue>,
    pub discriminant_value: u16,
    pub offset: u32,
    pub ty: Type,
    pub default_value: Value,
    pub had_explicit_default: bool,
    pub ordinal: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumerantNode {
    pub name: String,
    pub code_order: u16,
    pub annotations: Vec<AnnotationValue>,
}

/// Doc comments for one node and its members (fields or enumerants, in
/// ordinal order, matching the node's member list).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceInfo {
    pub id: TypeId,
    pub doc_comment: Option<String>,
    pub members: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub id: TypeId,
    pub name: String,
}

/// What an identifier in the source text was resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResolutionTarget {
    Type { type_id: TypeId },
    Member { parent_type_id: TypeId, ordinal: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Resolution {
    pub start_byte: u32,
    pub end_byte: u32,
    pub target: ResolutionTarget,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_types_and_sizes() {
        assert_eq!(Type::builtin("UInt16"), Some(Type::UInt16));
        assert_eq!(Type::builtin("List"), None);
        assert_eq!(Type::Enum(1).data_lg_size(), Some(4));
        assert_eq!(Type::Text.data_lg_size(), None);
        assert!(Type::List(Box::new(Type::Bool)).is_pointer());
        assert!(!Type::Void.is_pointer());
    }

    #[test]
    fn list_types_display_like_source() {
        let ty = Type::List(Box::new(Type::List(Box::new(Type::Text))));
        assert_eq!(ty.to_string(), "List(List(Text))");
    }

    #[test]
    fn dependencies_cover_fields_and_annotations() {
        let node = Node {
            id: 1,
            display_name: "index.capnp:Foo".to_string(),
            display_name_prefix_length: 12,
            scope_id: 2,
            nested_nodes: Vec::new(),
            annotations: vec![AnnotationValue { id: 7, value: Value::Void }],
            kind: NodeKind::Struct(StructNode {
                fields: vec![FieldNode {
                    name: "bars".to_string(),
                    code_order: 0,
                    annotations: Vec::new(),
                    discriminant_value: NO_DISCRIMINANT,
                    offset: 0,
                    ty: Type::List(Box::new(Type::Struct(5))),
                    default_value: Value::List(None),
                    had_explicit_default: false,
                    ordinal: 0,
                }],
                ..StructNode::default()
            }),
        };
        assert_eq!(node.short_name(), "Foo");
        assert_eq!(node.dependencies(), vec![5, 7]);
    }

    #[test]
    fn annotation_targets_set() {
        let mut targets = AnnotationTargets::default();
        targets.insert(AnnotationTarget::Field);
        assert!(targets.contains(AnnotationTarget::Field));
        assert!(!targets.contains(AnnotationTarget::Struct));
        assert!(AnnotationTargets::all().contains(AnnotationTarget::Param));
    }
}
