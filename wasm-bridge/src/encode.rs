// Builds the CodeGeneratorRequest message from compiled schema nodes and
// serializes it for transport.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use capnp::message::Builder;
use capnp::serialize;
use capnp::{any_pointer, primitive_list, struct_list, text_list};

use capnp_schema_compiler::schema::{
    AnnotationTarget, AnnotationValue, FieldNode, Import, ListValue, Node, NodeKind, Resolution,
    ResolutionTarget, SourceInfo, Type, Value,
};

use crate::codegen_capnp::{annotation, code_generator_request, field, node, type_, value, ElementSize};
use crate::config::CompilerVersion;

/// One entry of `requestedFiles`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedFile {
    pub id: u64,
    pub filename: String,
    pub imports: Vec<Import>,
    pub resolutions: Vec<Resolution>,
}

/// Serialize a request as a standard (unpacked) stream message.
pub fn encode_request(
    version: CompilerVersion,
    nodes: &[&Node],
    source_info: &[&SourceInfo],
    files: &[RequestedFile],
) -> capnp::Result<Vec<u8>> {
    let mut message = Builder::new_default();

    {
        let mut request = message.init_root::<code_generator_request::Builder>();

        {
            let mut capnp_version = request.reborrow().init_capnp_version();
            capnp_version.set_major(version.major);
            capnp_version.set_minor(version.minor);
            capnp_version.set_micro(version.micro);
        }

        {
            let mut nodes_builder = request.reborrow().init_nodes(nodes.len() as u32);
            for (i, node) in nodes.iter().enumerate() {
                tracing::trace!(id = %format!("@0x{:016x}", node.id), name = %node.display_name, "encode node");
                write_node(node, nodes_builder.reborrow().get(i as u32))?;
            }
        }

        {
            let mut info_builder = request.reborrow().init_source_info(source_info.len() as u32);
            for (i, info) in source_info.iter().enumerate() {
                write_source_info(info, info_builder.reborrow().get(i as u32));
            }
        }

        let mut files_builder = request.init_requested_files(files.len() as u32);
        for (i, file) in files.iter().enumerate() {
            write_requested_file(file, files_builder.reborrow().get(i as u32));
        }
    }

    let mut buf = Vec::new();
    serialize::write_message(&mut buf, &message)?;
    tracing::debug!(
        nodes = nodes.len(),
        files = files.len(),
        bytes = buf.len(),
        "encoded CodeGeneratorRequest"
    );
    Ok(buf)
}

/// RFC 4648 §5 alphabet, no padding.
pub fn encode_base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

fn write_node(node: &Node, mut builder: node::Builder) -> capnp::Result<()> {
    builder.set_id(node.id);
    builder.set_display_name(node.display_name.as_str());
    builder.set_display_name_prefix_length(node.display_name_prefix_length);
    builder.set_scope_id(node.scope_id);

    {
        let mut nested = builder
            .reborrow()
            .init_nested_nodes(node.nested_nodes.len() as u32);
        for (i, child) in node.nested_nodes.iter().enumerate() {
            let mut entry = nested.reborrow().get(i as u32);
            entry.set_name(child.name.as_str());
            entry.set_id(child.id);
        }
    }

    write_annotations(
        &node.annotations,
        builder.reborrow().init_annotations(node.annotations.len() as u32),
    )?;

    match &node.kind {
        NodeKind::File => builder.set_file(()),
        NodeKind::Struct(layout) => {
            let mut struct_builder = builder.init_struct();
            struct_builder.set_data_word_count(layout.data_word_count);
            struct_builder.set_pointer_count(layout.pointer_count);
            struct_builder.set_preferred_list_encoding(ElementSize::InlineComposite);
            struct_builder.set_is_group(false);
            struct_builder.set_discriminant_count(layout.discriminant_count);
            struct_builder.set_discriminant_offset(layout.discriminant_offset);

            let mut fields = struct_builder.init_fields(layout.fields.len() as u32);
            for (i, field) in layout.fields.iter().enumerate() {
                write_field(field, fields.reborrow().get(i as u32))?;
            }
        }
        NodeKind::Enum(enumerants) => {
            let mut list = builder.init_enum().init_enumerants(enumerants.len() as u32);
            for (i, enumerant) in enumerants.iter().enumerate() {
                let mut entry = list.reborrow().get(i as u32);
                entry.set_name(enumerant.name.as_str());
                entry.set_code_order(enumerant.code_order);
                write_annotations(
                    &enumerant.annotations,
                    entry.init_annotations(enumerant.annotations.len() as u32),
                )?;
            }
        }
        NodeKind::Const { ty, value } => {
            let mut const_builder = builder.init_const();
            write_type(ty, const_builder.reborrow().init_type());
            write_value(value, const_builder.init_value())?;
        }
        NodeKind::Annotation { ty, targets } => {
            let mut annotation_builder = builder.init_annotation();
            write_type(ty, annotation_builder.reborrow().init_type());
            annotation_builder.set_targets_file(targets.contains(AnnotationTarget::File));
            annotation_builder.set_targets_const(targets.contains(AnnotationTarget::Const));
            annotation_builder.set_targets_enum(targets.contains(AnnotationTarget::Enum));
            annotation_builder.set_targets_enumerant(targets.contains(AnnotationTarget::Enumerant));
            annotation_builder.set_targets_struct(targets.contains(AnnotationTarget::Struct));
            annotation_builder.set_targets_field(targets.contains(AnnotationTarget::Field));
            annotation_builder.set_targets_union(targets.contains(AnnotationTarget::Union));
            annotation_builder.set_targets_group(targets.contains(AnnotationTarget::Group));
            annotation_builder.set_targets_interface(targets.contains(AnnotationTarget::Interface));
            annotation_builder.set_targets_method(targets.contains(AnnotationTarget::Method));
            annotation_builder.set_targets_param(targets.contains(AnnotationTarget::Param));
            annotation_builder.set_targets_annotation(targets.contains(AnnotationTarget::Annotation));
        }
    }
    Ok(())
}

fn write_field(field: &FieldNode, mut builder: field::Builder) -> capnp::Result<()> {
    builder.set_name(field.name.as_str());
    builder.set_code_order(field.code_order);
    builder.set_discriminant_value(field.discriminant_value);
    write_annotations(
        &field.annotations,
        builder.reborrow().init_annotations(field.annotations.len() as u32),
    )?;
    builder.reborrow().init_ordinal().set_explicit(field.ordinal);

    let mut slot = builder.init_slot();
    slot.set_offset(field.offset);
    slot.set_had_explicit_default(field.had_explicit_default);
    write_type(&field.ty, slot.reborrow().init_type());
    write_value(&field.default_value, slot.init_default_value())
}

fn write_annotations(
    annotations: &[AnnotationValue],
    mut list: struct_list::Builder<annotation::Owned>,
) -> capnp::Result<()> {
    for (i, applied) in annotations.iter().enumerate() {
        let mut entry = list.reborrow().get(i as u32);
        entry.set_id(applied.id);
        write_value(&applied.value, entry.init_value())?;
    }
    Ok(())
}

fn write_type(ty: &Type, mut builder: type_::Builder) {
    match ty {
        Type::Void => builder.set_void(()),
        Type::Bool => builder.set_bool(()),
        Type::Int8 => builder.set_int8(()),
        Type::Int16 => builder.set_int16(()),
        Type::Int32 => builder.set_int32(()),
        Type::Int64 => builder.set_int64(()),
        Type::UInt8 => builder.set_uint8(()),
        Type::UInt16 => builder.set_uint16(()),
        Type::UInt32 => builder.set_uint32(()),
        Type::UInt64 => builder.set_uint64(()),
        Type::Float32 => builder.set_float32(()),
        Type::Float64 => builder.set_float64(()),
        Type::Text => builder.set_text(()),
        Type::Data => builder.set_data(()),
        Type::List(element) => write_type(element, builder.init_list().init_element_type()),
        Type::Enum(id) => builder.init_enum().set_type_id(*id),
        Type::Struct(id) => builder.init_struct().set_type_id(*id),
        Type::AnyPointer => builder
            .init_any_pointer()
            .init_unconstrained()
            .set_any_kind(()),
    }
}

fn write_value(value: &Value, mut builder: value::Builder) -> capnp::Result<()> {
    match value {
        Value::Void => builder.set_void(()),
        Value::Bool(v) => builder.set_bool(*v),
        Value::Int8(v) => builder.set_int8(*v),
        Value::Int16(v) => builder.set_int16(*v),
        Value::Int32(v) => builder.set_int32(*v),
        Value::Int64(v) => builder.set_int64(*v),
        Value::UInt8(v) => builder.set_uint8(*v),
        Value::UInt16(v) => builder.set_uint16(*v),
        Value::UInt32(v) => builder.set_uint32(*v),
        Value::UInt64(v) => builder.set_uint64(*v),
        Value::Float32(v) => builder.set_float32(*v),
        Value::Float64(v) => builder.set_float64(*v),
        Value::Text(text) => builder.set_text(text.as_str()),
        Value::Data(bytes) => builder.set_data(bytes.as_slice()),
        // Null pointers: init selects the union member and leaves it null.
        Value::List(None) => {
            builder.init_list();
        }
        Value::List(Some(list)) => write_list(list, builder.init_list())?,
        Value::Enum(v) => builder.set_enum(*v),
        Value::Struct => {
            builder.init_struct();
        }
        Value::AnyPointer => {
            builder.init_any_pointer();
        }
    }
    Ok(())
}

macro_rules! primitive_items {
    ($builder:expr, $items:expr, $element:ty) => {{
        let mut list = $builder.initn_as::<primitive_list::Builder<$element>>($items.len() as u32);
        for (i, item) in $items.iter().enumerate() {
            list.set(i as u32, *item);
        }
    }};
}

fn write_list(list: &ListValue, builder: any_pointer::Builder) -> capnp::Result<()> {
    match list {
        ListValue::Void(len) => {
            builder.initn_as::<primitive_list::Builder<()>>(*len as u32);
        }
        ListValue::Bool(items) => primitive_items!(builder, items, bool),
        ListValue::Int8(items) => primitive_items!(builder, items, i8),
        ListValue::Int16(items) => primitive_items!(builder, items, i16),
        ListValue::Int32(items) => primitive_items!(builder, items, i32),
        ListValue::Int64(items) => primitive_items!(builder, items, i64),
        ListValue::UInt8(items) => primitive_items!(builder, items, u8),
        ListValue::UInt16(items) => primitive_items!(builder, items, u16),
        ListValue::UInt32(items) => primitive_items!(builder, items, u32),
        ListValue::UInt64(items) => primitive_items!(builder, items, u64),
        ListValue::Float32(items) => primitive_items!(builder, items, f32),
        ListValue::Float64(items) => primitive_items!(builder, items, f64),
        ListValue::Enum(items) => primitive_items!(builder, items, u16),
        ListValue::Text(items) => {
            let mut out = builder.initn_as::<text_list::Builder>(items.len() as u32);
            for (i, item) in items.iter().enumerate() {
                out.set(i as u32, capnp::text::Reader::from(item.as_str()));
            }
        }
        ListValue::Data(items) => {
            let mut out = builder.initn_as::<capnp::data_list::Builder>(items.len() as u32);
            for (i, item) in items.iter().enumerate() {
                out.set(i as u32, item.as_slice());
            }
        }
    }
    Ok(())
}

fn write_source_info(info: &SourceInfo, mut builder: node::source_info::Builder) {
    builder.set_id(info.id);
    if let Some(doc) = &info.doc_comment {
        builder.set_doc_comment(doc.as_str());
    }
    let mut members = builder.init_members(info.members.len() as u32);
    for (i, member) in info.members.iter().enumerate() {
        if let Some(doc) = member {
            members.reborrow().get(i as u32).set_doc_comment(doc.as_str());
        }
    }
}

fn write_requested_file(file: &RequestedFile, mut builder: code_generator_request::requested_file::Builder) {
    builder.set_id(file.id);
    builder.set_filename(file.filename.as_str());

    {
        let mut imports = builder.reborrow().init_imports(file.imports.len() as u32);
        for (i, import) in file.imports.iter().enumerate() {
            let mut entry = imports.reborrow().get(i as u32);
            entry.set_id(import.id);
            entry.set_name(import.name.as_str());
        }
    }

    let mut identifiers = builder
        .init_file_source_info()
        .init_identifiers(file.resolutions.len() as u32);
    for (i, resolution) in file.resolutions.iter().enumerate() {
        let mut identifier = identifiers.reborrow().get(i as u32);
        identifier.set_start_byte(resolution.start_byte);
        identifier.set_end_byte(resolution.end_byte);
        match resolution.target {
            ResolutionTarget::Type { type_id } => identifier.set_type_id(type_id),
            ResolutionTarget::Member {
                parent_type_id,
                ordinal,
            } => {
                let mut member = identifier.init_member();
                member.set_parent_type_id(parent_type_id);
                member.set_ordinal(ordinal);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capnp::message::ReaderOptions;
    use capnp_schema_compiler::schema::{
        AnnotationTargets, EnumerantNode, NestedNode, StructNode, NO_DISCRIMINANT,
    };

    fn read(bytes: &[u8]) -> capnp::message::Reader<serialize::OwnedSegments> {
        serialize::read_message(&mut &bytes[..], ReaderOptions::new()).unwrap()
    }

    fn file_node() -> Node {
        Node {
            id: 0xbf5147cbbecf40c1,
            display_name: "index.capnp".to_string(),
            display_name_prefix_length: 0,
            scope_id: 0,
            nested_nodes: vec![NestedNode {
                name: "Color".to_string(),
                id: 0x9d1f3bcb2d1c9e6a,
            }],
            annotations: Vec::new(),
            kind: NodeKind::File,
        }
    }

    fn enum_node() -> Node {
        Node {
            id: 0x9d1f3bcb2d1c9e6a,
            display_name: "index.capnp:Color".to_string(),
            display_name_prefix_length: 12,
            scope_id: 0xbf5147cbbecf40c1,
            nested_nodes: Vec::new(),
            annotations: Vec::new(),
            kind: NodeKind::Enum(vec![
                EnumerantNode {
                    name: "red".to_string(),
                    code_order: 0,
                    annotations: Vec::new(),
                },
                EnumerantNode {
                    name: "green".to_string(),
                    code_order: 1,
                    annotations: Vec::new(),
                },
            ]),
        }
    }

    #[test]
    fn request_header_and_nodes() {
        let file = file_node();
        let color = enum_node();
        let version = CompilerVersion { major: 1, minor: 2, micro: 3 };
        let bytes = encode_request(version, &[&file, &color], &[], &[]).unwrap();

        let message = read(&bytes);
        let request = message.get_root::<code_generator_request::Reader>().unwrap();
        let capnp_version = request.get_capnp_version().unwrap();
        assert_eq!(capnp_version.get_major(), 1);
        assert_eq!(capnp_version.get_minor(), 2);
        assert_eq!(capnp_version.get_micro(), 3);

        let nodes = request.get_nodes().unwrap();
        assert_eq!(nodes.len(), 2);
        let file_reader = nodes.get(0);
        assert_eq!(file_reader.get_id(), 0xbf5147cbbecf40c1);
        assert!(matches!(file_reader.which().unwrap(), node::Which::File(())));
        assert_eq!(file_reader.get_nested_nodes().unwrap().len(), 1);

        let color_reader = nodes.get(1);
        assert_eq!(color_reader.get_display_name().unwrap().to_str().unwrap(), "index.capnp:Color");
        assert_eq!(color_reader.get_scope_id(), 0xbf5147cbbecf40c1);
        match color_reader.which().unwrap() {
            node::Which::Enum(group) => {
                let enumerants = group.get_enumerants().unwrap();
                assert_eq!(enumerants.len(), 2);
                assert_eq!(enumerants.get(1).get_name().unwrap().to_str().unwrap(), "green");
            }
            _ => panic!("expected an enum node"),
        }
        assert_eq!(request.get_requested_files().unwrap().len(), 0);
    }

    #[test]
    fn struct_fields_and_defaults() {
        let point = Node {
            id: 0xa2b1c3d4e5f60718,
            display_name: "index.capnp:Point".to_string(),
            display_name_prefix_length: 12,
            scope_id: 0xbf5147cbbecf40c1,
            nested_nodes: Vec::new(),
            annotations: Vec::new(),
            kind: NodeKind::Struct(StructNode {
                data_word_count: 1,
                pointer_count: 1,
                discriminant_count: 0,
                discriminant_offset: 0,
                fields: vec![
                    FieldNode {
                        name: "x".to_string(),
                        code_order: 0,
                        annotations: Vec::new(),
                        discriminant_value: NO_DISCRIMINANT,
                        offset: 0,
                        ty: Type::Int32,
                        default_value: Value::Int32(-7),
                        had_explicit_default: true,
                        ordinal: 0,
                    },
                    FieldNode {
                        name: "tags".to_string(),
                        code_order: 1,
                        annotations: Vec::new(),
                        discriminant_value: NO_DISCRIMINANT,
                        offset: 0,
                        ty: Type::List(Box::new(Type::Text)),
                        default_value: Value::List(Some(ListValue::Text(vec![
                            "a".to_string(),
                            "b".to_string(),
                        ]))),
                        had_explicit_default: true,
                        ordinal: 1,
                    },
                ],
            }),
        };
        let bytes = encode_request(CompilerVersion::default(), &[&point], &[], &[]).unwrap();
        let message = read(&bytes);
        let request = message.get_root::<code_generator_request::Reader>().unwrap();
        let point_reader = request.get_nodes().unwrap().get(0);
        let node::Which::Struct(layout) = point_reader.which().unwrap() else {
            panic!("expected a struct node");
        };
        assert_eq!(layout.get_data_word_count(), 1);
        assert_eq!(layout.get_pointer_count(), 1);
        let fields = layout.get_fields().unwrap();
        assert_eq!(fields.len(), 2);

        let x = fields.get(0);
        assert_eq!(x.get_discriminant_value(), NO_DISCRIMINANT);
        assert!(matches!(x.get_ordinal().which().unwrap(), field::ordinal::Which::Explicit(0)));
        let field::Which::Slot(slot) = x.which().unwrap() else {
            panic!("expected a slot field");
        };
        assert!(slot.get_had_explicit_default());
        assert!(matches!(slot.get_type().unwrap().which().unwrap(), type_::Which::Int32(())));
        assert!(matches!(
            slot.get_default_value().unwrap().which().unwrap(),
            value::Which::Int32(-7)
        ));

        let field::Which::Slot(tags) = fields.get(1).which().unwrap() else {
            panic!("expected a slot field");
        };
        let value::Which::List(list) = tags.get_default_value().unwrap().which().unwrap() else {
            panic!("expected a list value");
        };
        let texts = list.get_as::<text_list::Reader>().unwrap();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts.get(1).unwrap().to_str().unwrap(), "b");
    }

    #[test]
    fn annotation_targets_are_flags() {
        let mut targets = AnnotationTargets::default();
        targets.insert(AnnotationTarget::Field);
        targets.insert(AnnotationTarget::Enumerant);
        let marker = Node {
            id: 0xe0a1b2c3d4e5f607,
            display_name: "index.capnp:marker".to_string(),
            display_name_prefix_length: 12,
            scope_id: 0xbf5147cbbecf40c1,
            nested_nodes: Vec::new(),
            annotations: Vec::new(),
            kind: NodeKind::Annotation {
                ty: Type::Text,
                targets,
            },
        };
        let bytes = encode_request(CompilerVersion::default(), &[&marker], &[], &[]).unwrap();
        let message = read(&bytes);
        let request = message.get_root::<code_generator_request::Reader>().unwrap();
        let node::Which::Annotation(group) = request.get_nodes().unwrap().get(0).which().unwrap()
        else {
            panic!("expected an annotation node");
        };
        assert!(group.get_targets_field());
        assert!(group.get_targets_enumerant());
        assert!(!group.get_targets_struct());
        assert!(matches!(group.get_type().unwrap().which().unwrap(), type_::Which::Text(())));
    }

    #[test]
    fn requested_file_carries_imports_and_identifiers() {
        let file = RequestedFile {
            id: 0xbf5147cbbecf40c1,
            filename: "index.capnp".to_string(),
            imports: vec![Import {
                id: 0xc0ffee0000000001,
                name: "other.capnp".to_string(),
            }],
            resolutions: vec![
                Resolution {
                    start_byte: 30,
                    end_byte: 35,
                    target: ResolutionTarget::Type { type_id: 0x9d1f3bcb2d1c9e6a },
                },
                Resolution {
                    start_byte: 40,
                    end_byte: 43,
                    target: ResolutionTarget::Member {
                        parent_type_id: 0x9d1f3bcb2d1c9e6a,
                        ordinal: 1,
                    },
                },
            ],
        };
        let info = SourceInfo {
            id: 0x9d1f3bcb2d1c9e6a,
            doc_comment: Some("Colors.\n".to_string()),
            members: vec![None, Some("Green.\n".to_string())],
        };
        let bytes =
            encode_request(CompilerVersion::default(), &[], &[&info], &[file]).unwrap();
        let message = read(&bytes);
        let request = message.get_root::<code_generator_request::Reader>().unwrap();

        let source_info = request.get_source_info().unwrap();
        assert_eq!(source_info.len(), 1);
        let info_reader = source_info.get(0);
        assert_eq!(info_reader.get_doc_comment().unwrap().to_str().unwrap(), "Colors.\n");
        let members = info_reader.get_members().unwrap();
        assert!(!members.get(0).has_doc_comment());
        assert_eq!(members.get(1).get_doc_comment().unwrap().to_str().unwrap(), "Green.\n");

        let requested = request.get_requested_files().unwrap();
        assert_eq!(requested.len(), 1);
        let file_reader = requested.get(0);
        assert_eq!(file_reader.get_filename().unwrap().to_str().unwrap(), "index.capnp");
        let imports = file_reader.get_imports().unwrap();
        assert_eq!(imports.get(0).get_id(), 0xc0ffee0000000001);

        let identifiers = file_reader
            .get_file_source_info()
            .unwrap()
            .get_identifiers()
            .unwrap();
        assert_eq!(identifiers.len(), 2);
        let first = identifiers.get(0);
        assert_eq!((first.get_start_byte(), first.get_end_byte()), (30, 35));
        assert!(matches!(
            first.which().unwrap(),
            code_generator_request::requested_file::file_source_info::identifier::Which::TypeId(0x9d1f3bcb2d1c9e6a)
        ));
        match identifiers.get(1).which().unwrap() {
            code_generator_request::requested_file::file_source_info::identifier::Which::Member(member) => {
                assert_eq!(member.get_parent_type_id(), 0x9d1f3bcb2d1c9e6a);
                assert_eq!(member.get_ordinal(), 1);
            }
            _ => panic!("expected a member identifier"),
        }
    }

    #[test]
    fn base64url_has_no_padding() {
        assert_eq!(encode_base64url(&[0xfb, 0xff]), "-_8");
        assert_eq!(encode_base64url(b""), "");
    }
}
