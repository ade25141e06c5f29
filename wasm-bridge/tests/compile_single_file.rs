// End-to-end tests of the single-file compile: text in, Ok/Err string out,
// payload decoded back into a CodeGeneratorRequest.

use capnp::message::ReaderOptions;
use capnp::serialize;

use capnp_schema_compiler::schema::{Import, Node, Resolution, SourceInfo, TypeId};
use capnp_schema_compiler::{Eagerness, ErrorReporter, ReadableDirectory, SourcePos};
use capnp_wasm_bridge::codegen_capnp::code_generator_request;
use capnp_wasm_bridge::codegen_capnp::code_generator_request::requested_file::file_source_info::identifier;
use capnp_wasm_bridge::codegen_capnp::node;
use capnp_wasm_bridge::inspect::decode_payload;
use capnp_wasm_bridge::{
    compile, compile_single_file, compile_with, BridgeConfig, CompileResult, SchemaBackend,
};

const FILE_ID: u64 = 0xbf5147cbbecf40c1;

const SCHEMA: &str = "@0xbf5147cbbecf40c1;

annotation label (struct, field) :Text;

enum Color {
  red @0;
  green @1;
}

const defaultColor :Color = green;

struct Foo $label(\"foo\") {
  color @0 :Color = red;
  name @1 :Text;
  inner @2 :Inner;

  struct Inner {
    value @0 :Int64;
  }
}
";

fn read_request(output: &str) -> capnp::message::Reader<serialize::OwnedSegments> {
    let bytes = decode_payload(output).expect("payload decodes");
    serialize::read_message(&mut &bytes[..], ReaderOptions::new()).expect("message reads")
}

fn node_names(request: code_generator_request::Reader) -> Vec<String> {
    let mut names: Vec<String> = request
        .get_nodes()
        .unwrap()
        .iter()
        .map(|node| node.get_display_name().unwrap().to_str().unwrap().to_string())
        .collect();
    names.sort();
    names
}

fn error_lines(output: &str) -> Vec<&str> {
    let mut lines = output.lines();
    assert_eq!(lines.next(), Some("Err"), "expected an error: {}", output);
    lines.collect()
}

#[test]
fn test_accepted_schema_round_trips() {
    let output = compile_single_file(SCHEMA);
    assert!(output.starts_with("Ok\n"), "{}", output);
    assert!(!output.contains('='));
    assert!(!output.contains('+'));
    assert!(!output.contains('/'));

    let message = read_request(&output);
    let request = message.get_root::<code_generator_request::Reader>().unwrap();

    assert_eq!(
        node_names(request),
        vec![
            "index.capnp",
            "index.capnp:Color",
            "index.capnp:Foo",
            "index.capnp:Foo.Inner",
            "index.capnp:defaultColor",
            "index.capnp:label",
        ]
    );
    assert_eq!(request.get_source_info().unwrap().len(), 6);

    let files = request.get_requested_files().unwrap();
    assert_eq!(files.len(), 1);
    let file = files.get(0);
    assert_eq!(file.get_id(), FILE_ID);
    assert_eq!(file.get_filename().unwrap().to_str().unwrap(), "index.capnp");
    assert_eq!(file.get_imports().unwrap().len(), 0);

    let color_id = request
        .get_nodes()
        .unwrap()
        .iter()
        .find(|node| node.get_display_name().unwrap().to_str().unwrap() == "index.capnp:Color")
        .map(|node| node.get_id())
        .unwrap();

    let identifiers = file.get_file_source_info().unwrap().get_identifiers().unwrap();
    let mut saw_type = false;
    let mut saw_green = false;
    for ident in identifiers.iter() {
        assert!(ident.get_start_byte() < ident.get_end_byte());
        assert!((ident.get_end_byte() as usize) <= SCHEMA.len());
        match ident.which().unwrap() {
            identifier::Which::TypeId(id) if id == color_id => {
                let start = ident.get_start_byte() as usize;
                let end = ident.get_end_byte() as usize;
                assert_eq!(&SCHEMA[start..end], "Color");
                saw_type = true;
            }
            identifier::Which::Member(member) => {
                if member.get_parent_type_id() == color_id && member.get_ordinal() == 1 {
                    saw_green = true;
                }
            }
            _ => {}
        }
    }
    assert!(saw_type, "no type resolution for Color");
    assert!(saw_green, "no member resolution for Color.green");
}

#[test]
fn test_struct_layout_in_payload() {
    let message = read_request(&compile_single_file(SCHEMA));
    let request = message.get_root::<code_generator_request::Reader>().unwrap();
    let foo = request
        .get_nodes()
        .unwrap()
        .iter()
        .find(|node| node.get_display_name().unwrap().to_str().unwrap() == "index.capnp:Foo")
        .unwrap();

    assert_eq!(foo.get_scope_id(), FILE_ID);
    assert_eq!(foo.get_annotations().unwrap().len(), 1);
    assert_eq!(foo.get_nested_nodes().unwrap().len(), 1);
    match foo.which().unwrap() {
        node::Which::Struct(layout) => {
            assert_eq!(layout.get_data_word_count(), 1);
            assert_eq!(layout.get_pointer_count(), 2);
            assert_eq!(layout.get_fields().unwrap().len(), 3);
        }
        _ => panic!("Foo is not a struct"),
    }
}

#[test]
fn test_diagnostics_one_line_each() {
    let output = compile_single_file(
        "@0xbf5147cbbecf40c1;\nstruct Foo {\n  a @0 :Missing;\n  b @2 :Text;\n}\n",
    );
    let lines = error_lines(&output);
    assert_eq!(lines.len(), 2, "{}", output);
    assert!(lines.contains(&"3:9 Not defined: Missing"));
    assert!(lines.contains(&"4:5 Skipped ordinal @1.  Ordinals must be sequential with no holes."));
}

#[test]
fn test_syntax_error_is_reported() {
    let output = compile_single_file("@0xbf5147cbbecf40c1;\nstruct Foo {\n  a @0 Int32;\n}\n");
    let lines = error_lines(&output);
    assert!(!lines.is_empty());
    assert!(lines[0].starts_with("3:"), "{}", output);
}

#[test]
fn test_missing_import_is_reported() {
    let output = compile_single_file(
        "@0xbf5147cbbecf40c1;\nusing Other = import \"other.capnp\";\nstruct Foo {\n  a @0 :Other.Thing;\n}\n",
    );
    let lines = error_lines(&output);
    assert!(
        lines.iter().any(|line| line.ends_with("Import failed: other.capnp")),
        "{}",
        output
    );
}

#[test]
fn test_empty_input_is_an_error() {
    let output = compile_single_file("");
    let lines = error_lines(&output);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("1:1 File does not declare an ID."));
}

#[test]
fn test_same_input_same_output() {
    assert_eq!(compile_single_file(SCHEMA), compile_single_file(SCHEMA));

    let broken = "@0xbf5147cbbecf40c1;\nstruct Foo { a @0 :Nope; }\n";
    assert_eq!(compile_single_file(broken), compile_single_file(broken));
}

#[test]
fn test_calls_do_not_share_state() {
    let broken = "@0xbf5147cbbecf40c1;\nstruct Foo { a @0 :Nope; }\n";
    let other = "@0xd3a1b2c3d4e5f607;\nstruct Bar { b @0 :Bool; }\n";

    let first = compile_single_file(broken);
    let ok = compile_single_file(other);
    let again = compile_single_file(broken);
    assert_eq!(first, again);

    let message = read_request(&ok);
    let request = message.get_root::<code_generator_request::Reader>().unwrap();
    assert_eq!(node_names(request), vec!["index.capnp", "index.capnp:Bar"]);
    assert_eq!(request.get_requested_files().unwrap().get(0).get_id(), 0xd3a1b2c3d4e5f607);
}

#[test]
fn test_compile_result_variants() {
    match compile("@0xbf5147cbbecf40c1;\n") {
        CompileResult::Success { payload } => assert!(!payload.is_empty()),
        CompileResult::Error(diagnostics) => panic!("unexpected diagnostics: {:?}", diagnostics),
    }
    match compile("struct {") {
        CompileResult::Error(diagnostics) => assert!(!diagnostics.is_empty()),
        CompileResult::Success { .. } => panic!("expected diagnostics"),
    }
}

/// A backend whose loader never finds the file.
#[derive(Default)]
struct NothingLoaded {
    complain: bool,
}

impl SchemaBackend for NothingLoaded {
    type Module = ();
    type Scope = TypeId;

    fn load_module(
        &mut self,
        dir: &dyn ReadableDirectory,
        path: &str,
        reporter: &dyn ErrorReporter,
    ) -> Option<()> {
        assert!(dir.exists(path));
        if self.complain {
            let pos = SourcePos { byte: 0, line: 1, column: 1 };
            reporter.add_error(path, pos, pos, "Unsupported file.");
        }
        None
    }

    fn add(&mut self, _module: &(), _reporter: &dyn ErrorReporter) -> TypeId {
        unreachable!("nothing was loaded")
    }

    fn scope_id(&self, scope: &TypeId) -> TypeId {
        *scope
    }

    fn source_name(&self, _module: &()) -> String {
        String::new()
    }

    fn eagerly_compile(&mut self, _id: TypeId, _eagerness: Eagerness, _reporter: &dyn ErrorReporter) {
        unreachable!("nothing was loaded")
    }

    fn all_loaded(&self) -> Vec<&Node> {
        Vec::new()
    }

    fn all_source_info(&self) -> Vec<&SourceInfo> {
        Vec::new()
    }

    fn file_import_table(&self, _module: &()) -> Vec<Import> {
        Vec::new()
    }

    fn resolutions(&self, _module: &()) -> Vec<Resolution> {
        Vec::new()
    }
}

#[test]
fn test_nothing_loaded_encodes_empty_request() {
    let result = compile_with(&mut NothingLoaded::default(), "anything", &BridgeConfig::default());
    let output = result.to_output();
    let message = read_request(&output);
    let request = message.get_root::<code_generator_request::Reader>().unwrap();
    assert_eq!(request.get_nodes().unwrap().len(), 0);
    assert_eq!(request.get_requested_files().unwrap().len(), 0);
    assert_eq!(request.get_capnp_version().unwrap().get_major(), 1);
}

#[test]
fn test_nothing_loaded_with_diagnostics_is_an_error() {
    let mut backend = NothingLoaded { complain: true };
    let result = compile_with(&mut backend, "anything", &BridgeConfig::default());
    assert_eq!(result.to_output(), "Err\n1:1 Unsupported file.");
}
