// Generates the CodeGeneratorRequest bindings from schema/codegen.capnp.
// Needs the `capnp` tool on PATH.

fn main() {
    println!("cargo:rerun-if-changed=schema/codegen.capnp");

    capnpc::CompilerCommand::new()
        .src_prefix("schema")
        .file("schema/codegen.capnp")
        .run()
        .expect("compiling schema/codegen.capnp");
}
