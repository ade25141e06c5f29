// Decodes a bridge payload back into a CodeGeneratorRequest and summarizes it.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use capnp::message::ReaderOptions;
use capnp::serialize;
use serde_json::json;

use crate::codegen_capnp::{code_generator_request, node};
use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSummary {
    pub id: u64,
    pub display_name: String,
    pub kind: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub id: u64,
    pub filename: String,
    pub imports: Vec<String>,
    pub identifiers: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSummary {
    pub version: (u16, u8, u8),
    pub nodes: Vec<NodeSummary>,
    pub source_info: u32,
    pub requested_files: Vec<FileSummary>,
}

/// Raw message bytes from a payload, with or without the `Ok` line in front.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>> {
    let trimmed = payload.trim();
    let body = match trimmed.split_once('\n') {
        Some(("Ok", rest)) => rest.trim(),
        Some(("Err", rest)) => {
            return Err(BridgeError::MalformedOutput(format!(
                "compile failed:\n{}",
                rest
            )))
        }
        _ if trimmed == "Err" => {
            return Err(BridgeError::MalformedOutput("compile failed".to_string()))
        }
        _ => trimmed,
    };
    Ok(URL_SAFE_NO_PAD.decode(body)?)
}

/// Read a serialized CodeGeneratorRequest.
pub fn summarize(bytes: &[u8]) -> Result<RequestSummary> {
    let message = serialize::read_message(&mut &bytes[..], ReaderOptions::new())?;
    let request = message.get_root::<code_generator_request::Reader>()?;

    let capnp_version = request.get_capnp_version()?;
    let version = (
        capnp_version.get_major(),
        capnp_version.get_minor(),
        capnp_version.get_micro(),
    );

    let mut nodes = Vec::new();
    for node in request.get_nodes()?.iter() {
        let kind = match node.which()? {
            node::Which::File(()) => "file",
            node::Which::Struct(_) => "struct",
            node::Which::Enum(_) => "enum",
            node::Which::Interface(_) => "interface",
            node::Which::Const(_) => "const",
            node::Which::Annotation(_) => "annotation",
        };
        nodes.push(NodeSummary {
            id: node.get_id(),
            display_name: node.get_display_name()?.to_str()?.to_string(),
            kind,
        });
    }

    let mut requested_files = Vec::new();
    for file in request.get_requested_files()?.iter() {
        let mut imports = Vec::new();
        for import in file.get_imports()?.iter() {
            imports.push(import.get_name()?.to_str()?.to_string());
        }
        let identifiers = if file.has_file_source_info() {
            file.get_file_source_info()?.get_identifiers()?.len()
        } else {
            0
        };
        requested_files.push(FileSummary {
            id: file.get_id(),
            filename: file.get_filename()?.to_str()?.to_string(),
            imports,
            identifiers,
        });
    }

    Ok(RequestSummary {
        version,
        nodes,
        source_info: request.get_source_info()?.len(),
        requested_files,
    })
}

pub fn inspect_payload(payload: &str) -> Result<RequestSummary> {
    let bytes = decode_payload(payload)?;
    summarize(&bytes)
}

impl RequestSummary {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "capnpVersion": format!("{}.{}.{}", self.version.0, self.version.1, self.version.2),
            "nodes": self.nodes.iter().map(|node| json!({
                "id": format!("0x{:016x}", node.id),
                "displayName": node.display_name,
                "kind": node.kind,
            })).collect::<Vec<_>>(),
            "sourceInfo": self.source_info,
            "requestedFiles": self.requested_files.iter().map(|file| json!({
                "id": format!("0x{:016x}", file.id),
                "filename": file.filename,
                "imports": file.imports,
                "identifiers": file.identifiers,
            })).collect::<Vec<_>>(),
        })
    }
}

impl fmt::Display for RequestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CodeGeneratorRequest")?;
        writeln!(
            f,
            "  Capnp version: {}.{}.{}",
            self.version.0, self.version.1, self.version.2
        )?;
        writeln!(f, "  Nodes: {}", self.nodes.len())?;
        for node in &self.nodes {
            writeln!(f, "    @0x{:016x} {:<10} {}", node.id, node.kind, node.display_name)?;
        }
        writeln!(f, "  Source info entries: {}", self.source_info)?;
        write!(f, "  Requested files: {}", self.requested_files.len())?;
        for file in &self.requested_files {
            write!(
                f,
                "\n    @0x{:016x} {} (imports: {}, identifiers: {})",
                file.id,
                file.filename,
                file.imports.len(),
                file.identifiers
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::single_file::compile_single_file;

    #[test]
    fn summary_of_compiled_schema() {
        let output = compile_single_file(
            "@0xbf5147cbbecf40c1;\n\
             enum Color { red @0; green @1; }\n\
             struct Paint { color @0 :Color; }\n",
        );
        let summary = inspect_payload(&output).unwrap();
        assert_eq!(summary.version, (1, 1, 0));
        let kinds: Vec<(&str, &str)> = summary
            .nodes
            .iter()
            .map(|node| (node.display_name.as_str(), node.kind))
            .collect();
        assert_eq!(kinds.len(), 3);
        assert!(kinds.contains(&("index.capnp", "file")));
        assert!(kinds.contains(&("index.capnp:Color", "enum")));
        assert!(kinds.contains(&("index.capnp:Paint", "struct")));
        assert_eq!(summary.requested_files.len(), 1);
        assert_eq!(summary.requested_files[0].filename, "index.capnp");
        assert_eq!(summary.requested_files[0].identifiers, 1);

        let text = summary.to_string();
        assert!(text.contains("Nodes: 3"));
        assert_eq!(summary.to_json()["requestedFiles"][0]["filename"], "index.capnp");
    }

    #[test]
    fn payload_without_prefix_is_accepted() {
        let output = compile_single_file("@0xbf5147cbbecf40c1;\n");
        let bare = output.strip_prefix("Ok\n").unwrap();
        assert_eq!(decode_payload(bare).unwrap(), decode_payload(&output).unwrap());
    }

    #[test]
    fn error_output_is_rejected() {
        let err = decode_payload("Err\n1:1 File does not declare an ID.").unwrap_err();
        assert!(matches!(err, BridgeError::MalformedOutput(_)));
    }

    #[test]
    fn garbage_is_a_base64_error() {
        assert!(matches!(decode_payload("***"), Err(BridgeError::Base64(_))));
    }
}
