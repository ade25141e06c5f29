use clap::{Arg, ArgAction, Command};
use std::fs;
use std::io::{self, Read};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use capnp_wasm_bridge::inspect::inspect_payload;
use capnp_wasm_bridge::{compile_with, BridgeConfig, BridgeError, CompilerVersion};
use capnp_schema_compiler::Compiler;

fn cli() -> Command {
    Command::new("capnp-wasm-bridge")
        .about("Compile a single Cap'n Proto schema file into a base64url CodeGeneratorRequest")
        .subcommand_required(true)
        .arg(
            Arg::new("trace")
                .long("trace")
                .help("Log every compile phase and node at trace level")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("compile")
                .about("Compile a schema file and print Ok/Err output")
                .arg(
                    Arg::new("file")
                        .help("Schema file to compile, '-' for stdin")
                        .required(true)
                        .value_name("FILE"),
                )
                .arg(
                    Arg::new("capnp-version")
                        .long("capnp-version")
                        .help("Compiler version stamped into the request (default: 1.1.0)")
                        .value_name("X.Y.Z"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("out")
                        .help("Write the output here instead of stdout")
                        .value_name("FILE"),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Decode a compile payload and summarize the request")
                .arg(
                    Arg::new("payload")
                        .help("File holding the payload, '-' for stdin")
                        .required(true)
                        .value_name("PAYLOAD"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the summary as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn init_logging(trace: bool) {
    let filter = if trace {
        EnvFilter::new("trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn read_input(path: &str) -> Result<String, BridgeError> {
    if path == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn run_compile(matches: &clap::ArgMatches) -> Result<i32, BridgeError> {
    let mut config = BridgeConfig::default();
    if let Some(version) = matches.get_one::<String>("capnp-version") {
        config = config.with_version(version.parse::<CompilerVersion>()?);
    }

    let path = matches
        .get_one::<String>("file")
        .map(String::as_str)
        .unwrap_or("-");
    let text = read_input(path)?;

    let start = Instant::now();
    let result = compile_with(&mut Compiler::new(), &text, &config);
    tracing::info!(
        path,
        success = result.is_success(),
        ms = start.elapsed().as_millis() as u64,
        "compile finished"
    );

    let output = result.to_output();
    match matches.get_one::<String>("output") {
        Some(out_path) => {
            fs::write(out_path, format!("{}\n", output))?;
            eprintln!("Wrote output -> {}", out_path);
        }
        None => println!("{}", output),
    }
    Ok(if result.is_success() { 0 } else { 1 })
}

fn run_inspect(matches: &clap::ArgMatches) -> Result<i32, BridgeError> {
    let path = matches
        .get_one::<String>("payload")
        .map(String::as_str)
        .unwrap_or("-");
    let payload = read_input(path)?;
    let summary = inspect_payload(&payload)?;

    if matches.get_flag("json") {
        let rendered = serde_json::to_string_pretty(&summary.to_json())
            .map_err(|e| BridgeError::MalformedOutput(e.to_string()))?;
        println!("{}", rendered);
    } else {
        println!("{}", summary);
    }
    Ok(0)
}

fn main() {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("trace"));

    let outcome = match matches.subcommand() {
        Some(("compile", sub)) => run_compile(sub),
        Some(("inspect", sub)) => run_inspect(sub),
        _ => {
            eprintln!("Usage: capnp-wasm-bridge <compile|inspect> ...");
            Ok(1)
        }
    };

    let exit_code = match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };
    std::process::exit(exit_code);
}
