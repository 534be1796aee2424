//! `wisteria`: the precompiler CLI (spec.md §6 "Compiler input/output (CLI
//! precompile)"). Parses and compiles a single template file to IR without
//! rendering it, printing a pretty-printed `Op` tree dump plus the block
//! names discovered, or failing with the contract's exit codes: 0 success,
//! 1 parse/compile error, 2 I/O error.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use wisteria::compiler::{self, CompileOptions};
use wisteria::transform::Transformer;

/// Precompile a Wisteria template to its intermediate representation.
#[derive(Parser, Debug)]
#[command(name = "wisteria")]
#[command(about = "Precompile a Wisteria template and dump its IR", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the template source file.
    file: PathBuf,

    /// Raise an error on undefined variables instead of rendering them empty.
    #[arg(long)]
    throw_on_undefined: bool,

    /// Name of a filter to treat as async when lowering `|` applications
    /// (repeatable).
    #[arg(long = "async-filter", value_name = "NAME")]
    async_filters: Vec<String>,

    /// Name of an extension the compiled template is expected to call
    /// (repeatable). Recorded in the dump; not resolved at compile time,
    /// since extensions are an `Environment`-level, render-time concern.
    #[arg(long = "extension", value_name = "NAME")]
    extensions: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let source = match std::fs::read_to_string(&cli.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("io error reading '{}': {}", cli.file.display(), e);
            return ExitCode::from(2);
        }
    };

    let ast = match wisteria_parser::parse(&source) {
        Ok(ast) => ast,
        Err(e) => {
            eprintln!("parse error: {e}");
            return ExitCode::from(1);
        }
    };

    let async_filters: HashSet<String> = cli.async_filters.iter().cloned().collect();
    let ast = Transformer::new(&async_filters).transform(ast);

    let compiled = match compiler::compile(ast, &CompileOptions { throw_on_undefined: cli.throw_on_undefined }) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("compile error: {e}");
            return ExitCode::from(1);
        }
    };

    if !cli.extensions.is_empty() {
        println!("; extensions: {}", cli.extensions.join(", "));
    }
    println!("{:#?}", compiled.root);
    println!("; blocks:");
    for name in compiled.blocks.keys() {
        println!("{name}");
    }

    ExitCode::SUCCESS
}
