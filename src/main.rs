//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! transpilación y expone una CLI.

use anyhow::{self, Context};
use clap::{crate_version, Arg, Command};
use transpiler::{
    codegen::{self, Options},
    error::{Diagnostics, TranspilerError},
    lex, parse,
    source::Source,
};

use std::{
    fs,
    io::{self, Read, Write},
    process,
};

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = Command::new("pyjs")
        .version(crate_version!())
        .about("Python subset to JavaScript transpiler")
        .arg(
            Arg::new("input")
                .value_name("FILE")
                .help("Source file ('-' or absent for stdin)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .help("Output file ('-' or absent for stdout)"),
        )
        .arg(
            Arg::new("header")
                .long("header")
                .help("Prefix output with a generated-code comment"),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .help("Prefix output with a strict mode directive"),
        )
        .arg(
            Arg::new("tokens")
                .long("tokens")
                .help("Dump the token stream to stderr"),
        )
        .arg(Arg::new("ast").long("ast").help("Dump the AST to stderr"))
        .get_matches();

    // Se extraen argumentos necesarios
    let input = args.value_of("input").unwrap_or("-");
    let output = args.value_of("output").unwrap_or("-");

    let mut options = Options::empty();
    if args.is_present("header") {
        options |= Options::HEADER;
    }

    if args.is_present("strict") {
        options |= Options::STRICT;
    }

    let (name, text) = match input {
        "-" => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read from stdin")?;

            ("<stdin>", text)
        }

        path => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to open for reading: {}", path))?;

            (path, text)
        }
    };

    let dumps = Dumps {
        tokens: args.is_present("tokens"),
        ast: args.is_present("ast"),
    };

    let translated = match transpile(&text, options, dumps) {
        Ok(translated) => translated,
        Err(error) => {
            eprint!("{}", Diagnostics::new(Source::new(name, &text)).error(error));
            process::exit(1);
        }
    };

    match output {
        "-" => io::stdout()
            .write_all(translated.as_bytes())
            .context("Failed to write to stdout")?,

        path => fs::write(path, translated)
            .with_context(|| format!("Failed to write to file: {}", path))?,
    }

    Ok(())
}

/// Volcados de depuración de fases intermedias.
#[derive(Copy, Clone)]
struct Dumps {
    tokens: bool,
    ast: bool,
}

fn transpile(text: &str, options: Options, dumps: Dumps) -> Result<String, TranspilerError> {
    let tokens = lex::tokenize(text)?;
    if dumps.tokens {
        eprintln!("{:#?}", tokens);
    }

    let program = parse::parse(&tokens)?;
    if dumps.ast {
        eprintln!("{:#?}", program);
    }

    Ok(codegen::generate(&program, options)?)
}
