use clap::{App, Arg};

// Exit codes for the different stages that can fail
pub const ERR_READ_ERROR: i32 = 1;
pub const ERR_LEXER_ERROR: i32 = 2;
pub const ERR_PARSER_ERROR: i32 = 3;
pub const ERR_SEMANTIC_ERROR: i32 = 4;
pub const ERR_WRITE_ERROR: i32 = 5;

pub fn configure_cli() -> clap::App<'static, 'static> {
    App::new("MiniC Compiler")
        .version("0.1.0")
        .about("Compiles MiniC source files into ARM32 assembly for use with a standard C toolchain")
        .arg(
            Arg::with_name("input")
                .takes_value(true)
                .required(true)
                .help("Source code file to compile"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .help("Name the output file the text will be written to; defaults to stdout"),
        )
        .arg(
            Arg::with_name("asm")
                .short("S")
                .help("Emit assembly text (the default mode)"),
        )
        .arg(
            Arg::with_name("arm32")
                .short("A")
                .help("Select the ARM32 backend"),
        )
        .arg(
            Arg::with_name("emit-ir")
                .short("i")
                .long("emit-ir")
                .help("Print the linear IR instead of assembly"),
        )
        .arg(
            Arg::with_name("show-ir")
                .long("show-ir")
                .help("Echo each IR instruction as a comment above its assembly"),
        )
        .arg(
            Arg::with_name("log")
                .long("log")
                .takes_value(true)
                .possible_values(&["error", "warn", "info", "debug", "trace"])
                .help("Print compiler tracing to stderr at the given level"),
        )
}
