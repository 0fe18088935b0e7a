extern crate log;
extern crate simplelog;

use std::fs;
use std::process::exit;
use std::time::Instant;

use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use minic_lang::cli::*;
use minic_lang::{compile, OutputKind, StageError, StringTable};

fn main() {
    let config = configure_cli().get_matches();

    if let Some(level) = config.value_of("log") {
        configure_logging(level).expect("Failed to configure logger.");
    }

    let input = config
        .value_of("input")
        .expect("Expected an input source file to compile");
    let src = match fs::read_to_string(input) {
        Ok(src) => src,
        Err(e) => {
            eprintln!("Could not read {}: {}", input, e);
            exit(ERR_READ_ERROR);
        }
    };

    let output_kind = if config.is_present("emit-ir") {
        OutputKind::LinearIr
    } else {
        OutputKind::Assembly {
            show_ir: config.is_present("show-ir"),
        }
    };

    let string_table = StringTable::new();

    let compile_time = Instant::now();
    let result = compile(&src, &string_table, output_kind);
    log::info!("compiled in {}s", compile_time.elapsed().as_secs_f32());

    let output = match result {
        Ok(output) => output,
        Err(StageError::Lexer(errs)) => {
            for e in errs {
                eprintln!("{}: {}", input, e);
            }
            exit(ERR_LEXER_ERROR);
        }
        Err(StageError::Parser(e)) => {
            eprintln!("{}: {}", input, e);
            exit(ERR_PARSER_ERROR);
        }
        Err(StageError::Semantic(errs)) => {
            for e in errs {
                eprintln!("{}: {}", input, e.format(&string_table));
            }
            exit(ERR_SEMANTIC_ERROR);
        }
    };

    for w in &output.warnings {
        eprintln!("{}: {}", input, w.format(&string_table));
    }

    match config.value_of("output") {
        Some(path) => {
            if let Err(e) = fs::write(path, &output.text) {
                eprintln!("Could not write {}: {}", path, e);
                exit(ERR_WRITE_ERROR);
            }
        }
        None => print!("{}", output.text),
    }
}

fn configure_logging(level: &str) -> Result<(), log::SetLoggerError> {
    let filter = match level {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    TermLogger::init(
        filter,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
}
