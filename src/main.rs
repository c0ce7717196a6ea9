use abc_lang::evaluator;
use abc_lang::lexer::Lexer;
use abc_lang::parser::Parser;
use abc_lang::repl;
use abc_lang::value::Environment;
use clap::Parser as ClapParser;
use std::fs;
use std::process;

#[derive(ClapParser)]
#[command(name = "abc")]
#[command(about = "ABC - an English-like scripting language with built-in HTTP and JSON support")]
#[command(version)]
struct Cli {
    /// Path to an .abc source file; starts the REPL when omitted
    file: Option<String>,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    match cli.file {
        Some(file) => run_file(&file),
        None => {
            if let Err(e) = repl::run() {
                eprintln!("{}", e);
                process::exit(1);
            }
        }
    }
}

fn run_file(filename: &str) {
    if !filename.ends_with(".abc") {
        println!("Error: ABC files must have .abc extension");
        process::exit(1);
    }

    let source = match fs::read_to_string(filename) {
        Ok(source) => source,
        Err(e) => {
            println!("Error reading file: {}", e);
            process::exit(1);
        }
    };

    let mut parser = Parser::new(Lexer::new(&source));
    let program = parser.parse_program();

    if !parser.errors().is_empty() {
        println!("Parser errors:");
        for msg in parser.errors() {
            println!("  {}", msg);
        }
        process::exit(1);
    }

    let env = Environment::new();
    if let Err(e) = evaluator::eval_program(&program, &env) {
        println!("ERROR: {}", e);
        process::exit(1);
    }
}
