//! Interactive line loop.
//!
//! Each submission is parsed and evaluated against one long-lived
//! environment. A submission whose lowercased text contains more `begin`
//! than `end` occurrences keeps reading under a continuation prompt until
//! the counts balance.

use crate::evaluator;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::value::{Environment, Value};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() -> rustyline::Result<()> {
    println!("ABC Language v{}", VERSION);
    println!("An English-like programming language");
    println!("Type your code below. Press Ctrl+C to exit.");
    println!();

    let mut editor = DefaultEditor::new()?;
    let env = Environment::new();

    loop {
        match editor.readline("abc> ") {
            Ok(line) => {
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&line);

                let source = if needs_more_input(&line) {
                    read_continuation(&mut editor, line)
                } else {
                    line
                };

                run_submission(&source, &env);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("readline error: {}", err);
                break;
            }
        }
    }

    Ok(())
}

fn run_submission(source: &str, env: &std::sync::Arc<Environment>) {
    let mut parser = Parser::new(Lexer::new(source));
    let program = parser.parse_program();

    if !parser.errors().is_empty() {
        println!("Parser errors:");
        for msg in parser.errors() {
            println!("  {}", msg);
        }
        return;
    }

    match evaluator::eval_program(&program, env) {
        Ok(Value::Null) => {}
        Ok(value) => println!("{}", value),
        Err(e) => println!("ERROR: {}", e),
    }
}

fn needs_more_input(line: &str) -> bool {
    let lowered = line.to_lowercase();
    count_occurrences(&lowered, "begin") > count_occurrences(&lowered, "end")
}

/// Reads continuation lines until the begin/end counts balance.
fn read_continuation(editor: &mut DefaultEditor, first_line: String) -> String {
    let mut buffer = first_line;
    buffer.push('\n');

    let lowered = buffer.to_lowercase();
    let mut begins = count_occurrences(&lowered, "begin");
    let mut ends = count_occurrences(&lowered, "end");

    while begins > ends {
        match editor.readline("...> ") {
            Ok(line) => {
                let lowered = line.to_lowercase();
                begins += count_occurrences(&lowered, "begin");
                ends += count_occurrences(&lowered, "end");
                buffer.push_str(&line);
                buffer.push('\n');
            }
            Err(_) => break,
        }
    }

    buffer
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
