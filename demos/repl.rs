use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use schemecore::scheme::parse_program_with_config;
use schemecore::{Outcome, Session};
use std::io::{self, Write};
use std::panic;
use std::process;

fn main() {
    env_logger::init();

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn run_repl() {
    println!("schemecore: exact-arithmetic Scheme");
    println!("Enter S-expressions like: (+ 1/2 1/3)");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Could not initialize REPL: {err}");
            process::exit(1);
        }
    };
    let mut session = Session::new();
    let mut stdout = io::stdout();
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "scheme> " } else { "   ...> " };
        match rl.readline(prompt) {
            Ok(line) => {
                if buffer.is_empty() {
                    let command = line.trim();
                    if command.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(command);

                    match command {
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(&session);
                            continue;
                        }
                        ":quit" | ":exit" => {
                            finish(&mut session, &mut stdout);
                            break;
                        }
                        _ => {}
                    }
                } else {
                    let _ = rl.add_history_entry(line.trim());
                }

                buffer.push_str(&line);
                buffer.push('\n');
                if needs_more_input(&buffer) {
                    continue;
                }
                let source = std::mem::take(&mut buffer);

                let program = match parse_program_with_config(&source, &session.config().parse) {
                    Ok(program) => program,
                    Err(e) => {
                        println!("Error: {e}");
                        continue;
                    }
                };
                for syntax in &program {
                    match session.feed(syntax, &mut stdout) {
                        Ok(Outcome::Print(value)) => println!("{value}"),
                        Ok(Outcome::Deferred | Outcome::Quiet) => {}
                        Ok(Outcome::Exit) => break,
                        Err(e) => println!("Error: {e}"),
                    }
                }
                let _ = stdout.flush();
                if session.is_terminated() {
                    println!("Goodbye!");
                    break;
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                finish(&mut session, &mut stdout);
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

/// Bind any pending defines before leaving, so their errors are reported
fn finish(session: &mut Session, stdout: &mut io::Stdout) {
    if let Err(e) = session.flush(stdout) {
        println!("Error: {e}");
    }
    println!("Goodbye!");
}

/// Whether the buffered text still has unclosed parentheses or an open string
fn needs_more_input(source: &str) -> bool {
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut chars = source.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if in_string => {
                chars.next();
            }
            '"' => in_string = !in_string,
            ';' if !in_string => {
                // skip the comment up to the end of line
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth -= 1,
            _ => {}
        }
    }
    in_string || depth > 0
}

fn print_help() {
    println!("Commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+D     - Exit the interpreter");
    println!();
    println!("Top-level defines are bound as a group when the next other form runs,");
    println!("so procedures defined one after another may call each other.");
    println!();
    println!("Examples:");
    println!("  (+ 1/2 1/3)");
    println!("  (define (fact n) (if (= n 0) 1 (* n (fact (- n 1)))))");
    println!("  (fact 10)");
    println!("  (let ((p (cons 1 2))) (set-car! p 9) p)");
    println!("  (display \"hello\")");
    println!();
}

fn print_environment(session: &Session) {
    let bindings = session.env().get_all_bindings();
    let pending: Vec<&str> = session.pending_names().collect();

    if bindings.is_empty() && pending.is_empty() {
        println!("Environment is empty.");
        return;
    }

    if !bindings.is_empty() {
        println!("Environment bindings ({} total):", bindings.len());
        for (name, value) in bindings {
            println!("  {name} = {value}");
        }
    }
    if !pending.is_empty() {
        println!("Pending definitions: {}", pending.join(" "));
    }
}
