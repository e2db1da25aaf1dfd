use std::io::{self, IsTerminal, Read};

use sprig::eval::Machine;
use sprig::reader;
use sprig::repl::Repl;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut load_files: Vec<String> = Vec::new();
    let mut with_prelude = true;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--load" => {
                if i + 1 < args.len() {
                    load_files.push(args[i + 1].clone());
                    i += 2;
                } else {
                    eprintln!("--load requires a file path");
                    std::process::exit(1);
                }
            }
            "--no-prelude" => {
                with_prelude = false;
                i += 1;
            }
            "--help" | "-h" => {
                println!("Usage: sprig [OPTIONS]");
                println!();
                println!("Options:");
                println!("  --load <file>    Evaluate a source file before starting the REPL");
                println!("  --no-prelude     Skip the bundled standard library");
                println!("  --help, -h       Show this help message");
                println!();
                println!("Environment variables:");
                println!("  SPRIG_TRACE=1    Echo each evaluated form to stderr");
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!("Try 'sprig --help' for usage information.");
                std::process::exit(1);
            }
        }
    }

    let mut machine = Machine::new();
    machine.trace = std::env::var("SPRIG_TRACE").map(|v| v == "1").unwrap_or(false);

    // Bootstrap errors are reported but never prevent the loop from
    // starting; running out of input here is expected, not fatal.
    if with_prelude {
        load_source(&mut machine, sprig::PRELUDE, "prelude");
    }
    for path in &load_files {
        match std::fs::read_to_string(path) {
            Ok(src) => load_source(&mut machine, &src, path),
            Err(e) => {
                eprintln!("Error loading {}: {}", path, e);
                std::process::exit(1);
            }
        }
    }

    if io::stdin().is_terminal() {
        run_interactive(&mut machine);
    } else {
        run_piped(&mut machine);
    }
}

/// Evaluate a source block form by form, reporting each error and
/// continuing with the next form.
fn load_source(machine: &mut Machine, src: &str, origin: &str) {
    let mut pos = 0;
    loop {
        match reader::read_one_at(src, pos, &mut machine.heap, &mut machine.symbols) {
            Ok(Some((form, new_pos))) => {
                pos = new_pos;
                if let Err(e) = machine.eval(&form, machine.globals) {
                    eprintln!("Error in {}: {}", origin, e);
                }
            }
            Ok(None) => break,
            Err(e) => {
                eprintln!("Read error in {}: {}", origin, e);
                break;
            }
        }
    }
}

/// Interactive REPL: accumulate lines until parens balance, then read and
/// evaluate each form. Errors print and the loop continues.
fn run_interactive(machine: &mut Machine) {
    println!("sprig interpreter");
    println!(
        "  {} primitives, {} symbols interned",
        sprig::primitives::PRIMITIVES.len(),
        machine.symbols.count()
    );

    let mut repl = match Repl::new() {
        Ok(repl) => repl,
        Err(e) => {
            eprintln!("Failed to initialize line editor: {}", e);
            return;
        }
    };

    let mut buf = String::new();
    let mut depth: i32 = 0;

    loop {
        let prompt = if depth == 0 { "> " } else { "  " };
        let line = match repl.read_line(prompt) {
            Ok(line) => line,
            Err(_) => break, // EOF or interrupt
        };

        // Naive depth tracking, sufficient for well-formed input.
        for ch in line.chars() {
            match ch {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
        }

        buf.push_str(&line);
        buf.push('\n');

        if depth <= 0 {
            depth = 0;
            let input = buf.trim().to_string();
            buf.clear();

            if input.is_empty() {
                continue;
            }
            repl.add_history(&input);
            eval_and_print(machine, &input);
        }
    }

    repl.finalize();
}

/// Piped mode: read everything, then parse and evaluate one form at a
/// time so each form sees the definitions of the previous ones.
fn run_piped(machine: &mut Machine) {
    let mut input = String::new();
    if io::stdin().read_to_string(&mut input).is_err() {
        eprintln!("Failed to read input");
        return;
    }
    eval_and_print(machine, &input);
}

fn eval_and_print(machine: &mut Machine, input: &str) {
    let mut pos = 0;
    loop {
        match reader::read_one_at(input, pos, &mut machine.heap, &mut machine.symbols) {
            Ok(Some((form, new_pos))) => {
                pos = new_pos;
                match machine.eval(&form, machine.globals) {
                    Ok(val) => println!("{}", machine.print(&val)),
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }
}
