//! `holon`: a minimal line-at-a-time driver for exercising the evaluator
//! core end to end. Grounded on the teacher's `ouros-cli`/`ouros-repl` (thin
//! binaries that just own I/O and wire a runner together) for the overall
//! file-vs-interactive split; neither binary pulls in `clap` or a line
//! editor (`ouros-repl`'s interactive loop reads raw stdin lines by hand),
//! so the argument parsing and line-editing crates here are this driver's
//! own additions rather than something lifted from a pack source file.
//!
//! This binary is not part of the evaluator's contract (spec §1: the
//! reader, concrete built-ins, and a host CLI are all out of scope for the
//! core crate); it exists only so the crate has something runnable.

mod builtins;
mod parser;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use holon_core::{
    eval, ArrayFeed, Cell, Engine, EntryFlags, EvalError, EvalTracer, Fault, NoLimitTracker, NoopTracer, PathActor,
    SeriesRef, StderrTracer,
};

use parser::SymbolTable;

#[derive(Parser, Debug)]
#[command(name = "holon", about = "Minimal REPL driver for the holon evaluator core")]
struct Args {
    /// Path to a file of newline-separated program lines to run instead of
    /// starting an interactive session.
    file: Option<std::path::PathBuf>,

    /// Trace every evaluator step to stderr via `StderrTracer`.
    #[arg(long)]
    trace: bool,
}

/// Paths are out of scope for this demo driver's tiny textual notation; any
/// attempt to actually walk one at runtime (e.g. a function reached through
/// a path) is rejected rather than silently misinterpreted.
#[derive(Debug)]
struct NoPathActor;
impl PathActor for NoPathActor {
    fn select(&self, _base: &Cell, _selector: &Cell) -> Result<Cell, EvalError> {
        Err(EvalError::new(Fault::NoValue).with_detail("this driver does not support path selection"))
    }
    fn select_set(&self, _base: &Cell, _selector: &Cell, _value: Cell) -> Result<(), EvalError> {
        Err(EvalError::new(Fault::NoValue).with_detail("this driver does not support path selection"))
    }
}

fn run_line(
    line: &str,
    engine: &mut Engine<'_>,
    symbols: &mut SymbolTable,
    top_level: holon_core::ContextId,
) -> Result<Cell, String> {
    let cells = parser::parse_line(line, symbols, top_level).map_err(|e| e.to_string())?;
    if cells.is_empty() {
        return Ok(Cell::void());
    }
    let array = holon_core::ArrayData::new(cells);
    let feed = ArrayFeed::new(SeriesRef::new(array, 0), Some(top_level));
    eval(engine, Box::new(feed), EntryFlags::TO_END).map_err(|e| e.to_string())
}

fn describe_result(cell: &Cell) -> String {
    match cell.payload() {
        holon_core::Payload::Integer(v) => format!("== {v}"),
        holon_core::Payload::Decimal(v) => format!("== {v}"),
        holon_core::Payload::Logic(v) => format!("== {v}"),
        _ if cell.is_void() => "== ; void".to_owned(),
        _ => format!("== <{:?}>", cell.kind()),
    }
}

fn main() {
    let args = Args::parse();

    let actor = NoPathActor;
    let mut resources = NoLimitTracker;
    let mut noop_tracer = NoopTracer;
    let mut stderr_tracer = StderrTracer;
    let tracer: &mut dyn EvalTracer = if args.trace { &mut stderr_tracer } else { &mut noop_tracer };

    let mut engine = Engine::new(&actor, &mut resources, tracer);
    let mut symbols = SymbolTable::new();
    let top_level = builtins::install(engine.contexts_mut(), &mut symbols);

    if let Some(path) = &args.file {
        run_file(path, &mut engine, &mut symbols, top_level);
        return;
    }

    run_repl(&mut engine, &mut symbols, top_level);
}

fn run_file(path: &std::path::Path, engine: &mut Engine<'_>, symbols: &mut SymbolTable, top_level: holon_core::ContextId) {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            eprintln!("holon: cannot read {}: {err}", path.display());
            std::process::exit(1);
        }
    };

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match run_line(line, engine, symbols, top_level) {
            Ok(result) => println!("{}", describe_result(&result)),
            Err(message) => eprintln!("** error: {message}"),
        }
    }
}

fn run_repl(engine: &mut Engine<'_>, symbols: &mut SymbolTable, top_level: holon_core::ContextId) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("holon: could not start line editor: {err}");
            std::process::exit(1);
        }
    };

    println!("holon REPL — Ctrl-D to exit");
    loop {
        match editor.readline(">> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                match run_line(&line, engine, symbols, top_level) {
                    Ok(result) => println!("{}", describe_result(&result)),
                    Err(message) => eprintln!("** error: {message}"),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("holon: readline error: {err}");
                break;
            }
        }
    }
}
