use std::borrow::Cow;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fixlisp::{Environment, TokenKind, evaluate, parse_all, run, tokenize};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};
use tracing_subscriber::EnvFilter;

/// Interactive interpreter for the fixlisp expression language.
#[derive(Parser, Debug)]
#[command(name = "fixlisp-repl", version, about)]
struct Args {
    /// Evaluate one expression, print the result and exit
    #[arg(short, long, value_name = "EXPR")]
    eval: Option<String>,

    /// File the line history is loaded from and saved to
    #[arg(long, value_name = "PATH", default_value = "fixlisp_history.txt")]
    history: PathBuf,

    /// Do not load or save line history
    #[arg(long)]
    no_history: bool,

    /// Use vi key bindings instead of emacs ones
    #[arg(long)]
    vi: bool,
}

struct FixlispCompleter {
    env: Environment,
}

impl rustyline::completion::Completer for FixlispCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let candidates = match tokenize(&line[..pos]) {
            Ok(tokens) => match tokens.last().map(|t| &t.kind) {
                Some(TokenKind::Atom(prefix)) if line[..pos].ends_with(prefix.as_str()) => self
                    .env
                    .identifiers()
                    .into_iter()
                    .filter_map(|id| id.strip_prefix(prefix.as_str()).map(str::to_string))
                    .filter(|rest| !rest.is_empty())
                    .collect(),
                _ => vec![],
            },
            Err(_) => vec![],
        };
        Ok((pos, candidates))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputHelper {
    #[rustyline(Validator)]
    validator: ParenValidator,
    #[rustyline(Highlighter)]
    highlighter: ParenHighlighter,
    #[rustyline(Completer)]
    completer: FixlispCompleter,
}

/// Tracks string state the same way the lexer does: a backslash escapes
/// whatever character follows it.
#[derive(Default)]
struct StringState {
    in_string: bool,
    escape: bool,
}

impl StringState {
    /// Feeds one character; returns true if it belongs to a string literal.
    fn step(&mut self, c: char) -> bool {
        if self.in_string {
            if self.escape {
                self.escape = false;
            } else if c == '\\' {
                self.escape = true;
            } else if c == '"' {
                self.in_string = false;
            }
            true
        } else if c == '"' {
            self.in_string = true;
            true
        } else {
            false
        }
    }
}

struct ParenValidator;

impl Validator for ParenValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let mut depth: usize = 0;
        let mut strings = StringState::default();

        for (i, c) in ctx.input().chars().enumerate() {
            if strings.step(c) {
                continue;
            }
            match c {
                '(' => depth += 1,
                ')' => {
                    if depth == 0 {
                        return Ok(ValidationResult::Invalid(Some(format!(
                            "  - Unmatched ')' at position {}",
                            i
                        ))));
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }

        if strings.in_string || depth > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

struct ParenHighlighter;

impl Highlighter for ParenHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        let mut stack: Vec<usize> = Vec::new();
        let mut highlighted = String::new();
        let mut strings = StringState::default();

        for (i, c) in line.chars().enumerate() {
            if strings.step(c) {
                highlighted.push_str(&format!("\x1b[32m{}\x1b[0m", c)); // Green for strings
                continue;
            }

            match c {
                '(' => {
                    stack.push(highlighted.len());
                    highlighted.push(c);
                }
                ')' => match stack.pop() {
                    Some(matching_pos) if matching_pos + 1 == pos || i + 1 == pos => {
                        highlighted.push_str(&format!("\x1b[34m{}\x1b[0m", c)); // Blue for matching parens
                        highlighted.replace_range(matching_pos..=matching_pos, "\x1b[1;34m(\x1b[0m");
                    }
                    Some(_) => highlighted.push(c),
                    None => highlighted.push_str(&format!("\x1b[31m{}\x1b[0m", c)), // Red for unmatched
                },
                _ => highlighted.push(c),
            }
        }

        Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

/// Logging is only switched on when RUST_LOG is set, e.g. `RUST_LOG=fixlisp=trace`.
fn init_tracing() {
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
    }
}

fn eval_once(source: &str, env: &Environment) -> ExitCode {
    match run(source, env) {
        Ok(value) => {
            println!("{}", value);
            ExitCode::SUCCESS
        }
        Err(err) => {
            err.pretty_print(source);
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn eval_line(line: &str, env: &Environment) {
    let expressions = match parse_all(line) {
        Ok(expressions) => expressions,
        Err(parse_err) => {
            parse_err.pretty_print(line);
            return;
        }
    };
    for expr in expressions {
        match evaluate(&expr, env) {
            Ok(value) => println!("{}", value),
            Err(e) => {
                e.pretty_print(line);
                eprintln!("Error: {}", e);
                return;
            }
        }
    }
}

fn main() -> rustyline::Result<ExitCode> {
    let args = Args::parse();
    init_tracing();

    let global_env = Environment::global();
    if let Some(source) = &args.eval {
        return Ok(eval_once(source, &global_env));
    }

    println!("fixlisp REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let helper = InputHelper {
        highlighter: ParenHighlighter,
        validator: ParenValidator,
        completer: FixlispCompleter {
            env: global_env.clone(),
        },
    };
    let edit_mode = if args.vi {
        rustyline::EditMode::Vi
    } else {
        rustyline::EditMode::Emacs
    };
    let config = rustyline::config::Config::builder()
        .edit_mode(edit_mode)
        .build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(helper));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if !args.no_history && rl.load_history(&args.history).is_err() {
        println!("No previous history.");
    }

    loop {
        match rl.readline("fixlisp> ") {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let trimmed_input = line.trim();
                if trimmed_input.is_empty() {
                    continue;
                }
                if trimmed_input.eq_ignore_ascii_case("exit") {
                    break;
                }
                eval_line(trimmed_input, &global_env);
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    if !args.no_history {
        rl.save_history(&args.history)?;
    }
    Ok(ExitCode::SUCCESS)
}
