use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use crossterm::style::Stylize;
use reedline::{DefaultPrompt, DefaultPromptSegment, Reedline, Signal, ValidationResult, Validator};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

use scheme_rules::{Error, Interpreter, Options, ParseOptions, Value};

#[derive(Parser, Debug)]
#[command(name = "scheme-rules", version, about = "Interpreter for a small Lisp")]
struct Cli {
    /// Log filter, e.g. `debug` or `scheme_rules=trace`
    #[arg(long, env = "SCHEME_LOG", default_value = "warn")]
    log_level: String,

    /// Write logs to a daily rolling file in this directory instead of stderr
    #[arg(long, env = "SCHEME_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Start without the bundled standard library
    #[arg(long)]
    no_prelude: bool,

    /// Re-run `delay` bodies on every force
    #[arg(long)]
    no_memoize_delay: bool,

    /// Print the syntax tree of each submission as JSON
    #[arg(long)]
    dump_ast: bool,

    /// Evaluate this source and exit
    #[arg(short, long)]
    eval: Option<String>,

    /// Source files loaded before the prompt
    files: Vec<PathBuf>,
}

impl Cli {
    fn options(&self) -> Options {
        Options {
            load_prelude: !self.no_prelude,
            parse: ParseOptions {
                memoize_delay: !self.no_memoize_delay,
            },
        }
    }
}

fn init_logging(cli: &Cli) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|e| {
        eprintln!("invalid log filter {:?} ({}), using warn", cli.log_level, e);
        EnvFilter::new("warn")
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoLocal::rfc_3339());
    let (result, guard) = match cli.log_dir {
        Some(ref dir) => {
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "scheme-rules.log"));
            let subscriber = builder.with_writer(writer).with_ansi(false).finish();
            (tracing::subscriber::set_global_default(subscriber), Some(guard))
        }
        None => {
            let subscriber = builder.with_writer(std::io::stderr).finish();
            (tracing::subscriber::set_global_default(subscriber), None)
        }
    };
    if let Err(e) = result {
        eprintln!("failed to install log subscriber: {}", e);
    }
    if let Err(e) = tracing_log::LogTracer::init() {
        warn!("failed to bridge log records: {}", e);
    }
    guard
}

/// Keeps reading lines while parentheses are open.
struct ParenValidator;

impl Validator for ParenValidator {
    fn validate(&self, line: &str) -> ValidationResult {
        match open_parens(line) {
            n if n > 0 => ValidationResult::Incomplete,
            _ => ValidationResult::Complete,
        }
    }
}

fn open_parens(source: &str) -> i64 {
    let mut depth = 0;
    let mut in_string = false;
    let mut chars = source.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if in_string => {
                chars.next();
            }
            '"' => in_string = !in_string,
            ';' if !in_string => {
                // comment runs to the end of the line
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
    if in_string {
        depth.max(1)
    } else {
        depth
    }
}

fn submit(interpreter: &mut Interpreter, source: &str, dump_ast: bool) -> Result<Value, Error> {
    let program = interpreter.parse(source)?;
    if dump_ast {
        match serde_json::to_string_pretty(&program) {
            Ok(json) => println!("{}", json),
            Err(e) => warn!("cannot serialize syntax tree: {}", e),
        }
    }
    interpreter.evaluate(&program)
}

fn report(error: &Error) { eprintln!("{}", error.to_string().red()); }

fn print_value(value: &Value) {
    if !matches!(value, Value::Unspecified) {
        println!("{}", value);
    }
}

fn repl(mut interpreter: Interpreter, cli: &Cli) -> ExitCode {
    let mut line_editor = Reedline::create().with_validator(Box::new(ParenValidator));
    let prompt = DefaultPrompt::new(DefaultPromptSegment::Basic("scheme".to_string()), DefaultPromptSegment::Empty);
    loop {
        let line = match line_editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => line,
            Ok(Signal::CtrlD) => break,
            Ok(_) => continue,
            Err(e) => {
                eprintln!("{}", format!("cannot read input: {}", e).red());
                return ExitCode::FAILURE;
            }
        };
        match line.trim() {
            "" => continue,
            ":quit" | ":exit" => break,
            ":reset" => {
                match Interpreter::with_options(cli.options()) {
                    Ok(fresh) => {
                        interpreter = fresh;
                        info!("session reset");
                    }
                    Err(e) => report(&e),
                }
                continue;
            }
            _ => {}
        }
        match panic::catch_unwind(AssertUnwindSafe(|| submit(&mut interpreter, &line, cli.dump_ast))) {
            Ok(Ok(value)) => print_value(&value),
            Ok(Err(e)) => report(&e),
            Err(_) => eprintln!("{}", "internal error; the session is kept but may be inconsistent".red()),
        }
    }
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(&cli);
    debug!("{:?}", cli);

    let mut interpreter = match Interpreter::with_options(cli.options()) {
        Ok(interpreter) => interpreter,
        Err(e) => {
            report(&e);
            return ExitCode::FAILURE;
        }
    };

    for path in &cli.files {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("{}", format!("cannot read {}: {}", path.display(), e).red());
                return ExitCode::FAILURE;
            }
        };
        info!("loading {}", path.display());
        match submit(&mut interpreter, &source, cli.dump_ast) {
            Ok(value) => debug!("{} => {}", path.display(), value),
            Err(e) => {
                report(&e);
                return ExitCode::FAILURE;
            }
        }
    }

    match cli.eval {
        Some(ref source) => match submit(&mut interpreter, source, cli.dump_ast) {
            Ok(value) => {
                print_value(&value);
                ExitCode::SUCCESS
            }
            Err(e) => {
                report(&e);
                ExitCode::FAILURE
            }
        },
        None => repl(interpreter, &cli),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_parens() {
        assert_eq!(open_parens("(+ 1 2)"), 0);
        assert_eq!(open_parens("(define (f x)"), 2);
        assert_eq!(open_parens("(display \")\""), 1);
        assert_eq!(open_parens("(f ; )\n"), 1);
        assert_eq!(open_parens("\"abc"), 1);
        assert_eq!(open_parens(")"), -1);
    }
}
