//! Orbit CLI - Command line interface
//!
//! Runs a script file in a fresh context with a few host functions.
//! Options come from an optional `orbit.json` project file, overridden by flags.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, info};

mod config;
mod host;
mod logging;
mod platform;

use crate::config::{load_project, parse_assignment, resolve_entry, Overrides};
use crate::logging::LogFormat;
use crate::platform::print_error;
use orbit_api::{Context, Error, RunConfig};
use orbit_config::LogLevel;

#[derive(Parser)]
#[command(
    name = "orbit",
    about = "Orbit scripting language - run a script with host bindings",
    version
)]
struct Cli {
    /// Script to run (default: `entry` from the project file)
    #[arg(value_name = "SCRIPT")]
    script: Option<PathBuf>,

    /// Project file path
    #[arg(long, value_name = "CONFIG", default_value = "orbit.json")]
    config: PathBuf,

    /// Emit line tables
    #[arg(long, conflicts_with = "no_debug")]
    debug: bool,

    /// Omit line tables
    #[arg(long)]
    no_debug: bool,

    /// Disassemble compiled code to the debug log
    #[arg(long)]
    dump_bytecode: bool,

    /// Global log level: trace, debug, info, warn, error, off
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    /// Print errors as JSON reports on stdout
    #[arg(long)]
    json: bool,

    /// Bind a top-level variable before compiling (NAME=VALUE, repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    set: Vec<String>,

    /// Call a script function after main and print its result
    #[arg(long, value_name = "FUNC")]
    call: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        let debug = match (self.debug, self.no_debug) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        Overrides {
            debug,
            dump_bytecode: self.dump_bytecode,
            log_level: self.log_level,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let mut project = match load_project(&cli.config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    cli.overrides().apply(&mut project);
    logging::init(&project.logging, cli.log_format);

    let Some(entry) = resolve_entry(cli.script.as_deref(), &cli.config, &project) else {
        eprintln!(
            "Error: no script given\n\n提示: orbit <SCRIPT>，或在 '{}' 中指定 'entry' 字段",
            cli.config.display()
        );
        process::exit(2);
    };
    info!(target: "orbit::cli", entry = %entry.display(), "Starting");

    let ctx = Context::with_config(RunConfig::from_project(&project));
    host::register(&ctx);

    if let Err(e) = bind_assignments(&ctx, &cli.set) {
        eprintln!("Error: {}", e);
        process::exit(2);
    }

    if let Err(e) = run(&ctx, &entry, cli.call.as_deref()) {
        let source = error_source(&e, &entry);
        print_error(&e, source.as_deref(), cli.json);
        process::exit(1);
    }
}

fn bind_assignments(ctx: &Context, assignments: &[String]) -> Result<(), String> {
    for arg in assignments {
        let (name, literal) = parse_assignment(arg)?;
        debug!(target: "orbit::cli", name = %name, value = ?literal, "Binding variable");
        host::bind(ctx, &name, &literal).map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn run(ctx: &Context, entry: &Path, call: Option<&str>) -> Result<(), Error> {
    ctx.compile_file(entry, None)?;

    let result = ctx.run_main()?;
    if !result.is_null() {
        println!("{result}");
    }

    if let Some(name) = call {
        let value = ctx.run_func(name, &[])?;
        println!("{value}");
    }
    Ok(())
}

/// 出错文件的源码（错误在根文件或 include 的文件中）
fn error_source(e: &Error, entry: &Path) -> Option<String> {
    let path = match e.file() {
        Some(file) if Path::new(file).is_absolute() || Path::new(file) == entry => PathBuf::from(file),
        Some(file) => entry.parent().unwrap_or(Path::new(".")).join(file),
        None => return None,
    };
    std::fs::read_to_string(path).ok()
}
