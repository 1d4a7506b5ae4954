use std::fs::File;
use std::io::{BufRead, BufReader, IsTerminal, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser as ClapParser;
use env_logger::Builder;
use log::info;

use fern::session::{RunStatus, Session};

#[derive(ClapParser, Debug)]
#[command(version, about = "Fern language interpreter", long_about = None)]
pub struct Cli {
    /// Script file to run; omit to read standard input (prompt on a terminal)
    script: Option<PathBuf>,

    /// Enable logging to fern.log
    #[arg(long)]
    log: bool,
}

const EXIT_USAGE: i32 = 64;
const EXIT_STATIC: i32 = 65;
const EXIT_RUNTIME: i32 = 70;

/// Reads the contents of a file into a String.
fn read_file(filename: &PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    String::from_utf8(buf).context(format!("File {:?} was not valid UTF-8", filename))
}

fn init_logger() -> Result<()> {
    // Create or open the log file
    let log_file = File::create("fern.log").context("Failed to create fern.log")?;

    // Configure env_logger to write to file with module and source line
    Builder::new()
        .format(|buf, record| {
            // Strip 'fern::' from module path
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("fern::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .init();

    info!("Logger initialized, writing to fern.log");
    Ok(())
}

/// Map a run outcome to the process exit code contract.
fn finish(status: RunStatus) -> Result<()> {
    match status {
        RunStatus::Ok => Ok(()),
        RunStatus::StaticError => std::process::exit(EXIT_STATIC),
        RunStatus::RuntimeError => std::process::exit(EXIT_RUNTIME),
    }
}

fn run_file(filename: PathBuf) -> Result<()> {
    info!("Running file {:?}", filename);

    let source = read_file(&filename)?;
    let mut session = Session::new(std::io::stdout(), false);

    finish(session.run(&source))
}

/// Non-terminal stdin: read everything as one program.
fn run_pipe() -> Result<()> {
    info!("Running piped input");

    let mut buf = Vec::new();
    std::io::stdin()
        .lock()
        .read_to_end(&mut buf)
        .context("Failed to read standard input")?;
    let source = String::from_utf8(buf).context("Standard input was not valid UTF-8")?;

    let mut session = Session::new(std::io::stdout(), false);

    finish(session.run(&source))
}

/// Interactive prompt: one line per run; errors never end the session.
fn run_prompt() -> Result<()> {
    info!("Starting interactive prompt");

    let stdin = std::io::stdin();
    let mut session = Session::new(std::io::stdout(), true);
    let mut line = String::new();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        line.clear();
        let bytes = stdin.lock().read_line(&mut line)?;
        if bytes == 0 {
            break; // EOF
        }

        // Static errors were already reported and reset with this line's
        // diagnostics; runtime errors leave earlier definitions usable.
        let _ = session.run(&line);
    }

    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,

        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return Ok(());
        }

        // Extra positionals, unknown flags, …: the usage contract says 64.
        Err(e) => {
            let _ = e.print();
            std::process::exit(EXIT_USAGE);
        }
    };

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        // Initialize a minimal logger to avoid "no logger" errors
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.script {
        Some(filename) => run_file(filename),
        None => {
            if std::io::stdin().is_terminal() {
                run_prompt()
            } else {
                run_pipe()
            }
        }
    }
}
