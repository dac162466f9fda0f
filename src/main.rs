use clap::Parser;
use detjar::determinizer::{Determinizer, DeterminizeOptions};
use detjar::error::{DeterminizeError, EX_USAGE};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "detjar",
    version,
    about = "Rewrite a ZIP/JAR archive into a byte-for-byte reproducible form"
)]
struct Cli {
    /// Archive to read
    input: PathBuf,
    /// Where to write the deterministic archive (created or replaced)
    output: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help / --version
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(EX_USAGE);
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), DeterminizeError> {
    if same_file(&cli.input, &cli.output) {
        return Err(DeterminizeError::Argument(format!(
            "input and output must be different files: {}",
            cli.input.display()
        )));
    }

    let report = Determinizer::new(DeterminizeOptions::default()).run(&cli.input, &cli.output)?;
    println!(
        "Determinized: {} ({} entries, {} canonicalized, {} dropped)  blake3 {}",
        cli.output.display(),
        report.entries_written,
        report.canonicalized,
        report.excluded,
        report.digest_hex()
    );
    Ok(())
}

/// True when both paths exist and resolve to the same file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn report_error(e: &DeterminizeError) {
    eprintln!("error: {e}");
    let mut source = e.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}
