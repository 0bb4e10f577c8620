//! autoprobe CLI - configure-time feature checks for C projects

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use autoprobe::core::errors::ConfigureError;
use autoprobe::util::diagnostic;
use autoprobe::util::shell::Shell;
use cli::Cli;

const LOG_ENV: &str = "AUTOPROBE_LOG";

/// Exit code for user errors.
const EXIT_USER: i32 = 1;
/// Exit code for catalogue defects.
const EXIT_INTERNAL: i32 = 2;

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "autoprobe=debug"
    } else {
        "autoprobe=info"
    };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let shell = Shell::from_flags(cli.quiet, cli.verbose, cli.color);
    let color = shell.use_color();
    if let Err(err) = commands::configure::execute(cli, shell) {
        std::process::exit(report(&err, color));
    }
}

/// Print a fatal error and pick the exit code.
fn report(err: &anyhow::Error, color: bool) -> i32 {
    if let Some(cerr) = err.downcast_ref::<ConfigureError>() {
        diagnostic::emit(&cerr.to_diagnostic(), color);
        return if cerr.is_internal() {
            EXIT_INTERNAL
        } else {
            EXIT_USER
        };
    }

    eprintln!("error: {:#}", err);
    if err.downcast_ref::<toml::de::Error>().is_some() {
        EXIT_INTERNAL
    } else {
        EXIT_USER
    }
}
