//! CLI definitions using clap.

use std::path::PathBuf;

use clap::Parser;

use autoprobe::util::shell::ColorChoice;

/// Probe the host for features and write build configuration
///
/// Front-end flags must come before configure arguments; everything from the
/// first unrecognized argument on is passed to configure (`--help` included).
#[derive(Parser, Debug)]
#[command(name = "autoprobe")]
#[command(about, long_about = None)]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct Cli {
    /// Check catalogue [default: configure.toml in the current directory]
    #[arg(long, env = "AUTOPROBE_CATALOGUE", value_name = "PATH")]
    pub catalogue: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// When to use colors (auto, always, never)
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    /// Configure arguments (`--help` lists them)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    pub args: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_configure_args_pass_through() {
        let cli = Cli::try_parse_from([
            "autoprobe",
            "-v",
            "--prefix=/opt",
            "--help",
            "--enable-lua",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.args, ["--prefix=/opt", "--help", "--enable-lua"]);
    }
}
