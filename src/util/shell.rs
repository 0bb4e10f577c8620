//! Console output for a configuration run.
//!
//! Progress is printed as `Checking for <desc>... <outcome>` lines on stdout.
//! The shell owns all formatting and coloring so the engine only reports
//! what happened.

use std::io::{self, IsTerminal, Write};

use crate::core::check::Outcome;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// --quiet: warnings and the final summary only
    Quiet,
    #[default]
    Normal,
    /// --verbose: also echo notes
    Verbose,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Detect TTY and use colors if available.
    #[default]
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "invalid color choice '{}'; expected 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

const GREEN: &str = "\x1b[1;32m";
const YELLOW: &str = "\x1b[1;33m";
const RED: &str = "\x1b[1;31m";
const RESET: &str = "\x1b[0m";

#[derive(Debug)]
enum Sink {
    Stdout,
    Buffer(Vec<u8>),
}

/// Console output for one run.
#[derive(Debug)]
pub struct Shell {
    verbosity: Verbosity,
    use_color: bool,
    sink: Sink,
    /// A `Checking for ...` line is waiting for its outcome
    line_open: bool,
}

impl Shell {
    pub fn new(verbosity: Verbosity, color: ColorChoice) -> Self {
        let use_color = match color {
            ColorChoice::Auto => io::stdout().is_terminal(),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        };
        Shell {
            verbosity,
            use_color,
            sink: Sink::Stdout,
            line_open: false,
        }
    }

    /// Create a shell from CLI flags; quiet wins over verbose.
    pub fn from_flags(quiet: bool, verbose: bool, color: ColorChoice) -> Self {
        let verbosity = if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };
        Shell::new(verbosity, color)
    }

    /// A shell that records uncolored output in memory.
    pub fn buffered(verbosity: Verbosity) -> Self {
        Shell {
            verbosity,
            use_color: false,
            sink: Sink::Buffer(Vec::new()),
            line_open: false,
        }
    }

    /// Output recorded by a [`Shell::buffered`] shell.
    pub fn captured(&self) -> String {
        match &self.sink {
            Sink::Buffer(buf) => String::from_utf8_lossy(buf).into_owned(),
            Sink::Stdout => String::new(),
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    pub fn use_color(&self) -> bool {
        self.use_color
    }

    fn write(&mut self, text: &str) {
        // Console output is best effort; a closed stdout must not abort a run.
        match &mut self.sink {
            Sink::Stdout => {
                let mut out = io::stdout().lock();
                let _ = out.write_all(text.as_bytes());
                let _ = out.flush();
            }
            Sink::Buffer(buf) => buf.extend_from_slice(text.as_bytes()),
        }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_color {
            format!("{}{}{}", color, text, RESET)
        } else {
            text.to_string()
        }
    }

    fn close_line(&mut self) {
        if self.line_open {
            self.write("\n");
            self.line_open = false;
        }
    }

    /// Start a `Checking for <desc>... ` line.
    pub fn checking(&mut self, desc: &str) {
        if self.is_quiet() {
            return;
        }
        self.close_line();
        self.write(&format!("Checking for {}... ", desc));
        self.line_open = true;
    }

    /// Inline detail on the open check line, e.g. the tool being tried.
    pub fn aside(&mut self, detail: &str) {
        if self.line_open {
            self.write(&format!("({}) ", detail));
        }
    }

    /// Finish the open check line with its outcome.
    pub fn outcome(&mut self, outcome: &Outcome) {
        if !self.line_open {
            return;
        }
        let color = match outcome {
            Outcome::Enabled => GREEN,
            Outcome::DisabledByOption | Outcome::DisabledByDefault | Outcome::ProbeSkipped => {
                YELLOW
            }
            _ => RED,
        };
        let text = self.paint(color, &outcome.to_string());
        self.write(&format!("{}\n", text));
        self.line_open = false;
    }

    /// Print a line regardless of verbosity.
    pub fn println(&mut self, line: impl AsRef<str>) {
        self.close_line();
        self.write(&format!("{}\n", line.as_ref()));
    }

    /// Print a warning regardless of verbosity.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.close_line();
        let label = self.paint(YELLOW, "Warning:");
        self.write(&format!("{} {}\n", label, msg.as_ref()));
    }

    /// Print a note in verbose mode.
    pub fn note(&mut self, msg: impl AsRef<str>) {
        if self.is_verbose() {
            self.println(msg);
        }
    }

    /// Print a status line unless quiet.
    pub fn status(&mut self, msg: impl AsRef<str>) {
        if !self.is_quiet() {
            self.println(msg);
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(Verbosity::Normal, ColorChoice::Auto)
    }
}
