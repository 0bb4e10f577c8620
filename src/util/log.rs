//! Append-only diagnostic log (`config.log`).
//!
//! Every probe, process invocation and check outcome is recorded as a
//! structured [`LogEntry`]. Entries are kept in memory for inspection and
//! mirrored to the log file as they are appended, so the file is complete
//! even when the run aborts.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// One record in the diagnostic log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// A check started.
    Test { name: Option<String> },

    /// A synthesized probe source file.
    TestSource { path: PathBuf, contents: String },

    /// An external process ran to completion.
    Command {
        command: String,
        stdout: String,
        stderr: String,
        /// Exit code, `None` when terminated by a signal
        status: Option<i32>,
    },

    /// An external process could not be started.
    SpawnFailed { command: String, error: String },

    /// Free-form note.
    Note(String),

    /// A check finished.
    Outcome {
        name: Option<String>,
        outcome: String,
        enabled: bool,
    },

    /// The run aborted.
    Stopping { message: String },

    /// The run completed and artifacts were written.
    Finished,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEntry::Test { name } => {
                writeln!(f, "\n--- Test: {}", name.as_deref().unwrap_or("(unnamed)"))
            }
            LogEntry::TestSource { path, contents } => {
                write!(f, "--- Test file {}:\n{}", path.display(), contents)
            }
            LogEntry::Command {
                command,
                stdout,
                stderr,
                status,
            } => {
                writeln!(f, "--- Command: {}", command)?;
                if !stdout.is_empty() {
                    write!(f, "--- stdout:\n{}", stdout)?;
                }
                if !stderr.is_empty() {
                    write!(f, "--- stderr:\n{}", stderr)?;
                }
                match status {
                    Some(code) => writeln!(f, "--- Exit status: {}", code),
                    None => writeln!(f, "--- Exit status: killed by signal"),
                }
            }
            LogEntry::SpawnFailed { command, error } => {
                writeln!(f, "--- Command: {}", command)?;
                writeln!(f, "--- Failed to start: {}", error)
            }
            LogEntry::Note(note) => writeln!(f, "--- {}", note),
            LogEntry::Outcome {
                name,
                outcome,
                enabled,
            } => writeln!(
                f,
                "--- Outcome: {} ({}={})",
                outcome,
                name.as_deref().unwrap_or("(unnamed)"),
                u8::from(*enabled)
            ),
            LogEntry::Stopping { message } => {
                writeln!(f, "--- Stopping due to error: {}", message)
            }
            LogEntry::Finished => writeln!(f, "--- Finishing successfully."),
        }
    }
}

/// The diagnostic log for one configuration run.
#[derive(Debug, Default)]
pub struct ConfigLog {
    entries: Vec<LogEntry>,
    sink: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl ConfigLog {
    /// A log that is only kept in memory.
    pub fn in_memory() -> Self {
        ConfigLog::default()
    }

    /// A log mirrored to the file at `path` (truncated).
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create log file: {}", path.display()))?;
        Ok(ConfigLog {
            entries: Vec::new(),
            sink: Some(BufWriter::new(file)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Append an entry.
    ///
    /// A failing log file is reported once and then ignored; the in-memory
    /// record stays complete.
    pub fn append(&mut self, entry: LogEntry) {
        tracing::trace!("{}", entry.to_string().trim_end());

        if let Some(sink) = self.sink.as_mut() {
            let written = write!(sink, "{}", entry).and_then(|_| sink.flush());
            if let Err(e) = written {
                tracing::warn!(
                    "failed to write {}: {}",
                    self.path
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default(),
                    e
                );
                self.sink = None;
            }
        }

        self.entries.push(entry);
    }

    /// Append a note.
    pub fn note(&mut self, note: impl Into<String>) {
        self.append(LogEntry::Note(note.into()));
    }

    /// All entries appended so far.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Location of the log file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
