//! Probe building blocks: test-source synthesis, compiler command lines and
//! logged process execution.

use std::path::Path;

use anyhow::Result;

use crate::core::errors::ConfigureError;
use crate::util::log::{ConfigLog, LogEntry};
use crate::util::process::ProcessBuilder;

/// Name of the synthesized test source inside the probe directory.
pub const TEST_SOURCE: &str = "test.c";

/// A compile (or compile-and-link) test.
///
/// `link: None` compiles only. `link: Some(vec![])` links without extra
/// libraries.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CompileProbe {
    pub include: Vec<String>,
    pub decl: Vec<String>,
    pub expr: Option<String>,
    pub defined: Vec<String>,
    pub flags: Vec<String>,
    pub link: Option<Vec<String>>,
}

impl CompileProbe {
    pub fn new() -> Self {
        CompileProbe::default()
    }

    pub fn include(mut self, header: impl Into<String>) -> Self {
        self.include.push(header.into());
        self
    }

    pub fn decl(mut self, decl: impl Into<String>) -> Self {
        self.decl.push(decl.into());
        self
    }

    pub fn expr(mut self, expr: impl Into<String>) -> Self {
        self.expr = Some(expr.into());
        self
    }

    pub fn defined(mut self, macro_name: impl Into<String>) -> Self {
        self.defined.push(macro_name.into());
        self
    }

    pub fn flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    pub fn link<I, S>(mut self, libs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.link
            .get_or_insert_with(Vec::new)
            .extend(libs.into_iter().map(Into::into));
        self
    }

    /// Whether the test links an executable.
    pub fn links(&self) -> bool {
        self.link.is_some()
    }

    /// C source for this test.
    pub fn source(&self) -> String {
        let mut out = String::new();
        for header in &self.include {
            out.push_str(&format!("#include <{}>\n", header));
        }
        for decl in &self.decl {
            out.push_str(decl);
            out.push('\n');
        }
        for name in &self.defined {
            out.push_str(&format!("#ifndef {}\n#error failed\n#endif\n", name));
        }
        if self.expr.is_some() || self.links() {
            out.push_str("int main(int argc, char **argv) {\n");
            if let Some(expr) = &self.expr {
                out.push_str(expr);
                out.push('\n');
            }
            out.push_str("return 0; }\n");
        }
        out
    }

    /// Compiler invocation for this test.
    ///
    /// `cc` is the resolved compiler command line, `cflags`/`ldflags` the
    /// flags accumulated so far, `dir` the private probe directory holding
    /// [`TEST_SOURCE`].
    pub fn command(
        &self,
        cc: &str,
        cflags: &[String],
        ldflags: &[String],
        dir: &Path,
    ) -> Result<ProcessBuilder> {
        let out = dir.join("test");
        let mut cmd = ProcessBuilder::from_command_line(cc)?
            .arg(dir.join(TEST_SOURCE))
            .args(cflags)
            .args(&self.flags)
            .cwd(dir);

        cmd = match &self.link {
            Some(libs) => cmd
                .args(ldflags)
                .args(libs)
                .arg(format!("-o{}", out.display())),
            None => cmd.arg("-c").arg(format!("-o{}.o", out.display())),
        };
        Ok(cmd)
    }
}

/// How a logged process run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The process could not be started.
    NotStarted,
    /// Exited with a failure status (or a signal).
    Failed,
    /// Exited with status zero.
    Success { stdout: String },
}

impl ProcessOutcome {
    pub fn started(&self) -> bool {
        !matches!(self, ProcessOutcome::NotStarted)
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, ProcessOutcome::Success { .. })
    }

    /// Stdout of a successful run.
    pub fn into_stdout(self) -> Option<String> {
        match self {
            ProcessOutcome::Success { stdout } => Some(stdout),
            _ => None,
        }
    }
}

fn decode(bytes: Vec<u8>, command: &str) -> Result<String, ConfigureError> {
    String::from_utf8(bytes).map_err(|_| ConfigureError::Decode {
        command: command.to_string(),
    })
}

/// Run a process, recording the command, its output and status in `log`.
///
/// Spawn failures are logged and reported as [`ProcessOutcome::NotStarted`].
/// Output that is not UTF-8 aborts the run.
pub fn run_logged(log: &mut ConfigLog, cmd: &ProcessBuilder) -> Result<ProcessOutcome> {
    let command = cmd.display_command();
    tracing::debug!("running `{}`", command);

    let output = match cmd.exec() {
        Ok(output) => output,
        Err(err) => {
            log.append(LogEntry::SpawnFailed {
                command,
                error: format!("{:#}", err),
            });
            return Ok(ProcessOutcome::NotStarted);
        }
    };

    let stdout = decode(output.stdout, &command)?;
    let stderr = decode(output.stderr, &command)?;
    let success = output.status.success();

    log.append(LogEntry::Command {
        command,
        stdout: stdout.clone(),
        stderr,
        status: output.status.code(),
    });

    Ok(if success {
        ProcessOutcome::Success { stdout }
    } else {
        ProcessOutcome::Failed
    })
}

/// Split tool output into flags.
pub fn split_flags(output: &str) -> Vec<String> {
    output.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_empty_probe_source() {
        assert_eq!(CompileProbe::new().source(), "");
    }

    #[test]
    fn test_probe_source_layout() {
        let probe = CompileProbe::new()
            .include("zlib.h")
            .decl("static int x;")
            .defined("ZLIB_VERSION")
            .expr("inflate(0, 0);");

        assert_eq!(
            probe.source(),
            "#include <zlib.h>\n\
             static int x;\n\
             #ifndef ZLIB_VERSION\n#error failed\n#endif\n\
             int main(int argc, char **argv) {\n\
             inflate(0, 0);\n\
             return 0; }\n"
        );
    }

    #[test]
    fn test_link_without_libs_still_emits_main() {
        let probe = CompileProbe::new().link(Vec::<String>::new());
        assert!(probe.links());
        assert!(probe.source().contains("int main"));
    }

    #[test]
    fn test_compile_only_command() {
        let dir = PathBuf::from("/tmp/probe");
        let probe = CompileProbe::new().flags(["-DFOO"]);
        let cmd = probe
            .command("ccache gcc", &["-O2".to_string()], &["-lm".to_string()], &dir)
            .unwrap();

        assert_eq!(
            cmd.display_command(),
            "ccache gcc /tmp/probe/test.c -O2 -DFOO -c -o/tmp/probe/test.o"
        );
    }

    #[test]
    fn test_link_command() {
        let dir = PathBuf::from("/tmp/probe");
        let probe = CompileProbe::new().link(["-lz"]);
        let cmd = probe
            .command("cc", &[], &["-lm".to_string()], &dir)
            .unwrap();

        assert_eq!(
            cmd.display_command(),
            "cc /tmp/probe/test.c -lm -lz -o/tmp/probe/test"
        );
    }

    #[test]
    fn test_run_logged_outcomes() {
        let mut log = ConfigLog::in_memory();

        let ok = run_logged(&mut log, &ProcessBuilder::new("echo").arg("-lz")).unwrap();
        assert_eq!(split_flags(&ok.into_stdout().unwrap()), ["-lz"]);

        let failed = run_logged(&mut log, &ProcessBuilder::new("false")).unwrap();
        assert_eq!(failed, ProcessOutcome::Failed);
        assert!(failed.started());

        let missing =
            run_logged(&mut log, &ProcessBuilder::new("autoprobe-no-such-tool")).unwrap();
        assert!(!missing.started());

        assert!(matches!(log.entries()[0], LogEntry::Command { status: Some(0), .. }));
        assert!(matches!(log.entries()[2], LogEntry::SpawnFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_invalid_utf8_is_fatal() {
        let mut log = ConfigLog::in_memory();
        let cmd = ProcessBuilder::new("printf").arg("\\377");
        let err = run_logged(&mut log, &cmd).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigureError>(),
            Some(ConfigureError::Decode { .. })
        ));
    }
}
