//! `--help` output.

use crate::builder::programs::ProgramTable;
use crate::core::install_paths::InstallPathTable;
use crate::util::env::OTHER_ENV_VARS;

/// Usage text printed before the per-check option lines.
pub fn usage_header(programs: &ProgramTable, paths: &InstallPathTable) -> Vec<String> {
    let mut lines = vec!["Environment variables controlling choice of build tools:".to_string()];
    for (name, default) in programs.iter() {
        lines.push(format!("  {:<30} {}", name, default));
    }

    lines.push(String::new());
    lines.push("Environment variables/options controlling install paths:".to_string());
    for path in paths.listed() {
        lines.push(format!(
            "  {:<30} '{}' (also --{})",
            path.name,
            path.default,
            path.name.to_lowercase()
        ));
    }

    lines.push(String::new());
    lines.push("Other environment variables:".to_string());
    for (name, help) in OTHER_ENV_VARS {
        lines.push(format!("  {:<30} {}", name, help));
    }
    lines.push("In addition, pkg-config queries PKG_CONFIG_PATH.".to_string());

    lines.push(String::new());
    lines.push("General build options:".to_string());
    lines.push(format!(
        "  {:<30} {}",
        "--builddir=PATH", "Build directory (default: build)"
    ));

    lines.push(String::new());
    lines.push("Specific build configuration:".to_string());
    lines
}

/// Join header and option lines into the final text.
pub fn render(lines: &[String]) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}
