//! `autoprobe [ARGS...]` - run the catalogue's checks

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::cli::Cli;
use autoprobe::core::catalogue::{Catalogue, CATALOGUE_FILE};
use autoprobe::ops::configure::{configure, Configured};
use autoprobe::util::env::Environment;
use autoprobe::util::fs::normalize_path;
use autoprobe::util::shell::Shell;

pub fn execute(cli: Cli, shell: Shell) -> Result<()> {
    let cwd = std::env::current_dir().context("failed to determine current directory")?;

    let (catalogue, path) = match cli.catalogue {
        Some(path) => {
            let path = normalize_path(&cwd.join(path));
            (Catalogue::load(&path)?, path)
        }
        None => {
            let path = cwd.join(CATALOGUE_FILE);
            if path.exists() {
                (Catalogue::load(&path)?, path)
            } else {
                tracing::warn!("no {} found, no checks will run", CATALOGUE_FILE);
                (Catalogue::default(), path)
            }
        }
    };
    tracing::debug!("catalogue: {}", path.display());

    let root = project_root(&path, &cwd);
    let opts = catalogue.options(root, cli.args, Environment::capture());

    match configure(opts, shell, catalogue.into_checks())? {
        Configured::Help(text) => print!("{}", text),
        Configured::Done(summary) => {
            tracing::debug!(
                "enabled: {} ({} artifacts)",
                summary.enabled.join(" "),
                summary.artifacts.len()
            );
        }
    }
    Ok(())
}

/// The directory holding the catalogue.
fn project_root(catalogue: &Path, cwd: &Path) -> PathBuf {
    match catalogue.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => cwd.to_path_buf(),
    }
}
