//! Write-once record of check verdicts.

use std::collections::BTreeMap;

use crate::core::errors::ConfigureError;

/// Maps a check identifier to whether it ended up enabled.
///
/// Checks reference their dependencies by identifier, so a dependency must be
/// recorded before any check that names it runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyRegistry {
    verdicts: BTreeMap<String, bool>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        DependencyRegistry::default()
    }

    /// Record a verdict. Each identifier may be recorded once.
    pub fn record(&mut self, identifier: &str, enabled: bool) -> Result<(), ConfigureError> {
        if self.verdicts.contains_key(identifier) {
            return Err(ConfigureError::DuplicateCheck {
                name: identifier.to_string(),
            });
        }
        self.verdicts.insert(identifier.to_string(), enabled);
        Ok(())
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.verdicts.contains_key(identifier)
    }

    /// Look up a verdict; unknown identifiers are a catalogue defect.
    pub fn is_enabled(&self, identifier: &str) -> Result<bool, ConfigureError> {
        self.verdicts
            .get(identifier)
            .copied()
            .ok_or_else(|| ConfigureError::UnknownDependency {
                name: identifier.to_string(),
            })
    }

    /// Whether every listed identifier is enabled.
    ///
    /// All identifiers are validated even after the first disabled one.
    pub fn all_enabled<'a, I>(&self, identifiers: I) -> Result<bool, ConfigureError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut all = true;
        for id in identifiers {
            all &= self.is_enabled(id)?;
        }
        Ok(all)
    }

    /// Enabled identifiers in sorted order.
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.verdicts
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(id, _)| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }
}
