//! Accumulated compiler/linker flags and build IR, with transactional snapshots.
//!
//! Probes add flags speculatively. Each probe runs between [`FlagStack::push`]
//! and either [`FlagStack::pop_merge`] (keep everything the probe added) or
//! [`FlagStack::pop_discard`] (restore the state from before the push).

use std::collections::BTreeMap;

use crate::core::errors::ConfigureError;
use crate::emit::{Define, Variable};

/// Everything a probe may change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagState {
    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,
    /// Header defines in insertion order
    pub defines: Vec<Define>,
    /// Build variables in insertion order
    pub variables: Vec<Variable>,
    /// Resolved program command lines, keyed by variable name (`CC`)
    pub programs: BTreeMap<String, String>,
}

impl FlagState {
    pub fn add_cflags<I, S>(&mut self, flags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cflags.extend(flags.into_iter().map(Into::into));
    }

    pub fn add_ldflags<I, S>(&mut self, flags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ldflags.extend(flags.into_iter().map(Into::into));
    }

    pub fn add_define(&mut self, define: Define) {
        self.defines.push(define);
    }

    pub fn add_variable(&mut self, variable: Variable) {
        self.variables.push(variable);
    }
}

/// The current [`FlagState`] plus a stack of saved copies.
#[derive(Debug, Default)]
pub struct FlagStack {
    current: FlagState,
    saved: Vec<FlagState>,
}

impl FlagStack {
    pub fn new() -> Self {
        FlagStack::default()
    }

    pub fn state(&self) -> &FlagState {
        &self.current
    }

    pub fn state_mut(&mut self) -> &mut FlagState {
        &mut self.current
    }

    /// Number of open snapshots.
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Save the current state.
    pub fn push(&mut self) {
        self.saved.push(self.current.clone());
    }

    /// Drop changes made since the matching push.
    pub fn pop_discard(&mut self) -> Result<(), ConfigureError> {
        self.current = self
            .saved
            .pop()
            .ok_or(ConfigureError::UnbalancedTransaction)?;
        Ok(())
    }

    /// Keep changes made since the matching push.
    pub fn pop_merge(&mut self) -> Result<(), ConfigureError> {
        self.saved
            .pop()
            .map(|_| ())
            .ok_or(ConfigureError::UnbalancedTransaction)
    }

    /// Take the final state. Open snapshots are an error.
    pub fn into_state(self) -> Result<FlagState, ConfigureError> {
        if !self.saved.is_empty() {
            return Err(ConfigureError::UnbalancedTransaction);
        }
        Ok(self.current)
    }
}
