//! Command implementations

pub mod configure;
