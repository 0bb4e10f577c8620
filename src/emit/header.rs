//! `config.h` serializer.

use std::collections::BTreeMap;

use super::{Define, DefineValue, Variable};

const BANNER: &str = "// Generated by configure.\n#pragma once\n";

/// Quote a string as a C string literal.
pub fn c_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Contents of the generated header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFile {
    /// Numeric feature defines, keyed and sorted by name
    features: BTreeMap<String, i64>,
    /// Informational defines in insertion order
    info: Vec<Define>,
}

impl HeaderFile {
    pub fn new() -> Self {
        HeaderFile::default()
    }

    /// Add a define. Numeric defines go to the sorted feature block; the
    /// first definition of a name wins.
    pub fn define(&mut self, define: &Define) {
        if self.contains(&define.name) {
            return;
        }
        match define.value {
            DefineValue::Int(v) => {
                self.features.insert(define.name.clone(), v);
            }
            _ => self.info.push(define.clone()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.features.contains_key(name) || self.info.iter().any(|d| d.name == name)
    }

    /// `HAVE_*` defines as build variables, so make can test them too.
    pub fn feature_mirrors(&self) -> Vec<Variable> {
        let numeric = self
            .features
            .iter()
            .filter(|(name, _)| name.starts_with("HAVE_"))
            .map(|(name, value)| Variable::raw(name.as_str(), value.to_string()));
        let other = self
            .info
            .iter()
            .filter(|d| d.is_feature())
            .map(|d| match &d.value {
                DefineValue::Str(s) => Variable::text(d.name.as_str(), s.as_str()),
                _ => Variable::raw(d.name.as_str(), ""),
            });
        numeric.chain(other).collect()
    }

    pub fn render(&self) -> String {
        let mut out = String::from(BANNER);

        out.push('\n');
        for (name, value) in &self.features {
            out.push_str(&format!("#define {} {}\n", name, value));
        }

        out.push('\n');
        for define in &self.info {
            match &define.value {
                DefineValue::Str(s) => {
                    out.push_str(&format!("#define {} {}\n", define.name, c_quote(s)))
                }
                DefineValue::Empty => out.push_str(&format!("#define {}\n", define.name)),
                DefineValue::Int(v) => out.push_str(&format!("#define {} {}\n", define.name, v)),
            }
        }
        out
    }
}
