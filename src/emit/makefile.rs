//! `config.mak` serializer.

use super::{Variable, VariableValue};

const BANNER: &str = "# Generated by configure.\n\n";

/// Escape a value for a make variable assignment.
///
/// Make references such as `$(PREFIX)` are left intact.
pub fn escape_make_value(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Var(Variable),
    Blank,
    List { name: String, items: Vec<String> },
}

/// Contents of the generated variable file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MakeFile {
    lines: Vec<Line>,
}

impl MakeFile {
    pub fn new() -> Self {
        MakeFile::default()
    }

    pub fn var(&mut self, variable: Variable) {
        self.lines.push(Line::Var(variable));
    }

    pub fn blank(&mut self) {
        self.lines.push(Line::Blank);
    }

    /// A backslash-continued multi-line list.
    pub fn list(&mut self, name: impl Into<String>, items: Vec<String>) {
        self.lines.push(Line::List {
            name: name.into(),
            items,
        });
    }

    pub fn render(&self) -> String {
        let mut out = String::from(BANNER);
        for line in &self.lines {
            match line {
                Line::Var(v) => {
                    let value = match &v.value {
                        VariableValue::Text(s) => escape_make_value(s),
                        VariableValue::Raw(s) => s.clone(),
                    };
                    out.push_str(&format!("{} = {}\n", v.name, value));
                }
                Line::Blank => out.push('\n'),
                Line::List { name, items } => {
                    out.push_str(&format!("{} = \\\n", name));
                    for item in items {
                        out.push_str(&format!("   {} \\\n", item));
                    }
                    out.push('\n');
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escaping() {
        assert_eq!(escape_make_value(r"C:\tools"), r"C:\\tools");
        assert_eq!(escape_make_value("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(escape_make_value("$(PREFIX)/etc"), "$(PREFIX)/etc");
    }

    #[test]
    fn test_render() {
        let mut mak = MakeFile::new();
        mak.var(Variable::text("CC", "ccache \"cc\""));
        mak.var(Variable::raw("HAVE_ZLIB", "1"));
        mak.blank();
        mak.list("SOURCES", vec!["$(ROOT)/a.c".into(), "$(ROOT)/b.c".into()]);

        assert_eq!(
            mak.render(),
            "# Generated by configure.\n\
             \n\
             CC = ccache \\\"cc\\\"\n\
             HAVE_ZLIB = 1\n\
             \n\
             SOURCES = \\\n   $(ROOT)/a.c \\\n   $(ROOT)/b.c \\\n\n"
        );
    }
}
