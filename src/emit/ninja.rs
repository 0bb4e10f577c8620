//! `build.ninja` serializer.
//!
//! A single-executable graph: every C source compiles to one object under
//! the build directory, and all objects link into `<project>$exesuf`.

const BANNER: &str = "# Generated by configure.\n\n";

/// Escape a literal for a ninja variable value.
fn escape_value(s: &str) -> String {
    s.replace('$', "$$")
}

/// Escape a literal for a build-statement path.
fn escape_path(s: &str) -> String {
    escape_value(s).replace(' ', "$ ").replace(':', "$:")
}

/// Rewrite a normalized source (`$(ROOT)/...`, `$(BUILD)/...`) to ninja variables.
fn source_path(source: &str) -> String {
    if let Some(rest) = source.strip_prefix("$(BUILD)") {
        format!("$builddir{}", escape_path(rest))
    } else if let Some(rest) = source.strip_prefix("$(ROOT)") {
        format!("$root{}", escape_path(rest))
    } else {
        escape_path(source)
    }
}

/// Object file for a C source, or `None` for anything else.
fn object_path(source: &str) -> Option<String> {
    let stem = source.strip_suffix(".c")?;
    let rel = stem
        .strip_prefix("$(BUILD)/")
        .or_else(|| stem.strip_prefix("$(ROOT)/"))
        .unwrap_or(stem);
    Some(format!("$builddir/{}.o", escape_path(rel)))
}

/// Contents of the generated build graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NinjaFile {
    pub project: String,
    pub build_dir: String,
    pub root_dir: String,
    pub cc: String,
    pub cflags: String,
    pub ldflags: String,
    pub exe_suffix: String,
    /// Resolved install prefix
    pub prefix: String,
    /// Normalized, sorted sources
    pub sources: Vec<String>,
}

impl NinjaFile {
    fn target(&self) -> String {
        format!("$builddir/{}$exesuf", escape_path(&self.project))
    }

    pub fn render(&self) -> String {
        let mut out = String::from(BANNER);

        for (name, value) in [
            ("builddir", &self.build_dir),
            ("root", &self.root_dir),
            ("cc", &self.cc),
            ("cflags", &self.cflags),
            ("ldflags", &self.ldflags),
            ("exesuf", &self.exe_suffix),
        ] {
            out.push_str(&format!("{} = {}\n", name, escape_value(value)));
        }
        out.push('\n');

        out.push_str(
            "rule cc\n\
             \x20 command = $cc $cflags -I$root -I$builddir -MD -MF $out.d -c $in -o $out\n\
             \x20 description = CC $out\n\
             \x20 depfile = $out.d\n\
             \x20 deps = gcc\n\
             \n\
             rule link\n\
             \x20 command = $cc @$out.rsp $ldflags -o $out\n\
             \x20 description = LINK $out\n\
             \x20 rspfile = $out.rsp\n\
             \x20 rspfile_content = $in\n\
             \n",
        );

        out.push_str("# Object files\n");
        let mut objects = Vec::new();
        for source in &self.sources {
            let Some(object) = object_path(source) else {
                continue;
            };
            out.push_str(&format!("build {}: cc {}\n", object, source_path(source)));
            objects.push(object);
        }
        out.push('\n');

        let target = self.target();
        out.push_str(&format!("build {}: link {}\n\n", target, objects.join(" ")));
        out.push_str(&format!("default {}\n\n", target));

        let prefix = escape_value(&self.prefix);
        let project = escape_value(&self.project);
        out.push_str(&format!(
            "rule install_rule\n\
             \x20 command = mkdir -p {prefix}/bin && install -v -m 0755 {target} {prefix}/bin/{project}$exesuf\n\
             \x20 description = INSTALL\n\
             \n\
             rule uninstall_rule\n\
             \x20 command = rm -fv {prefix}/bin/{project}$exesuf\n\
             \x20 description = UNINSTALL\n\
             \n\
             rule clean\n\
             \x20 command = rm -rf $builddir\n\
             \x20 description = CLEAN\n\
             \n\
             build install: install_rule\n\
             build uninstall: uninstall_rule\n\
             build clean: clean\n",
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NinjaFile {
        NinjaFile {
            project: "demo".into(),
            build_dir: "/src/demo/build".into(),
            root_dir: "/src/demo".into(),
            cc: "cc".into(),
            cflags: "-O2 -DX=$HOME".into(),
            ldflags: "-lz".into(),
            exe_suffix: String::new(),
            prefix: "/usr/local".into(),
            sources: vec![
                "$(BUILD)/generated/ebml.c".into(),
                "$(ROOT)/main.c".into(),
                "$(ROOT)/version.h".into(),
            ],
        }
    }

    #[test]
    fn test_object_paths() {
        assert_eq!(object_path("$(ROOT)/video/out.c").unwrap(), "$builddir/video/out.o");
        assert_eq!(
            object_path("$(BUILD)/generated/g.c").unwrap(),
            "$builddir/generated/g.o"
        );
        assert_eq!(object_path("$(ROOT)/player/lua.rc"), None);
        assert_eq!(source_path("$(ROOT)/my dir/a.c"), "$root/my$ dir/a.c");
    }

    #[test]
    fn test_render_graph() {
        let text = sample().render();

        assert!(text.starts_with("# Generated by configure.\n\nbuilddir = /src/demo/build\n"));
        assert!(text.contains("cflags = -O2 -DX=$$HOME\n"));
        assert!(text.contains("build $builddir/generated/ebml.o: cc $builddir/generated/ebml.c\n"));
        assert!(text.contains("build $builddir/main.o: cc $root/main.c\n"));
        assert!(!text.contains("version.o"));
        assert!(text.contains(
            "build $builddir/demo$exesuf: link $builddir/generated/ebml.o $builddir/main.o\n"
        ));
        assert!(text.contains("default $builddir/demo$exesuf\n"));
        assert!(text.contains("install -v -m 0755 $builddir/demo$exesuf /usr/local/bin/demo$exesuf"));
        assert!(text.ends_with("build clean: clean\n"));
    }

    #[test]
    fn test_render_is_deterministic() {
        assert_eq!(sample().render(), sample().render());
    }
}
