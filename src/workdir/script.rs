// src/workdir/script.rs

use std::fmt::Write as _;
use std::path::Path;

use crate::dag::ScriptSpec;
use crate::types::RunMode;

/// Text of one wrapper script.
///
/// ```text
/// #!/bin/bash
/// #$ -o /out/S1/shell
/// #$ -e /out/S1/shell
/// sh /pipe/script/bwa.sh /out /pipe S1 ACGT
/// ```
///
/// The `#$` directives are only emitted in SGE mode and point the cluster's
/// stdout/stderr files at the script's own directory.
pub fn render_wrapper(template: &Path, spec: &ScriptSpec, mode: RunMode) -> String {
    let mut text = String::from("#!/bin/bash\n");
    if mode == RunMode::Sge {
        if let Some(dir) = spec.path.parent() {
            let _ = writeln!(text, "#$ -o {}", dir.display());
            let _ = writeln!(text, "#$ -e {}", dir.display());
        }
    }
    let _ = writeln!(text, "sh {} {}", template.display(), spec.args.join(" "));
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn spec() -> ScriptSpec {
        ScriptSpec {
            path: PathBuf::from("/out/S1/shell/bwa.sh"),
            args: vec!["/out".into(), "/pipe".into(), "S1".into(), "ACGT".into()],
        }
    }

    #[test]
    fn local_wrapper_is_shebang_plus_call() {
        let text = render_wrapper(Path::new("/pipe/script/bwa.sh"), &spec(), RunMode::Local);
        assert_eq!(text, "#!/bin/bash\nsh /pipe/script/bwa.sh /out /pipe S1 ACGT\n");
    }

    #[test]
    fn sge_wrapper_redirects_into_script_dir() {
        let text = render_wrapper(Path::new("/pipe/script/bwa.sh"), &spec(), RunMode::Sge);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "#$ -o /out/S1/shell");
        assert_eq!(lines[2], "#$ -e /out/S1/shell");
        assert!(lines[3].starts_with("sh /pipe/script/bwa.sh"));
    }
}
