use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::PileupError;

fn locate_on_path(exe: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(exe))
        .find(|candidate| candidate.is_file())
}

/// Confirms a required tool is on `PATH` and reports a version recent
/// enough to be trusted: run with no arguments, it is expected to print
/// usage to stdout, exit with status 1, and carry a `Version:` line that
/// is not a `0.*` release.
pub fn probe_tool(exe: &str) -> Result<PathBuf, PileupError> {
    let path = locate_on_path(exe)
        .ok_or_else(|| PileupError::ToolMissing(exe.to_string(), "not found on PATH".into()))?;

    let mut child = Command::new(&path)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| PileupError::ToolMissing(exe.to_string(), e.to_string()))?;

    let mut stdout = String::new();
    child
        .stdout
        .take()
        .expect("stdout was piped")
        .read_to_string(&mut stdout)
        .map_err(|e| PileupError::ToolMissing(exe.to_string(), e.to_string()))?;

    let status = child
        .wait()
        .map_err(|e| PileupError::ToolMissing(exe.to_string(), e.to_string()))?;

    if status.code() != Some(1) {
        return Err(PileupError::ToolMissing(
            exe.to_string(),
            format!(
                "expected a no-args usage exit status of 1, got {:?}",
                status.code()
            ),
        ));
    }

    let version_line = stdout.lines().nth(2).ok_or_else(|| {
        PileupError::ToolMissing(
            exe.to_string(),
            "usage output has fewer than three lines".to_string(),
        )
    })?;
    if !version_line.starts_with("Version:") {
        return Err(PileupError::ToolMissing(
            exe.to_string(),
            "third line of usage output does not start with `Version:`".to_string(),
        ));
    }

    if version_line.starts_with("Version: 0.") {
        return Err(PileupError::ToolMissing(
            exe.to_string(),
            format!("{version_line} is unsupported; 1.0 or later is required"),
        ));
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    fn write_stub(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "#!/bin/sh").unwrap();
        f.write_all(body.as_bytes()).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn with_stub_on_path<F: FnOnce()>(name: &str, body: &str, f: F) {
        let dir = tempfile::tempdir().unwrap();
        write_stub(dir.path(), name, body);
        let old_path = std::env::var_os("PATH").unwrap_or_default();
        let new_path = std::env::join_paths(
            std::iter::once(dir.path().to_path_buf())
                .chain(std::env::split_paths(&old_path)),
        )
        .unwrap();
        std::env::set_var("PATH", new_path);
        f();
        std::env::set_var("PATH", old_path);
    }

    #[test]
    fn accepts_a_tool_with_a_modern_version() {
        with_stub_on_path(
            "toolgood",
            "printf 'usage\\nmore\\nVersion: 1.21\\n'\nexit 1\n",
            || {
                assert!(probe_tool("toolgood").is_ok());
            },
        );
    }

    #[test]
    fn rejects_a_zero_dot_version() {
        with_stub_on_path(
            "toolold",
            "printf 'usage\\nmore\\nVersion: 0.9\\n'\nexit 1\n",
            || {
                let err = probe_tool("toolold").unwrap_err();
                assert!(matches!(err, PileupError::ToolMissing(_, _)));
            },
        );
    }

    #[test]
    fn reports_missing_tool() {
        let err = probe_tool("a-tool-that-certainly-does-not-exist").unwrap_err();
        assert!(matches!(err, PileupError::ToolMissing(_, _)));
    }
}
