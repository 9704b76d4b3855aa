use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

const DELIMITER: &str = "RECLAIM_EOF";

/// Original bytes of every file an apply touched, and every file it created.
/// Restoring writes the originals back byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoLog {
    originals: BTreeMap<PathBuf, Vec<u8>>,
    created: BTreeSet<PathBuf>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the state of a file before modification; the first record wins
    pub fn record_original(&mut self, path: &Path, contents: &[u8]) {
        if !self.originals.contains_key(path) {
            self.originals.insert(path.to_path_buf(), contents.to_vec());
        }
    }

    /// Record a file that did not exist before the apply
    pub fn record_created(&mut self, path: &Path) {
        if !self.originals.contains_key(path) {
            self.created.insert(path.to_path_buf());
        }
    }

    pub fn original(&self, path: &Path) -> Option<&[u8]> {
        self.originals.get(path).map(Vec::as_slice)
    }

    pub fn file_count(&self) -> usize {
        self.originals.len() + self.created.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty() && self.created.is_empty()
    }

    /// Fold another log in, keeping the earliest record for each path
    pub fn absorb(&mut self, other: UndoLog) {
        for (path, contents) in other.originals {
            self.originals.entry(path).or_insert(contents);
        }
        for path in other.created {
            self.record_created(&path);
        }
    }

    /// Put every recorded file back and delete every created one
    pub fn restore(&self) -> Result<(), (PathBuf, io::Error)> {
        for path in &self.created {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err((path.clone(), e)),
            }
        }
        for (path, contents) in &self.originals {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| (path.clone(), e))?;
            }
            std::fs::write(path, contents).map_err(|e| (path.clone(), e))?;
        }
        Ok(())
    }

    /// Render the log as a bash script that restores the recorded state
    pub fn to_script(&self) -> String {
        let mut script = String::new();

        script.push_str("#!/bin/bash\n");
        script.push_str("# reclaim undo script\n");
        script.push_str("# Run to restore the files an apply removed or changed\n");
        script.push('\n');
        script.push_str("set -e\n");
        script.push('\n');

        for path in &self.created {
            script.push_str(&format!("rm -f '{}'\n", quote(path)));
        }
        if !self.created.is_empty() {
            script.push('\n');
        }

        for (path, contents) in &self.originals {
            let quoted = quote(path);
            script.push_str(&format!("# Restore {}\n", path.display()));
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                script.push_str(&format!("mkdir -p '{}'\n", quote(parent)));
            }
            match heredoc_body(contents) {
                Some(text) => {
                    script.push_str(&format!("cat > '{}' << '{}'\n", quoted, DELIMITER));
                    script.push_str(text);
                    script.push_str(DELIMITER);
                    script.push('\n');
                }
                None => {
                    // Octal escapes keep arbitrary bytes and missing final newlines intact
                    let escaped: String = contents.iter().map(|b| format!("\\{:03o}", b)).collect();
                    script.push_str(&format!("printf '{}' > '{}'\n", escaped, quoted));
                }
            }
            script.push_str(&format!("echo '  Restored: {}'\n", quoted));
            script.push('\n');
        }

        script.push_str("echo 'Done! All files restored.'\n");
        script
    }

    /// Write the undo script and make it executable
    pub fn write_script(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.to_script())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(path)?.permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(path, perms)?;
        }

        Ok(())
    }
}

fn quote(path: &Path) -> String {
    path.display().to_string().replace('\'', "'\\''")
}

/// Text a quoted heredoc reproduces exactly: UTF-8, newline-terminated,
/// never containing the delimiter line
fn heredoc_body(contents: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(contents).ok()?;
    if text.is_empty() || !text.ends_with('\n') || text.lines().any(|l| l == DELIMITER) {
        return None;
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_record_wins() {
        let mut log = UndoLog::new();
        log.record_original(Path::new("a.py"), b"first\n");
        log.record_original(Path::new("a.py"), b"second\n");
        assert_eq!(log.original(Path::new("a.py")), Some(&b"first\n"[..]));
        assert_eq!(log.file_count(), 1);
    }

    #[test]
    fn test_restore_is_byte_exact() {
        let dir = TempDir::new().unwrap();
        let kept = dir.path().join("src/kept.py");
        let created = dir.path().join("archive/kept.py");
        std::fs::create_dir_all(kept.parent().unwrap()).unwrap();
        std::fs::create_dir_all(created.parent().unwrap()).unwrap();

        let original = b"def a():\r\n    pass\r\n\xff";
        std::fs::write(&kept, original).unwrap();

        let mut log = UndoLog::new();
        log.record_original(&kept, original);
        log.record_created(&created);

        std::fs::remove_file(&kept).unwrap();
        std::fs::write(&created, b"moved").unwrap();

        log.restore().unwrap();
        assert_eq!(std::fs::read(&kept).unwrap(), original.to_vec());
        assert!(!created.exists());
    }

    #[test]
    fn test_absorb_keeps_earliest() {
        let mut first = UndoLog::new();
        first.record_original(Path::new("a.py"), b"old\n");
        let mut second = UndoLog::new();
        second.record_original(Path::new("a.py"), b"newer\n");
        second.record_original(Path::new("b.py"), b"b\n");
        first.absorb(second);
        assert_eq!(first.original(Path::new("a.py")), Some(&b"old\n"[..]));
        assert_eq!(first.file_count(), 2);
    }

    #[test]
    fn test_script_uses_heredoc_for_text() {
        let mut log = UndoLog::new();
        log.record_original(Path::new("src/it's.py"), b"print('hi')\n");
        let script = log.to_script();

        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("mkdir -p 'src'"));
        assert!(script.contains("cat > 'src/it'\\''s.py' << 'RECLAIM_EOF'\nprint('hi')\nRECLAIM_EOF\n"));
    }

    #[test]
    fn test_script_escapes_unterminated_content() {
        let mut log = UndoLog::new();
        log.record_original(Path::new("a.sh"), b"ab");
        log.record_created(Path::new(".reclaim-archive/b.py"));
        let script = log.to_script();

        assert!(script.contains("printf '\\141\\142' > 'a.sh'"));
        assert!(script.contains("rm -f '.reclaim-archive/b.py'"));
    }

    #[test]
    fn test_write_script() {
        let dir = TempDir::new().unwrap();
        let script_path = dir.path().join("restore.sh");

        let mut log = UndoLog::new();
        log.record_original(Path::new("test.kt"), b"class Test {}\n");
        log.write_script(&script_path).unwrap();

        let contents = std::fs::read_to_string(&script_path).unwrap();
        assert!(contents.contains("class Test {}"));
    }
}
