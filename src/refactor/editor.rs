use thiserror::Error;

/// Lines to cut from a file, as they read when the tree was scanned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineBlock {
    /// 1-based first line at scan time
    pub start_line: usize,

    /// Expected text of each line, without terminators
    pub lines: Vec<String>,
}

impl LineBlock {
    pub fn new(start_line: usize, lines: Vec<String>) -> Self {
        Self { start_line, lines }
    }

    pub fn end_line(&self) -> usize {
        self.start_line + self.lines.len().saturating_sub(1)
    }
}

/// The file no longer holds a block where, or as, it was scanned
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("lines {start}-{end} no longer match the scanned text")]
pub struct Drifted {
    pub start: usize,
    pub end: usize,
}

/// Byte-preserving line editor
pub struct FileEditor;

impl FileEditor {
    pub fn new() -> Self {
        Self
    }

    /// Remove blocks from `contents`, keeping every other byte (line endings
    /// included) untouched.
    ///
    /// A block is looked up at its scanned position first. Earlier edits may
    /// have shifted it, so it is then searched for; it must occur exactly once.
    pub fn remove_blocks(&self, contents: &[u8], blocks: &[LineBlock]) -> Result<Vec<u8>, Drifted> {
        let lines: Vec<&[u8]> = contents.split_inclusive(|b| *b == b'\n').collect();
        let mut doomed = vec![false; lines.len()];

        for block in blocks {
            if block.lines.is_empty() {
                continue;
            }
            let drifted = Drifted {
                start: block.start_line,
                end: block.end_line(),
            };
            let at = |start: usize| {
                start + block.lines.len() <= lines.len()
                    && block
                        .lines
                        .iter()
                        .enumerate()
                        .all(|(i, expected)| text_of(lines[start + i]) == expected.as_bytes())
            };

            let scanned = block.start_line.checked_sub(1).filter(|&start| at(start));
            let start = match scanned {
                Some(start) => start,
                None => {
                    let mut matches = (0..lines.len()).filter(|&start| at(start));
                    match (matches.next(), matches.next()) {
                        (Some(start), None) => start,
                        _ => return Err(drifted),
                    }
                }
            };
            for flag in &mut doomed[start..start + block.lines.len()] {
                *flag = true;
            }
        }

        Ok(lines
            .iter()
            .zip(&doomed)
            .filter(|(_, doomed)| !**doomed)
            .flat_map(|(line, _)| line.iter().copied())
            .collect())
    }
}

impl Default for FileEditor {
    fn default() -> Self {
        Self::new()
    }
}

/// A line without its `\n` or `\r\n` terminator
fn text_of(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
