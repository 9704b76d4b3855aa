use super::editor::{Drifted, FileEditor, LineBlock};
use super::undo::UndoLog;
use crate::plan::ActionKind;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors while changing the tree
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("Failed to {operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}: {source}")]
    Drifted {
        path: PathBuf,
        #[source]
        source: Drifted,
    },

    #[error("{} actions are not applied automatically", .0.as_str())]
    Unsupported(ActionKind),

    #[error("{0} is not part of the scanned tree")]
    UnknownSubject(String),
}

impl ApplyError {
    fn io<'a>(operation: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> ApplyError + 'a {
        move |source| ApplyError::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A concrete change to one file, paths relative to the scan root
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    DeleteFile(PathBuf),
    ArchiveFile(PathBuf),
    RemoveLines { path: PathBuf, blocks: Vec<LineBlock> },
}

impl Edit {
    pub fn path(&self) -> &Path {
        match self {
            Edit::DeleteFile(path) | Edit::ArchiveFile(path) => path,
            Edit::RemoveLines { path, .. } => path,
        }
    }
}

/// Boundary through which edits reach the tree. Every implementation must
/// record what it changes in the undo log before changing it.
pub trait Applier {
    fn apply(&mut self, edit: &Edit, undo: &mut UndoLog) -> Result<(), ApplyError>;
}

/// Applies edits to files under a root directory
pub struct FileSystemApplier {
    root: PathBuf,
    archive_dir: PathBuf,
    editor: FileEditor,
}

impl FileSystemApplier {
    pub fn new(root: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            archive_dir: archive_dir.into(),
            editor: FileEditor::new(),
        }
    }

    /// Where an archived file ends up
    pub fn archive_path(&self, relative: &Path) -> PathBuf {
        self.root.join(&self.archive_dir).join(relative)
    }
}

impl Applier for FileSystemApplier {
    fn apply(&mut self, edit: &Edit, undo: &mut UndoLog) -> Result<(), ApplyError> {
        let path = self.root.join(edit.path());
        let original = std::fs::read(&path).map_err(ApplyError::io("read", &path))?;
        undo.record_original(&path, &original);

        match edit {
            Edit::DeleteFile(_) => {
                std::fs::remove_file(&path).map_err(ApplyError::io("delete", &path))?;
                debug!("Deleted {}", path.display());
            }
            Edit::ArchiveFile(relative) => {
                let destination = self.archive_path(relative);
                if let Some(parent) = destination.parent() {
                    std::fs::create_dir_all(parent).map_err(ApplyError::io("create", parent))?;
                }
                undo.record_created(&destination);
                std::fs::write(&destination, &original).map_err(ApplyError::io("archive", &destination))?;
                std::fs::remove_file(&path).map_err(ApplyError::io("delete", &path))?;
                debug!("Archived {} to {}", path.display(), destination.display());
            }
            Edit::RemoveLines { blocks, .. } => {
                let edited = self
                    .editor
                    .remove_blocks(&original, blocks)
                    .map_err(|source| ApplyError::Drifted {
                        path: path.clone(),
                        source,
                    })?;
                std::fs::write(&path, edited).map_err(ApplyError::io("write", &path))?;
                debug!("Removed {} block(s) from {}", blocks.len(), path.display());
            }
        }
        Ok(())
    }
}
