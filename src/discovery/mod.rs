mod file_finder;

pub use file_finder::{
    content_hash, FileFinder, FileStats, Language, ScanError, ScanOutput, SourceFile,
};
