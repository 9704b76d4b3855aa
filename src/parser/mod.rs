//! Per-language symbol and reference extraction.
//!
//! Each profiled language is a [`Profile`]: a table of definition, import and
//! dynamic-loading patterns plus a module resolver. [`profile_for`] selects the
//! profile from the file's [`Language`](crate::discovery::Language) tag and the
//! extractor drives it over the file's lines.

mod common;
mod extractor;
pub mod lexer;
mod profile;
pub mod profiles;

pub use common::FileExtraction;
pub use extractor::{extract, SymbolExtractor};
pub use profile::{
    has_profile, normalize_path, parent_dir, profile_for, BodyStyle, Definition, DefinitionRule,
    ModuleTarget, PackageScope, Profile, VisibilityRule,
};
