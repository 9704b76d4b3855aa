//! The run report: the one output whose shape external tooling relies on.
//!
//! Field names and every enumeration value (kebab-case) are a compatibility
//! surface. Additive changes keep the major version; anything else bumps it.

mod prior;
mod terminal;

pub use prior::{PlanDelta, PriorReport};
pub use terminal::TerminalReporter;

use crate::analysis::{DuplicateCluster, RemovalCandidate};
use crate::config::Config;
use crate::discovery::FileStats;
use crate::plan::{Action, CleanupPlan, TransactionGroup};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Current report format version
pub const REPORT_VERSION: &str = "1.0";

/// Report errors
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to read report {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to encode or decode JSON report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to encode or decode YAML report: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Unsupported report version {found} (expected {})", REPORT_VERSION)]
    UnsupportedVersion { found: String },
}

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Terminal,
    Json,
    Yaml,
}

impl ReportFormat {
    /// Guess a structured format from a file extension; JSON otherwise
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => ReportFormat::Yaml,
            _ => ReportFormat::Json,
        }
    }

    pub fn is_structured(&self) -> bool {
        !matches!(self, ReportFormat::Terminal)
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "terminal" | "text" => Ok(ReportFormat::Terminal),
            "json" => Ok(ReportFormat::Json),
            "yaml" | "yml" => Ok(ReportFormat::Yaml),
            other => Err(format!("unknown report format '{}'", other)),
        }
    }
}

/// Run metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub root: PathBuf,
    pub dry_run: bool,

    /// False when a fatal error cut the run short
    pub complete: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub similarity_threshold: f64,
    pub shingle_size: usize,

    /// Plan fingerprint equals the prior report's; absent without a prior
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unchanged_since_prior: Option<bool>,
}

/// A full run report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub version: String,
    pub run: RunInfo,
    pub files: FileStats,
    pub duplicate_clusters: Vec<DuplicateCluster>,
    pub removal_candidates: Vec<RemovalCandidate>,
    pub actions: Vec<Action>,
    pub groups: Vec<TransactionGroup>,
    pub fingerprint: String,
}

impl Report {
    /// An empty, incomplete report; stages fill it in as they finish
    pub fn new(root: impl Into<PathBuf>, config: &Config, dry_run: bool) -> Self {
        Self {
            version: REPORT_VERSION.to_string(),
            run: RunInfo {
                root: root.into(),
                dry_run,
                complete: false,
                error: None,
                similarity_threshold: config.duplicates.similarity_threshold,
                shingle_size: config.duplicates.shingle_size,
                unchanged_since_prior: None,
            },
            files: FileStats::default(),
            duplicate_clusters: Vec::new(),
            removal_candidates: Vec::new(),
            actions: Vec::new(),
            groups: Vec::new(),
            fingerprint: String::new(),
        }
    }

    pub fn set_plan(&mut self, plan: &CleanupPlan) {
        self.actions = plan.actions.clone();
        self.groups = plan.groups.clone();
        self.fingerprint = plan.fingerprint.clone();
    }

    /// Mark the run as cut short by a fatal error
    pub fn fail(&mut self, error: impl ToString) {
        self.run.complete = false;
        self.run.error = Some(error.to_string());
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String, ReportError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Render in a structured format; the terminal format renders as JSON
    pub fn render(&self, format: ReportFormat) -> Result<String, ReportError> {
        match format {
            ReportFormat::Yaml => self.to_yaml(),
            ReportFormat::Json | ReportFormat::Terminal => self.to_json(),
        }
    }

    /// Save the report; the extension picks JSON or YAML
    pub fn save(&self, path: &Path) -> Result<(), ReportError> {
        let text = self.render(ReportFormat::for_path(path))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ReportError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, text).map_err(|source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a report written by this or an earlier 1.x version
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let text = std::fs::read_to_string(path).map_err(|source| ReportError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let report: Report = match ReportFormat::for_path(path) {
            ReportFormat::Yaml => serde_yaml::from_str(&text)?,
            _ => serde_json::from_str(&text)?,
        };
        if !same_major(&report.version, REPORT_VERSION) {
            return Err(ReportError::UnsupportedVersion {
                found: report.version,
            });
        }
        Ok(report)
    }
}

fn same_major(a: &str, b: &str) -> bool {
    a.split('.').next() == b.split('.').next()
}
